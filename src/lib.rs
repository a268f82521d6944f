pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod telemetry;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

pub use routes::build_router;

use std::sync::Arc;

use config::AppConfig;
use repositories::{
    event_repository::SqliteEventRepository,
    user_repository::{SqliteUserRepository, UserRepository},
};
use services::{
    ApiTokenService, AuthService, DashboardService, EmailService, EventService, HealthService,
    PasswordResetService, PredictionService, TrendService, UserService,
};
use telemetry::Simulator;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub api_token_service: Arc<ApiTokenService>,
    pub password_reset_service: Arc<PasswordResetService>,
    pub email_service: Arc<dyn EmailService>,
    pub event_service: Arc<EventService>,
    pub dashboard_service: DashboardService,
    pub prediction_service: Arc<PredictionService>,
    pub trend_service: Arc<TrendService>,
    pub health_service: HealthService,
    pub simulator: Simulator,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wires repositories and services on top of `pool`. The simulator is
    /// passed in so the caller decides whether its background task runs.
    pub async fn new(
        pool: sqlx::SqlitePool,
        config: AppConfig,
        email_service: Arc<dyn EmailService>,
        simulator: Simulator,
    ) -> Self {
        let user_repository: Arc<dyn UserRepository> =
            Arc::new(SqliteUserRepository::new(pool.clone()));
        let event_repository = Arc::new(SqliteEventRepository::new(pool.clone()));

        let user_service = Arc::new(UserService::new(user_repository.clone()));
        let auth_service = Arc::new(AuthService::new(user_repository.clone()));
        let api_token_service = Arc::new(ApiTokenService::new(pool.clone(), config.api_token_ttl));
        let password_reset_service = Arc::new(PasswordResetService::new(
            pool.clone(),
            email_service.clone(),
            user_repository,
            api_token_service.clone(),
            config.reset_token_ttl,
        ));

        let node_ids = simulator.snapshot().await.node_ids();

        Self {
            config: Arc::new(config),
            user_service,
            auth_service,
            api_token_service,
            password_reset_service,
            email_service,
            event_service: Arc::new(EventService::new(event_repository)),
            dashboard_service: DashboardService::new(),
            prediction_service: Arc::new(PredictionService::new()),
            trend_service: Arc::new(TrendService::new(node_ids)),
            health_service: HealthService::new(),
            simulator,
            pool,
        }
    }
}
