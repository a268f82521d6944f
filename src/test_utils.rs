pub mod test_helpers {
    use std::{net::IpAddr, sync::Arc};

    use axum::Router;
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use tempfile::NamedTempFile;
    use tower_sessions_sqlx_store::SqliteStore;

    use crate::{
        build_router,
        config::{AppConfig, SessionConfig},
        services::{EmailService, MockEmailService},
        telemetry::{Fleet, Simulator},
        AppState,
    };

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when you need to test features that don't work with in-memory databases
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Configuration suitable for in-process tests.
    pub fn test_config() -> AppConfig {
        AppConfig {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            base_url: "http://localhost:5000".to_string(),
            simulation_interval: std::time::Duration::from_millis(50),
            reset_token_ttl: chrono::Duration::minutes(60),
            api_token_ttl: chrono::Duration::hours(24),
            cors_allowed_origin: None,
        }
    }

    /// Application state over `pool` with logged email and a simulator
    /// that only moves when ticked by the test.
    pub async fn create_test_state(pool: SqlitePool) -> AppState {
        let config = test_config();
        let email_service: Arc<dyn EmailService> =
            Arc::new(MockEmailService::new(config.base_url.clone()));
        AppState::new(pool, config, email_service, Simulator::new(Fleet::seed())).await
    }

    /// Full router with a development session layer stored in `pool`.
    pub async fn create_test_app(state: AppState) -> Result<Router, sqlx::Error> {
        let store = SqliteStore::new(state.pool.clone())
            .with_table_name("sessions")
            .map_err(|e| sqlx::Error::Configuration(e.into()))?;
        store.migrate().await?;
        let session_layer = SessionConfig::for_environment("development").create_layer(store);

        Ok(build_router(state, session_layer))
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<i64, sqlx::Error> {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
            })?
            .to_string();

        let result = sqlx::query("INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)")
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .execute(pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert an extra rockfall event and return its id
    pub async fn insert_test_event(
        pool: &SqlitePool,
        node_id: &str,
        event_type: &str,
        verified: bool,
        labels: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO rockfall_events (
                occurred_at, node_id, event_type, magnitude, verified, confidence,
                description, location, weather_conditions, vibration, tilt, temperature, labels
            )
            VALUES ('2024-02-01T08:00:00Z', ?, ?, 'Small', ?, 80,
                    'Test event', 'Sector T-1', 'Clear', 50.0, 3.0, 10.0, ?)
            "#,
        )
        .bind(node_id)
        .bind(event_type)
        .bind(verified)
        .bind(labels)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}
