use std::{env, net::IpAddr, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings read from the process environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub base_url: String,
    pub simulation_interval: Duration,
    pub reset_token_ttl: chrono::Duration,
    pub api_token_ttl: chrono::Duration,
    pub cors_allowed_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let host = parse_var("HOST", "127.0.0.1")?;
        let port = parse_var("PORT", "5000")?;
        let base_url = env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));

        let interval_ms: u64 = parse_var("SIMULATION_INTERVAL_MS", "2000")?;
        if interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "SIMULATION_INTERVAL_MS",
                value: "0".to_string(),
            });
        }

        let reset_minutes: i64 = parse_var("RESET_TOKEN_TTL_MINUTES", "60")?;
        let api_hours: i64 = parse_var("API_TOKEN_TTL_HOURS", "24")?;

        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN")
            .ok()
            .filter(|origin| !origin.trim().is_empty());

        Ok(Self {
            host,
            port,
            database_url,
            base_url,
            simulation_interval: Duration::from_millis(interval_ms),
            reset_token_ttl: chrono::Duration::minutes(reset_minutes),
            api_token_ttl: chrono::Duration::hours(api_hours),
            cors_allowed_origin,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid { key, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for key in [
            "HOST",
            "PORT",
            "BASE_URL",
            "SIMULATION_INTERVAL_MS",
            "RESET_TOKEN_TTL_MINUTES",
            "API_TOKEN_TTL_HOURS",
            "CORS_ALLOWED_ORIGIN",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        env::set_var("DATABASE_URL", "sqlite::memory:");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host.to_string(), "127.0.0.1");
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.simulation_interval, Duration::from_secs(2));
        assert_eq!(config.reset_token_ttl, chrono::Duration::minutes(60));
        assert!(config.cors_allowed_origin.is_none());
    }

    #[test]
    #[serial]
    fn test_rejects_bad_port() {
        clear();
        env::set_var("DATABASE_URL", "sqlite::memory:");
        env::set_var("PORT", "not-a-port");

        let result = AppConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Invalid { key: "PORT", .. })));
        env::remove_var("PORT");
    }

    #[test]
    #[serial]
    fn test_rejects_zero_interval() {
        clear();
        env::set_var("DATABASE_URL", "sqlite::memory:");
        env::set_var("SIMULATION_INTERVAL_MS", "0");

        assert!(AppConfig::from_env().is_err());
        env::remove_var("SIMULATION_INTERVAL_MS");
    }
}
