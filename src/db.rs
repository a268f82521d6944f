use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    // SQLite will not create missing directories for a file database
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&ensure_create_mode(database_url))
        .await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

fn ensure_create_mode(database_url: &str) -> String {
    if database_url.contains(":memory:") || database_url.contains("mode=") {
        database_url.to_string()
    } else if database_url.contains('?') {
        format!("{}&mode=rwc", database_url)
    } else {
        format!("{}?mode=rwc", database_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mode_appended() {
        assert_eq!(
            ensure_create_mode("sqlite://data/rockfall.db"),
            "sqlite://data/rockfall.db?mode=rwc"
        );
        assert_eq!(
            ensure_create_mode("sqlite://data/rockfall.db?cache=shared"),
            "sqlite://data/rockfall.db?cache=shared&mode=rwc"
        );
        assert_eq!(ensure_create_mode("sqlite::memory:"), "sqlite::memory:");
    }

    #[tokio::test]
    async fn test_file_pool_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/nested/rockfall.db", dir.path().display());

        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rockfall_events")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 4);
    }
}
