use crate::models::{DatasetStats, RockfallEvent};
use async_trait::async_trait;
use sqlx::SqlitePool;

use super::user_repository::{RepositoryError, RepositoryResult};

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait EventRepository: Send + Sync {
    /// All recorded events, newest first.
    async fn list_events(&self) -> RepositoryResult<Vec<RockfallEvent>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<RockfallEvent>>;
    async fn update_labels(&self, id: i64, labels: &str) -> RepositoryResult<()>;
    async fn dataset_stats(&self) -> RepositoryResult<DatasetStats>;
}

pub struct SqliteEventRepository {
    pool: SqlitePool,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const EVENT_COLUMNS: &str = "id, occurred_at, node_id, event_type, magnitude, verified, \
     confidence, description, location, weather_conditions, vibration, tilt, temperature, labels";

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn list_events(&self) -> RepositoryResult<Vec<RockfallEvent>> {
        let events = sqlx::query_as::<_, RockfallEvent>(&format!(
            "SELECT {} FROM rockfall_events ORDER BY occurred_at DESC, id DESC",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<RockfallEvent>> {
        let event = sqlx::query_as::<_, RockfallEvent>(&format!(
            "SELECT {} FROM rockfall_events WHERE id = ?",
            EVENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    async fn update_labels(&self, id: i64, labels: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE rockfall_events SET labels = ? WHERE id = ?")
            .bind(labels)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn dataset_stats(&self) -> RepositoryResult<DatasetStats> {
        // Labels are stored comma-separated; wrap in commas so LIKE matches whole labels
        let (total_events, validated_events, training_events, false_positives): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT
                    COUNT(*),
                    COALESCE(SUM(CASE WHEN verified THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN ',' || labels || ',' LIKE '%,training_data,%' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN event_type = 'False Positive'
                                        OR ',' || labels || ',' LIKE '%,false_positive,%' THEN 1 ELSE 0 END), 0)
                FROM rockfall_events
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(DatasetStats {
            total_events,
            validated_events,
            training_events,
            false_positives,
        })
    }
}
