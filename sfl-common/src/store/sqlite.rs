//! SQLite-backed time-series store

use super::{validate_range, TimeSeriesStore};
use crate::model::{Bucket, SentimentCounts};
use crate::period::{Granularity, PeriodLabel};
use crate::{Error, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::trace;

/// Store over the `impressions` table
///
/// `statistic_id` is the granularity partition, `date` the period label.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn to_db_count(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| Error::InvalidInput(format!("{} count {} exceeds storage range", field, value)))
}

fn from_db_count(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| Error::Internal(format!("Stored {} count is negative: {}", field, value)))
}

fn row_to_bucket(granularity: Granularity, row: &sqlx::sqlite::SqliteRow) -> Result<Bucket> {
    let date: String = row.get("date");
    let period = PeriodLabel::parse(granularity, &date)?;
    let counts = SentimentCounts::new(
        from_db_count(row.get("positive"), "positive")?,
        from_db_count(row.get("neutral"), "neutral")?,
        from_db_count(row.get("negative"), "negative")?,
    );
    Ok(Bucket::new(period, counts))
}

#[async_trait]
impl TimeSeriesStore for SqliteStore {
    async fn put_merge(&self, period: &PeriodLabel, delta: &SentimentCounts) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO impressions (statistic_id, date, positive, neutral, negative)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(statistic_id, date) DO UPDATE SET
                positive = positive + excluded.positive,
                neutral = neutral + excluded.neutral,
                negative = negative + excluded.negative,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(period.granularity().statistic_id())
        .bind(period.as_str())
        .bind(to_db_count(delta.positive, "positive")?)
        .bind(to_db_count(delta.neutral, "neutral")?)
        .bind(to_db_count(delta.negative, "negative")?)
        .execute(&self.pool)
        .await?;

        trace!(period = %period, total = delta.total(), "Merged bucket");
        Ok(())
    }

    async fn query_range(&self, from: &PeriodLabel, to: Option<&PeriodLabel>) -> Result<Vec<Bucket>> {
        validate_range(from, to)?;
        let granularity = from.granularity();

        let rows = match to {
            Some(to) => {
                sqlx::query(
                    r#"
                    SELECT date, positive, neutral, negative
                    FROM impressions
                    WHERE statistic_id = ? AND date >= ? AND date <= ?
                    ORDER BY date ASC
                    "#,
                )
                .bind(granularity.statistic_id())
                .bind(from.as_str())
                .bind(to.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT date, positive, neutral, negative
                    FROM impressions
                    WHERE statistic_id = ? AND date >= ?
                    ORDER BY date ASC
                    "#,
                )
                .bind(granularity.statistic_id())
                .bind(from.as_str())
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(|row| row_to_bucket(granularity, row)).collect()
    }

    async fn query_exact(&self, period: &PeriodLabel) -> Result<Option<Bucket>> {
        let row = sqlx::query(
            r#"
            SELECT date, positive, neutral, negative
            FROM impressions
            WHERE statistic_id = ? AND date = ?
            "#,
        )
        .bind(period.granularity().statistic_id())
        .bind(period.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_bucket(period.granularity(), &row)).transpose()
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
