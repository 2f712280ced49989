use crate::domain::suggestion::SuggestionHistoryRecord;
use crate::suggest::history::HistoryStore;
use anyhow::Context;
use chrono::NaiveDate;
use uuid::Uuid;

/// Postgres-backed suggestion history. The table carries a unique
/// (ticker, date_suggested) constraint, so the insert is idempotent even if
/// two writers race past the exists check.
#[derive(Debug, Clone)]
pub struct PgHistoryStore {
    pool: sqlx::PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl HistoryStore for PgHistoryStore {
    async fn exists(&self, ticker: &str, date_suggested: NaiveDate) -> anyhow::Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM suggestion_history WHERE ticker = $1 AND date_suggested = $2)",
        )
        .persistent(false)
        .bind(ticker)
        .bind(date_suggested)
        .fetch_one(&self.pool)
        .await
        .context("suggestion_history exists check failed")?;
        Ok(exists)
    }

    async fn insert(&self, record: &SuggestionHistoryRecord) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO suggestion_history \
               (id, date_suggested, ticker, price_at_suggestion, predicted_price, best_model) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (ticker, date_suggested) DO NOTHING",
        )
        .persistent(false)
        .bind(record.id)
        .bind(record.date_suggested)
        .bind(&record.ticker)
        .bind(record.price_at_suggestion)
        .bind(record.predicted_price)
        .bind(&record.best_model)
        .execute(&self.pool)
        .await
        .context("insert suggestion_history failed")?;
        Ok(())
    }

    async fn list_all(&self) -> anyhow::Result<Vec<SuggestionHistoryRecord>> {
        let rows = sqlx::query_as::<_, (Uuid, NaiveDate, String, f64, f64, String)>(
            "SELECT id, date_suggested, ticker, price_at_suggestion, predicted_price, best_model \
             FROM suggestion_history \
             ORDER BY date_suggested DESC, ticker ASC",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select suggestion_history failed")?;

        Ok(rows
            .into_iter()
            .map(
                |(id, date_suggested, ticker, price_at_suggestion, predicted_price, best_model)| {
                    SuggestionHistoryRecord {
                        id,
                        date_suggested,
                        ticker,
                        price_at_suggestion,
                        predicted_price,
                        best_model,
                    }
                },
            )
            .collect())
    }
}
