use serde_json::Value;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;

use crate::Result;

/// Stored per-knowledge-base override patch, applied over the global `[rag]`
/// defaults at request entry.
pub async fn get(pool: &PgPool, knowledge_base_id: &str) -> Result<Option<Value>> {
	let row = sqlx::query(
		"SELECT overrides FROM rag_configs WHERE knowledge_base_id = $1",
	)
	.bind(knowledge_base_id)
	.fetch_optional(pool)
	.await?;

	match row {
		Some(row) => Ok(Some(row.try_get("overrides")?)),
		None => Ok(None),
	}
}

pub async fn upsert(
	pool: &PgPool,
	knowledge_base_id: &str,
	overrides: &Value,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO rag_configs (knowledge_base_id, overrides, updated_at)
VALUES ($1, $2, $3)
ON CONFLICT (knowledge_base_id)
DO UPDATE SET overrides = EXCLUDED.overrides, updated_at = EXCLUDED.updated_at",
	)
	.bind(knowledge_base_id)
	.bind(overrides)
	.bind(now)
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn delete(pool: &PgPool, knowledge_base_id: &str) -> Result<bool> {
	let result = sqlx::query("DELETE FROM rag_configs WHERE knowledge_base_id = $1")
		.bind(knowledge_base_id)
		.execute(pool)
		.await?;

	Ok(result.rows_affected() > 0)
}
