const SCHEMA_SQL: &str = "\
CREATE TABLE IF NOT EXISTS rag_configs (
	knowledge_base_id TEXT PRIMARY KEY,
	overrides JSONB NOT NULL,
	updated_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS rag_configs_updated_at_idx
	ON rag_configs (updated_at)";

pub fn render_schema() -> &'static str {
	SCHEMA_SQL
}
