use rusqlite::Connection;
use tracing::debug;

use crate::errors::GraphError;

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id   TEXT PRIMARY KEY,
    body TEXT
);
CREATE TABLE IF NOT EXISTS edges (
    source     TEXT,
    target     TEXT,
    properties TEXT
);
CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);
"#;

/// Creates the `nodes` and `edges` tables if they are missing. Safe to run on every open.
pub fn ensure_schema(conn: &Connection) -> Result<(), GraphError> {
    debug!("ensuring graph schema");
    conn.execute_batch(SCHEMA)
        .map_err(|e| GraphError::query_execution(e.to_string(), SCHEMA))
}
