//! Schema for the graph database.
//!
//! List-valued columns (`source_chunk_ids`, `file_paths`, `keywords`) hold
//! JSON arrays as text. Timestamps are Unix seconds. Relationships carry a
//! surrogate `id`, so parallel edges between the same pair are distinct rows.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create tables and indices. Safe to run against an existing database.
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            source_chunk_ids TEXT NOT NULL DEFAULT '[]',
            file_paths TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER,
            updated_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS relationships (
            id INTEGER PRIMARY KEY,
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            relation_type TEXT,
            description TEXT NOT NULL DEFAULT '',
            keywords TEXT NOT NULL DEFAULT '[]',
            weight REAL NOT NULL DEFAULT 1.0,
            source_chunk_ids TEXT NOT NULL DEFAULT '[]',
            file_paths TEXT NOT NULL DEFAULT '[]',
            created_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            doc_id TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            file_path TEXT NOT NULL DEFAULT '',
            order_index INTEGER NOT NULL DEFAULT 0,
            token_count INTEGER NOT NULL DEFAULT 0,
            timestamp INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_type ON entities(entity_type)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_doc ON chunks(doc_id, order_index)")
        .execute(pool)
        .await?;

    Ok(())
}
