//! Load a JSON graph snapshot into the database.
//!
//! The snapshot layout is the one [`InMemoryGraph::from_snapshot`] reads:
//! `{"entities": [...], "relationships": [...], "chunks": [...]}`, and is
//! checked the same way (edge weights in `[0, 1]`) before anything is written.
//!
//! Entities and chunks are upserted by id. Relationships have no natural key:
//! every edge between a source/target pair named in the snapshot is replaced
//! by the snapshot's edges for that pair, so parallel edges survive and a
//! re-import does not duplicate them. Everything runs inside one transaction,
//! so a failed import leaves the database unchanged.
//!
//! [`InMemoryGraph::from_snapshot`]: entity_query_core::store::memory::InMemoryGraph::from_snapshot

use anyhow::{Context, Result};
use entity_query_core::store::memory::Snapshot;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::path::Path;

use crate::config::Config;
use crate::{db, migrate};

/// Rows written by one import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub entities: usize,
    pub relationships: usize,
    pub chunks: usize,
}

/// CLI entry point for `eqe import <file>`.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;

    let pool = db::connect(config).await?;
    migrate::create_schema(&pool).await?;
    let stats = import_snapshot(&pool, &snapshot).await?;
    pool.close().await;

    println!("Imported {}:", path.display());
    println!("  entities:      {}", stats.entities);
    println!("  relationships: {}", stats.relationships);
    println!("  chunks:        {}", stats.chunks);
    Ok(())
}

pub async fn import_snapshot(pool: &SqlitePool, snapshot: &Snapshot) -> Result<ImportStats> {
    snapshot.validate()?;

    let mut stats = ImportStats::default();
    let mut tx = pool.begin().await?;

    for e in &snapshot.entities {
        let written = sqlx::query(
            r#"
            INSERT INTO entities (id, entity_type, description, source_chunk_ids, file_paths, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                entity_type = excluded.entity_type,
                description = excluded.description,
                source_chunk_ids = excluded.source_chunk_ids,
                file_paths = excluded.file_paths,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&e.id)
        .bind(&e.entity_type)
        .bind(&e.description)
        .bind(serde_json::to_string(&e.source_chunk_ids)?)
        .bind(serde_json::to_string(&e.file_paths)?)
        .bind(e.created_at)
        .bind(e.updated_at)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to write entity '{}'", e.id))?;
        stats.entities += written.rows_affected() as usize;
    }

    let pairs: BTreeSet<(&str, &str)> = snapshot
        .relationships
        .iter()
        .map(|r| (r.source_id.as_str(), r.target_id.as_str()))
        .collect();
    for (source, target) in pairs {
        sqlx::query("DELETE FROM relationships WHERE source_id = ? AND target_id = ?")
            .bind(source)
            .bind(target)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to clear relationships '{source}' -> '{target}'"))?;
    }

    for r in &snapshot.relationships {
        let written = sqlx::query(
            r#"
            INSERT INTO relationships (source_id, target_id, relation_type, description, keywords, weight, source_chunk_ids, file_paths, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&r.source_id)
        .bind(&r.target_id)
        .bind(&r.relation_type)
        .bind(&r.description)
        .bind(serde_json::to_string(&r.keywords)?)
        .bind(r.weight)
        .bind(serde_json::to_string(&r.source_chunk_ids)?)
        .bind(serde_json::to_string(&r.file_paths)?)
        .bind(r.created_at)
        .execute(&mut *tx)
        .await
        .with_context(|| {
            format!(
                "Failed to write relationship '{}' -> '{}'",
                r.source_id, r.target_id
            )
        })?;
        stats.relationships += written.rows_affected() as usize;
    }

    for c in &snapshot.chunks {
        let written = sqlx::query(
            r#"
            INSERT INTO chunks (id, doc_id, content, file_path, order_index, token_count, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                doc_id = excluded.doc_id,
                content = excluded.content,
                file_path = excluded.file_path,
                order_index = excluded.order_index,
                token_count = excluded.token_count,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(&c.id)
        .bind(&c.doc_id)
        .bind(&c.content)
        .bind(&c.file_path)
        .bind(c.order_index)
        .bind(c.token_count)
        .bind(c.timestamp)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to write chunk '{}'", c.id))?;
        stats.chunks += written.rows_affected() as usize;
    }

    tx.commit().await?;

    tracing::info!(
        entities = stats.entities,
        relationships = stats.relationships,
        chunks = stats.chunks,
        "snapshot imported"
    );
    Ok(stats)
}
