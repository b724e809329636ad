//! SQLite-backed implementation of the core store traits.
//!
//! One [`SqliteStore`] serves all three traits from the same pool (see
//! [`Stores::shared`](entity_query_core::Stores::shared)). Every query is a
//! read; the tables are written by `eqe import` or by an external pipeline.

use anyhow::{Context, Result};
use async_trait::async_trait;
use entity_query_core::filters::Direction;
use entity_query_core::models::{Chunk, Entity, Relationship};
use entity_query_core::store::{ChunkStore, EntityStore, RelationGraph};
use entity_query_core::{EntityQueryEngine, Stores};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::sync::Arc;

use crate::config::Config;
use crate::db;

/// SQLite caps bound parameters per statement; stay well below it.
const MAX_IDS_PER_QUERY: usize = 500;

const ENTITY_COLUMNS: &str =
    "id, entity_type, description, source_chunk_ids, file_paths, created_at, updated_at";
const RELATIONSHIP_COLUMNS: &str = "source_id, target_id, relation_type, description, keywords, \
     weight, source_chunk_ids, file_paths, created_at";
const CHUNK_COLUMNS: &str = "id, doc_id, content, file_path, order_index, token_count, timestamp";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Connect to the configured database and build an engine over it.
pub async fn open_engine(config: &Config) -> Result<EntityQueryEngine> {
    let pool = db::connect(config).await?;
    let store = Arc::new(SqliteStore::new(pool));
    Ok(EntityQueryEngine::new(
        Stores::shared(store),
        config.query.defaults(),
    ))
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn get(&self, id: &str) -> Result<Option<Entity>> {
        let row = sqlx::query(&format!("SELECT {} FROM entities WHERE id = ?", ENTITY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(entity_from_row).transpose()
    }

    async fn scan(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Entity) -> bool + Send + Sync),
    ) -> Result<Vec<Entity>> {
        let sql = format!("SELECT {} FROM entities ORDER BY id ASC", ENTITY_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut entities = Vec::new();
        for row in &rows {
            let entity = entity_from_row(row)?;
            if predicate(&entity) {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    async fn count(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Entity) -> bool + Send + Sync),
    ) -> Result<usize> {
        Ok(self.scan(predicate).await?.len())
    }
}

#[async_trait]
impl RelationGraph for SqliteStore {
    async fn edges_of(&self, entity_id: &str, direction: Direction) -> Result<Vec<Relationship>> {
        let condition = match direction {
            Direction::Outgoing => "source_id = ?1",
            Direction::Incoming => "target_id = ?1",
            Direction::Both => "source_id = ?1 OR target_id = ?1",
        };
        let rows = sqlx::query(&format!(
            "SELECT {} FROM relationships WHERE {} ORDER BY id",
            RELATIONSHIP_COLUMNS, condition
        ))
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(relationship_from_row).collect()
    }
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::with_capacity(ids.len());
        for batch in ids.chunks(MAX_IDS_PER_QUERY) {
            let mut qb: QueryBuilder<Sqlite> =
                QueryBuilder::new(format!("SELECT {} FROM chunks WHERE id IN (", CHUNK_COLUMNS));
            let mut separated = qb.separated(", ");
            for id in batch {
                separated.push_bind(id.as_str());
            }
            separated.push_unseparated(")");
            let rows = qb.build().fetch_all(&self.pool).await?;
            for row in &rows {
                chunks.push(chunk_from_row(row)?);
            }
        }
        Ok(chunks)
    }
}

fn entity_from_row(row: &SqliteRow) -> Result<Entity> {
    let id: String = row.get("id");
    Ok(Entity {
        entity_type: row.get("entity_type"),
        description: row.get("description"),
        source_chunk_ids: json_list(row, "source_chunk_ids")
            .with_context(|| format!("entity '{}'", id))?,
        file_paths: json_list(row, "file_paths").with_context(|| format!("entity '{}'", id))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        id,
    })
}

fn relationship_from_row(row: &SqliteRow) -> Result<Relationship> {
    let source_id: String = row.get("source_id");
    let target_id: String = row.get("target_id");
    let context = || format!("relationship '{}' -> '{}'", source_id, target_id);
    Ok(Relationship {
        relation_type: row.get("relation_type"),
        description: row.get("description"),
        keywords: json_list(row, "keywords").with_context(context)?,
        weight: row.get("weight"),
        source_chunk_ids: json_list(row, "source_chunk_ids").with_context(context)?,
        file_paths: json_list(row, "file_paths").with_context(context)?,
        created_at: row.get("created_at"),
        source_id,
        target_id,
    })
}

fn chunk_from_row(row: &SqliteRow) -> Result<Chunk> {
    Ok(Chunk {
        id: row.get("id"),
        doc_id: row.get("doc_id"),
        content: row.get("content"),
        file_path: row.get("file_path"),
        order_index: row.get("order_index"),
        token_count: row.get("token_count"),
        timestamp: row.get("timestamp"),
    })
}

/// Decode a JSON-array text column. Empty text reads as an empty list.
fn json_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let raw: String = row.get(column);
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).with_context(|| format!("malformed JSON in column {}", column))
}
