//! Source-chunk retrieval for a single entity.
//!
//! An entity reaches chunks directly through its own `source_chunk_ids`
//! and indirectly through the `source_chunk_ids` of every relationship it
//! takes part in. Both sets are merged in first-seen order before the
//! chunk store is consulted.
//!
//! A referenced chunk id that the store cannot resolve is skipped and logged
//! at debug level. It is not reported as [`QueryError::NotFound`]; only a
//! missing entity is.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::filters::{Direction, DocumentFilters};
use crate::models::{Chunk, ChunkView, Entity};
use crate::store::{ChunkStore, EntityStore, RelationGraph};

pub struct DocumentResolver {
    entities: Arc<dyn EntityStore>,
    graph: Arc<dyn RelationGraph>,
    chunks: Arc<dyn ChunkStore>,
}

impl DocumentResolver {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        graph: Arc<dyn RelationGraph>,
        chunks: Arc<dyn ChunkStore>,
    ) -> Self {
        Self {
            entities,
            graph,
            chunks,
        }
    }

    pub async fn resolve(
        &self,
        entity_id: &str,
        filters: &DocumentFilters,
    ) -> Result<Vec<ChunkView>> {
        filters.validate()?;
        let entity = self
            .entities
            .get(entity_id)
            .await?
            .ok_or_else(|| QueryError::entity_not_found(entity_id))?;
        self.resolve_for(&entity, filters).await
    }

    /// Chunks for an already-fetched entity, with filters already validated.
    pub(crate) async fn resolve_for(
        &self,
        entity: &Entity,
        filters: &DocumentFilters,
    ) -> Result<Vec<ChunkView>> {
        let mut ids = self.associated_chunk_ids(entity).await?;
        if let Some(wanted) = filters.chunk_ids.as_deref().filter(|w| !w.is_empty()) {
            ids.retain(|id| wanted.contains(id));
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut chunks = self.chunks.get_many(&ids).await?;
        if chunks.len() < ids.len() {
            let found: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
            let missing: Vec<&str> = ids
                .iter()
                .map(String::as_str)
                .filter(|id| !found.contains(id))
                .collect();
            tracing::debug!(entity_id = %entity.id, ?missing, "skipping unresolved chunk ids");
        }

        chunks.retain(|c| filters.matches(c));
        sort_chunks(&mut chunks);
        let matched = chunks.len();

        let views: Vec<ChunkView> = chunks
            .into_iter()
            .skip(filters.offset.max(0) as usize)
            .take(filters.max_chunks.max(0) as usize)
            .map(|c| ChunkView::project(c, filters.include_full_text, filters.include_metadata))
            .collect();

        tracing::debug!(
            entity_id = %entity.id,
            candidates = ids.len(),
            matched,
            returned = views.len(),
            "resolved documents"
        );
        Ok(views)
    }

    /// Entity chunk ids, then chunk ids of incident relationships.
    async fn associated_chunk_ids(&self, entity: &Entity) -> Result<Vec<String>> {
        let edges = self.graph.edges_of(&entity.id, Direction::Both).await?;
        let mut seen = HashSet::new();
        let ids = entity
            .source_chunk_ids
            .iter()
            .chain(edges.iter().flat_map(|r| r.source_chunk_ids.iter()))
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .cloned()
            .collect();
        Ok(ids)
    }
}

/// Reading order: `(doc_id, order_index, timestamp, id)` ascending.
fn sort_chunks(chunks: &mut [Chunk]) {
    chunks.sort_by(|a, b| {
        a.doc_id
            .cmp(&b.doc_id)
            .then(a.order_index.cmp(&b.order_index))
            .then(a.timestamp.cmp(&b.timestamp))
            .then_with(|| a.id.cmp(&b.id))
    });
}
