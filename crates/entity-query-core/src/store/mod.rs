//! Storage abstraction for Entity Query.
//!
//! The engine reads from three collaborator stores, each behind its own
//! trait so backends can be mixed (for example entities in SQLite and
//! chunks in a KV store). All three are read-only from the engine's point
//! of view; populating them is the extraction pipeline's job.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! Failures are reported through `anyhow::Result` and surface from the
//! engine as [`QueryError::Internal`](crate::error::QueryError::Internal).

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::filters::Direction;
use crate::models::{Chunk, Entity, Relationship};

/// Canonical entity records.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](EntityStore::get) | Look up one entity by id |
/// | [`scan`](EntityStore::scan) | All entities satisfying a predicate, id-ascending |
/// | [`count`](EntityStore::count) | Number of entities satisfying a predicate |
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get(&self, id: &str) -> Result<Option<Entity>>;

    async fn scan(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Entity) -> bool + Send + Sync),
    ) -> Result<Vec<Entity>>;

    async fn count(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Entity) -> bool + Send + Sync),
    ) -> Result<usize>;
}

/// Directed weighted edges between entities.
#[async_trait]
pub trait RelationGraph: Send + Sync {
    /// Edges incident to `entity_id` on the requested side(s).
    ///
    /// With [`Direction::Both`] a self-loop is returned once.
    async fn edges_of(&self, entity_id: &str, direction: Direction) -> Result<Vec<Relationship>>;
}

/// Document text chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Chunks for the given ids. Unknown ids are silently skipped; output
    /// order is unspecified.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Chunk>>;
}

/// The three store handles the engine reads from.
#[derive(Clone)]
pub struct Stores {
    pub entities: Arc<dyn EntityStore>,
    pub graph: Arc<dyn RelationGraph>,
    pub chunks: Arc<dyn ChunkStore>,
}

impl Stores {
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

    /// Use one backend that implements all three traits.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: EntityStore + RelationGraph + ChunkStore + 'static,
    {
        Self {
            entities: store.clone(),
            graph: store.clone(),
            chunks: store,
        }
    }
}
