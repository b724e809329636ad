//! In-memory store implementation for tests and snapshot files.
//!
//! Entities, relationships, and chunks live in flat collections keyed by
//! id. Edges are stored once in a `Vec` and reached through per-direction
//! adjacency indices (`outgoing[source]`, `incoming[target]`), so lookups
//! never walk an object graph.
//!
//! The store is populated up front (builder methods or [`InMemoryGraph::from_snapshot`])
//! and then shared immutably behind an `Arc`.

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::filters::Direction;
use crate::models::{Chunk, Entity, Relationship};

use super::{ChunkStore, EntityStore, RelationGraph};

/// JSON snapshot layout accepted by [`InMemoryGraph::from_snapshot`].
#[derive(Debug, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl Snapshot {
    /// Reject edges whose weight is not a finite value in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        for rel in &self.relationships {
            if !rel.weight.is_finite() || !(0.0..=1.0).contains(&rel.weight) {
                bail!(
                    "relationship '{}' -> '{}' has weight {} outside [0, 1]",
                    rel.source_id,
                    rel.target_id,
                    rel.weight
                );
            }
        }
        Ok(())
    }
}

/// In-memory entity, relation, and chunk store.
#[derive(Debug, Default)]
pub struct InMemoryGraph {
    entities: BTreeMap<String, Entity>,
    edges: Vec<Relationship>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,
    chunks: HashMap<String, Chunk>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON snapshot (`{entities, relationships, chunks}`).
    pub fn from_snapshot(json: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(json).context("Failed to parse graph snapshot")?;
        Self::try_from(snapshot)
    }

    /// Insert or replace an entity.
    pub fn insert_entity(&mut self, entity: Entity) -> &mut Self {
        self.entities.insert(entity.id.clone(), entity);
        self
    }

    /// Append an edge and index it under both endpoints.
    pub fn insert_relationship(&mut self, rel: Relationship) -> &mut Self {
        let idx = self.edges.len();
        self.outgoing
            .entry(rel.source_id.clone())
            .or_default()
            .push(idx);
        self.incoming
            .entry(rel.target_id.clone())
            .or_default()
            .push(idx);
        self.edges.push(rel);
        self
    }

    /// Insert or replace a chunk.
    pub fn insert_chunk(&mut self, chunk: Chunk) -> &mut Self {
        self.chunks.insert(chunk.id.clone(), chunk);
        self
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.edges.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn edge_indices(&self, entity_id: &str, direction: Direction) -> Vec<usize> {
        let out = self.outgoing.get(entity_id).map(Vec::as_slice).unwrap_or(&[]);
        let inc = self.incoming.get(entity_id).map(Vec::as_slice).unwrap_or(&[]);
        let mut indices: Vec<usize> = match direction {
            Direction::Outgoing => out.to_vec(),
            Direction::Incoming => inc.to_vec(),
            Direction::Both => out.iter().chain(inc.iter()).copied().collect(),
        };
        // self-loops are indexed on both sides
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl TryFrom<Snapshot> for InMemoryGraph {
    type Error = anyhow::Error;

    fn try_from(snapshot: Snapshot) -> Result<Self> {
        snapshot.validate()?;
        let mut graph = Self::new();
        for entity in snapshot.entities {
            graph.insert_entity(entity);
        }
        for rel in snapshot.relationships {
            graph.insert_relationship(rel);
        }
        for chunk in snapshot.chunks {
            graph.insert_chunk(chunk);
        }
        Ok(graph)
    }
}

#[async_trait]
impl EntityStore for InMemoryGraph {
    async fn get(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.entities.get(id).cloned())
    }

    async fn scan(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Entity) -> bool + Send + Sync),
    ) -> Result<Vec<Entity>> {
        Ok(self
            .entities
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect())
    }

    async fn count(
        &self,
        predicate: &(dyn for<'a> Fn(&'a Entity) -> bool + Send + Sync),
    ) -> Result<usize> {
        Ok(self.entities.values().filter(|e| predicate(e)).count())
    }
}

#[async_trait]
impl RelationGraph for InMemoryGraph {
    async fn edges_of(&self, entity_id: &str, direction: Direction) -> Result<Vec<Relationship>> {
        Ok(self
            .edge_indices(entity_id, direction)
            .into_iter()
            .map(|idx| self.edges[idx].clone())
            .collect())
    }
}

#[async_trait]
impl ChunkStore for InMemoryGraph {
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Chunk>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.chunks.get(id).cloned())
            .collect())
    }
}
