//! Relationship retrieval for a single entity.
//!
//! # Algorithm
//!
//! 1. Validate the filters, then confirm the entity exists.
//! 2. Fetch every incident edge once (`Direction::Both`).
//! 3. Partition by the entity's side of each edge; drop unrequested sides.
//! 4. Filter each side (see [`filters`](crate::filters)).
//! 5. Order by weight (desc), then the far endpoint's id (asc).
//! 6. Count, then slice each side to `[offset, offset + limit)`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::filters::{neighbor_matches, Direction, RelationshipFilters};
use crate::models::{EdgeSide, Entity, Relationship, RelationshipSet, RelationshipView};
use crate::store::{EntityStore, RelationGraph};

pub struct RelationshipResolver {
    entities: Arc<dyn EntityStore>,
    graph: Arc<dyn RelationGraph>,
}

impl RelationshipResolver {
    pub fn new(entities: Arc<dyn EntityStore>, graph: Arc<dyn RelationGraph>) -> Self {
        Self { entities, graph }
    }

    pub async fn resolve(
        &self,
        entity_id: &str,
        filters: &RelationshipFilters,
    ) -> Result<RelationshipSet> {
        filters.validate()?;
        if self.entities.get(entity_id).await?.is_none() {
            return Err(QueryError::entity_not_found(entity_id));
        }
        self.resolve_existing(entity_id, filters).await
    }

    /// Same as [`resolve`](Self::resolve) for an entity already known to
    /// exist, with filters already validated.
    pub(crate) async fn resolve_existing(
        &self,
        entity_id: &str,
        filters: &RelationshipFilters,
    ) -> Result<RelationshipSet> {
        let edges = self.graph.edges_of(entity_id, Direction::Both).await?;
        let fetched = edges.len();

        let mut incoming = Vec::new();
        let mut outgoing = Vec::new();
        for rel in edges {
            if !filters.matches(&rel) {
                continue;
            }
            let is_incoming = rel.target_id == entity_id;
            let is_outgoing = rel.source_id == entity_id;
            if is_incoming && filters.direction.includes(EdgeSide::Incoming) {
                incoming.push(view(EdgeSide::Incoming, rel.clone()));
            }
            if is_outgoing && filters.direction.includes(EdgeSide::Outgoing) {
                outgoing.push(view(EdgeSide::Outgoing, rel));
            }
        }

        if let Some(wanted) = filters.neighbor_types() {
            let neighbors = self.neighbors(incoming.iter().chain(outgoing.iter())).await?;
            let keep = |v: &RelationshipView| {
                neighbor_matches(neighbors.get(v.neighbor_id()).and_then(Option::as_ref), Some(wanted))
            };
            incoming.retain(keep);
            outgoing.retain(keep);
        }

        sort_side(&mut incoming);
        sort_side(&mut outgoing);

        let total_count = incoming.len() + outgoing.len();
        let incoming = paginate(incoming, filters.limit, filters.offset);
        let outgoing = paginate(outgoing, filters.limit, filters.offset);

        tracing::debug!(
            entity_id,
            fetched,
            total_count,
            incoming = incoming.len(),
            outgoing = outgoing.len(),
            "resolved relationships"
        );

        Ok(RelationshipSet {
            incoming,
            outgoing,
            total_count,
        })
    }

    /// Look up each distinct far endpoint once. Dangling ids map to `None`.
    async fn neighbors<'a>(
        &self,
        views: impl Iterator<Item = &'a RelationshipView>,
    ) -> Result<HashMap<String, Option<Entity>>> {
        let ids: HashSet<&str> = views.map(RelationshipView::neighbor_id).collect();
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            found.insert(id.to_string(), self.entities.get(id).await?);
        }
        Ok(found)
    }
}

fn view(direction: EdgeSide, relationship: Relationship) -> RelationshipView {
    RelationshipView {
        direction,
        relationship,
    }
}

/// Weight descending, then far endpoint id ascending.
fn sort_side(views: &mut [RelationshipView]) {
    views.sort_by(|a, b| {
        b.relationship
            .weight
            .partial_cmp(&a.relationship.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.neighbor_id().cmp(b.neighbor_id()))
    });
}

fn paginate<T>(items: Vec<T>, limit: Option<i64>, offset: i64) -> Vec<T> {
    let iter = items.into_iter().skip(offset.max(0) as usize);
    match limit {
        Some(limit) => iter.take(limit.max(0) as usize).collect(),
        None => iter.collect(),
    }
}
