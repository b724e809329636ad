//! Core data models used throughout Entity Query.
//!
//! The stored records ([`Entity`], [`Relationship`], [`Chunk`]) are owned by
//! the extraction pipeline; the engine only reads them. Everything else in
//! this module is a request-scoped view built by one of the engine
//! operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Number of description characters kept in an [`EntitySummary`].
pub const SUMMARY_DESCRIPTION_CHARS: usize = 200;

/// A named node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type", alias = "entity_type", default)]
    pub entity_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source_chunk_ids: Vec<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

/// A directed, weighted edge between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type", alias = "relation_type", default)]
    pub relation_type: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub source_chunk_ids: Vec<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

fn default_weight() -> f64 {
    1.0
}

/// A unit of source document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub doc_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub order_index: i64,
    #[serde(default)]
    pub token_count: i64,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Lightweight listing row for an entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub entity_id: String,
    pub entity_type: String,
    pub description: String,
    pub description_full_length: usize,
    pub source_count: usize,
    pub created_at: Option<i64>,
}

impl EntitySummary {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            entity_id: entity.id.clone(),
            entity_type: entity.entity_type.clone(),
            description: entity
                .description
                .chars()
                .take(SUMMARY_DESCRIPTION_CHARS)
                .collect(),
            description_full_length: entity.description.chars().count(),
            source_count: source_count(entity),
            created_at: entity.created_at,
        }
    }
}

pub(crate) fn source_count(entity: &Entity) -> usize {
    entity
        .source_chunk_ids
        .iter()
        .filter(|id| !id.is_empty())
        .count()
}

/// One page of a `list` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityPage {
    pub entities: Vec<EntitySummary>,
    pub total_count: usize,
    pub returned_count: usize,
    pub offset: i64,
    pub limit: i64,
    pub has_more: bool,
}

/// A ranked `search` hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySearchResult {
    pub entity_id: String,
    pub entity_type: String,
    pub description: String,
    pub relevance_score: f64,
    pub source_count: usize,
}

/// Which side of an edge the queried entity sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeSide {
    /// The queried entity is the target.
    Incoming,
    /// The queried entity is the source.
    Outgoing,
}

/// A relationship as seen from the queried entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipView {
    pub direction: EdgeSide,
    #[serde(flatten)]
    pub relationship: Relationship,
}

impl RelationshipView {
    /// The entity on the other end of the edge.
    pub fn neighbor_id(&self) -> &str {
        match self.direction {
            EdgeSide::Incoming => &self.relationship.source_id,
            EdgeSide::Outgoing => &self.relationship.target_id,
        }
    }
}

/// Result of a `relationships` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelationshipSet {
    pub incoming: Vec<RelationshipView>,
    pub outgoing: Vec<RelationshipView>,
    /// Filtered count across both sides, taken before pagination.
    pub total_count: usize,
}

impl RelationshipSet {
    /// Returned relationships, incoming first.
    pub fn iter(&self) -> impl Iterator<Item = &RelationshipView> {
        self.incoming.iter().chain(self.outgoing.iter())
    }

    pub fn returned_count(&self) -> usize {
        self.incoming.len() + self.outgoing.len()
    }
}

/// A chunk projected for output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkView {
    pub chunk_id: String,
    pub file_path: String,
    pub content_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ChunkView {
    pub fn project(chunk: Chunk, include_full_text: bool, include_metadata: bool) -> Self {
        let content_length = chunk.content.chars().count();
        let (doc_id, order_index, token_count, timestamp) = if include_metadata {
            (
                Some(chunk.doc_id),
                Some(chunk.order_index),
                Some(chunk.token_count),
                chunk.timestamp,
            )
        } else {
            (None, None, None, None)
        };
        Self {
            chunk_id: chunk.id,
            file_path: chunk.file_path,
            content_length,
            content: include_full_text.then_some(chunk.content),
            doc_id,
            order_index,
            token_count,
            timestamp,
        }
    }
}

/// Statistics derived from the sections of a [`FullEntityView`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityStatistics {
    pub total_relationships: usize,
    pub incoming_relationships: usize,
    pub outgoing_relationships: usize,
    pub avg_relationship_weight: f64,
    pub total_source_chunks: usize,
    pub returned_chunks: usize,
    pub unique_files: usize,
    pub unique_documents: usize,
}

/// Composite view returned by the `full` operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullEntityView {
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<RelationshipSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<ChunkView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<EntityStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_entities: Option<Vec<String>>,
}

/// Entity type → number of entities of that type.
pub type TypeSummary = BTreeMap<String, usize>;

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(description: &str) -> Entity {
        Entity {
            id: "Alice".into(),
            entity_type: "person".into(),
            description: description.into(),
            source_chunk_ids: vec!["c1".into(), String::new(), "c2".into()],
            file_paths: vec![],
            created_at: Some(10),
            updated_at: None,
        }
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        let long = "é".repeat(250);
        let summary = EntitySummary::from_entity(&entity(&long));
        assert_eq!(summary.description.chars().count(), SUMMARY_DESCRIPTION_CHARS);
        assert_eq!(summary.description_full_length, 250);
        assert_eq!(summary.source_count, 2);
    }

    #[test]
    fn chunk_projection_hides_text_and_metadata() {
        let chunk = Chunk {
            id: "c1".into(),
            doc_id: "d1".into(),
            content: "hello".into(),
            file_path: "a.md".into(),
            order_index: 3,
            token_count: 1,
            timestamp: Some(5),
        };
        let bare = ChunkView::project(chunk.clone(), false, false);
        assert_eq!(bare.content, None);
        assert_eq!(bare.content_length, 5);
        assert_eq!(bare.doc_id, None);
        assert_eq!(bare.order_index, None);
        assert_eq!(bare.file_path, "a.md");

        let full = ChunkView::project(chunk, true, true);
        assert_eq!(full.content.as_deref(), Some("hello"));
        assert_eq!(full.doc_id.as_deref(), Some("d1"));
        assert_eq!(full.timestamp, Some(5));
    }

    #[test]
    fn snapshot_records_accept_pipeline_field_names() {
        let e: Entity =
            serde_json::from_str(r#"{"id":"TechCorp","entity_type":"organization"}"#).unwrap();
        assert_eq!(e.entity_type, "organization");
        assert!(e.source_chunk_ids.is_empty());

        let r: Relationship =
            serde_json::from_str(r#"{"source_id":"A","target_id":"B"}"#).unwrap();
        assert_eq!(r.weight, 1.0);
        assert_eq!(r.relation_type, None);
    }
}
