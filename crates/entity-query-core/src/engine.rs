//! The engine façade: one entry point per query operation.
//!
//! [`EntityQueryEngine`] owns the store handles and the request defaults.
//! It is cheap to share (`Arc` inside) and holds no per-request state, so
//! concurrent requests never contend on anything but the stores themselves.
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | [`list`](EntityQueryEngine::list) | [`ListRequest`] | [`EntityPage`] |
//! | [`search`](EntityQueryEngine::search) | [`SearchRequest`] | `Vec<EntitySearchResult>` |
//! | [`types_summary`](EntityQueryEngine::types_summary) | none | [`TypeSummary`] |
//! | [`details`](EntityQueryEngine::details) | entity id | [`Entity`] |
//! | [`relationships`](EntityQueryEngine::relationships) | entity id, [`RelationshipFilters`] | [`RelationshipSet`] |
//! | [`documents`](EntityQueryEngine::documents) | entity id, [`DocumentFilters`] | `Vec<ChunkView>` |
//! | [`full`](EntityQueryEngine::full) | entity id, [`FullQueryOptions`] | [`FullEntityView`] |

use std::sync::Arc;

use crate::aggregate::FullEntityAggregator;
use crate::catalog::EntityCatalog;
use crate::documents::DocumentResolver;
use crate::error::{QueryError, Result};
use crate::filters::{
    DocumentFilters, FullQueryOptions, ListRequest, RelationshipFilters, SearchRequest,
    DEFAULT_LIST_LIMIT, DEFAULT_MAX_CHUNKS, DEFAULT_MAX_RELATED_ENTITIES, DEFAULT_SEARCH_LIMIT,
};
use crate::models::{
    ChunkView, Entity, EntityPage, EntitySearchResult, FullEntityView, RelationshipSet,
    TypeSummary,
};
use crate::relationships::RelationshipResolver;
use crate::store::Stores;

/// Request defaults and upper bounds, built once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryDefaults {
    pub list_limit: i64,
    pub max_list_limit: i64,
    pub search_limit: i64,
    pub max_search_limit: i64,
    pub max_chunks: i64,
    pub max_related_entities: i64,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            list_limit: DEFAULT_LIST_LIMIT,
            max_list_limit: 1000,
            search_limit: DEFAULT_SEARCH_LIMIT,
            max_search_limit: 100,
            max_chunks: DEFAULT_MAX_CHUNKS,
            max_related_entities: DEFAULT_MAX_RELATED_ENTITIES,
        }
    }
}

impl QueryDefaults {
    /// A list request carrying the configured page size.
    pub fn list_request(&self) -> ListRequest {
        ListRequest {
            limit: self.list_limit,
            ..ListRequest::default()
        }
    }

    /// A search request carrying the configured result limit.
    pub fn search_request(&self, query: impl Into<String>) -> SearchRequest {
        SearchRequest {
            limit: self.search_limit,
            ..SearchRequest::new(query)
        }
    }

    pub fn document_filters(&self) -> DocumentFilters {
        DocumentFilters {
            max_chunks: self.max_chunks,
            ..DocumentFilters::default()
        }
    }

    pub fn full_options(&self) -> FullQueryOptions {
        FullQueryOptions {
            max_chunks: self.max_chunks,
            max_related_entities: self.max_related_entities,
            ..FullQueryOptions::default()
        }
    }
}

#[derive(Clone)]
pub struct EntityQueryEngine {
    inner: Arc<Inner>,
}

struct Inner {
    defaults: QueryDefaults,
    catalog: EntityCatalog,
    relationships: Arc<RelationshipResolver>,
    documents: Arc<DocumentResolver>,
    aggregator: FullEntityAggregator,
}

impl EntityQueryEngine {
    pub fn new(stores: Stores, defaults: QueryDefaults) -> Self {
        let relationships = Arc::new(RelationshipResolver::new(
            stores.entities.clone(),
            stores.graph.clone(),
        ));
        let documents = Arc::new(DocumentResolver::new(
            stores.entities.clone(),
            stores.graph.clone(),
            stores.chunks.clone(),
        ));
        let aggregator = FullEntityAggregator::new(
            stores.entities.clone(),
            relationships.clone(),
            documents.clone(),
        );
        Self {
            inner: Arc::new(Inner {
                defaults,
                catalog: EntityCatalog::new(stores.entities),
                relationships,
                documents,
                aggregator,
            }),
        }
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.inner.defaults
    }

    pub async fn list(&self, req: &ListRequest) -> Result<EntityPage> {
        at_most("limit", req.limit, self.inner.defaults.max_list_limit)?;
        self.inner.catalog.list(req).await
    }

    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<EntitySearchResult>> {
        at_most("limit", req.limit, self.inner.defaults.max_search_limit)?;
        self.inner.catalog.search(req).await
    }

    pub async fn types_summary(&self) -> Result<TypeSummary> {
        self.inner.catalog.types_summary().await
    }

    pub async fn details(&self, entity_id: &str) -> Result<Entity> {
        self.inner.catalog.get(entity_id).await
    }

    pub async fn relationships(
        &self,
        entity_id: &str,
        filters: &RelationshipFilters,
    ) -> Result<RelationshipSet> {
        self.inner.relationships.resolve(entity_id, filters).await
    }

    pub async fn documents(
        &self,
        entity_id: &str,
        filters: &DocumentFilters,
    ) -> Result<Vec<ChunkView>> {
        self.inner.documents.resolve(entity_id, filters).await
    }

    pub async fn full(
        &self,
        entity_id: &str,
        options: &FullQueryOptions,
    ) -> Result<FullEntityView> {
        self.inner.aggregator.query(entity_id, options).await
    }

    /// Total number of stored entities.
    pub async fn entity_count(&self) -> Result<usize> {
        self.inner.catalog.count().await
    }
}

fn at_most(name: &str, value: i64, max: i64) -> Result<()> {
    if value > max {
        return Err(QueryError::invalid(format!(
            "{} must be at most {}",
            name, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Direction, WeightRange};
    use crate::models::{Chunk, Relationship};
    use crate::store::memory::InMemoryGraph;

    const SNAPSHOT: &str = r#"{
        "entities": [
            {"id": "Alice", "type": "person", "description": "Engineer", "source_chunk_ids": ["chunk1", "chunk2"]},
            {"id": "Bob", "type": "person"},
            {"id": "TechCorp", "type": "organization"},
            {"id": "ML", "type": "concept"}
        ],
        "relationships": [
            {"source_id": "Alice", "target_id": "TechCorp", "weight": 0.9, "keywords": ["employment"]},
            {"source_id": "Alice", "target_id": "ML", "weight": 0.4}
        ],
        "chunks": [
            {"id": "chunk1", "doc_id": "doc1", "content": "Alice joined TechCorp.", "file_path": "a.md", "order_index": 0},
            {"id": "chunk2", "doc_id": "doc1", "content": "She studies ML.", "file_path": "a.md", "order_index": 1}
        ]
    }"#;

    fn engine() -> EntityQueryEngine {
        let graph = Arc::new(InMemoryGraph::from_snapshot(SNAPSHOT).unwrap());
        EntityQueryEngine::new(Stores::shared(graph), QueryDefaults::default())
    }

    #[tokio::test]
    async fn test_every_operation_routes_through() {
        let engine = engine();

        let page = engine.list(&engine.defaults().list_request()).await.unwrap();
        assert_eq!(page.total_count, 4);

        let hits = engine
            .search(&engine.defaults().search_request("tech"))
            .await
            .unwrap();
        assert_eq!(hits[0].entity_id, "TechCorp");

        let types = engine.types_summary().await.unwrap();
        assert_eq!(types.get("person"), Some(&2));

        assert_eq!(engine.details("Alice").await.unwrap().description, "Engineer");

        let rels = engine
            .relationships(
                "Alice",
                &RelationshipFilters {
                    direction: Direction::Outgoing,
                    weight_range: WeightRange { min: 0.5, max: 1.0 },
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(rels.total_count, 1);

        let docs = engine
            .documents("Alice", &engine.defaults().document_filters())
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);

        let full = engine
            .full("Alice", &engine.defaults().full_options())
            .await
            .unwrap();
        assert_eq!(full.statistics.unwrap().returned_chunks, 2);

        assert_eq!(engine.entity_count().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_limits_above_configured_maxima_are_rejected() {
        let graph = Arc::new(InMemoryGraph::new());
        let engine = EntityQueryEngine::new(
            Stores::shared(graph),
            QueryDefaults {
                max_list_limit: 10,
                max_search_limit: 5,
                ..QueryDefaults::default()
            },
        );
        let err = engine
            .list(&ListRequest {
                limit: 11,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));

        let mut search = SearchRequest::new("x");
        search.limit = 6;
        assert!(engine.search(&search).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_entity_on_every_entity_operation() {
        let engine = engine();
        assert!(matches!(
            engine.details("Ghost").await,
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            engine
                .relationships("Ghost", &RelationshipFilters::default())
                .await,
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            engine.documents("Ghost", &DocumentFilters::default()).await,
            Err(QueryError::NotFound(_))
        ));
        assert!(matches!(
            engine.full("Ghost", &FullQueryOptions::default()).await,
            Err(QueryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_engine_clones_share_stores() {
        let mut graph = InMemoryGraph::new();
        graph
            .insert_entity(Entity {
                id: "Solo".into(),
                entity_type: "concept".into(),
                description: String::new(),
                source_chunk_ids: vec!["c".into()],
                file_paths: vec![],
                created_at: None,
                updated_at: None,
            })
            .insert_chunk(Chunk {
                id: "c".into(),
                doc_id: "d".into(),
                content: "solo".into(),
                file_path: "s.md".into(),
                order_index: 0,
                token_count: 1,
                timestamp: None,
            })
            .insert_relationship(Relationship {
                source_id: "Solo".into(),
                target_id: "Solo".into(),
                relation_type: None,
                description: String::new(),
                keywords: vec![],
                weight: 1.0,
                source_chunk_ids: vec![],
                file_paths: vec![],
                created_at: None,
            });
        let engine =
            EntityQueryEngine::new(Stores::shared(Arc::new(graph)), QueryDefaults::default());
        let clone = engine.clone();
        let opts = FullQueryOptions::default();
        let (a, b) = tokio::join!(engine.full("Solo", &opts), clone.full("Solo", &opts));
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
