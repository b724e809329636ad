//! Composite "full entity" view.
//!
//! The entity record is fetched first; a missing entity ends the request
//! before any other store is touched. The relationship and document
//! sub-fetches then run concurrently and are joined with
//! [`futures::try_join!`]: each future owns its result until the join, and
//! the first error drops the other future, so there is never a partial
//! view. Statistics and the related-entity list are derived from the joined
//! results.
//!
//! A sub-fetch runs when its section is requested or when a derived
//! section needs it: statistics read both, related entities read the
//! relationships.

use std::collections::HashSet;
use std::sync::Arc;

use crate::documents::DocumentResolver;
use crate::error::{QueryError, Result};
use crate::filters::FullQueryOptions;
use crate::models::{ChunkView, EntityStatistics, FullEntityView, RelationshipSet};
use crate::relationships::RelationshipResolver;
use crate::store::EntityStore;

pub struct FullEntityAggregator {
    entities: Arc<dyn EntityStore>,
    relationships: Arc<RelationshipResolver>,
    documents: Arc<DocumentResolver>,
}

impl FullEntityAggregator {
    pub fn new(
        entities: Arc<dyn EntityStore>,
        relationships: Arc<RelationshipResolver>,
        documents: Arc<DocumentResolver>,
    ) -> Self {
        Self {
            entities,
            relationships,
            documents,
        }
    }

    pub async fn query(
        &self,
        entity_id: &str,
        options: &FullQueryOptions,
    ) -> Result<FullEntityView> {
        options.validate()?;
        let entity = self
            .entities
            .get(entity_id)
            .await?
            .ok_or_else(|| QueryError::entity_not_found(entity_id))?;

        let rel_filters = options.relationship_filters();
        let doc_filters = options.document_filters();
        let need_relationships = options.include_relationships
            || options.include_statistics
            || options.compute_related_entities;
        let need_documents = options.include_documents || options.include_statistics;

        let relationships_fut = async {
            if need_relationships {
                self.relationships
                    .resolve_existing(&entity.id, &rel_filters)
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };
        let documents_fut = async {
            if need_documents {
                self.documents
                    .resolve_for(&entity, &doc_filters)
                    .await
                    .map(Some)
            } else {
                Ok(None)
            }
        };
        let (relationships, documents) = futures::try_join!(relationships_fut, documents_fut)?;

        let statistics = options
            .include_statistics
            .then(|| compute_statistics(relationships.as_ref(), documents.as_deref()));
        let related_entities = match (&relationships, options.compute_related_entities) {
            (Some(set), true) => Some(related_entities(
                &entity.id,
                set,
                options.max_related_entities.max(0) as usize,
            )),
            _ => None,
        };

        tracing::debug!(
            entity_id,
            relationships = relationships.as_ref().map(RelationshipSet::returned_count),
            documents = documents.as_ref().map(Vec::len),
            "assembled full entity view"
        );

        Ok(FullEntityView {
            entity_id: entity.id.clone(),
            entity: options.include_entity.then_some(entity),
            relationships: relationships.filter(|_| options.include_relationships),
            documents: documents.filter(|_| options.include_documents),
            statistics,
            related_entities,
        })
    }
}

/// Statistics over the returned sections. Absent sections count as empty.
pub fn compute_statistics(
    relationships: Option<&RelationshipSet>,
    documents: Option<&[ChunkView]>,
) -> EntityStatistics {
    let mut stats = EntityStatistics::default();

    if let Some(set) = relationships {
        stats.total_relationships = set.total_count;
        stats.incoming_relationships = set.incoming.len();
        stats.outgoing_relationships = set.outgoing.len();
        let returned = set.returned_count();
        if returned > 0 {
            let sum: f64 = set.iter().map(|v| v.relationship.weight).sum();
            stats.avg_relationship_weight = sum / returned as f64;
        }
    }

    if let Some(chunks) = documents {
        stats.total_source_chunks = chunks.len();
        stats.returned_chunks = chunks.len();
        stats.unique_files = chunks
            .iter()
            .map(|c| c.file_path.as_str())
            .collect::<HashSet<_>>()
            .len();
        // doc_id is only present when metadata was projected
        stats.unique_documents = chunks
            .iter()
            .filter_map(|c| c.doc_id.as_deref())
            .collect::<HashSet<_>>()
            .len();
    }

    stats
}

/// Outgoing targets, then incoming sources; self excluded, first-seen order.
pub fn related_entities(entity_id: &str, set: &RelationshipSet, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    set.outgoing
        .iter()
        .map(|v| v.relationship.target_id.as_str())
        .chain(set.incoming.iter().map(|v| v.relationship.source_id.as_str()))
        .filter(|id| *id != entity_id && seen.insert(*id))
        .take(max)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use async_trait::async_trait;

    use crate::filters::Direction;
    use crate::models::{Chunk, Entity, Relationship};
    use crate::store::memory::InMemoryGraph;
    use crate::store::{ChunkStore, RelationGraph};

    fn entity(id: &str, chunk_ids: &[&str]) -> Entity {
        Entity {
            id: id.to_string(),
            entity_type: "person".to_string(),
            description: format!("{} description", id),
            source_chunk_ids: chunk_ids.iter().map(|s| s.to_string()).collect(),
            file_paths: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    fn edge(source: &str, target: &str, weight: f64) -> Relationship {
        Relationship {
            source_id: source.to_string(),
            target_id: target.to_string(),
            relation_type: None,
            description: String::new(),
            keywords: vec![],
            weight,
            source_chunk_ids: vec![],
            file_paths: vec![],
            created_at: None,
        }
    }

    fn chunk(id: &str, doc_id: &str, order_index: i64, file_path: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            doc_id: doc_id.to_string(),
            content: "text".to_string(),
            file_path: file_path.to_string(),
            order_index,
            token_count: 1,
            timestamp: None,
        }
    }

    fn graph() -> InMemoryGraph {
        let mut g = InMemoryGraph::new();
        g.insert_entity(entity("Alice", &["c1", "c2", "c3"]))
            .insert_entity(entity("Bob", &[]))
            .insert_entity(entity("TechCorp", &[]))
            .insert_entity(entity("ML", &[]))
            .insert_relationship(edge("Alice", "TechCorp", 0.9))
            .insert_relationship(edge("Alice", "ML", 0.4))
            .insert_relationship(edge("Bob", "Alice", 0.5))
            .insert_relationship(edge("TechCorp", "Alice", 0.2))
            .insert_relationship(edge("Alice", "Alice", 0.6))
            .insert_chunk(chunk("c1", "d1", 0, "a.md"))
            .insert_chunk(chunk("c2", "d1", 1, "a.md"))
            .insert_chunk(chunk("c3", "d2", 0, "b.md"));
        g
    }

    /// Wraps a graph, counting relation and chunk reads, optionally failing them.
    struct Probe {
        inner: InMemoryGraph,
        fail_graph: bool,
        fail_chunks: bool,
        graph_calls: AtomicUsize,
        chunk_calls: AtomicUsize,
    }

    impl Probe {
        fn new(inner: InMemoryGraph) -> Self {
            Self {
                inner,
                fail_graph: false,
                fail_chunks: false,
                graph_calls: AtomicUsize::new(0),
                chunk_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EntityStore for Probe {
        async fn get(&self, id: &str) -> anyhow::Result<Option<Entity>> {
            self.inner.get(id).await
        }

        async fn scan(
            &self,
            predicate: &(dyn for<'a> Fn(&'a Entity) -> bool + Send + Sync),
        ) -> anyhow::Result<Vec<Entity>> {
            self.inner.scan(predicate).await
        }

        async fn count(
            &self,
            predicate: &(dyn for<'a> Fn(&'a Entity) -> bool + Send + Sync),
        ) -> anyhow::Result<usize> {
            self.inner.count(predicate).await
        }
    }

    #[async_trait]
    impl RelationGraph for Probe {
        async fn edges_of(
            &self,
            entity_id: &str,
            direction: Direction,
        ) -> anyhow::Result<Vec<Relationship>> {
            self.graph_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_graph {
                return Err(anyhow!("graph backend unavailable"));
            }
            self.inner.edges_of(entity_id, direction).await
        }
    }

    #[async_trait]
    impl ChunkStore for Probe {
        async fn get_many(&self, ids: &[String]) -> anyhow::Result<Vec<Chunk>> {
            self.chunk_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_chunks {
                return Err(anyhow!("chunk backend unavailable"));
            }
            self.inner.get_many(ids).await
        }
    }

    fn aggregator(probe: Arc<Probe>) -> FullEntityAggregator {
        let relationships = Arc::new(RelationshipResolver::new(probe.clone(), probe.clone()));
        let documents = Arc::new(DocumentResolver::new(
            probe.clone(),
            probe.clone(),
            probe.clone(),
        ));
        FullEntityAggregator::new(probe, relationships, documents)
    }

    #[tokio::test]
    async fn test_full_view_with_statistics() {
        let probe = Arc::new(Probe::new(graph()));
        let agg = aggregator(probe);
        let view = agg
            .query(
                "Alice",
                &FullQueryOptions {
                    compute_related_entities: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(view.entity_id, "Alice");
        assert_eq!(view.entity.as_ref().unwrap().id, "Alice");
        let rels = view.relationships.as_ref().unwrap();
        let docs = view.documents.as_ref().unwrap();
        assert_eq!(docs.len(), 3);

        let stats = view.statistics.as_ref().unwrap();
        assert_eq!(stats.total_relationships, rels.total_count);
        assert_eq!(stats.incoming_relationships, rels.incoming.len());
        assert_eq!(stats.outgoing_relationships, rels.outgoing.len());
        let weights: Vec<f64> = rels.iter().map(|v| v.relationship.weight).collect();
        let mean = weights.iter().sum::<f64>() / weights.len() as f64;
        assert!((stats.avg_relationship_weight - mean).abs() < 1e-9);
        assert_eq!(stats.returned_chunks, 3);
        assert_eq!(stats.total_source_chunks, 3);
        assert_eq!(stats.unique_files, 2);
        assert_eq!(stats.unique_documents, 2);

        assert_eq!(
            view.related_entities.unwrap(),
            vec!["TechCorp", "ML", "Bob"]
        );
    }

    #[tokio::test]
    async fn test_missing_entity_issues_no_sub_fetch() {
        let probe = Arc::new(Probe::new(graph()));
        let agg = aggregator(probe.clone());
        let err = agg
            .query("Ghost", &FullQueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::NotFound(_)));
        assert_eq!(probe.graph_calls.load(Ordering::SeqCst), 0);
        assert_eq!(probe.chunk_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sub_fetch_failure_fails_whole_request() {
        let mut failing_chunks = Probe::new(graph());
        failing_chunks.fail_chunks = true;
        let err = aggregator(Arc::new(failing_chunks))
            .query("Alice", &FullQueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Internal(_)));
        assert!(err.to_string().contains("chunk backend unavailable"));

        let mut failing_graph = Probe::new(graph());
        failing_graph.fail_graph = true;
        let err = aggregator(Arc::new(failing_graph))
            .query("Alice", &FullQueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Internal(_)));
    }

    #[tokio::test]
    async fn test_disabled_sections_are_not_fetched() {
        let probe = Arc::new(Probe::new(graph()));
        let agg = aggregator(probe.clone());
        let view = agg
            .query(
                "Alice",
                &FullQueryOptions {
                    include_relationships: false,
                    include_documents: false,
                    include_statistics: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(view.entity.is_some());
        assert!(view.relationships.is_none());
        assert!(view.documents.is_none());
        assert!(view.statistics.is_none());
        assert!(view.related_entities.is_none());
        assert_eq!(probe.graph_calls.load(Ordering::SeqCst), 0);
        assert_eq!(probe.chunk_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_options_shape_sub_fetches() {
        let agg = aggregator(Arc::new(Probe::new(graph())));
        let view = agg
            .query(
                "Alice",
                &FullQueryOptions {
                    include_entity: false,
                    relationship_direction: Direction::Outgoing,
                    min_weight: 0.5,
                    max_chunks: 1,
                    compute_related_entities: true,
                    max_related_entities: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(view.entity.is_none());
        let rels = view.relationships.unwrap();
        assert!(rels.incoming.is_empty());
        // TechCorp 0.9 and the self-loop 0.6
        assert_eq!(rels.total_count, 2);
        assert_eq!(view.documents.unwrap().len(), 1);
        assert_eq!(view.related_entities.unwrap(), vec!["TechCorp"]);
    }

    #[tokio::test]
    async fn test_invalid_options_rejected_before_lookup() {
        let probe = Arc::new(Probe::new(graph()));
        let agg = aggregator(probe.clone());
        for bad in [
            FullQueryOptions {
                min_weight: -0.1,
                ..Default::default()
            },
            FullQueryOptions {
                max_relationships: Some(0),
                ..Default::default()
            },
            FullQueryOptions {
                max_chunks: 0,
                ..Default::default()
            },
            FullQueryOptions {
                max_related_entities: 0,
                ..Default::default()
            },
        ] {
            let err = agg.query("Ghost", &bad).await.unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(_)), "{:?}", bad);
        }
    }

    #[test]
    fn test_statistics_of_empty_sections() {
        let stats = compute_statistics(Some(&RelationshipSet::default()), Some(&[] as &[ChunkView]));
        assert_eq!(stats, EntityStatistics::default());
        assert_eq!(stats.avg_relationship_weight, 0.0);
    }
}
