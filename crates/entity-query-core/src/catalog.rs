//! Entity listing, search, type summary, and lookup.
//!
//! All four operations read only from the [`EntityStore`]. Listing filters
//! through [`ListRequest::matches`], search ranks with
//! [`ranking::relevance_score`](crate::ranking::relevance_score).

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::filters::{type_matches, ListRequest, SearchRequest, SortBy, SortOrder};
use crate::models::{
    source_count, Entity, EntityPage, EntitySearchResult, EntitySummary, TypeSummary,
};
use crate::ranking;
use crate::store::EntityStore;

pub struct EntityCatalog {
    entities: Arc<dyn EntityStore>,
}

impl EntityCatalog {
    pub fn new(entities: Arc<dyn EntityStore>) -> Self {
        Self { entities }
    }

    /// Filter, sort, then paginate entities.
    pub async fn list(&self, req: &ListRequest) -> Result<EntityPage> {
        req.validate()?;

        let mut matched = self.entities.scan(&|e: &Entity| req.matches(e)).await?;
        sort_entities(&mut matched, req.sort_by, req.sort_order);

        let total_count = matched.len();
        // validated non-negative above
        let offset = req.offset as usize;
        let limit = req.limit as usize;
        let entities: Vec<EntitySummary> = matched
            .iter()
            .skip(offset)
            .take(limit)
            .map(EntitySummary::from_entity)
            .collect();
        let returned_count = entities.len();

        tracing::debug!(
            total_count,
            returned_count,
            offset = req.offset,
            "listed entities"
        );

        Ok(EntityPage {
            entities,
            total_count,
            returned_count,
            offset: req.offset,
            limit: req.limit,
            has_more: offset + returned_count < total_count,
        })
    }

    /// Rank entities by how well their id matches the query.
    ///
    /// Results are ordered by score (desc) then id (asc), and anything under
    /// [`ranking::INCLUSION_THRESHOLD`] is left out.
    pub async fn search(&self, req: &SearchRequest) -> Result<Vec<EntitySearchResult>> {
        req.validate()?;

        let type_filter = req.type_filter.as_deref();
        let candidates = self
            .entities
            .scan(&|e: &Entity| type_matches(&e.entity_type, type_filter))
            .await?;

        let query = req.query.trim();
        let mut results: Vec<EntitySearchResult> = candidates
            .into_iter()
            .filter_map(|entity| {
                let score = ranking::relevance_score(&entity.id, query);
                if !ranking::is_relevant(score) {
                    return None;
                }
                Some(EntitySearchResult {
                    source_count: source_count(&entity),
                    entity_id: entity.id,
                    entity_type: entity.entity_type,
                    description: entity.description,
                    relevance_score: score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        results.truncate(req.limit as usize);

        tracing::debug!(query, hits = results.len(), "entity search");
        Ok(results)
    }

    /// Count entities per type in one pass.
    pub async fn types_summary(&self) -> Result<TypeSummary> {
        let all = self.entities.scan(&|_: &Entity| true).await?;
        let mut summary = TypeSummary::new();
        for entity in all {
            *summary.entry(entity.entity_type).or_insert(0) += 1;
        }
        Ok(summary)
    }

    pub async fn get(&self, id: &str) -> Result<Entity> {
        match self.entities.get(id).await? {
            Some(entity) => Ok(entity),
            None => {
                tracing::warn!(entity_id = id, "entity not found");
                Err(QueryError::entity_not_found(id))
            }
        }
    }

    /// Total number of stored entities.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.entities.count(&|_: &Entity| true).await?)
    }
}

/// Sort by the requested key; ties always fall back to id ascending.
fn sort_entities(entities: &mut [Entity], sort_by: SortBy, order: SortOrder) {
    entities.sort_by(|a, b| {
        let primary = match sort_by {
            SortBy::Id => a.id.cmp(&b.id),
            SortBy::Type => a.entity_type.cmp(&b.entity_type),
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });
}
