//! Filter configurations and the predicates that evaluate them.
//!
//! Every engine operation takes one closed request value from this module.
//! String-typed knobs (`direction`, `sort_by`, `sort_order`) are parsed into
//! tagged variants once, at the boundary, through [`FromStr`].
//!
//! # Matching rules
//!
//! Filter categories combine with AND. Within a category that lists several
//! values, any one value matching is enough (OR). A category given as an
//! empty list behaves as if it were absent.
//!
//! | Category | Record field | Comparison |
//! |----------|--------------|------------|
//! | weight range | `weight` | inclusive bounds |
//! | relation types | `relation_type`, `keywords` | type equality or keyword substring, case-insensitive |
//! | keywords | `description`, `keywords` | substring, case-insensitive |
//! | file paths | `file_paths` / `file_path` | exact |
//! | doc ids, chunk ids | `doc_id`, `id` | exact |
//! | date range | `created_at` / `timestamp` | inclusive bounds; undated records pass |
//! | related entity types | neighbour's `entity_type` | equality, case-insensitive |

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::models::{Chunk, EdgeSide, Entity, Relationship};

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;
pub const DEFAULT_MAX_CHUNKS: i64 = 100;
pub const DEFAULT_MAX_RELATED_ENTITIES: i64 = 50;

/// Which incident edges a relationship query considers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    #[default]
    Both,
}

impl Direction {
    pub fn includes(self, side: EdgeSide) -> bool {
        match (self, side) {
            (Direction::Both, _) => true,
            (Direction::Incoming, EdgeSide::Incoming) => true,
            (Direction::Outgoing, EdgeSide::Outgoing) => true,
            _ => false,
        }
    }
}

impl FromStr for Direction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            "both" => Ok(Direction::Both),
            other => Err(QueryError::invalid(format!(
                "unknown direction '{}'. Use incoming, outgoing, or both.",
                other
            ))),
        }
    }
}

/// Sort key for entity listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Id,
    Type,
    CreatedAt,
}

impl FromStr for SortBy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" | "entity_id" => Ok(SortBy::Id),
            "type" | "entity_type" => Ok(SortBy::Type),
            "created_at" | "timestamp" => Ok(SortBy::CreatedAt),
            other => Err(QueryError::invalid(format!(
                "unknown sort_by '{}'. Use id, type, or created_at.",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(QueryError::invalid(format!(
                "unknown sort_order '{}'. Use asc or desc.",
                other
            ))),
        }
    }
}

/// Inclusive weight bounds, both within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRange {
    pub min: f64,
    pub max: f64,
}

impl Default for WeightRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl WeightRange {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min) {
            return Err(QueryError::invalid("min_weight must be between 0.0 and 1.0"));
        }
        if !(0.0..=1.0).contains(&self.max) {
            return Err(QueryError::invalid("max_weight must be between 0.0 and 1.0"));
        }
        if self.min > self.max {
            return Err(QueryError::invalid(
                "min_weight cannot be greater than max_weight",
            ));
        }
        Ok(())
    }

    pub fn contains(&self, weight: f64) -> bool {
        weight >= self.min && weight <= self.max
    }
}

/// Inclusive Unix-second bounds. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl DateRange {
    pub fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(QueryError::invalid("date_from cannot be after date_to"));
            }
        }
        Ok(())
    }

    /// Records without a timestamp are never excluded by a date range.
    pub fn admits(&self, timestamp: Option<i64>) -> bool {
        let Some(ts) = timestamp else {
            return true;
        };
        self.from.is_none_or(|from| ts >= from) && self.to.is_none_or(|to| ts <= to)
    }
}

/// Input of the `list` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub type_filter: Option<Vec<String>>,
    pub name_substring: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            type_filter: None,
            name_substring: None,
            sort_by: SortBy::default(),
            sort_order: SortOrder::default(),
            limit: DEFAULT_LIST_LIMIT,
            offset: 0,
        }
    }
}

impl ListRequest {
    pub fn validate(&self) -> Result<()> {
        validate_limit("limit", self.limit)?;
        validate_offset(self.offset)
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        type_matches(&entity.entity_type, self.type_filter.as_deref())
            && self.name_substring.as_deref().is_none_or(|needle| {
                entity.id.to_lowercase().contains(&needle.to_lowercase())
            })
    }
}

/// Input of the `search` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub type_filter: Option<Vec<String>>,
    pub limit: i64,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            type_filter: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(QueryError::invalid("query must not be empty"));
        }
        validate_limit("limit", self.limit)
    }
}

/// Input of the `relationships` operation.
///
/// Pagination is applied to each direction on its own: with
/// [`Direction::Both`], incoming and outgoing are each sliced to
/// `[offset, offset + limit)`, so up to `2 * limit` relationships can come
/// back. There is no combined budget across the two sides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipFilters {
    pub direction: Direction,
    pub relation_types: Option<Vec<String>>,
    pub related_entity_types: Option<Vec<String>>,
    pub weight_range: WeightRange,
    pub keywords: Option<Vec<String>>,
    pub file_paths: Option<Vec<String>>,
    pub date_range: DateRange,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl RelationshipFilters {
    pub fn validate(&self) -> Result<()> {
        self.weight_range.validate()?;
        self.date_range.validate()?;
        if let Some(limit) = self.limit {
            validate_limit("limit", limit)?;
        }
        validate_offset(self.offset)
    }

    /// Every category except related-entity types, which needs a store lookup.
    pub fn matches(&self, rel: &Relationship) -> bool {
        self.weight_range.contains(rel.weight)
            && relation_type_matches(rel, active(&self.relation_types))
            && keywords_match(rel, active(&self.keywords))
            && active(&self.file_paths)
                .is_none_or(|wanted| wanted.iter().any(|fp| rel.file_paths.contains(fp)))
            && self.date_range.admits(rel.created_at)
    }

    /// Active related-entity type filter, if any.
    pub fn neighbor_types(&self) -> Option<&[String]> {
        active(&self.related_entity_types)
    }
}

/// Input of the `documents` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFilters {
    pub file_paths: Option<Vec<String>>,
    pub doc_ids: Option<Vec<String>>,
    pub chunk_ids: Option<Vec<String>>,
    pub date_range: DateRange,
    pub max_chunks: i64,
    pub offset: i64,
    pub include_full_text: bool,
    pub include_metadata: bool,
}

impl Default for DocumentFilters {
    fn default() -> Self {
        Self {
            file_paths: None,
            doc_ids: None,
            chunk_ids: None,
            date_range: DateRange::default(),
            max_chunks: DEFAULT_MAX_CHUNKS,
            offset: 0,
            include_full_text: true,
            include_metadata: true,
        }
    }
}

impl DocumentFilters {
    pub fn validate(&self) -> Result<()> {
        validate_limit("max_chunks", self.max_chunks)?;
        validate_offset(self.offset)?;
        self.date_range.validate()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        active(&self.file_paths).is_none_or(|wanted| wanted.contains(&chunk.file_path))
            && active(&self.doc_ids).is_none_or(|wanted| wanted.contains(&chunk.doc_id))
            && active(&self.chunk_ids).is_none_or(|wanted| wanted.contains(&chunk.id))
            && self.date_range.admits(chunk.timestamp)
    }
}

/// Options of the `full` operation.
#[derive(Debug, Clone, PartialEq)]
pub struct FullQueryOptions {
    pub include_entity: bool,
    pub include_relationships: bool,
    pub include_documents: bool,
    pub include_statistics: bool,
    pub compute_related_entities: bool,
    pub relationship_direction: Direction,
    pub max_relationships: Option<i64>,
    pub min_weight: f64,
    pub max_chunks: i64,
    pub max_related_entities: i64,
}

impl Default for FullQueryOptions {
    fn default() -> Self {
        Self {
            include_entity: true,
            include_relationships: true,
            include_documents: true,
            include_statistics: true,
            compute_related_entities: false,
            relationship_direction: Direction::Both,
            max_relationships: None,
            min_weight: 0.0,
            max_chunks: DEFAULT_MAX_CHUNKS,
            max_related_entities: DEFAULT_MAX_RELATED_ENTITIES,
        }
    }
}

impl FullQueryOptions {
    pub fn validate(&self) -> Result<()> {
        self.relationship_filters().validate()?;
        self.document_filters().validate()?;
        validate_limit("max_related_entities", self.max_related_entities)
    }

    pub fn relationship_filters(&self) -> RelationshipFilters {
        RelationshipFilters {
            direction: self.relationship_direction,
            weight_range: WeightRange {
                min: self.min_weight,
                max: 1.0,
            },
            limit: self.max_relationships,
            ..RelationshipFilters::default()
        }
    }

    pub fn document_filters(&self) -> DocumentFilters {
        DocumentFilters {
            max_chunks: self.max_chunks,
            ..DocumentFilters::default()
        }
    }
}

/// Treat `Some(vec![])` the same as `None`.
fn active(values: &Option<Vec<String>>) -> Option<&[String]> {
    values.as_deref().filter(|v| !v.is_empty())
}

fn validate_limit(name: &str, value: i64) -> Result<()> {
    if value < 1 {
        return Err(QueryError::invalid(format!("{} must be at least 1", name)));
    }
    Ok(())
}

fn validate_offset(offset: i64) -> Result<()> {
    if offset < 0 {
        return Err(QueryError::invalid("offset cannot be negative"));
    }
    Ok(())
}

/// Case-insensitive OR-match of an entity type against a type filter.
pub fn type_matches(entity_type: &str, wanted: Option<&[String]>) -> bool {
    match wanted.filter(|w| !w.is_empty()) {
        None => true,
        Some(wanted) => wanted.iter().any(|t| t.eq_ignore_ascii_case(entity_type)),
    }
}

/// Related-entity type check for an edge's far endpoint.
///
/// A dangling neighbour (`None`) never satisfies an active filter.
pub fn neighbor_matches(neighbor: Option<&Entity>, wanted: Option<&[String]>) -> bool {
    match wanted.filter(|w| !w.is_empty()) {
        None => true,
        Some(wanted) => {
            neighbor.is_some_and(|entity| type_matches(&entity.entity_type, Some(wanted)))
        }
    }
}

fn relation_type_matches(rel: &Relationship, wanted: Option<&[String]>) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    wanted.iter().any(|rt| {
        let rt_lower = rt.to_lowercase();
        rel.relation_type
            .as_deref()
            .is_some_and(|t| t.to_lowercase() == rt_lower)
            || rel
                .keywords
                .iter()
                .any(|kw| kw.to_lowercase().contains(&rt_lower))
    })
}

fn keywords_match(rel: &Relationship, wanted: Option<&[String]>) -> bool {
    let Some(wanted) = wanted else {
        return true;
    };
    let description = rel.description.to_lowercase();
    let keywords: Vec<String> = rel.keywords.iter().map(|k| k.to_lowercase()).collect();
    wanted.iter().any(|kw| {
        let kw = kw.to_lowercase();
        description.contains(&kw) || keywords.iter().any(|k| k.contains(&kw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(weight: f64) -> Relationship {
        Relationship {
            source_id: "Alice".into(),
            target_id: "TechCorp".into(),
            relation_type: Some("works_at".into()),
            description: "Alice is an engineer at TechCorp".into(),
            keywords: vec!["employment".into(), "Engineering Team".into()],
            weight,
            source_chunk_ids: vec!["c1".into()],
            file_paths: vec!["hr/staff.md".into()],
            created_at: Some(1_700_000_000),
        }
    }

    fn chunk() -> Chunk {
        Chunk {
            id: "c1".into(),
            doc_id: "doc-1".into(),
            content: "text".into(),
            file_path: "notes/a.md".into(),
            order_index: 0,
            token_count: 1,
            timestamp: Some(100),
        }
    }

    fn strings(values: &[&str]) -> Option<Vec<String>> {
        Some(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn direction_parses_case_insensitively() {
        assert_eq!("INCOMING".parse::<Direction>().unwrap(), Direction::Incoming);
        assert_eq!(" both ".parse::<Direction>().unwrap(), Direction::Both);
        let err = "sideways".parse::<Direction>().unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }

    #[test]
    fn direction_includes_sides() {
        assert!(Direction::Both.includes(EdgeSide::Incoming));
        assert!(Direction::Both.includes(EdgeSide::Outgoing));
        assert!(Direction::Outgoing.includes(EdgeSide::Outgoing));
        assert!(!Direction::Outgoing.includes(EdgeSide::Incoming));
        assert!(!Direction::Incoming.includes(EdgeSide::Outgoing));
    }

    #[test]
    fn sort_knobs_parse_aliases_and_reject_unknown() {
        assert_eq!("entity_id".parse::<SortBy>().unwrap(), SortBy::Id);
        assert_eq!("entity_type".parse::<SortBy>().unwrap(), SortBy::Type);
        assert_eq!("timestamp".parse::<SortBy>().unwrap(), SortBy::CreatedAt);
        assert!("weight".parse::<SortBy>().is_err());
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Desc);
        assert!("down".parse::<SortOrder>().is_err());
    }

    #[test]
    fn weight_range_validation() {
        assert!(WeightRange::default().validate().is_ok());
        assert!(WeightRange { min: 0.6, max: 0.5 }.validate().is_err());
        assert!(WeightRange { min: -0.1, max: 0.5 }.validate().is_err());
        assert!(WeightRange { min: 0.0, max: 1.5 }.validate().is_err());
        assert!(WeightRange { min: 0.5, max: 0.5 }.validate().is_ok());
    }

    #[test]
    fn weight_bounds_are_inclusive() {
        let range = WeightRange { min: 0.4, max: 0.9 };
        assert!(range.contains(0.4));
        assert!(range.contains(0.9));
        assert!(!range.contains(0.39));
        assert!(!range.contains(0.91));
    }

    #[test]
    fn date_range_inclusive_and_undated_pass() {
        let range = DateRange {
            from: Some(10),
            to: Some(20),
        };
        assert!(range.admits(Some(10)));
        assert!(range.admits(Some(20)));
        assert!(!range.admits(Some(9)));
        assert!(!range.admits(Some(21)));
        assert!(range.admits(None));
        assert!(DateRange::default().admits(Some(i64::MIN)));
        assert!(DateRange {
            from: Some(5),
            to: Some(4)
        }
        .validate()
        .is_err());
    }

    #[test]
    fn relation_type_matches_type_or_keyword() {
        let r = rel(0.9);
        let by_type = RelationshipFilters {
            relation_types: strings(&["WORKS_AT"]),
            ..Default::default()
        };
        assert!(by_type.matches(&r));

        let by_keyword = RelationshipFilters {
            relation_types: strings(&["employ"]),
            ..Default::default()
        };
        assert!(by_keyword.matches(&r));

        let miss = RelationshipFilters {
            relation_types: strings(&["manages"]),
            ..Default::default()
        };
        assert!(!miss.matches(&r));
    }

    #[test]
    fn keywords_or_within_and_across_categories() {
        let r = rel(0.9);
        let any_of = RelationshipFilters {
            keywords: strings(&["nothing-here", "engineer"]),
            ..Default::default()
        };
        assert!(any_of.matches(&r));

        let keyword_field = RelationshipFilters {
            keywords: strings(&["engineering team"]),
            ..Default::default()
        };
        assert!(keyword_field.matches(&r));

        // keyword matches, file path does not: AND across categories fails
        let conjunctive = RelationshipFilters {
            keywords: strings(&["engineer"]),
            file_paths: strings(&["other.md"]),
            ..Default::default()
        };
        assert!(!conjunctive.matches(&r));
    }

    #[test]
    fn empty_category_is_no_filter() {
        let r = rel(0.9);
        let filters = RelationshipFilters {
            relation_types: Some(vec![]),
            keywords: Some(vec![]),
            file_paths: Some(vec![]),
            ..Default::default()
        };
        assert!(filters.matches(&r));
        assert!(filters.neighbor_types().is_none());
    }

    #[test]
    fn relationship_weight_and_date_filters() {
        let r = rel(0.4);
        let high = RelationshipFilters {
            weight_range: WeightRange { min: 0.5, max: 1.0 },
            ..Default::default()
        };
        assert!(!high.matches(&r));

        let late = RelationshipFilters {
            date_range: DateRange {
                from: Some(1_800_000_000),
                to: None,
            },
            ..Default::default()
        };
        assert!(!late.matches(&r));
    }

    #[test]
    fn relationship_filter_validation() {
        let bad_limit = RelationshipFilters {
            limit: Some(0),
            ..Default::default()
        };
        assert!(bad_limit.validate().is_err());
        let bad_offset = RelationshipFilters {
            offset: -1,
            ..Default::default()
        };
        assert!(bad_offset.validate().is_err());
        assert!(RelationshipFilters::default().validate().is_ok());
    }

    #[test]
    fn neighbor_type_filter() {
        let org = Entity {
            id: "TechCorp".into(),
            entity_type: "Organization".into(),
            description: String::new(),
            source_chunk_ids: vec![],
            file_paths: vec![],
            created_at: None,
            updated_at: None,
        };
        let wanted = vec!["organization".to_string()];
        assert!(neighbor_matches(Some(&org), Some(wanted.as_slice())));
        assert!(!neighbor_matches(None, Some(wanted.as_slice())));
        assert!(neighbor_matches(None, None));
        let people = vec!["person".to_string()];
        assert!(!neighbor_matches(Some(&org), Some(people.as_slice())));
    }

    #[test]
    fn chunk_filters() {
        let c = chunk();
        assert!(DocumentFilters::default().matches(&c));

        let by_path = DocumentFilters {
            file_paths: strings(&["x.md", "notes/a.md"]),
            ..Default::default()
        };
        assert!(by_path.matches(&c));

        let wrong_doc = DocumentFilters {
            doc_ids: strings(&["doc-2"]),
            ..Default::default()
        };
        assert!(!wrong_doc.matches(&c));

        let by_chunk = DocumentFilters {
            chunk_ids: strings(&["c1"]),
            date_range: DateRange {
                from: Some(100),
                to: Some(100),
            },
            ..Default::default()
        };
        assert!(by_chunk.matches(&c));
    }

    #[test]
    fn document_filter_validation() {
        let zero = DocumentFilters {
            max_chunks: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        let negative = DocumentFilters {
            offset: -3,
            ..Default::default()
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn list_request_matches_type_and_name() {
        let alice = Entity {
            id: "Alice".into(),
            entity_type: "person".into(),
            description: String::new(),
            source_chunk_ids: vec![],
            file_paths: vec![],
            created_at: None,
            updated_at: None,
        };
        let req = ListRequest {
            type_filter: strings(&["organization", "PERSON"]),
            name_substring: Some("LIC".into()),
            ..Default::default()
        };
        assert!(req.matches(&alice));
        let miss = ListRequest {
            name_substring: Some("bob".into()),
            ..Default::default()
        };
        assert!(!miss.matches(&alice));
    }

    #[test]
    fn list_and_search_validation() {
        assert!(ListRequest {
            limit: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(ListRequest {
            offset: -1,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(SearchRequest::new("   ").validate().is_err());
        assert!(SearchRequest::new("Ali").validate().is_ok());
    }

    #[test]
    fn full_options_derive_sub_filters() {
        let opts = FullQueryOptions {
            relationship_direction: Direction::Outgoing,
            max_relationships: Some(5),
            min_weight: 0.3,
            max_chunks: 7,
            ..Default::default()
        };
        let rf = opts.relationship_filters();
        assert_eq!(rf.direction, Direction::Outgoing);
        assert_eq!(rf.limit, Some(5));
        assert_eq!(rf.weight_range, WeightRange { min: 0.3, max: 1.0 });
        assert_eq!(opts.document_filters().max_chunks, 7);
        assert!(opts.validate().is_ok());

        let bad = FullQueryOptions {
            min_weight: 1.2,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
