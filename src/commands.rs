//! CLI entry points for the query commands.
//!
//! Each `run_*` function builds a request from command-line arguments, runs
//! it against the SQLite-backed engine under the configured timeout, and
//! prints the result. `list`, `search`, and `types` print tables; the rest
//! print pretty JSON.

use anyhow::{anyhow, Result};
use entity_query_core::filters::{
    DateRange, Direction, DocumentFilters, FullQueryOptions, ListRequest, RelationshipFilters,
    SortBy, SortOrder, WeightRange,
};
use entity_query_core::EntityQueryEngine;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::params::{parse_optional_date, split_list, DayBound};
use crate::sqlite_store::open_engine;

/// Arguments of `eqe list`.
#[derive(Debug, Default)]
pub struct ListArgs {
    pub types: Option<String>,
    pub name: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
}

/// Arguments of `eqe relationships`.
#[derive(Debug, Default)]
pub struct RelationshipArgs {
    pub direction: Option<String>,
    pub relation_types: Option<String>,
    pub related_types: Option<String>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
    pub keywords: Option<String>,
    pub files: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub limit: Option<i64>,
    pub offset: i64,
}

/// Arguments of `eqe documents`.
#[derive(Debug, Default)]
pub struct DocumentArgs {
    pub files: Option<String>,
    pub doc_ids: Option<String>,
    pub chunk_ids: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub max_chunks: Option<i64>,
    pub offset: i64,
    pub no_text: bool,
    pub no_metadata: bool,
}

/// Arguments of `eqe full`.
#[derive(Debug, Default)]
pub struct FullArgs {
    pub no_entity: bool,
    pub no_relationships: bool,
    pub no_documents: bool,
    pub no_statistics: bool,
    pub related: bool,
    pub direction: Option<String>,
    pub max_relationships: Option<i64>,
    pub min_weight: Option<f64>,
    pub max_chunks: Option<i64>,
    pub max_related: Option<i64>,
}

/// Run an engine call under the request deadline.
pub async fn with_timeout<T, E, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<anyhow::Error>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(anyhow!("request timed out after {}s", limit.as_secs())),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn list_request(engine: &EntityQueryEngine, args: ListArgs) -> Result<ListRequest> {
    let mut req = engine.defaults().list_request();
    req.type_filter = split_list(args.types.as_deref());
    req.name_substring = args.name.filter(|n| !n.trim().is_empty());
    if let Some(sort_by) = args.sort_by {
        req.sort_by = sort_by.parse::<SortBy>()?;
    }
    if let Some(order) = args.sort_order {
        req.sort_order = order.parse::<SortOrder>()?;
    }
    if let Some(limit) = args.limit {
        req.limit = limit;
    }
    req.offset = args.offset;
    Ok(req)
}

pub fn relationship_filters(args: RelationshipArgs) -> Result<RelationshipFilters> {
    let direction = match args.direction {
        Some(d) => d.parse::<Direction>()?,
        None => Direction::Both,
    };
    Ok(RelationshipFilters {
        direction,
        relation_types: split_list(args.relation_types.as_deref()),
        related_entity_types: split_list(args.related_types.as_deref()),
        weight_range: WeightRange {
            min: args.min_weight.unwrap_or(0.0),
            max: args.max_weight.unwrap_or(1.0),
        },
        keywords: split_list(args.keywords.as_deref()),
        file_paths: split_list(args.files.as_deref()),
        date_range: DateRange {
            from: parse_optional_date(args.since.as_deref(), DayBound::Start)?,
            to: parse_optional_date(args.until.as_deref(), DayBound::End)?,
        },
        limit: args.limit,
        offset: args.offset,
    })
}

pub fn document_filters(
    engine: &EntityQueryEngine,
    args: DocumentArgs,
) -> Result<DocumentFilters> {
    let defaults = engine.defaults().document_filters();
    Ok(DocumentFilters {
        file_paths: split_list(args.files.as_deref()),
        doc_ids: split_list(args.doc_ids.as_deref()),
        chunk_ids: split_list(args.chunk_ids.as_deref()),
        date_range: DateRange {
            from: parse_optional_date(args.since.as_deref(), DayBound::Start)?,
            to: parse_optional_date(args.until.as_deref(), DayBound::End)?,
        },
        max_chunks: args.max_chunks.unwrap_or(defaults.max_chunks),
        offset: args.offset,
        include_full_text: !args.no_text,
        include_metadata: !args.no_metadata,
    })
}

pub fn full_options(engine: &EntityQueryEngine, args: FullArgs) -> Result<FullQueryOptions> {
    let defaults = engine.defaults().full_options();
    let relationship_direction = match args.direction {
        Some(d) => d.parse::<Direction>()?,
        None => defaults.relationship_direction,
    };
    Ok(FullQueryOptions {
        include_entity: !args.no_entity,
        include_relationships: !args.no_relationships,
        include_documents: !args.no_documents,
        include_statistics: !args.no_statistics,
        compute_related_entities: args.related,
        relationship_direction,
        max_relationships: args.max_relationships,
        min_weight: args.min_weight.unwrap_or(defaults.min_weight),
        max_chunks: args.max_chunks.unwrap_or(defaults.max_chunks),
        max_related_entities: args.max_related.unwrap_or(defaults.max_related_entities),
    })
}

pub async fn run_list(config: &Config, args: ListArgs) -> Result<()> {
    let engine = open_engine(config).await?;
    let req = list_request(&engine, args)?;
    let page = with_timeout(config.query.timeout(), engine.list(&req)).await?;

    if page.entities.is_empty() {
        println!("No entities.");
        return Ok(());
    }

    println!("{:<32} {:<16} {:>7}   {}", "ENTITY", "TYPE", "SOURCES", "DESCRIPTION");
    println!("{}", "-".repeat(96));
    for e in &page.entities {
        println!(
            "{:<32} {:<16} {:>7}   {}",
            e.entity_id,
            e.entity_type,
            e.source_count,
            first_line(&e.description, 40)
        );
    }
    println!();
    println!(
        "showing {}-{} of {}{}",
        page.offset + 1,
        page.offset + page.returned_count as i64,
        page.total_count,
        if page.has_more { " (more available)" } else { "" }
    );
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    types: Option<String>,
    limit: Option<i64>,
) -> Result<()> {
    let engine = open_engine(config).await?;
    let mut req = engine.defaults().search_request(query);
    req.type_filter = split_list(types.as_deref());
    if let Some(limit) = limit {
        req.limit = limit;
    }
    let hits = with_timeout(config.query.timeout(), engine.search(&req)).await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} ({})",
            i + 1,
            hit.relevance_score,
            hit.entity_id,
            hit.entity_type
        );
        let desc = first_line(&hit.description, 80);
        if !desc.is_empty() {
            println!("    {}", desc);
        }
    }
    Ok(())
}

pub async fn run_types(config: &Config) -> Result<()> {
    let engine = open_engine(config).await?;
    let summary = with_timeout(config.query.timeout(), engine.types_summary()).await?;

    if summary.is_empty() {
        println!("No entities.");
        return Ok(());
    }

    println!("{:<32} {:>8}", "TYPE", "COUNT");
    println!("{}", "-".repeat(41));
    for (entity_type, count) in &summary {
        let label = if entity_type.is_empty() {
            "(untyped)"
        } else {
            entity_type
        };
        println!("{:<32} {:>8}", label, count);
    }
    Ok(())
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let engine = open_engine(config).await?;
    let entity = with_timeout(config.query.timeout(), engine.details(id)).await?;
    print_json(&entity)
}

pub async fn run_relationships(config: &Config, id: &str, args: RelationshipArgs) -> Result<()> {
    let engine = open_engine(config).await?;
    let filters = relationship_filters(args)?;
    let set = with_timeout(config.query.timeout(), engine.relationships(id, &filters)).await?;
    print_json(&set)
}

pub async fn run_documents(config: &Config, id: &str, args: DocumentArgs) -> Result<()> {
    let engine = open_engine(config).await?;
    let filters = document_filters(&engine, args)?;
    let chunks = with_timeout(config.query.timeout(), engine.documents(id, &filters)).await?;
    print_json(&chunks)
}

pub async fn run_full(config: &Config, id: &str, args: FullArgs) -> Result<()> {
    let engine = open_engine(config).await?;
    let options = full_options(&engine, args)?;
    let view = with_timeout(config.query.timeout(), engine.full(id, &options)).await?;
    print_json(&view)
}

/// First line of `text`, cut to `max` chars.
fn first_line(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.chars().count() > max {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
