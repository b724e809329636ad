//! # Entity Query Core
//!
//! Read-only query layer over a knowledge graph of entities, weighted
//! directed relationships, and the document chunks they were extracted
//! from: data models, filter predicates, relevance ranking, store traits,
//! and the query engine.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! runtime-specific dependencies. Backends plug in through the traits in
//! [`store`]; [`store::memory::InMemoryGraph`] is the built-in one.
//!
//! ```text
//! EntityQueryEngine
//!  ├── EntityCatalog          list · search · types_summary · details
//!  ├── RelationshipResolver   relationships
//!  ├── DocumentResolver       documents
//!  └── FullEntityAggregator   full (relationships ∥ documents, then statistics)
//! ```

pub mod aggregate;
pub mod catalog;
pub mod documents;
pub mod engine;
pub mod error;
pub mod filters;
pub mod models;
pub mod ranking;
pub mod relationships;
pub mod store;

pub use engine::{EntityQueryEngine, QueryDefaults};
pub use error::{ErrorKind, QueryError, Result};
pub use store::Stores;
