//! # Entity Query
//!
//! Read-only queries over a knowledge graph of entities, weighted
//! relationships, and the text chunks they were extracted from.
//!
//! The query logic lives in [`entity_query_core`]; this crate supplies the
//! SQLite store, the `eqe` CLI, and the HTTP server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ eqe import   │──▶│  SQLite          │◀──│ SqliteStore  │
//! │ (snapshot)   │   │ entities/rels/   │   │ (store impl) │
//! └──────────────┘   │ chunks           │   └──────┬───────┘
//!                    └──────────────────┘          │
//!                                      ┌───────────┴───────┐
//!                                      │ EntityQueryEngine │
//!                                      └─────────┬─────────┘
//!                             ┌──────────────────┤
//!                             ▼                  ▼
//!                        ┌──────────┐      ┌──────────┐
//!                        │   CLI    │      │   HTTP   │
//!                        │  (eqe)   │      │  (axum)  │
//!                        └──────────┘      └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`import`] | Snapshot loading |
//! | [`sqlite_store`] | Store traits over SQLite |
//! | [`params`] | Shared parameter parsing |
//! | [`commands`] | CLI query commands |
//! | [`server`] | HTTP server |
//! | [`logging`] | Tracing subscriber setup |

pub mod commands;
pub mod config;
pub mod db;
pub mod import;
pub mod logging;
pub mod migrate;
pub mod params;
pub mod server;
pub mod sqlite_store;
