//! # Split Catalog
//!
//! A local metacard catalog that partitions records across collections and
//! queries them as one.
//!
//! Writes are routed by configurable rules (tag, metacard type, attribute
//! value) to per-collection SQLite tables; queries go through an alias view
//! over every table; real-time gets fan out to each collection and are
//! merged. Routing, provisioning and merging live in
//! [`split_catalog_core`]; this crate supplies the SQLite backend,
//! configuration, ingestion and the `catalog` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌────────────────────┐
//! │ JSON files  │──▶│ Router rules │──▶│ SQLite mc_<name>   │
//! │ (ingest)    │   │ + registry   │   │ tables + alias view│
//! └─────────────┘   └──────────────┘   └─────────┬──────────┘
//!                                                │
//!                                                ▼
//!                                          ┌──────────┐
//!                                          │   CLI    │
//!                                          │(catalog) │
//!                                          └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite collections, alias view, factory |
//! | [`catalog`] | Router assembly from configuration |
//! | [`ingest`] | Filesystem ingestion of JSON metacards |
//! | [`query`] | Query and real-time get commands |
//! | [`modify`] | Update and delete commands |
//! | [`collections`] | Collection listing and rule dry-runs |

pub mod catalog;
pub mod collections;
pub mod config;
pub mod db;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod modify;
pub mod query;
pub mod sqlite_store;
