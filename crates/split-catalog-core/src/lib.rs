//! # Split Catalog Core
//!
//! Backend-agnostic logic for Split Catalog: metacard models, request and
//! response shapes, collection-assignment rules, the collection registry,
//! the request router, and the real-time-get result merger.
//!
//! This crate carries no database or filesystem dependencies. Backends plug
//! in through the [`store::CatalogStore`] and [`store::StoreFactory`] traits;
//! an in-memory backend ships in [`store::memory`].
//!
//! ## Request flow
//!
//! ```text
//!  CreateRequest ──▶ RuleSet::resolve ──▶ split per collection
//!                                              │
//!                    ┌─────────────────────────┼──────────────────┐
//!                    ▼                         ▼                  ▼
//!              ┌───────────┐            ┌───────────┐      ┌───────────┐
//!              │ default   │            │ history   │  …   │ workspace │
//!              └─────┬─────┘            └─────┬─────┘      └─────┬─────┘
//!                    └──────────────┬─────────┴──────────────────┘
//!                                   ▼
//!                        alias view (normal queries)
//! ```

pub mod error;
pub mod filter;
pub mod merge;
pub mod models;
pub mod operations;
pub mod registry;
pub mod router;
pub mod rules;
pub mod store;
