//! Database layer for obratrack
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository pattern for queries
//! - Single-query subtree loading for the report engine

pub mod repo;
pub mod schema;

pub use repo::{format_ts, Database, ImportSummary, SubtreeRow};
