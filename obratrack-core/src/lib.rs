//! # obratrack-core
//!
//! Core library for obratrack - construction project progress reporting.
//!
//! This library provides:
//! - Domain types for the level tree (obra → building → floor → task),
//!   materials and photos
//! - Database storage layer with SQLite
//! - The obra report engine (progress tree, task KPIs, completion trends)
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use obratrack_core::report::{ReportRange, ReportService};
//! use obratrack_core::{Config, Database};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let service = ReportService::new(Arc::new(db), config.report.clone());
//! let range = ReportRange::parse("2024-06-01", "2024-06-30").expect("invalid range");
//! let report = service.generate(1, &range).expect("report failed");
//! println!("{}", serde_json::to_string_pretty(&report).unwrap());
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use report::{ObraReport, ReportRange, ReportService};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod report;
pub mod types;
