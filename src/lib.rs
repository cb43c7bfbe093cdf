//! Job Tracker Analytics Library
//!
//! Aggregation and refresh coordination engine behind the job-application
//! dashboard. Raw user, application, goal and usage-event records go in;
//! derived metrics, a daily growth series, user segments and platform
//! insights come out.
//!
//! ## Core Features
//!
//! - **Single-flight refresh**: any number of dashboard surfaces can request a
//!   refresh; at most one fetch and computation pass runs at a time
//! - **Local and platform modes**: signed-out or offline sessions compute the
//!   same report shape from the local user's own records
//! - **Tolerant normalization**: malformed records are cleaned, never fatal
//! - **Portable export**: the cached report and refresh status serialize to a
//!   JSON document that round-trips bit-for-bit
//!
//! ## Architecture Overview
//!
//! - [`models`] - Raw and normalized records, derived output types
//! - [`normalizer`] - Raw record cleaning and the per-user index
//! - [`metrics`] - Pure metric calculators and platform insights
//! - [`timeseries`] - Daily growth series builder
//! - [`segments`] - User segmentation
//! - [`mode`] - Local/platform mode selection
//! - [`analyzer`] - Runs the full computation pass for one record set
//! - [`source`] - The [`DataSource`] trait and its file-backed implementation
//! - [`refresh`] - Refresh coordinator, status tracking and auto-refresh
//! - [`export`] - Export document serialization
//! - [`display`] - Terminal and JSON output
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jobtrack_analytics::mode::AuthState;
//! use jobtrack_analytics::refresh::{RefreshCoordinator, RefreshSettings};
//! use jobtrack_analytics::source::{InMemorySource, JsonDirSource};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let coordinator = RefreshCoordinator::new(
//!     Arc::new(JsonDirSource::new("data")),
//!     Arc::new(InMemorySource::default()),
//!     AuthState::signed_in("user-1", None),
//!     RefreshSettings::default(),
//! );
//!
//! let report = coordinator.request_refresh().await?;
//! println!("{} metrics", report.metrics.len());
//! # Ok(())
//! # }
//! ```

pub mod analyzer;
pub mod config;
pub mod display;
pub mod export;
pub mod logging;
pub mod metrics;
pub mod mode;
pub mod models;
pub mod normalizer;
pub mod refresh;
pub mod segments;
pub mod source;
pub mod timeseries;
pub mod timestamp_parser;

pub use analyzer::DashboardAnalyzer;
pub use export::ExportDocument;
pub use models::*;
pub use refresh::{RefreshCoordinator, RefreshSettings, RefreshStatus};
pub use source::{DataSource, SourceError};
