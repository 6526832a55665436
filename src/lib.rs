//! `brokerage-pipeline` moves the brokerage business's tabular datasets ("opportunities" and
//! "propositions") from a public file host into a DuckDB/MotherDuck warehouse, tagging every
//! row with lineage metadata.
//!
//! The primary entrypoint is [`pipeline::run`] (or [`pipeline::Pipeline::run`] for custom
//! wiring), driven by an explicit [`config::PipelineConfig`].
//!
//! ## What a run does
//!
//! - **Fetch**: one HTTP GET per source, no retries; the body is parsed as CSV with a header row
//!   and per-column type inference ([`types::DataType::Int64`], [`types::DataType::Float64`],
//!   [`types::DataType::Bool`], otherwise [`types::DataType::Utf8`]). Empty cells are
//!   [`types::Value::Null`].
//! - **Load**: after *all* sources are fetched, connect once, `CREATE SCHEMA IF NOT EXISTS`, then
//!   fully replace each destination table. Two columns are appended to every row:
//!   `_loaded_at` (the run timestamp, identical for every table of a run) and `_source_file`
//!   (the destination table name).
//! - **Verify**: the row count reported for each table is read back from the warehouse.
//! - **Release**: the warehouse connection is closed on every exit path.
//!
//! Each destination table is overwritten on every run; there is no append or history mode.
//!
//! ## Quick example
//!
//! ```no_run
//! use brokerage_pipeline::config::PipelineConfig;
//!
//! # fn main() -> Result<(), brokerage_pipeline::PipelineError> {
//! let config = PipelineConfig::from_env()?;
//! for record in brokerage_pipeline::pipeline::run(&config)? {
//!     println!("{} rows -> {}", record.rows, record.table);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: run configuration (sources, warehouse settings)
//! - [`ingestion`]: HTTP fetching and CSV parsing
//! - [`warehouse`]: connection lifecycle, schema creation, replace-loads
//! - [`pipeline`]: run orchestration, load records, observers
//! - [`types`]: in-memory dataset types
//! - [`error`]: error types used across the crate

pub mod config;
pub mod error;
pub mod ingestion;
pub mod pipeline;
pub mod types;
pub mod warehouse;

pub use error::{ErrorKind, IngestionError, IngestionResult, PipelineError, PipelineResult};
