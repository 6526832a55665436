//! Source ingestion: fetching raw text from a remote location and parsing it.
//!
//! - [`fetch`]: the HTTP [`HttpFetcher`] used by the pipeline
//! - [`csv`]: delimited-text parsing into a [`crate::types::DataSet`] with inferred column types

pub mod csv;
pub mod fetch;

pub use fetch::HttpFetcher;
