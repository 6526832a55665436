//! Run configuration.
//!
//! Everything the pipeline needs is carried by an explicit [`PipelineConfig`] built once at the
//! entry point (from the environment or a JSON file) and passed down; nothing below this module
//! reads the environment.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Default location of the opportunities sample dataset.
pub const DEFAULT_OPPORTUNITIES_URL: &str = "https://raw.githubusercontent.com/BlackRock2308/response-test-technique-meilleurtaux/refs/heads/main/data_sources/data_samples/opportunity_test.csv";
/// Default location of the propositions sample dataset.
pub const DEFAULT_PROPOSITIONS_URL: &str = "https://raw.githubusercontent.com/BlackRock2308/response-test-technique-meilleurtaux/refs/heads/main/data_sources/data_samples/propositions_test.csv";
/// Default warehouse database.
pub const DEFAULT_DATABASE_NAME: &str = "immobilier_courtage";
/// Default destination schema for raw tables.
pub const DEFAULT_SCHEMA: &str = "source";

/// One dataset to ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Logical name, e.g. `opportunities`.
    pub name: String,
    /// Retrieval URL.
    pub location: String,
    /// Destination table (unqualified), e.g. `raw_opportunities`.
    pub table: String,
}

impl SourceDescriptor {
    /// Create a descriptor.
    pub fn new(name: impl Into<String>, location: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            table: table.into(),
        }
    }

    /// Descriptor whose destination table follows the `raw_<name>` convention.
    pub fn raw(name: impl Into<String>, location: impl Into<String>) -> Self {
        let name = name.into();
        let table = format!("raw_{name}");
        Self::new(name, location, table)
    }
}

/// Where the DuckDB backend writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum WarehouseTarget {
    /// MotherDuck cloud database named by [`WarehouseSettings::database`].
    MotherDuck,
    /// A local DuckDB database file.
    LocalFile(PathBuf),
    /// A throwaway in-process database.
    InMemory,
}

/// Warehouse connection settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseSettings {
    /// Database name, used for MotherDuck and in error messages.
    pub database: String,
    /// Access token. Required for [`WarehouseTarget::MotherDuck`].
    #[serde(skip_serializing, default)]
    pub token: Option<String>,
    /// Backend target.
    #[serde(default = "default_target")]
    pub target: WarehouseTarget,
}

fn default_target() -> WarehouseTarget {
    WarehouseTarget::MotherDuck
}

impl WarehouseSettings {
    /// MotherDuck settings for `database`.
    pub fn motherduck(database: impl Into<String>, token: Option<String>) -> Self {
        Self {
            database: database.into(),
            token,
            target: WarehouseTarget::MotherDuck,
        }
    }

    /// Local DuckDB file settings.
    pub fn local_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            database: path.display().to_string(),
            token: None,
            target: WarehouseTarget::LocalFile(path),
        }
    }

    /// In-memory DuckDB settings.
    pub fn in_memory() -> Self {
        Self {
            database: ":memory:".to_string(),
            token: None,
            target: WarehouseTarget::InMemory,
        }
    }
}

impl fmt::Debug for WarehouseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseSettings")
            .field("database", &self.database)
            .field("token_set", &self.token.as_deref().is_some_and(|t| !t.is_empty()))
            .field("target", &self.target)
            .finish()
    }
}

/// Complete configuration of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sources, loaded in this order.
    pub sources: Vec<SourceDescriptor>,
    /// Warehouse connection settings.
    pub warehouse: WarehouseSettings,
    /// Destination schema for every table.
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Per-request HTTP timeout in seconds; unset means no timeout.
    #[serde(default)]
    pub http_timeout_secs: Option<u64>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

impl PipelineConfig {
    /// The two default sources, in load order.
    pub fn default_sources() -> Vec<SourceDescriptor> {
        vec![
            SourceDescriptor::raw("opportunities", DEFAULT_OPPORTUNITIES_URL),
            SourceDescriptor::raw("propositions", DEFAULT_PROPOSITIONS_URL),
        ]
    }

    /// Build the configuration from process environment variables.
    ///
    /// Recognized variables: `GITHUB_OPPORTUNITIES_URL`, `GITHUB_PROPOSITIONS_URL`,
    /// `DATABASE_NAME`, `MOTHERDUCK_TOKEN`, `WAREHOUSE_SCHEMA`, `LOCAL_DUCKDB_PATH`,
    /// `HTTP_TIMEOUT_SECS`.
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sources = vec![
            SourceDescriptor::raw(
                "opportunities",
                var("GITHUB_OPPORTUNITIES_URL").unwrap_or_else(|| DEFAULT_OPPORTUNITIES_URL.to_string()),
            ),
            SourceDescriptor::raw(
                "propositions",
                var("GITHUB_PROPOSITIONS_URL").unwrap_or_else(|| DEFAULT_PROPOSITIONS_URL.to_string()),
            ),
        ];

        let warehouse = match var("LOCAL_DUCKDB_PATH") {
            Some(path) => WarehouseSettings::local_file(path),
            None => WarehouseSettings::motherduck(
                var("DATABASE_NAME").unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
                lookup("MOTHERDUCK_TOKEN"),
            ),
        };

        let http_timeout_secs = match var("HTTP_TIMEOUT_SECS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|e| PipelineError::Config {
                message: format!("HTTP_TIMEOUT_SECS='{raw}' is not a whole number of seconds: {e}"),
            })?),
            None => None,
        };

        Ok(Self {
            sources,
            warehouse,
            schema: var("WAREHOUSE_SCHEMA").unwrap_or_else(default_schema),
            http_timeout_secs,
        })
    }

    /// Read the configuration from a JSON file.
    ///
    /// The token is never stored in the file; if the file leaves it out, `MOTHERDUCK_TOKEN`
    /// from the environment is used.
    pub fn from_json_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let mut config: Self = serde_json::from_str(&text).map_err(|e| PipelineError::Config {
            message: format!("cannot parse {}: {e}", path.display()),
        })?;
        if config.warehouse.token.is_none() {
            config.warehouse.token = std::env::var("MOTHERDUCK_TOKEN").ok();
        }
        Ok(config)
    }

    /// The HTTP timeout as a [`Duration`].
    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }
}
