//! Pipeline orchestration.
//!
//! A run fetches every configured source first and only then opens the warehouse and loads them,
//! in order:
//!
//! 1. fix the [`RunTimestamp`] (shared by every table of the run)
//! 2. fetch + parse each source; the first failure aborts the run before the warehouse is touched
//! 3. connect, ensure the destination schema
//! 4. replace-load each dataset; the first failure aborts the remaining loads
//! 5. close the connection, whatever happened in 3 and 4
//!
//! Nothing is retried. Failures propagate to the caller, which decides whether to retry or
//! alert.

pub mod observability;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Serialize, Serializer};
use tracing::info;

use crate::config::{PipelineConfig, SourceDescriptor};
use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::HttpFetcher;
use crate::types::DataSet;
use crate::warehouse::{DuckDbWarehouse, TableRef, WarehouseBackend, WarehouseConnection, WarehouseGateway};

pub use observability::{
    CompositeObserver, FileObserver, PipelineObserver, PipelineSeverity, TracingObserver, severity_for_error,
};

/// Wall-clock time fixed once per run and written to every loaded row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunTimestamp(NaiveDateTime);

impl RunTimestamp {
    /// Format used in the `_loaded_at` column.
    pub const FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Current local time, truncated to whole seconds.
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    /// Wrap an explicit timestamp (sub-second precision is dropped).
    pub fn from_naive(ts: NaiveDateTime) -> Self {
        Self(ts.with_nanosecond(0).unwrap_or(ts))
    }

    /// The wrapped timestamp.
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for RunTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

impl Serialize for RunTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of one destination-table load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadRecord {
    /// Logical source name.
    pub source: String,
    /// Destination table.
    pub table: String,
    /// Row count read back from the warehouse after the load.
    pub rows: u64,
    /// Run timestamp the rows were tagged with.
    pub loaded_at: RunTimestamp,
}

/// Options controlling run reporting.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn PipelineObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: PipelineSeverity,
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            observer: None,
            alert_at_or_above: PipelineSeverity::Critical,
        }
    }
}

/// The extract-load pipeline.
#[derive(Debug)]
pub struct Pipeline<B: WarehouseBackend> {
    fetcher: HttpFetcher,
    gateway: WarehouseGateway<B>,
    schema: String,
    options: PipelineOptions,
}

impl Pipeline<DuckDbWarehouse> {
    /// Build the production pipeline (HTTP fetcher, DuckDB/MotherDuck backend) from `config`.
    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        let fetcher = HttpFetcher::new(config.http_timeout())?;
        let gateway = WarehouseGateway::new(DuckDbWarehouse, config.warehouse.clone());
        Ok(Self::new(fetcher, gateway, config.schema.clone()))
    }
}

impl<B: WarehouseBackend> Pipeline<B> {
    /// Create a pipeline loading into `schema`.
    pub fn new(fetcher: HttpFetcher, gateway: WarehouseGateway<B>, schema: impl Into<String>) -> Self {
        Self {
            fetcher,
            gateway,
            schema: schema.into(),
            options: PipelineOptions::default(),
        }
    }

    /// Replace the reporting options.
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// The gateway loads go through.
    pub fn gateway(&self) -> &WarehouseGateway<B> {
        &self.gateway
    }

    /// Run the pipeline over `sources` with a fresh [`RunTimestamp`].
    ///
    /// Returns one [`LoadRecord`] per source, in source order.
    pub fn run(&self, sources: &[SourceDescriptor]) -> PipelineResult<Vec<LoadRecord>> {
        self.run_at(sources, RunTimestamp::now())
    }

    /// Run the pipeline with an explicit run timestamp.
    pub fn run_at(&self, sources: &[SourceDescriptor], run_timestamp: RunTimestamp) -> PipelineResult<Vec<LoadRecord>> {
        let result = self.run_inner(sources, &run_timestamp);
        match &result {
            Ok(records) => info!(
                tables = records.len(),
                rows = records.iter().map(|r| r.rows).sum::<u64>(),
                run_timestamp = %run_timestamp,
                "extract-load run finished"
            ),
            Err(e) => self.report_failure(e),
        }
        result
    }

    fn run_inner(&self, sources: &[SourceDescriptor], run_timestamp: &RunTimestamp) -> PipelineResult<Vec<LoadRecord>> {
        validate_sources(sources)?;
        if sources.is_empty() {
            info!("no sources configured, nothing to load");
            return Ok(Vec::new());
        }
        info!(sources = sources.len(), run_timestamp = %run_timestamp, "starting extract-load run");

        let mut fetched: Vec<(&SourceDescriptor, DataSet)> = Vec::with_capacity(sources.len());
        for source in sources {
            let dataset = self.fetcher.fetch(&source.location)?;
            if let Some(obs) = self.options.observer.as_ref() {
                obs.on_fetched(source, dataset.row_count());
            }
            fetched.push((source, dataset));
        }
        info!(
            datasets = fetched.len(),
            rows = fetched.iter().map(|(_, ds)| ds.row_count()).sum::<usize>(),
            "all sources downloaded"
        );

        let mut conn = WarehouseConnection::unconnected(self.gateway.settings().database.clone());
        let result = self.load_all(&mut conn, fetched, run_timestamp);
        conn.close();
        result
    }

    fn load_all(
        &self,
        conn: &mut WarehouseConnection<B::Session>,
        fetched: Vec<(&SourceDescriptor, DataSet)>,
        run_timestamp: &RunTimestamp,
    ) -> PipelineResult<Vec<LoadRecord>> {
        self.gateway.connect_into(conn)?;
        self.gateway.ensure_schema(conn, &self.schema)?;

        let mut records = Vec::with_capacity(fetched.len());
        for (source, dataset) in fetched {
            let table = TableRef::new(self.schema.as_str(), source.table.as_str());
            let rows = self.gateway.load_dataset(conn, dataset, &table, run_timestamp)?;
            let record = LoadRecord {
                source: source.name.clone(),
                table: source.table.clone(),
                rows,
                loaded_at: *run_timestamp,
            };
            if let Some(obs) = self.options.observer.as_ref() {
                obs.on_loaded(&record);
            }
            records.push(record);
        }
        Ok(records)
    }

    fn report_failure(&self, e: &PipelineError) {
        if let Some(obs) = self.options.observer.as_ref() {
            let sev = severity_for_error(e);
            obs.on_failure(sev, e);
            if sev >= self.options.alert_at_or_above {
                obs.on_alert(sev, e);
            }
        }
    }
}

/// Reject source lists that cannot be loaded as a whole: blank table names, or two sources
/// targeting the same table (the second replace-load would discard the first). Table names
/// compare ignoring ASCII case, as the warehouse does.
fn validate_sources(sources: &[SourceDescriptor]) -> PipelineResult<()> {
    let mut tables = HashSet::new();
    for source in sources {
        if source.table.trim().is_empty() {
            return Err(PipelineError::Config {
                message: format!("source '{}' has no destination table", source.name),
            });
        }
        if !tables.insert(source.table.to_ascii_lowercase()) {
            return Err(PipelineError::Config {
                message: format!("destination table '{}' is used by more than one source", source.table),
            });
        }
    }
    Ok(())
}

/// Run the production pipeline over `config.sources`.
pub fn run(config: &PipelineConfig) -> PipelineResult<Vec<LoadRecord>> {
    Pipeline::from_config(config)?.run(&config.sources)
}
