use std::error::Error as StdError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::config::SourceDescriptor;
use crate::error::{FetchFailure, PipelineError};

use super::LoadRecord;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineSeverity {
    /// Error-level event (the run failed).
    Error,
    /// Critical error (network, connection or other infrastructure failures).
    Critical,
}

/// Observer interface for run progress and outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called after a source has been fetched and parsed.
    fn on_fetched(&self, _source: &SourceDescriptor, _rows: usize) {}

    /// Called after a destination table has been loaded and its count read back.
    fn on_loaded(&self, _record: &LoadRecord) {}

    /// Called once when a run fails.
    fn on_failure(&self, _severity: PipelineSeverity, _error: &PipelineError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, severity: PipelineSeverity, error: &PipelineError) {
        self.on_failure(severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_fetched(&self, source: &SourceDescriptor, rows: usize) {
        for o in &self.observers {
            o.on_fetched(source, rows);
        }
    }

    fn on_loaded(&self, record: &LoadRecord) {
        for o in &self.observers {
            o.on_loaded(record);
        }
    }

    fn on_failure(&self, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(severity, error);
        }
    }

    fn on_alert(&self, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(severity, error);
        }
    }
}

/// Emits run events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_fetched(&self, source: &SourceDescriptor, rows: usize) {
        info!(source = %source.name, location = %source.location, rows, "[pipeline][fetched]");
    }

    fn on_loaded(&self, record: &LoadRecord) {
        info!(
            source = %record.source,
            table = %record.table,
            rows = record.rows,
            loaded_at = %record.loaded_at,
            "[pipeline][loaded]"
        );
    }

    fn on_failure(&self, severity: PipelineSeverity, error: &PipelineError) {
        warn!(?severity, kind = ?error.kind(), error = %error, "[pipeline][failed]");
    }

    fn on_alert(&self, severity: PipelineSeverity, error: &PipelineError) {
        error!(?severity, kind = ?error.kind(), error = %error, "[ALERT][pipeline]");
    }
}

/// Appends run events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_fetched(&self, source: &SourceDescriptor, rows: usize) {
        self.append_line(&format!(
            "{} fetched source={} location={} rows={}",
            now_ts(),
            source.name,
            source.location,
            rows
        ));
    }

    fn on_loaded(&self, record: &LoadRecord) {
        self.append_line(&format!(
            "{} loaded source={} table={} rows={} loaded_at={}",
            now_ts(),
            record.source,
            record.table,
            record.rows,
            record.loaded_at
        ));
    }

    fn on_failure(&self, severity: PipelineSeverity, error: &PipelineError) {
        self.append_line(&format!(
            "{} fail severity={:?} kind={:?} err={}",
            now_ts(),
            severity,
            error.kind(),
            error
        ));
    }

    fn on_alert(&self, severity: PipelineSeverity, error: &PipelineError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} kind={:?} err={}",
            now_ts(),
            severity,
            error.kind(),
            error
        ));
    }
}

fn now_ts() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Severity of a failed run, used to decide whether to alert.
pub fn severity_for_error(e: &PipelineError) -> PipelineSeverity {
    match e {
        PipelineError::Fetch { source, .. } => match source {
            FetchFailure::Transport(_) | FetchFailure::Body(_) => PipelineSeverity::Critical,
            FetchFailure::InvalidLocation(_) | FetchFailure::Status(_) | FetchFailure::Parse(_) => {
                PipelineSeverity::Error
            }
        },
        PipelineError::Connection { .. } | PipelineError::Schema { .. } => PipelineSeverity::Critical,
        PipelineError::Load { source, .. } => {
            // Staging-file I/O failures point at the host, not the data.
            if error_chain_contains_io(source) {
                PipelineSeverity::Critical
            } else {
                PipelineSeverity::Error
            }
        }
        PipelineError::Config { .. } => PipelineSeverity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}
