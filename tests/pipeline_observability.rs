mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use brokerage_pipeline::PipelineError;
use brokerage_pipeline::config::{SourceDescriptor, WarehouseSettings};
use brokerage_pipeline::ingestion::HttpFetcher;
use brokerage_pipeline::pipeline::{
    FileObserver, LoadRecord, Pipeline, PipelineObserver, PipelineOptions, PipelineSeverity,
};
use brokerage_pipeline::warehouse::{DuckDbWarehouse, WarehouseGateway};

use common::{CsvServer, fixture};

#[derive(Default)]
struct RecordingObserver {
    fetched: Mutex<Vec<(String, usize)>>,
    loaded: Mutex<Vec<LoadRecord>>,
    failures: Mutex<Vec<PipelineSeverity>>,
    alerts: Mutex<Vec<PipelineSeverity>>,
}

impl PipelineObserver for RecordingObserver {
    fn on_fetched(&self, source: &SourceDescriptor, rows: usize) {
        self.fetched.lock().unwrap().push((source.name.clone(), rows));
    }

    fn on_loaded(&self, record: &LoadRecord) {
        self.loaded.lock().unwrap().push(record.clone());
    }

    fn on_failure(&self, severity: PipelineSeverity, _error: &PipelineError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, severity: PipelineSeverity, _error: &PipelineError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn pipeline_with(settings: WarehouseSettings, observer: Arc<dyn PipelineObserver>) -> Pipeline<DuckDbWarehouse> {
    let fetcher = HttpFetcher::new(Some(Duration::from_secs(5))).unwrap();
    Pipeline::new(fetcher, WarehouseGateway::new(DuckDbWarehouse, settings), "source").with_options(PipelineOptions {
        observer: Some(observer),
        alert_at_or_above: PipelineSeverity::Critical,
    })
}

#[test]
fn observer_sees_fetches_and_loads_in_order() {
    let opps = fixture("opportunities.csv");
    let props = fixture("propositions.csv");
    let server = CsvServer::start(&[("/o.csv", 200, opps.as_str()), ("/p.csv", 200, props.as_str())]);
    let obs = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(WarehouseSettings::in_memory(), obs.clone());

    let sources = vec![
        SourceDescriptor::raw("opportunities", server.url("/o.csv")),
        SourceDescriptor::raw("propositions", server.url("/p.csv")),
    ];
    let records = pipeline.run(&sources).unwrap();

    assert_eq!(
        obs.fetched.lock().unwrap().clone(),
        vec![("opportunities".to_string(), 5), ("propositions".to_string(), 3)]
    );
    assert_eq!(obs.loaded.lock().unwrap().clone(), records);
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn connection_failure_is_critical_and_alerts() {
    let opps = fixture("opportunities.csv");
    let server = CsvServer::start(&[("/o.csv", 200, opps.as_str())]);
    let obs = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(WarehouseSettings::motherduck("immobilier_courtage", None), obs.clone());

    let _ = pipeline
        .run(&[SourceDescriptor::raw("opportunities", server.url("/o.csv"))])
        .unwrap_err();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![PipelineSeverity::Critical]);
    assert_eq!(obs.alerts.lock().unwrap().clone(), vec![PipelineSeverity::Critical]);
}

#[test]
fn http_status_failure_does_not_alert() {
    let server = CsvServer::start(&[]);
    let obs = Arc::new(RecordingObserver::default());
    let pipeline = pipeline_with(WarehouseSettings::in_memory(), obs.clone());

    let _ = pipeline
        .run(&[SourceDescriptor::raw("opportunities", server.url("/missing.csv"))])
        .unwrap_err();

    assert_eq!(obs.failures.lock().unwrap().clone(), vec![PipelineSeverity::Error]);
    assert!(obs.alerts.lock().unwrap().is_empty());
    assert!(obs.loaded.lock().unwrap().is_empty());
}

#[test]
fn file_observer_appends_one_line_per_event() {
    let opps = fixture("opportunities.csv");
    let server = CsvServer::start(&[("/o.csv", 200, opps.as_str())]);
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("events.log");
    let pipeline = pipeline_with(WarehouseSettings::in_memory(), Arc::new(FileObserver::new(&log)));

    pipeline
        .run(&[SourceDescriptor::raw("opportunities", server.url("/o.csv"))])
        .unwrap();

    let text = std::fs::read_to_string(&log).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("fetched source=opportunities"));
    assert!(lines[1].contains("loaded source=opportunities table=raw_opportunities rows=5"));
}
