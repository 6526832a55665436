//! Remote source retrieval.
//!
//! [`HttpFetcher::fetch`] issues exactly one GET per call. There is no retry or backoff: a
//! failed fetch is reported immediately and retrying is left to whoever scheduled the run.

use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Client;
use tracing::{error, info};

use crate::error::{FetchFailure, PipelineError, PipelineResult};
use crate::types::DataSet;

use super::csv::ingest_csv_from_str;

/// Blocking HTTP(S) fetcher for CSV sources.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher. `timeout` bounds each whole request; `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> PipelineResult<Self> {
        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(|e| PipelineError::Config {
            message: format!("failed to build HTTP client: {e}"),
        })?;
        Ok(Self { client })
    }

    /// Fetch `location` and parse the body as comma-separated text.
    ///
    /// Fails with [`PipelineError::Fetch`] (carrying `location`) when the location is not an
    /// `http`/`https` URL, the request fails, the status is not a success, or the body is not
    /// well-formed CSV. No partial dataset is ever returned.
    pub fn fetch(&self, location: &str) -> PipelineResult<DataSet> {
        info!(location, "downloading source");
        let result = self.fetch_inner(location);
        match &result {
            Ok(ds) => info!(
                location,
                rows = ds.row_count(),
                columns = ds.column_count(),
                "source downloaded"
            ),
            Err(e) => error!(location, error = %e, "source download failed"),
        }
        result.map_err(|source| PipelineError::Fetch {
            location: location.to_owned(),
            source,
        })
    }

    fn fetch_inner(&self, location: &str) -> Result<DataSet, FetchFailure> {
        let url = parse_location(location)?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(FetchFailure::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        let body = response.text().map_err(FetchFailure::Body)?;
        Ok(ingest_csv_from_str(&body)?)
    }
}

fn parse_location(location: &str) -> Result<Url, FetchFailure> {
    let url = Url::parse(location).map_err(|e| FetchFailure::InvalidLocation(format!("{location}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchFailure::InvalidLocation(format!(
            "unsupported scheme '{other}' (expected http or https)"
        ))),
    }
}
