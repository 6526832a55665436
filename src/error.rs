use thiserror::Error;

/// Convenience result type for parsing operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Convenience result type for pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned when delimited text cannot be turned into a [`crate::types::DataSet`].
#[derive(Debug, Error)]
pub enum IngestionError {
    /// CSV reader error (inconsistent field counts, invalid UTF-8, ...).
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The header row is missing or unusable (empty input, blank or duplicate column names).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the inferred [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },
}

/// Underlying cause of a [`PipelineError::Fetch`].
#[derive(Debug, Error)]
pub enum FetchFailure {
    /// The location is not an `http`/`https` URL.
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// The request could not be sent or the connection failed.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The response body could not be read as text.
    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    /// The body is not well-formed delimited text.
    #[error(transparent)]
    Parse(#[from] IngestionError),
}

/// Error reported by a warehouse backend.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// DuckDB (or MotherDuck) rejected an operation.
    #[error("duckdb error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Writing the Parquet staging file failed.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Local I/O around staging files failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else (missing credentials, closed connection, ...).
    #[error("{0}")]
    Other(String),
}

/// Which stage of a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retrieval or parsing of one source.
    Fetch,
    /// Establishing or authenticating the warehouse connection.
    Connection,
    /// Ensuring the destination schema exists.
    Schema,
    /// Writing or verifying one destination table.
    Load,
    /// The run was rejected before any I/O.
    Config,
}

/// Error returned by the pipeline and its stages.
///
/// Every variant names the thing that failed (source location, database, schema or table) so a
/// failure can be diagnosed from the message alone.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A source could not be fetched or parsed.
    #[error("failed to fetch '{location}': {source}")]
    Fetch {
        location: String,
        #[source]
        source: FetchFailure,
    },

    /// The warehouse connection could not be opened or authenticated.
    #[error("failed to connect to warehouse database '{database}': {source}")]
    Connection {
        database: String,
        #[source]
        source: WarehouseError,
    },

    /// The destination schema could not be created.
    #[error("failed to ensure schema '{schema}': {source}")]
    Schema {
        schema: String,
        #[source]
        source: WarehouseError,
    },

    /// A destination table could not be written or its row count read back.
    #[error("failed to load table '{table}': {source}")]
    Load {
        table: String,
        #[source]
        source: WarehouseError,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl PipelineError {
    /// Stage classification for callers that branch on the failure kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Fetch { .. } => ErrorKind::Fetch,
            PipelineError::Connection { .. } => ErrorKind::Connection,
            PipelineError::Schema { .. } => ErrorKind::Schema,
            PipelineError::Load { .. } => ErrorKind::Load,
            PipelineError::Config { .. } => ErrorKind::Config,
        }
    }
}
