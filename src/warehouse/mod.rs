//! Warehouse gateway: connection lifecycle, schema creation and replace-loads.
//!
//! The gateway is split in two layers:
//!
//! - [`WarehouseBackend`] / [`WarehouseSession`]: the SQL-speaking seam. [`duckdb::DuckDbWarehouse`]
//!   is the production backend (MotherDuck, local file or in-memory DuckDB).
//! - [`WarehouseGateway`]: backend-independent rules. It drives the [`WarehouseConnection`] state
//!   machine, appends the lineage columns, reads the row count back after every load and maps
//!   backend failures onto [`PipelineError`] kinds naming the database, schema or table involved.
//!
//! ## Atomicity of a replace-load
//!
//! The gateway does not roll anything back itself. A replace-load is one
//! `CREATE OR REPLACE TABLE ... AS SELECT ...` statement, so after a failed load the destination
//! table is in whatever state DuckDB guarantees for a failed statement: the previous table
//! (if any) is left as it was.

pub mod duckdb;
pub mod staging;

use std::fmt;

use tracing::{error, info};

use crate::config::WarehouseSettings;
use crate::error::{PipelineError, PipelineResult, WarehouseError};
use crate::pipeline::RunTimestamp;
use crate::types::{DataSet, Value};

pub use self::duckdb::{DuckDbSession, DuckDbWarehouse};

/// Lineage column holding the run timestamp.
pub const LOADED_AT_COLUMN: &str = "_loaded_at";
/// Lineage column holding the destination table name.
pub const SOURCE_FILE_COLUMN: &str = "_source_file";

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Schema name.
    pub schema: String,
    /// Table name.
    pub table: String,
}

impl TableRef {
    /// Create a table reference.
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `"schema"."table"`, quoted for SQL.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Quote an SQL identifier, doubling embedded double quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling embedded single quotes.
pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Opens sessions against a warehouse.
pub trait WarehouseBackend {
    /// Session type produced by [`Self::open`].
    type Session: WarehouseSession;

    /// Open (and authenticate) a session.
    fn open(&self, settings: &WarehouseSettings) -> Result<Self::Session, WarehouseError>;
}

/// One live warehouse session.
pub trait WarehouseSession {
    /// `CREATE SCHEMA IF NOT EXISTS`. Must succeed when the schema already exists.
    fn create_schema_if_absent(&mut self, schema: &str) -> Result<(), WarehouseError>;

    /// Replace `table` with exactly the rows and columns of `dataset`.
    fn replace_table(&mut self, table: &TableRef, dataset: &DataSet) -> Result<(), WarehouseError>;

    /// `SELECT COUNT(*)` on `table`.
    fn count_rows(&mut self, table: &TableRef) -> Result<u64, WarehouseError>;

    /// Release the session.
    fn close(self) -> Result<(), WarehouseError>;
}

/// Lifecycle state of a [`WarehouseConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never opened.
    Unconnected,
    /// Open; schema and load operations are allowed.
    Connected,
    /// Closed (terminal).
    Closed,
}

enum Slot<S> {
    Unconnected,
    Connected(S),
    Closed,
}

/// A warehouse connection owned by one run.
///
/// `Unconnected -> Connected -> Closed`. [`Self::close`] is a no-op unless the connection is
/// `Connected`, and dropping a connected value closes it.
pub struct WarehouseConnection<S: WarehouseSession> {
    database: String,
    slot: Slot<S>,
}

impl<S: WarehouseSession> WarehouseConnection<S> {
    /// A connection that has not been opened yet.
    pub fn unconnected(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            slot: Slot::Unconnected,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        match self.slot {
            Slot::Unconnected => ConnectionState::Unconnected,
            Slot::Connected(_) => ConnectionState::Connected,
            Slot::Closed => ConnectionState::Closed,
        }
    }

    /// The live session, if connected.
    pub fn session(&self) -> Option<&S> {
        match &self.slot {
            Slot::Connected(s) => Some(s),
            _ => None,
        }
    }

    /// Close the connection.
    ///
    /// A no-op on an `Unconnected` or `Closed` connection. Never fails: a session that errors
    /// while closing is still released, and the error is logged.
    pub fn close(&mut self) {
        if !matches!(self.slot, Slot::Connected(_)) {
            return;
        }
        if let Slot::Connected(session) = std::mem::replace(&mut self.slot, Slot::Closed) {
            match session.close() {
                Ok(()) => info!(database = %self.database, "warehouse connection closed"),
                Err(e) => error!(database = %self.database, error = %e, "error while closing warehouse connection"),
            }
        }
    }

    fn session_mut(&mut self) -> Result<&mut S, WarehouseError> {
        match &mut self.slot {
            Slot::Connected(s) => Ok(s),
            _ => Err(WarehouseError::Other("connection is not open".to_string())),
        }
    }
}

impl<S: WarehouseSession> Drop for WarehouseConnection<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: WarehouseSession> fmt::Debug for WarehouseConnection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConnection")
            .field("database", &self.database)
            .field("state", &self.state())
            .finish()
    }
}

/// Backend-independent warehouse operations.
#[derive(Debug, Clone)]
pub struct WarehouseGateway<B> {
    backend: B,
    settings: WarehouseSettings,
}

impl<B: WarehouseBackend> WarehouseGateway<B> {
    /// Create a gateway for `settings` on top of `backend`.
    pub fn new(backend: B, settings: WarehouseSettings) -> Self {
        Self { backend, settings }
    }

    /// Settings this gateway connects with.
    pub fn settings(&self) -> &WarehouseSettings {
        &self.settings
    }

    /// Open a connection to the configured database.
    ///
    /// Fails with [`PipelineError::Connection`] naming the database when the backend refuses the
    /// token or cannot reach the database.
    pub fn connect(&self) -> PipelineResult<WarehouseConnection<B::Session>> {
        let mut conn = WarehouseConnection::unconnected(self.settings.database.clone());
        self.connect_into(&mut conn)?;
        Ok(conn)
    }

    /// Open the configured database into an existing (unconnected) connection slot.
    ///
    /// Lets a caller own the connection before it is opened, so its release is in place even
    /// when opening fails.
    pub fn connect_into(&self, conn: &mut WarehouseConnection<B::Session>) -> PipelineResult<()> {
        let database = conn.database.clone();
        if conn.state() != ConnectionState::Unconnected {
            return Err(PipelineError::Connection {
                database,
                source: WarehouseError::Other(format!("connection is already {:?}", conn.state())),
            });
        }
        info!(database = %database, "connecting to warehouse");
        match self.backend.open(&self.settings) {
            Ok(session) => {
                conn.slot = Slot::Connected(session);
                info!(database = %database, "warehouse connection open");
                Ok(())
            }
            Err(source) => {
                error!(database = %database, error = %source, "warehouse connection failed");
                Err(PipelineError::Connection { database, source })
            }
        }
    }

    /// Create `schema` if it does not exist yet. Idempotent.
    pub fn ensure_schema(&self, conn: &mut WarehouseConnection<B::Session>, schema: &str) -> PipelineResult<()> {
        info!(schema, "ensuring destination schema");
        conn.session_mut()
            .and_then(|s| s.create_schema_if_absent(schema))
            .map_err(|source| {
                error!(schema, error = %source, "schema creation failed");
                PipelineError::Schema {
                    schema: schema.to_owned(),
                    source,
                }
            })
    }

    /// Replace-load `dataset` into `table` and return the row count read back from the
    /// warehouse.
    ///
    /// Before anything is sent, every row gets [`LOADED_AT_COLUMN`] set to `run_timestamp` and
    /// [`SOURCE_FILE_COLUMN`] set to the destination table name.
    pub fn load_dataset(
        &self,
        conn: &mut WarehouseConnection<B::Session>,
        mut dataset: DataSet,
        table: &TableRef,
        run_timestamp: &RunTimestamp,
    ) -> PipelineResult<u64> {
        info!(table = %table, rows = dataset.row_count(), "loading table");
        add_tracking_columns(&mut dataset, &table.table, run_timestamp);

        let result = conn.session_mut().and_then(|s| {
            s.replace_table(table, &dataset)?;
            s.count_rows(table)
        });

        match result {
            Ok(count) => {
                info!(table = %table, rows = count, "table loaded");
                Ok(count)
            }
            Err(source) => {
                error!(table = %table, error = %source, "table load failed");
                Err(PipelineError::Load {
                    table: table.to_string(),
                    source,
                })
            }
        }
    }
}

/// Append (or overwrite) the two lineage columns on every row.
pub fn add_tracking_columns(dataset: &mut DataSet, source_table: &str, run_timestamp: &RunTimestamp) {
    dataset.set_constant_column(LOADED_AT_COLUMN, Value::Utf8(run_timestamp.to_string()));
    dataset.set_constant_column(SOURCE_FILE_COLUMN, Value::Utf8(source_table.to_owned()));
}
