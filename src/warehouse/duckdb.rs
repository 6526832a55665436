//! DuckDB backend (MotherDuck, local database file, or in-memory).

use std::fmt;

use ::duckdb::Connection;
use tempfile::TempDir;

use crate::config::{WarehouseSettings, WarehouseTarget};
use crate::error::WarehouseError;
use crate::types::DataSet;

use super::staging::write_parquet;
use super::{TableRef, WarehouseBackend, WarehouseSession, quote_ident, quote_literal};

/// Opens DuckDB sessions for a [`WarehouseSettings`] target.
///
/// MotherDuck is reached through DuckDB's `md:` database paths; the token travels in the
/// connection string and is never logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbWarehouse;

impl WarehouseBackend for DuckDbWarehouse {
    type Session = DuckDbSession;

    fn open(&self, settings: &WarehouseSettings) -> Result<DuckDbSession, WarehouseError> {
        let conn = match &settings.target {
            WarehouseTarget::MotherDuck => {
                let token = settings
                    .token
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| WarehouseError::Other("access token is missing or empty".to_string()))?;
                let path = format!("md:{}?motherduck_token={}", settings.database, token);
                Connection::open(path)
                    .map_err(|e| WarehouseError::Other(e.to_string().replace(token, "<redacted>")))?
            }
            WarehouseTarget::LocalFile(path) => Connection::open(path)?,
            WarehouseTarget::InMemory => Connection::open_in_memory()?,
        };
        let staging = tempfile::Builder::new().prefix("brokerage-staging-").tempdir()?;
        Ok(DuckDbSession {
            conn,
            staging,
            loads: 0,
        })
    }
}

/// An open DuckDB connection plus its private staging directory.
pub struct DuckDbSession {
    conn: Connection,
    staging: TempDir,
    loads: usize,
}

impl fmt::Debug for DuckDbSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuckDbSession")
            .field("staging", &self.staging.path())
            .field("loads", &self.loads)
            .finish()
    }
}

impl DuckDbSession {
    /// The underlying DuckDB connection, for ad-hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl WarehouseSession for DuckDbSession {
    fn create_schema_if_absent(&mut self, schema: &str) -> Result<(), WarehouseError> {
        self.conn
            .execute_batch(&format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(schema)))?;
        Ok(())
    }

    fn replace_table(&mut self, table: &TableRef, dataset: &DataSet) -> Result<(), WarehouseError> {
        self.loads += 1;
        let file = self.staging.path().join(format!("load-{}.parquet", self.loads));
        write_parquet(dataset, &file)?;

        let sql = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM read_parquet({});",
            table.quoted(),
            quote_literal(&file.to_string_lossy())
        );
        let result = self.conn.execute_batch(&sql);
        let _ = std::fs::remove_file(&file);
        result?;
        Ok(())
    }

    fn count_rows(&mut self, table: &TableRef) -> Result<u64, WarehouseError> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table.quoted()), [], |row| row.get(0))?;
        u64::try_from(n).map_err(|_| WarehouseError::Other(format!("negative row count {n} for {table}")))
    }

    fn close(self) -> Result<(), WarehouseError> {
        let DuckDbSession { conn, staging, .. } = self;
        conn.close().map_err(|(_, e)| WarehouseError::DuckDb(e))?;
        staging.close()?;
        Ok(())
    }
}
