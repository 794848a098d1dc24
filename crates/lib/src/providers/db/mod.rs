pub mod clickhouse;

use crate::errors::PipelineError;
use async_trait::async_trait;
pub use clickhouse::ClickHouseProvider;
use dyn_clone::DynClone;
use std::fmt::Debug;

/// One result row: a string-keyed map, never a positional tuple. Aggregate
/// aliases (`total_count`, `total_keluhan`) match the SQL builder's output.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A trait for executing queries against the complaint database.
///
/// The connection pool and retry mechanics live behind this seam; the
/// pipeline borrows a handle per call and assumes no session affinity.
#[async_trait]
pub trait ComplaintDatabase: Send + Sync + Debug + DynClone {
    /// Returns the name of the database provider (e.g. "ClickHouse").
    fn name(&self) -> &str;

    /// Executes a SQL query and returns the result rows.
    async fn execute_query(&self, sql: &str) -> Result<Vec<Row>, PipelineError>;
}

dyn_clone::clone_trait_object!(ComplaintDatabase);
