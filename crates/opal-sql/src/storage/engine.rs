//! The storage engine interface the executor plans against.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parser::{ColumnType, CompOp, IndexKind};

use super::error::StorageResult;
use super::record::Record;

/// Per-stage timing telemetry, stage name to elapsed time.
///
/// Stage names are engine-defined strings. Keys are expected to be
/// unique per call; on collision during a merge the newer entry wins.
pub type QueryTimes = BTreeMap<String, Duration>;

/// The result of one engine read operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Matching records, projected to the requested columns.
    pub records: Vec<Record>,
    /// Per-stage timings for this call.
    pub query_times: QueryTimes,
}

/// A named column value, the key unit of point and range lookups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Column name.
    pub name: String,
    /// Value text; the engine parses it per the column's type.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A range endpoint: a concrete key, or one of the open-endpoint
/// sentinels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyBound {
    /// Open lower endpoint (everything from the start of the index).
    Min,
    /// A concrete endpoint, inclusive.
    Key(Attribute),
    /// Open upper endpoint (everything to the end of the index).
    Max,
}

impl KeyBound {
    /// The concrete key, if this bound is not a sentinel.
    pub fn key(&self) -> Option<&Attribute> {
        match self {
            KeyBound::Key(attr) => Some(attr),
            _ => None,
        }
    }
}

impl From<Attribute> for KeyBound {
    fn from(attr: Attribute) -> Self {
        KeyBound::Key(attr)
    }
}

/// A compiled single-condition test over a record.
pub type RowComparator = Box<dyn Fn(&Record) -> bool + Send + Sync>;

/// The residual predicate of a conjunct: the AND of the comparators the
/// index driver did not absorb. Empty means constant-true.
#[derive(Default)]
pub struct Residual {
    comparators: Vec<RowComparator>,
}

impl Residual {
    /// The constant-true predicate.
    pub fn always() -> Self {
        Self::default()
    }

    /// Adds one comparator to the conjunction.
    pub fn push(&mut self, comparator: RowComparator) {
        self.comparators.push(comparator);
    }

    /// Number of comparators.
    pub fn len(&self) -> usize {
        self.comparators.len()
    }

    /// True if this is the constant-true predicate.
    pub fn is_empty(&self) -> bool {
        self.comparators.is_empty()
    }

    /// Evaluates the conjunction on a record.
    pub fn matches(&self, record: &Record) -> bool {
        self.comparators.iter().all(|c| c(record))
    }
}

impl std::fmt::Debug for Residual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Residual")
            .field("comparators", &self.comparators.len())
            .finish()
    }
}

/// The narrow contract the executor requires from a storage engine.
///
/// Read operations return records already projected to the requested
/// columns, plus per-stage timings. Range endpoints are inclusive; the
/// executor chooses endpoints and leaves inclusivity here.
pub trait Engine {
    /// True if `table` exists.
    fn is_table(&self, table: &str) -> bool;

    /// All table names, in a stable order.
    fn table_names(&self) -> Vec<String>;

    /// Column names of `table` in schema order.
    fn table_attributes(&self, table: &str) -> StorageResult<Vec<String>>;

    /// The subset `columns`, reordered to schema order.
    fn sort_attributes(&self, table: &str, columns: &[String]) -> StorageResult<Vec<String>>;

    /// Names of the indexed columns of `table`.
    fn index_names(&self, table: &str) -> StorageResult<Vec<String>>;

    /// A compiled test of `column op value` over this table's records.
    /// The comparator captures everything it needs by value.
    fn comparator(
        &self,
        table: &str,
        op: CompOp,
        column: &str,
        value: &str,
    ) -> StorageResult<RowComparator>;

    /// Creates a table. `types` and `names` are parallel, in source
    /// order; `primary_key` names one of them.
    fn create_table(
        &mut self,
        table: &str,
        primary_key: &str,
        types: Vec<ColumnType>,
        names: Vec<String>,
    ) -> StorageResult<()>;

    /// Creates an index of `kind` on `column`.
    fn create_index(&mut self, table: &str, column: &str, kind: IndexKind) -> StorageResult<()>;

    /// Full scan, optionally filtered by a residual predicate.
    fn load(
        &self,
        table: &str,
        columns: &[String],
        residual: Option<&Residual>,
    ) -> StorageResult<QueryResponse>;

    /// Point lookup on `key`, filtered by `residual`.
    fn search(
        &self,
        table: &str,
        key: Attribute,
        residual: &Residual,
        columns: &[String],
    ) -> StorageResult<QueryResponse>;

    /// Inclusive range lookup between `lo` and `hi`, filtered by
    /// `residual`.
    fn range_search(
        &self,
        table: &str,
        lo: KeyBound,
        hi: KeyBound,
        residual: &Residual,
        columns: &[String],
    ) -> StorageResult<QueryResponse>;

    /// Appends one row; `values` are in schema order.
    fn add(&mut self, table: &str, values: Vec<String>) -> StorageResult<()>;

    /// Bulk-loads rows from a CSV file.
    fn csv_insert(&mut self, table: &str, path: &Path) -> StorageResult<()>;

    /// Deletes the rows whose `key.name` column equals `key.value`.
    fn remove(&mut self, table: &str, key: Attribute) -> StorageResult<()>;

    /// Drops a table and its indexes.
    fn drop_table(&mut self, table: &str) -> StorageResult<()>;
}
