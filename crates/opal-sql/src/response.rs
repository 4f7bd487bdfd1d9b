//! The externally visible result of a session call.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::storage::{QueryTimes, Record};

/// Everything a caller gets back from one session call: records,
/// schema-ordered column names, the current table list, per-stage
/// timings, and an HTTP-like status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    /// Result records, in merge order.
    pub records: Vec<Record>,
    /// Column names in schema order (never request order).
    pub column_names: Vec<String>,
    /// All table names at the time of the query.
    pub table_names: Vec<String>,
    /// Per-stage timings, keyed by engine-defined stage names.
    pub query_times: QueryTimes,
    /// Error message; empty on success.
    pub error: String,
    /// Status code; [`SessionResponse::OK`] on success.
    pub code: u16,
}

impl SessionResponse {
    /// The success code.
    pub const OK: u16 = 200;

    /// A fresh, successful, empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the last call did not succeed.
    pub fn failed(&self) -> bool {
        self.code != Self::OK
    }

    /// Wipes the result collections. The code and error text are left
    /// alone; the session resets those when it starts a new call.
    pub fn clear(&mut self) {
        self.records.clear();
        self.column_names.clear();
        self.table_names.clear();
        self.query_times.clear();
    }

    /// Diagnostic dump: table names, then timing stage names.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for table in &self.table_names {
            let _ = writeln!(out, "{table}");
        }
        for stage in self.query_times.keys() {
            let _ = writeln!(out, "{stage}");
        }
        out
    }
}

impl Default for SessionResponse {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            column_names: Vec::new(),
            table_names: Vec::new(),
            query_times: QueryTimes::new(),
            error: String::new(),
            code: Self::OK,
        }
    }
}
