//! Session façade: SQL text in, populated response out.

use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::{debug, error};

use crate::error::Error;
use crate::exec::Executor;
use crate::parser::Parser;
use crate::response::SessionResponse;
use crate::storage::{Engine, MemoryEngine};

/// A database session. It exclusively owns its engine and the response
/// buffer; statements run on the calling thread, in source order, with
/// each statement's side effects visible to the next.
///
/// Errors do not unwind: they land in the response as a status code and
/// message, and side effects of the statements that already ran are
/// retained.
pub struct Session<E: Engine = MemoryEngine> {
    engine: E,
    response: SessionResponse,
}

impl Session<MemoryEngine> {
    /// Creates a session over a fresh in-memory engine.
    pub fn new() -> Self {
        Self::with_engine(MemoryEngine::new())
    }
}

impl Default for Session<MemoryEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine> Session<E> {
    /// Creates a session over `engine`.
    pub fn with_engine(engine: E) -> Self {
        Self {
            engine,
            response: SessionResponse::new(),
        }
    }

    /// The owned engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the owned engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The current response buffer.
    pub fn response(&self) -> &SessionResponse {
        &self.response
    }

    /// Wipes the response buffer between statements.
    pub fn clear(&mut self) {
        self.response.clear();
    }

    /// Diagnostic dump of the current response.
    pub fn display(&self) -> String {
        self.response.display()
    }

    /// Runs a script of `;`-separated statements and returns the
    /// response.
    ///
    /// A parse failure leaves the previous result collections in place
    /// and only sets the code and error. An execution failure aborts
    /// the remaining statements; whatever the earlier statements
    /// committed stays committed.
    pub fn execute(&mut self, sql: &str) -> &SessionResponse {
        match Parser::parse(sql) {
            Ok(statements) => {
                self.response.clear();
                self.response.error.clear();
                self.response.code = SessionResponse::OK;

                let total = statements.len();
                for statement in statements {
                    let result =
                        Executor::new(&mut self.engine, &mut self.response).dispatch(statement);
                    if let Err(e) = result {
                        error!(%e, "statement failed");
                        self.response.code = e.code();
                        self.response.error = e.to_string();
                        break;
                    }
                }
                debug!(total, code = self.response.code, "script finished");
            }
            Err(e) => {
                let e = Error::from(e);
                error!(%e, "parse failed");
                self.response.code = e.code();
                self.response.error = e.to_string();
            }
        }
        &self.response
    }

    /// Reads SQL from a stream and executes it. A stream that cannot be
    /// read, or has nothing left, returns the current response
    /// unchanged.
    pub fn parse_reader<R: Read>(&mut self, reader: &mut R) -> &SessionResponse {
        let mut sql = String::new();
        match reader.read_to_string(&mut sql) {
            Ok(_) if !sql.trim().is_empty() => self.execute(&sql),
            _ => &self.response,
        }
    }

    /// Reads SQL from a file and executes it. An unopenable file is
    /// reported in the response rather than being fatal.
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> &SessionResponse {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(sql) => self.execute(&sql),
            Err(e) => {
                error!(path = %path.display(), %e, "cannot open script");
                self.response.code = 500;
                self.response.error = format!("cannot open {}: {e}", path.display());
                &self.response
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    use crate::storage::Record;

    fn rec(fields: &[&str]) -> Record {
        fields.iter().copied().collect()
    }

    #[test]
    fn test_create_insert_select_roundtrip() {
        let mut session = Session::new();
        let response = session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(32)); \
             INSERT INTO t VALUES (1, 'a'); \
             SELECT id, name FROM t;",
        );
        assert!(!response.failed());
        assert_eq!(response.records, vec![rec(&["1", "a"])]);
        assert_eq!(response.column_names, vec!["id", "name"]);
        assert_eq!(response.table_names, vec!["t"]);
        assert!(!response.query_times.is_empty());
    }

    #[test]
    fn test_or_of_point_searches_unions_and_dedups() {
        let mut session = Session::new();
        session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(32)); \
             CREATE INDEX i ON t (id); \
             INSERT INTO t VALUES (5, 'five'), (7, 'seven'), (9, 'nine');",
        );
        let response = session.execute("SELECT name FROM t WHERE id = 5 OR id = 7 OR id = 5;");
        assert!(!response.failed());
        assert_eq!(response.records, vec![rec(&["five"]), rec(&["seven"])]);
        assert_eq!(response.column_names, vec!["name"]);
    }

    #[test]
    fn test_columns_come_back_in_schema_order() {
        let mut session = Session::new();
        session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(32), age INT); \
             INSERT INTO t VALUES (1, 'ada', 36);",
        );
        let response = session.execute("SELECT age, name, id FROM t;");
        assert_eq!(response.column_names, vec!["id", "name", "age"]);
        assert_eq!(response.records, vec![rec(&["1", "ada", "36"])]);
    }

    #[test]
    fn test_between_scans_the_closed_range() {
        let mut session = Session::new();
        session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY); \
             CREATE INDEX i ON t (id); \
             INSERT INTO t VALUES (1), (3), (9), (12);",
        );
        let response = session.execute("SELECT * FROM t WHERE id BETWEEN 3 AND 9;");
        assert_eq!(response.records, vec![rec(&["3"]), rec(&["9"])]);
    }

    #[test]
    fn test_unindexed_or_branch_short_circuits() {
        // Intentional: the first disjunct has no indexable column, so
        // its filtered scan is the whole answer and `name = 'eve'`
        // never contributes.
        let mut session = Session::new();
        session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(32)); \
             INSERT INTO t VALUES (1, 'ada'), (2, 'bob'), (3, 'eve');",
        );
        let response = session.execute("SELECT * FROM t WHERE id = 1 OR name = 'eve';");
        assert!(!response.failed());
        assert_eq!(response.records, vec![rec(&["1", "ada"])]);
    }

    #[test]
    fn test_missing_table_fails_with_table_error() {
        let mut session = Session::new();
        let response = session.execute("SELECT x FROM nonesuch;");
        assert!(response.failed());
        assert_eq!(response.code, 404);
        assert!(response.error.contains("Table"));
    }

    #[test]
    fn test_range_predicate_with_residual() {
        let mut session = Session::new();
        session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY, age INT); \
             CREATE INDEX i ON t (id); \
             INSERT INTO t VALUES (10, 25), (11, 35), (12, 28);",
        );
        let response = session.execute("SELECT * FROM t WHERE id >= 10 AND age < 30;");
        assert_eq!(response.records, vec![rec(&["10", "25"]), rec(&["12", "28"])]);
    }

    #[test]
    fn test_delete_then_select() {
        let mut session = Session::new();
        session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY); \
             INSERT INTO t VALUES (1), (2), (3); \
             DELETE FROM t WHERE id = 2;",
        );
        let response = session.execute("SELECT * FROM t;");
        assert_eq!(response.records, vec![rec(&["1"]), rec(&["3"])]);
    }

    #[test]
    fn test_drop_table_forgets_the_table() {
        let mut session = Session::new();
        session.execute("CREATE TABLE t (id INT PRIMARY KEY);");
        session.execute("DROP TABLE t;");
        let response = session.execute("SELECT * FROM t;");
        assert_eq!(response.code, 404);
    }

    #[test]
    fn test_error_keeps_earlier_side_effects() {
        let mut session = Session::new();
        let response = session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY); \
             INSERT INTO t VALUES (1); \
             INSERT INTO t VALUES (1);",
        );
        assert!(response.failed());
        assert_eq!(response.code, 500);

        // The first insert stays committed.
        let response = session.execute("SELECT * FROM t;");
        assert_eq!(response.records, vec![rec(&["1"])]);
    }

    #[test]
    fn test_parse_error_leaves_previous_results() {
        let mut session = Session::new();
        session.execute(
            "CREATE TABLE t (id INT PRIMARY KEY); \
             INSERT INTO t VALUES (1);",
        );
        session.execute("SELECT * FROM t;");
        let before = session.response().records.clone();

        let response = session.execute("SELEKT nonsense");
        assert!(response.failed());
        assert_eq!(response.code, 400);
        assert_eq!(response.records, before);
    }

    #[test]
    fn test_parse_reader_empty_stream_unchanged() {
        let mut session = Session::new();
        session.execute("CREATE TABLE t (id INT PRIMARY KEY); INSERT INTO t VALUES (7);");
        session.execute("SELECT * FROM t;");
        let before = session.response().clone();

        let mut empty = std::io::Cursor::new(Vec::new());
        let response = session.parse_reader(&mut empty);
        assert_eq!(*response, before);
    }

    #[test]
    fn test_parse_reader_executes_stream() {
        let mut session = Session::new();
        let mut input = std::io::Cursor::new(
            b"CREATE TABLE t (id INT PRIMARY KEY); INSERT INTO t VALUES (4); SELECT * FROM t;"
                .to_vec(),
        );
        let response = session.parse_reader(&mut input);
        assert_eq!(response.records, vec![rec(&["4"])]);
    }

    #[test]
    fn test_parse_file_missing_is_an_error_response() {
        let mut session = Session::new();
        let response = session.parse_file("/nonexistent/script.sql");
        assert!(response.failed());
        assert_eq!(response.code, 500);
        assert!(response.error.contains("cannot open"));
    }

    #[test]
    fn test_parse_file_runs_the_script() {
        let mut session = Session::new();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "CREATE TABLE t (id INT PRIMARY KEY); INSERT INTO t VALUES (1); SELECT * FROM t;"
        )
        .unwrap();
        file.flush().unwrap();

        let response = session.parse_file(file.path());
        assert!(!response.failed());
        assert_eq!(response.records, vec![rec(&["1"])]);
    }

    #[test]
    fn test_copy_from_csv_file() {
        let mut session = Session::new();
        let mut csv = tempfile::NamedTempFile::new().unwrap();
        writeln!(csv, "1,ada").unwrap();
        writeln!(csv, "2,bob").unwrap();
        csv.flush().unwrap();

        session.execute("CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(16));");
        let sql = format!("COPY t FROM '{}';", csv.path().display());
        let response = session.execute(&sql);
        assert!(!response.failed(), "{}", response.error);

        let response = session.execute("SELECT * FROM t;");
        assert_eq!(response.records, vec![rec(&["1", "ada"]), rec(&["2", "bob"])]);
    }

    #[test]
    fn test_clear_wipes_collections() {
        let mut session = Session::new();
        session.execute("CREATE TABLE t (id INT PRIMARY KEY); INSERT INTO t VALUES (1);");
        session.execute("SELECT * FROM t;");
        assert!(!session.response().records.is_empty());

        session.clear();
        assert!(session.response().records.is_empty());
        assert!(session.response().table_names.is_empty());
    }

    #[test]
    fn test_display_mentions_tables() {
        let mut session = Session::new();
        session.execute("CREATE TABLE t (id INT PRIMARY KEY);");
        session.execute("SELECT * FROM t;");
        assert!(session.display().contains('t'));
    }
}
