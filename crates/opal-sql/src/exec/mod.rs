//! Statement dispatch and query execution.
//!
//! The [`Executor`] turns one parsed statement into engine operations
//! and, for reads, populates the session response. SELECT planning is
//! per-disjunct: each AND-group either drives an index (point or range
//! scan) or degrades the whole query to one filtered full scan.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::parser::{
    CompOp, CreateIndex, CreateTable, Delete, DropTable, Insert, InsertFromFile, Select,
    SelectBetween, Statement,
};
use crate::response::SessionResponse;
use crate::storage::{Attribute, Engine, KeyBound, QueryResponse, Residual};

mod merge;
mod plan;

/// Executes statements against an engine, writing results into a
/// session response.
pub struct Executor<'a, E: Engine> {
    engine: &'a mut E,
    response: &'a mut SessionResponse,
}

impl<'a, E: Engine> Executor<'a, E> {
    /// Creates an executor over the session's engine and response.
    pub fn new(engine: &'a mut E, response: &'a mut SessionResponse) -> Self {
        Self { engine, response }
    }

    /// Runs one statement to completion.
    pub fn dispatch(&mut self, statement: Statement) -> Result<()> {
        match statement {
            Statement::CreateTable(stmt) => self.create_table(stmt),
            Statement::CreateIndex(stmt) => self.create_index(stmt),
            Statement::Select(stmt) => self.select(stmt),
            Statement::SelectBetween(stmt) => self.select_between(stmt),
            Statement::Insert(stmt) => self.insert(stmt),
            Statement::InsertFromFile(stmt) => self.insert_from_file(stmt),
            Statement::Delete(stmt) => self.remove(stmt),
            Statement::DropTable(stmt) => self.drop_table(stmt),
        }
    }

    fn check_table_name(&self, table: &str) -> Result<()> {
        if !self.engine.is_table(table) {
            return Err(Error::TableNotFound(table.to_string()));
        }
        Ok(())
    }

    fn create_table(&mut self, stmt: CreateTable) -> Result<()> {
        let mut primary_key = None;
        for column in &stmt.columns {
            if column.primary_key {
                if primary_key.is_some() {
                    return Err(Error::Invalid(
                        "more than one PRIMARY KEY column".to_string(),
                    ));
                }
                primary_key = Some(column.name.clone());
            }
        }
        let Some(primary_key) = primary_key else {
            return Err(Error::Invalid(
                "CREATE TABLE requires a PRIMARY KEY column".to_string(),
            ));
        };

        // Types and names go to the engine as parallel lists in source
        // order; the engine is the authority on collisions and type
        // legality.
        let (types, names) = stmt
            .columns
            .iter()
            .map(|c| (c.ty, c.name.clone()))
            .unzip();
        self.engine
            .create_table(&stmt.table, &primary_key, types, names)?;
        info!(table = %stmt.table, "created table");
        Ok(())
    }

    fn create_index(&mut self, stmt: CreateIndex) -> Result<()> {
        self.check_table_name(&stmt.table)?;
        let attributes = self.engine.table_attributes(&stmt.table)?;
        if !attributes.contains(&stmt.column) {
            return Err(Error::ColumnNotFound(stmt.column));
        }
        self.engine
            .create_index(&stmt.table, &stmt.column, stmt.kind)?;
        info!(table = %stmt.table, column = %stmt.column, "created index");
        Ok(())
    }

    fn select(&mut self, stmt: Select) -> Result<()> {
        self.check_table_name(&stmt.table)?;
        let sorted_columns = self.resolve_columns(&stmt.table, &stmt.columns)?;

        if stmt.constraint.is_empty() {
            let response = self.engine.load(&stmt.table, &sorted_columns, None)?;
            debug!(records = response.records.len(), "full table load");
            self.emit(response, sorted_columns);
            return Ok(());
        }

        let mut combined = QueryResponse::default();
        for conjunct in &stmt.constraint.disjuncts {
            let plan = plan::compile(&*self.engine, &stmt.table, conjunct)?;

            let Some(driver) = plan.driver else {
                // No indexed column in this AND-group: one filtered
                // full scan stands in for the whole disjunction and the
                // remaining disjuncts are not executed.
                debug!(table = %stmt.table, "unindexed disjunct, scanning");
                combined = self
                    .engine
                    .load(&stmt.table, &sorted_columns, Some(&plan.residual))?;
                break;
            };

            let key = Attribute::new(driver.column, driver.value);
            let partial = match driver.op {
                CompOp::Eq => {
                    self.engine
                        .search(&stmt.table, key, &plan.residual, &sorted_columns)?
                }
                CompOp::Lt | CompOp::LtEq => self.engine.range_search(
                    &stmt.table,
                    KeyBound::Min,
                    KeyBound::Key(key),
                    &plan.residual,
                    &sorted_columns,
                )?,
                CompOp::Gt | CompOp::GtEq => self.engine.range_search(
                    &stmt.table,
                    KeyBound::Key(key),
                    KeyBound::Max,
                    &plan.residual,
                    &sorted_columns,
                )?,
            };

            merge::merge_times(&mut combined.query_times, partial.query_times);
            combined.records = merge::merge_records(std::mem::take(&mut combined.records), partial.records);
        }

        self.emit(combined, sorted_columns);
        Ok(())
    }

    fn select_between(&mut self, stmt: SelectBetween) -> Result<()> {
        self.check_table_name(&stmt.table)?;
        let sorted_columns = self.resolve_columns(&stmt.table, &stmt.columns)?;

        let response = self.engine.range_search(
            &stmt.table,
            KeyBound::Key(Attribute::new(stmt.key_column.clone(), stmt.low)),
            KeyBound::Key(Attribute::new(stmt.key_column, stmt.high)),
            &Residual::always(),
            &sorted_columns,
        )?;
        self.emit(response, sorted_columns);
        Ok(())
    }

    fn insert(&mut self, stmt: Insert) -> Result<()> {
        self.check_table_name(&stmt.table)?;
        for row in stmt.rows {
            self.engine.add(&stmt.table, row)?;
        }
        Ok(())
    }

    fn insert_from_file(&mut self, stmt: InsertFromFile) -> Result<()> {
        self.check_table_name(&stmt.table)?;
        info!(table = %stmt.table, path = %stmt.path, "bulk CSV load");
        self.engine
            .csv_insert(&stmt.table, stmt.path.as_ref())?;
        Ok(())
    }

    fn remove(&mut self, stmt: Delete) -> Result<()> {
        self.check_table_name(&stmt.table)?;
        // Single-key delete: only the first condition of the first
        // disjunct names the key, everything else is ignored.
        let Some(condition) = stmt
            .constraint
            .disjuncts
            .first()
            .and_then(|conjunct| conjunct.first())
        else {
            return Err(Error::Invalid(
                "DELETE requires at least one condition".to_string(),
            ));
        };
        self.engine.remove(
            &stmt.table,
            Attribute::new(condition.column.clone(), condition.value.clone()),
        )?;
        Ok(())
    }

    fn drop_table(&mut self, stmt: DropTable) -> Result<()> {
        self.engine.drop_table(&stmt.table)?;
        info!(table = %stmt.table, "dropped table");
        Ok(())
    }

    /// Requested columns, validated against the table and reordered to
    /// schema order. An empty request means every column.
    fn resolve_columns(&self, table: &str, requested: &[String]) -> Result<Vec<String>> {
        let attributes = self.engine.table_attributes(table)?;
        if requested.is_empty() {
            return Ok(attributes);
        }
        for column in requested {
            if !attributes.contains(column) {
                return Err(Error::ColumnNotFound(column.clone()));
            }
        }
        Ok(self.engine.sort_attributes(table, requested)?)
    }

    /// Copies a query response into the session response, together with
    /// the current table list and the schema-ordered column names.
    fn emit(&mut self, response: QueryResponse, sorted_columns: Vec<String>) {
        self.response.records = response.records;
        self.response.query_times = response.query_times;
        self.response.table_names = self.engine.table_names();
        self.response.column_names = sorted_columns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    use crate::parser::{ColumnType, IndexKind, Parser};
    use crate::storage::{Record, RowComparator, StorageError, StorageResult};

    /// Records every engine operation the executor issues.
    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load {
            columns: Vec<String>,
            residuals: usize,
        },
        Search {
            key: Attribute,
            residuals: usize,
        },
        RangeSearch {
            lo: KeyBound,
            hi: KeyBound,
            residuals: usize,
        },
        Add {
            values: Vec<String>,
        },
        CsvInsert {
            path: PathBuf,
        },
        Remove {
            key: Attribute,
        },
    }

    struct MockEngine {
        attributes: Vec<String>,
        indexed: Vec<String>,
        calls: RefCell<Vec<Call>>,
    }

    impl MockEngine {
        fn new(attributes: &[&str], indexed: &[&str]) -> Self {
            Self {
                attributes: attributes.iter().map(|s| s.to_string()).collect(),
                indexed: indexed.iter().map(|s| s.to_string()).collect(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl Engine for MockEngine {
        fn is_table(&self, table: &str) -> bool {
            table == "t"
        }

        fn table_names(&self) -> Vec<String> {
            vec!["t".to_string()]
        }

        fn table_attributes(&self, table: &str) -> StorageResult<Vec<String>> {
            if table == "t" {
                Ok(self.attributes.clone())
            } else {
                Err(StorageError::TableNotFound(table.to_string()))
            }
        }

        fn sort_attributes(&self, _table: &str, columns: &[String]) -> StorageResult<Vec<String>> {
            Ok(self
                .attributes
                .iter()
                .filter(|name| columns.contains(*name))
                .cloned()
                .collect())
        }

        fn index_names(&self, _table: &str) -> StorageResult<Vec<String>> {
            Ok(self.indexed.clone())
        }

        fn comparator(
            &self,
            _table: &str,
            _op: CompOp,
            _column: &str,
            _value: &str,
        ) -> StorageResult<RowComparator> {
            Ok(Box::new(|_: &Record| true))
        }

        fn create_table(
            &mut self,
            _table: &str,
            _primary_key: &str,
            _types: Vec<ColumnType>,
            _names: Vec<String>,
        ) -> StorageResult<()> {
            Ok(())
        }

        fn create_index(
            &mut self,
            _table: &str,
            _column: &str,
            _kind: IndexKind,
        ) -> StorageResult<()> {
            Ok(())
        }

        fn load(
            &self,
            _table: &str,
            columns: &[String],
            residual: Option<&Residual>,
        ) -> StorageResult<QueryResponse> {
            self.calls.borrow_mut().push(Call::Load {
                columns: columns.to_vec(),
                residuals: residual.map_or(0, Residual::len),
            });
            Ok(QueryResponse::default())
        }

        fn search(
            &self,
            _table: &str,
            key: Attribute,
            residual: &Residual,
            _columns: &[String],
        ) -> StorageResult<QueryResponse> {
            self.calls.borrow_mut().push(Call::Search {
                key,
                residuals: residual.len(),
            });
            Ok(QueryResponse::default())
        }

        fn range_search(
            &self,
            _table: &str,
            lo: KeyBound,
            hi: KeyBound,
            residual: &Residual,
            _columns: &[String],
        ) -> StorageResult<QueryResponse> {
            self.calls.borrow_mut().push(Call::RangeSearch {
                lo,
                hi,
                residuals: residual.len(),
            });
            Ok(QueryResponse::default())
        }

        fn add(&mut self, _table: &str, values: Vec<String>) -> StorageResult<()> {
            self.calls.borrow_mut().push(Call::Add { values });
            Ok(())
        }

        fn csv_insert(&mut self, _table: &str, path: &Path) -> StorageResult<()> {
            self.calls.borrow_mut().push(Call::CsvInsert {
                path: path.to_path_buf(),
            });
            Ok(())
        }

        fn remove(&mut self, _table: &str, key: Attribute) -> StorageResult<()> {
            self.calls.borrow_mut().push(Call::Remove { key });
            Ok(())
        }

        fn drop_table(&mut self, _table: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    fn dispatch(engine: &mut MockEngine, sql: &str) -> Result<SessionResponse> {
        let statement = Parser::parse_one(sql).unwrap();
        let mut response = SessionResponse::new();
        Executor::new(engine, &mut response).dispatch(statement)?;
        Ok(response)
    }

    #[test]
    fn test_indexed_lower_bound_becomes_open_ended_range() {
        let mut engine = MockEngine::new(&["id", "name", "age"], &["id"]);
        dispatch(&mut engine, "SELECT * FROM t WHERE id >= 10 AND age < 30").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::RangeSearch {
                lo: KeyBound::Key(Attribute::new("id", "10")),
                hi: KeyBound::Max,
                residuals: 1,
            }]
        );
    }

    #[test]
    fn test_indexed_upper_bound_ranges_from_key_min() {
        let mut engine = MockEngine::new(&["id", "name"], &["id"]);
        dispatch(&mut engine, "SELECT * FROM t WHERE id <= 9").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::RangeSearch {
                lo: KeyBound::Min,
                hi: KeyBound::Key(Attribute::new("id", "9")),
                residuals: 0,
            }]
        );
    }

    #[test]
    fn test_unindexed_disjunct_short_circuits_the_or_loop() {
        // Intentional behavior carried over from the planner design: the
        // filtered scan for the first unindexed disjunct subsumes the
        // rest, so `b = 2` is never executed.
        let mut engine = MockEngine::new(&["a", "b"], &[]);
        dispatch(&mut engine, "SELECT * FROM t WHERE a = 1 OR b = 2").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::Load {
                columns: vec!["a".to_string(), "b".to_string()],
                residuals: 1,
            }]
        );
    }

    #[test]
    fn test_indexed_disjuncts_each_issue_a_search() {
        let mut engine = MockEngine::new(&["id", "name"], &["id"]);
        dispatch(&mut engine, "SELECT name FROM t WHERE id = 5 OR id = 7").unwrap();
        assert_eq!(
            engine.calls(),
            vec![
                Call::Search {
                    key: Attribute::new("id", "5"),
                    residuals: 0,
                },
                Call::Search {
                    key: Attribute::new("id", "7"),
                    residuals: 0,
                },
            ]
        );
    }

    #[test]
    fn test_driver_is_first_indexed_condition_in_source_order() {
        let mut engine = MockEngine::new(&["id", "age"], &["id", "age"]);
        dispatch(&mut engine, "SELECT * FROM t WHERE age < 30 AND id = 5").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::RangeSearch {
                lo: KeyBound::Min,
                hi: KeyBound::Key(Attribute::new("age", "30")),
                residuals: 1,
            }]
        );
    }

    #[test]
    fn test_between_is_one_closed_range_with_true_predicate() {
        let mut engine = MockEngine::new(&["id", "name"], &["id"]);
        dispatch(&mut engine, "SELECT * FROM t WHERE id BETWEEN 3 AND 9").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::RangeSearch {
                lo: KeyBound::Key(Attribute::new("id", "3")),
                hi: KeyBound::Key(Attribute::new("id", "9")),
                residuals: 0,
            }]
        );
    }

    #[test]
    fn test_empty_where_is_one_unfiltered_load() {
        let mut engine = MockEngine::new(&["id", "name"], &["id"]);
        dispatch(&mut engine, "SELECT * FROM t").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::Load {
                columns: vec!["id".to_string(), "name".to_string()],
                residuals: 0,
            }]
        );
    }

    #[test]
    fn test_insert_reaches_engine_in_textual_order() {
        let mut engine = MockEngine::new(&["id", "name", "ok"], &[]);
        dispatch(&mut engine, "INSERT INTO t VALUES (1, 'ada', true)").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::Add {
                values: vec!["1".to_string(), "ada".to_string(), "true".to_string()],
            }]
        );
    }

    #[test]
    fn test_csv_path_reaches_engine_without_quotes() {
        let mut engine = MockEngine::new(&["id"], &[]);
        dispatch(&mut engine, "COPY t FROM '/data/rows.csv'").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::CsvInsert {
                path: PathBuf::from("/data/rows.csv"),
            }]
        );
    }

    #[test]
    fn test_delete_uses_only_the_first_condition() {
        let mut engine = MockEngine::new(&["id", "age"], &["id"]);
        dispatch(&mut engine, "DELETE FROM t WHERE id = 5 AND age = 7").unwrap();
        assert_eq!(
            engine.calls(),
            vec![Call::Remove {
                key: Attribute::new("id", "5"),
            }]
        );
    }

    #[test]
    fn test_unknown_column_leaves_engine_untouched() {
        let mut engine = MockEngine::new(&["id"], &[]);
        let result = dispatch(&mut engine, "SELECT nope FROM t");
        assert!(matches!(result, Err(Error::ColumnNotFound(_))));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_unknown_table_leaves_engine_untouched() {
        let mut engine = MockEngine::new(&["id"], &[]);
        let result = dispatch(&mut engine, "SELECT id FROM nonesuch");
        assert!(matches!(result, Err(Error::TableNotFound(_))));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_create_table_requires_exactly_one_primary_key() {
        let mut engine = MockEngine::new(&["id"], &[]);
        let result = dispatch(&mut engine, "CREATE TABLE u (a INT, b INT)");
        assert!(matches!(result, Err(Error::Invalid(_))));

        let result = dispatch(
            &mut engine,
            "CREATE TABLE u (a INT PRIMARY KEY, b INT PRIMARY KEY)",
        );
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn test_requested_column_order_is_ignored() {
        let mut engine = MockEngine::new(&["id", "name", "age"], &[]);
        let response = dispatch(&mut engine, "SELECT age, id FROM t").unwrap();
        assert_eq!(
            response.column_names,
            vec!["id".to_string(), "age".to_string()]
        );
    }
}
