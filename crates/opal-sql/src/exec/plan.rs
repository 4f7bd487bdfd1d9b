//! Predicate compilation: one AND-group into an index-driven plan.

use tracing::debug;

use crate::parser::Condition;
use crate::storage::{Engine, Residual, StorageResult};

/// The execution plan for one conjunct.
pub(crate) struct ConjunctPlan {
    /// The condition driving the index scan, if any column is indexed.
    pub driver: Option<Condition>,
    /// Everything the driver did not absorb, ANDed row-by-row.
    pub residual: Residual,
}

/// Compiles a conjunction against a table's indexes.
///
/// The first condition in source order whose column is indexed becomes
/// the driver; every other condition, indexed or not, lands in the
/// residual as an engine-supplied comparator.
pub(crate) fn compile<E: Engine + ?Sized>(
    engine: &E,
    table: &str,
    conjunct: &[Condition],
) -> StorageResult<ConjunctPlan> {
    let indexes = engine.index_names(table)?;

    let mut driver: Option<Condition> = None;
    let mut residual = Residual::always();
    for condition in conjunct {
        let indexed = indexes.iter().any(|c| c == &condition.column);
        if indexed && driver.is_none() {
            driver = Some(condition.clone());
        } else {
            residual.push(engine.comparator(
                table,
                condition.op,
                &condition.column,
                &condition.value,
            )?);
        }
    }

    debug!(
        table,
        driver = ?driver,
        residuals = residual.len(),
        "compiled conjunct"
    );
    Ok(ConjunctPlan { driver, residual })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ColumnType, CompOp, IndexKind};
    use crate::storage::{MemoryEngine, Record};

    fn engine() -> MemoryEngine {
        let mut engine = MemoryEngine::new();
        engine
            .create_table(
                "t",
                "id",
                vec![ColumnType::Int, ColumnType::Int, ColumnType::Int],
                vec!["id".to_string(), "age".to_string(), "size".to_string()],
            )
            .unwrap();
        engine.create_index("t", "id", IndexKind::BTree).unwrap();
        engine.create_index("t", "age", IndexKind::BTree).unwrap();
        engine
    }

    #[test]
    fn test_first_indexed_condition_drives() {
        let engine = engine();
        let conjunct = vec![
            Condition::new("size", CompOp::Lt, "10"),
            Condition::new("age", CompOp::Gt, "30"),
            Condition::new("id", CompOp::Eq, "5"),
        ];
        let plan = compile(&engine, "t", &conjunct).unwrap();
        assert_eq!(plan.driver, Some(Condition::new("age", CompOp::Gt, "30")));
        // size and id both stay behind as residuals
        assert_eq!(plan.residual.len(), 2);
    }

    #[test]
    fn test_later_indexed_conditions_become_residuals() {
        let engine = engine();
        let conjunct = vec![
            Condition::new("id", CompOp::Eq, "5"),
            Condition::new("age", CompOp::Eq, "7"),
        ];
        let plan = compile(&engine, "t", &conjunct).unwrap();
        assert_eq!(plan.driver, Some(Condition::new("id", CompOp::Eq, "5")));
        assert_eq!(plan.residual.len(), 1);
        assert!(plan.residual.matches(&Record::from_iter(["5", "7", "1"])));
        assert!(!plan.residual.matches(&Record::from_iter(["5", "8", "1"])));
    }

    #[test]
    fn test_no_indexed_column_means_no_driver() {
        let engine = engine();
        let conjunct = vec![Condition::new("size", CompOp::GtEq, "2")];
        let plan = compile(&engine, "t", &conjunct).unwrap();
        assert!(plan.driver.is_none());
        assert_eq!(plan.residual.len(), 1);
    }

    #[test]
    fn test_empty_conjunct_is_constant_true() {
        let engine = engine();
        let plan = compile(&engine, "t", &[]).unwrap();
        assert!(plan.driver.is_none());
        assert!(plan.residual.is_empty());
        assert!(plan.residual.matches(&Record::from_iter(["1", "2", "3"])));
    }
}
