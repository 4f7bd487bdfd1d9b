//! SQL parser for OpalDB.
//!
//! Parsing is delegated to the `sqlparser` crate (PostgreSQL dialect);
//! this module lowers its AST into the statement and predicate types the
//! executor dispatches on.
//!
//! # Supported SQL
//!
//! - `CREATE TABLE` with exactly one `PRIMARY KEY` column
//! - `CREATE INDEX ... USING {btree|hash|seq}`
//! - `SELECT` with `WHERE` predicates built from `AND`/`OR` over
//!   `=`, `<`, `<=`, `>`, `>=` comparisons, and `BETWEEN`
//! - `INSERT INTO ... VALUES`
//! - `COPY ... FROM 'file.csv'` (bulk CSV load)
//! - `DELETE FROM ... WHERE` (single-key delete)
//! - `DROP TABLE`

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;
use thiserror::Error;

mod condition;
mod statement;

pub use condition::{CompOp, Condition, Constraint};
pub use statement::{
    ColumnSpec, ColumnType, CreateIndex, CreateTable, Delete, DropTable, IndexKind, Insert,
    InsertFromFile, Select, SelectBetween, Statement,
};

/// Errors that can occur while turning SQL text into statements.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Rejected by the underlying grammar.
    #[error("SQL syntax error: {0}")]
    Syntax(String),

    /// Parsed, but uses a feature this executor does not model.
    #[error("unsupported SQL: {0}")]
    Unsupported(String),

    /// A literal that cannot be carried as a column value.
    #[error("invalid literal: {0}")]
    InvalidLiteral(String),

    /// Blank input.
    #[error("empty query")]
    EmptyQuery,
}

impl From<sqlparser::parser::ParserError> for ParseError {
    fn from(err: sqlparser::parser::ParserError) -> Self {
        ParseError::Syntax(err.to_string())
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// SQL parser: text in, typed statements out.
pub struct Parser;

impl Parser {
    /// Parses a SQL string into a list of statements.
    pub fn parse(sql: &str) -> ParseResult<Vec<Statement>> {
        if sql.trim().is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        let dialect = PostgreSqlDialect {};
        let ast = SqlParser::parse_sql(&dialect, sql)?;

        if ast.is_empty() {
            return Err(ParseError::EmptyQuery);
        }

        ast.into_iter().map(Statement::from_sql_ast).collect()
    }

    /// Parses a single SQL statement.
    pub fn parse_one(sql: &str) -> ParseResult<Statement> {
        let mut statements = Self::parse(sql)?;
        if statements.len() != 1 {
            return Err(ParseError::Syntax(format!(
                "expected 1 statement, got {}",
                statements.len()
            )));
        }
        Ok(statements.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_query() {
        assert!(matches!(Parser::parse("  \n"), Err(ParseError::EmptyQuery)));
    }

    #[test]
    fn test_parse_one_rejects_scripts() {
        let result = Parser::parse_one("SELECT a FROM t; SELECT b FROM t;");
        assert!(matches!(result, Err(ParseError::Syntax(_))));
    }

    #[test]
    fn test_parse_script_in_order() {
        let statements = Parser::parse(
            "CREATE TABLE t (id INT PRIMARY KEY); INSERT INTO t VALUES (1); SELECT id FROM t;",
        )
        .unwrap();
        assert_eq!(statements.len(), 3);
        assert!(matches!(statements[0], Statement::CreateTable(_)));
        assert!(matches!(statements[1], Statement::Insert(_)));
        assert!(matches!(statements[2], Statement::Select(_)));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            Parser::parse("SELEKT chaos"),
            Err(ParseError::Syntax(_))
        ));
    }
}
