//! Predicate model: comparison conditions in disjunctive normal form.
//!
//! A `WHERE` clause is lowered into a [`Constraint`]: an OR-list of
//! AND-groups of single-column [`Condition`]s. The grammar accepts
//! arbitrary nesting of `AND`/`OR`, so lowering distributes `AND` over
//! `OR` until the tree is flat.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlparser::ast as sql_ast;

use super::{ParseError, ParseResult};

/// A comparison operator. `!=` is not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompOp {
    /// `=`
    Eq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompOp {
    /// Converts from sqlparser's BinaryOperator.
    pub fn from_sql_ast(op: &sql_ast::BinaryOperator) -> ParseResult<Self> {
        match op {
            sql_ast::BinaryOperator::Eq => Ok(CompOp::Eq),
            sql_ast::BinaryOperator::Lt => Ok(CompOp::Lt),
            sql_ast::BinaryOperator::LtEq => Ok(CompOp::LtEq),
            sql_ast::BinaryOperator::Gt => Ok(CompOp::Gt),
            sql_ast::BinaryOperator::GtEq => Ok(CompOp::GtEq),
            sql_ast::BinaryOperator::NotEq => {
                Err(ParseError::Unsupported("<> comparisons".to_string()))
            }
            other => Err(ParseError::Unsupported(format!("operator {other}"))),
        }
    }

    /// The operator with its operands swapped (`5 < a` becomes `a > 5`).
    pub fn flipped(self) -> Self {
        match self {
            CompOp::Eq => CompOp::Eq,
            CompOp::Lt => CompOp::Gt,
            CompOp::LtEq => CompOp::GtEq,
            CompOp::Gt => CompOp::Lt,
            CompOp::GtEq => CompOp::LtEq,
        }
    }

    /// Evaluates the operator on an already-ordered comparison result.
    pub fn matches(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompOp::Eq => ordering == Equal,
            CompOp::Lt => ordering == Less,
            CompOp::LtEq => ordering != Greater,
            CompOp::Gt => ordering == Greater,
            CompOp::GtEq => ordering != Less,
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CompOp::Eq => "=",
            CompOp::Lt => "<",
            CompOp::LtEq => "<=",
            CompOp::Gt => ">",
            CompOp::GtEq => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// A single-column comparison against a literal.
///
/// The value is carried as text; the engine parses it per the column's
/// declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Column the comparison applies to.
    pub column: String,
    /// Comparison operator.
    pub op: CompOp,
    /// Right-hand literal, as written.
    pub value: String,
}

impl Condition {
    /// Creates a condition.
    pub fn new(column: impl Into<String>, op: CompOp, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Lowers a comparison expression. Accepts `column op literal` and
    /// `literal op column` (flipping the operator).
    fn from_sql_ast(expr: sql_ast::Expr) -> ParseResult<Self> {
        match expr {
            sql_ast::Expr::Nested(inner) => Self::from_sql_ast(*inner),
            sql_ast::Expr::BinaryOp { left, op, right } => {
                let op = CompOp::from_sql_ast(&op)?;
                match (*left, *right) {
                    (sql_ast::Expr::Identifier(column), sql_ast::Expr::Value(value)) => {
                        Ok(Self::new(column.value, op, literal_text(&value)?))
                    }
                    (sql_ast::Expr::Value(value), sql_ast::Expr::Identifier(column)) => {
                        Ok(Self::new(column.value, op.flipped(), literal_text(&value)?))
                    }
                    (left, right) => Err(ParseError::Unsupported(format!(
                        "comparison between {left} and {right}"
                    ))),
                }
            }
            other => Err(ParseError::Unsupported(format!("predicate {other}"))),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.column, self.op, self.value)
    }
}

/// A `WHERE` clause in disjunctive normal form: an OR of ANDs.
///
/// An empty outer list means "no WHERE clause" and selects everything.
/// Inner lists are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    /// The OR-list; each entry is one AND-group.
    pub disjuncts: Vec<Vec<Condition>>,
}

impl Constraint {
    /// The empty constraint (no WHERE clause).
    pub fn none() -> Self {
        Self::default()
    }

    /// A constraint made of a single AND-group.
    pub fn conjunction(conditions: Vec<Condition>) -> Self {
        Self {
            disjuncts: vec![conditions],
        }
    }

    /// True if there is no WHERE clause.
    pub fn is_empty(&self) -> bool {
        self.disjuncts.is_empty()
    }

    /// Lowers a boolean expression into DNF, distributing `AND` over `OR`.
    pub fn from_expr(expr: sql_ast::Expr) -> ParseResult<Self> {
        Ok(Self {
            disjuncts: dnf(expr)?,
        })
    }
}

fn dnf(expr: sql_ast::Expr) -> ParseResult<Vec<Vec<Condition>>> {
    match expr {
        sql_ast::Expr::Nested(inner) => dnf(*inner),
        sql_ast::Expr::BinaryOp {
            left,
            op: sql_ast::BinaryOperator::Or,
            right,
        } => {
            let mut disjuncts = dnf(*left)?;
            disjuncts.extend(dnf(*right)?);
            Ok(disjuncts)
        }
        sql_ast::Expr::BinaryOp {
            left,
            op: sql_ast::BinaryOperator::And,
            right,
        } => {
            // (a OR b) AND (c OR d) -> ac OR ad OR bc OR bd
            let left = dnf(*left)?;
            let right = dnf(*right)?;
            let mut disjuncts = Vec::with_capacity(left.len() * right.len());
            for l in &left {
                for r in &right {
                    let mut conjunct = l.clone();
                    conjunct.extend(r.iter().cloned());
                    disjuncts.push(conjunct);
                }
            }
            Ok(disjuncts)
        }
        sql_ast::Expr::Between {
            expr,
            negated: false,
            low,
            high,
        } => {
            // a BETWEEN x AND y nested in a larger predicate becomes
            // the pair a >= x AND a <= y.
            let column = match *expr {
                sql_ast::Expr::Identifier(ident) => ident.value,
                other => {
                    return Err(ParseError::Unsupported(format!("BETWEEN over {other}")));
                }
            };
            let low = literal_expr_text(*low)?;
            let high = literal_expr_text(*high)?;
            Ok(vec![vec![
                Condition::new(column.clone(), CompOp::GtEq, low),
                Condition::new(column, CompOp::LtEq, high),
            ]])
        }
        sql_ast::Expr::Between { negated: true, .. } => {
            Err(ParseError::Unsupported("NOT BETWEEN".to_string()))
        }
        sql_ast::Expr::UnaryOp {
            op: sql_ast::UnaryOperator::Not,
            ..
        } => Err(ParseError::Unsupported("NOT predicates".to_string())),
        leaf => Ok(vec![vec![Condition::from_sql_ast(leaf)?]]),
    }
}

/// Renders a literal as the text value the engine will parse per column
/// type.
pub(crate) fn literal_text(value: &sql_ast::Value) -> ParseResult<String> {
    match value {
        sql_ast::Value::Number(n, _) => Ok(n.clone()),
        sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
            Ok(s.clone())
        }
        sql_ast::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(ParseError::InvalidLiteral(other.to_string())),
    }
}

/// Like [`literal_text`], starting from an expression node.
pub(crate) fn literal_expr_text(expr: sql_ast::Expr) -> ParseResult<String> {
    match expr {
        sql_ast::Expr::Value(value) => literal_text(&value),
        other => Err(ParseError::InvalidLiteral(other.to_string())),
    }
}
