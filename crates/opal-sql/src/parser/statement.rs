//! Statement lowering: sqlparser AST in, executor statements out.

use serde::{Deserialize, Serialize};
use sqlparser::ast as sql_ast;

use super::condition::literal_expr_text;
use super::{Constraint, ParseError, ParseResult};

/// A parsed SQL statement, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// CREATE TABLE statement.
    CreateTable(CreateTable),
    /// CREATE INDEX statement.
    CreateIndex(CreateIndex),
    /// SELECT query with an optional DNF predicate.
    Select(Select),
    /// SELECT query whose whole predicate is one BETWEEN range.
    SelectBetween(SelectBetween),
    /// INSERT statement.
    Insert(Insert),
    /// Bulk CSV load (`COPY t FROM 'file.csv'`).
    InsertFromFile(InsertFromFile),
    /// DELETE statement (single-key delete).
    Delete(Delete),
    /// DROP TABLE statement.
    DropTable(DropTable),
}

/// Column data types. The engine parses record field text per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// Boolean.
    Bool,
    /// Variable-length string with an optional length cap.
    Varchar(Option<u32>),
}

impl ColumnType {
    /// Converts from sqlparser's DataType.
    pub fn from_sql_ast(dt: &sql_ast::DataType) -> ParseResult<Self> {
        match dt {
            sql_ast::DataType::TinyInt(_)
            | sql_ast::DataType::SmallInt(_)
            | sql_ast::DataType::Int(_)
            | sql_ast::DataType::Integer(_)
            | sql_ast::DataType::BigInt(_) => Ok(ColumnType::Int),
            sql_ast::DataType::Float(_)
            | sql_ast::DataType::Real
            | sql_ast::DataType::Double
            | sql_ast::DataType::DoublePrecision => Ok(ColumnType::Float),
            sql_ast::DataType::Boolean => Ok(ColumnType::Bool),
            sql_ast::DataType::Varchar(len)
            | sql_ast::DataType::CharacterVarying(len)
            | sql_ast::DataType::Char(len) => {
                Ok(ColumnType::Varchar(len.as_ref().and_then(char_length)))
            }
            sql_ast::DataType::Text => Ok(ColumnType::Varchar(None)),
            other => Err(ParseError::Unsupported(format!("data type {other}"))),
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnType::Int => write!(f, "INT"),
            ColumnType::Float => write!(f, "FLOAT"),
            ColumnType::Bool => write!(f, "BOOL"),
            ColumnType::Varchar(Some(n)) => write!(f, "VARCHAR({n})"),
            ColumnType::Varchar(None) => write!(f, "VARCHAR"),
        }
    }
}

fn char_length(cl: &sql_ast::CharacterLength) -> Option<u32> {
    match cl {
        sql_ast::CharacterLength::IntegerLength { length, .. } => Some(*length as u32),
        sql_ast::CharacterLength::Max => None,
    }
}

/// One column of a CREATE TABLE statement, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub ty: ColumnType,
    /// Whether this column carries PRIMARY KEY.
    pub primary_key: bool,
}

/// The index structure backing a CREATE INDEX.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// Ordered B+-tree index; point and range lookups.
    BTree,
    /// Hash index; point lookups only.
    Hash,
    /// Sequential (ISAM-style) ordered index.
    Sequential,
}

impl IndexKind {
    fn from_using(using: Option<&sql_ast::Ident>) -> ParseResult<Self> {
        let Some(ident) = using else {
            return Ok(IndexKind::BTree);
        };
        match ident.value.to_ascii_lowercase().as_str() {
            "btree" | "bplus" => Ok(IndexKind::BTree),
            "hash" => Ok(IndexKind::Hash),
            "seq" | "sequential" | "isam" => Ok(IndexKind::Sequential),
            other => Err(ParseError::Unsupported(format!("index kind {other}"))),
        }
    }
}

/// CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTable {
    /// Table name.
    pub table: String,
    /// Columns in source order.
    pub columns: Vec<ColumnSpec>,
}

/// CREATE INDEX statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateIndex {
    /// Table name.
    pub table: String,
    /// Indexed column.
    pub column: String,
    /// Index structure.
    pub kind: IndexKind,
}

/// SELECT statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    /// Table name.
    pub table: String,
    /// Requested columns in request order; empty means `*`.
    pub columns: Vec<String>,
    /// WHERE clause in DNF; empty means full scan.
    pub constraint: Constraint,
}

/// SELECT whose whole WHERE clause is `key BETWEEN low AND high`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectBetween {
    /// Table name.
    pub table: String,
    /// Requested columns; empty means `*`.
    pub columns: Vec<String>,
    /// Range column.
    pub key_column: String,
    /// Inclusive lower bound, as written.
    pub low: String,
    /// Inclusive upper bound, as written.
    pub high: String,
}

/// INSERT statement. Values are kept in textual order per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insert {
    /// Table name.
    pub table: String,
    /// One entry per VALUES row, fields in textual order.
    pub rows: Vec<Vec<String>>,
}

/// Bulk CSV load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertFromFile {
    /// Table name.
    pub table: String,
    /// Path to the CSV file, without quote characters.
    pub path: String,
}

/// DELETE statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    /// Table name.
    pub table: String,
    /// WHERE clause; only the first condition of the first disjunct is
    /// used as the deletion key.
    pub constraint: Constraint,
}

/// DROP TABLE statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTable {
    /// Table name.
    pub table: String,
}

impl Statement {
    /// Converts from sqlparser's Statement.
    pub fn from_sql_ast(stmt: sql_ast::Statement) -> ParseResult<Self> {
        match stmt {
            sql_ast::Statement::Query(query) => from_query(*query),
            sql_ast::Statement::Insert {
                table_name,
                columns,
                source,
                ..
            } => from_insert(table_name, columns, source),
            sql_ast::Statement::Copy {
                source,
                to,
                target,
                ..
            } => from_copy(source, to, target),
            sql_ast::Statement::Delete {
                from, selection, ..
            } => from_delete(from, selection),
            sql_ast::Statement::CreateTable {
                name,
                columns,
                constraints,
                ..
            } => from_create_table(name, columns, constraints),
            sql_ast::Statement::CreateIndex {
                table_name,
                using,
                columns,
                ..
            } => from_create_index(table_name, using, columns),
            sql_ast::Statement::Drop {
                object_type: sql_ast::ObjectType::Table,
                names,
                ..
            } => from_drop_table(names),
            other => Err(ParseError::Unsupported(format!("statement {other}"))),
        }
    }
}

fn from_query(query: sql_ast::Query) -> ParseResult<Statement> {
    if query.with.is_some() {
        return Err(ParseError::Unsupported("WITH".to_string()));
    }
    if !query.order_by.is_empty() {
        return Err(ParseError::Unsupported("ORDER BY".to_string()));
    }
    if query.limit.is_some() || query.offset.is_some() {
        return Err(ParseError::Unsupported("LIMIT/OFFSET".to_string()));
    }

    let select = match *query.body {
        sql_ast::SetExpr::Select(select) => *select,
        other => {
            return Err(ParseError::Unsupported(format!("query body {other}")));
        }
    };

    if select.distinct.is_some() {
        return Err(ParseError::Unsupported("DISTINCT".to_string()));
    }
    if !matches!(&select.group_by, sql_ast::GroupByExpr::Expressions(exprs) if exprs.is_empty()) {
        return Err(ParseError::Unsupported("GROUP BY".to_string()));
    }
    if select.having.is_some() {
        return Err(ParseError::Unsupported("HAVING".to_string()));
    }

    let table = single_table(select.from)?;
    let columns = projection_columns(select.projection)?;

    // A WHERE clause that is exactly one BETWEEN takes the dedicated
    // range-select path; BETWEEN nested deeper is expanded by the DNF
    // lowering instead.
    if let Some(between) = as_top_level_between(select.selection.clone()) {
        let (key_column, low, high) = between?;
        return Ok(Statement::SelectBetween(SelectBetween {
            table,
            columns,
            key_column,
            low,
            high,
        }));
    }

    let constraint = match select.selection {
        Some(expr) => Constraint::from_expr(expr)?,
        None => Constraint::none(),
    };

    Ok(Statement::Select(Select {
        table,
        columns,
        constraint,
    }))
}

type BetweenParts = ParseResult<(String, String, String)>;

fn as_top_level_between(selection: Option<sql_ast::Expr>) -> Option<BetweenParts> {
    let mut expr = selection?;
    while let sql_ast::Expr::Nested(inner) = expr {
        expr = *inner;
    }
    match expr {
        sql_ast::Expr::Between {
            expr,
            negated: false,
            low,
            high,
        } => {
            let parts = (|| {
                let column = match *expr {
                    sql_ast::Expr::Identifier(ident) => ident.value,
                    other => {
                        return Err(ParseError::Unsupported(format!("BETWEEN over {other}")));
                    }
                };
                Ok((column, literal_expr_text(*low)?, literal_expr_text(*high)?))
            })();
            Some(parts)
        }
        _ => None,
    }
}

fn from_insert(
    table_name: sql_ast::ObjectName,
    columns: Vec<sql_ast::Ident>,
    source: Option<Box<sql_ast::Query>>,
) -> ParseResult<Statement> {
    if !columns.is_empty() {
        return Err(ParseError::Unsupported(
            "INSERT with a column list".to_string(),
        ));
    }
    let Some(query) = source else {
        return Err(ParseError::Unsupported(
            "INSERT without VALUES".to_string(),
        ));
    };
    let values = match *query.body {
        sql_ast::SetExpr::Values(values) => values,
        other => {
            return Err(ParseError::Unsupported(format!("INSERT source {other}")));
        }
    };

    let rows = values
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(literal_expr_text).collect())
        .collect::<ParseResult<Vec<Vec<String>>>>()?;

    Ok(Statement::Insert(Insert {
        table: object_name(table_name)?,
        rows,
    }))
}

fn from_copy(
    source: sql_ast::CopySource,
    to: bool,
    target: sql_ast::CopyTarget,
) -> ParseResult<Statement> {
    if to {
        return Err(ParseError::Unsupported("COPY TO".to_string()));
    }
    let table = match source {
        sql_ast::CopySource::Table {
            table_name,
            columns,
        } if columns.is_empty() => object_name(table_name)?,
        _ => {
            return Err(ParseError::Unsupported(
                "COPY with a column list or query source".to_string(),
            ));
        }
    };
    let path = match target {
        sql_ast::CopyTarget::File { filename } => filename,
        other => {
            return Err(ParseError::Unsupported(format!("COPY target {other}")));
        }
    };
    Ok(Statement::InsertFromFile(InsertFromFile { table, path }))
}

fn from_delete(
    from: Vec<sql_ast::TableWithJoins>,
    selection: Option<sql_ast::Expr>,
) -> ParseResult<Statement> {
    let table = single_table(from)?;
    let Some(expr) = selection else {
        // The deletion key comes from the WHERE clause; without one
        // there is nothing to delete by.
        return Err(ParseError::Unsupported(
            "DELETE without a WHERE clause".to_string(),
        ));
    };
    Ok(Statement::Delete(Delete {
        table,
        constraint: Constraint::from_expr(expr)?,
    }))
}

fn from_create_table(
    name: sql_ast::ObjectName,
    columns: Vec<sql_ast::ColumnDef>,
    constraints: Vec<sql_ast::TableConstraint>,
) -> ParseResult<Statement> {
    if !constraints.is_empty() {
        return Err(ParseError::Unsupported(
            "table-level constraints".to_string(),
        ));
    }
    let columns = columns
        .into_iter()
        .map(|def| {
            let primary_key = def.options.iter().any(|opt| {
                matches!(
                    opt.option,
                    sql_ast::ColumnOption::Unique {
                        is_primary: true,
                        ..
                    }
                )
            });
            Ok(ColumnSpec {
                name: def.name.value,
                ty: ColumnType::from_sql_ast(&def.data_type)?,
                primary_key,
            })
        })
        .collect::<ParseResult<Vec<_>>>()?;

    Ok(Statement::CreateTable(CreateTable {
        table: object_name(name)?,
        columns,
    }))
}

fn from_create_index(
    table_name: sql_ast::ObjectName,
    using: Option<sql_ast::Ident>,
    columns: Vec<sql_ast::OrderByExpr>,
) -> ParseResult<Statement> {
    let kind = IndexKind::from_using(using.as_ref())?;
    let mut columns = columns;
    let column = match (columns.pop(), columns.is_empty()) {
        (Some(order_by), true) => match order_by.expr {
            sql_ast::Expr::Identifier(ident) => ident.value,
            other => {
                return Err(ParseError::Unsupported(format!("index over {other}")));
            }
        },
        _ => {
            return Err(ParseError::Unsupported(
                "indexes span exactly one column".to_string(),
            ));
        }
    };
    Ok(Statement::CreateIndex(CreateIndex {
        table: object_name(table_name)?,
        column,
        kind,
    }))
}

fn from_drop_table(names: Vec<sql_ast::ObjectName>) -> ParseResult<Statement> {
    let mut names = names;
    match (names.pop(), names.is_empty()) {
        (Some(name), true) => Ok(Statement::DropTable(DropTable {
            table: object_name(name)?,
        })),
        _ => Err(ParseError::Unsupported(
            "DROP TABLE with multiple tables".to_string(),
        )),
    }
}

fn single_table(from: Vec<sql_ast::TableWithJoins>) -> ParseResult<String> {
    let mut from = from;
    let item = match (from.pop(), from.is_empty()) {
        (Some(item), true) => item,
        _ => {
            return Err(ParseError::Unsupported(
                "queries over exactly one table".to_string(),
            ));
        }
    };
    if !item.joins.is_empty() {
        return Err(ParseError::Unsupported("JOIN".to_string()));
    }
    match item.relation {
        sql_ast::TableFactor::Table { name, .. } => object_name(name),
        other => Err(ParseError::Unsupported(format!("FROM {other}"))),
    }
}

fn projection_columns(projection: Vec<sql_ast::SelectItem>) -> ParseResult<Vec<String>> {
    if projection.len() == 1 && matches!(projection[0], sql_ast::SelectItem::Wildcard(_)) {
        return Ok(Vec::new());
    }
    projection
        .into_iter()
        .map(|item| match item {
            sql_ast::SelectItem::UnnamedExpr(sql_ast::Expr::Identifier(ident)) => Ok(ident.value),
            other => Err(ParseError::Unsupported(format!("projection {other}"))),
        })
        .collect()
}

fn object_name(name: sql_ast::ObjectName) -> ParseResult<String> {
    let mut parts = name.0;
    match (parts.pop(), parts.is_empty()) {
        (Some(ident), true) => Ok(ident.value),
        _ => Err(ParseError::Unsupported("qualified names".to_string())),
    }
}
