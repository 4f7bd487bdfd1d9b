//! In-memory reference engine.
//!
//! Tables live in a catalog map; rows occupy stable slots so index
//! postings survive deletions. Each indexed column keeps either an
//! ordered map (btree / sequential kinds) or a hash map (hash kind) from
//! typed value to row slots. A range over a hash-indexed column falls
//! back to a filtered scan.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::ops::Bound;
use std::path::Path;
use std::time::Instant;

use tracing::{debug, warn};

use crate::parser::{ColumnType, CompOp, IndexKind};

use super::engine::{Attribute, Engine, KeyBound, QueryResponse, Residual, RowComparator};
use super::error::{StorageError, StorageResult};
use super::record::Record;

/// A field value parsed per its column's declared type.
///
/// Comparison uses the total order (floats via `total_cmp`), so the
/// value can key both ordered and hashed index maps.
#[derive(Debug, Clone)]
enum TypedValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl TypedValue {
    fn parse(ty: ColumnType, column: &str, raw: &str) -> StorageResult<Self> {
        let mismatch = || StorageError::TypeMismatch {
            column: column.to_string(),
            value: raw.to_string(),
        };
        match ty {
            ColumnType::Int => raw.trim().parse().map(TypedValue::Int).map_err(|_| mismatch()),
            ColumnType::Float => raw
                .trim()
                .parse()
                .map(TypedValue::Float)
                .map_err(|_| mismatch()),
            ColumnType::Bool => {
                if raw.eq_ignore_ascii_case("true") {
                    Ok(TypedValue::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") {
                    Ok(TypedValue::Bool(false))
                } else {
                    Err(mismatch())
                }
            }
            ColumnType::Varchar(limit) => {
                if let Some(limit) = limit {
                    if raw.chars().count() > limit as usize {
                        return Err(mismatch());
                    }
                }
                Ok(TypedValue::Text(raw.to_string()))
            }
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TypedValue::Int(_) => 0,
            TypedValue::Float(_) => 1,
            TypedValue::Bool(_) => 2,
            TypedValue::Text(_) => 3,
        }
    }
}

impl Ord for TypedValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TypedValue::Int(a), TypedValue::Int(b)) => a.cmp(b),
            (TypedValue::Float(a), TypedValue::Float(b)) => a.total_cmp(b),
            (TypedValue::Bool(a), TypedValue::Bool(b)) => a.cmp(b),
            (TypedValue::Text(a), TypedValue::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for TypedValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TypedValue {}

impl Hash for TypedValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u8(self.rank());
        match self {
            TypedValue::Int(i) => i.hash(state),
            TypedValue::Float(f) => state.write_u64(f.to_bits()),
            TypedValue::Bool(b) => b.hash(state),
            TypedValue::Text(s) => s.hash(state),
        }
    }
}

#[derive(Debug, Clone)]
struct Column {
    name: String,
    ty: ColumnType,
}

#[derive(Debug)]
enum IndexData {
    Ordered(BTreeMap<TypedValue, Vec<usize>>),
    Hashed(HashMap<TypedValue, Vec<usize>>),
}

impl IndexData {
    fn insert(&mut self, value: TypedValue, slot: usize) {
        match self {
            IndexData::Ordered(map) => map.entry(value).or_default().push(slot),
            IndexData::Hashed(map) => map.entry(value).or_default().push(slot),
        }
    }

    fn remove(&mut self, value: &TypedValue, slot: usize) {
        let slots = match self {
            IndexData::Ordered(map) => map.get_mut(value),
            IndexData::Hashed(map) => map.get_mut(value),
        };
        if let Some(slots) = slots {
            slots.retain(|&s| s != slot);
            if slots.is_empty() {
                match self {
                    IndexData::Ordered(map) => {
                        map.remove(value);
                    }
                    IndexData::Hashed(map) => {
                        map.remove(value);
                    }
                }
            }
        }
    }

    fn get(&self, value: &TypedValue) -> &[usize] {
        let slots = match self {
            IndexData::Ordered(map) => map.get(value),
            IndexData::Hashed(map) => map.get(value),
        };
        slots.map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug)]
struct Index {
    kind: IndexKind,
    data: IndexData,
}

#[derive(Debug)]
struct Table {
    columns: Vec<Column>,
    primary_key: String,
    /// Stable slots; `None` marks a deleted row.
    rows: Vec<Option<Record>>,
    indexes: BTreeMap<String, Index>,
}

impl Table {
    fn column_index(&self, name: &str) -> StorageResult<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| StorageError::ColumnNotFound(name.to_string()))
    }

    fn column_type(&self, name: &str) -> StorageResult<ColumnType> {
        Ok(self.columns[self.column_index(name)?].ty)
    }

    fn live_rows(&self) -> impl Iterator<Item = (usize, &Record)> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(slot, row)| row.as_ref().map(|rec| (slot, rec)))
    }

    fn typed_field(&self, record: &Record, column_idx: usize) -> StorageResult<TypedValue> {
        let column = &self.columns[column_idx];
        let raw = record.get(column_idx).unwrap_or_default();
        TypedValue::parse(column.ty, &column.name, raw)
    }

    fn projection(&self, columns: &[String]) -> StorageResult<Vec<usize>> {
        columns.iter().map(|c| self.column_index(c)).collect()
    }
}

/// The in-memory storage engine.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: BTreeMap<String, Table>,
}

impl MemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, name: &str) -> StorageResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> StorageResult<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    /// Collects `slots` in order, filtered by `residual` and projected
    /// to `projection`.
    fn collect(
        table: &Table,
        slots: impl IntoIterator<Item = usize>,
        residual: &Residual,
        projection: &[usize],
    ) -> Vec<Record> {
        slots
            .into_iter()
            .filter_map(|slot| table.rows.get(slot).and_then(Option::as_ref))
            .filter(|rec| residual.matches(rec))
            .map(|rec| rec.project(projection))
            .collect()
    }
}

impl Engine for MemoryEngine {
    fn is_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn table_attributes(&self, table: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .table(table)?
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect())
    }

    fn sort_attributes(&self, table: &str, columns: &[String]) -> StorageResult<Vec<String>> {
        Ok(self
            .table(table)?
            .columns
            .iter()
            .map(|c| &c.name)
            .filter(|name| columns.contains(*name))
            .cloned()
            .collect())
    }

    fn index_names(&self, table: &str) -> StorageResult<Vec<String>> {
        Ok(self.table(table)?.indexes.keys().cloned().collect())
    }

    fn comparator(
        &self,
        table: &str,
        op: CompOp,
        column: &str,
        value: &str,
    ) -> StorageResult<RowComparator> {
        let table = self.table(table)?;
        let column_idx = table.column_index(column)?;
        let ty = table.columns[column_idx].ty;
        let target = TypedValue::parse(ty, column, value)?;
        let column = column.to_string();
        Ok(Box::new(move |record: &Record| {
            let raw = record.get(column_idx).unwrap_or_default();
            match TypedValue::parse(ty, &column, raw) {
                Ok(field) => op.matches(field.cmp(&target)),
                Err(_) => false,
            }
        }))
    }

    fn create_table(
        &mut self,
        table: &str,
        primary_key: &str,
        types: Vec<ColumnType>,
        names: Vec<String>,
    ) -> StorageResult<()> {
        if self.tables.contains_key(table) {
            return Err(StorageError::TableExists(table.to_string()));
        }
        if types.len() != names.len() {
            return Err(StorageError::ArityMismatch {
                expected: names.len(),
                got: types.len(),
            });
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(StorageError::DuplicateColumn(name.clone()));
            }
        }
        if !names.iter().any(|n| n == primary_key) {
            return Err(StorageError::ColumnNotFound(primary_key.to_string()));
        }

        let columns = names
            .into_iter()
            .zip(types)
            .map(|(name, ty)| Column { name, ty })
            .collect();
        self.tables.insert(
            table.to_string(),
            Table {
                columns,
                primary_key: primary_key.to_string(),
                rows: Vec::new(),
                indexes: BTreeMap::new(),
            },
        );
        debug!(table, "created table");
        Ok(())
    }

    fn create_index(&mut self, table: &str, column: &str, kind: IndexKind) -> StorageResult<()> {
        let table_ref = self.table_mut(table)?;
        let column_idx = table_ref.column_index(column)?;
        if table_ref.indexes.contains_key(column) {
            return Err(StorageError::IndexExists(column.to_string()));
        }

        let mut data = match kind {
            IndexKind::Hash => IndexData::Hashed(HashMap::new()),
            IndexKind::BTree | IndexKind::Sequential => IndexData::Ordered(BTreeMap::new()),
        };
        let entries = table_ref
            .live_rows()
            .map(|(slot, rec)| Ok((slot, table_ref.typed_field(rec, column_idx)?)))
            .collect::<StorageResult<Vec<_>>>()?;
        for (slot, value) in entries {
            data.insert(value, slot);
        }
        table_ref
            .indexes
            .insert(column.to_string(), Index { kind, data });
        debug!(table, column, ?kind, "created index");
        Ok(())
    }

    fn load(
        &self,
        table: &str,
        columns: &[String],
        residual: Option<&Residual>,
    ) -> StorageResult<QueryResponse> {
        let start = Instant::now();
        let table = self.table(table)?;
        let projection = table.projection(columns)?;
        let always = Residual::always();
        let residual = residual.unwrap_or(&always);
        let slots: Vec<usize> = table.live_rows().map(|(slot, _)| slot).collect();
        let records = Self::collect(table, slots, residual, &projection);

        let mut response = QueryResponse {
            records,
            ..Default::default()
        };
        response
            .query_times
            .insert("table load".to_string(), start.elapsed());
        Ok(response)
    }

    fn search(
        &self,
        table: &str,
        key: Attribute,
        residual: &Residual,
        columns: &[String],
    ) -> StorageResult<QueryResponse> {
        let start = Instant::now();
        let table_ref = self.table(table)?;
        let projection = table_ref.projection(columns)?;
        let column_idx = table_ref.column_index(&key.name)?;
        let ty = table_ref.columns[column_idx].ty;
        let target = TypedValue::parse(ty, &key.name, &key.value)?;

        let slots: Vec<usize> = match table_ref.indexes.get(&key.name) {
            Some(index) => index.data.get(&target).to_vec(),
            None => {
                warn!(table, column = %key.name, "point search without an index, scanning");
                table_ref
                    .live_rows()
                    .filter(|(_, rec)| {
                        table_ref
                            .typed_field(rec, column_idx)
                            .is_ok_and(|v| v == target)
                    })
                    .map(|(slot, _)| slot)
                    .collect()
            }
        };
        let records = Self::collect(table_ref, slots, residual, &projection);

        let mut response = QueryResponse {
            records,
            ..Default::default()
        };
        response
            .query_times
            .insert("index search".to_string(), start.elapsed());
        Ok(response)
    }

    fn range_search(
        &self,
        table: &str,
        lo: KeyBound,
        hi: KeyBound,
        residual: &Residual,
        columns: &[String],
    ) -> StorageResult<QueryResponse> {
        let start = Instant::now();
        let table_ref = self.table(table)?;
        let projection = table_ref.projection(columns)?;

        let column = match (lo.key(), hi.key()) {
            (Some(a), Some(b)) if a.name != b.name => {
                return Err(StorageError::InvalidRange(format!(
                    "{} vs {}",
                    a.name, b.name
                )));
            }
            (Some(a), _) => Some(a.name.clone()),
            (_, Some(b)) => Some(b.name.clone()),
            (None, None) => None,
        };

        let records = match column {
            None => {
                // Both endpoints open: the range is the whole table.
                let slots: Vec<usize> = table_ref.live_rows().map(|(slot, _)| slot).collect();
                Self::collect(table_ref, slots, residual, &projection)
            }
            Some(column) => {
                let column_idx = table_ref.column_index(&column)?;
                let ty = table_ref.columns[column_idx].ty;
                let lo_bound = match lo.key() {
                    Some(attr) => Bound::Included(TypedValue::parse(ty, &column, &attr.value)?),
                    None => Bound::Unbounded,
                };
                let hi_bound = match hi.key() {
                    Some(attr) => Bound::Included(TypedValue::parse(ty, &column, &attr.value)?),
                    None => Bound::Unbounded,
                };

                // BTreeMap::range panics on an inverted range; an empty
                // result is the right answer for one.
                let inverted = matches!(
                    (&lo_bound, &hi_bound),
                    (Bound::Included(lo), Bound::Included(hi)) if lo > hi
                );

                let slots: Vec<usize> = match table_ref.indexes.get(&column) {
                    _ if inverted => Vec::new(),
                    Some(Index {
                        data: IndexData::Ordered(map),
                        ..
                    }) => map
                        .range((lo_bound, hi_bound))
                        .flat_map(|(_, slots)| slots.iter().copied())
                        .collect(),
                    other => {
                        if other.is_some() {
                            warn!(table, %column, "range over a hash index, scanning");
                        } else {
                            warn!(table, %column, "range search without an index, scanning");
                        }
                        let within = |value: &TypedValue| {
                            let above = match &lo_bound {
                                Bound::Included(lo) => value >= lo,
                                _ => true,
                            };
                            let below = match &hi_bound {
                                Bound::Included(hi) => value <= hi,
                                _ => true,
                            };
                            above && below
                        };
                        table_ref
                            .live_rows()
                            .filter(|(_, rec)| {
                                table_ref
                                    .typed_field(rec, column_idx)
                                    .is_ok_and(|v| within(&v))
                            })
                            .map(|(slot, _)| slot)
                            .collect()
                    }
                };
                Self::collect(table_ref, slots, residual, &projection)
            }
        };

        let mut response = QueryResponse {
            records,
            ..Default::default()
        };
        response
            .query_times
            .insert("range search".to_string(), start.elapsed());
        Ok(response)
    }

    fn add(&mut self, table: &str, values: Vec<String>) -> StorageResult<()> {
        let table_ref = self.table_mut(table)?;
        if values.len() != table_ref.columns.len() {
            return Err(StorageError::ArityMismatch {
                expected: table_ref.columns.len(),
                got: values.len(),
            });
        }

        let record = Record::new(values);
        let typed: Vec<TypedValue> = table_ref
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| TypedValue::parse(col.ty, &col.name, record.get(i).unwrap_or_default()))
            .collect::<StorageResult<_>>()?;

        let primary_key = table_ref.primary_key.clone();
        let pk_idx = table_ref.column_index(&primary_key)?;
        let pk_value = &typed[pk_idx];
        let duplicate = match table_ref.indexes.get(&primary_key) {
            Some(index) => !index.data.get(pk_value).is_empty(),
            None => table_ref.live_rows().any(|(_, rec)| {
                table_ref
                    .typed_field(rec, pk_idx)
                    .is_ok_and(|v| v == *pk_value)
            }),
        };
        if duplicate {
            return Err(StorageError::DuplicateKey(
                record.get(pk_idx).unwrap_or_default().to_string(),
            ));
        }

        let slot = table_ref.rows.len();
        for (column, index) in table_ref.indexes.iter_mut() {
            let column_idx = table_ref
                .columns
                .iter()
                .position(|c| &c.name == column)
                .expect("indexed column exists");
            index.data.insert(typed[column_idx].clone(), slot);
        }
        table_ref.rows.push(Some(record));
        Ok(())
    }

    fn csv_insert(&mut self, table: &str, path: &Path) -> StorageResult<()> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_path(path)?;
        let mut loaded = 0usize;
        for row in reader.records() {
            let row = row?;
            self.add(table, row.iter().map(str::to_string).collect())?;
            loaded += 1;
        }
        debug!(table, loaded, "bulk CSV load");
        Ok(())
    }

    fn remove(&mut self, table: &str, key: Attribute) -> StorageResult<()> {
        let table_ref = self.table_mut(table)?;
        let column_idx = table_ref.column_index(&key.name)?;
        let ty = table_ref.columns[column_idx].ty;
        let target = TypedValue::parse(ty, &key.name, &key.value)?;

        let slots: Vec<usize> = match table_ref.indexes.get(&key.name) {
            Some(index) => index.data.get(&target).to_vec(),
            None => table_ref
                .live_rows()
                .filter(|(_, rec)| {
                    table_ref
                        .typed_field(rec, column_idx)
                        .is_ok_and(|v| v == target)
                })
                .map(|(slot, _)| slot)
                .collect(),
        };

        for slot in slots {
            let Some(record) = table_ref.rows[slot].take() else {
                continue;
            };
            let fields: Vec<(String, TypedValue)> = table_ref
                .indexes
                .keys()
                .map(|column| {
                    let idx = table_ref
                        .columns
                        .iter()
                        .position(|c| &c.name == column)
                        .expect("indexed column exists");
                    let value = table_ref.typed_field(&record, idx)?;
                    Ok((column.clone(), value))
                })
                .collect::<StorageResult<_>>()?;
            for (column, value) in fields {
                if let Some(index) = table_ref.indexes.get_mut(&column) {
                    index.data.remove(&value, slot);
                }
            }
        }
        Ok(())
    }

    fn drop_table(&mut self, table: &str) -> StorageResult<()> {
        self.tables
            .remove(table)
            .map(|_| ())
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }
}
