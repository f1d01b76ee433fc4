//! Relational storage for the in-memory engine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::sql::{
    ColumnDef, ColumnType, CreateIndex, CreateTable, Expr, Insert, Operand, Projection, Select,
};
use crate::engine::{EngineError, Params, Row, SqlValue};
use crate::query::ComparisonOperator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    pub columns: Vec<usize>,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<usize>,
    pub indexes: Vec<IndexDef>,
    pub rows: Vec<Row>,
    next_auto: i64,
}

impl Table {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    fn unique_keys(&self) -> Vec<&[usize]> {
        let mut keys: Vec<&[usize]> = Vec::new();
        if !self.primary_key.is_empty() {
            keys.push(&self.primary_key);
        }
        keys.extend(
            self.indexes
                .iter()
                .filter(|i| i.unique)
                .map(|i| i.columns.as_slice()),
        );
        keys
    }

    fn check_unique(&self, row: &Row) -> Result<(), EngineError> {
        for key in self.unique_keys() {
            let clash = self
                .rows
                .iter()
                .any(|existing| key.iter().all(|&c| existing[c] == row[c]));
            if clash {
                let names: Vec<&str> = key.iter().map(|&c| self.columns[c].name.as_str()).collect();
                return Err(EngineError::ConstraintViolation(format!(
                    "duplicate key on {}({})",
                    self.name,
                    names.join(",")
                )));
            }
        }
        Ok(())
    }

    fn check_column(&self, column: &ColumnDef, value: &SqlValue) -> Result<(), EngineError> {
        let type_ok = match (column.kind, value) {
            (_, SqlValue::Null) => !column.not_null,
            (ColumnType::Integer, SqlValue::Integer(_)) => true,
            (ColumnType::Varchar, SqlValue::Text(_)) => true,
            (ColumnType::Blob, SqlValue::Bytes(_)) => true,
            _ => false,
        };
        if !type_ok {
            return Err(EngineError::ConstraintViolation(format!(
                "invalid value {} for column {}.{}",
                value, self.name, column.name
            )));
        }

        if let (Some(max), SqlValue::Text(text)) = (column.max_len, value) {
            let len = text.chars().count();
            if len > max {
                return Err(EngineError::ConstraintViolation(format!(
                    "value of length {} exceeds {}.{} maximum of {}",
                    len, self.name, column.name, max
                )));
            }
        }
        if let (Some(max), SqlValue::Bytes(bytes)) = (column.max_len, value) {
            if bytes.len() > max {
                return Err(EngineError::ConstraintViolation(format!(
                    "value of length {} exceeds {}.{} maximum of {}",
                    bytes.len(),
                    self.name,
                    column.name,
                    max
                )));
            }
        }
        Ok(())
    }
}

/// All tables of the engine, keyed by lowercase name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    tables: BTreeMap<String, Table>,
}

impl Catalog {
    pub fn table(&self, name: &str) -> Result<&Table, EngineError> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table, EngineError> {
        self.tables
            .get_mut(&name.to_ascii_lowercase())
            .ok_or_else(|| EngineError::TableNotFound(name.to_string()))
    }

    pub fn create_table(&mut self, create: &CreateTable) -> Result<(), EngineError> {
        let key = create.name.to_ascii_lowercase();
        if self.tables.contains_key(&key) {
            if create.if_not_exists {
                return Ok(());
            }
            return Err(EngineError::AlreadyExists(format!("table {}", create.name)));
        }

        let mut table = Table {
            name: create.name.clone(),
            columns: create.columns.clone(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            rows: Vec::new(),
            next_auto: 1,
        };
        for name in &create.primary_key {
            let index = table
                .column_index(name)
                .ok_or_else(|| EngineError::ColumnNotFound(name.clone()))?;
            table.primary_key.push(index);
        }

        self.tables.insert(key, table);
        Ok(())
    }

    pub fn create_index(&mut self, create: &CreateIndex) -> Result<(), EngineError> {
        let table = self.table_mut(&create.table)?;
        let mut columns = Vec::new();
        for name in &create.columns {
            columns.push(
                table
                    .column_index(name)
                    .ok_or_else(|| EngineError::ColumnNotFound(name.clone()))?,
            );
        }

        if table.indexes.iter().any(|i| i.columns == columns) {
            if create.if_not_exists {
                return Ok(());
            }
            return Err(EngineError::AlreadyExists(format!(
                "index on {}({})",
                table.name,
                create.columns.join(",")
            )));
        }

        if create.unique {
            let mut seen = std::collections::BTreeSet::new();
            for row in &table.rows {
                let key: Vec<&SqlValue> = columns.iter().map(|&c| &row[c]).collect();
                if !seen.insert(key) {
                    return Err(EngineError::ConstraintViolation(format!(
                        "existing rows violate unique index on {}({})",
                        table.name,
                        create.columns.join(",")
                    )));
                }
            }
        }

        table.indexes.push(IndexDef {
            columns,
            unique: create.unique,
        });
        Ok(())
    }

    /// Insert rows and return how many were written.
    pub fn insert(&mut self, insert: &Insert, params: &Params) -> Result<usize, EngineError> {
        let table = self.table_mut(&insert.table)?;

        let mut targets = Vec::with_capacity(insert.columns.len());
        for name in &insert.columns {
            targets.push(
                table
                    .column_index(name)
                    .ok_or_else(|| EngineError::ColumnNotFound(name.clone()))?,
            );
        }

        for values in &insert.rows {
            let mut row = vec![SqlValue::Null; table.columns.len()];
            for (operand, &target) in values.iter().zip(&targets) {
                row[target] = bind_operand(operand, params)?;
            }

            for (index, column) in table.columns.iter().enumerate() {
                if !column.auto_increment {
                    continue;
                }
                match row[index] {
                    SqlValue::Null => {
                        row[index] = SqlValue::Integer(table.next_auto);
                        table.next_auto += 1;
                    }
                    SqlValue::Integer(explicit) if explicit >= table.next_auto => {
                        table.next_auto = explicit + 1;
                    }
                    _ => {}
                }
            }

            for (column, value) in table.columns.iter().zip(&row) {
                table.check_column(column, value)?;
            }
            table.check_unique(&row)?;
            table.rows.push(row);
        }

        Ok(insert.rows.len())
    }

    pub fn select(&self, select: &Select, params: &Params) -> Result<Vec<Row>, EngineError> {
        let base = self.table(&select.from)?;
        let mut scope = Scope::new(base);

        let mut rows: Vec<Row> = match &select.join {
            None => base.rows.clone(),
            Some(join) => {
                let other = self.table(&join.table)?;
                scope.push(other);
                let left = scope.resolve(&join.left)?;
                let right = scope.resolve(&join.right)?;
                let mut joined = Vec::new();
                for l in &base.rows {
                    for r in &other.rows {
                        let mut combined = l.clone();
                        combined.extend(r.iter().cloned());
                        if !combined[left].is_null() && combined[left] == combined[right] {
                            joined.push(combined);
                        }
                    }
                }
                joined
            }
        };

        if let Some(filter) = &select.filter {
            let mut kept = Vec::with_capacity(rows.len());
            for row in rows {
                if evaluate(filter, &row, &scope, params)? {
                    kept.push(row);
                }
            }
            rows = kept;
        }

        if let Some((column, descending)) = &select.order_by {
            let index = scope.resolve(column)?;
            rows.sort_by(|a, b| {
                let ordering = a[index].cmp(&b[index]);
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let mut projected: Vec<Row> = match &select.projection {
            Projection::Count => vec![vec![SqlValue::Integer(rows.len() as i64)]],
            Projection::All => rows,
            Projection::Columns(columns) => {
                let mut indexes = Vec::with_capacity(columns.len());
                for column in columns {
                    indexes.push(scope.resolve(column)?);
                }
                rows.into_iter()
                    .map(|row| indexes.iter().map(|&i| row[i].clone()).collect())
                    .collect()
            }
        };

        if let Some(limit) = select.limit {
            projected.truncate(limit);
        }
        Ok(projected)
    }
}

/// Column name resolution over the tables visible to a SELECT.
struct Scope<'a> {
    tables: Vec<(&'a Table, usize)>,
}

impl<'a> Scope<'a> {
    fn new(table: &'a Table) -> Self {
        Self {
            tables: vec![(table, 0)],
        }
    }

    fn push(&mut self, table: &'a Table) {
        let offset = self
            .tables
            .iter()
            .map(|(t, _)| t.columns.len())
            .sum();
        self.tables.push((table, offset));
    }

    fn resolve(&self, name: &str) -> Result<usize, EngineError> {
        if let Some((table_name, column)) = name.split_once('.') {
            let (table, offset) = self
                .tables
                .iter()
                .find(|(t, _)| t.name.eq_ignore_ascii_case(table_name))
                .ok_or_else(|| EngineError::TableNotFound(table_name.to_string()))?;
            let index = table
                .column_index(column)
                .ok_or_else(|| EngineError::ColumnNotFound(name.to_string()))?;
            return Ok(offset + index);
        }

        let mut found = None;
        for (table, offset) in &self.tables {
            if let Some(index) = table.column_index(name) {
                if found.is_some() {
                    return Err(EngineError::Syntax(format!("ambiguous column {}", name)));
                }
                found = Some(offset + index);
            }
        }
        found.ok_or_else(|| EngineError::ColumnNotFound(name.to_string()))
    }
}

fn bind_operand(operand: &Operand, params: &Params) -> Result<SqlValue, EngineError> {
    match operand {
        Operand::Param(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::MissingParameter(name.clone())),
        Operand::Literal(value) => Ok(value.clone()),
        Operand::Column(name) => Err(EngineError::Syntax(format!(
            "column reference {} not allowed in VALUES",
            name
        ))),
    }
}

fn operand_value(
    operand: &Operand,
    row: &Row,
    scope: &Scope<'_>,
    params: &Params,
) -> Result<SqlValue, EngineError> {
    match operand {
        Operand::Column(name) => Ok(row[scope.resolve(name)?].clone()),
        other => bind_operand(other, params),
    }
}

fn evaluate(expr: &Expr, row: &Row, scope: &Scope<'_>, params: &Params) -> Result<bool, EngineError> {
    match expr {
        Expr::And(left, right) => {
            Ok(evaluate(left, row, scope, params)? && evaluate(right, row, scope, params)?)
        }
        Expr::Or(left, right) => {
            Ok(evaluate(left, row, scope, params)? || evaluate(right, row, scope, params)?)
        }
        Expr::Compare {
            left,
            operator,
            right,
        } => {
            let left = operand_value(left, row, scope, params)?;
            let right = operand_value(right, row, scope, params)?;
            Ok(compare(&left, *operator, &right))
        }
    }
}

/// Comparisons only hold between non-null values of the same type.
fn compare(left: &SqlValue, operator: ComparisonOperator, right: &SqlValue) -> bool {
    let ordering = match (left, right) {
        (SqlValue::Integer(a), SqlValue::Integer(b)) => a.cmp(b),
        (SqlValue::Text(a), SqlValue::Text(b)) => a.cmp(b),
        (SqlValue::Bytes(a), SqlValue::Bytes(b)) => a.cmp(b),
        _ => return false,
    };
    match operator {
        ComparisonOperator::Eq => ordering == Ordering::Equal,
        ComparisonOperator::Lt => ordering == Ordering::Less,
        ComparisonOperator::Gt => ordering == Ordering::Greater,
        ComparisonOperator::Le => ordering != Ordering::Greater,
        ComparisonOperator::Ge => ordering != Ordering::Less,
    }
}
