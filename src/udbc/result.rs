use crate::Result;
use crate::error::DbError;
use crate::udbc::value::{FromValue, Value};
use std::collections::HashMap;

/// Rows returned by a query, in backend order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<String>,
    results: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Every row must have exactly one value per column.
    pub fn new(columns: Vec<String>, results: Vec<Vec<Value>>) -> Result<Self> {
        if let Some(bad) = results.iter().position(|r| r.len() != columns.len()) {
            return Err(DbError::Database(format!(
                "Row {} has {} values for {} columns",
                bad,
                results[bad].len(),
                columns.len()
            )));
        }
        Ok(Self { columns, results })
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.results.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.results.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Raw row values, positionally aligned with [`column_names`](Self::column_names).
    pub fn results(&self) -> &[Vec<Value>] {
        &self.results
    }

    pub fn into_results(self) -> Vec<Vec<Value>> {
        self.results
    }

    /// Rows as column-keyed maps.
    pub fn into_maps(self) -> Vec<HashMap<String, Value>> {
        let columns = self.columns;
        self.results
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect())
            .collect()
    }

    /// Reads one column of every row as `T`.
    pub fn column<T: FromValue>(&self, name: &str) -> Result<Vec<T>> {
        let index = self.index_of(name)?;
        self.results
            .iter()
            .map(|values| T::from_value(values[index].clone()))
            .collect()
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DbError::TypeMismatch(format!("No column named '{}'", name)))
    }
}

/// A borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn get_as<T: FromValue>(&self, column: &str) -> Result<T> {
        let value = self
            .get(column)
            .ok_or_else(|| DbError::TypeMismatch(format!("No column named '{}'", column)))?;
        T::from_value(value.clone())
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn to_map(&self) -> HashMap<String, Value> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

/// Outcome of an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    /// Number of rows affected.
    pub updated: u64,
    /// Keys generated by the statement, e.g. the rowid of an inserted row.
    pub keys: Vec<Value>,
}

impl UpdateResult {
    pub fn new(updated: u64, keys: Vec<Value>) -> Self {
        Self { updated, keys }
    }
}
