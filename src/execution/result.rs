//! Cursor-style result set abstraction

use crate::error::{Error, Result};
use crate::types::{DataType, Identifier, Row, Value};

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    identifier: Identifier,
    label: String,
    data_type: DataType,
}

impl ColumnMeta {
    pub fn new(identifier: Identifier, label: String, data_type: DataType) -> Self {
        ColumnMeta {
            identifier,
            label,
            data_type,
        }
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// The display label: the alias if one was given, else the rendered
    /// expression.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn display_size(&self) -> usize {
        self.data_type.display_size()
    }
}

/// Result set metadata: the ordered column descriptions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultMetadata {
    columns: Vec<ColumnMeta>,
}

impl ResultMetadata {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        ResultMetadata { columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Result<&ColumnMeta> {
        self.columns
            .get(index)
            .ok_or_else(|| Error::InvalidValue(format!("column index {} out of range", index)))
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// The index of the column with the given label or identifier.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.label() == name || c.identifier().as_str() == name)
            .ok_or_else(|| Error::FieldNotExists(name.to_string()))
    }
}

/// A cursor over query results. Starts positioned before the first row;
/// `next()` advances and reports whether a row is available.
pub trait ResultSet {
    fn next(&mut self) -> Result<bool>;

    /// The value of the given column in the current row.
    fn value(&self, column: usize) -> Result<Value>;

    /// The value of the named column in the current row.
    fn value_by_name(&self, name: &str) -> Result<Value>;

    fn metadata(&self) -> &ResultMetadata;

    /// Releases the cursor. Idempotent.
    fn close(&mut self);
}

/// An in-memory result set over materialized rows.
#[derive(Debug, Clone, Default)]
pub struct Rows {
    metadata: ResultMetadata,
    rows: Vec<Row>,
    /// Cursor position: None before the first `next()`.
    cursor: Option<usize>,
    closed: bool,
}

impl Rows {
    pub fn new(metadata: ResultMetadata, rows: Vec<Row>) -> Self {
        Rows {
            metadata,
            rows,
            cursor: None,
            closed: false,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The underlying rows, bypassing the cursor. Used by the executor when
    /// it consumes backend results wholesale.
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    fn current(&self) -> Result<&Row> {
        if self.closed {
            return Err(Error::ExecutionError("result set is closed".into()));
        }
        let cursor = self
            .cursor
            .ok_or_else(|| Error::ExecutionError("cursor is before the first row".into()))?;
        self.rows
            .get(cursor)
            .ok_or_else(|| Error::ExecutionError("cursor is after the last row".into()))
    }
}

impl ResultSet for Rows {
    fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::ExecutionError("result set is closed".into()));
        }
        let next = self.cursor.map_or(0, |c| c + 1);
        self.cursor = Some(next);
        Ok(next < self.rows.len())
    }

    fn value(&self, column: usize) -> Result<Value> {
        self.metadata.column(column)?;
        Ok(self.current()?[column].clone())
    }

    fn value_by_name(&self, name: &str) -> Result<Value> {
        let index = self.metadata.index_of(name)?;
        self.value(index)
    }

    fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Rows {
        let metadata = ResultMetadata::new(vec![
            ColumnMeta::new(
                Identifier::new("id").unwrap(),
                "id".into(),
                DataType::Int,
            ),
            ColumnMeta::new(
                Identifier::new("name").unwrap(),
                "student_name".into(),
                DataType::Str,
            ),
        ]);
        Rows::new(
            metadata,
            vec![
                vec![Value::Int(1), Value::Str("ada".into())],
                vec![Value::Int(2), Value::Str("grace".into())],
            ],
        )
    }

    #[test]
    fn cursor_walks_rows() {
        let mut rows = sample();
        // Reading before the first next() is an error.
        assert!(rows.value(0).is_err());

        assert!(rows.next().unwrap());
        assert_eq!(rows.value(0).unwrap(), Value::Int(1));
        assert_eq!(rows.value_by_name("student_name").unwrap(), Value::Str("ada".into()));

        assert!(rows.next().unwrap());
        assert_eq!(rows.value(0).unwrap(), Value::Int(2));

        assert!(!rows.next().unwrap());
    }

    #[test]
    fn metadata_describes_columns() {
        let rows = sample();
        let meta = rows.metadata();
        assert_eq!(meta.column_count(), 2);
        assert_eq!(meta.column(1).unwrap().data_type(), DataType::Str);
        assert_eq!(meta.column(1).unwrap().display_size(), 255);
        assert_eq!(meta.index_of("name").unwrap(), 1);
        assert!(meta.index_of("missing").is_err());
    }

    #[test]
    fn close_releases_the_cursor() {
        let mut rows = sample();
        assert!(rows.next().unwrap());
        rows.close();
        assert!(rows.value(0).is_err());
        assert!(rows.next().is_err());
        // Idempotent.
        rows.close();
    }
}
