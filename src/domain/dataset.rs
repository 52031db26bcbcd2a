//! Tabular dataset model
//!
//! A [`Dataset`] is an ordered list of typed columns and rows of string
//! cells. It is the unit exchanged with the surrounding web layer (as JSON)
//! and the unit the anonymization driver reads and produces.

use crate::domain::errors::AnonymizationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Label used for a fully suppressed cell
pub const SUPPRESSED_VALUE: &str = "*";

/// Label used for a missing cell
pub const MISSING_VALUE: &str = "NULL";

/// Returns true when a cell holds no value
///
/// Empty cells and `NULL` (any case) are missing.
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(MISSING_VALUE)
}

/// Declared data type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    /// Free text
    String,
    /// Whole numbers
    Integer,
    /// Floating point numbers
    Decimal,
    /// Calendar dates in an attribute-specific format
    Date,
}

impl DataType {
    /// Whether values of this type are numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Decimal)
    }

    /// Wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Decimal => "DECIMAL",
            Self::Date => "DATE",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column header: name and declared type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    /// Column name
    pub name: String,

    /// Declared data type
    pub data_type: DataType,
}

impl ColumnSpec {
    /// Create a new column header
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Tabular dataset with string cells
///
/// Row `i` of an anonymized dataset always corresponds to row `i` of the
/// dataset it was produced from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Column headers, in column order
    pub columns: Vec<ColumnSpec>,

    /// Rows of cells, one cell per column
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Create a dataset and check that every row has one cell per column
    pub fn new(
        columns: Vec<ColumnSpec>,
        rows: Vec<Vec<String>>,
    ) -> Result<Self, AnonymizationError> {
        let dataset = Self { columns, rows };
        dataset.validate_shape()?;
        Ok(dataset)
    }

    /// Check that every row has one cell per column
    pub fn validate_shape(&self) -> Result<(), AnonymizationError> {
        let width = self.columns.len();
        if let Some((index, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != width)
        {
            return Err(AnonymizationError::DatasetConfigMismatch(format!(
                "row {index} has {} cells, expected {width}",
                row.len()
            )));
        }
        Ok(())
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of the column with the given name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cell at the given row and column
    pub fn cell(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }

    /// All cells of a column, in row order
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows.iter().map(move |row| row[column].as_str())
    }

    /// Distinct cells of a column in ascending order
    pub fn distinct_values(&self, column: usize) -> Vec<String> {
        self.column_values(column)
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Dataset restricted to the given rows, in the given order
    pub fn subset(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.clone(),
            rows: rows.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// UTF-8 JSON encoding, as sent in the success callback
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
