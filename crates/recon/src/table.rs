use serde::Serialize;

use crate::normalize::{parse_number, ColumnKind};
use crate::schema::{resolve_column, MatchTier};

// ---------------------------------------------------------------------------
// Raw
// ---------------------------------------------------------------------------

/// A string-typed table exactly as read from disk. Headers are untouched.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Normalized
// ---------------------------------------------------------------------------

/// A single normalized value.
///
/// `Number` never holds NaN: values that fail numeric parsing become `Missing`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Missing,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Render for comparison and reporting. Missing renders as "".
    pub fn render(&self) -> String {
        match self {
            Cell::Missing => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(v) => format_number(*v),
        }
    }

    /// Numeric view of the cell; NaN when missing or unparseable.
    ///
    /// Text cells are parsed with the locale-aware parser so a numeric field
    /// whose header escaped the numeric hints still compares numerically.
    pub fn as_number(&self) -> f64 {
        match self {
            Cell::Missing => f64::NAN,
            Cell::Number(v) => *v,
            Cell::Text(s) => parse_number(s).unwrap_or(f64::NAN),
        }
    }
}

/// Shortest round-trip rendering: `1000.0` → "1000", `0.15` → "0.15".
pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        return String::new();
    }
    if v == 0.0 {
        // Avoid "-0"
        return "0".into();
    }
    format!("{v}")
}

/// A table after header canonicalization and per-column type coercion.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub name: String,
    pub headers: Vec<String>,
    pub kinds: Vec<ColumnKind>,
    pub rows: Vec<Vec<Cell>>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Resolve a desired field name to a column index (see [`resolve_column`]).
    pub fn resolve(&self, desired: &str) -> Option<(usize, MatchTier)> {
        resolve_column(&self.headers, desired)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&Cell::Missing)
    }
}
