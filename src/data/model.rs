use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, Salt2Error};

// ---------------------------------------------------------------------------
// Standard SNANA FITRES field names
// ---------------------------------------------------------------------------

pub mod fields {
    pub const CID: &str = "CID";
    pub const X1: &str = "x1";
    pub const X1_ERR: &str = "x1ERR";
    pub const C: &str = "c";
    pub const C_ERR: &str = "cERR";
    pub const MB: &str = "mB";
    pub const MB_ERR: &str = "mBERR";
    pub const X0: &str = "x0";
    pub const COV_X1_C: &str = "COV_x1_c";
    pub const COV_X1_X0: &str = "COV_x1_x0";
    pub const COV_C_X0: &str = "COV_c_x0";
    pub const HOST_LOGMASS: &str = "HOST_LOGMASS";
    pub const Z_HD: &str = "zHD";
    pub const FITPROB: &str = "FITPROB";
    pub const PKMJD_ERR: &str = "PKMJDERR";
    pub const TREST_MAX: &str = "TrestMAX";

    pub const MU: &str = "mu";
    pub const MU_ERR: &str = "muerr";
    pub const MU_RES: &str = "mures";
}

// ---------------------------------------------------------------------------
// Column – one named field, one value per supernova
// ---------------------------------------------------------------------------

/// A single field of a fit table. Numeric fields feed the engines; text
/// fields (CIDs, survey names) are carried along untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_floats(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    /// Render the value at `row` the way it is written back to text formats.
    pub fn cell(&self, row: usize) -> CellRef<'_> {
        match self {
            Column::Float(v) => CellRef::Float(v[row]),
            Column::Text(v) => CellRef::Text(&v[row]),
        }
    }

    /// Keep only the rows whose mask entry is `true`. Caller checks the length.
    fn retain_mask(&self, mask: &[bool]) -> Column {
        fn pick<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| v.clone())
                .collect()
        }
        match self {
            Column::Float(v) => Column::Float(pick(v, mask)),
            Column::Text(v) => Column::Text(pick(v, mask)),
        }
    }
}

/// Borrowed view of one table cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellRef<'a> {
    Float(f64),
    Text(&'a str),
}

impl fmt::Display for CellRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellRef::Float(v) => write!(f, "{v}"),
            CellRef::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// FitresTable – the complete light-curve fit table
// ---------------------------------------------------------------------------

/// Columnar light-curve fit results, one row per supernova.
///
/// All columns have the same length; [`FitresTable::insert_column`] refuses
/// anything else so rows can never drift out of alignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitresTable {
    /// Column names in insertion (file) order.
    column_names: Vec<String>,
    columns: BTreeMap<String, Column>,
    rows: usize,
}

impl FitresTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of supernovae (rows).
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Ordered list of column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Add a column, or replace one with the same name in place.
    ///
    /// The first column fixes the row count; later columns must match it.
    pub fn insert_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        let is_only_column = self.columns.len() == 1 && self.columns.contains_key(&name);
        if !self.columns.is_empty() && !is_only_column && column.len() != self.rows {
            return Err(Salt2Error::ShapeMismatch {
                field: name,
                expected: self.rows,
                found: column.len(),
            });
        }
        self.rows = column.len();
        if self.columns.insert(name.clone(), column).is_none() {
            self.column_names.push(name);
        }
        Ok(())
    }

    /// Convenience wrapper for numeric columns.
    pub fn insert_floats(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        self.insert_column(name, Column::Float(values))
    }

    /// Borrow a numeric column.
    pub fn floats(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .ok_or_else(|| Salt2Error::MissingField(name.to_string()))?
            .as_floats()
            .ok_or_else(|| Salt2Error::NotNumeric(name.to_string()))
    }

    /// Borrow a numeric column if it exists.
    pub fn optional_floats(&self, name: &str) -> Result<Option<&[f64]>> {
        if self.has_column(name) {
            self.floats(name).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Build a new table holding only the rows where `mask` is `true`.
    ///
    /// Every column is subset by the same mask, including ones this crate
    /// knows nothing about, so the field set and row alignment survive.
    pub fn select(&self, mask: &[bool]) -> Result<FitresTable> {
        if mask.len() != self.rows {
            return Err(Salt2Error::ShapeMismatch {
                field: "<row mask>".to_string(),
                expected: self.rows,
                found: mask.len(),
            });
        }
        let columns: BTreeMap<String, Column> = self
            .columns
            .iter()
            .map(|(name, col)| (name.clone(), col.retain_mask(mask)))
            .collect();
        Ok(FitresTable {
            column_names: self.column_names.clone(),
            columns,
            rows: mask.iter().filter(|keep| **keep).count(),
        })
    }

    /// Minimum and maximum of a numeric column, ignoring NaN.
    ///
    /// An empty column yields `(inf, -inf)`, which no value can satisfy.
    pub fn range(&self, name: &str) -> Result<(f64, f64)> {
        let values = self.floats(name)?;
        Ok(values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            }))
    }
}
