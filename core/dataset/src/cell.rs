//! FILENAME: core/dataset/src/cell.rs
//! PURPOSE: Defines the raw scalar value held by one field of a record.
//! CONTEXT: Values arrive from the spreadsheet/CSV parser untouched. Numeric
//! coercion is deferred until aggregation, so a cell keeps whatever the
//! parser produced (text "10" and number 10.0 are both valid inputs).

use serde::{Deserialize, Serialize};

/// Represents the raw data within one field of a source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    /// Returns true for a missing value (padding or an empty spreadsheet cell).
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Parses the value as a floating-point number.
    ///
    /// Text is trimmed and must parse as a whole; a numeric prefix such as
    /// `"10 units"` does not count. Non-finite results (`"NaN"`, `"inf"`)
    /// are rejected so they can never poison a sum.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// Returns the display value of the cell as a String.
    /// Used for header names, grouping labels and previews.
    pub fn display_value(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(true) => "TRUE".to_string(),
            CellValue::Boolean(false) => "FALSE".to_string(),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Empty
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}
