//! FILENAME: core/dataset/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// A header row plus at least one data row is required.
    #[error("Insufficient data: expected a header row and at least one data row, got {rows} row(s)")]
    InsufficientData { rows: usize },
}
