//! FILENAME: core/pivot-engine/src/error.rs

use thiserror::Error;

use crate::definition::FieldArea;

/// Configuration errors. Data problems (non-numeric values, missing fields)
/// never surface here; they degrade to placeholder results instead.
#[derive(Error, Debug)]
pub enum PivotError {
    #[error("Field '{field}' is already in the {area} area")]
    DuplicateField { area: FieldArea, field: String },

    #[error("Field '{field}' is not in the {area} area")]
    FieldNotSelected { area: FieldArea, field: String },

    #[error("Unknown aggregation: {0}")]
    UnknownAggregation(String),

    #[error("Invalid pivot definition: {0}")]
    InvalidDefinition(#[from] serde_json::Error),
}
