//! FILENAME: core/dataset/src/lib.rs
//! PURPOSE: Shared record types for the pivot engine.
//! CONTEXT: Turns parser output (header row + data rows) into immutable,
//! name-addressable records. File decoding itself happens upstream.

pub mod cell;
pub mod error;
pub mod record;

// Re-export commonly used types at the crate root
pub use cell::CellValue;
pub use error::DatasetError;
pub use record::{Dataset, FieldIndex, RecordRef, StructuredRecord};
