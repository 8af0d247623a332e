//! FILENAME: core/pivot-engine/src/lib.rs
//! Pivot table engine.
//!
//! Cross-tabulates a `dataset::Dataset` by row and column fields, aggregates
//! value fields into every cell, and lays the result out as a renderable
//! table with nested headers, merged row labels and grand totals.
//!
//! Layers:
//! - `definition`: Serializable configuration (what the pivot table IS)
//! - `cache`: Grouped accumulators for one field configuration (HOW we compute)
//! - `totals`: Row, column and overall grand totals
//! - `tree`: Hierarchical rollup of row keys
//! - `layout`: Header rows and row-label spanning
//! - `view`: Renderable output (WHAT we display)
//! - `engine`: Orchestrates a full calculation

pub mod cache;
pub mod definition;
pub mod engine;
pub mod error;
pub mod layout;
pub mod logging;
pub mod totals;
pub mod tree;
pub mod view;

#[doc(hidden)]
pub use log;

pub use cache::{
    aggregate, AggregateAccumulator, CacheStats, CellTable, GroupKey, GroupValue, OrderedFloat,
    PivotCache, BLANK_LABEL,
};
pub use definition::*;
pub use engine::{calculate_cached, calculate_pivot, drill_down, PivotCalculator};
pub use error::PivotError;
pub use layout::{
    build_header_rows, rowspan_for, should_display_cell, HeaderCell, HeaderKind, LabelRow,
    GRAND_TOTAL_LABEL,
};
pub use totals::GrandTotals;
pub use tree::{build_tree, RollupNode, RollupTree};
pub use view::*;
