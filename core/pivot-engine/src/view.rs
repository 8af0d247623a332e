//! FILENAME: core/pivot-engine/src/view.rs
//! Pivot View - The renderable output of a pivot calculation.
//!
//! The view is fully self-contained: header rows with spans, one descriptor
//! per value column, and body rows whose value cells are aligned with those
//! descriptors. `to_grid` flattens everything into plain display strings for
//! export.

use serde::{Deserialize, Serialize};

use crate::cache::GroupKey;
use crate::definition::{AggregationType, ReportLayout, ValueField};
use crate::layout::{place_header_cells, HeaderCell, LabelRow, GRAND_TOTAL_LABEL};

/// Formats an aggregated value for display: integers for Count, two decimal
/// places otherwise.
pub fn format_value(value: f64, aggregation: AggregationType) -> String {
    match aggregation {
        AggregationType::Count => format!("{}", value.round() as i64),
        AggregationType::Sum | AggregationType::Average => format!("{:.2}", value),
    }
}

// ============================================================================
// COLUMNS
// ============================================================================

/// Describes one value column of the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Synthetic lookup key, e.g. "East - Sales (Sum)" or "Sales (Sum)".
    pub key: String,

    /// The column key this column belongs to. None for grand total columns.
    pub column_key: Option<GroupKey>,

    /// Index into the definition's value fields.
    pub value_index: usize,

    pub value_field: ValueField,
}

impl ColumnDescriptor {
    pub fn for_column(column_key: &GroupKey, value_index: usize, value_field: &ValueField) -> Self {
        let key = if column_key.is_empty() {
            value_field.label()
        } else {
            format!("{} - {}", column_key, value_field.label())
        };
        ColumnDescriptor {
            key,
            column_key: Some(column_key.clone()),
            value_index,
            value_field: value_field.clone(),
        }
    }

    pub fn grand_total(value_index: usize, value_field: &ValueField) -> Self {
        ColumnDescriptor {
            key: format!("{} - {}", GRAND_TOTAL_LABEL, value_field.label()),
            column_key: None,
            value_index,
            value_field: value_field.clone(),
        }
    }

    pub fn is_grand_total(&self) -> bool {
        self.column_key.is_none()
    }
}

// ============================================================================
// ROWS AND CELLS
// ============================================================================

/// Types of rows in the pivot view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowKind {
    /// Leaf row, one per full row key.
    Data,
    /// Parent node row carrying the subtotal of its children (compact only).
    Subtotal,
    GrandTotal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelCell {
    pub text: String,

    /// Whether this row renders the label. False when a row above spans it.
    pub displayed: bool,

    /// Rows covered, counting this one. Meaningful when `displayed`.
    pub row_span: usize,

    pub col_span: usize,

    /// Indentation level (compact layout).
    pub indent: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCell {
    pub value: f64,
    pub formatted: String,

    /// False when no record fell into this cell.
    pub populated: bool,
}

impl ValueCell {
    pub fn new(value: f64, aggregation: AggregationType, populated: bool) -> Self {
        ValueCell {
            value,
            formatted: format_value(value, aggregation),
            populated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub kind: RowKind,

    /// Row key (prefix for subtotal rows, ungrouped for the grand total).
    pub key: GroupKey,

    pub depth: usize,

    /// Label cells, one per label column (tabular) or a single one (compact).
    pub labels: Vec<LabelCell>,

    /// Aligned with `PivotView::columns`.
    pub values: Vec<ValueCell>,
}

impl LabelRow for PivotRow {
    fn row_key(&self) -> &GroupKey {
        &self.key
    }

    fn is_grand_total(&self) -> bool {
        self.kind == RowKind::GrandTotal
    }
}

// ============================================================================
// PIVOT VIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotView {
    /// Definition version this view was computed from.
    pub version: u64,

    pub report_layout: ReportLayout,

    pub header_rows: Vec<Vec<HeaderCell>>,

    /// Width of the row label area.
    pub label_columns: usize,

    pub columns: Vec<ColumnDescriptor>,

    pub rows: Vec<PivotRow>,
}

impl PivotView {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Total grid width (labels + value columns).
    pub fn col_count(&self) -> usize {
        self.label_columns + self.columns.len()
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == key)
    }

    /// Looks up a body cell by row index and synthetic column key.
    pub fn get(&self, row: usize, key: &str) -> Option<&ValueCell> {
        let column = self.column_index(key)?;
        self.rows.get(row)?.values.get(column)
    }

    /// Finds the data or subtotal row for a row key.
    pub fn find_row(&self, key: &GroupKey) -> Option<&PivotRow> {
        self.rows
            .iter()
            .find(|r| r.kind != RowKind::GrandTotal && &r.key == key)
    }

    pub fn grand_total_row(&self) -> Option<&PivotRow> {
        self.rows.iter().find(|r| r.kind == RowKind::GrandTotal)
    }

    /// Data rows only.
    pub fn data_rows(&self) -> impl Iterator<Item = &PivotRow> {
        self.rows.iter().filter(|r| r.kind == RowKind::Data)
    }

    /// Renders headers and body as a rectangular table of display strings.
    /// Slots covered by a span are empty strings.
    pub fn to_grid(&self) -> Vec<Vec<String>> {
        let width = self.col_count();
        let mut grid = Vec::with_capacity(self.header_rows.len() + self.rows.len());

        for placed in place_header_cells(&self.header_rows) {
            let mut line = vec![String::new(); width];
            for (col, cell) in placed {
                if let Some(slot) = line.get_mut(col) {
                    slot.clone_from(&cell.text);
                }
            }
            grid.push(line);
        }

        for row in &self.rows {
            let mut line = Vec::with_capacity(width);
            for label in &row.labels {
                line.push(if label.displayed {
                    label.text.clone()
                } else {
                    String::new()
                });
                for _ in 1..label.col_span {
                    line.push(String::new());
                }
            }
            line.resize(self.label_columns, String::new());
            line.extend(row.values.iter().map(|cell| cell.formatted.clone()));
            grid.push(line);
        }

        grid
    }
}

/// The outcome of a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PivotOutput {
    Table(PivotView),
    /// No value field is selected; there is nothing to render.
    NothingToAggregate,
}

impl PivotOutput {
    pub fn view(&self) -> Option<&PivotView> {
        match self {
            PivotOutput::Table(view) => Some(view),
            PivotOutput::NothingToAggregate => None,
        }
    }

    pub fn into_view(self) -> Option<PivotView> {
        match self {
            PivotOutput::Table(view) => Some(view),
            PivotOutput::NothingToAggregate => None,
        }
    }
}

// ============================================================================
// DRILL-DOWN
// ============================================================================

/// Result of a drill-down operation (showing source records for a cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillDownResult {
    /// The row key (or prefix) that was drilled into.
    pub row_key: GroupKey,

    /// The column key (or prefix) that was drilled into.
    pub column_key: GroupKey,

    /// Column headers from the source data.
    pub headers: Vec<String>,

    /// The detail records (source row indices).
    pub source_rows: Vec<usize>,

    /// Total count of matching records.
    pub total_count: usize,

    /// Whether `source_rows` was cut off at `max_records`.
    pub is_truncated: bool,

    pub max_records: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::GroupValue;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(35.0, AggregationType::Sum), "35.00");
        assert_eq!(format_value(35.0 / 3.0, AggregationType::Average), "11.67");
        assert_eq!(format_value(4.0, AggregationType::Count), "4");
        assert_eq!(format_value(0.0, AggregationType::Count), "0");
    }

    #[test]
    fn test_synthetic_column_keys() {
        let sales = ValueField::new("Sales", AggregationType::Sum);
        let column = GroupKey::new([GroupValue::text("A"), GroupValue::text("Q1")]);

        assert_eq!(
            ColumnDescriptor::for_column(&column, 0, &sales).key,
            "A | Q1 - Sales (Sum)"
        );
        assert_eq!(
            ColumnDescriptor::for_column(&GroupKey::ungrouped(), 0, &sales).key,
            "Sales (Sum)"
        );

        let total = ColumnDescriptor::grand_total(0, &sales);
        assert_eq!(total.key, "Grand Total - Sales (Sum)");
        assert!(total.is_grand_total());
    }
}
