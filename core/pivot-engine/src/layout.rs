//! FILENAME: core/pivot-engine/src/layout.rs
//! PURPOSE: Column header structure and row-label spanning.
//! CONTEXT: Header rows are produced as HTML-style cells (text + colspan +
//! rowspan); a cell occupies the next free slot of its row, skipping slots
//! still covered by a rowspan from above. Row-label spanning works on the
//! body rows the view emits, through the `LabelRow` seam.

use serde::{Deserialize, Serialize};

use crate::cache::GroupKey;
use crate::definition::{PivotField, ValueField};

pub const GRAND_TOTAL_LABEL: &str = "Grand Total";

// ============================================================================
// HEADER CELLS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderKind {
    /// Corner cell naming the row fields.
    RowFieldLabel,
    /// One distinct value of a column field.
    ColumnGroup,
    /// Leaf header naming a value field and its aggregation.
    ValueLabel,
    GrandTotalLabel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderCell {
    pub text: String,
    pub col_span: usize,
    pub row_span: usize,
    pub kind: HeaderKind,
}

impl HeaderCell {
    fn new(text: impl Into<String>, col_span: usize, row_span: usize, kind: HeaderKind) -> Self {
        HeaderCell {
            text: text.into(),
            col_span,
            row_span,
            kind,
        }
    }
}

/// Number of header rows for a field configuration.
pub fn header_row_count(column_fields: &[PivotField], value_fields: &[ValueField]) -> usize {
    if column_fields.is_empty() {
        1
    } else {
        column_fields.len() + usize::from(!value_fields.is_empty())
    }
}

/// Builds the header rows above the body.
///
/// `column_keys` must already be in display order, with keys sharing a
/// leading value contiguous (see `tree::ordered_keys`). `label_columns` is
/// the width of the row label area. `grand_total_column` adds a trailing
/// "Grand Total" cell spanning one column per value field.
pub fn build_header_rows(
    row_fields: &[PivotField],
    column_fields: &[PivotField],
    value_fields: &[ValueField],
    column_keys: &[GroupKey],
    label_columns: usize,
    grand_total_column: bool,
) -> Vec<Vec<HeaderCell>> {
    if value_fields.is_empty() {
        return Vec::new();
    }

    let row_count = header_row_count(column_fields, value_fields);
    let value_count = value_fields.len();
    let mut rows: Vec<Vec<HeaderCell>> = vec![Vec::new(); row_count];

    let corner_text = row_fields
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(" / ");
    rows[0].push(HeaderCell::new(
        corner_text,
        label_columns,
        row_count,
        HeaderKind::RowFieldLabel,
    ));

    if column_fields.is_empty() {
        for vf in value_fields {
            rows[0].push(HeaderCell::new(vf.label(), 1, 1, HeaderKind::ValueLabel));
        }
        if grand_total_column {
            rows[0].push(HeaderCell::new(
                GRAND_TOTAL_LABEL,
                value_count,
                row_count,
                HeaderKind::GrandTotalLabel,
            ));
        }
        return rows;
    }

    // One cell per contiguous run of keys sharing the prefix up to depth.
    for depth in 0..column_fields.len() {
        let mut start = 0;
        while start < column_keys.len() {
            let prefix = column_keys[start].prefix(depth + 1);
            let run = column_keys[start..]
                .iter()
                .take_while(|key| key.prefix(depth + 1) == prefix)
                .count();
            let text = column_keys[start]
                .values()
                .get(depth)
                .map(|v| v.label())
                .unwrap_or_default();
            rows[depth].push(HeaderCell::new(
                text,
                run * value_count,
                1,
                HeaderKind::ColumnGroup,
            ));
            start += run;
        }
    }

    if grand_total_column {
        rows[0].push(HeaderCell::new(
            GRAND_TOTAL_LABEL,
            value_count,
            column_fields.len(),
            HeaderKind::GrandTotalLabel,
        ));
    }

    let leaf_row = row_count - 1;
    let total_blocks = column_keys.len() + usize::from(grand_total_column);
    for _ in 0..total_blocks {
        for vf in value_fields {
            rows[leaf_row].push(HeaderCell::new(vf.label(), 1, 1, HeaderKind::ValueLabel));
        }
    }

    rows
}

/// Places header cells into a rectangular slot grid, HTML table style.
/// Returns, per header row, `(column, cell)` pairs for the cells that start
/// in that row.
pub fn place_header_cells(rows: &[Vec<HeaderCell>]) -> Vec<Vec<(usize, &HeaderCell)>> {
    // covered_until[col] = first row index no longer covered at that column
    let mut covered_until: Vec<usize> = Vec::new();
    let mut placed = Vec::with_capacity(rows.len());

    for (r, row) in rows.iter().enumerate() {
        let mut col = 0;
        let mut cells = Vec::with_capacity(row.len());
        for cell in row {
            while covered_until.get(col).is_some_and(|&until| until > r) {
                col += 1;
            }
            let end = col + cell.col_span;
            if covered_until.len() < end {
                covered_until.resize(end, 0);
            }
            for slot in &mut covered_until[col..end] {
                *slot = r + cell.row_span.max(1);
            }
            cells.push((col, cell));
            col = end;
        }
        placed.push(cells);
    }

    placed
}

/// Width a header row covers, counting cells carried down by rowspans from
/// earlier rows.
pub fn header_row_width(rows: &[Vec<HeaderCell>], index: usize) -> usize {
    rows.iter()
        .enumerate()
        .take(index + 1)
        .flat_map(|(r, row)| row.iter().map(move |cell| (r, cell)))
        .filter(|(r, cell)| r + cell.row_span.max(1) > index)
        .map(|(_, cell)| cell.col_span)
        .sum()
}

// ============================================================================
// ROW LABEL SPANNING
// ============================================================================

/// A body row as seen by the spanning rules.
pub trait LabelRow {
    /// Full row key (one value per row field).
    fn row_key(&self) -> &GroupKey;

    fn is_grand_total(&self) -> bool;
}

fn same_prefix<R: LabelRow>(a: &R, b: &R, depth: usize) -> bool {
    a.row_key().prefix(depth + 1) == b.row_key().prefix(depth + 1)
}

/// Whether the label cell at `depth` is shown on row `index`.
///
/// Shown when the row's values at depths `0..=depth` differ from the
/// previous row's. The first row always shows; a grand total row shows its
/// single label at depth 0 and never continues a span.
pub fn should_display_cell<R: LabelRow>(rows: &[R], index: usize, depth: usize) -> bool {
    let Some(row) = rows.get(index) else {
        return false;
    };
    if row.is_grand_total() {
        return depth == 0;
    }
    if index == 0 {
        return true;
    }
    let previous = &rows[index - 1];
    previous.is_grand_total() || !same_prefix(row, previous, depth)
}

/// Number of contiguous rows, starting at `index`, that share the row's
/// values at depths `0..=depth`. Always at least 1.
pub fn rowspan_for<R: LabelRow>(rows: &[R], index: usize, depth: usize) -> usize {
    let Some(row) = rows.get(index) else {
        return 1;
    };
    if row.is_grand_total() {
        return 1;
    }
    rows[index..]
        .iter()
        .take_while(|other| !other.is_grand_total() && same_prefix(row, *other, depth))
        .count()
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::GroupValue;
    use crate::definition::AggregationType;

    struct Row {
        key: GroupKey,
        total: bool,
    }

    impl LabelRow for Row {
        fn row_key(&self) -> &GroupKey {
            &self.key
        }

        fn is_grand_total(&self) -> bool {
            self.total
        }
    }

    fn key(parts: &[&str]) -> GroupKey {
        GroupKey::new(parts.iter().map(|p| GroupValue::text(*p)))
    }

    fn body(keys: &[&[&str]]) -> Vec<Row> {
        let mut rows: Vec<Row> = keys
            .iter()
            .map(|k| Row {
                key: key(k),
                total: false,
            })
            .collect();
        rows.push(Row {
            key: GroupKey::ungrouped(),
            total: true,
        });
        rows
    }

    fn fields(names: &[&str]) -> Vec<PivotField> {
        names.iter().map(|n| PivotField::new(*n)).collect()
    }

    #[test]
    fn test_spans_merge_repeated_leading_values() {
        let rows = body(&[
            &["East", "A"],
            &["East", "B"],
            &["West", "A"],
            &["West", "A"],
        ]);

        assert!(should_display_cell(&rows, 0, 0));
        assert_eq!(rowspan_for(&rows, 0, 0), 2);
        assert!(!should_display_cell(&rows, 1, 0));
        assert!(should_display_cell(&rows, 1, 1));
        assert!(should_display_cell(&rows, 2, 0));
        assert_eq!(rowspan_for(&rows, 2, 0), 2);
        assert_eq!(rowspan_for(&rows, 2, 1), 2);
        assert!(!should_display_cell(&rows, 3, 1));

        // Grand total row stands alone
        assert!(should_display_cell(&rows, 4, 0));
        assert!(!should_display_cell(&rows, 4, 1));
        assert_eq!(rowspan_for(&rows, 4, 0), 1);
    }

    #[test]
    fn test_inner_span_breaks_when_outer_value_changes() {
        // Same product under different regions must not merge
        let rows = body(&[&["East", "A"], &["West", "A"]]);
        assert!(should_display_cell(&rows, 1, 1));
        assert_eq!(rowspan_for(&rows, 0, 1), 1);
    }

    #[test]
    fn test_span_coverage_per_depth() {
        let rows = body(&[
            &["East", "A", "Q1"],
            &["East", "A", "Q2"],
            &["East", "B", "Q1"],
            &["West", "A", "Q1"],
            &["West", "B", "Q1"],
            &["West", "B", "Q2"],
        ]);
        let data_rows = rows.len() - 1;

        for depth in 0..3 {
            let covered: usize = (0..data_rows)
                .filter(|&i| should_display_cell(&rows, i, depth))
                .map(|i| rowspan_for(&rows, i, depth))
                .sum();
            assert_eq!(covered, data_rows, "depth {}", depth);

            // Every data row is either displayed or covered, never both
            let mut covered_by: Vec<usize> = vec![0; data_rows];
            for i in (0..data_rows).filter(|&i| should_display_cell(&rows, i, depth)) {
                for slot in &mut covered_by[i..i + rowspan_for(&rows, i, depth)] {
                    *slot += 1;
                }
            }
            assert!(covered_by.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_headers_with_nested_column_fields() {
        let columns = fields(&["Product", "Quarter"]);
        let values = vec![
            ValueField::new("Sales", AggregationType::Sum),
            ValueField::new("Units", AggregationType::Count),
        ];
        let keys = vec![
            key(&["A", "Q1"]),
            key(&["A", "Q2"]),
            key(&["B", "Q1"]),
        ];
        let rows = build_header_rows(&fields(&["Region"]), &columns, &values, &keys, 1, true);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0].kind, HeaderKind::RowFieldLabel);
        assert_eq!(rows[0][0].row_span, 3);

        let top: Vec<(&str, usize)> = rows[0][1..]
            .iter()
            .map(|c| (c.text.as_str(), c.col_span))
            .collect();
        assert_eq!(top, vec![("A", 4), ("B", 2), ("Grand Total", 2)]);
        assert_eq!(rows[0][3].row_span, 2);

        let second: Vec<&str> = rows[1].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(second, vec!["Q1", "Q2", "Q1"]);

        assert_eq!(rows[2].len(), 8);
        assert_eq!(rows[2][0].text, "Sales (Sum)");
        assert_eq!(rows[2][1].text, "Units (Count)");

        let width = header_row_width(&rows, 0);
        assert_eq!(width, 1 + 3 * 2 + 2);
        for r in 1..rows.len() {
            assert_eq!(header_row_width(&rows, r), width);
        }
    }

    #[test]
    fn test_headers_without_column_fields() {
        let values = vec![ValueField::new("Sales", AggregationType::Sum)];
        let rows = build_header_rows(
            &fields(&["Region", "Product"]),
            &[],
            &values,
            &[GroupKey::ungrouped()],
            2,
            true,
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0].text, "Region / Product");
        assert_eq!(rows[0][0].col_span, 2);
        assert_eq!(rows[0][1].kind, HeaderKind::ValueLabel);
        assert_eq!(rows[0][2].kind, HeaderKind::GrandTotalLabel);
        assert_eq!(rows[0][2].col_span, 1);
        assert_eq!(rows[0][2].row_span, 1);
        assert_eq!(header_row_width(&rows, 0), 2 + 1 + 1);

        let without_total = build_header_rows(
            &fields(&["Region"]),
            &[],
            &values,
            &[GroupKey::ungrouped()],
            1,
            false,
        );
        assert_eq!(without_total[0].len(), 2);
    }

    #[test]
    fn test_placement_skips_rowspan_slots() {
        let columns = fields(&["Product", "Quarter"]);
        let values = vec![ValueField::new("Sales", AggregationType::Sum)];
        let keys = vec![key(&["A", "Q1"]), key(&["A", "Q2"])];
        let rows = build_header_rows(&[], &columns, &values, &keys, 1, true);
        let placed = place_header_cells(&rows);

        let starts: Vec<Vec<usize>> = placed
            .iter()
            .map(|row| row.iter().map(|(col, _)| *col).collect())
            .collect();
        assert_eq!(starts, vec![vec![0, 1, 3], vec![1, 2], vec![1, 2, 3]]);
    }

    #[test]
    fn test_no_value_fields_means_no_headers() {
        assert!(build_header_rows(&[], &[], &[], &[], 1, true).is_empty());
    }
}
