//! FILENAME: core/pivot-engine/src/engine.rs
//! Pivot Engine - The calculation core that transforms data into a renderable view.
//!
//! This module takes a PivotDefinition (configuration) and a Dataset (or a
//! PivotCache holding one) and produces a PivotView.
//!
//! Algorithm:
//! 1. Aggregate records into a CellTable (or reuse the cached one)
//! 2. Merge raw accumulators into row, column and overall grand totals
//! 3. Build the rollup tree over row keys and order the column keys
//! 4. Lay out header rows, body rows, and row-label spans

use std::time::Instant;

use dataset::Dataset;

use crate::cache::{
    aggregate, AggregateAccumulator, CellTable, GroupKey, KeyBuilder, PivotCache,
};
use crate::definition::{AggregationType, PivotDefinition, ReportLayout};
use crate::error::PivotError;
use crate::layout::{
    build_header_rows, rowspan_for, should_display_cell, GRAND_TOTAL_LABEL,
};
use crate::totals::GrandTotals;
use crate::tree::{RollupNode, RollupTree};
use crate::view::{
    ColumnDescriptor, DrillDownResult, LabelCell, PivotOutput, PivotRow, PivotView, RowKind,
    ValueCell,
};
use crate::{log_debug, log_info};

/// Where a value column reads from.
#[derive(Debug, Clone, Copy)]
enum ColumnSlot {
    /// Position in the tree's ordered column keys.
    Column(usize),
    GrandTotal,
}

#[derive(Debug, Clone, Copy)]
struct ColumnSource {
    slot: ColumnSlot,
    value_index: usize,
    aggregation: AggregationType,
}

// ============================================================================
// PIVOT CALCULATOR
// ============================================================================

/// Turns an aggregated table into a view for one definition.
pub struct PivotCalculator<'a> {
    definition: &'a PivotDefinition,
    table: &'a CellTable,
}

impl<'a> PivotCalculator<'a> {
    pub fn new(definition: &'a PivotDefinition, table: &'a CellTable) -> Self {
        PivotCalculator { definition, table }
    }

    /// Generates the complete view.
    pub fn calculate(&self) -> PivotView {
        let definition = self.definition;
        let layout = &definition.layout;

        let totals = GrandTotals::from_table(self.table);
        let tree = RollupTree::build(
            self.table,
            &totals,
            &definition.row_fields,
            &definition.column_fields,
            &definition.value_fields,
        );

        let label_columns = match layout.report_layout {
            ReportLayout::Tabular => definition.row_fields.len().max(1),
            ReportLayout::Compact => 1,
        };
        let grand_total_column = layout.show_column_grand_totals
            && (!definition.row_fields.is_empty() || !definition.column_fields.is_empty());

        let header_rows = build_header_rows(
            &definition.row_fields,
            &definition.column_fields,
            &definition.value_fields,
            &tree.column_keys,
            label_columns,
            grand_total_column,
        );

        let (columns, sources) = self.build_columns(&tree, grand_total_column);

        let nodes = match layout.report_layout {
            ReportLayout::Tabular => tree.leaves(),
            ReportLayout::Compact => tree.nodes(),
        };
        let mut rows: Vec<PivotRow> = nodes
            .into_iter()
            .map(|node| self.node_row(node, &sources))
            .collect();

        // Without row fields the grand total row is the only body row.
        if layout.show_row_grand_totals || definition.row_fields.is_empty() {
            rows.push(self.grand_total_row(&tree, &sources));
        }

        let labels: Vec<Vec<LabelCell>> = (0..rows.len())
            .map(|index| self.labels_for(&rows, index, label_columns))
            .collect();
        for (row, row_labels) in rows.iter_mut().zip(labels) {
            row.labels = row_labels;
        }

        log_debug!(
            "LAYOUT",
            "header_rows={} label_columns={} value_columns={} body_rows={}",
            header_rows.len(),
            label_columns,
            columns.len(),
            rows.len()
        );

        PivotView {
            version: definition.version,
            report_layout: layout.report_layout,
            header_rows,
            label_columns,
            columns,
            rows,
        }
    }

    /// One column per (column key, value field), then the grand total block.
    fn build_columns(
        &self,
        tree: &RollupTree,
        grand_total_column: bool,
    ) -> (Vec<ColumnDescriptor>, Vec<ColumnSource>) {
        let value_fields = &self.definition.value_fields;
        let mut columns = Vec::new();
        let mut sources = Vec::new();

        for (ci, column_key) in tree.column_keys.iter().enumerate() {
            for (vi, vf) in value_fields.iter().enumerate() {
                columns.push(ColumnDescriptor::for_column(column_key, vi, vf));
                sources.push(ColumnSource {
                    slot: ColumnSlot::Column(ci),
                    value_index: vi,
                    aggregation: vf.aggregation,
                });
            }
        }

        if grand_total_column {
            for (vi, vf) in value_fields.iter().enumerate() {
                columns.push(ColumnDescriptor::grand_total(vi, vf));
                sources.push(ColumnSource {
                    slot: ColumnSlot::GrandTotal,
                    value_index: vi,
                    aggregation: vf.aggregation,
                });
            }
        }

        (columns, sources)
    }

    fn node_row(&self, node: &RollupNode, sources: &[ColumnSource]) -> PivotRow {
        let values = sources
            .iter()
            .map(|source| {
                let acc = match source.slot {
                    ColumnSlot::Column(ci) => node.cells.get(ci),
                    ColumnSlot::GrandTotal => Some(&node.row_total),
                };
                value_cell(acc, source)
            })
            .collect();

        PivotRow {
            kind: if node.is_leaf() {
                RowKind::Data
            } else {
                RowKind::Subtotal
            },
            key: node.key.clone(),
            depth: node.depth,
            labels: Vec::new(),
            values,
        }
    }

    fn grand_total_row(&self, tree: &RollupTree, sources: &[ColumnSource]) -> PivotRow {
        let values = sources
            .iter()
            .map(|source| {
                let acc = match source.slot {
                    ColumnSlot::Column(ci) => tree.column_totals.get(ci),
                    ColumnSlot::GrandTotal => Some(&tree.grand_total),
                };
                value_cell(acc, source)
            })
            .collect();

        PivotRow {
            kind: RowKind::GrandTotal,
            key: GroupKey::ungrouped(),
            depth: 0,
            labels: Vec::new(),
            values,
        }
    }

    fn labels_for(&self, rows: &[PivotRow], index: usize, label_columns: usize) -> Vec<LabelCell> {
        let row = &rows[index];
        if row.kind == RowKind::GrandTotal {
            return vec![LabelCell {
                text: GRAND_TOTAL_LABEL.to_string(),
                displayed: true,
                row_span: 1,
                col_span: label_columns,
                indent: 0,
            }];
        }

        match self.definition.layout.report_layout {
            ReportLayout::Tabular => (0..self.definition.row_fields.len())
                .map(|depth| LabelCell {
                    text: row
                        .key
                        .values()
                        .get(depth)
                        .map(|v| v.label())
                        .unwrap_or_default(),
                    displayed: should_display_cell(rows, index, depth),
                    row_span: rowspan_for(rows, index, depth),
                    col_span: 1,
                    indent: 0,
                })
                .collect(),
            ReportLayout::Compact => vec![LabelCell {
                text: row
                    .key
                    .values()
                    .last()
                    .map(|v| v.label())
                    .unwrap_or_default(),
                displayed: true,
                row_span: 1,
                col_span: 1,
                indent: row.depth,
            }],
        }
    }
}

fn value_cell(accs: Option<&Vec<AggregateAccumulator>>, source: &ColumnSource) -> ValueCell {
    let acc = accs.and_then(|accs| accs.get(source.value_index));
    let value = acc
        .map(|acc| acc.compute(source.aggregation))
        .unwrap_or(0.0);
    let populated = acc.is_some_and(|acc| acc.total_count > 0);
    ValueCell::new(value, source.aggregation, populated)
}

// ============================================================================
// PUBLIC API
// ============================================================================

fn render(definition: &PivotDefinition, table: &CellTable) -> PivotOutput {
    let start = Instant::now();
    let view = PivotCalculator::new(definition, table).calculate();
    log_info!(
        "PIVOT",
        "calculated v{}: {} rows x {} cols from {} records in {:?}",
        definition.version,
        view.row_count(),
        view.col_count(),
        table.record_count(),
        start.elapsed()
    );
    PivotOutput::Table(view)
}

/// Calculates a pivot table in one pass over the dataset.
///
/// Configuration errors (duplicate fields) fail the call. A definition
/// without value fields yields `PivotOutput::NothingToAggregate`.
pub fn calculate_pivot(
    dataset: &Dataset,
    definition: &PivotDefinition,
) -> Result<PivotOutput, PivotError> {
    definition.validate()?;
    if !definition.has_values() {
        log_info!("PIVOT", "no value fields selected, nothing to aggregate");
        return Ok(PivotOutput::NothingToAggregate);
    }

    let table = aggregate(
        dataset,
        &definition.row_fields,
        &definition.column_fields,
        &definition.value_fields,
    );
    Ok(render(definition, &table))
}

/// Like `calculate_pivot`, but reuses the cache's table when only
/// aggregation kinds, sort orders or layout options changed.
pub fn calculate_cached(
    cache: &mut PivotCache,
    definition: &PivotDefinition,
) -> Result<PivotOutput, PivotError> {
    definition.validate()?;
    if !definition.has_values() {
        log_info!("PIVOT", "no value fields selected, nothing to aggregate");
        return Ok(PivotOutput::NothingToAggregate);
    }

    let table = cache.table(definition);
    Ok(render(definition, table))
}

/// Performs a drill-down operation to get source records for a cell.
///
/// Keys may be prefixes: a shorter row key selects a subtotal row's records,
/// the ungrouped key selects every row (or column).
pub fn drill_down(
    dataset: &Dataset,
    definition: &PivotDefinition,
    row_key: &GroupKey,
    column_key: &GroupKey,
    max_records: usize,
) -> DrillDownResult {
    let key_builder = KeyBuilder::new(dataset, &definition.row_fields, &definition.column_fields);

    let mut source_rows = Vec::new();
    let mut total_count = 0;
    for record in dataset.records() {
        let Some((rk, ck)) = key_builder.keys(record.values()) else {
            continue;
        };
        if rk.starts_with(row_key) && ck.starts_with(column_key) {
            total_count += 1;
            if source_rows.len() < max_records {
                source_rows.push(record.source_row);
            }
        }
    }

    log_debug!(
        "PIVOT",
        "drill_down row='{}' col='{}' matched={}",
        row_key,
        column_key,
        total_count
    );

    DrillDownResult {
        row_key: row_key.clone(),
        column_key: column_key.clone(),
        headers: dataset.headers().to_vec(),
        source_rows,
        total_count,
        is_truncated: total_count > max_records,
        max_records,
    }
}
