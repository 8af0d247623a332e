//! FILENAME: core/pivot-engine/src/cache.rs
//! Pivot Cache - Grouped accumulators for one field configuration.
//!
//! The cache is designed for:
//! - One O(n) pass over the records per grouping configuration
//! - Structural composite keys (no delimiter joins, no collisions)
//! - Raw (sum, total_count, numeric_count) triples, so switching a value
//!   field between Sum / Average / Count never needs a re-scan
//!
//! Architecture:
//! - Every record maps to one row key and one column key
//! - Each (row key, column key) cell holds one accumulator per value field
//! - `PivotCache` memoizes the table until the grouping itself changes

use std::cmp::Ordering;
use std::fmt;

use dataset::{CellValue, Dataset, FieldIndex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::definition::{AggregationType, PivotDefinition, PivotField, ValueField};
use crate::{log_debug, log_warn};

/// Label shown for missing values.
pub const BLANK_LABEL: &str = "(blank)";

/// Separator used when a composite key is rendered as text.
pub const KEY_DISPLAY_SEPARATOR: &str = " | ";

// ============================================================================
// GROUP VALUES AND KEYS
// ============================================================================

/// A normalized, hashable representation of a grouping value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupValue {
    /// Missing field or empty cell.
    Blank,
    Number(OrderedFloat),
    Text(String),
    Boolean(bool),
}

impl From<&CellValue> for GroupValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => GroupValue::Blank,
            CellValue::Number(n) => GroupValue::Number(OrderedFloat(*n)),
            CellValue::Text(s) => GroupValue::Text(s.clone()),
            CellValue::Boolean(b) => GroupValue::Boolean(*b),
        }
    }
}

impl GroupValue {
    pub fn text(s: impl Into<String>) -> Self {
        GroupValue::Text(s.into())
    }

    /// Display label for headers and row labels.
    pub fn label(&self) -> String {
        match self {
            GroupValue::Blank => BLANK_LABEL.to_string(),
            GroupValue::Number(n) => CellValue::Number(n.0).display_value(),
            GroupValue::Text(s) => s.clone(),
            GroupValue::Boolean(b) => CellValue::Boolean(*b).display_value(),
        }
    }

    /// Ordering used for ascending/descending item sorts.
    /// Blanks first, then numbers (NaN last among them), text, booleans.
    pub fn compare(&self, other: &GroupValue) -> Ordering {
        match (self, other) {
            (GroupValue::Blank, GroupValue::Blank) => Ordering::Equal,
            (GroupValue::Blank, _) => Ordering::Less,
            (_, GroupValue::Blank) => Ordering::Greater,

            (GroupValue::Number(a), GroupValue::Number(b)) => match (a.0.is_nan(), b.0.is_nan()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                // 0.0 and -0.0 compare equal, matching OrderedFloat's Eq
                (false, false) => a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal),
            },
            (GroupValue::Number(_), _) => Ordering::Less,
            (_, GroupValue::Number(_)) => Ordering::Greater,

            (GroupValue::Text(a), GroupValue::Text(b)) => a.cmp(b),
            (GroupValue::Text(_), _) => Ordering::Less,
            (_, GroupValue::Text(_)) => Ordering::Greater,

            (GroupValue::Boolean(a), GroupValue::Boolean(b)) => a.cmp(b),
        }
    }
}

/// Wrapper around f64 that implements Eq and Hash for use as HashMap keys.
/// NaN values are treated as equal to each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            // All NaN values hash to the same thing
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            // 0.0 and -0.0 compare equal, so they must hash equal
            0u64.hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}

/// An ordered tuple of grouping values (row fields or column fields).
/// The empty tuple is the "no grouping" key: it can never equal a key
/// built from one or more real field values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GroupKey(SmallVec<[GroupValue; 4]>);

impl GroupKey {
    pub fn new(values: impl IntoIterator<Item = GroupValue>) -> Self {
        GroupKey(values.into_iter().collect())
    }

    /// The reserved key used when no grouping fields are selected.
    pub fn ungrouped() -> Self {
        GroupKey(SmallVec::new())
    }

    pub fn values(&self) -> &[GroupValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `depth` values (clamped to the key length).
    pub fn prefix(&self, depth: usize) -> GroupKey {
        GroupKey(self.0.iter().take(depth).cloned().collect())
    }

    /// Whether `prefix` matches the leading values of this key.
    pub fn starts_with(&self, prefix: &GroupKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn labels(&self) -> Vec<String> {
        self.0.iter().map(GroupValue::label).collect()
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels().join(KEY_DISPLAY_SEPARATOR))
    }
}

// ============================================================================
// AGGREGATE ACCUMULATOR
// ============================================================================

/// Accumulator for computing aggregates incrementally.
///
/// `total_count` counts every contributing record, `numeric_count` only
/// those whose value parsed as a number. Average divides by the latter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateAccumulator {
    pub sum: f64,
    pub total_count: u64,
    pub numeric_count: u64,
}

impl AggregateAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one record's contribution. `None` is a value that failed to
    /// parse: it counts as a record but adds nothing to the sum.
    pub fn add(&mut self, value: Option<f64>) {
        self.total_count += 1;
        if let Some(n) = value {
            self.sum += n;
            self.numeric_count += 1;
        }
    }

    /// Merges another accumulator into this one.
    pub fn merge(&mut self, other: &AggregateAccumulator) {
        self.sum += other.sum;
        self.total_count += other.total_count;
        self.numeric_count += other.numeric_count;
    }

    /// Computes the final aggregate value. An empty accumulator yields 0
    /// for every aggregation.
    pub fn compute(&self, aggregation: AggregationType) -> f64 {
        match aggregation {
            AggregationType::Sum => self.sum,
            AggregationType::Count => self.total_count as f64,
            AggregationType::Average => {
                if self.numeric_count > 0 {
                    self.sum / (self.numeric_count as f64)
                } else {
                    0.0
                }
            }
        }
    }
}

/// Merges `source` accumulators into `target`, position by position.
pub(crate) fn merge_into(target: &mut [AggregateAccumulator], source: &[AggregateAccumulator]) {
    for (t, s) in target.iter_mut().zip(source) {
        t.merge(s);
    }
}

// ============================================================================
// CELL TABLE
// ============================================================================

/// Result of one aggregation pass: accumulators per (row key, column key),
/// one per value field, plus the observed keys in order of first appearance.
#[derive(Debug, Clone, Default)]
pub struct CellTable {
    value_count: usize,
    row_keys: Vec<GroupKey>,
    column_keys: Vec<GroupKey>,
    row_index: FxHashMap<GroupKey, usize>,
    column_index: FxHashMap<GroupKey, usize>,
    cells: FxHashMap<(usize, usize), Vec<AggregateAccumulator>>,
    record_count: usize,
}

impl CellTable {
    fn new(value_count: usize) -> Self {
        CellTable {
            value_count,
            ..Default::default()
        }
    }

    /// Number of value fields each cell carries accumulators for.
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Distinct row keys in order of first appearance.
    pub fn row_keys(&self) -> &[GroupKey] {
        &self.row_keys
    }

    /// Distinct column keys in order of first appearance.
    pub fn column_keys(&self) -> &[GroupKey] {
        &self.column_keys
    }

    /// Number of records that contributed (after hidden items).
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// All accumulators of a cell, or None if no record fell into it.
    pub fn accumulators(&self, row: &GroupKey, column: &GroupKey) -> Option<&[AggregateAccumulator]> {
        let r = *self.row_index.get(row)?;
        let c = *self.column_index.get(column)?;
        self.cells.get(&(r, c)).map(Vec::as_slice)
    }

    /// One value field's accumulator of a cell.
    pub fn accumulator(
        &self,
        row: &GroupKey,
        column: &GroupKey,
        value_index: usize,
    ) -> Option<&AggregateAccumulator> {
        self.accumulators(row, column)?.get(value_index)
    }

    /// Final value of a cell. Cells without records yield 0.
    pub fn value(
        &self,
        row: &GroupKey,
        column: &GroupKey,
        value_index: usize,
        aggregation: AggregationType,
    ) -> f64 {
        self.accumulator(row, column, value_index)
            .map(|acc| acc.compute(aggregation))
            .unwrap_or(0.0)
    }

    /// Iterates over populated cells as (row key, column key, accumulators).
    pub fn cells(&self) -> impl Iterator<Item = (&GroupKey, &GroupKey, &[AggregateAccumulator])> {
        self.cells.iter().map(move |(&(r, c), accs)| {
            (&self.row_keys[r], &self.column_keys[c], accs.as_slice())
        })
    }

    fn intern(keys: &mut Vec<GroupKey>, index: &mut FxHashMap<GroupKey, usize>, key: GroupKey) -> usize {
        if let Some(&i) = index.get(&key) {
            return i;
        }
        let i = keys.len();
        keys.push(key.clone());
        index.insert(key, i);
        i
    }

    fn accumulate(&mut self, row: GroupKey, column: GroupKey, values: &[Option<f64>]) {
        let r = Self::intern(&mut self.row_keys, &mut self.row_index, row);
        let c = Self::intern(&mut self.column_keys, &mut self.column_index, column);
        let value_count = self.value_count;
        let accs = self
            .cells
            .entry((r, c))
            .or_insert_with(|| vec![AggregateAccumulator::new(); value_count]);
        for (acc, value) in accs.iter_mut().zip(values) {
            acc.add(*value);
        }
        self.record_count += 1;
    }
}

// ============================================================================
// AGGREGATION PASS
// ============================================================================

/// A grouping field resolved against the dataset header.
struct ResolvedField<'a> {
    index: Option<FieldIndex>,
    hidden: &'a [String],
}

/// Resolves a field name, warning when the dataset has no such header.
fn resolve_index(dataset: &Dataset, name: &str) -> Option<FieldIndex> {
    let index = dataset.field_index(name);
    if index.is_none() {
        log_warn!("CACHE", "field '{}' is not in the dataset header", name);
    }
    index
}

fn resolve_fields<'a>(dataset: &Dataset, fields: &'a [PivotField]) -> Vec<ResolvedField<'a>> {
    fields
        .iter()
        .map(|f| ResolvedField {
            index: resolve_index(dataset, &f.name),
            hidden: &f.hidden_items,
        })
        .collect()
}

/// Builds a record's key for the given fields. Returns None when one of the
/// values is a hidden item.
fn build_key(values: &[CellValue], fields: &[ResolvedField<'_>]) -> Option<GroupKey> {
    let mut key = SmallVec::with_capacity(fields.len());
    for field in fields {
        let value = field
            .index
            .and_then(|i| values.get(i))
            .map(GroupValue::from)
            .unwrap_or(GroupValue::Blank);
        if !field.hidden.is_empty() && field.hidden.contains(&value.label()) {
            return None;
        }
        key.push(value);
    }
    Some(GroupKey(key))
}

/// Maps records to their (row key, column key) pair.
pub(crate) struct KeyBuilder<'a> {
    rows: Vec<ResolvedField<'a>>,
    columns: Vec<ResolvedField<'a>>,
}

impl<'a> KeyBuilder<'a> {
    pub(crate) fn new(
        dataset: &Dataset,
        row_fields: &'a [PivotField],
        column_fields: &'a [PivotField],
    ) -> Self {
        KeyBuilder {
            rows: resolve_fields(dataset, row_fields),
            columns: resolve_fields(dataset, column_fields),
        }
    }

    /// None when the record is excluded by a hidden item.
    pub(crate) fn keys(&self, values: &[CellValue]) -> Option<(GroupKey, GroupKey)> {
        Some((build_key(values, &self.rows)?, build_key(values, &self.columns)?))
    }
}

/// Groups every record by its composite row and column key and accumulates
/// each value field into the matching cell.
///
/// Empty row or column field lists collapse onto the ungrouped key, so the
/// table degenerates to a single row and/or column. Fields missing from the
/// dataset group as blank and aggregate as non-numeric.
pub fn aggregate(
    dataset: &Dataset,
    row_fields: &[PivotField],
    column_fields: &[PivotField],
    value_fields: &[ValueField],
) -> CellTable {
    let key_builder = KeyBuilder::new(dataset, row_fields, column_fields);
    let value_indices: Vec<Option<FieldIndex>> = value_fields
        .iter()
        .map(|vf| resolve_index(dataset, &vf.name))
        .collect();

    let mut table = CellTable::new(value_fields.len());
    let mut numbers: Vec<Option<f64>> = Vec::with_capacity(value_fields.len());

    for record in dataset.records() {
        let values = record.values();
        let Some((row_key, column_key)) = key_builder.keys(values) else {
            continue;
        };

        numbers.clear();
        numbers.extend(
            value_indices
                .iter()
                .map(|idx| idx.and_then(|i| values.get(i)).and_then(CellValue::as_number)),
        );

        table.accumulate(row_key, column_key, &numbers);
    }

    log_debug!(
        "CACHE",
        "aggregated records={} included={} rows={} cols={} cells={}",
        dataset.record_count(),
        table.record_count,
        table.row_keys.len(),
        table.column_keys.len(),
        table.cells.len()
    );

    table
}

// ============================================================================
// MEMOIZED CACHE
// ============================================================================

/// What the accumulators depend on. Aggregation kinds and sort orders are
/// deliberately absent: they are applied after the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheSignature {
    row_fields: Vec<(String, Vec<String>)>,
    column_fields: Vec<(String, Vec<String>)>,
    value_fields: Vec<String>,
}

impl CacheSignature {
    fn of(definition: &PivotDefinition) -> Self {
        let grouping = |fields: &[PivotField]| {
            fields
                .iter()
                .map(|f| (f.name.clone(), f.hidden_items.clone()))
                .collect()
        };
        CacheSignature {
            row_fields: grouping(&definition.row_fields),
            column_fields: grouping(&definition.column_fields),
            value_fields: definition.value_fields.iter().map(|f| f.name.clone()).collect(),
        }
    }
}

/// Statistics about the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_records: usize,
    pub included_records: usize,
    pub row_groups: usize,
    pub column_groups: usize,
    pub cell_groups: usize,
    pub rebuilds: u64,
}

/// Owns the dataset and the most recent cell table.
#[derive(Debug, Clone)]
pub struct PivotCache {
    dataset: Dataset,
    entry: Option<(CacheSignature, CellTable)>,
    pub stats: CacheStats,
}

impl PivotCache {
    pub fn new(dataset: Dataset) -> Self {
        let stats = CacheStats {
            total_records: dataset.record_count(),
            ..Default::default()
        };
        PivotCache {
            dataset,
            entry: None,
            stats,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Returns the cell table for the definition's grouping, re-aggregating
    /// only when rows, columns, value field names or hidden items changed.
    pub fn table(&mut self, definition: &PivotDefinition) -> &CellTable {
        let signature = CacheSignature::of(definition);
        if matches!(&self.entry, Some((cached, _)) if *cached != signature) {
            self.entry = None;
        }

        let dataset = &self.dataset;
        let stats = &mut self.stats;
        let (_, table) = self.entry.get_or_insert_with(|| {
            let table = aggregate(
                dataset,
                &definition.row_fields,
                &definition.column_fields,
                &definition.value_fields,
            );
            stats.included_records = table.record_count();
            stats.row_groups = table.row_keys().len();
            stats.column_groups = table.column_keys().len();
            stats.cell_groups = table.cell_count();
            stats.rebuilds += 1;
            (signature, table)
        });
        table
    }

    /// Drops the memoized table.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
