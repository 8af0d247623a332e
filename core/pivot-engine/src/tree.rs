//! FILENAME: core/pivot-engine/src/tree.rs
//! PURPOSE: Hierarchical rollup of row keys, and hierarchical ordering of
//! column keys.
//! CONTEXT: One tree level per row field. Leaf nodes take their per-column
//! accumulators straight from the `CellTable`; parent nodes merge their
//! children's. Building happens on mutable `NodeBuilder`s, finalization
//! produces read-only `RollupNode`s with aggregated values.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::cache::{
    aggregate, merge_into, AggregateAccumulator, CellTable, GroupKey, GroupValue,
};
use crate::definition::{PivotDefinition, PivotField, SortOrder, ValueField};
use crate::totals::GrandTotals;
use dataset::Dataset;

// ============================================================================
// ITEM ORDERING
// ============================================================================

/// Orders sibling values according to a field's sort order. Data source
/// order keeps the order of first appearance.
fn sort_siblings<T>(items: &mut [T], sort_order: SortOrder, value: impl Fn(&T) -> &GroupValue) {
    match sort_order {
        SortOrder::Ascending => items.sort_by(|a, b| value(a).compare(value(b))),
        SortOrder::Descending => items.sort_by(|a, b| value(b).compare(value(a))),
        SortOrder::DataSourceOrder => {}
    }
}

fn sort_order_at(fields: &[PivotField], depth: usize) -> SortOrder {
    fields.get(depth).map(|f| f.sort_order).unwrap_or_default()
}

/// Prefix tree over composite keys, used to order an axis.
#[derive(Debug)]
struct AxisNode {
    value: GroupValue,
    child_index: FxHashMap<GroupValue, usize>,
    children: Vec<AxisNode>,
    leaf: Option<GroupKey>,
}

impl AxisNode {
    fn new(value: GroupValue) -> Self {
        AxisNode {
            value,
            child_index: FxHashMap::default(),
            children: Vec::new(),
            leaf: None,
        }
    }

    fn insert(&mut self, key: &GroupKey) {
        let mut node = self;
        for value in key.values() {
            let index = match node.child_index.get(value) {
                Some(&i) => i,
                None => {
                    node.children.push(AxisNode::new(value.clone()));
                    let i = node.children.len() - 1;
                    node.child_index.insert(value.clone(), i);
                    i
                }
            };
            node = &mut node.children[index];
        }
        node.leaf = Some(key.clone());
    }

    fn flatten_into(mut self, fields: &[PivotField], depth: usize, out: &mut Vec<GroupKey>) {
        if let Some(key) = self.leaf.take() {
            out.push(key);
        }
        sort_siblings(&mut self.children, sort_order_at(fields, depth), |child| &child.value);
        for child in self.children {
            child.flatten_into(fields, depth + 1, out);
        }
    }
}

/// Orders composite keys hierarchically: keys sharing a leading value stay
/// contiguous, and each level follows its field's sort order.
pub fn ordered_keys(keys: &[GroupKey], fields: &[PivotField]) -> Vec<GroupKey> {
    let mut root = AxisNode::new(GroupValue::Blank);
    for key in keys {
        root.insert(key);
    }
    let mut out = Vec::with_capacity(keys.len());
    root.flatten_into(fields, 0, &mut out);
    out
}

// ============================================================================
// ROLLUP TREE
// ============================================================================

/// Accumulation phase node.
#[derive(Debug)]
struct NodeBuilder {
    value: GroupValue,
    key: GroupKey,
    /// [column][value field]
    cells: Vec<Vec<AggregateAccumulator>>,
    child_index: FxHashMap<GroupValue, usize>,
    children: Vec<NodeBuilder>,
}

impl NodeBuilder {
    fn new(value: GroupValue, key: GroupKey, columns: usize, values: usize) -> Self {
        NodeBuilder {
            value,
            key,
            cells: vec![vec![AggregateAccumulator::new(); values]; columns],
            child_index: FxHashMap::default(),
            children: Vec::new(),
        }
    }
}

/// Finalized, read-only node of the rollup tree.
#[derive(Debug, Clone, Serialize)]
pub struct RollupNode {
    /// This level's grouping value.
    pub value: GroupValue,

    /// Row key prefix from the root down to this node.
    pub key: GroupKey,

    /// 0 = outermost row field.
    pub depth: usize,

    /// Raw accumulators indexed by [column][value field], in the tree's
    /// column order.
    pub cells: Vec<Vec<AggregateAccumulator>>,

    /// Aggregated values, same shape as `cells`.
    pub values: Vec<Vec<f64>>,

    /// Raw accumulators across all columns, one per value field.
    pub row_total: Vec<AggregateAccumulator>,

    /// Per value field: the sum of this node's per-column aggregated values.
    /// For Average this is a sum of averages, not a re-averaged value.
    pub total: Vec<f64>,

    pub children: Vec<RollupNode>,
}

impl RollupNode {
    pub fn label(&self) -> String {
        self.value.label()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Aggregated value of one column. Out-of-range lookups yield 0.
    pub fn value(&self, column: usize, value_index: usize) -> f64 {
        self.values
            .get(column)
            .and_then(|values| values.get(value_index))
            .copied()
            .unwrap_or(0.0)
    }

    /// Whether any record contributed to one column of this node.
    pub fn is_populated(&self, column: usize) -> bool {
        self.cells
            .get(column)
            .map(|accs| accs.iter().any(|acc| acc.total_count > 0))
            .unwrap_or(false)
    }

    fn visit<'a>(&'a self, out: &mut Vec<&'a RollupNode>, leaves_only: bool) {
        if !leaves_only || self.is_leaf() {
            out.push(self);
        }
        for child in &self.children {
            child.visit(out, leaves_only);
        }
    }
}

/// Rollup of all row keys, plus the column order and totals it was built
/// against.
#[derive(Debug, Clone, Serialize)]
pub struct RollupTree {
    pub roots: Vec<RollupNode>,

    /// Column keys in display order. Node cells are indexed by position here.
    pub column_keys: Vec<GroupKey>,

    pub value_fields: Vec<ValueField>,

    /// Raw column totals aligned with `column_keys`.
    pub column_totals: Vec<Vec<AggregateAccumulator>>,

    /// Raw totals over every included record.
    pub grand_total: Vec<AggregateAccumulator>,

    /// Number of row fields (tree depth).
    pub depth: usize,
}

impl RollupTree {
    /// Builds the tree from an aggregated table and its grand totals.
    pub fn build(
        table: &CellTable,
        totals: &GrandTotals,
        row_fields: &[PivotField],
        column_fields: &[PivotField],
        value_fields: &[ValueField],
    ) -> Self {
        let column_keys = ordered_keys(table.column_keys(), column_fields);
        let value_count = value_fields.len();
        let column_count = column_keys.len();

        let mut roots: Vec<NodeBuilder> = Vec::new();
        let mut root_index: FxHashMap<GroupValue, usize> = FxHashMap::default();

        if !row_fields.is_empty() {
            for row_key in table.row_keys() {
                let leaf = Self::path_for(
                    &mut roots,
                    &mut root_index,
                    row_key,
                    column_count,
                    value_count,
                );
                let Some(leaf) = leaf else { continue };
                for (ci, column_key) in column_keys.iter().enumerate() {
                    if let Some(accs) = table.accumulators(row_key, column_key) {
                        merge_into(&mut leaf.cells[ci], accs);
                    }
                }
            }
        }

        let finalizer = Finalizer {
            totals,
            row_fields,
            value_fields,
        };
        let mut roots: Vec<RollupNode> = roots
            .into_iter()
            .map(|builder| finalizer.finalize(builder, 0))
            .collect();
        sort_siblings(&mut roots, sort_order_at(row_fields, 0), |n| &n.value);

        let column_totals = column_keys
            .iter()
            .map(|key| {
                totals
                    .column_accumulators(key)
                    .map(<[AggregateAccumulator]>::to_vec)
                    .unwrap_or_else(|| vec![AggregateAccumulator::new(); value_count])
            })
            .collect();

        RollupTree {
            roots,
            column_keys,
            value_fields: value_fields.to_vec(),
            column_totals,
            grand_total: totals.overall_accumulators().to_vec(),
            depth: row_fields.len(),
        }
    }

    /// Walks (creating as needed) the node chain for a full row key and
    /// returns the deepest node.
    fn path_for<'a>(
        roots: &'a mut Vec<NodeBuilder>,
        root_index: &mut FxHashMap<GroupValue, usize>,
        row_key: &GroupKey,
        columns: usize,
        values: usize,
    ) -> Option<&'a mut NodeBuilder> {
        let (first, rest) = row_key.values().split_first()?;

        let i = *root_index.entry(first.clone()).or_insert_with(|| {
            roots.push(NodeBuilder::new(
                first.clone(),
                row_key.prefix(1),
                columns,
                values,
            ));
            roots.len() - 1
        });
        let mut node = &mut roots[i];

        for (offset, value) in rest.iter().enumerate() {
            let index = match node.child_index.get(value) {
                Some(&i) => i,
                None => {
                    let key = row_key.prefix(offset + 2);
                    node.children
                        .push(NodeBuilder::new(value.clone(), key, columns, values));
                    let i = node.children.len() - 1;
                    node.child_index.insert(value.clone(), i);
                    i
                }
            };
            node = &mut node.children[index];
        }

        Some(node)
    }

    /// Top-level nodes in display order.
    pub fn roots(&self) -> &[RollupNode] {
        &self.roots
    }

    /// All nodes, parents before their children.
    pub fn nodes(&self) -> Vec<&RollupNode> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.visit(&mut out, false);
        }
        out
    }

    /// Leaf nodes (one per full row key) in display order.
    pub fn leaves(&self) -> Vec<&RollupNode> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.visit(&mut out, true);
        }
        out
    }

    /// Finds the node for a row key prefix.
    pub fn find(&self, key: &GroupKey) -> Option<&RollupNode> {
        let mut level = &self.roots;
        let mut found = None;
        for value in key.values() {
            let node = level.iter().find(|n| &n.value == value)?;
            level = &node.children;
            found = Some(node);
        }
        found
    }
}

/// Converts builders into finalized nodes.
struct Finalizer<'a> {
    totals: &'a GrandTotals,
    row_fields: &'a [PivotField],
    value_fields: &'a [ValueField],
}

impl Finalizer<'_> {
    fn finalize(&self, builder: NodeBuilder, depth: usize) -> RollupNode {
        let NodeBuilder {
            value,
            key,
            mut cells,
            children,
            ..
        } = builder;

        let mut children: Vec<RollupNode> = children
            .into_iter()
            .map(|child| self.finalize(child, depth + 1))
            .collect();
        sort_siblings(&mut children, sort_order_at(self.row_fields, depth + 1), |n| {
            &n.value
        });

        let value_count = self.value_fields.len();
        let row_total = if children.is_empty() {
            self.totals
                .row_accumulators(&key)
                .map(<[AggregateAccumulator]>::to_vec)
                .unwrap_or_else(|| vec![AggregateAccumulator::new(); value_count])
        } else {
            let mut row_total = vec![AggregateAccumulator::new(); value_count];
            for child in &children {
                for (ci, child_cells) in child.cells.iter().enumerate() {
                    merge_into(&mut cells[ci], child_cells);
                }
                merge_into(&mut row_total, &child.row_total);
            }
            row_total
        };

        let values: Vec<Vec<f64>> = cells
            .iter()
            .map(|accs| {
                accs.iter()
                    .zip(self.value_fields)
                    .map(|(acc, vf)| acc.compute(vf.aggregation))
                    .collect()
            })
            .collect();

        let total = (0..value_count)
            .map(|vi| values.iter().map(|column| column[vi]).sum::<f64>())
            .collect();

        RollupNode {
            value,
            key,
            depth,
            cells,
            values,
            row_total,
            total,
            children,
        }
    }
}

/// Aggregates and builds the rollup tree in one call.
pub fn build_tree(dataset: &Dataset, definition: &PivotDefinition) -> RollupTree {
    let table = aggregate(
        dataset,
        &definition.row_fields,
        &definition.column_fields,
        &definition.value_fields,
    );
    let totals = GrandTotals::from_table(&table);
    RollupTree::build(
        &table,
        &totals,
        &definition.row_fields,
        &definition.column_fields,
        &definition.value_fields,
    )
}
