//! FILENAME: core/pivot-engine/src/totals.rs
//! PURPOSE: Row, column and overall grand totals.
//! CONTEXT: Totals are merged from the raw accumulator triples of a
//! `CellTable`, never from finalized cell values, so Average totals are true
//! averages over the contributing records.

use rustc_hash::FxHashMap;

use crate::cache::{merge_into, AggregateAccumulator, CellTable, GroupKey};
use crate::definition::AggregationType;

#[derive(Debug, Clone, Default)]
pub struct GrandTotals {
    value_count: usize,
    row_totals: FxHashMap<GroupKey, Vec<AggregateAccumulator>>,
    column_totals: FxHashMap<GroupKey, Vec<AggregateAccumulator>>,
    overall: Vec<AggregateAccumulator>,
}

impl GrandTotals {
    /// Merges every populated cell into its row total, its column total and
    /// the overall total.
    pub fn from_table(table: &CellTable) -> Self {
        let value_count = table.value_count();
        let empty = || vec![AggregateAccumulator::new(); value_count];

        let mut totals = GrandTotals {
            value_count,
            row_totals: FxHashMap::default(),
            column_totals: FxHashMap::default(),
            overall: empty(),
        };

        for (row, column, accs) in table.cells() {
            merge_into(
                totals.row_totals.entry(row.clone()).or_insert_with(empty),
                accs,
            );
            merge_into(
                totals.column_totals.entry(column.clone()).or_insert_with(empty),
                accs,
            );
            merge_into(&mut totals.overall, accs);
        }

        totals
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    pub fn row_accumulators(&self, row: &GroupKey) -> Option<&[AggregateAccumulator]> {
        self.row_totals.get(row).map(Vec::as_slice)
    }

    pub fn column_accumulators(&self, column: &GroupKey) -> Option<&[AggregateAccumulator]> {
        self.column_totals.get(column).map(Vec::as_slice)
    }

    pub fn overall_accumulators(&self) -> &[AggregateAccumulator] {
        &self.overall
    }

    /// Total across all columns of one row.
    pub fn row_value(&self, row: &GroupKey, value_index: usize, aggregation: AggregationType) -> f64 {
        self.row_accumulators(row)
            .and_then(|accs| accs.get(value_index))
            .map(|acc| acc.compute(aggregation))
            .unwrap_or(0.0)
    }

    /// Total across all rows of one column.
    pub fn column_value(
        &self,
        column: &GroupKey,
        value_index: usize,
        aggregation: AggregationType,
    ) -> f64 {
        self.column_accumulators(column)
            .and_then(|accs| accs.get(value_index))
            .map(|acc| acc.compute(aggregation))
            .unwrap_or(0.0)
    }

    /// Total over every included record.
    pub fn overall_value(&self, value_index: usize, aggregation: AggregationType) -> f64 {
        self.overall
            .get(value_index)
            .map(|acc| acc.compute(aggregation))
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{aggregate, GroupValue};
    use crate::definition::{AggregationType::*, PivotField, ValueField};
    use dataset::Dataset;

    fn dataset() -> Dataset {
        Dataset::from_text_rows(vec![
            vec!["Region", "Product", "Sales"],
            vec!["East", "A", "10"],
            vec!["East", "B", "20"],
            vec!["West", "A", "5"],
            vec!["West", "B", "oops"],
        ])
        .unwrap()
    }

    fn key(s: &str) -> GroupKey {
        GroupKey::new([GroupValue::text(s)])
    }

    #[test]
    fn test_row_and_column_totals() {
        let table = aggregate(
            &dataset(),
            &[PivotField::new("Region")],
            &[PivotField::new("Product")],
            &[ValueField::new("Sales", Sum)],
        );
        let totals = GrandTotals::from_table(&table);

        assert_eq!(totals.row_value(&key("East"), 0, Sum), 30.0);
        assert_eq!(totals.row_value(&key("West"), 0, Sum), 5.0);
        assert_eq!(totals.column_value(&key("A"), 0, Sum), 15.0);
        assert_eq!(totals.column_value(&key("B"), 0, Sum), 20.0);
        assert_eq!(totals.overall_value(0, Sum), 35.0);
        assert_eq!(totals.row_value(&key("North"), 0, Sum), 0.0);
    }

    #[test]
    fn test_average_totals_use_raw_counts() {
        let table = aggregate(
            &dataset(),
            &[PivotField::new("Region")],
            &[PivotField::new("Product")],
            &[ValueField::new("Sales", Average)],
        );
        let totals = GrandTotals::from_table(&table);

        // West/B is non-numeric: only West/A counts
        assert_eq!(totals.row_value(&key("West"), 0, Average), 5.0);
        assert_eq!(totals.column_value(&key("B"), 0, Average), 20.0);
        assert!((totals.overall_value(0, Average) - 35.0 / 3.0).abs() < 1e-9);
        assert_eq!(totals.overall_value(0, Count), 4.0);
    }

    #[test]
    fn test_overall_matches_ungrouped_aggregation() {
        let data = dataset();
        let values = [ValueField::new("Sales", Sum)];
        let grouped = GrandTotals::from_table(&aggregate(
            &data,
            &[PivotField::new("Region")],
            &[PivotField::new("Product")],
            &values,
        ));
        let ungrouped = aggregate(&data, &[], &[], &values);

        for aggregation in [Sum, Average, Count] {
            assert_eq!(
                grouped.overall_value(0, aggregation),
                ungrouped.value(&GroupKey::ungrouped(), &GroupKey::ungrouped(), 0, aggregation)
            );
        }
    }
}
