//! FILENAME: tests/common/mod.rs
//! Fixtures and assertion helpers for pivot engine integration tests.

#![allow(dead_code)]

use dataset::{CellValue, Dataset};
use pivot_engine::{PivotView, RowKind};

pub struct SalesFixture;

impl SalesFixture {
    pub fn headers() -> Vec<&'static str> {
        vec!["Region", "Product", "Quarter", "Sales", "Quantity"]
    }

    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
            ("East", "Gadget", "Q2", 8500.0, 85.0),
        ]
    }

    /// Header + data as typed cells.
    pub fn rows() -> Vec<Vec<CellValue>> {
        let mut rows = vec![Self::headers().into_iter().map(CellValue::text).collect()];
        for (region, product, quarter, sales, quantity) in Self::data() {
            rows.push(vec![
                CellValue::text(region),
                CellValue::text(product),
                CellValue::text(quarter),
                CellValue::Number(sales),
                CellValue::Number(quantity),
            ]);
        }
        rows
    }

    pub fn dataset() -> Dataset {
        Dataset::from_rows(Self::rows()).unwrap()
    }

    /// Three records: two regions, two products.
    pub fn small() -> Dataset {
        Dataset::from_text_rows(vec![
            vec!["Region", "Product", "Sales"],
            vec!["East", "A", "10"],
            vec!["East", "B", "20"],
            vec!["West", "A", "5"],
        ])
        .unwrap()
    }
}

/// Deterministic permutations of `0..n`: identity, reversed, and a few
/// rotations and strided shuffles.
pub fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut out = vec![(0..n).collect::<Vec<_>>(), (0..n).rev().collect()];
    for shift in [1, n / 2, n.saturating_sub(1)] {
        out.push((0..n).map(|i| (i + shift) % n.max(1)).collect());
    }
    for stride in [5, 7] {
        if n % stride != 0 {
            out.push((0..n).map(|i| (i * stride) % n).collect());
        }
    }
    out
}

/// Reorders the data rows of a header + data table.
pub fn permute_rows<T: Clone>(rows: &[Vec<T>], order: &[usize]) -> Vec<Vec<T>> {
    let mut out = vec![rows[0].clone()];
    out.extend(order.iter().map(|&i| rows[i + 1].clone()));
    out
}

/// Assert a view cell's formatted value by row label and column key.
pub fn assert_formatted(view: &PivotView, row_label: &str, column: &str, expected: &str) {
    let row = view
        .rows
        .iter()
        .position(|r| match r.kind {
            RowKind::GrandTotal => row_label == "Grand Total",
            _ => r.key.to_string() == row_label,
        })
        .unwrap_or_else(|| panic!("row '{}' not found", row_label));
    let cell = view
        .get(row, column)
        .unwrap_or_else(|| panic!("column '{}' not found", column));
    assert_eq!(
        cell.formatted, expected,
        "cell ({}, {}) expected {} but got {}",
        row_label, column, expected, cell.formatted
    );
}
