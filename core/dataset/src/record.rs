//! FILENAME: core/dataset/src/record.rs
//! PURPOSE: Normalizes a header row + data rows into structured records.
//! CONTEXT: The parser hands over a plain 2-D table. Every data row becomes
//! an immutable record whose values are positionally aligned with the
//! header, and field names resolve to positions through one shared index.
//! Nothing here mutates a record after `Dataset::from_rows` returns.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cell::CellValue;
use crate::error::DatasetError;

/// Index into the header row (0-based).
pub type FieldIndex = usize;

/// One data row, stored positionally against the dataset header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    /// Position of the row in the source data (0-based, excluding header).
    pub source_row: usize,

    /// Values indexed by FieldIndex. Always exactly as long as the header.
    values: Vec<CellValue>,
}

impl StructuredRecord {
    /// Gets the value at a header position.
    pub fn value_at(&self, index: FieldIndex) -> Option<&CellValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }
}

/// The full, immutable set of records for one pivot session.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    field_lookup: FxHashMap<String, FieldIndex>,
    records: Vec<StructuredRecord>,
}

impl Dataset {
    /// Builds a dataset from parser output. The first row is the header.
    ///
    /// Rows shorter than the header are padded with `CellValue::Empty`;
    /// cells beyond the header width are dropped. When two headers share a
    /// name, lookups by that name resolve to the later column.
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Result<Self, DatasetError> {
        if rows.len() < 2 {
            return Err(DatasetError::InsufficientData { rows: rows.len() });
        }

        let mut rows = rows.into_iter();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(CellValue::display_value).collect(),
            None => return Err(DatasetError::InsufficientData { rows: 0 }),
        };

        let mut field_lookup = FxHashMap::default();
        for (index, name) in headers.iter().enumerate() {
            field_lookup.insert(name.clone(), index);
        }

        let width = headers.len();
        let records = rows
            .enumerate()
            .map(|(i, mut values)| {
                values.resize(width, CellValue::Empty);
                StructuredRecord {
                    source_row: i,
                    values,
                }
            })
            .collect();

        Ok(Dataset {
            headers,
            field_lookup,
            records,
        })
    }

    /// Convenience for parsers that already produce text cells.
    /// Empty strings become `CellValue::Empty`.
    pub fn from_text_rows<R, S>(rows: R) -> Result<Self, DatasetError>
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rows: Vec<Vec<CellValue>> = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| {
                        let cell = cell.as_ref();
                        if cell.is_empty() {
                            CellValue::Empty
                        } else {
                            CellValue::text(cell)
                        }
                    })
                    .collect()
            })
            .collect();
        Self::from_rows(rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Resolves a field name to its header position.
    pub fn field_index(&self, name: &str) -> Option<FieldIndex> {
        self.field_lookup.get(name).copied()
    }

    pub fn records(&self) -> &[StructuredRecord] {
        &self.records
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Returns a name-addressable view of one record.
    pub fn record(&self, index: usize) -> Option<RecordRef<'_>> {
        self.records.get(index).map(|record| RecordRef {
            dataset: self,
            record,
        })
    }

    /// Iterates over all records as name-addressable views.
    pub fn iter(&self) -> impl Iterator<Item = RecordRef<'_>> {
        self.records.iter().map(move |record| RecordRef {
            dataset: self,
            record,
        })
    }

    /// Returns the header plus the first `limit` data rows as display strings.
    pub fn preview(&self, limit: usize) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(limit.min(self.records.len()) + 1);
        rows.push(self.headers.clone());
        for record in self.records.iter().take(limit) {
            rows.push(record.values.iter().map(CellValue::display_value).collect());
        }
        rows
    }
}

/// A record paired with its dataset, so fields can be read by name.
#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    dataset: &'a Dataset,
    record: &'a StructuredRecord,
}

impl<'a> RecordRef<'a> {
    /// Gets a field's value. `None` when the dataset has no such field.
    pub fn get(&self, field: &str) -> Option<&'a CellValue> {
        self.dataset
            .field_index(field)
            .and_then(|index| self.record.value_at(index))
    }

    pub fn source_row(&self) -> usize {
        self.record.source_row
    }

    pub fn record(&self) -> &'a StructuredRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sales_rows() -> Vec<Vec<&'static str>> {
        vec![
            vec!["Region", "Product", "Sales"],
            vec!["East", "A", "10"],
            vec!["East", "B", "20"],
            vec!["West", "A", "5"],
        ]
    }

    #[test]
    fn test_normalizes_rows_by_header() {
        let dataset = Dataset::from_text_rows(sales_rows()).unwrap();

        assert_eq!(dataset.headers(), &["Region", "Product", "Sales"]);
        assert_eq!(dataset.record_count(), 3);

        let second = dataset.record(1).unwrap();
        assert_eq!(second.get("Region"), Some(&CellValue::text("East")));
        assert_eq!(second.get("Sales"), Some(&CellValue::text("20")));
        assert_eq!(second.get("Missing"), None);
        assert_eq!(second.source_row(), 1);
    }

    #[test]
    fn test_source_rows_follow_input_positions() {
        let mut rows = vec![vec!["Id".to_string()]];
        rows.extend((0..1000).map(|i| vec![i.to_string()]));
        let dataset = Dataset::from_text_rows(rows).unwrap();

        let positions: Vec<usize> = dataset.records().iter().map(|r| r.source_row).collect();
        assert_eq!(positions, (0..1000).collect::<Vec<usize>>());
        assert_eq!(dataset.record(999).unwrap().get("Id"), Some(&CellValue::text("999")));
    }

    #[test]
    fn test_insufficient_data() {
        let only_header = Dataset::from_text_rows(vec![vec!["Region"]]);
        assert_eq!(
            only_header.unwrap_err(),
            DatasetError::InsufficientData { rows: 1 }
        );

        let nothing = Dataset::from_rows(Vec::new());
        assert_eq!(nothing.unwrap_err(), DatasetError::InsufficientData { rows: 0 });
    }

    #[test]
    fn test_short_rows_are_padded_and_long_rows_truncated() {
        let rows = vec![
            vec![CellValue::text("A"), CellValue::text("B")],
            vec![CellValue::text("x")],
            vec![CellValue::text("y"), CellValue::text("z"), CellValue::text("extra")],
        ];
        let dataset = Dataset::from_rows(rows).unwrap();

        assert_eq!(dataset.record(0).unwrap().get("B"), Some(&CellValue::Empty));
        assert_eq!(dataset.records()[1].values().len(), 2);
    }

    #[test]
    fn test_duplicate_header_resolves_to_later_column() {
        let dataset =
            Dataset::from_text_rows(vec![vec!["X", "X"], vec!["first", "second"]]).unwrap();
        assert_eq!(
            dataset.record(0).unwrap().get("X"),
            Some(&CellValue::text("second"))
        );
    }

    #[test]
    fn test_numeric_headers_become_text() {
        let rows = vec![
            vec![CellValue::Number(2024.0), CellValue::text("Sales")],
            vec![CellValue::text("East"), CellValue::Number(1.0)],
        ];
        let dataset = Dataset::from_rows(rows).unwrap();
        assert_eq!(dataset.field_index("2024"), Some(0));
    }

    #[test]
    fn test_preview_limits_rows() {
        let dataset = Dataset::from_text_rows(sales_rows()).unwrap();
        let preview = dataset.preview(2);

        assert_eq!(preview.len(), 3);
        assert_eq!(preview[0], vec!["Region", "Product", "Sales"]);
        assert_eq!(preview[2], vec!["East", "B", "20"]);
    }
}
