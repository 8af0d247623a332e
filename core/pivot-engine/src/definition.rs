//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Table Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot table.
//! These structures are designed to be:
//! - Serializable (for saving/loading a configuration as JSON)
//! - Snapshots of user intent, passed by reference into a pure calculation
//! - Mutated only through the add/remove operations below, which keep each
//!   area free of duplicates

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PivotError;

/// A field identifier: the header name of a source column.
pub type FieldName = String;

// ============================================================================
// AGGREGATION
// ============================================================================

/// Supported aggregation functions for value fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationType {
    Sum,
    Average,
    Count,
}

impl Default for AggregationType {
    fn default() -> Self {
        AggregationType::Sum
    }
}

impl AggregationType {
    pub fn label(&self) -> &'static str {
        match self {
            AggregationType::Sum => "Sum",
            AggregationType::Average => "Average",
            AggregationType::Count => "Count",
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AggregationType {
    type Err = PivotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(AggregationType::Sum),
            "average" | "avg" => Ok(AggregationType::Average),
            "count" => Ok(AggregationType::Count),
            _ => Err(PivotError::UnknownAggregation(s.to_string())),
        }
    }
}

// ============================================================================
// FIELD DEFINITIONS
// ============================================================================

/// The three areas a field can be placed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldArea {
    Rows,
    Columns,
    Values,
}

impl fmt::Display for FieldArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldArea::Rows => f.write_str("row"),
            FieldArea::Columns => f.write_str("column"),
            FieldArea::Values => f.write_str("value"),
        }
    }
}

/// Represents a grouping field (column) from the source data.
/// Used for the Row and Column areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotField {
    /// Header name of the source column.
    pub name: FieldName,

    /// Sort order for this field's items.
    #[serde(default)]
    pub sort_order: SortOrder,

    /// Specific items that are hidden (filtered out).
    /// Stores the display label of hidden values, "(blank)" for missing ones.
    #[serde(default)]
    pub hidden_items: Vec<String>,
}

impl PivotField {
    pub fn new(name: impl Into<FieldName>) -> Self {
        PivotField {
            name: name.into(),
            sort_order: SortOrder::default(),
            hidden_items: Vec::new(),
        }
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }
}

/// Represents a value field with its aggregation function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueField {
    /// Header name of the source column.
    pub name: FieldName,

    /// The aggregation function to apply.
    pub aggregation: AggregationType,
}

impl ValueField {
    pub fn new(name: impl Into<FieldName>, aggregation: AggregationType) -> Self {
        ValueField {
            name: name.into(),
            aggregation,
        }
    }

    /// Display label, e.g. "Sales (Sum)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.aggregation)
    }
}

/// Sort order for field items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    /// Order of first appearance in the source data.
    DataSourceOrder,
    Ascending,
    Descending,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::DataSourceOrder
    }
}

// ============================================================================
// LAYOUT OPTIONS
// ============================================================================

/// Controls how the pivot table is displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotLayout {
    /// Layout form: Tabular or Compact.
    #[serde(default)]
    pub report_layout: ReportLayout,

    /// Show the grand total row at the bottom.
    #[serde(default = "default_true")]
    pub show_row_grand_totals: bool,

    /// Show the grand total column(s) on the right.
    #[serde(default = "default_true")]
    pub show_column_grand_totals: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PivotLayout {
    fn default() -> Self {
        PivotLayout {
            report_layout: ReportLayout::Tabular,
            show_row_grand_totals: true,
            show_column_grand_totals: true,
        }
    }
}

/// Report layout styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportLayout {
    /// Each row field gets its own column; repeated leading labels are merged
    /// with rowspans. Only leaf rows are emitted.
    Tabular,
    /// All row fields in one indented column, one row per rollup node.
    /// Parent rows carry their subtotals.
    Compact,
}

impl Default for ReportLayout {
    fn default() -> Self {
        ReportLayout::Tabular
    }
}

// ============================================================================
// MAIN DEFINITION STRUCT
// ============================================================================

/// The complete, serializable definition of a pivot table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PivotDefinition {
    /// Fields placed in the Row area (ordered from outer to inner).
    #[serde(default)]
    pub row_fields: Vec<PivotField>,

    /// Fields placed in the Column area (ordered from outer to inner).
    #[serde(default)]
    pub column_fields: Vec<PivotField>,

    /// Fields placed in the Values area.
    #[serde(default)]
    pub value_fields: Vec<ValueField>,

    /// Layout and display options.
    #[serde(default)]
    pub layout: PivotLayout,

    /// Bumped on every mutation.
    #[serde(default)]
    pub version: u64,
}

impl PivotDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the version (for cache invalidation).
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn add_row_field(&mut self, field: PivotField) -> Result<(), PivotError> {
        Self::push_unique(&mut self.row_fields, field, FieldArea::Rows)?;
        self.bump_version();
        Ok(())
    }

    pub fn add_column_field(&mut self, field: PivotField) -> Result<(), PivotError> {
        Self::push_unique(&mut self.column_fields, field, FieldArea::Columns)?;
        self.bump_version();
        Ok(())
    }

    pub fn add_value_field(&mut self, field: ValueField) -> Result<(), PivotError> {
        if self.value_fields.iter().any(|f| f.name == field.name) {
            return Err(PivotError::DuplicateField {
                area: FieldArea::Values,
                field: field.name,
            });
        }
        self.value_fields.push(field);
        self.bump_version();
        Ok(())
    }

    /// Removes a row field. Returns false if it was not selected.
    pub fn remove_row_field(&mut self, name: &str) -> bool {
        let removed = Self::remove_named(&mut self.row_fields, name, |f| &f.name);
        if removed {
            self.bump_version();
        }
        removed
    }

    /// Removes a column field. Returns false if it was not selected.
    pub fn remove_column_field(&mut self, name: &str) -> bool {
        let removed = Self::remove_named(&mut self.column_fields, name, |f| &f.name);
        if removed {
            self.bump_version();
        }
        removed
    }

    /// Removes a value field. Returns false if it was not selected.
    pub fn remove_value_field(&mut self, name: &str) -> bool {
        let removed = Self::remove_named(&mut self.value_fields, name, |f| &f.name);
        if removed {
            self.bump_version();
        }
        removed
    }

    /// Changes the aggregation of an already selected value field.
    pub fn set_aggregation(
        &mut self,
        name: &str,
        aggregation: AggregationType,
    ) -> Result<(), PivotError> {
        let field = self
            .value_fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| PivotError::FieldNotSelected {
                area: FieldArea::Values,
                field: name.to_string(),
            })?;
        field.aggregation = aggregation;
        self.bump_version();
        Ok(())
    }

    /// Replaces the hidden items of a row or column field.
    pub fn set_hidden_items(
        &mut self,
        area: FieldArea,
        name: &str,
        hidden_items: Vec<String>,
    ) -> Result<(), PivotError> {
        let fields = match area {
            FieldArea::Rows => &mut self.row_fields,
            FieldArea::Columns => &mut self.column_fields,
            FieldArea::Values => {
                return Err(PivotError::FieldNotSelected {
                    area,
                    field: name.to_string(),
                })
            }
        };
        let field = fields
            .iter_mut()
            .find(|f| f.name == name)
            .ok_or_else(|| PivotError::FieldNotSelected {
                area,
                field: name.to_string(),
            })?;
        field.hidden_items = hidden_items;
        self.bump_version();
        Ok(())
    }

    /// Checks the per-area uniqueness invariant. Definitions assembled
    /// through the add operations always pass; deserialized ones may not.
    pub fn validate(&self) -> Result<(), PivotError> {
        Self::check_unique(self.row_fields.iter().map(|f| f.name.as_str()), FieldArea::Rows)?;
        Self::check_unique(
            self.column_fields.iter().map(|f| f.name.as_str()),
            FieldArea::Columns,
        )?;
        Self::check_unique(
            self.value_fields.iter().map(|f| f.name.as_str()),
            FieldArea::Values,
        )
    }

    /// Whether there is anything to aggregate.
    pub fn has_values(&self) -> bool {
        !self.value_fields.is_empty()
    }

    pub fn to_json(&self) -> Result<String, PivotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a definition.
    pub fn from_json(json: &str) -> Result<Self, PivotError> {
        let definition: PivotDefinition = serde_json::from_str(json)?;
        definition.validate()?;
        Ok(definition)
    }

    fn push_unique(
        fields: &mut Vec<PivotField>,
        field: PivotField,
        area: FieldArea,
    ) -> Result<(), PivotError> {
        if fields.iter().any(|f| f.name == field.name) {
            return Err(PivotError::DuplicateField {
                area,
                field: field.name,
            });
        }
        fields.push(field);
        Ok(())
    }

    fn remove_named<T>(fields: &mut Vec<T>, name: &str, key: impl Fn(&T) -> &String) -> bool {
        let before = fields.len();
        fields.retain(|f| key(f) != name);
        fields.len() != before
    }

    fn check_unique<'a>(
        names: impl Iterator<Item = &'a str>,
        area: FieldArea,
    ) -> Result<(), PivotError> {
        let mut seen: Vec<&str> = Vec::new();
        for name in names {
            if seen.contains(&name) {
                return Err(PivotError::DuplicateField {
                    area,
                    field: name.to_string(),
                });
            }
            seen.push(name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_rejects_duplicates_within_an_area() {
        let mut def = PivotDefinition::new();
        def.add_row_field(PivotField::new("Region")).unwrap();

        let err = def.add_row_field(PivotField::new("Region")).unwrap_err();
        assert!(matches!(
            err,
            PivotError::DuplicateField { area: FieldArea::Rows, ref field } if field == "Region"
        ));
        assert_eq!(def.row_fields.len(), 1);
    }

    #[test]
    fn test_same_field_allowed_in_different_areas() {
        let mut def = PivotDefinition::new();
        def.add_row_field(PivotField::new("Region")).unwrap();
        def.add_column_field(PivotField::new("Region")).unwrap();
        def.add_value_field(ValueField::new("Region", AggregationType::Count))
            .unwrap();

        assert!(def.validate().is_ok());
    }

    #[test]
    fn test_value_field_names_are_unique() {
        let mut def = PivotDefinition::new();
        def.add_value_field(ValueField::new("Sales", AggregationType::Sum))
            .unwrap();
        assert!(def
            .add_value_field(ValueField::new("Sales", AggregationType::Average))
            .is_err());
    }

    #[test]
    fn test_remove_and_version() {
        let mut def = PivotDefinition::new();
        def.add_row_field(PivotField::new("Region")).unwrap();
        def.add_row_field(PivotField::new("Product")).unwrap();
        assert_eq!(def.version, 2);

        assert!(def.remove_row_field("Region"));
        assert!(!def.remove_row_field("Region"));
        assert_eq!(def.row_fields, vec![PivotField::new("Product")]);
        assert_eq!(def.version, 3);
    }

    #[test]
    fn test_set_aggregation() {
        let mut def = PivotDefinition::new();
        def.add_value_field(ValueField::new("Sales", AggregationType::Sum))
            .unwrap();

        def.set_aggregation("Sales", AggregationType::Average).unwrap();
        assert_eq!(def.value_fields[0].aggregation, AggregationType::Average);

        assert!(matches!(
            def.set_aggregation("Profit", AggregationType::Count),
            Err(PivotError::FieldNotSelected { .. })
        ));
    }

    #[test]
    fn test_parse_aggregation() {
        assert_eq!("sum".parse::<AggregationType>().unwrap(), AggregationType::Sum);
        assert_eq!("AVG".parse::<AggregationType>().unwrap(), AggregationType::Average);
        assert_eq!(" Count ".parse::<AggregationType>().unwrap(), AggregationType::Count);
        assert!(matches!(
            "median".parse::<AggregationType>(),
            Err(PivotError::UnknownAggregation(ref s)) if s == "median"
        ));
    }

    #[test]
    fn test_value_field_label() {
        let vf = ValueField::new("Sales", AggregationType::Average);
        assert_eq!(vf.label(), "Sales (Average)");
    }

    #[test]
    fn test_json_round_trip_keeps_selection() {
        let mut def = PivotDefinition::new();
        def.add_row_field(PivotField::new("Region").with_sort_order(SortOrder::Ascending))
            .unwrap();
        def.add_value_field(ValueField::new("Sales", AggregationType::Count))
            .unwrap();

        let json = def.to_json().unwrap();
        let parsed = PivotDefinition::from_json(&json).unwrap();
        assert_eq!(parsed, def);
    }

    #[test]
    fn test_json_rejects_unknown_aggregation() {
        let json = r#"{"value_fields": [{"name": "Sales", "aggregation": "Median"}]}"#;
        assert!(matches!(
            PivotDefinition::from_json(json),
            Err(PivotError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn test_json_rejects_duplicates() {
        let json = r#"{"row_fields": [{"name": "Region"}, {"name": "Region"}]}"#;
        assert!(matches!(
            PivotDefinition::from_json(json),
            Err(PivotError::DuplicateField { area: FieldArea::Rows, .. })
        ));
    }

    #[test]
    fn test_json_defaults_layout() {
        let def = PivotDefinition::from_json("{}").unwrap();
        assert_eq!(def.layout, PivotLayout::default());
        assert!(!def.has_values());
    }
}
