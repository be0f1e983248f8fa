//! Canonical schema validation (spec.md §4.G): checks a normalized row
//! against a `CanonicalSchema`'s per-column contract. Every cell counts
//! toward at most one of `missing_required` or `type_mismatches`, never
//! both — the mutual-exclusivity invariant spec.md's testable properties
//! require.

use tabulon_types::{CanonicalColumn, CanonicalDataType, CanonicalSchema};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub missing_required: u64,
    pub type_mismatches: u64,
}

impl ValidationOutcome {
    fn merge(&mut self, other: ValidationOutcome) {
        self.missing_required += other.missing_required;
        self.type_mismatches += other.type_mismatches;
    }
}

fn is_blank(value: &Option<String>) -> bool {
    match value {
        None => true,
        Some(s) => s.trim().is_empty(),
    }
}

fn matches_type(value: &str, data_type: CanonicalDataType) -> bool {
    let trimmed = value.trim();
    match data_type {
        CanonicalDataType::Int => trimmed.parse::<i64>().is_ok(),
        CanonicalDataType::Decimal => trimmed.parse::<f64>().is_ok(),
        CanonicalDataType::Bool => trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false"),
        CanonicalDataType::Date => {
            chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_ok()
                || chrono::NaiveDate::parse_from_str(trimmed, "%m/%d/%Y").is_ok()
        }
        CanonicalDataType::Text => true,
    }
}

fn in_range(value: &str, column: &CanonicalColumn) -> bool {
    let Some(range) = column.range else {
        return true;
    };
    let Ok(n) = value.trim().parse::<f64>() else {
        return true; // type mismatch already caught this; range doesn't double-count it
    };
    if let Some(min) = range.min {
        if n < min {
            return false;
        }
    }
    if let Some(max) = range.max {
        if n > max {
            return false;
        }
    }
    true
}

fn validate_cell(value: &Option<String>, column: &CanonicalColumn) -> ValidationOutcome {
    if is_blank(value) {
        return if column.required && !column.allow_null {
            ValidationOutcome {
                missing_required: 1,
                type_mismatches: 0,
            }
        } else {
            ValidationOutcome::default()
        };
    }

    let text = value.as_deref().unwrap_or("");

    if !matches_type(text, column.data_type) {
        return ValidationOutcome {
            missing_required: 0,
            type_mismatches: 1,
        };
    }

    if let Some(allowed) = &column.allowed_values {
        if !allowed.iter().any(|v| v == text) {
            return ValidationOutcome {
                missing_required: 0,
                type_mismatches: 1,
            };
        }
    }

    if !in_range(text, column) {
        return ValidationOutcome {
            missing_required: 0,
            type_mismatches: 1,
        };
    }

    ValidationOutcome::default()
}

/// Validate one canonical-ordered row (same width and order as
/// `schema.columns`) against the schema's contract.
#[must_use]
pub fn validate_row(row: &[Option<String>], schema: &CanonicalSchema) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    for (column, value) in schema.columns.iter().zip(row.iter()) {
        outcome.merge(validate_cell(value, column));
    }
    outcome
}

/// Validate and repair one canonical-ordered row in place: any cell that
/// fails its column's contract (type mismatch, enum violation, out-of-range)
/// is nulled out rather than written downstream as invalid data. Cells that
/// are merely missing-and-required are left as-is since there's nothing to
/// null.
#[must_use]
pub fn validate_row_mut(row: &mut [Option<String>], schema: &CanonicalSchema) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    for (column, value) in schema.columns.iter().zip(row.iter_mut()) {
        let cell_outcome = validate_cell(&*value, column);
        if cell_outcome.type_mismatches > 0 {
            *value = None;
        }
        outcome.merge(cell_outcome);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabulon_types::CanonicalRange;

    fn column(name: &str, data_type: CanonicalDataType, required: bool) -> CanonicalColumn {
        CanonicalColumn {
            name: name.to_string(),
            data_type,
            required,
            allow_null: !required,
            allowed_values: None,
            range: None,
        }
    }

    fn schema(columns: Vec<CanonicalColumn>) -> CanonicalSchema {
        CanonicalSchema {
            namespace: "ns".into(),
            id: "id".into(),
            version: 1,
            columns,
        }
    }

    #[test]
    fn missing_required_value_is_flagged() {
        let schema = schema(vec![column("name", CanonicalDataType::Text, true)]);
        let outcome = validate_row(&[None], &schema);
        assert_eq!(outcome.missing_required, 1);
        assert_eq!(outcome.type_mismatches, 0);
    }

    #[test]
    fn type_mismatch_is_flagged_and_excludes_missing_required() {
        let schema = schema(vec![column("age", CanonicalDataType::Int, true)]);
        let outcome = validate_row(&[Some("not-a-number".to_string())], &schema);
        assert_eq!(outcome.type_mismatches, 1);
        assert_eq!(outcome.missing_required, 0);
    }

    #[test]
    fn optional_blank_value_is_not_an_error() {
        let schema = schema(vec![column("nickname", CanonicalDataType::Text, false)]);
        let outcome = validate_row(&[None], &schema);
        assert_eq!(outcome, ValidationOutcome::default());
    }

    #[test]
    fn out_of_range_numeric_value_is_a_type_mismatch() {
        let mut col = column("score", CanonicalDataType::Int, true);
        col.range = Some(CanonicalRange {
            min: Some(0.0),
            max: Some(100.0),
        });
        let schema = schema(vec![col]);
        let outcome = validate_row(&[Some("150".to_string())], &schema);
        assert_eq!(outcome.type_mismatches, 1);
    }

    #[test]
    fn enum_violation_is_a_type_mismatch() {
        let mut col = column("status", CanonicalDataType::Text, true);
        col.allowed_values = Some(vec!["active".to_string(), "inactive".to_string()]);
        let schema = schema(vec![col]);
        let outcome = validate_row(&[Some("pending".to_string())], &schema);
        assert_eq!(outcome.type_mismatches, 1);
    }

    #[test]
    fn every_cell_contributes_to_at_most_one_counter() {
        let schema = schema(vec![
            column("a", CanonicalDataType::Int, true),
            column("b", CanonicalDataType::Text, true),
        ]);
        let outcome = validate_row(&[None, Some("not-an-int-but-text-is-fine".to_string())], &schema);
        assert_eq!(outcome.missing_required, 1);
        assert_eq!(outcome.type_mismatches, 0);
    }

    #[test]
    fn validate_row_mut_nulls_out_a_type_mismatched_cell() {
        let schema = schema(vec![column("age", CanonicalDataType::Int, true)]);
        let mut row = vec![Some("not-a-number".to_string())];
        let outcome = validate_row_mut(&mut row, &schema);
        assert_eq!(outcome.type_mismatches, 1);
        assert_eq!(row[0], None);
    }

    #[test]
    fn validate_row_mut_leaves_a_missing_required_cell_untouched() {
        let schema = schema(vec![column("name", CanonicalDataType::Text, true)]);
        let mut row = vec![None];
        let outcome = validate_row_mut(&mut row, &schema);
        assert_eq!(outcome.missing_required, 1);
        assert_eq!(row[0], None);
    }

    #[test]
    fn validate_row_mut_leaves_a_valid_cell_untouched() {
        let schema = schema(vec![column("name", CanonicalDataType::Text, true)]);
        let mut row = vec![Some("Ada".to_string())];
        let outcome = validate_row_mut(&mut row, &schema);
        assert_eq!(outcome, ValidationOutcome::default());
        assert_eq!(row[0], Some("Ada".to_string()));
    }
}
