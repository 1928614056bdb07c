//! Feature preparation: turning loosely-typed survey records into the
//! fixed-width numeric matrix the forest trains and scores on.
//!
//! Missing or non-numeric fields become `f64::NAN` rather than errors, and
//! are resolved by median imputation before any tree sees them.

use serde_json::{Map, Value};

/// One record's feature values, in the order of the feature-name list.
/// Missing values are NaN, never absent slots.
pub type FeatureVector = Vec<f64>;

/// Row-major matrix of feature vectors; row indices double as record
/// identifiers for the caller.
pub type FeatureMatrix = Vec<FeatureVector>;

/// Ordered numeric schema of an uploaded survey batch.
pub const SURVEY_FEATURES: [&str; 6] = [
    "latitude",
    "longitude",
    "quantity",
    "weight_kg",
    "depth_m",
    "water_temperature",
];

/// Reads `feature_names` out of each record, in order. JSON numbers are
/// used directly, strings are parsed as floats, and everything else
/// (missing, null, non-numeric text) becomes NaN. The result always has
/// `records.len()` rows of `feature_names.len()` columns.
pub fn extract_numeric_features(
    records: &[Map<String, Value>],
    feature_names: &[&str],
) -> FeatureMatrix {
    records
        .iter()
        .map(|record| {
            feature_names
                .iter()
                .map(|name| numeric_field(record.get(*name)))
                .collect()
        })
        .collect()
}

fn numeric_field(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Per-column median over the finite values only. A column with no finite
/// values yields 0.0; an empty matrix yields an empty list.
pub fn compute_medians(matrix: &[FeatureVector]) -> Vec<f64> {
    let width = match matrix.first() {
        Some(row) => row.len(),
        None => return Vec::new(),
    };
    (0..width)
        .map(|col| {
            let mut values: Vec<f64> = matrix
                .iter()
                .filter_map(|row| row.get(col).copied())
                .filter(|v| v.is_finite())
                .collect();
            values.sort_by(f64::total_cmp);
            median_of_sorted(&values)
        })
        .collect()
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        0.0
    } else if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Replaces every non-finite cell with the corresponding column median;
/// finite cells pass through unchanged. With medians computed from the
/// same matrix the output contains no non-finite values. A median slot
/// beyond the given list falls back to 0.0, matching the all-missing
/// column policy.
pub fn impute_with_medians(matrix: &[FeatureVector], medians: &[f64]) -> FeatureMatrix {
    matrix
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(col, &v)| {
                    if v.is_finite() {
                        v
                    } else {
                        medians.get(col).copied().unwrap_or(0.0)
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {}", other),
        }
    }

    #[test]
    fn extracts_numbers_strings_and_markers() {
        let records = vec![
            record(json!({
                "latitude": 20.5,
                "longitude": "70.25",
                "quantity": 3,
                "weight_kg": "not a number",
                "water_temperature": null,
            })),
            record(json!({ "latitude": " 19.5 " })),
        ];

        let matrix = extract_numeric_features(&records, &SURVEY_FEATURES);
        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[0].len(), SURVEY_FEATURES.len());

        assert_eq!(matrix[0][0], 20.5);
        assert_eq!(matrix[0][1], 70.25);
        assert_eq!(matrix[0][2], 3.0);
        assert!(matrix[0][3].is_nan()); // unparseable text
        assert!(matrix[0][4].is_nan()); // field absent
        assert!(matrix[0][5].is_nan()); // explicit null

        assert_eq!(matrix[1][0], 19.5);
        assert!(matrix[1][1..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn median_of_known_columns() {
        let odd: Vec<FeatureVector> = [1.0, 3.0, 3.0, 6.0, 7.0, 8.0, 9.0]
            .iter()
            .map(|&v| vec![v])
            .collect();
        assert_eq!(compute_medians(&odd), vec![6.0]);

        let even = vec![vec![1.0], vec![2.0]];
        assert_eq!(compute_medians(&even), vec![1.5]);
    }

    #[test]
    fn median_ignores_non_finite_and_defaults_to_zero() {
        let matrix = vec![
            vec![f64::NAN, f64::NAN],
            vec![4.0, f64::NAN],
            vec![2.0, f64::NAN],
        ];
        assert_eq!(compute_medians(&matrix), vec![3.0, 0.0]);
    }

    #[test]
    fn median_of_empty_matrix_is_empty() {
        assert!(compute_medians(&[]).is_empty());
    }

    #[test]
    fn imputation_removes_every_non_finite_cell() {
        let matrix = vec![
            vec![1.0, f64::NAN, f64::NAN],
            vec![f64::NAN, 5.0, f64::NAN],
            vec![3.0, 7.0, f64::NAN],
        ];
        let imputed = impute_with_medians(&matrix, &compute_medians(&matrix));
        assert!(imputed
            .iter()
            .all(|row| row.iter().all(|v| v.is_finite())));
        // finite cells pass through unchanged
        assert_eq!(imputed[0][0], 1.0);
        assert_eq!(imputed[2][1], 7.0);
        // all-missing column imputes to the 0.0 default
        assert!(imputed.iter().all(|row| row[2] == 0.0));
    }
}
