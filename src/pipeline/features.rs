/// Feature selection, imputation and min-max scaling.
///
/// The feature set is a whole-run decision made before any per-row work:
/// density joins the feature set only if some observation has a positive
/// density, and then it applies to every row.

use crate::model::{FeatureSet, SmoothedObservation};

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Scaled feature matrix for one run.
///
/// `rows[i][j]` is feature `names[j]` of observation `i`, in [0, 1].
/// `weights` is positionally aligned with `names` and sums to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledFeatures {
    pub feature_set: FeatureSet,
    pub names: Vec<&'static str>,
    pub weights: Vec<f64>,
    pub rows: Vec<Vec<f64>>,
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Chooses the feature set for the whole run.
pub fn select_feature_set(observations: &[SmoothedObservation]) -> FeatureSet {
    if observations.iter().any(|s| s.observation.density > 0.0) {
        FeatureSet::WithDensity
    } else {
        FeatureSet::TemperatureFacility
    }
}

fn raw_matrix(observations: &[SmoothedObservation], set: FeatureSet) -> Vec<Vec<Option<f64>>> {
    observations
        .iter()
        .map(|s| {
            let mut row = vec![s.temperature_rolling, s.observation.facility_distance];
            if set == FeatureSet::WithDensity {
                row.push(Some(s.observation.density));
            }
            row
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Imputation and scaling
// ---------------------------------------------------------------------------

/// Replaces missing values with the column mean of present values.
///
/// A column with no present value at all imputes 0.0.
pub fn impute_column_means(matrix: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
    let width = matrix.first().map_or(0, Vec::len);
    let means: Vec<f64> = (0..width)
        .map(|j| {
            let (sum, n) = matrix
                .iter()
                .filter_map(|row| row[j])
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 { 0.0 } else { sum / n as f64 }
        })
        .collect();

    matrix
        .iter()
        .map(|row| {
            row.iter()
                .zip(&means)
                .map(|(v, mean)| v.unwrap_or(*mean))
                .collect()
        })
        .collect()
}

/// Min-max scales each column independently to [0, 1].
///
/// A constant column scales to 0.0 on every row.
pub fn min_max_scale(matrix: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let width = matrix.first().map_or(0, Vec::len);
    let bounds: Vec<(f64, f64)> = (0..width)
        .map(|j| {
            matrix.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), row| {
                (lo.min(row[j]), hi.max(row[j]))
            })
        })
        .collect();

    matrix
        .iter()
        .map(|row| {
            row.iter()
                .zip(&bounds)
                .map(|(&x, &(lo, hi))| {
                    let range = hi - lo;
                    if range > 0.0 { (x - lo) / range } else { 0.0 }
                })
                .collect()
        })
        .collect()
}

/// Selects, imputes and scales the features for a run.
pub fn build_features(observations: &[SmoothedObservation]) -> ScaledFeatures {
    let feature_set = select_feature_set(observations);
    let raw = raw_matrix(observations, feature_set);
    let rows = min_max_scale(&impute_column_means(&raw));

    ScaledFeatures {
        feature_set,
        names: feature_set.names().to_vec(),
        weights: feature_set.weights(),
        rows,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Observation;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn smoothed(temp: Option<f64>, facility: Option<f64>, density: f64) -> SmoothedObservation {
        SmoothedObservation {
            observation: Observation {
                unit_id: "B1".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                temperature: temp,
                facility_distance: facility,
                population: 0,
                density,
            },
            temperature_rolling: temp,
        }
    }

    // --- Variant selection --------------------------------------------------

    #[test]
    fn test_all_zero_density_selects_two_features() {
        let obs = vec![smoothed(Some(30.0), Some(0.5), 0.0), smoothed(Some(31.0), Some(0.2), 0.0)];
        let f = build_features(&obs);
        assert_eq!(f.names, vec!["temperature_rolling", "facility_distance"]);
        assert_eq!(f.weights, vec![0.5, 0.5]);
        assert!(f.rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_single_positive_density_selects_three_features_for_every_row() {
        let obs = vec![
            smoothed(Some(30.0), Some(0.5), 0.0),
            smoothed(Some(31.0), Some(0.2), 5.2),
            smoothed(Some(29.0), Some(0.9), 0.0),
        ];
        let f = build_features(&obs);
        assert_eq!(f.feature_set, FeatureSet::WithDensity);
        assert_eq!(f.names, vec!["temperature_rolling", "facility_distance", "density"]);
        assert_eq!(f.weights, vec![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]);
        assert!(f.rows.iter().all(|r| r.len() == 3), "every row uses the same feature set");
        assert_eq!(f.rows[0][2], 0.0);
        assert_eq!(f.rows[1][2], 1.0);
    }

    // --- Scaling ------------------------------------------------------------

    #[test]
    fn test_min_maps_to_zero_and_max_to_one() {
        let scaled = min_max_scale(&[vec![10.0], vec![15.0], vec![20.0]]);
        assert_eq!(scaled[0][0], 0.0);
        assert_relative_eq!(scaled[1][0], 0.5);
        assert_eq!(scaled[2][0], 1.0);
    }

    #[test]
    fn test_constant_column_scales_to_zero() {
        let scaled = min_max_scale(&[vec![30.0, 1.0], vec![30.0, 3.0]]);
        assert_eq!(scaled[0][0], 0.0);
        assert_eq!(scaled[1][0], 0.0);
        assert_eq!(scaled[1][1], 1.0);
    }

    #[test]
    fn test_empty_matrix_scales_to_empty() {
        assert!(min_max_scale(&[]).is_empty());
    }

    // --- Imputation ---------------------------------------------------------

    #[test]
    fn test_missing_values_take_column_mean() {
        let imputed = impute_column_means(&[
            vec![Some(10.0), None],
            vec![None, Some(0.4)],
            vec![Some(20.0), Some(0.6)],
        ]);
        assert_relative_eq!(imputed[1][0], 15.0);
        assert_relative_eq!(imputed[0][1], 0.5);
    }

    #[test]
    fn test_all_missing_column_imputes_zero() {
        let imputed = impute_column_means(&[vec![None, Some(1.0)], vec![None, Some(2.0)]]);
        assert_eq!(imputed[0][0], 0.0);
        assert_eq!(imputed[1][0], 0.0);
    }

    #[test]
    fn test_imputed_row_scales_inside_unit_interval() {
        let obs = vec![
            smoothed(Some(28.0), Some(0.1), 0.0),
            smoothed(None, Some(0.5), 0.0),
            smoothed(Some(32.0), None, 0.0),
        ];
        let f = build_features(&obs);
        assert_relative_eq!(f.rows[1][0], 0.5);
        for row in &f.rows {
            for v in row {
                assert!((0.0..=1.0).contains(v), "scaled value {} out of range", v);
            }
        }
    }
}
