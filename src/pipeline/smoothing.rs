//! Per-unit trailing rolling average of temperature.
//!
//! Rows are grouped by unit, stably sorted by date, and each row gets the
//! mean of the last `window` temperatures of its own unit ending at that
//! row. There is no look-ahead and no interaction between units.

use std::collections::BTreeSet;

use crate::model::{Observation, SmoothedObservation};

/// Stable sort into canonical `(unit_id, date)` order.
///
/// Every later stage relies on this order: cluster labels are numbered by
/// first appearance in it, and the report is projected from it.
pub fn sort_canonical(observations: &mut [Observation]) {
    observations.sort_by(|a, b| a.unit_id.cmp(&b.unit_id).then(a.date.cmp(&b.date)));
}

/// Smooths temperature per unit.
///
/// When `enabled` is false, or the input covers a single distinct date,
/// `temperature_rolling` is the raw temperature. Output is in canonical
/// order.
pub fn smooth(
    mut observations: Vec<Observation>,
    enabled: bool,
    window: usize,
) -> Vec<SmoothedObservation> {
    sort_canonical(&mut observations);

    let distinct_dates: BTreeSet<_> = observations.iter().map(|o| o.date).collect();
    if !enabled || distinct_dates.len() <= 1 {
        return observations
            .into_iter()
            .map(|o| SmoothedObservation {
                temperature_rolling: o.temperature,
                observation: o,
            })
            .collect();
    }

    let mut rolled = Vec::with_capacity(observations.len());
    let mut start = 0;
    while start < observations.len() {
        let unit = &observations[start].unit_id;
        let end = observations[start..]
            .iter()
            .position(|o| &o.unit_id != unit)
            .map_or(observations.len(), |p| start + p);

        let temps: Vec<Option<f64>> = observations[start..end]
            .iter()
            .map(|o| o.temperature)
            .collect();
        rolled.extend(trailing_mean(&temps, window));
        start = end;
    }

    observations
        .into_iter()
        .zip(rolled)
        .map(|(observation, temperature_rolling)| SmoothedObservation {
            observation,
            temperature_rolling,
        })
        .collect()
}

/// Trailing-window mean with a minimum of one present value.
///
/// Missing values inside the window are skipped; a window with no present
/// value yields `None`. A window of 0 is treated as 1.
pub fn trailing_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let lo = (i + 1).saturating_sub(window);
            let (sum, count) = values[lo..=i]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if count == 0 {
                None
            } else {
                Some(sum / count as f64)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn obs(unit: &str, day: u32, temp: Option<f64>) -> Observation {
        Observation {
            unit_id: unit.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            temperature: temp,
            facility_distance: Some(0.5),
            population: 0,
            density: 0.0,
        }
    }

    #[test]
    fn test_trailing_mean_uses_partial_window_at_start() {
        let values = [Some(10.0), Some(20.0), Some(30.0), Some(40.0)];
        let out = trailing_mean(&values, 3);
        assert_eq!(out, vec![Some(10.0), Some(15.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn test_trailing_mean_skips_missing_values() {
        let values = [Some(10.0), None, Some(30.0)];
        assert_eq!(trailing_mean(&values, 7), vec![Some(10.0), Some(10.0), Some(20.0)]);
        assert_eq!(trailing_mean(&[None, None], 2), vec![None, None]);
    }

    #[test]
    fn test_window_one_reproduces_input() {
        let values = [Some(1.0), Some(5.0), None];
        assert_eq!(trailing_mean(&values, 1), values.to_vec());
        assert_eq!(trailing_mean(&values, 0), values.to_vec());
    }

    #[test]
    fn test_units_are_smoothed_independently() {
        let input = vec![
            obs("B2", 1, Some(100.0)),
            obs("B1", 2, Some(20.0)),
            obs("B1", 1, Some(10.0)),
            obs("B2", 2, Some(200.0)),
        ];
        let out = smooth(input, true, 7);

        let summary: Vec<(&str, u32, Option<f64>)> = out
            .iter()
            .map(|s| {
                use chrono::Datelike;
                (s.observation.unit_id.as_str(), s.observation.date.day(), s.temperature_rolling)
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                ("B1", 1, Some(10.0)),
                ("B1", 2, Some(15.0)),
                ("B2", 1, Some(100.0)),
                ("B2", 2, Some(150.0)),
            ]
        );
    }

    #[test]
    fn test_no_look_ahead() {
        let input = vec![obs("B1", 1, Some(10.0)), obs("B1", 2, Some(1000.0))];
        let out = smooth(input, true, 7);
        assert_eq!(out[0].temperature_rolling, Some(10.0));
    }

    #[test]
    fn test_disabled_smoothing_passes_raw_temperature_through() {
        let input = vec![obs("B1", 1, Some(10.0)), obs("B1", 2, Some(20.0))];
        let out = smooth(input, false, 7);
        assert!(out.iter().all(|s| s.temperature_rolling == s.observation.temperature));
    }

    #[test]
    fn test_single_date_passes_raw_temperature_through() {
        let input = vec![obs("B1", 1, Some(10.0)), obs("B1", 1, Some(20.0))];
        let out = smooth(input, true, 7);
        assert_eq!(out[0].temperature_rolling, Some(10.0));
        assert_eq!(out[1].temperature_rolling, Some(20.0), "duplicates on one date are not averaged");
    }
}
