//! Severity ordering and risk level assignment.

use std::collections::BTreeMap;

use crate::model::{ReportRow, RiskAssignment, SmoothedObservation};
use crate::pipeline::cluster::{ClusterSummary, Clustering};

/// Risk level per cluster label: 1 for the lowest severity, dense upward.
///
/// Equal severities keep first-seen label order, so the mapping is
/// reproducible for identical input.
pub fn rank_clusters(clusters: &[ClusterSummary]) -> Vec<usize> {
    let mut order: Vec<&ClusterSummary> = clusters.iter().collect();
    order.sort_by(|a, b| a.severity.total_cmp(&b.severity).then(a.label.cmp(&b.label)));

    let mut levels = vec![0usize; clusters.len()];
    for (rank, summary) in order.iter().enumerate() {
        levels[summary.label] = rank + 1;
    }
    levels
}

/// Propagates each cluster's level to its member observations.
pub fn assign_levels(
    observations: &[SmoothedObservation],
    clustering: &Clustering,
) -> Vec<RiskAssignment> {
    let levels = rank_clusters(&clustering.clusters);
    observations
        .iter()
        .zip(&clustering.labels)
        .map(|(s, &cluster)| RiskAssignment {
            unit_id: s.observation.unit_id.clone(),
            date: s.observation.date,
            cluster,
            risk_level: levels[cluster],
        })
        .collect()
}

/// Rows on the latest date, one per unit, ordered by unit id.
///
/// A unit with several rows on the latest date reports the last of them.
pub fn latest_report(assignments: &[RiskAssignment]) -> Vec<ReportRow> {
    let Some(latest) = assignments.iter().map(|a| a.date).max() else {
        return Vec::new();
    };

    let mut by_unit: BTreeMap<&str, &RiskAssignment> = BTreeMap::new();
    for a in assignments.iter().filter(|a| a.date == latest) {
        by_unit.insert(a.unit_id.as_str(), a);
    }

    by_unit
        .into_values()
        .map(|a| ReportRow {
            unit_id: a.unit_id.clone(),
            risk_level: a.risk_level,
            cluster: a.cluster,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn summary(label: usize, severity: f64) -> ClusterSummary {
        ClusterSummary {
            label,
            size: 1,
            feature_means: vec![severity],
            severity,
        }
    }

    fn assignment(unit: &str, day: u32, cluster: usize, level: usize) -> RiskAssignment {
        RiskAssignment {
            unit_id: unit.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            cluster,
            risk_level: level,
        }
    }

    #[test]
    fn test_levels_follow_ascending_severity() {
        let clusters = vec![summary(0, 0.9), summary(1, 0.1), summary(2, 0.5)];
        assert_eq!(rank_clusters(&clusters), vec![3, 1, 2]);
    }

    #[test]
    fn test_levels_are_dense_for_any_cluster_count() {
        for n in 1..=5 {
            let clusters: Vec<_> = (0..n).map(|i| summary(i, (n - i) as f64)).collect();
            let mut levels = rank_clusters(&clusters);
            levels.sort();
            let expected: Vec<usize> = (1..=n).collect();
            assert_eq!(levels, expected, "levels for {} clusters must be 1..={}", n, n);
        }
    }

    #[test]
    fn test_levels_stay_distinct_for_hundreds_of_clusters() {
        let n = 300;
        let clusters: Vec<_> = (0..n).map(|i| summary(i, i as f64 / n as f64)).collect();
        let levels = rank_clusters(&clusters);
        assert_eq!(levels[n - 1], n, "highest severity must get level {}", n);

        let mut distinct = levels.clone();
        distinct.sort();
        distinct.dedup();
        assert_eq!(distinct.len(), n, "every cluster needs its own level");
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let clusters = vec![summary(0, 0.0), summary(1, 0.0), summary(2, 0.0)];
        assert_eq!(rank_clusters(&clusters), vec![1, 2, 3]);

        let clusters = vec![summary(0, 0.7), summary(1, 0.2), summary(2, 0.2)];
        assert_eq!(rank_clusters(&clusters), vec![3, 1, 2]);
    }

    #[test]
    fn test_latest_report_keeps_only_max_date() {
        let assignments = vec![
            assignment("B1", 1, 0, 1),
            assignment("B1", 2, 1, 3),
            assignment("B2", 1, 0, 1),
            assignment("B2", 2, 2, 2),
        ];
        let report = latest_report(&assignments);
        assert_eq!(
            report,
            vec![
                ReportRow { unit_id: "B1".to_string(), risk_level: 3, cluster: 1 },
                ReportRow { unit_id: "B2".to_string(), risk_level: 2, cluster: 2 },
            ]
        );
    }

    #[test]
    fn test_units_absent_on_latest_date_are_excluded() {
        let assignments = vec![assignment("B1", 1, 0, 1), assignment("B2", 2, 0, 1)];
        let report = latest_report(&assignments);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].unit_id, "B2");
    }

    #[test]
    fn test_duplicate_latest_rows_report_once() {
        let assignments = vec![assignment("B1", 2, 0, 1), assignment("B1", 2, 1, 2)];
        let report = latest_report(&assignments);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].risk_level, 2);
    }

    #[test]
    fn test_empty_assignments_give_empty_report() {
        assert!(latest_report(&[]).is_empty());
    }
}
