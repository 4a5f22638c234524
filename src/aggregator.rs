//! Aggregation of per-class household counts into material tonnage estimates

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EstimateError, Result};
use crate::models::{
    AggregateEstimate, ClassStatistics, ClassificationCounts, Material, MaterialVector,
    PackagingRatio,
};

/// How the reported mean of the present classes' means is formed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeanOfMeans {
    /// Every class mean but the last summed, plus the last divided by the
    /// class count. Reproduces the historical dashboard numbers.
    #[default]
    Legacy,
    /// Plain arithmetic mean
    Arithmetic,
}

impl MeanOfMeans {
    fn combine(self, values: &[f64]) -> f64 {
        let n = values.len();
        match (self, values.split_last()) {
            (_, None) => f64::NAN,
            (MeanOfMeans::Legacy, Some((last, rest))) => {
                if rest.is_empty() {
                    *last
                } else {
                    rest.iter().fold(0.0, |acc, v| acc + v) + last / n as f64
                }
            }
            (MeanOfMeans::Arithmetic, Some(_)) => {
                values.iter().fold(0.0, |acc, v| acc + v) / n as f64
            }
        }
    }
}

/// Combine classification counts with per-class statistics.
///
/// Every present class contributes `mean * n` to the point estimate and
/// `(margin / mean) * n` to the margin accumulator. The combined relative
/// margin is the accumulator divided by the household count; the absolute
/// margin is that fraction of the point estimate.
pub fn aggregate(
    counts: &ClassificationCounts,
    stats: &ClassStatistics,
    mode: MeanOfMeans,
) -> Result<AggregateEstimate> {
    let mut point = MaterialVector::zeros();
    let mut weighted_margin = MaterialVector::zeros();
    let mut households = 0u64;
    let mut means = Vec::new();
    let mut packaging = Vec::new();

    for (label, n) in counts.present() {
        let profile = stats
            .get(label)
            .ok_or(EstimateError::MissingClassStatistics(label))?;
        let weight = n as f64;

        point = point + profile.mean.scale(weight);
        weighted_margin = weighted_margin
            + profile
                .margin
                .zip_with(&profile.mean, relative_margin)
                .scale(weight);
        households += n;

        means.push(profile.mean);
        packaging.push(profile.packaging);

        debug!(class = label, households = n, "class contribution added");
    }

    if households == 0 {
        return Err(EstimateError::EmptyClassification);
    }

    let margin_fraction = weighted_margin.map(|w| w / households as f64);
    let margin = margin_fraction.zip_with(&point, |fraction, p| fraction * p);
    let upper = point.zip_with(&margin, |p, m| p + m);
    let lower = point.zip_with(&margin, |p, m| p - m);

    Ok(AggregateEstimate {
        household_count: households,
        point,
        lower,
        upper,
        margin_fraction,
        point_totals: point.totals(),
        lower_totals: lower.totals(),
        upper_totals: upper.totals(),
        class_means: mean_of_vectors(&means, mode),
        packaging: PackagingRatio {
            packaging: mode.combine(&packaging.iter().map(|p| p.packaging).collect::<Vec<_>>()),
            non_packaging: mode
                .combine(&packaging.iter().map(|p| p.non_packaging).collect::<Vec<_>>()),
        },
    })
}

/// Margin as a fraction of the mean. Undefined ratios (0/0, or a margin over
/// a zero mean) are NaN so the material drops out of every total.
fn relative_margin(margin: f64, mean: f64) -> f64 {
    let ratio = margin / mean;
    if ratio.is_finite() { ratio } else { f64::NAN }
}

fn mean_of_vectors(vectors: &[MaterialVector], mode: MeanOfMeans) -> MaterialVector {
    let mut out = MaterialVector::zeros();
    for material in Material::ALL {
        let values: Vec<f64> = vectors.iter().map(|v| v.get(material)).collect();
        out.set(material, mode.combine(&values));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassProfile, Scope};

    fn profile(mean: [f64; 8], margin_pct: f64, packaging: f64) -> ClassProfile {
        let mean = MaterialVector::new(mean);
        ClassProfile {
            mean,
            margin: mean.scale(margin_pct),
            packaging: PackagingRatio {
                packaging,
                non_packaging: 1.0 - packaging,
            },
        }
    }

    fn two_class_stats() -> ClassStatistics {
        let mut stats = ClassStatistics::new();
        stats.insert(
            1,
            profile([120.0, 90.0, 20.0, 10.0, 8.0, 12.0, 400.0, 150.0], 0.10, 0.4),
        );
        stats.insert(
            2,
            profile([80.0, 60.0, 15.0, 8.0, 6.0, 9.0, 300.0, 110.0], 0.10, 0.3),
        );
        stats
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn seven_hundred_three_hundred_scenario() {
        let counts: ClassificationCounts = [(1, 700), (2, 300)].into_iter().collect();
        let estimate = aggregate(&counts, &two_class_stats(), MeanOfMeans::Legacy).unwrap();

        assert_eq!(estimate.household_count, 1_000);
        assert!(close(estimate.point.get(Material::Plastic), 108_000.0));
        assert!(close(
            estimate.upper.get(Material::Plastic) - estimate.point.get(Material::Plastic),
            10_800.0
        ));
        assert!(close(estimate.lower.get(Material::Plastic), 97_200.0));
        assert!(close(estimate.upper.get(Material::Plastic), 118_800.0));
    }

    #[test]
    fn totals_match_components_and_bounds_bracket_estimate() {
        let counts: ClassificationCounts = [(1, 41), (2, 7)].into_iter().collect();
        let estimate = aggregate(&counts, &two_class_stats(), MeanOfMeans::Legacy).unwrap();

        for scope in [Scope::Recyclables, Scope::NonRecyclables, Scope::Total] {
            let summed: f64 = scope.materials().iter().map(|&m| estimate.point.get(m)).sum();
            assert!(close(estimate.point_totals.for_scope(scope), summed));
        }
        for (m, p) in estimate.point.iter() {
            assert!(estimate.lower.get(m) <= p, "{m}");
            assert!(p <= estimate.upper.get(m), "{m}");
        }
    }

    #[test]
    fn single_and_three_class_runs() {
        let mut stats = two_class_stats();
        stats.insert(3, profile([200.0; 8], 0.2, 0.5));

        let one: ClassificationCounts = [(2, 10)].into_iter().collect();
        let estimate = aggregate(&one, &stats, MeanOfMeans::Legacy).unwrap();
        assert!(close(estimate.point.get(Material::Organic), 3_000.0));
        assert!(close(estimate.class_means.get(Material::Organic), 300.0));

        let three: ClassificationCounts = [(1, 1), (2, 1), (3, 2)].into_iter().collect();
        let estimate = aggregate(&three, &stats, MeanOfMeans::Legacy).unwrap();
        assert!(close(estimate.point.get(Material::Plastic), 120.0 + 80.0 + 400.0));
        // (0.1 + 0.1 + 2 * 0.2) / 4
        assert!(close(estimate.margin_fraction.get(Material::Plastic), 0.15));
    }

    #[test]
    fn legacy_mean_of_means_matches_historical_numbers() {
        let mut stats = two_class_stats();
        stats.insert(3, profile([200.0; 8], 0.2, 0.6));

        let two: ClassificationCounts = [(1, 3), (2, 3)].into_iter().collect();
        let legacy = aggregate(&two, &stats, MeanOfMeans::Legacy).unwrap();
        assert_eq!(legacy.class_means.get(Material::Plastic), 120.0 + 80.0 / 2.0);
        assert_eq!(legacy.packaging.packaging, 0.4 + 0.3 / 2.0);

        let three: ClassificationCounts = [(1, 1), (2, 1), (3, 1)].into_iter().collect();
        let legacy = aggregate(&three, &stats, MeanOfMeans::Legacy).unwrap();
        assert_eq!(legacy.class_means.get(Material::Plastic), 120.0 + 80.0 + 200.0 / 3.0);

        let plain = aggregate(&three, &stats, MeanOfMeans::Arithmetic).unwrap();
        assert!(close(plain.class_means.get(Material::Plastic), 400.0 / 3.0));
    }

    #[test]
    fn zero_mean_material_is_excluded_from_bound_totals() {
        let mut stats = ClassStatistics::new();
        let mut p = profile([100.0, 50.0, 10.0, 5.0, 5.0, 0.0, 300.0, 100.0], 0.1, 0.5);
        p.margin.set(Material::Textile, 0.0);
        stats.insert(1, p);

        let counts: ClassificationCounts = [(1, 10)].into_iter().collect();
        let estimate = aggregate(&counts, &stats, MeanOfMeans::Legacy).unwrap();

        assert!(estimate.upper.get(Material::Textile).is_nan());
        assert!(estimate.lower.get(Material::Textile).is_nan());
        assert!(close(estimate.upper_totals.all, 5_700.0 * 1.1));
        assert!(close(estimate.lower_totals.recyclable, 1_700.0 * 0.9));
        assert!(close(estimate.point_totals.all, 5_700.0));
    }

    #[test]
    fn margin_over_zero_mean_is_excluded_like_nan() {
        let mut stats = two_class_stats();
        let mut p = profile([80.0, 60.0, 15.0, 8.0, 6.0, 0.0, 300.0, 110.0], 0.1, 0.3);
        p.margin.set(Material::Textile, 1.0);
        stats.insert(2, p);

        let counts: ClassificationCounts = [(1, 10), (2, 10)].into_iter().collect();
        let estimate = aggregate(&counts, &stats, MeanOfMeans::Legacy).unwrap();

        assert!(estimate.margin_fraction.get(Material::Textile).is_nan());
        assert!(estimate.upper.get(Material::Textile).is_nan());
        assert!(estimate.upper_totals.all.is_finite());
        assert!(estimate.lower_totals.all.is_finite());
        assert!(close(estimate.point.get(Material::Textile), 120.0));
    }

    #[test]
    fn unknown_class_and_empty_run_are_errors() {
        let counts: ClassificationCounts = [(1, 2), (4, 1)].into_iter().collect();
        let err = aggregate(&counts, &two_class_stats(), MeanOfMeans::Legacy).unwrap_err();
        assert!(matches!(err, EstimateError::MissingClassStatistics(4)));

        let err = aggregate(
            &ClassificationCounts::default(),
            &two_class_stats(),
            MeanOfMeans::Legacy,
        )
        .unwrap_err();
        assert!(matches!(err, EstimateError::EmptyClassification));
    }
}
