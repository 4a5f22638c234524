//! Prediction and visualization stages

use tracing::info;

use crate::aggregator::{self, MeanOfMeans};
use crate::classifier::HouseholdClassifier;
use crate::error::{EstimateError, Result};
use crate::models::{ClassStatistics, ClassificationCounts, PredictionRecord};
use crate::projection::{self, ProjectedVector, ProjectionParameters};
use crate::store::ResultStore;

pub const RUN_PREDICTION_FIRST: &str =
    "No prediction result yet. Run 'predict' first to estimate waste generation, then visualize.";

/// Classify every household and aggregate the per-class statistics
pub fn predict(
    classifier: &dyn HouseholdClassifier,
    city: &str,
    iptu: &[f64],
    stats: &ClassStatistics,
    mode: MeanOfMeans,
) -> Result<PredictionRecord> {
    let labels = classifier.classify(iptu);
    let counts = ClassificationCounts::from_labels(&labels);
    info!(
        city,
        model = classifier.name(),
        households = counts.total(),
        classes = counts.present().count(),
        "households classified"
    );

    let estimate = aggregator::aggregate(&counts, stats, mode)?;
    Ok(PredictionRecord {
        city: city.to_string(),
        model: classifier.name().to_string(),
        counts,
        estimate,
    })
}

#[derive(Debug)]
pub enum Visualization {
    /// No result on disk; the prediction stage has to run first
    NeedsPrediction,
    Ready {
        record: PredictionRecord,
        projection: ProjectedVector,
    },
}

/// Project the stored prediction result
pub fn visualize(store: &ResultStore, params: &ProjectionParameters) -> Result<Visualization> {
    let record = match store.load() {
        Ok(record) => record,
        Err(EstimateError::ResultNotFound(path)) => {
            info!(path = %path.display(), "no stored prediction");
            return Ok(Visualization::NeedsPrediction);
        }
        Err(e) => return Err(e),
    };

    let projection = projection::project(&record.estimate, params)?;
    Ok(Visualization::Ready { record, projection })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassLabel, ClassProfile, Material, MaterialVector, PackagingRatio, Scope};
    use crate::units::{TimeBase, Unit};

    /// Labels by threshold: below 500 is class 1, otherwise class 2
    struct Threshold;

    impl HouseholdClassifier for Threshold {
        fn name(&self) -> &str {
            "threshold"
        }

        fn classify(&self, iptu: &[f64]) -> Vec<ClassLabel> {
            iptu.iter().map(|&x| if x < 500.0 { 1 } else { 2 }).collect()
        }
    }

    fn stats() -> ClassStatistics {
        let mut stats = ClassStatistics::new();
        for (label, plastic) in [(1, 120.0), (2, 80.0)] {
            let mean = MaterialVector::new([plastic, 90.0, 20.0, 10.0, 8.0, 12.0, 300.0, 150.0]);
            stats.insert(
                label,
                ClassProfile {
                    mean,
                    margin: mean.scale(0.1),
                    packaging: PackagingRatio {
                        packaging: 0.4,
                        non_packaging: 0.6,
                    },
                },
            );
        }
        stats
    }

    fn iptu(low: usize, high: usize) -> Vec<f64> {
        let mut values = vec![250.0; low];
        values.extend(std::iter::repeat(900.0).take(high));
        values
    }

    #[test]
    fn prediction_counts_households_per_class() {
        let record = predict(
            &Threshold,
            "Campo Grande",
            &iptu(700, 300),
            &stats(),
            MeanOfMeans::Legacy,
        )
        .unwrap();

        assert_eq!(record.counts.get(1), 700);
        assert_eq!(record.counts.get(2), 300);
        assert_eq!(record.estimate.household_count, 1_000);
        assert!((record.estimate.point.get(Material::Plastic) - 108_000.0).abs() < 1e-6);
        assert_eq!(record.model, "threshold");
    }

    #[test]
    fn empty_listing_cannot_be_predicted() {
        let err = predict(&Threshold, "Bonito", &[], &stats(), MeanOfMeans::Legacy).unwrap_err();
        assert!(matches!(err, EstimateError::EmptyClassification));
    }

    #[test]
    fn visualization_without_prediction_asks_for_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("result.json"));

        let outcome = visualize(&store, &ProjectionParameters::default()).unwrap();
        assert!(matches!(outcome, Visualization::NeedsPrediction));
    }

    #[test]
    fn visualization_projects_stored_prediction() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("result.json"));
        let record = predict(
            &Threshold,
            "Campo Grande",
            &iptu(700, 300),
            &stats(),
            MeanOfMeans::Legacy,
        )
        .unwrap();
        store.save(&record).unwrap();

        let params = ProjectionParameters {
            unit: Unit::Ton,
            time_base: TimeBase::Year,
            scope: Scope::NonRecyclables,
            persons_per_household: Some(3),
            ..Default::default()
        };
        match visualize(&store, &params).unwrap() {
            Visualization::Ready { record, projection } => {
                assert_eq!(record.city, "Campo Grande");
                // 300 g of organic matter per household per day, 3 persons, 365 days
                assert!((projection.components[0].1 - 0.0365).abs() < 1e-12);
            }
            Visualization::NeedsPrediction => panic!("expected a stored result"),
        }
    }
}
