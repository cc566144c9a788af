//! Integration test: Risk tiers and segmentation

use kolosal_attrition::evaluation::{FittedPipeline, Pipeline};
use kolosal_attrition::segmentation::{assign_tiers, segment, RiskTier};
use kolosal_attrition::training::Classifier;
use kolosal_attrition::{KolosalError, Result};
use ndarray::{array, Array1, Array2};

/// Returns the same probabilities whatever the input
#[derive(Debug)]
struct Fixed(Vec<f64>);

impl Classifier for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }
    fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
        Ok(())
    }
    fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(Array1::from(self.0.clone()))
    }
}

fn fitted(probabilities: Vec<f64>, x: &Array2<f64>) -> FittedPipeline {
    let y = Array1::from_shape_fn(x.nrows(), |i| (i % 2) as f64);
    Pipeline::new(Box::new(Fixed(probabilities)))
        .unwrap()
        .fit(x, &y)
        .unwrap()
}

fn names() -> Vec<String> {
    vec!["satisfaction_level".to_string(), "number_project".to_string()]
}

#[test]
fn test_boundary_probabilities() {
    let cases = [
        (0.0, RiskTier::Safe),
        (0.2, RiskTier::LowRisk),
        (0.6, RiskTier::MediumRisk),
        (0.9, RiskTier::HighRisk),
        (1.0, RiskTier::HighRisk),
    ];
    for (p, tier) in cases {
        assert_eq!(RiskTier::from_probability(p).unwrap(), tier, "p = {}", p);
    }

    let tiers: Vec<RiskTier> = assign_tiers(&[0.0, 0.2, 0.6, 0.9, 1.0])
        .unwrap()
        .into_iter()
        .map(|a| a.tier)
        .collect();
    assert!(tiers.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_segment_counts_and_profiles() {
    let x = array![
        [0.9, 3.0],
        [0.8, 4.0],
        [0.5, 4.0],
        [0.3, 6.0],
        [0.1, 7.0],
        [0.2, 6.0]
    ];
    let pipeline = fitted(vec![0.0, 0.1, 0.3, 0.7, 0.95, 1.0], &x);
    let result = segment(&pipeline, &x, &names(), &names()).unwrap();

    assert_eq!(result.len(), 6);
    assert_eq!(result.count(RiskTier::Safe), 2);
    assert_eq!(result.count(RiskTier::LowRisk), 1);
    assert_eq!(result.count(RiskTier::MediumRisk), 1);
    assert_eq!(result.count(RiskTier::HighRisk), 2);

    let high = result
        .tier_profiles
        .iter()
        .find(|p| p.tier == RiskTier::HighRisk)
        .unwrap();
    assert_eq!(high.count, 2);
    assert!((high.means[0] - 0.15).abs() < 1e-12);
    assert!((high.means[1] - 6.5).abs() < 1e-12);

    // each row keeps its probability
    assert_eq!(result.assessments[3].probability, 0.7);
    assert_eq!(result.assessments[3].row, 3);
}

#[test]
fn test_empty_tiers_still_counted() {
    let x = array![[0.9, 3.0], [0.8, 4.0]];
    let pipeline = fitted(vec![0.05, 0.1], &x);
    let result = segment(&pipeline, &x, &names(), &[]).unwrap();

    assert_eq!(result.tier_counts.len(), 4);
    assert_eq!(result.count(RiskTier::Safe), 2);
    assert_eq!(result.count(RiskTier::HighRisk), 0);
    assert_eq!(result.tier_profiles.len(), 1);
}

#[test]
fn test_invalid_probability_is_rejected() {
    let x = array![[0.9, 3.0], [0.8, 4.0]];
    let pipeline = fitted(vec![0.5, 1.5], &x);
    assert!(matches!(
        segment(&pipeline, &x, &names(), &[]),
        Err(KolosalError::ValidationError(_))
    ));
}

#[test]
fn test_unknown_profile_feature() {
    let x = array![[0.9, 3.0], [0.8, 4.0]];
    let pipeline = fitted(vec![0.5, 0.5], &x);
    let err = segment(&pipeline, &x, &names(), &["salary".to_string()]).unwrap_err();
    assert!(matches!(err, KolosalError::SchemaError { ref column, .. } if column == "salary"));
}
