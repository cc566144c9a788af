//! Retention-risk segmentation
//!
//! Scores individuals with a fitted pipeline and buckets the departure
//! probability into four ordered tiers:
//!
//! | probability  | tier        |
//! |--------------|-------------|
//! | [0.0, 0.2)   | Safe        |
//! | [0.2, 0.6)   | Low-Risk    |
//! | [0.6, 0.9)   | Medium-Risk |
//! | [0.9, 1.0]   | High-Risk   |

use crate::error::{KolosalError, Result};
use crate::evaluation::FittedPipeline;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Lower bounds of Low-Risk, Medium-Risk and High-Risk
pub const TIER_BOUNDS: [f64; 3] = [0.2, 0.6, 0.9];

/// Ordered retention-risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    Safe,
    LowRisk,
    MediumRisk,
    HighRisk,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Safe,
        RiskTier::LowRisk,
        RiskTier::MediumRisk,
        RiskTier::HighRisk,
    ];

    /// Tier of a departure probability. Bounds are lower-inclusive and 0.0
    /// is Safe; NaN or values outside [0, 1] are rejected.
    pub fn from_probability(p: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(KolosalError::ValidationError(format!(
                "departure probability {} outside [0, 1]",
                p
            )));
        }
        let tier = match TIER_BOUNDS.iter().filter(|&&bound| p >= bound).count() {
            0 => RiskTier::Safe,
            1 => RiskTier::LowRisk,
            2 => RiskTier::MediumRisk,
            _ => RiskTier::HighRisk,
        };
        Ok(tier)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Safe => "Safe Zone",
            RiskTier::LowRisk => "Low-Risk Zone",
            RiskTier::MediumRisk => "Medium-Risk Zone",
            RiskTier::HighRisk => "High-Risk Zone",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One scored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub row: usize,
    pub probability: f64,
    pub tier: RiskTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierCount {
    pub tier: RiskTier,
    pub count: usize,
}

/// Mean of each profile feature over the members of a tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProfile {
    pub tier: RiskTier,
    pub count: usize,
    pub means: Vec<f64>,
}

/// Scored population
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSegmentation {
    pub assessments: Vec<RiskAssessment>,
    /// All four tiers in order, zero when empty
    pub tier_counts: Vec<TierCount>,
    pub profile_features: Vec<String>,
    /// Non-empty tiers only
    pub tier_profiles: Vec<TierProfile>,
}

impl RiskSegmentation {
    pub fn len(&self) -> usize {
        self.assessments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assessments.is_empty()
    }

    pub fn count(&self, tier: RiskTier) -> usize {
        self.tier_counts
            .iter()
            .find(|c| c.tier == tier)
            .map_or(0, |c| c.count)
    }
}

/// Assign tiers to precomputed probabilities
pub fn assign_tiers(probabilities: &[f64]) -> Result<Vec<RiskAssessment>> {
    probabilities
        .iter()
        .enumerate()
        .map(|(row, &probability)| {
            Ok(RiskAssessment {
                row,
                probability,
                tier: RiskTier::from_probability(probability)?,
            })
        })
        .collect()
}

fn tier_counts(assessments: &[RiskAssessment]) -> Vec<TierCount> {
    RiskTier::ALL
        .iter()
        .map(|&tier| TierCount {
            tier,
            count: assessments.iter().filter(|a| a.tier == tier).count(),
        })
        .collect()
}

/// Score `x` (unscaled features, columns named by `feature_names`) and
/// bucket every row. `profile_features` are averaged per tier.
pub fn segment(
    pipeline: &FittedPipeline,
    x: &Array2<f64>,
    feature_names: &[String],
    profile_features: &[String],
) -> Result<RiskSegmentation> {
    if feature_names.len() != x.ncols() {
        return Err(KolosalError::ShapeError {
            expected: format!("{} feature names", x.ncols()),
            actual: format!("{} feature names", feature_names.len()),
        });
    }
    let profile_columns = profile_features
        .iter()
        .map(|name| {
            feature_names
                .iter()
                .position(|f| f == name)
                .ok_or_else(|| KolosalError::SchemaError {
                    column: name.clone(),
                    detail: "is not a model feature".to_string(),
                })
        })
        .collect::<Result<Vec<usize>>>()?;

    let proba = pipeline.predict_proba(x)?;
    let assessments = assign_tiers(&proba.to_vec())?;
    let counts = tier_counts(&assessments);

    let profile = x.select(Axis(1), &profile_columns);
    let tier_profiles = RiskTier::ALL
        .iter()
        .filter_map(|&tier| {
            let members: Vec<usize> = assessments
                .iter()
                .filter(|a| a.tier == tier)
                .map(|a| a.row)
                .collect();
            let means = profile.select(Axis(0), &members).mean_axis(Axis(0))?;
            Some(TierProfile {
                tier,
                count: members.len(),
                means: means.to_vec(),
            })
        })
        .collect();

    info!(
        rows = assessments.len(),
        safe = counts[0].count,
        low = counts[1].count,
        medium = counts[2].count,
        high = counts[3].count,
        "population segmented"
    );

    Ok(RiskSegmentation {
        assessments,
        tier_counts: counts,
        profile_features: profile_features.to_vec(),
        tier_profiles,
    })
}
