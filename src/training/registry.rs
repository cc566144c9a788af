//! Fixed model registry: identifiers, configurations and search grids

use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::linear_models::LogisticRegression;
use super::models::Classifier;
use super::random_forest::RandomForest;
use crate::error::KolosalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candidate model families, in registry order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelId {
    #[serde(rename = "LR")]
    LogisticRegression,
    #[serde(rename = "RF")]
    RandomForest,
    #[serde(rename = "GB")]
    GradientBoosting,
}

impl ModelId {
    pub const ALL: [ModelId; 3] = [
        ModelId::LogisticRegression,
        ModelId::RandomForest,
        ModelId::GradientBoosting,
    ];

    /// Short code used on the command line and in reports
    pub fn code(&self) -> &'static str {
        match self {
            ModelId::LogisticRegression => "LR",
            ModelId::RandomForest => "RF",
            ModelId::GradientBoosting => "GB",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelId::LogisticRegression => "Logistic Regression",
            ModelId::RandomForest => "Random Forest",
            ModelId::GradientBoosting => "Gradient Boosting",
        }
    }

    /// Hyperparameter combinations in search order: parameter names sorted,
    /// the last name varying fastest.
    pub fn param_grid(&self) -> Vec<ModelConfig> {
        match self {
            // C: 0.1, 0.2, ..., 1.0; max_iter: 10000
            ModelId::LogisticRegression => (1..=10)
                .map(|step| ModelConfig::Logistic {
                    c: step as f64 / 10.0,
                    max_iter: 10_000,
                })
                .collect(),
            // bootstrap: false; n_estimators: 50, 60, 70, 80, 90
            ModelId::RandomForest => [false]
                .into_iter()
                .flat_map(|bootstrap| {
                    (50..100).step_by(10).map(move |n_estimators| ModelConfig::RandomForest {
                        n_estimators,
                        bootstrap,
                    })
                })
                .collect(),
            // learning_rate: 0.1; n_estimators: 50, 60, 70, 80, 90
            ModelId::GradientBoosting => [0.1]
                .into_iter()
                .flat_map(|learning_rate| {
                    (50..100).step_by(10).map(move |n_estimators| {
                        ModelConfig::GradientBoosting {
                            n_estimators,
                            learning_rate,
                        }
                    })
                })
                .collect(),
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ModelId {
    type Err = KolosalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LR" | "LOGISTIC" | "LOGISTIC_REGRESSION" => Ok(ModelId::LogisticRegression),
            "RF" | "RANDOM_FOREST" => Ok(ModelId::RandomForest),
            "GB" | "GRADIENT_BOOSTING" => Ok(ModelId::GradientBoosting),
            _ => Err(KolosalError::InvalidParameter {
                name: "model".to_string(),
                value: s.to_string(),
                reason: "expected one of LR, RF, GB".to_string(),
            }),
        }
    }
}

/// One point of a model's search grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model")]
pub enum ModelConfig {
    #[serde(rename = "LR")]
    Logistic { c: f64, max_iter: usize },
    #[serde(rename = "RF")]
    RandomForest { n_estimators: usize, bootstrap: bool },
    #[serde(rename = "GB")]
    GradientBoosting {
        n_estimators: usize,
        learning_rate: f64,
    },
}

impl ModelConfig {
    pub fn model_id(&self) -> ModelId {
        match self {
            ModelConfig::Logistic { .. } => ModelId::LogisticRegression,
            ModelConfig::RandomForest { .. } => ModelId::RandomForest,
            ModelConfig::GradientBoosting { .. } => ModelId::GradientBoosting,
        }
    }

    /// Fresh, unfitted estimator; stochastic ones are seeded with `seed`
    pub fn build(&self, seed: u64) -> Box<dyn Classifier> {
        match *self {
            ModelConfig::Logistic { c, max_iter } => Box::new(
                LogisticRegression::new()
                    .with_c(c)
                    .with_max_iter(max_iter),
            ),
            ModelConfig::RandomForest {
                n_estimators,
                bootstrap,
            } => Box::new(
                RandomForest::new(n_estimators)
                    .with_bootstrap(bootstrap)
                    .with_random_state(seed),
            ),
            ModelConfig::GradientBoosting {
                n_estimators,
                learning_rate,
            } => Box::new(GradientBoostingClassifier::new(GradientBoostingConfig {
                n_estimators,
                learning_rate,
                random_state: seed,
                ..Default::default()
            })),
        }
    }
}

impl fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelConfig::Logistic { c, max_iter } => write!(f, "C={}, max_iter={}", c, max_iter),
            ModelConfig::RandomForest {
                n_estimators,
                bootstrap,
            } => write!(f, "bootstrap={}, n_estimators={}", bootstrap, n_estimators),
            ModelConfig::GradientBoosting {
                n_estimators,
                learning_rate,
            } => write!(
                f,
                "learning_rate={}, n_estimators={}",
                learning_rate, n_estimators
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_sizes_and_order() {
        let lr = ModelId::LogisticRegression.param_grid();
        assert_eq!(lr.len(), 10);
        assert_eq!(lr[0], ModelConfig::Logistic { c: 0.1, max_iter: 10_000 });
        assert_eq!(lr[9], ModelConfig::Logistic { c: 1.0, max_iter: 10_000 });

        let rf = ModelId::RandomForest.param_grid();
        assert_eq!(rf.len(), 5);
        assert_eq!(
            rf[4],
            ModelConfig::RandomForest {
                n_estimators: 90,
                bootstrap: false
            }
        );

        assert_eq!(ModelId::GradientBoosting.param_grid().len(), 5);
    }

    #[test]
    fn test_every_grid_entry_belongs_to_its_model() {
        for id in ModelId::ALL {
            assert!(id.param_grid().iter().all(|c| c.model_id() == id));
        }
    }

    #[test]
    fn test_parse_codes() {
        assert_eq!("lr".parse::<ModelId>().unwrap(), ModelId::LogisticRegression);
        assert_eq!("RF".parse::<ModelId>().unwrap(), ModelId::RandomForest);
        assert_eq!(" gb ".parse::<ModelId>().unwrap(), ModelId::GradientBoosting);
        assert!("svm".parse::<ModelId>().is_err());
    }

    #[test]
    fn test_serde_codes() {
        let json = serde_json::to_string(&ModelId::ALL).unwrap();
        assert_eq!(json, r#"["LR","RF","GB"]"#);

        let config = ModelConfig::GradientBoosting {
            n_estimators: 50,
            learning_rate: 0.1,
        };
        let value = serde_json::to_value(config).unwrap();
        assert_eq!(value["model"], "GB");
    }

    #[test]
    fn test_build_names() {
        let model = ModelId::RandomForest.param_grid()[0].build(1);
        assert_eq!(model.name(), "RandomForest");
        assert!(model.supports_probability());
    }
}
