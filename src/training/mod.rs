//! Model training module
//!
//! Estimators behind the model registry:
//! - L2-regularized logistic regression
//! - Random Forest (bagged Gini trees)
//! - Gradient boosting with log-loss
//! - Stratified K-fold splitting shared by every search

mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod gradient_boosting;
pub mod linear_models;
pub mod random_forest;
pub mod registry;

pub use cross_validation::{check_stratifiable, CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::LogisticRegression;
pub use models::Classifier;
pub use random_forest::{MaxFeatures, RandomForest};
pub use registry::{ModelConfig, ModelId};
