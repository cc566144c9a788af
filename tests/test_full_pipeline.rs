//! Integration test: load -> prepare -> oversample -> search -> segment

use kolosal_attrition::config::PipelineConfig;
use kolosal_attrition::evaluation::EvaluationHarness;
use kolosal_attrition::preprocessing::{train_test_split, DataPreparer, MissingValuePolicy};
use kolosal_attrition::segmentation::{segment, RiskTier};
use kolosal_attrition::synthetic::{class_labels, Sampler, SMOTE};
use kolosal_attrition::training::ModelId;
use kolosal_attrition::utils::DataLoader;
use kolosal_attrition::workflow::AttritionWorkflow;
use kolosal_attrition::KolosalError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::io::Write;

const DEPARTMENTS: [&str; 6] = ["sales", "technical", "support", "IT", "hr", "management"];
const SALARIES: [&str; 3] = ["low", "medium", "high"];

/// HR export with legacy headers; every fifth row departed
fn hr_csv(n_rows: usize, seed: u64) -> String {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut csv = String::from(
        "satisfaction_level,last_evaluation,number_project,average_montly_hours,\
         time_spend_company,Work_accident,left,promotion_last_5years,sales,salary\n",
    );
    for i in 0..n_rows {
        let left = i % 5 == 0;
        let (satisfaction, hours, projects) = if left {
            (rng.gen_range(0.05..0.55), rng.gen_range(220..310), rng.gen_range(5..8))
        } else {
            (rng.gen_range(0.35..1.0), rng.gen_range(130..240), rng.gen_range(2..6))
        };
        csv.push_str(&format!(
            "{:.2},{:.2},{},{},{},{},{},{},{},{}\n",
            satisfaction,
            rng.gen_range(0.36..1.0),
            projects,
            hours,
            rng.gen_range(2..8),
            (rng.gen::<f64>() < 0.15) as u8,
            left as u8,
            (rng.gen::<f64>() < 0.05) as u8,
            DEPARTMENTS[rng.gen_range(0..DEPARTMENTS.len())],
            SALARIES[rng.gen_range(0..SALARIES.len())],
        ));
    }
    csv
}

#[test]
fn test_linear_model_end_to_end_on_imbalanced_rows() {
    let raw = DataLoader::new()
        .load_csv_bytes(hr_csv(100, 7).into_bytes())
        .unwrap();
    let prepared = DataPreparer::default().prepare(raw).unwrap();
    let data = &prepared.encoded;
    assert_eq!(data.n_samples(), 100);
    assert_eq!(data.y.iter().filter(|v| **v == 1.0).count(), 20);

    let split = train_test_split(&data.x, &data.y, 0.2, 123, true).unwrap();
    let resampled = SMOTE::new()
        .with_seed(123)
        .fit_resample(&split.x_train, &class_labels(&split.y_train))
        .unwrap();
    let y_resampled = resampled.y_f64();
    let positives = y_resampled.iter().filter(|v| **v == 1.0).count();
    assert_eq!(positives * 2, y_resampled.len());

    let harness = EvaluationHarness::new(5, 123);
    let (pipeline, result) = harness
        .run(
            ModelId::LogisticRegression,
            &resampled.x,
            &y_resampled,
            &split.x_test,
            &split.y_test,
        )
        .unwrap();

    assert_eq!(result.candidates.len(), 10);
    assert!((0.0..=1.0).contains(&result.best_score));
    let metrics = result.test_metrics.as_ref().unwrap();
    assert!((0.0..=1.0).contains(&metrics.accuracy));
    assert!((0.0..=1.0).contains(&metrics.roc_auc));
    assert_eq!(metrics.confusion.total(), split.x_test.nrows());
    assert!(result.cross_validation.is_some());

    let segmentation = segment(&pipeline, &data.x, &data.feature_names, &[]).unwrap();
    let total: usize = segmentation.tier_counts.iter().map(|c| c.count).sum();
    assert_eq!(total, 100);
    assert_eq!(segmentation.tier_counts.len(), RiskTier::ALL.len());
}

#[test]
fn test_search_is_deterministic() {
    let raw = DataLoader::new()
        .load_csv_bytes(hr_csv(80, 11).into_bytes())
        .unwrap();
    let data = DataPreparer::default().prepare(raw).unwrap().encoded;
    let harness = EvaluationHarness::new(4, 123);

    for model in [ModelId::LogisticRegression, ModelId::RandomForest] {
        let (first_pipeline, first) = harness.search_best(model, &data.x, &data.y).unwrap();
        let (second_pipeline, second) = harness.search_best(model, &data.x, &data.y).unwrap();

        assert_eq!(first.best_config, second.best_config);
        assert_eq!(first.best_score, second.best_score);
        assert_eq!(first.candidates, second.candidates);
        assert_eq!(
            first_pipeline.predict_proba(&data.x).unwrap(),
            second_pipeline.predict_proba(&data.x).unwrap()
        );
    }
}

#[test]
fn test_fold_count_violation_is_reported_up_front() {
    let raw = DataLoader::new()
        .load_csv_bytes(hr_csv(40, 3).into_bytes())
        .unwrap();
    let data = DataPreparer::default().prepare(raw).unwrap().encoded;
    // 8 departed rows, 10 folds requested
    let err = EvaluationHarness::new(10, 123)
        .search_best(ModelId::LogisticRegression, &data.x, &data.y)
        .unwrap_err();

    assert!(err.to_string().starts_with("LR failed during grid search"));
    assert!(matches!(
        err.root(),
        KolosalError::FoldCountError {
            n_splits: 10,
            class_label: 1,
            class_count: 8
        }
    ));
}

#[test]
fn test_space_separated_export_prepares_like_plain_csv() {
    let plain = hr_csv(60, 13);
    let spaced = plain.replace(',', ", ");
    let loader = DataLoader::new();

    let expected = DataPreparer::default()
        .prepare(loader.load_csv_bytes(plain.into_bytes()).unwrap())
        .unwrap()
        .encoded;
    let data = DataPreparer::default()
        .prepare(loader.load_csv_bytes(spaced.into_bytes()).unwrap())
        .unwrap()
        .encoded;

    assert_eq!(data.feature_names, expected.feature_names);
    assert_eq!(data.x, expected.x);
    assert_eq!(data.y, expected.y);
}

#[test]
fn test_workflow_from_csv_file() {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(hr_csv(120, 5).as_bytes()).unwrap();

    let config = PipelineConfig::new(file.path().to_string_lossy())
        .with_models(vec![ModelId::LogisticRegression, ModelId::GradientBoosting])
        .with_cv_folds(3)
        .with_stratified_split(true);
    let (pipeline, report) = AttritionWorkflow::new(config).unwrap().run().unwrap();

    assert_eq!(report.n_rows, 120);
    assert_eq!(report.n_train + report.n_test, 120);
    assert_eq!(report.n_test, 24);
    assert_eq!(report.resampled_balance.retained, report.resampled_balance.departed);
    assert_eq!(report.train_balance.retained, report.resampled_balance.retained);
    assert_eq!(report.results.len(), 2);

    let best = report.best_result().unwrap();
    assert!(report
        .results
        .iter()
        .all(|r| r.best_score <= best.best_score));
    assert_eq!(pipeline.config(), Some(&best.best_config));

    assert_eq!(report.segmentation.len(), 24);
    assert_eq!(report.segmentation.profile_features.len(), 4);
    for profile in &report.segmentation.tier_profiles {
        assert_eq!(profile.means.len(), 4);
        assert!(profile.count > 0);
    }

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["segmentation"]["tier_counts"].is_array());
}

#[test]
fn test_workflow_missing_values_policy() {
    let mut csv = hr_csv(60, 9);
    // blank out one satisfaction value
    let line_start = csv.find('\n').unwrap() + 1;
    let comma = line_start + csv[line_start..].find(',').unwrap();
    csv.replace_range(line_start..comma, "");
    let raw = DataLoader::new().load_csv_bytes(csv.into_bytes()).unwrap();

    let strict = AttritionWorkflow::new(
        PipelineConfig::default().with_models(vec![ModelId::LogisticRegression]),
    )
    .unwrap();
    assert!(matches!(
        strict.run_on(raw.clone()).unwrap_err(),
        KolosalError::DataQualityError { .. }
    ));

    let relaxed = AttritionWorkflow::new(
        PipelineConfig::default()
            .with_models(vec![ModelId::LogisticRegression])
            .with_cv_folds(3)
            .with_stratified_split(true)
            .with_missing_values(MissingValuePolicy::DropRows),
    )
    .unwrap();
    let (_, report) = relaxed.run_on(raw).unwrap();
    assert_eq!(report.n_rows, 59);
    assert_eq!(report.missing.rows_dropped, 1);
}
