use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_attrition::evaluation::EvaluationHarness;
use kolosal_attrition::synthetic::{class_labels, Sampler, SMOTE};
use kolosal_attrition::training::ModelId;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// Imbalanced binary data: roughly one row in four departs
fn create_attrition_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let y = Array1::from_shape_fn(n_rows, |_| if rng.gen::<f64>() < 0.24 { 1.0 } else { 0.0 });
    let x = Array2::from_shape_fn((n_rows, n_features), |(i, j)| {
        let shift = if j == 0 { y[i] * 1.5 } else { 0.0 };
        rng.gen::<f64>() + shift
    });
    (x, y)
}

fn bench_grid_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_search");
    group.sample_size(10); // Fewer samples for training benchmarks

    let (x, y) = create_attrition_data(1000, 18);
    let harness = EvaluationHarness::new(5, 123);

    for model in ModelId::ALL {
        group.bench_with_input(BenchmarkId::new("search_best", model.code()), &model, |b, &model| {
            b.iter(|| harness.search_best(model, black_box(&x), black_box(&y)).unwrap())
        });
    }

    group.finish();
}

fn bench_smote(c: &mut Criterion) {
    let mut group = c.benchmark_group("smote");

    for n_rows in [1000, 5000, 10000].iter() {
        let (x, y) = create_attrition_data(*n_rows, 18);
        let labels = class_labels(&y);

        group.bench_with_input(BenchmarkId::new("fit_resample", n_rows), &x, |b, x| {
            b.iter(|| {
                SMOTE::new()
                    .with_seed(123)
                    .fit_resample(black_box(x), &labels)
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grid_search, bench_smote);
criterion_main!(benches);
