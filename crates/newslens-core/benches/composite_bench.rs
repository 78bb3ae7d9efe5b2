//! Criterion benchmarks for the composite score engine.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use newslens_core::config::{LlmConfig, ModelConfig};
use newslens_core::scoring::{composite, ScoredInput};

fn ensemble_config(models: usize) -> LlmConfig {
    LlmConfig {
        models: (0..models)
            .map(|i| ModelConfig {
                model_name: format!("model-{i}"),
                weight: 1.0 + (i as f64) * 0.25,
                perspective: "center".to_string(),
            })
            .collect(),
        ..LlmConfig::default()
    }
}

fn inputs(models: usize) -> Vec<ScoredInput> {
    (0..models)
        .map(|i| ScoredInput {
            model: format!("model-{i}"),
            score: ((i as f64) / (models as f64)).mul_add(2.0, -1.0),
            confidence: 0.5 + ((i % 2) as f64) * 0.4,
        })
        .collect()
}

fn bench_composite(c: &mut Criterion) {
    let cfg_small = ensemble_config(3);
    let inputs_small = inputs(3);
    c.bench_function("composite_3_models", |b| {
        b.iter(|| composite(black_box(&inputs_small), black_box(&cfg_small)));
    });

    let cfg_large = ensemble_config(32);
    let inputs_large = inputs(32);
    c.bench_function("composite_32_models", |b| {
        b.iter(|| composite(black_box(&inputs_large), black_box(&cfg_large)));
    });
}

criterion_group!(benches, bench_composite);
criterion_main!(benches);
