//! End-to-end run on synthetic jets
//!
//! Generates toy quark and gluon jets for both simulations, then walks
//! through every stage the `qgtag` binary exposes:
//! - conversion of JSON-lines input into cached raw samples
//! - flattening into fixed-width tables
//! - assembly of the boost and inference samples
//! - boost and reweighted inference training
//! - the Fisher baseline and the ROC AUC report
//!
//! Run with: cargo run --example synthetic_pipeline

use qg_tagger::{
    backend::CpuBackend,
    config::PipelineConfig,
    convert::load_or_convert,
    evaluate::{default_kpi_inputs, kpi_report},
    flatten::{FlattenLayout, Flattener},
    jet::SampleKind,
    pipeline::TwoStagePipeline,
    samples::{assemble, SampleSet},
    source::JsonLinesSource,
    synthetic::write_samples,
};
use std::error::Error;

type B = CpuBackend;

const JETS_PER_SAMPLE: usize = 600;

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.flatten = FlattenLayout {
        max_tracks: 16,
        max_towers: 16,
    };
    config.network.hidden = vec![32, 32];
    config.training.batch_size = 64;
    config.training.iterations = 800;
    config.training.boost_iterations = Some(400);
    config.training.learning_rate = 1e-3;
    config.training.log_every = 200;
    config.training.checkpoint_every = 0;
    config.training.relative_coordinates = true;
    config
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_target(false).init();

    let workdir = tempfile::tempdir()?;
    let dir = workdir.path();
    println!("Working in {}", dir.display());

    // 1. Synthetic JSON-lines input
    let input = dir.join("input");
    write_samples(&input, JETS_PER_SAMPLE, 42)?;

    // 2. Convert and flatten every sample
    let config = config();
    let flattener = Flattener::new(config.flatten);
    let flat = SampleSet::try_from_fn(|kind: SampleKind| {
        let cache = dir.join(format!("{}.bin", kind.name()));
        let source_path = input.join(format!("{}.jsonl", kind.name()));
        let raw = load_or_convert(kind.name(), &cache, false, || {
            JsonLinesSource::open(&source_path)
        })?;
        flattener.flatten(&raw.jets)
    })?;
    println!("Flattened {} columns per jet", flat.quarks_standard.n_columns());

    // 3. Boost and inference samples
    let samples = assemble(&flat)?;
    samples.save(dir)?;
    println!(
        "Boost sample: {} jets, inference train/test: {}/{}",
        samples.boost.n_rows(),
        samples.inference_train.n_rows(),
        samples.inference_test.n_rows()
    );

    // 4. Both inference recipes
    for use_boost in [true, false] {
        let mut config = config.clone();
        config.training.use_boost = use_boost;
        let pipeline = TwoStagePipeline::new(config)?;
        let models = pipeline.train::<B>(&samples, Some(dir))?;
        let evaluation = pipeline.evaluate(&models.inference, &samples)?;
        evaluation.save(dir, pipeline.result_suffix())?;
        println!(
            "{:<28} final loss {:.4}",
            pipeline.inference_model_name(),
            models.inference_history.last_loss().unwrap_or(f64::NAN)
        );
    }

    // 5. Linear baseline
    let pipeline = TwoStagePipeline::new(config)?;
    let (_, fisher) = pipeline.fisher::<B>(&samples)?;
    fisher.save(dir, "fisher")?;

    // 6. KPI report
    println!("\n{:<28} {:>8}", "result", "auc");
    for entry in kpi_report(&default_kpi_inputs(dir), &dir.join("kpi"))? {
        println!("{:<28} {:>8.4}", entry.label, entry.auc);
    }
    Ok(())
}
