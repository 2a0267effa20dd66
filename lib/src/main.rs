//! `qgtag`: drives each pipeline stage over a work directory.
//!
//! ```bash
//! qgtag generate --jets 2000          # synthetic input for a dry run
//! qgtag convert --input input/
//! qgtag flatten
//! qgtag assemble
//! qgtag --config configs/transformed.toml train
//! qgtag apply
//! qgtag fisher
//! qgtag kpi
//! ```
//!
//! ## Work directory
//!
//! ```text
//! <workdir>/
//!   <sample>.bin                    raw jets per sample
//!   <sample>_flat.bin               flattened tables
//!   <sample>_shapes.bin             jet shapes
//!   boost_training_sample.bin
//!   inference_training_sample.bin
//!   inference_test_sample.bin
//!   boost_model/                    checkpoints + pointer file
//!   boost_model.bin                 final parameters
//!   inference_model_with_boost.bin
//!   result_{train,test}_*.bin
//!   kpi/roc_*.csv
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use qg_tagger::config::PipelineConfig;
use qg_tagger::convert::{load_or_convert, RawSample};
use qg_tagger::evaluate::{default_kpi_inputs, kpi_report};
use qg_tagger::flatten::Flattener;
use qg_tagger::jet::{JetRecord, SampleKind};
use qg_tagger::model::{FeedForwardNet, Fitted, InferenceModel};
use qg_tagger::pipeline::{model_path, Evaluation, TwoStagePipeline, FISHER_MODEL};
use qg_tagger::preprocessing::shapes;
use qg_tagger::samples::{assemble, SampleSet, TrainingSamples};
use qg_tagger::serialization::load_bincode;
use qg_tagger::source::JsonLinesSource;
use qg_tagger::synthetic::write_samples;
use qg_tagger::table::JetTable;
use qg_tagger::trainer::latest_checkpoint;
use qg_tagger::DefaultBackend;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

type B = DefaultBackend;

#[derive(Parser)]
#[command(name = "qgtag")]
#[command(about = "Quark/gluon jet tagging with simulation reweighting")]
struct Cli {
    /// Pipeline configuration; defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding every intermediate artefact
    #[arg(long, global = true, default_value = ".")]
    workdir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write synthetic JSON-lines input for all four samples
    Generate {
        /// Output directory; defaults to <workdir>/input
        #[arg(long)]
        output: Option<PathBuf>,
        /// Jets per sample
        #[arg(long, default_value = "1000")]
        jets: usize,
        #[arg(long, default_value = "0")]
        seed: u64,
    },
    /// Read JSON-lines jets into per-sample caches
    Convert {
        /// Directory with one `<sample>.jsonl` file or `<sample>/` directory per sample
        #[arg(long)]
        input: PathBuf,
        /// Stop after this many jets per sample
        #[arg(long)]
        max_jets: Option<usize>,
        /// Skip this many jets at the start of every sample
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Ignore existing caches; needed after changing --offset or --max-jets
        #[arg(long)]
        recompute: bool,
    },
    /// Flatten constituents into fixed-width tables
    Flatten {
        /// Also write every table as CSV
        #[arg(long)]
        csv: bool,
    },
    /// Build the boost and inference samples
    Assemble,
    /// Train the boost and inference networks
    Train {
        /// Train the inference network without boost reweighting
        #[arg(long)]
        no_boost: bool,
    },
    /// Score the inference samples with a trained network
    Apply {
        /// Parameters to load; defaults to the final model of the configured recipe
        #[arg(long)]
        model: Option<PathBuf>,
        /// Use the latest checkpoint instead of the final model
        #[arg(long)]
        checkpoint: bool,
        #[arg(long)]
        no_boost: bool,
    },
    /// Fit and score the Fisher discriminant baseline
    Fisher,
    /// Print ROC AUC of all result files and write the curves
    Kpi {
        /// Also render the curves as PNG (needs the `plotters` feature)
        #[arg(long)]
        plot: bool,
    },
    /// Compute jet-shape observables per sample
    Shapes {
        #[arg(long)]
        recompute: bool,
        #[arg(long)]
        csv: bool,
    },
}

fn raw_path(workdir: &Path, kind: SampleKind) -> PathBuf {
    workdir.join(format!("{}.bin", kind.name()))
}

fn flat_path(workdir: &Path, kind: SampleKind) -> PathBuf {
    workdir.join(format!("{}_flat.bin", kind.name()))
}

fn load_raw(workdir: &Path, kind: SampleKind) -> Result<RawSample> {
    let path = raw_path(workdir, kind);
    load_bincode(&path)
        .with_context(|| format!("loading {} (run `convert` first)", path.display()))
}

/// `<input>/<sample>/` when it exists, `<input>/<sample>.jsonl` otherwise.
fn sample_input(input: &Path, kind: SampleKind) -> PathBuf {
    let dir = input.join(kind.name());
    if dir.is_dir() {
        dir
    } else {
        input.join(format!("{}.jsonl", kind.name()))
    }
}

fn build_pipeline(config: &PipelineConfig, no_boost: bool) -> Result<TwoStagePipeline> {
    let mut config = config.clone();
    if no_boost {
        config.training.use_boost = false;
    }
    Ok(TwoStagePipeline::new(config)?)
}

fn load_samples(workdir: &Path) -> Result<TrainingSamples> {
    TrainingSamples::load(workdir).context("loading training samples (run `assemble` first)")
}

fn print_evaluation(name: &str, evaluation: &Evaluation) -> Result<()> {
    println!("{name} train auc {:.6}", evaluation.train.auc()?);
    println!("{name} test auc {:.6}", evaluation.test.auc()?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::load_or_default(cli.config.as_deref())
        .with_context(|| format!("reading config {:?}", cli.config))?;
    let workdir = cli.workdir.as_path();
    std::fs::create_dir_all(workdir)
        .with_context(|| format!("creating work directory {}", workdir.display()))?;

    match cli.command {
        Command::Generate { output, jets, seed } => {
            let output = output.unwrap_or_else(|| workdir.join("input"));
            write_samples(&output, jets, seed)?;
        }
        Command::Convert {
            input,
            max_jets,
            offset,
            recompute,
        } => {
            for kind in SampleKind::ALL {
                let source_path = sample_input(&input, kind);
                let cache = raw_path(workdir, kind);
                let sample = load_or_convert(kind.name(), &cache, recompute, || {
                    Ok(JsonLinesSource::open(&source_path)?
                        .with_offset(offset)
                        .with_max_jets(max_jets))
                })
                .with_context(|| format!("converting {}", source_path.display()))?;
                info!(jets = sample.len(), "{kind}");
            }
        }
        Command::Flatten { csv } => {
            let flattener = Flattener::new(config.flatten);
            for kind in SampleKind::ALL {
                let raw = load_raw(workdir, kind)?;
                let table = flattener.flatten(&raw.jets)?;
                let path = flat_path(workdir, kind);
                table.save(&path)?;
                info!(rows = table.n_rows(), "Save {}", path.display());
                if csv {
                    table.write_csv(&path.with_extension("csv"))?;
                }
            }
        }
        Command::Assemble => {
            let flat = SampleSet::try_from_fn(|kind| JetTable::load(&flat_path(workdir, kind)))
                .context("loading flattened tables (run `flatten` first)")?;
            assemble(&flat)?.save(workdir)?;
        }
        Command::Train { no_boost } => {
            let pipeline = build_pipeline(&config, no_boost)?;
            let samples = load_samples(workdir)?;
            let models = pipeline.train::<B>(&samples, Some(workdir))?;
            let evaluation = pipeline.evaluate(&models.inference, &samples)?;
            evaluation.save(workdir, pipeline.result_suffix())?;
            print_evaluation(pipeline.inference_model_name(), &evaluation)?;
        }
        Command::Apply {
            model,
            checkpoint,
            no_boost,
        } => {
            let pipeline = build_pipeline(&config, no_boost)?;
            let name = pipeline.inference_model_name();
            let path = match (model, checkpoint) {
                (Some(path), _) => path,
                (None, true) => match latest_checkpoint(&workdir.join(name))? {
                    Some(path) => path,
                    None => bail!("no checkpoint recorded for {name}"),
                },
                (None, false) => model_path(workdir, name),
            };
            let net = FeedForwardNet::<B, Fitted>::load_from_file(&path)
                .with_context(|| format!("loading model {}", path.display()))?;
            info!("Loaded model {}", path.display());
            let evaluation = pipeline.evaluate(&net, &load_samples(workdir)?)?;
            evaluation.save(workdir, pipeline.result_suffix())?;
            print_evaluation(name, &evaluation)?;
        }
        Command::Fisher => {
            let pipeline = build_pipeline(&config, false)?;
            let (model, evaluation) = pipeline.fisher::<B>(&load_samples(workdir)?)?;
            model.save_to_file(model_path(workdir, FISHER_MODEL))?;
            evaluation.save(workdir, "fisher")?;
            print_evaluation("fisher", &evaluation)?;
        }
        Command::Kpi { plot } => {
            let entries = kpi_report(&default_kpi_inputs(workdir), &workdir.join("kpi"))?;
            if entries.is_empty() {
                bail!("no result files in {}", workdir.display());
            }
            for entry in &entries {
                println!("{} auc {:.6}", entry.label, entry.auc);
            }
            if plot {
                plot_curves(&entries, &workdir.join("kpi").join("roc.png"))?;
            }
        }
        Command::Shapes { recompute, csv } => {
            for kind in SampleKind::ALL {
                let cache = workdir.join(format!("{}_shapes.bin", kind.name()));
                let table =
                    shapes::load_or_compute(&cache, recompute, || load_raw_jets(workdir, kind))?;
                if csv {
                    table.write_csv(&cache.with_extension("csv"))?;
                }
            }
        }
    }
    Ok(())
}

fn load_raw_jets(workdir: &Path, kind: SampleKind) -> qg_tagger::Result<Vec<JetRecord>> {
    let raw: RawSample = load_bincode(&raw_path(workdir, kind))?;
    Ok(raw.jets)
}

#[cfg(feature = "plotters")]
fn plot_curves(entries: &[qg_tagger::evaluate::KpiEntry], path: &Path) -> Result<()> {
    Ok(qg_tagger::evaluate::plot_roc_curves(entries, path)?)
}

#[cfg(not(feature = "plotters"))]
fn plot_curves(_entries: &[qg_tagger::evaluate::KpiEntry], _path: &Path) -> Result<()> {
    bail!("plotting needs the `plotters` feature")
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qg_tagger::evaluate::ResultTable;
    use qg_tagger::pipeline::result_path;

    const SMALL_CONFIG: &str = r#"
[flatten]
max_tracks = 4
max_towers = 4

[network]
hidden = [8]

[training]
batch_size = 16
iterations = 20
boost_iterations = 10
learning_rate = 1e-2
log_every = 10
checkpoint_every = 0
"#;

    fn qgtag(workdir: &Path, config: &Path, args: &[&str]) -> Result<()> {
        let mut argv = vec![
            "qgtag".to_string(),
            "--workdir".to_string(),
            workdir.display().to_string(),
            "--config".to_string(),
            config.display().to_string(),
        ];
        argv.extend(args.iter().map(|a| a.to_string()));
        run(Cli::parse_from(argv))
    }

    #[test]
    fn test_stages_run_in_sequence() {
        let tmp = tempfile::tempdir().unwrap();
        let work = tmp.path();
        let config = work.join("small.toml");
        std::fs::write(&config, SMALL_CONFIG).unwrap();
        let input = work.join("input");
        let input_arg = input.display().to_string();

        qgtag(work, &config, &["generate", "--jets", "40", "--seed", "3"]).unwrap();
        for kind in SampleKind::ALL {
            assert!(input.join(format!("{}.jsonl", kind.name())).exists());
        }

        qgtag(work, &config, &["convert", "--input", &input_arg, "--max-jets", "30"]).unwrap();
        assert_eq!(load_raw(work, SampleKind::GLUONS_MODIFIED).unwrap().len(), 30);

        qgtag(work, &config, &["flatten"]).unwrap();
        let flat = JetTable::load(&flat_path(work, SampleKind::QUARKS_STANDARD)).unwrap();
        assert_eq!(flat.n_rows(), 30);
        // 6 jet variables, 4 track slots x 4, 4 tower slots x 5
        assert_eq!(flat.n_columns(), 6 + 16 + 20);

        qgtag(work, &config, &["assemble"]).unwrap();
        let samples = load_samples(work).unwrap();
        assert_eq!(samples.boost.n_rows(), 120);
        assert_eq!(samples.inference_train.n_rows(), 60);
        assert_eq!(samples.inference_test.n_rows(), 60);

        qgtag(work, &config, &["train"]).unwrap();
        assert!(model_path(work, "boost_model").exists());
        assert!(model_path(work, "inference_model_with_boost").exists());
        let test = ResultTable::load(&result_path(work, "test", "with_boost")).unwrap();
        assert_eq!(test.len(), 60);

        qgtag(work, &config, &["apply", "--checkpoint"]).unwrap();
        qgtag(work, &config, &["fisher"]).unwrap();
        assert!(result_path(work, "train", "fisher").exists());

        qgtag(work, &config, &["kpi"]).unwrap();
        assert!(work.join("kpi").join("roc_test_with_boost.csv").exists());
        assert!(work.join("kpi").join("roc_fisher_test.csv").exists());
    }

    #[test]
    fn test_stage_without_inputs_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("small.toml");
        std::fs::write(&config, SMALL_CONFIG).unwrap();
        let err = qgtag(tmp.path(), &config, &["flatten"]).unwrap_err();
        assert!(format!("{err:#}").contains("run `convert` first"));
    }

    #[test]
    fn test_kpi_without_results_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("small.toml");
        std::fs::write(&config, SMALL_CONFIG).unwrap();
        assert!(qgtag(tmp.path(), &config, &["kpi"]).is_err());
    }
}
