//! Two-stage training: boost network, then the reweighted inference network.
//!
//! The boost network learns to separate the standard from the modified
//! simulation on the boost sample. Its output is turned into importance
//! weights `(p+ε)/(1-p+ε)` so that the inference network, trained on the
//! standard simulation only, sees jets distributed like the modified one.

use crate::backend::{Backend, Tensor1D, Tensor2D};
use crate::config::PipelineConfig;
use crate::dataset::InMemoryDataset;
use crate::error::Result;
use crate::evaluate::{apply, ResultTable};
use crate::fisher::FisherDiscriminant;
use crate::flatten::feature_names;
use crate::loss::WeightedBinaryCrossEntropy;
use crate::model::{FeedForwardNet, Fitted, InferenceModel, LinearModel, MlpParams, Unfitted};
use crate::optimizer::Adam;
use crate::preprocessing::{Identity, RelativeCoordinates, TableTransform};
use crate::samples::{TrainingSamples, IS_DATA, IS_QUARK};
use crate::table::JetTable;
use crate::trainer::{Trainer, TrainingHistory};
use crate::weighting::{BoostReweighting, ClassBalance, Product, SampleWeighting, UniformWeights};
use std::path::{Path, PathBuf};
use tracing::info;

pub const BOOST_MODEL: &str = "boost_model";
pub const INFERENCE_MODEL_WITH_BOOST: &str = "inference_model_with_boost";
pub const INFERENCE_MODEL: &str = "inference_model";
pub const FISHER_MODEL: &str = "fisher_model";

type NetTrainer<B> = Trainer<
    B,
    WeightedBinaryCrossEntropy,
    Adam<B, MlpParams<B>>,
    FeedForwardNet<B, Unfitted>,
    MlpParams<B>,
>;

/// Networks produced by [`TwoStagePipeline::train`].
pub struct TrainedModels<B: Backend> {
    pub boost: Option<FeedForwardNet<B, Fitted>>,
    pub inference: FeedForwardNet<B, Fitted>,
    pub boost_history: Option<TrainingHistory>,
    pub inference_history: TrainingHistory,
}

/// Scores of one classifier on the inference training and test samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub train: ResultTable,
    pub test: ResultTable,
}

impl Evaluation {
    /// Writes `result_train_<suffix>.bin` and `result_test_<suffix>.bin`.
    pub fn save(&self, dir: &Path, suffix: &str) -> Result<()> {
        self.train.save(&result_path(dir, "train", suffix))?;
        self.test.save(&result_path(dir, "test", suffix))?;
        Ok(())
    }
}

pub fn result_path(dir: &Path, split: &str, suffix: &str) -> PathBuf {
    dir.join(format!("result_{split}_{suffix}.bin"))
}

/// Path of the final parameters of a named model.
pub fn model_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.bin"))
}

pub struct TwoStagePipeline {
    config: PipelineConfig,
}

impl TwoStagePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Network and Fisher inputs: every flattened feature column.
    pub fn variables(&self) -> Vec<String> {
        feature_names(&self.config.flatten)
    }

    /// Applies the configured input transformation.
    pub fn prepare(&self, table: &JetTable) -> Result<JetTable> {
        if self.config.training.relative_coordinates {
            RelativeCoordinates::new(self.config.flatten).transform(table)
        } else {
            Identity.transform(table)
        }
    }

    pub fn use_boost(&self) -> bool {
        self.config.training.use_boost
    }

    pub fn inference_model_name(&self) -> &'static str {
        if self.use_boost() {
            INFERENCE_MODEL_WITH_BOOST
        } else {
            INFERENCE_MODEL
        }
    }

    /// Suffix of the inference result files.
    pub fn result_suffix(&self) -> &'static str {
        if self.use_boost() {
            "with_boost"
        } else {
            "without_boost"
        }
    }

    fn network<B: Backend>(
        &self,
        n_features: usize,
        seed: u64,
    ) -> Result<FeedForwardNet<B, Unfitted>> {
        let net = &self.config.network;
        let model = FeedForwardNet::new(n_features, &net.hidden, seed)?;
        if net.keep_prob < 1.0 {
            model.with_dropout(net.keep_prob)
        } else {
            Ok(model)
        }
    }

    fn trainer<B: Backend>(
        &self,
        iterations: usize,
        name: &str,
        seed: u64,
        workdir: Option<&Path>,
    ) -> NetTrainer<B> {
        let t = &self.config.training;
        let mut builder = Trainer::builder(
            WeightedBinaryCrossEntropy::new(t.epsilon),
            Adam::new(t.learning_rate),
        )
        .batch_size(t.batch_size)
        .iterations(iterations)
        .log_every(t.log_every)
        .checkpoint_every(t.checkpoint_every)
        .prefix(name)
        .seed(seed);
        if let Some(dir) = workdir {
            builder = builder.checkpoint_dir(dir.join(name));
        }
        builder.build()
    }

    fn class_balance(fraction: Option<f64>) -> Result<Option<ClassBalance>> {
        fraction.map(ClassBalance::new).transpose()
    }

    #[allow(clippy::too_many_arguments)]
    fn fit_network<B: Backend>(
        &self,
        table: &JetTable,
        label: &str,
        iterations: usize,
        weighting: &dyn SampleWeighting<B>,
        name: &str,
        seed: u64,
        workdir: Option<&Path>,
    ) -> Result<(FeedForwardNet<B, Fitted>, TrainingHistory)> {
        let variables = self.variables();
        let data = InMemoryDataset::from_table(&self.prepare(table)?, &variables, label)?;
        info!(
            rows = table.n_rows(),
            positive_fraction = data.positive_fraction(),
            "Train {name}"
        );
        let model = self.network::<B>(variables.len(), seed)?;
        let (fitted, history) = self
            .trainer::<B>(iterations, name, seed, workdir)
            .fit(model, &data, weighting)?;
        if let Some(dir) = workdir {
            let path = model_path(dir, name);
            fitted.save_to_file(&path)?;
            history.save_json(&dir.join(format!("{name}_history.json")))?;
            info!("Save model {}", path.display());
        }
        Ok((fitted, history))
    }

    /// Trains the boost network on `is_data`.
    pub fn train_boost<B: Backend>(
        &self,
        boost: &JetTable,
        workdir: Option<&Path>,
    ) -> Result<(FeedForwardNet<B, Fitted>, TrainingHistory)> {
        let t = &self.config.training;
        let balance = Self::class_balance(t.boost_signal_fraction)?;
        let weighting: Box<dyn SampleWeighting<B>> = match balance {
            Some(balance) => Box::new(balance),
            None => Box::new(UniformWeights),
        };
        self.fit_network(
            boost,
            IS_DATA,
            t.boost_iterations(),
            weighting.as_ref(),
            BOOST_MODEL,
            self.config.network.seed,
            workdir,
        )
    }

    /// Trains the inference network on `is_quark`, reweighted by `boost`
    /// when given.
    pub fn train_inference<B: Backend>(
        &self,
        train: &JetTable,
        boost: Option<&FeedForwardNet<B, Fitted>>,
        workdir: Option<&Path>,
    ) -> Result<(FeedForwardNet<B, Fitted>, TrainingHistory)> {
        let t = &self.config.training;
        let mut parts: Vec<Box<dyn SampleWeighting<B>>> = Vec::new();
        if let Some(net) = boost {
            parts.push(Box::new(BoostReweighting::new(net.clone(), t.epsilon)));
        }
        if let Some(balance) = Self::class_balance(t.inference_signal_fraction)? {
            parts.push(Box::new(balance));
        }
        let name = if boost.is_some() {
            INFERENCE_MODEL_WITH_BOOST
        } else {
            INFERENCE_MODEL
        };
        self.fit_network(
            train,
            IS_QUARK,
            t.iterations,
            &Product(parts),
            name,
            self.config.network.seed.wrapping_add(1),
            workdir,
        )
    }

    /// Runs both stages, or only the inference stage when boosting is off.
    pub fn train<B: Backend>(
        &self,
        samples: &TrainingSamples,
        workdir: Option<&Path>,
    ) -> Result<TrainedModels<B>> {
        let (boost, boost_history) = if self.use_boost() {
            let (net, history) = self.train_boost::<B>(&samples.boost, workdir)?;
            (Some(net), Some(history))
        } else {
            (None, None)
        };
        let (inference, inference_history) =
            self.train_inference(&samples.inference_train, boost.as_ref(), workdir)?;
        Ok(TrainedModels {
            boost,
            inference,
            boost_history,
            inference_history,
        })
    }

    fn score<B, M>(&self, model: &M, samples: &TrainingSamples) -> Result<Evaluation>
    where
        B: Backend,
        M: InferenceModel<B, InputBatch = Tensor2D<B>, OutputBatch = Tensor1D<B>>,
    {
        let variables = self.variables();
        let chunk = self.config.apply.chunk_size;
        let train_table = self.prepare(&samples.inference_train)?;
        let test_table = self.prepare(&samples.inference_test)?;
        let train = apply(model, &train_table, &variables, IS_QUARK, chunk)?;
        let test = apply(model, &test_table, &variables, IS_QUARK, chunk)?;
        info!(
            train_auc = train.auc().unwrap_or(f64::NAN),
            test_auc = test.auc().unwrap_or(f64::NAN),
            "evaluated"
        );
        Ok(Evaluation { train, test })
    }

    /// Scores a fitted network on the inference training and test samples.
    pub fn evaluate<B: Backend>(
        &self,
        net: &FeedForwardNet<B, Fitted>,
        samples: &TrainingSamples,
    ) -> Result<Evaluation> {
        self.score(net, samples)
    }

    /// Fits the Fisher baseline on the inference training sample and scores it.
    pub fn fisher<B: Backend>(
        &self,
        samples: &TrainingSamples,
    ) -> Result<(LinearModel<B, Fitted>, Evaluation)> {
        let variables = self.variables();
        let table = self.prepare(&samples.inference_train)?;
        let data = InMemoryDataset::from_table(&table, &variables, IS_QUARK)?;
        let model = FisherDiscriminant::new(self.config.fisher.shrinkage)?.fit::<B>(&data)?;
        let evaluation = self.score(&model, samples)?;
        Ok((model, evaluation))
    }
}
