//! Pipeline configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! baseline recipe. Two profiles ship in `configs/`.
//!
//! ## Example
//!
//! ```toml
//! [network]
//! hidden = [400, 400, 400, 400]
//! keep_prob = 0.75
//!
//! [training]
//! learning_rate = 1e-4
//! batch_size = 200
//! boost_signal_fraction = 0.29
//! ```

use crate::error::{QgError, Result};
use crate::evaluate::DEFAULT_CHUNK_SIZE;
use crate::flatten::FlattenLayout;
use crate::model::mlp::DEFAULT_HIDDEN;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub flatten: FlattenLayout,
    pub network: NetworkConfig,
    pub training: TrainingConfig,
    pub apply: ApplyConfig,
    pub fisher: FisherConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Widths of the hidden layers.
    pub hidden: Vec<usize>,
    /// Dropout keep probability for hidden layers; 1 disables dropout.
    pub keep_prob: f64,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden: DEFAULT_HIDDEN.to_vec(),
            keep_prob: 1.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub iterations: usize,
    /// Iterations of the boost network; falls back to `iterations`.
    pub boost_iterations: Option<usize>,
    pub learning_rate: f64,
    /// Loss and reweighting regulariser.
    pub epsilon: f64,
    pub log_every: usize,
    pub checkpoint_every: usize,
    pub use_boost: bool,
    /// Class balance of the boost sample (`is_data` fraction).
    pub boost_signal_fraction: Option<f64>,
    /// Class balance of the inference sample (`is_quark` fraction).
    pub inference_signal_fraction: Option<f64>,
    /// Express constituents relative to the jet axis and momentum.
    pub relative_coordinates: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            iterations: 100_000,
            boost_iterations: None,
            learning_rate: 1e-3,
            epsilon: 1e-5,
            log_every: 500,
            checkpoint_every: 10_000,
            use_boost: true,
            boost_signal_fraction: None,
            inference_signal_fraction: None,
            relative_coordinates: false,
        }
    }
}

impl TrainingConfig {
    pub fn boost_iterations(&self) -> usize {
        self.boost_iterations.unwrap_or(self.iterations)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    pub chunk_size: usize,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FisherConfig {
    pub shrinkage: f64,
}

impl Default for FisherConfig {
    fn default() -> Self {
        Self { shrinkage: 1e-3 }
    }
}

fn invalid(message: String) -> QgError {
    QgError::InvalidParameter(message)
}

impl PipelineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Loads `path` when given, the defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.training;
        if self.flatten.max_tracks == 0 || self.flatten.max_towers == 0 {
            return Err(invalid("slot counts must be positive".into()));
        }
        if self.network.hidden.iter().any(|&w| w == 0) {
            return Err(invalid("hidden layer widths must be positive".into()));
        }
        if !(self.network.keep_prob > 0.0 && self.network.keep_prob <= 1.0) {
            return Err(invalid(format!(
                "keep_prob {} not in (0, 1]",
                self.network.keep_prob
            )));
        }
        if t.batch_size == 0 || t.iterations == 0 || t.boost_iterations() == 0 {
            return Err(invalid("batch size and iterations must be positive".into()));
        }
        if !(t.learning_rate > 0.0) {
            return Err(invalid(format!("learning rate {} must be positive", t.learning_rate)));
        }
        if !(t.epsilon >= 0.0) {
            return Err(invalid(format!("epsilon {} must be non-negative", t.epsilon)));
        }
        for f in [t.boost_signal_fraction, t.inference_signal_fraction]
            .into_iter()
            .flatten()
        {
            if !(f > 0.0 && f < 1.0) {
                return Err(invalid(format!("signal fraction {f} not in (0, 1)")));
            }
        }
        if self.apply.chunk_size == 0 {
            return Err(invalid("apply chunk size must be positive".into()));
        }
        if !(self.fisher.shrinkage >= 0.0) {
            return Err(invalid(format!(
                "shrinkage {} must be non-negative",
                self.fisher.shrinkage
            )));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| invalid(e.to_string()))
    }
}
