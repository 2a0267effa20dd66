//! # qg-tagger
//!
//! Quark/gluon jet classification with a correction for simulation
//! mismodelling.
//!
//! Jets from a detector simulation are flattened into fixed-width rows, a
//! *boost* network learns to tell the standard simulation from a modified
//! one, and its output reweights the training jets of the *inference*
//! network that separates quarks from gluons. A Fisher discriminant serves
//! as the linear baseline.
//!
//! ## Stages
//!
//! | stage    | module                         | artefact                              |
//! |----------|--------------------------------|---------------------------------------|
//! | convert  | [`source`], [`convert`]        | `<sample>.bin` raw jets                |
//! | flatten  | [`flatten`]                    | `<sample>_flat.bin` tables             |
//! | assemble | [`samples`]                    | boost / inference train / test tables  |
//! | train    | [`pipeline`], [`trainer`]      | checkpoints and final model parameters |
//! | apply    | [`evaluate`]                   | `result_{train,test}_*.bin`            |
//! | fisher   | [`fisher`]                     | Fisher result tables                   |
//! | kpi      | [`evaluate`]                   | ROC AUC, ROC curves                    |
//!
//! ## Core Design Principles
//!
//! - **Stateful Type Safety**: models carry their training state in the type
//!   system (`Unfitted` vs `Fitted`); only fitted models can predict or be
//!   saved as final parameters.
//! - **Training/Inference Separation**: fitted models hold parameters only;
//!   losses, optimizers, weightings and the trainer live outside them.
//! - **Backend Agnosticism**: numerical code is written against the
//!   [`Backend`] trait; `CpuBackend` is always available, `NdarrayBackend`
//!   behind the `ndarray` feature.
//!
//! ## Quick Start
//!
//! ```rust
//! use qg_tagger::backend::CpuBackend;
//! use qg_tagger::dataset::InMemoryDataset;
//! use qg_tagger::loss::WeightedBinaryCrossEntropy;
//! use qg_tagger::model::{FeedForwardNet, MlpParams, Unfitted};
//! use qg_tagger::optimizer::Adam;
//! use qg_tagger::trainer::Trainer;
//! use qg_tagger::weighting::UniformWeights;
//!
//! type B = CpuBackend;
//! type Net = FeedForwardNet<B, Unfitted>;
//!
//! let data = InMemoryDataset::new(vec![0.0, 1.0, 1.0, 0.0], 2, vec![0.0, 1.0]).unwrap();
//! let net = Net::new(2, &[4], 0).unwrap();
//! let trainer = Trainer::<B, _, _, Net, MlpParams<B>>::builder(
//!     WeightedBinaryCrossEntropy::default(),
//!     Adam::new(1e-2),
//! )
//! .batch_size(2)
//! .iterations(10)
//! .build();
//! let (fitted, history) = trainer.fit(net, &data, &UniformWeights).unwrap();
//! assert_eq!(fitted.layer_sizes(), vec![2, 4, 1]);
//! assert_eq!(history.losses.len(), 1);
//! ```

pub mod backend;

/// Pipeline configuration (TOML).
pub mod config;

/// Raw sample conversion and caching.
pub mod convert;

/// Data loading utilities and dataset abstractions.
pub mod dataset;

pub mod error;

/// Applying models, ROC curves and the KPI report.
pub mod evaluate;

pub mod fisher;

/// Fixed-width flattening of jet constituents.
pub mod flatten;

pub mod jet;

/// Differentiable loss functions for model training.
pub mod loss;

/// Machine learning models with compile-time state safety.
pub mod model;

/// Optimization algorithms for parameter updates.
pub mod optimizer;

pub mod pipeline;

/// Table-level preprocessing and jet shapes.
pub mod preprocessing;

pub mod samples;

/// Model persistence and format conversion utilities.
pub mod serialization;

pub mod source;

pub mod synthetic;

pub mod table;

/// High-level training loop orchestration.
pub mod trainer;

/// Per-sample weights for the weighted loss.
pub mod weighting;

/// Re-export of core backend types for convenient usage.
pub use backend::{Backend, CpuBackend, DefaultBackend, ScalarOps, Tensor1D, Tensor2D};
pub use error::{QgError, Result};
