//! Shared inputs for the qg-tagger criterion benchmarks.
//!
//! Every benchmark runs on synthetic jets so that no input files are needed.

pub mod utils;

pub use utils::{flat_samples, labelled_scores, toy_jets};
