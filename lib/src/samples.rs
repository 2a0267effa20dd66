//! Training-sample assembly.
//!
//! Combines the four flattened samples into the three tables the training
//! stages consume:
//!
//! | sample                  | contents                         | label      |
//! |-------------------------|----------------------------------|------------|
//! | boost training          | all four samples                 | `is_data`  |
//! | inference training      | quarks + gluons, standard sim    | `is_quark` |
//! | inference test          | quarks + gluons, modified sim    | `is_quark` |

use crate::error::Result;
use crate::jet::SampleKind;
use crate::table::JetTable;
use std::path::{Path, PathBuf};
use tracing::info;

/// Label separating modified ("data") from standard simulation.
pub const IS_DATA: &str = "is_data";

/// Label separating quark jets from gluon jets.
pub const IS_QUARK: &str = "is_quark";

pub const BOOST_TRAINING_SAMPLE: &str = "boost_training_sample";
pub const INFERENCE_TRAINING_SAMPLE: &str = "inference_training_sample";
pub const INFERENCE_TEST_SAMPLE: &str = "inference_test_sample";

/// One value per input sample.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet<T> {
    pub quarks_standard: T,
    pub quarks_modified: T,
    pub gluons_standard: T,
    pub gluons_modified: T,
}

impl<T> SampleSet<T> {
    pub fn get(&self, kind: SampleKind) -> &T {
        match (kind.is_quark(), kind.is_modified()) {
            (true, false) => &self.quarks_standard,
            (true, true) => &self.quarks_modified,
            (false, false) => &self.gluons_standard,
            (false, true) => &self.gluons_modified,
        }
    }

    /// Builds a set by calling `f` once per sample kind.
    pub fn try_from_fn<F>(mut f: F) -> Result<Self>
    where
        F: FnMut(SampleKind) -> Result<T>,
    {
        Ok(Self {
            quarks_standard: f(SampleKind::QUARKS_STANDARD)?,
            quarks_modified: f(SampleKind::QUARKS_MODIFIED)?,
            gluons_standard: f(SampleKind::GLUONS_STANDARD)?,
            gluons_modified: f(SampleKind::GLUONS_MODIFIED)?,
        })
    }
}

/// The three tables produced by [`assemble`].
#[derive(Debug, Clone)]
pub struct TrainingSamples {
    pub boost: JetTable,
    pub inference_train: JetTable,
    pub inference_test: JetTable,
}

fn labelled(table: &JetTable, name: &str, value: bool) -> JetTable {
    table.clone().with_label(name, value)
}

/// Assembles the boost, inference-training and inference-test tables.
pub fn assemble(flat: &SampleSet<JetTable>) -> Result<TrainingSamples> {
    let boost = JetTable::concat(&[
        labelled(&flat.quarks_standard, IS_DATA, false),
        labelled(&flat.quarks_modified, IS_DATA, true),
        labelled(&flat.gluons_standard, IS_DATA, false),
        labelled(&flat.gluons_modified, IS_DATA, true),
    ])?;
    let inference_train = JetTable::concat(&[
        labelled(&flat.quarks_standard, IS_QUARK, true),
        labelled(&flat.gluons_standard, IS_QUARK, false),
    ])?;
    let inference_test = JetTable::concat(&[
        labelled(&flat.quarks_modified, IS_QUARK, true),
        labelled(&flat.gluons_modified, IS_QUARK, false),
    ])?;
    info!(
        boost = boost.n_rows(),
        inference_train = inference_train.n_rows(),
        inference_test = inference_test.n_rows(),
        "assembled training samples"
    );
    Ok(TrainingSamples {
        boost,
        inference_train,
        inference_test,
    })
}

/// Path of a named sample table inside `dir`.
pub fn sample_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.bin"))
}

impl TrainingSamples {
    pub fn save(&self, dir: &Path) -> Result<()> {
        self.boost.save(&sample_path(dir, BOOST_TRAINING_SAMPLE))?;
        self.inference_train
            .save(&sample_path(dir, INFERENCE_TRAINING_SAMPLE))?;
        self.inference_test
            .save(&sample_path(dir, INFERENCE_TEST_SAMPLE))?;
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            boost: JetTable::load(&sample_path(dir, BOOST_TRAINING_SAMPLE))?,
            inference_train: JetTable::load(&sample_path(dir, INFERENCE_TRAINING_SAMPLE))?,
            inference_test: JetTable::load(&sample_path(dir, INFERENCE_TEST_SAMPLE))?,
        })
    }
}
