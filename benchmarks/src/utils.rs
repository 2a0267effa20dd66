use qg_tagger::flatten::{FlattenLayout, Flattener};
use qg_tagger::jet::{JetRecord, SampleKind};
use qg_tagger::samples::{assemble, SampleSet, TrainingSamples};
use qg_tagger::source::JetSource;
use qg_tagger::synthetic::SyntheticJets;
use qg_tagger::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// `n` synthetic jets of one sample.
pub fn toy_jets(kind: SampleKind, n: usize, seed: u64) -> Result<Vec<JetRecord>> {
    SyntheticJets::new(kind, n, seed)?.read_all()
}

/// Flattens `n` synthetic jets per sample and assembles the training tables.
pub fn flat_samples(n: usize, layout: FlattenLayout, seed: u64) -> Result<TrainingSamples> {
    let flattener = Flattener::new(layout);
    let mut sample_seed = seed;
    let flat = SampleSet::try_from_fn(|kind| {
        sample_seed = sample_seed.wrapping_add(1);
        flattener.flatten(&toy_jets(kind, n, sample_seed)?)
    })?;
    assemble(&flat)
}

/// Balanced labels with scores shifted upwards for the positive class.
///
/// Scores are rounded to three decimals so that ties occur as they do for
/// saturated network outputs.
pub fn labelled_scores(n: usize, seed: u64) -> (Vec<f32>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let y = (i % 2) as f32;
            let p: f64 = rng.gen::<f64>() * 0.8 + 0.2 * y as f64;
            (y, (p * 1000.0).round() / 1000.0)
        })
        .unzip()
}
