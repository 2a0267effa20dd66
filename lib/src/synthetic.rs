//! Toy jets for dry runs, examples and benchmarks.
//!
//! Quark jets have fewer, harder and narrower constituents than gluon jets.
//! The modified simulation raises the multiplicity and widens the jets a
//! little, which gives the boost network a real but small difference to find.

use crate::error::{QgError, Result};
use crate::jet::{Flavour, JetRecord, SampleKind, Simulation};
use crate::source::{write_json_lines, JetSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp1, Normal, Poisson};
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use tracing::info;

/// Shape parameters of one sample kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JetProfile {
    /// Mean number of calorimeter towers.
    pub multiplicity: f64,
    /// Angular spread of constituents around the jet axis.
    pub width: f64,
    /// Exponent applied to the momentum shares; larger is harder.
    pub hardness: f64,
    /// Fraction of towers that also leave a track.
    pub charged_fraction: f64,
}

impl JetProfile {
    pub fn for_kind(kind: SampleKind) -> Self {
        let base = match kind.flavour {
            Flavour::Quark => Self {
                multiplicity: 14.0,
                width: 0.07,
                hardness: 2.0,
                charged_fraction: 0.6,
            },
            Flavour::Gluon => Self {
                multiplicity: 24.0,
                width: 0.12,
                hardness: 1.3,
                charged_fraction: 0.6,
            },
        };
        match kind.simulation {
            Simulation::Standard => base,
            Simulation::Modified => Self {
                multiplicity: base.multiplicity * 1.15,
                width: base.width * 1.1,
                ..base
            },
        }
    }
}

/// Seeded generator of jets of one sample kind.
pub struct SyntheticJets {
    kind: SampleKind,
    profile: JetProfile,
    rng: StdRng,
    remaining: usize,
    jet_pt: Normal<f64>,
    multiplicity: Poisson<f64>,
    spread: Normal<f64>,
}

fn distribution_error(e: impl std::fmt::Display) -> QgError {
    QgError::InvalidParameter(e.to_string())
}

impl SyntheticJets {
    /// Generator yielding `n_jets` jets of `kind`.
    pub fn new(kind: SampleKind, n_jets: usize, seed: u64) -> Result<Self> {
        Self::with_profile(kind, JetProfile::for_kind(kind), n_jets, seed)
    }

    pub fn with_profile(
        kind: SampleKind,
        profile: JetProfile,
        n_jets: usize,
        seed: u64,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            profile,
            rng: StdRng::seed_from_u64(seed),
            remaining: n_jets,
            jet_pt: Normal::new(120.0, 25.0).map_err(distribution_error)?,
            multiplicity: Poisson::new(profile.multiplicity).map_err(distribution_error)?,
            spread: Normal::new(0.0, profile.width).map_err(distribution_error)?,
        })
    }

    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    /// Draws one jet regardless of the remaining count.
    pub fn generate(&mut self) -> JetRecord {
        let jet_pt = self.jet_pt.sample(&mut self.rng).max(30.0) as f32;
        let jet_eta = self.rng.gen_range(-2.0f32..2.0);
        let jet_phi = self.rng.gen_range(-PI..PI);
        let n_towers = (self.multiplicity.sample(&mut self.rng) as usize).max(1);

        // momentum shares: exponential draws sharpened by the hardness exponent
        let raw: Vec<f64> = (0..n_towers)
            .map(|_| {
                let e: f64 = Exp1.sample(&mut self.rng);
                e.powf(self.profile.hardness)
            })
            .collect();
        let total: f64 = raw.iter().sum();

        let mut jet = JetRecord {
            jet_pt,
            jet_eta,
            jet_phi,
            jet_mass: 0.0,
            ntracks: 0,
            ntowers: n_towers as u32,
            track_pt: Vec::new(),
            track_eta: Vec::new(),
            track_phi: Vec::new(),
            track_charge: Vec::new(),
            tower_e: Vec::with_capacity(n_towers),
            tower_eem: Vec::with_capacity(n_towers),
            tower_ehad: Vec::with_capacity(n_towers),
            tower_eta: Vec::with_capacity(n_towers),
            tower_phi: Vec::with_capacity(n_towers),
        };

        let mut mass_sq = 0.0f64;
        for share in raw.iter().map(|r| r / total) {
            let d_eta = self.spread.sample(&mut self.rng);
            let d_phi = self.spread.sample(&mut self.rng);
            let pt = share * jet_pt as f64;
            let eta = jet_eta + d_eta as f32;
            let phi = wrap_phi(jet_phi + d_phi as f32);
            mass_sq += pt * (d_eta * d_eta + d_phi * d_phi);

            let energy = (pt * (eta as f64).cosh()) as f32;
            let em = self.rng.gen_range(0.1f32..0.6);
            jet.tower_e.push(energy);
            jet.tower_eem.push(energy * em);
            jet.tower_ehad.push(energy * (1.0 - em));
            jet.tower_eta.push(eta);
            jet.tower_phi.push(phi);

            if self.rng.gen_bool(self.profile.charged_fraction) {
                jet.track_pt.push(pt as f32);
                jet.track_eta.push(eta);
                jet.track_phi.push(phi);
                jet.track_charge.push(if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 });
            }
        }
        jet.ntracks = jet.track_pt.len() as u32;
        jet.jet_mass = (mass_sq * jet_pt as f64).sqrt() as f32;
        jet
    }
}

fn wrap_phi(phi: f32) -> f32 {
    if phi > PI {
        phi - 2.0 * PI
    } else if phi < -PI {
        phi + 2.0 * PI
    } else {
        phi
    }
}

impl JetSource for SyntheticJets {
    fn next_jet(&mut self) -> Result<Option<JetRecord>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(self.generate()))
    }
}

/// Writes `<dir>/<kind>.jsonl` with `n_jets` jets for every sample kind.
///
/// Each kind gets its own seed derived from `seed`.
pub fn write_samples(dir: &Path, n_jets: usize, seed: u64) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(SampleKind::ALL.len());
    for (i, kind) in SampleKind::ALL.into_iter().enumerate() {
        let jets = SyntheticJets::new(kind, n_jets, seed.wrapping_add(i as u64))?.read_all()?;
        let path = dir.join(format!("{}.jsonl", kind.name()));
        write_json_lines(&path, &jets)?;
        info!(jets = jets.len(), "Write {}", path.display());
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JsonLinesSource;

    fn mean_towers(kind: SampleKind) -> f64 {
        let jets = SyntheticJets::new(kind, 400, 11).unwrap().read_all().unwrap();
        jets.iter().map(|j| j.n_towers() as f64).sum::<f64>() / jets.len() as f64
    }

    #[test]
    fn test_jets_are_consistent() {
        let jets = SyntheticJets::new(SampleKind::GLUONS_MODIFIED, 50, 1)
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(jets.len(), 50);
        for jet in &jets {
            jet.validate().unwrap();
            assert_eq!(jet.ntracks as usize, jet.n_tracks());
            assert_eq!(jet.ntowers as usize, jet.n_towers());
            assert!(jet.jet_pt >= 30.0);
            assert!(jet.tower_phi.iter().all(|p| p.abs() <= PI));
            let tracks: f32 = jet.track_pt.iter().sum();
            assert!(tracks <= jet.jet_pt * 1.001);
        }
    }

    #[test]
    fn test_seed_reproducible() {
        let a = SyntheticJets::new(SampleKind::QUARKS_STANDARD, 5, 9)
            .unwrap()
            .read_all()
            .unwrap();
        let b = SyntheticJets::new(SampleKind::QUARKS_STANDARD, 5, 9)
            .unwrap()
            .read_all()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_gluons_and_modified_have_more_constituents() {
        let quarks = mean_towers(SampleKind::QUARKS_STANDARD);
        let gluons = mean_towers(SampleKind::GLUONS_STANDARD);
        let quarks_mod = mean_towers(SampleKind::QUARKS_MODIFIED);
        assert!(gluons > quarks + 5.0, "{gluons} vs {quarks}");
        assert!(quarks_mod > quarks, "{quarks_mod} vs {quarks}");
    }

    #[test]
    fn test_write_samples_readable() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = write_samples(tmp.path(), 3, 0).unwrap();
        assert_eq!(paths.len(), 4);
        let mut source = JsonLinesSource::from_dir(tmp.path()).unwrap();
        assert_eq!(source.read_all().unwrap().len(), 12);
    }

    #[test]
    fn test_wrap_phi() {
        assert!((wrap_phi(PI + 0.5) - (-PI + 0.5)).abs() < 1e-6);
        assert!((wrap_phi(-PI - 0.5) - (PI - 0.5)).abs() < 1e-6);
        assert_eq!(wrap_phi(1.0), 1.0);
    }
}
