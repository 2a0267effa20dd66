//! Jet-shape observables.
//!
//! Five per-jet quantities used as a low-dimensional alternative to the
//! flattened constituents: mass, tower multiplicity, radial moment, pT
//! dispersion and leading-minus-subleading track pT.

use crate::error::{QgError, Result};
use crate::jet::JetRecord;
use crate::table::JetTable;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;
use tracing::{info, warn};

pub const SHAPE_COLUMNS: [&str; 5] = ["mass", "ntowers", "radial", "dispersion", "le_sub"];

/// Tracks beyond this pseudorapidity are detector artefacts and ignored.
const MAX_TRACK_ETA: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JetShapes {
    pub mass: f32,
    pub ntowers: f32,
    /// `Σ pT_i / jetPt · ΔR_i`
    pub radial: f32,
    /// `sqrt(Σ pT_i²) / Σ pT_i`, 0 for jets without usable tracks.
    pub dispersion: f32,
    /// Leading minus subleading track pT, 1 for fewer than two tracks.
    pub le_sub: f32,
}

/// Azimuthal separation folded into `[0, π]`.
pub fn delta_phi(a: f32, b: f32) -> f32 {
    let d = (a - b).abs();
    d.min(2.0 * PI - d)
}

impl JetShapes {
    pub fn compute(jet: &JetRecord) -> Result<Self> {
        jet.validate()?;
        if jet.jet_pt == 0.0 {
            return Err(QgError::Numerical("jet shapes need jetPt != 0".into()));
        }

        let mut leading = f32::NEG_INFINITY;
        let mut subleading = f32::NEG_INFINITY;
        let (mut sum, mut sum_sq, mut radial) = (0.0f32, 0.0f32, 0.0f32);
        let mut n = 0usize;

        for i in 0..jet.n_tracks() {
            let (pt, eta, phi) = (jet.track_pt[i], jet.track_eta[i], jet.track_phi[i]);
            if eta.abs() > MAX_TRACK_ETA {
                continue;
            }
            if pt > leading {
                subleading = leading;
                leading = pt;
            } else if pt > subleading {
                subleading = pt;
            }
            let dphi = delta_phi(jet.jet_phi, phi);
            let deta = jet.jet_eta - eta;
            radial += pt / jet.jet_pt * (dphi * dphi + deta * deta).sqrt();
            sum += pt;
            sum_sq += pt * pt;
            n += 1;
        }

        Ok(Self {
            mass: jet.jet_mass,
            ntowers: jet.ntowers as f32,
            radial,
            dispersion: if sum != 0.0 { sum_sq.sqrt() / sum } else { 0.0 },
            le_sub: if n > 1 { leading - subleading } else { 1.0 },
        })
    }

    pub fn to_row(self) -> [f32; 5] {
        [self.mass, self.ntowers, self.radial, self.dispersion, self.le_sub]
    }
}

/// Builds a table with [`SHAPE_COLUMNS`] from raw jets.
pub fn shape_table(jets: &[JetRecord]) -> Result<JetTable> {
    let mut data = Vec::with_capacity(jets.len() * SHAPE_COLUMNS.len());
    for jet in jets {
        data.extend_from_slice(&JetShapes::compute(jet)?.to_row());
    }
    JetTable::from_rows(SHAPE_COLUMNS.iter().map(|c| c.to_string()).collect(), data)
}

/// Returns the cached shape table at `cache` or computes it from the jets
/// returned by `jets`.
pub fn load_or_compute<F>(cache: &Path, recompute: bool, jets: F) -> Result<JetTable>
where
    F: FnOnce() -> Result<Vec<JetRecord>>,
{
    if !recompute && cache.exists() {
        match JetTable::load(cache) {
            Ok(table) => {
                info!("Loading from cache {}", cache.display());
                return Ok(table);
            }
            Err(e) => warn!("cache {} unreadable ({e}), recomputing", cache.display()),
        }
    }
    let table = shape_table(&jets()?)?;
    info!(jets = table.n_rows(), "Save {}", cache.display());
    table.save(cache)?;
    Ok(table)
}
