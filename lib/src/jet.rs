//! Jet records as produced by the detector simulation, and the sample
//! labels (flavour, simulation variant) attached to them.

use crate::error::{QgError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One reconstructed jet with its variable-length track and tower lists.
///
/// Field names serialize with the branch names of the simulation output
/// (`jetPt`, `trackPt`, `towerEem`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JetRecord {
    pub jet_pt: f32,
    pub jet_eta: f32,
    pub jet_phi: f32,
    pub jet_mass: f32,
    pub ntracks: u32,
    pub ntowers: u32,
    #[serde(default)]
    pub track_pt: Vec<f32>,
    #[serde(default)]
    pub track_eta: Vec<f32>,
    #[serde(default)]
    pub track_phi: Vec<f32>,
    #[serde(default)]
    pub track_charge: Vec<f32>,
    #[serde(default)]
    pub tower_e: Vec<f32>,
    #[serde(default)]
    pub tower_eem: Vec<f32>,
    #[serde(default)]
    pub tower_ehad: Vec<f32>,
    #[serde(default)]
    pub tower_eta: Vec<f32>,
    #[serde(default)]
    pub tower_phi: Vec<f32>,
}

impl JetRecord {
    /// Number of tracks actually stored in the record.
    pub fn n_tracks(&self) -> usize {
        self.track_pt.len()
    }

    /// Number of towers actually stored in the record.
    pub fn n_towers(&self) -> usize {
        self.tower_e.len()
    }

    /// Checks that all track arrays and all tower arrays have matching lengths.
    pub fn validate(&self) -> Result<()> {
        let tracks = self.n_tracks();
        for (branch, values) in [
            ("trackEta", &self.track_eta),
            ("trackPhi", &self.track_phi),
            ("trackCharge", &self.track_charge),
        ] {
            if values.len() != tracks {
                return Err(QgError::InconsistentRecord {
                    branch,
                    expected: tracks,
                    got: values.len(),
                });
            }
        }

        let towers = self.n_towers();
        for (branch, values) in [
            ("towerEem", &self.tower_eem),
            ("towerEhad", &self.tower_ehad),
            ("towerEta", &self.tower_eta),
            ("towerPhi", &self.tower_phi),
        ] {
            if values.len() != towers {
                return Err(QgError::InconsistentRecord {
                    branch,
                    expected: towers,
                    got: values.len(),
                });
            }
        }
        Ok(())
    }
}

/// Parton that initiated the jet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flavour {
    Quark,
    Gluon,
}

/// Simulation configuration the jet was generated with.
///
/// `Modified` plays the role of "data" for the boost stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Simulation {
    Standard,
    Modified,
}

/// One of the four input samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleKind {
    pub flavour: Flavour,
    pub simulation: Simulation,
}

impl SampleKind {
    pub const QUARKS_STANDARD: Self = Self::new(Flavour::Quark, Simulation::Standard);
    pub const QUARKS_MODIFIED: Self = Self::new(Flavour::Quark, Simulation::Modified);
    pub const GLUONS_STANDARD: Self = Self::new(Flavour::Gluon, Simulation::Standard);
    pub const GLUONS_MODIFIED: Self = Self::new(Flavour::Gluon, Simulation::Modified);

    pub const ALL: [Self; 4] = [
        Self::GLUONS_MODIFIED,
        Self::GLUONS_STANDARD,
        Self::QUARKS_MODIFIED,
        Self::QUARKS_STANDARD,
    ];

    pub const fn new(flavour: Flavour, simulation: Simulation) -> Self {
        Self {
            flavour,
            simulation,
        }
    }

    /// File stem used for every artefact of this sample, e.g. `quarks_standard`.
    pub fn name(&self) -> &'static str {
        match (self.flavour, self.simulation) {
            (Flavour::Quark, Simulation::Standard) => "quarks_standard",
            (Flavour::Quark, Simulation::Modified) => "quarks_modified",
            (Flavour::Gluon, Simulation::Standard) => "gluons_standard",
            (Flavour::Gluon, Simulation::Modified) => "gluons_modified",
        }
    }

    pub fn is_quark(&self) -> bool {
        self.flavour == Flavour::Quark
    }

    pub fn is_modified(&self) -> bool {
        self.simulation == Simulation::Modified
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn jet(track_pt: &[f32], tower_e: &[f32]) -> JetRecord {
        let nt = track_pt.len();
        let nw = tower_e.len();
        JetRecord {
            jet_pt: 100.0,
            jet_eta: 0.5,
            jet_phi: 1.0,
            jet_mass: 12.0,
            ntracks: nt as u32,
            ntowers: nw as u32,
            track_pt: track_pt.to_vec(),
            track_eta: (0..nt).map(|i| 0.5 + 0.01 * i as f32).collect(),
            track_phi: (0..nt).map(|i| 1.0 - 0.01 * i as f32).collect(),
            track_charge: (0..nt).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect(),
            tower_e: tower_e.to_vec(),
            tower_eem: tower_e.iter().map(|e| e * 0.25).collect(),
            tower_ehad: tower_e.iter().map(|e| e * 0.75).collect(),
            tower_eta: (0..nw).map(|i| 0.5 + 0.02 * i as f32).collect(),
            tower_phi: (0..nw).map(|i| 1.0 + 0.02 * i as f32).collect(),
        }
    }

    #[test]
    fn test_validate_accepts_consistent_record() {
        assert!(jet(&[3.0, 1.0], &[5.0]).validate().is_ok());
    }

    #[test]
    fn test_validate_names_offending_branch() {
        let mut j = jet(&[3.0, 1.0], &[5.0]);
        j.tower_eta.push(0.1);
        match j.validate() {
            Err(QgError::InconsistentRecord {
                branch,
                expected,
                got,
            }) => {
                assert_eq!(branch, "towerEta");
                assert_eq!(expected, 1);
                assert_eq!(got, 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_record_uses_branch_names() {
        let line = r#"{"jetPt": 50.0, "jetEta": 0.1, "jetPhi": -1.0, "jetMass": 5.0,
            "ntracks": 1, "ntowers": 0, "trackPt": [4.0], "trackEta": [0.1],
            "trackPhi": [-1.0], "trackCharge": [1.0]}"#;
        let j: JetRecord = serde_json::from_str(line).unwrap();
        assert_eq!(j.jet_pt, 50.0);
        assert_eq!(j.track_pt, vec![4.0]);
        assert!(j.tower_e.is_empty());
        assert!(j.validate().is_ok());
    }

    #[test]
    fn test_sample_names() {
        assert_eq!(SampleKind::QUARKS_STANDARD.name(), "quarks_standard");
        assert_eq!(SampleKind::GLUONS_MODIFIED.to_string(), "gluons_modified");
        assert!(SampleKind::QUARKS_MODIFIED.is_quark());
        assert!(SampleKind::QUARKS_MODIFIED.is_modified());
        assert!(!SampleKind::GLUONS_STANDARD.is_modified());
    }
}
