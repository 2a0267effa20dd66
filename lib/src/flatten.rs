//! Fixed-width flattening of jets.
//!
//! Each jet's tracks are ordered by descending `trackPt` and its towers by
//! descending `towerE`; the ordered values fill `max_tracks` / `max_towers`
//! slots per variable. Jets with fewer constituents are zero-padded, jets
//! with more are truncated.

use crate::error::Result;
use crate::jet::JetRecord;
use crate::table::JetTable;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Jet-level variables, copied unchanged in front of the slot columns.
pub const JET_VARIABLES: [&str; 6] = ["jetPt", "jetEta", "jetPhi", "jetMass", "ntracks", "ntowers"];

/// Per-track variables, in column-block order.
pub const TRACK_VARIABLES: [&str; 4] = ["trackPt", "trackEta", "trackPhi", "trackCharge"];

/// Per-tower variables, in column-block order.
pub const TOWER_VARIABLES: [&str; 5] = ["towerE", "towerEem", "towerEhad", "towerEta", "towerPhi"];

/// Number of slots reserved for tracks and towers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenLayout {
    pub max_tracks: usize,
    pub max_towers: usize,
}

impl Default for FlattenLayout {
    fn default() -> Self {
        Self {
            max_tracks: 52,
            max_towers: 67,
        }
    }
}

impl FlattenLayout {
    /// Total number of feature columns a flattened table carries.
    pub fn n_features(&self) -> usize {
        JET_VARIABLES.len()
            + TRACK_VARIABLES.len() * self.max_tracks
            + TOWER_VARIABLES.len() * self.max_towers
    }

    /// Index of the first slot column of a track or tower variable.
    pub fn block_start(&self, variable: &str) -> Option<usize> {
        let jets = JET_VARIABLES.len();
        if let Some(k) = TRACK_VARIABLES.iter().position(|v| *v == variable) {
            return Some(jets + k * self.max_tracks);
        }
        TOWER_VARIABLES.iter().position(|v| *v == variable).map(|k| {
            jets + TRACK_VARIABLES.len() * self.max_tracks + k * self.max_towers
        })
    }
}

/// Column name of slot `i` of a per-constituent variable, e.g. `trackPt_0`.
pub fn slot_name(variable: &str, i: usize) -> String {
    format!("{variable}_{i}")
}

/// The full variable list of a flattened table, in storage order.
///
/// Jet variables first, then one block per track variable (all slots of
/// `trackPt`, then all slots of `trackEta`, ...), then the tower blocks.
pub fn feature_names(layout: &FlattenLayout) -> Vec<String> {
    let mut names: Vec<String> = JET_VARIABLES.iter().map(|s| s.to_string()).collect();
    for v in TRACK_VARIABLES {
        names.extend((0..layout.max_tracks).map(|i| slot_name(v, i)));
    }
    for v in TOWER_VARIABLES {
        names.extend((0..layout.max_towers).map(|i| slot_name(v, i)));
    }
    names
}

/// Indices that order `values` descending. Ties keep their input order.
pub fn argsort_descending(values: &[f32]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    idx
}

#[derive(Debug, Clone, Default)]
pub struct Flattener {
    layout: FlattenLayout,
}

impl Flattener {
    pub fn new(layout: FlattenLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &FlattenLayout {
        &self.layout
    }

    /// Appends the flattened row of `jet` to `out`.
    pub fn flatten_jet(&self, jet: &JetRecord, out: &mut Vec<f32>) {
        out.extend_from_slice(&[
            jet.jet_pt,
            jet.jet_eta,
            jet.jet_phi,
            jet.jet_mass,
            jet.ntracks as f32,
            jet.ntowers as f32,
        ]);

        let track_order = argsort_descending(&jet.track_pt);
        for values in [&jet.track_pt, &jet.track_eta, &jet.track_phi, &jet.track_charge] {
            fill_slots(out, values, &track_order, self.layout.max_tracks);
        }

        let tower_order = argsort_descending(&jet.tower_e);
        for values in [
            &jet.tower_e,
            &jet.tower_eem,
            &jet.tower_ehad,
            &jet.tower_eta,
            &jet.tower_phi,
        ] {
            fill_slots(out, values, &tower_order, self.layout.max_towers);
        }
    }

    /// Flattens all jets into a table with [`feature_names`] as columns.
    pub fn flatten(&self, jets: &[JetRecord]) -> Result<JetTable> {
        let width = self.layout.n_features();
        let mut data = Vec::with_capacity(jets.len() * width);
        let mut truncated = 0usize;
        for jet in jets {
            jet.validate()?;
            if jet.n_tracks() > self.layout.max_tracks || jet.n_towers() > self.layout.max_towers {
                truncated += 1;
            }
            self.flatten_jet(jet, &mut data);
        }
        if truncated > 0 {
            debug!(truncated, "jets exceeded the slot count and were truncated");
        }
        JetTable::from_rows(feature_names(&self.layout), data)
    }
}

fn fill_slots(out: &mut Vec<f32>, values: &[f32], order: &[usize], slots: usize) {
    let filled = order.len().min(slots);
    out.extend(order[..filled].iter().map(|&i| values[i]));
    out.extend(std::iter::repeat(0.0).take(slots - filled));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jet::tests::jet;

    #[test]
    fn test_feature_names_layout() {
        let layout = FlattenLayout::default();
        let names = feature_names(&layout);
        assert_eq!(names.len(), 6 + 4 * 52 + 5 * 67);
        assert_eq!(names.len(), layout.n_features());
        assert_eq!(names[6], "trackPt_0");
        assert_eq!(names[6 + 51], "trackPt_51");
        assert_eq!(names[6 + 52], "trackEta_0");
        assert_eq!(names[6 + 4 * 52], "towerE_0");
        assert_eq!(names.last().map(String::as_str), Some("towerPhi_66"));
        assert_eq!(layout.block_start("towerEem"), Some(6 + 4 * 52 + 67));
        assert_eq!(layout.block_start("jetPt"), None);
    }

    #[test]
    fn test_argsort_descending_stable() {
        assert_eq!(argsort_descending(&[1.0, 3.0, 2.0, 3.0]), vec![1, 3, 2, 0]);
        assert!(argsort_descending(&[]).is_empty());
    }

    #[test]
    fn test_tracks_sorted_and_zero_padded() {
        let layout = FlattenLayout::default();
        let table = Flattener::new(layout)
            .flatten(&[jet(&[2.0, 7.0, 4.0], &[1.0, 9.0])])
            .unwrap();
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.n_columns(), layout.n_features());

        let pts: Vec<f32> = (0..52)
            .map(|i| table.column(&slot_name("trackPt", i)).unwrap()[0])
            .collect();
        assert_eq!(&pts[..3], &[7.0, 4.0, 2.0]);
        assert!(pts[3..].iter().all(|&v| v == 0.0));
        assert!(pts.windows(2).all(|w| w[0] >= w[1]));

        // companions follow the pT order
        let charge0 = table.column("trackCharge_0").unwrap()[0];
        assert_eq!(charge0, -1.0);
        assert_eq!(table.column("towerE_0").unwrap()[0], 9.0);
        assert_eq!(table.column("towerEem_0").unwrap()[0], 9.0 * 0.25);
        assert_eq!(table.column("towerE_2").unwrap()[0], 0.0);
        assert_eq!(table.column("jetMass").unwrap()[0], 12.0);
        assert_eq!(table.column("ntracks").unwrap()[0], 3.0);
    }

    #[test]
    fn test_truncates_beyond_slot_count() {
        let layout = FlattenLayout {
            max_tracks: 2,
            max_towers: 1,
        };
        let table = Flattener::new(layout)
            .flatten(&[jet(&[1.0, 5.0, 3.0], &[2.0, 4.0])])
            .unwrap();
        assert_eq!(table.n_columns(), 6 + 4 * 2 + 5);
        assert_eq!(table.column("trackPt_0").unwrap(), vec![5.0]);
        assert_eq!(table.column("trackPt_1").unwrap(), vec![3.0]);
        assert_eq!(table.column("towerE_0").unwrap(), vec![4.0]);
        assert!(table.column("trackPt_2").is_err());
    }

    #[test]
    fn test_jet_without_constituents() {
        let table = Flattener::default().flatten(&[jet(&[], &[])]).unwrap();
        let row = table.row(0);
        assert!(row[6..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_inconsistent_jet_rejected() {
        let mut bad = jet(&[1.0], &[1.0]);
        bad.track_charge.clear();
        assert!(Flattener::default().flatten(&[bad]).is_err());
    }
}
