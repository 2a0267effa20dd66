use super::TableTransform;
use crate::error::{QgError, Result};
use crate::flatten::{slot_name, FlattenLayout};
use crate::table::JetTable;

struct TrackSlot {
    pt: usize,
    eta: usize,
    phi: usize,
}

struct TowerSlot {
    e: usize,
    eem: usize,
    ehad: usize,
    eta: usize,
}

/// Expresses flattened constituents relative to their jet.
///
/// Applied to every slot, padding included: `trackPt`, `towerE`,
/// `towerEem`, `towerEhad` are divided by `jetPt`; `trackEta` and
/// `towerEta` have `jetEta` subtracted; `trackPhi` has `jetPhi` subtracted.
/// `towerPhi` is left absolute and no φ wrapping is done, so padded angle
/// slots end up at `-jetEta` / `-jetPhi`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeCoordinates {
    layout: FlattenLayout,
}

impl RelativeCoordinates {
    pub fn new(layout: FlattenLayout) -> Self {
        Self { layout }
    }

    fn track_slots(&self, table: &JetTable) -> Result<Vec<TrackSlot>> {
        (0..self.layout.max_tracks)
            .map(|i| {
                Ok(TrackSlot {
                    pt: table.column_index(&slot_name("trackPt", i))?,
                    eta: table.column_index(&slot_name("trackEta", i))?,
                    phi: table.column_index(&slot_name("trackPhi", i))?,
                })
            })
            .collect()
    }

    fn tower_slots(&self, table: &JetTable) -> Result<Vec<TowerSlot>> {
        (0..self.layout.max_towers)
            .map(|i| {
                Ok(TowerSlot {
                    e: table.column_index(&slot_name("towerE", i))?,
                    eem: table.column_index(&slot_name("towerEem", i))?,
                    ehad: table.column_index(&slot_name("towerEhad", i))?,
                    eta: table.column_index(&slot_name("towerEta", i))?,
                })
            })
            .collect()
    }
}

impl TableTransform for RelativeCoordinates {
    fn transform(&self, table: &JetTable) -> Result<JetTable> {
        let jet_pt = table.column_index("jetPt")?;
        let jet_eta = table.column_index("jetEta")?;
        let jet_phi = table.column_index("jetPhi")?;
        let tracks = self.track_slots(table)?;
        let towers = self.tower_slots(table)?;

        let mut out = table.clone();
        for r in 0..out.n_rows() {
            let row = out.row_mut(r);
            let (pt, eta, phi) = (row[jet_pt], row[jet_eta], row[jet_phi]);
            if pt == 0.0 {
                return Err(QgError::Numerical(format!("row {r} has jetPt == 0")));
            }
            for s in &tracks {
                row[s.pt] /= pt;
                row[s.eta] -= eta;
                row[s.phi] -= phi;
            }
            for s in &towers {
                row[s.e] /= pt;
                row[s.eem] /= pt;
                row[s.ehad] /= pt;
                row[s.eta] -= eta;
            }
        }
        Ok(out)
    }
}
