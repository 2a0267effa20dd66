//! Table-level preprocessing.
//!
//! - [`RelativeCoordinates`]: expresses constituents relative to the jet axis
//!   and momentum scale.
//! - [`shapes`]: classic jet-shape observables computed from raw records.

pub mod relative;
pub mod shapes;

pub use relative::RelativeCoordinates;
pub use shapes::{JetShapes, SHAPE_COLUMNS};

use crate::error::Result;
use crate::table::JetTable;

/// A deterministic table-to-table transformation.
///
/// Transforms hold no learned state, so the same instance applies to
/// training and evaluation tables alike.
pub trait TableTransform {
    fn transform(&self, table: &JetTable) -> Result<JetTable>;
}

/// Applies no transformation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl TableTransform for Identity {
    fn transform(&self, table: &JetTable) -> Result<JetTable> {
        Ok(table.clone())
    }
}
