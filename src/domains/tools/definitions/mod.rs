//! Tool definitions module.
//!
//! One file per tool, plus helpers shared by the SQL-backed tools.

mod common;
pub mod hex_metrics;
pub mod hex_species_context;
pub mod neighbor_hexes;
pub mod neighbor_summary;
pub mod osm_context;
pub mod species_profiles;
pub mod threatened_species;

pub use hex_metrics::{HexMetricsArgs, HexMetricsTool};
pub use hex_species_context::{HexSpeciesContextArgs, HexSpeciesContextTool};
pub use neighbor_hexes::{NeighborHexesArgs, NeighborHexesTool, neighbor_set, neighbor_set_id};
pub use neighbor_summary::{NeighborSummaryArgs, NeighborSummaryTool};
pub use osm_context::{OsmContextArgs, OsmContextTool};
pub use species_profiles::{SpeciesProfilesArgs, SpeciesProfilesTool};
pub use threatened_species::{ThreatenedSpeciesArgs, ThreatenedSpeciesTool};
