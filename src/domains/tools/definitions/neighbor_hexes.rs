//! k-ring neighbors of a cell. Pure computation, no database access.

use async_trait::async_trait;
use h3o::CellIndex;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use super::common::cell_id;
use crate::domains::tools::arguments::Arguments;
use crate::domains::tools::error::ToolError;
use crate::domains::tools::handlers::{BioTool, ToolContext};
use crate::domains::tools::registry::ToolKind;
use crate::domains::tools::validation::{
    to_resolution, validate_h3_id, validate_k_ring, validate_resolution,
};

/// Parameters for the neighbor hexes tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NeighborHexesArgs {
    /// H3 cell id (8-15 hex characters).
    pub h3_id: String,

    /// H3 resolution, 6 to 9. Defaults to 7. A finer cell is replaced by its parent.
    pub h3_res: Option<u8>,

    /// Ring size, 1 to 3. Defaults to 1.
    pub k_ring: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborHexesParams {
    pub cell: CellIndex,
    pub res: u8,
    pub k: u32,
}

/// The neighbor set of a center cell.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborSet {
    pub center: CellIndex,
    pub neighbors: Vec<String>,
    pub set_id: String,
}

/// First 16 hex chars of SHA-256 over `"{cell}:{res}:{k}"`.
pub fn neighbor_set_id(center: &str, res: u8, k: u32) -> String {
    let digest = Sha256::digest(format!("{}:{}:{}", center, res, k).as_bytes());
    let mut id = hex::encode(digest);
    id.truncate(16);
    id
}

/// Compute the sorted k-ring around `cell`, excluding the center.
///
/// If the cell is not at `res` it is replaced by its parent at `res`;
/// when no such parent exists (the cell is coarser) it is kept as is.
pub fn neighbor_set(cell: CellIndex, res: u8, k: u32) -> Result<NeighborSet, ToolError> {
    let target = to_resolution(res)?;
    let center = if cell.resolution() != target {
        cell.parent(target).unwrap_or(cell)
    } else {
        cell
    };

    let mut neighbors: Vec<String> = center
        .grid_disk::<Vec<_>>(k)
        .into_iter()
        .filter(|c| *c != center)
        .map(cell_id)
        .collect();
    neighbors.sort();
    neighbors.dedup();

    let set_id = neighbor_set_id(&cell_id(center), res, k);
    Ok(NeighborSet {
        center,
        neighbors,
        set_id,
    })
}

/// Neighbor hexes tool.
pub struct NeighborHexesTool;

#[async_trait]
impl BioTool for NeighborHexesTool {
    const KIND: ToolKind = ToolKind::NeighborHexes;

    const DESCRIPTION: &'static str = "List the H3 cells within k rings (1-3) of a cell, sorted and excluding the center, with a stable neighbor_set_id for caching.";

    type Schema = NeighborHexesArgs;
    type Params = NeighborHexesParams;

    fn parse(args: &Arguments) -> Result<NeighborHexesParams, ToolError> {
        Ok(NeighborHexesParams {
            cell: validate_h3_id(args.get("h3_id"))?,
            res: validate_resolution(args.get("h3_res"))?,
            k: validate_k_ring(args.get("k_ring"))?,
        })
    }

    #[instrument(skip_all, fields(h3_id = %params.cell, k = params.k))]
    async fn execute(params: &NeighborHexesParams, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let set = neighbor_set(params.cell, params.res, params.k)?;
        debug!("{} neighbors around {}", set.neighbors.len(), set.center);

        Ok(json!({
            "h3_id": cell_id(set.center),
            "h3_resolution": params.res,
            "k_ring": params.k,
            "neighbor_count": set.neighbors.len(),
            "neighbor_h3_ids": set.neighbors,
            "neighbor_set_id": set.set_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CELL: &str = "8928308280fffff";

    #[test]
    fn test_k2_ring_is_sorted_unique_without_center() {
        let cell: CellIndex = CELL.parse().unwrap();
        let set = neighbor_set(cell, 9, 2).unwrap();

        assert_eq!(set.neighbors.len(), 18);
        assert!(!set.neighbors.contains(&CELL.to_string()));
        let mut sorted = set.neighbors.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, set.neighbors);
    }

    #[test]
    fn test_finer_cell_is_replaced_by_parent() {
        let cell: CellIndex = CELL.parse().unwrap();
        let set = neighbor_set(cell, 7, 1).unwrap();
        assert_eq!(u8::from(set.center.resolution()), 7);
        assert_eq!(set.neighbors.len(), 6);
    }

    #[test]
    fn test_coarser_cell_is_kept() {
        let cell: CellIndex = CELL.parse().unwrap();
        let coarse = cell.parent(h3o::Resolution::Six).unwrap();
        let set = neighbor_set(coarse, 8, 1).unwrap();
        assert_eq!(set.center, coarse);
    }

    #[test]
    fn test_set_id_is_deterministic() {
        let a = neighbor_set_id(CELL, 9, 2);
        let b = neighbor_set_id(CELL, 9, 2);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, neighbor_set_id(CELL, 9, 1));
    }
}
