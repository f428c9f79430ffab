pub mod dense;

pub use dense::{DenseGrid, Footprint, GridRules, Keepout, ViaSite};

use pcb_common::db::indices::NetId;
use pcb_common::geom::coord::GridCoord;
use pcb_common::geom::rect::Rect;

/// Occupancy queries the pathfinder and cost models need. Cells are addressed
/// by flat index `z * w * h + y * w + x`.
pub trait RoutingGrid: Sync + Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn layers(&self) -> u8;

    fn index(&self, coord: GridCoord) -> usize;
    fn coord(&self, idx: usize) -> GridCoord;

    /// Keep traces of every net away from `region` on layer `z`.
    fn mark_obstacle(&mut self, region: &Rect, z: u8);

    /// Hard rule: a trace of `net` centred here keeps clearance to everything
    /// committed so far.
    fn is_free(&self, idx: usize, net: NetId) -> bool;
    /// Hard rule for a via of `net` at `site`.
    fn via_allowed(&self, site: ViaSite, net: NetId) -> bool;

    /// Soft rules: only fixed obstacles count; other nets' copper is a cost.
    fn is_passable(&self, idx: usize, net: NetId) -> bool;
    fn via_passable(&self, site: ViaSite, net: NetId) -> bool;
    fn foreign_claims(&self, idx: usize, net: NetId) -> u32;
    fn foreign_via_pressure(&self, site: ViaSite, net: NetId) -> u32;
    fn history(&self, idx: usize) -> f32;
}
