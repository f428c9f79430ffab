use crate::grid::{RoutingGrid, ViaSite};
use pcb_common::db::indices::NetId;

/// Cost of one orthogonal grid step; everything else is scaled to it.
pub const STEP_COST: u32 = 100;
pub const DIAGONAL_COST: u32 = 141;

/// Per-cell pricing used by the pathfinder. `None` means the move is illegal.
pub trait CostModel: Sync {
    fn cell_cost<G: RoutingGrid + ?Sized>(&self, grid: &G, idx: usize, net: NetId) -> Option<u32>;
    fn via_cost<G: RoutingGrid + ?Sized>(&self, grid: &G, site: ViaSite, net: NetId) -> Option<u32>;
}

/// Design rules as hard constraints against everything committed.
#[derive(Clone, Copy, Debug, Default)]
pub struct HardCost;

impl CostModel for HardCost {
    fn cell_cost<G: RoutingGrid + ?Sized>(&self, grid: &G, idx: usize, net: NetId) -> Option<u32> {
        grid.is_free(idx, net).then_some(0)
    }

    fn via_cost<G: RoutingGrid + ?Sized>(&self, grid: &G, site: ViaSite, net: NetId) -> Option<u32> {
        grid.via_allowed(site, net).then_some(0)
    }
}

/// Negotiated congestion pricing: fixed obstacles stay hard, other nets'
/// copper costs `present` steps per overlapping net plus the cell history.
#[derive(Clone, Copy, Debug)]
pub struct NegotiatedCost {
    pub present: f64,
}

impl NegotiatedCost {
    fn price(&self, sharing: u32, history: f32) -> u32 {
        let steps = sharing as f64 * self.present + history as f64;
        (steps * STEP_COST as f64).round().min(u32::MAX as f64 / 4.0) as u32
    }
}

impl CostModel for NegotiatedCost {
    fn cell_cost<G: RoutingGrid + ?Sized>(&self, grid: &G, idx: usize, net: NetId) -> Option<u32> {
        if !grid.is_passable(idx, net) {
            return None;
        }
        Some(self.price(grid.foreign_claims(idx, net), grid.history(idx)))
    }

    fn via_cost<G: RoutingGrid + ?Sized>(&self, grid: &G, site: ViaSite, net: NetId) -> Option<u32> {
        if !grid.via_passable(site, net) {
            return None;
        }
        Some(self.price(grid.foreign_via_pressure(site, net), 0.0))
    }
}
