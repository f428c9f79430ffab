use super::astar::{AStar, GuideOracle, SearchParams, SearchRequest};
use super::cost::CostModel;
use crate::grid::RoutingGrid;
use pcb_common::geom::coord::GridCoord;

/// What the host can run searches on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub cpu: bool,
    pub threads: usize,
    pub gpu: bool,
}

/// Never fails: the scalar CPU search is always there.
pub fn detect_capabilities() -> BackendCapabilities {
    BackendCapabilities {
        cpu: true,
        threads: rayon::current_num_threads().max(1),
        gpu: false,
    }
}

/// A grid pathfinder. Every implementation must return the same paths as
/// [`AStar`] for the same inputs.
pub trait PathfindingBackend: Send {
    fn name(&self) -> &'static str;

    fn find_path<G: RoutingGrid + ?Sized, C: CostModel, O: GuideOracle>(
        &mut self,
        grid: &G,
        req: &SearchRequest,
        cost: &C,
        oracle: &O,
        params: &SearchParams,
    ) -> Option<Vec<GridCoord>>;
}

impl PathfindingBackend for AStar {
    fn name(&self) -> &'static str {
        "cpu-astar"
    }

    fn find_path<G: RoutingGrid + ?Sized, C: CostModel, O: GuideOracle>(
        &mut self,
        grid: &G,
        req: &SearchRequest,
        cost: &C,
        oracle: &O,
        params: &SearchParams,
    ) -> Option<Vec<GridCoord>> {
        AStar::find_path(self, grid, req, cost, oracle, params)
    }
}

/// Pick the search backend. High-performance mode only changes how much of
/// the run is parallel; the search itself is the scalar A* on every host.
pub fn select_backend(high_performance: bool) -> AStar {
    let caps = detect_capabilities();
    if high_performance {
        log::info!(
            "High-performance mode: {} threads, gpu {}",
            caps.threads,
            if caps.gpu { "available" } else { "unavailable" }
        );
    }
    let backend = AStar::new();
    log::debug!("Pathfinding backend: {}", backend.name());
    backend
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_always_have_cpu() {
        let caps = detect_capabilities();
        assert!(caps.cpu);
        assert!(caps.threads >= 1);
        assert_eq!(select_backend(true).name(), "cpu-astar");
    }
}
