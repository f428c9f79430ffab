//! Routing strategies. Each one takes the grid with fixed obstacles only and
//! leaves it holding the committed result.

pub mod basic;
pub mod congestion;
pub mod monte_carlo;
pub mod negotiated;

pub use congestion::ConvergenceState;

use crate::algo::{GuideOracle, NoGuide, PathfindingBackend, SearchParams, SearchRequest, select_backend};
use crate::algo::cost::CostModel;
use crate::corridor::CorridorPlanner;
use crate::error::RouterError;
use crate::grid::{DenseGrid, RoutingGrid, ViaSite};
use crate::route::{Route, Waypoint};
use pcb_common::db::indices::NetId;
use pcb_common::geom::coord::GridCoord;
use pcb_common::geom::point::Point;
use pcb_common::rules::NetRules;
use pcb_common::util::config::{Config, MonteCarloConfig, NegotiatedConfig};
use pcb_common::util::profiler::Deadline;
use std::collections::HashMap;

/// A pad as the router sees it: where copper ends and which cells reach it.
#[derive(Clone, Debug)]
pub struct PadTerminal {
    pub label: String,
    pub center: Point<f64>,
    pub cells: Vec<usize>,
    pub multilayer: bool,
}

/// A net to connect, with its resolved rules and routing priority.
#[derive(Clone, Debug)]
pub struct NetTask {
    pub net: NetId,
    pub name: String,
    pub priority: u32,
    pub rules: NetRules,
    pub pads: Vec<PadTerminal>,
}

#[derive(Clone, Debug, Default)]
pub struct RoutingContext {
    pub params: SearchParams,
    pub deadline: Deadline,
    /// Coarse region size for corridor-guided search, if enabled.
    pub corridor_cell_mm: Option<f64>,
    pub high_performance: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrialSummary {
    pub trial: usize,
    pub nets_routed: usize,
    pub vias: usize,
    pub length_mm: f64,
}

/// What a strategy produced. Unroutable nets are listed, never fatal.
#[derive(Debug, Default)]
pub struct RoutingResult {
    pub routes: Vec<Route>,
    pub unrouted: Vec<NetId>,
    pub failures: Vec<RouterError>,
    /// Contested cells left in the returned solution before legalisation.
    pub overflow: usize,
    pub iterations: usize,
    /// Overflow after each negotiated iteration.
    pub overflow_history: Vec<usize>,
    pub convergence: Option<ConvergenceState>,
    pub trials: Vec<TrialSummary>,
}

impl RoutingResult {
    pub fn nets_routed(&self) -> usize {
        self.routes.len()
    }

    pub fn via_count(&self) -> usize {
        self.routes.iter().map(|r| r.vias.len()).sum()
    }

    pub fn total_length(&self) -> f64 {
        self.routes.iter().map(|r| r.length()).sum()
    }
}

#[derive(Clone, Debug)]
pub enum Strategy {
    Basic,
    Negotiated(NegotiatedConfig),
    /// Randomised orderings; `negotiated` is used when trials run the
    /// negotiated strategy.
    MonteCarlo {
        trials: MonteCarloConfig,
        negotiated: NegotiatedConfig,
    },
}

impl Strategy {
    /// `basic`, `negotiated` or `monte_carlo` (also `monte-carlo`), with the
    /// matching config section.
    pub fn from_name(name: &str, config: &Config) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "basic" => Some(Strategy::Basic),
            "negotiated" => Some(Strategy::Negotiated(config.negotiated.clone())),
            "monte_carlo" | "monte-carlo" | "montecarlo" => {
                Some(Strategy::MonteCarlo {
                    trials: config.monte_carlo.clone(),
                    negotiated: config.negotiated.clone(),
                })
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Basic => "basic",
            Strategy::Negotiated(_) => "negotiated",
            Strategy::MonteCarlo { .. } => "monte_carlo",
        }
    }

    pub fn route(&self, grid: &mut DenseGrid, nets: &[NetTask], ctx: &RoutingContext) -> RoutingResult {
        let order = priority_order(nets);
        let mut backend = select_backend(ctx.high_performance);
        match self {
            Strategy::Basic => basic::route(grid, nets, &order, &mut backend, ctx),
            Strategy::Negotiated(cfg) => negotiated::route(grid, nets, &order, &mut backend, cfg, ctx),
            Strategy::MonteCarlo { trials, negotiated } => {
                monte_carlo::route(grid, nets, &order, trials, negotiated, ctx)
            }
        }
    }
}

/// Stable routing order: class priority, then net number.
pub fn priority_order(nets: &[NetTask]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..nets.len()).collect();
    order.sort_by_key(|&i| (nets[i].priority, nets[i].net));
    order
}

/// Grid cells and layer changes of one routed net, plus the branch paths
/// they came from.
#[derive(Clone, Debug, Default)]
pub(crate) struct NetPaths {
    pub cells: Vec<usize>,
    pub vias: Vec<ViaSite>,
    pub branches: Vec<Vec<GridCoord>>,
}

impl NetPaths {
    fn add_branch<G: RoutingGrid + ?Sized>(&mut self, grid: &G, path: Vec<GridCoord>) {
        self.cells.extend(path.iter().map(|&c| grid.index(c)));
        for w in path.windows(2) {
            if w[0].same_xy(&w[1]) && w[0].z != w[1].z {
                self.vias.push(ViaSite::new(w[0].x, w[0].y, w[0].z, w[1].z));
            }
        }
        self.branches.push(path);
    }
}

fn search<B: PathfindingBackend, C: CostModel, O: GuideOracle>(
    grid: &DenseGrid,
    backend: &mut B,
    req: &SearchRequest,
    cost: &C,
    oracle: &O,
    ctx: &RoutingContext,
) -> Option<Vec<GridCoord>> {
    backend.find_path(grid, req, cost, oracle, &ctx.params)
}

fn connect<B: PathfindingBackend, C: CostModel>(
    grid: &DenseGrid,
    backend: &mut B,
    net: NetId,
    sources: &[usize],
    targets: &[usize],
    cost: &C,
    ctx: &RoutingContext,
) -> Option<Vec<GridCoord>> {
    if let Some(cell_mm) = ctx.corridor_cell_mm
        && let Some(corridor) = CorridorPlanner::new(cell_mm).plan(grid, net, sources, targets, &ctx.params)
    {
        let strict = SearchRequest {
            net,
            sources,
            targets,
            strict_mode: true,
        };
        if let Some(path) = search(grid, backend, &strict, cost, &corridor, ctx) {
            return Some(path);
        }
        log::debug!("{:?}: corridor search failed, retrying unrestricted", net);
    }
    let req = SearchRequest {
        net,
        sources,
        targets,
        strict_mode: false,
    };
    search(grid, backend, &req, cost, &NoGuide, ctx)
}

/// Connect every pad of `task`: start from the first pad, then repeatedly
/// join the unconnected pad nearest to a connected one, searching from any
/// cell the net already covers.
pub(crate) fn route_net<B: PathfindingBackend, C: CostModel>(
    grid: &DenseGrid,
    backend: &mut B,
    task: &NetTask,
    cost: &C,
    ctx: &RoutingContext,
) -> Result<NetPaths, RouterError> {
    let mut paths = NetPaths::default();
    let Some(first) = task.pads.first() else {
        return Ok(paths);
    };
    let mut tree: Vec<usize> = first.cells.clone();
    let mut connected = vec![false; task.pads.len()];
    connected[0] = true;

    for _ in 1..task.pads.len() {
        let next = (0..task.pads.len())
            .filter(|&i| !connected[i])
            .min_by(|&a, &b| {
                let da = nearest_connected(task, &connected, a);
                let db = nearest_connected(task, &connected, b);
                da.total_cmp(&db).then(a.cmp(&b))
            });
        let Some(next) = next else {
            break;
        };
        let pad = &task.pads[next];
        let Some(path) = connect(grid, backend, task.net, &tree, &pad.cells, cost, ctx) else {
            return Err(RouterError::NoPathFound {
                net: task.name.clone(),
            });
        };
        tree.extend(path.iter().map(|&c| grid.index(c)));
        tree.extend_from_slice(&pad.cells);
        paths.add_branch(grid, path);
        connected[next] = true;
    }
    Ok(paths)
}

fn nearest_connected(task: &NetTask, connected: &[bool], pad: usize) -> f64 {
    task.pads
        .iter()
        .zip(connected)
        .filter(|(_, c)| **c)
        .map(|(p, _)| p.center.distance(task.pads[pad].center))
        .fold(f64::INFINITY, f64::min)
}

/// Board geometry for routed paths, with stubs from terminal cells to the pad
/// centres so the copper lands where the pad is.
pub(crate) fn build_route(grid: &DenseGrid, task: &NetTask, paths: &NetPaths) -> Route {
    let mut pad_of: HashMap<usize, usize> = HashMap::new();
    for (i, pad) in task.pads.iter().enumerate() {
        for &c in &pad.cells {
            pad_of.entry(c).or_insert(i);
        }
    }
    let rules = &task.rules;
    let mut route = Route::new(task.net, task.name.clone());
    route.terminals = task.pads.iter().map(|p| p.center).collect();
    route.through_pads = task
        .pads
        .iter()
        .filter(|p| p.multilayer)
        .map(|p| p.center)
        .collect();

    for branch in &paths.branches {
        let (Some(&head), Some(&tail)) = (branch.first(), branch.last()) else {
            continue;
        };
        let mut waypoints = Vec::with_capacity(branch.len() + 2);
        if let Some(&p) = pad_of.get(&grid.index(head)) {
            waypoints.push(Waypoint::new(task.pads[p].center, grid.stack().layer(head.z)));
        }
        waypoints.extend(
            branch
                .iter()
                .map(|c| Waypoint::new(grid.converter().to_world(*c), grid.stack().layer(c.z))),
        );
        if let Some(&p) = pad_of.get(&grid.index(tail)) {
            waypoints.push(Waypoint::new(task.pads[p].center, grid.stack().layer(tail.z)));
        }
        route.add_path(&waypoints, rules.trace_width, rules.via_drill, rules.via_diameter);
    }
    route.validate_layer_transitions(rules.via_drill, rules.via_diameter);
    route
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::grid::GridRules;
    use crate::utils::conversion::GridConverter;
    use pcb_common::db::layers::LayerStack;
    use pcb_common::geom::rect::Rect;

    pub fn rules() -> NetRules {
        NetRules {
            trace_width: 0.2,
            clearance: 0.2,
            via_drill: 0.3,
            via_diameter: 0.6,
        }
    }

    /// Empty two-layer grid, `size` mm square at 0.25mm.
    pub fn open_grid(size: f64) -> DenseGrid {
        let area = Rect::new(Point::new(0.0, 0.0), Point::new(size, size));
        let r = rules();
        DenseGrid::new(
            GridConverter::for_area(&area, 0.25),
            LayerStack::two_layer(),
            GridRules {
                trace_width: r.trace_width,
                clearance: r.clearance,
                via_diameter: r.via_diameter,
            },
        )
    }

    /// Single-cell top-layer pads.
    pub fn task(grid: &DenseGrid, net: u32, pads: &[(u32, u32)]) -> NetTask {
        NetTask {
            net: NetId(net),
            name: format!("N{}", net),
            priority: 10,
            rules: rules(),
            pads: pads
                .iter()
                .enumerate()
                .map(|(i, &(x, y))| {
                    let c = GridCoord::new(x, y, 0);
                    PadTerminal {
                        label: format!("P{}", i),
                        center: grid.converter().to_world(c),
                        cells: vec![grid.index(c)],
                        multilayer: false,
                    }
                })
                .collect(),
        }
    }
}
