use super::cost::{CostModel, DIAGONAL_COST, STEP_COST};
use crate::grid::{RoutingGrid, ViaSite};
use pcb_common::db::indices::NetId;
use pcb_common::geom::coord::GridCoord;
use pcb_common::util::config::RoutingConfig;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

// Orthogonal moves first; diagonals only when enabled.
const DIRS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

/// Lexicographic path score: cost first, then layer changes, then bends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Score {
    pub cost: u64,
    pub vias: u32,
    pub turns: u32,
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct State {
    f_score: Score,
    g_score: Score,
    index: u32,
}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| self.g_score.cmp(&other.g_score))
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub trait GuideOracle {
    fn is_in_guide(&self, c: GridCoord) -> bool;
}

pub struct NoGuide;
impl GuideOracle for NoGuide {
    fn is_in_guide(&self, _c: GridCoord) -> bool {
        true
    }
}

#[derive(Clone, Debug)]
pub struct SearchParams {
    /// Layer change price in orthogonal steps.
    pub via_cost: u32,
    pub allow_diagonal: bool,
    pub heuristic_weight: f64,
    /// Cells around the terminals searched before falling back to the whole
    /// grid; 0 searches the whole grid straight away.
    pub window_margin: u32,
    pub max_expansions: usize,
}

impl SearchParams {
    pub fn from_config(cfg: &RoutingConfig) -> Self {
        Self {
            via_cost: cfg.via_cost,
            allow_diagonal: cfg.allow_diagonal,
            heuristic_weight: cfg.heuristic_weight.max(0.0),
            window_margin: cfg.window_margin,
            max_expansions: cfg.max_expansions,
        }
    }

    fn directions(&self) -> usize {
        if self.allow_diagonal { 8 } else { 4 }
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}

/// One connection to find: any source cell to any target cell.
pub struct SearchRequest<'a> {
    pub net: NetId,
    pub sources: &'a [usize],
    pub targets: &'a [usize],
    /// Only expand cells the guide accepts (targets always pass).
    pub strict_mode: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct RoutingWindow {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    width: u32,
    height: u32,
    layers: u8,
}

impl RoutingWindow {
    fn full<G: RoutingGrid + ?Sized>(grid: &G) -> Self {
        Self {
            min_x: 0,
            max_x: grid.width() - 1,
            min_y: 0,
            max_y: grid.height() - 1,
            width: grid.width(),
            height: grid.height(),
            layers: grid.layers(),
        }
    }

    fn around<G: RoutingGrid + ?Sized>(cells: &[GridCoord], margin: u32, grid: &G) -> Self {
        let mut min_x = u32::MAX;
        let mut max_x = 0;
        let mut min_y = u32::MAX;
        let mut max_y = 0;
        for c in cells {
            min_x = min_x.min(c.x);
            max_x = max_x.max(c.x);
            min_y = min_y.min(c.y);
            max_y = max_y.max(c.y);
        }
        let min_x = min_x.saturating_sub(margin);
        let max_x = max_x.saturating_add(margin).min(grid.width() - 1);
        let min_y = min_y.saturating_sub(margin);
        let max_y = max_y.saturating_add(margin).min(grid.height() - 1);
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
            layers: grid.layers(),
        }
    }

    fn cells(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.layers as usize)
    }

    #[inline(always)]
    fn contains(&self, c: GridCoord) -> bool {
        c.x >= self.min_x && c.x <= self.max_x && c.y >= self.min_y && c.y <= self.max_y
    }

    #[inline(always)]
    fn step(&self, c: GridCoord, d: (i32, i32)) -> Option<GridCoord> {
        let x = c.x as i64 + d.0 as i64;
        let y = c.y as i64 + d.1 as i64;
        if x < self.min_x as i64 || x > self.max_x as i64 || y < self.min_y as i64 || y > self.max_y as i64 {
            return None;
        }
        Some(GridCoord::new(x as u32, y as u32, c.z))
    }

    #[inline(always)]
    fn get_local_idx(&self, c: GridCoord) -> usize {
        let lx = (c.x - self.min_x) as usize;
        let ly = (c.y - self.min_y) as usize;
        let lz = c.z as usize;
        lz * (self.width as usize) * (self.height as usize) + ly * (self.width as usize) + lx
    }

    #[inline(always)]
    fn get_coord(&self, idx: usize) -> GridCoord {
        let plane_size = (self.width as usize) * (self.height as usize);
        let z = (idx / plane_size) as u8;
        let rem = idx % plane_size;
        let y = (rem / self.width as usize) as u32 + self.min_y;
        let x = (rem % self.width as usize) as u32 + self.min_x;
        GridCoord::new(x, y, z)
    }
}

/// Per-layer bounding boxes of the target cells; the heuristic is the
/// cheapest way into any of them, so it never overestimates.
struct TargetBox {
    z: u8,
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
}

fn target_boxes(targets: &[GridCoord]) -> Vec<TargetBox> {
    let mut boxes: Vec<TargetBox> = Vec::new();
    for t in targets {
        match boxes.iter_mut().find(|b| b.z == t.z) {
            Some(b) => {
                b.min_x = b.min_x.min(t.x);
                b.max_x = b.max_x.max(t.x);
                b.min_y = b.min_y.min(t.y);
                b.max_y = b.max_y.max(t.y);
            }
            None => boxes.push(TargetBox {
                z: t.z,
                min_x: t.x,
                max_x: t.x,
                min_y: t.y,
                max_y: t.y,
            }),
        }
    }
    boxes
}

fn axis_gap(v: u32, lo: u32, hi: u32) -> u64 {
    if v < lo {
        (lo - v) as u64
    } else if v > hi {
        (v - hi) as u64
    } else {
        0
    }
}

/// Windowed multi-source A* over (cell, incoming direction) states.
#[derive(Clone)]
pub struct AStar {
    parents: Vec<u32>,
    g_score: Vec<Score>,
    visited_tag: Vec<u32>,
    target_tag: Vec<u32>,
    current_tag: u32,
    capacity: usize,
}

impl Default for AStar {
    fn default() -> Self {
        Self::new()
    }
}

impl AStar {
    pub fn new() -> Self {
        let cap = 100_000;
        Self {
            parents: vec![u32::MAX; cap],
            g_score: vec![Score::default(); cap],
            visited_tag: vec![0; cap],
            target_tag: vec![0; cap],
            current_tag: 1,
            capacity: cap,
        }
    }

    fn ensure_capacity(&mut self, size: usize) {
        if size > self.capacity {
            self.capacity = size.max(self.capacity * 2);
            self.parents.resize(self.capacity, u32::MAX);
            self.g_score.resize(self.capacity, Score::default());
            self.visited_tag.resize(self.capacity, 0);
            self.target_tag.resize(self.capacity, 0);
        }
    }

    fn reset_window(&mut self) {
        self.current_tag = self.current_tag.wrapping_add(1);
        if self.current_tag == 0 {
            self.visited_tag.fill(0);
            self.target_tag.fill(0);
            self.current_tag = 1;
        }
    }

    /// Cheapest path from any source to any target, or `None` when the
    /// targets are unreachable or the expansion budget runs out. Searches a
    /// window around the terminals first and the whole grid after that.
    pub fn find_path<G: RoutingGrid + ?Sized, C: CostModel, O: GuideOracle>(
        &mut self,
        grid: &G,
        req: &SearchRequest,
        cost: &C,
        oracle: &O,
        params: &SearchParams,
    ) -> Option<Vec<GridCoord>> {
        if req.sources.is_empty() || req.targets.is_empty() {
            return None;
        }
        let full = RoutingWindow::full(grid);
        if params.window_margin > 0 {
            let terminals: Vec<GridCoord> = req
                .sources
                .iter()
                .chain(req.targets)
                .map(|&i| grid.coord(i))
                .collect();
            let window = RoutingWindow::around(&terminals, params.window_margin, grid);
            if window != full {
                if let Some(path) = self.search(grid, req, cost, oracle, params, &window) {
                    return Some(path);
                }
                log::trace!("{:?}: window search failed, widening to full grid", req.net);
            }
        }
        self.search(grid, req, cost, oracle, params, &full)
    }

    fn search<G: RoutingGrid + ?Sized, C: CostModel, O: GuideOracle>(
        &mut self,
        grid: &G,
        req: &SearchRequest,
        cost: &C,
        oracle: &O,
        params: &SearchParams,
        window: &RoutingWindow,
    ) -> Option<Vec<GridCoord>> {
        let dirs = params.directions();
        let stride = dirs + 1;
        let no_dir = dirs;
        self.ensure_capacity(window.cells() * stride);
        self.reset_window();
        let tag = self.current_tag;

        let targets: Vec<GridCoord> = req.targets.iter().map(|&i| grid.coord(i)).collect();
        for t in &targets {
            if window.contains(*t) {
                self.target_tag[window.get_local_idx(*t)] = tag;
            }
        }
        let boxes = target_boxes(&targets);
        let via_step = params.via_cost as u64 * STEP_COST as u64;
        let heuristic = |c: GridCoord| -> u64 {
            let best = boxes
                .iter()
                .map(|b| {
                    let dx = axis_gap(c.x, b.min_x, b.max_x);
                    let dy = axis_gap(c.y, b.min_y, b.max_y);
                    let planar = if params.allow_diagonal {
                        STEP_COST as u64 * dx.max(dy)
                            + (DIAGONAL_COST - STEP_COST) as u64 * dx.min(dy)
                    } else {
                        STEP_COST as u64 * (dx + dy)
                    };
                    planar + via_step * (c.z as i64 - b.z as i64).unsigned_abs()
                })
                .min()
                .unwrap_or(0);
            (best as f64 * params.heuristic_weight) as u64
        };

        let mut heap = BinaryHeap::new();
        for &s in req.sources {
            let c = grid.coord(s);
            if !window.contains(c) {
                continue;
            }
            let local = window.get_local_idx(c);
            if self.target_tag[local] == tag {
                return Some(vec![c]);
            }
            let st = local * stride + no_dir;
            if self.visited_tag[st] == tag {
                continue;
            }
            self.visited_tag[st] = tag;
            self.g_score[st] = Score::default();
            self.parents[st] = u32::MAX;
            heap.push(State {
                f_score: Score {
                    cost: heuristic(c),
                    ..Score::default()
                },
                g_score: Score::default(),
                index: st as u32,
            });
        }

        let mut expansions = 0usize;
        while let Some(State { g_score, index, .. }) = heap.pop() {
            let st = index as usize;
            if g_score > self.g_score[st] {
                continue;
            }
            let local = st / stride;
            let dir = st % stride;
            let position = window.get_coord(local);
            if self.target_tag[local] == tag {
                return Some(self.reconstruct_path(st, stride, window));
            }

            expansions += 1;
            if expansions > params.max_expansions {
                log::debug!(
                    "{:?}: gave up after {} expansions",
                    req.net,
                    params.max_expansions
                );
                return None;
            }

            for (d, &delta) in DIRS.iter().enumerate().take(dirs) {
                let Some(neighbor) = window.step(position, delta) else {
                    continue;
                };
                let neighbor_local = window.get_local_idx(neighbor);
                if req.strict_mode
                    && !oracle.is_in_guide(neighbor)
                    && self.target_tag[neighbor_local] != tag
                {
                    continue;
                }
                let Some(extra) = cost.cell_cost(grid, grid.index(neighbor), req.net) else {
                    continue;
                };
                let diagonal = delta.0 != 0 && delta.1 != 0;
                if diagonal {
                    let corner_a = GridCoord::new(neighbor.x, position.y, position.z);
                    let corner_b = GridCoord::new(position.x, neighbor.y, position.z);
                    if cost.cell_cost(grid, grid.index(corner_a), req.net).is_none()
                        || cost.cell_cost(grid, grid.index(corner_b), req.net).is_none()
                    {
                        continue;
                    }
                }
                let step = if diagonal { DIAGONAL_COST } else { STEP_COST } + extra;
                let tentative = Score {
                    cost: g_score.cost + step as u64,
                    vias: g_score.vias,
                    turns: g_score.turns + (dir != no_dir && dir != d) as u32,
                };
                let h = heuristic(neighbor);
                self.relax(&mut heap, neighbor_local * stride + d, st, tentative, h);
            }

            for z in [position.z.checked_sub(1), position.z.checked_add(1)]
                .into_iter()
                .flatten()
                .filter(|&z| z < grid.layers())
            {
                let neighbor = position.with_layer(z);
                let neighbor_local = window.get_local_idx(neighbor);
                if req.strict_mode
                    && !oracle.is_in_guide(neighbor)
                    && self.target_tag[neighbor_local] != tag
                {
                    continue;
                }
                let Some(extra) = cost.cell_cost(grid, grid.index(neighbor), req.net) else {
                    continue;
                };
                let site = ViaSite::new(position.x, position.y, position.z, z);
                let Some(via_extra) = cost.via_cost(grid, site, req.net) else {
                    continue;
                };
                let tentative = Score {
                    cost: g_score.cost + via_step + (extra + via_extra) as u64,
                    vias: g_score.vias + 1,
                    turns: g_score.turns,
                };
                let h = heuristic(neighbor);
                self.relax(&mut heap, neighbor_local * stride + dir, st, tentative, h);
            }
        }
        None
    }

    #[inline(always)]
    fn relax(&mut self, heap: &mut BinaryHeap<State>, state: usize, parent: usize, g: Score, h: u64) {
        if self.visited_tag[state] != self.current_tag || g < self.g_score[state] {
            self.visited_tag[state] = self.current_tag;
            self.g_score[state] = g;
            self.parents[state] = parent as u32;
            heap.push(State {
                f_score: Score {
                    cost: g.cost + h,
                    ..g
                },
                g_score: g,
                index: state as u32,
            });
        }
    }

    fn reconstruct_path(&self, end: usize, stride: usize, window: &RoutingWindow) -> Vec<GridCoord> {
        let mut path = Vec::new();
        let mut state = end;
        loop {
            path.push(window.get_coord(state / stride));
            let parent = self.parents[state];
            if parent == u32::MAX {
                break;
            }
            state = parent as usize;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::cost::HardCost;
    use crate::grid::{DenseGrid, GridRules};
    use crate::utils::conversion::GridConverter;
    use pcb_common::db::layers::LayerStack;
    use pcb_common::geom::point::Point;
    use pcb_common::geom::rect::Rect;

    fn grid(layers: LayerStack) -> DenseGrid {
        let area = Rect::new(Point::new(0.0, 0.0), Point::new(5.0, 5.0));
        let rules = GridRules {
            trace_width: 0.2,
            clearance: 0.2,
            via_diameter: 0.6,
        };
        DenseGrid::new(GridConverter::for_area(&area, 0.25), layers, rules)
    }

    fn find(
        g: &DenseGrid,
        sources: &[GridCoord],
        targets: &[GridCoord],
        params: &SearchParams,
    ) -> Option<Vec<GridCoord>> {
        let s: Vec<usize> = sources.iter().map(|&c| g.index(c)).collect();
        let t: Vec<usize> = targets.iter().map(|&c| g.index(c)).collect();
        let req = SearchRequest {
            net: NetId(1),
            sources: &s,
            targets: &t,
            strict_mode: false,
        };
        AStar::new().find_path(g, &req, &HardCost, &NoGuide, params)
    }

    #[test]
    fn test_straight_line() {
        let g = grid(LayerStack::two_layer());
        let path = find(
            &g,
            &[GridCoord::new(1, 5, 0)],
            &[GridCoord::new(15, 5, 0)],
            &SearchParams::default(),
        )
        .unwrap();
        assert_eq!(path.len(), 15);
        assert!(path.iter().all(|c| c.y == 5 && c.z == 0));
    }

    #[test]
    fn test_prefers_single_bend() {
        let g = grid(LayerStack::two_layer());
        let path = find(
            &g,
            &[GridCoord::new(2, 2, 0)],
            &[GridCoord::new(12, 12, 0)],
            &SearchParams::default(),
        )
        .unwrap();
        let bends = path
            .windows(3)
            .filter(|w| (w[1].x as i64 - w[0].x as i64, w[1].y as i64 - w[0].y as i64)
                != (w[2].x as i64 - w[1].x as i64, w[2].y as i64 - w[1].y as i64))
            .count();
        assert_eq!(path.len(), 21);
        assert_eq!(bends, 1);
    }

    #[test]
    fn test_uses_via_around_wall() {
        let mut g = grid(LayerStack::two_layer());
        // Wall across the whole top layer.
        g.mark_obstacle(&Rect::new(Point::new(2.4, -1.0), Point::new(2.6, 6.0)), 0);
        let path = find(
            &g,
            &[GridCoord::new(2, 10, 0)],
            &[GridCoord::new(18, 10, 0)],
            &SearchParams::default(),
        )
        .unwrap();
        let vias = path.windows(2).filter(|w| w[0].z != w[1].z).count();
        assert_eq!(vias, 2);
        assert_eq!(path.last(), Some(&GridCoord::new(18, 10, 0)));
    }

    #[test]
    fn test_unreachable_returns_none() {
        let mut g = grid(LayerStack::new(vec![pcb_common::db::layers::Layer::Top]));
        g.mark_obstacle(&Rect::new(Point::new(2.4, -1.0), Point::new(2.6, 6.0)), 0);
        assert!(
            find(
                &g,
                &[GridCoord::new(2, 10, 0)],
                &[GridCoord::new(18, 10, 0)],
                &SearchParams::default()
            )
            .is_none()
        );
    }

    #[test]
    fn test_expansion_budget() {
        let g = grid(LayerStack::two_layer());
        let params = SearchParams {
            max_expansions: 3,
            ..SearchParams::default()
        };
        assert!(
            find(
                &g,
                &[GridCoord::new(0, 0, 0)],
                &[GridCoord::new(20, 20, 0)],
                &params
            )
            .is_none()
        );
    }

    #[test]
    fn test_diagonal_moves() {
        let g = grid(LayerStack::two_layer());
        let params = SearchParams {
            allow_diagonal: true,
            ..SearchParams::default()
        };
        let path = find(
            &g,
            &[GridCoord::new(2, 2, 0)],
            &[GridCoord::new(10, 10, 0)],
            &params,
        )
        .unwrap();
        assert_eq!(path.len(), 9);
    }
}
