//! Coarse region routing that confines the fine search to a corridor.

use crate::algo::{AStar, GuideOracle, HardCost, NoGuide, SearchParams, SearchRequest};
use crate::grid::{DenseGrid, GridRules, RoutingGrid};
use crate::utils::conversion::GridConverter;
use pcb_common::db::indices::NetId;
use pcb_common::geom::coord::GridCoord;

/// Regions of fine cells a connection may use, the same on every layer.
#[derive(Clone, Debug)]
pub struct Corridor {
    factor: u32,
    cols: u32,
    rows: u32,
    regions: Vec<bool>,
}

impl Corridor {
    fn region(&self, c: GridCoord) -> usize {
        let cx = (c.x / self.factor).min(self.cols - 1);
        let cy = (c.y / self.factor).min(self.rows - 1);
        (cy * self.cols + cx) as usize
    }

    pub fn region_count(&self) -> usize {
        self.regions.iter().filter(|r| **r).count()
    }
}

impl GuideOracle for Corridor {
    #[inline(always)]
    fn is_in_guide(&self, c: GridCoord) -> bool {
        self.regions[self.region(c)]
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CorridorPlanner {
    cell_mm: f64,
}

impl CorridorPlanner {
    pub fn new(cell_mm: f64) -> Self {
        Self { cell_mm }
    }

    /// Route `sources` to `targets` over regions of `cell_mm`, where a region
    /// layer is open when any fine cell in it is open to `net`. The region
    /// path and its neighbours form the corridor. Returns `None` when regions
    /// would be a single cell or no region path exists.
    pub fn plan(
        &self,
        grid: &DenseGrid,
        net: NetId,
        sources: &[usize],
        targets: &[usize],
        params: &SearchParams,
    ) -> Option<Corridor> {
        let res = grid.converter().resolution();
        let factor = (self.cell_mm / res).round().max(1.0) as u32;
        if factor <= 1 {
            return None;
        }
        let cols = grid.width().div_ceil(factor);
        let rows = grid.height().div_ceil(factor);
        let origin = grid.converter().to_mm(0, 0);
        let step = res * factor as f64;
        let mut coarse = DenseGrid::new(
            GridConverter::from_steps(step, step, origin.x, origin.y, cols, rows),
            grid.stack().clone(),
            GridRules {
                trace_width: 0.0,
                clearance: 0.0,
                via_diameter: 0.0,
            },
        );

        let mut open = vec![false; (cols * rows) as usize * grid.layers() as usize];
        for i in 0..grid.cell_count() {
            if grid.is_passable(i, net) {
                let c = grid.coord(i);
                let r = coarse.index(GridCoord::new(c.x / factor, c.y / factor, c.z));
                open[r] = true;
            }
        }
        for (r, _) in open.iter().enumerate().filter(|(_, o)| !**o) {
            coarse.block_cell(r);
        }

        let to_coarse = |cells: &[usize]| -> Vec<usize> {
            let mut out: Vec<usize> = cells
                .iter()
                .map(|&i| {
                    let c = grid.coord(i);
                    coarse.index(GridCoord::new(c.x / factor, c.y / factor, c.z))
                })
                .collect();
            out.sort_unstable();
            out.dedup();
            out
        };
        let coarse_sources = to_coarse(sources);
        let coarse_targets = to_coarse(targets);
        let req = SearchRequest {
            net,
            sources: &coarse_sources,
            targets: &coarse_targets,
            strict_mode: false,
        };
        let coarse_params = SearchParams {
            window_margin: 0,
            ..params.clone()
        };
        let path = AStar::new().find_path(&coarse, &req, &HardCost, &NoGuide, &coarse_params)?;

        let mut regions = vec![false; (cols * rows) as usize];
        for c in &path {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let x = c.x as i64 + dx;
                    let y = c.y as i64 + dy;
                    if x >= 0 && y >= 0 && x < cols as i64 && y < rows as i64 {
                        regions[(y as u32 * cols + x as u32) as usize] = true;
                    }
                }
            }
        }
        log::trace!(
            "{:?}: corridor of {} regions from a {}-step region path",
            net,
            regions.iter().filter(|r| **r).count(),
            path.len()
        );
        Some(Corridor {
            factor,
            cols,
            rows,
            regions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::test_support::open_grid;
    use pcb_common::geom::point::Point;
    use pcb_common::geom::rect::Rect;

    fn cell(grid: &DenseGrid, x: u32, y: u32) -> usize {
        grid.index(GridCoord::new(x, y, 0))
    }

    #[test]
    fn test_straight_corridor() {
        let grid = open_grid(10.0);
        let corridor = CorridorPlanner::new(2.5)
            .plan(&grid, NetId(1), &[cell(&grid, 4, 4)], &[cell(&grid, 36, 4)], &SearchParams::default())
            .unwrap();
        // Region row 0 plus its neighbour row, across columns 0..=4.
        assert_eq!(corridor.region_count(), 10);
        assert!(corridor.is_in_guide(GridCoord::new(20, 4, 1)));
        assert!(!corridor.is_in_guide(GridCoord::new(20, 30, 0)));
    }

    #[test]
    fn test_corridor_goes_around_blocked_regions() {
        let mut grid = open_grid(10.0);
        for z in 0..2 {
            grid.mark_obstacle(&Rect::new(Point::new(4.5, 0.0), Point::new(7.0, 5.0)), z);
        }
        let source = [cell(&grid, 4, 4)];
        let target = [cell(&grid, 36, 4)];
        let corridor = CorridorPlanner::new(2.5)
            .plan(&grid, NetId(1), &source, &target, &SearchParams::default())
            .unwrap();
        assert!(corridor.is_in_guide(GridCoord::new(25, 22, 0)));

        let req = SearchRequest {
            net: NetId(1),
            sources: &source,
            targets: &target,
            strict_mode: true,
        };
        let path = AStar::new()
            .find_path(&grid, &req, &HardCost, &corridor, &SearchParams::default())
            .unwrap();
        assert!(path.iter().all(|c| corridor.is_in_guide(*c)));
    }

    #[test]
    fn test_fine_regions_give_no_corridor() {
        let grid = open_grid(10.0);
        let plan = CorridorPlanner::new(0.25).plan(
            &grid,
            NetId(1),
            &[cell(&grid, 4, 4)],
            &[cell(&grid, 36, 4)],
            &SearchParams::default(),
        );
        assert!(plan.is_none());
    }
}
