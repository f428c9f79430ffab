//! Route each net once, in priority order, against everything committed
//! before it.

use super::{NetTask, RoutingContext, RoutingResult, build_route, route_net};
use crate::algo::{HardCost, PathfindingBackend};
use crate::grid::DenseGrid;

pub fn route<B: PathfindingBackend>(
    grid: &mut DenseGrid,
    tasks: &[NetTask],
    order: &[usize],
    backend: &mut B,
    ctx: &RoutingContext,
) -> RoutingResult {
    let mut result = RoutingResult::default();

    for (k, &i) in order.iter().enumerate() {
        if ctx.deadline.expired() {
            log::warn!("Routing timed out with {} nets left", order.len() - k);
            result.unrouted.extend(order[k..].iter().map(|&j| tasks[j].net));
            break;
        }
        let task = &tasks[i];
        match route_net(grid, backend, task, &HardCost, ctx) {
            Ok(paths) => {
                let fp = grid.footprint(&paths.cells, &paths.vias);
                grid.commit(&fp, task.net);
                result.routes.push(build_route(grid, task, &paths));
            }
            Err(e) => {
                log::warn!("{}", e);
                result.unrouted.push(task.net);
                result.failures.push(e);
            }
        }
    }

    log::info!(
        "Basic routing: {}/{} nets",
        result.nets_routed(),
        tasks.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::priority_order;
    use super::*;
    use crate::algo::AStar;
    use crate::error::RouterError;
    use crate::grid::RoutingGrid;
    use pcb_common::db::indices::NetId;
    use pcb_common::geom::coord::GridCoord;
    use pcb_common::geom::point::Point;
    use pcb_common::geom::rect::Rect;

    #[test]
    fn test_routes_in_order_and_commits() {
        let mut grid = open_grid(10.0);
        let a = task(&grid, 1, &[(4, 10), (30, 10)]);
        let b = task(&grid, 2, &[(4, 30), (30, 30)]);
        let tasks = vec![a, b];
        let order = priority_order(&tasks);
        let result = route(&mut grid, &tasks, &order, &mut AStar::new(), &RoutingContext::default());
        assert_eq!(result.nets_routed(), 2);
        assert!(result.unrouted.is_empty());
        assert_eq!(result.routes[0].segments.len(), 1);
        // The first net's copper now blocks the second net.
        let on_a = grid.index(GridCoord::new(15, 10, 0));
        assert!(!grid.is_free(on_a, NetId(2)));
    }

    #[test]
    fn test_failure_is_recorded_not_fatal() {
        let mut grid = open_grid(10.0);
        // Wall the first pad in on both layers.
        for z in 0..2 {
            grid.mark_obstacle(&Rect::new(Point::new(0.0, 0.0), Point::new(2.5, 10.0)), z);
        }
        let boxed = task(&grid, 1, &[(1, 10), (30, 10)]);
        let free = task(&grid, 2, &[(15, 30), (30, 30)]);
        let tasks = vec![boxed, free];
        let order = priority_order(&tasks);
        let result = route(&mut grid, &tasks, &order, &mut AStar::new(), &RoutingContext::default());
        assert_eq!(result.nets_routed(), 1);
        assert_eq!(result.unrouted, vec![NetId(1)]);
        assert!(matches!(result.failures[0], RouterError::NoPathFound { .. }));
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut grid = open_grid(10.0);
            let tasks = vec![
                task(&grid, 1, &[(4, 4), (30, 30)]),
                task(&grid, 2, &[(4, 30), (30, 4)]),
            ];
            let order = priority_order(&tasks);
            route(&mut grid, &tasks, &order, &mut AStar::new(), &RoutingContext::default()).routes
        };
        assert_eq!(run(), run());
    }
}
