//! Routed copper of one net.

use pcb_common::db::core::{Segment, Via};
use pcb_common::db::indices::NetId;
use pcb_common::db::layers::Layer;
use pcb_common::geom::point::Point;

/// Two copper points closer than this are the same point for via purposes.
pub const VIA_TOLERANCE: f64 = 0.01;
const SAME_POINT: f64 = 1e-9;

/// A path cell in board millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub position: Point<f64>,
    pub layer: Layer,
}

impl Waypoint {
    pub fn new(position: Point<f64>, layer: Layer) -> Self {
        Self { position, layer }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub net: NetId,
    pub net_name: String,
    pub segments: Vec<Segment>,
    pub vias: Vec<Via>,
    /// Pad centres the route connects. They never move.
    pub terminals: Vec<Point<f64>>,
    /// Centres of multi-layer pads, where copper may change layer without a
    /// via of its own.
    pub through_pads: Vec<Point<f64>>,
}

fn same_direction(a: Point<f64>, b: Point<f64>) -> bool {
    let scale = a.length() * b.length();
    scale > 0.0 && a.cross(b).abs() <= 1e-9 * scale && a.dot(b) > 0.0
}

/// Drop interior points that lie on a straight run.
pub fn collapse_collinear(points: &[Point<f64>]) -> Vec<Point<f64>> {
    let mut out: Vec<Point<f64>> = Vec::with_capacity(points.len());
    for &p in points {
        if out.last().is_some_and(|l| l.approx_eq(p, SAME_POINT)) {
            continue;
        }
        if out.len() >= 2 {
            let n = out.len();
            if same_direction(out[n - 1] - out[n - 2], p - out[n - 1]) {
                out[n - 1] = p;
                continue;
            }
        }
        out.push(p);
    }
    out
}

impl Route {
    pub fn new(net: NetId, net_name: impl Into<String>) -> Self {
        Self {
            net,
            net_name: net_name.into(),
            segments: Vec::new(),
            vias: Vec::new(),
            terminals: Vec::new(),
            through_pads: Vec::new(),
        }
    }

    /// Minimal segments for a cell path, with a via wherever it changes layer.
    pub fn from_waypoints(
        net: NetId,
        net_name: impl Into<String>,
        waypoints: &[Waypoint],
        width: f64,
        via_drill: f64,
        via_diameter: f64,
    ) -> Self {
        let mut route = Self::new(net, net_name);
        route.add_path(waypoints, width, via_drill, via_diameter);
        route
    }

    /// Append one branch. Consecutive layer changes at the same point become
    /// a single via spanning all of them.
    pub fn add_path(&mut self, waypoints: &[Waypoint], width: f64, via_drill: f64, via_diameter: f64) {
        let mut runs: Vec<(Layer, Vec<Point<f64>>)> = Vec::new();
        for wp in waypoints {
            match runs.last_mut() {
                Some((layer, points)) if *layer == wp.layer => points.push(wp.position),
                _ => runs.push((wp.layer, vec![wp.position])),
            }
        }

        for (layer, points) in &runs {
            let kept = collapse_collinear(points);
            for pair in kept.windows(2) {
                self.segments
                    .push(Segment::new(pair[0], pair[1], width, *layer, self.net));
            }
        }

        let mut k = 0;
        while k + 1 < runs.len() {
            let Some(&at) = runs[k].1.last() else {
                break;
            };
            let first = runs[k].0;
            let mut j = k + 1;
            while runs[j].1.len() == 1
                && j + 1 < runs.len()
                && runs[j + 1].1[0].approx_eq(at, SAME_POINT)
            {
                j += 1;
            }
            let last = runs[j].0;
            if first != last && runs[j].1[0].approx_eq(at, SAME_POINT) {
                self.add_via(Via::new(at, via_drill, via_diameter, first, last, self.net));
            }
            k = j;
        }
    }

    /// Add `via`, or widen an existing via at the same spot to cover it.
    pub fn add_via(&mut self, via: Via) {
        if let Some(existing) = self
            .vias
            .iter_mut()
            .find(|v| v.position.approx_eq(via.position, SAME_POINT))
        {
            existing.layers = (
                existing.layers.0.min(via.layers.0),
                existing.layers.1.max(via.layers.1),
            );
            return;
        }
        self.vias.push(via);
    }

    /// A via close enough to `p` that joins `a` and `b`.
    fn via_near(&self, p: Point<f64>, a: Layer, b: Layer) -> bool {
        self.vias
            .iter()
            .any(|v| v.position.approx_eq(p, VIA_TOLERANCE + SAME_POINT) && v.connects(a, b))
    }

    fn through_pad_near(&self, p: Point<f64>) -> bool {
        self.through_pads
            .iter()
            .any(|t| t.approx_eq(p, VIA_TOLERANCE + SAME_POINT))
    }

    /// Insert a via wherever two consecutive segments change layer at a
    /// shared endpoint without one. Returns how many were inserted; a second
    /// call returns zero.
    pub fn validate_layer_transitions(&mut self, via_drill: f64, via_diameter: f64) -> usize {
        let mut inserted = 0;
        for i in 1..self.segments.len() {
            let a = self.segments[i - 1];
            let b = self.segments[i];
            if a.layer == b.layer {
                continue;
            }
            let shared = [(a.end, b.start), (a.end, b.end), (a.start, b.start), (a.start, b.end)]
                .into_iter()
                .find(|(p, q)| p.approx_eq(*q, VIA_TOLERANCE + SAME_POINT))
                .map(|(p, _)| p);
            let Some(at) = shared else {
                continue;
            };
            if self.via_near(at, a.layer, b.layer) || self.through_pad_near(at) {
                continue;
            }
            log::debug!(
                "{}: inserting missing via at ({:.3}, {:.3}) between {} and {}",
                self.net_name,
                at.x,
                at.y,
                a.layer,
                b.layer
            );
            // A via sitting exactly here on the wrong layer pair is widened.
            self.add_via(Via::new(at, via_drill, via_diameter, a.layer, b.layer, self.net));
            inserted += 1;
        }
        inserted
    }

    pub fn length(&self) -> f64 {
        self.segments.iter().map(|s| s.length()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.vias.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(a: (f64, f64), b: (f64, f64), layer: Layer) -> Segment {
        Segment::new(Point::new(a.0, a.1), Point::new(b.0, b.1), 0.2, layer, NetId(1))
    }

    fn wp(x: f64, y: f64, layer: Layer) -> Waypoint {
        Waypoint::new(Point::new(x, y), layer)
    }

    #[test]
    fn test_waypoints_collapse_and_via() {
        let path = [
            wp(0.0, 0.0, Layer::Top),
            wp(0.5, 0.0, Layer::Top),
            wp(1.0, 0.0, Layer::Top),
            wp(1.0, 0.0, Layer::Bottom),
            wp(1.0, 0.5, Layer::Bottom),
            wp(1.0, 1.0, Layer::Bottom),
            wp(1.5, 1.0, Layer::Bottom),
        ];
        let route = Route::from_waypoints(NetId(1), "N", &path, 0.2, 0.3, 0.6);
        assert_eq!(route.segments.len(), 3);
        assert_eq!(route.vias.len(), 1);
        assert_eq!(route.vias[0].position, Point::new(1.0, 0.0));
        assert_eq!(route.vias[0].layers, (Layer::Top, Layer::Bottom));
        assert!((route.length() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_stacked_layer_changes_make_one_via() {
        let path = [
            wp(0.0, 0.0, Layer::Top),
            wp(1.0, 0.0, Layer::Top),
            wp(1.0, 0.0, Layer::Inner(1)),
            wp(1.0, 0.0, Layer::Bottom),
            wp(2.0, 0.0, Layer::Bottom),
        ];
        let route = Route::from_waypoints(NetId(1), "N", &path, 0.2, 0.3, 0.6);
        assert_eq!(route.vias.len(), 1);
        assert_eq!(route.vias[0].layers, (Layer::Top, Layer::Bottom));
        assert_eq!(route.segments.len(), 2);
    }

    #[test]
    fn test_validate_inserts_once() {
        let mut route = Route::new(NetId(1), "N");
        route.segments = vec![
            seg((0.0, 0.0), (1.0, 0.0), Layer::Top),
            seg((1.0, 0.0), (1.0, 1.0), Layer::Bottom),
        ];
        assert_eq!(route.validate_layer_transitions(0.3, 0.6), 1);
        assert_eq!(route.vias.len(), 1);
        assert!(route.vias[0].position.approx_eq(Point::new(1.0, 0.0), 1e-12));
        assert_eq!(route.vias[0].layers, (Layer::Top, Layer::Bottom));
        assert_eq!(route.validate_layer_transitions(0.3, 0.6), 0);
    }

    #[test]
    fn test_nearby_via_boundary() {
        let base = vec![
            seg((0.0, 0.0), (1.0, 0.0), Layer::Top),
            seg((1.0, 0.0), (1.0, 1.0), Layer::Bottom),
        ];
        let mut close = Route::new(NetId(1), "N");
        close.segments = base.clone();
        close.vias.push(Via::new(Point::new(1.005, 0.0), 0.3, 0.6, Layer::Top, Layer::Bottom, NetId(1)));
        assert_eq!(close.validate_layer_transitions(0.3, 0.6), 0);

        let mut far = Route::new(NetId(1), "N");
        far.segments = base;
        far.vias.push(Via::new(Point::new(1.02, 0.0), 0.3, 0.6, Layer::Top, Layer::Bottom, NetId(1)));
        assert_eq!(far.validate_layer_transitions(0.3, 0.6), 1);
        assert_eq!(far.vias.len(), 2);
    }

    #[test]
    fn test_via_on_other_layer_pair_does_not_count() {
        let mut route = Route::new(NetId(1), "N");
        route.segments = vec![
            seg((0.0, 0.0), (1.0, 0.0), Layer::Inner(1)),
            seg((1.0, 0.0), (1.0, 1.0), Layer::Bottom),
        ];
        route.vias.push(Via::new(Point::new(1.0, 0.0), 0.3, 0.6, Layer::Top, Layer::Inner(1), NetId(1)));
        assert_eq!(route.validate_layer_transitions(0.3, 0.6), 1);
        assert_eq!(route.vias.len(), 1);
        assert!(route.vias[0].connects(Layer::Inner(1), Layer::Bottom));
        assert_eq!(route.vias[0].layers, (Layer::Top, Layer::Bottom));
        assert_eq!(route.validate_layer_transitions(0.3, 0.6), 0);
    }

    #[test]
    fn test_nearby_via_on_other_layer_pair_gets_company() {
        let mut route = Route::new(NetId(1), "N");
        route.segments = vec![
            seg((0.0, 0.0), (1.0, 0.0), Layer::Inner(1)),
            seg((1.0, 0.0), (1.0, 1.0), Layer::Bottom),
        ];
        route.vias.push(Via::new(Point::new(1.005, 0.0), 0.3, 0.6, Layer::Top, Layer::Inner(1), NetId(1)));
        assert_eq!(route.validate_layer_transitions(0.3, 0.6), 1);
        assert_eq!(route.vias.len(), 2);
        assert_eq!(route.vias[1].position, Point::new(1.0, 0.0));
        assert_eq!(route.vias[1].layers, (Layer::Inner(1), Layer::Bottom));
    }

    #[test]
    fn test_through_pad_needs_no_via() {
        let mut route = Route::new(NetId(1), "N");
        route.segments = vec![
            seg((0.0, 0.0), (1.0, 0.0), Layer::Bottom),
            seg((1.0, 0.0), (2.0, 0.0), Layer::Top),
        ];
        route.through_pads.push(Point::new(1.0, 0.0));
        assert_eq!(route.validate_layer_transitions(0.3, 0.6), 0);
    }

    #[test]
    fn test_disjoint_segments_are_not_transitions() {
        let mut route = Route::new(NetId(1), "N");
        route.segments = vec![
            seg((0.0, 0.0), (1.0, 0.0), Layer::Top),
            seg((5.0, 0.0), (6.0, 0.0), Layer::Bottom),
        ];
        assert_eq!(route.validate_layer_transitions(0.3, 0.6), 0);
    }
}
