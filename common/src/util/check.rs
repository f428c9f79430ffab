//! Design-rule checking over placed copper.
//!
//! Every pad, segment and via becomes a [`CopperItem`] in an R-tree so that
//! candidate pairs are found by bounding box and then measured exactly.

use crate::db::core::{BoardDB, Pad, Segment, Via};
use crate::db::indices::NetId;
use crate::db::layers::Layer;
use crate::geom::distance::{
    point_rect_distance, point_segment_distance, segment_rect_distance, segment_segment_distance,
};
use crate::geom::point::Point;
use crate::geom::polygon::Polygon;
use crate::geom::rect::Rect;
use crate::geom::rtree::SpatialIndex;
use rayon::prelude::*;
use std::fmt;

const CHECK_TOLERANCE: f64 = 1e-4;
const JOIN_TOLERANCE: f64 = 0.01;

#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Segment {
        a: Point<f64>,
        b: Point<f64>,
        half_width: f64,
        layer: Layer,
    },
    Via {
        center: Point<f64>,
        radius: f64,
        layers: (Layer, Layer),
    },
    Pad {
        rect: Rect,
        layers: Vec<Layer>,
    },
}

impl Shape {
    fn on_layer(&self, layer: Layer) -> bool {
        match self {
            Shape::Segment { layer: l, .. } => *l == layer,
            Shape::Via { layers, .. } => layer >= layers.0 && layer <= layers.1,
            Shape::Pad { layers, .. } => layers.contains(&layer),
        }
    }

    fn layers(&self) -> Vec<Layer> {
        match self {
            Shape::Segment { layer, .. } => vec![*layer],
            Shape::Via { layers, .. } => vec![layers.0, layers.1],
            Shape::Pad { layers, .. } => layers.clone(),
        }
    }

    /// Whether both shapes have copper on a common layer.
    pub fn shares_layer(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Via { layers: a, .. }, Shape::Via { layers: b, .. }) => a.0 <= b.1 && b.0 <= a.1,
            (Shape::Via { layers, .. }, s) | (s, Shape::Via { layers, .. }) => {
                s.layers().iter().any(|l| *l >= layers.0 && *l <= layers.1)
            }
            _ => self.layers().iter().any(|l| other.on_layer(*l)),
        }
    }

    pub fn bounding_box(&self) -> Rect {
        match self {
            Shape::Segment { a, b, half_width, .. } => Rect::spanning(*a, *b).inflate(*half_width),
            Shape::Via { center, radius, .. } => Rect::from_center(*center, radius * 2.0, radius * 2.0),
            Shape::Pad { rect, .. } => *rect,
        }
    }

    /// Edge-to-edge copper distance, ignoring layers. Pad pairs report infinity.
    pub fn gap(&self, other: &Shape) -> f64 {
        use Shape::*;
        match (self, other) {
            (
                Segment { a, b, half_width: w1, .. },
                Segment { a: c, b: d, half_width: w2, .. },
            ) => segment_segment_distance(*a, *b, *c, *d) - w1 - w2,
            (Segment { a, b, half_width, .. }, Via { center, radius, .. })
            | (Via { center, radius, .. }, Segment { a, b, half_width, .. }) => {
                point_segment_distance(*center, *a, *b) - half_width - radius
            }
            (Segment { a, b, half_width, .. }, Pad { rect, .. })
            | (Pad { rect, .. }, Segment { a, b, half_width, .. }) => {
                segment_rect_distance(*a, *b, rect) - half_width
            }
            (Via { center: c1, radius: r1, .. }, Via { center: c2, radius: r2, .. }) => {
                c1.distance(*c2) - r1 - r2
            }
            (Via { center, radius, .. }, Pad { rect, .. })
            | (Pad { rect, .. }, Via { center, radius, .. }) => point_rect_distance(*center, rect) - radius,
            (Pad { .. }, Pad { .. }) => f64::INFINITY,
        }
    }

    /// Clearance from the board edge, or a negative value when outside.
    fn edge_gap(&self, outline: &Polygon) -> f64 {
        match self {
            Shape::Segment { a, b, half_width, .. } => {
                if !outline.contains(*a) || !outline.contains(*b) {
                    return -1.0;
                }
                let mut best = f64::INFINITY;
                for (p, q) in outline.edges() {
                    best = best.min(segment_segment_distance(*a, *b, p, q));
                }
                best - half_width
            }
            Shape::Via { center, radius, .. } => {
                if !outline.contains(*center) {
                    return -1.0;
                }
                outline.distance_to_boundary(*center) - radius
            }
            Shape::Pad { .. } => f64::INFINITY,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CopperItem {
    pub shape: Shape,
    pub net: NetId,
}

impl CopperItem {
    pub fn from_pad(pad: &Pad) -> Self {
        Self {
            shape: Shape::Pad {
                rect: pad.rect(),
                layers: pad.layers.clone(),
            },
            net: pad.net,
        }
    }

    pub fn from_segment(seg: &Segment) -> Self {
        Self {
            shape: Shape::Segment {
                a: seg.start,
                b: seg.end,
                half_width: seg.width / 2.0,
                layer: seg.layer,
            },
            net: seg.net,
        }
    }

    pub fn from_via(via: &Via) -> Self {
        Self {
            shape: Shape::Via {
                center: via.position,
                radius: via.diameter / 2.0,
                layers: via.layers,
            },
            net: via.net,
        }
    }
}

/// R-tree over copper items of a board.
pub struct CopperIndex {
    items: Vec<CopperItem>,
    index: SpatialIndex,
    outline: Polygon,
}

impl CopperIndex {
    pub fn new(items: Vec<CopperItem>, outline: Polygon) -> Self {
        let index = SpatialIndex::bulk(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| (item.shape.bounding_box(), i))
                .collect(),
        );
        Self {
            items,
            index,
            outline,
        }
    }

    pub fn from_board(db: &BoardDB) -> Self {
        Self::from_parts(db, &db.segments, &db.vias)
    }

    /// Board pads and outline plus the given segments and vias.
    pub fn from_parts(db: &BoardDB, segments: &[Segment], vias: &[Via]) -> Self {
        let mut items: Vec<CopperItem> = db.pads.iter().map(CopperItem::from_pad).collect();
        items.extend(segments.iter().map(CopperItem::from_segment));
        items.extend(vias.iter().map(CopperItem::from_via));
        Self::new(items, db.outline.clone())
    }

    pub fn insert(&mut self, item: CopperItem) {
        self.index.insert(item.shape.bounding_box(), self.items.len());
        self.items.push(item);
    }

    pub fn items(&self) -> &[CopperItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items of other nets closer than `clearance` to `shape` on a shared layer.
    pub fn conflicts(&self, shape: &Shape, net: NetId, clearance: f64) -> Vec<usize> {
        let query = shape.bounding_box().inflate(clearance + CHECK_TOLERANCE);
        self.index
            .query(query)
            .into_iter()
            .filter(|&i| {
                let other = &self.items[i];
                other.net != net
                    && other.shape.shares_layer(shape)
                    && other.shape.gap(shape) < clearance - CHECK_TOLERANCE
            })
            .collect()
    }

    /// Whether `shape` keeps `clearance` from other nets and from the board edge.
    pub fn is_clear(&self, shape: &Shape, net: NetId, clearance: f64) -> bool {
        if !self.outline.is_empty() && shape.edge_gap(&self.outline) < clearance - CHECK_TOLERANCE {
            return false;
        }
        self.conflicts(shape, net, clearance).is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    Clearance,
    Short,
    BoardEdge,
    MissingVia,
}

#[derive(Clone, Debug)]
pub struct Violation {
    pub kind: ViolationKind,
    pub nets: (NetId, NetId),
    pub location: Point<f64>,
    pub gap: f64,
    pub required: f64,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::MissingVia => write!(
                f,
                "missing via on net {} at ({:.3}, {:.3})",
                self.nets.0.0, self.location.x, self.location.y
            ),
            ViolationKind::BoardEdge => write!(
                f,
                "net {} is {:.4}mm from the board edge (needs {:.4}mm) at ({:.3}, {:.3})",
                self.nets.0.0, self.gap, self.required, self.location.x, self.location.y
            ),
            _ => write!(
                f,
                "{:?} between nets {} and {}: gap {:.4}mm < {:.4}mm at ({:.3}, {:.3})",
                self.kind,
                self.nets.0.0,
                self.nets.1.0,
                self.gap,
                self.required,
                self.location.x,
                self.location.y
            ),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DrcReport {
    pub violations: Vec<Violation>,
    /// Nets with two or more pads whose copper does not join them all.
    pub unconnected: Vec<NetId>,
}

impl DrcReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }
}

fn representative_point(shape: &Shape) -> Point<f64> {
    match shape {
        Shape::Segment { a, b, .. } => Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0),
        Shape::Via { center, .. } => *center,
        Shape::Pad { rect, .. } => rect.center(),
    }
}

/// Check all board copper. `clearance_of` gives each net's clearance; a pair
/// must respect the larger of the two.
pub fn run_drc<F>(db: &BoardDB, clearance_of: F) -> DrcReport
where
    F: Fn(NetId) -> f64 + Sync,
{
    log::info!("Starting DRC on {} segments, {} vias", db.segments.len(), db.vias.len());
    let index = CopperIndex::from_board(db);
    let items = index.items();
    let max_clearance = items
        .iter()
        .map(|i| clearance_of(i.net))
        .fold(0.0, f64::max);

    let mut violations: Vec<Violation> = items
        .par_iter()
        .enumerate()
        .flat_map_iter(|(i, item)| {
            let query = item.shape.bounding_box().inflate(max_clearance + CHECK_TOLERANCE);
            let mut found = Vec::new();
            for j in index.index.query(query) {
                if j <= i {
                    continue;
                }
                let other = &items[j];
                let both_unconnected = !item.net.is_connected() && !other.net.is_connected();
                if (other.net == item.net && !both_unconnected) || !other.shape.shares_layer(&item.shape) {
                    continue;
                }
                if matches!((&item.shape, &other.shape), (Shape::Pad { .. }, Shape::Pad { .. })) {
                    continue;
                }
                let required = clearance_of(item.net).max(clearance_of(other.net));
                let gap = item.shape.gap(&other.shape);
                if gap < required - CHECK_TOLERANCE {
                    found.push(Violation {
                        kind: if gap <= 0.0 {
                            ViolationKind::Short
                        } else {
                            ViolationKind::Clearance
                        },
                        nets: (item.net, other.net),
                        location: representative_point(&item.shape),
                        gap,
                        required,
                    });
                }
            }
            if !index.outline.is_empty() {
                let required = clearance_of(item.net);
                let gap = item.shape.edge_gap(&index.outline);
                if gap < required - CHECK_TOLERANCE {
                    found.push(Violation {
                        kind: ViolationKind::BoardEdge,
                        nets: (item.net, item.net),
                        location: representative_point(&item.shape),
                        gap,
                        required,
                    });
                }
            }
            found
        })
        .collect();

    violations.extend(missing_vias(db));
    let unconnected = unconnected_nets(db);

    if violations.is_empty() {
        log::info!("\x1b[32mPASS\x1b[0m: No clearance violations.");
    } else {
        log::error!("\x1b[31mFAIL\x1b[0m: {} DRC violations", violations.len());
    }
    DrcReport {
        violations,
        unconnected,
    }
}

/// Same-net segments that meet on different layers with no via or
/// through-hole pad joining them there.
fn missing_vias(db: &BoardDB) -> Vec<Violation> {
    let mut out = Vec::new();
    for (i, s1) in db.segments.iter().enumerate() {
        for s2 in db.segments.iter().skip(i + 1) {
            if s1.net != s2.net || s1.layer == s2.layer {
                continue;
            }
            for p in [s1.start, s1.end] {
                let joins = p.approx_eq(s2.start, JOIN_TOLERANCE) || p.approx_eq(s2.end, JOIN_TOLERANCE);
                if !joins {
                    continue;
                }
                let via = db.vias.iter().any(|v| {
                    v.net == s1.net
                        && v.position.approx_eq(p, JOIN_TOLERANCE)
                        && v.connects(s1.layer, s2.layer)
                });
                let pad = db.pads.iter().any(|pad| {
                    pad.net == s1.net
                        && pad.on_layer(s1.layer)
                        && pad.on_layer(s2.layer)
                        && pad.rect().contains(p)
                });
                if !via && !pad {
                    out.push(Violation {
                        kind: ViolationKind::MissingVia,
                        nets: (s1.net, s1.net),
                        location: p,
                        gap: 0.0,
                        required: 0.0,
                    });
                }
            }
        }
    }
    out
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

fn unconnected_nets(db: &BoardDB) -> Vec<NetId> {
    let mut out: Vec<NetId> = db
        .nets
        .par_iter()
        .filter(|net| net.id.is_connected() && net.pads.len() >= 2)
        .filter_map(|net| {
            let mut shapes: Vec<Shape> = net
                .pads
                .iter()
                .map(|p| CopperItem::from_pad(&db.pads[p.index()]).shape)
                .collect();
            shapes.extend(
                db.segments
                    .iter()
                    .filter(|s| s.net == net.id)
                    .map(|s| CopperItem::from_segment(s).shape),
            );
            shapes.extend(
                db.vias
                    .iter()
                    .filter(|v| v.net == net.id)
                    .map(|v| CopperItem::from_via(v).shape),
            );
            let n = shapes.len();
            let mut parent: Vec<usize> = (0..n).collect();
            for i in 0..n {
                for j in (i + 1)..n {
                    let touching = match (&shapes[i], &shapes[j]) {
                        (Shape::Pad { .. }, Shape::Pad { .. }) => false,
                        (a, b) => a.shares_layer(b) && a.gap(b) <= JOIN_TOLERANCE,
                    };
                    if touching {
                        let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                        parent[ri] = rj;
                    }
                }
            }
            let root = find(&mut parent, 0);
            let joined = (1..net.pads.len()).all(|k| find(&mut parent, k) == root);
            if joined { None } else { Some(net.id) }
        })
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::core::{PadKind, PadShape};
    use crate::db::indices::FootprintId;

    fn board() -> BoardDB {
        let mut db = BoardDB::new();
        db.add_net(1, "A".into());
        db.add_net(2, "B".into());
        db.outline = Polygon::from_rect(&Rect::new(Point::new(0.0, 0.0), Point::new(20.0, 20.0)));
        db.add_footprint("U1".into(), "X".into(), Point::new(0.0, 0.0), 0.0, Layer::Top);
        for (num, x, net) in [("1", 2.0, 1), ("2", 10.0, 1)] {
            db.add_pad(Pad {
                footprint: FootprintId(0),
                number: num.into(),
                position: Point::new(x, 5.0),
                width: 1.0,
                height: 1.0,
                shape: PadShape::Rect,
                kind: PadKind::Smd,
                net: NetId(net),
                layers: vec![Layer::Top],
            });
        }
        db
    }

    #[test]
    fn test_clean_connected_trace() {
        let mut db = board();
        db.segments.push(Segment::new(
            Point::new(2.0, 5.0),
            Point::new(10.0, 5.0),
            0.25,
            Layer::Top,
            NetId(1),
        ));
        let report = run_drc(&db, |_| 0.2);
        assert!(report.is_clean(), "{:?}", report.violations);
        assert!(report.unconnected.is_empty());
    }

    #[test]
    fn test_clearance_and_short() {
        let mut db = board();
        db.segments.push(Segment::new(Point::new(2.0, 5.0), Point::new(10.0, 5.0), 0.25, Layer::Top, NetId(1)));
        // 0.3mm centre distance, 0.05mm gap
        db.segments.push(Segment::new(Point::new(4.0, 5.3), Point::new(8.0, 5.3), 0.25, Layer::Top, NetId(2)));
        // crosses net A
        db.segments.push(Segment::new(Point::new(6.0, 3.0), Point::new(6.0, 7.0), 0.25, Layer::Top, NetId(2)));
        // same place on the other layer is fine
        db.segments.push(Segment::new(Point::new(7.0, 3.0), Point::new(7.0, 7.0), 0.25, Layer::Bottom, NetId(2)));
        let report = run_drc(&db, |_| 0.2);
        assert_eq!(report.count(ViolationKind::Clearance), 1);
        assert_eq!(report.count(ViolationKind::Short), 1);
    }

    #[test]
    fn test_missing_via_and_open_net() {
        let mut db = board();
        db.segments.push(Segment::new(Point::new(2.0, 5.0), Point::new(6.0, 5.0), 0.25, Layer::Top, NetId(1)));
        db.segments.push(Segment::new(Point::new(6.0, 5.0), Point::new(10.0, 5.0), 0.25, Layer::Bottom, NetId(1)));
        let report = run_drc(&db, |_| 0.2);
        assert_eq!(report.count(ViolationKind::MissingVia), 1);
        // the bottom segment cannot reach the top-only pad
        assert_eq!(report.unconnected, vec![NetId(1)]);

        db.vias.push(Via::new(Point::new(6.0, 5.0), 0.3, 0.6, Layer::Top, Layer::Bottom, NetId(1)));
        let report = run_drc(&db, |_| 0.2);
        assert_eq!(report.count(ViolationKind::MissingVia), 0);
    }

    #[test]
    fn test_board_edge() {
        let mut db = board();
        db.vias.push(Via::new(Point::new(0.2, 10.0), 0.3, 0.6, Layer::Top, Layer::Bottom, NetId(2)));
        let report = run_drc(&db, |_| 0.2);
        assert_eq!(report.count(ViolationKind::BoardEdge), 1);
    }

    #[test]
    fn test_index_is_clear() {
        let db = board();
        let index = CopperIndex::from_board(&db);
        let near = Shape::Segment {
            a: Point::new(9.3, 4.0),
            b: Point::new(9.3, 6.0),
            half_width: 0.1,
            layer: Layer::Top,
        };
        assert!(!index.is_clear(&near, NetId(2), 0.2));
        assert!(index.is_clear(&near, NetId(1), 0.2));
        let bottom = Shape::Segment {
            a: Point::new(9.3, 4.0),
            b: Point::new(9.3, 6.0),
            half_width: 0.1,
            layer: Layer::Bottom,
        };
        assert!(index.is_clear(&bottom, NetId(2), 0.2));
    }
}
