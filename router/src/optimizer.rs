//! Geometric clean-up of routed copper.
//!
//! A route is cut into chains: runs of same-layer segments between pins,
//! where a pin is a pad centre, a via, a branch point or a dead end. Passes
//! only move the interior points of a chain, so pins and therefore
//! connectivity stay where they were. Every new piece of copper is checked
//! against a [`ClearanceOracle`] before it replaces the old one.

use crate::error::RouterError;
use crate::route::{Route, collapse_collinear};
use pcb_common::db::core::{BoardDB, Segment, Via};
use pcb_common::db::indices::NetId;
use pcb_common::db::layers::Layer;
use pcb_common::geom::distance::point_segment_distance;
use pcb_common::geom::point::Point;
use pcb_common::util::check::{CopperIndex, CopperItem};
use pcb_common::util::config::OptimizerConfig;
use std::collections::{HashMap, HashSet};

const EPS: f64 = 1e-6;
const KEY_SCALE: f64 = 1e4;

/// Answers whether a proposed segment keeps clear of other nets' copper and
/// the board edge.
pub trait ClearanceOracle {
    fn segment_clear(&self, seg: &Segment, clearance: f64) -> bool;
}

impl ClearanceOracle for CopperIndex {
    fn segment_clear(&self, seg: &Segment, clearance: f64) -> bool {
        self.is_clear(&CopperItem::from_segment(seg).shape, seg.net, clearance)
    }
}

/// What the passes changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub zigzags: usize,
    pub staircases: usize,
    pub vias_removed: usize,
    pub chamfers: usize,
}

impl std::ops::AddAssign for OptimizeStats {
    fn add_assign(&mut self, o: Self) {
        self.zigzags += o.zigzags;
        self.staircases += o.staircases;
        self.vias_removed += o.vias_removed;
        self.chamfers += o.chamfers;
    }
}

type PosKey = (i64, i64);
type NodeKey = (Layer, i64, i64);

fn pos_key(p: Point<f64>) -> PosKey {
    ((p.x * KEY_SCALE).round() as i64, (p.y * KEY_SCALE).round() as i64)
}

fn node_key(layer: Layer, p: Point<f64>) -> NodeKey {
    let (x, y) = pos_key(p);
    (layer, x, y)
}

fn parallel(a: Point<f64>, b: Point<f64>) -> bool {
    let scale = a.length() * b.length();
    scale > 0.0 && a.cross(b).abs() <= 1e-9 * scale
}

fn same_direction(a: Point<f64>, b: Point<f64>) -> bool {
    parallel(a, b) && a.dot(b) > 0.0
}

fn perpendicular(a: Point<f64>, b: Point<f64>) -> bool {
    let scale = a.length() * b.length();
    scale > 0.0 && a.dot(b).abs() <= 1e-9 * scale
}

/// Same-layer run of segments between two pins.
#[derive(Clone, Debug)]
struct Chain {
    layer: Layer,
    width: f64,
    points: Vec<Point<f64>>,
}

impl Chain {
    fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

/// Proposed geometry is checked one segment at a time.
struct Checker<'a, O: ClearanceOracle + ?Sized> {
    oracle: &'a O,
    clearance: f64,
    net: NetId,
}

impl<O: ClearanceOracle + ?Sized> Checker<'_, O> {
    fn clear(&self, points: &[Point<f64>], layer: Layer, width: f64) -> bool {
        points.windows(2).all(|w| {
            w[0].approx_eq(w[1], EPS)
                || self
                    .oracle
                    .segment_clear(&Segment::new(w[0], w[1], width, layer, self.net), self.clearance)
        })
    }
}

/// Points where a segment of the route may be joined in its middle.
fn junction_candidates(route: &Route) -> Vec<(Option<Layer>, Point<f64>)> {
    let mut out: Vec<(Option<Layer>, Point<f64>)> = Vec::new();
    for s in &route.segments {
        out.push((Some(s.layer), s.start));
        out.push((Some(s.layer), s.end));
    }
    out.extend(route.vias.iter().map(|v| (None, v.position)));
    out.extend(route.terminals.iter().map(|&t| (None, t)));
    out
}

/// Cut segments wherever another piece of the same net ends on them, so the
/// joint becomes a node.
fn split_at_junctions(route: &Route) -> Vec<Segment> {
    let candidates = junction_candidates(route);
    let mut out = Vec::with_capacity(route.segments.len());
    for s in &route.segments {
        let dir = s.end - s.start;
        let len2 = dir.dot(dir);
        let mut cuts: Vec<f64> = candidates
            .iter()
            .filter(|(layer, p)| {
                layer.is_none_or(|l| l == s.layer)
                    && !p.approx_eq(s.start, EPS)
                    && !p.approx_eq(s.end, EPS)
                    && point_segment_distance(*p, s.start, s.end) < EPS
            })
            .map(|(_, p)| (*p - s.start).dot(dir) / len2)
            .collect();
        if cuts.is_empty() || len2 <= 0.0 {
            out.push(*s);
            continue;
        }
        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|a, b| (*a - *b).abs() * len2.sqrt() < EPS);
        let mut from = s.start;
        for t in cuts {
            let at = s.start + dir * t;
            out.push(Segment::new(from, at, s.width, s.layer, s.net));
            from = at;
        }
        out.push(Segment::new(from, s.end, s.width, s.layer, s.net));
    }
    out
}

/// Node adjacency of a segment list.
struct Graph {
    edges: HashMap<NodeKey, Vec<usize>>,
    layers_at: HashMap<PosKey, Vec<Layer>>,
}

impl Graph {
    fn build(segments: &[Segment]) -> Self {
        let mut edges: HashMap<NodeKey, Vec<usize>> = HashMap::new();
        let mut layers_at: HashMap<PosKey, Vec<Layer>> = HashMap::new();
        for (i, s) in segments.iter().enumerate() {
            for p in [s.start, s.end] {
                edges.entry(node_key(s.layer, p)).or_default().push(i);
                let layers = layers_at.entry(pos_key(p)).or_default();
                if !layers.contains(&s.layer) {
                    layers.push(s.layer);
                }
            }
        }
        Self { edges, layers_at }
    }

    fn degree(&self, layer: Layer, p: Point<f64>) -> usize {
        self.edges.get(&node_key(layer, p)).map_or(0, |e| e.len())
    }
}

/// Pin positions: pad centres, vias, multi-layer pads and any point where
/// copper on different layers meets.
fn pin_positions(route: &Route, graph: &Graph) -> HashSet<PosKey> {
    let mut pins: HashSet<PosKey> = HashSet::new();
    pins.extend(route.terminals.iter().map(|&p| pos_key(p)));
    pins.extend(route.through_pads.iter().map(|&p| pos_key(p)));
    pins.extend(route.vias.iter().map(|v| pos_key(v.position)));
    pins.extend(
        graph
            .layers_at
            .iter()
            .filter(|(_, layers)| layers.len() > 1)
            .map(|(k, _)| *k),
    );
    pins
}

fn extract_chains(segments: &[Segment], pins: &HashSet<PosKey>, graph: &Graph) -> Vec<Chain> {
    let through = |layer: Layer, p: Point<f64>| -> Option<[usize; 2]> {
        if pins.contains(&pos_key(p)) {
            return None;
        }
        match graph.edges.get(&node_key(layer, p)).map(|e| e.as_slice()) {
            Some(&[a, b]) if (segments[a].width - segments[b].width).abs() < EPS => Some([a, b]),
            _ => None,
        }
    };

    let mut used = vec![false; segments.len()];
    let mut chains = Vec::new();
    for first in 0..segments.len() {
        if used[first] {
            continue;
        }
        let s = segments[first];
        let start = if through(s.layer, s.start).is_none() {
            s.start
        } else if through(s.layer, s.end).is_none() {
            s.end
        } else {
            continue;
        };
        let mut points = vec![start];
        let mut at = start;
        let mut seg = first;
        loop {
            used[seg] = true;
            let cur = segments[seg];
            let next = if node_key(cur.layer, cur.start) == node_key(cur.layer, at) {
                cur.end
            } else {
                cur.start
            };
            points.push(next);
            at = next;
            let Some(pair) = through(s.layer, next) else {
                break;
            };
            let other = if pair[0] == seg { pair[1] } else { pair[0] };
            if used[other] {
                break;
            }
            seg = other;
        }
        chains.push(Chain {
            layer: s.layer,
            width: s.width,
            points,
        });
    }
    // Closed loops have no pin to start from; keep them as they are.
    for (i, s) in segments.iter().enumerate() {
        if !used[i] {
            chains.push(Chain {
                layer: s.layer,
                width: s.width,
                points: vec![s.start, s.end],
            });
        }
    }
    chains
}

fn chains_to_segments(chains: &[Chain], net: NetId) -> Vec<Segment> {
    chains
        .iter()
        .flat_map(|c| {
            c.points
                .windows(2)
                .filter(|w| !w[0].approx_eq(w[1], EPS))
                .map(move |w| Segment::new(w[0], w[1], c.width, c.layer, net))
        })
        .collect()
}

fn chain_structure(route: &Route, segments: &[Segment]) -> Vec<Chain> {
    let graph = Graph::build(segments);
    let pins = pin_positions(route, &graph);
    extract_chains(segments, &pins, &graph)
}

/// Replace a Z (two parallel legs joined by a short jog) with an L, or with
/// one straight segment when no L fits.
fn eliminate_zigzags<O: ClearanceOracle + ?Sized>(
    chain: &mut Chain,
    check: &Checker<'_, O>,
    max_jog: f64,
    leave_staircases: bool,
) -> usize {
    let mut count = 0;
    let mut i = 0;
    while i + 3 < chain.points.len() {
        let p = &chain.points;
        let (a, b, c, d) = (p[i], p[i + 1], p[i + 2], p[i + 3]);
        let (d1, d2, d3) = (b - a, c - b, d - c);
        let is_zigzag =
            same_direction(d1, d3) && !parallel(d1, d2) && d2.length() <= max_jog + EPS;
        let in_staircase = leave_staircases
            && ((i > 0 && same_direction(a - p[i - 1], d2))
                || (i + 4 < p.len() && same_direction(p[i + 4] - d, d2)));
        if !is_zigzag || in_staircase {
            i += 1;
            continue;
        }
        let u = d1.normalized();
        let along = (d - a).dot(u);
        let candidates = [
            vec![a, a + u * along, d],
            vec![a, d - u * along, d],
            vec![a, d],
        ];
        match candidates.iter().find(|pts| check.clear(pts, chain.layer, chain.width)) {
            Some(pts) => {
                chain.points.splice(i..=i + 3, pts.iter().copied());
                chain.points = collapse_collinear(&chain.points);
                count += 1;
                i = i.saturating_sub(2);
            }
            None => i += 1,
        }
    }
    count
}

/// Longest run of at least four segments starting at `s` that alternates
/// between two fixed directions.
fn staircase_end(points: &[Point<f64>], s: usize) -> Option<usize> {
    let seg = |k: usize| points[k + 1] - points[k];
    if s + 4 >= points.len() {
        return None;
    }
    let (u, v) = (seg(s), seg(s + 1));
    if parallel(u, v) {
        return None;
    }
    let mut e = s + 1;
    while e + 2 < points.len() {
        let next = seg(e + 1);
        let expected = if (e + 1 - s) % 2 == 0 { u } else { v };
        if !same_direction(next, expected) {
            break;
        }
        e += 1;
    }
    (e - s + 1 >= 4).then_some(e)
}

/// Replace stair-step runs by a 45 degree run plus a straight, an L, or a
/// single straight segment, whichever clears first.
fn compress_staircase<O: ClearanceOracle + ?Sized>(chain: &mut Chain, check: &Checker<'_, O>) -> usize {
    let mut count = 0;
    let mut s = 0;
    while s + 4 < chain.points.len() {
        let Some(e) = staircase_end(&chain.points, s) else {
            s += 1;
            continue;
        };
        let p = &chain.points;
        let (a, b) = (p[s], p[e + 1]);
        let (u, v) = ((p[s + 1] - p[s]).normalized(), (p[s + 2] - p[s + 1]).normalized());
        let delta = b - a;
        let (du, dv) = (delta.dot(u), delta.dot(v));

        let mut candidates: Vec<Vec<Point<f64>>> = Vec::new();
        if perpendicular(u, v) {
            let m = du.min(dv);
            candidates.push(vec![a, a + (u + v) * m, b]);
            candidates.push(vec![a, a + u * (du - m) + v * (dv - m), b]);
            candidates.push(vec![a, a + u * du, b]);
            candidates.push(vec![a, a + v * dv, b]);
        }
        candidates.push(vec![a, b]);

        match candidates.iter().find(|pts| check.clear(pts, chain.layer, chain.width)) {
            Some(pts) => {
                let pts: Vec<Point<f64>> = collapse_collinear(pts);
                let next = s + pts.len() - 1;
                chain.points.splice(s..=e + 1, pts);
                count += 1;
                s = next;
            }
            None => s += 1,
        }
    }
    count
}

/// Cut each right-angle corner with a 45 degree chamfer.
fn convert_45_corners<O: ClearanceOracle + ?Sized>(
    chain: &mut Chain,
    check: &Checker<'_, O>,
    chamfer: f64,
) -> usize {
    let mut count = 0;
    let mut i = 1;
    while i + 1 < chain.points.len() {
        let p = &chain.points;
        let (d1, d2) = (p[i] - p[i - 1], p[i + 1] - p[i]);
        if !perpendicular(d1, d2) {
            i += 1;
            continue;
        }
        let c = chamfer.min(d1.length() / 2.0).min(d2.length() / 2.0);
        if c <= EPS {
            i += 1;
            continue;
        }
        let q1 = p[i] - d1.normalized() * c;
        let q2 = p[i] + d2.normalized() * c;
        if check.clear(&[q1, q2], chain.layer, chain.width) {
            chain.points.splice(i..=i, [q1, q2]);
            count += 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    count
}

/// A chain that dips to another layer between two vias and comes straight
/// back. Returns the chain index, the layer to pull it onto and the two via
/// indices.
fn find_excursion(route: &Route, chains: &[Chain], graph: &Graph, max_len: f64, skip: &HashSet<usize>) -> Option<(usize, Layer, usize, usize)> {
    let fixed: HashSet<PosKey> = route
        .terminals
        .iter()
        .chain(&route.through_pads)
        .map(|&p| pos_key(p))
        .collect();
    let via_at = |p: Point<f64>| route.vias.iter().position(|v| v.position.approx_eq(p, EPS));

    for (ci, chain) in chains.iter().enumerate() {
        if skip.contains(&ci) || chain.points.len() < 2 || chain.length() > max_len + EPS {
            continue;
        }
        let (Some(&p0), Some(&pn)) = (chain.points.first(), chain.points.last()) else {
            continue;
        };
        if p0.approx_eq(pn, EPS) || fixed.contains(&pos_key(p0)) || fixed.contains(&pos_key(pn)) {
            continue;
        }
        let (Some(v0), Some(v1)) = (via_at(p0), via_at(pn)) else {
            continue;
        };
        let other_layer = |p: Point<f64>| -> Option<Layer> {
            let layers = graph.layers_at.get(&pos_key(p))?;
            match layers.as_slice() {
                &[a, b] => {
                    let other = if a == chain.layer { b } else { a };
                    (graph.degree(chain.layer, p) == 1 && graph.degree(other, p) == 1).then_some(other)
                }
                _ => None,
            }
        };
        let (Some(l0), Some(l1)) = (other_layer(p0), other_layer(pn)) else {
            continue;
        };
        if l0 == l1 {
            return Some((ci, l0, v0, v1));
        }
    }
    None
}

/// Pull short other-layer excursions back onto the layer they left, removing
/// both vias.
fn minimize_vias<O: ClearanceOracle + ?Sized>(
    route: &mut Route,
    check: &Checker<'_, O>,
    max_detour: f64,
) -> usize {
    let mut removed = 0;
    let mut rejected: HashSet<(PosKey, PosKey)> = HashSet::new();
    loop {
        let graph = Graph::build(&route.segments);
        let pins = pin_positions(route, &graph);
        let chains = extract_chains(&route.segments, &pins, &graph);
        let skip: HashSet<usize> = chains
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                let ends = (pos_key(c.points[0]), pos_key(c.points[c.points.len() - 1]));
                rejected.contains(&ends)
            })
            .map(|(i, _)| i)
            .collect();
        let Some((ci, layer, v0, v1)) = find_excursion(route, &chains, &graph, max_detour, &skip) else {
            break;
        };
        let chain = &chains[ci];
        let (p0, pn) = (chain.points[0], chain.points[chain.points.len() - 1]);
        let straight = vec![p0, pn];
        let replacement = [straight, chain.points.clone()]
            .into_iter()
            .find(|pts| check.clear(pts, layer, chain.width));
        let Some(points) = replacement else {
            rejected.insert((pos_key(p0), pos_key(pn)));
            continue;
        };

        let mut rest: Vec<Chain> = chains
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != ci)
            .map(|(_, c)| c.clone())
            .collect();
        rest.push(Chain {
            layer,
            width: chain.width,
            points,
        });
        route.segments = chains_to_segments(&rest, route.net);
        let (hi, lo) = (v0.max(v1), v0.min(v1));
        route.vias.remove(hi);
        route.vias.remove(lo);
        removed += 2;
    }
    removed
}

struct Components {
    parent: Vec<usize>,
}

impl Components {
    fn add(&mut self) -> usize {
        self.parent.push(self.parent.len());
        self.parent.len() - 1
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Connected pieces of a route's copper; vias and through-hole pads join
/// layers.
fn component_count(route: &Route) -> usize {
    let mut sets = Components { parent: Vec::new() };
    let mut ids: HashMap<NodeKey, usize> = HashMap::new();
    let mut by_pos: HashMap<PosKey, Vec<usize>> = HashMap::new();
    for s in &route.segments {
        let mut ends = [0; 2];
        for (k, p) in [s.start, s.end].into_iter().enumerate() {
            let id = *ids.entry(node_key(s.layer, p)).or_insert_with(|| sets.add());
            by_pos.entry(pos_key(p)).or_default().push(id);
            ends[k] = id;
        }
        sets.union(ends[0], ends[1]);
    }
    let joins = route
        .vias
        .iter()
        .map(|v| v.position)
        .chain(route.through_pads.iter().copied());
    for p in joins {
        if let Some(nodes) = by_pos.get(&pos_key(p)) {
            for w in nodes.windows(2) {
                sets.union(w[0], w[1]);
            }
        }
    }
    let mut roots: Vec<usize> = (0..sets.parent.len()).map(|i| sets.find(i)).collect();
    roots.sort_unstable();
    roots.dedup();
    roots.len()
}

/// Pad centres that copper of the route ends on.
fn landed_terminals(route: &Route) -> Vec<Point<f64>> {
    route
        .terminals
        .iter()
        .copied()
        .filter(|t| {
            route
                .segments
                .iter()
                .any(|s| s.start.approx_eq(*t, EPS) || s.end.approx_eq(*t, EPS))
        })
        .collect()
}

fn check_invariants(before: &Route, after: &Route, via: &Via) -> Result<(), RouterError> {
    let invariant = |reason: String| RouterError::OptimizerInvariant {
        net: before.net_name.clone(),
        reason,
    };
    let landed = landed_terminals(after);
    if let Some(t) = landed_terminals(before).into_iter().find(|t| !landed.iter().any(|l| l.approx_eq(*t, EPS))) {
        return Err(invariant(format!("pad at ({:.3}, {:.3}) lost its copper", t.x, t.y)));
    }
    let mut probe = after.clone();
    let missing = probe.validate_layer_transitions(via.drill, via.diameter);
    if missing > 0 {
        return Err(invariant(format!("{} layer changes without a via", missing)));
    }
    if component_count(after) > component_count(before) {
        return Err(invariant("copper split into more pieces".to_string()));
    }
    Ok(())
}

/// Run the enabled passes over one route.
pub fn optimize_route<O: ClearanceOracle + ?Sized>(
    route: &Route,
    oracle: &O,
    clearance: f64,
    cfg: &OptimizerConfig,
) -> Result<(Route, OptimizeStats), RouterError> {
    let mut stats = OptimizeStats::default();
    if !cfg.enabled || route.segments.is_empty() {
        return Ok((route.clone(), stats));
    }
    let check = Checker {
        oracle,
        clearance,
        net: route.net,
    };
    let template = route
        .vias
        .first()
        .copied()
        .unwrap_or_else(|| Via::new(Point::default(), 0.3, 0.6, Layer::Top, Layer::Bottom, route.net));

    let mut baseline = route.clone();
    baseline.segments = split_at_junctions(route);
    let mut out = baseline.clone();
    if cfg.minimize_vias {
        stats.vias_removed = minimize_vias(&mut out, &check, cfg.max_via_detour);
    }

    let mut chains = chain_structure(&out, &out.segments);
    for chain in &mut chains {
        if cfg.merge_collinear {
            chain.points = collapse_collinear(&chain.points);
        }
        if cfg.eliminate_zigzags {
            stats.zigzags += eliminate_zigzags(chain, &check, cfg.max_jog, cfg.compress_staircase);
        }
        if cfg.compress_staircase {
            stats.staircases += compress_staircase(chain, &check);
        }
        if cfg.merge_collinear {
            chain.points = collapse_collinear(&chain.points);
        }
        if cfg.convert_45_corners {
            stats.chamfers += convert_45_corners(chain, &check, cfg.chamfer_length);
        }
    }
    out.segments = chains_to_segments(&chains, out.net);

    check_invariants(&baseline, &out, &template)?;
    Ok((out, stats))
}

/// Optimise every route, each against the pads, fixed copper and every other
/// route. Copper a route gives up stays in the index, so later routes never
/// rely on space that was freed. A route that fails the post-checks aborts
/// the whole pass.
pub fn optimize_all(
    db: &BoardDB,
    routes: &mut [Route],
    clearance: f64,
    cfg: &OptimizerConfig,
) -> Result<OptimizeStats, RouterError> {
    let mut total = OptimizeStats::default();
    if !cfg.enabled {
        return Ok(total);
    }
    let segments: Vec<Segment> = db
        .segments
        .iter()
        .chain(routes.iter().flat_map(|r| r.segments.iter()))
        .copied()
        .collect();
    let vias: Vec<Via> = db
        .vias
        .iter()
        .chain(routes.iter().flat_map(|r| r.vias.iter()))
        .copied()
        .collect();
    let mut index = CopperIndex::from_parts(db, &segments, &vias);

    for route in routes.iter_mut() {
        let before = route.segments.len();
        let (optimized, stats) =
            optimize_route(route, &index, clearance, cfg).inspect_err(|e| log::error!("{}", e))?;
        log::debug!(
            "{}: {} -> {} segments, {:?}",
            route.net_name,
            before,
            optimized.segments.len(),
            stats
        );
        for s in &optimized.segments {
            index.insert(CopperItem::from_segment(s));
        }
        *route = optimized;
        total += stats;
    }
    log::info!(
        "Optimizer: {} zigzags, {} staircases, {} vias removed, {} chamfers",
        total.zigzags,
        total.staircases,
        total.vias_removed,
        total.chamfers
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_common::geom::rect::Rect;

    struct OpenBoard;

    impl ClearanceOracle for OpenBoard {
        fn segment_clear(&self, _seg: &Segment, _clearance: f64) -> bool {
            true
        }
    }

    /// Rejects anything passing through one of its boxes.
    struct KeepOut(Vec<Rect>);

    impl ClearanceOracle for KeepOut {
        fn segment_clear(&self, seg: &Segment, clearance: f64) -> bool {
            let steps = 64;
            self.0.iter().all(|r| {
                let zone = r.inflate(clearance + seg.width / 2.0);
                (0..=steps).all(|k| {
                    let t = k as f64 / steps as f64;
                    !zone.contains_strict(seg.start + (seg.end - seg.start) * t, 0.0)
                })
            })
        }
    }

    fn boxed(min: (f64, f64), max: (f64, f64)) -> Rect {
        Rect::new(pt(min.0, min.1), pt(max.0, max.1))
    }

    fn pt(x: f64, y: f64) -> Point<f64> {
        Point::new(x, y)
    }

    fn route_through(points: &[(f64, f64)], layer: Layer) -> Route {
        let mut r = Route::new(NetId(1), "N1");
        for w in points.windows(2) {
            r.segments.push(Segment::new(pt(w[0].0, w[0].1), pt(w[1].0, w[1].1), 0.2, layer, NetId(1)));
        }
        r.terminals = vec![pt(points[0].0, points[0].1), pt(points[points.len() - 1].0, points[points.len() - 1].1)];
        r
    }

    fn cfg() -> OptimizerConfig {
        OptimizerConfig::default()
    }

    #[test]
    fn test_layer_change_without_via_is_an_error() {
        let mut top = route_through(&[(0.0, 0.0), (1.0, 0.0)], Layer::Top);
        top.segments
            .push(Segment::new(pt(1.0, 0.0), pt(1.0, 1.0), 0.2, Layer::Bottom, NetId(1)));
        top.terminals = vec![pt(0.0, 0.0), pt(1.0, 1.0)];

        let err = optimize_route(&top, &OpenBoard, 0.2, &cfg()).unwrap_err();
        assert!(matches!(err, RouterError::OptimizerInvariant { .. }));

        let mut routes = vec![top];
        let result = optimize_all(&BoardDB::new(), &mut routes, 0.2, &cfg());
        assert!(matches!(result, Err(RouterError::OptimizerInvariant { .. })));
    }

    #[test]
    fn test_optimize_all_keeps_good_routes() {
        let mut routes = vec![route_through(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)], Layer::Top)];
        let stats = optimize_all(&BoardDB::new(), &mut routes, 0.2, &cfg()).unwrap();
        assert_eq!(stats, OptimizeStats::default());
        assert_eq!(routes[0].segments.len(), 1);
    }

    #[test]
    fn test_merge_collinear() {
        let r = route_through(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (3.0, 1.0)], Layer::Top);
        let (out, _) = optimize_route(&r, &OpenBoard, 0.2, &cfg()).unwrap();
        assert_eq!(out.segments.len(), 2);
        assert!((out.length() - r.length()).abs() < 1e-9);
    }

    #[test]
    fn test_zigzag_becomes_l() {
        let r = route_through(&[(0.0, 0.0), (2.0, 0.0), (2.0, 0.5), (4.0, 0.5)], Layer::Top);
        let (out, stats) = optimize_route(&r, &OpenBoard, 0.2, &cfg()).unwrap();
        assert_eq!(stats.zigzags, 1);
        assert_eq!(out.segments.len(), 2);
        assert!((out.length() - 4.5).abs() < 1e-9);
        assert_eq!(out.segments[0].start, pt(0.0, 0.0));
        assert_eq!(out.segments[1].end, pt(4.0, 0.5));
    }

    #[test]
    fn test_zigzag_falls_back_when_blocked() {
        let r = route_through(&[(0.0, 0.0), (2.0, 0.0), (2.0, 0.5), (4.0, 0.5)], Layer::Top);

        // First L corner taken: the jog moves to the start.
        let corner = KeepOut(vec![boxed((3.8, -0.3), (4.3, 0.05))]);
        let (out, stats) = optimize_route(&r, &corner, 0.0, &cfg()).unwrap();
        assert_eq!(stats.zigzags, 1);
        assert_eq!(out.segments.len(), 2);
        assert!(out.segments[0].end.approx_eq(pt(0.0, 0.5), 1e-9));

        // Both corners taken: a single diagonal.
        let corners = KeepOut(vec![boxed((3.8, -0.3), (4.3, 0.05)), boxed((-0.3, 0.45), (0.2, 0.8))]);
        let (out, stats) = optimize_route(&r, &corners, 0.0, &cfg()).unwrap();
        assert_eq!(stats.zigzags, 1);
        assert_eq!(out.segments.len(), 1);
    }

    #[test]
    fn test_zigzag_kept_when_nothing_fits() {
        let r = route_through(&[(0.0, 0.0), (2.0, 0.0), (2.0, 0.5), (4.0, 0.5)], Layer::Top);
        let everything = KeepOut(vec![
            boxed((3.8, -0.3), (4.3, 0.05)),
            boxed((-0.3, 0.45), (0.2, 0.8)),
            boxed((1.0, 0.1), (1.1, 0.2)),
        ]);
        let (out, stats) = optimize_route(&r, &everything, 0.0, &cfg()).unwrap();
        assert_eq!(stats.zigzags, 0);
        assert_eq!(out.segments, r.segments);
    }

    #[test]
    fn test_staircase_to_45() {
        let r = route_through(
            &[(0.0, 0.0), (0.25, 0.0), (0.25, 0.25), (0.5, 0.25), (0.5, 0.5), (0.75, 0.5), (0.75, 0.75), (2.0, 0.75)],
            Layer::Top,
        );
        let (out, stats) = optimize_route(&r, &OpenBoard, 0.2, &cfg()).unwrap();
        assert_eq!(stats.staircases, 1);
        assert_eq!(out.segments.len(), 2);
        let d = out.segments[0].end - out.segments[0].start;
        assert!((d.x - d.y).abs() < 1e-9);
        assert_eq!(out.segments[1].end, pt(2.0, 0.75));
    }

    #[test]
    fn test_chamfer_corners() {
        let r = route_through(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)], Layer::Top);
        let mut c = cfg();
        c.convert_45_corners = true;
        c.chamfer_length = 0.5;
        let (out, stats) = optimize_route(&r, &OpenBoard, 0.2, &c).unwrap();
        assert_eq!(stats.chamfers, 1);
        assert_eq!(out.segments.len(), 3);
        assert!(out.segments[1].start.approx_eq(pt(1.5, 0.0), 1e-9));
        assert!(out.segments[1].end.approx_eq(pt(2.0, 0.5), 1e-9));
    }

    #[test]
    fn test_via_excursion_removed() {
        let mut r = Route::new(NetId(1), "N1");
        let seg = |a: (f64, f64), b: (f64, f64), l| Segment::new(pt(a.0, a.1), pt(b.0, b.1), 0.2, l, NetId(1));
        r.segments = vec![
            seg((0.0, 0.0), (1.0, 0.0), Layer::Top),
            seg((1.0, 0.0), (2.0, 0.0), Layer::Bottom),
            seg((2.0, 0.0), (3.0, 0.0), Layer::Top),
        ];
        r.vias = vec![
            Via::new(pt(1.0, 0.0), 0.3, 0.6, Layer::Top, Layer::Bottom, NetId(1)),
            Via::new(pt(2.0, 0.0), 0.3, 0.6, Layer::Top, Layer::Bottom, NetId(1)),
        ];
        r.terminals = vec![pt(0.0, 0.0), pt(3.0, 0.0)];
        let (out, stats) = optimize_route(&r, &OpenBoard, 0.2, &cfg()).unwrap();
        assert_eq!(stats.vias_removed, 2);
        assert!(out.vias.is_empty());
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.segments[0].layer, Layer::Top);

        // Not when the top layer is taken.
        let taken = KeepOut(vec![boxed((1.4, -0.1), (1.6, 0.1))]);
        let (out, stats) = optimize_route(&r, &taken, 0.0, &cfg()).unwrap();
        assert_eq!(stats.vias_removed, 0);
        assert_eq!(out.vias.len(), 2);
    }

    #[test]
    fn test_branches_keep_junction() {
        // A T: trunk along x, branch joining its middle.
        let mut r = route_through(&[(0.0, 0.0), (4.0, 0.0)], Layer::Top);
        r.segments.push(Segment::new(pt(2.0, 0.0), pt(2.0, 3.0), 0.2, Layer::Top, NetId(1)));
        r.terminals.push(pt(2.0, 3.0));
        let (out, _) = optimize_route(&r, &OpenBoard, 0.2, &cfg()).unwrap();
        assert_eq!(out.segments.len(), 3);
        assert_eq!(component_count(&out), 1);
    }

    #[test]
    fn test_endpoints_and_vias_survive() {
        let r = Route::from_waypoints(
            NetId(1),
            "N1",
            &[
                crate::route::Waypoint::new(pt(0.0, 0.0), Layer::Top),
                crate::route::Waypoint::new(pt(1.0, 0.0), Layer::Top),
                crate::route::Waypoint::new(pt(1.0, 0.0), Layer::Bottom),
                crate::route::Waypoint::new(pt(1.0, 0.25), Layer::Bottom),
                crate::route::Waypoint::new(pt(3.0, 0.25), Layer::Bottom),
            ],
            0.2,
            0.3,
            0.6,
        );
        let mut r = r;
        r.terminals = vec![pt(0.0, 0.0), pt(3.0, 0.25)];
        let (out, _) = optimize_route(&r, &OpenBoard, 0.2, &cfg()).unwrap();
        assert_eq!(out.vias.len(), 1);
        assert_eq!(landed_terminals(&out).len(), 2);
        let mut probe = out.clone();
        assert_eq!(probe.validate_layer_transitions(0.3, 0.6), 0);
    }
}
