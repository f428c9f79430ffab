use super::RoutingGrid;
use crate::utils::conversion::GridConverter;
use pcb_common::db::core::{BoardDB, Pad, Segment, Via};
use pcb_common::db::indices::NetId;
use pcb_common::db::layers::LayerStack;
use pcb_common::geom::coord::GridCoord;
use pcb_common::geom::distance::{point_rect_distance, point_segment_distance};
use pcb_common::geom::point::Point;
use pcb_common::geom::polygon::Polygon;
use pcb_common::geom::rect::Rect;

// Cells closer than this to a keepout boundary count as outside it.
const SLACK: f64 = 1e-6;

/// Fixed copper reserving a cell: nobody, one net, or several nets / net 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Keepout {
    #[default]
    Free,
    Net(NetId),
    Shared,
}

impl Keepout {
    fn add(self, net: NetId) -> Keepout {
        if !net.is_connected() {
            return Keepout::Shared;
        }
        match self {
            Keepout::Free => Keepout::Net(net),
            Keepout::Net(n) if n == net => self,
            _ => Keepout::Shared,
        }
    }

    pub fn allows(self, net: NetId) -> bool {
        match self {
            Keepout::Free => true,
            Keepout::Net(n) => n == net,
            Keepout::Shared => false,
        }
    }
}

/// Worst-case copper sizes the grid keeps space for, in millimetres.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridRules {
    pub trace_width: f64,
    pub clearance: f64,
    pub via_diameter: f64,
}

impl GridRules {
    /// Centre distance two foreign traces must keep.
    pub fn trace_halo(&self) -> f64 {
        self.trace_width + self.clearance
    }

    pub fn via_trace(&self) -> f64 {
        self.via_diameter / 2.0 + self.clearance + self.trace_width / 2.0
    }

    pub fn via_via(&self) -> f64 {
        self.via_diameter + self.clearance
    }

    /// How far a trace centre stays from fixed copper edges.
    pub fn trace_margin(&self) -> f64 {
        self.clearance + self.trace_width / 2.0
    }

    pub fn via_margin(&self) -> f64 {
        self.clearance + self.via_diameter / 2.0
    }
}

/// A layer change at one cell, spanning grid layers `lo..=hi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViaSite {
    pub x: u32,
    pub y: u32,
    pub lo: u8,
    pub hi: u8,
}

impl ViaSite {
    pub fn new(x: u32, y: u32, a: u8, b: u8) -> Self {
        Self {
            x,
            y,
            lo: a.min(b),
            hi: a.max(b),
        }
    }
}

/// Cells a committed route occupies; sorted and free of duplicates so each
/// net counts once per cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Footprint {
    claims: Vec<usize>,
    via_claims: Vec<usize>,
    path: Vec<usize>,
}

impl Footprint {
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn claims(&self) -> &[usize] {
        &self.claims
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

fn key(net: NetId) -> u32 {
    net.0.wrapping_add(1)
}

fn halo(radius: f64, resolution: f64) -> Vec<(i32, i32)> {
    let reach = (radius / resolution).ceil() as i32;
    let limit = radius * radius - 1e-9;
    let mut out = Vec::new();
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let fx = dx as f64 * resolution;
            let fy = dy as f64 * resolution;
            if fx * fx + fy * fy < limit {
                out.push((dx, dy));
            }
        }
    }
    out
}

/// Flat per-cell routing state.
///
/// Fixed copper (pads, board edge, copper already on the board) lives in the
/// keepout layers. Routed nets live in the claim counters: a committed route
/// claims every cell within trace-to-trace distance of its path, so a cell is
/// legal for a net when no other net claims it. Counters carry an XOR key of
/// the claiming nets, which identifies the owner while the count is one.
#[derive(Clone)]
pub struct DenseGrid {
    width: u32,
    height: u32,
    layers: u8,
    converter: GridConverter,
    stack: LayerStack,
    rules: GridRules,

    blocked: Vec<bool>,
    trace_keepout: Vec<Keepout>,
    via_keepout: Vec<Keepout>,
    terminal: Vec<Option<NetId>>,

    claims: Vec<u16>,
    claim_key: Vec<u32>,
    via_claims: Vec<u16>,
    via_claim_key: Vec<u32>,
    paths: Vec<u16>,
    path_key: Vec<u32>,
    history: Vec<f32>,

    trace_halo: Vec<(i32, i32)>,
    via_trace_halo: Vec<(i32, i32)>,
    via_via_halo: Vec<(i32, i32)>,
}

impl DenseGrid {
    pub fn new(converter: GridConverter, stack: LayerStack, rules: GridRules) -> Self {
        let width = converter.width();
        let height = converter.height();
        let layers = stack.len().max(1) as u8;
        let size = (width as usize) * (height as usize) * (layers as usize);

        if size > 200_000_000 {
            log::warn!(
                "Allocating large DenseGrid: {} cells. Ensure sufficient RAM.",
                size
            );
        }

        let res = converter.resolution();
        Self {
            width,
            height,
            layers,
            trace_halo: halo(rules.trace_halo(), res),
            via_trace_halo: halo(rules.via_trace(), res),
            via_via_halo: halo(rules.via_via(), res),
            converter,
            stack,
            rules,
            blocked: vec![false; size],
            trace_keepout: vec![Keepout::Free; size],
            via_keepout: vec![Keepout::Free; size],
            terminal: vec![None; size],
            claims: vec![0; size],
            claim_key: vec![0; size],
            via_claims: vec![0; size],
            via_claim_key: vec![0; size],
            paths: vec![0; size],
            path_key: vec![0; size],
            history: vec![0.0; size],
        }
    }

    /// Grid over the board outline with every pad marked as fixed copper.
    pub fn from_board(db: &BoardDB, resolution: f64, rules: GridRules) -> Self {
        let area = if db.outline.is_empty() {
            db.board_bounds(1.0)
        } else {
            db.outline.bounding_box()
        };
        let converter = GridConverter::for_area(&area, resolution);
        let mut grid = Self::new(converter, db.stack.clone(), rules);
        if !db.outline.is_empty() {
            grid.mark_outline(&db.outline);
        }
        for pad in &db.pads {
            grid.mark_pad(pad);
        }
        log::debug!(
            "Routing grid {}x{}x{} at {}mm",
            grid.width,
            grid.height,
            grid.layers,
            resolution
        );
        grid
    }

    pub fn converter(&self) -> &GridConverter {
        &self.converter
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn rules(&self) -> &GridRules {
        &self.rules
    }

    pub fn cell_count(&self) -> usize {
        self.blocked.len()
    }

    #[inline(always)]
    fn idx(&self, x: u32, y: u32, z: u8) -> usize {
        (z as usize) * (self.width as usize) * (self.height as usize)
            + (y as usize) * (self.width as usize)
            + (x as usize)
    }

    fn offset(&self, x: u32, y: u32, z: u8, d: (i32, i32)) -> Option<usize> {
        let nx = x as i64 + d.0 as i64;
        let ny = y as i64 + d.1 as i64;
        if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
            return None;
        }
        Some(self.idx(nx as u32, ny as u32, z))
    }

    fn site_cells(&self, site: ViaSite) -> impl Iterator<Item = usize> + '_ {
        (site.lo..=site.hi.min(self.layers - 1)).map(move |z| self.idx(site.x, site.y, z))
    }

    pub fn position(&self, idx: usize) -> Point<f64> {
        let c = self.coord(idx);
        self.converter.to_mm(c.x, c.y)
    }

    fn layer_indices(&self, layers: &[pcb_common::db::layers::Layer]) -> Vec<u8> {
        layers
            .iter()
            .filter_map(|l| self.stack.index_of(*l))
            .collect()
    }

    /// Block everything outside `outline` and keep copper off its edge.
    pub fn mark_outline(&mut self, outline: &Polygon) {
        let trace_margin = self.rules.trace_margin();
        let via_margin = self.rules.via_margin();
        for y in 0..self.height {
            for x in 0..self.width {
                let p = self.converter.to_mm(x, y);
                let (blocked, near_trace, near_via) = if outline.contains(p) {
                    let d = outline.distance_to_boundary(p);
                    (false, d < trace_margin - SLACK, d < via_margin - SLACK)
                } else {
                    (true, true, true)
                };
                for z in 0..self.layers {
                    let i = self.idx(x, y, z);
                    self.blocked[i] |= blocked;
                    if near_trace {
                        self.trace_keepout[i] = Keepout::Shared;
                    }
                    if near_via {
                        self.via_keepout[i] = Keepout::Shared;
                    }
                }
            }
        }
    }

    fn mark_rect(&mut self, rect: &Rect, layers: &[u8], net: NetId) {
        let trace_zone = rect.inflate(self.rules.trace_margin());
        let via_margin = self.rules.via_margin();
        let Some(((x0, x1), (y0, y1))) = self.converter.cell_span(&rect.inflate(via_margin)) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = self.converter.to_mm(x, y);
                let trace = trace_zone.contains_strict(p, SLACK);
                let via = point_rect_distance(p, rect) < via_margin - SLACK;
                for &z in layers {
                    let i = self.idx(x, y, z);
                    if trace {
                        self.trace_keepout[i] = self.trace_keepout[i].add(net);
                    }
                    if via {
                        self.via_keepout[i] = self.via_keepout[i].add(net);
                    }
                }
            }
        }
    }

    /// Pad copper on each of its layers. Rotated pads use their bounding box.
    pub fn mark_pad(&mut self, pad: &Pad) {
        let layers = self.layer_indices(&pad.layers);
        self.mark_rect(&pad.rect(), &layers, pad.net);
    }

    fn mark_round(&mut self, center: Point<f64>, end: Point<f64>, radius: f64, layers: &[u8], net: NetId) {
        let trace_r = radius + self.rules.trace_margin();
        let via_r = radius + self.rules.via_margin();
        let reach = Rect::spanning(center, end).inflate(via_r);
        let Some(((x0, x1), (y0, y1))) = self.converter.cell_span(&reach) else {
            return;
        };
        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = self.converter.to_mm(x, y);
                let d = point_segment_distance(p, center, end);
                for &z in layers {
                    let i = self.idx(x, y, z);
                    if d < trace_r - SLACK {
                        self.trace_keepout[i] = self.trace_keepout[i].add(net);
                    }
                    if d < via_r - SLACK {
                        self.via_keepout[i] = self.via_keepout[i].add(net);
                    }
                }
            }
        }
    }

    /// Copper already on the board that routing must leave in place.
    pub fn mark_fixed_segment(&mut self, seg: &Segment) {
        if let Some(z) = self.stack.index_of(seg.layer) {
            self.mark_round(seg.start, seg.end, seg.width / 2.0, &[z], seg.net);
        }
    }

    pub fn mark_fixed_via(&mut self, via: &Via) {
        let layers: Vec<u8> = self
            .stack
            .layers()
            .iter()
            .filter(|l| via.spans(**l))
            .filter_map(|l| self.stack.index_of(*l))
            .collect();
        self.mark_round(via.position, via.position, via.diameter / 2.0, &layers, via.net);
    }

    /// Register the cells a route of `pad.net` may start or end on: every
    /// cell whose trace stays inside the pad, or the nearest cell when the pad
    /// is smaller than a trace. Returns their indices across all pad layers.
    pub fn add_terminals(&mut self, pad: &Pad, trace_width: f64) -> Vec<usize> {
        let rect = pad.rect();
        let inner = rect.inflate(-(trace_width / 2.0).min(rect.width().min(rect.height()) / 2.0));
        let mut xy = Vec::new();
        if let Some(((x0, x1), (y0, y1))) = self.converter.cell_span(&inner) {
            for y in y0..=y1 {
                for x in x0..=x1 {
                    if inner.inflate(SLACK).contains(self.converter.to_mm(x, y)) {
                        xy.push((x, y));
                    }
                }
            }
        }
        if xy.is_empty() {
            let g = self.converter.to_grid(pad.position, 0);
            xy.push((g.x, g.y));
        }

        let mut cells = Vec::new();
        for z in self.layer_indices(&pad.layers) {
            for &(x, y) in &xy {
                let i = self.idx(x, y, z);
                if self.blocked[i] {
                    continue;
                }
                self.terminal[i] = Some(pad.net);
                cells.push(i);
            }
        }
        cells
    }

    /// Close one cell to every net.
    pub fn block_cell(&mut self, idx: usize) {
        self.blocked[idx] = true;
    }

    pub fn terminal_net(&self, idx: usize) -> Option<NetId> {
        self.terminal[idx]
    }

    pub fn trace_keepout(&self, idx: usize) -> Keepout {
        self.trace_keepout[idx]
    }

    pub fn claims_at(&self, idx: usize) -> u16 {
        self.claims[idx]
    }

    fn single_owner(count: u16, owner_key: u32, net: NetId) -> bool {
        count == 0 || (count == 1 && owner_key == key(net))
    }

    fn foreign(count: u16, owner_key: u32, net: NetId) -> u32 {
        match count {
            0 => 0,
            1 if owner_key == key(net) => 0,
            n => n as u32,
        }
    }

    fn foreign_paths_near(&self, site: ViaSite, net: NetId) -> u32 {
        let mut found = 0;
        for z in site.lo..=site.hi.min(self.layers - 1) {
            for &d in &self.via_trace_halo {
                if let Some(j) = self.offset(site.x, site.y, z, d) {
                    found += Self::foreign(self.paths[j], self.path_key[j], net);
                }
            }
        }
        found
    }

    /// Cells a route with these path cells and vias would occupy.
    pub fn footprint(&self, cells: &[usize], vias: &[ViaSite]) -> Footprint {
        let mut path = cells.to_vec();
        let mut claims = Vec::with_capacity(cells.len() * self.trace_halo.len());
        let mut via_claims = Vec::new();

        for &i in cells {
            let c = self.coord(i);
            claims.extend(self.trace_halo.iter().filter_map(|&d| self.offset(c.x, c.y, c.z, d)));
        }
        for &site in vias {
            for z in site.lo..=site.hi.min(self.layers - 1) {
                path.push(self.idx(site.x, site.y, z));
                claims.extend(
                    self.via_trace_halo
                        .iter()
                        .filter_map(|&d| self.offset(site.x, site.y, z, d)),
                );
                via_claims.extend(
                    self.via_via_halo
                        .iter()
                        .filter_map(|&d| self.offset(site.x, site.y, z, d)),
                );
            }
        }
        for v in [&mut path, &mut claims, &mut via_claims] {
            v.sort_unstable();
            v.dedup();
        }
        Footprint {
            claims,
            via_claims,
            path,
        }
    }

    pub fn commit(&mut self, fp: &Footprint, net: NetId) {
        let k = key(net);
        for &i in &fp.claims {
            self.claims[i] = self.claims[i].saturating_add(1);
            self.claim_key[i] ^= k;
        }
        for &i in &fp.via_claims {
            self.via_claims[i] = self.via_claims[i].saturating_add(1);
            self.via_claim_key[i] ^= k;
        }
        for &i in &fp.path {
            self.paths[i] = self.paths[i].saturating_add(1);
            self.path_key[i] ^= k;
        }
    }

    pub fn release(&mut self, fp: &Footprint, net: NetId) {
        let k = key(net);
        for &i in &fp.claims {
            self.claims[i] = self.claims[i].saturating_sub(1);
            self.claim_key[i] ^= k;
        }
        for &i in &fp.via_claims {
            self.via_claims[i] = self.via_claims[i].saturating_sub(1);
            self.via_claim_key[i] ^= k;
        }
        for &i in &fp.path {
            self.paths[i] = self.paths[i].saturating_sub(1);
            self.path_key[i] ^= k;
        }
    }

    /// Whether a route of `net` could be committed under the hard rules.
    pub fn path_is_legal(&self, cells: &[usize], vias: &[ViaSite], net: NetId) -> bool {
        cells.iter().all(|&i| self.is_free(i, net))
            && vias.iter().all(|&site| self.via_allowed(site, net))
    }

    /// Path cells that two or more nets are fighting over.
    pub fn overflow_cells(&self) -> Vec<usize> {
        (0..self.paths.len())
            .filter(|&i| self.paths[i] > 0 && self.claims[i] >= 2)
            .collect()
    }

    pub fn via_in_conflict(&self, site: ViaSite) -> bool {
        self.site_cells(site).any(|i| self.via_claims[i] >= 2)
    }

    pub fn via_cells(&self, site: ViaSite) -> Vec<usize> {
        self.site_cells(site).collect()
    }

    pub fn update_history(&mut self, cells: &[usize], increment: f64) {
        for &i in cells {
            self.history[i] += increment as f32;
        }
    }

    pub fn clear_history(&mut self) {
        self.history.iter_mut().for_each(|h| *h = 0.0);
    }
}

impl RoutingGrid for DenseGrid {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn layers(&self) -> u8 {
        self.layers
    }

    #[inline(always)]
    fn index(&self, coord: GridCoord) -> usize {
        self.idx(coord.x, coord.y, coord.z)
    }

    #[inline(always)]
    fn coord(&self, idx: usize) -> GridCoord {
        let plane = (self.width as usize) * (self.height as usize);
        let z = idx / plane;
        let rem = idx % plane;
        GridCoord::new(
            (rem % self.width as usize) as u32,
            (rem / self.width as usize) as u32,
            z as u8,
        )
    }

    fn mark_obstacle(&mut self, region: &Rect, z: u8) {
        if z < self.layers {
            self.mark_rect(region, &[z], NetId::UNCONNECTED);
        }
    }

    fn is_free(&self, idx: usize, net: NetId) -> bool {
        if self.blocked[idx] {
            return false;
        }
        if self.terminal[idx] == Some(net) {
            return true;
        }
        self.trace_keepout[idx].allows(net)
            && Self::single_owner(self.claims[idx], self.claim_key[idx], net)
    }

    fn via_allowed(&self, site: ViaSite, net: NetId) -> bool {
        self.site_cells(site).all(|i| {
            !self.blocked[i]
                && self.via_keepout[i].allows(net)
                && Self::single_owner(self.via_claims[i], self.via_claim_key[i], net)
        }) && self.foreign_paths_near(site, net) == 0
    }

    fn is_passable(&self, idx: usize, net: NetId) -> bool {
        !self.blocked[idx]
            && (self.terminal[idx] == Some(net) || self.trace_keepout[idx].allows(net))
    }

    fn via_passable(&self, site: ViaSite, net: NetId) -> bool {
        self.site_cells(site)
            .all(|i| !self.blocked[i] && self.via_keepout[i].allows(net))
    }

    fn foreign_claims(&self, idx: usize, net: NetId) -> u32 {
        if self.terminal[idx] == Some(net) {
            return 0;
        }
        Self::foreign(self.claims[idx], self.claim_key[idx], net)
    }

    fn foreign_via_pressure(&self, site: ViaSite, net: NetId) -> u32 {
        let vias: u32 = self
            .site_cells(site)
            .map(|i| Self::foreign(self.via_claims[i], self.via_claim_key[i], net))
            .sum();
        vias + self.foreign_paths_near(site, net)
    }

    fn history(&self, idx: usize) -> f32 {
        self.history[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcb_common::db::core::{PadKind, PadShape};
    use pcb_common::db::indices::FootprintId;
    use pcb_common::db::layers::Layer;

    fn open_grid() -> DenseGrid {
        let area = Rect::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let rules = GridRules {
            trace_width: 0.2,
            clearance: 0.2,
            via_diameter: 0.6,
        };
        DenseGrid::new(
            GridConverter::for_area(&area, 0.1),
            LayerStack::two_layer(),
            rules,
        )
    }

    fn smd(net: u32, x: f64, y: f64) -> Pad {
        Pad {
            footprint: FootprintId(0),
            number: "1".into(),
            position: Point::new(x, y),
            width: 1.0,
            height: 1.0,
            shape: PadShape::Rect,
            kind: PadKind::Smd,
            net: NetId(net),
            layers: vec![Layer::Top],
        }
    }

    #[test]
    fn test_index_round_trip() {
        let g = open_grid();
        let c = GridCoord::new(17, 42, 1);
        assert_eq!(g.coord(g.index(c)), c);
    }

    #[test]
    fn test_claims_block_other_nets_only() {
        let mut g = open_grid();
        let a = NetId(1);
        let b = NetId(2);
        let cells: Vec<usize> = (10..60).map(|x| g.idx(x, 50, 0)).collect();
        let fp = g.footprint(&cells, &[]);
        g.commit(&fp, a);

        // Trace halo is 0.4mm: four cells off the path is the first free row.
        assert!(g.is_free(g.idx(30, 50, 0), a));
        assert!(!g.is_free(g.idx(30, 53, 0), b));
        assert!(g.is_free(g.idx(30, 54, 0), b));
        assert!(g.is_free(g.idx(30, 50, 1), b));

        g.release(&fp, a);
        assert!(g.is_free(g.idx(30, 50, 0), b));
        assert_eq!(g.claims_at(g.idx(30, 50, 0)), 0);
    }

    #[test]
    fn test_pad_keepout_and_terminals() {
        let mut g = open_grid();
        let pad = smd(3, 5.0, 5.0);
        g.mark_pad(&pad);
        let terminals = g.add_terminals(&pad, 0.2);
        // 1mm pad shrunk by 0.1mm each side: 9x9 cell centres on the top layer.
        assert_eq!(terminals.len(), 81);

        // Keepout edge sits at 5.5 + 0.3.
        assert!(!g.is_free(g.idx(57, 50, 0), NetId(4)));
        assert!(g.is_free(g.idx(58, 50, 0), NetId(4)));
        assert!(g.is_free(g.idx(57, 50, 0), NetId(3)));
        assert!(g.is_free(g.idx(50, 50, 1), NetId(4)));
    }

    #[test]
    fn test_via_checks_foreign_paths() {
        let mut g = open_grid();
        let cells: Vec<usize> = (0..100).map(|x| g.idx(x, 50, 1)).collect();
        let fp = g.footprint(&cells, &[]);
        g.commit(&fp, NetId(1));

        // via/trace centre distance is 0.3 + 0.2 + 0.1 = 0.6mm.
        assert!(!g.via_allowed(ViaSite::new(40, 55, 0, 1), NetId(2)));
        assert!(g.via_allowed(ViaSite::new(40, 56, 0, 1), NetId(2)));
        assert!(g.via_allowed(ViaSite::new(40, 50, 0, 1), NetId(1)));
        assert!(g.foreign_via_pressure(ViaSite::new(40, 55, 0, 1), NetId(2)) > 0);
    }

    #[test]
    fn test_outline_margins() {
        let mut g = open_grid();
        let outline = Polygon::from_rect(&Rect::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0)));
        g.mark_outline(&outline);
        // Trace margin 0.3mm, via margin 0.5mm.
        assert!(!g.is_free(g.idx(2, 50, 0), NetId(1)));
        assert!(g.is_free(g.idx(3, 50, 0), NetId(1)));
        assert!(!g.via_passable(ViaSite::new(4, 50, 0, 1), NetId(1)));
        assert!(g.via_passable(ViaSite::new(5, 50, 0, 1), NetId(1)));
    }

    #[test]
    fn test_overflow_counts_shared_cells() {
        let mut g = open_grid();
        let row: Vec<usize> = (20..40).map(|x| g.idx(x, 50, 0)).collect();
        let fa = g.footprint(&row, &[]);
        let col: Vec<usize> = (40..60).map(|y| g.idx(30, y, 0)).collect();
        let fb = g.footprint(&col, &[]);
        g.commit(&fa, NetId(1));
        g.commit(&fb, NetId(2));
        let over = g.overflow_cells();
        assert!(!over.is_empty());
        assert!(over.contains(&g.idx(30, 50, 0)));
        assert_eq!(g.foreign_claims(g.idx(25, 50, 0), NetId(1)), 0);
        assert!(!g.path_is_legal(&row, &[], NetId(1)));
    }
}
