use crate::db::indices::*;
use crate::db::layers::{Layer, LayerStack};
use crate::geom::point::Point;
use crate::geom::polygon::Polygon;
use crate::geom::rect::Rect;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadShape {
    Rect,
    RoundRect,
    Circle,
    Oval,
    Trapezoid,
    Custom,
}

impl PadShape {
    pub fn from_kicad(name: &str) -> PadShape {
        match name {
            "rect" => PadShape::Rect,
            "roundrect" => PadShape::RoundRect,
            "circle" => PadShape::Circle,
            "oval" => PadShape::Oval,
            "trapezoid" => PadShape::Trapezoid,
            _ => PadShape::Custom,
        }
    }

    pub fn kicad_name(&self) -> &'static str {
        match self {
            PadShape::Rect => "rect",
            PadShape::RoundRect => "roundrect",
            PadShape::Circle => "circle",
            PadShape::Oval => "oval",
            PadShape::Trapezoid => "trapezoid",
            PadShape::Custom => "custom",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PadKind {
    Smd,
    ThroughHole,
    NpThroughHole,
    Connect,
}

impl PadKind {
    pub fn from_kicad(name: &str) -> PadKind {
        match name {
            "thru_hole" => PadKind::ThroughHole,
            "np_thru_hole" => PadKind::NpThroughHole,
            "connect" => PadKind::Connect,
            _ => PadKind::Smd,
        }
    }

    pub fn kicad_name(&self) -> &'static str {
        match self {
            PadKind::Smd => "smd",
            PadKind::ThroughHole => "thru_hole",
            PadKind::NpThroughHole => "np_thru_hole",
            PadKind::Connect => "connect",
        }
    }
}

/// A pad in board coordinates. `width`/`height` are the axis-aligned extents
/// after footprint and pad rotation; non-rectangular shapes are represented by
/// their bounding box for clearance purposes.
#[derive(Clone, Debug)]
pub struct Pad {
    pub footprint: FootprintId,
    pub number: String,
    pub position: Point<f64>,
    pub width: f64,
    pub height: f64,
    pub shape: PadShape,
    pub kind: PadKind,
    pub net: NetId,
    pub layers: Vec<Layer>,
}

impl Pad {
    pub fn rect(&self) -> Rect {
        Rect::from_center(self.position, self.width, self.height)
    }

    pub fn on_layer(&self, layer: Layer) -> bool {
        self.layers.contains(&layer)
    }
}

#[derive(Clone, Debug)]
pub struct Footprint {
    pub reference: String,
    pub lib_id: String,
    pub position: Point<f64>,
    pub rotation: f64,
    pub layer: Layer,
    pub pads: Vec<PadId>,
}

#[derive(Clone, Debug)]
pub struct NetData {
    pub id: NetId,
    pub name: String,
    pub class: Option<String>,
    pub pads: Vec<PadId>,
}

/// A straight copper trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: Point<f64>,
    pub end: Point<f64>,
    pub width: f64,
    pub layer: Layer,
    pub net: NetId,
}

impl Segment {
    pub fn new(start: Point<f64>, end: Point<f64>, width: f64, layer: Layer, net: NetId) -> Self {
        Self {
            start,
            end,
            width,
            layer,
            net,
        }
    }

    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }

    pub fn direction(&self) -> Point<f64> {
        (self.end - self.start).normalized()
    }

    pub fn bounding_box(&self) -> Rect {
        Rect::spanning(self.start, self.end).inflate(self.width / 2.0)
    }
}

/// A plated through hole joining the copper layers between `layers.0` and
/// `layers.1` (stored in stack order).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Via {
    pub position: Point<f64>,
    pub drill: f64,
    pub diameter: f64,
    pub layers: (Layer, Layer),
    pub net: NetId,
}

impl Via {
    pub fn new(position: Point<f64>, drill: f64, diameter: f64, a: Layer, b: Layer, net: NetId) -> Self {
        Self {
            position,
            drill,
            diameter,
            layers: (a.min(b), a.max(b)),
            net,
        }
    }

    pub fn spans(&self, layer: Layer) -> bool {
        layer >= self.layers.0 && layer <= self.layers.1
    }

    pub fn connects(&self, a: Layer, b: Layer) -> bool {
        self.spans(a) && self.spans(b)
    }

    pub fn bounding_box(&self) -> Rect {
        Rect::from_center(self.position, self.diameter, self.diameter)
    }
}

/// Net class as declared in the board file.
#[derive(Clone, Debug, Default)]
pub struct NetClassDef {
    pub name: String,
    pub clearance: Option<f64>,
    pub trace_width: Option<f64>,
    pub via_diameter: Option<f64>,
    pub via_drill: Option<f64>,
    pub nets: Vec<String>,
}

#[derive(Clone)]
pub struct BoardDB {
    pub stack: LayerStack,
    pub outline: Polygon,
    pub footprints: Vec<Footprint>,
    pub pads: Vec<Pad>,
    pub nets: Vec<NetData>,
    pub segments: Vec<Segment>,
    pub vias: Vec<Via>,
    pub net_classes: Vec<NetClassDef>,

    pub net_name_map: HashMap<String, NetId>,
    pub footprint_name_map: HashMap<String, FootprintId>,

    /// Whether the source file quoted layer names (KiCad 7+ style).
    pub quoted_layers: bool,
}

impl BoardDB {
    pub fn new() -> Self {
        let mut db = Self {
            stack: LayerStack::two_layer(),
            outline: Polygon::default(),
            footprints: Vec::with_capacity(64),
            pads: Vec::with_capacity(256),
            nets: Vec::with_capacity(64),
            segments: Vec::new(),
            vias: Vec::new(),
            net_classes: Vec::new(),
            net_name_map: HashMap::new(),
            footprint_name_map: HashMap::new(),
            quoted_layers: true,
        };
        db.add_net(0, String::new());
        db
    }

    pub fn num_nets(&self) -> usize {
        self.nets.len()
    }

    /// Register net `number`; nets are stored densely by number.
    pub fn add_net(&mut self, number: u32, name: String) -> NetId {
        let id = NetId(number);
        while self.nets.len() <= id.index() {
            let filler = NetId::new(self.nets.len());
            self.nets.push(NetData {
                id: filler,
                name: String::new(),
                class: None,
                pads: Vec::new(),
            });
        }
        if !name.is_empty() {
            self.net_name_map.insert(name.clone(), id);
        }
        self.nets[id.index()].name = name;
        id
    }

    /// Net by name, creating it with the next free number when absent.
    pub fn net_named(&mut self, name: &str) -> NetId {
        if let Some(&id) = self.net_name_map.get(name) {
            return id;
        }
        let number = self.nets.len() as u32;
        self.add_net(number, name.to_string())
    }

    pub fn net(&self, id: NetId) -> Option<&NetData> {
        self.nets.get(id.index())
    }

    pub fn net_name(&self, id: NetId) -> &str {
        self.nets
            .get(id.index())
            .map(|n| n.name.as_str())
            .unwrap_or("")
    }

    pub fn add_footprint(
        &mut self,
        reference: String,
        lib_id: String,
        position: Point<f64>,
        rotation: f64,
        layer: Layer,
    ) -> FootprintId {
        let id = FootprintId::new(self.footprints.len());
        self.footprint_name_map.insert(reference.clone(), id);
        self.footprints.push(Footprint {
            reference,
            lib_id,
            position,
            rotation,
            layer,
            pads: Vec::new(),
        });
        id
    }

    pub fn add_pad(&mut self, pad: Pad) -> PadId {
        let pid = PadId::new(self.pads.len());
        if let Some(fp) = self.footprints.get_mut(pad.footprint.index()) {
            fp.pads.push(pid);
        }
        if pad.net.is_connected() && pad.net.index() < self.nets.len() {
            self.nets[pad.net.index()].pads.push(pid);
        }
        self.pads.push(pad);
        pid
    }

    pub fn pad_label(&self, pad: PadId) -> String {
        let p = &self.pads[pad.index()];
        let reference = self
            .footprints
            .get(p.footprint.index())
            .map(|f| f.reference.as_str())
            .unwrap_or("?");
        format!("{}.{}", reference, p.number)
    }

    pub fn set_net_class(&mut self, net: NetId, class: &str) {
        if let Some(n) = self.nets.get_mut(net.index()) {
            n.class = Some(class.to_string());
        }
    }

    pub fn nets_with_copper(&self) -> Vec<NetId> {
        let mut ids: Vec<NetId> = self
            .segments
            .iter()
            .map(|s| s.net)
            .chain(self.vias.iter().map(|v| v.net))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Outline bounding box, falling back to the pad extents plus `margin`.
    pub fn board_bounds(&self, margin: f64) -> Rect {
        if !self.outline.is_empty() {
            return self.outline.bounding_box();
        }
        let mut bounds: Option<Rect> = None;
        for pad in &self.pads {
            let r = pad.rect();
            bounds = Some(bounds.map_or(r, |b| b.union(&r)));
        }
        bounds.unwrap_or_default().inflate(margin)
    }

    /// Give the board a rectangular outline around its pads when the file had none.
    pub fn ensure_outline(&mut self, margin: f64) {
        if self.outline.is_empty() {
            let r = self.board_bounds(margin);
            self.outline = Polygon::from_rect(&r);
        }
    }
}

impl Default for BoardDB {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nets_are_dense_by_number() {
        let mut db = BoardDB::new();
        let id = db.add_net(3, "SIG".to_string());
        assert_eq!(id, NetId(3));
        assert_eq!(db.num_nets(), 4);
        assert_eq!(db.net_name(id), "SIG");
        assert_eq!(db.net_named("SIG"), id);
        assert_eq!(db.net_named("NEW"), NetId(4));
    }

    #[test]
    fn test_via_layers_are_ordered() {
        let v = Via::new(Point::new(0.0, 0.0), 0.3, 0.6, Layer::Bottom, Layer::Top, NetId(1));
        assert_eq!(v.layers, (Layer::Top, Layer::Bottom));
        assert!(v.spans(Layer::Inner(1)));
        assert!(v.connects(Layer::Top, Layer::Bottom));
    }
}
