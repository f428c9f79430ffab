use super::BoardParseError;
use super::sexp::{self, Sexp};
use crate::db::core::{BoardDB, NetClassDef, Pad, PadKind, PadShape, Segment, Via};
use crate::db::indices::NetId;
use crate::db::layers::{Layer, LayerStack};
use crate::geom::point::Point;
use crate::geom::polygon::Polygon;
use crate::geom::rect::Rect;
use std::fs;

const OUTLINE_SNAP: f64 = 1e-3;
const MISSING_OUTLINE_MARGIN: f64 = 2.0;

pub fn parse(db: &mut BoardDB, filename: &str) -> Result<(), BoardParseError> {
    let text = fs::read_to_string(filename)?;
    parse_str(db, &text)?;
    log::info!(
        "Loaded {}: {} footprints, {} pads, {} nets, {} segments, {} vias",
        filename,
        db.footprints.len(),
        db.pads.len(),
        db.num_nets(),
        db.segments.len(),
        db.vias.len()
    );
    Ok(())
}

pub fn load(filename: &str) -> Result<BoardDB, BoardParseError> {
    let mut db = BoardDB::new();
    parse(&mut db, filename)?;
    Ok(db)
}

pub fn parse_str(db: &mut BoardDB, text: &str) -> Result<(), BoardParseError> {
    let root = sexp::parse(text)?;
    match root.head() {
        Some("kicad_pcb") => {}
        other => return Err(BoardParseError::NotABoard(other.unwrap_or("").to_string())),
    }

    if let Some(layers) = root.child("layers") {
        read_layers(db, layers);
    }

    let mut edges: Vec<(Point<f64>, Point<f64>)> = Vec::new();
    for item in root.args() {
        match item.head() {
            Some("net") => read_net(db, item)?,
            Some("net_class") => read_net_class(db, item),
            Some("footprint") | Some("module") => read_footprint(db, item)?,
            Some("segment") => read_segment(db, item)?,
            Some("via") => read_via(db, item)?,
            Some("gr_line") | Some("gr_rect") | Some("gr_arc") | Some("gr_poly") => {
                if on_edge_cuts(item) {
                    collect_edges(item, &mut edges)?;
                }
            }
            _ => {}
        }
    }

    db.outline = chain_outline(&edges);
    db.ensure_outline(MISSING_OUTLINE_MARGIN);
    apply_net_classes(db);
    Ok(())
}

fn read_layers(db: &mut BoardDB, layers: &Sexp) {
    let mut copper = Vec::new();
    let mut quoted = false;
    for entry in layers.args() {
        let Some(name_expr) = entry.items().get(1) else {
            continue;
        };
        if let Some(layer) = name_expr.as_str().and_then(Layer::from_kicad_name) {
            copper.push(layer);
            quoted |= matches!(name_expr, Sexp::Str(_));
        }
    }
    db.stack = LayerStack::new(copper);
    db.quoted_layers = quoted;
}

fn number(expr: &Sexp, i: usize, context: &'static str) -> Result<f64, BoardParseError> {
    let raw = expr
        .arg_str(i)
        .ok_or(BoardParseError::MissingField { context, field: "value" })?;
    raw.parse().map_err(|_| BoardParseError::BadNumber {
        context,
        value: raw.to_string(),
    })
}

fn point(expr: &Sexp, keyword: &'static str, context: &'static str) -> Result<Point<f64>, BoardParseError> {
    let p = expr.child(keyword).ok_or(BoardParseError::MissingField {
        context,
        field: keyword,
    })?;
    Ok(Point::new(number(p, 0, context)?, number(p, 1, context)?))
}

fn scalar(expr: &Sexp, keyword: &'static str, context: &'static str) -> Result<f64, BoardParseError> {
    let s = expr.child(keyword).ok_or(BoardParseError::MissingField {
        context,
        field: keyword,
    })?;
    number(s, 0, context)
}

fn read_net(db: &mut BoardDB, item: &Sexp) -> Result<(), BoardParseError> {
    let number = number(item, 0, "net")? as u32;
    let name = item.arg_str(1).unwrap_or("").to_string();
    db.add_net(number, name);
    Ok(())
}

/// Net reference inside a pad/segment/via: `(net 3 "SIG")`, `(net 3)` or `(net "SIG")`.
fn net_ref(db: &mut BoardDB, item: &Sexp) -> NetId {
    let Some(net) = item.child("net") else {
        return NetId::UNCONNECTED;
    };
    match net.arg_str(0) {
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) => {
                if n as usize >= db.num_nets() {
                    let name = net.arg_str(1).unwrap_or("").to_string();
                    db.add_net(n, name);
                }
                NetId(n)
            }
            Err(_) if raw.is_empty() => NetId::UNCONNECTED,
            Err(_) => db.net_named(raw),
        },
        None => NetId::UNCONNECTED,
    }
}

fn read_net_class(db: &mut BoardDB, item: &Sexp) {
    let value = |key: &str| item.child(key).and_then(|c| c.arg_f64(0));
    db.net_classes.push(NetClassDef {
        name: item.arg_str(0).unwrap_or("Default").to_string(),
        clearance: value("clearance"),
        trace_width: value("trace_width"),
        via_diameter: value("via_dia"),
        via_drill: value("via_drill"),
        nets: item
            .children("add_net")
            .filter_map(|n| n.arg_str(0))
            .map(str::to_string)
            .collect(),
    });
}

fn apply_net_classes(db: &mut BoardDB) {
    let assignments: Vec<(String, String)> = db
        .net_classes
        .iter()
        .flat_map(|c| c.nets.iter().map(move |n| (n.clone(), c.name.clone())))
        .collect();
    for (net, class) in assignments {
        if let Some(&id) = db.net_name_map.get(&net) {
            db.set_net_class(id, &class);
        }
    }
}

fn layer_of(item: &Sexp) -> Option<Layer> {
    item.child("layer")
        .and_then(|l| l.arg_str(0))
        .and_then(Layer::from_kicad_name)
}

fn pad_layers(stack: &LayerStack, item: &Sexp) -> Vec<Layer> {
    let mut out = Vec::new();
    let Some(layers) = item.child("layers") else {
        return out;
    };
    for name in layers.args().iter().filter_map(|l| l.as_str()) {
        match name {
            "*.Cu" => out.extend_from_slice(stack.layers()),
            "F&B.Cu" => out.extend_from_slice(&[Layer::Top, Layer::Bottom]),
            _ => {
                if let Some(l) = Layer::from_kicad_name(name) {
                    out.push(l);
                }
            }
        }
    }
    out.retain(|l| stack.index_of(*l).is_some());
    out.sort();
    out.dedup();
    out
}

fn reference_of(item: &Sexp) -> String {
    let from_property = item
        .children("property")
        .find(|p| p.arg_str(0) == Some("Reference"))
        .and_then(|p| p.arg_str(1));
    let from_text = item
        .children("fp_text")
        .find(|t| t.arg_str(0) == Some("reference"))
        .and_then(|t| t.arg_str(1));
    from_property.or(from_text).unwrap_or("?").to_string()
}

fn read_footprint(db: &mut BoardDB, item: &Sexp) -> Result<(), BoardParseError> {
    let lib_id = item.arg_str(0).unwrap_or("").to_string();
    let at = item.child("at").ok_or(BoardParseError::MissingField {
        context: "footprint",
        field: "at",
    })?;
    let origin = Point::new(number(at, 0, "footprint")?, number(at, 1, "footprint")?);
    let rotation = at.arg_f64(2).unwrap_or(0.0);
    let side = layer_of(item).unwrap_or(Layer::Top);
    let fid = db.add_footprint(reference_of(item), lib_id, origin, rotation, side);

    for pad in item.children("pad") {
        let pad_at = pad.child("at").ok_or(BoardParseError::MissingField {
            context: "pad",
            field: "at",
        })?;
        let local = Point::new(number(pad_at, 0, "pad")?, number(pad_at, 1, "pad")?);
        // Pad angles in the file are absolute; a missing angle inherits the footprint's.
        let angle = pad_at.arg_f64(2).unwrap_or(rotation);
        let size = pad.child("size").ok_or(BoardParseError::MissingField {
            context: "pad",
            field: "size",
        })?;
        let w = number(size, 0, "pad")?;
        let h = size.arg_f64(1).unwrap_or(w);
        let (s, c) = angle.to_radians().sin_cos();
        let net = net_ref(db, pad);
        db.add_pad(Pad {
            footprint: fid,
            number: pad.arg_str(0).unwrap_or("").to_string(),
            position: origin + local.rotated_kicad(rotation),
            width: (w * c).abs() + (h * s).abs(),
            height: (w * s).abs() + (h * c).abs(),
            shape: PadShape::from_kicad(pad.arg_str(2).unwrap_or("rect")),
            kind: PadKind::from_kicad(pad.arg_str(1).unwrap_or("smd")),
            net,
            layers: pad_layers(&db.stack, pad),
        });
    }
    Ok(())
}

fn read_segment(db: &mut BoardDB, item: &Sexp) -> Result<(), BoardParseError> {
    let Some(layer) = layer_of(item) else {
        log::warn!("Ignoring segment on a non-copper layer");
        return Ok(());
    };
    let net = net_ref(db, item);
    db.segments.push(Segment::new(
        point(item, "start", "segment")?,
        point(item, "end", "segment")?,
        scalar(item, "width", "segment")?,
        layer,
        net,
    ));
    Ok(())
}

fn read_via(db: &mut BoardDB, item: &Sexp) -> Result<(), BoardParseError> {
    let at = point(item, "at", "via")?;
    let diameter = scalar(item, "size", "via")?;
    let drill = scalar(item, "drill", "via")?;
    let layers: Vec<Layer> = item
        .child("layers")
        .map(|l| {
            l.args()
                .iter()
                .filter_map(|a| a.as_str())
                .filter_map(Layer::from_kicad_name)
                .collect()
        })
        .unwrap_or_default();
    let (a, b) = match layers.as_slice() {
        [a, b, ..] => (*a, *b),
        _ => (Layer::Top, Layer::Bottom),
    };
    let net = net_ref(db, item);
    db.vias.push(Via::new(at, drill, diameter, a, b, net));
    Ok(())
}

fn on_edge_cuts(item: &Sexp) -> bool {
    item.child("layer").and_then(|l| l.arg_str(0)) == Some("Edge.Cuts")
}

fn collect_edges(item: &Sexp, edges: &mut Vec<(Point<f64>, Point<f64>)>) -> Result<(), BoardParseError> {
    match item.head() {
        Some("gr_line") => {
            edges.push((point(item, "start", "gr_line")?, point(item, "end", "gr_line")?));
        }
        Some("gr_rect") => {
            let r = Rect::spanning(point(item, "start", "gr_rect")?, point(item, "end", "gr_rect")?);
            let c = r.corners();
            for i in 0..4 {
                edges.push((c[i], c[(i + 1) % 4]));
            }
        }
        Some("gr_arc") => {
            // Chord approximation through the midpoint is enough for the outline.
            let start = point(item, "start", "gr_arc")?;
            let end = point(item, "end", "gr_arc")?;
            match item.child("mid") {
                Some(_) => {
                    let mid = point(item, "mid", "gr_arc")?;
                    edges.push((start, mid));
                    edges.push((mid, end));
                }
                None => edges.push((start, end)),
            }
        }
        Some("gr_poly") => {
            let pts: Vec<Point<f64>> = item
                .child("pts")
                .map(|p| {
                    p.children("xy")
                        .filter_map(|xy| Some(Point::new(xy.arg_f64(0)?, xy.arg_f64(1)?)))
                        .collect()
                })
                .unwrap_or_default();
            for i in 0..pts.len() {
                edges.push((pts[i], pts[(i + 1) % pts.len()]));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Chain Edge.Cuts primitives into one closed polygon, falling back to their
/// bounding box when they don't form a single loop.
fn chain_outline(edges: &[(Point<f64>, Point<f64>)]) -> Polygon {
    if edges.is_empty() {
        return Polygon::default();
    }
    let mut used = vec![false; edges.len()];
    used[0] = true;
    let mut vertices = vec![edges[0].0, edges[0].1];
    let first = edges[0].0;
    loop {
        let Some(&tail) = vertices.last() else { break };
        if vertices.len() > 2 && tail.approx_eq(first, OUTLINE_SNAP) {
            vertices.pop();
            break;
        }
        let next = edges.iter().enumerate().find_map(|(i, (a, b))| {
            if used[i] {
                None
            } else if a.approx_eq(tail, OUTLINE_SNAP) {
                Some((i, *b))
            } else if b.approx_eq(tail, OUTLINE_SNAP) {
                Some((i, *a))
            } else {
                None
            }
        });
        match next {
            Some((i, p)) => {
                used[i] = true;
                vertices.push(p);
            }
            None => break,
        }
    }

    let closed = used.iter().all(|u| *u) && vertices.len() >= 3;
    if closed {
        Polygon::new(vertices)
    } else {
        log::warn!("Board outline is not a single closed loop; using its bounding box");
        let mut r = Rect::spanning(edges[0].0, edges[0].1);
        for (a, b) in edges {
            r = r.union(&Rect::spanning(*a, *b));
        }
        Polygon::from_rect(&r)
    }
}
