use crate::db::core::{BoardDB, Segment, Via};
use crate::db::layers::Layer;
use crate::db::parser::sexp::quote;
use std::fmt::Write;

/// Millimetre value with trailing zeros trimmed: `1.500000` -> `1.5`, `2.0` -> `2`.
pub fn fmt_mm(value: f64) -> String {
    let mut s = format!("{:.6}", value);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn layer_token(layer: Layer, quoted: bool) -> String {
    if quoted {
        quote(&layer.kicad_name())
    } else {
        layer.kicad_name()
    }
}

pub fn segment_record(seg: &Segment, quoted: bool) -> String {
    format!(
        "(segment (start {} {}) (end {} {}) (width {}) (layer {}) (net {}))",
        fmt_mm(seg.start.x),
        fmt_mm(seg.start.y),
        fmt_mm(seg.end.x),
        fmt_mm(seg.end.y),
        fmt_mm(seg.width),
        layer_token(seg.layer, quoted),
        seg.net.0
    )
}

pub fn via_record(via: &Via, quoted: bool) -> String {
    format!(
        "(via (at {} {}) (size {}) (drill {}) (layers {} {}) (net {}))",
        fmt_mm(via.position.x),
        fmt_mm(via.position.y),
        fmt_mm(via.diameter),
        fmt_mm(via.drill),
        layer_token(via.layers.0, quoted),
        layer_token(via.layers.1, quoted),
        via.net.0
    )
}

/// One record per line, segments first.
pub fn records(segments: &[Segment], vias: &[Via], quoted: bool) -> String {
    let mut out = String::new();
    for s in segments {
        out.push_str("  ");
        out.push_str(&segment_record(s, quoted));
        out.push('\n');
    }
    for v in vias {
        out.push_str("  ");
        out.push_str(&via_record(v, quoted));
        out.push('\n');
    }
    out
}

/// Insert `block` just before the closing paren of the board's root list.
pub fn merge_into_board(board: &str, block: &str) -> Option<String> {
    let close = board.rfind(')')?;
    let mut out = String::with_capacity(board.len() + block.len() + 1);
    let head = board[..close].trim_end();
    out.push_str(head);
    out.push('\n');
    out.push_str(block);
    out.push_str(&board[close..]);
    Some(out)
}

/// Serialise the whole database as a minimal `kicad_pcb`. Footprints are
/// written unrotated with pads at their absolute extents. Only what
/// `BoardDB` models is written; net classes are not.
pub fn write_board(db: &BoardDB) -> String {
    let q = db.quoted_layers;
    let mut out = String::new();
    let _ = writeln!(out, "(kicad_pcb (version 20221018) (generator pcb-route)");

    out.push_str("  (layers");
    for layer in db.stack.layers() {
        let ordinal = match layer {
            Layer::Top => 0,
            Layer::Inner(n) => *n as u32,
            Layer::Bottom => 31,
        };
        let _ = write!(out, " ({} {} signal)", ordinal, layer_token(*layer, q));
    }
    let _ = writeln!(out, " (44 {} user))", if q { "\"Edge.Cuts\"" } else { "Edge.Cuts" });

    for net in &db.nets {
        let _ = writeln!(out, "  (net {} {})", net.id.0, quote(&net.name));
    }

    for fp in &db.footprints {
        let _ = writeln!(
            out,
            "  (footprint {} (layer {}) (at {} {})",
            quote(&fp.lib_id),
            layer_token(fp.layer, q),
            fmt_mm(fp.position.x),
            fmt_mm(fp.position.y)
        );
        let _ = writeln!(out, "    (property \"Reference\" {})", quote(&fp.reference));
        for pid in &fp.pads {
            let pad = &db.pads[pid.index()];
            let rel = pad.position - fp.position;
            let layers: Vec<String> = pad.layers.iter().map(|l| layer_token(*l, q)).collect();
            let _ = writeln!(
                out,
                "    (pad {} {} {} (at {} {}) (size {} {}) (layers {}) (net {} {}))",
                quote(&pad.number),
                pad.kind.kicad_name(),
                pad.shape.kicad_name(),
                fmt_mm(rel.x),
                fmt_mm(rel.y),
                fmt_mm(pad.width),
                fmt_mm(pad.height),
                layers.join(" "),
                pad.net.0,
                quote(db.net_name(pad.net))
            );
        }
        out.push_str("  )\n");
    }

    for (a, b) in db.outline.edges() {
        let _ = writeln!(
            out,
            "  (gr_line (start {} {}) (end {} {}) (layer {}) (width 0.1))",
            fmt_mm(a.x),
            fmt_mm(a.y),
            fmt_mm(b.x),
            fmt_mm(b.y),
            if q { "\"Edge.Cuts\"" } else { "Edge.Cuts" }
        );
    }

    out.push_str(&records(&db.segments, &db.vias, q));
    out.push_str(")\n");
    out
}
