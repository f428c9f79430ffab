//! Synthetic boards for benchmarks and end-to-end tests.

use crate::db::core::{BoardDB, Pad, PadKind, PadShape};
use crate::db::indices::{FootprintId, NetId};
use crate::db::layers::Layer;
use crate::db::writer::write_board;
use crate::geom::point::Point;
use crate::geom::polygon::Polygon;
use crate::geom::rect::Rect;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::fs::File;
use std::io::Write;

/// Power nets of [`charlieplex_board`]; they are meant to be plane-routed.
pub const CHARLIEPLEX_POWER_NETS: [&str; 4] = ["VCC", "GND", "+5V", "VBUS"];

fn outline(db: &mut BoardDB, width: f64, height: f64) {
    db.outline = Polygon::from_rect(&Rect::new(Point::new(0.0, 0.0), Point::new(width, height)));
}

fn pad(
    db: &mut BoardDB,
    footprint: FootprintId,
    number: &str,
    position: Point<f64>,
    size: (f64, f64),
    net: NetId,
    through_hole: bool,
) {
    let (kind, shape, layers) = if through_hole {
        (PadKind::ThroughHole, PadShape::Rect, db.stack.layers().to_vec())
    } else {
        (PadKind::Smd, PadShape::Rect, vec![Layer::Top])
    };
    db.add_pad(Pad {
        footprint,
        number: number.to_string(),
        position,
        width: size.0,
        height: size.1,
        shape,
        kind,
        net,
        layers,
    });
}

/// 40x30mm two-layer board: a driver with nine LED lines on its left edge,
/// nine LEDs in a column on the right, and four power pads that share the
/// board with them.
pub fn charlieplex_board() -> BoardDB {
    let mut db = BoardDB::new();
    outline(&mut db, 40.0, 30.0);

    let power: Vec<NetId> = CHARLIEPLEX_POWER_NETS
        .iter()
        .map(|n| db.net_named(n))
        .collect();
    let lines: Vec<NetId> = (0..9).map(|i| db.net_named(&format!("LINE_{}", i))).collect();

    let u1 = db.add_footprint("U1".into(), "Driver:QFN".into(), Point::new(5.0, 15.0), 0.0, Layer::Top);
    for (i, net) in lines.iter().enumerate() {
        let y = 3.0 + 3.0 * i as f64;
        pad(&mut db, u1, &(i + 1).to_string(), Point::new(5.0, y), (1.0, 1.0), *net, false);
    }
    for (i, net) in power.iter().enumerate() {
        let y = 5.0 + 7.0 * i as f64;
        pad(&mut db, u1, &(10 + i).to_string(), Point::new(37.0, y), (1.0, 1.0), *net, false);
    }

    let gnd = power[1];
    for (i, net) in lines.iter().enumerate() {
        let y = 4.5 + 3.0 * i as f64;
        let d = db.add_footprint(
            format!("D{}", i + 1),
            "LED:0805".into(),
            Point::new(31.0, y),
            0.0,
            Layer::Top,
        );
        pad(&mut db, d, "1", Point::new(30.0, y), (1.0, 1.0), *net, false);
        pad(&mut db, d, "2", Point::new(32.0, y), (1.0, 1.0), gnd, false);
    }
    db
}

/// Wall x positions of the fine-pitch pins in [`fine_pitch_board`].
pub const FINE_PITCH_PINS: [f64; 3] = [10.0, 10.8, 11.6];

/// A row of 0.8mm-pitch through-hole pins (0.42mm wide, unconnected) walled
/// off on both sides, with two nets that must pass between the pins. The two
/// gaps are only usable on a grid that has a column at their centres.
pub fn fine_pitch_board() -> BoardDB {
    let mut db = BoardDB::new();
    outline(&mut db, 22.0, 20.0);

    let wall = db.add_footprint("U1".into(), "Package_QFP:fragment".into(), Point::new(10.8, 10.0), 0.0, Layer::Top);
    for (i, x) in FINE_PITCH_PINS.iter().enumerate() {
        pad(&mut db, wall, &(i + 1).to_string(), Point::new(*x, 10.0), (0.42, 1.2), NetId::UNCONNECTED, true);
    }
    pad(&mut db, wall, "MP1", Point::new(4.8, 10.0), (9.4, 1.2), NetId::UNCONNECTED, true);
    pad(&mut db, wall, "MP2", Point::new(16.95, 10.0), (9.9, 1.2), NetId::UNCONNECTED, true);

    for (name, x) in [("CH_A", 6.0), ("CH_B", 16.0)] {
        let net = db.net_named(name);
        let fp = db.add_footprint(format!("J_{}", name), "TestPoint".into(), Point::new(x, 10.0), 0.0, Layer::Top);
        pad(&mut db, fp, "1", Point::new(x, 3.0), (1.0, 1.0), net, false);
        pad(&mut db, fp, "2", Point::new(x, 17.0), (1.0, 1.0), net, false);
    }
    db
}

/// Random two-pad nets on a `width` x `height` board, pads snapped to a 2.5mm
/// lattice so they never overlap.
pub fn random_board(num_nets: usize, width: f64, height: f64, seed: u64) -> BoardDB {
    let mut db = BoardDB::new();
    outline(&mut db, width, height);
    let mut rng = StdRng::seed_from_u64(seed);

    let pitch = 2.5;
    let mut sites = Vec::new();
    let mut y = pitch;
    while y <= height - pitch {
        let mut x = pitch;
        while x <= width - pitch {
            sites.push(Point::new(x, y));
            x += pitch;
        }
        y += pitch;
    }
    sites.shuffle(&mut rng);

    let usable = (sites.len() / 2).min(num_nets);
    if usable < num_nets {
        log::warn!("Board only has room for {} of {} nets", usable, num_nets);
    }
    log::info!(
        "Generating random board: {} nets on {}x{}mm (seed {})",
        usable,
        width,
        height,
        seed
    );
    for i in 0..usable {
        let net = db.net_named(&format!("N{}", i));
        let (a, b) = (sites[2 * i], sites[2 * i + 1]);
        let fp = db.add_footprint(format!("R{}", i + 1), "R_0603".into(), a, 0.0, Layer::Top);
        pad(&mut db, fp, "1", a, (0.9, 0.9), net, false);
        pad(&mut db, fp, "2", b, (0.9, 0.9), net, false);
    }
    db
}

pub fn write_to_file(db: &BoardDB, filename: &str) -> std::io::Result<()> {
    let mut file = File::create(filename)?;
    file.write_all(write_board(db).as_bytes())?;
    log::info!("Wrote {} ({} pads, {} nets)", filename, db.pads.len(), db.num_nets());
    Ok(())
}
