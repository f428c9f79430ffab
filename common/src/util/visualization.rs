use crate::db::core::BoardDB;
use crate::db::layers::Layer;
use image::{ImageResult, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

fn layer_color(layer: Layer) -> Rgba<u8> {
    match layer {
        Layer::Top => Rgba([230, 60, 60, 200]),
        Layer::Bottom => Rgba([60, 120, 240, 200]),
        Layer::Inner(n) => {
            let palette = [
                Rgba([0, 200, 100, 190]),
                Rgba([230, 200, 0, 190]),
                Rgba([180, 60, 240, 190]),
                Rgba([0, 220, 230, 190]),
            ];
            palette[(n as usize).saturating_sub(1) % palette.len()]
        }
    }
}

/// Render pads, traces and vias to a PNG, `width` pixels wide.
pub fn draw_board(db: &BoardDB, filename: &str, width: u32) -> ImageResult<()> {
    let bounds = db.board_bounds(1.0);
    let scale = width as f64 / bounds.width().max(1e-6);
    let height = ((bounds.height() * scale).ceil() as u32).max(1);
    let mut img = RgbaImage::from_pixel(width, height, Rgba([15, 15, 20, 255]));

    let map = |x: f64, y: f64| ((x - bounds.min.x) * scale, (y - bounds.min.y) * scale);

    for (a, b) in db.outline.edges() {
        let (x1, y1) = map(a.x, a.y);
        let (x2, y2) = map(b.x, b.y);
        draw_line_segment_mut(
            &mut img,
            (x1 as f32, y1 as f32),
            (x2 as f32, y2 as f32),
            Rgba([220, 220, 90, 255]),
        );
    }

    for pad in &db.pads {
        let r = pad.rect();
        let (x, y) = map(r.min.x, r.min.y);
        let w = ((r.width() * scale) as u32).max(1);
        let h = ((r.height() * scale) as u32).max(1);
        let rect = ImageRect::at(x as i32, y as i32).of_size(w, h);
        if pad.net.is_connected() {
            draw_filled_rect_mut(&mut img, rect, Rgba([200, 160, 60, 255]));
        } else {
            draw_hollow_rect_mut(&mut img, rect, Rgba([140, 140, 140, 255]));
        }
    }

    // Bottom first so top copper stays visible.
    let mut segments: Vec<_> = db.segments.iter().collect();
    segments.sort_by_key(|s| std::cmp::Reverse(s.layer));
    for seg in segments {
        let (x1, y1) = map(seg.start.x, seg.start.y);
        let (x2, y2) = map(seg.end.x, seg.end.y);
        let color = layer_color(seg.layer);
        let px = (seg.width * scale).round().max(1.0) as i32;
        // Thick lines as parallel strokes.
        for k in 0..px {
            let off = k as f64 - (px - 1) as f64 / 2.0;
            let dx = x2 - x1;
            let dy = y2 - y1;
            let len = (dx * dx + dy * dy).sqrt().max(1e-9);
            let (nx, ny) = (-dy / len * off, dx / len * off);
            draw_line_segment_mut(
                &mut img,
                ((x1 + nx) as f32, (y1 + ny) as f32),
                ((x2 + nx) as f32, (y2 + ny) as f32),
                color,
            );
        }
    }

    for via in &db.vias {
        let (x, y) = map(via.position.x, via.position.y);
        let r = ((via.diameter / 2.0 * scale) as i32).max(1);
        draw_filled_circle_mut(&mut img, (x as i32, y as i32), r, Rgba([230, 230, 230, 255]));
        let hole = ((via.drill / 2.0 * scale) as i32).max(1);
        draw_filled_circle_mut(&mut img, (x as i32, y as i32), hole, Rgba([15, 15, 20, 255]));
    }

    img.save(Path::new(filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::generator::charlieplex_board;

    #[test]
    fn test_draw_board_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.png");
        let db = charlieplex_board();
        draw_board(&db, path.to_str().unwrap(), 400).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), 400);
        assert_eq!(img.height(), 300);
    }
}
