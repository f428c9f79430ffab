use pcb_common::geom::coord::GridCoord;
use pcb_common::geom::point::Point;
use pcb_common::geom::rect::Rect;

/// Maps board millimetres to routing grid cells and back. Cell `(0, 0)` sits
/// on the lower corner of the routed area; cell centres are grid points.
#[derive(Clone, Debug, PartialEq)]
pub struct GridConverter {
    scale_x: f64,
    scale_y: f64,
    offset_x: f64,
    offset_y: f64,
    grid_w: u32,
    grid_h: u32,
}

impl GridConverter {
    pub fn from_steps(
        step_x: f64,
        step_y: f64,
        off_x: f64,
        off_y: f64,
        grid_w: u32,
        grid_h: u32,
    ) -> Self {
        Self {
            scale_x: 1.0 / step_x,
            scale_y: 1.0 / step_y,
            offset_x: off_x,
            offset_y: off_y,
            grid_w: grid_w.max(1),
            grid_h: grid_h.max(1),
        }
    }

    /// Square cells of `resolution` covering `bounds`, both edges included.
    pub fn for_area(bounds: &Rect, resolution: f64) -> Self {
        let cols = (bounds.width() / resolution - 1e-9).ceil().max(0.0) as u32 + 1;
        let rows = (bounds.height() / resolution - 1e-9).ceil().max(0.0) as u32 + 1;
        Self::from_steps(
            resolution,
            resolution,
            bounds.min.x,
            bounds.min.y,
            cols,
            rows,
        )
    }

    pub fn width(&self) -> u32 {
        self.grid_w
    }

    pub fn height(&self) -> u32 {
        self.grid_h
    }

    pub fn resolution(&self) -> f64 {
        1.0 / self.scale_x
    }

    /// Nearest cell, clamped onto the grid.
    pub fn to_grid(&self, p: Point<f64>, layer: u8) -> GridCoord {
        let raw_x = (p.x - self.offset_x) * self.scale_x;
        let raw_y = (p.y - self.offset_y) * self.scale_y;

        let x = raw_x.round().max(0.0).min((self.grid_w - 1) as f64) as u32;
        let y = raw_y.round().max(0.0).min((self.grid_h - 1) as f64) as u32;

        GridCoord::new(x, y, layer)
    }

    /// Inclusive cell ranges whose centres may fall inside `r`.
    pub fn cell_span(&self, r: &Rect) -> Option<((u32, u32), (u32, u32))> {
        let x0 = ((r.min.x - self.offset_x) * self.scale_x).floor();
        let x1 = ((r.max.x - self.offset_x) * self.scale_x).ceil();
        let y0 = ((r.min.y - self.offset_y) * self.scale_y).floor();
        let y1 = ((r.max.y - self.offset_y) * self.scale_y).ceil();
        let max_x = (self.grid_w - 1) as f64;
        let max_y = (self.grid_h - 1) as f64;
        if x1 < 0.0 || y1 < 0.0 || x0 > max_x || y0 > max_y {
            return None;
        }
        Some((
            (x0.max(0.0) as u32, x1.min(max_x) as u32),
            (y0.max(0.0) as u32, y1.min(max_y) as u32),
        ))
    }

    pub fn to_world(&self, g: GridCoord) -> Point<f64> {
        self.to_mm(g.x, g.y)
    }

    pub fn to_mm(&self, x: u32, y: u32) -> Point<f64> {
        Point::new(
            (x as f64 / self.scale_x) + self.offset_x,
            (y as f64 / self.scale_y) + self.offset_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_clamp() {
        let area = Rect::new(Point::new(0.0, 0.0), Point::new(22.0, 20.0));
        let conv = GridConverter::for_area(&area, 0.1);
        assert_eq!(conv.width(), 221);
        assert_eq!(conv.height(), 201);

        let g = conv.to_grid(Point::new(10.4, 3.0), 1);
        assert_eq!((g.x, g.y, g.z), (104, 30, 1));
        assert!(conv.to_world(g).approx_eq(Point::new(10.4, 3.0), 1e-9));

        let clamped = conv.to_grid(Point::new(-5.0, 99.0), 0);
        assert_eq!((clamped.x, clamped.y), (0, 200));
    }

    #[test]
    fn test_cell_span() {
        let area = Rect::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let conv = GridConverter::for_area(&area, 0.5);
        let span = conv.cell_span(&Rect::new(Point::new(1.1, 2.0), Point::new(1.9, 2.2)));
        assert_eq!(span, Some(((2, 4), (4, 5))));
        assert_eq!(
            conv.cell_span(&Rect::new(Point::new(20.0, 20.0), Point::new(21.0, 21.0))),
            None
        );
    }
}
