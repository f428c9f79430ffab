use super::point::Point;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub min: Point<f64>,
    pub max: Point<f64>,
}

impl Rect {
    pub fn new(min: Point<f64>, max: Point<f64>) -> Self {
        Self { min, max }
    }

    pub fn from_center(center: Point<f64>, width: f64, height: f64) -> Self {
        Self {
            min: Point::new(center.x - width / 2.0, center.y - height / 2.0),
            max: Point::new(center.x + width / 2.0, center.y + height / 2.0),
        }
    }

    /// Smallest rectangle containing both points, in any order.
    pub fn spanning(a: Point<f64>, b: Point<f64>) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
    pub fn center(&self) -> Point<f64> {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn contains(&self, p: Point<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Strict interior test, shrunk by `tolerance` on every side.
    pub fn contains_strict(&self, p: Point<f64>, tolerance: f64) -> bool {
        p.x > self.min.x + tolerance
            && p.x < self.max.x - tolerance
            && p.y > self.min.y + tolerance
            && p.y < self.max.y - tolerance
    }

    pub fn inflate(&self, margin: f64) -> Rect {
        Rect::new(
            Point::new(self.min.x - margin, self.min.y - margin),
            Point::new(self.max.x + margin, self.max.y + margin),
        )
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect::new(
            Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        )
    }

    pub fn corners(&self) -> [Point<f64>; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflate_and_contains() {
        let r = Rect::from_center(Point::new(1.0, 1.0), 2.0, 1.0);
        assert!(r.contains(Point::new(2.0, 1.5)));
        assert!(!r.contains_strict(Point::new(2.0, 1.5), 0.0));
        let big = r.inflate(0.5);
        assert!((big.width() - 3.0).abs() < 1e-12);
        assert!(big.contains_strict(Point::new(2.2, 1.0), 0.0));
    }
}
