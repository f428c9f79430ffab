use super::distance::point_segment_distance;
use super::point::Point;
use super::rect::Rect;

/// Simple closed polygon; the closing edge from the last vertex back to the
/// first is implicit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    pub vertices: Vec<Point<f64>>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point<f64>>) -> Self {
        Self { vertices }
    }

    pub fn from_rect(r: &Rect) -> Self {
        Self {
            vertices: r.corners().to_vec(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.len() < 3
    }

    pub fn bounding_box(&self) -> Rect {
        let mut it = self.vertices.iter();
        let Some(first) = it.next() else {
            return Rect::default();
        };
        let mut r = Rect::new(*first, *first);
        for p in it {
            r = r.union(&Rect::new(*p, *p));
        }
        r
    }

    pub fn edges(&self) -> impl Iterator<Item = (Point<f64>, Point<f64>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Even-odd ray casting. Points exactly on an edge may land either way.
    pub fn contains(&self, p: Point<f64>) -> bool {
        if self.is_empty() {
            return false;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    pub fn distance_to_boundary(&self, p: Point<f64>) -> f64 {
        self.edges()
            .map(|(a, b)| point_segment_distance(p, a, b))
            .fold(f64::INFINITY, f64::min)
    }
}
