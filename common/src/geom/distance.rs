//! Exact planar distances between the primitive copper shapes.

use super::point::Point;
use super::rect::Rect;

const EPS: f64 = 1e-12;

pub fn point_segment_distance(p: Point<f64>, a: Point<f64>, b: Point<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq < EPS {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

fn orientation(p: Point<f64>, q: Point<f64>, r: Point<f64>) -> i32 {
    let val = (q.y - p.y) * (r.x - q.x) - (q.x - p.x) * (r.y - q.y);
    if val.abs() < EPS {
        return 0;
    }
    if val > 0.0 { 1 } else { 2 }
}

fn on_segment(p: Point<f64>, a: Point<f64>, b: Point<f64>) -> bool {
    p.x >= a.x.min(b.x) - EPS
        && p.x <= a.x.max(b.x) + EPS
        && p.y >= a.y.min(b.y) - EPS
        && p.y <= a.y.max(b.y) + EPS
}

pub fn segments_intersect(a1: Point<f64>, a2: Point<f64>, b1: Point<f64>, b2: Point<f64>) -> bool {
    let o1 = orientation(a1, a2, b1);
    let o2 = orientation(a1, a2, b2);
    let o3 = orientation(b1, b2, a1);
    let o4 = orientation(b1, b2, a2);

    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == 0 && on_segment(b1, a1, a2))
        || (o2 == 0 && on_segment(b2, a1, a2))
        || (o3 == 0 && on_segment(a1, b1, b2))
        || (o4 == 0 && on_segment(a2, b1, b2))
}

pub fn segment_segment_distance(
    a1: Point<f64>,
    a2: Point<f64>,
    b1: Point<f64>,
    b2: Point<f64>,
) -> f64 {
    if segments_intersect(a1, a2, b1, b2) {
        return 0.0;
    }
    point_segment_distance(a1, b1, b2)
        .min(point_segment_distance(a2, b1, b2))
        .min(point_segment_distance(b1, a1, a2))
        .min(point_segment_distance(b2, a1, a2))
}

pub fn point_rect_distance(p: Point<f64>, r: &Rect) -> f64 {
    let dx = (r.min.x - p.x).max(0.0).max(p.x - r.max.x);
    let dy = (r.min.y - p.y).max(0.0).max(p.y - r.max.y);
    (dx * dx + dy * dy).sqrt()
}

pub fn segment_rect_distance(a: Point<f64>, b: Point<f64>, r: &Rect) -> f64 {
    if r.contains(a) || r.contains(b) {
        return 0.0;
    }
    let c = r.corners();
    let mut best = f64::INFINITY;
    for i in 0..4 {
        let d = segment_segment_distance(a, b, c[i], c[(i + 1) % 4]);
        if d < best {
            best = d;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_segment_distance() {
        let d = point_segment_distance(
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert!((d - 1.0).abs() < 1e-12);
        let d = point_segment_distance(
            Point::new(3.0, 0.0),
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
        );
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_crossing_segments_touch() {
        let d = segment_segment_distance(
            Point::new(0.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(2.0, 0.0),
        );
        assert_eq!(d, 0.0);
    }

    #[test]
    fn test_segment_rect_distance() {
        let r = Rect::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0));
        let d = segment_rect_distance(Point::new(-1.0, 1.5), Point::new(2.0, 1.5), &r);
        assert!((d - 0.5).abs() < 1e-12);
        let d = segment_rect_distance(Point::new(-1.0, 0.5), Point::new(2.0, 0.5), &r);
        assert_eq!(d, 0.0);
        let p = point_rect_distance(Point::new(2.0, 2.0), &r);
        assert!((p - 2f64.sqrt()).abs() < 1e-12);
    }
}
