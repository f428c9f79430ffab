use std::ops::{Add, Mul, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point<T> {
    pub x: T,
    pub y: T,
}

impl<T> Point<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl Point<f64> {
    pub fn distance(&self, other: Point<f64>) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn dot(&self, other: Point<f64>) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn cross(&self, other: Point<f64>) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Unit vector, or the zero vector for a degenerate input.
    pub fn normalized(&self) -> Point<f64> {
        let len = self.length();
        if len < 1e-12 {
            Point::new(0.0, 0.0)
        } else {
            Point::new(self.x / len, self.y / len)
        }
    }

    pub fn approx_eq(&self, other: Point<f64>, tolerance: f64) -> bool {
        self.distance(other) <= tolerance
    }

    /// Rotate by `degrees` using KiCad's convention (clockwise on screen, y down).
    pub fn rotated_kicad(&self, degrees: f64) -> Point<f64> {
        if degrees == 0.0 {
            return *self;
        }
        let (s, c) = degrees.to_radians().sin_cos();
        Point::new(self.x * c + self.y * s, -self.x * s + self.y * c)
    }
}

impl<T: Add<Output = T>> Add for Point<T> {
    type Output = Point<T>;
    fn add(self, rhs: Self) -> Self::Output {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<T: Sub<Output = T>> Sub for Point<T> {
    type Output = Point<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl<T: Mul<Output = T> + Copy> Mul<T> for Point<T> {
    type Output = Point<T>;
    fn mul(self, rhs: T) -> Self::Output {
        Point::new(self.x * rhs, self.y * rhs)
    }
}
