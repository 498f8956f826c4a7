//! 2D vector arithmetic.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// A point or direction in continuous world space (pixels).
///
/// Equality compares the exact field values; no epsilon is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2D {
    pub x: f64,
    pub y: f64,
}

impl Vector2D {
    pub const ZERO: Vector2D = Vector2D { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing at `angle` radians (0 = +x, counter-clockwise).
    pub fn from_angle(angle: f64) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }

    /// Normalize in place. The zero vector stays zero.
    pub fn normalize(&mut self) {
        let len = self.length();
        if len > 0.0 {
            self.x /= len;
            self.y /= len;
        }
    }

    pub fn normalized(&self) -> Self {
        let mut v = *self;
        v.normalize();
        v
    }

    pub fn distance(&self, other: &Vector2D) -> f64 {
        (*other - *self).length()
    }

    pub fn dot(&self, other: &Vector2D) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product.
    pub fn cross(&self, other: &Vector2D) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Directional angle in radians, in `(-PI, PI]`.
    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn rotated(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// Unit vector from `self` towards `target`, or zero when they coincide.
    pub fn direction_to(&self, target: &Vector2D) -> Self {
        (*target - *self).normalized()
    }

    /// Move towards `target` by at most `max_step`, never overshooting.
    pub fn step_towards(&self, target: &Vector2D, max_step: f64) -> Self {
        let remaining = self.distance(target);
        if remaining <= max_step {
            *target
        } else {
            *self + self.direction_to(target) * max_step
        }
    }

    /// Shortest distance from `self` to the segment `a..b`.
    pub fn distance_to_segment(&self, a: &Vector2D, b: &Vector2D) -> f64 {
        let ab = *b - *a;
        let len_sq = ab.length_squared();
        if len_sq == 0.0 {
            return self.distance(a);
        }
        let t = ((*self - *a).dot(&ab) / len_sq).clamp(0.0, 1.0);
        self.distance(&(*a + ab * t))
    }
}

impl Eq for Vector2D {}

impl Hash for Vector2D {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // -0.0 and 0.0 compare equal, so they must hash equal too
        (self.x + 0.0).to_bits().hash(state);
        (self.y + 0.0).to_bits().hash(state);
    }
}

impl Add for Vector2D {
    type Output = Vector2D;

    fn add(self, rhs: Vector2D) -> Vector2D {
        Vector2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector2D {
    fn add_assign(&mut self, rhs: Vector2D) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector2D {
    type Output = Vector2D;

    fn sub(self, rhs: Vector2D) -> Vector2D {
        Vector2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vector2D {
    fn sub_assign(&mut self, rhs: Vector2D) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Vector2D {
    type Output = Vector2D;

    fn mul(self, rhs: f64) -> Vector2D {
        Vector2D::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vector2D {
    type Output = Vector2D;

    fn div(self, rhs: f64) -> Vector2D {
        Vector2D::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vector2D {
    type Output = Vector2D;

    fn neg(self) -> Vector2D {
        Vector2D::new(-self.x, -self.y)
    }
}
