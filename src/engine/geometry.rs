// Vectors and collision shapes in world space.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Vector2) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction; the zero vector stays zero.
    pub fn normalize(self) -> Vector2 {
        let len = self.length();
        if len <= f32::EPSILON {
            Vector2::ZERO
        } else {
            Vector2::new(self.x / len, self.y / len)
        }
    }

    pub fn dot(self, other: Vector2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Perpendicular rotated a quarter turn counter-clockwise.
    pub fn perp(self) -> Vector2 {
        Vector2::new(-self.y, self.x)
    }

    /// Moves toward `target` by at most `max_step`.
    pub fn move_towards(self, target: Vector2, max_step: f32) -> Vector2 {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_step || dist <= f32::EPSILON {
            target
        } else {
            self + delta * (max_step / dist)
        }
    }
}

impl Add for Vector2 {
    type Output = Vector2;
    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;
    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector2 {
    type Output = Vector2;
    fn mul(self, rhs: f32) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned rectangle: `length` spans x, `width` spans y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub center: Vector2,
    pub length: f32,
    pub width: f32,
}

impl Rect {
    pub fn contains(&self, p: Vector2) -> bool {
        (p.x - self.center.x).abs() <= self.length / 2.0
            && (p.y - self.center.y).abs() <= self.width / 2.0
    }
}

/// Hitbox used by skills.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Rectangle whose `length` runs along `direction`.
    Rect {
        center: Vector2,
        length: f32,
        width: f32,
        direction: Vector2,
    },
    Circle { center: Vector2, radius: f32 },
}

impl Shape {
    /// Oriented rectangle; a zero direction falls back to +x.
    pub fn oriented_rect(center: Vector2, length: f32, width: f32, direction: Vector2) -> Shape {
        let dir = direction.normalize();
        let direction = if dir == Vector2::ZERO {
            Vector2::new(1.0, 0.0)
        } else {
            dir
        };
        Shape::Rect {
            center,
            length,
            width,
            direction,
        }
    }

    pub fn circle(center: Vector2, radius: f32) -> Shape {
        Shape::Circle { center, radius }
    }

    pub fn contains(&self, p: Vector2) -> bool {
        match *self {
            Shape::Rect {
                center,
                length,
                width,
                direction,
            } => {
                let local = p - center;
                let along = local.dot(direction);
                let across = local.dot(direction.perp());
                along.abs() <= length / 2.0 && across.abs() <= width / 2.0
            }
            Shape::Circle { center, radius } => center.distance(p) <= radius,
        }
    }

    pub fn center(&self) -> Vector2 {
        match *self {
            Shape::Rect { center, .. } | Shape::Circle { center, .. } => center,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zero_stays_zero() {
        assert_eq!(Vector2::ZERO.normalize(), Vector2::ZERO);
        let n = Vector2::new(3.0, 4.0).normalize();
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_move_towards_clamps_at_target() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(1.0, 0.0);
        assert_eq!(a.move_towards(b, 5.0), b);
        assert_eq!(a.move_towards(b, 0.25), Vector2::new(0.25, 0.0));
    }

    #[test]
    fn test_oriented_rect_contains() {
        // 8 long along +y, 4 wide.
        let rect = Shape::oriented_rect(Vector2::new(0.0, 4.0), 8.0, 4.0, Vector2::new(0.0, 1.0));
        assert!(rect.contains(Vector2::new(0.0, 0.0)));
        assert!(rect.contains(Vector2::new(1.9, 7.9)));
        assert!(!rect.contains(Vector2::new(2.1, 4.0)));
        assert!(!rect.contains(Vector2::new(0.0, 8.5)));
    }

    #[test]
    fn test_diagonal_rect() {
        let dir = Vector2::new(1.0, 1.0);
        let rect = Shape::oriented_rect(Vector2::ZERO, 4.0, 1.0, dir);
        assert!(rect.contains(Vector2::new(1.2, 1.2)));
        assert!(!rect.contains(Vector2::new(1.2, -1.2)));
    }

    #[test]
    fn test_circle_and_axis_rect() {
        let c = Shape::circle(Vector2::new(1.0, 1.0), 2.0);
        assert!(c.contains(Vector2::new(2.0, 2.0)));
        assert!(!c.contains(Vector2::new(3.0, 3.0)));

        let r = Rect {
            center: Vector2::new(10.0, 10.0),
            length: 4.0,
            width: 2.0,
        };
        assert!(r.contains(Vector2::new(11.9, 10.9)));
        assert!(!r.contains(Vector2::new(10.0, 11.5)));
    }
}
