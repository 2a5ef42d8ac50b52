//! 2D math primitives shared by every layer of the engine.
//!
//! Matrices use the row-vector convention: a point is transformed as
//! `x' = x*a + y*c + tx`, `y' = x*b + y*d + ty`, and composition is
//! `result = first * second` (apply `first`, then `second`). A child's world
//! matrix is therefore `local * parent_world`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub const DEG2RAD: f32 = std::f32::consts::PI / 180.0;

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    pub fn intersects_circle(&self, center: Vec2, radius: f32) -> bool {
        let half_w = self.width * 0.5;
        let half_h = self.height * 0.5;
        let c = self.center();
        let dx = (center.x - c.x).abs();
        let dy = (center.y - c.y).abs();

        if dx > half_w + radius || dy > half_h + radius {
            return false;
        }
        if dx <= half_w || dy <= half_h {
            return true;
        }
        let corner_dx = dx - half_w;
        let corner_dy = dy - half_h;
        corner_dx * corner_dx + corner_dy * corner_dy <= radius * radius
    }
}

pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    a.distance(b) <= ra + rb
}

/// Running min/max over a set of points. `reset` starts a new accumulation;
/// the first point after a reset seeds both corners.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundsAccumulator {
    min: Vec2,
    max: Vec2,
    fresh: bool,
}

impl BoundsAccumulator {
    pub fn new() -> Self {
        Self {
            min: Vec2::ZERO,
            max: Vec2::ZERO,
            fresh: true,
        }
    }

    pub fn reset(&mut self) {
        self.fresh = true;
    }

    pub fn encapsulate(&mut self, p: Vec2) {
        if self.fresh {
            self.min = p;
            self.max = p;
            self.fresh = false;
            return;
        }
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn rect(&self) -> Rect {
        Rect::new(
            self.min.x,
            self.min.y,
            self.max.x - self.min.x,
            self.max.y - self.min.y,
        )
    }
}

/// 2x3 affine matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix2D {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Matrix2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix2D {
    pub const IDENTITY: Matrix2D = Matrix2D {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    /// `self * m`: apply `self` first, then `m`.
    pub fn multiply(&self, m: &Matrix2D) -> Matrix2D {
        Matrix2D {
            a: self.a * m.a + self.b * m.c,
            b: self.a * m.b + self.b * m.d,
            c: self.c * m.a + self.d * m.c,
            d: self.c * m.b + self.d * m.d,
            tx: self.tx * m.a + self.ty * m.c + m.tx,
            ty: self.tx * m.b + self.ty * m.d + m.ty,
        }
    }

    pub fn scale(&mut self, sx: f32, sy: f32) {
        *self = self.multiply(&Matrix2D::new(sx, 0.0, 0.0, sy, 0.0, 0.0));
    }

    /// Skew angles in degrees.
    pub fn skew(&mut self, kx: f32, ky: f32) {
        let m = Matrix2D::new(1.0, (ky * DEG2RAD).tan(), (kx * DEG2RAD).tan(), 1.0, 0.0, 0.0);
        *self = self.multiply(&m);
    }

    /// Rotation in degrees.
    pub fn rotate(&mut self, degrees: f32) {
        let (sin, cos) = (degrees * DEG2RAD).sin_cos();
        *self = self.multiply(&Matrix2D::new(cos, sin, -sin, cos, 0.0, 0.0));
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.tx += x;
        self.ty += y;
    }

    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x * self.a + p.y * self.c + self.tx,
            p.x * self.b + p.y * self.d + self.ty,
        )
    }

    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.tx, self.ty)
    }

    pub fn approx_eq(&self, other: &Matrix2D, eps: f32) -> bool {
        (self.a - other.a).abs() <= eps
            && (self.b - other.b).abs() <= eps
            && (self.c - other.c).abs() <= eps
            && (self.d - other.d).abs() <= eps
            && (self.tx - other.tx).abs() <= eps
            && (self.ty - other.ty).abs() <= eps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const RED: Color = Color::rgba(230, 41, 55, 255);
    pub const LIME: Color = Color::rgba(0, 158, 47, 255);
    pub const MAGENTA: Color = Color::rgba(255, 0, 255, 255);
    pub const BLUE: Color = Color::rgba(0, 121, 241, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_intersection_is_strict_on_shared_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let touching = Rect::new(10.0, 0.0, 5.0, 5.0);
        let overlapping = Rect::new(9.0, 9.0, 5.0, 5.0);
        assert!(!a.intersects(&touching));
        assert!(a.intersects(&overlapping));
    }

    #[test]
    fn circle_rect_overlap_handles_corners() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.intersects_circle(Vec2::new(5.0, 5.0), 1.0));
        assert!(r.intersects_circle(Vec2::new(12.0, 5.0), 2.5));
        // Diagonal from the corner (10,10) is ~2.83, outside a radius of 2.
        assert!(!r.intersects_circle(Vec2::new(12.0, 12.0), 2.0));
        assert!(r.intersects_circle(Vec2::new(12.0, 12.0), 3.0));
    }

    #[test]
    fn circles_touching_count_as_overlap() {
        assert!(circles_overlap(Vec2::ZERO, 1.0, Vec2::new(2.0, 0.0), 1.0));
        assert!(!circles_overlap(Vec2::ZERO, 1.0, Vec2::new(2.1, 0.0), 1.0));
    }

    #[test]
    fn accumulator_reset_discards_previous_points() {
        let mut acc = BoundsAccumulator::new();
        acc.encapsulate(Vec2::new(-100.0, -100.0));
        acc.reset();
        acc.encapsulate(Vec2::new(1.0, 2.0));
        acc.encapsulate(Vec2::new(4.0, -1.0));
        assert_eq!(acc.rect(), Rect::new(1.0, -1.0, 3.0, 3.0));
    }

    #[test]
    fn multiply_applies_left_operand_first() {
        let mut scale = Matrix2D::IDENTITY;
        scale.scale(2.0, 2.0);
        let mut shift = Matrix2D::IDENTITY;
        shift.translate(5.0, 0.0);

        let p = Vec2::new(1.0, 1.0);
        assert_eq!(scale.multiply(&shift).transform_point(p), Vec2::new(7.0, 2.0));
        assert_eq!(shift.multiply(&scale).transform_point(p), Vec2::new(12.0, 2.0));
    }

    #[test]
    fn rotate_quarter_turn_maps_x_axis_to_y_axis() {
        let mut m = Matrix2D::IDENTITY;
        m.rotate(90.0);
        let p = m.transform_point(Vec2::new(1.0, 0.0));
        assert!(p.x.abs() < 1e-5);
        assert!((p.y - 1.0).abs() < 1e-5);
    }
}
