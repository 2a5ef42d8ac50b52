//! Local affine transform of a scene node.
//!
//! The local matrix is rebuilt from position/scale/skew/rotation/pivot on
//! every call. With zero skew the rotation and scale are folded analytically;
//! otherwise the matrix is composed as scale -> skew -> rotate -> translate and
//! the pivot correction is written back into the translation.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::math::{Matrix2D, DEG2RAD};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    pub skew: Vec2,
    /// Degrees.
    pub rotation: f32,
    pub pivot: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            skew: Vec2::ZERO,
            rotation: 0.0,
            pivot: Vec2::ZERO,
        }
    }
}

impl Transform {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: Vec2::new(x, y),
            ..Self::default()
        }
    }

    pub fn local_matrix(&self) -> Matrix2D {
        if self.skew == Vec2::ZERO {
            self.local_matrix_fast()
        } else {
            self.local_matrix_composed()
        }
    }

    fn local_matrix_fast(&self) -> Matrix2D {
        let (sx, sy) = (self.scale.x, self.scale.y);
        let (px, py) = (self.pivot.x, self.pivot.y);

        if self.rotation == 0.0 {
            return Matrix2D::new(
                sx,
                0.0,
                0.0,
                sy,
                self.position.x - px * sx,
                self.position.y - py * sy,
            );
        }

        let (sin, cos) = (self.rotation * DEG2RAD).sin_cos();
        let a = sx * cos;
        let b = sx * sin;
        let c = sy * -sin;
        let d = sy * cos;
        let tx = self.position.x - px * a - py * c;
        let ty = self.position.y - px * b - py * d;
        Matrix2D::new(a, b, c, d, tx, ty)
    }

    /// General path. Public so the fast path can be checked against it.
    pub fn local_matrix_composed(&self) -> Matrix2D {
        let mut m = Matrix2D::IDENTITY;
        m.scale(self.scale.x, self.scale.y);
        m.skew(self.skew.x, self.skew.y);
        m.rotate(self.rotation);
        m.translate(self.position.x, self.position.y);

        if self.pivot != Vec2::ZERO {
            m.tx = self.position.x - m.a * self.pivot.x - m.c * self.pivot.y;
            m.ty = self.position.y - m.b * self.pivot.x - m.d * self.pivot.y;
        }
        m
    }

    /// Rotate toward `target` by interpolating the shortest angular distance.
    pub fn turn_to(&mut self, target: Vec2, speed: f32, angle_offset: f32) {
        let delta = target - self.position;
        let wanted = delta.y.atan2(delta.x) / DEG2RAD + angle_offset;
        self.rotation = lerp_angle_degrees(self.rotation, wanted, speed);
    }
}

/// World matrix of a node given its parent's world matrix.
pub fn compose_world(local: &Matrix2D, parent_world: Option<&Matrix2D>) -> Matrix2D {
    match parent_world {
        Some(parent) => local.multiply(parent),
        None => *local,
    }
}

fn lerp_angle_degrees(from: f32, to: f32, t: f32) -> f32 {
    let mut diff = (to - from) % 360.0;
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff < -180.0 {
        diff += 360.0;
    }
    from + diff * t.clamp(0.0, 1.0)
}
