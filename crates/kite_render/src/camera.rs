use glam::{Mat4, Vec2, Vec3};
use kite_core::math::Rect;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

/// 2D camera in the raylib style: `target` is the world point looked at,
/// `offset` displaces it on screen, `rotation` is in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    pub target: Vec2,
    pub offset: Vec2,
    pub zoom: f32,
    pub rotation: f32,
    pub viewport: (u32, u32),
}

impl Camera2D {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            target: Vec2::ZERO,
            offset: Vec2::ZERO,
            zoom: 1.0,
            rotation: 0.0,
            viewport: (viewport_width, viewport_height),
        }
    }

    fn safe_zoom(&self) -> f32 {
        if self.zoom.abs() < f32::EPSILON {
            1.0
        } else {
            self.zoom
        }
    }

    /// Center the view on a world point.
    pub fn look_at(&mut self, x: f32, y: f32) {
        self.target = Vec2::new(x, y);
    }

    /// Move the view so its top-left corner sits on a world point.
    pub fn place_top_left(&mut self, x: f32, y: f32) {
        let zoom = self.safe_zoom();
        self.target = Vec2::new(
            x + self.offset.x / zoom + self.viewport.0 as f32 / 2.0 / zoom,
            y + self.offset.y / zoom + self.viewport.1 as f32 / 2.0 / zoom,
        );
    }

    /// World-space rectangle covered by the viewport.
    pub fn view_rect(&self) -> Rect {
        let zoom = self.safe_zoom();
        let (win_w, win_h) = (self.viewport.0 as f32, self.viewport.1 as f32);
        Rect::new(
            -self.offset.x / zoom + self.target.x - win_w / 2.0 / zoom,
            -self.offset.y / zoom + self.target.y - win_h / 2.0 / zoom,
            win_w / zoom + self.offset.x / zoom,
            win_h / zoom + self.offset.y / zoom,
        )
    }

    pub fn build_uniform(&self) -> CameraUniform {
        let zoom = self.safe_zoom();
        let half_w = (self.viewport.0 as f32) / (2.0 * zoom);
        let half_h = (self.viewport.1 as f32) / (2.0 * zoom);
        let center = self.target - self.offset / zoom;

        // y grows downward in world space, so top maps to the lower bound.
        let proj = Mat4::orthographic_rh(
            center.x - half_w,
            center.x + half_w,
            center.y + half_h,
            center.y - half_h,
            -1.0,
            1.0,
        );
        let spin = Mat4::from_translation(Vec3::new(center.x, center.y, 0.0))
            * Mat4::from_rotation_z(-self.rotation.to_radians())
            * Mat4::from_translation(Vec3::new(-center.x, -center.y, 0.0));

        CameraUniform {
            view_proj: (proj * spin).to_cols_array_2d(),
        }
    }
}
