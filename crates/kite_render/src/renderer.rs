//! Drawing boundary consumed by the scene.
//!
//! The scene never talks to a GPU directly: it hands sprite quads and debug
//! primitives to a [`Renderer`], and obtains texture handles from a
//! [`TextureLoader`]. [`RecordingRenderer`] implements both by capturing
//! commands in memory, which is what the headless runner and tests use.

use std::path::{Path, PathBuf};

use glam::Vec2;
use kite_core::math::{Color, Matrix2D, Rect};

pub type TextureHandle = u32;

/// A textured quad: `source` is the region of the texture, `size` the quad
/// extent in local units before `transform` is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteDraw {
    pub texture: TextureHandle,
    pub source: Rect,
    pub size: Vec2,
    pub transform: Matrix2D,
    pub flip_x: bool,
    pub flip_y: bool,
    pub tint: Color,
}

impl SpriteDraw {
    /// The quad's four corners in world space, clockwise from local (0,0).
    pub fn corners(&self) -> [Vec2; 4] {
        let (w, h) = (self.size.x, self.size.y);
        [
            self.transform.transform_point(Vec2::ZERO),
            self.transform.transform_point(Vec2::new(w, 0.0)),
            self.transform.transform_point(Vec2::new(w, h)),
            self.transform.transform_point(Vec2::new(0.0, h)),
        ]
    }
}

pub trait Renderer {
    fn draw_sprite(&mut self, sprite: &SpriteDraw);
    fn draw_rect_lines(&mut self, rect: Rect, color: Color);
    fn draw_circle_lines(&mut self, center: Vec2, radius: f32, color: Color);
    fn draw_line(&mut self, from: Vec2, to: Vec2, color: Color);
    fn draw_text(&mut self, text: &str, position: Vec2, size: f32, color: Color);
}

pub trait TextureLoader {
    /// Register an already-decoded image of the given size. Backends upload it;
    /// the returned handle is what [`SpriteDraw::texture`] refers to.
    fn load_texture(&mut self, path: &Path, width: u32, height: u32)
        -> Result<TextureHandle, String>;
    fn unload_texture(&mut self, handle: TextureHandle);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Sprite(SpriteDraw),
    RectLines { rect: Rect, color: Color },
    CircleLines { center: Vec2, radius: f32, color: Color },
    Line { from: Vec2, to: Vec2, color: Color },
    Text { text: String, position: Vec2, size: f32, color: Color },
}

#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub commands: Vec<DrawCommand>,
    textures: Vec<(TextureHandle, PathBuf, u32, u32)>,
    next_handle: TextureHandle,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn sprites(&self) -> impl Iterator<Item = &SpriteDraw> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Sprite(s) => Some(s),
            _ => None,
        })
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites().count()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

impl Renderer for RecordingRenderer {
    fn draw_sprite(&mut self, sprite: &SpriteDraw) {
        self.commands.push(DrawCommand::Sprite(*sprite));
    }

    fn draw_rect_lines(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::RectLines { rect, color });
    }

    fn draw_circle_lines(&mut self, center: Vec2, radius: f32, color: Color) {
        self.commands.push(DrawCommand::CircleLines {
            center,
            radius,
            color,
        });
    }

    fn draw_line(&mut self, from: Vec2, to: Vec2, color: Color) {
        self.commands.push(DrawCommand::Line { from, to, color });
    }

    fn draw_text(&mut self, text: &str, position: Vec2, size: f32, color: Color) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            position,
            size,
            color,
        });
    }
}

impl TextureLoader for RecordingRenderer {
    fn load_texture(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
    ) -> Result<TextureHandle, String> {
        if width == 0 || height == 0 {
            return Err(format!(
                "Texture {} has zero size ({width}x{height})",
                path.display()
            ));
        }
        self.next_handle += 1;
        let handle = self.next_handle;
        self.textures
            .push((handle, path.to_path_buf(), width, height));
        log::debug!("Registered texture {} as #{handle}", path.display());
        Ok(handle)
    }

    fn unload_texture(&mut self, handle: TextureHandle) {
        self.textures.retain(|(h, ..)| *h != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique_and_unloadable() {
        let mut r = RecordingRenderer::new();
        let a = r.load_texture(Path::new("a.png"), 4, 4).unwrap();
        let b = r.load_texture(Path::new("b.png"), 4, 4).unwrap();
        assert_ne!(a, b);
        r.unload_texture(a);
        assert_eq!(r.texture_count(), 1);
    }

    #[test]
    fn zero_sized_texture_is_rejected() {
        let mut r = RecordingRenderer::new();
        assert!(r.load_texture(Path::new("empty.png"), 0, 8).is_err());
    }

    #[test]
    fn sprite_corners_follow_transform() {
        let draw = SpriteDraw {
            texture: 1,
            source: Rect::new(0.0, 0.0, 8.0, 4.0),
            size: Vec2::new(8.0, 4.0),
            transform: Matrix2D::new(1.0, 0.0, 0.0, 1.0, 10.0, 20.0),
            flip_x: false,
            flip_y: false,
            tint: Color::WHITE,
        };
        let corners = draw.corners();
        assert_eq!(corners[0], Vec2::new(10.0, 20.0));
        assert_eq!(corners[2], Vec2::new(18.0, 24.0));
    }
}
