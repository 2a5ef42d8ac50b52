use glam::Vec2;
use kite_core::math::{Color, Rect};
use kite_render::SpriteDraw;

use crate::assets::AssetCache;
use crate::component::{Component, ComponentKind, DrawContext};
use crate::entity::Entity;

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    /// Key into the asset cache.
    pub image: String,
    pub flip_x: bool,
    pub flip_y: bool,
    pub clip: Rect,
    pub tint: Color,
}

impl Sprite {
    pub fn new(image: &str) -> Self {
        Self::with_clip(image, Rect::new(0.0, 0.0, 1.0, 1.0))
    }

    pub fn with_clip(image: &str, clip: Rect) -> Self {
        Self {
            image: image.to_string(),
            flip_x: false,
            flip_y: false,
            clip,
            tint: Color::WHITE,
        }
    }

    /// Clip covers the whole image when the key is already loaded.
    pub fn from_asset(image: &str, assets: &AssetCache) -> Self {
        match assets.get(image) {
            Some(record) => Self::with_clip(
                image,
                Rect::new(0.0, 0.0, record.width as f32, record.height as f32),
            ),
            None => {
                assets.report_missing(image);
                Self::new(image)
            }
        }
    }

    pub fn set_clip(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.clip = Rect::new(x, y, width, height);
    }
}

impl Component for Sprite {
    fn kind(&self) -> ComponentKind {
        ComponentKind::Sprite
    }

    fn on_attach(&mut self, entity: &mut Entity) {
        entity.fit_to_clip(self.clip);
    }

    fn on_draw(&self, entity: &Entity, ctx: &mut DrawContext<'_>) {
        let Some(record) = ctx.assets.get(&self.image) else {
            ctx.assets.report_missing(&self.image);
            ctx.renderer
                .draw_circle_lines(entity.world_position(), 1.0, Color::RED);
            return;
        };
        ctx.renderer.draw_sprite(&SpriteDraw {
            texture: record.handle,
            source: self.clip,
            size: Vec2::new(self.clip.width, self.clip.height),
            transform: entity.world_matrix(),
            flip_x: self.flip_x,
            flip_y: self.flip_y,
            tint: self.tint,
        });
    }
}
