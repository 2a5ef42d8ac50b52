//! Box and circle colliders in entity-local space.
//!
//! World shapes are the entity's additive world offset plus the local shape;
//! rotation and scale of the owner are not applied.

use glam::Vec2;
use kite_core::math::{Color, Rect};

use crate::collision::Shape;
use crate::component::{Component, ComponentKind, DrawContext};
use crate::entity::Entity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxCollider {
    pub rect: Rect,
}

impl BoxCollider {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            rect: Rect::new(x, y, width, height),
        }
    }

    pub fn world_rect(&self, entity: &Entity) -> Rect {
        let offset = entity.world_offset();
        Rect::new(
            offset.x + self.rect.x,
            offset.y + self.rect.y,
            self.rect.width,
            self.rect.height,
        )
    }
}

impl Component for BoxCollider {
    fn kind(&self) -> ComponentKind {
        ComponentKind::BoxCollider
    }

    fn on_attach(&mut self, entity: &mut Entity) {
        entity.collidable = true;
    }

    fn on_debug_draw(&self, entity: &Entity, ctx: &mut DrawContext<'_>) {
        ctx.renderer
            .draw_rect_lines(self.world_rect(entity), Color::LIME);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCollider {
    pub center: Vec2,
    pub radius: f32,
}

impl CircleCollider {
    pub fn new(x: f32, y: f32, radius: f32) -> Self {
        Self {
            center: Vec2::new(x, y),
            radius,
        }
    }

    pub fn world_center(&self, entity: &Entity) -> Vec2 {
        entity.world_offset() + self.center
    }
}

impl Component for CircleCollider {
    fn kind(&self) -> ComponentKind {
        ComponentKind::CircleCollider
    }

    fn on_attach(&mut self, entity: &mut Entity) {
        entity.collidable = true;
    }

    fn on_debug_draw(&self, entity: &Entity, ctx: &mut DrawContext<'_>) {
        ctx.renderer
            .draw_circle_lines(self.world_center(entity), self.radius, Color::RED);
    }
}

impl Entity {
    /// World-space collision shape; a box wins when both are attached.
    pub fn collider_shape(&self) -> Option<Shape> {
        if let Some(b) = self.component::<BoxCollider>() {
            return Some(Shape::Rect(b.world_rect(self)));
        }
        self.component::<CircleCollider>().map(|c| Shape::Circle {
            center: c.world_center(self),
            radius: c.radius,
        })
    }
}
