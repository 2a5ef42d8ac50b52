//! Scene nodes.
//!
//! An [`Entity`] is created free-standing and only joins a scene through
//! [`crate::scene::Scene::spawn`] or one of its variants. Its world matrix and
//! bound are derived data refreshed top-down by the scene each frame; they are
//! never cached behind dirty flags.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;
use kite_core::math::{BoundsAccumulator, Matrix2D, Rect, DEG2RAD};
use kite_core::transform::{compose_world, Transform};
use serde::{Deserialize, Serialize};

use crate::component::ComponentSet;
use crate::script::ScriptInstance;
use crate::sprite::Sprite;

slotmap::new_key_type! {
    pub struct EntityId;
}

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Bit flags selecting what the debug overlay draws for an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebugMask(pub u32);

impl DebugMask {
    pub const ORIGIN: u32 = 1;
    pub const BOX: u32 = 1 << 1;
    pub const BOUND: u32 = 1 << 2;
    pub const PIVOT: u32 = 1 << 3;
    pub const TRANSFORM: u32 = 1 << 4;
    pub const COMPONENTS: u32 = 1 << 5;
    pub const ALL: u32 = 0x3f;

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// What a child needs from its parent to derive its own world state.
#[derive(Debug, Clone, Copy)]
pub struct ParentFrame {
    pub world: Matrix2D,
    pub rotation: f32,
    pub offset: Vec2,
    pub origin: Vec2,
}

pub struct Entity {
    pub serial: u64,
    pub name: String,
    pub alive: bool,
    pub visible: bool,
    pub active: bool,
    /// Static geometry: skipped by the update pass but still spatial.
    pub solid: bool,
    /// Survives `clear_scene`.
    pub persistent: bool,
    pub collidable: bool,
    pub pickable: bool,
    /// Generated at runtime; not written out by scene saves.
    pub prefab: bool,
    pub layer: usize,
    pub width: f32,
    pub height: f32,
    pub origin: Vec2,
    pub transform: Transform,
    pub debug_mask: DebugMask,

    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) components: ComponentSet,
    pub(crate) script: Option<ScriptInstance>,

    local_matrix: Matrix2D,
    world_matrix: Matrix2D,
    world_position: Vec2,
    world_rotation: f32,
    world_offset: Vec2,
    world_origin: Vec2,
    bound: Rect,
    radius: f32,
    accumulator: BoundsAccumulator,
}

impl Entity {
    pub fn new(name: &str) -> Self {
        let mut entity = Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            alive: true,
            visible: true,
            active: true,
            solid: false,
            persistent: false,
            collidable: true,
            pickable: false,
            prefab: false,
            layer: 0,
            width: 1.0,
            height: 1.0,
            origin: Vec2::ZERO,
            transform: Transform::default(),
            debug_mask: DebugMask::default(),
            parent: None,
            children: Vec::new(),
            components: ComponentSet::default(),
            script: None,
            local_matrix: Matrix2D::IDENTITY,
            world_matrix: Matrix2D::IDENTITY,
            world_position: Vec2::ZERO,
            world_rotation: 0.0,
            world_offset: Vec2::ZERO,
            world_origin: Vec2::ZERO,
            bound: Rect::default(),
            radius: 0.5,
            accumulator: BoundsAccumulator::new(),
        };
        entity.refresh_world(None);
        entity
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.transform.position = Vec2::new(x, y);
        self
    }

    pub fn on_layer(mut self, layer: usize) -> Self {
        self.layer = layer;
        self
    }

    pub fn sized(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn local_matrix(&self) -> Matrix2D {
        self.local_matrix
    }

    pub fn world_matrix(&self) -> Matrix2D {
        self.world_matrix
    }

    pub fn world_position(&self) -> Vec2 {
        self.world_position
    }

    /// Parent rotation minus local rotation; the local rotation for roots.
    pub fn world_angle(&self) -> f32 {
        self.world_rotation
    }

    /// Position accumulated additively along the parent chain. Colliders and
    /// place queries are expressed against this point.
    pub fn world_offset(&self) -> Vec2 {
        self.world_offset
    }

    pub fn world_origin(&self) -> Vec2 {
        self.world_origin
    }

    pub fn bound(&self) -> Rect {
        self.bound
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn world_point(&self, local: Vec2) -> Vec2 {
        self.world_matrix.transform_point(local)
    }

    pub fn local_point(&self, p: Vec2) -> Vec2 {
        self.local_matrix.transform_point(p)
    }

    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }

    pub fn script(&self) -> Option<&ScriptInstance> {
        self.script.as_ref()
    }

    pub fn frame(&self) -> ParentFrame {
        ParentFrame {
            world: self.world_matrix,
            rotation: self.transform.rotation,
            offset: self.world_offset,
            origin: self.world_origin,
        }
    }

    /// Recompute local/world matrices, bound and radius of this entity only.
    pub fn refresh_world(&mut self, parent: Option<&ParentFrame>) {
        self.local_matrix = self.transform.local_matrix();
        self.world_matrix = compose_world(&self.local_matrix, parent.map(|p| &p.world));
        self.world_position = self.world_matrix.translation();

        let position = self.transform.position;
        match parent {
            Some(p) => {
                self.world_rotation = p.rotation - self.transform.rotation;
                self.world_offset = p.offset + position;
                self.world_origin = p.origin + self.origin;
            }
            None => {
                self.world_rotation = self.transform.rotation;
                self.world_offset = position;
                self.world_origin = self.origin;
            }
        }

        let w = self.width * self.transform.scale.x;
        let h = self.height * self.transform.scale.y;
        self.radius = w.min(h) / 2.0;

        let corners = [
            Vec2::ZERO,
            Vec2::new(w, 0.0),
            Vec2::new(w, h),
            Vec2::new(0.0, h),
        ];
        self.accumulator.reset();
        if self.world_rotation != 0.0 {
            let (sin, cos) = (-self.world_rotation * DEG2RAD).sin_cos();
            for c in corners {
                self.accumulator.encapsulate(Vec2::new(
                    c.x * cos - c.y * sin + self.world_position.x,
                    c.x * sin + c.y * cos + self.world_position.y,
                ));
            }
        } else {
            for c in corners {
                self.accumulator.encapsulate(c + self.world_position);
            }
        }
        self.bound = self.accumulator.rect();
    }

    /// Pivot at the middle of the sprite clip, or of the nominal size.
    pub fn center_pivot(&mut self) {
        let extent = match self.component::<Sprite>() {
            Some(sprite) => Vec2::new(sprite.clip.width, sprite.clip.height),
            None => Vec2::new(self.width, self.height),
        };
        self.transform.pivot = extent / 2.0;
    }

    /// Origin at the middle of the footprint. With a sprite attached the
    /// footprint is first resized to its clip.
    pub fn center_origin(&mut self) {
        if let Some(clip) = self.component::<Sprite>().map(|s| s.clip) {
            self.width = clip.width;
            self.height = clip.height;
        }
        self.origin = Vec2::new(self.width / 2.0, self.height / 2.0);
    }

    /// Size, origin and pivot taken from a clip rectangle.
    pub(crate) fn fit_to_clip(&mut self, clip: Rect) {
        self.width = clip.width;
        self.height = clip.height;
        self.origin = Vec2::new(clip.width / 2.0, clip.height / 2.0);
        self.transform.pivot = self.origin;
    }

    /// Axis-aligned footprint used by place queries if the entity stood at
    /// `(x, y)` instead of its current position.
    pub(crate) fn offset_rect(&self, x: f32, y: f32) -> Rect {
        let parent_offset = self.world_offset - self.transform.position;
        let parent_origin = self.world_origin - self.origin;
        Rect::new(
            parent_offset.x + x - parent_origin.x - self.origin.x,
            parent_offset.y + y - parent_origin.y - self.origin.y,
            self.width,
            self.height,
        )
    }

    pub(crate) fn footprint(&self) -> Rect {
        Rect::new(
            self.world_offset.x - self.world_origin.x,
            self.world_offset.y - self.world_origin.y,
            self.width,
            self.height,
        )
    }
}
