//! Per-entity component slots.
//!
//! Every component type owns one fixed slot in [`ComponentSet`], so lookups
//! are a field access and an entity can hold at most one instance per type.
//! `order` records attachment order and drives the update and draw hooks.

use kite_core::math::Rect;
use kite_render::Renderer;

use crate::animator::Animator;
use crate::assets::AssetCache;
use crate::collider::{BoxCollider, CircleCollider};
use crate::entity::Entity;
use crate::sprite::Sprite;
use crate::tile_layer::TileLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Sprite,
    TileLayer,
    Animator,
    BoxCollider,
    CircleCollider,
}

impl ComponentKind {
    pub const COUNT: usize = 5;

    pub fn name(self) -> &'static str {
        match self {
            Self::Sprite => "sprite",
            Self::TileLayer => "tile_layer",
            Self::Animator => "animator",
            Self::BoxCollider => "box_collider",
            Self::CircleCollider => "circle_collider",
        }
    }
}

/// What draw hooks get to work with.
pub struct DrawContext<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub assets: &'a AssetCache,
    /// World-space camera view, for components that cull internally.
    pub view: Rect,
}

pub trait Component {
    fn kind(&self) -> ComponentKind;

    fn on_attach(&mut self, _entity: &mut Entity) {}

    fn on_update(&mut self, _entity: &mut Entity, _dt: f32) {}

    fn on_draw(&self, _entity: &Entity, _ctx: &mut DrawContext<'_>) {}

    fn on_debug_draw(&self, _entity: &Entity, _ctx: &mut DrawContext<'_>) {}

    fn on_detach(&mut self, _entity: &mut Entity) {}
}

/// Binds a concrete component type to its slot.
pub trait ComponentType: Component + Sized {
    const KIND: ComponentKind;

    fn slot(set: &ComponentSet) -> &Option<Self>;

    fn slot_mut(set: &mut ComponentSet) -> &mut Option<Self>;
}

#[derive(Default)]
pub struct ComponentSet {
    pub(crate) sprite: Option<Sprite>,
    pub(crate) tile_layer: Option<TileLayer>,
    pub(crate) animator: Option<Animator>,
    pub(crate) box_collider: Option<BoxCollider>,
    pub(crate) circle_collider: Option<CircleCollider>,
    pub(crate) order: Vec<ComponentKind>,
}

impl ComponentSet {
    pub fn kinds(&self) -> &[ComponentKind] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, kind: ComponentKind) -> Option<&dyn Component> {
        match kind {
            ComponentKind::Sprite => self.sprite.as_ref().map(|c| c as &dyn Component),
            ComponentKind::TileLayer => self.tile_layer.as_ref().map(|c| c as &dyn Component),
            ComponentKind::Animator => self.animator.as_ref().map(|c| c as &dyn Component),
            ComponentKind::BoxCollider => self.box_collider.as_ref().map(|c| c as &dyn Component),
            ComponentKind::CircleCollider => {
                self.circle_collider.as_ref().map(|c| c as &dyn Component)
            }
        }
    }

    pub fn get_mut(&mut self, kind: ComponentKind) -> Option<&mut dyn Component> {
        match kind {
            ComponentKind::Sprite => self.sprite.as_mut().map(|c| c as &mut dyn Component),
            ComponentKind::TileLayer => {
                self.tile_layer.as_mut().map(|c| c as &mut dyn Component)
            }
            ComponentKind::Animator => self.animator.as_mut().map(|c| c as &mut dyn Component),
            ComponentKind::BoxCollider => {
                self.box_collider.as_mut().map(|c| c as &mut dyn Component)
            }
            ComponentKind::CircleCollider => {
                self.circle_collider.as_mut().map(|c| c as &mut dyn Component)
            }
        }
    }
}

macro_rules! component_slot {
    ($ty:ty, $kind:ident, $field:ident) => {
        impl ComponentType for $ty {
            const KIND: ComponentKind = ComponentKind::$kind;

            fn slot(set: &ComponentSet) -> &Option<Self> {
                &set.$field
            }

            fn slot_mut(set: &mut ComponentSet) -> &mut Option<Self> {
                &mut set.$field
            }
        }
    };
}

component_slot!(Sprite, Sprite, sprite);
component_slot!(TileLayer, TileLayer, tile_layer);
component_slot!(Animator, Animator, animator);
component_slot!(BoxCollider, BoxCollider, box_collider);
component_slot!(CircleCollider, CircleCollider, circle_collider);

impl Entity {
    /// Attach `component` unless one of the same type is already present, in
    /// which case the existing instance is returned untouched and no attach
    /// hook runs.
    pub fn add_component<T: ComponentType>(&mut self, component: T) -> &mut T {
        if T::slot(&self.components).is_some() {
            log::debug!(
                "Entity '{}' already has a {} component",
                self.name,
                T::KIND.name()
            );
            return T::slot_mut(&mut self.components).get_or_insert(component);
        }
        let mut component = component;
        component.on_attach(self);
        self.components.order.push(T::KIND);
        T::slot_mut(&mut self.components).insert(component)
    }

    pub fn has_component<T: ComponentType>(&self) -> bool {
        T::slot(&self.components).is_some()
    }

    pub fn component<T: ComponentType>(&self) -> Option<&T> {
        T::slot(&self.components).as_ref()
    }

    pub fn component_mut<T: ComponentType>(&mut self) -> Option<&mut T> {
        T::slot_mut(&mut self.components).as_mut()
    }

    /// Detach and return the component. Removing a missing type is a no-op.
    pub fn remove_component<T: ComponentType>(&mut self) -> Option<T> {
        let mut component = T::slot_mut(&mut self.components).take()?;
        self.components.order.retain(|k| *k != T::KIND);
        component.on_detach(self);
        Some(component)
    }

    pub fn components(&self) -> &ComponentSet {
        &self.components
    }

    pub(crate) fn update_components(&mut self, dt: f32) {
        let mut set = std::mem::take(&mut self.components);
        let order = set.order.clone();
        for kind in order {
            if let Some(component) = set.get_mut(kind) {
                component.on_update(self, dt);
            }
        }
        self.components = set;
    }

    pub(crate) fn draw_components(&self, ctx: &mut DrawContext<'_>) {
        for kind in &self.components.order {
            if let Some(component) = self.components.get(*kind) {
                component.on_draw(self, ctx);
            }
        }
    }

    pub(crate) fn debug_draw_components(&self, ctx: &mut DrawContext<'_>) {
        for kind in &self.components.order {
            if let Some(component) = self.components.get(*kind) {
                component.on_debug_draw(self, ctx);
            }
        }
    }

    pub(crate) fn detach_all_components(&mut self) {
        let mut set = std::mem::take(&mut self.components);
        for kind in set.order.clone() {
            if let Some(component) = set.get_mut(kind) {
                component.on_detach(self);
            }
        }
        set.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn adding_twice_returns_existing_without_reattaching() {
        let mut e = Entity::new("hero");
        e.add_component(Sprite::with_clip("hero", Rect::new(0.0, 0.0, 16.0, 8.0)));
        assert_eq!(e.transform.pivot, Vec2::new(8.0, 4.0));

        e.transform.pivot = Vec2::new(1.0, 1.0);
        let again = e.add_component(Sprite::with_clip("other", Rect::new(0.0, 0.0, 64.0, 64.0)));
        assert_eq!(again.image, "hero");
        assert_eq!(e.transform.pivot, Vec2::new(1.0, 1.0));
        assert_eq!(e.components().len(), 1);
    }

    #[test]
    fn remove_clears_slot_and_update_order() {
        let mut e = Entity::new("box");
        e.add_component(BoxCollider::new(0.0, 0.0, 4.0, 4.0));
        e.add_component(Sprite::new("crate"));
        assert_eq!(
            e.components().kinds(),
            &[ComponentKind::BoxCollider, ComponentKind::Sprite]
        );

        assert!(e.remove_component::<BoxCollider>().is_some());
        assert!(!e.has_component::<BoxCollider>());
        assert_eq!(e.components().kinds(), &[ComponentKind::Sprite]);
        assert!(e.remove_component::<BoxCollider>().is_none());
    }

    #[test]
    fn collider_attach_marks_entity_collidable() {
        let mut e = Entity::new("wall");
        e.collidable = false;
        e.add_component(CircleCollider::new(0.0, 0.0, 3.0));
        assert!(e.collidable);
    }

    #[test]
    fn update_hooks_run_for_attached_components() {
        let mut e = Entity::new("anim");
        e.add_component(Sprite::new("walk"));
        let animator = e.add_component(Animator::new());
        animator.add("walk", "walk", 1, 4, 4, 10.0);

        e.update_components(0.1);
        let frame = e.component::<Animator>().map(|a| a.current_frame());
        assert_eq!(frame, Some(1));
    }
}
