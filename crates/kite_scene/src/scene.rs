//! Scene orchestration.
//!
//! A [`Scene`] owns every entity in a slot map and drives the frame:
//!
//! ```text
//!   update(dt)
//!     1. update pass     live roots, active only; children cascade from parents
//!     2. messages        deliver what scripts posted through engine.post
//!     3. drain removals  dead roots and dead children leave layers/index, on_remove, destroy
//!     4. drain additions queued entities get a world refresh and join live/layers
//!     5. reindex         world refresh of non-solid trees, quadtree follows bounds
//!     6. live reload     every `live_reload_interval_secs`, newer script files swap in
//!     7. collisions      when enabled, see `collision::find_overlaps`
//!     8. gc              Lua collection once enough entities were removed
//!   render(renderer)
//!     layers ascending, then debug overlay, then the pause branch
//! ```
//!
//! Structural changes requested while iterating (an entity dying, a deferred
//! spawn) only touch the pending queues; the live list and layer buckets are
//! mutated in the drain steps.

use glam::Vec2;
use kite_core::math::{Color, Rect};
use kite_core::quadtree::{Quadtree, QuadtreeConfig};
use kite_core::time::FrameClock;
use kite_render::{Camera2D, Renderer};
use mlua::prelude::LuaValue;
use slotmap::{SecondaryMap, SlotMap};
use std::path::Path;

use crate::assets::AssetCache;
use crate::collision::{find_overlaps, Collidable, CollisionEvent};
use crate::component::DrawContext;
use crate::config::{SceneConfig, MAX_LAYERS};
use crate::entity::{DebugMask, Entity, EntityId, ParentFrame};
use crate::error::SceneError;
use crate::script::{Callback, OutgoingMessage, ScriptHost};
use crate::tile_layer::TileLayer;

pub struct Scene {
    pub name: String,
    pub(crate) config: SceneConfig,
    pub(crate) entities: SlotMap<EntityId, Entity>,
    /// Root entities in insertion order.
    pub(crate) live: Vec<EntityId>,
    pub(crate) layers: Vec<Vec<EntityId>>,
    pub(crate) pending_add: Vec<EntityId>,
    pub(crate) pending_remove: Vec<EntityId>,
    dead_children: Vec<EntityId>,
    index: Quadtree<EntityId>,
    indexed: SecondaryMap<EntityId, Rect>,
    pub(crate) camera: Camera2D,
    pub(crate) clock: FrameClock,
    pub(crate) assets: AssetCache,
    scripts: ScriptHost,
    outbox: Vec<(EntityId, OutgoingMessage)>,
    collision_events: Vec<CollisionEvent>,
    removed_since_gc: usize,
    reload_timer: f64,
    rendered: usize,
    selected: Option<EntityId>,
}

impl Scene {
    pub fn new(config: SceneConfig) -> Result<Self, SceneError> {
        let index = Quadtree::new(
            Rect::new(0.0, 0.0, config.world_width, config.world_height),
            QuadtreeConfig {
                capacity: config.quadtree_capacity,
                max_depth: config.quadtree_max_depth,
            },
        );
        let scene = Self {
            name: "untitled".to_string(),
            layers: vec![Vec::new(); config.initial_layers.min(MAX_LAYERS)],
            camera: Camera2D::new(config.window_width, config.window_height),
            clock: FrameClock::new(config.max_frame_dt),
            scripts: ScriptHost::new()?,
            entities: SlotMap::with_key(),
            live: Vec::new(),
            pending_add: Vec::new(),
            pending_remove: Vec::new(),
            dead_children: Vec::new(),
            index,
            indexed: SecondaryMap::new(),
            assets: AssetCache::new(),
            outbox: Vec::new(),
            collision_events: Vec::new(),
            removed_since_gc: 0,
            reload_timer: 0.0,
            rendered: 0,
            selected: None,
            config,
        };
        log::info!(
            "Scene created: world {}x{}, {} layers",
            scene.config.world_width,
            scene.config.world_height,
            scene.layers.len()
        );
        Ok(scene)
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetCache {
        &mut self.assets
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn scripts(&self) -> &ScriptHost {
        &self.scripts
    }

    // ---- entity management -------------------------------------------------

    /// Grow the buckets to hold `layer`, clamped below [`MAX_LAYERS`].
    /// Returns the index actually usable.
    fn ensure_layer(&mut self, layer: usize) -> usize {
        let layer = if layer >= MAX_LAYERS {
            log::warn!("Layer {layer} exceeds the limit of {MAX_LAYERS}, clamping");
            MAX_LAYERS - 1
        } else {
            layer
        };
        while self.layers.len() <= layer {
            self.layers.push(Vec::new());
        }
        layer
    }

    /// Add a root entity immediately: world refresh, live list, layer, index.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        let layer = entity.layer;
        let id = self.entities.insert(entity);
        self.register(id, layer);
        id
    }

    /// Queue a root entity; it joins the scene in the next drain.
    pub fn spawn_deferred(&mut self, entity: Entity) -> EntityId {
        let id = self.entities.insert(entity);
        self.pending_add.push(id);
        id
    }

    fn register(&mut self, id: EntityId, layer: usize) {
        self.refresh_tree(id, None);
        let layer = self.ensure_layer(layer);
        if let Some(entity) = self.entities.get_mut(id) {
            entity.layer = layer;
        }
        self.layers[layer].push(id);
        self.live.push(id);
        for node in self.subtree(id) {
            self.index_entity(node);
        }
    }

    /// Attach `child` under `parent`. Children are driven by their parent's
    /// update and render and never sit in the live list or a layer.
    pub fn add_child(&mut self, parent: EntityId, mut child: Entity) -> Option<EntityId> {
        let Some(frame) = self.entities.get(parent).map(Entity::frame) else {
            log::warn!("add_child: parent {parent:?} does not exist");
            return None;
        };
        child.parent = Some(parent);
        let id = self.entities.insert(child);
        if let Some(p) = self.entities.get_mut(parent) {
            p.children.push(id);
        }
        self.refresh_tree(id, Some(frame));
        Some(id)
    }

    pub fn attach_script(&mut self, id: EntityId, path: &Path) -> Result<(), SceneError> {
        let instance = self.scripts.attach(path)?;
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.script = Some(instance);
                Ok(())
            }
            None => Err(SceneError::Validation(format!(
                "cannot attach {} to missing entity",
                path.display()
            ))),
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Mark an entity dead; it is removed in the next drain.
    pub fn remove(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.alive = false;
        }
    }

    pub fn is_live(&self, id: EntityId) -> bool {
        self.live.contains(&id)
    }

    pub fn live(&self) -> &[EntityId] {
        &self.live
    }

    pub fn pending_additions(&self) -> &[EntityId] {
        &self.pending_add
    }

    pub fn pending_removals(&self) -> &[EntityId] {
        &self.pending_remove
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// `id` followed by its descendants, depth first.
    fn subtree(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        self.collect_subtree(id, &mut out);
        out
    }

    fn collect_subtree(&self, id: EntityId, out: &mut Vec<EntityId>) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        out.push(id);
        for child in &entity.children {
            self.collect_subtree(*child, out);
        }
    }

    /// Every entity in the scene, live roots first-to-last with their
    /// descendants inline.
    pub fn scene_order(&self) -> Vec<EntityId> {
        let mut out = Vec::with_capacity(self.entities.len());
        for id in &self.live {
            self.collect_subtree(*id, &mut out);
        }
        out
    }

    fn refresh_tree(&mut self, id: EntityId, parent: Option<ParentFrame>) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        entity.refresh_world(parent.as_ref());
        let frame = entity.frame();
        let children = entity.children.clone();
        for child in children {
            self.refresh_tree(child, Some(frame));
        }
    }

    /// Recompute world transforms and bounds of `id` and its descendants now.
    pub fn refresh_world(&mut self, id: EntityId) {
        let parent = self
            .entities
            .get(id)
            .and_then(|e| e.parent)
            .and_then(|p| self.entities.get(p))
            .map(Entity::frame);
        self.refresh_tree(id, parent);
    }

    fn index_entity(&mut self, id: EntityId) {
        let Some(bound) = self.entities.get(id).map(Entity::bound) else {
            return;
        };
        if let Some(old) = self.indexed.get(id).copied() {
            if old == bound {
                return;
            }
            self.index.remove(id, &old);
        }
        self.index.insert(id, bound);
        self.indexed.insert(id, bound);
    }

    fn unindex(&mut self, id: EntityId) {
        if let Some(old) = self.indexed.remove(id) {
            self.index.remove(id, &old);
        }
    }

    /// Tear down `id` and its descendants without notifying scripts.
    fn destroy_tree(&mut self, id: EntityId) {
        let Some(mut entity) = self.entities.remove(id) else {
            return;
        };
        for child in std::mem::take(&mut entity.children) {
            self.destroy_tree(child);
        }
        entity.detach_all_components();
        self.unindex(id);
        if self.selected == Some(id) {
            self.selected = None;
        }
    }

    fn notify_removed(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.call_script(Callback::Remove, ());
        }
        self.collect_outbox(id);
    }

    // ---- frame -------------------------------------------------------------

    pub fn pause(&mut self) {
        self.clock.pause();
        log::info!("Scene paused");
    }

    pub fn resume(&mut self) {
        self.clock.resume();
        self.selected = None;
        log::info!("Scene resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Run one frame of simulation with a raw delta in seconds.
    pub fn update(&mut self, raw_dt: f32) {
        self.clock.advance(raw_dt);
        let dt = self.clock.dt;
        self.collision_events.clear();

        if !self.clock.is_paused() {
            for id in self.live.clone() {
                let (alive, active) = match self.entities.get(id) {
                    Some(e) => (e.alive, e.active),
                    None => continue,
                };
                if alive && active {
                    self.update_tree(id, None, dt);
                }
                if !self.entities.get(id).is_some_and(|e| e.alive) {
                    self.removed_since_gc += 1;
                    self.pending_remove.push(id);
                }
            }
        }

        self.deliver_messages();
        self.drain_removals();
        self.drain_additions();
        self.reindex();
        self.live_reload(self.clock.real_dt as f64);

        if self.config.collisions_enabled {
            self.collision_pass();
        }

        if self.removed_since_gc > self.config.gc_removed_threshold {
            log::debug!(
                "Collecting script garbage after {} removals",
                self.removed_since_gc
            );
            self.scripts.collect_garbage();
            self.removed_since_gc = 0;
        }
    }

    fn update_tree(&mut self, id: EntityId, parent: Option<ParentFrame>, dt: f32) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        if entity.has_script() && !entity.script_ready() {
            entity.ready_script();
        }
        if entity.solid {
            self.collect_outbox(id);
            return;
        }

        entity.refresh_world(parent.as_ref());
        entity.call_script(Callback::Update, dt);
        entity.update_components(dt);
        entity.sync_animation(&self.assets);
        let frame = entity.frame();
        let children = entity.children.clone();
        self.collect_outbox(id);

        for child in children {
            let (alive, active) = match self.entities.get(child) {
                Some(c) => (c.alive, c.active),
                None => continue,
            };
            if alive && active {
                self.update_tree(child, Some(frame), dt);
            }
            if !self.entities.get(child).is_some_and(|c| c.alive) {
                self.dead_children.push(child);
            }
        }
    }

    fn drain_removals(&mut self) {
        self.collect_dead_descendants();
        for id in std::mem::take(&mut self.pending_remove) {
            if !self.entities.contains_key(id) {
                continue;
            }
            for bucket in &mut self.layers {
                bucket.retain(|e| *e != id);
            }
            self.live.retain(|e| *e != id);
            self.notify_removed(id);
            self.destroy_tree(id);
        }

        for id in std::mem::take(&mut self.dead_children) {
            let Some(parent) = self.entities.get(id).and_then(|e| e.parent) else {
                continue;
            };
            if let Some(p) = self.entities.get_mut(parent) {
                p.children.retain(|c| *c != id);
            }
            self.notify_removed(id);
            self.destroy_tree(id);
            self.removed_since_gc += 1;
        }
    }

    /// Queue dead children the update pass never reached, those under an
    /// inactive or dead parent.
    fn collect_dead_descendants(&mut self) {
        for id in self.scene_order() {
            let dead_child = self
                .entities
                .get(id)
                .is_some_and(|e| !e.alive && e.parent.is_some());
            if dead_child && !self.dead_children.contains(&id) {
                self.dead_children.push(id);
            }
        }
    }

    fn drain_additions(&mut self) {
        for id in std::mem::take(&mut self.pending_add) {
            let Some(layer) = self.entities.get(id).map(|e| e.layer) else {
                continue;
            };
            self.register(id, layer);
        }
    }

    fn reindex(&mut self) {
        for id in self.live.clone() {
            if self.entities.get(id).is_some_and(|e| !e.solid) {
                self.refresh_tree(id, None);
            }
        }
        for id in self.scene_order() {
            self.index_entity(id);
        }
    }

    fn live_reload(&mut self, real_dt: f64) {
        if !self.config.live_reload_enabled {
            return;
        }
        self.reload_timer += real_dt;
        if self.reload_timer < self.config.live_reload_interval_secs {
            return;
        }
        self.reload_timer = 0.0;
        for id in self.scene_order() {
            if let Some(entity) = self.entities.get_mut(id) {
                if let Some(script) = entity.script.as_mut() {
                    script.reload_if_changed(&mut self.scripts);
                }
            }
        }
    }

    /// Force every attached script to recompile from disk.
    pub fn reload_scripts(&mut self) -> usize {
        let mut reloaded = 0;
        for id in self.scene_order() {
            if let Some(script) = self.entities.get_mut(id).and_then(|e| e.script.as_mut()) {
                if script.force_reload(&mut self.scripts) {
                    reloaded += 1;
                }
            }
        }
        reloaded
    }

    pub fn set_collisions_enabled(&mut self, enabled: bool) {
        self.config.collisions_enabled = enabled;
        log::info!(
            "Collisions {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn set_live_reload(&mut self, enabled: bool) {
        self.config.live_reload_enabled = enabled;
        log::info!(
            "Live reload {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn set_debug_overlay(&mut self, enabled: bool) {
        self.config.debug_overlay = enabled;
    }

    pub fn set_editor_mode(&mut self, enabled: bool) {
        self.config.editor_mode = enabled;
    }

    // ---- collisions --------------------------------------------------------

    fn collision_pass(&mut self) {
        let candidates: Vec<Collidable> = self
            .scene_order()
            .into_iter()
            .filter_map(|id| {
                let e = self.entities.get(id)?;
                if !e.alive || !e.collidable {
                    return None;
                }
                Some(Collidable {
                    id,
                    parent: e.parent,
                    shape: e.collider_shape()?,
                })
            })
            .collect();

        for (a, b) in find_overlaps(&candidates, self.config.collision_policy) {
            self.notify_collision(a, b);
            self.notify_collision(b, a);
        }
    }

    /// What `on_collision` receives for `other`: its script table, or its
    /// name when it has no script.
    fn collision_argument(&self, other: EntityId) -> LuaValue {
        match self.entities.get(other) {
            Some(e) => match e.script_handle() {
                Some(table) => LuaValue::Table(table),
                None => self.scripts.string_value(&e.name),
            },
            None => LuaValue::Nil,
        }
    }

    fn notify_collision(&mut self, id: EntityId, other: EntityId) {
        let argument = self.collision_argument(other);
        self.collision_events.push(CollisionEvent { entity: id, other });
        if let Some(entity) = self.entities.get_mut(id) {
            entity.call_script(Callback::Collision, argument);
        }
        self.collect_outbox(id);
    }

    /// Notifications raised this frame, two per colliding pair.
    pub fn collision_events(&self) -> &[CollisionEvent] {
        &self.collision_events
    }

    // ---- messaging ---------------------------------------------------------

    fn collect_outbox(&mut self, sender: EntityId) {
        for message in self.scripts.drain_outbox() {
            self.outbox.push((sender, message));
        }
    }

    fn deliver_messages(&mut self) {
        for (sender, message) in std::mem::take(&mut self.outbox) {
            match &message.target {
                Some(name) => {
                    self.deliver(|_, e| e.name == *name, message.payload.clone());
                }
                None => {
                    self.deliver(|id, _| id != sender, message.payload.clone());
                }
            }
        }
    }

    fn deliver<F>(&mut self, accept: F, payload: LuaValue) -> usize
    where
        F: Fn(EntityId, &Entity) -> bool,
    {
        let mut delivered = 0;
        for id in self.scene_order() {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            if !entity.alive || !entity.has_script() || !accept(id, &*entity) {
                continue;
            }
            if entity.call_script(Callback::Message, payload.clone()) {
                delivered += 1;
            }
            self.collect_outbox(id);
        }
        delivered
    }

    /// Call `on_message` on every live scripted entity named `name`.
    pub fn send_message_to(&mut self, name: &str, payload: &str) -> usize {
        let payload = self.scripts.string_value(payload);
        self.deliver(|_, e| e.name == name, payload)
    }

    /// Call `on_message` on every live scripted entity except `from`.
    pub fn send_message_all(&mut self, from: Option<EntityId>, payload: &str) -> usize {
        let payload = self.scripts.string_value(payload);
        self.deliver(|id, _| Some(id) != from, payload)
    }

    // ---- queries -----------------------------------------------------------

    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        let found = self
            .scene_order()
            .into_iter()
            .find(|id| self.entities.get(*id).is_some_and(|e| e.alive && e.name == name));
        if found.is_none() {
            log::warn!("Entity '{name}' not found");
        }
        found
    }

    fn pick<F: Fn(&Rect) -> bool>(&self, hit: F) -> Option<EntityId> {
        self.scene_order().into_iter().find(|id| {
            self.entities
                .get(*id)
                .is_some_and(|e| e.alive && e.pickable && hit(&e.bound()))
        })
    }

    /// First pickable entity whose bound contains `point`.
    pub fn pick_point(&self, point: Vec2) -> Option<EntityId> {
        self.pick(|b| b.contains_point(point))
    }

    pub fn pick_rect(&self, rect: Rect) -> Option<EntityId> {
        self.pick(|b| b.intersects(&rect))
    }

    pub fn pick_circle(&self, center: Vec2, radius: f32) -> Option<EntityId> {
        self.pick(|b| b.intersects_circle(center, radius))
    }

    /// Test `id` standing at `(x, y)` against `other`; both are notified on
    /// overlap.
    fn collide_with(&mut self, id: EntityId, other: EntityId, x: f32, y: f32) -> bool {
        if id == other {
            return false;
        }
        let (Some(a), Some(b)) = (self.entities.get(id), self.entities.get(other)) else {
            return false;
        };
        if !a.offset_rect(x, y).intersects(&b.footprint()) {
            return false;
        }
        self.notify_collision(id, other);
        self.notify_collision(other, id);
        true
    }

    fn is_collidable(&self, id: EntityId) -> bool {
        self.entities.get(id).is_some_and(|e| e.collidable)
    }

    /// True when `id` could stand at `(x, y)` without touching any other
    /// collidable entity.
    pub fn place_free(&mut self, id: EntityId, x: f32, y: f32) -> bool {
        if !self.is_collidable(id) {
            return true;
        }
        for other in self.scene_order() {
            if self.entities.get(other).is_some_and(|e| e.alive && e.collidable)
                && self.collide_with(id, other, x, y)
            {
                return false;
            }
        }
        true
    }

    pub fn place_meeting(&mut self, id: EntityId, x: f32, y: f32, name: &str) -> bool {
        if !self.is_collidable(id) {
            return false;
        }
        let view = self.view_rect();
        for other in self.scene_order() {
            let Some(e) = self.entities.get(other) else {
                continue;
            };
            if !e.alive || (!e.collidable && !self.in_view(&e.bound(), &view)) {
                continue;
            }
            if e.name == name && self.collide_with(id, other, x, y) {
                return true;
            }
        }
        false
    }

    pub fn place_meeting_layer(&mut self, id: EntityId, x: f32, y: f32, layer: usize) -> bool {
        if !self.is_collidable(id) {
            return false;
        }
        let Some(bucket) = self.layers.get(layer).cloned() else {
            return false;
        };
        for other in bucket {
            if self.entities.get(other).is_some_and(|e| e.alive && e.collidable)
                && self.collide_with(id, other, x, y)
            {
                return true;
            }
        }
        false
    }

    pub fn query_point(&self, point: Vec2) -> Vec<EntityId> {
        self.index.query_point(point)
    }

    pub fn query_rect(&self, rect: &Rect) -> Vec<EntityId> {
        self.index.query_rect(rect)
    }

    pub fn query_circle(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        self.index.query_circle(center, radius)
    }

    pub fn index(&self) -> &Quadtree<EntityId> {
        &self.index
    }

    // ---- camera ------------------------------------------------------------

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    /// Center the camera on a world point.
    pub fn set_camera(&mut self, x: f32, y: f32) {
        self.camera.look_at(x, y);
    }

    /// Put the top-left corner of the view on a world point.
    pub fn set_camera_position(&mut self, x: f32, y: f32) {
        self.camera.place_top_left(x, y);
    }

    pub fn view_rect(&self) -> Rect {
        self.camera.view_rect()
    }

    fn in_view(&self, bound: &Rect, view: &Rect) -> bool {
        !self.config.view_culling || bound.intersects(view)
    }

    // ---- tiles -------------------------------------------------------------

    /// Spawn a static solid for every blocking tile of the layer on `id`.
    pub fn build_tile_solids(&mut self, id: EntityId) -> usize {
        let Some(entity) = self.entities.get(id) else {
            return 0;
        };
        let Some(tiles) = entity.component::<TileLayer>() else {
            log::warn!("Entity '{}' has no tile layer", entity.name);
            return 0;
        };
        let base = entity.world_position();
        let (tw, th) = (tiles.tile_width as f32, tiles.tile_height as f32);
        let cells = tiles.solid_cells();

        for (x, y) in &cells {
            let mut solid = Entity::new("solid")
                .on_layer(2)
                .at(base.x + *x as f32 * tw, base.y + *y as f32 * th)
                .sized(tw, th);
            solid.solid = true;
            solid.prefab = true;
            solid.origin = Vec2::ZERO;
            solid.transform.pivot = Vec2::ZERO;
            self.spawn(solid);
        }
        log::debug!("Built {} tile solids", cells.len());
        cells.len()
    }

    // ---- statistics --------------------------------------------------------

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_counts(&self) -> Vec<usize> {
        self.layers.iter().map(Vec::len).collect()
    }

    pub fn layer(&self, layer: usize) -> &[EntityId] {
        self.layers.get(layer).map_or(&[], Vec::as_slice)
    }

    /// Root entities drawn by the last `render`.
    pub fn rendered_count(&self) -> usize {
        self.rendered
    }

    pub fn removed_since_gc(&self) -> usize {
        self.removed_since_gc
    }

    // ---- clearing ----------------------------------------------------------

    /// Drop everything that is not persistent. Queued additions are
    /// discarded outright; live entities are scheduled for the next drain.
    pub fn clear_scene(&mut self) {
        let entities = &self.entities;
        for bucket in &mut self.layers {
            bucket.retain(|id| entities.get(*id).is_some_and(|e| e.persistent));
        }

        for id in std::mem::take(&mut self.pending_add) {
            self.notify_removed(id);
            self.destroy_tree(id);
        }

        let mut scheduled = 0;
        for id in self.live.clone() {
            if self.entities.get(id).is_some_and(|e| !e.persistent) {
                self.pending_remove.push(id);
                self.removed_since_gc += 1;
                scheduled += 1;
            }
        }
        self.scripts.collect_garbage();
        log::info!("Scene cleared: {scheduled} entities scheduled for removal");
    }

    /// Release every entity, persistent ones included. Used at shutdown.
    pub fn clear_and_free(&mut self) {
        log::info!("Clearing and freeing scene '{}'", self.name);
        for bucket in &mut self.layers {
            bucket.clear();
        }
        for id in std::mem::take(&mut self.live) {
            self.notify_removed(id);
            self.destroy_tree(id);
        }
        for id in std::mem::take(&mut self.pending_remove) {
            self.destroy_tree(id);
        }
        for id in std::mem::take(&mut self.pending_add) {
            self.destroy_tree(id);
        }
        self.dead_children.clear();
        self.outbox.clear();
        self.entities.clear();
        self.indexed.clear();
        self.index.clear();
        self.selected = None;
    }

    // ---- rendering ---------------------------------------------------------

    pub fn render(&mut self, renderer: &mut dyn Renderer) {
        let view = self.view_rect();
        self.rendered = 0;

        for layer in 0..self.layers.len() {
            for id in self.layers[layer].clone() {
                let visible = self
                    .entities
                    .get(id)
                    .is_some_and(|e| e.alive && e.visible && self.in_view(&e.bound(), &view));
                if !visible {
                    continue;
                }
                Self::render_tree(
                    &mut self.entities,
                    &self.assets,
                    &self.scripts,
                    &mut self.outbox,
                    renderer,
                    view,
                    id,
                );
                self.rendered += 1;
            }
        }

        if self.config.debug_overlay {
            for id in self.live.clone() {
                if self.entities.get(id).is_some_and(|e| e.visible && e.active) {
                    self.debug_tree(renderer, view, id);
                }
            }
            self.draw_stats(renderer);
        }

        if self.clock.is_paused() {
            let dt = self.clock.real_dt;
            for id in self.live.clone() {
                if let Some(entity) = self.entities.get_mut(id) {
                    if entity.alive && entity.active {
                        entity.call_script(Callback::Pause, dt);
                    }
                }
                self.collect_outbox(id);
            }
            if self.config.editor_mode {
                self.draw_selection(renderer);
            }
        }
    }

    fn render_tree(
        entities: &mut SlotMap<EntityId, Entity>,
        assets: &AssetCache,
        scripts: &ScriptHost,
        outbox: &mut Vec<(EntityId, OutgoingMessage)>,
        renderer: &mut dyn Renderer,
        view: Rect,
        id: EntityId,
    ) {
        let Some(entity) = entities.get_mut(id) else {
            return;
        };
        let scripted = entity.has_script() && !entity.solid;
        if scripted && !entity.script_ready() {
            return;
        }

        let mut ctx = DrawContext {
            renderer: &mut *renderer,
            assets,
            view,
        };
        entity.draw_components(&mut ctx);
        if scripted {
            entity.call_script(Callback::Render, ());
            outbox.extend(scripts.drain_outbox().into_iter().map(|m| (id, m)));
        }

        let children = entity.children.clone();
        for child in children {
            if entities.get(child).is_some_and(|c| c.alive && c.visible) {
                Self::render_tree(entities, assets, scripts, outbox, renderer, view, child);
            }
        }
    }

    fn debug_tree(&self, renderer: &mut dyn Renderer, view: Rect, id: EntityId) {
        let Some(e) = self.entities.get(id) else {
            return;
        };
        let mask = e.debug_mask;
        if mask.is_empty() {
            return;
        }
        if e.has_script() && !e.script_ready() {
            return;
        }

        let dot = (e.radius() / 4.0).max(0.5);
        if mask.contains(DebugMask::BOX) {
            renderer.draw_rect_lines(e.footprint(), Color::WHITE);
        }
        if mask.contains(DebugMask::ORIGIN) {
            renderer.draw_circle_lines(e.world_offset(), dot, Color::WHITE);
        }
        if !e.solid {
            if mask.contains(DebugMask::PIVOT) {
                renderer.draw_circle_lines(e.world_point(e.transform.pivot), dot, Color::LIME);
            }
            if mask.contains(DebugMask::TRANSFORM) {
                let corners = [
                    e.world_point(Vec2::ZERO),
                    e.world_point(Vec2::new(e.width, 0.0)),
                    e.world_point(Vec2::new(e.width, e.height)),
                    e.world_point(Vec2::new(0.0, e.height)),
                ];
                for (i, from) in corners.iter().enumerate() {
                    renderer.draw_line(*from, corners[(i + 1) % 4], Color::LIME);
                }
            }
        }
        if mask.contains(DebugMask::BOUND) {
            renderer.draw_rect_lines(e.bound(), Color::MAGENTA);
        }
        if mask.contains(DebugMask::COMPONENTS) {
            let mut ctx = DrawContext {
                renderer: &mut *renderer,
                assets: &self.assets,
                view,
            };
            e.debug_draw_components(&mut ctx);
        }

        for child in e.children() {
            self.debug_tree(renderer, view, *child);
        }
    }

    fn draw_stats(&self, renderer: &mut dyn Renderer) {
        let screen_h = self.camera.viewport.1 as f32;
        let mut row = 0.0;
        for (layer, bucket) in self.layers.iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            renderer.draw_text(
                &format!("Layer [{layer}]  Objects [{}]", bucket.len()),
                Vec2::new(28.0, screen_h - 20.0 - row * 22.0),
                10.0,
                Color::LIME,
            );
            row += 1.0;
        }
        renderer.draw_text(
            &format!("Objects: {}/{}", self.live.len(), self.rendered),
            Vec2::new(15.0, 36.0),
            18.0,
            Color::LIME,
        );
        renderer.draw_text(
            &format!("FPS: {:.0}", self.clock.smoothed_fps),
            Vec2::new(15.0, 18.0),
            18.0,
            Color::LIME,
        );
    }

    // ---- editor ------------------------------------------------------------

    /// Select the pickable entity under `point` while paused in editor mode.
    pub fn select_at(&mut self, point: Vec2) -> Option<EntityId> {
        if !self.config.editor_mode || !self.clock.is_paused() {
            return None;
        }
        self.selected = self.pick_point(point);
        self.selected
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    /// Drag the selected entity by a world-space delta.
    pub fn move_selected(&mut self, delta: Vec2) {
        let Some(id) = self.selected else {
            return;
        };
        if let Some(entity) = self.entities.get_mut(id) {
            entity.transform.position += delta;
        }
        self.refresh_world(id);
    }

    fn draw_selection(&self, renderer: &mut dyn Renderer) {
        if let Some(e) = self.selected.and_then(|id| self.entities.get(id)) {
            renderer.draw_rect_lines(e.bound(), Color::BLUE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::{BoxCollider, CircleCollider};
    use crate::config::CollisionPolicy;
    use crate::sprite::Sprite;
    use kite_render::{DrawCommand, RecordingRenderer};
    use mlua::prelude::LuaTable;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    const DT: f32 = 1.0 / 60.0;

    fn scene() -> Scene {
        Scene::new(SceneConfig::default()).expect("scene")
    }

    fn temp_script(name: &str, content: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!(
            "kite_scene_{}_{}_{}.lua",
            name,
            std::process::id(),
            nanos
        ));
        let mut f = std::fs::File::create(&path).expect("create script");
        f.write_all(content.as_bytes()).expect("write script");
        path
    }

    fn self_table(scene: &Scene, id: EntityId) -> LuaTable {
        scene
            .get(id)
            .and_then(|e| e.script())
            .map(|s| s.handle())
            .expect("scripted entity")
    }

    const COUNTER: &str = r#"
local M = {}
function M.on_collision(self, other)
    self.hits = (self.hits or 0) + 1
    if type(other) == "table" then self.other = other.name else self.other = other end
end
function M.on_message(self, payload) self.inbox = payload end
function M.on_remove(self) engine.log("removed " .. self.name) end
return M
"#;

    #[test]
    fn spawned_entity_has_world_position_and_bound() {
        let mut scene = scene();
        let id = scene.spawn(Entity::new("E").at(10.0, 20.0).sized(8.0, 8.0).on_layer(2));
        let e = scene.get(id).expect("entity");
        assert_eq!(e.world_position(), Vec2::new(10.0, 20.0));
        assert_eq!(e.bound(), Rect::new(10.0, 20.0, 8.0, 8.0));
        assert_eq!(scene.layer_count(), 3);
        assert_eq!(scene.layer(2), &[id]);
        assert_eq!(scene.query_point(Vec2::new(12.0, 22.0)), vec![id]);
    }

    #[test]
    fn overlapping_boxes_notify_each_side_once() {
        let path = temp_script("counter", COUNTER);
        let mut scene = scene();
        let e = scene.spawn(Entity::new("E").at(10.0, 20.0).on_layer(2));
        let f = scene.spawn(Entity::new("F").at(12.0, 20.0).on_layer(2));
        for id in [e, f] {
            scene
                .get_mut(id)
                .expect("entity")
                .add_component(BoxCollider::new(0.0, 0.0, 8.0, 8.0));
            scene.attach_script(id, &path).expect("script");
        }

        scene.update(DT);

        assert_eq!(
            scene.collision_events(),
            &[
                CollisionEvent { entity: e, other: f },
                CollisionEvent { entity: f, other: e }
            ]
        );
        let te = self_table(&scene, e);
        let tf = self_table(&scene, f);
        assert_eq!(te.get::<i64>("hits").expect("hits"), 1);
        assert_eq!(tf.get::<i64>("hits").expect("hits"), 1);
        assert_eq!(te.get::<String>("other").expect("other"), "F");
        assert_eq!(tf.get::<String>("other").expect("other"), "E");

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn first_pair_policy_limits_notifications_per_frame() {
        let mut scene = scene();
        for (name, x) in [("a", 0.0), ("b", 2.0), ("c", 100.0), ("d", 102.0)] {
            let id = scene.spawn(Entity::new(name).at(x, 0.0));
            scene
                .get_mut(id)
                .expect("entity")
                .add_component(BoxCollider::new(0.0, 0.0, 8.0, 8.0));
        }
        scene.update(DT);
        assert_eq!(scene.collision_events().len(), 2);

        scene.config.collision_policy = CollisionPolicy::AllPairs;
        scene.update(DT);
        assert_eq!(scene.collision_events().len(), 4);
    }

    #[test]
    fn circle_and_box_collide_in_world_space() {
        let mut scene = scene();
        let a = scene.spawn(Entity::new("box").at(50.0, 50.0));
        scene
            .get_mut(a)
            .expect("box")
            .add_component(BoxCollider::new(0.0, 0.0, 10.0, 10.0));
        let b = scene.spawn(Entity::new("ball").at(60.0, 55.0));
        scene
            .get_mut(b)
            .expect("ball")
            .add_component(CircleCollider::new(2.0, 0.0, 3.0));
        scene.update(DT);
        assert_eq!(scene.collision_events().len(), 2);
        assert_eq!(scene.collision_events()[0].entity, a);
    }

    #[test]
    fn parent_and_child_never_collide() {
        let mut scene = scene();
        scene.config.collision_policy = CollisionPolicy::AllPairs;
        let parent = scene.spawn(Entity::new("ship").at(10.0, 10.0));
        scene
            .get_mut(parent)
            .expect("parent")
            .add_component(BoxCollider::new(0.0, 0.0, 16.0, 16.0));
        let mut turret = Entity::new("turret").at(2.0, 2.0);
        turret.add_component(BoxCollider::new(0.0, 0.0, 4.0, 4.0));
        let child = scene.add_child(parent, turret).expect("child");

        scene.update(DT);
        assert!(scene.collision_events().is_empty());
        assert_eq!(
            scene.get(child).expect("child").world_offset(),
            Vec2::new(12.0, 12.0)
        );
        assert!(!scene.is_live(child));
    }

    #[test]
    fn clear_scene_keeps_persistent_and_discards_queued() {
        let mut scene = scene();
        let mut a = Entity::new("A");
        a.persistent = true;
        let a = scene.spawn(a);
        let b = scene.spawn(Entity::new("B"));
        let c = scene.spawn_deferred(Entity::new("C"));

        scene.clear_scene();
        assert!(scene.is_live(a));
        assert!(scene.pending_removals().contains(&b));
        assert!(scene.get(c).is_none());
        assert_eq!(scene.layer(0), &[a]);

        scene.update(DT);
        assert!(scene.get(b).is_none());
        assert!(scene.is_live(a));
        assert_eq!(scene.live(), &[a]);
    }

    #[test]
    fn clear_and_free_releases_everything() {
        let mut scene = scene();
        let mut keep = Entity::new("keep");
        keep.persistent = true;
        scene.spawn(keep);
        scene.spawn(Entity::new("other"));
        scene.spawn_deferred(Entity::new("queued"));

        scene.clear_and_free();
        assert_eq!(scene.entity_count(), 0);
        assert!(scene.live().is_empty());
        assert_eq!(scene.index().count(), 0);
    }

    #[test]
    fn deferred_add_and_remove_apply_in_drains() {
        let mut scene = scene();
        let queued = scene.spawn_deferred(Entity::new("late").on_layer(4));
        assert!(!scene.is_live(queued));
        assert_eq!(scene.pending_additions(), &[queued]);

        scene.update(DT);
        assert!(scene.is_live(queued));
        assert_eq!(scene.layer(4), &[queued]);

        scene.remove(queued);
        assert!(scene.is_live(queued));
        scene.update(DT);
        assert!(scene.get(queued).is_none());
        assert!(scene.layer(4).is_empty());
        assert_eq!(scene.index().count(), 0);
    }

    #[test]
    fn script_can_kill_its_entity_during_update() {
        let path = temp_script(
            "suicide",
            "local M = {}\nfunction M.on_update(self, dt) self.alive = false end\nreturn M\n",
        );
        let mut scene = scene();
        let id = scene.spawn(Entity::new("doomed"));
        scene.attach_script(id, &path).expect("script");

        scene.update(DT);
        assert!(scene.get(id).is_none());
        assert!(scene.live().is_empty());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn dead_children_are_detached_from_parent() {
        let mut scene = scene();
        let parent = scene.spawn(Entity::new("p"));
        let child = scene.add_child(parent, Entity::new("c")).expect("child");
        scene.remove(child);
        scene.update(DT);
        assert!(scene.get(child).is_none());
        assert!(scene.get(parent).expect("parent").children().is_empty());
    }

    #[test]
    fn dead_children_under_inactive_parents_are_collected() {
        let mut scene = scene();
        let parent = scene.spawn(Entity::new("p"));
        let child = scene.add_child(parent, Entity::new("c")).expect("child");
        let middle = scene.add_child(parent, Entity::new("m")).expect("middle");
        let grandchild = scene.add_child(middle, Entity::new("g")).expect("grandchild");
        scene.get_mut(parent).expect("parent").active = false;
        scene.get_mut(middle).expect("middle").active = false;

        scene.remove(child);
        scene.remove(grandchild);
        scene.update(DT);

        assert!(scene.get(child).is_none());
        assert!(scene.get(grandchild).is_none());
        assert_eq!(scene.get(parent).expect("parent").children(), &[middle]);
        assert!(scene.get(middle).expect("middle").children().is_empty());
        assert!(scene.query_point(Vec2::ZERO).iter().all(|id| *id == parent || *id == middle));
        assert_eq!(scene.removed_since_gc(), 2);
    }

    #[test]
    fn oversized_layer_is_clamped_to_limit() {
        let mut scene = scene();
        let far = scene.spawn(Entity::new("far").on_layer(1 << 40));
        assert_eq!(scene.layer_count(), MAX_LAYERS);
        assert_eq!(scene.get(far).expect("far").layer, MAX_LAYERS - 1);
        assert_eq!(scene.layer(MAX_LAYERS - 1), &[far]);

        let queued = scene.spawn_deferred(Entity::new("queued").on_layer(usize::MAX));
        scene.update(DT);
        assert_eq!(scene.layer_count(), MAX_LAYERS);
        assert_eq!(scene.layer(MAX_LAYERS - 1), &[far, queued]);
    }

    #[test]
    fn inactive_entities_skip_update_but_still_render() {
        let mut scene = scene();
        scene.assets_mut().insert_record("hero", 16, 16, 1);
        let mut e = Entity::new("idle").at(5.0, 5.0);
        e.add_component(Sprite::from_asset("hero", scene.assets()));
        e.active = false;
        let id = scene.spawn(e);
        scene.get_mut(id).expect("entity").transform.position.x = 50.0;

        scene.update(DT);
        let mut renderer = RecordingRenderer::new();
        scene.render(&mut renderer);
        assert_eq!(renderer.sprite_count(), 1);
        assert_eq!(scene.rendered_count(), 1);
    }

    #[test]
    fn render_skips_hidden_entities_and_reports_missing_images() {
        let mut scene = scene();
        let mut hidden = Entity::new("hidden");
        hidden.visible = false;
        hidden.add_component(Sprite::new("nope"));
        scene.spawn(hidden);
        let mut shown = Entity::new("shown");
        shown.add_component(Sprite::new("missing"));
        scene.spawn(shown);

        let mut renderer = RecordingRenderer::new();
        scene.render(&mut renderer);
        assert_eq!(renderer.sprite_count(), 0);
        assert_eq!(scene.rendered_count(), 1);
        assert!(renderer
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::CircleLines { color, .. } if *color == Color::RED)));
    }

    #[test]
    fn view_culling_hides_entities_outside_camera() {
        let mut config = SceneConfig::default();
        config.view_culling = true;
        config.window_width = 100;
        config.window_height = 100;
        let mut scene = Scene::new(config).expect("scene");
        scene.set_camera_position(0.0, 0.0);
        scene.spawn(Entity::new("near").at(10.0, 10.0).sized(4.0, 4.0));
        scene.spawn(Entity::new("far").at(500.0, 500.0).sized(4.0, 4.0));

        let mut renderer = RecordingRenderer::new();
        scene.render(&mut renderer);
        assert_eq!(scene.rendered_count(), 1);
    }

    #[test]
    fn debug_overlay_draws_masked_shapes_and_stats() {
        let mut scene = scene();
        scene.set_debug_overlay(true);
        let mut e = Entity::new("dbg").at(1.0, 2.0).sized(3.0, 4.0);
        e.debug_mask = DebugMask(DebugMask::BOUND);
        scene.spawn(e);

        let mut renderer = RecordingRenderer::new();
        scene.render(&mut renderer);
        assert!(renderer.commands.contains(&DrawCommand::RectLines {
            rect: Rect::new(1.0, 2.0, 3.0, 4.0),
            color: Color::MAGENTA
        }));
        assert!(renderer
            .commands
            .iter()
            .any(|c| matches!(c, DrawCommand::Text { text, .. } if text.starts_with("Layer [0]"))));
    }

    #[test]
    fn pick_queries_only_see_pickable_entities() {
        let mut scene = scene();
        let plain = scene.spawn(Entity::new("plain").at(0.0, 0.0).sized(10.0, 10.0));
        let mut p = Entity::new("pick").at(0.0, 0.0).sized(10.0, 10.0);
        p.pickable = true;
        let pick = scene.spawn(p);

        assert_eq!(scene.pick_point(Vec2::new(5.0, 5.0)), Some(pick));
        assert_eq!(scene.pick_rect(Rect::new(8.0, 8.0, 5.0, 5.0)), Some(pick));
        assert_eq!(scene.pick_circle(Vec2::new(12.0, 5.0), 3.0), Some(pick));
        assert_eq!(scene.pick_point(Vec2::new(50.0, 50.0)), None);
        assert_ne!(scene.pick_point(Vec2::new(5.0, 5.0)), Some(plain));
    }

    #[test]
    fn place_queries_test_hypothetical_positions() {
        let mut scene = scene();
        let mover = scene.spawn(Entity::new("mover").at(0.0, 0.0).sized(8.0, 8.0));
        scene.spawn(Entity::new("wall").at(20.0, 0.0).sized(8.0, 8.0).on_layer(1));

        assert!(scene.place_free(mover, 5.0, 0.0));
        assert!(!scene.place_free(mover, 15.0, 0.0));
        assert_eq!(scene.collision_events().len(), 2);

        assert!(scene.place_meeting(mover, 15.0, 0.0, "wall"));
        assert!(!scene.place_meeting(mover, 15.0, 0.0, "door"));
        assert!(scene.place_meeting_layer(mover, 15.0, 0.0, 1));
        assert!(!scene.place_meeting_layer(mover, 15.0, 0.0, 0));

        scene.get_mut(mover).expect("mover").collidable = false;
        assert!(scene.place_free(mover, 15.0, 0.0));
        assert!(!scene.place_meeting(mover, 15.0, 0.0, "wall"));
    }

    #[test]
    fn place_meeting_skips_entities_awaiting_removal() {
        let mut scene = scene();
        let mover = scene.spawn(Entity::new("mover").at(0.0, 0.0).sized(8.0, 8.0));
        let wall = scene.spawn(Entity::new("wall").at(20.0, 0.0).sized(8.0, 8.0).on_layer(1));
        assert!(scene.place_meeting(mover, 15.0, 0.0, "wall"));

        scene.remove(wall);
        assert!(scene.get(wall).is_some());
        assert!(!scene.place_meeting(mover, 15.0, 0.0, "wall"));
        assert!(!scene.place_meeting_layer(mover, 15.0, 0.0, 1));
        assert!(scene.place_free(mover, 15.0, 0.0));
    }

    #[test]
    fn find_by_name_returns_first_live_match() {
        let mut scene = scene();
        let first = scene.spawn(Entity::new("twin"));
        scene.spawn(Entity::new("twin"));
        assert_eq!(scene.find_by_name("twin"), Some(first));
        assert_eq!(scene.find_by_name("ghost"), None);
    }

    #[test]
    fn messages_reach_named_and_broadcast_targets() {
        let path = temp_script("inbox", COUNTER);
        let mut scene = scene();
        let a = scene.spawn(Entity::new("a"));
        let b = scene.spawn(Entity::new("b"));
        scene.attach_script(a, &path).expect("script");
        scene.attach_script(b, &path).expect("script");
        scene.update(DT);

        assert_eq!(scene.send_message_to("b", "hi"), 1);
        assert_eq!(self_table(&scene, b).get::<String>("inbox").expect("inbox"), "hi");
        assert!(self_table(&scene, a).get::<Option<String>>("inbox").expect("inbox").is_none());

        assert_eq!(scene.send_message_all(Some(b), "all"), 1);
        assert_eq!(self_table(&scene, a).get::<String>("inbox").expect("inbox"), "all");

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn posted_messages_are_delivered_after_update() {
        let sender = temp_script(
            "sender",
            "local M = {}\nfunction M.on_update(self, dt) engine.post('sink', 'ping') end\nreturn M\n",
        );
        let sink = temp_script("sink", COUNTER);
        let mut scene = scene();
        let s = scene.spawn(Entity::new("source"));
        let k = scene.spawn(Entity::new("sink"));
        scene.attach_script(s, &sender).expect("script");
        scene.attach_script(k, &sink).expect("script");

        scene.update(DT);
        assert_eq!(self_table(&scene, k).get::<String>("inbox").expect("inbox"), "ping");

        let _ = std::fs::remove_file(sender);
        let _ = std::fs::remove_file(sink);
    }

    #[test]
    fn live_reload_swaps_newer_script() {
        let path = temp_script(
            "reload",
            "local M = {}\nfunction M.on_update(self, dt) error('broken') end\nreturn M\n",
        );
        let mut config = SceneConfig::default();
        config.live_reload_interval_secs = 0.0;
        let mut scene = Scene::new(config).expect("scene");
        let id = scene.spawn(Entity::new("hot"));
        scene.attach_script(id, &path).expect("script");

        scene.update(DT);
        assert!(scene.get(id).and_then(|e| e.script()).is_some_and(|s| s.is_panicked()));

        let mut f = std::fs::File::create(&path).expect("rewrite");
        f.write_all(b"local M = {}\nfunction M.on_update(self, dt) self.x = 42 end\nreturn M\n")
            .expect("write");
        f.set_modified(SystemTime::now() + Duration::from_secs(10))
            .expect("touch");
        drop(f);

        scene.update(DT);
        assert!(scene.get(id).and_then(|e| e.script()).is_some_and(|s| !s.is_panicked()));
        scene.update(DT);
        assert_eq!(scene.get(id).expect("entity").transform.position.x, 42.0);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn gc_counter_resets_past_threshold() {
        let mut config = SceneConfig::default();
        config.gc_removed_threshold = 1;
        let mut scene = Scene::new(config).expect("scene");
        let a = scene.spawn(Entity::new("a"));
        scene.remove(a);
        scene.update(DT);
        assert_eq!(scene.removed_since_gc(), 1);

        let b = scene.spawn(Entity::new("b"));
        scene.remove(b);
        scene.update(DT);
        assert_eq!(scene.removed_since_gc(), 0);
    }

    #[test]
    fn tile_solids_cover_blocking_cells() {
        let mut scene = scene();
        let mut map = Entity::new("map").at(100.0, 0.0);
        let layer = map.add_component(TileLayer::new("tiles", 2, 2, 16, 16));
        layer.load_from_csv("0,1\n2,-1", 0).expect("csv");
        let map = scene.spawn(map);

        assert_eq!(scene.build_tile_solids(map), 2);
        let solids: Vec<&Entity> = scene
            .layer(2)
            .iter()
            .filter_map(|id| scene.get(*id))
            .collect();
        assert_eq!(solids.len(), 2);
        assert!(solids.iter().all(|s| s.solid && s.prefab && s.name == "solid"));
        assert!(solids
            .iter()
            .any(|s| s.bound() == Rect::new(116.0, 0.0, 16.0, 16.0)));
    }

    #[test]
    fn paused_scene_freezes_update_and_calls_on_pause() {
        let path = temp_script(
            "pause",
            r#"
local M = {}
function M.on_update(self, dt) self.x = self.x + 1 end
function M.on_pause(self, dt) self.paused_calls = (self.paused_calls or 0) + 1 end
return M
"#,
        );
        let mut scene = scene();
        let id = scene.spawn(Entity::new("p"));
        scene.attach_script(id, &path).expect("script");
        scene.update(DT);
        assert_eq!(scene.get(id).expect("entity").transform.position.x, 1.0);

        scene.pause();
        scene.update(DT);
        assert_eq!(scene.get(id).expect("entity").transform.position.x, 1.0);
        let mut renderer = RecordingRenderer::new();
        scene.render(&mut renderer);
        assert_eq!(
            self_table(&scene, id).get::<i64>("paused_calls").expect("calls"),
            1
        );

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn editor_selection_moves_entity_while_paused() {
        let mut scene = scene();
        scene.set_editor_mode(true);
        let mut e = Entity::new("drag").sized(10.0, 10.0);
        e.pickable = true;
        let id = scene.spawn(e);

        assert_eq!(scene.select_at(Vec2::new(5.0, 5.0)), None);
        scene.pause();
        assert_eq!(scene.select_at(Vec2::new(5.0, 5.0)), Some(id));
        scene.move_selected(Vec2::new(3.0, 4.0));
        assert_eq!(
            scene.get(id).expect("entity").world_position(),
            Vec2::new(3.0, 4.0)
        );
        scene.resume();
        assert_eq!(scene.selected(), None);
    }

    #[test]
    fn camera_helpers_drive_view_rect() {
        let mut scene = scene();
        scene.set_camera(640.0, 360.0);
        assert_eq!(scene.view_rect(), Rect::new(0.0, 0.0, 1280.0, 720.0));
        scene.set_camera_position(100.0, 50.0);
        assert_eq!(scene.view_rect().x, 100.0);
        assert_eq!(scene.view_rect().y, 50.0);
    }
}
