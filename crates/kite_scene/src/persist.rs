//! JSON scene documents.
//!
//! A document carries the scene name, runtime toggles, camera, the image
//! table and the entity hierarchy. Prefab entities (generated at runtime,
//! such as tile solids) are not written.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use kite_core::animation::{Animation, AnimationMode};
use kite_core::math::{Color, Rect};
use kite_core::transform::Transform;
use kite_render::TextureLoader;
use serde::{Deserialize, Serialize};

use crate::animator::Animator;
use crate::collider::{BoxCollider, CircleCollider};
use crate::config::MAX_LAYERS;
use crate::entity::{DebugMask, Entity, EntityId};
use crate::error::SceneError;
use crate::scene::Scene;
use crate::sprite::Sprite;
use crate::tile_layer::TileLayer;

pub const DOCUMENT_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub toggles: SceneToggles,
    #[serde(default)]
    pub camera: CameraRecord,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneToggles {
    #[serde(default = "default_true")]
    pub collisions_enabled: bool,
    #[serde(default)]
    pub debug_overlay: bool,
    #[serde(default = "default_true")]
    pub live_reload_enabled: bool,
    #[serde(default)]
    pub editor_mode: bool,
}

impl Default for SceneToggles {
    fn default() -> Self {
        Self {
            collisions_enabled: true,
            debug_overlay: false,
            live_reload_enabled: true,
            editor_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    #[serde(default)]
    pub target: Vec2,
    #[serde(default)]
    pub offset: Vec2,
    #[serde(default = "default_zoom")]
    pub zoom: f32,
    #[serde(default)]
    pub rotation: f32,
}

impl Default for CameraRecord {
    fn default() -> Self {
        Self {
            target: Vec2::ZERO,
            offset: Vec2::ZERO,
            zoom: default_zoom(),
            rotation: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub key: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub solid: bool,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default = "default_true")]
    pub collidable: bool,
    #[serde(default)]
    pub pickable: bool,
    #[serde(default)]
    pub layer: usize,
    #[serde(default = "default_size")]
    pub width: f32,
    #[serde(default = "default_size")]
    pub height: f32,
    #[serde(default)]
    pub origin: Vec2,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub debug_mask: DebugMask,
    #[serde(default)]
    pub script: Option<PathBuf>,
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    #[serde(default)]
    pub children: Vec<EntityRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentRecord {
    Sprite {
        image: String,
        #[serde(default)]
        flip_x: bool,
        #[serde(default)]
        flip_y: bool,
        clip: Rect,
        #[serde(default)]
        tint: Color,
    },
    TileLayer {
        image: String,
        grid_width: u32,
        grid_height: u32,
        tile_width: u32,
        tile_height: u32,
        #[serde(default)]
        spacing: u32,
        #[serde(default)]
        margin: u32,
        /// Flat comma separated tile ids, row-major.
        tiles: String,
    },
    Animator {
        #[serde(default)]
        mode: AnimationMode,
        #[serde(default)]
        current: String,
        animations: Vec<AnimationRecord>,
    },
    BoxCollider {
        rect: Rect,
    },
    CircleCollider {
        center: Vec2,
        radius: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationRecord {
    pub name: String,
    #[serde(flatten)]
    pub animation: Animation,
}

pub fn load_document_from_path(path: &Path) -> Result<SceneDocument, SceneError> {
    let raw = fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document: SceneDocument =
        serde_json::from_str(&raw).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    validate_document(&document).map_err(SceneError::Validation)?;
    Ok(document)
}

pub fn save_document_to_path(document: &SceneDocument, path: &Path) -> Result<(), SceneError> {
    let json = serde_json::to_string_pretty(document).map_err(|source| SceneError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn validate_document(document: &SceneDocument) -> Result<(), String> {
    if document.version != DOCUMENT_VERSION {
        return Err(format!(
            "unsupported scene version '{}' (expected '{DOCUMENT_VERSION}')",
            document.version
        ));
    }
    if !(document.camera.zoom.is_finite() && document.camera.zoom > 0.0) {
        return Err(format!("camera zoom must be > 0, got {}", document.camera.zoom));
    }

    let mut keys = HashSet::new();
    for image in &document.images {
        if !keys.insert(image.key.as_str()) {
            return Err(format!("duplicate image key '{}'", image.key));
        }
    }

    for record in &document.entities {
        validate_entity(record)?;
    }
    Ok(())
}

fn validate_entity(record: &EntityRecord) -> Result<(), String> {
    if record.name.trim().is_empty() {
        return Err("entity name must be non-empty".to_string());
    }
    if !(record.width.is_finite() && record.height.is_finite())
        || record.width < 0.0
        || record.height < 0.0
    {
        return Err(format!(
            "entity '{}' has invalid size {}x{}",
            record.name, record.width, record.height
        ));
    }
    if record.layer >= MAX_LAYERS {
        return Err(format!(
            "entity '{}' is on layer {}, limit is {MAX_LAYERS}",
            record.name, record.layer
        ));
    }

    for component in &record.components {
        match component {
            ComponentRecord::TileLayer {
                grid_width,
                grid_height,
                tile_width,
                tile_height,
                ..
            } => {
                if *grid_width == 0 || *grid_height == 0 || *tile_width == 0 || *tile_height == 0
                {
                    return Err(format!(
                        "tile layer on '{}' needs non-zero grid and tile sizes",
                        record.name
                    ));
                }
            }
            ComponentRecord::Animator { animations, .. } => {
                for anim in animations {
                    if anim.animation.rows == 0 || anim.animation.columns == 0 {
                        return Err(format!(
                            "animation '{}' on '{}' needs at least one row and column",
                            anim.name, record.name
                        ));
                    }
                    if anim.animation.frame_count == 0 || anim.animation.frame_duration <= 0.0 {
                        return Err(format!(
                            "animation '{}' on '{}' needs frames and a positive frame duration",
                            anim.name, record.name
                        ));
                    }
                }
            }
            ComponentRecord::CircleCollider { radius, .. } if *radius < 0.0 => {
                return Err(format!("circle collider on '{}' has negative radius", record.name));
            }
            _ => {}
        }
    }

    for child in &record.children {
        validate_entity(child)?;
    }
    Ok(())
}

fn record_components(entity: &Entity) -> Vec<ComponentRecord> {
    let mut out = Vec::new();
    if let Some(s) = entity.component::<Sprite>() {
        out.push(ComponentRecord::Sprite {
            image: s.image.clone(),
            flip_x: s.flip_x,
            flip_y: s.flip_y,
            clip: s.clip,
            tint: s.tint,
        });
    }
    if let Some(t) = entity.component::<TileLayer>() {
        out.push(ComponentRecord::TileLayer {
            image: t.image.clone(),
            grid_width: t.grid_width,
            grid_height: t.grid_height,
            tile_width: t.tile_width,
            tile_height: t.tile_height,
            spacing: t.spacing,
            margin: t.margin,
            tiles: t.to_csv(),
        });
    }
    if let Some(a) = entity.component::<Animator>() {
        out.push(ComponentRecord::Animator {
            mode: a.mode(),
            current: a.current_name().to_string(),
            animations: a
                .animations()
                .map(|(name, anim)| AnimationRecord {
                    name: name.to_string(),
                    animation: anim.clone(),
                })
                .collect(),
        });
    }
    if let Some(b) = entity.component::<BoxCollider>() {
        out.push(ComponentRecord::BoxCollider { rect: b.rect });
    }
    if let Some(c) = entity.component::<CircleCollider>() {
        out.push(ComponentRecord::CircleCollider {
            center: c.center,
            radius: c.radius,
        });
    }
    out
}

fn build_entity(record: &EntityRecord) -> Result<Entity, SceneError> {
    let mut entity = Entity::new(&record.name);

    for component in &record.components {
        match component {
            ComponentRecord::Sprite {
                image,
                flip_x,
                flip_y,
                clip,
                tint,
            } => {
                let sprite = entity.add_component(Sprite::with_clip(image, *clip));
                sprite.flip_x = *flip_x;
                sprite.flip_y = *flip_y;
                sprite.tint = *tint;
            }
            ComponentRecord::TileLayer {
                image,
                grid_width,
                grid_height,
                tile_width,
                tile_height,
                spacing,
                margin,
                tiles,
            } => {
                let mut layer =
                    TileLayer::new(image, *grid_width, *grid_height, *tile_width, *tile_height)
                        .with_spacing(*spacing, *margin);
                layer.load_from_csv(tiles, 0).map_err(|e| {
                    SceneError::Validation(format!("tile layer on '{}': {e}", record.name))
                })?;
                entity.add_component(layer);
            }
            ComponentRecord::Animator {
                mode,
                current,
                animations,
            } => {
                let mut animator = Animator::new();
                for anim in animations {
                    animator.add_animation(&anim.name, anim.animation.clone());
                }
                if !current.is_empty() {
                    animator.set_animation(current, true);
                }
                animator.set_mode(*mode);
                entity.add_component(animator);
            }
            ComponentRecord::BoxCollider { rect } => {
                entity.add_component(BoxCollider::new(rect.x, rect.y, rect.width, rect.height));
            }
            ComponentRecord::CircleCollider { center, radius } => {
                entity.add_component(CircleCollider::new(center.x, center.y, *radius));
            }
        }
    }

    // Stored geometry wins over whatever the components set on attach.
    entity.visible = record.visible;
    entity.active = record.active;
    entity.solid = record.solid;
    entity.persistent = record.persistent;
    entity.collidable = record.collidable;
    entity.pickable = record.pickable;
    entity.layer = record.layer;
    entity.width = record.width;
    entity.height = record.height;
    entity.origin = record.origin;
    entity.transform = record.transform;
    entity.debug_mask = record.debug_mask;
    Ok(entity)
}

const fn default_true() -> bool {
    true
}

const fn default_zoom() -> f32 {
    1.0
}

const fn default_size() -> f32 {
    1.0
}

impl Scene {
    fn record_entity(&self, id: EntityId) -> Option<EntityRecord> {
        let e = self.entities.get(id)?;
        if e.prefab || !e.alive {
            return None;
        }
        Some(EntityRecord {
            name: e.name.clone(),
            visible: e.visible,
            active: e.active,
            solid: e.solid,
            persistent: e.persistent,
            collidable: e.collidable,
            pickable: e.pickable,
            layer: e.layer,
            width: e.width,
            height: e.height,
            origin: e.origin,
            transform: e.transform,
            debug_mask: e.debug_mask,
            script: e.script().map(|s| s.path().to_path_buf()),
            components: record_components(e),
            children: e
                .children()
                .iter()
                .filter_map(|c| self.record_entity(*c))
                .collect(),
        })
    }

    pub fn to_document(&self) -> SceneDocument {
        SceneDocument {
            version: DOCUMENT_VERSION.to_string(),
            name: self.name.clone(),
            toggles: SceneToggles {
                collisions_enabled: self.config.collisions_enabled,
                debug_overlay: self.config.debug_overlay,
                live_reload_enabled: self.config.live_reload_enabled,
                editor_mode: self.config.editor_mode,
            },
            camera: CameraRecord {
                target: self.camera.target,
                offset: self.camera.offset,
                zoom: self.camera.zoom,
                rotation: self.camera.rotation,
            },
            images: self
                .assets
                .entries()
                .into_iter()
                .map(|(key, path)| ImageEntry { key, path })
                .collect(),
            entities: self
                .live
                .iter()
                .filter_map(|id| self.record_entity(*id))
                .collect(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SceneError> {
        let document = self.to_document();
        save_document_to_path(&document, path)?;
        log::info!(
            "Saved scene '{}' ({} entities) to {}",
            self.name,
            document.entities.len(),
            path.display()
        );
        Ok(())
    }

    /// Clear the scene and populate it from a document file. Images are
    /// loaded through `loader`; a missing image only warns.
    pub fn load(&mut self, path: &Path, loader: &mut dyn TextureLoader) -> Result<(), SceneError> {
        let document = load_document_from_path(path)?;
        self.apply_document(&document, loader)?;
        log::info!(
            "Loaded scene '{}' ({} entities) from {}",
            self.name,
            document.entities.len(),
            path.display()
        );
        Ok(())
    }

    pub fn apply_document(
        &mut self,
        document: &SceneDocument,
        loader: &mut dyn TextureLoader,
    ) -> Result<(), SceneError> {
        self.clear_scene();
        self.name = document.name.clone();
        self.config.collisions_enabled = document.toggles.collisions_enabled;
        self.config.debug_overlay = document.toggles.debug_overlay;
        self.config.live_reload_enabled = document.toggles.live_reload_enabled;
        self.config.editor_mode = document.toggles.editor_mode;

        self.camera.target = document.camera.target;
        self.camera.offset = document.camera.offset;
        self.camera.zoom = document.camera.zoom;
        self.camera.rotation = document.camera.rotation;

        for image in &document.images {
            self.assets.load(&image.key, &image.path, loader);
        }

        for record in &document.entities {
            let id = self.spawn(build_entity(record)?);
            self.restore_children(id, record)?;
            if let Some(script) = &record.script {
                self.attach_script(id, script)?;
            }
        }
        Ok(())
    }

    fn restore_children(&mut self, parent: EntityId, record: &EntityRecord) -> Result<(), SceneError> {
        for child in &record.children {
            let Some(id) = self.add_child(parent, build_entity(child)?) else {
                continue;
            };
            self.restore_children(id, child)?;
            if let Some(script) = &child.script {
                self.attach_script(id, script)?;
            }
        }
        Ok(())
    }
}
