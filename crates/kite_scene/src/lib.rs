//! Scene graph runtime: entities with hierarchical transforms, typed
//! components, Lua scripts, a quadtree index and the per-frame
//! update/render/collision pipeline driven by [`Scene`].

pub mod animator;
pub mod assets;
pub mod collider;
pub mod collision;
pub mod component;
pub mod config;
pub mod entity;
pub mod error;
pub mod persist;
pub mod scene;
pub mod script;
pub mod sprite;
pub mod tile_layer;

pub use animator::Animator;
pub use assets::{AssetCache, ImageRecord};
pub use collider::{BoxCollider, CircleCollider};
pub use collision::{CollisionEvent, Shape};
pub use component::{Component, ComponentKind, ComponentType, DrawContext};
pub use config::{load_config_from_path, validate_config, CollisionPolicy, SceneConfig, MAX_LAYERS};
pub use entity::{DebugMask, Entity, EntityId};
pub use error::{SceneError, ScriptError};
pub use persist::{load_document_from_path, validate_document, SceneDocument};
pub use scene::Scene;
pub use script::{Callback, ScriptHost, ScriptInstance};
pub use sprite::Sprite;
pub use tile_layer::{TileLayer, EMPTY_TILE};
