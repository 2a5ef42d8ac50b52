use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SceneError;

/// Upper bound on layer buckets; layer indices at or above it are refused
/// by document validation and clamped on spawn.
pub const MAX_LAYERS: usize = 256;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Stop the pass after the first overlapping pair.
    #[default]
    FirstPair,
    /// Report every overlapping pair each frame.
    AllPairs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "default_world_size")]
    pub world_width: f32,
    #[serde(default = "default_world_size")]
    pub world_height: f32,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_initial_layers")]
    pub initial_layers: usize,
    #[serde(default = "default_true")]
    pub live_reload_enabled: bool,
    #[serde(default = "default_live_reload_interval")]
    pub live_reload_interval_secs: f64,
    #[serde(default = "default_true")]
    pub collisions_enabled: bool,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    #[serde(default)]
    pub debug_overlay: bool,
    #[serde(default)]
    pub editor_mode: bool,
    /// Skip drawing entities whose bound misses the camera view.
    #[serde(default)]
    pub view_culling: bool,
    #[serde(default = "default_gc_threshold")]
    pub gc_removed_threshold: usize,
    #[serde(default = "default_quadtree_capacity")]
    pub quadtree_capacity: usize,
    #[serde(default = "default_quadtree_max_depth")]
    pub quadtree_max_depth: u32,
    #[serde(default = "default_max_frame_dt")]
    pub max_frame_dt: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            world_width: default_world_size(),
            world_height: default_world_size(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            initial_layers: default_initial_layers(),
            live_reload_enabled: true,
            live_reload_interval_secs: default_live_reload_interval(),
            collisions_enabled: true,
            collision_policy: CollisionPolicy::FirstPair,
            debug_overlay: false,
            editor_mode: false,
            view_culling: false,
            gc_removed_threshold: default_gc_threshold(),
            quadtree_capacity: default_quadtree_capacity(),
            quadtree_max_depth: default_quadtree_max_depth(),
            max_frame_dt: default_max_frame_dt(),
        }
    }
}

pub fn load_config_from_path(path: &Path) -> Result<SceneConfig, SceneError> {
    let raw = fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: SceneConfig = serde_json::from_str(&raw).map_err(|source| SceneError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    validate_config(&config).map_err(SceneError::Validation)?;
    log::info!("Loaded scene config {}", path.display());
    Ok(config)
}

pub fn validate_config(config: &SceneConfig) -> Result<(), String> {
    if config.world_width <= 0.0 || config.world_height <= 0.0 {
        return Err(format!(
            "world size must be positive, got {}x{}",
            config.world_width, config.world_height
        ));
    }
    if config.window_width == 0 || config.window_height == 0 {
        return Err("window size must be non-zero".to_string());
    }
    if config.initial_layers > MAX_LAYERS {
        return Err(format!(
            "initial_layers must be at most {MAX_LAYERS}, got {}",
            config.initial_layers
        ));
    }
    if config.quadtree_capacity == 0 {
        return Err("quadtree_capacity must be at least 1".to_string());
    }
    if config.live_reload_interval_secs < 0.0 {
        return Err("live_reload_interval_secs must not be negative".to_string());
    }
    if config.max_frame_dt <= 0.0 {
        return Err("max_frame_dt must be positive".to_string());
    }
    Ok(())
}

const fn default_world_size() -> f32 {
    4096.0
}

const fn default_window_width() -> u32 {
    1280
}

const fn default_window_height() -> u32 {
    720
}

const fn default_initial_layers() -> usize {
    2
}

const fn default_true() -> bool {
    true
}

const fn default_live_reload_interval() -> f64 {
    5.0
}

const fn default_gc_threshold() -> usize {
    250
}

const fn default_quadtree_capacity() -> usize {
    4
}

const fn default_quadtree_max_depth() -> u32 {
    5
}

const fn default_max_frame_dt() -> f32 {
    0.25
}
