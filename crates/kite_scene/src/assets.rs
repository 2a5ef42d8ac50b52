//! Image cache keyed by a short asset name.
//!
//! `AssetCache::load` resolves a file against the search paths, reads its
//! dimensions with the `image` crate and registers it with the backend through
//! a [`TextureLoader`]. Sprites, animators and tile layers refer to images by
//! key only and resolve them at draw time via [`AssetCache::get`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use kite_render::{TextureHandle, TextureLoader};

pub const DEFAULT_SEARCH_PATHS: [&str; 3] = ["assets/", "assets/images/", "assets/textures/"];

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub handle: TextureHandle,
}

#[derive(Debug)]
pub struct AssetCache {
    search_paths: Vec<PathBuf>,
    images: HashMap<String, ImageRecord>,
    warned_missing: RefCell<HashSet<String>>,
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetCache {
    pub fn new() -> Self {
        Self {
            search_paths: DEFAULT_SEARCH_PATHS.iter().map(PathBuf::from).collect(),
            images: HashMap::new(),
            warned_missing: RefCell::new(HashSet::new()),
        }
    }

    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    /// First existing candidate: the file as given, then each search path.
    pub fn resolve_path(&self, file: &Path) -> Option<PathBuf> {
        if file.is_file() {
            return Some(file.to_path_buf());
        }
        self.search_paths
            .iter()
            .map(|dir| dir.join(file))
            .find(|candidate| candidate.is_file())
    }

    /// Load `file` under `key`. An already cached key is returned as is.
    pub fn load(
        &mut self,
        key: &str,
        file: &Path,
        loader: &mut dyn TextureLoader,
    ) -> Option<&ImageRecord> {
        if self.images.contains_key(key) {
            return self.images.get(key);
        }
        let Some(path) = self.resolve_path(file) else {
            log::warn!("Image '{}' not found for key '{key}'", file.display());
            return None;
        };
        let (width, height) = match image::image_dimensions(&path) {
            Ok(dims) => dims,
            Err(e) => {
                log::error!("Failed to read image {}: {e}", path.display());
                return None;
            }
        };
        let handle = match loader.load_texture(&path, width, height) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Texture upload failed for {}: {e}", path.display());
                return None;
            }
        };

        log::info!("Loaded image '{key}' from {} ({width}x{height})", path.display());
        self.warned_missing.borrow_mut().remove(key);
        self.images.insert(
            key.to_string(),
            ImageRecord {
                path,
                width,
                height,
                handle,
            },
        );
        self.images.get(key)
    }

    /// Register an image the backend already holds.
    pub fn insert_record(&mut self, key: &str, width: u32, height: u32, handle: TextureHandle) {
        self.images.insert(
            key.to_string(),
            ImageRecord {
                path: PathBuf::from(key),
                width,
                height,
                handle,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<&ImageRecord> {
        self.images.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.images.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Warn once per key about a lookup miss.
    pub fn report_missing(&self, key: &str) {
        if self.warned_missing.borrow_mut().insert(key.to_string()) {
            log::warn!("Image '{key}' is not loaded");
        }
    }

    /// `(key, path)` pairs sorted by key.
    pub fn entries(&self) -> Vec<(String, PathBuf)> {
        let mut out: Vec<_> = self
            .images
            .iter()
            .map(|(k, r)| (k.clone(), r.path.clone()))
            .collect();
        out.sort();
        out
    }

    pub fn unload_all(&mut self, loader: &mut dyn TextureLoader) {
        for (_, record) in self.images.drain() {
            loader.unload_texture(record.handle);
        }
        self.warned_missing.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kite_render::RecordingRenderer;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!(
            "kite_assets_{}_{}",
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    #[test]
    fn load_reads_dimensions_and_caches() {
        let dir = temp_dir();
        let file = dir.join("hero.png");
        image::RgbaImage::new(24, 12).save(&file).expect("write png");

        let mut assets = AssetCache::new();
        let mut backend = RecordingRenderer::new();
        let record = assets.load("hero", &file, &mut backend).cloned();
        let record = record.expect("loaded");
        assert_eq!((record.width, record.height), (24, 12));
        assert_eq!(backend.texture_count(), 1);

        // Second load hits the cache without another upload.
        assert!(assets.load("hero", &file, &mut backend).is_some());
        assert_eq!(backend.texture_count(), 1);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn search_paths_resolve_relative_names() {
        let dir = temp_dir();
        image::RgbaImage::new(4, 4)
            .save(dir.join("tile.png"))
            .expect("write png");

        let mut assets = AssetCache::new();
        assets.add_search_path(&dir);
        assert_eq!(
            assets.resolve_path(Path::new("tile.png")),
            Some(dir.join("tile.png"))
        );

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn missing_file_returns_none() {
        let mut assets = AssetCache::new();
        let mut backend = RecordingRenderer::new();
        assert!(assets
            .load("ghost", Path::new("definitely/not/here.png"), &mut backend)
            .is_none());
        assert!(!assets.contains("ghost"));
        assets.report_missing("ghost");
        assets.report_missing("ghost");
    }

    #[test]
    fn entries_are_sorted_by_key() {
        let mut assets = AssetCache::new();
        assets.insert_record("b", 1, 1, 2);
        assets.insert_record("a", 1, 1, 1);
        let keys: Vec<String> = assets.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
