//! Sprite asset resolution for spawned vehicles
//!
//! The engine never draws anything, but every vehicle carries the sprite a
//! renderer should use. Missing sprites fall back to the car sprite of the
//! same direction and never stop a spawn.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::types::{Direction, VehicleCategory};

/// Visual representation attached to a vehicle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sprite {
    Asset(PathBuf),
    Placeholder,
}

/// Outcome of resolving a sprite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub sprite: Sprite,
    /// Set when the requested sprite was missing: (requested, substituted)
    pub missing: Option<(PathBuf, Sprite)>,
}

/// Looks sprites up under `<root>/<direction>/<category>.png`
#[derive(Debug, Default)]
pub struct AssetCatalog {
    root: Option<PathBuf>,
    exists_cache: HashMap<PathBuf, bool>,
}

impl AssetCatalog {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            exists_cache: HashMap::new(),
        }
    }

    pub fn sprite_path(root: &Path, direction: Direction, category: VehicleCategory) -> PathBuf {
        root.join(direction.as_str())
            .join(format!("{}.png", category.as_str()))
    }

    fn exists(&mut self, path: &Path) -> bool {
        if let Some(known) = self.exists_cache.get(path) {
            return *known;
        }
        let found = path.is_file();
        self.exists_cache.insert(path.to_path_buf(), found);
        found
    }

    pub fn resolve(&mut self, direction: Direction, category: VehicleCategory) -> Resolved {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => {
                return Resolved {
                    sprite: Sprite::Placeholder,
                    missing: None,
                }
            }
        };

        let requested = Self::sprite_path(&root, direction, category);
        if self.exists(&requested) {
            return Resolved {
                sprite: Sprite::Asset(requested),
                missing: None,
            };
        }

        let fallback_path = Self::sprite_path(&root, direction, VehicleCategory::Car);
        let fallback = if self.exists(&fallback_path) {
            Sprite::Asset(fallback_path)
        } else {
            Sprite::Placeholder
        };

        Resolved {
            sprite: fallback.clone(),
            missing: Some((requested, fallback)),
        }
    }
}
