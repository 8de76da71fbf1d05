//! The custom dimension registry.
//!
//! Built once from the grid settings: each enabled dimension entry is
//! resolved to a loaded world through the [`WorldCatalog`], and both lookup
//! directions (key to world, world to key) are kept. Native worlds are never
//! registered as custom dimensions.

use plot_grid::{DimensionSettings, GridSettings, NativeWorlds, WorldId, WorldRef};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Resolves world names to loaded world handles.
pub trait WorldCatalog: Send + Sync {
    fn world_named(&self, name: &str) -> Option<WorldRef>;
}

struct Entry {
    settings: DimensionSettings,
    world: WorldRef,
}

pub struct DimensionManager {
    entries: HashMap<String, Entry>,
    key_by_world: HashMap<WorldId, String>,
    /// Keys in configuration order; creation walks them in this order.
    order: Vec<String>,
    native: NativeWorlds,
}

impl DimensionManager {
    /// Builds the registry. Disabled entries, entries whose world is not
    /// loaded, and entries pointing at a native world are skipped.
    pub fn new(settings: &GridSettings, catalog: &dyn WorldCatalog, native: NativeWorlds) -> Self {
        let mut entries = HashMap::new();
        let mut key_by_world = HashMap::new();
        let mut order = Vec::new();

        for dim in &settings.dimensions {
            if !dim.enabled {
                debug!("Dimension '{}' is disabled, skipping", dim.key);
                continue;
            }
            let Some(world) = catalog.world_named(&dim.world_name) else {
                warn!(
                    "⚠️ Dimension '{}' points at unloaded world '{}', skipping",
                    dim.key, dim.world_name
                );
                continue;
            };
            if native.contains(&world) {
                warn!(
                    "⚠️ Dimension '{}' points at native world '{}', skipping",
                    dim.key, world.name
                );
                continue;
            }
            key_by_world.insert(world.id, dim.key.clone());
            order.push(dim.key.clone());
            entries.insert(
                dim.key.clone(),
                Entry {
                    settings: dim.clone(),
                    world,
                },
            );
        }

        info!("🌍 Dimension registry: {} custom dimensions enabled", order.len());
        Self {
            entries,
            key_by_world,
            order,
            native,
        }
    }

    /// Enabled dimension keys in configuration order.
    pub fn enabled(&self) -> &[String] {
        &self.order
    }

    pub fn world_of(&self, key: &str) -> Option<&WorldRef> {
        self.entries.get(key).map(|e| &e.world)
    }

    pub fn settings_of(&self, key: &str) -> Option<&DimensionSettings> {
        self.entries.get(key).map(|e| &e.settings)
    }

    /// The dimension key a world belongs to, if it is a registered custom
    /// dimension.
    pub fn dimension_key_of(&self, world: &WorldRef) -> Option<&str> {
        self.key_by_world.get(&world.id).map(String::as_str)
    }

    /// Keys of dimensions that get a payload created on claim, in order.
    pub fn dimensions_for_creation(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|key| {
                self.entries
                    .get(*key)
                    .map(|e| e.settings.create_on_claim)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Whether a world is part of the native set, by identity or by the
    /// naming convention.
    pub fn is_native_world(&self, world: &WorldRef) -> bool {
        self.native.contains(world)
    }

    pub fn native_worlds(&self) -> &NativeWorlds {
        &self.native
    }
}
