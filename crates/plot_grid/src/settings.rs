//! Grid configuration loaded from TOML.

use serde::{Deserialize, Serialize};

/// Top-level grid configuration.
///
/// Loaded from a TOML document; every field has a sensible default so a
/// partial (or empty) document still produces a working configuration.
///
/// # Example
///
/// ```toml
/// island_spacing = 150
/// grid_min_x = -50
/// grid_max_x = 50
/// grid_min_z = -50
/// grid_max_z = 50
/// multi_dimension = true
/// relocation_cost = 10000.0
/// relocation_cooldown_hours = 24
///
/// [[dimensions]]
/// key = "mining"
/// world_name = "plots_mining"
/// display_name = "Mining Dimension"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    /// Half the distance between adjacent cell centers, in blocks.
    #[serde(default = "default_island_spacing")]
    pub island_spacing: i32,

    #[serde(default = "default_grid_min")]
    pub grid_min_x: i32,
    #[serde(default = "default_grid_max")]
    pub grid_max_x: i32,
    #[serde(default = "default_grid_min")]
    pub grid_min_z: i32,
    #[serde(default = "default_grid_max")]
    pub grid_max_z: i32,

    /// Whether per-dimension payloads are managed at all.
    #[serde(default)]
    pub multi_dimension: bool,

    /// Cost charged for a player-initiated relocation. Zero disables the
    /// charge.
    #[serde(default = "default_relocation_cost")]
    pub relocation_cost: f64,

    /// Hours an owner must wait between relocations. Zero disables the
    /// cooldown.
    #[serde(default = "default_relocation_cooldown_hours")]
    pub relocation_cooldown_hours: u64,

    /// Radius in blocks captured, cleared and pasted around a cell center
    /// during relocation.
    #[serde(default = "default_relocation_radius")]
    pub relocation_radius: i32,

    #[serde(default)]
    pub dimensions: Vec<DimensionSettings>,
}

/// Configuration of one custom dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSettings {
    pub key: String,
    pub world_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_blueprint")]
    pub blueprint: String,
    #[serde(default = "default_true")]
    pub create_on_claim: bool,
    #[serde(default)]
    pub display_name: String,
}

fn default_island_spacing() -> i32 {
    200
}

fn default_grid_min() -> i32 {
    -50
}

fn default_grid_max() -> i32 {
    50
}

fn default_relocation_cost() -> f64 {
    0.0
}

fn default_relocation_cooldown_hours() -> u64 {
    24
}

fn default_relocation_radius() -> i32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_blueprint() -> String {
    "default".to_string()
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            island_spacing: default_island_spacing(),
            grid_min_x: default_grid_min(),
            grid_max_x: default_grid_max(),
            grid_min_z: default_grid_min(),
            grid_max_z: default_grid_max(),
            multi_dimension: false,
            relocation_cost: default_relocation_cost(),
            relocation_cooldown_hours: default_relocation_cooldown_hours(),
            relocation_radius: default_relocation_radius(),
            dimensions: Vec::new(),
        }
    }
}

impl GridSettings {
    /// Parses settings from a TOML document and validates them.
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: GridSettings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.island_spacing <= 0 {
            return Err(SettingsError::Invalid(format!(
                "island_spacing must be positive, got {}",
                self.island_spacing
            )));
        }
        if self.grid_min_x > self.grid_max_x || self.grid_min_z > self.grid_max_z {
            return Err(SettingsError::Invalid(
                "grid bounds are inverted (min must not exceed max)".to_string(),
            ));
        }
        for dim in &self.dimensions {
            if dim.key.trim().is_empty() || dim.world_name.trim().is_empty() {
                return Err(SettingsError::Invalid(format!(
                    "dimension entry '{}' needs both a key and a world_name",
                    dim.key
                )));
            }
        }
        Ok(())
    }

    /// Block distance between adjacent cell centers. The configured spacing
    /// is a center offset, so the real pitch is twice that.
    pub fn cell_pitch(&self) -> i32 {
        self.island_spacing * 2
    }

    /// Whether the coordinate lies within the configured grid bounds.
    pub fn in_bounds(&self, x: i32, z: i32) -> bool {
        x >= self.grid_min_x && x <= self.grid_max_x && z >= self.grid_min_z && z <= self.grid_max_z
    }
}

/// Errors while loading or validating grid settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid settings: {0}")]
    Invalid(String),
}
