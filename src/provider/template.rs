//! Object key templates.
//!
//! Tile pyramids in object storage are laid out by a path template such as
//! `{z}/{x}/{y}.png`. Supported placeholders:
//!
//! - `{z}` - zoom level
//! - `{x}` - tile column
//! - `{y}` - tile row, counted from the top (XYZ)
//! - `{-y}` - tile row, counted from the bottom (TMS)

use crate::error::ConfigError;
use crate::tile::TileKey;

/// Default layout for tile pyramids.
pub const DEFAULT_TILE_TEMPLATE: &str = "{z}/{x}/{y}.png";

/// Renders object keys for tile addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePathTemplate {
    prefix: Option<String>,
    template: String,
}

impl TilePathTemplate {
    /// Parse a template, optionally rooted under a key prefix.
    ///
    /// The template must mention `{z}`, `{x}` and one of `{y}` / `{-y}`.
    pub fn new(template: impl Into<String>, prefix: Option<&str>) -> Result<Self, ConfigError> {
        let template = template.into();

        for placeholder in ["{z}", "{x}"] {
            if !template.contains(placeholder) {
                return Err(ConfigError::Template(format!(
                    "{:?} is missing {}",
                    template, placeholder
                )));
            }
        }
        if !template.contains("{y}") && !template.contains("{-y}") {
            return Err(ConfigError::Template(format!(
                "{:?} is missing {{y}} or {{-y}}",
                template
            )));
        }

        let prefix = prefix
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Self {
            prefix,
            template: template.trim_start_matches('/').to_string(),
        })
    }

    /// The raw template string.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Object key for a tile.
    pub fn render(&self, key: &TileKey) -> String {
        let path = self
            .template
            .replace("{z}", &key.zoom.to_string())
            .replace("{x}", &key.x.to_string())
            .replace("{-y}", &key.flipped_y().to_string())
            .replace("{y}", &key.y.to_string());

        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, path),
            None => path,
        }
    }
}

impl Default for TilePathTemplate {
    fn default() -> Self {
        Self {
            prefix: None,
            template: DEFAULT_TILE_TEMPLATE.to_string(),
        }
    }
}
