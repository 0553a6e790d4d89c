//! Configuration module for the mockup service

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::engine::RenderLimits;
use crate::store::DEFAULT_PLACEHOLDER_CANDIDATES;

/// Main application settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub templates: TemplateSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Template storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSettings {
    pub path: PathBuf,
    /// Seed procedural room scenes when a category has none
    #[serde(default = "default_seed_builtin")]
    pub seed_builtin: bool,
}

fn default_seed_builtin() -> bool {
    true
}

/// Rendering limits and defaults
#[derive(Debug, Clone, Deserialize)]
pub struct RenderSettings {
    /// Longest background side before the output is downscaled
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    /// Longest side of a downscaled output
    #[serde(default = "default_downscale_target")]
    pub downscale_target: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Concurrent composites inside a batch (each holds a full raster)
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    /// Placeholder layer names tried, in order, for layered templates
    #[serde(default = "default_placeholder_layers")]
    pub placeholder_layers: Vec<String>,
}

fn default_max_dimension() -> u32 {
    2400
}

fn default_downscale_target() -> u32 {
    1920
}

fn default_jpeg_quality() -> u8 {
    92
}

fn default_batch_concurrency() -> usize {
    4
}

fn default_placeholder_layers() -> Vec<String> {
    DEFAULT_PLACEHOLDER_CANDIDATES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            max_dimension: default_max_dimension(),
            downscale_target: default_downscale_target(),
            jpeg_quality: default_jpeg_quality(),
            batch_concurrency: default_batch_concurrency(),
            placeholder_layers: default_placeholder_layers(),
        }
    }
}

impl From<&RenderSettings> for RenderLimits {
    fn from(settings: &RenderSettings) -> Self {
        RenderLimits {
            max_dimension: settings.max_dimension,
            downscale_target: settings.downscale_target,
            jpeg_quality: settings.jpeg_quality,
        }
    }
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with ROOMSHOT_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local overrides (gitignored)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables (ROOMSHOT_SERVER__PORT, etc.)
            .add_source(
                Environment::with_prefix("ROOMSHOT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                workers: None,
            },
            templates: TemplateSettings {
                path: PathBuf::from("assets/templates"),
                seed_builtin: true,
            },
            render: RenderSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_defaults_match_memory_heuristic() {
        let settings = RenderSettings::default();
        assert_eq!(settings.max_dimension, 2400);
        assert_eq!(settings.downscale_target, 1920);
        assert_eq!(settings.placeholder_layers[0], "Your Design Here");
    }
}
