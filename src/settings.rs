use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::flipbook::{
    DEFAULT_CACHE_SIZE, DEFAULT_GUTTER, DEFAULT_RESIZE_QUIET_MS, DEFAULT_WORKERS, PREFETCH_RADIUS,
    RenderOptions, Rgb, SessionConfig, DEFAULT_ASPECT,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "flipbook";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Document opened when none is given on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,

    #[serde(default = "default_container_width")]
    pub container_width: u32,

    #[serde(default = "default_gutter")]
    pub gutter: u32,

    #[serde(default = "default_one")]
    pub device_pixel_ratio: f32,

    /// Extra resolution on top of the device pixel ratio
    #[serde(default = "default_one")]
    pub render_scale: f32,

    #[serde(default)]
    pub paper_color: Rgb,

    #[serde(default = "default_resize_quiet_ms")]
    pub resize_quiet_ms: u64,

    #[serde(default = "default_prefetch_radius")]
    pub prefetch_radius: usize,

    #[serde(default = "default_render_workers")]
    pub render_workers: usize,

    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_container_width() -> u32 {
    1200
}

fn default_gutter() -> u32 {
    DEFAULT_GUTTER
}

fn default_one() -> f32 {
    1.0
}

fn default_resize_quiet_ms() -> u64 {
    DEFAULT_RESIZE_QUIET_MS
}

fn default_prefetch_radius() -> usize {
    PREFETCH_RADIUS
}

fn default_render_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_output_dir() -> String {
    "spreads".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            document: None,
            container_width: default_container_width(),
            gutter: default_gutter(),
            device_pixel_ratio: default_one(),
            render_scale: default_one(),
            paper_color: Rgb::PAPER,
            resize_quiet_ms: default_resize_quiet_ms(),
            prefetch_radius: default_prefetch_radius(),
            render_workers: default_render_workers(),
            cache_size: default_cache_size(),
            output_dir: default_output_dir(),
        }
    }
}

impl Settings {
    /// Session tunables derived from these settings
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            gutter: self.gutter,
            fallback_aspect: DEFAULT_ASPECT,
            resize_quiet: Duration::from_millis(self.resize_quiet_ms),
            prefetch_radius: self.prefetch_radius,
            render: RenderOptions {
                device_pixel_ratio: self.device_pixel_ratio,
                scale_multiplier: self.render_scale,
                paper: self.paper_color,
                workers: self.render_workers,
                // Never smaller than a neighborhood.
                capacity: self.cache_size.max(2 * self.prefetch_radius + 1),
            },
        }
    }
}

pub fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

/// Load settings from the user's config directory, creating the file with
/// defaults on first run
#[must_use]
pub fn load_settings() -> Settings {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return Settings::default();
    };

    if path.exists() {
        return load_settings_from_path(&path).unwrap_or_else(|e| {
            error!("Failed to load settings from {path:?}: {e:#}");
            Settings::default()
        });
    }

    info!("Settings file not found, creating with defaults at {path:?}");
    let settings = Settings::default();
    if let Err(e) = save_settings_to_file(&settings, &path) {
        error!("Failed to save settings to {path:?}: {e:#}");
    }
    settings
}

pub fn load_settings_from_path(path: &Path) -> anyhow::Result<Settings> {
    let content = fs::read_to_string(path)?;
    let mut settings: Settings = serde_yaml::from_str(&content)?;
    debug!("Loaded settings from {path:?}");

    if settings.version < CURRENT_VERSION {
        migrate_settings(&mut settings);
        save_settings_to_file(&settings, path)?;
    }

    Ok(settings)
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, generate_settings_yaml(settings)?)?;
    debug!("Saved settings to {path:?}");
    Ok(())
}

fn generate_settings_yaml(settings: &Settings) -> anyhow::Result<String> {
    let mut content = String::from(SETTINGS_HEADER);
    content.push_str(&serde_yaml::to_string(settings)?);
    Ok(content)
}

const SETTINGS_HEADER: &str = r#"# ============================================================================
# flipbook settings
# ============================================================================
# container_width     width the two-page spread must fit, in pixels
# gutter              seam between the two pages, in pixels
# device_pixel_ratio  physical pixels per layout pixel (2 for HiDPI output)
# render_scale        extra resolution multiplier
# paper_color         background painted under every page (#rrggbb)
# resize_quiet_ms     quiet period before a resize triggers a reflow
# prefetch_radius     pages rendered on each side of the current one
# render_workers      render threads
# cache_size          rendered pages kept for the current layout

"#;
