use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};

use crate::layout::{FitPolicy, LayoutOptions, ScrollAxis};
use crate::render::DEFAULT_MAX_TILE_PIXELS;
use crate::tiles::{
    DEFAULT_CACHE_SIZE, DEFAULT_PART_SIZE, DEFAULT_PRELOAD_OFFSET_DP, DEFAULT_THUMBNAIL_CACHE_SIZE,
    DEFAULT_THUMBNAIL_RATIO, PlannerConfig,
};
use crate::viewer::{DEFAULT_MAX_ZOOM, DEFAULT_MID_ZOOM, DEFAULT_MIN_ZOOM, ViewerOptions};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "tileview";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Target tile edge in pixels
    #[serde(default = "default_part_size")]
    pub part_size: f32,

    /// Thumbnail size relative to the fitted page
    #[serde(default = "default_thumbnail_ratio")]
    pub thumbnail_ratio: f32,

    /// Preload margin around the viewport, in dp
    #[serde(default = "default_preload_offset")]
    pub preload_offset: f32,

    /// Pixels per dp
    #[serde(default = "default_density")]
    pub density: f32,

    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    #[serde(default = "default_thumbnail_cache_size")]
    pub thumbnail_cache_size: usize,

    /// Gap between pages, in dp
    #[serde(default)]
    pub spacing: f32,

    #[serde(default)]
    pub auto_spacing: bool,

    #[serde(default)]
    pub fit_policy: FitPolicy,

    #[serde(default)]
    pub scroll_axis: ScrollAxis,

    /// 32-bit tiles instead of 16-bit
    #[serde(default)]
    pub best_quality: bool,

    #[serde(default)]
    pub annotations: bool,

    #[serde(default)]
    pub default_page: usize,

    #[serde(default = "default_min_zoom")]
    pub min_zoom: f32,

    #[serde(default = "default_mid_zoom")]
    pub mid_zoom: f32,

    #[serde(default = "default_max_zoom")]
    pub max_zoom: f32,

    #[serde(default)]
    pub page_snap: bool,

    #[serde(default = "default_max_tile_pixels")]
    pub max_tile_pixels: u64,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_part_size() -> f32 {
    DEFAULT_PART_SIZE
}

fn default_thumbnail_ratio() -> f32 {
    DEFAULT_THUMBNAIL_RATIO
}

fn default_preload_offset() -> f32 {
    DEFAULT_PRELOAD_OFFSET_DP
}

fn default_density() -> f32 {
    1.0
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_thumbnail_cache_size() -> usize {
    DEFAULT_THUMBNAIL_CACHE_SIZE
}

fn default_min_zoom() -> f32 {
    DEFAULT_MIN_ZOOM
}

fn default_mid_zoom() -> f32 {
    DEFAULT_MID_ZOOM
}

fn default_max_zoom() -> f32 {
    DEFAULT_MAX_ZOOM
}

fn default_max_tile_pixels() -> u64 {
    DEFAULT_MAX_TILE_PIXELS
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            part_size: default_part_size(),
            thumbnail_ratio: default_thumbnail_ratio(),
            preload_offset: default_preload_offset(),
            density: default_density(),
            cache_size: default_cache_size(),
            thumbnail_cache_size: default_thumbnail_cache_size(),
            spacing: 0.0,
            auto_spacing: false,
            fit_policy: FitPolicy::default(),
            scroll_axis: ScrollAxis::default(),
            best_quality: false,
            annotations: false,
            default_page: 0,
            min_zoom: default_min_zoom(),
            mid_zoom: default_mid_zoom(),
            max_zoom: default_max_zoom(),
            page_snap: false,
            max_tile_pixels: default_max_tile_pixels(),
        }
    }
}

impl ViewerConfig {
    /// Convert dp values to pixels and assemble the viewer options
    #[must_use]
    pub fn viewer_options(&self) -> ViewerOptions {
        let density = if self.density > 0.0 { self.density } else { 1.0 };
        ViewerOptions {
            layout: LayoutOptions {
                fit_policy: self.fit_policy,
                axis: self.scroll_axis,
                spacing_px: self.spacing.max(0.0) * density,
                auto_spacing: self.auto_spacing,
            },
            planner: PlannerConfig {
                part_size: self.part_size,
                thumbnail_ratio: self.thumbnail_ratio,
                preload_px: self.preload_offset.max(0.0) * density,
                budget: self.cache_size,
                best_quality: self.best_quality,
                annotations: self.annotations,
            },
            cache_capacity: self.cache_size,
            thumbnail_capacity: self.thumbnail_cache_size,
            default_page: self.default_page,
            min_zoom: self.min_zoom,
            mid_zoom: self.mid_zoom,
            max_zoom: self.max_zoom,
            page_snap: self.page_snap,
            max_tile_pixels: self.max_tile_pixels,
        }
    }
}

static SETTINGS: LazyLock<RwLock<ViewerConfig>> =
    LazyLock::new(|| RwLock::new(ViewerConfig::default()));

fn preferred_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(APP_NAME).join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = preferred_config_path() else {
        warn!("Could not determine config directory, using default settings");
        return;
    };
    if path.exists() {
        load_settings_from_path(&path);
    } else {
        info!("Settings file not found, creating with defaults at {path:?}");
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
    }
}

pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<ViewerConfig>(&content) {
            Ok(mut settings) => {
                debug!("Loaded settings from {path:?}");

                if settings.version < CURRENT_VERSION {
                    migrate_settings(&mut settings);
                    save_settings_to_file(&settings, path);
                }

                if let Ok(mut global) = SETTINGS.write() {
                    *global = settings;
                }
            }
            Err(e) => {
                error!("Failed to parse settings file {path:?}: {e}");
            }
        },
        Err(e) => {
            error!("Failed to read settings file {path:?}: {e}");
        }
    }
}

fn migrate_settings(settings: &mut ViewerConfig) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );
    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &ViewerConfig, path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Failed to create config directory {parent:?}: {e}");
                return;
            }
        }
    }

    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {path:?}"),
        Err(e) => error!("Failed to save settings to {path:?}: {e}"),
    }
}

fn generate_settings_yaml(settings: &ViewerConfig) -> String {
    let mut content = String::new();

    content.push_str(&format!("version: {}\n", settings.version));
    content.push('\n');
    content.push_str("# Tiling\n");
    content.push_str(&format!("part_size: {}\n", settings.part_size));
    content.push_str(&format!("thumbnail_ratio: {}\n", settings.thumbnail_ratio));
    content.push_str(&format!("preload_offset: {}\n", settings.preload_offset));
    content.push_str(&format!("density: {}\n", settings.density));
    content.push_str(&format!("cache_size: {}\n", settings.cache_size));
    content.push_str(&format!(
        "thumbnail_cache_size: {}\n",
        settings.thumbnail_cache_size
    ));
    content.push_str(&format!("max_tile_pixels: {}\n", settings.max_tile_pixels));
    content.push_str(&format!("best_quality: {}\n", settings.best_quality));
    content.push_str(&format!("annotations: {}\n", settings.annotations));
    content.push('\n');
    content.push_str("# Layout\n");
    content.push_str(&format!("fit_policy: {}\n", settings.fit_policy.as_str()));
    let axis = match settings.scroll_axis {
        ScrollAxis::Vertical => "vertical",
        ScrollAxis::Horizontal => "horizontal",
    };
    content.push_str(&format!("scroll_axis: {axis}\n"));
    content.push_str(&format!("spacing: {}\n", settings.spacing));
    content.push_str(&format!("auto_spacing: {}\n", settings.auto_spacing));
    content.push_str(&format!("default_page: {}\n", settings.default_page));
    content.push_str(&format!("page_snap: {}\n", settings.page_snap));
    content.push('\n');
    content.push_str("# Zoom\n");
    content.push_str(&format!("min_zoom: {}\n", settings.min_zoom));
    content.push_str(&format!("mid_zoom: {}\n", settings.mid_zoom));
    content.push_str(&format!("max_zoom: {}\n", settings.max_zoom));

    content
}

// Public API for accessing/modifying settings

pub fn get_config() -> ViewerConfig {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}

pub fn get_viewer_options() -> ViewerOptions {
    get_config().viewer_options()
}
