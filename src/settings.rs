use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use crate::extract::{ClientConfig, DEFAULT_BASE_URL, ExtractionHints, RegionScheme};
use crate::pdf::{DEFAULT_CACHE_SIZE, DEFAULT_MIN_SELECTION, FitMode, ThemeMode, ViewerOptions};

pub const CURRENT_VERSION: u32 = 2;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "docufy-region";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// OCR language hint, e.g. `eng` or `deu+eng`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,

    #[serde(default)]
    pub region_scheme: RegionScheme,

    #[serde(default)]
    pub default_fit_mode: FitMode,

    #[serde(default)]
    pub theme_mode: ThemeMode,

    #[serde(default = "default_min_selection_px")]
    pub min_selection_px: f32,

    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,

    #[serde(default = "default_render_cache_size")]
    pub render_cache_size: usize,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_api_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_min_selection_px() -> f32 {
    DEFAULT_MIN_SELECTION
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

fn default_render_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            language: None,
            recipe: None,
            region_scheme: RegionScheme::default(),
            default_fit_mode: FitMode::default(),
            theme_mode: ThemeMode::default(),
            min_selection_px: default_min_selection_px(),
            device_pixel_ratio: default_device_pixel_ratio(),
            render_cache_size: default_render_cache_size(),
        }
    }
}

impl Settings {
    /// Options for the viewer, sanitized
    #[must_use]
    pub fn viewer_options(&self) -> ViewerOptions {
        let dpr = if self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0 {
            self.device_pixel_ratio
        } else {
            default_device_pixel_ratio()
        };
        ViewerOptions {
            default_fit_mode: self.default_fit_mode,
            theme_mode: self.theme_mode,
            device_pixel_ratio: dpr,
            min_selection_px: self.min_selection_px.max(0.0),
        }
    }

    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    #[must_use]
    pub fn extraction_hints(&self) -> ExtractionHints {
        ExtractionHints {
            language: self.language.clone(),
            recipe: self.recipe.clone(),
        }
    }
}

static SETTINGS: LazyLock<RwLock<Settings>> = LazyLock::new(|| RwLock::new(Settings::default()));

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

/// Replace the global settings with the contents of `path`.
///
/// Unreadable or malformed files are logged and leave the settings as they were.
pub fn load_settings_from_path(path: &Path) {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
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

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // v1 stored the timeout in milliseconds
    if settings.version < 2 && settings.request_timeout_secs >= 1000 {
        settings.request_timeout_secs /= 1000;
    }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings_to_file(settings: &Settings, path: &Path) {
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

fn yaml_string(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_TEMPLATE);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!(
        "api_base_url: {}\n",
        yaml_string(&settings.api_base_url)
    ));
    content.push_str(&format!(
        "request_timeout_secs: {}\n",
        settings.request_timeout_secs
    ));
    match &settings.language {
        Some(lang) => content.push_str(&format!("language: {}\n", yaml_string(lang))),
        None => content.push_str("# language: \"eng\"\n"),
    }
    match &settings.recipe {
        Some(recipe) => content.push_str(&format!("recipe: {}\n", yaml_string(recipe))),
        None => content.push_str("# recipe: \"invoice\"\n"),
    }
    content.push_str(&format!("region_scheme: {}\n", settings.region_scheme));
    let fit = match settings.default_fit_mode {
        FitMode::Page => "page",
        FitMode::Width => "width",
    };
    content.push_str(&format!("default_fit_mode: {fit}\n"));
    let theme = match settings.theme_mode {
        ThemeMode::Auto => "auto",
        ThemeMode::Light => "light",
        ThemeMode::Dark => "dark",
    };
    content.push_str(&format!("theme_mode: {theme}\n"));
    content.push_str(&format!(
        "min_selection_px: {:?}\n",
        settings.min_selection_px
    ));
    content.push_str(&format!(
        "device_pixel_ratio: {:?}\n",
        settings.device_pixel_ratio
    ));
    content.push_str(&format!(
        "render_cache_size: {}\n",
        settings.render_cache_size
    ));

    content
}

const SETTINGS_TEMPLATE: &str = r#"# ============================================================================
# docufy-region settings
# ============================================================================
# api_base_url         OCR service the regions are sent to
# region_scheme        points: x1,y1,x2,y2 in PDF points (unrotated page)
#                      fractional: x,y,w,h in 0..1 of the rotated view
# default_fit_mode     page | width
# theme_mode           auto | light | dark (auto refits on scheme changes)
# min_selection_px     drags smaller than this on both axes are ignored

"#;

// Public API for accessing/modifying settings

/// Copy of the current settings
pub fn current() -> Settings {
    SETTINGS.read().map(|s| s.clone()).unwrap_or_default()
}
