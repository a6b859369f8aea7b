use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::fonts::{FontFamily, FontWeight};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Catalog lookup endpoint
    #[serde(default = "default_lookup_endpoint")]
    pub lookup_endpoint: String,

    /// Storefront passed along with lookups
    #[serde(default)]
    pub lookup_country: Option<String>,

    /// Height/width of the screen the "device" aspect profile targets
    #[serde(default = "default_device_screen_ratio")]
    pub device_screen_ratio: f64,

    #[serde(default)]
    pub fonts: FontSettings,

    /// Where rendered cards are kept; defaults to the platform data dir
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSettings {
    #[serde(default)]
    pub sans_bold: Option<PathBuf>,
    #[serde(default)]
    pub sans_regular: Option<PathBuf>,
    #[serde(default)]
    pub sans_light: Option<PathBuf>,
    #[serde(default)]
    pub mono_bold: Option<PathBuf>,
    #[serde(default)]
    pub mono_regular: Option<PathBuf>,
    #[serde(default)]
    pub mono_light: Option<PathBuf>,

    /// Extra directories searched before the system font directories
    #[serde(default)]
    pub dirs: Vec<PathBuf>,

    #[serde(default = "default_true")]
    pub discover_system: bool,
}

fn default_lookup_endpoint() -> String {
    "https://itunes.apple.com/lookup".to_string()
}

fn default_device_screen_ratio() -> f64 {
    19.5 / 9.0
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lookup_endpoint: default_lookup_endpoint(),
            lookup_country: None,
            device_screen_ratio: default_device_screen_ratio(),
            fonts: FontSettings::default(),
            history_dir: None,
        }
    }
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            sans_bold: None,
            sans_regular: None,
            sans_light: None,
            mono_bold: None,
            mono_regular: None,
            mono_light: None,
            dirs: Vec::new(),
            discover_system: true,
        }
    }
}

impl FontSettings {
    pub fn path_for(&self, family: FontFamily, weight: FontWeight) -> Option<&Path> {
        let path = match (family, weight) {
            (FontFamily::Proportional, FontWeight::Bold) => &self.sans_bold,
            (FontFamily::Proportional, FontWeight::Regular) => &self.sans_regular,
            (FontFamily::Proportional, FontWeight::Light) => &self.sans_light,
            (FontFamily::Monospaced, FontWeight::Bold) => &self.mono_bold,
            (FontFamily::Monospaced, FontWeight::Regular) => &self.mono_regular,
            (FontFamily::Monospaced, FontWeight::Light) => &self.mono_light,
        };
        path.as_deref()
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "release-card")
}

impl Settings {
    /// Loads from `path`, or from the platform config directory when `None`.
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match project_dirs() {
                Some(dirs) => dirs.config_dir().join(SETTINGS_FILE),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(settings)
    }

    pub fn history_dir(&self) -> PathBuf {
        if let Some(dir) = &self.history_dir {
            return dir.clone();
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join("history"))
            .unwrap_or_else(|| PathBuf::from("history"))
    }
}
