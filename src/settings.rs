use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which voice flow the client drives.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    /// Temporary items dropped into the borrow cart.
    #[default]
    Voice,
    /// Location-aware batch creation.
    Inventory,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AppSettings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub selected_microphone: Option<String>,
    #[serde(default = "default_max_recording_secs")]
    pub max_recording_secs: u64,
    #[serde(default = "default_visualizer_bars")]
    pub visualizer_bars: usize,
    #[serde(default = "default_preferred_mime_types")]
    pub preferred_mime_types: Vec<String>,
    #[serde(default)]
    pub flow: FlowKind,
    #[serde(default = "default_temporary_only")]
    pub temporary_only: bool,
    #[serde(default = "default_debug_mode")]
    pub debug_mode: bool,
}

fn default_server_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_max_recording_secs() -> u64 {
    30
}

fn default_visualizer_bars() -> usize {
    12
}

fn default_preferred_mime_types() -> Vec<String> {
    vec![
        "audio/webm;codecs=opus".to_string(),
        "audio/webm".to_string(),
        "audio/mp4".to_string(),
        "audio/ogg;codecs=opus".to_string(),
    ]
}

fn default_temporary_only() -> bool {
    true
}

fn default_debug_mode() -> bool {
    false
}

pub const SETTINGS_FILE_NAME: &str = "inventory_voice_settings.json";

pub fn get_default_settings() -> AppSettings {
    AppSettings {
        server_url: default_server_url(),
        selected_microphone: None,
        max_recording_secs: default_max_recording_secs(),
        visualizer_bars: default_visualizer_bars(),
        preferred_mime_types: default_preferred_mime_types(),
        flow: FlowKind::default(),
        temporary_only: default_temporary_only(),
        debug_mode: default_debug_mode(),
    }
}

impl AppSettings {
    /// Base URL without trailing slash, ready for `format!("{}/api/...")`.
    pub fn base_url(&self) -> &str {
        self.server_url.trim().trim_end_matches('/')
    }

    fn normalize(&mut self) {
        if self
            .selected_microphone
            .as_deref()
            .is_some_and(|name| name.trim().is_empty() || name == "Default")
        {
            self.selected_microphone = None;
        }
        if self.max_recording_secs == 0 {
            self.max_recording_secs = default_max_recording_secs();
        }
        if self.visualizer_bars == 0 {
            self.visualizer_bars = default_visualizer_bars();
        }
    }
}

pub fn default_settings_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(SETTINGS_FILE_NAME)
}

/// Reads the settings file, falling back to (and persisting) defaults when it
/// is missing or cannot be parsed.
pub fn load_or_create_app_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<AppSettings>(&raw) {
            Ok(settings) => {
                info!("Found existing settings at {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Failed to parse settings {}: {}", path.display(), e);
                store_defaults(path)
            }
        },
        Err(_) => {
            info!("No settings at {}, creating defaults", path.display());
            store_defaults(path)
        }
    };

    settings.normalize();
    settings
}

fn store_defaults(path: &Path) -> AppSettings {
    let default_settings = get_default_settings();
    if let Err(e) = write_settings(path, &default_settings) {
        warn!("Failed to store default settings: {:#}", e);
    }
    default_settings
}

pub fn write_settings(path: &Path, settings: &AppSettings) -> Result<()> {
    let mut normalized = settings.clone();
    normalized.normalize();

    let json = serde_json::to_string_pretty(&normalized).context("Failed to serialize settings")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
