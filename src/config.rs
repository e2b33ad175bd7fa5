//! Engine configuration and the persisted credential store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::gemini::DEFAULT_BASE_URL;

// ── Generic JSON Config IO ─────────────────────────────

/// Generic load for any Serde config type with a `Default` implementation.
/// Falls back to `T::default()` if the file is missing or unparsable.
pub fn load_json_config<T: DeserializeOwned + Default>(path: &Path, label: &str) -> T {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<T>(&content) {
            Ok(config) => {
                info!("[{}] loaded config from {}", label, path.display());
                config
            }
            Err(e) => {
                warn!(
                    "[{}] failed to parse config {}: {} — using defaults",
                    label,
                    path.display(),
                    e
                );
                T::default()
            }
        },
        Err(_) => {
            info!(
                "[{}] no config file at {} — using defaults",
                label,
                path.display()
            );
            T::default()
        }
    }
}

/// Generic save for any Serde config type.
pub fn save_json_config<T: Serialize>(path: &Path, config: &T, label: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create config directory: {}", e))?;
    }
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| format!("failed to serialize config: {}", e))?;
    std::fs::write(path, json).map_err(|e| format!("failed to write config file: {}", e))?;
    info!("[{}] saved config to {}", label, path.display());
    Ok(())
}

/// Platform data directory for engine state (config, credentials, output).
pub fn data_dir() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("negar-engine")
}

// ── Engine Config ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Endpoint base URL. `None` means the public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_quoting_model")]
    pub quoting_model: String,
    #[serde(default = "default_engineering_model")]
    pub engineering_model: String,
    #[serde(default = "default_image_model")]
    pub grounding_model: String,
    #[serde(default = "default_image_model")]
    pub generation_model: String,
    /// Font file used for text plates. `None` searches common system paths.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    /// Where generated images are written. `None` means the data directory.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_quoting_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_engineering_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image-preview".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            quoting_model: default_quoting_model(),
            engineering_model: default_engineering_model(),
            grounding_model: default_image_model(),
            generation_model: default_image_model(),
            font_path: None,
            output_dir: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Self {
        load_json_config(path, "Engine")
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        save_json_config(path, self, "Engine")
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

// ── Credential Store ───────────────────────────────────

const CREDENTIAL_FILE: &str = "credentials.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    api_key: Option<String>,
}

/// The single persisted credential, stored under a fixed key in a JSON file
/// in the engine's data directory. Loaded once at startup, cleared when an
/// endpoint rejects it.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CREDENTIAL_FILE),
        }
    }

    /// The persisted credential, if any.
    pub fn load(&self) -> Option<String> {
        let file: CredentialFile = load_json_config(&self.path, "Credentials");
        file.api_key.filter(|key| !key.is_empty())
    }

    /// The effective credential: `GEMINI_API_KEY` overrides the stored one
    /// without being persisted.
    pub fn resolve(&self) -> Option<String> {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                return Some(key);
            }
        }
        self.load()
    }

    pub fn save(&self, api_key: &str) -> Result<(), String> {
        save_json_config(
            &self.path,
            &CredentialFile {
                api_key: Some(api_key.to_string()),
            },
            "Credentials",
        )
    }

    /// Forget the stored credential, e.g. after an endpoint rejected it.
    pub fn clear(&self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("failed to remove credential file: {}", e);
            } else {
                info!("stored credential cleared");
            }
        }
    }
}
