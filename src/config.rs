//! Application configuration
//!
//! Stored as camelCase JSON at `<config dir>/quicksnap/config.json`. Missing
//! files and missing fields fall back to defaults.

use crate::orchestrator::{CaptureMode, CaptureOptions};
use crate::storage::{default_fallback_root, CollisionPolicy, SinkOptions, TimestampStyle};
use crate::utils::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tempfile::NamedTempFile;

const APP_DIR: &str = "quicksnap";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub capture: CaptureSettings,
    pub storage: StorageSettings,
    pub hotkey: HotkeyBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureSettings {
    pub mode: CaptureMode,
    pub probe_timeout_ms: u64,
    pub capture_timeout_ms: u64,
    pub save_timeout_ms: u64,
    /// How long a granted permission snapshot is trusted
    pub permission_max_age_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            mode: CaptureMode::Primary,
            probe_timeout_ms: 5_000,
            capture_timeout_ms: 10_000,
            save_timeout_ms: 10_000,
            permission_max_age_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageSettings {
    pub prefix: String,
    pub preferred_dir: Option<PathBuf>,
    /// Overrides the platform downloads directory
    pub fallback_dir: Option<PathBuf>,
    pub fallback_subdir: String,
    pub timestamp_style: TimestampStyle,
    pub collision_policy: CollisionPolicy,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            prefix: "screenshot".to_string(),
            preferred_dir: None,
            fallback_dir: None,
            fallback_subdir: "Screenshots".to_string(),
            timestamp_style: TimestampStyle::DateTime,
            collision_policy: CollisionPolicy::Suffix,
        }
    }
}

impl AppConfig {
    /// `<config dir>/quicksnap/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::warn!("No config directory on this platform; using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}; using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate()?;

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        self.validate()?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        // Stage next to the target so the rename stays on one filesystem
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(path).map_err(|e| AppError::Io(e.error))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        let prefix = &self.storage.prefix;
        if prefix.is_empty() {
            return Err(AppError::Config("storage.prefix must not be empty".to_string()));
        }
        if prefix.contains(['/', '\\']) {
            return Err(AppError::Config(format!(
                "storage.prefix must not contain path separators: {:?}",
                prefix
            )));
        }

        let capture = &self.capture;
        for (name, value) in [
            ("probeTimeoutMs", capture.probe_timeout_ms),
            ("captureTimeoutMs", capture.capture_timeout_ms),
            ("saveTimeoutMs", capture.save_timeout_ms),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("capture.{} must be positive", name)));
            }
        }
        Ok(())
    }

    pub fn sink_options(&self) -> SinkOptions {
        let storage = &self.storage;
        SinkOptions {
            prefix: storage.prefix.clone(),
            preferred_dir: storage.preferred_dir.clone(),
            fallback_root: storage.fallback_dir.clone().or_else(default_fallback_root),
            fallback_subdir: storage.fallback_subdir.clone(),
            timestamp_style: storage.timestamp_style,
            collision_policy: storage.collision_policy,
        }
    }

    pub fn capture_options(&self) -> CaptureOptions {
        let capture = &self.capture;
        CaptureOptions {
            mode: capture.mode,
            preferred_dir: self.storage.preferred_dir.clone(),
            probe_timeout: Duration::from_millis(capture.probe_timeout_ms),
            capture_timeout: Duration::from_millis(capture.capture_timeout_ms),
            save_timeout: Duration::from_millis(capture.save_timeout_ms),
            permission_max_age: Duration::from_millis(capture.permission_max_age_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Modifier {
    Cmd,
    Ctrl,
    Alt,
    Shift,
}

impl Modifier {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "cmd" | "command" | "super" => Some(Modifier::Cmd),
            "ctrl" | "control" => Some(Modifier::Ctrl),
            "alt" | "option" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Modifier::Cmd => "Cmd",
            Modifier::Ctrl => "Ctrl",
            Modifier::Alt => "Alt",
            Modifier::Shift => "Shift",
        }
    }
}

/// Global shortcut accelerator such as `Cmd+Shift+6`.
///
/// Registration happens outside this crate; this type only validates and
/// normalizes the stored binding. Modifiers print in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HotkeyBinding {
    modifiers: Vec<Modifier>,
    key: String,
}

impl HotkeyBinding {
    pub fn modifiers(&self) -> &[Modifier] {
        &self.modifiers
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Default for HotkeyBinding {
    fn default() -> Self {
        Self {
            modifiers: vec![Modifier::Cmd, Modifier::Shift],
            key: "6".to_string(),
        }
    }
}

impl FromStr for HotkeyBinding {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| AppError::Config(format!("invalid hotkey {:?}: {}", s, why));

        let mut modifiers = Vec::new();
        let mut key: Option<String> = None;

        for token in s.split('+').map(str::trim) {
            if token.is_empty() {
                return Err(invalid("empty segment"));
            }
            if let Some(modifier) = Modifier::parse(token) {
                if modifiers.contains(&modifier) {
                    return Err(invalid("repeated modifier"));
                }
                modifiers.push(modifier);
            } else if key.is_some() {
                return Err(invalid("more than one key"));
            } else if token.chars().any(char::is_whitespace) {
                return Err(invalid("key contains whitespace"));
            } else if token.chars().count() == 1 {
                key = Some(token.to_uppercase());
            } else {
                key = Some(token.to_string());
            }
        }

        let key = key.ok_or_else(|| invalid("missing key"))?;
        if modifiers.is_empty() {
            return Err(invalid("at least one modifier is required"));
        }
        modifiers.sort();

        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            write!(f, "{}+", modifier.as_str())?;
        }
        f.write_str(&self.key)
    }
}

impl TryFrom<String> for HotkeyBinding {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HotkeyBinding> for String {
    fn from(binding: HotkeyBinding) -> Self {
        binding.to_string()
    }
}
