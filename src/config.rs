//! Configuration loading and validation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::EngineSettings;
use crate::keymap::ModifierSet;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "KEYTAP_CONFIG";

/// Daemon configuration, read from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hotkeys owned by other applications; the tap never consumes them
    pub reserved_hotkeys: Vec<String>,

    /// Hotkey string to action name
    pub bindings: BTreeMap<String, String>,

    pub rebuild_debounce_ms: u64,
    pub toggle_debounce_ms: u64,
    pub main_thread_timeout_ms: u64,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let settings = EngineSettings::default();
        Self {
            reserved_hotkeys: Vec::new(),
            bindings: BTreeMap::new(),
            rebuild_debounce_ms: settings.rebuild_debounce.as_millis() as u64,
            toggle_debounce_ms: settings.toggle_debounce.as_millis() as u64,
            main_thread_timeout_ms: settings.main_thread_timeout.as_millis() as u64,
            log_level: None,
        }
    }
}

impl Config {
    /// Load from `$KEYTAP_CONFIG` or `~/.config/keytap/config.json`
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("keytap")
            .join("config.json"))
    }

    /// Load and validate `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (index, hotkey) in self.reserved_hotkeys.iter().enumerate() {
            validate_hotkey(hotkey, &format!("reserved_hotkeys[{index}]"))?;
        }
        for (hotkey, action) in &self.bindings {
            validate_hotkey(hotkey, "bindings")?;
            if hotkey.trim().is_empty() {
                bail!("bindings: empty hotkey bound to {action:?}");
            }
            if action.trim().is_empty() {
                bail!("bindings: hotkey {hotkey:?} has an empty action");
            }
        }
        if self.main_thread_timeout_ms == 0 {
            bail!("main_thread_timeout_ms must be greater than zero");
        }
        Ok(())
    }

    /// Every hotkey the tap must let through: reserved ones and our own
    /// bindings
    pub fn pass_through_hotkeys(&self) -> Vec<String> {
        self.reserved_hotkeys
            .iter()
            .chain(self.bindings.keys())
            .cloned()
            .collect()
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            rebuild_debounce: Duration::from_millis(self.rebuild_debounce_ms),
            toggle_debounce: Duration::from_millis(self.toggle_debounce_ms),
            main_thread_timeout: Duration::from_millis(self.main_thread_timeout_ms),
        }
    }
}

/// Check hotkey syntax without consulting the keyboard layout.
///
/// An empty string is allowed (meaning "unset"). Otherwise every token but
/// the last must be a modifier and the last must be non-empty.
pub fn validate_hotkey(text: &str, field: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    let tokens: Vec<&str> = text.split('+').map(str::trim).collect();
    let Some((key, modifiers)) = tokens.split_last() else {
        return Ok(());
    };

    for token in modifiers {
        if ModifierSet::from_token(token).is_none() {
            bail!(
                "{field}: invalid modifier {token:?} in hotkey {text:?} \
                 (expected Cmd, Command, Shift, Alt, Option, Ctrl or Control)"
            );
        }
    }
    if key.is_empty() {
        bail!("{field}: hotkey {text:?} is missing a key");
    }
    Ok(())
}
