//! Settings snapshots for Ripple
//!
//! Rule parameters live in a single JSON settings tree keyed by section
//! name. The tree is loaded once at startup and exposed to the engine as an
//! immutable [`Settings`] snapshot; a [`SettingsProvider`] hands out the
//! current snapshot so that one transition invocation always sees one
//! consistent view, even while an operator hot-reloads the tree.
//!
//! Malformed configuration is fatal at startup: a rule must never run
//! against settings it cannot interpret.

#![deny(unsafe_code)]

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors. All of these abort initialization.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file unreadable: {0}")]
    Unreadable(String),

    #[error("settings are not valid JSON: {0}")]
    Malformed(String),

    #[error("settings root must be a JSON object")]
    NotAnObject,

    #[error("section '{section}' is invalid: {reason}")]
    InvalidSection { section: String, reason: String },

    #[error("transition '{transition}' is misconfigured: {reason}")]
    Transition { transition: String, reason: String },
}

// ── Settings Snapshot ────────────────────────────────────────────────

/// Immutable view of the settings tree.
///
/// Cheap to share: the provider hands out `Arc<Settings>` and swaps the
/// whole snapshot on reload.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    sections: BTreeMap<String, Value>,
}

impl Settings {
    /// Build a snapshot from a parsed JSON tree. The root must be an object.
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                sections: map.into_iter().collect(),
            }),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    /// Load and parse a settings file.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(format!("{}: {e}", path.display())))?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Raw section lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    /// Typed section lookup. `Ok(None)` when the section is absent;
    /// a present-but-undeserializable section is an error, not `None`.
    pub fn section<T: DeserializeOwned>(&self, name: &str) -> ConfigResult<Option<T>> {
        match self.sections.get(name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ConfigError::InvalidSection {
                    section: name.to_string(),
                    reason: e.to_string(),
                }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

// ── Provider ─────────────────────────────────────────────────────────

/// Hands out the current settings snapshot and accepts replacements.
pub struct SettingsProvider {
    current: RwLock<Arc<Settings>>,
}

impl SettingsProvider {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// The current snapshot. Callers hold the `Arc` for the duration of
    /// one logical run so mid-run reloads cannot tear their view.
    pub fn current(&self) -> Arc<Settings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a reloaded tree. In-flight runs keep their old snapshot.
    pub fn replace(&self, settings: Settings) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(settings);
        tracing::info!("settings snapshot replaced");
    }
}

impl Default for SettingsProvider {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct DeathConfig {
        mark_deceased_forms: Vec<String>,
        #[serde(default)]
        undo_deceased_forms: Vec<String>,
    }

    #[test]
    fn test_typed_section() {
        let settings = Settings::from_value(json!({
            "death_reporting": {
                "mark_deceased_forms": ["deceased"],
                "undo_deceased_forms": ["alive"]
            }
        }))
        .unwrap();

        let config: DeathConfig = settings.section("death_reporting").unwrap().unwrap();
        assert_eq!(config.mark_deceased_forms, vec!["deceased"]);
        assert_eq!(config.undo_deceased_forms, vec!["alive"]);
    }

    #[test]
    fn test_absent_section_is_none() {
        let settings = Settings::from_value(json!({})).unwrap();
        let config: Option<DeathConfig> = settings.section("death_reporting").unwrap();
        assert!(config.is_none());
    }

    #[test]
    fn test_invalid_section_is_error() {
        // mark_deceased_forms must be a list, not a string
        let settings = Settings::from_value(json!({
            "death_reporting": { "mark_deceased_forms": "deceased" }
        }))
        .unwrap();

        let result: ConfigResult<Option<DeathConfig>> = settings.section("death_reporting");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidSection { .. })
        ));
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(
            Settings::from_value(json!([1, 2])),
            Err(ConfigError::NotAnObject)
        ));
    }

    #[test]
    fn test_provider_snapshot_isolation() {
        let provider = SettingsProvider::new(
            Settings::from_value(json!({ "a": 1 })).unwrap(),
        );
        let before = provider.current();

        provider.replace(Settings::from_value(json!({ "a": 2 })).unwrap());

        // The held snapshot is unaffected by the reload
        assert_eq!(before.get("a"), Some(&json!(1)));
        assert_eq!(provider.current().get("a"), Some(&json!(2)));
    }
}
