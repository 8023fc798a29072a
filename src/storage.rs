use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Key holding the theme choice
pub const THEME_KEY: &str = "themeColor";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Small string key/value store persisted as a JSON object
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
    values: Map<String, Value>,
}

impl PreferenceStore {
    /// Open the store at `path`; a missing or unreadable file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(values) => values,
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "Ignoring corrupt preferences file"
                    );
                    Map::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self { path, values })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Store a value and write the file immediately
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values
            .insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

/// Colour scheme choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    /// `"light_mode"` means light; anything else, or nothing, means dark
    pub fn from_preference(value: Option<&str>) -> Self {
        match value {
            Some("light_mode") => Theme::Light,
            _ => Theme::Dark,
        }
    }

    pub fn preference_value(self) -> &'static str {
        match self {
            Theme::Light => "light_mode",
            Theme::Dark => "dark_mode",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Name of the theme the toggle would switch to
    pub fn toggle_label(self) -> &'static str {
        self.toggled().preference_value()
    }

    pub fn load(store: &PreferenceStore) -> Self {
        Self::from_preference(store.get(THEME_KEY))
    }

    /// Persist the opposite of the stored theme and return it
    pub fn toggle(store: &mut PreferenceStore) -> Result<Self, StorageError> {
        let next = Self::load(store).toggled();
        store.set(THEME_KEY, next.preference_value())?;
        info!(theme = next.preference_value(), "Theme toggled");
        Ok(next)
    }
}
