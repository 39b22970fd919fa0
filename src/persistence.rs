//! Persistence layer for controller state
//!
//! Keeps the last setpoint, the operator inputs and the session state in a
//! small JSON file so a restart resumes ramping from where it left off.

use crate::error::{HeliosError, Result};
use crate::logging::{StructuredLogger, get_logger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Persistent state structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentState {
    /// Last setpoint written to the charger
    #[serde(default)]
    pub last_setpoint_w: f64,

    /// Operator inputs (mode, deadline, targets)
    #[serde(default)]
    pub inputs: Value,

    /// Session manager state
    #[serde(default)]
    pub session: Value,

    /// Time of the last successful save
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,

    /// Keys written by other components
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            last_setpoint_w: 0.0,
            inputs: Value::Null,
            session: Value::Null,
            saved_at: None,
            extra: Map::new(),
        }
    }
}

/// Persistence manager
#[derive(Debug)]
pub struct PersistenceManager {
    file_path: PathBuf,
    state: PersistentState,
    logger: StructuredLogger,
}

impl PersistenceManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            state: PersistentState::default(),
            logger: get_logger("persistence"),
        }
    }

    pub fn state(&self) -> &PersistentState {
        &self.state
    }

    /// Load state from disk; a missing file leaves the defaults in place
    pub fn load(&mut self) -> Result<()> {
        if !self.file_path.exists() {
            self.logger
                .info("No persistent state file found, using defaults");
            return Ok(());
        }

        let contents = std::fs::read_to_string(&self.file_path)?;
        if contents.trim().is_empty() {
            return Ok(());
        }
        self.state = serde_json::from_str(&contents)?;
        self.logger.info(&format!(
            "Loaded persistent state from {}",
            self.file_path.display()
        ));
        Ok(())
    }

    /// Save state to disk via a temporary file and rename
    pub fn save(&mut self) -> Result<()> {
        self.state.saved_at = Some(Utc::now());
        let contents = serde_json::to_string_pretty(&self.state)?;

        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.file_path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.file_path)?;
        self.logger.debug("Saved persistent state to disk");
        Ok(())
    }

    fn as_object(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(&self.state)? {
            Value::Object(map) => Ok(map),
            _ => Err(HeliosError::serialization("state is not a JSON object")),
        }
    }

    fn replace_from(&mut self, map: Map<String, Value>) -> Result<()> {
        self.state = serde_json::from_value(Value::Object(map))?;
        Ok(())
    }

    /// Get a value from persistent state
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let map = self.as_object().ok()?;
        let value = map.get(key)?.clone();
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Set a value in persistent state
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let mut map = self.as_object()?;
        map.insert(key.to_string(), serde_json::to_value(value)?);
        self.replace_from(map)
    }

    /// Merge the top-level keys of `updates` into the state
    pub fn update(&mut self, updates: Value) -> Result<()> {
        let Value::Object(updates) = updates else {
            return Err(HeliosError::serialization("update must be a JSON object"));
        };
        let mut map = self.as_object()?;
        for (k, v) in updates {
            map.insert(k, v);
        }
        self.replace_from(map)
    }

    /// Get section from state
    pub fn get_section(&self, section: &str) -> Option<Value> {
        self.get::<Value>(section)
    }

    /// Set section in state
    pub fn set_section(&mut self, section: &str, data: Value) -> Result<()> {
        self.set(section, data)
    }

    pub fn set_last_setpoint(&mut self, watts: f64) {
        self.state.last_setpoint_w = watts;
    }
}
