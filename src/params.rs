//! Host-application settings with a save-on-mutate persistence contract.
//!
//! The flag client never reads or writes these; they belong to the host and
//! are persisted through whatever [`ParamsStore`] the host supplies.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use tracing::{event, Level};

/// User-facing settings record. Created with defaults at startup, mutated by
/// the UI through [`Params`], persisted on every mutation.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserParams {
    /// Visitor code override chosen by the user, if any.
    pub visitor_code: Option<String>,
    /// Whether the user consented to experiment tracking.
    pub consent: bool,
    /// Environment tier the app runs against.
    pub tier: String,
    pub custom: HashMap<String, String>,
}

impl Default for UserParams {
    fn default() -> Self {
        Self {
            visitor_code: None,
            consent: false,
            tier: "production".to_string(),
            custom: HashMap::new(),
        }
    }
}

/// Durable storage for [`UserParams`]. Implementations decide the medium
/// (file, key-value store, etc).
pub trait ParamsStore: Send + Sync {
    /// Returns the stored record, or `None` when nothing was saved yet.
    fn load(&self) -> Result<Option<UserParams>>;
    fn save(&self, params: &UserParams) -> Result<()>;
}

/// [`ParamsStore`] backed by a pretty-printed JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ParamsStore for JsonFileStore {
    fn load(&self) -> Result<Option<UserParams>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, params: &UserParams) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(params)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Owns the current [`UserParams`] and writes through the store on every
/// mutation. A failed save is logged at error level and never panics, the
/// in-memory value stays authoritative.
pub struct Params {
    current: UserParams,
    store: Arc<dyn ParamsStore>,
}

impl Params {
    /// Loads the stored record, falling back to defaults when nothing was
    /// saved yet or the store fails to read.
    pub fn new(store: Arc<dyn ParamsStore>) -> Self {
        let current = match store.load() {
            Ok(Some(params)) => params,
            Ok(None) => UserParams::default(),
            Err(err) => {
                event!(Level::ERROR, "failed to load user params: {:#}", err);
                UserParams::default()
            }
        };
        Self { current, store }
    }

    pub fn get(&self) -> &UserParams {
        &self.current
    }

    pub fn set_visitor_code(&mut self, visitor_code: Option<String>) {
        self.current.visitor_code = visitor_code;
        self.persist();
    }

    pub fn set_consent(&mut self, consent: bool) {
        self.current.consent = consent;
        self.persist();
    }

    pub fn set_tier(&mut self, tier: impl Into<String>) {
        self.current.tier = tier.into();
        self.persist();
    }

    pub fn set_custom(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.custom.insert(key.into(), value.into());
        self.persist();
    }

    /// Applies an arbitrary mutation and persists the result once.
    pub fn update(&mut self, f: impl FnOnce(&mut UserParams)) {
        f(&mut self.current);
        self.persist();
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.current) {
            event!(Level::ERROR, "failed to save user params: {:#}", err);
        }
    }
}
