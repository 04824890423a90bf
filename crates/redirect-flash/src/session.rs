// File: src/session.rs
// Purpose: Request-scoped session handle with one-request flash data

use crate::config::FlashKeys;
use crate::message_bag::ViewErrorBag;
use crate::value::{get_path, InputMap, InputValue};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Session attributes plus the bookkeeping that ages flashed keys.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    attributes: IndexMap<String, serde_json::Value>,
    flash_new: Vec<String>,
    flash_old: Vec<String>,
}

/// Cloneable handle to the current request's session.
///
/// Middleware inserts it into the request extensions; `RequestContext`
/// picks it up from there. Storage of the data between requests is up to
/// whoever owns the handle.
#[derive(Debug, Clone, Default)]
pub struct Session {
    data: Arc<RwLock<SessionData>>,
    keys: Arc<FlashKeys>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: FlashKeys) -> Self {
        Self {
            data: Arc::default(),
            keys: Arc::new(keys),
        }
    }

    pub fn keys(&self) -> &FlashKeys {
        &self.keys
    }

    /// Copy of the current data, for whoever persists it.
    pub fn snapshot(&self) -> SessionData {
        self.data.read().clone()
    }

    /// True once no attribute is left, flashed or otherwise.
    pub fn is_empty(&self) -> bool {
        self.data.read().attributes.is_empty()
    }

    pub fn get_value(&self, key: &str) -> Option<serde_json::Value> {
        self.data.read().attributes.get(key).cloned()
    }

    /// Typed read. A value that does not deserialize as `T` reads as `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn put(&self, key: impl Into<String>, value: impl Serialize) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.data.write().attributes.insert(key.into(), value);
        Ok(())
    }

    pub fn has(&self, key: &str) -> bool {
        self.data
            .read()
            .attributes
            .get(key)
            .map(|value| !value.is_null())
            .unwrap_or(false)
    }

    pub fn forget(&self, key: &str) {
        self.data.write().attributes.shift_remove(key);
    }

    pub fn pull(&self, key: &str) -> Option<serde_json::Value> {
        self.data.write().attributes.shift_remove(key)
    }

    /// Store a value that survives exactly one more request.
    pub fn flash(&self, key: impl Into<String>, value: impl Serialize) -> Result<(), serde_json::Error> {
        let key = key.into();
        let value = serde_json::to_value(value)?;

        let mut data = self.data.write();
        data.attributes.insert(key.clone(), value);
        data.flash_old.retain(|k| k != &key);
        if !data.flash_new.contains(&key) {
            data.flash_new.push(key);
        }
        Ok(())
    }

    /// Store a value for the current request only.
    pub fn now(&self, key: impl Into<String>, value: impl Serialize) -> Result<(), serde_json::Error> {
        let key = key.into();
        let value = serde_json::to_value(value)?;

        let mut data = self.data.write();
        data.attributes.insert(key.clone(), value);
        if !data.flash_old.contains(&key) {
            data.flash_old.push(key);
        }
        Ok(())
    }

    /// Keep every flashed value for one more request.
    pub fn reflash(&self) {
        let mut data = self.data.write();
        let old = std::mem::take(&mut data.flash_old);
        for key in old {
            if !data.flash_new.contains(&key) {
                data.flash_new.push(key);
            }
        }
    }

    /// Keep the given flashed values for one more request.
    pub fn keep(&self, keys: &[&str]) {
        let mut data = self.data.write();
        data.flash_old.retain(|k| !keys.contains(&k.as_str()));
        for key in keys {
            if !data.flash_new.iter().any(|k| k == key) {
                data.flash_new.push((*key).to_string());
            }
        }
    }

    /// End-of-request step: drop last request's flash data and age this request's.
    pub fn age_flash_data(&self) {
        let mut data = self.data.write();
        let old = std::mem::take(&mut data.flash_old);
        for key in &old {
            data.attributes.shift_remove(key);
        }
        data.flash_old = std::mem::take(&mut data.flash_new);
    }

    pub fn flash_input(&self, input: &InputMap) -> Result<(), serde_json::Error> {
        self.flash(self.keys.old_input.clone(), input)
    }

    /// Flashed input from the previous request, by dot path. `None` returns the whole map.
    pub fn old_input(&self, key: Option<&str>) -> Option<InputValue> {
        let old = self.get_value(&self.keys.old_input)?;
        let InputValue::Map(map) = InputValue::from(old) else {
            return None;
        };

        match key {
            None => Some(InputValue::Map(map)),
            Some(key) => get_path(&map, key).cloned(),
        }
    }

    pub fn has_old_input(&self, key: Option<&str>) -> bool {
        match self.old_input(key) {
            Some(InputValue::Map(map)) if key.is_none() => !map.is_empty(),
            Some(InputValue::Null) | None => false,
            Some(_) => true,
        }
    }

    /// Flashed validation errors, empty when none were flashed.
    pub fn errors(&self) -> ViewErrorBag {
        self.get(&self.keys.errors).unwrap_or_default()
    }

    pub fn previous_url(&self) -> Option<String> {
        self.get(&self.keys.previous_url)
    }

    pub fn set_previous_url(&self, url: impl Into<String>) -> Result<(), serde_json::Error> {
        self.put(self.keys.previous_url.clone(), url.into())
    }
}
