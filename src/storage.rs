//! Settings persistence
//!
//! Indicators and patterns save their declared parameters into a
//! [`SettingsStorage`], a string-keyed tree of [`SettingValue`]s. Composites
//! store each child as a nested, self-describing storage (a type tag plus the
//! child's own settings) so the stored form can rebuild the exact child type.
//!
//! # Example
//!
//! ```rust
//! use candleflow::prelude::*;
//!
//! let sma = SimpleMovingAverage::new(20);
//! let mut storage = SettingsStorage::new();
//! sma.save(&mut storage);
//!
//! let mut restored = SimpleMovingAverage::default();
//! restored.load(&storage).unwrap();
//! assert_eq!(restored.length(), 20);
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Error, PriceSource, Result, MAX_LENGTH};

/// Key holding the type tag of a self-describing unit
pub const TYPE_KEY: &str = "Type";
/// Key holding the settings of a self-describing unit
pub const SETTINGS_KEY: &str = "Settings";

// ============================================================
// SETTING VALUES
// ============================================================

/// A single stored setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    List(Vec<SettingsStorage>),
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

/// Saturates at `i64::MAX`, which is far beyond [`MAX_LENGTH`], so a
/// saturated length still fails [`SettingsStorage::get_length`].
impl From<usize> for SettingValue {
    fn from(value: usize) -> Self {
        SettingValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<Decimal> for SettingValue {
    fn from(value: Decimal) -> Self {
        SettingValue::Decimal(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

impl From<PriceSource> for SettingValue {
    fn from(value: PriceSource) -> Self {
        SettingValue::Text(value.as_str().to_string())
    }
}

impl From<Vec<SettingsStorage>> for SettingValue {
    fn from(value: Vec<SettingsStorage>) -> Self {
        SettingValue::List(value)
    }
}

// ============================================================
// SETTINGS STORAGE
// ============================================================

/// Generic key-value settings tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsStorage {
    values: BTreeMap<String, SettingValue>,
}

impl SettingsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chaining insert
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<SettingValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, key: &str) -> Result<&SettingValue> {
        self.values
            .get(key)
            .ok_or_else(|| Error::MissingSetting(key.to_string()))
    }

    fn mismatch(key: &str, expected: &'static str) -> Error {
        Error::SettingType {
            key: key.to_string(),
            expected,
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.require(key)? {
            SettingValue::Bool(v) => Ok(*v),
            _ => Err(Self::mismatch(key, "bool")),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        match self.require(key)? {
            SettingValue::Int(v) => Ok(*v),
            _ => Err(Self::mismatch(key, "integer")),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<usize> {
        usize::try_from(self.get_int(key)?)
            .map_err(|_| Self::mismatch(key, "non-negative integer"))
    }

    /// Window length no longer than [`MAX_LENGTH`]. Zero is left to
    /// `validate`.
    pub fn get_length(&self, key: &'static str) -> Result<usize> {
        let value = self.get_usize(key)?;
        if value > MAX_LENGTH {
            return Err(Error::InvalidLength {
                field: key,
                value,
                max: MAX_LENGTH,
            });
        }
        Ok(value)
    }

    pub fn get_decimal(&self, key: &str) -> Result<Decimal> {
        match self.require(key)? {
            SettingValue::Decimal(v) => Ok(*v),
            SettingValue::Int(v) => Ok(Decimal::from(*v)),
            _ => Err(Self::mismatch(key, "decimal")),
        }
    }

    pub fn get_text(&self, key: &str) -> Result<&str> {
        match self.require(key)? {
            SettingValue::Text(v) => Ok(v),
            _ => Err(Self::mismatch(key, "text")),
        }
    }

    pub fn get_list(&self, key: &str) -> Result<&[SettingsStorage]> {
        match self.require(key)? {
            SettingValue::List(v) => Ok(v),
            _ => Err(Self::mismatch(key, "list")),
        }
    }

    pub fn get_source(&self, key: &str) -> Result<PriceSource> {
        let name = self.get_text(key)?;
        PriceSource::parse(name).ok_or_else(|| Self::mismatch(key, "price source"))
    }

    /// Self-describing unit: a type tag plus the unit's own settings.
    pub fn tagged(kind: &str, settings: SettingsStorage) -> Self {
        Self::new()
            .with(TYPE_KEY, kind)
            .with(SETTINGS_KEY, vec![settings])
    }

    /// Splits a self-describing unit into its tag and settings.
    pub fn untag(&self) -> Result<(&str, &SettingsStorage)> {
        let kind = self.get_text(TYPE_KEY)?;
        let settings = self
            .get_list(SETTINGS_KEY)?
            .first()
            .ok_or_else(|| Error::MissingSetting(SETTINGS_KEY.to_string()))?;
        Ok((kind, settings))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

// ============================================================
// PERSISTABLE
// ============================================================

/// Round-trips declared parameters through a [`SettingsStorage`]
pub trait Persistable {
    fn save(&self, storage: &mut SettingsStorage);

    /// Restores parameters. On error nothing is changed.
    fn load(&mut self, storage: &SettingsStorage) -> Result<()>;
}

// ============================================================
// TESTS
// ============================================================
