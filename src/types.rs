//! Shared types used across the crate.
//! Includes property `Value`s, well-known property names and the
//! `SpectralIndex` catalogue the index adapter can request.
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Temporal merge key carried by annual products.
pub const YEAR: &str = "year";
/// Canonical start-time marker of an image.
pub const TIME_START: &str = "system:time_start";
/// Engine-assigned element identifier, used only for diagnostics.
pub const SYSTEM_INDEX: &str = "system:index";

/// Scalar image property value.
///
/// Integers and floats compare numerically with each other, so a key read as
/// `2020` matches an auxiliary image tagged `2020.0`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Time(DateTime<Utc>),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Time(_) | Value::Text(_) => None,
        }
    }

    /// Equality as used by property filters.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Time(v)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Text(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpectralIndex {
    Ndvi,
    Evi,
    Savi,
    Ndwi,
    Mndwi,
    Nbr,
}

impl SpectralIndex {
    /// Output band name written by the index library.
    pub fn band_name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Evi => "EVI",
            SpectralIndex::Savi => "SAVI",
            SpectralIndex::Ndwi => "NDWI",
            SpectralIndex::Mndwi => "MNDWI",
            SpectralIndex::Nbr => "NBR",
        }
    }
}

impl std::fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.band_name())
    }
}
