//! Provider and model configuration rows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Row status shared by providers and models.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Active,
    Disabled,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordStatus::Active => write!(f, "active"),
            RecordStatus::Disabled => write!(f, "disabled"),
        }
    }
}

impl RecordStatus {
    /// Parse from string. Anything but "disabled" counts as active.
    pub fn from_string(s: &str) -> Self {
        match s {
            "disabled" => RecordStatus::Disabled,
            _ => RecordStatus::Active,
        }
    }
}

/// A named upstream AI service (a vendor account).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Unique provider name, e.g. "openai"
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub is_default: bool,
    /// Ordering priority (ascending)
    #[serde(default)]
    pub sort: i32,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, sort: i32) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            status: RecordStatus::Active,
            is_default: false,
            sort,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }
}

/// A specific model offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Model identifier, unique across the system
    pub model: String,
    /// Owning provider name
    pub provider_name: String,
    pub display_name: String,
    pub max_tokens: u32,
    /// Price per input unit
    #[serde(default)]
    pub input_price: f64,
    /// Price per output unit
    #[serde(default)]
    pub output_price: f64,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default)]
    pub is_default: bool,
    /// Ordering priority (ascending)
    #[serde(default)]
    pub sort: i32,
    /// Whether failed requests for other models may be redirected here
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,
}

fn default_allow_fallback() -> bool {
    true
}

impl ModelConfig {
    pub fn new(model: impl Into<String>, provider_name: impl Into<String>, sort: i32) -> Self {
        let model = model.into();
        Self {
            display_name: model.clone(),
            model,
            provider_name: provider_name.into(),
            max_tokens: 4096,
            input_price: 0.0,
            output_price: 0.0,
            status: RecordStatus::Active,
            is_default: false,
            sort,
            allow_fallback: true,
        }
    }

    /// Builder-style toggle used by seeders and tests.
    pub fn with_fallback(mut self, allow_fallback: bool) -> Self {
        self.allow_fallback = allow_fallback;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }
}
