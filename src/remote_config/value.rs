//! Remote Config values

use serde::{Deserialize, Serialize};

/// Strings that `as_boolean` treats as true (compared case-insensitively)
const TRUTHY_VALUES: [&str; 6] = ["1", "true", "t", "yes", "y", "on"];

/// Where a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    /// Activated value from the backend
    Remote,
    /// In-app default set with `set_defaults`
    Default,
    /// No value for the key; typed accessors fall back to zero values
    Static,
}

impl ValueSource {
    /// Wire name (`remote`, `default`, `static`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueSource::Remote => "remote",
            ValueSource::Default => "default",
            ValueSource::Static => "static",
        }
    }
}

/// A single Remote Config entry
///
/// Holds the raw string value and its provenance. Typed accessors follow the
/// source-dependent rules: a `Static` value is always `false` / `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValue {
    value: String,
    source: ValueSource,
}

impl ConfigValue {
    /// Create a value with the given source
    pub fn new(value: impl Into<String>, source: ValueSource) -> Self {
        Self {
            value: value.into(),
            source,
        }
    }

    /// The value returned for keys that exist nowhere
    pub fn static_value() -> Self {
        Self::new("", ValueSource::Static)
    }

    /// `true` for `1`, `true`, `t`, `yes`, `y`, `on` (any case), unless the source is static
    pub fn as_boolean(&self) -> bool {
        if self.source == ValueSource::Static {
            return false;
        }
        let value = self.value.to_lowercase();
        TRUTHY_VALUES.contains(&value.as_str())
    }

    /// Numeric value, `0.0` for non-numeric strings and static values
    pub fn as_number(&self) -> f64 {
        if self.source == ValueSource::Static {
            return 0.0;
        }
        match self.value.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => n,
            _ => 0.0,
        }
    }

    /// Raw string value
    pub fn as_string(&self) -> &str {
        &self.value
    }

    /// Value provenance
    pub fn source(&self) -> ValueSource {
        self.source
    }
}
