//! Remote Config settings and the reconciled local view

use crate::remote_config::value::ConfigValue;
use std::collections::HashMap;

/// Default fetch timeout: one minute
pub const DEFAULT_FETCH_TIMEOUT_MILLIS: u64 = 60_000;

/// Default minimum fetch interval: twelve hours
pub const DEFAULT_MINIMUM_FETCH_INTERVAL_MILLIS: u64 = 43_200_000;

/// Remote Config settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSettings {
    /// Maximum time a fetch may take
    pub fetch_timeout_millis: u64,
    /// Successful fetches younger than this are served from the cache
    pub minimum_fetch_interval_millis: u64,
}

impl Default for ConfigSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_millis: DEFAULT_FETCH_TIMEOUT_MILLIS,
            minimum_fetch_interval_millis: DEFAULT_MINIMUM_FETCH_INTERVAL_MILLIS,
        }
    }
}

/// Outcome of the most recent fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastFetchStatus {
    /// No fetch has completed yet
    NoFetchYet,
    /// The last fetch succeeded
    Success,
    /// The last fetch failed
    Failure,
    /// The last fetch was throttled by the backend
    Throttled,
}

impl LastFetchStatus {
    /// Wire name (`no_fetch_yet`, `success`, `failure`, `throttle`)
    pub fn as_str(&self) -> &'static str {
        match self {
            LastFetchStatus::NoFetchYet => "no_fetch_yet",
            LastFetchStatus::Success => "success",
            LastFetchStatus::Failure => "failure",
            LastFetchStatus::Throttled => "throttle",
        }
    }
}

/// Settings carried by a constants update
///
/// The store reports durations in seconds; callers assigning settings
/// directly use milliseconds and may leave fields out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsUpdate {
    /// Both durations, in seconds
    Seconds {
        /// Fetch timeout in seconds
        fetch_timeout: f64,
        /// Minimum fetch interval in seconds
        minimum_fetch_interval: f64,
    },
    /// Any subset of durations, in milliseconds
    Millis {
        /// Fetch timeout in milliseconds
        fetch_timeout_millis: Option<u64>,
        /// Minimum fetch interval in milliseconds
        minimum_fetch_interval_millis: Option<u64>,
    },
}

/// A snapshot of Remote Config state produced after every operation
///
/// Absent fields leave the corresponding part of the view untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigConstants {
    /// Time of the last fetch attempt in milliseconds, -1 before any fetch
    pub last_fetch_time: Option<i64>,
    /// Status of the last fetch
    pub last_fetch_status: Option<LastFetchStatus>,
    /// Current settings
    pub settings: Option<SettingsUpdate>,
    /// Every known key with its value and source
    pub values: Option<HashMap<String, ConfigValue>>,
}

/// What `get_value`, `settings` and friends read from
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ConfigView {
    pub last_fetch_time: i64,
    pub last_fetch_status: LastFetchStatus,
    pub settings: ConfigSettings,
    pub values: HashMap<String, ConfigValue>,
}

impl Default for ConfigView {
    fn default() -> Self {
        Self {
            last_fetch_time: -1,
            last_fetch_status: LastFetchStatus::NoFetchYet,
            settings: ConfigSettings::default(),
            values: HashMap::new(),
        }
    }
}

impl ConfigView {
    /// Merge a constants snapshot into the view
    pub(crate) fn update_from_constants(&mut self, constants: ConfigConstants) {
        if let Some(last_fetch_time) = constants.last_fetch_time {
            self.last_fetch_time = last_fetch_time;
        }

        if let Some(status) = constants.last_fetch_status {
            self.last_fetch_status = status;
        }

        match constants.settings {
            Some(SettingsUpdate::Seconds {
                fetch_timeout,
                minimum_fetch_interval,
            }) => {
                self.settings = ConfigSettings {
                    fetch_timeout_millis: seconds_to_millis(fetch_timeout),
                    minimum_fetch_interval_millis: seconds_to_millis(minimum_fetch_interval),
                };
            }
            Some(SettingsUpdate::Millis {
                fetch_timeout_millis,
                minimum_fetch_interval_millis,
            }) => {
                self.settings = ConfigSettings {
                    fetch_timeout_millis: fetch_timeout_millis.unwrap_or(self.settings.fetch_timeout_millis),
                    minimum_fetch_interval_millis: minimum_fetch_interval_millis
                        .unwrap_or(self.settings.minimum_fetch_interval_millis),
                };
            }
            None => {}
        }

        if let Some(values) = constants.values {
            self.values = values;
        }
    }
}

fn seconds_to_millis(seconds: f64) -> u64 {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_config::value::ValueSource;

    #[test]
    fn test_defaults() {
        let view = ConfigView::default();
        assert_eq!(view.last_fetch_time, -1);
        assert_eq!(view.last_fetch_status, LastFetchStatus::NoFetchYet);
        assert_eq!(view.settings.fetch_timeout_millis, 60_000);
        assert_eq!(view.settings.minimum_fetch_interval_millis, 43_200_000);
    }

    #[test]
    fn test_empty_constants_change_nothing() {
        let mut view = ConfigView::default();
        view.update_from_constants(ConfigConstants::default());
        assert_eq!(view, ConfigView::default());
    }

    #[test]
    fn test_settings_from_seconds() {
        let mut view = ConfigView::default();
        view.update_from_constants(ConfigConstants {
            settings: Some(SettingsUpdate::Seconds {
                fetch_timeout: 5.0,
                minimum_fetch_interval: 0.5,
            }),
            ..Default::default()
        });
        assert_eq!(view.settings.fetch_timeout_millis, 5_000);
        assert_eq!(view.settings.minimum_fetch_interval_millis, 500);
    }

    #[test]
    fn test_partial_settings_from_millis() {
        let mut view = ConfigView::default();
        view.update_from_constants(ConfigConstants {
            settings: Some(SettingsUpdate::Millis {
                fetch_timeout_millis: None,
                minimum_fetch_interval_millis: Some(1_000),
            }),
            ..Default::default()
        });
        assert_eq!(view.settings.fetch_timeout_millis, DEFAULT_FETCH_TIMEOUT_MILLIS);
        assert_eq!(view.settings.minimum_fetch_interval_millis, 1_000);
    }

    #[test]
    fn test_fetch_fields_and_values() {
        let mut view = ConfigView::default();
        let mut values = HashMap::new();
        values.insert("welcome".to_string(), ConfigValue::new("hi", ValueSource::Remote));

        view.update_from_constants(ConfigConstants {
            last_fetch_time: Some(1_700_000_000_000),
            last_fetch_status: Some(LastFetchStatus::Success),
            values: Some(values),
            ..Default::default()
        });

        assert_eq!(view.last_fetch_time, 1_700_000_000_000);
        assert_eq!(view.last_fetch_status.as_str(), "success");
        assert_eq!(view.values["welcome"].as_string(), "hi");
    }
}
