use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

pub const DEFAULT_REFRESH_INTERVAL_MINUTES: u64 = 15;
pub const DEFAULT_INIT_TIMEOUT_MILLIS: u64 = 2000;

const MAX_VISITOR_CODE_LEN: usize = 255;

/// Settings to use when creating the client, they will override default
/// values, if they exist.
///
/// The default refresh interval is 15 minutes and the default initialization
/// timeout is 2000ms. A zero interval or timeout falls back to the default,
/// so both are always positive on a constructed config.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identifies the project/account within the remote flag service.
    pub site_code: String,
    /// Identifies the end user driving experiment bucketing. Generated by
    /// the service if absent, usually you should set it to a real user id.
    pub visitor_code: Option<String>,
    pub refresh_interval_minutes: u64,
    pub init_timeout_millis: u64,
    /// Override of the service base url, mostly useful for tests.
    pub base_url: Option<String>,
    refresh_override: Option<Duration>,
}

impl ClientConfig {
    pub fn new(site_code: impl Into<String>) -> Self {
        Self {
            site_code: site_code.into(),
            visitor_code: None,
            refresh_interval_minutes: DEFAULT_REFRESH_INTERVAL_MINUTES,
            init_timeout_millis: DEFAULT_INIT_TIMEOUT_MILLIS,
            base_url: None,
            refresh_override: None,
        }
    }

    pub fn with_visitor_code(mut self, visitor_code: impl Into<String>) -> Self {
        self.visitor_code = Some(visitor_code.into());
        self
    }

    pub fn with_refresh_interval_minutes(mut self, minutes: u64) -> Self {
        self.refresh_interval_minutes = minutes;
        self
    }

    pub fn with_init_timeout_millis(mut self, millis: u64) -> Self {
        self.init_timeout_millis = millis;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the refresh cadence directly, bypassing the minute granularity.
    /// Mostly useful for tests.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_override = Some(interval);
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        if let Some(interval) = self.refresh_override {
            return interval;
        }
        let minutes = if self.refresh_interval_minutes == 0 {
            DEFAULT_REFRESH_INTERVAL_MINUTES
        } else {
            self.refresh_interval_minutes
        };
        Duration::from_secs(minutes * 60)
    }

    pub fn init_timeout(&self) -> Duration {
        let millis = if self.init_timeout_millis == 0 {
            DEFAULT_INIT_TIMEOUT_MILLIS
        } else {
            self.init_timeout_millis
        };
        Duration::from_millis(millis)
    }
}

/// Whether a visitor code satisfies the service's validity rules: non-empty,
/// at most 255 characters, alphanumeric plus `-`, `_` and `.`.
pub fn valid_visitor_code(code: &str) -> bool {
    !code.is_empty()
        && code.len() <= MAX_VISITOR_CODE_LEN
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Readiness of the client.
///
/// Monotonic: `Initializing` moves exactly once to one of the terminal
/// states and never transitions again. The client stays usable for flag
/// lookups in either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Initializing,
    Ready,
    NotReady,
}

impl Readiness {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Readiness::Initializing)
    }
}

/// Stage tag attached to the outcomes passed to [`Client::log`](crate::Client::log).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Evaluating,
    Ready,
}

/// Flag data returned by the service for a site and visitor.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagData {
    pub site_code: String,
    /// Assigned by the service when the request carried no visitor code.
    pub visitor_code: Option<String>,
    #[serde(default)]
    pub flags: HashMap<String, serde_json::Value>,
}

/// The last fetched flag data together with when it was fetched.
#[derive(Debug, Clone)]
pub struct FlagSnapshot {
    pub visitor_code: Option<String>,
    pub flags: HashMap<String, serde_json::Value>,
    pub fetched_at: DateTime<Utc>,
}

impl FlagSnapshot {
    pub(crate) fn from_data(data: FlagData) -> Self {
        Self {
            visitor_code: data.visitor_code,
            flags: data.flags,
            fetched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_valid_visitor_code() {
        assert!(valid_visitor_code("validUser1"));
        assert!(valid_visitor_code("user.name-01_a"));
        assert!(valid_visitor_code(&"a".repeat(255)));
        assert!(!valid_visitor_code(""));
        assert!(!valid_visitor_code("bad visitor!"));
        assert!(!valid_visitor_code("héllo"));
        assert!(!valid_visitor_code(&"a".repeat(256)));
    }

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("abc");
        assert_eq!(config.refresh_interval(), Duration::from_secs(15 * 60));
        assert_eq!(config.init_timeout(), Duration::from_millis(2000));
        assert!(config.visitor_code.is_none());
    }

    #[test]
    fn test_config_overrides() {
        let config = ClientConfig::new("abc")
            .with_refresh_interval_minutes(1)
            .with_init_timeout_millis(500);
        assert_eq!(config.refresh_interval(), Duration::from_secs(60));
        assert_eq!(config.init_timeout(), Duration::from_millis(500));

        let config = ClientConfig::new("abc").with_refresh_interval(Duration::from_millis(50));
        assert_eq!(config.refresh_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_config_zero_falls_back_to_defaults() {
        let config = ClientConfig::new("abc")
            .with_refresh_interval_minutes(0)
            .with_init_timeout_millis(0);
        assert_eq!(config.refresh_interval(), Duration::from_secs(15 * 60));
        assert_eq!(config.init_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn test_flag_data_parsing() {
        let data: FlagData = serde_json::from_value(json!({
            "siteCode": "demo",
            "visitorCode": "v-123",
            "flags": {
                "new_checkout": true,
                "banner_text": "hello"
            }
        }))
        .expect("should parse");
        assert_eq!(data.site_code, "demo");
        assert_eq!(data.visitor_code.as_deref(), Some("v-123"));
        assert_eq!(data.flags.get("new_checkout"), Some(&json!(true)));

        let data: FlagData = serde_json::from_value(json!({ "siteCode": "demo" }))
            .expect("flags and visitorCode are optional");
        assert!(data.visitor_code.is_none());
        assert!(data.flags.is_empty());
    }
}
