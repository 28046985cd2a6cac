//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_connect_timeout_secs() -> u64 {
    10
}

const fn default_confirmation_timeout_ms() -> u64 {
    180_000
}

const fn default_receipt_poll_interval_ms() -> u64 {
    2_000
}

/// Marketplace backend client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub base_url: Url,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Per-action flow settings.
///
/// Confirmation waiting is the only engine-enforced timeout; chain
/// switches and wallet prompts are user-driven and unbounded.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowSettings {
    #[serde(default = "default_confirmation_timeout_ms")]
    pub confirmation_timeout_ms: u64,
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: default_confirmation_timeout_ms(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
        }
    }
}

impl FlowSettings {
    pub const fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub const fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_config_applies_timeout_defaults() {
        let config: ClientConfig =
            serde_json::from_value(serde_json::json!({ "base_url": "https://marketplace.example" }))
                .unwrap();

        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn flow_settings_default_to_three_minute_confirmation() {
        let settings = FlowSettings::default();

        assert_eq!(settings.confirmation_timeout(), Duration::from_millis(180_000));
        assert_eq!(settings.receipt_poll_interval(), Duration::from_millis(2_000));
    }
}
