use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of the binding pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    /// Reject a body-bound request with 400 when any key had no match.
    #[serde(default = "default_reject_on_field_errors")]
    pub reject_on_field_errors: bool,
    /// Run the fetches of independent resolution groups concurrently.
    #[serde(default = "default_concurrent_fetches")]
    pub concurrent_fetches: bool,
    /// Upper bound for a single group fetch, e.g. `"2s"`. A group that times
    /// out is treated like a failed fetch.
    #[serde(default, with = "humantime_serde")]
    pub fetch_timeout: Option<Duration>,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            reject_on_field_errors: default_reject_on_field_errors(),
            concurrent_fetches: default_concurrent_fetches(),
            fetch_timeout: None,
        }
    }
}

fn default_reject_on_field_errors() -> bool {
    true
}

fn default_concurrent_fetches() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let cfg: BindingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, BindingConfig::default());
        assert!(cfg.reject_on_field_errors);
        assert!(cfg.concurrent_fetches);
        assert_eq!(cfg.fetch_timeout, None);
    }

    #[test]
    fn parses_humantime_timeout() {
        let cfg: BindingConfig =
            serde_json::from_str(r#"{"fetch_timeout": "250ms", "concurrent_fetches": false}"#)
                .unwrap();
        assert_eq!(cfg.fetch_timeout, Some(Duration::from_millis(250)));
        assert!(!cfg.concurrent_fetches);
    }

    #[test]
    fn rejects_unknown_fields() {
        assert!(serde_json::from_str::<BindingConfig>(r#"{"retries": 3}"#).is_err());
    }
}
