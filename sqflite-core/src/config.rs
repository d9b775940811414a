//! Bridge configuration.
//!
//! Hosts hand the bridge a JSON document; every field is optional:
//!
//! ```json
//! { "apiVersion": "v1", "readyEvent": "sqflite_web_ready", "pragmas": ["PRAGMA foreign_keys = ON"] }
//! ```

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::BridgeError;
use crate::BridgeResult;

/// Name of the DOM event browser hosts wait for before calling the bridge.
pub const DEFAULT_READY_EVENT: &str = "sqflite_web_ready";

/// Function set served to the host.
///
/// The two sets differ in naming and in how `run` and `executeScalar`
/// behave; callers must use the names of the version they loaded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ApiVersion {
    /// `run(sql, params)`, `prepare`/`bind`/`step`/`get`/`getColumnNames`/
    /// `free`, raw `executeScalar` value.
    V1,
    /// `run(sql)`/`runParams(sql, params)`, `stmt_*` statement functions,
    /// integer `executeScalar`.
    #[default]
    V2,
}

/// Configuration of a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Function set served by name-based dispatch.
    pub api_version: ApiVersion,
    /// DOM event dispatched once the bridge is ready (browser hosts only).
    pub ready_event: String,
    /// SQL run on every database the bridge creates or opens.
    pub pragmas: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            api_version: ApiVersion::default(),
            ready_event: DEFAULT_READY_EVENT.to_string(),
            pragmas: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Parses a JSON configuration. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidConfig`] for malformed JSON, an unknown
    /// API version or an empty ready event name.
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;
        if config.ready_event.trim().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "readyEvent must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    /// Returns the configuration serving `version`.
    #[must_use]
    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = BridgeConfig::from_json("{}").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.api_version, ApiVersion::V2);
        assert_eq!(config.ready_event, "sqflite_web_ready");
    }

    #[test]
    fn test_full_json() {
        let config = BridgeConfig::from_json(
            r#"{"apiVersion": "v1", "readyEvent": "db_ready", "pragmas": ["PRAGMA foreign_keys = ON"]}"#,
        )
        .unwrap();
        assert_eq!(config.api_version, ApiVersion::V1);
        assert_eq!(config.ready_event, "db_ready");
        assert_eq!(config.pragmas.len(), 1);
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(
            BridgeConfig::from_json(r#"{"apiVersion": "v3"}"#),
            Err(BridgeError::InvalidConfig(_))
        ));
        assert!(matches!(
            BridgeConfig::from_json(r#"{"readyEvent": " "}"#),
            Err(BridgeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_api_version_strings() {
        assert_eq!(ApiVersion::from_str("v1").unwrap(), ApiVersion::V1);
        assert_eq!(ApiVersion::V2.to_string(), "v2");
        assert!(ApiVersion::from_str("v9").is_err());
    }
}
