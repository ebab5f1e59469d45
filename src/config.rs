//! Tap configuration
//!
//! The configuration document is a JSON (or YAML) object carrying the OAuth2
//! credentials, the organisation name and the replication start date. The
//! authenticator writes rotated tokens back into the same document.

use crate::error::{Error, Result};
use crate::types::{parse_timestamp, JsonValue, OptionStringExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Keys that must be present in every configuration document
pub const REQUIRED_CONFIG_KEYS: &[&str] = &[
    "start_date",
    "client_id",
    "client_secret",
    "redirect_uri",
    "refresh_token",
    "org",
];

/// Default Azure AD token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/token";

/// Runtime configuration of the tap
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Earliest modification time replicated when no bookmark exists
    pub start_date: String,

    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Redirect URI registered with the OAuth2 application
    pub redirect_uri: String,

    /// OAuth2 refresh token (rotated on every refresh)
    pub refresh_token: String,

    /// Organisation name, as in `https://{org}.crm.dynamics.com`
    pub org: String,

    /// Also expose every entity set whose name marks it as a lookup table
    #[serde(default)]
    pub include_lookup_tables: bool,

    /// Web API version segment
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Rows requested per page (`Prefer: odata.maxpagesize`)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Client-side request rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Retries for transient HTTP failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Override for the service root URL
    #[serde(default)]
    pub url: Option<String>,

    /// Override for the OAuth2 token endpoint
    #[serde(default)]
    pub token_url: Option<String>,

    /// Custom User-Agent header
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_api_version() -> String {
    "v9.0".to_string()
}

fn default_page_size() -> u32 {
    5000
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    3
}

impl TapConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;
        let value: JsonValue = if is_yaml(path) {
            serde_yaml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)
                .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?
        };
        Self::from_value(value)
    }

    /// Build a configuration from an already parsed document
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::config("Config must be a JSON object"))?;

        for key in REQUIRED_CONFIG_KEYS {
            match object.get(*key) {
                None | Some(JsonValue::Null) => return Err(Error::missing_field(*key)),
                Some(_) => {}
            }
        }

        let config: TapConfig = serde_json::from_value(value)
            .map_err(|e| Error::config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if parse_timestamp(&self.start_date).is_none() {
            return Err(Error::invalid_value(
                "start_date",
                format!("'{}' is not an ISO-8601 timestamp", self.start_date),
            ));
        }
        if self.org.trim().is_empty() && self.url.is_none() {
            return Err(Error::invalid_value("org", "must not be empty"));
        }
        if self.page_size == 0 {
            return Err(Error::invalid_value("page_size", "must be positive"));
        }
        Ok(())
    }

    /// Replication start as a UTC timestamp
    pub fn start_date(&self) -> Result<DateTime<Utc>> {
        parse_timestamp(&self.start_date).ok_or_else(|| {
            Error::invalid_value("start_date", "not an ISO-8601 timestamp".to_string())
        })
    }

    /// OAuth2 resource the access token is requested for
    pub fn resource(&self) -> String {
        format!("https://{}.crm.dynamics.com", self.org)
    }

    /// Service root of the Web API, always ending with `/`
    pub fn service_url(&self) -> String {
        let url = self.url.clone().none_if_empty().unwrap_or_else(|| {
            format!("{}/api/data/{}/", self.resource(), self.api_version)
        });
        if url.ends_with('/') {
            url
        } else {
            format!("{url}/")
        }
    }

    /// Token endpoint used for the refresh-token grant
    pub fn token_url(&self) -> String {
        self.token_url
            .clone()
            .none_if_empty()
            .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string())
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

/// Tokens returned by a successful refresh, written back to the config file
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// Rewrite the configuration document with freshly issued tokens.
///
/// The whole document is rewritten through a temporary file so a crash never
/// leaves a truncated config behind. Unknown keys are preserved.
pub async fn persist_refreshed_tokens(path: &Path, tokens: &RefreshedTokens) -> Result<()> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::config(format!("Failed to read config file: {e}")))?;

    let yaml = is_yaml(path);
    let mut document: JsonValue = if yaml {
        serde_yaml::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };

    let object = document
        .as_object_mut()
        .ok_or_else(|| Error::config("Config must be a JSON object"))?;
    object.insert(
        "access_token".to_string(),
        JsonValue::String(tokens.access_token.clone()),
    );
    if let Some(refresh_token) = &tokens.refresh_token {
        object.insert(
            "refresh_token".to_string(),
            JsonValue::String(refresh_token.clone()),
        );
    }
    if let Some(expires_in) = tokens.expires_in {
        object.insert("expires_in".to_string(), JsonValue::from(expires_in));
    }

    let serialized = if yaml {
        serde_yaml::to_string(&document)?
    } else {
        serde_json::to_string_pretty(&document)?
    };

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, serialized)
        .await
        .map_err(|e| Error::config(format!("Failed to write config file: {e}")))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| Error::config(format!("Failed to replace config file: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn base_config() -> JsonValue {
        json!({
            "start_date": "2024-01-01T00:00:00Z",
            "client_id": "client",
            "client_secret": "secret",
            "redirect_uri": "https://localhost/callback",
            "refresh_token": "refresh-1",
            "org": "contoso"
        })
    }

    #[test]
    fn test_from_value_defaults() {
        let config = TapConfig::from_value(base_config()).unwrap();
        assert!(!config.include_lookup_tables);
        assert_eq!(config.api_version, "v9.0");
        assert_eq!(config.page_size, 5000);
        assert_eq!(config.max_retries, 3);
        assert_eq!(
            config.service_url(),
            "https://contoso.crm.dynamics.com/api/data/v9.0/"
        );
        assert_eq!(config.resource(), "https://contoso.crm.dynamics.com");
        assert_eq!(config.token_url(), DEFAULT_TOKEN_URL);
    }

    #[test]
    fn test_missing_required_key() {
        for key in REQUIRED_CONFIG_KEYS {
            let mut value = base_config();
            value.as_object_mut().unwrap().remove(*key);
            let err = TapConfig::from_value(value).unwrap_err();
            assert!(
                matches!(err, Error::MissingConfigField { ref field } if field == key),
                "unexpected error for {key}: {err}"
            );
        }
    }

    #[test]
    fn test_invalid_start_date() {
        let mut value = base_config();
        value["start_date"] = json!("yesterday");
        let err = TapConfig::from_value(value).unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));
    }

    #[test]
    fn test_url_override_gets_trailing_slash() {
        let mut value = base_config();
        value["url"] = json!("http://127.0.0.1:9000/api/data/v9.0");
        let config = TapConfig::from_value(value).unwrap();
        assert_eq!(config.service_url(), "http://127.0.0.1:9000/api/data/v9.0/");
    }

    #[test]
    fn test_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "start_date: '2024-01-01'\nclient_id: c\nclient_secret: s\nredirect_uri: r\nrefresh_token: t\norg: contoso\ninclude_lookup_tables: true\n",
        )
        .unwrap();

        let config = TapConfig::load(&path).unwrap();
        assert!(config.include_lookup_tables);
        assert_eq!(config.org, "contoso");
    }

    #[test]
    fn test_load_missing_file() {
        let err = TapConfig::load("/nonexistent/config.json").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_persist_refreshed_tokens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut value = base_config();
        value["custom_key"] = json!("kept");
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        persist_refreshed_tokens(
            &path,
            &RefreshedTokens {
                access_token: "access-2".to_string(),
                refresh_token: Some("refresh-2".to_string()),
                expires_in: Some(3599),
            },
        )
        .await
        .unwrap();

        let written: JsonValue =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["refresh_token"], "refresh-2");
        assert_eq!(written["access_token"], "access-2");
        assert_eq!(written["expires_in"], 3599);
        assert_eq!(written["custom_key"], "kept");
        assert!(!path.with_extension("tmp").exists());
    }
}
