//! Bearer credential management
//!
//! The access token is cached behind an `RwLock`. Concurrent callers share
//! one refresh: whoever takes the write lock first exchanges the refresh
//! token, and the others find a valid token once they get the lock.

use super::types::{AccessToken, AuthConfig};
use crate::config::{persist_refreshed_tokens, RefreshedTokens};
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug)]
struct TokenState {
    access: Option<AccessToken>,
    /// Latest refresh token; Azure AD rotates it on every exchange
    refresh_token: Option<String>,
}

impl TokenState {
    fn valid_secret(&self) -> Option<String> {
        self.access
            .as_ref()
            .filter(|token| token.is_valid())
            .map(|token| token.secret.clone())
    }
}

/// Attaches credentials to Web API requests
pub struct Authenticator {
    config: AuthConfig,
    state: RwLock<TokenState>,
    /// Used only for token endpoint calls
    token_client: Client,
}

impl Authenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: AuthConfig, token_client: Client) -> Self {
        let refresh_token = match &config {
            AuthConfig::Oauth2Refresh { refresh_token, .. } => Some(refresh_token.clone()),
            _ => None,
        };
        Self {
            config,
            state: RwLock::new(TokenState {
                access: None,
                refresh_token,
            }),
            token_client,
        }
    }

    /// Add the `Authorization` header, refreshing the token first if needed
    pub async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match &self.config {
            AuthConfig::None => request,
            AuthConfig::Bearer { token } => request.bearer_auth(token),
            AuthConfig::Oauth2Refresh { .. } => request.bearer_auth(self.access_token().await?),
        })
    }

    /// Whether a rejected credential can be replaced by refreshing
    pub fn can_refresh(&self) -> bool {
        matches!(self.config, AuthConfig::Oauth2Refresh { .. })
    }

    /// Current access token, exchanged for a new one once it nears expiry
    pub async fn access_token(&self) -> Result<String> {
        if let Some(secret) = self.state.read().await.valid_secret() {
            return Ok(secret);
        }

        let mut state = self.state.write().await;
        if let Some(secret) = state.valid_secret() {
            return Ok(secret);
        }

        let token = self.refresh(&mut state).await?;
        let secret = token.secret.clone();
        state.access = Some(token);
        Ok(secret)
    }

    /// Forget the cached access token so the next request refreshes it
    pub async fn invalidate(&self) {
        self.state.write().await.access = None;
    }

    async fn refresh(&self, state: &mut TokenState) -> Result<AccessToken> {
        let AuthConfig::Oauth2Refresh {
            token_url,
            client_id,
            client_secret,
            redirect_uri,
            resource,
            persist_to,
            ..
        } = &self.config
        else {
            return Err(Error::auth("Credential cannot be refreshed"));
        };

        let refresh_token = state
            .refresh_token
            .clone()
            .ok_or_else(|| Error::auth("No refresh token available"))?;

        debug!("Refreshing access token for {}", resource);

        let form = [
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
            ("resource", resource.as_str()),
        ];

        let response = self
            .token_client
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| refresh_failed(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(refresh_failed(format!("status {}: {body}", status.as_u16())));
        }

        let grant: TokenResponse = response
            .json()
            .await
            .map_err(|e| refresh_failed(format!("malformed token response: {e}")))?;

        if let Some(rotated) = &grant.refresh_token {
            state.refresh_token = Some(rotated.clone());
        }

        if let Some(path) = persist_to {
            let tokens = RefreshedTokens {
                access_token: grant.access_token.clone(),
                refresh_token: grant.refresh_token.clone(),
                expires_in: grant.expires_in,
            };
            match persist_refreshed_tokens(path, &tokens).await {
                Ok(()) => info!("Stored refreshed credentials in {}", path.display()),
                Err(e) => warn!("Could not store refreshed credentials: {e}"),
            }
        }

        Ok(AccessToken::issued_now(grant.access_token, grant.expires_in))
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("refreshable", &self.can_refresh())
            .finish_non_exhaustive()
    }
}

fn refresh_failed(message: String) -> Error {
    Error::TokenRefresh { message }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Azure AD v1 endpoints send this as a string
    #[serde(default, deserialize_with = "deserialize_seconds")]
    expires_in: Option<i64>,
}

fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn test_token_response_numeric_expiry() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3599}"#).unwrap();
        assert_eq!(response.expires_in, Some(3599));
        assert!(response.refresh_token.is_none());
    }

    #[test]
    fn test_token_response_string_expiry() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token":"a","refresh_token":"r","expires_in":"3599"}"#,
        )
        .unwrap();
        assert_eq!(response.expires_in, Some(3599));
        assert_eq!(response.refresh_token.as_deref(), Some("r"));
    }
}
