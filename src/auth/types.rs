//! Credential types

use crate::config::TapConfig;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;

/// Seconds subtracted from a token's lifetime to absorb clock drift
pub const CLOCK_DRIFT_PADDING_SECS: i64 = 10;

/// How outbound requests are authenticated
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    #[default]
    None,

    /// Fixed bearer token that cannot be refreshed
    Bearer { token: String },

    /// Azure AD refresh-token grant.
    ///
    /// The service rotates the refresh token on every exchange; when
    /// `persist_to` is set the new pair is written back into that config
    /// file so the next run starts from it.
    Oauth2Refresh {
        token_url: String,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        refresh_token: String,
        /// Organisation URL the token is issued for
        resource: String,
        persist_to: Option<PathBuf>,
    },
}

impl AuthConfig {
    /// Refresh-token grant described by the tap configuration
    pub fn from_tap_config(config: &TapConfig, config_path: Option<PathBuf>) -> Self {
        AuthConfig::Oauth2Refresh {
            token_url: config.token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            refresh_token: config.refresh_token.clone(),
            resource: config.resource(),
            persist_to: config_path,
        }
    }
}

/// Access token issued by the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub secret: String,
    /// `None` when the endpoint did not report a lifetime
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Token valid for `lifetime_secs` from now
    pub fn issued_now(secret: String, lifetime_secs: Option<i64>) -> Self {
        Self {
            secret,
            expires_at: lifetime_secs.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    /// Still usable at `now`, keeping the drift padding in reserve
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map_or(true, |expires_at| {
                now + Duration::seconds(CLOCK_DRIFT_PADDING_SECS) < expires_at
            })
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
