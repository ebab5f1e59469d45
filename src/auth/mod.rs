//! Authentication module
//!
//! Supplies a bearer credential for every outbound request. The OAuth2
//! refresh-token flow caches the access token, refreshes it shortly before it
//! expires and keeps the rotated refresh token for the next exchange.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AccessToken, AuthConfig, CLOCK_DRIFT_PADDING_SECS};
