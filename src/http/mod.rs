//! HTTP transport for the Web API
//!
//! [`HttpClient`] is the only thing that talks to the network apart from the
//! token endpoint. It paces requests with [`RateLimiter`], retries 429s and
//! 5xx responses on a [`Backoff`] schedule, and refreshes a rejected access
//! token once per call.

mod client;
mod rate_limit;

pub use client::{Backoff, HttpClient, HttpClientConfig};
pub use rate_limit::RateLimiter;

#[cfg(test)]
mod tests;
