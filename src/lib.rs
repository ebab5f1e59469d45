// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # tap-dynamics
//!
//! Incremental replication of Microsoft Dynamics 365 CRM entities as a
//! self-describing record stream.
//!
//! ## Features
//!
//! - **Discovery**: portable, always-nullable schemas inferred from the
//!   service's CSDL metadata, plus synthetic streams for saved and personal views
//! - **Incremental Sync**: modification-time bookmarks, checkpointed every
//!   5000 records
//! - **OAuth2**: refresh-token flow with rotated tokens written back to the config
//! - **Resilient HTTP**: retries, backoff, rate limiting, `@odata.nextLink` paging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tap_dynamics::catalog::discover;
//! use tap_dynamics::cli::sync;
//! use tap_dynamics::config::TapConfig;
//! use tap_dynamics::odata::DynamicsService;
//! use tap_dynamics::output::JsonLinesEmitter;
//! use tap_dynamics::state::StateManager;
//!
//! #[tokio::main]
//! async fn main() -> tap_dynamics::Result<()> {
//!     let config = TapConfig::load("config.json")?;
//!     let service = DynamicsService::from_config(&config, Some("config.json".into()))?;
//!
//!     let catalog = discover(&service, config.include_lookup_tables).await?;
//!     let state = StateManager::from_file("state.json")?;
//!     sync(&service, &config, &catalog, state, JsonLinesEmitter::stdout()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            CLI                               │
//! │        --discover → Catalog        sync → Record stream      │
//! └──────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬───────────┐
//! │   Auth   │   HTTP    │    OData      │  Catalog  │  Engine   │
//! ├──────────┼───────────┼───────────────┼───────────┼───────────┤
//! │ OAuth2   │ Retry     │ $metadata     │ Schemas   │ Bookmarks │
//! │ Refresh  │ Rate Limit│ Query builder │ Views     │ Views     │
//! │ Rotation │ 401 retry │ nextLink      │ Selection │ Checkpoint│
//! └──────────┴───────────┴───────────────┴───────────┴───────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Tap configuration
pub mod config;

/// Authentication implementations
pub mod auth;

/// Web API transport: throttling, retries, credential refresh
pub mod http;

/// OData metadata, queries and service access
pub mod odata;

/// Schema inference from entity metadata
pub mod schema;

/// Catalog document and discovery
pub mod catalog;

/// State management and checkpointing
pub mod state;

/// Record-stream messages and emitters
pub mod output;

/// Replication engine
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
