//! Wildcam Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, validation, and logging for the wildcam workspace.
//!
//! # Overview
//!
//! - **Types**: pull sources, auth variants, and sync reports
//! - **Errors**: domain validation errors
//! - **Logging**: `tracing` subscriber setup shared by every binary
//!
//! # Example
//!
//! ```no_run
//! use wildcam_common::types::{AuthConfig, NewPullSource};
//! use uuid::Uuid;
//!
//! let source = NewPullSource {
//!     name: "north-ridge-cam".to_string(),
//!     owner_user_id: "auth0|abc123".to_string(),
//!     target_location_id: Uuid::new_v4(),
//!     base_url: "https://feeds.example.org/cam1".to_string(),
//!     auth_config: AuthConfig::None,
//!     is_active: true,
//! };
//! source.validate().unwrap();
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::{ModelError, Result};
