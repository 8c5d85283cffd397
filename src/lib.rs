//! n8n Cloud provider
//!
//! A plugin for an infrastructure-as-code host that manages the user
//! accounts of an n8n Cloud instance through the n8n public REST API.
//!
//! # Overview
//!
//! - **`n8ncloud_user` resource**: invite, re-role, delete and import users
//! - **`n8ncloud_user` data source**: look up an existing user by id or email
//! - **Client**: an async REST client for the n8n users API ([`client`])
//! - **Planner**: schema-driven planning with replace and keep-prior-value
//!   policies ([`plan`])
//! - **Server**: the gRPC plugin protocol and handshake ([`server`])
//!
//! # Provider configuration
//!
//! | Attribute | Environment fallback | Default |
//! |---|---|---|
//! | `api_key` (sensitive) | `N8N_API_KEY` | required |
//! | `instance_url` | `N8N_INSTANCE_URL` | required |
//! | `timeout` (seconds) | | 30 |
//!
//! # Handshake Protocol
//!
//! When the binary starts via [`serve`], it prints a handshake line to stdout:
//!
//! ```text
//! N8NCLOUD_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `N8NCLOUD_PROVIDER|<protocol_version>|<address>`. Logs go to
//! stderr so they never interleave with it.
//!
//! # Embedding
//!
//! ```no_run
//! use n8ncloud_provider::{init_logging, serve, N8nCloudProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(N8nCloudProvider::new(env!("CARGO_PKG_VERSION"))).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod data_sources;
pub mod entity;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use client::{ApiError, N8nClient, Role, User, UsersApi};
pub use entity::{DataSource, ManagedEntity};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::N8nCloudProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;
