//! IRIS - multi-tenant project management API
//!
//! Teams, projects, issues and comments behind JWT auth, with ARIA, an
//! AI assistant that works through the same services via tool calls.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Core business entities and rules
//! - **services**: Use cases, access checks and the assistant loop
//! - **infra**: Database, repositories, Redis cache and the model client
//! - **jobs**: Notification e-mail queue
//! - **api**: HTTP handlers, middleware, and routes
//! - **types**: Shared types (pagination, responses)
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! cargo run -- serve
//!
//! # Run migrations
//! cargo run -- migrate up
//!
//! # Start the mail worker
//! cargo run -- jobs work
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{Actor, Password, User, UserRole};
pub use errors::{AppError, AppResult};
pub use infra::Cache;
