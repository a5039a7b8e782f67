//! Command-line interface.
//!
//! - `serve` starts the HTTP server
//! - `migrate` manages the schema
//! - `jobs` runs or inspects the notification mail queue

pub mod args;

pub use args::{Cli, Commands};
