//! Shared types for list and response shapes.

pub mod pagination;
mod response;

pub use pagination::{Paginated, PaginationMeta, PaginationParams};
pub use response::{Created, NoContent};
