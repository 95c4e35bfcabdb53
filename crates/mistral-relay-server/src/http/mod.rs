//! Axum router, handlers, and error mapping.

pub mod chat;
pub mod error;
pub mod health;
pub mod router;

pub use router::build_router;
