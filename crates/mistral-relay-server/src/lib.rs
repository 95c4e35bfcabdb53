//! HTTP relay exposing `POST /api/chat` in front of Mistral's
//! chat-completions API.

pub mod config;
pub mod http;
pub mod observability;
pub mod state;

pub use http::build_router;
pub use state::AppState;
