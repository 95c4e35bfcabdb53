//! Mistral chat-completions integration.
//!
//! The provider is always constructed explicitly with its credential; there is
//! no process-wide client.
mod adapter;
mod config;

pub use adapter::MistralProvider;
pub use config::{DEFAULT_BASE_URL, MistralClientConfig};
