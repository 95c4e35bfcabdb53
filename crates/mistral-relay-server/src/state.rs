use std::sync::Arc;

use mistral_relay::CompletionProvider;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Upstream provider; `None` when no API key is configured.
    pub provider: Option<Arc<dyn CompletionProvider>>,
}

impl AppState {
    pub fn new(provider: Option<Arc<dyn CompletionProvider>>) -> Self {
        Self { provider }
    }
}
