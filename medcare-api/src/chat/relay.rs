use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::ChatError;
use super::prompt::{build_prompt, parse_history};
use super::provider::{ChatProvider, CompletionRequest, RigChatProvider};
use crate::config::{ChatAuthMode, ChatSettings};
use crate::models::ChatRequest;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub provider: String,
}

/// Stateless relay to the configured chat provider.
pub struct ChatRelay {
    provider: Arc<dyn ChatProvider>,
    auth_mode: ChatAuthMode,
    server_key: Option<String>,
    timeout: Duration,
}

impl ChatRelay {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        auth_mode: ChatAuthMode,
        server_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            auth_mode,
            server_key: server_key.filter(|k| !k.trim().is_empty()),
            timeout,
        }
    }

    pub fn from_settings(settings: &ChatSettings) -> Self {
        let provider = Arc::new(RigChatProvider::new(settings.provider, settings.model.clone()));
        Self::new(
            provider,
            settings.auth_mode,
            settings.api_key.clone(),
            settings.timeout,
        )
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn auth_mode(&self) -> ChatAuthMode {
        self.auth_mode
    }

    /// Whether a request without its own key could be served.
    pub fn has_server_credential(&self) -> bool {
        self.server_key.is_some()
    }

    pub async fn relay(
        &self,
        request: &ChatRequest,
        request_key: Option<&str>,
    ) -> Result<ChatReply, ChatError> {
        let api_key = self.resolve_credential(request_key)?;

        if request.message.trim().is_empty() {
            return Err(ChatError::InvalidInput("Message cannot be empty".to_string()));
        }

        let context = request.context.as_deref().unwrap_or_default();
        let completion = CompletionRequest {
            prompt: build_prompt(&request.message, context),
            history: parse_history(&request.history),
        };

        info!(
            provider = self.provider.name(),
            message_len = request.message.len(),
            has_context = !context.is_empty(),
            "Relaying chat message"
        );

        let reply = tokio::time::timeout(self.timeout, self.provider.complete(api_key, completion))
            .await
            .map_err(|_| {
                ChatError::Upstream(format!(
                    "{} API Error: no response within {}s",
                    self.provider.name(),
                    self.timeout.as_secs()
                ))
            })??;

        Ok(ChatReply {
            reply,
            provider: self.provider.name().to_string(),
        })
    }

    fn resolve_credential<'a>(
        &'a self,
        request_key: Option<&'a str>,
    ) -> Result<&'a str, ChatError> {
        let key = match self.auth_mode {
            ChatAuthMode::Server => self.server_key.as_deref(),
            ChatAuthMode::Request => request_key.map(str::trim).filter(|k| !k.is_empty()),
        };

        key.ok_or_else(|| match self.auth_mode {
            ChatAuthMode::Server => ChatError::MissingCredential(format!(
                "{} API key not configured",
                self.provider.name()
            )),
            ChatAuthMode::Request => ChatError::MissingCredential(format!(
                "{} API key required in the x-api-key header",
                self.provider.name()
            )),
        })
    }
}
