use async_trait::async_trait;
use rig::{
    client::CompletionClient,
    completion::{Chat, Message},
    providers::{gemini, openrouter},
};
use tracing::debug;

use super::ChatError;
use super::prompt::{PriorTurn, Role};
use crate::config::ChatProviderKind;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub history: Vec<PriorTurn>,
}

/// External generative-text service. One call per request, no retries.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> Result<String, ChatError>;
}

/// Provider backed by a rig client, built per call from the resolved key.
pub struct RigChatProvider {
    kind: ChatProviderKind,
    model: String,
}

impl RigChatProvider {
    pub fn new(kind: ChatProviderKind, model: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for RigChatProvider {
    fn name(&self) -> &str {
        self.kind.display_name()
    }

    async fn complete(
        &self,
        api_key: &str,
        request: CompletionRequest,
    ) -> Result<String, ChatError> {
        debug!(
            provider = self.name(),
            model = %self.model,
            history_len = request.history.len(),
            "Sending chat completion"
        );

        let history = to_rig_messages(&request.history);
        let reply = match self.kind {
            ChatProviderKind::Gemini => {
                let agent = gemini::Client::new(api_key).agent(&self.model).build();
                agent.chat(request.prompt, history).await
            }
            ChatProviderKind::OpenRouter => {
                let agent = openrouter::Client::new(api_key).agent(&self.model).build();
                agent.chat(request.prompt, history).await
            }
        };

        reply.map_err(|e| ChatError::Upstream(format!("{} API Error: {}", self.name(), e)))
    }
}

fn to_rig_message(turn: &PriorTurn) -> Message {
    match turn.role {
        Role::User => Message::user(turn.content.clone()),
        Role::Assistant => Message::assistant(turn.content.clone()),
        // rig has no system message type; keep it as a marked user turn
        Role::System => Message::user(format!("[SYSTEM] {}", turn.content)),
    }
}

pub fn to_rig_messages(turns: &[PriorTurn]) -> Vec<Message> {
    turns.iter().map(to_rig_message).collect()
}
