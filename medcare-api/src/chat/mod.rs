//! Medical chat assistant relayed to an external generative-text provider.

pub mod prompt;
pub mod provider;
pub mod relay;

use thiserror::Error;

use crate::error::ApiError;

pub use provider::{ChatProvider, CompletionRequest, RigChatProvider};
pub use relay::{ChatRelay, ChatReply};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("{0}")]
    MissingCredential(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Upstream(String),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::MissingCredential(message) => ApiError::Unauthorized(message),
            ChatError::InvalidInput(message) => ApiError::InvalidInput(message),
            ChatError::Upstream(message) => ApiError::Upstream(message),
        }
    }
}
