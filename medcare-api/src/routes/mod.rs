//! Route groups, one per feature module. Each group is self-contained so an
//! optional module can be compiled out without touching the others.

#[cfg(feature = "cancer")]
pub mod cancer;
#[cfg(feature = "chat")]
pub mod chat;
pub mod disease;

use axum::extract::rejection::JsonRejection;

use crate::error::ApiError;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidInput(rejection.body_text())
    }
}
