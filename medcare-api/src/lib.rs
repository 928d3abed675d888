#[cfg(feature = "chat")]
pub mod chat;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod service;
pub mod telemetry;

pub use config::Settings;
pub use error::{ApiError, ApiResult};
pub use service::{AppState, build_router, create_app};
