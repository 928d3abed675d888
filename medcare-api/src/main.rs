use anyhow::Context;
use medcare_api::{Settings, create_app, telemetry::init_tracing};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env().context("invalid configuration")?;
    init_tracing(&settings.log_format);

    let app = create_app(&settings).await;
    let listener = TcpListener::bind(settings.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_address()))?;
    let addr = listener.local_addr()?;

    info!("MedCare API starting on {}", addr);
    info!("Health check endpoint: http://{}/health", addr);
    info!("Disease endpoint: POST http://{}/disease/predict", addr);
    #[cfg(feature = "cancer")]
    info!("Cancer endpoint: POST http://{}/cancer/scan", addr);
    #[cfg(feature = "chat")]
    info!("Chat endpoint: POST http://{}/chat/message", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
