//! pdfrows server — HTTP API that turns PDF quotes into product rows.
//!
//! Usage:
//!   GEMINI_API_KEY=... PDFROWS_BIND=0.0.0.0:3000 pdfrows-server
//!
//! Or with args:
//!   pdfrows-server --gemini-api-key ... --bind 127.0.0.1:3000

use clap::Parser;
use pdfrows_lib::handler::{self, AppState};
use pdfrows_lib::observability;
use pdfrows_lib::settings::{Args, Settings};

#[tokio::main]
async fn main() {
    observability::setup_logs();

    let settings = match Settings::from_args(Args::parse()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    tracing::info!(
        bind = %settings.bind,
        model = %settings.gemini_model,
        gemini_base_url = %settings.gemini_base_url,
        "Starting pdfrows server"
    );

    let app = handler::router(AppState::new(&settings));

    let listener = match tokio::net::TcpListener::bind(&settings.bind).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, bind = %settings.bind, "Failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(bind = %settings.bind, "Listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
