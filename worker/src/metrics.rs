use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, Registry, TEXT_FORMAT, TextEncoder};
use tokio::net::TcpListener;

/// `GET /metrics`: the worker's registry in Prometheus text format
pub async fn get_metrics(State(registry): State<Arc<Registry>>) -> Result<Response, MetricsError> {
    let body = render(&registry)?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response())
}

fn render(registry: &Registry) -> Result<String, MetricsError> {
    let families = registry.gather();
    let mut buffer = Vec::with_capacity(4096);
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|source| MetricsError::Encode {
            families: families.len(),
            source,
        })?;

    Ok(String::from_utf8(buffer)?)
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("encoding {families} metric families failed: {source}")]
    Encode {
        families: usize,
        source: prometheus::Error,
    },

    #[error("encoder produced invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Worker metrics scrape failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .with_state(registry)
}

/// Binds the metrics listener and serves it in the background
pub async fn serve(host: &str, port: u16, registry: Arc<Registry>) -> anyhow::Result<()> {
    let address = format!("{host}:{port}");
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Metrics endpoint listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(registry)).await {
            tracing::error!(error = %e, "Metrics server stopped");
        }
    });

    Ok(())
}
