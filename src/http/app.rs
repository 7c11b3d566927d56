//! Application construction.
//!
//! The request-handling application is built by an [`ApplicationFactory`].
//! The factory also owns application-level cleanup (closing pools and
//! other external resources) run by the shutdown coordinator.

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::http::request::{propagate_request_id, set_request_id};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("application initialization failed: {0}")]
    Init(#[source] BoxError),

    #[error("application shutdown failed: {0}")]
    Shutdown(#[source] BoxError),
}

/// Builds the request-handling application from settings.
#[async_trait]
pub trait ApplicationFactory: Send + Sync {
    async fn build(&self, settings: &Settings) -> Result<Router, AppError>;

    /// Release resources acquired by `build`.
    async fn shutdown(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct HealthStatus {
    ok: bool,
    version: &'static str,
}

async fn healthcheck() -> Json<HealthStatus> {
    Json(HealthStatus {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The server's own application: health check plus request tracing.
#[derive(Debug, Clone, Default)]
pub struct DefaultApplication;

impl DefaultApplication {
    pub fn new() -> Self {
        Self
    }

    pub fn router() -> Router {
        Router::new()
            .route("/", get(healthcheck))
            .route("/healthcheck", get(healthcheck))
            .layer(propagate_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id())
    }
}

#[async_trait]
impl ApplicationFactory for DefaultApplication {
    async fn build(&self, settings: &Settings) -> Result<Router, AppError> {
        tracing::debug!(port = settings.port, "Building application router");
        Ok(Self::router())
    }

    async fn shutdown(&self) -> Result<(), AppError> {
        tracing::info!("Application resources released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthcheck_reports_ok_with_request_id() {
        let response = DefaultApplication::router()
            .oneshot(Request::get("/healthcheck").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(crate::http::request::X_REQUEST_ID));

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], true);
    }
}
