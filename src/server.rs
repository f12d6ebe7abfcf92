//! HTTP surface: `POST /analyze`, the export endpoints, and health.
//!
//! Response contract: `200` with `{"success": true, …}` on success;
//! every error is `{"success": false, "error": "<one friendly sentence>"}`
//! with `400` (invalid input / missing credential), `405` (wrong method),
//! `504` (unreachable target or timeout), or `500` (everything else).
//! Diagnostic detail goes to the logs, never to the client.
//!
//! CORS is wide open (the analysis form may be served from anywhere);
//! `OPTIONS` preflights are answered by the CORS layer.

use crate::analyze::analyze;
use crate::config::AnalysisConfig;
use crate::error::AnalyzeError;
use crate::export::{DocumentRenderer, ExportSpool, PlainTextRenderer};
use crate::output::{AdZone, CaptureStats, Language, ScrapedContact, StageTimings};
use crate::store::{AnalysisStore, MemoryStore, StoredAnalysis};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AnalysisConfig>,
    pub store: Arc<dyn AnalysisStore>,
    pub spool: Arc<ExportSpool>,
    pub docx_renderer: Arc<dyn DocumentRenderer>,
    pub pdf_renderer: Arc<dyn DocumentRenderer>,
}

impl AppState {
    /// State with the in-memory store and plain-text renderers.
    pub fn new(config: AnalysisConfig) -> std::io::Result<Self> {
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(MemoryStore::default()),
            spool: Arc::new(ExportSpool::new()?),
            docx_renderer: Arc::new(PlainTextRenderer::docx()),
            pdf_renderer: Arc::new(PlainTextRenderer::pdf()),
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/analyze",
            post(analyze_handler).fallback(method_not_allowed),
        )
        .route("/export-docx/:id", get(export_docx))
        .route("/export-pdf/:id", get(export_pdf))
        .route("/health", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    success: bool,
    analysis_id: Uuid,
    url: String,
    screenshot: String,
    zones: Vec<AdZone>,
    language: Language,
    emails: Vec<String>,
    company_name: Option<String>,
    page_title: Option<String>,
    description: Option<String>,
    owner_info: Option<String>,
    proposal: String,
    capture: CaptureStats,
    performance: StageTimings,
    oversized_image: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.into(),
        }),
    )
        .into_response()
}

fn analyze_error_response(err: &AnalyzeError) -> Response {
    error!("analysis failed: {err}");
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    error_response(status, err.user_message())
}

async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid JSON body: {rejection}"),
            )
        }
    };

    if request.url.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "URL is required");
    }

    match analyze(&request.url, &state.config).await {
        Ok(report) => {
            let analysis_id = state
                .store
                .insert(StoredAnalysis {
                    url: report.url.clone(),
                    proposal: report.proposal.clone(),
                })
                .await;

            let ScrapedContact {
                emails,
                company_name,
                page_title,
                description,
            } = report.contact;

            Json(AnalyzeResponse {
                success: true,
                analysis_id,
                url: report.url,
                screenshot: report.screenshot,
                zones: report.zones,
                language: report.language,
                emails: emails.into_iter().collect(),
                company_name,
                page_title,
                description,
                owner_info: report.owner_info,
                proposal: report.proposal.text,
                capture: report.capture,
                performance: report.timings,
                oversized_image: report.oversized_image,
            })
            .into_response()
        }
        Err(err) => analyze_error_response(&err),
    }
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

async fn health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}

async fn export_docx(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let renderer = Arc::clone(&state.docx_renderer);
    export(state, id, renderer).await
}

async fn export_pdf(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let renderer = Arc::clone(&state.pdf_renderer);
    export(state, id, renderer).await
}

async fn export(state: AppState, id: Uuid, renderer: Arc<dyn DocumentRenderer>) -> Response {
    let Some(analysis) = state.store.get(id).await else {
        return error_response(
            StatusCode::NOT_FOUND,
            "Analysis not found or expired. Run the analysis again.",
        );
    };

    match state.spool.fetch(id, &analysis, renderer.as_ref()).await {
        Ok(bytes) => {
            let disposition = format!(
                "attachment; filename=\"proposal-{id}.{}\"",
                renderer.file_extension()
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, renderer.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => {
            error!("export rendering failed for {id}: {e}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to render the export document.",
            )
        }
    }
}
