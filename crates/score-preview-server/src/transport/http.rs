//! HTTP API: preview listing, PDF downloads, cache management and /health.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use score_preview::DocumentAssembler;

use crate::service::PreviewService;
use crate::transport::stream::{document_filename, pdf_response};
use crate::types::{
    validate_identifier, ApiError, ApiResult, ClearedResponse, DocumentSource, HealthResponse,
    MakePdfRequest, PreviewResponse, RemovedResponse,
};

/// Filename used for documents built from a URL list.
const URL_DOCUMENT_FILENAME: &str = "preview.pdf";

/// Build the router with every endpoint.
pub fn router(service: Arc<PreviewService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/api/preview/:identifier",
            get(handle_preview).delete(handle_invalidate),
        )
        .route("/api/make-pdf", post(handle_make_pdf))
        .route("/api/clear-cache", post(handle_clear_cache))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

/// Serve the API on `0.0.0.0:{port}` until `shutdown` resolves.
pub async fn serve<S>(port: u16, service: Arc<PreviewService>, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://localhost:{port}");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_health(State(service): State<Arc<PreviewService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_items: service.cache().len().await,
    })
}

async fn handle_preview(
    State(service): State<Arc<PreviewService>>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<PreviewResponse>> {
    let identifier = validate_identifier(&identifier)?;
    let entry = service.preview(&identifier).await?;
    Ok(Json(PreviewResponse {
        images: entry.urls(),
        title: entry.title.clone(),
    }))
}

async fn handle_invalidate(
    State(service): State<Arc<PreviewService>>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<RemovedResponse>> {
    let identifier = validate_identifier(&identifier)?;
    let removed = service.invalidate(&identifier).await;
    Ok(Json(RemovedResponse { removed }))
}

async fn handle_clear_cache(State(service): State<Arc<PreviewService>>) -> Json<ClearedResponse> {
    let cleared = service.clear_all().await;
    Json(ClearedResponse { cleared })
}

async fn handle_make_pdf(
    State(service): State<Arc<PreviewService>>,
    body: Result<Json<MakePdfRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|e| ApiError::Validation(e.body_text()))?;

    match request.into_source()? {
        DocumentSource::Cached {
            identifier,
            indices,
        } => {
            let entry = service
                .document_for(&identifier)
                .await
                .ok_or(ApiError::CacheMiss)?;
            let filename = document_filename(&identifier, &entry.title);
            let assembler = DocumentAssembler::new().with_title(entry.title.clone());

            let build_entry = Arc::clone(&entry);
            let (response, task) = pdf_response(&filename, move |sink| {
                assembler.assemble(build_entry.select(&indices), sink)
            })?;

            tokio::spawn(async move {
                match task.await {
                    Ok(Ok(report)) => {
                        info!(
                            "PDF for {identifier}: {} page(s), {} skipped",
                            report.pages_written, report.pages_skipped
                        );
                        service.finish_document(&identifier).await;
                    }
                    Ok(Err(e)) => error!("PDF for {identifier} failed: {e}"),
                    Err(e) => error!("PDF task for {identifier} panicked: {e}"),
                }
            });

            Ok(response)
        }
        DocumentSource::Urls(urls) => {
            let buffers = service.document_from_urls(&urls).await?;
            let assembler = DocumentAssembler::new();
            let (response, task) = pdf_response(URL_DOCUMENT_FILENAME, move |sink| {
                assembler.assemble(buffers.iter().map(Vec::as_slice), sink)
            })?;

            tokio::spawn(async move {
                match task.await {
                    Ok(Ok(report)) => info!(
                        "PDF from {} URL(s): {} page(s), {} skipped",
                        urls.len(),
                        report.pages_written,
                        report.pages_skipped
                    ),
                    Ok(Err(e)) => error!("PDF from URLs failed: {e}"),
                    Err(e) => error!("PDF task panicked: {e}"),
                }
            });

            Ok(response)
        }
    }
}
