use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::normalize::normalize;
use crate::settings::Settings;

use super::models::{ErrorResponse, OcrResponse};
use super::state::ServerState;

const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub async fn run_server(settings: Settings, addr: String) -> Result<()> {
    let engine = Engine::from_settings(&settings);
    let state = Arc::new(ServerState { engine });
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ocr", post(recognize))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(axum::middleware::from_fn(cors_middleware));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("ocr service listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "service": "OCR Service",
            "status": "running",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "healthy" })),
    )
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

async fn recognize(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> Result<Json<OcrResponse>, (StatusCode, Json<ErrorResponse>)> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| bad_request(format!("invalid multipart body: {}", err)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| bad_request(format!("failed to read upload: {}", err)))?;
        upload = Some((file_name, content_type, bytes));
        break;
    }

    let Some((file_name, content_type, bytes)) = upload else {
        return Err(bad_request("multipart field 'file' is required".to_string()));
    };
    if !is_image_upload(content_type.as_deref(), &bytes) {
        return Err(bad_request("file must be an image".to_string()));
    }

    let suffix = file_suffix(file_name.as_deref());
    let mut tmp = tempfile::Builder::new()
        .suffix(&suffix)
        .tempfile()
        .map_err(|err| internal(format!("failed to create temp file: {}", err)))?;
    tmp.write_all(&bytes)
        .and_then(|_| tmp.flush())
        .map_err(|err| internal(format!("failed to write temp image: {}", err)))?;

    info!(
        "starting ocr recognition: {}",
        file_name.as_deref().unwrap_or("(unnamed upload)")
    );
    let engine = state.engine.clone();
    let image = tmp.path().to_path_buf();
    let raw = tokio::task::spawn_blocking(move || engine.recognize(&image))
        .await
        .map_err(|err| internal(format!("recognition task failed: {}", err)))?
        .map_err(|err| {
            warn!("ocr engine error: {}", err);
            internal(format!("ocr processing failed: {}", err))
        })?;

    let normalized = normalize(&raw);
    info!("ocr recognition finished: {} lines", normalized.lines.len());

    Ok(Json(OcrResponse {
        text: normalized.text,
        lines: normalized.lines,
        raw_result: None,
    }))
}

fn is_image_upload(content_type: Option<&str>, bytes: &[u8]) -> bool {
    if content_type.is_some_and(|value| value.starts_with("image/")) {
        return true;
    }
    infer::is_image(bytes)
}

fn file_suffix(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

fn bad_request(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

fn internal(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error }))
}
