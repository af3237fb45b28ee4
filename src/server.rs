use std::{io, path::PathBuf, sync::Arc, time::Instant};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::Html,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::{
    error::AppError,
    upload::{MAX_IMAGES, UploadBatch},
    vision::{DEFAULT_SYSTEM_PROMPT, VisionModel},
};

// Sized for a full batch of photos at 10 MB each, plus form overhead.
const MAX_BODY_BYTES: usize = (MAX_IMAGES * 10 + 2) * 1024 * 1024;

/// Shared state handed to every request: the injected vision model and the
/// directory uploads are staged in.
pub struct AppState {
    pub model: Arc<dyn VisionModel>,
    pub upload_dir: PathBuf,
}

/// One analyzed image: the original filename paired with the description the
/// vision service produced for it.
#[derive(Debug, Serialize, Deserialize)]
pub struct Analysis {
    pub filename: String,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub results: Vec<Analysis>,
}

/// Builds the application router over the given state.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn health() -> &'static str {
    "OK"
}

/// `POST /upload` — stages the submitted images, analyzes them one at a time
/// and returns the descriptions in submission order.
async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let batch = UploadBatch::from_multipart(&state.upload_dir, multipart).await?;

    log::info!("Processing upload batch of {} image(s)", batch.images.len());

    let results = analyze_batch(state.model.as_ref(), batch).await?;
    Ok(Json(UploadResponse { results }))
}

/// Runs the staged batch through the vision model sequentially.
///
/// The first failure aborts the rest of the batch with no partial results.
/// Scratch files are removed on every path: each image's file is deleted as
/// soon as its analysis completes, and the remaining ones go when the batch
/// is dropped on the error path.
pub async fn analyze_batch(
    model: &dyn VisionModel,
    batch: UploadBatch,
) -> Result<Vec<Analysis>, AppError> {
    let system_prompt = batch
        .prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .to_string();

    let mut results = Vec::with_capacity(batch.images.len());
    for image in batch.images {
        let started = Instant::now();
        let data_uri = image.data_uri()?;
        let description = model.describe(&data_uri, &system_prompt).await?;

        log::info!(
            "Analyzed {} ({} bytes) in {:.2?}",
            image.filename(),
            image.len(),
            started.elapsed()
        );

        results.push(Analysis {
            filename: image.into_filename(),
            description,
        });
    }

    Ok(results)
}

/// Binds `host:port`, walking up to the next port while the requested one is
/// taken. Bind conflicts are common in dev; anything else is fatal.
pub async fn bind_with_retry(host: &str, port: u16) -> io::Result<TcpListener> {
    let mut port = port;
    loop {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let next = port.checked_add(1).ok_or(e)?;
                log::warn!("Port {port} in use, trying {next}");
                port = next;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_retries_the_next_port_on_conflict() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let listener = bind_with_retry("127.0.0.1", port).await.unwrap();
        assert!(listener.local_addr().unwrap().port() > port);
    }
}
