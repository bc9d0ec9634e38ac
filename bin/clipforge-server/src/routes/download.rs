//! Serves rendered clips from the output directory.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{HeaderValue, header};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use clipforge_core::OutputFormat;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(download))]
pub struct DownloadApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download/{filename}", get(download))
}

#[utoipa::path(
    get,
    path = "/api/v1/download/{filename}",
    tag = "download",
    params(("filename" = String, Path, description = "Clip file name, e.g. `<task_id>.mp4`")),
    responses(
        (status = 200, description = "Clip contents", body = Vec<u8>, content_type = "video/mp4"),
        (status = 400, description = "Invalid file name"),
        (status = 404, description = "No such clip"),
    )
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    request: Request,
) -> Result<Response, ServerError> {
    // Only bare file names inside the output directory are served.
    if filename.is_empty()
        || filename.contains(['/', '\\'])
        || filename.contains("..")
    {
        return Err(ServerError::BadRequest(format!("invalid file name '{filename}'")));
    }

    let path = state.config.output_dir.join(&filename);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ServerError::NotFound("Video file not found".into())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ServerError::NotFound("Video file not found".into()));
        }
        Err(e) => {
            return Err(ServerError::Internal(format!(
                "failed to stat {}: {e}",
                path.display()
            )));
        }
    }

    let content_type = std::path::Path::new(&filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(OutputFormat::from_extension)
        .map_or("application/octet-stream", |format| format.mime_type());

    // ServeFile streams the body in chunks and handles range requests.
    let mut response = match ServeFile::new_with_mime(
        &path,
        &content_type
            .parse::<mime::Mime>()
            .expect("static content types are valid MIME types"),
    )
        .oneshot(request)
        .await
    {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| ServerError::BadRequest(format!("invalid file name '{filename}': {e}")))?;
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}
