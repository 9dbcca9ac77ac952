// HTTP handlers: format listing, download, health

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::server::AppState;
use crate::downloader::tools::ToolInfo;
use crate::downloader::utils::content_disposition;
use crate::downloader::{FormatsResponse, MediaKind, PreparedDownload};

/// `/get_formats` form body
#[derive(Debug, Deserialize)]
pub struct FormatsForm {
    pub url: Option<String>,
}

/// `/download` form body
#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    pub url: Option<String>,
    pub itag: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub tools: Vec<ToolInfo>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn get_formats(
    State(state): State<AppState>,
    Form(form): Form<FormatsForm>,
) -> Result<Json<FormatsResponse>, ApiError> {
    let url = non_blank(form.url).ok_or_else(|| ApiError::bad_request("No URL provided"))?;

    let listing = state
        .downloader
        .list_formats(&url)
        .await
        .map_err(|e| ApiError::from_download(e, "Failed to fetch video"))?;

    Ok(Json(listing))
}

pub async fn download(
    State(state): State<AppState>,
    Form(form): Form<DownloadForm>,
) -> Result<Response, ApiError> {
    let (url, itag) = match (non_blank(form.url), non_blank(form.itag)) {
        (Some(url), Some(itag)) => (url, itag),
        _ => return Err(ApiError::bad_request("Missing parameters")),
    };
    let itag: u32 = itag
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid itag: {}", itag)))?;
    let kind = match non_blank(form.kind) {
        Some(kind) => kind.parse::<MediaKind>().map_err(ApiError::bad_request)?,
        None => MediaKind::Video,
    };

    let prepared = state
        .downloader
        .prepare_download(&url, itag, kind)
        .await
        .map_err(|e| ApiError::from_download(e, "Failed to download video"))?;

    attachment_response(prepared)
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let tools = state.tools.get_all_tools().await;
    let status = if tools.iter().all(|t| t.is_available) {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status, tools })
}

fn attachment_response(prepared: PreparedDownload) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&content_disposition(&prepared.filename)).map_err(|e| {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Invalid file name: {}", e),
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(prepared.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(prepared.body),
    )
        .into_response())
}
