//! Admin API handlers.

use crate::error::{PanelError, SyncError};
use crate::server::{Applied, PanelStatus, ProxyPanel};
use crate::sync::SyncStatus;
use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use panel_core::{is_expired, make_proxy_links, ProxyEndpoint};
use panel_types::{Client, ClientId, ClientPatch, NewClient};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Error body `{ "error": "..." }` with a matching status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("client not found: {id}"),
        }
    }
}

impl From<PanelError> for ApiError {
    fn from(err: PanelError) -> Self {
        let status = match &err {
            PanelError::Validation(_) => StatusCode::BAD_REQUEST,
            PanelError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("API error: {}", err);
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// A stored client as shown to the operator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientView {
    /// The stored record.
    #[serde(flatten)]
    pub client: Client,
    /// Whether the client is past its expiry.
    pub expired: bool,
    /// `https://t.me/proxy?...`
    pub proxy_link: String,
    /// `tg://proxy?...`
    pub tg_link: String,
}

impl ClientView {
    fn new(client: Client, endpoint: &ProxyEndpoint) -> Self {
        let links = make_proxy_links(endpoint, &client.secret);
        Self {
            expired: is_expired(client.expires_at, Utc::now()),
            proxy_link: links.proxy_link,
            tg_link: links.tg_link,
            client,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClientResponse {
    client: ClientView,
    sync_status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteResponse {
    ok: bool,
    sync_status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CleanupResponse {
    ok: bool,
    removed: usize,
    sync_status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    sync_error: Option<String>,
}

/// Body of `GET /api/clients`.
#[derive(Debug, Serialize)]
pub struct ClientList {
    /// Clients, newest first.
    pub clients: Vec<ClientView>,
}

fn sync_error(result: &Result<(), SyncError>) -> Option<String> {
    result.as_ref().err().map(ToString::to_string)
}

fn parse_id(raw: &str) -> ApiResult<ClientId> {
    raw.parse().map_err(|_| ApiError::not_found(raw))
}

async fn client_response(panel: &ProxyPanel, applied: Applied<Client>) -> ClientResponse {
    let endpoint = panel.proxy_endpoint().await;
    ClientResponse {
        client: ClientView::new(applied.value, &endpoint),
        sync_status: panel.status().await.sync_status,
        sync_error: sync_error(&applied.sync),
    }
}

/// `GET /api/status`
pub async fn status(Extension(panel): Extension<Arc<ProxyPanel>>) -> Json<PanelStatus> {
    Json(panel.status().await)
}

/// `GET /api/clients`, newest first.
pub async fn list_clients(Extension(panel): Extension<Arc<ProxyPanel>>) -> Json<ClientList> {
    let endpoint = panel.proxy_endpoint().await;
    let mut clients = panel.list_clients().await;
    clients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(ClientList {
        clients: clients
            .into_iter()
            .map(|client| ClientView::new(client, &endpoint))
            .collect(),
    })
}

/// `GET /api/clients/:id`
pub async fn get_client(
    Extension(panel): Extension<Arc<ProxyPanel>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ClientView>> {
    let id = parse_id(&id)?;
    let client = panel.get_client(&id).await?;
    let endpoint = panel.proxy_endpoint().await;
    Ok(Json(ClientView::new(client, &endpoint)))
}

/// `POST /api/clients`
pub(crate) async fn create_client(
    Extension(panel): Extension<Arc<ProxyPanel>>,
    input: Result<Json<NewClient>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ClientResponse>)> {
    let Json(input) = input?;
    let applied = panel.create_client(input).await?;
    let body = client_response(&panel, applied).await;
    Ok((StatusCode::CREATED, Json(body)))
}

/// `PUT /api/clients/:id`
pub(crate) async fn update_client(
    Extension(panel): Extension<Arc<ProxyPanel>>,
    Path(id): Path<String>,
    patch: Result<Json<ClientPatch>, JsonRejection>,
) -> ApiResult<Json<ClientResponse>> {
    let id = parse_id(&id)?;
    let Json(patch) = patch?;
    let applied = panel.update_client(&id, patch).await?;
    Ok(Json(client_response(&panel, applied).await))
}

/// `DELETE /api/clients/:id`
pub(crate) async fn delete_client(
    Extension(panel): Extension<Arc<ProxyPanel>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = parse_id(&id)?;
    let applied = panel.delete_client(&id).await?;
    Ok(Json(DeleteResponse {
        ok: true,
        sync_status: panel.status().await.sync_status,
        sync_error: sync_error(&applied.sync),
    }))
}

/// `POST /api/sync`
pub async fn manual_sync(Extension(panel): Extension<Arc<ProxyPanel>>) -> Response {
    let result = panel.trigger_manual_sync().await;
    let sync_status = panel.status().await.sync_status;
    match result {
        Ok(()) => Json(json!({ "ok": true, "syncStatus": sync_status })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string(), "syncStatus": sync_status })),
        )
            .into_response(),
    }
}

/// `POST /api/cleanup-expired`
pub(crate) async fn cleanup_expired(
    Extension(panel): Extension<Arc<ProxyPanel>>,
) -> ApiResult<Json<CleanupResponse>> {
    let report = panel.trigger_cleanup().await?;
    Ok(Json(CleanupResponse {
        ok: true,
        removed: report.outcome.removed,
        sync_status: panel.status().await.sync_status,
        sync_error: report.sync.as_ref().and_then(sync_error),
    }))
}
