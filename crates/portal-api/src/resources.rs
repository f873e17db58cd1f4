use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use portal_core::email::is_valid_url;
use portal_db::models::NewResource;
use portal_types::api::CreateResourceRequest;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

/// GET /resources
pub async fn list_resources(
    State(state): State<AppState>,
    _session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let resources = state.with_db(|db| Ok(db.list_resources()?)).await?;
    Ok(Json(resources))
}

/// POST /resources
pub async fn create_resource(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<CreateResourceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_request("title is required"));
    }
    if !is_valid_url(&req.url) {
        return Err(ApiError::bad_request("url must start with http:// or https://"));
    }

    let created_by = session.user.id;
    let resource = state
        .with_db(move |db| {
            Ok(db.insert_resource(&NewResource {
                title: &title,
                description: req.description.as_deref().map(str::trim).filter(|d| !d.is_empty()),
                category: req.category.as_deref().map(str::trim).filter(|c| !c.is_empty()),
                url: req.url.trim(),
                created_by,
            })?)
        })
        .await?;
    info!("Resource {} added by {}", resource.id, created_by);
    Ok((StatusCode::CREATED, Json(resource)))
}

/// DELETE /resources/{id}
pub async fn delete_resource(
    State(state): State<AppState>,
    session: Session,
    Path(resource_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    session.require_admin()?;
    let removed = state.with_db(move |db| Ok(db.delete_resource(resource_id)?)).await?;
    if !removed {
        return Err(ApiError::NotFound("resource"));
    }
    Ok(StatusCode::NO_CONTENT)
}
