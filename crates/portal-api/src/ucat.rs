use std::collections::HashSet;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::future::{join, join_all};
use tracing::{info, warn};
use uuid::Uuid;

use portal_core::access::can_edit_records;
use portal_core::scores::{chronological, validate_mock};
use portal_types::api::{BulkOutcome, BulkUcatEntry, BulkUcatRequest, BulkUcatResponse, UcatMockInput};
use portal_types::models::RecordId;

use crate::error::ApiError;
use crate::session::Session;
use crate::state::AppState;

pub(crate) fn ensure_can_edit(session: &Session, student_id: Uuid) -> Result<(), ApiError> {
    if can_edit_records(session.actor(), student_id) {
        Ok(())
    } else {
        Err(ApiError::forbidden("only the student or an admin may change these records"))
    }
}

/// GET /students/{id}/ucat: oldest sitting first.
pub async fn list_mocks(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    session.ensure_student(&state, student_id).await?;
    let mut mocks = state.with_db(move |db| Ok(db.mocks_for(student_id)?)).await?;
    chronological(&mut mocks);
    Ok(Json(mocks))
}

/// POST /students/{id}/ucat
pub async fn create_mock(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
    Json(req): Json<UcatMockInput>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_can_edit(&session, student_id)?;
    let total = validate_mock(&req)?;
    session.ensure_student(&state, student_id).await?;

    let mock = state
        .with_db(move |db| Ok(db.insert_mock(student_id, &req, total)?))
        .await?;
    info!("Recorded mock {} for {} (total {})", mock.id, student_id, mock.total);
    Ok((StatusCode::CREATED, Json(mock)))
}

/// PUT /students/{id}/ucat: saves the whole mock list at once.
///
/// Temporary ids are inserted, persisted ids updated, and stored mocks absent
/// from the request deleted. Each operation stands alone: one failure does not
/// undo the others, and every outcome is reported.
pub async fn save_all_mocks(
    State(state): State<AppState>,
    session: Session,
    Path(student_id): Path<Uuid>,
    Json(req): Json<BulkUcatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_can_edit(&session, student_id)?;
    session.ensure_student(&state, student_id).await?;

    let existing: Vec<Uuid> = state
        .with_db(move |db| Ok(db.mocks_for(student_id)?.into_iter().map(|m| m.id).collect()))
        .await?;
    let kept: HashSet<Uuid> = req.entries.iter().filter_map(|e| e.id.persisted()).collect();

    let saves = req
        .entries
        .into_iter()
        .map(|entry| save_entry(&state, student_id, entry));
    let deletes = existing
        .into_iter()
        .filter(|id| !kept.contains(id))
        .map(|id| delete_entry(&state, student_id, id));

    let (saved, deleted) = join(join_all(saves), join_all(deletes)).await;

    let failures = saved.iter().chain(&deleted).filter(|o| o.error.is_some()).count();
    info!(
        "Bulk mock save for {}: {} saved, {} deleted, {} failed",
        student_id,
        saved.len(),
        deleted.len(),
        failures
    );
    Ok(Json(BulkUcatResponse { saved, deleted }))
}

async fn save_entry(state: &AppState, student_id: Uuid, entry: BulkUcatEntry) -> BulkOutcome {
    let id = entry.id.clone();
    let result = match validate_mock(&entry.mock) {
        Err(e) => Err(ApiError::from(e)),
        Ok(total) => {
            state
                .with_db(move |db| match entry.id {
                    RecordId::Temporary(_) => Ok(db.insert_mock(student_id, &entry.mock, total)?.id),
                    RecordId::Persisted(mock_id) => db
                        .update_mock(mock_id, student_id, &entry.mock, total)?
                        .map(|m| m.id)
                        .ok_or(ApiError::NotFound("mock")),
                })
                .await
        }
    };
    outcome(id, result)
}

async fn delete_entry(state: &AppState, student_id: Uuid, mock_id: Uuid) -> BulkOutcome {
    let result = state
        .with_db(move |db| {
            if db.delete_mock(mock_id, student_id)? {
                Ok(mock_id)
            } else {
                Err(ApiError::NotFound("mock"))
            }
        })
        .await;
    outcome(RecordId::Persisted(mock_id), result)
}

fn outcome(id: RecordId, result: Result<Uuid, ApiError>) -> BulkOutcome {
    match result {
        Ok(persisted) => BulkOutcome {
            id,
            persisted_id: Some(persisted),
            error: None,
        },
        Err(e) => {
            warn!("Bulk mock entry {:?} failed: {}", id, e);
            BulkOutcome {
                id,
                persisted_id: None,
                error: Some(e.to_string()),
            }
        }
    }
}
