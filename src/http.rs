//! Thin HTTP surface over the engine.
//!
//! No business logic lives here: handlers deserialize a request, call the
//! engine, and map the typed failure kinds onto status codes. Actor
//! identity arrives pre-authenticated in the request body; issuing it is
//! out of scope.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::engine::Engine;
use crate::error::TransitionError;
use crate::job::{Actor, Job, JobDraft, JobStatus};
use crate::store::DetailEdit;

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/{id}", get(get_job).patch(edit_job).delete(delete_job))
        .route("/jobs/{id}/transition", post(transition))
        .route("/jobs/{id}/assign", post(assign))
        .route("/jobs/{id}/reassign", post(reassign))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

/// Map a typed core failure onto transport semantics.
struct ApiError(TransitionError);

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TransitionError::JobNotFound(_) | TransitionError::ActorNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            TransitionError::Conflict { .. } => StatusCode::CONFLICT,
            TransitionError::NotAssigned { .. } => StatusCode::FORBIDDEN,
            TransitionError::InvalidTransition(_)
            | TransitionError::MissingRequiredNote
            | TransitionError::InvalidAssignee(_)
            | TransitionError::TerminalState(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TransitionError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            error: self.0.to_string(),
            kind: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[derive(Debug, Deserialize)]
struct CreateJobRequest {
    #[serde(flatten)]
    draft: JobDraft,
    actor: Actor,
}

async fn create_job(
    State(engine): State<Arc<Engine>>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = engine.create_job(req.draft, &req.actor).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn list_jobs(State(engine): State<Arc<Engine>>) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(engine.list_jobs().await?))
}

async fn get_job(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(engine.get_job(id).await?))
}

#[derive(Debug, Deserialize)]
struct TransitionRequest {
    target_status: JobStatus,
    actor: Actor,
    notes: Option<String>,
}

async fn transition(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Job>, ApiError> {
    let job = engine
        .transition(id, req.target_status, &req.actor, req.notes)
        .await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
struct AssignmentRequest {
    technician_id: Uuid,
    actor: Actor,
    notes: Option<String>,
}

async fn assign(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignmentRequest>,
) -> Result<Json<Job>, ApiError> {
    let job = engine
        .assign(id, req.technician_id, &req.actor, req.notes)
        .await?;
    Ok(Json(job))
}

async fn reassign(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignmentRequest>,
) -> Result<Json<Job>, ApiError> {
    let job = engine
        .reassign(id, req.technician_id, &req.actor, req.notes)
        .await?;
    Ok(Json(job))
}

async fn edit_job(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<Uuid>,
    Json(edit): Json<DetailEdit>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(engine.edit_details(id, edit).await?))
}

async fn delete_job(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    engine.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::PolicyViolation;

    fn status_of(err: TransitionError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn failure_kinds_map_to_expected_status_codes() {
        let id = Uuid::new_v4();
        assert_eq!(status_of(TransitionError::JobNotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(TransitionError::ActorNotFound(id)), StatusCode::NOT_FOUND);
        assert_eq!(status_of(TransitionError::stale_conflict()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(TransitionError::NotAssigned { job_id: id, actor_id: id }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(TransitionError::MissingRequiredNote),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(TransitionError::InvalidAssignee(id)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(TransitionError::TerminalState(id)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(TransitionError::InvalidTransition(
                PolicyViolation::AlreadyInStatus(JobStatus::Billed)
            )),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
