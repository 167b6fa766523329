// [apps/coordinator/src/handlers/admin.rs]
/*!
 * =================================================================
 * APARATO: ADMIN SURFACE HANDLERS
 * CLASIFICACIÓN: API HANDLER (ESTRATO L4)
 * RESPONSABILIDAD: SUPERFICIE MÍNIMA DE ALTA, CONSULTA Y CANCELACIÓN
 *
 * Superficie deliberadamente delgada: el CRUD de recursos, usuarios y
 * autenticación viven fuera del núcleo de planificación.
 * =================================================================
 */

use crate::services::{JobIntakeService, JobSubmissionRequest, TaskLifecycleService};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::{error, instrument};
use uuid::Uuid;

/// Latido de infraestructura.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "operational" }))
}

/// Alta de un trabajo de auditoría.
#[instrument(skip(application_state, request))]
pub async fn submit_job(
    State(application_state): State<AppState>,
    Json(request): Json<JobSubmissionRequest>,
) -> impl IntoResponse {
    let intake = JobIntakeService::new(application_state);

    match intake.submit_job(request).await {
        Ok(job) => (StatusCode::CREATED, Json(json!({ "job": job }))),
        Err(intake_fault) => {
            error!("❌ [ADMIN]: Job submission rejected: {}", intake_fault);
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "error": intake_fault.to_string() })),
            )
        }
    }
}

/// Detalle de un trabajo con el rollup de sus fragmentos.
#[instrument(skip(application_state))]
pub async fn job_detail(
    State(application_state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    let job = match application_state.jobs().fetch_job(job_id).await {
        Ok(job) => job,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "JOB_NOT_FOUND" })),
            )
        }
    };

    let spans = application_state.tasks().fetch_spans_for_job(job_id).await.unwrap_or_default();
    let layers = application_state.jobs().fetch_layers(job_id).await.unwrap_or_default();

    let task_rollup: Vec<_> = spans
        .iter()
        .map(|span| {
            json!({
                "task_id": span.task_id,
                "chunk_number": span.chunk_number,
                "status": span.status,
                "effective_start": span.effective_start,
                "effective_end": span.effective_end,
                "is_rule_split": span.is_rule_split,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({
            "job": job,
            "layers": layers,
            "tasks": task_rollup,
        })),
    )
}

/// Cancelación administrativa de un trabajo.
#[instrument(skip(application_state))]
pub async fn cancel_job(
    State(application_state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> impl IntoResponse {
    let lifecycle = TaskLifecycleService::new(application_state);

    match lifecycle.cancel_job(job_id).await {
        Ok(stopped_chunks) => (
            StatusCode::OK,
            Json(json!({ "cancelled": true, "chunks_stopped": stopped_chunks })),
        ),
        Err(cancel_fault) => {
            error!("❌ [ADMIN]: Cancellation of job [{}] failed: {}", job_id, cancel_fault);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": cancel_fault.to_string() })),
            )
        }
    }
}

/// Inventario de agentes con su estado de canal vivo.
#[instrument(skip(application_state))]
pub async fn list_agents(State(application_state): State<AppState>) -> impl IntoResponse {
    match application_state.agents().fetch_all().await {
        Ok(agents) => {
            let enriched: Vec<_> = agents
                .iter()
                .map(|agent| {
                    json!({
                        "agent": agent,
                        "channel_connected": application_state.registry().is_connected(agent.id),
                    })
                })
                .collect();
            (StatusCode::OK, Json(json!({ "agents": enriched })))
        }
        Err(listing_fault) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": listing_fault.to_string() })),
        ),
    }
}
