// [apps/coordinator/src/routes.rs]
/*!
 * =================================================================
 * APARATO: COORDINATOR ROUTER
 * CLASIFICACIÓN: API COMPOSITION (ESTRATO L4)
 * RESPONSABILIDAD: MAPA DE RUTAS HTTP Y DEL CANAL DE DESPACHO
 * =================================================================
 */

use crate::handlers::{admin, channel};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_coordinator_router(application_state: AppState) -> Router {
    Router::new()
        // --- INFRAESTRUCTURA ---
        .route("/health", get(admin::health_check))
        // --- CANAL DE DESPACHO (WebSocket por agente) ---
        .route("/ws/agents", get(channel::establish_agent_uplink))
        // --- SUPERFICIE ADMINISTRATIVA MÍNIMA ---
        .route("/api/v1/jobs", post(admin::submit_job))
        .route("/api/v1/jobs/:job_id", get(admin::job_detail))
        .route("/api/v1/jobs/:job_id/cancel", post(admin::cancel_job))
        .route("/api/v1/agents", get(admin::list_agents))
        .layer(TraceLayer::new_for_http())
        .with_state(application_state)
}
