// [apps/coordinator/src/services/router.rs]
/*!
 * =================================================================
 * APARATO: FRAME ROUTER
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DESPACHO EXHAUSTIVO DE TRAMAS ENTRANTES POR TIPO
 *
 * # Invariante (Exhaustive Dispatch):
 * El protocolo es una suma etiquetada cerrada: el match agota todas las
 * variantes y una trama nueva no compila sin decidir su manejador. Las
 * tramas de sentido saliente recibidas aquí son violaciones de
 * protocolo y se descartan con rastro.
 * =================================================================
 */

use crate::services::benchmarks::BenchmarkCoordinator;
use crate::services::cracks::CrackPipeline;
use crate::services::progress::ProgressIngestor;
use crate::state::AppState;
use anyhow::Result;
use krakenhashes_infra_protocol::DispatchFrame;
use tracing::{debug, warn};

pub struct FrameRouter;

impl FrameRouter {
    /// Enruta una trama entrante de un agente concreto. El llamador (el
    /// worker de sesión) procesa tramas en orden de llegada: el orden
    /// por tarea queda garantizado por construcción.
    pub async fn dispatch(
        application_state: &AppState,
        agent_id: i64,
        frame: DispatchFrame,
    ) -> Result<()> {
        match frame {
            // --- TRAMAS ENTRANTES LEGÍTIMAS ---
            DispatchFrame::Heartbeat(_pulse) => {
                application_state.agents().touch_last_seen(agent_id).await?;
                Ok(())
            }

            DispatchFrame::Progress(payload) => {
                let ingestor = ProgressIngestor::new(application_state.clone());
                ingestor.ingest(agent_id, payload).await
            }

            DispatchFrame::CrackBatch(payload) => {
                let pipeline = CrackPipeline::new(application_state.clone());
                pipeline.process_batch(agent_id, payload).await
            }

            DispatchFrame::CrackBatchesComplete(payload) => {
                let pipeline = CrackPipeline::new(application_state.clone());
                pipeline.handle_batches_complete(agent_id, payload).await
            }

            DispatchFrame::BenchmarkResult(payload) => {
                let coordinator = BenchmarkCoordinator::new(application_state.clone());
                coordinator.handle_benchmark_result(agent_id, payload).await
            }

            DispatchFrame::AgentHello(_late_hello) => {
                // La presentación solo es válida como primera trama; la
                // sesión ya la consumió en el handshake.
                debug!("🔁 [ROUTER]: Late agent_hello from #{} ignored.", agent_id);
                Ok(())
            }

            // --- TRAMAS DE SENTIDO SALIENTE (VIOLACIÓN DE PROTOCOLO) ---
            DispatchFrame::TaskAssignment(_)
            | DispatchFrame::JobStop(_)
            | DispatchFrame::ForceCleanup
            | DispatchFrame::BenchmarkRequest(_)
            | DispatchFrame::SyncRequest(_) => {
                warn!(
                    "🚫 [ROUTER]: Agent #{} emitted a coordinator-bound frame; dropped.",
                    agent_id
                );
                Ok(())
            }
        }
    }
}
