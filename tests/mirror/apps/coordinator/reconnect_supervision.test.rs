// [tests/mirror/apps/coordinator/reconnect_supervision.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL SUPERVISOR DE RECONEXIÓN
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE GRACIA, RECUPERACIÓN Y REINTENTOS
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_coordinator::services::ReconnectSupervisor;
use krakenhashes_coordinator::state::AppState;
use krakenhashes_domain_models::{
    AttackMode, JobExecution, JobStatus, TaskChunk, TaskStatus,
};
use krakenhashes_infra_db::LedgerClient;
use krakenhashes_infra_protocol::AgentHelloPayload;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

async fn ignite_state(memory_tag: &str) -> (AppState, tempfile::TempDir) {
    let data_root = tempfile::tempdir().expect("INFRA_FAULT: temp data root");
    let client = LedgerClient::connect(&format!("file:{}?mode=memory&cache=shared", memory_tag), None)
        .await
        .expect("CRITICAL_FAULT: memory ledger anchor failed.");
    (AppState::new(client, data_root.path().to_path_buf()), data_root)
}

fn long_job() -> JobExecution {
    let now = Utc::now();
    JobExecution {
        id: Uuid::new_v4(),
        hashlist_id: 1,
        attack_mode: AttackMode::BruteForce,
        priority: 5,
        max_agents: 0,
        wordlist_ids: vec![],
        rule_ids: vec![],
        mask: Some("?a?a?a?a?a".into()),
        custom_charsets: vec![],
        increment_mode: false,
        increment_min: None,
        increment_max: None,
        base_keyspace: Some(10_000_000),
        multiplication_factor: 1,
        effective_keyspace: Some(10_000_000),
        is_accurate_keyspace: true,
        avg_rule_multiplier: 1.0,
        uses_rule_splitting: false,
        allow_high_priority_override: false,
        binary_version_id: 1,
        chunk_duration_override: None,
        overall_progress_percent: 0.0,
        status: JobStatus::Running,
        error_message: None,
        created_at: now,
        updated_at: now,
    }
}

fn million_chunk(job_id: Uuid) -> TaskChunk {
    TaskChunk {
        id: Uuid::new_v4(),
        job_id,
        increment_layer_id: None,
        agent_id: None,
        chunk_number: 1,
        keyspace_start: 0,
        keyspace_end: 1_000_000,
        keyspace_processed: 0,
        effective_keyspace_start: 0,
        effective_keyspace_end: 1_000_000,
        chunk_actual_keyspace: None,
        is_actual_keyspace: false,
        is_keyspace_split: true,
        is_rule_split: false,
        rule_start_index: None,
        rule_end_index: None,
        rule_chunk_path: None,
        chunk_duration_seconds: 1200,
        progress_percent: 0.0,
        hash_rate: 0,
        retry_count: 0,
        expected_crack_count: 0,
        received_crack_count: 0,
        batches_complete: false,
        detailed_status: None,
        status: TaskStatus::Pending,
        started_at: None,
        completed_at: None,
        error_message: None,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Escenario soberano: caída a mitad de fragmento, reconexión dentro
    /// de gracia con progreso intacto, y expiración con reset + reintento.
    #[tokio::test]
    async fn certify_disconnect_recover_and_grace_expiry() {
        println!("\n🕸️  [INICIO]: Auditoría del circuito de reconexión...");
        let (application_state, _data_root) = ignite_state("mem_reconnect_flow").await;

        let alpha = application_state.agents().register_agent("UNIT_ALPHA").await.expect("alpha");
        let job = long_job();
        application_state.jobs().create_job(&job).await.expect("seed job");

        let task = million_chunk(job.id);
        application_state.tasks().create_task(&task).await.expect("seed task");
        application_state.tasks().mark_assigned(task.id, alpha.id).await.expect("claim");
        application_state.tasks().mark_running(task.id).await.expect("running");
        application_state
            .tasks()
            .update_progress(task.id, 500_000, 50_000, 50.0, None)
            .await
            .expect("mid-flight progress");

        let supervisor = ReconnectSupervisor::new(application_state.clone());

        // --- FASE 1: DESCONEXIÓN -> GRACIA ---
        supervisor.on_agent_disconnect(alpha.id).await.expect("disconnect");

        let in_grace = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(in_grace.status, TaskStatus::ReconnectPending);
        assert_eq!(in_grace.agent_id, None);

        let freed = application_state.agents().fetch_agent(alpha.id).await.expect("refetch");
        assert!(!freed.metadata.busy_status);
        println!("   ✅ Fase 1: tarea en gracia, agente liberado.");

        // --- FASE 2: RECONEXIÓN CON TAREA REPORTADA ---
        let hello = AgentHelloPayload {
            agent_name: "UNIT_ALPHA".into(),
            active_task_id: Some(task.id),
            keyspace_processed: Some(500_000),
        };
        let refreshed_alpha = application_state.agents().fetch_agent(alpha.id).await.expect("refetch");
        supervisor.on_agent_reconnect(&refreshed_alpha, &hello).await.expect("reconnect");

        let recovered = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(recovered.status, TaskStatus::Running);
        assert_eq!(recovered.agent_id, Some(alpha.id));
        assert_eq!(recovered.keyspace_processed, 500_000, "progress must survive the outage");
        assert_eq!(recovered.retry_count, 0, "directed recovery must not consume a retry");

        let rebound = application_state.agents().fetch_agent(alpha.id).await.expect("refetch");
        assert!(rebound.metadata.busy_status);
        assert_eq!(rebound.metadata.current_task_id, Some(task.id));
        println!("   ✅ Fase 2: recuperación dirigida con offset 500000 intacto.");

        // --- FASE 3: EXPIRACIÓN DE GRACIA -> RESET CON REINTENTO ---
        application_state
            .settings()
            .set_setting("reconnect_grace_seconds", "0")
            .await
            .expect("shrink grace");
        let tight_tuning = application_state.settings().load_tuning().await.expect("tuning");
        application_state.replace_tuning(tight_tuning);

        supervisor.on_agent_disconnect(alpha.id).await.expect("second outage");
        sleep(Duration::from_millis(100)).await;
        supervisor.sweep_expired_grace().await.expect("grace sweep");

        let reset = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(reset.status, TaskStatus::Pending);
        assert_eq!(reset.agent_id, None);
        assert_eq!(reset.retry_count, 1, "grace expiry consumes one retry");
        assert_eq!(reset.keyspace_processed, 500_000);
        println!("   ✅ Fase 3: expiración de gracia con reset y reintento consumido.");
    }

    /// Reintentos agotados: el fragmento falla permanentemente y el
    /// fallo aflora al trabajo.
    #[tokio::test]
    async fn certify_retry_exhaustion() {
        let (application_state, _data_root) = ignite_state("mem_reconnect_exhaust").await;

        application_state
            .settings()
            .set_setting("reconnect_grace_seconds", "0")
            .await
            .expect("shrink grace");
        let tight_tuning = application_state.settings().load_tuning().await.expect("tuning");
        application_state.replace_tuning(tight_tuning.clone());

        let delta = application_state.agents().register_agent("UNIT_DELTA").await.expect("delta");
        let job = long_job();
        application_state.jobs().create_job(&job).await.expect("seed job");

        let task = million_chunk(job.id);
        application_state.tasks().create_task(&task).await.expect("seed task");

        let supervisor = ReconnectSupervisor::new(application_state.clone());

        // Tres ciclos caída/expiración agotan los reintentos nominales.
        for expected_retry in 1..=tight_tuning.max_chunk_retry_attempts {
            application_state.tasks().mark_assigned(task.id, delta.id).await.expect("claim");
            supervisor.on_agent_disconnect(delta.id).await.expect("outage");
            sleep(Duration::from_millis(100)).await;
            supervisor.sweep_expired_grace().await.expect("sweep");

            let cycled = application_state.tasks().fetch_task(task.id).await.expect("refetch");
            assert_eq!(cycled.status, TaskStatus::Pending);
            assert_eq!(cycled.retry_count, expected_retry);
        }

        // Cuarta caída: sin reintentos restantes, fallo permanente.
        application_state.tasks().mark_assigned(task.id, delta.id).await.expect("claim");
        supervisor.on_agent_disconnect(delta.id).await.expect("final outage");
        sleep(Duration::from_millis(100)).await;
        supervisor.sweep_expired_grace().await.expect("final sweep");

        let dead_task = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(dead_task.status, TaskStatus::Failed);

        let dead_job = application_state.jobs().fetch_job(job.id).await.expect("refetch");
        assert_eq!(dead_job.status, JobStatus::Failed);
        assert_eq!(dead_job.error_message.as_deref(), Some("reconnect retries exhausted"));
    }
}
