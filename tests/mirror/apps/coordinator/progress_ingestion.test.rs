// [tests/mirror/apps/coordinator/progress_ingestion.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE INGESTA DE PROGRESO
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE PROPIEDAD, MONOTONÍA Y AGOTAMIENTO
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_coordinator::services::ProgressIngestor;
use krakenhashes_coordinator::state::AppState;
use krakenhashes_domain_models::{
    AttackMode, JobExecution, JobStatus, TaskChunk, TaskStatus,
};
use krakenhashes_infra_db::LedgerClient;
use krakenhashes_infra_protocol::{ProgressPayload, ReportedTaskStatus};
use uuid::Uuid;

async fn ignite_state(memory_tag: &str) -> (AppState, tempfile::TempDir) {
    let data_root = tempfile::tempdir().expect("INFRA_FAULT: temp data root");
    let client = LedgerClient::connect(&format!("file:{}?mode=memory&cache=shared", memory_tag), None)
        .await
        .expect("CRITICAL_FAULT: memory ledger anchor failed.");
    (AppState::new(client, data_root.path().to_path_buf()), data_root)
}

fn running_job(base_keyspace: u64) -> JobExecution {
    let now = Utc::now();
    JobExecution {
        id: Uuid::new_v4(),
        hashlist_id: 1,
        attack_mode: AttackMode::Straight,
        priority: 5,
        max_agents: 0,
        wordlist_ids: vec![1],
        rule_ids: vec![],
        mask: None,
        custom_charsets: vec![],
        increment_mode: false,
        increment_min: None,
        increment_max: None,
        base_keyspace: Some(base_keyspace),
        multiplication_factor: 1,
        effective_keyspace: Some(base_keyspace),
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

fn keyspace_chunk(job_id: Uuid, start: u64, end: u64) -> TaskChunk {
    TaskChunk {
        id: Uuid::new_v4(),
        job_id,
        increment_layer_id: None,
        agent_id: None,
        chunk_number: 1,
        keyspace_start: start,
        keyspace_end: end,
        keyspace_processed: 0,
        effective_keyspace_start: start,
        effective_keyspace_end: end,
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

fn frame(task_id: Uuid, processed: u64) -> ProgressPayload {
    ProgressPayload {
        task_id,
        keyspace_processed: processed,
        effective_progress: processed,
        progress_percent: 0.0,
        hash_rate: 1_000,
        total_effective_keyspace: None,
        cracked_count: 0,
        cracked_hashes: None,
        status: ReportedTaskStatus::Running,
        all_hashes_cracked: false,
        error_message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Propiedad, monotonía, guardia keyspace-split y agotamiento absoluto.
    #[tokio::test]
    async fn certify_ownership_monotony_and_exhaustion() {
        println!("\n📡 [INICIO]: Auditoría de la ingesta de progreso...");
        let (application_state, _data_root) = ignite_state("mem_progress_core").await;

        let alpha = application_state.agents().register_agent("UNIT_ALPHA").await.expect("alpha");
        let intruder = application_state.agents().register_agent("UNIT_INTRUDER").await.expect("intruder");

        let job = running_job(10_000);
        application_state.jobs().create_job(&job).await.expect("seed job");

        let task = keyspace_chunk(job.id, 0, 10_000);
        application_state.tasks().create_task(&task).await.expect("seed task");
        application_state.tasks().mark_assigned(task.id, alpha.id).await.expect("claim");

        let ingestor = ProgressIngestor::new(application_state.clone());

        // 1. FRAME DE AGENTE AJENO: rechazado sin efecto.
        ingestor.ingest(intruder.id, frame(task.id, 100)).await.expect("foreign frame");
        let untouched = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(untouched.status, TaskStatus::Assigned);
        assert_eq!(untouched.keyspace_processed, 0);
        println!("   ✅ Frame de agente ajeno rechazado.");

        // 2. FRAME HUÉRFANO: descarte silencioso.
        ingestor.ingest(alpha.id, frame(Uuid::new_v4(), 100)).await.expect("orphan frame");

        // 3. PRIMERA SEÑAL: assigned -> running con sello temporal.
        ingestor.ingest(alpha.id, frame(task.id, 500)).await.expect("first frame");
        let alive = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(alive.status, TaskStatus::Running);
        assert!(alive.started_at.is_some());
        assert_eq!(alive.keyspace_processed, 500);

        // 4. GUARDIA KEYSPACE-SPLIT: progress[1] reporta el total del
        //    TRABAJO; jamás se sella como actual del fragmento.
        let mut marker_frame = frame(task.id, 600);
        marker_frame.total_effective_keyspace = Some(10_000);
        ingestor.ingest(alpha.id, marker_frame).await.expect("marker frame");
        let guarded = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(guarded.chunk_actual_keyspace, None);
        assert!(!guarded.is_actual_keyspace);
        println!("   ✅ Guardia keyspace-split sobre progress[1] certificada.");

        // 5. MONOTONÍA: un frame tardío menor no retrocede el progreso.
        ingestor.ingest(alpha.id, frame(task.id, 300)).await.expect("late frame");
        let monotonic = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(monotonic.keyspace_processed, 600);

        // 6. TOPE DE PORCENTAJE.
        let mut overshoot = frame(task.id, 700);
        overshoot.progress_percent = 150.0;
        ingestor.ingest(alpha.id, overshoot).await.expect("overshoot frame");
        let capped = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(capped.progress_percent, 100.0);

        // 7. AGOTAMIENTO ABSOLUTO: processed >= keyspace_end sella la
        //    tarea y, sin trabajo restante, el trabajo entero.
        ingestor.ingest(alpha.id, frame(task.id, 10_000)).await.expect("exhaustion frame");
        let sealed_task = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(sealed_task.status, TaskStatus::Completed);

        let sealed_job = application_state.jobs().fetch_job(job.id).await.expect("refetch");
        assert_eq!(sealed_job.status, JobStatus::Completed);
        assert_eq!(sealed_job.overall_progress_percent, 100.0);

        let freed = application_state.agents().fetch_agent(alpha.id).await.expect("refetch");
        assert!(!freed.metadata.busy_status);
        println!("   ✅ Agotamiento absoluto y liberación del agente certificados.");
    }

    /// Un fallo reportado por el agente es permanente y aflora al trabajo.
    #[tokio::test]
    async fn certify_agent_reported_failure() {
        let (application_state, _data_root) = ignite_state("mem_progress_fail").await;

        let gamma = application_state.agents().register_agent("UNIT_GAMMA").await.expect("gamma");
        let job = running_job(5_000);
        application_state.jobs().create_job(&job).await.expect("seed job");

        let task = keyspace_chunk(job.id, 0, 5_000);
        application_state.tasks().create_task(&task).await.expect("seed task");
        application_state.tasks().mark_assigned(task.id, gamma.id).await.expect("claim");

        let mut failure_frame = frame(task.id, 1_000);
        failure_frame.status = ReportedTaskStatus::Failed;
        failure_frame.error_message = Some("GPU thermal shutdown".into());

        let ingestor = ProgressIngestor::new(application_state.clone());
        ingestor.ingest(gamma.id, failure_frame).await.expect("failure frame");

        let failed_task = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(failed_task.status, TaskStatus::Failed);
        assert_eq!(failed_task.error_message.as_deref(), Some("GPU thermal shutdown"));

        let failed_job = application_state.jobs().fetch_job(job.id).await.expect("refetch");
        assert_eq!(failed_job.status, JobStatus::Failed);
        assert_eq!(failed_job.error_message.as_deref(), Some("GPU thermal shutdown"));

        let freed = application_state.agents().fetch_agent(gamma.id).await.expect("refetch");
        assert!(!freed.metadata.busy_status);
        assert_eq!(freed.metadata.consecutive_failures, 1);
    }
}
