// [tests/mirror/apps/coordinator/refinement_guards.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE REFINAMIENTO PROGRESIVO
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE ACTUALS RULE-SPLIT, CASCADA Y GUARDIAS
 *
 * Regresión de la ambigüedad documentada: los dos guardias
 * (solo rule-split sella actuals; keyspace-split jamás) se preservan
 * tal cual, y el total del trabajo nunca colapsa a cero.
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_coordinator::services::ProgressIngestor;
use krakenhashes_coordinator::state::AppState;
use krakenhashes_domain_models::{
    AttackMode, Hashlist, JobExecution, JobStatus, TaskChunk, TaskStatus,
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

fn rule_split_job() -> JobExecution {
    let now = Utc::now();
    JobExecution {
        id: Uuid::new_v4(),
        hashlist_id: 5,
        attack_mode: AttackMode::Straight,
        priority: 5,
        max_agents: 0,
        wordlist_ids: vec![1],
        rule_ids: vec![1],
        mask: None,
        custom_charsets: vec![],
        increment_mode: false,
        increment_min: None,
        increment_max: None,
        base_keyspace: Some(100),
        multiplication_factor: 100,
        effective_keyspace: Some(10_000),
        is_accurate_keyspace: false,
        avg_rule_multiplier: 1.0,
        uses_rule_splitting: true,
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

fn rule_chunk(
    job_id: Uuid,
    chunk_number: u32,
    rule_start: u64,
    rule_end: u64,
    effective_start: u64,
    effective_end: u64,
) -> TaskChunk {
    TaskChunk {
        id: Uuid::new_v4(),
        job_id,
        increment_layer_id: None,
        agent_id: None,
        chunk_number,
        keyspace_start: 0,
        keyspace_end: 100,
        keyspace_processed: 0,
        effective_keyspace_start: effective_start,
        effective_keyspace_end: effective_end,
        chunk_actual_keyspace: None,
        is_actual_keyspace: false,
        is_keyspace_split: false,
        is_rule_split: true,
        rule_start_index: Some(rule_start),
        rule_end_index: Some(rule_end),
        rule_chunk_path: Some(format!("rules/chunks/job_{}/chunk_{}.rule", job_id, chunk_number)),
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

fn marker_frame(task_id: Uuid, observed_total: u64) -> ProgressPayload {
    ProgressPayload {
        task_id,
        keyspace_processed: 10,
        effective_progress: 10,
        progress_percent: 10.0,
        hash_rate: 1_000,
        total_effective_keyspace: Some(observed_total),
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

    /// Un actual rule-split sella el fragmento, desplaza en cascada los
    /// límites posteriores y refina el total del trabajo.
    #[tokio::test]
    async fn certify_actual_cascade_and_progressive_total() {
        println!("\n📐 [INICIO]: Auditoría del refinamiento progresivo...");
        let (application_state, _data_root) = ignite_state("mem_refine_cascade").await;

        application_state
            .hashlists()
            .create_hashlist(&Hashlist {
                id: 5,
                name: "steady".into(),
                hash_type_id: 0,
                client_id: None,
                total_hashes: 10,
                cracked_hashes: 0,
                excluded_from_potfile: false,
            })
            .await
            .expect("seed hashlist");

        let alpha = application_state.agents().register_agent("UNIT_ALPHA").await.expect("alpha");
        let job = rule_split_job();
        application_state.jobs().create_job(&job).await.expect("seed job");

        // Tres cortes de 10 reglas: estimación 1000 efectivas cada uno.
        let chunk_1 = rule_chunk(job.id, 1, 0, 10, 0, 1_000);
        let chunk_2 = rule_chunk(job.id, 2, 10, 20, 1_000, 2_000);
        let chunk_3 = rule_chunk(job.id, 3, 20, 30, 2_000, 3_000);
        for chunk in [&chunk_1, &chunk_2, &chunk_3] {
            application_state.tasks().create_task(chunk).await.expect("seed chunk");
        }
        application_state.tasks().mark_assigned(chunk_1.id, alpha.id).await.expect("claim");

        let ingestor = ProgressIngestor::new(application_state.clone());

        // El marcador del corte 1 reporta 800 reales (estimadas 1000).
        ingestor.ingest(alpha.id, marker_frame(chunk_1.id, 800)).await.expect("marker");

        let sealed = application_state.tasks().fetch_task(chunk_1.id).await.expect("refetch");
        assert!(sealed.is_actual_keyspace);
        assert_eq!(sealed.chunk_actual_keyspace, Some(800));
        assert_eq!(sealed.effective_keyspace_end, 800);

        // CASCADA: los cortes 2 y 3 se desplazan coherentemente.
        let shifted_2 = application_state.tasks().fetch_task(chunk_2.id).await.expect("refetch");
        assert_eq!(shifted_2.effective_keyspace_start, 800);
        assert_eq!(shifted_2.effective_keyspace_end, 1_800);
        let shifted_3 = application_state.tasks().fetch_task(chunk_3.id).await.expect("refetch");
        assert_eq!(shifted_3.effective_keyspace_start, 1_800);
        assert_eq!(shifted_3.effective_keyspace_end, 2_800);
        println!("   ✅ Cascada de límites efectivos certificada.");

        // REFINAMIENTO: 800 reales / 10 reglas × 90 restantes + 800 = 8000.
        let refined = application_state.jobs().fetch_job(job.id).await.expect("refetch");
        assert_eq!(refined.effective_keyspace, Some(8_000));
        println!("   ✅ Total progresivo 10000 -> 8000 certificado.");

        // GUARDIA DE RE-SELLADO: un segundo marcador no re-escribe.
        ingestor.ingest(alpha.id, marker_frame(chunk_1.id, 850)).await.expect("re-marker");
        let still_sealed = application_state.tasks().fetch_task(chunk_1.id).await.expect("refetch");
        assert_eq!(still_sealed.chunk_actual_keyspace, Some(800));
        println!("   ✅ Guardia de actual único por fragmento certificada.");
    }

    /// Escenario incremental ?d?d?d a ?d?d?d?d?d: tres capas de 1000,
    /// 10000 y 100000. El marcador de la PRIMERA tarea de la capa 1
    /// cristaliza la capa y el total del trabajo (Σ capas = 111000).
    #[tokio::test]
    async fn certify_layer_marker_crystallization() {
        use krakenhashes_coordinator::services::{JobIntakeService, JobSubmissionRequest};

        let (application_state, _data_root) = ignite_state("mem_refine_layers").await;

        application_state
            .hashlists()
            .create_hashlist(&Hashlist {
                id: 6,
                name: "digits".into(),
                hash_type_id: 0,
                client_id: None,
                total_hashes: 10,
                cracked_hashes: 0,
                excluded_from_potfile: false,
            })
            .await
            .expect("seed hashlist");
        application_state
            .catalog()
            .register_binary(1, "hashcat.bin", "7.0.0")
            .await
            .expect("seed binary");

        let intake = JobIntakeService::new(application_state.clone());
        let job = intake
            .submit_job(JobSubmissionRequest {
                hashlist_id: 6,
                attack_mode: 3,
                priority: 5,
                max_agents: 0,
                wordlist_ids: vec![],
                rule_ids: vec![],
                mask: Some("?d?d?d?d?d".into()),
                custom_charsets: vec![],
                increment_mode: true,
                increment_min: Some(3),
                increment_max: Some(5),
                allow_high_priority_override: false,
                binary_version_id: 1,
                chunk_duration_override: None,
            })
            .await
            .expect("layered submission");

        let layers = application_state.jobs().fetch_layers(job.id).await.expect("layers");
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].base_keyspace, 1_000);
        assert_eq!(layers[1].base_keyspace, 10_000);
        assert_eq!(layers[2].base_keyspace, 100_000);
        assert_eq!(job.effective_keyspace, Some(111_000));
        assert!(!job.is_accurate_keyspace);

        // Primera tarea de la capa 1, keyspace-split sobre [0, 1000).
        let gamma = application_state.agents().register_agent("UNIT_GAMMA").await.expect("gamma");
        let mut layer_task = rule_chunk(job.id, 1, 0, 0, 0, 1_000);
        layer_task.is_rule_split = false;
        layer_task.is_keyspace_split = true;
        layer_task.rule_start_index = None;
        layer_task.rule_end_index = None;
        layer_task.rule_chunk_path = None;
        layer_task.increment_layer_id = Some(layers[0].id);
        layer_task.keyspace_end = 1_000;
        application_state.tasks().create_task(&layer_task).await.expect("seed layer task");
        application_state.tasks().mark_assigned(layer_task.id, gamma.id).await.expect("claim");

        let ingestor = ProgressIngestor::new(application_state.clone());
        ingestor.ingest(gamma.id, marker_frame(layer_task.id, 1_000)).await.expect("layer marker");

        // Capa 1 sellada; trabajo accurate con Σ capas.
        let sealed_layer = application_state.jobs().fetch_layer(layers[0].id).await.expect("layer");
        assert!(sealed_layer.is_accurate_keyspace);
        assert_eq!(sealed_layer.effective_keyspace, 1_000);

        let sealed_job = application_state.jobs().fetch_job(job.id).await.expect("refetch");
        assert!(sealed_job.is_accurate_keyspace);
        assert_eq!(sealed_job.effective_keyspace, Some(111_000));

        // La capa entró en running y el fragmento NO selló actual
        // (guardia keyspace-split intacta en tareas de capa).
        let running_layer_task = application_state.tasks().fetch_task(layer_task.id).await.expect("task");
        assert_eq!(running_layer_task.chunk_actual_keyspace, None);
        assert!(!running_layer_task.is_actual_keyspace);
        assert_eq!(running_layer_task.status, TaskStatus::Running);
    }

    /// Guardia keyspace-split: el marcador reporta el total del TRABAJO
    /// y jamás contamina el fragmento ni dispara cascada.
    #[tokio::test]
    async fn certify_keyspace_split_marker_guard() {
        let (application_state, _data_root) = ignite_state("mem_refine_guard").await;

        application_state
            .hashlists()
            .create_hashlist(&Hashlist {
                id: 5,
                name: "steady".into(),
                hash_type_id: 0,
                client_id: None,
                total_hashes: 10,
                cracked_hashes: 0,
                excluded_from_potfile: false,
            })
            .await
            .expect("seed hashlist");

        let beta = application_state.agents().register_agent("UNIT_BETA").await.expect("beta");

        let mut job = rule_split_job();
        job.uses_rule_splitting = false;
        application_state.jobs().create_job(&job).await.expect("seed job");

        let mut mask_chunk = rule_chunk(job.id, 1, 0, 0, 0, 1_000);
        mask_chunk.is_rule_split = false;
        mask_chunk.is_keyspace_split = true;
        mask_chunk.rule_start_index = None;
        mask_chunk.rule_end_index = None;
        mask_chunk.rule_chunk_path = None;
        application_state.tasks().create_task(&mask_chunk).await.expect("seed chunk");
        application_state.tasks().mark_assigned(mask_chunk.id, beta.id).await.expect("claim");

        let ingestor = ProgressIngestor::new(application_state.clone());
        ingestor.ingest(beta.id, marker_frame(mask_chunk.id, 10_000)).await.expect("marker");

        let untouched = application_state.tasks().fetch_task(mask_chunk.id).await.expect("refetch");
        assert_eq!(untouched.chunk_actual_keyspace, None);
        assert!(!untouched.is_actual_keyspace);
        assert_eq!(untouched.effective_keyspace_end, 1_000);

        // El total del trabajo tampoco se toca por esta vía.
        let job_after = application_state.jobs().fetch_job(job.id).await.expect("refetch");
        assert_eq!(job_after.effective_keyspace, Some(10_000));
        assert!(job_after.effective_keyspace != Some(0), "total must never collapse to zero");
    }
}
