// [tests/mirror/apps/coordinator/hashlist_completion.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE COMPLETITUD DE HASHLIST
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL BARRIDO job_stop Y DEL DRENAJE FINAL
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_coordinator::services::{CrackPipeline, ProgressIngestor};
use krakenhashes_coordinator::state::AppState;
use krakenhashes_domain_models::{
    AttackMode, CrackedHash, HashRecord, Hashlist, JobExecution, JobStatus, TaskChunk, TaskStatus,
};
use krakenhashes_infra_db::LedgerClient;
use krakenhashes_infra_protocol::{
    CrackBatchPayload, CrackBatchesCompletePayload, DispatchFrame, ProgressPayload,
    ReportedTaskStatus, StopReason,
};
use tokio::time::{sleep, Duration};
use uuid::Uuid;

async fn ignite_state(memory_tag: &str) -> (AppState, tempfile::TempDir) {
    let data_root = tempfile::tempdir().expect("INFRA_FAULT: temp data root");
    let client = LedgerClient::connect(&format!("file:{}?mode=memory&cache=shared", memory_tag), None)
        .await
        .expect("CRITICAL_FAULT: memory ledger anchor failed.");
    (AppState::new(client, data_root.path().to_path_buf()), data_root)
}

fn job_on_hashlist(hashlist_id: i64) -> JobExecution {
    let now = Utc::now();
    JobExecution {
        id: Uuid::new_v4(),
        hashlist_id,
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
        base_keyspace: Some(1_000),
        multiplication_factor: 1,
        effective_keyspace: Some(1_000),
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

fn chunk_for(job_id: Uuid) -> TaskChunk {
    TaskChunk {
        id: Uuid::new_v4(),
        job_id,
        increment_layer_id: None,
        agent_id: None,
        chunk_number: 1,
        keyspace_start: 0,
        keyspace_end: 1_000,
        keyspace_processed: 0,
        effective_keyspace_start: 0,
        effective_keyspace_end: 1_000,
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

    /// Escenario soberano: el frame final con all_hashes_cracked detiene
    /// a los demás consumidores del hashlist (no al disparador), sube los
    /// trabajos a 100% y el disparador cierra tras drenar sus 3 cracks.
    #[tokio::test]
    async fn certify_completion_sweep_and_trigger_drain() {
        println!("\n🏆 [INICIO]: Auditoría de completitud de hashlist...");
        let (application_state, _data_root) = ignite_state("mem_hashlist_done").await;

        // Hashlist a 97/100 con los 3 restantes sembrados.
        application_state
            .hashlists()
            .create_hashlist(&Hashlist {
                id: 9,
                name: "final-sprint".into(),
                hash_type_id: 0,
                client_id: None,
                total_hashes: 100,
                cracked_hashes: 97,
                excluded_from_potfile: false,
            })
            .await
            .expect("seed hashlist");

        let remaining_values = ["aa0001", "aa0002", "aa0003"];
        for value in remaining_values {
            let record = HashRecord {
                id: Uuid::new_v4(),
                hash_value: value.into(),
                username: None,
                hash_type_id: 0,
                is_cracked: false,
                password: None,
                last_updated: Utc::now(),
            };
            application_state.hashes().insert_hash(&record).await.expect("seed hash");
            application_state.hashes().link_hash_to_hashlist(9, record.id).await.expect("link");
        }

        // Dos trabajos sobre el mismo hashlist, un agente cada uno.
        let alpha = application_state.agents().register_agent("UNIT_ALPHA").await.expect("alpha");
        let beta = application_state.agents().register_agent("UNIT_BETA").await.expect("beta");
        let (mut alpha_lane, _epoch_a) = application_state.registry().register(alpha.id);
        let (mut beta_lane, _epoch_b) = application_state.registry().register(beta.id);

        let trigger_job = job_on_hashlist(9);
        let bystander_job = job_on_hashlist(9);
        application_state.jobs().create_job(&trigger_job).await.expect("seed trigger job");
        application_state.jobs().create_job(&bystander_job).await.expect("seed bystander job");

        let trigger_task = chunk_for(trigger_job.id);
        let bystander_task = chunk_for(bystander_job.id);
        for (task, agent_id) in [(&trigger_task, alpha.id), (&bystander_task, beta.id)] {
            application_state.tasks().create_task(task).await.expect("seed task");
            application_state.tasks().mark_assigned(task.id, agent_id).await.expect("claim");
            application_state.tasks().mark_running(task.id).await.expect("running");
        }

        // --- FRAME FINAL: los últimos 3 cracks en un solo reporte ---
        let ingestor = ProgressIngestor::new(application_state.clone());
        ingestor
            .ingest(
                alpha.id,
                ProgressPayload {
                    task_id: trigger_task.id,
                    keyspace_processed: 600,
                    effective_progress: 600,
                    progress_percent: 60.0,
                    hash_rate: 1_000,
                    total_effective_keyspace: None,
                    cracked_count: 3,
                    cracked_hashes: None,
                    status: ReportedTaskStatus::Running,
                    all_hashes_cracked: true,
                    error_message: None,
                },
            )
            .await
            .expect("final frame");

        // El barrido corre asíncrono: breve espera de convergencia.
        sleep(Duration::from_millis(300)).await;

        // Disparador en processing(3); trabajos al 100%.
        let draining = application_state.tasks().fetch_task(trigger_task.id).await.expect("refetch");
        assert_eq!(draining.status, TaskStatus::Processing);
        assert_eq!(draining.expected_crack_count, 3);

        let trigger_after = application_state.jobs().fetch_job(trigger_job.id).await.expect("refetch");
        assert_eq!(trigger_after.overall_progress_percent, 100.0);

        // El espectador recibió job_stop(hashlist_complete) y quedó sellado.
        let beta_frame = tokio::time::timeout(Duration::from_secs(1), beta_lane.recv())
            .await
            .expect("frame deadline")
            .expect("open lane");
        match beta_frame {
            DispatchFrame::JobStop(stop) => {
                assert_eq!(stop.task_id, bystander_task.id);
                assert_eq!(stop.reason, StopReason::HashlistComplete);
            }
            other => panic!("expected job_stop, got {:?}", other),
        }

        let bystander_after = application_state.tasks().fetch_task(bystander_task.id).await.expect("refetch");
        assert_eq!(bystander_after.status, TaskStatus::Completed);

        let bystander_job_after =
            application_state.jobs().fetch_job(bystander_job.id).await.expect("refetch");
        assert_eq!(bystander_job_after.status, JobStatus::Completed);
        println!("   ✅ Barrido job_stop sobre consumidores no disparadores.");

        // EXENCIÓN DEL DISPARADOR: ninguna orden de stop para su tarea.
        while let Ok(frame) = alpha_lane.try_recv() {
            if let DispatchFrame::JobStop(stop) = frame {
                assert_ne!(stop.task_id, trigger_task.id, "trigger task must be exempt");
            }
        }
        println!("   ✅ Exención del disparador certificada.");

        // --- DRENAJE FINAL: 3 cracks + señal de fin de lotes ---
        let pipeline = CrackPipeline::new(application_state.clone());
        pipeline
            .process_batch(
                alpha.id,
                CrackBatchPayload {
                    task_id: trigger_task.id,
                    cracked_hashes: remaining_values
                        .iter()
                        .enumerate()
                        .map(|(index, value)| CrackedHash {
                            hash: (*value).into(),
                            plain: format!("plain{}", index),
                            crack_pos: index as u64,
                        })
                        .collect(),
                },
            )
            .await
            .expect("final batch");
        pipeline
            .handle_batches_complete(alpha.id, CrackBatchesCompletePayload { task_id: trigger_task.id })
            .await
            .expect("batches complete");

        let sealed_trigger = application_state.tasks().fetch_task(trigger_task.id).await.expect("refetch");
        assert_eq!(sealed_trigger.status, TaskStatus::Completed);

        let hashlist_after = application_state.hashlists().fetch_hashlist(9).await.expect("refetch");
        assert_eq!(hashlist_after.cracked_hashes, 100);
        assert!(hashlist_after.is_fully_cracked());
        println!("   ✅ Drenaje final y sellado 100/100 certificados.");
    }
}
