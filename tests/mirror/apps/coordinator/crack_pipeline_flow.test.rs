// [tests/mirror/apps/coordinator/crack_pipeline_flow.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL PIPELINE DE CRACKS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE PROPAGACIÓN NTLM->LM Y DRENAJE DE LOTES
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_coordinator::services::CrackPipeline;
use krakenhashes_coordinator::state::AppState;
use krakenhashes_domain_models::{
    AttackMode, CrackedHash, HashRecord, Hashlist, JobExecution, JobStatus, TaskChunk, TaskStatus,
};
use krakenhashes_infra_db::LedgerClient;
use krakenhashes_infra_protocol::{CrackBatchPayload, CrackBatchesCompletePayload};
use uuid::Uuid;

const NTLM_VALUE: &str = "8846f7eaee8fb117ad06bdd830b7586c";
const LM_VALUE: &str = "e52cac67419a9a224a3b108f3fa6cb6d";

async fn ignite_state(memory_tag: &str) -> (AppState, tempfile::TempDir) {
    let data_root = tempfile::tempdir().expect("INFRA_FAULT: temp data root");
    let client = LedgerClient::connect(&format!("file:{}?mode=memory&cache=shared", memory_tag), None)
        .await
        .expect("CRITICAL_FAULT: memory ledger anchor failed.");
    (AppState::new(client, data_root.path().to_path_buf()), data_root)
}

fn ntlm_job(hashlist_id: i64) -> JobExecution {
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

fn running_chunk(job_id: Uuid) -> TaskChunk {
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

    /// Escenario soberano: crack NTLM "password" con hermano LM vivo.
    /// El hermano recibe la contraseña en MAYÚSCULAS, ambos contadores
    /// avanzan y el fragmento cierra tras el drenaje de lotes.
    #[tokio::test]
    async fn certify_ntlm_lm_propagation_and_drain() {
        println!("\n💾 [INICIO]: Auditoría del pipeline de cracks...");
        let (application_state, _data_root) = ignite_state("mem_crack_flow").await;

        // --- APROVISIONAMIENTO: dos hashlists con filas hermanas ---
        let hashlists = application_state.hashlists();
        hashlists
            .create_hashlist(&Hashlist {
                id: 10,
                name: "ntds-ntlm".into(),
                hash_type_id: 1000,
                client_id: None,
                total_hashes: 1,
                cracked_hashes: 0,
                excluded_from_potfile: false,
            })
            .await
            .expect("seed ntlm hashlist");
        hashlists
            .create_hashlist(&Hashlist {
                id: 20,
                name: "ntds-lm".into(),
                hash_type_id: 3000,
                client_id: None,
                total_hashes: 1,
                cracked_hashes: 0,
                excluded_from_potfile: false,
            })
            .await
            .expect("seed lm hashlist");

        let hashes = application_state.hashes();
        let ntlm_row = HashRecord {
            id: Uuid::new_v4(),
            hash_value: NTLM_VALUE.into(),
            username: Some("administrator".into()),
            hash_type_id: 1000,
            is_cracked: false,
            password: None,
            last_updated: Utc::now(),
        };
        let lm_row = HashRecord {
            id: Uuid::new_v4(),
            hash_value: LM_VALUE.into(),
            username: Some("administrator".into()),
            hash_type_id: 3000,
            is_cracked: false,
            password: None,
            last_updated: Utc::now(),
        };
        hashes.insert_hash(&ntlm_row).await.expect("seed ntlm");
        hashes.insert_hash(&lm_row).await.expect("seed lm");
        hashes.link_hash_to_hashlist(10, ntlm_row.id).await.expect("link ntlm");
        hashes.link_hash_to_hashlist(20, lm_row.id).await.expect("link lm");
        hashes.link_ntlm_lm(ntlm_row.id, lm_row.id).await.expect("link siblings");

        // --- TRABAJO Y FRAGMENTO EN DRENAJE ---
        let agent = application_state.agents().register_agent("UNIT_CRACKER").await.expect("agent");
        let job = ntlm_job(10);
        application_state.jobs().create_job(&job).await.expect("seed job");

        let task = running_chunk(job.id);
        application_state.tasks().create_task(&task).await.expect("seed task");
        application_state.tasks().mark_assigned(task.id, agent.id).await.expect("claim");
        application_state.tasks().mark_running(task.id).await.expect("running");
        application_state.tasks().set_processing(task.id, 1).await.expect("processing");

        // --- LOTE DE CRACKS ---
        let pipeline = CrackPipeline::new(application_state.clone());
        pipeline
            .process_batch(
                agent.id,
                CrackBatchPayload {
                    task_id: task.id,
                    cracked_hashes: vec![CrackedHash {
                        hash: NTLM_VALUE.into(),
                        plain: "password".into(),
                        crack_pos: 42,
                    }],
                },
            )
            .await
            .expect("crack batch");

        // Fila NTLM sellada con la contraseña original.
        let ntlm_after = hashes.bulk_fetch_by_values(&[NTLM_VALUE.into()]).await.expect("lookup");
        assert!(ntlm_after[0].is_cracked);
        assert_eq!(ntlm_after[0].password.as_deref(), Some("password"));

        // Hermano LM sellado con la contraseña en MAYÚSCULAS.
        let lm_after = hashes.bulk_fetch_by_values(&[LM_VALUE.into()]).await.expect("lookup");
        assert!(lm_after[0].is_cracked);
        assert_eq!(lm_after[0].password.as_deref(), Some("PASSWORD"));
        println!("   ✅ Propagación NTLM -> LM con mayúsculas certificada.");

        // Ambos contadores desnormalizados avanzaron.
        assert_eq!(hashlists.fetch_hashlist(10).await.expect("refetch").cracked_hashes, 1);
        assert_eq!(hashlists.fetch_hashlist(20).await.expect("refetch").cracked_hashes, 1);
        assert!(hashlists.fetch_hashlist(20).await.expect("refetch").is_fully_cracked());

        // Potfile habilitado por defecto: ambas parejas quedaron encoladas.
        assert_eq!(application_state.potfile().count_staged().await.expect("staged"), 2);

        // --- DRENAJE: el conteo llegó pero falta la señal de lotes ---
        let draining = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(draining.status, TaskStatus::Processing);
        assert_eq!(draining.received_crack_count, 1);

        pipeline
            .handle_batches_complete(agent.id, CrackBatchesCompletePayload { task_id: task.id })
            .await
            .expect("batches complete");

        let sealed = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(sealed.status, TaskStatus::Completed);
        println!("   ✅ Cierre del fragmento tras señal de fin de lotes certificado.");
    }

    /// Un valor fuera del inventario se tolera sin abortar el lote.
    #[tokio::test]
    async fn certify_unknown_value_tolerated() {
        let (application_state, _data_root) = ignite_state("mem_crack_unknown").await;

        application_state
            .hashlists()
            .create_hashlist(&Hashlist {
                id: 30,
                name: "small".into(),
                hash_type_id: 0,
                client_id: None,
                total_hashes: 1,
                cracked_hashes: 0,
                excluded_from_potfile: false,
            })
            .await
            .expect("seed hashlist");

        let agent = application_state.agents().register_agent("UNIT_SOLO").await.expect("agent");
        let job = {
            let mut job = ntlm_job(30);
            job.attack_mode = AttackMode::Straight;
            job
        };
        application_state.jobs().create_job(&job).await.expect("seed job");

        let task = running_chunk(job.id);
        application_state.tasks().create_task(&task).await.expect("seed task");
        application_state.tasks().mark_assigned(task.id, agent.id).await.expect("claim");
        application_state.tasks().mark_running(task.id).await.expect("running");

        let pipeline = CrackPipeline::new(application_state.clone());
        pipeline
            .process_batch(
                agent.id,
                CrackBatchPayload {
                    task_id: task.id,
                    cracked_hashes: vec![CrackedHash {
                        hash: "ffffffffffffffffffffffffffffffff".into(),
                        plain: "ghost".into(),
                        crack_pos: 1,
                    }],
                },
            )
            .await
            .expect("alien batch must not abort");

        // Nada comprometido, nada encolado, conteo recibido acreditado.
        assert_eq!(application_state.potfile().count_staged().await.expect("staged"), 0);
        let task_after = application_state.tasks().fetch_task(task.id).await.expect("refetch");
        assert_eq!(task_after.received_crack_count, 1);
    }
}
