// [tests/mirror/libs/infra/db/task_lifecycle.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CICLO DE VIDA DE FRAGMENTOS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE LA CADENA DE CUSTODIA Y SUS GUARDIAS
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_domain_models::{TaskChunk, TaskStatus};
use krakenhashes_infra_db::repositories::TaskRepository;
use krakenhashes_infra_db::LedgerClient;
use uuid::Uuid;

fn chunk_shell(job_id: Uuid, chunk_number: u32, start: u64, end: u64) -> TaskChunk {
    TaskChunk {
        id: Uuid::new_v4(),
        job_id,
        increment_layer_id: None,
        agent_id: None,
        chunk_number,
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

#[cfg(test)]
mod tests {
    use super::*;

    /// Exclusividad de reclamación: un fragmento 'pending' solo puede
    /// asignarse una vez; la reversión lo devuelve a la cola.
    #[tokio::test]
    async fn certify_claim_exclusivity_and_revert() {
        println!("\n🗄️  [INICIO]: Auditoría de reclamación atómica...");

        let client = LedgerClient::connect("file:mem_task_claim?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let repository = TaskRepository::new(client);

        let job_id = Uuid::new_v4();
        let task = chunk_shell(job_id, 1, 0, 10_000);
        repository.create_task(&task).await.expect("genesis");

        // Reclamación por ALPHA; la de BETA debe rebotar.
        assert!(repository.mark_assigned(task.id, 1).await.expect("claim alpha"));
        assert!(!repository.mark_assigned(task.id, 2).await.expect("claim beta"));
        println!("   ✅ Exclusividad de propiedad certificada.");

        // Reversión por fallo de despacho: vuelve a pending sin agente.
        assert!(repository.revert_to_pending(task.id).await.expect("revert"));
        let reverted = repository.fetch_task(task.id).await.expect("refetch");
        assert_eq!(reverted.status, TaskStatus::Pending);
        assert_eq!(reverted.agent_id, None);
        println!("   ✅ Reversión post-fallo certificada.");
    }

    /// El progreso absoluto es monótono: un reporte tardío menor jamás
    /// retrocede la columna.
    #[tokio::test]
    async fn certify_monotonic_progress() {
        let client = LedgerClient::connect("file:mem_task_progress?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let repository = TaskRepository::new(client);

        let task = chunk_shell(Uuid::new_v4(), 1, 0, 10_000);
        repository.create_task(&task).await.expect("genesis");
        repository.mark_assigned(task.id, 1).await.expect("claim");
        repository.mark_running(task.id).await.expect("running");

        repository.update_progress(task.id, 5_000, 900, 50.0, None).await.expect("p1");
        repository.update_progress(task.id, 3_000, 900, 30.0, None).await.expect("late frame");

        let fresh = repository.fetch_task(task.id).await.expect("refetch");
        assert_eq!(fresh.keyspace_processed, 5_000, "keyspace_processed must never decrease");

        // El porcentaje reportado se capa en 100.
        repository.update_progress(task.id, 9_000, 900, 150.0, None).await.expect("overshoot");
        let capped = repository.fetch_task(task.id).await.expect("refetch");
        assert_eq!(capped.progress_percent, 100.0);
    }

    /// El guardia de actuals: el marcador solo sella fragmentos
    /// rule-split; en keyspace-split reporta el total del trabajo.
    #[tokio::test]
    async fn certify_chunk_actual_guard() {
        let client = LedgerClient::connect("file:mem_task_actual?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let repository = TaskRepository::new(client);
        let job_id = Uuid::new_v4();

        let keyspace_task = chunk_shell(job_id, 1, 0, 10_000);
        repository.create_task(&keyspace_task).await.expect("genesis ks");

        let mut rule_task = chunk_shell(job_id, 2, 0, 10_000);
        rule_task.is_keyspace_split = false;
        rule_task.is_rule_split = true;
        rule_task.rule_start_index = Some(0);
        rule_task.rule_end_index = Some(10);
        rule_task.effective_keyspace_start = 10_000;
        rule_task.effective_keyspace_end = 20_000;
        repository.create_task(&rule_task).await.expect("genesis rule");

        // keyspace-split: el sellado DEBE rebotar.
        assert!(!repository.set_chunk_actual(keyspace_task.id, 50_000).await.expect("guard"));
        let untouched = repository.fetch_task(keyspace_task.id).await.expect("refetch");
        assert_eq!(untouched.chunk_actual_keyspace, None);
        assert!(!untouched.is_actual_keyspace);

        // rule-split: sella y recalcula su límite efectivo.
        assert!(repository.set_chunk_actual(rule_task.id, 8_000).await.expect("seal"));
        let sealed = repository.fetch_task(rule_task.id).await.expect("refetch");
        assert_eq!(sealed.chunk_actual_keyspace, Some(8_000));
        assert!(sealed.is_actual_keyspace);
        assert_eq!(sealed.effective_keyspace_end, 18_000);
    }

    /// Drenaje: processing exige esperados; el cierre requiere conteo
    /// alcanzado Y señal de fin de lotes.
    #[tokio::test]
    async fn certify_processing_drain_readiness() {
        let client = LedgerClient::connect("file:mem_task_drain?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let repository = TaskRepository::new(client);

        let task = chunk_shell(Uuid::new_v4(), 1, 0, 10_000);
        repository.create_task(&task).await.expect("genesis");
        repository.mark_assigned(task.id, 1).await.expect("claim");
        repository.mark_running(task.id).await.expect("running");

        assert!(repository.set_processing(task.id, 3).await.expect("processing"));
        let draining = repository.fetch_task(task.id).await.expect("refetch");
        assert_eq!(draining.status, TaskStatus::Processing);
        assert_eq!(draining.keyspace_processed, draining.keyspace_end);
        assert!(!draining.is_drain_complete());

        let after_cracks = repository.add_received_cracks(task.id, 3).await.expect("credit");
        assert!(!after_cracks.is_drain_complete(), "batches signal still missing");

        let after_signal = repository.mark_batches_complete(task.id).await.expect("signal");
        assert!(after_signal.is_drain_complete());

        assert!(repository.complete_task(task.id).await.expect("seal"));
        let sealed = repository.fetch_task(task.id).await.expect("refetch");
        assert_eq!(sealed.status, TaskStatus::Completed);
    }

    /// Fronteras: MAX(keyspace_end) es el inicio del próximo fragmento.
    #[tokio::test]
    async fn certify_keyspace_frontier() {
        let client = LedgerClient::connect("file:mem_task_frontier?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let repository = TaskRepository::new(client);
        let job_id = Uuid::new_v4();

        assert_eq!(repository.keyspace_frontier_for_job(job_id).await.expect("empty"), 0);
        assert_eq!(repository.next_chunk_number(job_id).await.expect("first ordinal"), 1);

        repository.create_task(&chunk_shell(job_id, 1, 0, 4_000)).await.expect("c1");
        repository.create_task(&chunk_shell(job_id, 2, 4_000, 9_000)).await.expect("c2");

        assert_eq!(repository.keyspace_frontier_for_job(job_id).await.expect("frontier"), 9_000);
        assert_eq!(repository.next_chunk_number(job_id).await.expect("ordinal"), 3);
    }

    /// Circuito de reconexión: gracia, recuperación con progreso intacto
    /// y reset con consumo de reintento.
    #[tokio::test]
    async fn certify_reconnect_circuit() {
        println!("\n🗄️  [INICIO]: Auditoría del circuito de reconexión...");

        let client = LedgerClient::connect("file:mem_task_reconnect?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let repository = TaskRepository::new(client);

        let task = chunk_shell(Uuid::new_v4(), 1, 0, 1_000_000);
        repository.create_task(&task).await.expect("genesis");
        repository.mark_assigned(task.id, 7).await.expect("claim");
        repository.mark_running(task.id).await.expect("running");
        repository.update_progress(task.id, 500_000, 1_000, 50.0, None).await.expect("progress");

        // Desconexión: gracia con desvinculación viva.
        assert!(repository.mark_reconnect_pending(task.id, Utc::now()).await.expect("grace"));
        let in_grace = repository.fetch_task(task.id).await.expect("refetch");
        assert_eq!(in_grace.status, TaskStatus::ReconnectPending);
        assert_eq!(in_grace.agent_id, None);

        // Recuperación dirigida: el progreso absoluto queda intacto.
        assert!(repository.recover_for_agent(task.id, 7).await.expect("recover"));
        let recovered = repository.fetch_task(task.id).await.expect("refetch");
        assert_eq!(recovered.status, TaskStatus::Running);
        assert_eq!(recovered.agent_id, Some(7));
        assert_eq!(recovered.keyspace_processed, 500_000, "progress must survive reconnect");
        println!("   ✅ Recuperación con progreso preservado certificada.");

        // Segunda caída y expiración de gracia: reset consume reintento.
        repository.mark_reconnect_pending(task.id, Utc::now()).await.expect("grace 2");
        assert!(repository.reset_to_pending_with_retry(task.id).await.expect("reset"));
        let reset = repository.fetch_task(task.id).await.expect("refetch");
        assert_eq!(reset.status, TaskStatus::Pending);
        assert_eq!(reset.agent_id, None);
        assert_eq!(reset.retry_count, 1);
        println!("   ✅ Reset con consumo de reintento certificado.");
    }
}
