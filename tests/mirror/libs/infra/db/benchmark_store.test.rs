// [tests/mirror/libs/infra/db/benchmark_store.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL ALMACÉN DE BENCHMARKS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL UPSERT POR (AGENTE, TIPO, MODO)
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_domain_models::{AttackMode, BenchmarkSample};
use krakenhashes_infra_db::repositories::BenchmarkRepository;
use krakenhashes_infra_db::LedgerClient;

fn sample(agent_id: i64, hash_type: i64, attack_mode: AttackMode, speed: u64) -> BenchmarkSample {
    BenchmarkSample {
        agent_id,
        hash_type,
        attack_mode,
        speed_hashes_per_second: speed,
        measured_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Miss limpio, upsert y sobrescritura por conflicto de clave.
    #[tokio::test]
    async fn certify_upsert_and_lookup() {
        let client = LedgerClient::connect("file:mem_bench_store?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let repository = BenchmarkRepository::new(client);

        // Miss: dispara el flujo de benchmark forzado en el planificador.
        let miss = repository.lookup_benchmark(1, 1000, AttackMode::Straight).await.expect("lookup");
        assert_eq!(miss, None);

        repository
            .upsert_benchmark(&sample(1, 1000, AttackMode::Straight, 500_000))
            .await
            .expect("first sample");
        assert_eq!(
            repository.lookup_benchmark(1, 1000, AttackMode::Straight).await.expect("lookup"),
            Some(500_000)
        );

        // Conflicto: la observación nueva reemplaza a la vieja.
        repository
            .upsert_benchmark(&sample(1, 1000, AttackMode::Straight, 750_000))
            .await
            .expect("refresh sample");
        assert_eq!(
            repository.lookup_benchmark(1, 1000, AttackMode::Straight).await.expect("lookup"),
            Some(750_000)
        );

        // La clave es tripartita: otro modo de ataque no colisiona.
        repository
            .upsert_benchmark(&sample(1, 1000, AttackMode::BruteForce, 2_000_000))
            .await
            .expect("mask sample");
        assert_eq!(
            repository.lookup_benchmark(1, 1000, AttackMode::Straight).await.expect("lookup"),
            Some(750_000)
        );
        assert_eq!(
            repository.lookup_benchmark(1, 1000, AttackMode::BruteForce).await.expect("lookup"),
            Some(2_000_000)
        );
    }
}
