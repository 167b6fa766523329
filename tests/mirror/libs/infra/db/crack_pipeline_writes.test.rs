// [tests/mirror/libs/infra/db/crack_pipeline_writes.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE ESCRITURAS DEL PIPELINE DE CRACKS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DE DEDUP, CONTADORES Y FILAS AFECTADAS
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_domain_models::{HashRecord, Hashlist};
use krakenhashes_infra_db::repositories::{CrackUpdate, HashRepository, HashlistRepository};
use krakenhashes_infra_db::LedgerClient;
use uuid::Uuid;

fn hash_record(value: &str, hash_type: i64) -> HashRecord {
    HashRecord {
        id: Uuid::new_v4(),
        hash_value: value.to_string(),
        username: None,
        hash_type_id: hash_type,
        is_cracked: false,
        password: None,
        last_updated: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Dedup por guardia is_cracked = 0: la segunda pasada del mismo lote
    /// afecta cero filas y el validador lo observa en el conteo.
    #[tokio::test]
    async fn certify_dedup_and_affected_count() {
        println!("\n💾 [INICIO]: Auditoría de dedup transaccional...");

        let client = LedgerClient::connect("file:mem_crack_dedup?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let hashes = HashRepository::new(client);

        let record_a = hash_record("5f4dcc3b5aa765d61d8327deb882cf99", 0);
        let record_b = hash_record("098f6bcd4621d373cade4e832627b4f6", 0);
        hashes.insert_hash(&record_a).await.expect("seed a");
        hashes.insert_hash(&record_b).await.expect("seed b");

        let updates = vec![
            CrackUpdate { hash_id: record_a.id, password: "password".into() },
            CrackUpdate { hash_id: record_b.id, password: "test".into() },
        ];

        let first_pass = hashes.apply_crack_updates(&updates).await.expect("first pass");
        assert_eq!(first_pass, 2, "both rows must commit on first pass");

        let second_pass = hashes.apply_crack_updates(&updates).await.expect("second pass");
        assert_eq!(second_pass, 0, "dedup guard must reject already-cracked rows");

        let resolved = hashes
            .bulk_fetch_by_values(&[record_a.hash_value.clone()])
            .await
            .expect("lookup");
        assert!(resolved[0].is_cracked);
        assert_eq!(resolved[0].password.as_deref(), Some("password"));

        println!("   ✅ Dedup y conteo de filas afectadas certificados.");
    }

    /// El contador desnormalizado avanza por hashlist y coincide con el
    /// recuento real contra la relación N:M.
    #[tokio::test]
    async fn certify_hashlist_counters() {
        let client = LedgerClient::connect("file:mem_crack_counters?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let hashes = HashRepository::new(client.clone());
        let hashlists = HashlistRepository::new(client);

        hashlists
            .create_hashlist(&Hashlist {
                id: 77,
                name: "corp-audit".into(),
                hash_type_id: 0,
                client_id: None,
                total_hashes: 3,
                cracked_hashes: 0,
                excluded_from_potfile: false,
            })
            .await
            .expect("seed hashlist");

        let mut seeded = Vec::new();
        for value in ["aaa111", "bbb222", "ccc333"] {
            let record = hash_record(value, 0);
            hashes.insert_hash(&record).await.expect("seed hash");
            hashes.link_hash_to_hashlist(77, record.id).await.expect("link");
            seeded.push(record);
        }

        let updates: Vec<CrackUpdate> = seeded
            .iter()
            .take(2)
            .map(|record| CrackUpdate { hash_id: record.id, password: "x".into() })
            .collect();
        let affected = hashes.apply_crack_updates(&updates).await.expect("commit");
        assert_eq!(affected, 2);

        let memberships = hashes
            .fetch_affected_hashlists(&updates.iter().map(|u| u.hash_id).collect::<Vec<_>>())
            .await
            .expect("memberships");
        assert_eq!(memberships.get(&77).copied(), Some(2));

        hashlists.increment_cracked_count(77, 2).await.expect("advance counter");

        let hashlist = hashlists.fetch_hashlist(77).await.expect("refetch");
        let recount = hashlists.recount_cracked(77).await.expect("recount");
        assert_eq!(hashlist.cracked_hashes, 2);
        assert_eq!(hashlist.cracked_hashes, recount, "counter must match N:M recount");
        assert!(!hashlist.is_fully_cracked());
    }

    /// Un hash compartido entre hashlists acredita a todos sus dueños.
    #[tokio::test]
    async fn certify_shared_hash_membership() {
        let client = LedgerClient::connect("file:mem_crack_shared?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let hashes = HashRepository::new(client.clone());
        let hashlists = HashlistRepository::new(client);

        for hashlist_id in [101, 102] {
            hashlists
                .create_hashlist(&Hashlist {
                    id: hashlist_id,
                    name: format!("shared-{}", hashlist_id),
                    hash_type_id: 0,
                    client_id: None,
                    total_hashes: 1,
                    cracked_hashes: 0,
                    excluded_from_potfile: false,
                })
                .await
                .expect("seed hashlist");
        }

        let shared = hash_record("dddd4444", 0);
        hashes.insert_hash(&shared).await.expect("seed");
        hashes.link_hash_to_hashlist(101, shared.id).await.expect("link 101");
        hashes.link_hash_to_hashlist(102, shared.id).await.expect("link 102");

        let memberships = hashes.fetch_affected_hashlists(&[shared.id]).await.expect("memberships");
        assert_eq!(memberships.len(), 2);
        assert_eq!(memberships.get(&101).copied(), Some(1));
        assert_eq!(memberships.get(&102).copied(), Some(1));
    }
}
