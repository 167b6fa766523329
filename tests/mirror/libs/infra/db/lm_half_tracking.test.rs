// [tests/mirror/libs/infra/db/lm_half_tracking.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE RASTRO DE MITADES LM
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: AUDITORÍA DEL SELLADO DUAL Y LA MITAD EN BLANCO
 * =================================================================
 */

use chrono::Utc;
use krakenhashes_domain_models::{HashRecord, LM_BLANK_HALF};
use krakenhashes_infra_db::repositories::{CrackUpdate, HashRepository};
use krakenhashes_infra_db::LedgerClient;
use uuid::Uuid;

fn lm_record(first_half: &str, second_half: &str) -> HashRecord {
    HashRecord {
        id: Uuid::new_v4(),
        hash_value: format!("{}{}", first_half, second_half),
        username: None,
        hash_type_id: 3000,
        is_cracked: false,
        password: None,
        last_updated: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF_A: &str = "e52cac67419a9a22";
    const HALF_B: &str = "4a3b108f3fa6cb6d";

    /// Búsqueda por mitad: ambas posiciones de la columna concatenada.
    #[tokio::test]
    async fn certify_half_lookup() {
        let client = LedgerClient::connect("file:mem_lm_lookup?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let hashes = HashRepository::new(client);

        let record = lm_record(HALF_A, HALF_B);
        hashes.insert_hash(&record).await.expect("seed");

        let by_first = hashes.fetch_lm_candidates(HALF_A).await.expect("first half");
        let by_second = hashes.fetch_lm_candidates(HALF_B).await.expect("second half");
        assert_eq!(by_first.len(), 1);
        assert_eq!(by_second.len(), 1);
        assert_eq!(by_first[0].id, record.id);
    }

    /// Sellado dual: cada mitad una sola vez; con ambas, la fila
    /// principal se finaliza con la contraseña concatenada.
    #[tokio::test]
    async fn certify_dual_half_seal_and_finalize() {
        println!("\n🧩 [INICIO]: Auditoría del sellado dual LM...");

        let client = LedgerClient::connect("file:mem_lm_seal?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let hashes = HashRepository::new(client);

        let record = lm_record(HALF_A, HALF_B);
        hashes.insert_hash(&record).await.expect("seed");
        hashes.ensure_lm_metadata(record.id).await.expect("metadata genesis");

        // Primera mitad: sella una vez, rebota la segunda pasada.
        assert!(hashes.seal_lm_half(record.id, true, "PASSWO").await.expect("seal first"));
        assert!(!hashes.seal_lm_half(record.id, true, "OTHER!").await.expect("re-seal guard"));

        let partial = hashes.fetch_lm_state(record.id).await.expect("state").expect("present");
        assert!(partial.first_half_cracked);
        assert!(!partial.second_half_cracked);
        assert!(!partial.both_halves_cracked());
        assert_eq!(partial.concatenated_password(), None);

        // Segunda mitad: habilita la finalización.
        assert!(hashes.seal_lm_half(record.id, false, "RD1234").await.expect("seal second"));
        let full = hashes.fetch_lm_state(record.id).await.expect("state").expect("present");
        assert!(full.both_halves_cracked());
        assert_eq!(full.concatenated_password().as_deref(), Some("PASSWORD1234"));

        // Finalización de la fila principal como crack pleno.
        let affected = hashes
            .apply_crack_updates(&[CrackUpdate {
                hash_id: record.id,
                password: full.concatenated_password().expect("full password"),
            }])
            .await
            .expect("finalize");
        assert_eq!(affected, 1);

        let sealed = hashes.bulk_fetch_by_values(&[record.hash_value.clone()]).await.expect("refetch");
        assert!(sealed[0].is_cracked);
        assert_eq!(sealed[0].password.as_deref(), Some("PASSWORD1234"));

        println!("   ✅ Invariante LM: is_cracked ⟺ ambas mitades selladas.");
    }

    /// La mitad en blanco constante se auto-completa con contraseña vacía.
    #[tokio::test]
    async fn certify_blank_half_autocompletion() {
        let client = LedgerClient::connect("file:mem_lm_blank?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let hashes = HashRepository::new(client);

        // Contraseña de 7 o menos: la segunda mitad es el blanco DES-LM.
        let record = lm_record(HALF_A, LM_BLANK_HALF);
        hashes.insert_hash(&record).await.expect("seed");
        hashes.ensure_lm_metadata(record.id).await.expect("metadata genesis");

        assert!(hashes.seal_lm_half(record.id, true, "SHORT").await.expect("seal first"));
        // Auto-completado: la mitad en blanco se sella con cadena vacía.
        assert!(hashes.seal_lm_half(record.id, false, "").await.expect("seal blank"));

        let state = hashes.fetch_lm_state(record.id).await.expect("state").expect("present");
        assert!(state.both_halves_cracked());
        assert_eq!(state.concatenated_password().as_deref(), Some("SHORT"));
    }

    /// Propagación NTLM -> LM: el hermano no crackeado se localiza por el
    /// enlace y desaparece del enlace una vez sellado.
    #[tokio::test]
    async fn certify_ntlm_lm_sibling_link() {
        let client = LedgerClient::connect("file:mem_lm_link?mode=memory&cache=shared", None)
            .await
            .expect("CRITICAL_FAULT: memory ledger anchor failed.");
        let hashes = HashRepository::new(client);

        let ntlm = HashRecord {
            id: Uuid::new_v4(),
            hash_value: "8846f7eaee8fb117ad06bdd830b7586c".into(),
            username: Some("administrator".into()),
            hash_type_id: 1000,
            is_cracked: false,
            password: None,
            last_updated: Utc::now(),
        };
        let lm_sibling = lm_record(HALF_A, HALF_B);

        hashes.insert_hash(&ntlm).await.expect("seed ntlm");
        hashes.insert_hash(&lm_sibling).await.expect("seed lm");
        hashes.link_ntlm_lm(ntlm.id, lm_sibling.id).await.expect("link");

        let found = hashes.fetch_uncracked_lm_sibling(ntlm.id).await.expect("sibling");
        assert_eq!(found.map(|record| record.id), Some(lm_sibling.id));

        // Sellado del hermano: la búsqueda de pendientes queda vacía.
        hashes
            .apply_crack_updates(&[CrackUpdate { hash_id: lm_sibling.id, password: "PASSWORD".into() }])
            .await
            .expect("seal sibling");
        let exhausted = hashes.fetch_uncracked_lm_sibling(ntlm.id).await.expect("sibling");
        assert!(exhausted.is_none());
    }
}
