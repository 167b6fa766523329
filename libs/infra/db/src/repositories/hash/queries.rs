// [libs/infra/db/src/repositories/hash/queries.rs]
/*!
 * =================================================================
 * APARATO: HASH LEDGER SQL STORE
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: SENTENCIAS DEL PIPELINE DE CRACKS Y MITADES LM
 * =================================================================
 */

pub const HASH_COLUMNS: &str = r#"
    id, hash_value, username, hash_type_id, is_cracked, password, last_updated
"#;

pub const INSERT_HASH: &str = r#"
    INSERT INTO hashes (
        id, hash_value, username, hash_type_id, is_cracked, password, last_updated
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
"#;

pub const FETCH_BY_VALUE: &str = r#"
    SELECT {columns} FROM hashes WHERE hash_value = ?1
"#;

/// Búsqueda por mitad LM: la columna concatenada de 32 chars se inspecciona
/// por ambas mitades de 16.
pub const FETCH_LM_BY_HALF: &str = r#"
    SELECT {columns} FROM hashes
    WHERE hash_type_id = 3000
      AND (substr(hash_value, 1, 16) = ?1 OR substr(hash_value, 17, 16) = ?1)
"#;

/// Escritura de crack con guardia de dedup: solo filas aún no crackeadas.
pub const APPLY_CRACK: &str = r#"
    UPDATE hashes
    SET is_cracked = 1, password = ?2, last_updated = ?3
    WHERE id = ?1 AND is_cracked = 0
"#;

pub const FETCH_MEMBERSHIPS: &str = r#"
    SELECT hashlist_id FROM hashlist_hashes WHERE hash_id = ?1
"#;

pub const LINK_HASH_TO_HASHLIST: &str = r#"
    INSERT INTO hashlist_hashes (hashlist_id, hash_id)
    VALUES (?1, ?2)
    ON CONFLICT(hashlist_id, hash_id) DO NOTHING
"#;

// --- ESTRATO LM / NTLM ---

pub const ENSURE_LM_METADATA: &str = r#"
    INSERT INTO lm_hash_metadata (hash_id) VALUES (?1)
    ON CONFLICT(hash_id) DO NOTHING
"#;

pub const FETCH_LM_METADATA: &str = r#"
    SELECT hash_id, first_half_cracked, first_half_password,
           second_half_cracked, second_half_password
    FROM lm_hash_metadata
    WHERE hash_id = ?1
"#;

/// Sella la primera mitad una sola vez (guardia de mitad ya resuelta).
pub const SEAL_FIRST_HALF: &str = r#"
    UPDATE lm_hash_metadata
    SET first_half_cracked = 1, first_half_password = ?2
    WHERE hash_id = ?1 AND first_half_cracked = 0
"#;

pub const SEAL_SECOND_HALF: &str = r#"
    UPDATE lm_hash_metadata
    SET second_half_cracked = 1, second_half_password = ?2
    WHERE hash_id = ?1 AND second_half_cracked = 0
"#;

/// Hermano LM no crackeado de un hash NTLM (propagación NTLM -> LM).
pub const FETCH_UNCRACKED_LM_SIBLING: &str = r#"
    SELECT {columns} FROM hashes
    WHERE id IN (SELECT lm_hash_id FROM lm_ntlm_links WHERE ntlm_hash_id = ?1)
      AND is_cracked = 0
"#;

pub const LINK_NTLM_LM: &str = r#"
    INSERT INTO lm_ntlm_links (ntlm_hash_id, lm_hash_id)
    VALUES (?1, ?2)
    ON CONFLICT(ntlm_hash_id, lm_hash_id) DO NOTHING
"#;
