// [libs/infra/db/src/repositories/hash/mod.rs]
/*!
 * =================================================================
 * APARATO: HASH REPOSITORY (CRACK PIPELINE WRITES)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: BÚSQUEDA MASIVA, ESCRITURA TRANSACCIONAL Y RASTRO LM
 *
 * # Invariante (Dedup Guard):
 * Toda escritura de crack lleva el guardia WHERE is_cracked = 0: un hash
 * ya resuelto jamás se re-escribe y el conteo de filas afectadas revela
 * la discrepancia al validador del pipeline.
 * =================================================================
 */

pub mod queries;

use crate::errors::DbError;
use crate::repositories::{as_bool, parse_timestamp, parse_uuid};
use crate::LedgerClient;
use chrono::Utc;
use libsql::{params, Row};
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use krakenhashes_domain_models::{HashRecord, LmHalfState};

use self::queries as sql_registry;

/// Tamaño de transacción de escritura del pipeline de cracks.
const CRACK_WRITE_TRANSACTION_SIZE: usize = 20_000;

/// Fila de actualización de crack lista para el lote transaccional.
#[derive(Debug, Clone)]
pub struct CrackUpdate {
    pub hash_id: Uuid,
    pub password: String,
}

pub struct HashRepository {
    database_client: LedgerClient,
}

impl HashRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    // --- ESTRATO DE BÚSQUEDA MASIVA ---

    /// Resuelve los valores de hash del lote contra las filas canónicas.
    /// Los valores sin fila se ignoran (violación de protocolo tolerada:
    /// el agente pudo reportar un hash ajeno al inventario).
    #[instrument(skip(self, hash_values))]
    pub async fn bulk_fetch_by_values(&self, hash_values: &[String]) -> Result<Vec<HashRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = sql_registry::FETCH_BY_VALUE.replace("{columns}", sql_registry::HASH_COLUMNS);

        let mut records = Vec::new();
        for hash_value in hash_values {
            let mut rows = connection.query(&select, params![hash_value.clone()]).await?;
            while let Some(row) = rows.next().await? {
                records.push(map_row_to_hash(&row)?);
            }
        }

        debug!("🔎 [HASH_REPO]: Bulk lookup resolved {}/{} values.", records.len(), hash_values.len());
        Ok(records)
    }

    /// Candidatos LM cuya primera o segunda mitad coincide con el valor
    /// crackeado (el motor reporta una mitad por crack).
    pub async fn fetch_lm_candidates(&self, half_value: &str) -> Result<Vec<HashRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = sql_registry::FETCH_LM_BY_HALF.replace("{columns}", sql_registry::HASH_COLUMNS);

        let normalized_half = half_value.to_lowercase();
        let mut rows = connection.query(&select, params![normalized_half]).await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(map_row_to_hash(&row)?);
        }
        Ok(records)
    }

    // --- ESTRATO DE ESCRITURA TRANSACCIONAL ---

    /// Vuelca las actualizaciones de crack en transacciones de hasta
    /// 20.000 filas y devuelve el total de filas realmente afectadas.
    /// El llamador valida afectadas == encoladas y registra la anomalía.
    #[instrument(skip(self, updates))]
    pub async fn apply_crack_updates(&self, updates: &[CrackUpdate]) -> Result<u64, DbError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let connection = self.database_client.get_connection()?;
        let mut total_affected: u64 = 0;
        let write_stamp = Utc::now().to_rfc3339();

        for transaction_window in updates.chunks(CRACK_WRITE_TRANSACTION_SIZE) {
            let transaction = connection
                .transaction()
                .await
                .map_err(|_| DbError::TransactionError)?;

            for update in transaction_window {
                total_affected += transaction
                    .execute(
                        sql_registry::APPLY_CRACK,
                        params![
                            update.hash_id.to_string(),
                            update.password.clone(),
                            write_stamp.clone()
                        ],
                    )
                    .await?;
            }

            transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        }

        info!("💾 [HASH_REPO]: {} crack rows committed ({} queued).", total_affected, updates.len());
        Ok(total_affected)
    }

    /// Multiconjunto de hashlists afectados por los hashes dados.
    pub async fn fetch_affected_hashlists(&self, hash_ids: &[Uuid]) -> Result<HashMap<i64, u64>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut affected: HashMap<i64, u64> = HashMap::new();

        for hash_id in hash_ids {
            let mut rows = connection
                .query(sql_registry::FETCH_MEMBERSHIPS, params![hash_id.to_string()])
                .await?;
            while let Some(row) = rows.next().await? {
                *affected.entry(row.get::<i64>(0)?).or_insert(0) += 1;
            }
        }
        Ok(affected)
    }

    // --- ESTRATO LM / NTLM ---

    pub async fn ensure_lm_metadata(&self, hash_id: Uuid) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(sql_registry::ENSURE_LM_METADATA, params![hash_id.to_string()])
            .await?;
        Ok(())
    }

    pub async fn fetch_lm_state(&self, hash_id: Uuid) -> Result<Option<LmHalfState>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(sql_registry::FETCH_LM_METADATA, params![hash_id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(LmHalfState {
                hash_id: parse_uuid(&row.get::<String>(0)?)?,
                first_half_cracked: as_bool(row.get::<i64>(1)?),
                first_half_password: row.get::<String>(2).ok(),
                second_half_cracked: as_bool(row.get::<i64>(3)?),
                second_half_password: row.get::<String>(4).ok(),
            })),
            None => Ok(None),
        }
    }

    /// Sella una mitad LM. Devuelve false si esa mitad ya estaba resuelta
    /// (el crack duplicado se descarta sin efecto).
    pub async fn seal_lm_half(
        &self,
        hash_id: Uuid,
        is_first_half: bool,
        half_password: &str,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let statement = if is_first_half {
            sql_registry::SEAL_FIRST_HALF
        } else {
            sql_registry::SEAL_SECOND_HALF
        };

        let affected = connection
            .execute(statement, params![hash_id.to_string(), half_password])
            .await?;
        Ok(affected > 0)
    }

    /// Hermano LM pendiente de un hash NTLM (tipo 1000) para la
    /// propagación con contraseña en mayúsculas.
    pub async fn fetch_uncracked_lm_sibling(&self, ntlm_hash_id: Uuid) -> Result<Option<HashRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select =
            sql_registry::FETCH_UNCRACKED_LM_SIBLING.replace("{columns}", sql_registry::HASH_COLUMNS);
        let mut rows = connection.query(&select, params![ntlm_hash_id.to_string()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_hash(&row)?)),
            None => Ok(None),
        }
    }

    // --- ESTRATO DE APROVISIONAMIENTO ---

    pub async fn insert_hash(&self, record: &HashRecord) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::INSERT_HASH,
                params![
                    record.id.to_string(),
                    record.hash_value.clone(),
                    record.username.clone(),
                    record.hash_type_id,
                    record.is_cracked as i64,
                    record.password.clone(),
                    record.last_updated.to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn link_hash_to_hashlist(&self, hashlist_id: i64, hash_id: Uuid) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::LINK_HASH_TO_HASHLIST,
                params![hashlist_id, hash_id.to_string()],
            )
            .await?;
        Ok(())
    }

    pub async fn link_ntlm_lm(&self, ntlm_hash_id: Uuid, lm_hash_id: Uuid) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::LINK_NTLM_LM,
                params![ntlm_hash_id.to_string(), lm_hash_id.to_string()],
            )
            .await?;
        Ok(())
    }
}

// --- MAPEADOR DE FILA ---

fn map_row_to_hash(row: &Row) -> Result<HashRecord, DbError> {
    Ok(HashRecord {
        id: parse_uuid(&row.get::<String>(0)?)?,
        hash_value: row.get::<String>(1)?,
        username: row.get::<String>(2).ok(),
        hash_type_id: row.get::<i64>(3)?,
        is_cracked: as_bool(row.get::<i64>(4)?),
        password: row.get::<String>(5).ok(),
        last_updated: parse_timestamp(&row.get::<String>(6)?)?,
    })
}
