// [libs/infra/db/src/repositories/potfile.rs]
/*!
 * =================================================================
 * APARATO: POTFILE STAGING REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: ENCOLADO TRANSACCIONAL DE PARES (HASH, PASSWORD)
 *
 * El drenaje del staging hacia el potfile físico corre fuera del núcleo;
 * aquí solo se garantiza el encolado por lotes.
 * =================================================================
 */

use crate::errors::DbError;
use crate::LedgerClient;
use chrono::Utc;
use libsql::params;
use tracing::{info, instrument};
use uuid::Uuid;

/// Tamaño de lote de encolado del potfile.
const POTFILE_BATCH_SIZE: usize = 10_000;

/// Par crackeado listo para el potfile.
#[derive(Debug, Clone)]
pub struct PotfileEntry {
    pub hash_value: String,
    pub password: String,
    pub hashlist_id: Option<i64>,
}

pub struct PotfileRepository {
    database_client: LedgerClient,
}

impl PotfileRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Encola entradas en transacciones de hasta 10.000 filas.
    #[instrument(skip(self, entries))]
    pub async fn stage_entries(&self, entries: &[PotfileEntry]) -> Result<usize, DbError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let connection = self.database_client.get_connection()?;
        let staged_stamp = Utc::now().to_rfc3339();

        for batch_window in entries.chunks(POTFILE_BATCH_SIZE) {
            let transaction = connection
                .transaction()
                .await
                .map_err(|_| DbError::TransactionError)?;

            for entry in batch_window {
                transaction
                    .execute(
                        r#"
                        INSERT INTO potfile_staging (id, hash_value, password, hashlist_id, staged_at)
                        VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                        params![
                            Uuid::new_v4().to_string(),
                            entry.hash_value.clone(),
                            entry.password.clone(),
                            entry.hashlist_id,
                            staged_stamp.clone()
                        ],
                    )
                    .await?;
            }

            transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        }

        info!("🍯 [POTFILE_REPO]: {} entries staged for potfile drain.", entries.len());
        Ok(entries.len())
    }

    pub async fn count_staged(&self) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query("SELECT COUNT(*) FROM potfile_staging", ()).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }
}
