// [libs/infra/db/src/repositories/hashlist.rs]
/*!
 * =================================================================
 * APARATO: HASHLIST REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: INVENTARIO DE HASHLISTS Y CONTADORES DESNORMALIZADOS
 *
 * # Invariante (Counter Serialization):
 * El contador cracked_hashes se incrementa con una única sentencia
 * UPDATE por hashlist; el candado de fila del motor serializa los
 * incrementos concurrentes.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::as_bool;
use crate::LedgerClient;
use libsql::{params, Row};
use tracing::{debug, instrument};

use krakenhashes_domain_models::Hashlist;

const HASHLIST_COLUMNS: &str = r#"
    id, name, hash_type_id, client_id, total_hashes, cracked_hashes, excluded_from_potfile
"#;

pub struct HashlistRepository {
    database_client: LedgerClient,
}

impl HashlistRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    pub async fn create_hashlist(&self, hashlist: &Hashlist) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO hashlists (
                    id, name, hash_type_id, client_id,
                    total_hashes, cracked_hashes, excluded_from_potfile
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    hashlist.id,
                    hashlist.name.clone(),
                    hashlist.hash_type_id,
                    hashlist.client_id,
                    hashlist.total_hashes as i64,
                    hashlist.cracked_hashes as i64,
                    hashlist.excluded_from_potfile as i64
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_hashlist(&self, hashlist_id: i64) -> Result<Hashlist, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = format!("SELECT {} FROM hashlists WHERE id = ?1", HASHLIST_COLUMNS);
        let mut rows = connection.query(&select, params![hashlist_id]).await?;

        match rows.next().await? {
            Some(row) => map_row_to_hashlist(&row),
            None => Err(DbError::HashlistNotFound),
        }
    }

    /// Incremento serializado del contador desnormalizado.
    #[instrument(skip(self))]
    pub async fn increment_cracked_count(&self, hashlist_id: i64, delta: u64) -> Result<(), DbError> {
        if delta == 0 {
            return Ok(());
        }

        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                UPDATE hashlists
                SET cracked_hashes = MIN(cracked_hashes + ?2, total_hashes)
                WHERE id = ?1
                "#,
                params![hashlist_id, delta as i64],
            )
            .await?;

        debug!("🧮 [HASHLIST_REPO]: Hashlist #{} cracked counter advanced by {}.", hashlist_id, delta);
        Ok(())
    }

    /// Recuento real contra la relación N:M (verificación de integridad).
    pub async fn recount_cracked(&self, hashlist_id: i64) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT COUNT(*) FROM hashlist_hashes
                JOIN hashes ON hashes.id = hashlist_hashes.hash_id
                WHERE hashlist_hashes.hashlist_id = ?1 AND hashes.is_cracked = 1
                "#,
                params![hashlist_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }

    /// Exclusión de potfile a nivel de cliente.
    pub async fn is_client_excluded_from_potfile(&self, client_id: i64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT excluded_from_potfile FROM clients WHERE id = ?1",
                params![client_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(as_bool(row.get::<i64>(0)?)),
            None => Ok(false),
        }
    }

    pub async fn register_client(&self, client_id: i64, name: &str, excluded: bool) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO clients (id, name, excluded_from_potfile)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    excluded_from_potfile = excluded.excluded_from_potfile
                "#,
                params![client_id, name, excluded as i64],
            )
            .await?;
        Ok(())
    }
}

fn map_row_to_hashlist(row: &Row) -> Result<Hashlist, DbError> {
    Ok(Hashlist {
        id: row.get::<i64>(0)?,
        name: row.get::<String>(1)?,
        hash_type_id: row.get::<i64>(2)?,
        client_id: row.get::<i64>(3).ok(),
        total_hashes: row.get::<i64>(4)?.max(0) as u64,
        cracked_hashes: row.get::<i64>(5)?.max(0) as u64,
        excluded_from_potfile: as_bool(row.get::<i64>(6)?),
    })
}
