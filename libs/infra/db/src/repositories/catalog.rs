// [libs/infra/db/src/repositories/catalog.rs]
/*!
 * =================================================================
 * APARATO: RESOURCE CATALOG REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: RESOLUCIÓN ID -> FICHERO DE WORDLISTS, REGLAS Y BINARIOS
 *
 * Las rutas emitidas son relativas al data root compartido, tal como las
 * consumen los agentes: wordlists/<f>, rules/<f>, binaries/<id>/<f>.
 * =================================================================
 */

use crate::errors::DbError;
use crate::LedgerClient;
use libsql::{params, Row};
use tracing::instrument;

use krakenhashes_domain_models::{ResourceDescriptor, ResourceKind};

pub struct CatalogRepository {
    database_client: LedgerClient,
}

impl CatalogRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    // --- ESTRATO DE RESOLUCIÓN ---

    pub async fn fetch_wordlist(&self, wordlist_id: i64) -> Result<ResourceDescriptor, DbError> {
        self.fetch_flat_resource("wordlists", ResourceKind::Wordlist, wordlist_id).await
    }

    pub async fn fetch_rule(&self, rule_id: i64) -> Result<ResourceDescriptor, DbError> {
        self.fetch_flat_resource("rules", ResourceKind::Rule, rule_id).await
    }

    /// Los binarios viven bajo un subdirectorio por versión.
    #[instrument(skip(self))]
    pub async fn fetch_binary(&self, binary_version_id: i64) -> Result<ResourceDescriptor, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, filename, version_label, file_size, md5 FROM binary_versions WHERE id = ?1",
                params![binary_version_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let filename: String = row.get::<String>(1)?;
                Ok(ResourceDescriptor {
                    id: row.get::<i64>(0)?,
                    kind: ResourceKind::Binary,
                    relative_path: format!(
                        "{}/{}/{}",
                        ResourceKind::Binary.root_subdirectory(),
                        binary_version_id,
                        filename
                    ),
                    filename,
                    line_count: 0,
                    file_size: row.get::<i64>(3)?.max(0) as u64,
                    md5: row.get::<String>(4).ok(),
                    version_label: row.get::<String>(2).ok(),
                })
            }
            None => Err(DbError::ResourceNotFound(format!("binary_version:{}", binary_version_id))),
        }
    }

    async fn fetch_flat_resource(
        &self,
        table_name: &str,
        kind: ResourceKind,
        resource_id: i64,
    ) -> Result<ResourceDescriptor, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = format!(
            "SELECT id, filename, line_count, file_size, md5 FROM {} WHERE id = ?1",
            table_name
        );
        let mut rows = connection.query(&select, params![resource_id]).await?;

        match rows.next().await? {
            Some(row) => map_row_to_flat_resource(&row, kind),
            None => Err(DbError::ResourceNotFound(format!("{}:{}", table_name, resource_id))),
        }
    }

    /// Resolución en lote preservando el orden configurado del trabajo.
    pub async fn fetch_wordlists(&self, wordlist_ids: &[i64]) -> Result<Vec<ResourceDescriptor>, DbError> {
        let mut descriptors = Vec::with_capacity(wordlist_ids.len());
        for wordlist_id in wordlist_ids {
            descriptors.push(self.fetch_wordlist(*wordlist_id).await?);
        }
        Ok(descriptors)
    }

    pub async fn fetch_rules(&self, rule_ids: &[i64]) -> Result<Vec<ResourceDescriptor>, DbError> {
        let mut descriptors = Vec::with_capacity(rule_ids.len());
        for rule_id in rule_ids {
            descriptors.push(self.fetch_rule(*rule_id).await?);
        }
        Ok(descriptors)
    }

    // --- ESTRATO DE APROVISIONAMIENTO ---

    pub async fn register_wordlist(
        &self,
        wordlist_id: i64,
        filename: &str,
        line_count: u64,
        file_size: u64,
    ) -> Result<(), DbError> {
        self.register_flat_resource("wordlists", wordlist_id, filename, line_count, file_size).await
    }

    pub async fn register_rule(
        &self,
        rule_id: i64,
        filename: &str,
        line_count: u64,
        file_size: u64,
    ) -> Result<(), DbError> {
        self.register_flat_resource("rules", rule_id, filename, line_count, file_size).await
    }

    pub async fn register_binary(
        &self,
        binary_version_id: i64,
        filename: &str,
        version_label: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO binary_versions (id, filename, version_label)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    filename = excluded.filename,
                    version_label = excluded.version_label
                "#,
                params![binary_version_id, filename, version_label],
            )
            .await?;
        Ok(())
    }

    async fn register_flat_resource(
        &self,
        table_name: &str,
        resource_id: i64,
        filename: &str,
        line_count: u64,
        file_size: u64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let statement = format!(
            r#"
            INSERT INTO {} (id, filename, line_count, file_size)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                line_count = excluded.line_count,
                file_size = excluded.file_size
            "#,
            table_name
        );
        connection
            .execute(&statement, params![resource_id, filename, line_count as i64, file_size as i64])
            .await?;
        Ok(())
    }
}

fn map_row_to_flat_resource(row: &Row, kind: ResourceKind) -> Result<ResourceDescriptor, DbError> {
    let filename: String = row.get::<String>(1)?;
    Ok(ResourceDescriptor {
        id: row.get::<i64>(0)?,
        kind,
        relative_path: format!("{}/{}", kind.root_subdirectory(), filename),
        filename,
        line_count: row.get::<i64>(2)?.max(0) as u64,
        file_size: row.get::<i64>(3)?.max(0) as u64,
        md5: row.get::<String>(4).ok(),
        version_label: None,
    })
}
