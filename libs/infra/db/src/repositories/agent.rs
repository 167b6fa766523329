// [libs/infra/db/src/repositories/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: INVENTARIO DE NODOS, DISPOSITIVOS Y CONTADORES DE FALLO
 *
 * # Invariante (Metadata RMW):
 * Los metadatos de runtime se mutan exclusivamente a través de
 * apply_metadata_patch: lectura + mutación + escritura dentro de una
 * transacción (last-write-wins optimista).
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::{as_bool, parse_timestamp};
use crate::LedgerClient;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::{info, instrument, warn};

use krakenhashes_domain_models::{Agent, AgentDevice, AgentRuntimeMetadata, AgentSchedule, AgentStatus};

const AGENT_COLUMNS: &str = r#"
    id, name, status, enabled, owner_id, extra_parameters,
    binary_version_pattern, schedule, sync_status, metadata,
    last_seen_at, created_at
"#;

pub struct AgentRepository {
    database_client: LedgerClient,
}

impl AgentRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    // --- ESTRATO DE REGISTRO ---

    /// Registro idempotente por nombre: un agente que reconecta conserva
    /// su identidad numérica y pasa a 'active'.
    #[instrument(skip(self))]
    pub async fn register_agent(&self, agent_name: &str) -> Result<Agent, DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                r#"
                INSERT INTO agents (name, status, metadata, created_at)
                VALUES (?1, 'active', '{}', ?2)
                ON CONFLICT(name) DO UPDATE SET
                    status = 'active',
                    last_seen_at = ?2
                "#,
                params![agent_name, Utc::now().to_rfc3339()],
            )
            .await?;

        let agent = self.fetch_by_name(agent_name).await?;
        info!("🤝 [AGENT_REPO]: Agent [{}] registered as unit #{}.", agent_name, agent.id);
        Ok(agent)
    }

    pub async fn fetch_agent(&self, agent_id: i64) -> Result<Agent, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS);
        let mut rows = connection.query(&select, params![agent_id]).await?;

        match rows.next().await? {
            Some(row) => map_row_to_agent(&row),
            None => Err(DbError::AgentNotFound),
        }
    }

    /// Variante de enlace débil: un agente borrado no es un error del
    /// llamador, las tareas huérfanas se recuperan por otra vía.
    pub async fn find_agent_if_exists(&self, agent_id: i64) -> Result<Option<Agent>, DbError> {
        match self.fetch_agent(agent_id).await {
            Ok(agent) => Ok(Some(agent)),
            Err(DbError::AgentNotFound) => Ok(None),
            Err(other) => Err(other),
        }
    }

    pub async fn fetch_by_name(&self, agent_name: &str) -> Result<Agent, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = format!("SELECT {} FROM agents WHERE name = ?1", AGENT_COLUMNS);
        let mut rows = connection.query(&select, params![agent_name]).await?;

        match rows.next().await? {
            Some(row) => map_row_to_agent(&row),
            None => Err(DbError::AgentNotFound),
        }
    }

    pub async fn fetch_all(&self) -> Result<Vec<Agent>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = format!("SELECT {} FROM agents ORDER BY id ASC", AGENT_COLUMNS);
        let mut rows = connection.query(&select, ()).await?;

        let mut agents = Vec::new();
        while let Some(row) = rows.next().await? {
            agents.push(map_row_to_agent(&row)?);
        }
        Ok(agents)
    }

    // --- ESTRATO DE ESTADO ---

    pub async fn set_status(&self, agent_id: i64, status: AgentStatus) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE agents SET status = ?2 WHERE id = ?1",
                params![agent_id, status.as_str()],
            )
            .await?;
        Ok(())
    }

    pub async fn touch_last_seen(&self, agent_id: i64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE agents SET last_seen_at = ?2 WHERE id = ?1",
                params![agent_id, Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /// Declara inactivos los agentes silenciosos y devuelve sus ids para
    /// que el supervisor de reconexión procese sus tareas en vuelo.
    #[instrument(skip(self))]
    pub async fn mark_silent_agents_inactive(
        &self,
        silence_threshold: DateTime<Utc>,
    ) -> Result<Vec<i64>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                "SELECT id FROM agents WHERE status = 'active' AND (last_seen_at IS NULL OR last_seen_at < ?1)",
                params![silence_threshold.to_rfc3339()],
            )
            .await?;

        let mut silent_agent_ids = Vec::new();
        while let Some(row) = rows.next().await? {
            silent_agent_ids.push(row.get::<i64>(0)?);
        }

        for agent_id in &silent_agent_ids {
            connection
                .execute("UPDATE agents SET status = 'inactive' WHERE id = ?1", params![*agent_id])
                .await?;
            warn!("💤 [AGENT_REPO]: Agent #{} declared inactive after heartbeat silence.", agent_id);
        }

        Ok(silent_agent_ids)
    }

    // --- ESTRATO DE METADATOS (RMW ATÓMICO) ---

    /// Única vía de mutación de metadatos de runtime. La mutación corre
    /// dentro de una transacción sobre el JSON fresco de la fila.
    #[instrument(skip(self, mutator))]
    pub async fn apply_metadata_patch<MutatorFn>(
        &self,
        agent_id: i64,
        mutator: MutatorFn,
    ) -> Result<AgentRuntimeMetadata, DbError>
    where
        MutatorFn: FnOnce(&mut AgentRuntimeMetadata),
    {
        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        let mut rows = transaction
            .query("SELECT metadata FROM agents WHERE id = ?1", params![agent_id])
            .await?;

        let raw_metadata: String = match rows.next().await? {
            Some(row) => row.get::<String>(0)?,
            None => return Err(DbError::AgentNotFound),
        };

        let mut metadata: AgentRuntimeMetadata = serde_json::from_str(&raw_metadata)
            .unwrap_or_default();
        mutator(&mut metadata);

        let serialized = serde_json::to_string(&metadata)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        transaction
            .execute(
                "UPDATE agents SET metadata = ?2 WHERE id = ?1",
                params![agent_id, serialized],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        Ok(metadata)
    }

    // --- ESTRATO DE DISPOSITIVOS ---

    pub async fn upsert_device(&self, device: &AgentDevice) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO agent_devices (agent_id, device_id, device_name, enabled, selected_runtime)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(agent_id, device_id) DO UPDATE SET
                    device_name = excluded.device_name,
                    enabled = excluded.enabled,
                    selected_runtime = excluded.selected_runtime
                "#,
                params![
                    device.agent_id,
                    device.device_id,
                    device.device_name.clone(),
                    device.enabled as i64,
                    device.selected_runtime.clone()
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_devices(&self, agent_id: i64) -> Result<Vec<AgentDevice>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT agent_id, device_id, device_name, enabled, selected_runtime
                 FROM agent_devices WHERE agent_id = ?1 ORDER BY device_id ASC",
                params![agent_id],
            )
            .await?;

        let mut devices = Vec::new();
        while let Some(row) = rows.next().await? {
            devices.push(AgentDevice {
                agent_id: row.get::<i64>(0)?,
                device_id: row.get::<i64>(1)?,
                device_name: row.get::<String>(2)?,
                enabled: as_bool(row.get::<i64>(3)?),
                selected_runtime: row.get::<String>(4).ok(),
            });
        }
        Ok(devices)
    }

    /// Lista explícita de dispositivos para el payload de asignación:
    /// Some(habilitados) si existe al menos uno deshabilitado, None si el
    /// inventario completo está habilitado (el campo se omite del cable).
    pub async fn enabled_devices_payload(&self, agent_id: i64) -> Result<Option<Vec<i64>>, DbError> {
        let devices = self.fetch_devices(agent_id).await?;

        let any_disabled = devices.iter().any(|device| !device.enabled);
        if !any_disabled {
            return Ok(None);
        }

        Ok(Some(
            devices
                .iter()
                .filter(|device| device.enabled)
                .map(|device| device.device_id)
                .collect(),
        ))
    }

    // --- ESTRATO DE CONTADORES DE FALLO ---

    /// Incrementa y devuelve el contador de fallos consecutivos del par
    /// (agente, trabajo).
    pub async fn record_task_failure(&self, agent_id: i64, job_id: &str) -> Result<u32, DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO agent_job_failures (agent_id, job_id, consecutive_failures)
                VALUES (?1, ?2, 1)
                ON CONFLICT(agent_id, job_id) DO UPDATE SET
                    consecutive_failures = consecutive_failures + 1
                "#,
                params![agent_id, job_id],
            )
            .await?;

        self.consecutive_failures(agent_id, job_id).await
    }

    /// El éxito limpia el contador del par.
    pub async fn clear_task_failures(&self, agent_id: i64, job_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "DELETE FROM agent_job_failures WHERE agent_id = ?1 AND job_id = ?2",
                params![agent_id, job_id],
            )
            .await?;
        Ok(())
    }

    pub async fn consecutive_failures(&self, agent_id: i64, job_id: &str) -> Result<u32, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT consecutive_failures FROM agent_job_failures WHERE agent_id = ?1 AND job_id = ?2",
                params![agent_id, job_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u32),
            None => Ok(0),
        }
    }
}

// --- MAPEADOR DE FILA ---

fn map_row_to_agent(row: &Row) -> Result<Agent, DbError> {
    let status_label: String = row.get::<String>(2)?;
    let status = AgentStatus::parse(&status_label)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_AGENT_STATUS [{}]", status_label)))?;

    let schedule: Option<AgentSchedule> = match row.get::<String>(7).ok() {
        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw)
            .map_err(|fault| DbError::MappingError(format!("SCHEDULE_PARSE_FAULT: {}", fault)))?,
        _ => None,
    };

    let metadata: AgentRuntimeMetadata = match row.get::<String>(9).ok() {
        Some(raw) if !raw.is_empty() => serde_json::from_str(&raw).unwrap_or_default(),
        _ => AgentRuntimeMetadata::default(),
    };

    let last_seen_at = match row.get::<String>(10).ok() {
        Some(raw) => Some(parse_timestamp(&raw)?),
        None => None,
    };

    Ok(Agent {
        id: row.get::<i64>(0)?,
        name: row.get::<String>(1)?,
        status,
        enabled: as_bool(row.get::<i64>(3)?),
        owner_id: row.get::<i64>(4).ok(),
        extra_parameters: row.get::<String>(5).ok(),
        binary_version_pattern: row.get::<String>(6).ok(),
        schedule,
        sync_status: as_bool(row.get::<i64>(8)?),
        metadata,
        last_seen_at,
        created_at: parse_timestamp(&row.get::<String>(11)?)?,
    })
}
