// [libs/domain/models/src/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT DOMAIN MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE NODOS REMOTOS Y SUS DISPOSITIVOS
 *
 * # Invariante (Busy Coherence):
 * `metadata.busy_status = true` si y solo si existe un fragmento con
 * `agent_id = agent.id` en estado {assigned, running, processing}
 * (consistencia eventual dentro de un tick del planificador).
 * =================================================================
 */

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Estado operativo de un agente remoto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Error,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Inactive => "inactive",
            AgentStatus::Error => "error",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "active" => Some(AgentStatus::Active),
            "inactive" => Some(AgentStatus::Inactive),
            "error" => Some(AgentStatus::Error),
            _ => None,
        }
    }
}

/// Ventana diaria UTC de elegibilidad de despacho.
/// Una ventana con start > end cruza la medianoche y envuelve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentSchedule {
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
}

impl AgentSchedule {
    /// Evalúa si el instante dado cae dentro de la ventana de despacho.
    pub fn is_open_at(&self, moment: DateTime<Utc>) -> bool {
        let clock = moment.time();
        if self.window_start <= self.window_end {
            clock >= self.window_start && clock < self.window_end
        } else {
            // Ventana nocturna: [start, 24:00) ∪ [00:00, end)
            clock >= self.window_start || clock < self.window_end
        }
    }
}

/// Metadatos de runtime del agente. Mutados únicamente a través del
/// método read-modify-write atómico del repositorio (last-write-wins).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRuntimeMetadata {
    pub busy_status: bool,
    pub current_task_id: Option<Uuid>,
    pub current_job_id: Option<Uuid>,
    /// Trabajo esperando el resultado de un benchmark forzado en este agente.
    pub pending_benchmark_job: Option<Uuid>,
    /// El agente completó el benchmark forzado de este trabajo y tiene
    /// prioridad para su primer fragmento.
    pub forced_benchmark_completed_for_job: Option<Uuid>,
    /// Fallos consecutivos globales del agente; se resetea en éxito.
    pub consecutive_failures: u32,
}

/// Nodo remoto de cracking registrado ante el coordinador.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub status: AgentStatus,
    pub enabled: bool,
    pub owner_id: Option<i64>,
    /// Parámetros extra inyectados verbatim en la línea del motor.
    pub extra_parameters: Option<String>,
    /// Patrón de versión de binario aceptado (ej. "7.*").
    pub binary_version_pattern: Option<String>,
    pub schedule: Option<AgentSchedule>,
    /// Los ficheros del agente están sincronizados con el data root.
    pub sync_status: bool,
    pub metadata: AgentRuntimeMetadata,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Compatibilidad del binario solicitado contra el patrón del agente.
    /// Patrón vacío o ausente acepta cualquier versión; un sufijo '*'
    /// actúa como comodín de prefijo.
    pub fn accepts_binary_version(&self, version_label: &str) -> bool {
        match self.binary_version_pattern.as_deref() {
            None | Some("") | Some("*") => true,
            Some(pattern) => {
                if let Some(prefix) = pattern.strip_suffix('*') {
                    version_label.starts_with(prefix.trim_end_matches('.'))
                } else {
                    version_label == pattern
                }
            }
        }
    }
}

/// Dispositivo de cómputo individual de un agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDevice {
    pub agent_id: i64,
    pub device_id: i64,
    pub device_name: String,
    pub enabled: bool,
    pub selected_runtime: Option<String>,
}
