// [libs/domain/models/src/task.rs]
/*!
 * =================================================================
 * APARATO: TASK CHUNK DOMAIN MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATO DEL FRAGMENTO DE KEYSPACE ASIGNABLE
 *
 * # Invariante (Cobertura Contigua):
 * Para un trabajo, el conjunto de rangos [keyspace_start, keyspace_end)
 * de sus fragmentos es una cobertura sin solapes ni huecos de
 * [0, base_keyspace); por capa en modo incremental.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ciclo de vida de un fragmento de trabajo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    /// Escrito en el canal de despacho; aún sin primer progreso.
    Assigned,
    Running,
    /// Keyspace agotado; esperando el drenaje de lotes de cracks.
    Processing,
    Completed,
    Failed,
    Cancelled,
    /// El agente propietario perdió el enlace; en gracia de reconexión.
    ReconnectPending,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Running => "running",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::ReconnectPending => "reconnect_pending",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(TaskStatus::Pending),
            "assigned" => Some(TaskStatus::Assigned),
            "running" => Some(TaskStatus::Running),
            "processing" => Some(TaskStatus::Processing),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            "cancelled" => Some(TaskStatus::Cancelled),
            "reconnect_pending" => Some(TaskStatus::ReconnectPending),
            _ => None,
        }
    }

    /// Estados que mantienen al agente ocupado.
    pub fn occupies_agent(&self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::Running | TaskStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
    }
}

/// Fragmento contiguo de keyspace asignado a un único agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskChunk {
    pub id: Uuid,
    pub job_id: Uuid,
    /// Capa incremental propietaria (solo trabajos increment_mode).
    pub increment_layer_id: Option<Uuid>,
    /// Enlace débil: el agente puede desaparecer sin cascada sobre el fragmento.
    pub agent_id: Option<i64>,
    /// Ordinal 1-based dentro del trabajo; único por (job, chunk_number).
    pub chunk_number: u32,
    pub keyspace_start: u64,
    pub keyspace_end: u64,
    /// Progreso absoluto reportado por el agente (no delta).
    pub keyspace_processed: u64,
    pub effective_keyspace_start: u64,
    pub effective_keyspace_end: u64,
    /// Keyspace real del fragmento según el marcador del motor (solo rule-split).
    pub chunk_actual_keyspace: Option<u64>,
    pub is_actual_keyspace: bool,
    pub is_keyspace_split: bool,
    pub is_rule_split: bool,
    pub rule_start_index: Option<u64>,
    pub rule_end_index: Option<u64>,
    pub rule_chunk_path: Option<String>,
    pub chunk_duration_seconds: u64,
    pub progress_percent: f64,
    pub hash_rate: u64,
    pub retry_count: u32,
    pub expected_crack_count: u64,
    pub received_crack_count: u64,
    pub batches_complete: bool,
    /// Etiqueta cruda reportada por el agente (telemetría, no máquina de estados).
    pub detailed_status: Option<String>,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TaskChunk {
    /// Ancho del rango base cubierto por este fragmento.
    pub fn base_width(&self) -> u64 {
        self.keyspace_end.saturating_sub(self.keyspace_start)
    }

    /// Agotamiento: el progreso absoluto alcanzó el final del rango.
    pub fn is_keyspace_exhausted(&self) -> bool {
        self.keyspace_processed >= self.keyspace_end
    }

    /// Un fragmento en 'processing' completa cuando los lotes cerraron y
    /// el conteo recibido alcanzó al esperado.
    pub fn is_drain_complete(&self) -> bool {
        self.batches_complete && self.received_crack_count >= self.expected_crack_count
    }
}
