// [libs/infra/protocol/src/frames.rs]
/*!
 * =================================================================
 * APARATO: DISPATCH FRAME CONTRACTS
 * CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
 * RESPONSABILIDAD: DEFINICIÓN POLIMÓRFICA DE TRAMAS COORDINADOR <-> AGENTE
 *
 * # Invariante (Suma Etiquetada Cerrada):
 * El protocolo es un conjunto cerrado de variantes etiquetadas con
 * despacho exhaustivo. Todo manejo de tramas entrantes agota el match;
 * una variante nueva obliga a decidir su manejador en compilación.
 * =================================================================
 */

use krakenhashes_domain_models::{AttackMode, CrackedHash};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trama del canal de despacho. En el cable viaja como `{type, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DispatchFrame {
    // --- COORDINADOR -> AGENTE ---
    TaskAssignment(TaskAssignmentPayload),
    JobStop(JobStopPayload),
    ForceCleanup,
    BenchmarkRequest(BenchmarkRequestPayload),
    SyncRequest(SyncRequestPayload),

    // --- AGENTE -> COORDINADOR ---
    AgentHello(AgentHelloPayload),
    Heartbeat(HeartbeatPayload),
    Progress(ProgressPayload),
    CrackBatch(CrackBatchPayload),
    CrackBatchesComplete(CrackBatchesCompletePayload),
    BenchmarkResult(BenchmarkResultPayload),
}

/// Asignación de un fragmento de keyspace a un agente.
/// Los campos incrementales viajan solo en trabajos NO estratificados:
/// una tarea de capa lleva la máscara de su capa y los omite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssignmentPayload {
    pub task_id: Uuid,
    pub job_id: Uuid,
    pub hashlist_id: i64,
    pub hashlist_path: String,
    pub attack_mode: AttackMode,
    pub hash_type: i64,
    pub keyspace_start: u64,
    pub keyspace_end: u64,
    pub wordlist_paths: Vec<String>,
    pub rule_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    pub binary_path: String,
    pub chunk_duration: u64,
    pub report_interval: u64,
    pub output_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_parameters: Option<String>,
    /// Presente solo cuando el agente tiene algún dispositivo deshabilitado.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_devices: Option<Vec<i64>>,
    pub is_keyspace_split: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment_max: Option<u32>,
}

/// Causa de una orden de detención de tarea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Desalojado por un trabajo de prioridad superior.
    Preempted,
    /// El hashlist quedó completamente crackeado.
    HashlistComplete,
    /// Cancelación administrativa del trabajo.
    Cancelled,
    /// La tarea reportada en reconexión ya había completado.
    AlreadyComplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStopPayload {
    pub task_id: Uuid,
    pub reason: StopReason,
}

/// Solicitud de benchmark reforzado: transporta el contexto completo del
/// trabajo para que el marcador progress[1] del motor reporte el keyspace
/// efectivo verdadero del trabajo (o de la capa).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRequestPayload {
    pub request_id: Uuid,
    /// Identificador del trabajo, o de la capa incremental bajo benchmark.
    pub job_execution_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    pub hash_type: i64,
    pub attack_mode: AttackMode,
    pub binary_path: String,
    pub hashlist_path: String,
    pub wordlist_paths: Vec<String>,
    pub rule_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    /// Duración del speedtest (segundos).
    pub test_duration: u64,
    /// Tiempo máximo de espera del resultado (segundos).
    pub timeout_duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_parameters: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled_devices: Option<Vec<i64>>,
}

/// Señal de pre-sincronización de ficheros (ej. cortes de reglas recién creados).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequestPayload {
    pub request_id: Uuid,
    pub file_types: Vec<String>,
}

/// Presentación del agente al abrir (o reabrir) el canal. Una tarea
/// reportada dispara el protocolo de recuperación de reconexión.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHelloPayload {
    pub agent_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_task_id: Option<Uuid>,
    /// Progreso absoluto preservado de la tarea en vuelo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyspace_processed: Option<u64>,
}

/// Pulso de vida ligero del agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<Uuid>,
}

/// Estado de ejecución reportado por el agente dentro de un frame de progreso.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedTaskStatus {
    Running,
    Completed,
    Failed,
}

/// Reporte de progreso de una tarea. `keyspace_processed` es ABSOLUTO
/// dentro del rango base del trabajo, nunca un delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub task_id: Uuid,
    pub keyspace_processed: u64,
    pub effective_progress: u64,
    pub progress_percent: f64,
    pub hash_rate: u64,
    /// Marcador progress[1] del motor; para tareas rule-split es el
    /// keyspace real del fragmento, para keyspace-split el del trabajo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_effective_keyspace: Option<u64>,
    pub cracked_count: u64,
    /// Cracks inline oportunistas (lotes masivos viajan en crack_batch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cracked_hashes: Option<Vec<CrackedHash>>,
    pub status: ReportedTaskStatus,
    /// Código 6 del motor: todos los hashes del hashlist crackeados.
    pub all_hashes_cracked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Lote desacoplado de cracks de una tarea. Los lotes pueden llegar
/// desordenados entre sí; el conteo contra expected_crack_count absorbe
/// el desorden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrackBatchPayload {
    pub task_id: Uuid,
    pub cracked_hashes: Vec<CrackedHash>,
}

/// Señal de cierre del flujo de lotes de una tarea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrackBatchesCompletePayload {
    pub task_id: Uuid,
}

/// Resultado de un benchmark (reforzado o de rutina).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResultPayload {
    pub request_id: Uuid,
    /// Eco del job_execution_id solicitado (trabajo o capa).
    pub job_execution_id: Uuid,
    pub hash_type: i64,
    pub attack_mode: AttackMode,
    pub speed_hashes_per_second: u64,
    /// progress[1] del speedtest: keyspace efectivo verdadero observado.
    pub total_effective_keyspace: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
