// [libs/domain/models/src/job.rs]
/*!
 * =================================================================
 * APARATO: JOB EXECUTION DOMAIN MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE TRABAJOS DE AUDITORÍA Y CAPAS INCREMENTALES
 *
 * # Invariante (Keyspace Accuracy):
 * 'effective_keyspace' nace como estimación y 'is_accurate_keyspace'
 * transiciona false -> true exactamente una vez, sobre la primera
 * observación del marcador de progreso del motor de cracking.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Modo de ataque soportado por el motor de cracking remoto.
/// Los discriminantes numéricos coinciden con los códigos `-a` del motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackMode {
    /// Diccionario directo (wordlists + reglas).
    Straight,
    /// Combinación de dos diccionarios (A × B).
    Combination,
    /// Fuerza bruta sobre una máscara de clases de caracteres.
    BruteForce,
    /// Híbrido diccionario + máscara.
    HybridWordlistMask,
    /// Híbrido máscara + diccionario.
    HybridMaskWordlist,
    /// Asociación 1:1 candidato por hash.
    Association,
}

impl AttackMode {
    /// Código numérico del motor de cracking (`-a`).
    pub fn engine_code(&self) -> u8 {
        match self {
            AttackMode::Straight => 0,
            AttackMode::Combination => 1,
            AttackMode::BruteForce => 3,
            AttackMode::HybridWordlistMask => 6,
            AttackMode::HybridMaskWordlist => 7,
            AttackMode::Association => 9,
        }
    }

    pub fn from_engine_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AttackMode::Straight),
            1 => Some(AttackMode::Combination),
            3 => Some(AttackMode::BruteForce),
            6 => Some(AttackMode::HybridWordlistMask),
            7 => Some(AttackMode::HybridMaskWordlist),
            9 => Some(AttackMode::Association),
            _ => None,
        }
    }
}

/// Ciclo de vida de un trabajo de auditoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    /// Keyspace agotado; drenando lotes de cracks antes del sellado final.
    Processing,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Processing => "processing",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "processing" => Some(JobStatus::Processing),
            "paused" => Some(JobStatus::Paused),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Estados terminales: ninguna transición posterior es válida.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// Orden de trabajo soberana registrada por la superficie administrativa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub hashlist_id: i64,
    pub attack_mode: AttackMode,
    /// Prioridad de despacho 1..10 (mayor = primero).
    pub priority: u8,
    /// Tope de agentes simultáneos (0 = ilimitado).
    pub max_agents: u32,
    pub wordlist_ids: Vec<i64>,
    pub rule_ids: Vec<i64>,
    pub mask: Option<String>,
    /// Charsets personalizados ?1..?4 para máscaras de fuerza bruta.
    pub custom_charsets: Vec<String>,
    pub increment_mode: bool,
    pub increment_min: Option<u32>,
    pub increment_max: Option<u32>,
    /// Keyspace base (posiciones --skip/--limit del motor).
    pub base_keyspace: Option<u64>,
    /// Producto de líneas de los ficheros de reglas (1 sin reglas).
    pub multiplication_factor: u64,
    /// Keyspace efectivo tras expansión de reglas; estimado hasta confirmación.
    pub effective_keyspace: Option<u64>,
    pub is_accurate_keyspace: bool,
    /// Multiplicador medio observado = efectivo_real / (base × factor).
    pub avg_rule_multiplier: f64,
    pub uses_rule_splitting: bool,
    pub allow_high_priority_override: bool,
    pub binary_version_id: i64,
    /// Sobreescritura por-trabajo de la duración nominal de fragmento.
    pub chunk_duration_override: Option<u64>,
    pub overall_progress_percent: f64,
    pub status: JobStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobExecution {
    /// Estimación nominal previa a cualquier confirmación del motor.
    pub fn estimated_effective_keyspace(&self) -> Option<u64> {
        self.base_keyspace
            .map(|base| base.saturating_mul(self.multiplication_factor.max(1)))
    }
}

/// Ciclo de vida de una capa incremental.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl LayerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LayerStatus::Pending => "pending",
            LayerStatus::Running => "running",
            LayerStatus::Completed => "completed",
            LayerStatus::Failed => "failed",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(LayerStatus::Pending),
            "running" => Some(LayerStatus::Running),
            "completed" => Some(LayerStatus::Completed),
            "failed" => Some(LayerStatus::Failed),
            _ => None,
        }
    }
}

/// Una longitud-paso de un trabajo de fuerza bruta en modo incremental.
/// Existe si y solo si `job.increment_mode = true`; el keyspace efectivo
/// del trabajo es la suma de sus capas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementLayer {
    pub id: Uuid,
    pub job_id: Uuid,
    /// Posición ordinal de la capa (0 = longitud mínima).
    pub layer_index: u32,
    /// Máscara truncada a la longitud de esta capa.
    pub mask: String,
    pub base_keyspace: u64,
    pub effective_keyspace: u64,
    pub is_accurate_keyspace: bool,
    pub status: LayerStatus,
}
