// [libs/domain/models/src/tuning.rs]
/*!
 * =================================================================
 * APARATO: SYSTEM TUNING CONTRACT
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: OPCIONES RECONOCIDAS DEL ALMACÉN CLAVE/VALOR
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Opciones de afinación reconocidas por el núcleo de planificación.
/// Se hidratan desde la tabla `system_settings`; toda clave ausente
/// cae a su valor nominal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemTuning {
    /// Cadencia de reporte de progreso de los agentes (segundos).
    pub progress_reporting_interval: u64,
    /// Tiempo máximo de espera de un benchmark forzado (segundos).
    pub speedtest_timeout_seconds: u64,
    /// Reintentos permitidos antes de fallo permanente de un fragmento.
    pub max_chunk_retry_attempts: u32,
    /// Fallos consecutivos (agente, trabajo) antes de exclusión de despacho.
    pub max_consecutive_failures: u32,
    /// Duración nominal de fragmento (segundos).
    pub chunk_duration_default_seconds: u64,
    /// Umbral del factor de multiplicación que activa rule splitting.
    pub rule_split_threshold: u64,
    /// Margen mínimo de prioridad para el desalojo de alta prioridad.
    pub high_priority_override_margin: u8,
    /// Habilitación global del potfile.
    pub potfile_enabled: bool,
    /// Ventana de gracia de reconexión de agentes (segundos).
    pub reconnect_grace_seconds: u64,
    /// Cadencia del tick del planificador (segundos).
    pub scheduler_tick_seconds: u64,
    /// Silencio de latido tras el cual un agente se declara inactivo (segundos).
    pub agent_silence_threshold_seconds: u64,
}

impl SystemTuning {
    pub const KEY_PROGRESS_INTERVAL: &'static str = "progress_reporting_interval";
    pub const KEY_SPEEDTEST_TIMEOUT: &'static str = "speedtest_timeout_seconds";
    pub const KEY_MAX_CHUNK_RETRIES: &'static str = "max_chunk_retry_attempts";
    pub const KEY_MAX_CONSECUTIVE_FAILURES: &'static str = "max_consecutive_failures";
    pub const KEY_CHUNK_DURATION: &'static str = "chunk_duration_default_seconds";
    pub const KEY_RULE_SPLIT_THRESHOLD: &'static str = "rule_split_threshold";
    pub const KEY_OVERRIDE_MARGIN: &'static str = "high_priority_override_margin";
    pub const KEY_POTFILE_ENABLED: &'static str = "potfile_enabled";
    pub const KEY_RECONNECT_GRACE: &'static str = "reconnect_grace_seconds";
    pub const KEY_SCHEDULER_TICK: &'static str = "scheduler_tick_seconds";
    pub const KEY_AGENT_SILENCE: &'static str = "agent_silence_threshold_seconds";
}

impl Default for SystemTuning {
    fn default() -> Self {
        Self {
            progress_reporting_interval: 5,
            speedtest_timeout_seconds: 180,
            max_chunk_retry_attempts: 3,
            max_consecutive_failures: 3,
            chunk_duration_default_seconds: 1200,
            rule_split_threshold: 10_000,
            high_priority_override_margin: 1,
            potfile_enabled: true,
            reconnect_grace_seconds: 120,
            scheduler_tick_seconds: 5,
            agent_silence_threshold_seconds: 300,
        }
    }
}
