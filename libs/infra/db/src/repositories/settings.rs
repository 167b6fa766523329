// INICIO DEL ARCHIVO [libs/infra/db/src/repositories/settings.rs]
/*!
 * =================================================================
 * APARATO: SYSTEM SETTINGS REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: HIDRATACIÓN TIPADA DEL ALMACÉN CLAVE/VALOR
 * =================================================================
 */

use crate::errors::DbError;
use crate::LedgerClient;
use chrono::Utc;
use libsql::params;
use std::collections::HashMap;
use tracing::{info, instrument, warn};

use krakenhashes_domain_models::SystemTuning;

pub struct SettingsRepository {
    database_client: LedgerClient,
}

impl SettingsRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Sella una opción con UPSERT atómico.
    #[instrument(skip(self, value))]
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO system_settings (key, value_text, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value_text = excluded.value_text,
                    updated_at = excluded.updated_at
                "#,
                params![key, value, Utc::now().to_rfc3339()],
            )
            .await?;

        info!("⚙️ [SETTINGS]: Option [{}] crystallized.", key);
        Ok(())
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query("SELECT value_text FROM system_settings WHERE key = ?1", params![key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<String>(0).ok()),
            None => Ok(None),
        }
    }

    /// Hidrata la afinación completa. Toda clave ausente o malformada cae
    /// a su valor nominal (una clave corrupta no debe tumbar el tick).
    #[instrument(skip(self))]
    pub async fn load_tuning(&self) -> Result<SystemTuning, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query("SELECT key, value_text FROM system_settings", ())
            .await?;

        let mut stored: HashMap<String, String> = HashMap::new();
        while let Some(row) = rows.next().await? {
            if let Ok(value) = row.get::<String>(1) {
                stored.insert(row.get::<String>(0)?, value);
            }
        }

        let mut tuning = SystemTuning::default();

        read_u64(&stored, SystemTuning::KEY_PROGRESS_INTERVAL, &mut tuning.progress_reporting_interval);
        read_u64(&stored, SystemTuning::KEY_SPEEDTEST_TIMEOUT, &mut tuning.speedtest_timeout_seconds);
        read_u32(&stored, SystemTuning::KEY_MAX_CHUNK_RETRIES, &mut tuning.max_chunk_retry_attempts);
        read_u32(&stored, SystemTuning::KEY_MAX_CONSECUTIVE_FAILURES, &mut tuning.max_consecutive_failures);
        read_u64(&stored, SystemTuning::KEY_CHUNK_DURATION, &mut tuning.chunk_duration_default_seconds);
        read_u64(&stored, SystemTuning::KEY_RULE_SPLIT_THRESHOLD, &mut tuning.rule_split_threshold);
        read_u8(&stored, SystemTuning::KEY_OVERRIDE_MARGIN, &mut tuning.high_priority_override_margin);
        read_bool(&stored, SystemTuning::KEY_POTFILE_ENABLED, &mut tuning.potfile_enabled);
        read_u64(&stored, SystemTuning::KEY_RECONNECT_GRACE, &mut tuning.reconnect_grace_seconds);
        read_u64(&stored, SystemTuning::KEY_SCHEDULER_TICK, &mut tuning.scheduler_tick_seconds);
        read_u64(&stored, SystemTuning::KEY_AGENT_SILENCE, &mut tuning.agent_silence_threshold_seconds);

        Ok(tuning)
    }
}

fn read_u64(stored: &HashMap<String, String>, key: &str, target: &mut u64) {
    if let Some(raw) = stored.get(key) {
        match raw.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("⚠️ [SETTINGS]: Option [{}] malformed, nominal value retained.", key),
        }
    }
}

fn read_u32(stored: &HashMap<String, String>, key: &str, target: &mut u32) {
    if let Some(raw) = stored.get(key) {
        match raw.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("⚠️ [SETTINGS]: Option [{}] malformed, nominal value retained.", key),
        }
    }
}

fn read_u8(stored: &HashMap<String, String>, key: &str, target: &mut u8) {
    if let Some(raw) = stored.get(key) {
        match raw.parse::<u8>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("⚠️ [SETTINGS]: Option [{}] malformed, nominal value retained.", key),
        }
    }
}

fn read_bool(stored: &HashMap<String, String>, key: &str, target: &mut bool) {
    if let Some(raw) = stored.get(key) {
        match raw.as_str() {
            "true" | "1" => *target = true,
            "false" | "0" => *target = false,
            _ => warn!("⚠️ [SETTINGS]: Option [{}] malformed, nominal value retained.", key),
        }
    }
}
// FIN DEL ARCHIVO [libs/infra/db/src/repositories/settings.rs]
