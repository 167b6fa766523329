// [libs/infra/db/src/schema.rs]
/*!
 * =================================================================
 * APARATO: COORDINATOR DATABASE SCHEMA
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * Tres estratos: solidificación (tablas), evolución (mutaciones de
 * columna sobre despliegues previos) y endurecimiento (índices de
 * aceleración del despacho y del pipeline de cracks).
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 */
const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_JOBS", r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            hashlist_id INTEGER NOT NULL,
            attack_mode INTEGER NOT NULL,
            priority INTEGER DEFAULT 5,
            max_agents INTEGER DEFAULT 0,
            wordlist_ids TEXT DEFAULT '[]',
            rule_ids TEXT DEFAULT '[]',
            mask TEXT,
            custom_charsets TEXT DEFAULT '[]',
            increment_mode INTEGER DEFAULT 0,
            increment_min INTEGER,
            increment_max INTEGER,
            base_keyspace INTEGER,
            multiplication_factor INTEGER DEFAULT 1,
            effective_keyspace INTEGER,
            is_accurate_keyspace INTEGER DEFAULT 0,
            avg_rule_multiplier REAL DEFAULT 1.0,
            uses_rule_splitting INTEGER DEFAULT 0,
            allow_high_priority_override INTEGER DEFAULT 0,
            binary_version_id INTEGER NOT NULL,
            overall_progress_percent REAL DEFAULT 0.0,
            status TEXT DEFAULT 'pending',
            error_message TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    "#),
    ("TABLE_INCREMENT_LAYERS", r#"
        CREATE TABLE IF NOT EXISTS increment_layers (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL,
            layer_index INTEGER NOT NULL,
            mask TEXT NOT NULL,
            base_keyspace INTEGER NOT NULL,
            effective_keyspace INTEGER DEFAULT 0,
            is_accurate_keyspace INTEGER DEFAULT 0,
            status TEXT DEFAULT 'pending',
            UNIQUE(job_id, layer_index)
        );
    "#),
    ("TABLE_TASKS", r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL,
            increment_layer_id TEXT,
            agent_id INTEGER,
            chunk_number INTEGER NOT NULL,
            keyspace_start INTEGER NOT NULL,
            keyspace_end INTEGER NOT NULL,
            keyspace_processed INTEGER DEFAULT 0,
            effective_keyspace_start INTEGER DEFAULT 0,
            effective_keyspace_end INTEGER DEFAULT 0,
            chunk_actual_keyspace INTEGER,
            is_actual_keyspace INTEGER DEFAULT 0,
            is_keyspace_split INTEGER DEFAULT 0,
            is_rule_split INTEGER DEFAULT 0,
            rule_start_index INTEGER,
            rule_end_index INTEGER,
            rule_chunk_path TEXT,
            chunk_duration_seconds INTEGER DEFAULT 1200,
            progress_percent REAL DEFAULT 0.0,
            hash_rate INTEGER DEFAULT 0,
            retry_count INTEGER DEFAULT 0,
            expected_crack_count INTEGER DEFAULT 0,
            received_crack_count INTEGER DEFAULT 0,
            batches_complete INTEGER DEFAULT 0,
            detailed_status TEXT,
            status TEXT DEFAULT 'pending',
            started_at TEXT,
            completed_at TEXT,
            error_message TEXT,
            created_at TEXT NOT NULL,
            UNIQUE(job_id, chunk_number)
        );
    "#),
    ("TABLE_HASHES", r#"
        CREATE TABLE IF NOT EXISTS hashes (
            id TEXT PRIMARY KEY,
            hash_value TEXT NOT NULL,
            username TEXT,
            hash_type_id INTEGER NOT NULL,
            is_cracked INTEGER DEFAULT 0,
            password TEXT,
            last_updated TEXT NOT NULL
        );
    "#),
    ("TABLE_HASHLISTS", r#"
        CREATE TABLE IF NOT EXISTS hashlists (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            hash_type_id INTEGER NOT NULL,
            client_id INTEGER,
            total_hashes INTEGER DEFAULT 0,
            cracked_hashes INTEGER DEFAULT 0,
            excluded_from_potfile INTEGER DEFAULT 0
        );
    "#),
    ("TABLE_HASHLIST_HASHES", r#"
        CREATE TABLE IF NOT EXISTS hashlist_hashes (
            hashlist_id INTEGER NOT NULL,
            hash_id TEXT NOT NULL,
            PRIMARY KEY(hashlist_id, hash_id)
        );
    "#),
    ("TABLE_LM_HASH_METADATA", r#"
        CREATE TABLE IF NOT EXISTS lm_hash_metadata (
            hash_id TEXT PRIMARY KEY,
            first_half_cracked INTEGER DEFAULT 0,
            first_half_password TEXT,
            second_half_cracked INTEGER DEFAULT 0,
            second_half_password TEXT
        );
    "#),
    ("TABLE_LM_NTLM_LINKS", r#"
        CREATE TABLE IF NOT EXISTS lm_ntlm_links (
            ntlm_hash_id TEXT NOT NULL,
            lm_hash_id TEXT NOT NULL,
            PRIMARY KEY(ntlm_hash_id, lm_hash_id)
        );
    "#),
    ("TABLE_CLIENTS", r#"
        CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            excluded_from_potfile INTEGER DEFAULT 0
        );
    "#),
    ("TABLE_AGENTS", r#"
        CREATE TABLE IF NOT EXISTS agents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            status TEXT DEFAULT 'inactive',
            enabled INTEGER DEFAULT 1,
            owner_id INTEGER,
            extra_parameters TEXT,
            binary_version_pattern TEXT,
            schedule TEXT,
            sync_status INTEGER DEFAULT 1,
            metadata TEXT DEFAULT '{}',
            last_seen_at TEXT,
            created_at TEXT NOT NULL
        );
    "#),
    ("TABLE_AGENT_DEVICES", r#"
        CREATE TABLE IF NOT EXISTS agent_devices (
            agent_id INTEGER NOT NULL,
            device_id INTEGER NOT NULL,
            device_name TEXT DEFAULT '',
            enabled INTEGER DEFAULT 1,
            selected_runtime TEXT,
            PRIMARY KEY(agent_id, device_id)
        );
    "#),
    ("TABLE_AGENT_BENCHMARKS", r#"
        CREATE TABLE IF NOT EXISTS agent_benchmarks (
            agent_id INTEGER NOT NULL,
            hash_type INTEGER NOT NULL,
            attack_mode INTEGER NOT NULL,
            speed_hashes_per_second INTEGER NOT NULL,
            measured_at TEXT NOT NULL,
            PRIMARY KEY(agent_id, hash_type, attack_mode)
        );
    "#),
    ("TABLE_AGENT_JOB_FAILURES", r#"
        CREATE TABLE IF NOT EXISTS agent_job_failures (
            agent_id INTEGER NOT NULL,
            job_id TEXT NOT NULL,
            consecutive_failures INTEGER DEFAULT 0,
            PRIMARY KEY(agent_id, job_id)
        );
    "#),
    ("TABLE_WORDLISTS", r#"
        CREATE TABLE IF NOT EXISTS wordlists (
            id INTEGER PRIMARY KEY,
            filename TEXT NOT NULL,
            line_count INTEGER DEFAULT 0,
            file_size INTEGER DEFAULT 0,
            md5 TEXT
        );
    "#),
    ("TABLE_RULES", r#"
        CREATE TABLE IF NOT EXISTS rules (
            id INTEGER PRIMARY KEY,
            filename TEXT NOT NULL,
            line_count INTEGER DEFAULT 0,
            file_size INTEGER DEFAULT 0,
            md5 TEXT
        );
    "#),
    ("TABLE_BINARY_VERSIONS", r#"
        CREATE TABLE IF NOT EXISTS binary_versions (
            id INTEGER PRIMARY KEY,
            filename TEXT NOT NULL,
            version_label TEXT NOT NULL,
            file_size INTEGER DEFAULT 0,
            md5 TEXT
        );
    "#),
    ("TABLE_SYSTEM_SETTINGS", r#"
        CREATE TABLE IF NOT EXISTS system_settings (
            key TEXT PRIMARY KEY,
            value_text TEXT,
            updated_at TEXT NOT NULL
        );
    "#),
    ("TABLE_POTFILE_STAGING", r#"
        CREATE TABLE IF NOT EXISTS potfile_staging (
            id TEXT PRIMARY KEY,
            hash_value TEXT NOT NULL,
            password TEXT NOT NULL,
            hashlist_id INTEGER,
            staged_at TEXT NOT NULL
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Mantiene despliegues previos alineados sin migraciones destructivas.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    ("JOB_CHUNK_DURATION", "ALTER TABLE jobs ADD COLUMN chunk_duration_override INTEGER"),
    ("TASK_DISCONNECTED_AT", "ALTER TABLE tasks ADD COLUMN disconnected_at TEXT"),
    ("TASK_PREVIOUS_AGENT", "ALTER TABLE tasks ADD COLUMN previous_agent_id INTEGER"),
    ("AGENT_LAST_SEEN", "ALTER TABLE agents ADD COLUMN last_seen_at TEXT"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_JOBS_STATUS_PRIORITY", "CREATE INDEX IF NOT EXISTS idx_jobs_status_priority ON jobs(status, priority DESC, created_at ASC);"),
    ("IDX_JOBS_HASHLIST", "CREATE INDEX IF NOT EXISTS idx_jobs_hashlist ON jobs(hashlist_id);"),
    ("IDX_LAYERS_JOB", "CREATE INDEX IF NOT EXISTS idx_layers_job ON increment_layers(job_id, layer_index);"),
    ("IDX_TASKS_JOB_CHUNK", "CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_job_chunk ON tasks(job_id, chunk_number);"),
    ("IDX_TASKS_AGENT_STATUS", "CREATE INDEX IF NOT EXISTS idx_tasks_agent_status ON tasks(agent_id, status);"),
    ("IDX_TASKS_STATUS", "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);"),
    ("IDX_HASHES_VALUE", "CREATE INDEX IF NOT EXISTS idx_hashes_value ON hashes(hash_value);"),
    ("IDX_HASHLIST_HASHES_HASH", "CREATE INDEX IF NOT EXISTS idx_hashlist_hashes_hash ON hashlist_hashes(hash_id);"),
    ("IDX_LM_LINKS_LM", "CREATE INDEX IF NOT EXISTS idx_lm_links_lm ON lm_ntlm_links(lm_hash_id);"),
];

/**
 * Aplica el esquema completo del coordinador de forma idempotente.
 *
 * # Errors:
 * Las mutaciones evolutivas sobre columnas ya existentes se toleran
 * (duplicate column); todo otro fallo aborta el bootstrap.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_coordinator_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA]: Applying coordinator schema strata...");

    for (artifact_label, create_statement) in TACTICAL_TABLES {
        database_connection
            .execute(create_statement, ())
            .await
            .with_context(|| format!("SCHEMA_GENESIS_FAULT at {}", artifact_label))?;
        debug!("🧱 [SCHEMA]: {} solidified.", artifact_label);
    }

    for (mutation_label, alter_statement) in EVOLUTIONARY_STRATA {
        match database_connection.execute(alter_statement, ()).await {
            Ok(_) => debug!("🧬 [SCHEMA]: Mutation {} applied.", mutation_label),
            Err(mutation_fault) => {
                let fault_text = mutation_fault.to_string().to_lowercase();
                if fault_text.contains("duplicate column") {
                    debug!("🧬 [SCHEMA]: Mutation {} already present.", mutation_label);
                } else {
                    warn!("⚠️ [SCHEMA]: Mutation {} rejected: {}", mutation_label, mutation_fault);
                    return Err(mutation_fault).with_context(|| format!("SCHEMA_EVOLUTION_FAULT at {}", mutation_label));
                }
            }
        }
    }

    for (index_label, index_statement) in ACCELERATION_INDEXES {
        database_connection
            .execute(index_statement, ())
            .await
            .with_context(|| format!("SCHEMA_INDEX_FAULT at {}", index_label))?;
    }

    info!("✅ [SCHEMA]: Coordinator strata certified.");
    Ok(())
}
