// [libs/infra/db/src/repositories/job/queries.rs]
/*!
 * =================================================================
 * APARATO: JOB LEDGER SQL STORE
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: SENTENCIAS ATÓMICAS DEL CICLO DE VIDA DE TRABAJOS
 *
 * Las consultas usan guardias de estado (WHERE status = ...) para que
 * toda transición de propiedad sea una operación atómica indivisible.
 * =================================================================
 */

/// Columnas canónicas del trabajo; el orden es contrato del mapeador.
pub const JOB_COLUMNS: &str = r#"
    id, hashlist_id, attack_mode, priority, max_agents,
    wordlist_ids, rule_ids, mask, custom_charsets,
    increment_mode, increment_min, increment_max,
    base_keyspace, multiplication_factor, effective_keyspace,
    is_accurate_keyspace, avg_rule_multiplier, uses_rule_splitting,
    allow_high_priority_override, binary_version_id,
    chunk_duration_override, overall_progress_percent,
    status, error_message, created_at, updated_at
"#;

pub const INSERT_JOB: &str = r#"
    INSERT INTO jobs (
        id, hashlist_id, attack_mode, priority, max_agents,
        wordlist_ids, rule_ids, mask, custom_charsets,
        increment_mode, increment_min, increment_max,
        base_keyspace, multiplication_factor, effective_keyspace,
        is_accurate_keyspace, avg_rule_multiplier, uses_rule_splitting,
        allow_high_priority_override, binary_version_id,
        chunk_duration_override, overall_progress_percent,
        status, error_message, created_at, updated_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
        ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26
    )
"#;

/// Cola de despacho: pendientes por prioridad descendente y antigüedad.
pub const FETCH_PENDING_BY_PRIORITY: &str = r#"
    SELECT {columns} FROM jobs
    WHERE status = 'pending'
    ORDER BY priority DESC, created_at ASC
"#;

pub const FETCH_RUNNING_JOBS: &str = r#"
    SELECT {columns} FROM jobs
    WHERE status IN ('running', 'processing')
    ORDER BY priority ASC, created_at DESC
"#;

/// Trabajos con trabajo pendiente de despacho: pendientes y corriendo
/// (un trabajo running puede tener keyspace sin asignar y cupo de agentes).
pub const FETCH_DISPATCHABLE_BY_PRIORITY: &str = r#"
    SELECT {columns} FROM jobs
    WHERE status IN ('pending', 'running')
    ORDER BY priority DESC, created_at ASC
"#;

/// Trabajos vivos contra un hashlist (objetivo del servicio de completitud).
pub const FETCH_ACTIVE_ON_HASHLIST: &str = r#"
    SELECT {columns} FROM jobs
    WHERE hashlist_id = ?1 AND status IN ('pending', 'running', 'processing')
"#;

pub const UPDATE_STATUS: &str = r#"
    UPDATE jobs
    SET status = ?2, error_message = ?3, updated_at = ?4
    WHERE id = ?1
"#;

/// Primera asignación: pending -> running, una sola vez.
pub const MARK_RUNNING_IF_PENDING: &str = r#"
    UPDATE jobs
    SET status = 'running', updated_at = ?2
    WHERE id = ?1 AND status = 'pending'
"#;

/// Confirmación del primer benchmark: transición única false -> true.
pub const CONFIRM_ACCURATE_KEYSPACE: &str = r#"
    UPDATE jobs
    SET effective_keyspace = ?2,
        avg_rule_multiplier = ?3,
        is_accurate_keyspace = 1,
        updated_at = ?4
    WHERE id = ?1 AND is_accurate_keyspace = 0
"#;

pub const UPDATE_EFFECTIVE_KEYSPACE: &str = r#"
    UPDATE jobs
    SET effective_keyspace = ?2, updated_at = ?3
    WHERE id = ?1
"#;

pub const SET_OVERALL_PROGRESS: &str = r#"
    UPDATE jobs
    SET overall_progress_percent = ?2, updated_at = ?3
    WHERE id = ?1
"#;

pub const COMPLETE_JOB: &str = r#"
    UPDATE jobs
    SET status = 'completed', overall_progress_percent = 100.0,
        error_message = NULL, updated_at = ?2
    WHERE id = ?1 AND status NOT IN ('completed', 'cancelled')
"#;

// --- ESTRATO DE CAPAS INCREMENTALES ---

pub const INSERT_LAYER: &str = r#"
    INSERT INTO increment_layers (
        id, job_id, layer_index, mask, base_keyspace,
        effective_keyspace, is_accurate_keyspace, status
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#;

pub const LAYER_COLUMNS: &str = r#"
    id, job_id, layer_index, mask, base_keyspace,
    effective_keyspace, is_accurate_keyspace, status
"#;

pub const FETCH_LAYERS_FOR_JOB: &str = r#"
    SELECT {columns} FROM increment_layers
    WHERE job_id = ?1
    ORDER BY layer_index ASC
"#;

pub const FETCH_LAYER: &str = r#"
    SELECT {columns} FROM increment_layers
    WHERE id = ?1
"#;

/// La capa activa: una running, o en su defecto la pending más baja.
pub const FETCH_CURRENT_LAYER: &str = r#"
    SELECT {columns} FROM increment_layers
    WHERE job_id = ?1 AND status IN ('running', 'pending')
    ORDER BY CASE status WHEN 'running' THEN 0 ELSE 1 END, layer_index ASC
    LIMIT 1
"#;

pub const MARK_LAYER_RUNNING: &str = r#"
    UPDATE increment_layers
    SET status = 'running'
    WHERE id = ?1 AND status = 'pending'
"#;

pub const MARK_LAYER_COMPLETED: &str = r#"
    UPDATE increment_layers
    SET status = 'completed'
    WHERE id = ?1 AND status IN ('pending', 'running')
"#;

/// Confirmación del keyspace real de la capa: transición única.
pub const CONFIRM_LAYER_KEYSPACE: &str = r#"
    UPDATE increment_layers
    SET effective_keyspace = ?2, is_accurate_keyspace = 1
    WHERE id = ?1 AND is_accurate_keyspace = 0
"#;

pub const SUM_LAYER_EFFECTIVES: &str = r#"
    SELECT COALESCE(SUM(effective_keyspace), 0) FROM increment_layers
    WHERE job_id = ?1
"#;

pub const COUNT_UNFINISHED_LAYERS: &str = r#"
    SELECT COUNT(*) FROM increment_layers
    WHERE job_id = ?1 AND status NOT IN ('completed', 'failed')
"#;
