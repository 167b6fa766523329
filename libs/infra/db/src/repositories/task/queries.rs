// [libs/infra/db/src/repositories/task/queries.rs]
/*!
 * =================================================================
 * APARATO: TASK LEDGER SQL STORE
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: SENTENCIAS ATÓMICAS DEL CICLO DE VIDA DE FRAGMENTOS
 *
 * Toda transición de estado es una única escritura a nivel de fila con
 * guardia de estado previo; los lectores re-consultan tras el candado.
 * =================================================================
 */

/// Columnas canónicas del fragmento; el orden es contrato del mapeador.
pub const TASK_COLUMNS: &str = r#"
    id, job_id, increment_layer_id, agent_id, chunk_number,
    keyspace_start, keyspace_end, keyspace_processed,
    effective_keyspace_start, effective_keyspace_end,
    chunk_actual_keyspace, is_actual_keyspace,
    is_keyspace_split, is_rule_split,
    rule_start_index, rule_end_index, rule_chunk_path,
    chunk_duration_seconds, progress_percent, hash_rate,
    retry_count, expected_crack_count, received_crack_count,
    batches_complete, detailed_status, status,
    started_at, completed_at, error_message, created_at
"#;

pub const INSERT_TASK: &str = r#"
    INSERT INTO tasks (
        id, job_id, increment_layer_id, agent_id, chunk_number,
        keyspace_start, keyspace_end, keyspace_processed,
        effective_keyspace_start, effective_keyspace_end,
        chunk_actual_keyspace, is_actual_keyspace,
        is_keyspace_split, is_rule_split,
        rule_start_index, rule_end_index, rule_chunk_path,
        chunk_duration_seconds, progress_percent, hash_rate,
        retry_count, expected_crack_count, received_crack_count,
        batches_complete, detailed_status, status,
        started_at, completed_at, error_message, created_at
    ) VALUES (
        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
        ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
        ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30
    )
"#;

/// Siguiente ordinal de fragmento del trabajo.
pub const NEXT_CHUNK_NUMBER: &str = r#"
    SELECT COALESCE(MAX(chunk_number), 0) + 1 FROM tasks WHERE job_id = ?1
"#;

/// Frontera contigua del keyspace base del trabajo (tareas no estratificadas).
pub const KEYSPACE_FRONTIER_FOR_JOB: &str = r#"
    SELECT COALESCE(MAX(keyspace_end), 0) FROM tasks
    WHERE job_id = ?1 AND increment_layer_id IS NULL
"#;

/// Frontera contigua del keyspace de una capa incremental.
pub const KEYSPACE_FRONTIER_FOR_LAYER: &str = r#"
    SELECT COALESCE(MAX(keyspace_end), 0) FROM tasks
    WHERE increment_layer_id = ?1
"#;

/// Frontera del corte de reglas en trabajos rule-split.
pub const RULE_FRONTIER_FOR_JOB: &str = r#"
    SELECT COALESCE(MAX(rule_end_index), 0) FROM tasks
    WHERE job_id = ?1 AND is_rule_split = 1
"#;

/// Límite efectivo acumulado del trabajo (inicio del próximo fragmento).
pub const EFFECTIVE_FRONTIER_FOR_JOB: &str = r#"
    SELECT COALESCE(MAX(effective_keyspace_end), 0) FROM tasks
    WHERE job_id = ?1
"#;

// --- ESTRATO DE ASIGNACIÓN (CADENA DE CUSTODIA) ---

/// Reclamación atómica: solo un fragmento 'pending' puede asignarse.
pub const MARK_ASSIGNED: &str = r#"
    UPDATE tasks
    SET status = 'assigned', agent_id = ?2, detailed_status = NULL
    WHERE id = ?1 AND status = 'pending'
"#;

/// Reversión por fallo de escritura en el canal de despacho.
pub const REVERT_TO_PENDING: &str = r#"
    UPDATE tasks
    SET status = 'pending', agent_id = NULL
    WHERE id = ?1 AND status = 'assigned'
"#;

pub const MARK_RUNNING: &str = r#"
    UPDATE tasks
    SET status = 'running', started_at = ?2
    WHERE id = ?1 AND status IN ('assigned', 'reconnect_pending')
"#;

// --- ESTRATO DE PROGRESO ---

/// El progreso absoluto es monótono: MAX() absorbe reportes tardíos.
pub const UPDATE_PROGRESS: &str = r#"
    UPDATE tasks
    SET keyspace_processed = MAX(keyspace_processed, ?2),
        hash_rate = ?3,
        progress_percent = MIN(?4, 100.0),
        detailed_status = ?5
    WHERE id = ?1
"#;

/// Keyspace real del fragmento: EXCLUSIVO de tareas rule-split. El
/// marcador progress[1] de una tarea keyspace-split reporta el total del
/// trabajo y jamás debe sellarse como actual del fragmento.
pub const SET_CHUNK_ACTUAL: &str = r#"
    UPDATE tasks
    SET chunk_actual_keyspace = ?2,
        is_actual_keyspace = 1,
        effective_keyspace_end = effective_keyspace_start + ?2
    WHERE id = ?1 AND is_rule_split = 1 AND is_keyspace_split = 0
"#;

pub const UPDATE_EFFECTIVE_BOUNDS: &str = r#"
    UPDATE tasks
    SET effective_keyspace_start = ?2, effective_keyspace_end = ?3
    WHERE id = ?1
"#;

/// Resúmenes de fragmento para la recomputación en cascada.
pub const FETCH_SPANS_FOR_JOB: &str = r#"
    SELECT id, chunk_number, effective_keyspace_start, effective_keyspace_end,
           chunk_actual_keyspace, is_actual_keyspace,
           keyspace_start, keyspace_end, is_rule_split,
           rule_start_index, rule_end_index, status
    FROM tasks
    WHERE job_id = ?1
    ORDER BY chunk_number ASC
"#;

// --- ESTRATO DE DRENAJE Y SELLADO ---

/// Transición a processing: keyspace agotado, esperando lotes de cracks.
pub const SET_PROCESSING: &str = r#"
    UPDATE tasks
    SET status = 'processing',
        expected_crack_count = ?2,
        progress_percent = 100.0,
        keyspace_processed = keyspace_end
    WHERE id = ?1 AND status IN ('assigned', 'running')
"#;

pub const ADD_RECEIVED_CRACKS: &str = r#"
    UPDATE tasks
    SET received_crack_count = received_crack_count + ?2
    WHERE id = ?1
"#;

pub const MARK_BATCHES_COMPLETE: &str = r#"
    UPDATE tasks
    SET batches_complete = 1
    WHERE id = ?1
"#;

pub const COMPLETE_TASK: &str = r#"
    UPDATE tasks
    SET status = 'completed', completed_at = ?2, progress_percent = 100.0,
        keyspace_processed = keyspace_end
    WHERE id = ?1 AND status NOT IN ('completed', 'cancelled', 'failed')
"#;

pub const FAIL_TASK: &str = r#"
    UPDATE tasks
    SET status = 'failed', error_message = ?2, completed_at = ?3
    WHERE id = ?1 AND status NOT IN ('completed', 'cancelled')
"#;

pub const CANCEL_OPEN_TASKS_FOR_JOB: &str = r#"
    UPDATE tasks
    SET status = 'cancelled', completed_at = ?2
    WHERE job_id = ?1
      AND status IN ('pending', 'assigned', 'running', 'processing', 'reconnect_pending')
"#;

// --- ESTRATO DE RECONEXIÓN ---

pub const FETCH_OCCUPYING_FOR_AGENT: &str = r#"
    SELECT {columns} FROM tasks
    WHERE agent_id = ?1 AND status IN ('assigned', 'running', 'processing')
"#;

pub const FETCH_OCCUPYING_FOR_JOB: &str = r#"
    SELECT {columns} FROM tasks
    WHERE job_id = ?1 AND status IN ('assigned', 'running', 'processing')
"#;

/// Desconexión del agente: las tareas en vuelo pasan a gracia de
/// reconexión y pierden la vinculación viva (enlace débil). La identidad
/// previa queda en previous_agent_id para la recuperación dirigida.
pub const MARK_RECONNECT_PENDING: &str = r#"
    UPDATE tasks
    SET status = 'reconnect_pending', previous_agent_id = agent_id,
        agent_id = NULL, disconnected_at = ?2
    WHERE id = ?1 AND status IN ('assigned', 'running', 'processing')
"#;

/// Recuperación en reconexión: re-vincula preservando keyspace_processed.
pub const RECOVER_FOR_AGENT: &str = r#"
    UPDATE tasks
    SET status = 'running', agent_id = ?2,
        previous_agent_id = NULL, disconnected_at = NULL
    WHERE id = ?1 AND status IN ('reconnect_pending', 'pending')
"#;

/// Reset a pending para re-despacho a otro agente (consume un reintento).
pub const RESET_TO_PENDING_WITH_RETRY: &str = r#"
    UPDATE tasks
    SET status = 'pending', agent_id = NULL, previous_agent_id = NULL,
        retry_count = retry_count + 1, disconnected_at = NULL
    WHERE id = ?1 AND status = 'reconnect_pending'
"#;

pub const FETCH_RECONNECT_PENDING: &str = r#"
    SELECT {columns} FROM tasks
    WHERE status = 'reconnect_pending'
"#;

pub const FETCH_RECONNECT_PENDING_FOR_AGENT: &str = r#"
    SELECT {columns} FROM tasks
    WHERE status = 'reconnect_pending' AND previous_agent_id = ?1
"#;

/// Tareas cuya gracia de reconexión expiró.
pub const FETCH_EXPIRED_RECONNECT_PENDING: &str = r#"
    SELECT {columns} FROM tasks
    WHERE status = 'reconnect_pending' AND disconnected_at < ?1
"#;

/// Recuperación excepcional de una tarea fallida con reintentos restantes;
/// el contador de reintentos NO se consume en esta vía.
pub const RECOVER_FAILED_FOR_AGENT: &str = r#"
    UPDATE tasks
    SET status = 'running', agent_id = ?2, error_message = NULL,
        completed_at = NULL, disconnected_at = NULL, previous_agent_id = NULL
    WHERE id = ?1 AND status = 'failed'
"#;

/// Desalojo por alta prioridad: la tarea vuelve a la cola sin consumir
/// reintento (el desalojo no es un fallo del agente).
pub const RESET_FOR_PREEMPTION: &str = r#"
    UPDATE tasks
    SET status = 'pending', agent_id = NULL
    WHERE id = ?1 AND status IN ('assigned', 'running')
"#;

// --- ESTRATO DE AGREGACIÓN ---

pub const FETCH_ACTIVE_ON_HASHLIST: &str = r#"
    SELECT {columns} FROM tasks
    WHERE status IN ('assigned', 'running', 'processing')
      AND job_id IN (SELECT id FROM jobs WHERE hashlist_id = ?1)
"#;

pub const COUNT_DISTINCT_AGENTS_FOR_JOB: &str = r#"
    SELECT COUNT(DISTINCT agent_id) FROM tasks
    WHERE job_id = ?1 AND agent_id IS NOT NULL
      AND status IN ('assigned', 'running', 'processing')
"#;

pub const COUNT_OPEN_TASKS_FOR_JOB: &str = r#"
    SELECT COUNT(*) FROM tasks
    WHERE job_id = ?1 AND status NOT IN ('completed', 'cancelled', 'failed')
"#;

/// Trabajo aún vivo fuera del drenaje: fragmentos sin despachar o en
/// ejecución. Cero de estos + alguno en 'processing' = trabajo drenando.
pub const COUNT_LIVE_NON_DRAINING_FOR_JOB: &str = r#"
    SELECT COUNT(*) FROM tasks
    WHERE job_id = ?1
      AND status IN ('pending', 'assigned', 'running', 'reconnect_pending')
"#;

pub const COUNT_DRAINING_FOR_JOB: &str = r#"
    SELECT COUNT(*) FROM tasks
    WHERE job_id = ?1 AND status = 'processing'
"#;

pub const COUNT_OPEN_TASKS_FOR_LAYER: &str = r#"
    SELECT COUNT(*) FROM tasks
    WHERE increment_layer_id = ?1
      AND status NOT IN ('completed', 'cancelled', 'failed')
"#;

/// Progreso base agregado del trabajo. keyspace_processed es una posición
/// absoluta: el aporte de cada fragmento se recorta a su propio rango.
pub const SUM_PROCESSED_FOR_JOB: &str = r#"
    SELECT COALESCE(SUM(MAX(0, MIN(keyspace_processed, keyspace_end) - keyspace_start)), 0)
    FROM tasks
    WHERE job_id = ?1 AND status NOT IN ('cancelled')
"#;
