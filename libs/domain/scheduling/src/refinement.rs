// [libs/domain/scheduling/src/refinement.rs]
/*!
 * =================================================================
 * APARATO: EFFECTIVE KEYSPACE REFINEMENT ENGINE
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L1)
 * RESPONSABILIDAD: REFINAMIENTO PROGRESIVO Y CASCADA DE LÍMITES EFECTIVOS
 *
 * # Invariante (Guardias de Refinamiento):
 * El total efectivo de un trabajo jamás se sobreescribe a 0, jamás cae
 * por debajo del 10% de su valor previo y solo se actualiza con una
 * delta absoluta mayor a 1000. Los actuals por-fragmento provienen
 * exclusivamente de tareas rule-split: el marcador progress[1] de una
 * tarea keyspace-split reporta el total del trabajo, no el fragmento.
 * =================================================================
 */

use uuid::Uuid;

/// Piso relativo: el refinamiento no reduce el total por debajo de 1/10.
const REFINEMENT_FLOOR_DIVISOR: u64 = 10;
/// Delta absoluta mínima para aceptar una actualización del total.
const REFINEMENT_MIN_DELTA: u64 = 1_000;

/// Resumen de un fragmento para la recomputación en cascada.
#[derive(Debug, Clone)]
pub struct ChunkSpan {
    pub task_id: Uuid,
    pub chunk_number: u32,
    pub effective_start: u64,
    pub effective_end: u64,
    /// Keyspace real observado (solo fragmentos rule-split confirmados).
    pub actual_width: Option<u64>,
    /// Estimación vigente del ancho efectivo del fragmento.
    pub estimated_width: u64,
}

/// Límites recomputados de un fragmento cuya posición cambió.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecomputedBounds {
    pub task_id: Uuid,
    pub effective_start: u64,
    pub effective_end: u64,
}

/// Recorre los fragmentos en orden ordinal acumulando anchos (actual donde
/// se conoce, estimación en el resto) y devuelve solo los que difieren de
/// sus límites vigentes.
pub fn cascade_effective_bounds(spans: &[ChunkSpan]) -> Vec<RecomputedBounds> {
    let mut ordered: Vec<&ChunkSpan> = spans.iter().collect();
    ordered.sort_by_key(|span| span.chunk_number);

    let mut corrections = Vec::new();
    let mut cursor = 0u64;

    for span in ordered {
        let width = span.actual_width.unwrap_or(span.estimated_width);
        let recomputed_start = cursor;
        let recomputed_end = cursor.saturating_add(width);

        if recomputed_start != span.effective_start || recomputed_end != span.effective_end {
            corrections.push(RecomputedBounds {
                task_id: span.task_id,
                effective_start: recomputed_start,
                effective_end: recomputed_end,
            });
        }
        cursor = recomputed_end;
    }

    corrections
}

/// Guardias de actualización del total efectivo del trabajo.
pub fn should_update_effective(prior: u64, candidate: u64) -> bool {
    if candidate == 0 {
        return false;
    }
    if prior > 0 && candidate < prior / REFINEMENT_FLOOR_DIVISOR {
        return false;
    }
    prior.abs_diff(candidate) > REFINEMENT_MIN_DELTA
}

/// Refinamiento progresivo del total del trabajo:
/// nuevo = Σ(actuals) + (Σactuals / Σreglas_con_actual) × reglas_restantes,
/// escalado por la proporción vigente del hashlist (que puede encoger).
pub fn refined_job_total(
    actual_width_sum: u64,
    actual_rule_sum: u64,
    remaining_rules: u64,
    hashlist_scale: f64,
) -> u64 {
    if actual_rule_sum == 0 {
        return actual_width_sum;
    }

    let per_rule = actual_width_sum as f64 / actual_rule_sum as f64;
    let scale = if hashlist_scale.is_finite() && hashlist_scale > 0.0 {
        hashlist_scale.min(1.0)
    } else {
        1.0
    };
    let remaining_estimate = per_rule * remaining_rules as f64 * scale;

    actual_width_sum.saturating_add(remaining_estimate.round() as u64)
}

/// Multiplicador medio de reglas observado contra la estimación nominal.
pub fn average_rule_multiplier(observed_effective: u64, base_keyspace: u64, multiplication_factor: u64) -> f64 {
    let nominal = base_keyspace.saturating_mul(multiplication_factor.max(1));
    if nominal == 0 {
        return 1.0;
    }
    observed_effective as f64 / nominal as f64
}

/// Porcentaje de progreso con tope duro en 100.
pub fn progress_percent(processed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((processed as f64 / total as f64) * 100.0).min(100.0)
}
