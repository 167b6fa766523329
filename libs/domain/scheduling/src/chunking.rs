// [libs/domain/scheduling/src/chunking.rs]
/*!
 * =================================================================
 * APARATO: CHUNK SIZING POLICY
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L1)
 * RESPONSABILIDAD: DERIVACIÓN DE RANGOS CONTIGUOS Y CORTES DE REGLAS
 *
 * # Invariante (Cobertura):
 * Start(n) = End(n-1). El último fragmento absorbe el remanente y su
 * keyspace_end coincide exactamente con el keyspace base.
 * =================================================================
 */

/// Fracción del objetivo bajo la cual el remanente final se absorbe en
/// el fragmento actual en lugar de emitir una cola enana.
const TAIL_ABSORPTION_DIVISOR: u64 = 10;

/// Tamaño objetivo de fragmento: throughput × duración, mínimo 1.
pub fn target_chunk_size(speed_hashes_per_second: u64, chunk_duration_seconds: u64) -> u64 {
    speed_hashes_per_second
        .saturating_mul(chunk_duration_seconds)
        .max(1)
}

/// Deriva el siguiente rango base contiguo `[start, end)` a partir de la
/// frontera actual del trabajo (o capa). Devuelve None con el keyspace agotado.
pub fn next_base_range(frontier: u64, base_keyspace: u64, target_size: u64) -> Option<(u64, u64)> {
    if frontier >= base_keyspace {
        return None;
    }

    let remaining = base_keyspace - frontier;
    let target = target_size.max(1);

    // Absorción de cola: si tras este corte quedaría un residuo enano,
    // el fragmento actual se extiende hasta el final del keyspace.
    let tail_after_cut = remaining.saturating_sub(target);
    if remaining <= target || tail_after_cut <= target / TAIL_ABSORPTION_DIVISOR {
        return Some((frontier, base_keyspace));
    }

    Some((frontier, frontier + target))
}

/// Corte contiguo del fichero de reglas `[rule_start, rule_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSlice {
    pub slice_index: u32,
    pub rule_start: u64,
    pub rule_end: u64,
}

impl RuleSlice {
    pub fn rule_count(&self) -> u64 {
        self.rule_end - self.rule_start
    }
}

/// Particiona `total_rules` en cortes contiguos de `rules_per_slice`,
/// fusionando una cola enana con el corte anterior.
pub fn plan_rule_slices(total_rules: u64, rules_per_slice: u64) -> Vec<RuleSlice> {
    if total_rules == 0 {
        return Vec::new();
    }

    let step = rules_per_slice.max(1);
    let mut slices: Vec<RuleSlice> = Vec::new();
    let mut cursor = 0u64;

    while cursor < total_rules {
        let remaining = total_rules - cursor;
        let tail_after_cut = remaining.saturating_sub(step);

        let end = if remaining <= step || tail_after_cut <= step / TAIL_ABSORPTION_DIVISOR {
            total_rules
        } else {
            cursor + step
        };

        slices.push(RuleSlice {
            slice_index: slices.len() as u32,
            rule_start: cursor,
            rule_end: end,
        });
        cursor = end;
    }

    slices
}
