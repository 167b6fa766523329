// [libs/domain/scheduling/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SCHEDULING MATHEMATICS REGISTRY
 * CLASIFICACIÓN: DOMAIN CORE (ESTRATO L1)
 * RESPONSABILIDAD: CÁLCULO PURO DE KEYSPACE, FRAGMENTOS Y REFINAMIENTO
 *
 * Este estrato no suspende ni toca persistencia: recibe magnitudes ya
 * resueltas (líneas de wordlists, líneas de reglas, máscaras) y emite
 * planes deterministas. La E/S vive en los estratos L3/L4.
 * =================================================================
 */

pub mod chunking;
pub mod errors;
pub mod keyspace;
pub mod refinement;

pub use chunking::{next_base_range, plan_rule_slices, target_chunk_size, RuleSlice};
pub use errors::KeyspaceError;
pub use keyspace::{KeyspaceInputs, KeyspacePlan, LayerPlan};
pub use refinement::{
    average_rule_multiplier, cascade_effective_bounds, progress_percent, refined_job_total,
    should_update_effective, ChunkSpan, RecomputedBounds,
};
