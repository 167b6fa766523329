// [libs/domain/models/src/hashlist.rs]
//! =================================================================
//! APARATO: HASHLIST DOMAIN MODEL
//! CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
//! RESPONSABILIDAD: CONTRATO DEL INVENTARIO DE HASHES OBJETIVO
//! =================================================================

use serde::{Deserialize, Serialize};

/// Inventario de hashes objetivo de uno o más trabajos.
/// `cracked_hashes` es un contador desnormalizado mantenido por el
/// pipeline de cracks; su actualización se serializa por hashlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hashlist {
    pub id: i64,
    pub name: String,
    pub hash_type_id: i64,
    pub client_id: Option<i64>,
    pub total_hashes: u64,
    pub cracked_hashes: u64,
    pub excluded_from_potfile: bool,
}

impl Hashlist {
    pub fn is_fully_cracked(&self) -> bool {
        self.total_hashes > 0 && self.cracked_hashes >= self.total_hashes
    }

    /// Hashes aún sin resolver en este inventario.
    pub fn remaining_hashes(&self) -> u64 {
        self.total_hashes.saturating_sub(self.cracked_hashes)
    }
}
