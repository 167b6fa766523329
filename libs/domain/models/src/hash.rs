// [libs/domain/models/src/hash.rs]
/*!
 * =================================================================
 * APARATO: HASH DOMAIN MODELS
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: CONTRATOS DE HASHES, CRACKS Y MITADES LM
 *
 * # Invariante (LM Dual-Half):
 * Un hash LM (tipo 3000) está crackeado si y solo si ambas mitades de
 * 16 caracteres lo están. La mitad en blanco constante se auto-completa.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longitud de una mitad LM dentro de la columna concatenada de 32 chars.
pub const LM_HALF_LENGTH: usize = 16;

/// Mitad LM "en blanco": contraseña vacía en DES-LM. Se auto-completa
/// sin esperar un crack explícito del motor.
pub const LM_BLANK_HALF: &str = "aad3b435b51404ee";

/// Fila canónica de hash, compartida entre hashlists vía relación N:M.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashRecord {
    pub id: Uuid,
    pub hash_value: String,
    pub username: Option<String>,
    pub hash_type_id: i64,
    pub is_cracked: bool,
    pub password: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Crack individual en el cable, tal como lo reporta el agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrackedHash {
    pub hash: String,
    pub plain: String,
    /// Posición de keyspace donde el motor encontró el candidato.
    pub crack_pos: u64,
}

/// Rastro de mitades para hashes LM (tipo 3000). Solo existe para ese tipo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmHalfState {
    pub hash_id: Uuid,
    pub first_half_cracked: bool,
    /// La contraseña de una mitad puede ser la cadena vacía.
    pub first_half_password: Option<String>,
    pub second_half_cracked: bool,
    pub second_half_password: Option<String>,
}

impl LmHalfState {
    pub fn both_halves_cracked(&self) -> bool {
        self.first_half_cracked && self.second_half_cracked
    }

    /// Contraseña final concatenada; solo válida con ambas mitades resueltas.
    pub fn concatenated_password(&self) -> Option<String> {
        if !self.both_halves_cracked() {
            return None;
        }
        Some(format!(
            "{}{}",
            self.first_half_password.as_deref().unwrap_or(""),
            self.second_half_password.as_deref().unwrap_or("")
        ))
    }
}
