// [libs/infra/protocol/src/errors.rs]
//! =================================================================
//! APARATO: PROTOCOL ERROR CATALOG
//! CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
//! RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE TRAMA
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    /// La trama supera el límite duro del códec.
    #[error("[L3_PROTO_FAULT]: FRAME_SIZE_EXCEEDED -> {actual_bytes} bytes (limit {limit_bytes})")]
    OversizedFrame { actual_bytes: usize, limit_bytes: usize },

    /// JSON malformado o tipo de trama fuera del conjunto cerrado.
    #[error("[L3_PROTO_FAULT]: MALFORMED_FRAME -> {0}")]
    MalformedFrame(#[from] serde_json::Error),
}
