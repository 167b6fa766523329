// [libs/infra/protocol/src/codec.rs]
/*!
 * =================================================================
 * APARATO: FRAME CODEC
 * CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
 * RESPONSABILIDAD: SERIALIZACIÓN DEL SOBRE {type, payload} CON LÍMITE DURO
 * =================================================================
 */

use crate::errors::ProtocolError;
use crate::frames::DispatchFrame;

/// Límite duro de tamaño de trama. Un lote de cracks legítimo queda muy
/// por debajo; todo lo que lo supere se considera hostil o corrupto.
pub const MAX_FRAME_BYTES: usize = 10 * 1024 * 1024;

/// Serializa una trama al sobre JSON del cable.
pub fn encode_frame(frame: &DispatchFrame) -> Result<String, ProtocolError> {
    let encoded = serde_json::to_string(frame)?;

    if encoded.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::OversizedFrame {
            actual_bytes: encoded.len(),
            limit_bytes: MAX_FRAME_BYTES,
        });
    }
    Ok(encoded)
}

/// Deserializa una trama entrante aplicando el límite antes de tocar serde.
pub fn decode_frame(raw_frame: &str) -> Result<DispatchFrame, ProtocolError> {
    if raw_frame.len() > MAX_FRAME_BYTES {
        return Err(ProtocolError::OversizedFrame {
            actual_bytes: raw_frame.len(),
            limit_bytes: MAX_FRAME_BYTES,
        });
    }
    Ok(serde_json::from_str(raw_frame)?)
}
