// [libs/infra/protocol/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DISPATCH PROTOCOL REGISTRY
 * CLASIFICACIÓN: INFRASTRUCTURE TRANSPORT (ESTRATO L3)
 * RESPONSABILIDAD: CONJUNTO CERRADO DE TRAMAS DEL CANAL DE DESPACHO
 * =================================================================
 */

pub mod codec;
pub mod errors;
pub mod frames;

pub use codec::{decode_frame, encode_frame, MAX_FRAME_BYTES};
pub use errors::ProtocolError;
pub use frames::{
    AgentHelloPayload, BenchmarkRequestPayload, BenchmarkResultPayload, CrackBatchPayload,
    CrackBatchesCompletePayload, DispatchFrame, HeartbeatPayload, JobStopPayload, ProgressPayload,
    ReportedTaskStatus, StopReason, SyncRequestPayload, TaskAssignmentPayload,
};
