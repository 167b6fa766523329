// [libs/domain/models/src/lib.rs]
/*!
 * =================================================================
 * APARATO: DOMAIN MODELS REGISTRY
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: DEFINICIÓN DE CONTRATOS SOBERANOS DE ORQUESTACIÓN
 * =================================================================
 */

pub mod agent;
pub mod benchmark;
pub mod hash;
pub mod hashlist;
pub mod job;
pub mod resource;
pub mod task;
pub mod tuning;

pub use agent::{Agent, AgentDevice, AgentRuntimeMetadata, AgentSchedule, AgentStatus};
pub use benchmark::BenchmarkSample;
pub use hash::{CrackedHash, HashRecord, LmHalfState, LM_BLANK_HALF, LM_HALF_LENGTH};
pub use hashlist::Hashlist;
pub use job::{AttackMode, IncrementLayer, JobExecution, JobStatus, LayerStatus};
pub use resource::{ResourceDescriptor, ResourceKind};
pub use task::{TaskChunk, TaskStatus};
pub use tuning::SystemTuning;
