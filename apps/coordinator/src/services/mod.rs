// [apps/coordinator/src/services/mod.rs]
//! =================================================================
//! APARATO: APPLICATION SERVICES REGISTRY
//! CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
//! RESPONSABILIDAD: REGISTRO DE SERVICIOS DEL COORDINADOR
//! =================================================================

pub mod benchmarks;
pub mod cracks;
pub mod hashlist_completion;
pub mod intake;
pub mod lifecycle;
pub mod planner;
pub mod progress;
pub mod reconnect;
pub mod router;
pub mod scheduler;

pub use benchmarks::BenchmarkCoordinator;
pub use cracks::CrackPipeline;
pub use hashlist_completion::HashlistCompletionService;
pub use intake::{JobIntakeService, JobSubmissionRequest};
pub use lifecycle::TaskLifecycleService;
pub use planner::{ChunkPlannerService, PlanOutcome};
pub use progress::ProgressIngestor;
pub use reconnect::{spawn_reconnect_sweeper, ReconnectSupervisor};
pub use router::FrameRouter;
pub use scheduler::{spawn_scheduler_daemon, SchedulerService};
