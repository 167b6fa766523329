// [apps/coordinator/src/state/progress_cache.rs]
//! =================================================================
//! APARATO: TASK PROGRESS CACHE
//! CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
//! RESPONSABILIDAD: ÚLTIMO PROGRESO CONOCIDO POR FRAGMENTO (ADVISORY)
//! =================================================================

use krakenhashes_infra_protocol::ProgressPayload;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Caché advisory task_id -> último frame de progreso. La base de datos
/// es autoritativa; esta vista solo alimenta la superficie de lectura.
pub struct ProgressCache {
    latest_frames: RwLock<HashMap<Uuid, ProgressPayload>>,
}

impl ProgressCache {
    pub fn new() -> Self {
        Self {
            latest_frames: RwLock::new(HashMap::new()),
        }
    }

    pub fn record(&self, frame: ProgressPayload) {
        let mut guard = self.latest_frames.write().expect("Progress cache poisoned");
        guard.insert(frame.task_id, frame);
    }

    pub fn snapshot(&self, task_id: Uuid) -> Option<ProgressPayload> {
        let guard = self.latest_frames.read().expect("Progress cache poisoned");
        guard.get(&task_id).cloned()
    }

    pub fn evict(&self, task_id: Uuid) {
        let mut guard = self.latest_frames.write().expect("Progress cache poisoned");
        guard.remove(&task_id);
    }

    pub fn tracked_task_count(&self) -> usize {
        let guard = self.latest_frames.read().expect("Progress cache poisoned");
        guard.len()
    }
}

impl Default for ProgressCache {
    fn default() -> Self {
        Self::new()
    }
}
