// [apps/coordinator/src/state/mod.rs]
/*!
 * =================================================================
 * APARATO: APPLICATION STATE NEXUS
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: COMPOSICIÓN DE REPOSITORIOS, REGISTRO Y CACHÉS
 *
 * # Invariante (DB Authority):
 * La base de datos es el estado autoritativo; el registro de canales y
 * la caché de progreso son advisory y reconstruibles tras un reinicio.
 * =================================================================
 */

pub mod agent_registry;
pub mod progress_cache;

pub use agent_registry::{AgentRegistry, DispatchError};
pub use progress_cache::ProgressCache;

use krakenhashes_domain_models::SystemTuning;
use krakenhashes_infra_db::repositories::{
    AgentRepository, BenchmarkRepository, CatalogRepository, HashRepository, HashlistRepository,
    JobRepository, PotfileRepository, SettingsRepository, TaskRepository,
};
use krakenhashes_infra_db::LedgerClient;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::Notify;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    ledger: LedgerClient,
    /// Raíz del data root compartido (wordlists/, rules/, hashlists/, binaries/).
    data_root: PathBuf,
    agent_registry: AgentRegistry,
    progress_cache: ProgressCache,
    /// Campana de despertar del planificador (trabajo creado, tarea
    /// completada, agente liberado).
    scheduler_wake: Notify,
    /// Afinación vigente, refrescada en cada tick del planificador.
    tuning: RwLock<SystemTuning>,
}

impl AppState {
    pub fn new(ledger: LedgerClient, data_root: PathBuf) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                ledger,
                data_root,
                agent_registry: AgentRegistry::new(),
                progress_cache: ProgressCache::new(),
                scheduler_wake: Notify::new(),
                tuning: RwLock::new(SystemTuning::default()),
            }),
        }
    }

    pub fn data_root(&self) -> &PathBuf {
        &self.inner.data_root
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.inner.agent_registry
    }

    pub fn progress_cache(&self) -> &ProgressCache {
        &self.inner.progress_cache
    }

    /// Despierta el bucle de planificación fuera de su tick nominal.
    pub fn wake_scheduler(&self) {
        self.inner.scheduler_wake.notify_one();
    }

    pub async fn scheduler_wakeup(&self) {
        self.inner.scheduler_wake.notified().await;
    }

    pub fn current_tuning(&self) -> SystemTuning {
        self.inner.tuning.read().expect("Tuning lock poisoned").clone()
    }

    pub fn replace_tuning(&self, fresh_tuning: SystemTuning) {
        *self.inner.tuning.write().expect("Tuning lock poisoned") = fresh_tuning;
    }

    // --- FÁBRICAS DE REPOSITORIOS (clones baratos del cliente) ---

    pub fn jobs(&self) -> JobRepository {
        JobRepository::new(self.inner.ledger.clone())
    }

    pub fn tasks(&self) -> TaskRepository {
        TaskRepository::new(self.inner.ledger.clone())
    }

    pub fn agents(&self) -> AgentRepository {
        AgentRepository::new(self.inner.ledger.clone())
    }

    pub fn benchmarks(&self) -> BenchmarkRepository {
        BenchmarkRepository::new(self.inner.ledger.clone())
    }

    pub fn hashes(&self) -> HashRepository {
        HashRepository::new(self.inner.ledger.clone())
    }

    pub fn hashlists(&self) -> HashlistRepository {
        HashlistRepository::new(self.inner.ledger.clone())
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.inner.ledger.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.inner.ledger.clone())
    }

    pub fn potfile(&self) -> PotfileRepository {
        PotfileRepository::new(self.inner.ledger.clone())
    }
}
