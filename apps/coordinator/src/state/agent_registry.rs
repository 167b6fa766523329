// [apps/coordinator/src/state/agent_registry.rs]
/*!
 * =================================================================
 * APARATO: AGENT DISPATCH REGISTRY
 * CLASIFICACIÓN: APPLICATION STATE (ESTRATO L1-APP)
 * RESPONSABILIDAD: REGISTRO DE CANALES VIVOS Y CARRIL ÚNICO DE ESCRITURA
 *
 * # Invariante (Single Writer):
 * Cada agente tiene exactamente un carril de salida (mpsc acotado) cuyo
 * único consumidor es la tarea de escritura del socket. Los productores
 * compiten en el canal, jamás en el socket.
 * =================================================================
 */

use krakenhashes_infra_protocol::DispatchFrame;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capacidad del carril de salida por agente.
const OUTBOUND_LANE_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// El agente no tiene canal vivo en este coordinador.
    #[error("[L1_DISPATCH_FAULT]: AGENT_OFFLINE -> #{0}")]
    AgentOffline(i64),

    /// El carril existe pero el socket colapsó antes del encolado.
    #[error("[L1_DISPATCH_FAULT]: OUTBOUND_LANE_SEVERED -> #{0}")]
    LaneSevered(i64),
}

/// Manija de despacho de un agente conectado.
#[derive(Clone)]
pub struct DispatchHandle {
    outbound_lane: mpsc::Sender<DispatchFrame>,
    /// Época de sesión: una reconexión reemplaza la manija anterior.
    pub session_epoch: u64,
}

pub struct AgentRegistry {
    active_channels: RwLock<HashMap<i64, DispatchHandle>>,
    epoch_counter: std::sync::atomic::AtomicU64,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            active_channels: RwLock::new(HashMap::new()),
            epoch_counter: std::sync::atomic::AtomicU64::new(1),
        }
    }

    /// Registra el carril de salida del agente y devuelve (receptor, época).
    /// Una sesión previa del mismo agente queda desplazada: su carril se
    /// cierra al soltarse el sender antiguo.
    pub fn register(&self, agent_id: i64) -> (mpsc::Receiver<DispatchFrame>, u64) {
        let (sender, receiver) = mpsc::channel(OUTBOUND_LANE_CAPACITY);
        let epoch = self
            .epoch_counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let mut channels = self.active_channels.write().expect("Registry lock poisoned");
        if channels.insert(agent_id, DispatchHandle { outbound_lane: sender, session_epoch: epoch }).is_some() {
            warn!("♻️ [REGISTRY]: Agent #{} re-registered; previous lane displaced.", agent_id);
        } else {
            info!("🔌 [REGISTRY]: Agent #{} dispatch lane established (epoch {}).", agent_id, epoch);
        }
        (receiver, epoch)
    }

    /// Baja condicionada a la época: una sesión vieja no puede retirar la
    /// manija de la sesión que la reemplazó.
    pub fn unregister(&self, agent_id: i64, session_epoch: u64) -> bool {
        let mut channels = self.active_channels.write().expect("Registry lock poisoned");
        match channels.get(&agent_id) {
            Some(handle) if handle.session_epoch == session_epoch => {
                channels.remove(&agent_id);
                info!("🔌 [REGISTRY]: Agent #{} dispatch lane released.", agent_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_connected(&self, agent_id: i64) -> bool {
        self.active_channels
            .read()
            .expect("Registry lock poisoned")
            .contains_key(&agent_id)
    }

    pub fn connected_agent_ids(&self) -> Vec<i64> {
        self.active_channels
            .read()
            .expect("Registry lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Encola una trama en el carril del agente. El await ocurre sobre el
    /// canal clonado, nunca bajo el candado del registro.
    pub async fn send_to_agent(&self, agent_id: i64, frame: DispatchFrame) -> Result<(), DispatchError> {
        let lane = {
            let channels = self.active_channels.read().expect("Registry lock poisoned");
            channels
                .get(&agent_id)
                .map(|handle| handle.outbound_lane.clone())
                .ok_or(DispatchError::AgentOffline(agent_id))?
        };

        lane.send(frame).await.map_err(|_| {
            debug!("📪 [REGISTRY]: Outbound lane of agent #{} already severed.", agent_id);
            DispatchError::LaneSevered(agent_id)
        })
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
