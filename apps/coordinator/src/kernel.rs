// INICIO DEL ARCHIVO [apps/coordinator/src/kernel.rs]
/*!
 * =================================================================
 * APARATO: COORDINATOR KERNEL
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L1-APP)
 * RESPONSABILIDAD: BOOTSTRAP DE INFRAESTRUCTURA E IGNICIÓN DE DAEMONS
 * =================================================================
 */

use crate::routes::create_coordinator_router;
use crate::services::{spawn_reconnect_sweeper, spawn_scheduler_daemon};
use crate::state::AppState;
use krakenhashes_infra_db::LedgerClient;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::{error, info, instrument};

pub struct CoordinatorKernel {
    pub server_network_port: u16,
    pub application_state: AppState,
}

impl CoordinatorKernel {
    /// Ignición del cliente del ledger y del estado de aplicación.
    #[instrument(skip(database_access_token))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
        data_root: PathBuf,
    ) -> Self {
        let ledger_client = LedgerClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: Ledger link collapse. Ignition aborted.");

        Self {
            server_network_port: listening_port,
            application_state: AppState::new(ledger_client, data_root),
        }
    }

    /// Despliegue de daemons y del servidor de canal + superficie admin.
    pub async fn launch_coordinator_operations(self) {
        let shared_state = self.application_state.clone();

        // --- 1. DAEMON DEL BUCLE DE PLANIFICACIÓN (C6) ---
        spawn_scheduler_daemon(shared_state.clone()).await;

        // --- 2. DAEMON DE GRACIA Y VITALIDAD (C10) ---
        spawn_reconnect_sweeper(shared_state.clone()).await;

        // --- 3. SERVIDOR HTTP + WEBSOCKET ---
        let coordinator_router = create_coordinator_router(shared_state);
        let bind_address = SocketAddr::new(IpAddr::from([0, 0, 0, 0]), self.server_network_port);

        info!("🐙 [KERNEL]: Coordinator listening on {}.", bind_address);

        let listener = match tokio::net::TcpListener::bind(bind_address).await {
            Ok(listener) => listener,
            Err(bind_fault) => {
                error!("💀 [KERNEL]: Port binding collapsed: {}", bind_fault);
                return;
            }
        };

        if let Err(serve_fault) = axum::serve(listener, coordinator_router).await {
            error!("💀 [KERNEL]: Server collapsed: {}", serve_fault);
        }
    }
}
// FIN DEL ARCHIVO [apps/coordinator/src/kernel.rs]
