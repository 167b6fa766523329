// [apps/coordinator/src/main.rs]
/*!
 * =================================================================
 * APARATO: COORDINATOR BINARY ENTRYPOINT
 * CLASIFICACIÓN: COMPOSITION ROOT (ESTRATO L0)
 * RESPONSABILIDAD: CARGA DE ENTORNO, TELEMETRÍA E IGNICIÓN DEL KERNEL
 * =================================================================
 */

use krakenhashes_coordinator::kernel::CoordinatorKernel;
use std::env;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    krakenhashes_shared_beacon::init_tracing("krakenhashes-coordinator");

    let database_connection_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "file:krakenhashes_coordinator.db".to_string());
    let database_access_token = env::var("DATABASE_AUTH_TOKEN").ok();

    let listening_port = env::var("COORDINATOR_PORT")
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(8080);

    let data_root = PathBuf::from(env::var("DATA_ROOT").unwrap_or_else(|_| "./data".to_string()));

    info!(
        "🐙 [BOOT]: KrakenHashes coordinator igniting (data root: {}).",
        data_root.display()
    );

    let kernel = CoordinatorKernel::ignite(
        &database_connection_url,
        database_access_token,
        listening_port,
        data_root,
    )
    .await;

    kernel.launch_coordinator_operations().await;
}
