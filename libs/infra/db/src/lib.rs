// [libs/infra/db/src/lib.rs]
/*!
 * =================================================================
 * APARATO: TACTICAL LEDGER REGISTRY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: PUERTA DE ENTRADA AL SUSTRATO DE PERSISTENCIA
 *
 * La base de datos es el estado autoritativo del coordinador; todo
 * estado en proceso es caché advisory. Las transiciones de estado de
 * fragmentos pasan por una única escritura a nivel de fila.
 * =================================================================
 */

pub mod client;
pub mod errors;
pub mod repositories;
pub mod retry;
pub mod schema;

pub use client::LedgerClient;
pub use errors::DbError;
pub use retry::execute_with_retry;
