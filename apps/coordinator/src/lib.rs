// [apps/coordinator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: COORDINATOR LIBRARY ROOT
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1-APP)
 * RESPONSABILIDAD: EXPOSICIÓN DE MÓDULOS PARA BINARIO Y PROVING GROUNDS
 * =================================================================
 */

pub mod handlers;
pub mod kernel;
pub mod routes;
pub mod services;
pub mod state;
