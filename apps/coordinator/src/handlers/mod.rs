// [apps/coordinator/src/handlers/mod.rs]
//! =================================================================
//! APARATO: API HANDLERS REGISTRY
//! CLASIFICACIÓN: API HANDLER (ESTRATO L4)
//! RESPONSABILIDAD: REGISTRO DE MANEJADORES HTTP Y WEBSOCKET
//! =================================================================

pub mod admin;
pub mod channel;
