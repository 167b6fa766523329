// [apps/coordinator/src/handlers/channel.rs]
/*!
 * =================================================================
 * APARATO: AGENT DISPATCH SOCKET
 * CLASIFICACIÓN: API HANDLER (ESTRATO L4)
 * RESPONSABILIDAD: ENLACE FULL-DUPLEX POR AGENTE Y ORQUESTACIÓN DE SESIÓN
 *
 * # Invariante (Triple Tarea):
 * Cada sesión corre tres tareas: el carril de escritura (único
 * consumidor del socket saliente), el lector de red y el worker de
 * ejecución. El worker procesa tramas en orden de llegada: el orden
 * por tarea queda preservado sin bloquear el carril de escritura.
 * =================================================================
 */

use crate::services::{FrameRouter, ReconnectSupervisor};
use crate::state::AppState;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use krakenhashes_infra_protocol::{decode_frame, encode_frame, DispatchFrame};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Duration};
use tracing::{debug, error, info, warn};

/// Intervalo de latido físico (Ping) del carril de escritura.
const KEEPALIVE_INTERVAL_SECONDS: u64 = 25;

/// Plazo del handshake: la presentación debe llegar como primera trama.
const HELLO_DEADLINE_SECONDS: u64 = 30;

/// Capacidad del buffer de tramas entrantes por sesión.
const INBOUND_BUFFER_CAPACITY: usize = 256;

/// Negociación del enlace del agente (HTTP -> WebSocket, RFC 6455).
pub async fn establish_agent_uplink(
    websocket_upgrade: WebSocketUpgrade,
    State(application_state): State<AppState>,
) -> impl IntoResponse {
    debug!("🔌 [UPLINK]: Negotiating protocol transition for incoming agent...");
    websocket_upgrade.on_upgrade(move |socket| handle_agent_session(socket, application_state))
}

/// Orquestador de la sesión completa de un agente.
async fn handle_agent_session(socket: WebSocket, application_state: AppState) {
    let (mut socket_sender, mut socket_receiver) = socket.split();

    // --- 0. HANDSHAKE: la primera trama DEBE ser agent_hello ---
    let hello = match timeout(Duration::from_secs(HELLO_DEADLINE_SECONDS), socket_receiver.next()).await
    {
        Ok(Some(Ok(Message::Text(raw_frame)))) => match decode_frame(&raw_frame) {
            Ok(DispatchFrame::AgentHello(hello)) => hello,
            Ok(_) | Err(_) => {
                warn!("🚫 [UPLINK]: First frame was not a valid agent_hello; session refused.");
                return;
            }
        },
        _ => {
            warn!("⏰ [UPLINK]: Handshake deadline expired; session refused.");
            return;
        }
    };

    let agent = match application_state.agents().register_agent(&hello.agent_name).await {
        Ok(agent) => agent,
        Err(registration_fault) => {
            error!("❌ [UPLINK]: Agent registration collapsed: {}", registration_fault);
            return;
        }
    };
    let agent_id = agent.id;

    let (mut outbound_receiver, session_epoch) = application_state.registry().register(agent_id);
    info!(
        "⚡ [UPLINK]: Agent #{} [{}] session established (epoch {}).",
        agent_id, agent.name, session_epoch
    );

    // --- RECUPERACIÓN DE RECONEXIÓN (con el carril ya vivo) ---
    {
        let supervisor = ReconnectSupervisor::new(application_state.clone());
        if let Err(recovery_fault) = supervisor.on_agent_reconnect(&agent, &hello).await {
            warn!(
                "⚠️ [UPLINK]: Reconnect recovery for agent #{} failed: {}",
                agent_id, recovery_fault
            );
        }
    }

    // --- CANAL INTERNO DE TRAMAS ENTRANTES (DESACOPLAMIENTO) ---
    let (inbound_sender, mut inbound_receiver) = mpsc::channel::<String>(INBOUND_BUFFER_CAPACITY);

    // --- TAREA 1: CARRIL DE ESCRITURA (único consumidor del socket) ---
    let mut writer_lane_task = tokio::spawn(async move {
        let mut keepalive_timer = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));

        loop {
            tokio::select! {
                _ = keepalive_timer.tick() => {
                    if socket_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                },
                outbound = outbound_receiver.recv() => {
                    match outbound {
                        Some(frame) => match encode_frame(&frame) {
                            Ok(encoded) => {
                                if socket_sender.send(Message::Text(encoded)).await.is_err() {
                                    break;
                                }
                            }
                            Err(encode_fault) => {
                                error!("❌ [UPLINK]: Outbound frame rejected by codec: {}", encode_fault);
                            }
                        },
                        // El registro soltó el carril (sesión desplazada).
                        None => break,
                    }
                },
            }
        }
    });

    // --- TAREA 2: WORKER DE EJECUCIÓN (orden de llegada por sesión) ---
    let worker_state = application_state.clone();
    let mut worker_task = tokio::spawn(async move {
        while let Some(raw_frame) = inbound_receiver.recv().await {
            match decode_frame(&raw_frame) {
                Ok(frame) => {
                    if let Err(handling_fault) =
                        FrameRouter::dispatch(&worker_state, agent_id, frame).await
                    {
                        error!(
                            "⚠️ [UPLINK]: Frame handling fault for agent #{}: {}",
                            agent_id, handling_fault
                        );
                    }
                }
                Err(decode_fault) => {
                    warn!(
                        "🚫 [UPLINK]: Malformed frame from agent #{} dropped: {}",
                        agent_id, decode_fault
                    );
                }
            }
        }
    });

    // --- TAREA 3: LECTOR DE RED ---
    let mut reader_task = tokio::spawn(async move {
        while let Some(network_read) = socket_receiver.next().await {
            match network_read {
                Ok(Message::Text(raw_frame)) => {
                    if inbound_sender.send(raw_frame).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("🔌 [UPLINK]: Close signal received from agent #{}.", agent_id);
                    break;
                }
                Err(physical_fault) => {
                    debug!(
                        "❌ [UPLINK]: Network fault on agent #{} link: {}",
                        agent_id, physical_fault
                    );
                    break;
                }
                // Ping/Pong/Binary se descartan en este estrato.
                _ => {}
            }
        }
    });

    // --- COLAPSO CONTROLADO: el primer centinela que cae tumba al resto ---
    tokio::select! {
        _ = (&mut writer_lane_task) => {
            reader_task.abort();
            worker_task.abort();
        },
        _ = (&mut reader_task) => {
            writer_lane_task.abort();
            worker_task.abort();
        },
        _ = (&mut worker_task) => {
            writer_lane_task.abort();
            reader_task.abort();
        },
    }

    // --- LIMPIEZA DE SESIÓN ---
    // La baja condicionada por época evita que una sesión vieja dispare
    // el circuito de desconexión de la sesión que la reemplazó.
    if application_state.registry().unregister(agent_id, session_epoch) {
        let supervisor = ReconnectSupervisor::new(application_state.clone());
        if let Err(disconnect_fault) = supervisor.on_agent_disconnect(agent_id).await {
            error!(
                "⚠️ [UPLINK]: Disconnect handling for agent #{} failed: {}",
                agent_id, disconnect_fault
            );
        }
    }

    info!("💀 [UPLINK]: Agent #{} session resources released.", agent_id);
}
