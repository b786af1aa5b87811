use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use warp::ws::WebSocket;

use crate::app::AppState;
use crate::envelope::{Envelope, EventKind};
use crate::id_types::SessionId;
use crate::participant::User;

/// Accepts one upgraded WebSocket connection: registers it, pumps its
/// outbound channel to the socket's write half, then reads envelopes
/// sequentially until the first read error (§4.4).
pub async fn handle_connection(ws: WebSocket, app: Arc<AppState>, user: Option<User>) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<warp::ws::Message>();

    let (sid, _participant) = app.connections.accept(outbound_tx, user, &app.participants);
    crate::metrics::ACTIVE_PARTICIPANTS.set(app.participants.active_count());
    info!(session = %sid, "connection accepted");

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(f) => f,
            Err(e) => {
                warn!(session = %sid, error = %e, "read error, closing connection");
                break;
            }
        };
        if !frame.is_text() {
            continue;
        }
        let text = match frame.to_str() {
            Ok(t) => t,
            Err(_) => continue,
        };
        let envelope: Envelope = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                warn!(session = %sid, error = %e, "malformed envelope, dropping");
                continue;
            }
        };
        dispatch(&app, &sid, envelope).await;
    }

    close_connection(&app, &sid).await;
    writer_task.abort();
}

async fn dispatch(app: &Arc<AppState>, sid: &SessionId, envelope: Envelope) {
    let kind = match EventKind::from_name(&envelope.name) {
        Some(k) => k,
        None => {
            warn!(session = %sid, event = %envelope.name, "unknown event name, dropping");
            return;
        }
    };

    if kind.requires_auth() {
        let is_guest = app.participants.get(sid).map(|p| p.is_guest()).unwrap_or(true);
        if is_guest {
            warn!(session = %sid, event = %envelope.name, "guest attempted mutating event, dropping");
            return;
        }
    }

    let result = route(app, sid, kind, envelope).await;
    if let Err(e) = result {
        warn!(session = %sid, error = %e, "handler failed");
    }
}

async fn route(
    app: &Arc<AppState>,
    sid: &SessionId,
    kind: EventKind,
    envelope: Envelope,
) -> anyhow::Result<()> {
    use EventKind::*;
    match kind {
        JoinRoom => app.on_join_room(sid, envelope.decode()?).await,
        NewMessage => app.on_new_message(sid, envelope.decode()?).await,
        EditMessage => app.on_edit_message(sid, envelope.decode()?).await,
        DeleteMessage => app.on_delete_message(sid, envelope.decode()?).await,
        ReactionToMessage => app.on_reaction_to_message(sid, envelope.decode()?).await,
        ClearChat => app.on_clear_chat(sid, envelope.decode()?).await,
        AssignRole => app.on_assign_role(sid, envelope.decode()?).await,
        UpdateWelcomeMessage => app.on_update_welcome_message(sid, envelope.decode()?).await,
        SetStatus => app.on_set_status(sid, envelope.decode()?).await,
        KickParticipant => app.on_kick_participant(sid, envelope.decode()?).await,
        PeerIceCandidate => app.on_peer_ice_candidate(sid, envelope.decode()?).await,
        PeerOffer => app.on_peer_offer(sid, envelope.decode()?).await,
        PeerAnswer => app.on_peer_answer(sid, envelope.decode()?).await,
        PeerMute => app.on_peer_mute(sid, envelope.decode()?).await,
    }
}

/// Deferred cleanup run once the read loop ends: leaves the last-joined
/// room (if any) and drops the connection/participant bookkeeping.
async fn close_connection(app: &Arc<AppState>, sid: &SessionId) {
    if let Some(handle) = app.connections.get(sid) {
        if let Some(room_id) = handle.last_room().await {
            app.leave_room(&room_id, sid).await;
        }
    }
    app.connections.remove(sid);
    app.participants.remove(sid);
    crate::metrics::ACTIVE_PARTICIPANTS.set(app.participants.active_count());
    info!(session = %sid, "connection closed");
}
