//! Session hub
//!
//! Every open tab of an account holds a WebSocket on `/api/session/ws`.
//! When the account logs out, each of those sockets receives
//! `{"event":"logout","ts":...}`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Extension,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::middleware::auth::RequestContext;
use crate::session::channel::{SyncEvent, SyncMessage};
use crate::state::AppState;

/// Connected sockets by account ID
pub struct SessionHub {
    clients: DashMap<i64, Vec<mpsc::UnboundedSender<SyncMessage>>>,
}

impl SessionHub {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Register a new socket
    pub fn register(&self, account_id: i64, tx: mpsc::UnboundedSender<SyncMessage>) {
        self.clients.entry(account_id).or_insert_with(Vec::new).push(tx);
        tracing::debug!("Session socket registered for account {}", account_id);
    }

    /// Unregister a socket
    pub fn unregister(&self, account_id: i64, tx: &mpsc::UnboundedSender<SyncMessage>) {
        if let Some(mut clients) = self.clients.get_mut(&account_id) {
            clients.retain(|c| !c.same_channel(tx));
            if clients.is_empty() {
                drop(clients);
                self.clients.remove(&account_id);
            }
        }
        tracing::debug!("Session socket unregistered for account {}", account_id);
    }

    /// Send a message to every socket of an account, returns how many got it
    pub fn publish(&self, account_id: i64, message: SyncMessage) -> usize {
        let delivered = match self.clients.get_mut(&account_id) {
            Some(mut clients) => {
                clients.retain(|c| c.send(message.clone()).is_ok());
                clients.len()
            }
            None => return 0,
        };
        if delivered == 0 {
            self.clients.remove_if(&account_id, |_, clients| clients.is_empty());
        }
        delivered
    }

    pub fn connections(&self, account_id: i64) -> usize {
        self.clients.get(&account_id).map(|c| c.len()).unwrap_or(0)
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new()
    }
}

/// GET /api/session/ws
pub async fn serve_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, ctx))
}

async fn handle_socket(socket: WebSocket, state: AppState, ctx: RequestContext) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SyncMessage>();

    state.hub.register(ctx.account_id, tx.clone());

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let logout = msg.event == SyncEvent::Logout;
            let text = serde_json::to_string(&msg).unwrap_or_default();
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
            // Session is gone, nothing more to deliver
            if logout {
                let _ = sender.close().await;
                break;
            }
        }
    });

    let tx_pong = tx.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Ok(incoming) = serde_json::from_str::<SyncMessage>(&text) {
                        if incoming.event == SyncEvent::Ping {
                            let _ = tx_pong.send(SyncMessage::new(SyncEvent::Pong));
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    state.hub.unregister(ctx.account_id, &tx);
}
