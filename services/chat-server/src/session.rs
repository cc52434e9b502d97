use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chat_protocol::{InboundFrame, OutboundFrame, RoomId, UserId, MAX_FRAME_BYTES};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain;
use crate::hub::Hub;
use crate::storage::Storage;

const READ_PONG_DEADLINE: Duration = Duration::from_secs(60);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Server-side representation of one live connection. The room-subscription
/// set is guarded by a synchronous mutex: operations on it are quick and
/// never held across an `.await`.
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    outbound_tx: mpsc::Sender<OutboundFrame>,
    rooms: Mutex<HashSet<RoomId>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Session {
    /// Builds a new session and its outbound channel. The receiving half is
    /// driven by the write loop spawned from [`run`].
    pub fn new(
        user_id: UserId,
        username: String,
        initial_rooms: Vec<RoomId>,
        outbound_queue_capacity: usize,
    ) -> (Arc<Session>, mpsc::Receiver<OutboundFrame>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let session = Arc::new(Session {
            user_id,
            username,
            outbound_tx,
            rooms: Mutex::new(initial_rooms.into_iter().collect()),
            shutdown_tx,
            shutdown_rx,
        });
        (session, outbound_rx)
    }

    /// Non-blocking enqueue. Returns `false` if the queue is full or
    /// already closed -- the caller (Hub) must treat the session as dead.
    pub fn try_send(&self, frame: OutboundFrame) -> bool {
        self.outbound_tx.try_send(frame).is_ok()
    }

    /// Wakes both of this session's loops so they wind down: either loop
    /// exiting on its own calls this too, so whichever side fails first
    /// drives the other to close without either owning the other's task
    /// handle.
    pub fn close_outbound(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn shutdown_watch(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    pub fn is_subscribed(&self, room_id: &str) -> bool {
        self.rooms.lock().expect("rooms mutex poisoned").contains(room_id)
    }

    pub fn add_room(&self, room_id: RoomId) {
        self.rooms.lock().expect("rooms mutex poisoned").insert(room_id);
    }

    pub fn remove_room(&self, room_id: &str) {
        self.rooms.lock().expect("rooms mutex poisoned").remove(room_id);
    }
}

/// Drives one connection's read and write loops to completion, then
/// unregisters the session from the Hub exactly once.
pub async fn run(
    socket: WebSocket,
    hub: Arc<Hub>,
    storage: Arc<dyn Storage>,
    session: Arc<Session>,
    outbound_rx: mpsc::Receiver<OutboundFrame>,
) {
    let (sink, stream) = socket.split();
    let shutdown_rx = session.shutdown_watch();

    let reader = tokio::spawn(read_loop(
        stream,
        Arc::clone(&session),
        Arc::clone(&hub),
        Arc::clone(&storage),
        shutdown_rx.clone(),
    ));
    let writer = tokio::spawn(write_loop(sink, outbound_rx, Arc::clone(&session), shutdown_rx));

    let _ = reader.await;
    let _ = writer.await;

    hub.unregister(&session).await;
    info!(user_id = %session.user_id, "session closed");
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    session: Arc<Session>,
    hub: Arc<Hub>,
    storage: Arc<dyn Storage>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            next = tokio::time::timeout(READ_PONG_DEADLINE, stream.next()) => {
                match next {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        if text.len() > MAX_FRAME_BYTES {
                            warn!(user_id = %session.user_id, "frame exceeds size limit, closing");
                            break;
                        }
                        handle_frame(&text, &session, &hub, &storage).await;
                    }
                    Ok(Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_)))) => continue,
                    Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
                    Ok(Some(Err(e))) => {
                        warn!(user_id = %session.user_id, error = %e, "transport error");
                        break;
                    }
                    Err(_) => {
                        warn!(user_id = %session.user_id, "read-pong deadline elapsed");
                        break;
                    }
                }
            }
        }
    }
    session.close_outbound();
}

async fn handle_frame(text: &str, session: &Arc<Session>, hub: &Arc<Hub>, storage: &Arc<dyn Storage>) {
    let frame = match serde_json::from_str::<InboundFrame>(text) {
        Ok(frame) => frame,
        Err(_) => return, // malformed JSON / unknown tag: absorbed silently
    };
    debug!(user_id = %session.user_id, "dispatching frame");

    let result = match frame {
        InboundFrame::Ping => {
            session.try_send(OutboundFrame::Pong);
            Ok(())
        }
        InboundFrame::MessageSend(payload) => {
            domain::send_message(session, hub, storage, payload).await
        }
        InboundFrame::RoomJoin(payload) => domain::join_room(session, hub, storage, payload).await,
        InboundFrame::RoomLeave(payload) => {
            domain::leave_room(session, hub, storage, payload).await
        }
        InboundFrame::TypingStart(payload) => {
            domain::typing(session, hub, payload, true).await;
            Ok(())
        }
        InboundFrame::TypingStop(payload) => {
            domain::typing(session, hub, payload, false).await;
            Ok(())
        }
        InboundFrame::MessageRead(payload) => {
            domain::mark_read(session, hub, storage, payload).await
        }
    };

    if let Err(err) = result {
        session.try_send(OutboundFrame::error(err.code(), err.to_string()));
    }
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<OutboundFrame>,
    session: Arc<Session>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => break,
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        let Ok(json) = serde_json::to_string(&frame) else { continue };
                        if !send_with_deadline(&mut sink, Message::Text(json.into())).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = ping_interval.tick() => {
                if !send_with_deadline(&mut sink, Message::Ping(Vec::new().into())).await {
                    break;
                }
            }
        }
    }
    session.close_outbound();
}

async fn send_with_deadline(sink: &mut SplitSink<WebSocket, Message>, msg: Message) -> bool {
    matches!(
        tokio::time::timeout(WRITE_DEADLINE, sink.send(msg)).await,
        Ok(Ok(()))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_send_fails_once_queue_capacity_is_exceeded() {
        let (session, mut rx) = Session::new("u1".to_owned(), "alice".to_owned(), Vec::new(), 1);
        assert!(session.try_send(OutboundFrame::Pong));
        assert!(!session.try_send(OutboundFrame::Pong));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn room_subscription_set_tracks_join_and_leave() {
        let (session, _rx) = Session::new("u1".to_owned(), "alice".to_owned(), Vec::new(), 4);
        assert!(!session.is_subscribed("r1"));
        session.add_room("r1".to_owned());
        assert!(session.is_subscribed("r1"));
        session.remove_room("r1");
        assert!(!session.is_subscribed("r1"));
    }

    #[tokio::test]
    async fn close_outbound_wakes_the_shutdown_watch() {
        let (session, _rx) = Session::new("u1".to_owned(), "alice".to_owned(), Vec::new(), 4);
        let mut watch_rx = session.shutdown_watch();
        session.close_outbound();
        watch_rx.changed().await.unwrap();
        assert!(*watch_rx.borrow());
    }
}
