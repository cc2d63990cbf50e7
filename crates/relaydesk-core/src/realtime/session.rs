//! Viewer sessions: one handle per connected console viewer.
//!
//! A [`SessionHandle`] normalizes the two transport shapes the relay serves:
//!
//! - **Stream:** server-push only (SSE). The server writes frames and a
//!   periodic heartbeat; the client reconnects on its own.
//! - **Duplex:** a bidirectional socket. In addition to outbound frames, the
//!   session routes inbound [`ClientEvent`]s to handlers registered with
//!   [`SessionHandle::on_event`].
//!
//! Outbound frames go through an unbounded `mpsc` queue drained by the
//! transport task, which preserves per-recipient ordering and never blocks
//! the publisher. Writing to a closed session is logged and dropped.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use relaydesk_types::error::TransportError;
use relaydesk_types::event::{ClientEvent, ClientEventKind, ServerEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Unique identifier of a viewer session (UUID v7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport shape behind a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stream,
    Duplex,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stream => write!(f, "stream"),
            TransportKind::Duplex => write!(f, "duplex"),
        }
    }
}

/// Receiving half of a session's outbound queue, owned by the transport task.
pub type Outbound = mpsc::UnboundedReceiver<ServerEvent>;

/// Handler for one kind of inbound client event.
pub type EventHandler =
    Arc<dyn Fn(SessionHandle, ClientEvent) -> BoxFuture<'static, ()> + Send + Sync>;

type CloseHandler = Box<dyn FnOnce(&SessionHandle) + Send>;

struct SessionInner {
    id: SessionId,
    kind: TransportKind,
    outbound: mpsc::UnboundedSender<ServerEvent>,
    closed: AtomicBool,
    close_handlers: Mutex<Vec<CloseHandler>>,
    event_handlers: Mutex<HashMap<ClientEventKind, EventHandler>>,
    lifetime: CancellationToken,
}

/// Cloneable handle to one viewer session.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

impl SessionHandle {
    /// Create a session and the outbound queue its transport task drains.
    pub fn new(kind: TransportKind) -> (Self, Outbound) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            inner: Arc::new(SessionInner {
                id: SessionId::new(),
                kind,
                outbound: tx,
                closed: AtomicBool::new(false),
                close_handlers: Mutex::new(Vec::new()),
                event_handlers: Mutex::new(HashMap::new()),
                lifetime: CancellationToken::new(),
            }),
        };
        (session, rx)
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn kind(&self) -> TransportKind {
        self.inner.kind
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Token cancelled when the session closes. Transport loops select on it.
    pub fn lifetime(&self) -> CancellationToken {
        self.inner.lifetime.clone()
    }

    /// Queue a frame for the viewer.
    ///
    /// Returns `false` (and logs) when the session is already closed or its
    /// transport has gone away. Never fails the caller.
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.try_send(event) {
            Ok(()) => true,
            Err(err) => {
                debug!(session_id = %self.id(), error = %err, "dropping outbound frame");
                false
            }
        }
    }

    /// Queue a frame, reporting why it could not be queued.
    pub fn try_send(&self, event: ServerEvent) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.inner
            .outbound
            .send(event)
            .map_err(|_| TransportError::Closed)
    }

    /// Register cleanup to run when the session closes.
    ///
    /// Each handler runs exactly once. Registering on an already closed
    /// session runs the handler immediately.
    pub fn on_close<F>(&self, handler: F)
    where
        F: FnOnce(&SessionHandle) + Send + 'static,
    {
        let mut handlers = self
            .inner
            .close_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            drop(handlers);
            handler(self);
            return;
        }
        handlers.push(Box::new(handler));
    }

    /// Close the session: stop the heartbeat, drop event handlers and run
    /// close handlers. Only the first call has any effect.
    pub fn close(&self) {
        let handlers = {
            let mut guard = self
                .inner
                .close_handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *guard)
        };

        self.inner.lifetime.cancel();
        self.inner
            .event_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        debug!(session_id = %self.id(), kind = %self.kind(), "session closed");
        for handler in handlers {
            handler(self);
        }
    }

    /// Register the handler for one kind of inbound client event (duplex only).
    ///
    /// Replaces any handler previously registered for the same kind.
    pub fn on_event<F, Fut>(&self, kind: ClientEventKind, handler: F) -> Result<(), TransportError>
    where
        F: Fn(SessionHandle, ClientEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.kind() != TransportKind::Duplex {
            return Err(TransportError::OneWay);
        }
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let handler: EventHandler = Arc::new(move |session, event| handler(session, event).boxed());
        self.inner
            .event_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind, handler);
        Ok(())
    }

    /// Route an inbound client event to its handler.
    ///
    /// Returns `false` when no handler is registered for the event kind.
    pub async fn dispatch(&self, event: ClientEvent) -> bool {
        let kind = event.kind();
        let handler = self
            .inner
            .event_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned();

        match handler {
            Some(handler) => {
                handler(self.clone(), event).await;
                true
            }
            None => {
                debug!(session_id = %self.id(), event = %kind, "no handler for client event");
                false
            }
        }
    }

    /// Emit a heartbeat frame every `every` until the session closes.
    ///
    /// The first heartbeat goes out one full interval after the call.
    pub fn start_heartbeat(&self, every: Duration) -> JoinHandle<()> {
        let session = self.clone();
        let lifetime = self.lifetime();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = lifetime.cancelled() => break,
                    _ = ticker.tick() => {
                        if !session.send(ServerEvent::Heartbeat) {
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("closed", &self.is_closed())
            .finish()
    }
}
