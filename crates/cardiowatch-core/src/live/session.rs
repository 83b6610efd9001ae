//! Handle to one open live connection

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Frame handed to a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    /// Text payload, shared between all recipients of one fan-out
    Text(Arc<str>),
    /// Keepalive ping
    Ping,
    /// Ask the writer to close the connection
    Close,
}

/// Why a push could not be queued
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The writer is not keeping up with the queue
    #[error("session {0} outbound queue is full")]
    QueueFull(Uuid),

    /// The connection has gone away or has been asked to close
    #[error("session {0} is closed")]
    Closed(Uuid),
}

/// Close request shared by every handle of one session.
///
/// Kept outside the bounded queue so a close is never lost to a full
/// buffer.
#[derive(Debug, Default)]
struct CloseSignal {
    requested: AtomicBool,
    notify: Notify,
}

impl CloseSignal {
    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// Cloneable handle to a live connection.
///
/// Writes never wait: frames go into a bounded queue drained by the
/// connection's own writer task. Closing bypasses the queue.
#[derive(Debug, Clone)]
pub struct LiveSession {
    id: Uuid,
    connected_at: DateTime<Utc>,
    sender: mpsc::Sender<PushFrame>,
    close: Arc<CloseSignal>,
}

impl LiveSession {
    /// Create a session and the outbox its writer task drains
    pub fn open(buffer: usize) -> (Self, SessionOutbox) {
        let (sender, frames) = mpsc::channel(buffer.max(1));
        let close = Arc::new(CloseSignal::default());
        let session = Self {
            id: Uuid::new_v4(),
            connected_at: Utc::now(),
            sender,
            close: Arc::clone(&close),
        };
        let outbox = SessionOutbox {
            frames,
            close,
            finished: false,
        };
        (session, outbox)
    }

    /// Session identifier, distinct per connection
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the connection was established
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Whether the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether `close` has been called on any handle of this session
    pub fn close_requested(&self) -> bool {
        self.close.is_requested()
    }

    /// Queue a text payload
    pub fn push(&self, payload: Arc<str>) -> Result<(), DeliveryError> {
        self.send(PushFrame::Text(payload))
    }

    /// Queue a keepalive ping
    pub fn ping(&self) -> Result<(), DeliveryError> {
        self.send(PushFrame::Ping)
    }

    /// Ask the writer to close the connection.
    ///
    /// Succeeds even when the queue is full. Frames already queued are
    /// still written before the close; later pushes are refused.
    pub fn close(&self) -> Result<(), DeliveryError> {
        if self.sender.is_closed() {
            return Err(DeliveryError::Closed(self.id));
        }
        self.close.request();
        Ok(())
    }

    fn send(&self, frame: PushFrame) -> Result<(), DeliveryError> {
        if self.close.is_requested() {
            return Err(DeliveryError::Closed(self.id));
        }
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull(self.id),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(self.id),
        })
    }
}

/// Receiving end of a session, owned by the writer task.
///
/// Yields queued frames in order. Once a close is requested the remaining
/// frames are drained, then a single [`PushFrame::Close`], then nothing.
#[derive(Debug)]
pub struct SessionOutbox {
    frames: mpsc::Receiver<PushFrame>,
    close: Arc<CloseSignal>,
    finished: bool,
}

impl SessionOutbox {
    /// Wait for the next frame; `None` once closed or every handle is gone
    pub async fn recv(&mut self) -> Option<PushFrame> {
        if self.finished {
            return None;
        }
        if !self.close.is_requested() {
            tokio::select! {
                biased;
                frame = self.frames.recv() => return frame,
                () = self.close.notify.notified() => {}
            }
        }
        Some(self.drain_then_close())
    }

    /// Next frame without waiting
    pub fn try_recv(&mut self) -> Result<PushFrame, TryRecvError> {
        if self.finished {
            return Err(TryRecvError::Disconnected);
        }
        if self.close.is_requested() {
            return Ok(self.drain_then_close());
        }
        self.frames.try_recv()
    }

    fn drain_then_close(&mut self) -> PushFrame {
        match self.frames.try_recv() {
            Ok(frame) => frame,
            Err(_) => {
                self.finished = true;
                PushFrame::Close
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_reaches_receiver() {
        let (session, mut rx) = LiveSession::open(4);
        session.push(Arc::from("hello")).unwrap();
        assert_eq!(rx.recv().await, Some(PushFrame::Text(Arc::from("hello"))));
    }

    #[test]
    fn full_queue_is_reported_without_blocking() {
        let (session, _rx) = LiveSession::open(1);
        session.push(Arc::from("one")).unwrap();
        assert_eq!(
            session.push(Arc::from("two")),
            Err(DeliveryError::QueueFull(session.id()))
        );
    }

    #[test]
    fn dropped_receiver_is_closed() {
        let (session, rx) = LiveSession::open(4);
        drop(rx);
        assert!(session.is_closed());
        assert_eq!(session.ping(), Err(DeliveryError::Closed(session.id())));
        assert_eq!(session.close(), Err(DeliveryError::Closed(session.id())));
    }

    #[test]
    fn close_is_accepted_when_queue_is_full() {
        let (session, mut rx) = LiveSession::open(1);
        session.ping().unwrap();
        assert_eq!(session.ping(), Err(DeliveryError::QueueFull(session.id())));

        assert_eq!(session.close(), Ok(()));
        assert!(session.close_requested());

        assert_eq!(rx.try_recv().ok(), Some(PushFrame::Ping));
        assert_eq!(rx.try_recv().ok(), Some(PushFrame::Close));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn pushes_after_close_are_refused() {
        let (session, mut rx) = LiveSession::open(4);
        session.close().unwrap();
        assert_eq!(
            session.push(Arc::from("late")),
            Err(DeliveryError::Closed(session.id()))
        );
        assert_eq!(rx.try_recv().ok(), Some(PushFrame::Close));
    }

    #[tokio::test]
    async fn waiting_writer_wakes_on_close() {
        let (session, mut rx) = LiveSession::open(4);
        let waiter = tokio::spawn(async move { (rx.recv().await, rx.recv().await) });

        tokio::task::yield_now().await;
        session.close().unwrap();

        let (first, second) = waiter.await.unwrap();
        assert_eq!(first, Some(PushFrame::Close));
        assert_eq!(second, None);
    }

    #[test]
    fn clones_share_identity_and_connect_time() {
        let before = Utc::now();
        let (session, _rx) = LiveSession::open(4);
        let handle = session.clone();

        assert_eq!(handle.id(), session.id());
        assert_eq!(handle.connected_at(), session.connected_at());
        assert!(session.connected_at() >= before);
        assert!(session.connected_at() <= Utc::now());
    }
}
