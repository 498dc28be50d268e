use fieldmark_common::protocol::ObserverMessage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

pub type ObserverId = u64;

/// The set of connected observer channels.
///
/// Cloning shares the set. A channel leaves on `disconnect` or when its
/// receiving side is dropped, whichever comes first.
#[derive(Clone, Default)]
pub struct ObserverHub {
    inner: Arc<Mutex<HubInner>>,
}

#[derive(Default)]
struct HubInner {
    next_id: ObserverId,
    channels: HashMap<ObserverId, mpsc::UnboundedSender<ObserverMessage>>,
}

/// Receiving side of one observer connection.
#[derive(Debug)]
pub struct ObserverChannel {
    id: ObserverId,
    rx: mpsc::UnboundedReceiver<ObserverMessage>,
}

impl ObserverChannel {
    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// Next message, or `None` once the hub is gone or has dropped us.
    pub async fn recv(&mut self) -> Option<ObserverMessage> {
        self.rx.recv().await
    }

    /// Everything delivered so far, without waiting.
    pub fn drain(&mut self) -> Vec<ObserverMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self) -> ObserverChannel {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.channels.insert(id, tx);
        debug!("Observer {} connected", id);
        ObserverChannel { id, rx }
    }

    pub fn disconnect(&self, id: ObserverId) {
        if self.lock().channels.remove(&id).is_some() {
            debug!("Observer {} disconnected", id);
        }
    }

    /// Deliver `message` to every connected channel, pruning closed ones.
    pub fn broadcast(&self, message: ObserverMessage) {
        self.lock()
            .channels
            .retain(|_, tx| tx.send(message.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.lock().channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
