use super::observers::ObserverHub;
use super::{LanguageModel, ModelSession};
use crate::config::BrokerConfig;
use fieldmark_common::FieldmarkError;
use fieldmark_common::protocol::{ObserverMessage, StreamEvent};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, warn};

type SessionSlot = Arc<Mutex<Option<Arc<dyn ModelSession>>>>;

/// Owns the single conversation session and fans streamed replies out to
/// every connected observer.
///
/// Cloning shares the session slot and the observer set. The slot mutex is
/// only held to read or replace the handle.
#[derive(Clone)]
pub struct SessionBroker {
    model: Arc<dyn LanguageModel>,
    session: SessionSlot,
    observers: ObserverHub,
    session_error_marker: Arc<str>,
    last_response_id: Arc<AtomicU64>,
}

impl SessionBroker {
    pub fn new(model: Arc<dyn LanguageModel>, observers: ObserverHub, config: &BrokerConfig) -> Self {
        Self {
            model,
            session: Arc::new(Mutex::new(None)),
            observers,
            session_error_marker: Arc::from(config.session_error_marker.as_str()),
            last_response_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn observers(&self) -> &ObserverHub {
        &self.observers
    }

    pub fn has_session(&self) -> bool {
        self.slot().is_some()
    }

    /// The existing session, else a newly created one.
    pub async fn ensure_session(
        &self,
        system_prompt: &str,
    ) -> Result<Arc<dyn ModelSession>, FieldmarkError> {
        let existing = self.slot().clone();
        if let Some(session) = existing {
            return Ok(session);
        }

        let session = self.model.create(system_prompt).await.map_err(|e| {
            error!("Session creation failed: {}", e);
            match e {
                failed @ FieldmarkError::SessionCreationFailed(_) => failed,
                other => FieldmarkError::SessionCreationFailed(other.to_string()),
            }
        })?;
        info!("Conversation session created");
        *self.slot() = Some(session.clone());
        Ok(session)
    }

    /// Allocate an id and stream the reply on a spawned task.
    pub fn start_response(&self, message: String, system_prompt: String) -> String {
        let response_id = self.next_response_id();
        let broker = self.clone();
        let id = response_id.clone();
        tokio::spawn(async move {
            broker.stream_response(&message, &system_prompt, &id).await;
        });
        response_id
    }

    /// Stream one reply to every observer: chunks in order, then
    /// `STREAM_END`, or `STREAM_ERROR` on the first failure.
    pub async fn stream_response(&self, message: &str, system_prompt: &str, response_id: &str) {
        match self.run_stream(message, system_prompt, response_id).await {
            Ok(chunks) => {
                debug!("Response {} finished after {} chunks", response_id, chunks);
                self.emit(StreamEvent::StreamEnd {
                    response_id: response_id.to_string(),
                });
            }
            Err(e) => {
                let text = failure_message(&e);
                warn!("Response {} failed: {}", response_id, e);
                if text.contains(&*self.session_error_marker) {
                    info!("Discarding conversation session");
                    *self.slot() = None;
                }
                self.emit(StreamEvent::StreamError {
                    error: text,
                    response_id: response_id.to_string(),
                });
            }
        }
    }

    async fn run_stream(
        &self,
        message: &str,
        system_prompt: &str,
        response_id: &str,
    ) -> Result<usize, FieldmarkError> {
        let session = self.ensure_session(system_prompt).await?;
        let mut stream = session.prompt_streaming(message).await?;
        let mut chunks = 0;
        while let Some(chunk) = stream.next().await {
            self.emit(StreamEvent::StreamChunk {
                chunk: chunk?,
                response_id: response_id.to_string(),
            });
            chunks += 1;
        }
        Ok(chunks)
    }

    /// Decimal millisecond timestamp, strictly increasing per broker.
    pub fn next_response_id(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let mut last = self.last_response_id.load(Ordering::Relaxed);
        loop {
            let next = now.max(last + 1);
            match self.last_response_id.compare_exchange_weak(
                last,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next.to_string(),
                Err(current) => last = current,
            }
        }
    }

    fn emit(&self, event: StreamEvent) {
        self.observers.broadcast(ObserverMessage::Stream(event));
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn ModelSession>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The model's own error text, without the display prefix.
fn failure_message(err: &FieldmarkError) -> String {
    match err {
        FieldmarkError::StreamFailure(message) | FieldmarkError::SessionCreationFailed(message) => {
            message.clone()
        }
        other => other.to_string(),
    }
}
