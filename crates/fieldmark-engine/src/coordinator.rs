//! The coordinator context.
//!
//! One `Coordinator` owns the store, tab presence, the conversation session
//! and the observer set. It processes events one at a time from an mpsc
//! queue and relays store notifications to every observer.

use crate::agent::CoordinatorLink;
use crate::broker::{LanguageModel, ObserverChannel, ObserverHub, SessionBroker};
use crate::config::FieldmarkConfig;
use crate::lifecycle::{LifecycleOutcome, TabHost, TabLifecycleManager};
use crate::store::FieldStore;
use async_trait::async_trait;
use fieldmark_common::FieldmarkError;
use fieldmark_common::protocol::{
    CoordinatorRequest, CoordinatorResponse, FieldRequest, NavigationEvent, ObserverMessage,
    SessionRequest, TabId,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

const EVENT_QUEUE_CAPACITY: usize = 100;

pub enum CoordinatorEvent {
    Request {
        request: CoordinatorRequest,
        reply: oneshot::Sender<CoordinatorResponse>,
    },
    Navigation(NavigationEvent),
    ToggleCapture {
        tab: TabId,
        url: String,
        reply: oneshot::Sender<Result<(), FieldmarkError>>,
    },
}

pub struct Coordinator {
    store: FieldStore,
    lifecycle: TabLifecycleManager,
    broker: SessionBroker,
    observers: ObserverHub,
    default_system_prompt: String,
}

impl Coordinator {
    pub fn new(
        store: FieldStore,
        host: Arc<dyn TabHost>,
        model: Arc<dyn LanguageModel>,
        config: &FieldmarkConfig,
    ) -> Self {
        let observers = ObserverHub::new();
        Self {
            store,
            lifecycle: TabLifecycleManager::new(host),
            broker: SessionBroker::new(model, observers.clone(), &config.broker),
            observers,
            default_system_prompt: config.broker.default_system_prompt.clone(),
        }
    }

    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    pub fn lifecycle(&self) -> &TabLifecycleManager {
        &self.lifecycle
    }

    pub fn broker(&self) -> &SessionBroker {
        &self.broker
    }

    pub fn observers(&self) -> &ObserverHub {
        &self.observers
    }

    pub fn connect_observer(&self) -> ObserverChannel {
        self.observers.connect()
    }

    // ============================================================
    // Event handling
    // ============================================================

    pub async fn handle_request(&mut self, request: CoordinatorRequest) -> CoordinatorResponse {
        match request {
            CoordinatorRequest::Session(request) => self.handle_session_request(request).await,
            CoordinatorRequest::Field(request) => self.handle_field_request(request).await,
        }
    }

    async fn handle_session_request(&mut self, request: SessionRequest) -> CoordinatorResponse {
        match request {
            SessionRequest::CreateSession(req) => {
                let prompt = self.system_prompt(&req.system_prompt);
                match self.broker.ensure_session(&prompt).await {
                    Ok(_) => CoordinatorResponse::ok(),
                    Err(e) => CoordinatorResponse::error(e),
                }
            }
            SessionRequest::SendMessage(req) => {
                let prompt = self.system_prompt(&req.system_prompt);
                let response_id = self.broker.start_response(req.message, prompt);
                debug!("Started response {}", response_id);
                CoordinatorResponse::Started {
                    started: true,
                    response_id,
                }
            }
            SessionRequest::CheckSession(_) => CoordinatorResponse::SessionStatus {
                has_session: self.broker.has_session(),
            },
        }
    }

    async fn handle_field_request(&mut self, request: FieldRequest) -> CoordinatorResponse {
        let result = match request {
            FieldRequest::CaptureField(req) => self.store.append_captured(req.field_info).await,
            FieldRequest::IgnoreField(req) => self.store.append_ignored(req.field_info).await,
        };
        match result {
            Ok(()) => CoordinatorResponse::ok(),
            Err(e) => {
                warn!("Error storing field: {}", e);
                CoordinatorResponse::error(e)
            }
        }
    }

    pub async fn handle_navigation(&mut self, event: NavigationEvent) -> LifecycleOutcome {
        if let NavigationEvent::Removed { .. } = event {
            return self.lifecycle.handle(event, "").await;
        }
        match self.store.target_origin().await {
            Ok(target) => self.lifecycle.handle(event, &target).await,
            Err(e) => {
                warn!("Navigation in tab {} abandoned: {}", event.tab_id(), e);
                LifecycleOutcome::Ignored
            }
        }
    }

    pub async fn toggle_capture(&mut self, tab: TabId, url: &str) -> Result<(), FieldmarkError> {
        let target = self.store.target_origin().await?;
        self.lifecycle.toggle_capture(tab, url, &target).await
    }

    fn system_prompt(&self, requested: &str) -> String {
        if requested.is_empty() {
            self.default_system_prompt.clone()
        } else {
            requested.to_string()
        }
    }

    // ============================================================
    // Event loop
    // ============================================================

    /// Start the event loop on a new task.
    pub fn spawn(self) -> CoordinatorHandle {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        tokio::spawn(self.run(rx));
        CoordinatorHandle { tx }
    }

    /// Process events until every handle is dropped.
    pub async fn run(mut self, mut events: mpsc::Receiver<CoordinatorEvent>) {
        let mut notifications = self.store.subscribe();
        info!("Coordinator started");

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    self.dispatch(event).await;
                }
                notification = notifications.recv() => {
                    match notification {
                        Ok(notification) => {
                            self.observers.broadcast(ObserverMessage::Store(notification));
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Observers missed {} store notifications", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        info!("Coordinator stopped");
    }

    async fn dispatch(&mut self, event: CoordinatorEvent) {
        match event {
            CoordinatorEvent::Request { request, reply } => {
                let response = self.handle_request(request).await;
                // The requester may have stopped waiting.
                let _ = reply.send(response);
            }
            CoordinatorEvent::Navigation(event) => {
                let outcome = self.handle_navigation(event).await;
                debug!("Navigation outcome: {:?}", outcome);
            }
            CoordinatorEvent::ToggleCapture { tab, url, reply } => {
                let result = self.toggle_capture(tab, &url).await;
                if let Err(e) = &result {
                    warn!("Toggle capture in tab {} failed: {}", tab, e);
                }
                let _ = reply.send(result);
            }
        }
    }
}

/// Sending side of a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordinatorEvent>,
}

impl CoordinatorHandle {
    pub async fn request(
        &self,
        request: CoordinatorRequest,
    ) -> Result<CoordinatorResponse, FieldmarkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CoordinatorEvent::Request { request, reply })
            .await
            .map_err(|_| FieldmarkError::Disconnected)?;
        rx.await.map_err(|_| FieldmarkError::Disconnected)
    }

    /// Queue a navigation event; the outcome is not reported back.
    pub async fn navigate(&self, event: NavigationEvent) -> Result<(), FieldmarkError> {
        self.tx
            .send(CoordinatorEvent::Navigation(event))
            .await
            .map_err(|_| FieldmarkError::Disconnected)
    }

    pub async fn toggle_capture(&self, tab: TabId, url: &str) -> Result<(), FieldmarkError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(CoordinatorEvent::ToggleCapture {
                tab,
                url: url.to_string(),
                reply,
            })
            .await
            .map_err(|_| FieldmarkError::Disconnected)?;
        rx.await.map_err(|_| FieldmarkError::Disconnected)?
    }
}

#[async_trait]
impl CoordinatorLink for CoordinatorHandle {
    async fn send_field_request(
        &self,
        request: FieldRequest,
    ) -> Result<CoordinatorResponse, FieldmarkError> {
        self.request(CoordinatorRequest::Field(request)).await
    }
}
