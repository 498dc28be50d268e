//! Content-side runtime for one tab.
//!
//! A `ContentAgent` wraps the tab's `HighlightController`, reads persisted
//! marks from the shared store, answers agent instructions, and forwards
//! affordance activations to the coordinator.

use crate::config::CaptureConfig;
use crate::dom::{Document, NodeId};
use crate::highlight::{CaptureState, HighlightController, MarkSummary};
use crate::store::FieldStore;
use async_trait::async_trait;
use fieldmark_common::FieldmarkError;
use fieldmark_common::protocol::{AgentInstruction, CoordinatorResponse, FieldRequest};
use std::sync::Arc;
use tracing::{debug, warn};

/// The agent's route to the coordinator.
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
    async fn send_field_request(
        &self,
        request: FieldRequest,
    ) -> Result<CoordinatorResponse, FieldmarkError>;
}

pub struct ContentAgent {
    controller: HighlightController,
    store: FieldStore,
    link: Arc<dyn CoordinatorLink>,
}

impl ContentAgent {
    pub fn new(store: FieldStore, link: Arc<dyn CoordinatorLink>, config: &CaptureConfig) -> Self {
        Self {
            controller: HighlightController::new(config),
            store,
            link,
        }
    }

    pub fn controller(&self) -> &HighlightController {
        &self.controller
    }

    pub fn state(&self) -> CaptureState {
        self.controller.state()
    }

    /// Initial load: mark everything the profile already knows about.
    pub async fn start(&mut self, doc: &mut Document) -> Result<MarkSummary, FieldmarkError> {
        self.refresh(doc).await
    }

    /// Apply one instruction. Only `ping` produces a reply.
    pub async fn handle_instruction(
        &mut self,
        doc: &mut Document,
        instruction: AgentInstruction,
    ) -> Option<bool> {
        debug!("Agent instruction: {:?}", instruction);
        match instruction {
            AgentInstruction::StartFieldCapture => {
                self.controller.toggle(doc);
                None
            }
            AgentInstruction::Cleanup => {
                self.controller.cleanup(doc);
                None
            }
            AgentInstruction::RefreshHighlights => {
                if let Err(e) = self.refresh(doc).await {
                    warn!("Refresh abandoned: {}", e);
                }
                None
            }
            AgentInstruction::Ping => Some(true),
        }
    }

    /// Forward a click on an affordance button. Returns the coordinator's
    /// reply, or `None` when `button` is not one of ours.
    pub async fn activate(
        &mut self,
        doc: &mut Document,
        button: NodeId,
    ) -> Option<CoordinatorResponse> {
        let request = self.controller.activate(doc, button)?;
        match self.link.send_field_request(request).await {
            Ok(response) => {
                if let CoordinatorResponse::Error { error } = &response {
                    warn!("Field was not persisted: {}", error);
                }
                Some(response)
            }
            Err(e) => {
                warn!("Field request not delivered: {}", e);
                Some(CoordinatorResponse::error(e))
            }
        }
    }

    /// Rescan after DOM additions while capture mode is active.
    pub fn pump_mutations(&mut self, doc: &mut Document) -> usize {
        self.controller.process_mutations(doc)
    }

    async fn refresh(&mut self, doc: &mut Document) -> Result<MarkSummary, FieldmarkError> {
        let profile = self.store.get_profile().await?;
        let summary = self.controller.apply_persisted_marks(doc, &profile);
        if self.controller.is_capture_active() {
            self.controller.scan_for_candidates(doc);
        }
        Ok(summary)
    }
}
