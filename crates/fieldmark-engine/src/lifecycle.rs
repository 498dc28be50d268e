//! Per-tab agent presence.
//!
//! The manager tracks which tabs are believed to host a live content agent
//! and reacts to navigation: refresh where present, inject on the target
//! origin, clean up when a tab leaves it.

use async_trait::async_trait;
use fieldmark_common::FieldmarkError;
use fieldmark_common::protocol::{AgentInstruction, NavigationEvent, TabId, url_matches_target};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Browser-side operations on a tab.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// Deliver an instruction to the tab's agent. Fails with
    /// `MessageDeliveryFailed` when no agent is listening.
    async fn send_instruction(
        &self,
        tab: TabId,
        instruction: AgentInstruction,
    ) -> Result<Option<bool>, FieldmarkError>;

    async fn insert_css(&self, tab: TabId, css: &str) -> Result<(), FieldmarkError>;

    async fn execute_script(&self, tab: TabId, file: &str) -> Result<(), FieldmarkError>;
}

/// Stylesheet and agent script, injected together, stylesheet first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetBundle {
    pub stylesheet: &'static str,
    pub script: &'static str,
}

impl Default for AssetBundle {
    fn default() -> Self {
        Self {
            stylesheet: fieldmark_assets::CONTENT_CSS,
            script: fieldmark_assets::AGENT_SCRIPT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabState {
    /// URL at which presence was established.
    pub url: String,
}

/// What a navigation event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// Nothing to do for this event.
    Ignored,
    /// The live agent was asked to refresh its marks.
    Refreshed,
    /// Assets were injected and presence recorded.
    Injected,
    /// Injection was attempted and failed; presence stays clear.
    InjectionFailed(FieldmarkError),
    /// The tab left the target origin; cleanup was sent.
    CleanedUp,
    /// The tab closed.
    Forgotten,
}

pub struct TabLifecycleManager {
    host: Arc<dyn TabHost>,
    assets: AssetBundle,
    tabs: HashMap<TabId, TabState>,
}

impl TabLifecycleManager {
    pub fn new(host: Arc<dyn TabHost>) -> Self {
        Self::with_assets(host, AssetBundle::default())
    }

    pub fn with_assets(host: Arc<dyn TabHost>, assets: AssetBundle) -> Self {
        Self {
            host,
            assets,
            tabs: HashMap::new(),
        }
    }

    pub fn has_agent(&self, tab: TabId) -> bool {
        self.tabs.contains_key(&tab)
    }

    pub fn tab_state(&self, tab: TabId) -> Option<&TabState> {
        self.tabs.get(&tab)
    }

    pub fn tracked_tabs(&self) -> usize {
        self.tabs.len()
    }

    /// React to one navigation event given the current target origin.
    pub async fn handle(&mut self, event: NavigationEvent, target_origin: &str) -> LifecycleOutcome {
        match event {
            NavigationEvent::Complete {
                tab_id,
                url: Some(url),
            } => self.on_complete(tab_id, &url, target_origin).await,
            NavigationEvent::Loading {
                tab_id,
                url: Some(url),
            } if !target_origin.is_empty() && !url_matches_target(target_origin, &url) => {
                self.on_leave(tab_id).await
            }
            NavigationEvent::Removed { tab_id } => {
                if self.tabs.remove(&tab_id).is_some() {
                    debug!("Tab {} closed", tab_id);
                }
                LifecycleOutcome::Forgotten
            }
            _ => LifecycleOutcome::Ignored,
        }
    }

    async fn on_complete(&mut self, tab: TabId, url: &str, target_origin: &str) -> LifecycleOutcome {
        if self.tabs.contains_key(&tab) {
            match self
                .host
                .send_instruction(tab, AgentInstruction::RefreshHighlights)
                .await
            {
                Ok(_) => return LifecycleOutcome::Refreshed,
                Err(e) => {
                    // Presence was stale; the page reloaded without the agent.
                    debug!("Refresh in tab {} failed: {}", tab, e);
                    self.tabs.remove(&tab);
                }
            }
        }

        if !url_matches_target(target_origin, url) {
            return LifecycleOutcome::Ignored;
        }
        match self.inject(tab, url).await {
            Ok(()) => LifecycleOutcome::Injected,
            Err(e) => LifecycleOutcome::InjectionFailed(e),
        }
    }

    async fn on_leave(&mut self, tab: TabId) -> LifecycleOutcome {
        // Best effort: the agent may already be gone.
        if let Err(e) = self
            .host
            .send_instruction(tab, AgentInstruction::Cleanup)
            .await
        {
            debug!("Cleanup in tab {} not delivered: {}", tab, e);
        }
        self.tabs.remove(&tab);
        LifecycleOutcome::CleanedUp
    }

    async fn inject(&mut self, tab: TabId, url: &str) -> Result<(), FieldmarkError> {
        let result = match self.host.insert_css(tab, self.assets.stylesheet).await {
            Ok(()) => self.host.execute_script(tab, self.assets.script).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("Injected agent into tab {} ({})", tab, url);
                self.tabs.insert(
                    tab,
                    TabState {
                        url: url.to_string(),
                    },
                );
                Ok(())
            }
            Err(e) => {
                warn!("Injection into tab {} failed: {}", tab, e);
                Err(e)
            }
        }
    }

    /// Make sure the tab on `url` has a live agent, injecting if a ping
    /// goes unanswered.
    pub async fn ensure_agent(
        &mut self,
        tab: TabId,
        url: &str,
        target_origin: &str,
    ) -> Result<(), FieldmarkError> {
        if target_origin.is_empty() {
            return Err(FieldmarkError::TargetOriginNotSet);
        }
        if !url_matches_target(target_origin, url) {
            return Err(FieldmarkError::OffTarget {
                tab_id: tab,
                url: url.to_string(),
            });
        }

        match self.host.send_instruction(tab, AgentInstruction::Ping).await {
            Ok(Some(true)) => {
                self.tabs.entry(tab).or_insert_with(|| TabState {
                    url: url.to_string(),
                });
                Ok(())
            }
            Ok(_) | Err(_) => {
                debug!("No agent answered in tab {}, injecting", tab);
                self.tabs.remove(&tab);
                self.inject(tab, url).await
            }
        }
    }

    /// Ensure an agent, then toggle its capture mode.
    pub async fn toggle_capture(
        &mut self,
        tab: TabId,
        url: &str,
        target_origin: &str,
    ) -> Result<(), FieldmarkError> {
        self.ensure_agent(tab, url, target_origin).await?;
        self.host
            .send_instruction(tab, AgentInstruction::StartFieldCapture)
            .await
            .map(|_| ())
    }
}
