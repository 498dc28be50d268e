use serde::{Deserialize, Serialize};

/// Browser tab identifier as handed out by the host browser.
pub type TabId = u32;

/// Durable store keys.
pub const TARGET_URL_KEY: &str = "targetUrl";
pub const CAPTURED_FIELDS_KEY: &str = "capturedFields";
pub const IGNORED_FIELDS_KEY: &str = "ignoredFields";

/// Persisted identity of a captured or ignored form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(default)]
    pub label: String,
    pub identifier: String,
    #[serde(rename = "type")]
    pub field_type: String, // "input-email", "select-one", "textarea", ...
}

impl FieldDescriptor {
    pub fn new(
        label: impl Into<String>,
        identifier: impl Into<String>,
        field_type: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            identifier: identifier.into(),
            field_type: field_type.into(),
        }
    }
}

/// The single per-installation profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "targetUrl", default)]
    pub target_origin: String,
    #[serde(rename = "capturedFields", default)]
    pub captured: Vec<FieldDescriptor>,
    #[serde(rename = "ignoredFields", default)]
    pub ignored: Vec<FieldDescriptor>,
}

impl Profile {
    /// Prefix admission check against the configured target origin.
    /// An unset origin matches nothing.
    pub fn matches_target(&self, url: &str) -> bool {
        url_matches_target(&self.target_origin, url)
    }
}

/// Prefix admission check: whether `url` belongs to `target_origin`.
pub fn url_matches_target(target_origin: &str, url: &str) -> bool {
    !target_origin.is_empty() && url.starts_with(target_origin)
}

/// Normalize a page URL to its origin (`scheme://host[:port]`).
///
/// Returns `None` for unparseable URLs and for opaque origins such as
/// `about:blank` or `data:` URLs.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(origin.ascii_serialization())
}

// ============================================================
// Requests addressed to the coordinator
// ============================================================

/// Any request the coordinator accepts. Session requests are tagged by
/// `type`, field requests by `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinatorRequest {
    Session(SessionRequest),
    Field(FieldRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionRequest {
    CreateSession(CreateSessionRequest),
    SendMessage(SendMessageRequest),
    CheckSession(CheckSessionRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub message: String,
    #[serde(default)]
    pub system_prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CheckSessionRequest {}

/// Field persistence requests sent by a content agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum FieldRequest {
    CaptureField(FieldInfoRequest),
    IgnoreField(FieldInfoRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfoRequest {
    pub field_info: FieldDescriptor,
}

impl FieldRequest {
    pub fn capture(field_info: FieldDescriptor) -> Self {
        FieldRequest::CaptureField(FieldInfoRequest { field_info })
    }

    pub fn ignore(field_info: FieldDescriptor) -> Self {
        FieldRequest::IgnoreField(FieldInfoRequest { field_info })
    }

    pub fn field_info(&self) -> &FieldDescriptor {
        match self {
            FieldRequest::CaptureField(req) | FieldRequest::IgnoreField(req) => &req.field_info,
        }
    }
}

/// Replies produced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinatorResponse {
    Started {
        started: bool,
        #[serde(rename = "responseId")]
        response_id: String,
    },
    SessionStatus {
        #[serde(rename = "hasSession")]
        has_session: bool,
    },
    Success {
        success: bool,
    },
    Error {
        error: String,
    },
}

impl CoordinatorResponse {
    pub fn ok() -> Self {
        CoordinatorResponse::Success { success: true }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        CoordinatorResponse::Error {
            error: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CoordinatorResponse::Error { .. })
    }
}

// ============================================================
// Instructions addressed to a tab's content agent
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AgentInstruction {
    /// Toggle capture mode on or off.
    StartFieldCapture,
    /// Force Idle and strip unconfirmed decoration.
    Cleanup,
    /// Re-apply persisted marks (and rescan while capturing).
    RefreshHighlights,
    /// Liveness check.
    Ping,
}

// ============================================================
// Broadcasts delivered to observer channels
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamEvent {
    StreamChunk {
        chunk: String,
        #[serde(rename = "responseId")]
        response_id: String,
    },
    StreamEnd {
        #[serde(rename = "responseId")]
        response_id: String,
    },
    StreamError {
        error: String,
        #[serde(rename = "responseId")]
        response_id: String,
    },
}

impl StreamEvent {
    pub fn response_id(&self) -> &str {
        match self {
            StreamEvent::StreamChunk { response_id, .. }
            | StreamEvent::StreamEnd { response_id }
            | StreamEvent::StreamError { response_id, .. } => response_id,
        }
    }

    /// `STREAM_END` and `STREAM_ERROR` close a response.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::StreamChunk { .. })
    }
}

/// Published after every successful store mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum StoreNotification {
    FieldCaptured,
    FieldIgnored,
    CapturedFieldDeleted { index: usize },
    IgnoredFieldDeleted { index: usize },
    TargetOriginChanged,
    ProfileReset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObserverMessage {
    Stream(StreamEvent),
    Store(StoreNotification),
}

// ============================================================
// Navigation events reported by the host browser
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum NavigationEvent {
    /// The tab started loading `url`.
    Loading {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    /// The tab finished loading `url`.
    Complete {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    /// The tab was closed.
    Removed {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
}

impl NavigationEvent {
    pub fn tab_id(&self) -> TabId {
        match self {
            NavigationEvent::Loading { tab_id, .. }
            | NavigationEvent::Complete { tab_id, .. }
            | NavigationEvent::Removed { tab_id } => *tab_id,
        }
    }
}
