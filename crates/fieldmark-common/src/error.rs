use crate::protocol::TabId;

/// Error taxonomy shared by every fieldmark context.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldmarkError {
    // ============================================================
    // Store Errors
    // ============================================================
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid target origin: {0:?}")]
    InvalidOrigin(String),

    // ============================================================
    // Tab Errors
    // ============================================================
    #[error("No target origin configured")]
    TargetOriginNotSet,

    #[error("Tab {tab_id} is not on the target origin ({url})")]
    OffTarget { tab_id: TabId, url: String },

    #[error("Message delivery to tab {tab_id} failed: {reason}")]
    MessageDeliveryFailed { tab_id: TabId, reason: String },

    #[error("Injection into tab {tab_id} failed: {reason}")]
    InjectionFailed { tab_id: TabId, reason: String },

    // ============================================================
    // Session Errors
    // ============================================================
    #[error("Session creation failed: {0}")]
    SessionCreationFailed(String),

    #[error("Stream failed: {0}")]
    StreamFailure(String),

    // ============================================================
    // Channel Errors
    // ============================================================
    #[error("Coordinator disconnected")]
    Disconnected,
}

impl From<serde_json::Error> for FieldmarkError {
    fn from(err: serde_json::Error) -> Self {
        FieldmarkError::Serialization(err.to_string())
    }
}

impl FieldmarkError {
    /// Stable error code for wire responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            FieldmarkError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            FieldmarkError::Serialization(_) => "SERIALIZATION_ERROR",
            FieldmarkError::InvalidOrigin(_) => "INVALID_ORIGIN",
            FieldmarkError::TargetOriginNotSet => "TARGET_ORIGIN_NOT_SET",
            FieldmarkError::OffTarget { .. } => "OFF_TARGET",
            FieldmarkError::MessageDeliveryFailed { .. } => "MESSAGE_DELIVERY_FAILED",
            FieldmarkError::InjectionFailed { .. } => "INJECTION_FAILED",
            FieldmarkError::SessionCreationFailed(_) => "SESSION_CREATION_FAILED",
            FieldmarkError::StreamFailure(_) => "STREAM_FAILURE",
            FieldmarkError::Disconnected => "DISCONNECTED",
        }
    }

    /// Whether presence state for the addressed tab should be treated as stale.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(self, FieldmarkError::MessageDeliveryFailed { .. })
    }
}
