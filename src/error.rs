use thiserror::Error;

/// Failure of a call against the remote notification or session service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode service response: {0}")]
    Decode(String),

    #[error("invalid service url: {0}")]
    Url(#[from] url::ParseError),

    #[error("notification {0} not found")]
    NotFound(i64),
}

/// Client-side gating of the creation form. No service call is made when this fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("title is required")]
    MissingTitle,

    #[error("message is required")]
    MissingMessage,
}

#[derive(Debug, Error)]
pub enum CenterError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("action not available for notification {id}")]
    ActionUnavailable { id: i64 },
}

impl CenterError {
    /// Stable code used in the JSON envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CenterError::Form(FormError::MissingTitle) => "missing_title",
            CenterError::Form(FormError::MissingMessage) => "missing_message",
            CenterError::Service(_) => "notification_service_error",
            CenterError::ActionUnavailable { .. } => "action_unavailable",
        }
    }
}
