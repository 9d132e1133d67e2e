/// Handshake-time credential failures. The only error class that is fatal
/// to a session.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential")]
    Missing,
    #[error("invalid credential: {0}")]
    Invalid(String),
    #[error("credential expired")]
    Expired,
    #[error("unknown user: {0}")]
    UnknownUser(String),
}

impl AuthError {
    /// Reason string sent in the close frame. Kept generic so clients cannot
    /// learn which users exist.
    pub fn close_reason(&self) -> &'static str {
        "Authentication failed"
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Invalid(_) => "invalid",
            Self::Expired => "expired",
            Self::UnknownUser(_) => "unknown_user",
        }
    }
}

/// Failure reported by an external collaborator (follower lookup, message
/// persistence). Absorbed by the dispatcher and session loop.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
}

/// Why an inbound frame was rejected. Never reported to the client.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("unknown frame type: {0}")]
    UnknownType(String),
    #[error("missing field `{field}` for `{frame_type}`")]
    MissingField {
        frame_type: &'static str,
        field: &'static str,
    },
}
