//! Error types for Mailblast

use std::fmt;
use thiserror::Error;

/// Main error type for Mailblast
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The remote service answered with `success = false`.
    #[error("Remote service rejected the request: {message}")]
    RemoteRejection {
        message: String,
        hint: Option<String>,
    },

    /// The remote call could not be completed. Nothing is known about its outcome.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Submitted recipients that have no result in the dispatch response.
    #[error("Dispatch response has no result for {} submitted recipient(s)", .missing.len())]
    ReconciliationAnomaly { missing: Vec<String> },

    #[error("Action {action} is not valid in stage {stage}")]
    InvalidTransition {
        stage: &'static str,
        action: &'static str,
    },

    #[error("A dispatch for this campaign is already in flight")]
    DispatchInFlight,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Mailblast
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::RemoteRejection { .. } => "REMOTE_REJECTION",
            Error::Transport(_) => "TRANSPORT_ERROR",
            Error::ReconciliationAnomaly { .. } => "RECONCILIATION_ANOMALY",
            Error::InvalidTransition { .. } => "INVALID_TRANSITION",
            Error::DispatchInFlight => "DISPATCH_IN_FLIGHT",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Remediation hint supplied by the remote service, if any
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::RemoteRejection { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Whether the whole batch outcome is unknown and may be resubmitted as is
    pub fn outcome_unknown(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Whether the workflow state is left exactly as it was before the failed
    /// action. Every failure returns control to the current stage.
    pub fn is_state_preserving(&self) -> bool {
        true
    }
}

/// Local validation failures. These never partially apply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing or invalid fields: {}", join_issues(.0))]
    MissingFields(Vec<FieldIssue>),

    #[error("recipient {0} already exists")]
    DuplicateRecipient(String),

    #[error("recipient {0} not found")]
    RecipientNotFound(String),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("{0} name must not be empty")]
    EmptyName(&'static str),

    #[error("recipient set is empty")]
    EmptyRecipientSet,
}

impl ValidationError {
    /// Field issues carried by a `MissingFields` error
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            ValidationError::MissingFields(issues) => issues,
            _ => &[],
        }
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Campaign fields that validation can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigField {
    Host,
    Port,
    SenderAddress,
    Credential,
    Subject,
    Body,
    Recipients,
}

impl ConfigField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigField::Host => "host",
            ConfigField::Port => "port",
            ConfigField::SenderAddress => "sender_address",
            ConfigField::Credential => "credential",
            ConfigField::Subject => "subject",
            ConfigField::Body => "body",
            ConfigField::Recipients => "recipients",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IssueKind {
    Missing,
    Invalid,
}

/// A single problem found by configuration validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldIssue {
    pub field: ConfigField,
    pub kind: IssueKind,
}

impl FieldIssue {
    pub fn missing(field: ConfigField) -> Self {
        Self {
            field,
            kind: IssueKind::Missing,
        }
    }

    pub fn invalid(field: ConfigField) -> Self {
        Self {
            field,
            kind: IssueKind::Invalid,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IssueKind::Missing => write!(f, "{} (missing)", self.field),
            IssueKind::Invalid => write!(f, "{} (invalid)", self.field),
        }
    }
}
