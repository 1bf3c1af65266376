//! Error types for IntegreSQL client operations.
//!
//! Every failure a caller can see is one variant of [`ClientError`], so
//! precondition mistakes, transport failures, documented service states and
//! unexpected statuses can be matched exhaustively instead of parsed from
//! messages.

use std::path::PathBuf;

use thiserror::Error;

use crate::classify::Operation;

/// Boxed transport failure, kept as-is from the transport implementation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for the integresql-client crate.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The session has no template hash; set one before creating a
    /// template or database handle.
    #[error("no template hash set on the session")]
    MissingTemplateHash,

    /// A template hash string is empty or not safe to embed in a URL path.
    #[error("invalid template hash {0:?}")]
    InvalidTemplateHash(String),

    /// A template directory does not exist or is not a directory.
    #[error("invalid template path {}: {reason}", path.display())]
    InvalidTemplatePath { path: PathBuf, reason: &'static str },

    /// Reading a template file failed while hashing.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The lease has no usable id (e.g. a template record passed as a lease).
    #[error("invalid database id")]
    InvalidLeaseId,

    /// A lifecycle method was called from a state that does not allow it.
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    /// Connection, DNS, TLS or timeout failure below HTTP.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// A request body could not be serialized to JSON.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// A success response carried a body that is not a database record.
    #[error("failed to decode {operation} response: {source}")]
    Decode {
        operation: Operation,
        #[source]
        source: serde_json::Error,
    },

    /// The template is not registered with the service.
    #[error("template not found")]
    TemplateNotFound,

    /// The template was discarded while databases were being requested.
    #[error("template discarded")]
    TemplateDiscarded,

    /// The test database lease is not known to the service.
    #[error("database not found: {body}")]
    LeaseNotFound { body: String },

    /// The service rejected the lease id.
    #[error("bad database id")]
    BadLeaseId,

    /// The test database is still locked by a lease.
    #[error("database in use")]
    LeaseInUse,

    /// The pool manager is not ready yet.
    #[error("manager not ready")]
    ServiceNotReady,

    /// A status code the operation does not document.
    #[error("{operation}: received unexpected HTTP status {status}: {body}")]
    UnexpectedStatus {
        operation: Operation,
        status: u16,
        body: String,
    },
}

/// Coarse error category, one per row of the client error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised before any network call.
    Precondition,
    /// The request did not complete at the HTTP level.
    Transport,
    /// The service answered with a documented failure status.
    Semantic,
    /// The service answered with something no rule covers.
    Unexpected,
}

impl ClientError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::MissingTemplateHash
            | ClientError::InvalidTemplateHash(_)
            | ClientError::InvalidTemplatePath { .. }
            | ClientError::Io { .. }
            | ClientError::InvalidLeaseId
            | ClientError::InvalidState { .. } => ErrorKind::Precondition,
            ClientError::Transport(_) => ErrorKind::Transport,
            ClientError::TemplateNotFound
            | ClientError::TemplateDiscarded
            | ClientError::LeaseNotFound { .. }
            | ClientError::BadLeaseId
            | ClientError::LeaseInUse
            | ClientError::ServiceNotReady => ErrorKind::Semantic,
            ClientError::Encode(_)
            | ClientError::Decode { .. }
            | ClientError::UnexpectedStatus { .. } => ErrorKind::Unexpected,
        }
    }

    /// Returns true if this error indicates a transient failure that may
    /// succeed on retry (transport or manager not ready).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport(_) | ClientError::ServiceNotReady
        )
    }

    /// Returns true for template-not-found and lease-not-found.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::TemplateNotFound | ClientError::LeaseNotFound { .. }
        )
    }

    /// HTTP status behind this error, when it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::TemplateNotFound | ClientError::LeaseNotFound { .. } => Some(404),
            ClientError::TemplateDiscarded => Some(410),
            ClientError::BadLeaseId => Some(400),
            ClientError::LeaseInUse => Some(423),
            ClientError::ServiceNotReady => Some(503),
            ClientError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Shorthand result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
