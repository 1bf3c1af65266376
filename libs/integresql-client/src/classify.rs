//! Status classification for every remote operation.
//!
//! Each [`Operation`] owns a static table of `(status, Rule)` pairs. The
//! table is the only place where HTTP status codes are interpreted; a status
//! missing from an operation's table becomes
//! [`ClientError::UnexpectedStatus`] carrying the raw status and body.

use std::fmt;

use crate::error::{ClientError, ClientResult};
use crate::models::{self, DbInfo};

const OK: u16 = 200;
const NO_CONTENT: u16 = 204;
const BAD_REQUEST: u16 = 400;
const NOT_FOUND: u16 = 404;
const GONE: u16 = 410;
const LOCKED: u16 = 423;
const SERVICE_UNAVAILABLE: u16 = 503;

/// A remote operation understood by the pooling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InitializeTemplate,
    FinalizeTemplate,
    DiscardTemplate,
    OpenDatabase,
    RecreateDatabase,
    UnlockDatabase,
    MarkUnmodified,
    ResetAllTracking,
}

/// Documented failure states, one per semantic [`ClientError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
    TemplateNotFound,
    TemplateDiscarded,
    LeaseNotFound,
    BadLeaseId,
    LeaseInUse,
    ServiceNotReady,
}

/// What a status code means for a given operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    /// Success carrying a database record in the body.
    Record,
    /// Success with no payload.
    Done,
    /// Another caller is already initializing the template.
    AlreadyRegistering,
    /// Documented failure.
    Fail(Failure),
}

/// Classified non-failure response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Record(DbInfo),
    Done,
    AlreadyRegistering,
}

impl Reply {
    /// The database record of a `Record` reply.
    ///
    /// Any other reply means the body carried no record and is reported
    /// as a decode error for `operation`.
    pub fn into_record(self, operation: Operation) -> ClientResult<DbInfo> {
        match self {
            Reply::Record(info) => Ok(info),
            other => Err(ClientError::Decode {
                operation,
                source: serde::de::Error::custom(format!(
                    "expected a database record, got {other:?}"
                )),
            }),
        }
    }
}

const INITIALIZE_RULES: &[(u16, Rule)] = &[
    (OK, Rule::Record),
    (LOCKED, Rule::AlreadyRegistering),
    (SERVICE_UNAVAILABLE, Rule::Fail(Failure::ServiceNotReady)),
];

const TEMPLATE_RULES: &[(u16, Rule)] = &[
    (NO_CONTENT, Rule::Done),
    (NOT_FOUND, Rule::Fail(Failure::TemplateNotFound)),
    (SERVICE_UNAVAILABLE, Rule::Fail(Failure::ServiceNotReady)),
];

const OPEN_RULES: &[(u16, Rule)] = &[
    (OK, Rule::Record),
    (NOT_FOUND, Rule::Fail(Failure::TemplateNotFound)),
    (GONE, Rule::Fail(Failure::TemplateDiscarded)),
    (SERVICE_UNAVAILABLE, Rule::Fail(Failure::ServiceNotReady)),
];

const RELEASE_RULES: &[(u16, Rule)] = &[
    (NO_CONTENT, Rule::Done),
    (NOT_FOUND, Rule::Fail(Failure::LeaseNotFound)),
    (BAD_REQUEST, Rule::Fail(Failure::BadLeaseId)),
    (LOCKED, Rule::Fail(Failure::LeaseInUse)),
    (SERVICE_UNAVAILABLE, Rule::Fail(Failure::ServiceNotReady)),
];

const RESET_RULES: &[(u16, Rule)] = &[(NO_CONTENT, Rule::Done)];

impl Operation {
    /// Every operation, in table order.
    pub const ALL: [Operation; 8] = [
        Operation::InitializeTemplate,
        Operation::FinalizeTemplate,
        Operation::DiscardTemplate,
        Operation::OpenDatabase,
        Operation::RecreateDatabase,
        Operation::UnlockDatabase,
        Operation::MarkUnmodified,
        Operation::ResetAllTracking,
    ];

    /// The full status table of this operation.
    pub fn rules(self) -> &'static [(u16, Rule)] {
        match self {
            Operation::InitializeTemplate => INITIALIZE_RULES,
            Operation::FinalizeTemplate
            | Operation::DiscardTemplate
            | Operation::MarkUnmodified => TEMPLATE_RULES,
            Operation::OpenDatabase => OPEN_RULES,
            Operation::RecreateDatabase | Operation::UnlockDatabase => RELEASE_RULES,
            Operation::ResetAllTracking => RESET_RULES,
        }
    }

    /// Rule for `status`, or `None` when the status is not documented.
    pub fn rule(self, status: u16) -> Option<Rule> {
        self.rules()
            .iter()
            .find(|(code, _)| *code == status)
            .map(|(_, rule)| *rule)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::InitializeTemplate => "initialize template",
            Operation::FinalizeTemplate => "finalize template",
            Operation::DiscardTemplate => "discard template",
            Operation::OpenDatabase => "open database",
            Operation::RecreateDatabase => "recreate database",
            Operation::UnlockDatabase => "unlock database",
            Operation::MarkUnmodified => "mark database unmodified",
            Operation::ResetAllTracking => "reset all tracking",
        };
        f.write_str(name)
    }
}

impl Failure {
    /// Build the error for this failure; `body` is kept where it is useful.
    pub fn into_error(self, body: &str) -> ClientError {
        match self {
            Failure::TemplateNotFound => ClientError::TemplateNotFound,
            Failure::TemplateDiscarded => ClientError::TemplateDiscarded,
            Failure::LeaseNotFound => ClientError::LeaseNotFound {
                body: body.to_owned(),
            },
            Failure::BadLeaseId => ClientError::BadLeaseId,
            Failure::LeaseInUse => ClientError::LeaseInUse,
            Failure::ServiceNotReady => ClientError::ServiceNotReady,
        }
    }
}

/// Classify a response to `operation`.
///
/// Pure: no I/O, only the table above and body decoding for
/// [`Rule::Record`].
pub fn classify(operation: Operation, status: u16, body: &str) -> ClientResult<Reply> {
    match operation.rule(status) {
        Some(Rule::Record) => models::decode(body)
            .map(Reply::Record)
            .map_err(|source| ClientError::Decode { operation, source }),
        Some(Rule::Done) => Ok(Reply::Done),
        Some(Rule::AlreadyRegistering) => Ok(Reply::AlreadyRegistering),
        Some(Rule::Fail(failure)) => Err(failure.into_error(body)),
        None => Err(ClientError::UnexpectedStatus {
            operation,
            status,
            body: body.to_owned(),
        }),
    }
}
