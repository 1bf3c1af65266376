//! # integresql-client
//!
//! Client for an IntegreSQL test-database pooling service.
//!
//! This library provides:
//! - **Template hashing** that turns one or more directories of migrations
//!   and fixtures into a stable [`TemplateHash`].
//! - **Status classification** as a table from (operation, HTTP status) to
//!   a typed outcome, see [`classify`].
//! - **Template lifecycle** with initialize/finalize/discard.
//! - **Database leases** with open and the three release modes
//!   (recreate, unlock, mark unmodified).
//! - **Scoped guards** that release templates and leases on every exit path.
//!
//! ## Design Principles
//!
//! - Fully synchronous; one blocking request per call, no retries.
//! - Every failure is typed so callers can decide whether to retry,
//!   see [`ClientError::is_retryable`].
//! - The HTTP transport sits behind the [`Transport`] trait.

pub mod classify;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod hash;
pub mod models;
pub mod session;
pub mod template;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenient access
pub use classify::{Failure, Operation, Reply, Rule};
pub use config::ClientConfig;
pub use database::{Database, DatabaseGuard, LeaseId, LeaseState};
pub use dispatch::{ApiRequest, ApiResponse, Dispatcher, HttpTransport, Transport};
pub use error::{ClientError, ClientResult, ErrorKind};
pub use hash::TemplateHash;
pub use models::DbInfo;
pub use session::IntegreSql;
pub use template::{InitOutcome, Template, TemplateGuard, TemplateState};
