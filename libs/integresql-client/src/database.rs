//! Test database leases: `created -> opened -> {recreated | unlocked |
//! marked unmodified}`.
//!
//! A lease is opened against a finalized template and released in one of
//! three ways:
//! - [`Database::destroy`] recreates the database from the template and
//!   frees the slot, dropping whatever the test wrote;
//! - [`Database::free`] frees the slot and keeps the current content;
//! - [`Database::mark_unmodified`] tells the service the test wrote nothing.
//!
//! Releasing an already released lease is still sent to the service, which
//! answers with a not-found failure.

use std::fmt;
use std::ops::Deref;

use tracing::{debug, error, warn};

use crate::classify::Operation;
use crate::dispatch::{Dispatcher, Method};
use crate::error::{ClientError, ClientResult};
use crate::hash::TemplateHash;
use crate::models::DbInfo;

/// Client-side view of a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaseState {
    Created,
    Opened,
    Recreated,
    Unlocked,
    MarkedUnmodified,
}

impl LeaseState {
    /// True once any of the three release actions succeeded.
    pub fn is_released(&self) -> bool {
        matches!(
            self,
            LeaseState::Recreated | LeaseState::Unlocked | LeaseState::MarkedUnmodified
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            LeaseState::Created => "created",
            LeaseState::Opened => "opened",
            LeaseState::Recreated => "recreated",
            LeaseState::Unlocked => "unlocked",
            LeaseState::MarkedUnmodified => "marked unmodified",
        }
    }
}

impl fmt::Display for LeaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that names a leased test database.
pub trait LeaseId {
    /// The lease id, `None` when there is none (e.g. a template record).
    fn lease_id(&self) -> Option<i64>;
}

impl LeaseId for i64 {
    fn lease_id(&self) -> Option<i64> {
        Some(*self)
    }
}

impl LeaseId for Option<i64> {
    fn lease_id(&self) -> Option<i64> {
        *self
    }
}

impl LeaseId for DbInfo {
    fn lease_id(&self) -> Option<i64> {
        self.db_id
    }
}

impl<T: LeaseId + ?Sized> LeaseId for &T {
    fn lease_id(&self) -> Option<i64> {
        (**self).lease_id()
    }
}

#[derive(Debug, Clone, Copy)]
enum Release {
    Recreate,
    Unlock,
    MarkUnmodified,
}

impl Release {
    fn operation(self) -> Operation {
        match self {
            Release::Recreate => Operation::RecreateDatabase,
            Release::Unlock => Operation::UnlockDatabase,
            Release::MarkUnmodified => Operation::MarkUnmodified,
        }
    }

    fn request(self, hash: &TemplateHash, id: i64) -> (Method, String) {
        match self {
            Release::Recreate => (
                Method::POST,
                format!("/templates/{hash}/tests/{id}/recreate"),
            ),
            Release::Unlock => (Method::POST, format!("/templates/{hash}/tests/{id}/unlock")),
            Release::MarkUnmodified => (Method::DELETE, format!("/templates/{hash}/tests/{id}")),
        }
    }

    fn state(self) -> LeaseState {
        match self {
            Release::Recreate => LeaseState::Recreated,
            Release::Unlock => LeaseState::Unlocked,
            Release::MarkUnmodified => LeaseState::MarkedUnmodified,
        }
    }
}

/// Leases test databases cloned from one template.
#[derive(Debug)]
pub struct Database<'a> {
    dispatcher: &'a Dispatcher,
    hash: TemplateHash,
    state: LeaseState,
    record: Option<DbInfo>,
}

impl<'a> Database<'a> {
    pub fn new(dispatcher: &'a Dispatcher, hash: TemplateHash) -> Self {
        Self {
            dispatcher,
            hash,
            state: LeaseState::Created,
            record: None,
        }
    }

    pub fn hash(&self) -> &TemplateHash {
        &self.hash
    }

    pub fn state(&self) -> LeaseState {
        self.state
    }

    /// Record of the opened lease.
    pub fn record(&self) -> Option<&DbInfo> {
        self.record.as_ref()
    }

    /// Lease a test database.
    pub fn open(&mut self) -> ClientResult<DbInfo> {
        debug!(hash = %self.hash, state = %self.state, "database: open");
        if self.state != LeaseState::Created {
            return Err(ClientError::InvalidState {
                action: "open",
                state: self.state.as_str(),
            });
        }
        let path = format!("/templates/{}/tests", self.hash);
        let info = self
            .dispatcher
            .call::<()>(Operation::OpenDatabase, Method::GET, &path, None)?
            .into_record(Operation::OpenDatabase)?;
        self.record = Some(info.clone());
        self.state = LeaseState::Opened;
        Ok(info)
    }

    /// Recreate the database from the template and free the lease.
    pub fn destroy(&mut self, id: impl LeaseId) -> ClientResult<()> {
        self.release(Release::Recreate, id.lease_id())
    }

    /// Free the lease and keep the database content.
    pub fn free(&mut self, id: impl LeaseId) -> ClientResult<()> {
        self.release(Release::Unlock, id.lease_id())
    }

    /// Tell the service the test did not modify the database.
    pub fn mark_unmodified(&mut self, id: impl LeaseId) -> ClientResult<()> {
        self.release(Release::MarkUnmodified, id.lease_id())
    }

    /// Open a lease and return a guard that destroys it when released.
    pub fn enter(mut self) -> ClientResult<DatabaseGuard<'a>> {
        let record = self.open()?;
        Ok(DatabaseGuard {
            database: self,
            record,
            released: false,
        })
    }

    fn release(&mut self, mode: Release, id: Option<i64>) -> ClientResult<()> {
        let id = id.ok_or(ClientError::InvalidLeaseId)?;
        debug!(hash = %self.hash, id, ?mode, state = %self.state, "database: release");
        if self.state.is_released() && self.record.as_ref().and_then(|r| r.db_id) == Some(id) {
            warn!(hash = %self.hash, id, state = %self.state, "lease already released");
        }
        let (method, path) = mode.request(&self.hash, id);
        self.dispatcher
            .call::<()>(mode.operation(), method, &path, None)?;
        self.state = mode.state();
        Ok(())
    }
}

/// Scoped lease: owns the record and releases the lease exactly once.
///
/// Dropping the guard destroys (recreates) the database; call
/// [`free`](Self::free) or [`mark_unmodified`](Self::mark_unmodified) to
/// release it differently, or [`finish`](Self::finish) to see the error of
/// the default release.
#[derive(Debug)]
pub struct DatabaseGuard<'a> {
    database: Database<'a>,
    record: DbInfo,
    released: bool,
}

impl DatabaseGuard<'_> {
    pub fn record(&self) -> &DbInfo {
        &self.record
    }

    /// Destroy the lease now.
    pub fn finish(mut self) -> ClientResult<()> {
        self.release(Release::Recreate)
    }

    /// Free the lease, keeping the content.
    pub fn free(mut self) -> ClientResult<()> {
        self.release(Release::Unlock)
    }

    /// Release the lease as unmodified.
    pub fn mark_unmodified(mut self) -> ClientResult<()> {
        self.release(Release::MarkUnmodified)
    }

    fn release(&mut self, mode: Release) -> ClientResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.database.release(mode, self.record.db_id)
    }
}

impl Deref for DatabaseGuard<'_> {
    type Target = DbInfo;

    fn deref(&self) -> &DbInfo {
        &self.record
    }
}

impl Drop for DatabaseGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release(Release::Recreate) {
            error!(
                hash = %self.database.hash,
                id = ?self.record.db_id,
                ?err,
                "failed to destroy database on drop"
            );
        }
    }
}
