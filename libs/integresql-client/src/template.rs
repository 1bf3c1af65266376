//! Template lifecycle: `created -> initialized -> {finalized | discarded}`.
//!
//! [`Template::initialize`] registers the template hash with the service.
//! Either this caller wins the registration and gets the template database
//! to populate ([`InitOutcome::Registered`]), or another caller is already
//! populating it ([`InitOutcome::AlreadyRegistering`]). Both count as
//! initialized. [`Template::enter`] wraps the handshake in a guard that
//! finalizes on every exit path.

use std::fmt;

use tracing::{debug, error};

use crate::classify::{Operation, Reply};
use crate::database::Database;
use crate::dispatch::{Dispatcher, Method};
use crate::error::{ClientError, ClientResult};
use crate::hash::TemplateHash;
use crate::models::{DbInfo, RegisterTemplate};

/// Client-side view of a template's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateState {
    Created,
    Initialized,
    Finalized,
    Discarded,
}

impl fmt::Display for TemplateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TemplateState {
    fn as_str(self) -> &'static str {
        match self {
            TemplateState::Created => "created",
            TemplateState::Initialized => "initialized",
            TemplateState::Finalized => "finalized",
            TemplateState::Discarded => "discarded",
        }
    }
}

/// Result of [`Template::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// This caller registered the template and must populate it.
    Registered(DbInfo),
    /// Someone else is registering the template; nothing to populate.
    AlreadyRegistering,
}

impl InitOutcome {
    pub fn record(&self) -> Option<&DbInfo> {
        match self {
            InitOutcome::Registered(info) => Some(info),
            InitOutcome::AlreadyRegistering => None,
        }
    }
}

/// Drives one template hash through initialize/finalize/discard.
#[derive(Debug)]
pub struct Template<'a> {
    dispatcher: &'a Dispatcher,
    hash: TemplateHash,
    state: TemplateState,
    record: Option<DbInfo>,
}

impl<'a> Template<'a> {
    pub fn new(dispatcher: &'a Dispatcher, hash: TemplateHash) -> Self {
        Self {
            dispatcher,
            hash,
            state: TemplateState::Created,
            record: None,
        }
    }

    pub fn hash(&self) -> &TemplateHash {
        &self.hash
    }

    pub fn state(&self) -> TemplateState {
        self.state
    }

    /// The template database record, if this caller registered it.
    pub fn record(&self) -> Option<&DbInfo> {
        self.record.as_ref()
    }

    /// Register the template with the service.
    pub fn initialize(&mut self) -> ClientResult<InitOutcome> {
        debug!(hash = %self.hash, state = %self.state, "template: initialize");
        if self.state != TemplateState::Created {
            return Err(self.invalid("initialize"));
        }
        let body = RegisterTemplate {
            hash: self.hash.as_str(),
        };
        let outcome = match self.dispatcher.call(
            Operation::InitializeTemplate,
            Method::POST,
            "/templates",
            Some(&body),
        )? {
            Reply::AlreadyRegistering => InitOutcome::AlreadyRegistering,
            other => InitOutcome::Registered(other.into_record(Operation::InitializeTemplate)?),
        };
        self.record = outcome.record().cloned();
        self.state = TemplateState::Initialized;
        Ok(outcome)
    }

    /// Mark the template ready for test databases.
    pub fn finalize(&mut self) -> ClientResult<()> {
        debug!(hash = %self.hash, state = %self.state, "template: finalize");
        if self.state != TemplateState::Initialized {
            return Err(self.invalid("finalize"));
        }
        finalize_template(self.dispatcher, &self.hash)?;
        self.state = TemplateState::Finalized;
        Ok(())
    }

    /// Drop the server-side registration; valid from any state.
    pub fn discard(&mut self) -> ClientResult<()> {
        debug!(hash = %self.hash, state = %self.state, "template: discard");
        discard_template(self.dispatcher, &self.hash)?;
        self.state = TemplateState::Discarded;
        self.record = None;
        Ok(())
    }

    /// A lease handle for test databases cloned from this template.
    pub fn database(&self) -> Database<'a> {
        Database::new(self.dispatcher, self.hash.clone())
    }

    /// Initialize and return a guard that finalizes when released.
    pub fn enter(mut self) -> ClientResult<TemplateGuard<'a>> {
        self.initialize()?;
        Ok(TemplateGuard {
            template: self,
            released: false,
        })
    }

    fn invalid(&self, action: &'static str) -> ClientError {
        ClientError::InvalidState {
            action,
            state: self.state.as_str(),
        }
    }
}

pub(crate) fn finalize_template(dispatcher: &Dispatcher, hash: &TemplateHash) -> ClientResult<()> {
    let path = format!("/templates/{hash}");
    dispatcher
        .call::<()>(Operation::FinalizeTemplate, Method::PUT, &path, None)
        .map(|_| ())
}

pub(crate) fn discard_template(dispatcher: &Dispatcher, hash: &TemplateHash) -> ClientResult<()> {
    let path = format!("/templates/{hash}");
    dispatcher
        .call::<()>(Operation::DiscardTemplate, Method::DELETE, &path, None)
        .map(|_| ())
}

/// Scoped initialize/finalize handshake.
///
/// [`finish`](Self::finish) (or drop) finalizes the template exactly once,
/// whether this caller registered it or found it already registering.
#[derive(Debug)]
pub struct TemplateGuard<'a> {
    template: Template<'a>,
    released: bool,
}

impl<'a> TemplateGuard<'a> {
    /// Template database to populate, `None` if another caller owns it.
    pub fn record(&self) -> Option<&DbInfo> {
        self.template.record()
    }

    pub fn needs_population(&self) -> bool {
        self.template.record().is_some()
    }

    pub fn hash(&self) -> &TemplateHash {
        self.template.hash()
    }

    /// Finalize and hand the template back.
    pub fn finish(mut self) -> ClientResult<Template<'a>> {
        self.release()?;
        let template = Template {
            dispatcher: self.template.dispatcher,
            hash: self.template.hash.clone(),
            state: self.template.state,
            record: self.template.record.take(),
        };
        Ok(template)
    }

    /// Discard instead of finalizing, e.g. after a failed population.
    pub fn discard(mut self) -> ClientResult<()> {
        self.released = true;
        self.template.discard()
    }

    fn release(&mut self) -> ClientResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.template.finalize()
    }
}

impl Drop for TemplateGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            error!(hash = %self.template.hash, ?err, "failed to finalize template on drop");
        }
    }
}
