//! Client session: transport, configuration and the active template hash.

use std::path::Path;

use tracing::{debug, error};

use crate::classify::Operation;
use crate::config::ClientConfig;
use crate::database::Database;
use crate::dispatch::{Dispatcher, HttpTransport, Method, Transport};
use crate::error::{ClientError, ClientResult};
use crate::hash::TemplateHash;
use crate::models::DbInfo;
use crate::template::{self, Template};

/// Entry point for talking to IntegreSQL.
///
/// Holds the transport and the template hash used by [`template`] and
/// [`database`]. The hash can be replaced at any time; handles already
/// created keep the hash they were created with.
///
/// [`template`]: IntegreSql::template
/// [`database`]: IntegreSql::database
#[derive(Debug)]
pub struct IntegreSql {
    config: ClientConfig,
    dispatcher: Dispatcher,
    template_hash: Option<TemplateHash>,
}

impl IntegreSql {
    /// Create a session over a new HTTP transport.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        Ok(Self::with_transport(config, Box::new(HttpTransport::new()?)))
    }

    /// Create a session configured from the environment.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Create a session over a custom transport.
    pub fn with_transport(config: ClientConfig, transport: Box<dyn Transport>) -> Self {
        debug!(base_url = %config.base_url, api_version = %config.api_version, "creating session");
        let dispatcher = Dispatcher::new(&config, transport);
        Self {
            config,
            dispatcher,
            template_hash: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn template_hash(&self) -> Option<&TemplateHash> {
        self.template_hash.as_ref()
    }

    /// Use `hash` for subsequent template and database handles.
    pub fn set_template_hash(&mut self, hash: TemplateHash) {
        debug!(%hash, "session template hash set");
        self.template_hash = Some(hash);
    }

    /// Hash `dirs` and use the result for subsequent handles.
    ///
    /// On error the previous hash is kept.
    pub fn set_template_dirs<I, P>(&mut self, dirs: I) -> ClientResult<&TemplateHash>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let hash = TemplateHash::from_dirs(dirs)?;
        debug!(%hash, "session template hash set");
        Ok(&*self.template_hash.insert(hash))
    }

    fn require_hash(&self) -> ClientResult<TemplateHash> {
        self.template_hash
            .clone()
            .ok_or(ClientError::MissingTemplateHash)
    }

    /// Template lifecycle handle for the current hash.
    pub fn template(&self) -> ClientResult<Template<'_>> {
        Ok(Template::new(&self.dispatcher, self.require_hash()?))
    }

    /// Database lease handle for the current hash.
    pub fn database(&self) -> ClientResult<Database<'_>> {
        Ok(Database::new(&self.dispatcher, self.require_hash()?))
    }

    /// Finalize a template by hash, e.g. one registered by another process.
    ///
    /// Skips the local lifecycle check of [`Template::finalize`].
    pub fn finalize_template(&self, hash: &TemplateHash) -> ClientResult<()> {
        debug!(%hash, "finalize template");
        template::finalize_template(&self.dispatcher, hash)
    }

    /// Discard any template by hash.
    pub fn discard_template(&self, hash: &TemplateHash) -> ClientResult<()> {
        debug!(%hash, "discard template");
        template::discard_template(&self.dispatcher, hash)
    }

    /// Drop all templates and test databases tracked by the service.
    pub fn reset_all_tracking(&self) -> ClientResult<()> {
        debug!("reset all tracking");
        self.dispatcher
            .call::<()>(
                Operation::ResetAllTracking,
                Method::DELETE,
                "/admin/templates",
                None,
            )
            .map(|_| ())
    }

    /// Initialize the template, run `populate`, then finalize.
    ///
    /// `populate` gets the template database when this caller registered the
    /// template and `None` when another caller is populating it. The
    /// template is finalized in both cases, whether `populate` succeeds or
    /// fails; an error
    /// from `populate` wins over one from finalizing.
    pub fn with_template<T, E, F>(&self, populate: F) -> Result<T, E>
    where
        F: FnOnce(Option<&DbInfo>) -> Result<T, E>,
        E: From<ClientError>,
    {
        let guard = self.template()?.enter()?;
        let hash = guard.hash().clone();
        let result = populate(guard.record());
        match (result, guard.finish()) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), finished) => {
                if let Err(finalize_err) = finished {
                    error!(%hash, ?finalize_err, "failed to finalize template after error");
                }
                Err(err)
            }
        }
    }

    /// Lease a test database, run `test`, then destroy the lease.
    ///
    /// The lease is destroyed whether `test` succeeds or fails; an error
    /// from `test` wins over one from the release.
    pub fn with_database<T, E, F>(&self, test: F) -> Result<T, E>
    where
        F: FnOnce(&DbInfo) -> Result<T, E>,
        E: From<ClientError>,
    {
        let guard = self.database()?.enter()?;
        let id = guard.db_id;
        let result = test(guard.record());
        match (result, guard.finish()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), released) => {
                if let Err(release_err) = released {
                    error!(?id, ?release_err, "failed to destroy database after error");
                }
                Err(err)
            }
        }
    }

    /// Close the session, dropping the transport and clearing the hash.
    pub fn close(mut self) {
        debug!(template_hash = ?self.template_hash, "closing session");
        self.template_hash = None;
    }
}
