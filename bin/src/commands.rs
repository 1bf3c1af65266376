//! Subcommand execution. Machine-readable output goes to `out`, logs to stderr.

use std::io::Write;

use anyhow::{Context, Result};
use integresql_client::{DbInfo, InitOutcome, IntegreSql, TemplateHash};
use serde::Serialize;
use tracing::info;

use crate::config::cli::{Command, LeaseArgs, TemplateArgs};

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum InitReport<'a> {
    Registered { database: &'a DbInfo },
    AlreadyRegistering,
}

pub fn execute<W: Write>(session: &mut IntegreSql, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::Hash { dirs } => {
            let hash =
                TemplateHash::from_dirs(&dirs).context("failed to hash template directories")?;
            writeln!(out, "{hash}")?;
        }
        Command::Initialize(args) => {
            use_template(session, &args)?;
            let mut template = session.template()?;
            let outcome = template
                .initialize()
                .with_context(|| format!("failed to initialize template {}", template.hash()))?;
            let report = match &outcome {
                InitOutcome::Registered(database) => InitReport::Registered { database },
                InitOutcome::AlreadyRegistering => InitReport::AlreadyRegistering,
            };
            print_json(out, &report)?;
        }
        Command::Finalize(args) => {
            let hash = args.template_hash()?;
            session
                .finalize_template(&hash)
                .with_context(|| format!("failed to finalize template {hash}"))?;
            info!(%hash, "template finalized");
        }
        Command::Discard(args) => {
            let hash = args.template_hash()?;
            session
                .discard_template(&hash)
                .with_context(|| format!("failed to discard template {hash}"))?;
            info!(%hash, "template discarded");
        }
        Command::Open(args) => {
            let hash = use_template(session, &args)?;
            let info = session
                .database()?
                .open()
                .with_context(|| format!("failed to open test database for {hash}"))?;
            print_json(out, &info)?;
        }
        Command::Recreate(args) => {
            let id = args.id;
            release(session, &args, "recreate", |db| db.destroy(id))?;
        }
        Command::Unlock(args) => {
            let id = args.id;
            release(session, &args, "unlock", |db| db.free(id))?;
        }
        Command::MarkUnmodified(args) => {
            let id = args.id;
            release(session, &args, "mark unmodified", |db| db.mark_unmodified(id))?;
        }
        Command::Reset => {
            session
                .reset_all_tracking()
                .context("failed to reset tracking")?;
            info!("all templates reset");
        }
    }
    Ok(())
}

fn use_template(session: &mut IntegreSql, args: &TemplateArgs) -> Result<TemplateHash> {
    let hash = args.template_hash()?;
    session.set_template_hash(hash.clone());
    Ok(hash)
}

fn release<F>(session: &mut IntegreSql, args: &LeaseArgs, action: &str, f: F) -> Result<()>
where
    F: FnOnce(&mut integresql_client::Database<'_>) -> integresql_client::ClientResult<()>,
{
    let hash = use_template(session, &args.template)?;
    let mut db = session.database()?;
    f(&mut db).with_context(|| format!("failed to {action} test database {} of {hash}", args.id))?;
    info!(%hash, id = args.id, action, "test database released");
    Ok(())
}

fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
