//! Template identity hashing.
//!
//! A template is identified by the content of one or more directory trees.
//! For each root, every file below it is digested on its own (content only,
//! no name or metadata), the per-file digests are folded in sorted path
//! order into a root digest, and the root digests are folded in the order
//! given into the final hash. Inner digests are folded as lowercase hex text
//! and the digest is MD5, so the result matches other IntegreSQL clients
//! hashing the same tree.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{ClientError, ClientResult};

/// Read buffer size for file digests.
const BUFFER_SIZE: usize = 4 * 1024;

/// Identity of a template, used as the key for every remote call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateHash(String);

impl TemplateHash {
    /// Hash a single template directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> ClientResult<Self> {
        Self::from_dirs([dir])
    }

    /// Hash several template directories; their order matters.
    ///
    /// Every path is checked before any file is read, so a bad path fails
    /// without partial work.
    pub fn from_dirs<I, P>(dirs: I) -> ClientResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let dirs: Vec<P> = dirs.into_iter().collect();
        if dirs.is_empty() {
            return Err(ClientError::InvalidTemplatePath {
                path: PathBuf::new(),
                reason: "no template directories given",
            });
        }
        for dir in &dirs {
            check_dir(dir.as_ref())?;
        }

        let mut total = md5::Context::new();
        for dir in &dirs {
            let digest = hash_tree(dir.as_ref())?;
            trace!(root = %dir.as_ref().display(), %digest, "hashed template root");
            total.consume(digest.as_bytes());
        }
        let hash = Self(hex::encode(total.compute().0));
        debug!(%hash, roots = dirs.len(), "computed template hash");
        Ok(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn check_dir(path: &Path) -> ClientResult<()> {
    let reason = if !path.exists() {
        "path does not exist"
    } else if !path.is_dir() {
        "path must be a directory"
    } else {
        return Ok(());
    };
    Err(ClientError::InvalidTemplatePath {
        path: path.to_path_buf(),
        reason,
    })
}

fn hash_tree(root: &Path) -> ClientResult<String> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|err| ClientError::Io {
            path: err.path().unwrap_or(root).to_path_buf(),
            source: io::Error::from(err),
        })?;
        paths.push(entry.into_path());
    }
    // component-wise order, the same for every filesystem
    paths.sort();

    let mut tree = md5::Context::new();
    for path in &paths {
        // follows symlinks: a link to a directory is skipped like one
        if path.is_dir() {
            continue;
        }
        let digest = hash_file(path)?;
        tree.consume(digest.as_bytes());
    }
    Ok(hex::encode(tree.compute().0))
}

fn hash_file(path: &Path) -> ClientResult<String> {
    let io_err = |source| ClientError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(io_err)?;
    let mut ctx = md5::Context::new();
    let mut buf = [0u8; BUFFER_SIZE];
    loop {
        match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => ctx.consume(&buf[..n]),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(io_err(err)),
        }
    }
    Ok(hex::encode(ctx.compute().0))
}

impl FromStr for TemplateHash {
    type Err = ClientError;

    /// Use an already known hash (or template name) as the identity.
    ///
    /// Dot-only names are rejected: URL normalization would resolve them
    /// as `.`/`..` path segments.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = !s.is_empty()
            && !s.chars().all(|c| c == '.')
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(Self(s.to_owned()))
        } else {
            Err(ClientError::InvalidTemplateHash(s.to_owned()))
        }
    }
}

impl fmt::Display for TemplateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TemplateHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
