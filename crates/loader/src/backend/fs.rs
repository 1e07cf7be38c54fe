//! Local filesystem script loader.
//!
//! Scripts are resolved against a web root directory and read via
//! `tokio::fs`; executing them is delegated to an [`Evaluator`].

use crate::backend::ScriptLoader;
use crate::error::{ErrorKind, Result};
use crate::path::resolve;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Executes a fetched script: `(library name, script bytes)`.
pub type Evaluator = Arc<dyn Fn(&str, &[u8]) -> Result<()> + Send + Sync>;

/// Loads scripts from a directory on the local filesystem.
///
/// Cross-origin references (`https://…`, `//cdn…`) are rejected with
/// [`UnsupportedSource`](ErrorKind::UnsupportedSource); a leading `/` in a
/// source is relative to the web root.
///
/// # Examples
///
/// ```no_run
/// use ondemand_loader::backend::FsLoader;
/// use ondemand_loader::{Globals, Handle};
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let globals = Globals::new();
/// let defines = globals.clone();
/// let loader = FsLoader::new("public", "/srv/www/public", Arc::new(move |library: &str, _script: &[u8]| -> ondemand_loader::error::Result<()> {
///     defines.define(library, Handle::sentinel());
///     Ok(())
/// }))?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FsLoader {
    name: String,
    root: PathBuf,
    evaluator: Evaluator,
}

impl FsLoader {
    /// Create a new filesystem loader.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not an absolute path to an existing
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>, evaluator: Evaluator) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || !root.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root.display().to_string()));
        }
        Ok(Self { name: name.into(), root, evaluator })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            _ => ErrorKind::Io(e.to_string()),
        }
    }
}

impl fmt::Debug for FsLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsLoader").field("name", &self.name).field("root", &self.root).finish_non_exhaustive()
    }
}

#[async_trait]
impl ScriptLoader for FsLoader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, library: &str, source: &str) -> Result<()> {
        let relative = resolve(source)?;
        let script = fs::read(self.root.join(&relative)).await.map_err(|e| Self::map_io_error(e, &relative))?;
        tracing::debug!(library, path = %relative.display(), bytes = script.len(), "Evaluating script");
        (self.evaluator)(library, &script)
    }
}
