//! De-duplicating library load cache.
//!
//! Each library name maps to at most one record: either a load in flight
//! (a [`Shared`] future every concurrent caller awaits) or the loaded
//! [`Handle`]. Failed loads leave no record behind, so the next request
//! starts over.

use crate::LoaderHandle;
use crate::error::{ErrorKind, Result};
use crate::handle::Handle;
use crate::library::Library;
use derive_more::Display;
use futures::future::{BoxFuture, FutureExt, Shared};
use ondemand_asyncutils::{Deferred, IdleHandle, QuietExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;

type Outcome = std::result::Result<Handle, ErrorKind>;
type Pending = Shared<BoxFuture<'static, Outcome>>;

/// Where a library is in its load lifecycle.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum LoadState {
    Unrequested,
    Loading,
    Loaded,
    /// Only ever reported in logs and errors; a failed record is cleared
    /// immediately so [`LibraryLoadCache::state`] never returns it.
    Failed,
}

enum Record {
    Loading { attempt: u64, pending: Pending },
    Loaded(Handle),
}

#[derive(Default)]
struct Records {
    entries: HashMap<String, Record>,
    attempts: u64,
}

enum Step {
    Ready(Handle),
    Wait(Pending),
}

/// Loads named libraries on demand, at most once each.
///
/// - A library whose presence check already finds it resolves immediately,
///   without touching the [`ScriptLoader`](crate::backend::ScriptLoader).
/// - Concurrent requests for the same name share one in-flight load and all
///   receive the same outcome.
/// - Failures are handed to every waiter and then forgotten; the next request
///   retries.
///
/// Cloning is cheap and every clone shares the same records.
///
/// # Examples
///
/// ```
/// use ondemand_loader::backend::FsLoader;
/// use ondemand_loader::error::Result;
/// use ondemand_loader::{Globals, Handle, Library, LibraryLoadCache, LoadState};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
/// # let web_root = tempfile::tempdir()?;
/// # std::fs::create_dir(web_root.path().join("lib"))?;
/// # std::fs::write(web_root.path().join("lib/pdf.js"), "window.pdfLib = new jsPDF();")?;
/// let globals = Globals::new();
/// let defines = globals.clone();
/// let evaluate = move |_library: &str, _script: &[u8]| -> Result<()> {
///     defines.define("pdfLib", Handle::new("jsPDF"));
///     Ok(())
/// };
/// let loader = FsLoader::new("public", web_root.path(), Arc::new(evaluate))?;
/// let cache = LibraryLoadCache::new(Arc::new(loader));
///
/// let pdf = Library::new("pdf", "/lib/pdf.js").with_probe(globals.probe("pdfLib"));
/// assert_eq!(cache.state("pdf"), LoadState::Unrequested);
/// let handle = cache.request(&pdf).await?;
/// assert_eq!(handle.downcast_ref::<&str>(), Some(&"jsPDF"));
/// assert!(cache.is_loaded("pdf"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LibraryLoadCache {
    loader: LoaderHandle,
    idle: IdleHandle,
    records: Arc<Mutex<Records>>,
    catalog: Arc<Mutex<HashMap<String, Library>>>,
}

impl LibraryLoadCache {
    /// Create a cache loading through `loader`, preloading on a [`Deferred`]
    /// idle scheduler with its default delay.
    pub fn new(loader: LoaderHandle) -> Self {
        Self {
            loader,
            idle: Arc::new(Deferred::default()),
            records: Arc::default(),
            catalog: Arc::default(),
        }
    }

    /// Replace the scheduler used by [`preload`](Self::preload).
    pub fn with_idle(mut self, idle: IdleHandle) -> Self {
        self.idle = idle;
        self
    }

    /// Acquire `library`, loading it if nobody has yet.
    ///
    /// # Errors
    ///
    /// - [`InvalidName`](ErrorKind::InvalidName) if the library name is empty.
    /// - [`LoadFailed`](ErrorKind::LoadFailed) if the load this request ended
    ///   up waiting on failed. Every concurrent waiter gets the same error.
    #[instrument(skip_all, fields(library = %library.name()))]
    pub async fn request(&self, library: &Library) -> Result<Handle> {
        match self.begin(library)? {
            Step::Ready(handle) => Ok(handle),
            Step::Wait(pending) => Ok(pending.await?),
        }
    }

    /// [`request`](Self::request) a library previously [`register`](Self::register)ed
    /// under `key`.
    pub async fn request_registered(&self, key: &str) -> Result<Handle> {
        let Some(library) = self.registered(key) else {
            exn::bail!(ErrorKind::UnknownLibrary(key.to_string()));
        };
        self.request(&library).await
    }

    /// Decide, synchronously, whether `library` is ready, already loading, or
    /// needs a load started. Never holds the records lock across an await.
    fn begin(&self, library: &Library) -> Result<Step> {
        let name = library.name();
        if name.is_empty() {
            exn::bail!(ErrorKind::InvalidName);
        }
        // Run the caller's probe before taking the lock; it's their code.
        let present = library.probe();
        let mut records = self.records();
        if let Some(handle) = present {
            tracing::debug!("Library already present; nothing to load");
            records.entries.insert(name.to_string(), Record::Loaded(handle.clone()));
            return Ok(Step::Ready(handle));
        }
        match records.entries.get(name) {
            Some(Record::Loaded(handle)) => {
                tracing::debug!("Library already loaded");
                return Ok(Step::Ready(handle.clone()));
            },
            Some(Record::Loading { pending, .. }) => {
                tracing::debug!("Joining in-flight load");
                return Ok(Step::Wait(pending.clone()));
            },
            None => {},
        }

        records.attempts += 1;
        let attempt = records.attempts;
        let load = Self::load(Arc::clone(&self.loader), Arc::clone(&self.records), library.clone(), attempt).boxed();
        // Spawned so the load runs to completion even if every waiter goes
        // away. Without a Tokio runtime, the waiters drive it themselves.
        let pending = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(load);
                let (library, location) = (name.to_string(), library.source().to_string());
                async move {
                    task.await.unwrap_or_else(|err| {
                        Err(ErrorKind::LoadFailed { library, location, reason: format!("load task aborted: {err}") })
                    })
                }
                .boxed()
                .shared()
            },
            Err(_) => load.shared(),
        };
        records.entries.insert(name.to_string(), Record::Loading { attempt, pending: pending.clone() });
        Ok(Step::Wait(pending))
    }

    /// The single load for `attempt`. Records its own outcome, unless the
    /// record was reset (or replaced) while it was in flight.
    async fn load(loader: LoaderHandle, records: Arc<Mutex<Records>>, library: Library, attempt: u64) -> Outcome {
        let name = library.name();
        tracing::info!(library = %name, source = %library.source(), loader = %loader.name(), "Loading library");
        let outcome = match loader.load(name, library.source()).await {
            Ok(()) => Ok(library.probe().unwrap_or_else(|| {
                if library.has_probe() {
                    tracing::warn!(library = %name, "Library loaded but its presence check still finds nothing");
                }
                Handle::sentinel()
            })),
            Err(err) => Err(ErrorKind::LoadFailed {
                library: name.to_string(),
                location: library.source().to_string(),
                reason: (*err).to_string(),
            }),
        };

        let mut records = records.lock().unwrap_or_else(PoisonError::into_inner);
        let current = matches!(
            records.entries.get(name),
            Some(Record::Loading { attempt: recorded, .. }) if *recorded == attempt
        );
        match (&outcome, current) {
            (_, false) => tracing::debug!(library = %name, "Library record reset during load; outcome not recorded"),
            (Ok(handle), true) => {
                records.entries.insert(name.to_string(), Record::Loaded(handle.clone()));
                tracing::info!(library = %name, state = %LoadState::Loaded, "Library loaded");
            },
            (Err(err), true) => {
                records.entries.remove(name);
                tracing::debug!(library = %name, state = %LoadState::Failed, error = %err, "Library failed to load");
            },
        }
        outcome
    }

    /// Load a registered library in the background, when the idle scheduler
    /// gets round to it.
    ///
    /// Best effort: unknown keys are ignored, and failures are swallowed
    /// (logged at debug level only). A later [`request`](Self::request)
    /// retries as normal.
    pub fn preload(&self, key: &str) {
        let Some(library) = self.registered(key) else {
            tracing::debug!(library = key, "No library registered under this name; nothing to preload");
            return;
        };
        if self.is_loaded(library.name()) {
            return;
        }
        tracing::trace!(library = key, "Scheduling preload");
        let cache = self.clone();
        let label = format!("preload {key}");
        let task = async move { cache.request(&library).await.map_err(|err| (*err).clone()) };
        self.idle.schedule(Box::pin(task.quiet(label)));
    }

    /// Make `library` available to [`preload`](Self::preload) and
    /// [`request_registered`](Self::request_registered) under its name.
    /// Returns whatever was registered under that name before.
    pub fn register(&self, library: Library) -> Option<Library> {
        let mut catalog = self.catalog.lock().unwrap_or_else(PoisonError::into_inner);
        catalog.insert(library.name().to_string(), library)
    }

    pub fn registered(&self, key: &str) -> Option<Library> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    /// `true` only once a load has succeeded (or a presence check found the
    /// library). Never triggers a load.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.state(name) == LoadState::Loaded
    }

    pub fn state(&self, name: &str) -> LoadState {
        match self.records().entries.get(name) {
            None => LoadState::Unrequested,
            Some(Record::Loading { .. }) => LoadState::Loading,
            Some(Record::Loaded(_)) => LoadState::Loaded,
        }
    }

    /// Names of every loaded library, sorted.
    pub fn loaded(&self) -> Vec<String> {
        let records = self.records();
        let mut names: Vec<String> = records
            .entries
            .iter()
            .filter(|(_, record)| matches!(record, Record::Loaded(_)))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Forget everything known about `name`.
    ///
    /// Bookkeeping only: whatever the library already put into the execution
    /// environment stays there, so a request whose presence check still finds
    /// it resolves without loading anything. A load in flight still resolves
    /// its own waiters, but no longer records its outcome. Returns `false` if
    /// nothing was tracked.
    pub fn unload(&self, name: &str) -> bool {
        let removed = self.records().entries.remove(name).is_some();
        if removed {
            tracing::debug!(library = name, "Library record discarded");
        }
        removed
    }

    fn records(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for LibraryLoadCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryLoadCache")
            .field("loader", &self.loader.name())
            .field("records", &self.records().entries.len())
            .finish_non_exhaustive()
    }
}
