//! In-memory script loader for testing.

use crate::backend::ScriptLoader;
use crate::error::{ErrorKind, Result};
use crate::globals::Globals;
use crate::handle::Handle;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// In-memory script loader for testing.
///
/// Every call to [`load`](ScriptLoader::load) is recorded. Loads can be held
/// pending until [`release`](Self::release) is called (to line up concurrent
/// requests), made to fail per source, and made to define a global binding
/// on success, exactly like a real script would.
///
/// # Examples
///
/// ```
/// use ondemand_loader::backend::{MockLoader, ScriptLoader};
/// use ondemand_loader::{Globals, Handle};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let globals = Globals::new();
/// let loader = MockLoader::new(&globals).providing("/lib/pdf.js", "pdfLib", Handle::sentinel());
/// loader.load("pdf", "/lib/pdf.js").await?;
/// assert!(globals.contains("pdfLib"));
/// assert_eq!(loader.attempts(), 1);
///
/// loader.fail("/lib/pdf.js");
/// assert!(loader.load("pdf", "/lib/pdf.js").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MockLoader {
    name: String,
    globals: Globals,
    provides: HashMap<String, (String, Handle)>,
    failing: Mutex<HashSet<String>>,
    attempts: Mutex<Vec<(String, String)>>,
    gate: watch::Sender<bool>,
}

impl MockLoader {
    /// Create a mock loader defining its globals in `globals`.
    pub fn new(globals: &Globals) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            name: "mock".to_string(),
            globals: globals.clone(),
            provides: HashMap::new(),
            failing: Mutex::new(HashSet::new()),
            attempts: Mutex::new(Vec::new()),
            gate,
        }
    }

    /// Change the name of the mock loader.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Successfully loading `source` defines the global `global` as `handle`.
    pub fn providing(mut self, source: impl Into<String>, global: impl Into<String>, handle: Handle) -> Self {
        self.provides.insert(source.into(), (global.into(), handle));
        self
    }

    /// Make every future load of `source` fail.
    pub fn fail(&self, source: impl Into<String>) {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner).insert(source.into());
    }

    /// Undo [`fail`](Self::fail).
    pub fn recover(&self, source: &str) {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner).remove(source);
    }

    /// Hold every load (current and future) pending until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    /// Let held loads complete.
    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Total number of load attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of load attempts made for `source`.
    pub fn attempts_for(&self, source: &str) -> usize {
        let attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        attempts.iter().filter(|(_, attempted)| attempted == source).count()
    }
}

#[async_trait]
impl ScriptLoader for MockLoader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, library: &str, source: &str) -> Result<()> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner).push((library.to_string(), source.to_string()));
        let mut gate = self.gate.subscribe();
        // The sender lives as long as `self`, so this can't observe a closed channel.
        let _ = gate.wait_for(|open| *open).await;
        if self.failing.lock().unwrap_or_else(PoisonError::into_inner).contains(source) {
            exn::bail!(ErrorKind::Network(format!("could not fetch {source}")));
        }
        if let Some((global, handle)) = self.provides.get(source) {
            self.globals.define(global.clone(), handle.clone());
        }
        Ok(())
    }
}
