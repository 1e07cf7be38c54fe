//! Global bindings of the execution environment.
//!
//! When a script runs it typically publishes its entry point under a
//! well-known name (`cv`, `faceapi`, `Tesseract`, `jspdf`). [`Globals`] is
//! that namespace: loaders define bindings, presence checks read them.

use crate::handle::Handle;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Zero-argument probe reporting whether a library is already available.
pub type Probe = Arc<dyn Fn() -> Option<Handle> + Send + Sync>;

/// Shared name → [`Handle`] table. Clones share the same table.
#[derive(Clone, Default)]
pub struct Globals {
    bindings: Arc<RwLock<HashMap<String, Handle>>>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a global binding.
    pub fn define(&self, name: impl Into<String>, handle: Handle) {
        let name = name.into();
        tracing::trace!(global = %name, "Defining global binding");
        self.bindings.write().unwrap_or_else(PoisonError::into_inner).insert(name, handle);
    }

    pub fn get(&self, name: &str) -> Option<Handle> {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Handle> {
        self.bindings.write().unwrap_or_else(PoisonError::into_inner).remove(name)
    }

    /// A presence check reading the binding `name` at call time.
    ///
    /// ```
    /// use ondemand_loader::{Globals, Handle};
    ///
    /// let globals = Globals::new();
    /// let probe = globals.probe("pdfLib");
    /// assert!(probe().is_none());
    /// globals.define("pdfLib", Handle::sentinel());
    /// assert!(probe().is_some());
    /// ```
    pub fn probe(&self, name: impl Into<String>) -> Probe {
        let globals = self.clone();
        let name = name.into();
        Arc::new(move || globals.get(&name))
    }
}
