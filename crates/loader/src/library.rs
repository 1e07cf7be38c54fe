use crate::globals::Probe;
use crate::handle::Handle;
use std::fmt;
use std::sync::Arc;

/// A named external library: where to load it from, and how to tell whether
/// it is already there.
///
/// # Examples
///
/// ```
/// use ondemand_loader::{Globals, Library};
///
/// let globals = Globals::new();
/// let pdf = Library::new("pdf", "/lib/pdf.js").with_probe(globals.probe("pdfLib"));
/// assert_eq!(pdf.name(), "pdf");
/// assert!(pdf.probe().is_none());
/// ```
#[derive(Clone)]
pub struct Library {
    name: String,
    source: String,
    probe: Option<Probe>,
}

impl Library {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), source: source.into(), probe: None }
    }

    /// Attach a presence check. When it returns a handle, requests resolve
    /// with it immediately and nothing is loaded.
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Convenience for [`with_probe`](Self::with_probe) from a plain closure.
    pub fn with_check(self, check: impl Fn() -> Option<Handle> + Send + Sync + 'static) -> Self {
        self.with_probe(Arc::new(check))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_probe(&self) -> bool {
        self.probe.is_some()
    }

    /// Run the presence check, if there is one.
    pub fn probe(&self) -> Option<Handle> {
        self.probe.as_ref().and_then(|probe| probe())
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}
