//! On-demand script libraries and listener lifecycle for form-heavy pages.
//!
//! [`Page`] is the composition point: it owns one [`LibraryLoadCache`] and
//! one [`ListenerRegistry`], wires the configured libraries into the cache,
//! and kicks off idle-time preloads when the page starts.

use ondemand_asyncutils::Deferred;
use std::sync::Arc;

pub use ondemand_asyncutils::{Idle, IdleHandle, Manual};
pub use ondemand_config::{Config, IdleConfig, LibraryConfig};
pub use ondemand_listeners::{Event, EventTarget, Listener, ListenerOptions, ListenerRegistry};
pub use ondemand_loader::{Globals, Handle, Library, LibraryLoadCache, LoadState, LoaderHandle, ScriptLoader};

/// Per-page state: the library cache, the listener registry, and the global
/// bindings presence checks read from.
///
/// Constructed explicitly and passed to whatever needs it; nothing here is
/// global.
///
/// # Examples
///
/// ```
/// use ondemand::{Config, Globals, LibraryConfig, Manual, Page};
/// use ondemand_loader::backend::FsLoader;
/// use ondemand_loader::error::Result;
/// use std::sync::Arc;
///
/// # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
/// # let web_root = tempfile::tempdir()?;
/// let mut config = Config::default();
/// config.libraries.insert(
///     "pdf".into(),
///     LibraryConfig { source: "/lib/pdf.js".into(), global: Some("pdfLib".into()), preload: true },
/// );
///
/// let evaluate = |_library: &str, _script: &[u8]| -> Result<()> { Ok(()) };
/// let loader = FsLoader::new("public", web_root.path(), Arc::new(evaluate))?;
/// let idle = Arc::new(Manual::new());
/// let page = Page::new(&config, Globals::new(), Arc::new(loader), idle.clone());
///
/// assert!(page.libraries().registered("pdf").is_some());
/// assert_eq!(page.start(), 1);
/// assert_eq!(idle.pending(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Page {
    globals: Globals,
    libraries: LibraryLoadCache,
    listeners: ListenerRegistry,
    preloads: Vec<String>,
}

impl Page {
    /// Build a page whose libraries come from `config`.
    ///
    /// Each configured library is registered under its key; one with a
    /// `global` is considered present whenever `globals` defines that name.
    /// Preloads run on `idle`.
    pub fn new(config: &Config, globals: Globals, loader: LoaderHandle, idle: IdleHandle) -> Self {
        let libraries = LibraryLoadCache::new(loader).with_idle(idle);
        for (key, library) in &config.libraries {
            let mut entry = Library::new(key.as_str(), library.source.as_str());
            if let Some(global) = &library.global {
                entry = entry.with_probe(globals.probe(global.as_str()));
            }
            libraries.register(entry);
        }
        let preloads = config.preloads().map(str::to_string).collect();
        tracing::debug!(libraries = config.libraries.len(), "Page configured");
        Self { globals, libraries, listeners: ListenerRegistry::new(), preloads }
    }

    /// [`Page::new`], preloading after the configured idle delay on the
    /// current Tokio runtime.
    pub fn deferred(config: &Config, globals: Globals, loader: LoaderHandle) -> Self {
        Self::new(config, globals, loader, Arc::new(Deferred::new(config.idle.delay())))
    }

    /// Schedule a preload for every library flagged `preload`. Returns how
    /// many were scheduled; libraries that are already loaded are skipped.
    pub fn start(&self) -> usize {
        let mut scheduled = 0;
        for key in &self.preloads {
            if !self.libraries.is_loaded(key) {
                self.libraries.preload(key);
                scheduled += 1;
            }
        }
        tracing::info!(preloads = scheduled, "Page started");
        scheduled
    }

    /// Detach every listener attached through this page's registry.
    pub fn teardown(&self) -> usize {
        self.listeners.remove_all()
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn libraries(&self) -> &LibraryLoadCache {
        &self.libraries
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("libraries", &self.libraries)
            .field("listeners", &self.listeners)
            .field("preloads", &self.preloads)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ondemand_listeners::MockElement;
    use ondemand_loader::backend::MockLoader;
    use std::rc::Rc;

    fn config() -> Config {
        let mut config = Config::default();
        config.libraries.insert(
            "pdf".into(),
            LibraryConfig { source: "/lib/pdf.js".into(), global: Some("pdfLib".into()), preload: true },
        );
        config.libraries.insert(
            "ocr".into(),
            LibraryConfig { source: "/lib/tesseract.js".into(), global: None, preload: false },
        );
        config
    }

    #[test]
    fn test_registers_configured_libraries() {
        let globals = Globals::new();
        let page = Page::new(&config(), globals.clone(), Arc::new(MockLoader::new(&globals)), Arc::new(Manual::new()));

        let pdf = page.libraries().registered("pdf").unwrap();
        assert_eq!(pdf.source(), "/lib/pdf.js");
        assert!(pdf.has_probe());
        assert!(!page.libraries().registered("ocr").unwrap().has_probe());
        assert!(page.libraries().registered("vision").is_none());
    }

    #[tokio::test]
    async fn test_start_skips_present_libraries() {
        let globals = Globals::new();
        let idle = Arc::new(Manual::new());
        let page = Page::new(&config(), globals.clone(), Arc::new(MockLoader::new(&globals)), idle.clone());

        globals.define("pdfLib", Handle::new("jsPDF"));
        page.libraries().request_registered("pdf").await.unwrap();
        assert_eq!(page.start(), 0);
        assert_eq!(idle.pending(), 0);
    }

    #[test]
    fn test_teardown_detaches_everything() {
        let globals = Globals::new();
        let page = Page::new(&config(), globals.clone(), Arc::new(MockLoader::new(&globals)), Arc::new(Manual::new()));
        let button = Rc::new(MockElement::new("button"));
        let target: Rc<dyn EventTarget> = button.clone();

        page.listeners().add(&target, "click", &Listener::new(|_| {}), ListenerOptions::default());
        page.listeners().add(&target, "keydown", &Listener::new(|_| {}), ListenerOptions::default());
        assert_eq!(page.teardown(), 2);
        assert_eq!(button.dispatch(&Event::new("click")), 0);
    }
}
