//! Script loader trait and implementations.
//!
//! A [`ScriptLoader`] is whatever actually gets a script into the execution
//! environment: reading it off disk or fetching it over HTTP and evaluating
//! it, injecting a `<script>`
//! tag into a real page, or pretending to in tests. The cache only cares
//! whether the load succeeded.

mod fs;
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::fs::{Evaluator, FsLoader};
pub use self::http::HttpLoader;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockLoader;
use crate::error::Result;
use async_trait::async_trait;

/// Fetch-and-initialize backend for named libraries.
///
/// Implementations are not expected to de-duplicate or cache anything; the
/// [`LibraryLoadCache`](crate::LibraryLoadCache) guarantees each `load` call
/// is the only one in flight for its library.
///
/// # Examples
///
/// ```
/// use ondemand_loader::backend::ScriptLoader;
/// use ondemand_loader::error::Result;
///
/// async fn warm(loader: &dyn ScriptLoader) -> Result<()> {
///     loader.load("pdf", "/lib/pdf.js").await
/// }
/// ```
#[async_trait]
pub trait ScriptLoader: Send + Sync {
    /// Name of the backend (used for logging only).
    fn name(&self) -> &str;

    /// Load and execute the script at `source` on behalf of `library`.
    ///
    /// Resolves once the script has run (success) or definitively failed to
    /// load or execute (error). There is no partial success.
    async fn load(&self, library: &str, source: &str) -> Result<()>;
}
