//! HTTP(S) script loader.
//!
//! Sources are resolved the way a page resolves `<script src>`: against the
//! page's base URL, so root-relative paths, relative paths, scheme-relative
//! `//cdn...` references and absolute URLs all work.

use crate::backend::{Evaluator, ScriptLoader};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Fetches scripts over HTTP(S) and hands them to an [`Evaluator`].
///
/// # Examples
///
/// ```no_run
/// use ondemand_loader::backend::{HttpLoader, ScriptLoader};
/// use ondemand_loader::error::Result;
/// use std::sync::Arc;
///
/// # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
/// let evaluate = |_library: &str, _script: &[u8]| -> Result<()> { Ok(()) };
/// let loader = HttpLoader::new("site", "https://loans.example.com/apply/", Arc::new(evaluate))?;
/// loader.load("pdf", "/assets/vendor/jspdf.umd.min.js").await?;
/// loader.load("ocr", "https://cdn.jsdelivr.net/npm/tesseract.js@5/dist/tesseract.min.js").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpLoader {
    name: String,
    base: Url,
    client: Client,
    evaluator: Evaluator,
}

impl HttpLoader {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a loader resolving sources against `base` (the page URL).
    ///
    /// # Errors
    ///
    /// - [`InvalidPath`](ErrorKind::InvalidPath) if `base` isn't a URL.
    /// - [`UnsupportedSource`](ErrorKind::UnsupportedSource) if it isn't an
    ///   `http` or `https` URL.
    pub fn new(name: impl Into<String>, base: &str, evaluator: Evaluator) -> Result<Self> {
        let Ok(base) = Url::parse(base) else {
            exn::bail!(ErrorKind::InvalidPath(base.to_string()));
        };
        if !Self::fetchable(&base) || base.cannot_be_a_base() {
            exn::bail!(ErrorKind::UnsupportedSource(base.to_string()));
        }
        let client = Client::builder()
            .timeout(Self::DEFAULT_TIMEOUT)
            .build()
            .or_raise(|| ErrorKind::Network("could not build HTTP client".to_string()))?;
        Ok(Self { name: name.into(), base, client, evaluator })
    }

    /// Use a preconfigured client (proxies, headers, timeouts).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn fetchable(url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
    }

    fn locate(&self, source: &str) -> Result<Url> {
        let Ok(url) = self.base.join(source) else {
            exn::bail!(ErrorKind::InvalidPath(source.to_string()));
        };
        if !Self::fetchable(&url) {
            exn::bail!(ErrorKind::UnsupportedSource(source.to_string()));
        }
        Ok(url)
    }
}

impl fmt::Debug for HttpLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLoader").field("name", &self.name).field("base", &self.base.as_str()).finish_non_exhaustive()
    }
}

#[async_trait]
impl ScriptLoader for HttpLoader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, library: &str, source: &str) -> Result<()> {
        let url = self.locate(source)?;
        tracing::debug!(library, %url, "Fetching script");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| ErrorKind::Network(format!("could not fetch {url}: {err}")))?;
        match response.status() {
            status if status.is_success() => {},
            status if status == StatusCode::NOT_FOUND || status == StatusCode::GONE => {
                exn::bail!(ErrorKind::NotFound(PathBuf::from(url.path())))
            },
            status => exn::bail!(ErrorKind::Network(format!("{url} responded with {status}"))),
        }
        let script = response.bytes().await.map_err(|err| ErrorKind::Network(format!("could not read {url}: {err}")))?;
        tracing::debug!(library, %url, bytes = script.len(), "Evaluating script");
        (self.evaluator)(library, &script)
    }
}
