use pin_project_lite::pin_project;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

pin_project! {
    /// Future returned by [`QuietExt::quiet`].
    ///
    /// Resolves to `()` once the inner future does, whatever its outcome.
    /// Failures are logged at debug level under `label` and otherwise
    /// dropped; background work that nobody waits on has nobody to tell.
    #[must_use = "futures do nothing unless you `.await` or poll them"]
    pub struct Quiet<F> {
        #[pin]
        inner: F,
        label: String,
    }
}

impl<F> Quiet<F> {
    pub fn new(inner: F, label: impl Into<String>) -> Self {
        Self { inner, label: label.into() }
    }
}

impl<F, T, E> Future for Quiet<F>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match ready!(this.inner.poll(cx)) {
            Ok(_) => tracing::trace!(task = %this.label, "Background task finished"),
            Err(err) => tracing::debug!(task = %this.label, error = %err, "Background task failed; ignoring"),
        }
        Poll::Ready(())
    }
}

pub trait QuietExt: Future + Sized {
    /// Discard this future's outcome, logging failures at debug level.
    ///
    /// ```
    /// use ondemand_asyncutils::QuietExt;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let () = async { Err::<(), _>("no network") }.quiet("warm-up").await;
    /// # }
    /// ```
    fn quiet(self, label: impl Into<String>) -> Quiet<Self> {
        Quiet::new(self, label)
    }
}
impl<F: Future> QuietExt for F {}
