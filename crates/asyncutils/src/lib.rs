//! Small async building blocks shared by the other `ondemand` crates.
//!
//! - [`Idle`] schedulers run best-effort background work "when nothing else
//!   is happening": [`Deferred`] on a Tokio runtime after a short delay, or
//!   [`Manual`] when the embedder decides what idle means.
//! - [`Quiet`] turns a fallible future into one that resolves to `()`,
//!   logging (never propagating) its failure.
//!
//! Uses [`futures`] traits rather than Tokio-specific ones wherever the
//! runtime isn't actually needed.

mod idle;
mod quiet;

pub use crate::idle::{Deferred, Idle, IdleHandle, Manual, Task};
pub use crate::quiet::{Quiet, QuietExt};
