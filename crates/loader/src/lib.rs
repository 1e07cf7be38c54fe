//! On-demand loading of named script libraries.
//!
//! Heavy third-party capabilities (computer vision, face detection, OCR, PDF
//! export) are only fetched when something actually needs them, and then at
//! most once, no matter how many callers ask at the same time.
//!
//! # Architecture
//! - [`LibraryLoadCache`] owns the load state of every library and hands out
//!   [`Handle`]s.
//! - A [`ScriptLoader`](backend::ScriptLoader) backend does the actual
//!   fetch-and-execute; the cache never cares how.
//! - [`Globals`] models the execution environment's global bindings, which is
//!   what presence checks read and what scripts write when they run.

pub mod backend;
mod cache;
pub mod error;
mod globals;
mod handle;
mod library;
mod path;

pub use crate::backend::ScriptLoader;
pub use crate::cache::{LibraryLoadCache, LoadState};
pub use crate::globals::{Globals, Probe};
pub use crate::handle::Handle;
pub use crate::library::Library;
use std::sync::Arc;

pub type LoaderHandle = Arc<dyn ScriptLoader>;
