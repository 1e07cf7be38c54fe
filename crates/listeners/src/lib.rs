//! Event listener lifecycle management.
//!
//! UI wiring code attaches listeners all over the document and rarely
//! remembers to take them off again. [`ListenerRegistry`] remembers for it:
//! every attachment made through the registry is recorded against its
//! element, duplicates are refused, and everything recorded for an element
//! can be detached in one call.
//!
//! Elements are held weakly. Tracking an element never keeps it alive; once
//! the document drops it, its bookkeeping is purged lazily.
//!
//! Like the document it models, everything here is single-threaded (`Rc`,
//! not `Arc`).

mod event;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod registry;

pub use crate::event::{Event, EventTarget, Listener, ListenerOptions};
#[cfg(any(test, feature = "mock"))]
pub use crate::mock::MockElement;
pub use crate::registry::ListenerRegistry;
