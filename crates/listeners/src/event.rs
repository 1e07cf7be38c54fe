use std::fmt;
use std::rc::Rc;

/// An event delivered to a [`Listener`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    event_type: String,
}

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self { event_type: event_type.into() }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

/// A listener callback, compared by identity.
///
/// Two `Listener`s are "the same handler" only if one is a clone of the
/// other; wrapping the same closure twice produces two distinct listeners.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(callback: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

/// Flags supplied when attaching a listener.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ListenerOptions {
    /// Run during the capture phase instead of the bubble phase.
    pub capture: bool,
    /// Promise not to cancel the event's default action.
    pub passive: bool,
    /// Detach automatically after the first invocation.
    pub once: bool,
}

impl ListenerOptions {
    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

/// Something listeners can be attached to: a document element, the window,
/// the document itself.
///
/// Implementations do whatever the host environment does; the registry only
/// promises to call [`remove_listener`](Self::remove_listener) with exactly
/// the options it passed to [`add_listener`](Self::add_listener).
pub trait EventTarget {
    fn add_listener(&self, event_type: &str, listener: &Listener, options: ListenerOptions);
    fn remove_listener(&self, event_type: &str, listener: &Listener, options: ListenerOptions);
}
