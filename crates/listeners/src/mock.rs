use crate::event::{Event, EventTarget, Listener, ListenerOptions};
use std::cell::{Cell, RefCell};

struct Attached {
    event_type: String,
    listener: Listener,
    options: ListenerOptions,
}

/// In-memory [`EventTarget`] that behaves like a document element without
/// any de-duplication of its own: every `add_listener` call is another
/// attachment, and [`dispatch`](Self::dispatch) invokes each one.
///
/// Intended for use in other crates' dev dependencies.
pub struct MockElement {
    label: String,
    listeners: RefCell<Vec<Attached>>,
    attachments: Cell<usize>,
}

impl MockElement {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into(), listeners: RefCell::new(Vec::new()), attachments: Cell::new(0) }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Deliver `event` to every listener attached for its type, in attachment
    /// order. Returns the number of listeners invoked.
    ///
    /// Listeners attached with `once` are detached before they run. Listeners
    /// may attach or detach listeners on this element while running; changes
    /// take effect from the next dispatch.
    pub fn dispatch(&self, event: &Event) -> usize {
        let matching: Vec<Listener> = {
            let mut listeners = self.listeners.borrow_mut();
            let matching = listeners
                .iter()
                .filter(|attached| attached.event_type == event.event_type())
                .map(|attached| attached.listener.clone())
                .collect();
            listeners.retain(|attached| !(attached.options.once && attached.event_type == event.event_type()));
            matching
        };
        tracing::trace!(element = %self.label, event_type = event.event_type(), listeners = matching.len(), "Dispatching event");
        for listener in &matching {
            listener.call(event);
        }
        matching.len()
    }

    /// Number of listeners currently attached for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners.borrow().iter().filter(|attached| attached.event_type == event_type).count()
    }

    /// Total number of `add_listener` calls this element has received.
    pub fn attachments(&self) -> usize {
        self.attachments.get()
    }
}

impl EventTarget for MockElement {
    fn add_listener(&self, event_type: &str, listener: &Listener, options: ListenerOptions) {
        self.attachments.set(self.attachments.get() + 1);
        self.listeners.borrow_mut().push(Attached {
            event_type: event_type.to_string(),
            listener: listener.clone(),
            options,
        });
    }

    // Matches on type, identity and the capture flag only.
    fn remove_listener(&self, event_type: &str, listener: &Listener, options: ListenerOptions) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(index) = listeners.iter().position(|attached| {
            attached.event_type == event_type
                && Listener::ptr_eq(&attached.listener, listener)
                && attached.options.capture == options.capture
        }) {
            listeners.remove(index);
        }
    }
}

impl std::fmt::Debug for MockElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockElement")
            .field("label", &self.label)
            .field("listeners", &self.listeners.borrow().len())
            .field("attachments", &self.attachments.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_mock_does_not_deduplicate() {
        let element = MockElement::new("button");
        let calls = Rc::new(Cell::new(0));
        let listener = Listener::new({
            let calls = Rc::clone(&calls);
            move |_: &Event| calls.set(calls.get() + 1)
        });
        element.add_listener("click", &listener, ListenerOptions::default());
        element.add_listener("click", &listener, ListenerOptions::default());

        assert_eq!(element.dispatch(&Event::new("click")), 2);
        assert_eq!(calls.get(), 2);
        assert_eq!(element.attachments(), 2);
        assert_eq!(element.dispatch(&Event::new("submit")), 0);
    }

    #[test]
    fn test_remove_requires_matching_capture() {
        let element = MockElement::new("window");
        let listener = Listener::new(|_| {});
        element.add_listener("scroll", &listener, ListenerOptions::default().capture());

        element.remove_listener("scroll", &listener, ListenerOptions::default());
        assert_eq!(element.listener_count("scroll"), 1);
        element.remove_listener("scroll", &listener, ListenerOptions::default().capture());
        assert_eq!(element.listener_count("scroll"), 0);
    }

    #[test]
    fn test_once_listener_detaches() {
        let element = MockElement::new("dialog");
        element.add_listener("close", &Listener::new(|_| {}), ListenerOptions::default().once());
        element.add_listener("close", &Listener::new(|_| {}), ListenerOptions::default());

        assert_eq!(element.dispatch(&Event::new("close")), 2);
        assert_eq!(element.dispatch(&Event::new("close")), 1);
        assert_eq!(element.label(), "dialog");
    }
}
