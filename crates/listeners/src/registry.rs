use crate::event::{Event, EventTarget, Listener, ListenerOptions};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

struct Entry {
    event_type: String,
    /// The listener as the caller passed it; identity comparisons use this.
    listener: Listener,
    /// What the element actually holds. Differs from `listener` for `once`
    /// attachments, which are wrapped to record that they fired.
    attached: Listener,
    options: ListenerOptions,
    fired: Option<Rc<Cell<bool>>>,
}

impl Entry {
    fn new(event_type: &str, listener: &Listener, options: ListenerOptions) -> Self {
        let (attached, fired) = if options.once {
            let fired = Rc::new(Cell::new(false));
            let wrapped = Listener::new({
                let fired = Rc::clone(&fired);
                let listener = listener.clone();
                move |event: &Event| {
                    fired.set(true);
                    listener.call(event);
                }
            });
            (wrapped, Some(fired))
        } else {
            (listener.clone(), None)
        };
        Self { event_type: event_type.to_string(), listener: listener.clone(), attached, options, fired }
    }

    /// A `once` listener that has run; the element has already let go of it.
    fn spent(&self) -> bool {
        self.fired.as_ref().is_some_and(|fired| fired.get())
    }

    fn matches(&self, event_type: &str, listener: &Listener) -> bool {
        self.event_type == event_type && Listener::ptr_eq(&self.listener, listener)
    }
}

struct Tracked<E: ?Sized> {
    element: Weak<E>,
    entries: Vec<Entry>,
}

impl<E: ?Sized> Tracked<E> {
    fn live_entries(&self) -> usize {
        self.entries.iter().filter(|entry| !entry.spent()).count()
    }
}

/// Allocation address of `element`. Stable for as long as any `Rc` or `Weak`
/// to it exists, so it can't be reused by another element while tracked.
fn identity<E: ?Sized>(element: &Rc<E>) -> usize {
    Rc::as_ptr(element).cast::<()>() as usize
}

/// Tracks the listeners attached to each element so they can be detached
/// individually or all at once.
///
/// - Attaching the same listener (by identity) for the same event type to the
///   same element twice is a no-op; the element only ever sees one
///   attachment.
/// - A `once` listener stops being tracked as soon as it fires, so it can be
///   attached again afterwards.
/// - Every operation accepts an absent element and quietly does nothing, so
///   wiring code can run before optional elements exist.
/// - Elements are referenced weakly and keyed by identity. Bookkeeping for
///   elements that have since been dropped is purged whenever a new element
///   starts being tracked, or explicitly via [`purge`](Self::purge).
///
/// # Examples
///
/// ```
/// use ondemand_listeners::{EventTarget, Listener, ListenerOptions, ListenerRegistry};
/// use std::rc::Rc;
///
/// fn wire_nav(registry: &ListenerRegistry, toggle: Option<&Rc<dyn EventTarget>>) {
///     let on_toggle = Listener::new(|_| println!("menu toggled"));
///     registry.add(toggle, "click", &on_toggle, ListenerOptions::default());
/// }
///
/// fn unwire_nav(registry: &ListenerRegistry, toggle: Option<&Rc<dyn EventTarget>>) {
///     registry.remove_all_for_element(toggle);
/// }
/// ```
pub struct ListenerRegistry<E: EventTarget + ?Sized = dyn EventTarget> {
    elements: RefCell<HashMap<usize, Tracked<E>>>,
}

impl<E: EventTarget + ?Sized> ListenerRegistry<E> {
    pub fn new() -> Self {
        Self { elements: RefCell::new(HashMap::new()) }
    }

    /// Attach `listener` to `element` for `event_type`, unless that exact
    /// listener is already attached there.
    ///
    /// Returns `true` if a new attachment was made.
    pub fn add<'e>(
        &self,
        element: impl Into<Option<&'e Rc<E>>>,
        event_type: &str,
        listener: &Listener,
        options: ListenerOptions,
    ) -> bool
    where
        E: 'e,
    {
        let Some(element) = element.into() else {
            return false;
        };
        let attached = {
            let mut elements = self.elements.borrow_mut();
            let key = identity(element);
            if !elements.contains_key(&key) {
                Self::purge_dead(&mut elements);
            }
            let tracked =
                elements.entry(key).or_insert_with(|| Tracked { element: Rc::downgrade(element), entries: Vec::new() });
            tracked.entries.retain(|entry| !entry.spent());
            if tracked.entries.iter().any(|entry| entry.matches(event_type, listener)) {
                tracing::trace!(event_type, "Listener already attached; skipping");
                return false;
            }
            let entry = Entry::new(event_type, listener, options);
            let attached = entry.attached.clone();
            tracked.entries.push(entry);
            attached
        };
        // Outside the borrow: the element is free to call back into the registry.
        element.add_listener(event_type, &attached, options);
        tracing::trace!(event_type, ?options, "Listener attached");
        true
    }

    /// Detach `listener` from `element` for `event_type`, using the options it
    /// was attached with.
    ///
    /// Returns `false` (and does nothing) if no such attachment is tracked.
    pub fn remove<'e>(&self, element: impl Into<Option<&'e Rc<E>>>, event_type: &str, listener: &Listener) -> bool
    where
        E: 'e,
    {
        let Some(element) = element.into() else {
            return false;
        };
        let removed = {
            let mut elements = self.elements.borrow_mut();
            let key = identity(element);
            let Some(tracked) = elements.get_mut(&key) else {
                return false;
            };
            tracked.entries.retain(|entry| !entry.spent());
            let position = tracked.entries.iter().position(|entry| entry.matches(event_type, listener));
            let removed = position.map(|index| tracked.entries.remove(index));
            if tracked.entries.is_empty() {
                elements.remove(&key);
            }
            removed
        };
        let Some(entry) = removed else {
            return false;
        };
        element.remove_listener(&entry.event_type, &entry.attached, entry.options);
        tracing::trace!(event_type, "Listener detached");
        true
    }

    /// Detach every listener tracked for `element` and forget the element.
    ///
    /// Returns the number of listeners detached; untracked or absent elements
    /// detach nothing.
    pub fn remove_all_for_element<'e>(&self, element: impl Into<Option<&'e Rc<E>>>) -> usize
    where
        E: 'e,
    {
        let Some(element) = element.into() else {
            return 0;
        };
        let tracked = self.elements.borrow_mut().remove(&identity(element));
        let Some(tracked) = tracked else {
            return 0;
        };
        let count = Self::detach(element, tracked.entries);
        tracing::debug!(listeners = count, "Detached all listeners from element");
        count
    }

    /// Detach every listener from every element the registry can still reach.
    ///
    /// Elements that have already been dropped are skipped (their listeners
    /// went with them). Teardown code that must be exhaustive should still
    /// hold on to its elements and call
    /// [`remove_all_for_element`](Self::remove_all_for_element) for each.
    pub fn remove_all(&self) -> usize {
        let drained: Vec<Tracked<E>> = self.elements.borrow_mut().drain().map(|(_, tracked)| tracked).collect();
        let mut elements = 0usize;
        let mut count = 0;
        for tracked in drained {
            if let Some(element) = tracked.element.upgrade() {
                elements += 1;
                count += Self::detach(&element, tracked.entries);
            }
        }
        tracing::info!(elements, listeners = count, "Detached all tracked listeners");
        count
    }

    /// Number of listeners currently tracked for `element`.
    pub fn tracked<'e>(&self, element: impl Into<Option<&'e Rc<E>>>) -> usize
    where
        E: 'e,
    {
        let Some(element) = element.into() else {
            return 0;
        };
        self.elements.borrow().get(&identity(element)).map_or(0, Tracked::live_entries)
    }

    /// Number of live elements with at least one tracked listener.
    pub fn len(&self) -> usize {
        self.elements
            .borrow()
            .values()
            .filter(|tracked| tracked.element.strong_count() > 0 && tracked.live_entries() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget the bookkeeping of elements that have been dropped. Returns how
    /// many elements were forgotten.
    pub fn purge(&self) -> usize {
        Self::purge_dead(&mut self.elements.borrow_mut())
    }

    fn purge_dead(elements: &mut HashMap<usize, Tracked<E>>) -> usize {
        let before = elements.len();
        elements.retain(|_, tracked| tracked.element.strong_count() > 0);
        let purged = before - elements.len();
        if purged > 0 {
            tracing::trace!(elements = purged, "Purged listeners of dropped elements");
        }
        purged
    }

    fn detach(element: &Rc<E>, entries: Vec<Entry>) -> usize {
        let live: Vec<Entry> = entries.into_iter().filter(|entry| !entry.spent()).collect();
        for entry in &live {
            element.remove_listener(&entry.event_type, &entry.attached, entry.options);
        }
        live.len()
    }
}

impl<E: EventTarget + ?Sized> Default for ListenerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EventTarget + ?Sized> fmt::Debug for ListenerRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry").field("elements", &self.elements.borrow().len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::mock::MockElement;
    use rstest::rstest;
    use std::cell::Cell;

    fn counting(counter: &Rc<Cell<usize>>) -> Listener {
        let counter = Rc::clone(counter);
        Listener::new(move |_| counter.set(counter.get() + 1))
    }

    #[test]
    fn test_duplicate_add_fires_once() {
        let registry = ListenerRegistry::<MockElement>::new();
        let button = Rc::new(MockElement::new("button"));
        let saves = Rc::new(Cell::new(0));
        let on_save = counting(&saves);

        assert!(registry.add(&button, "click", &on_save, ListenerOptions::default()));
        assert!(!registry.add(&button, "click", &on_save, ListenerOptions::default()));
        assert_eq!(button.attachments(), 1);

        button.dispatch(&Event::new("click"));
        assert_eq!(saves.get(), 1);
        assert_eq!(registry.tracked(&button), 1);
    }

    #[test]
    fn test_same_listener_different_events_or_elements() {
        let registry = ListenerRegistry::<MockElement>::new();
        let form = Rc::new(MockElement::new("form"));
        let input = Rc::new(MockElement::new("input"));
        let calls = Rc::new(Cell::new(0));
        let listener = counting(&calls);

        assert!(registry.add(&form, "submit", &listener, ListenerOptions::default()));
        assert!(registry.add(&form, "reset", &listener, ListenerOptions::default()));
        assert!(registry.add(&input, "submit", &listener, ListenerOptions::default()));
        // A different closure is a different listener, even if it does the same thing.
        assert!(registry.add(&form, "submit", &counting(&calls), ListenerOptions::default()));
        assert_eq!(registry.tracked(&form), 3);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove_uses_recorded_options() {
        let registry = ListenerRegistry::<MockElement>::new();
        let window = Rc::new(MockElement::new("window"));
        let listener = Listener::new(|_| {});
        registry.add(&window, "scroll", &listener, ListenerOptions::default().capture().passive());

        assert!(registry.remove(&window, "scroll", &listener));
        assert_eq!(window.listener_count("scroll"), 0);
        assert_eq!(registry.tracked(&window), 0);
        assert!(registry.is_empty());
        // Second removal: nothing tracked, nothing detached.
        assert!(!registry.remove(&window, "scroll", &listener));
    }

    #[test]
    fn test_once_listener_can_be_added_again_after_firing() {
        let registry = ListenerRegistry::<MockElement>::new();
        let banner = Rc::new(MockElement::new("banner"));
        let calls = Rc::new(Cell::new(0));
        let dismiss = counting(&calls);

        assert!(registry.add(&banner, "click", &dismiss, ListenerOptions::default().once()));
        assert_eq!(banner.dispatch(&Event::new("click")), 1);
        assert_eq!(registry.tracked(&banner), 0);
        assert!(registry.is_empty());

        assert!(registry.add(&banner, "click", &dismiss, ListenerOptions::default().once()));
        assert_eq!(banner.dispatch(&Event::new("click")), 1);
        assert_eq!(calls.get(), 2);
        assert_eq!(banner.dispatch(&Event::new("click")), 0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_unfired_once_listener_is_still_a_duplicate() {
        let registry = ListenerRegistry::<MockElement>::new();
        let banner = Rc::new(MockElement::new("banner"));
        let calls = Rc::new(Cell::new(0));
        let dismiss = counting(&calls);

        assert!(registry.add(&banner, "click", &dismiss, ListenerOptions::default().once()));
        assert!(!registry.add(&banner, "click", &dismiss, ListenerOptions::default().once()));
        assert_eq!(banner.listener_count("click"), 1);
        banner.dispatch(&Event::new("click"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_remove_detaches_unfired_once_listener() {
        let registry = ListenerRegistry::<MockElement>::new();
        let toast = Rc::new(MockElement::new("toast"));
        let calls = Rc::new(Cell::new(0));
        let dismiss = counting(&calls);
        registry.add(&toast, "click", &dismiss, ListenerOptions::default().once());

        assert!(registry.remove(&toast, "click", &dismiss));
        assert_eq!(toast.listener_count("click"), 0);
        toast.dispatch(&Event::new("click"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_fired_once_listener_is_not_counted_on_removal() {
        let registry = ListenerRegistry::<MockElement>::new();
        let toast = Rc::new(MockElement::new("toast"));
        let dismiss = Listener::new(|_| {});
        registry.add(&toast, "click", &dismiss, ListenerOptions::default().once());
        registry.add(&toast, "keydown", &Listener::new(|_| {}), ListenerOptions::default());
        toast.dispatch(&Event::new("click"));

        assert_eq!(registry.tracked(&toast), 1);
        assert!(!registry.remove(&toast, "click", &dismiss));
        assert_eq!(registry.remove_all_for_element(&toast), 1);
        assert_eq!(toast.listener_count("keydown"), 0);
    }

    #[test]
    fn test_remove_unknown_listener_is_noop() {
        let registry = ListenerRegistry::<MockElement>::new();
        let modal = Rc::new(MockElement::new("modal"));
        let tracked = Listener::new(|_| {});
        registry.add(&modal, "keydown", &tracked, ListenerOptions::default());

        assert!(!registry.remove(&modal, "keydown", &Listener::new(|_| {})));
        assert!(!registry.remove(&modal, "keyup", &tracked));
        assert_eq!(modal.listener_count("keydown"), 1);
    }

    #[test]
    fn test_remove_all_for_element() {
        let registry = ListenerRegistry::<MockElement>::new();
        let nav = Rc::new(MockElement::new("nav"));
        let calls = Rc::new(Cell::new(0));
        for event_type in ["click", "mouseenter", "mouseleave"] {
            registry.add(&nav, event_type, &counting(&calls), ListenerOptions::default());
        }

        assert_eq!(registry.remove_all_for_element(&nav), 3);
        for event_type in ["click", "mouseenter", "mouseleave"] {
            nav.dispatch(&Event::new(event_type));
        }
        assert_eq!(calls.get(), 0);
        assert_eq!(registry.tracked(&nav), 0);
        assert_eq!(registry.remove_all_for_element(&nav), 0);
    }

    #[rstest]
    #[case("add")]
    #[case("remove")]
    #[case("remove_all_for_element")]
    #[case("tracked")]
    fn test_absent_element_is_noop(#[case] operation: &str) {
        let registry = ListenerRegistry::<MockElement>::new();
        let listener = Listener::new(|_| {});
        let absent: Option<&Rc<MockElement>> = None;
        let changed = match operation {
            "add" => registry.add(absent, "click", &listener, ListenerOptions::default()),
            "remove" => registry.remove(absent, "click", &listener),
            "remove_all_for_element" => registry.remove_all_for_element(absent) > 0,
            "tracked" => registry.tracked(absent) > 0,
            _ => unreachable!(),
        };
        assert!(!changed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_elements_are_not_kept_alive() {
        let registry = ListenerRegistry::<MockElement>::new();
        let tooltip = Rc::new(MockElement::new("tooltip"));
        let weak = Rc::downgrade(&tooltip);
        registry.add(&tooltip, "mouseenter", &Listener::new(|_| {}), ListenerOptions::default());
        assert_eq!(registry.len(), 1);

        drop(tooltip);
        assert!(weak.upgrade().is_none());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.purge(), 1);
        assert_eq!(registry.purge(), 0);
    }

    #[test]
    fn test_new_element_purges_dropped_ones() {
        let registry = ListenerRegistry::<MockElement>::new();
        let first = Rc::new(MockElement::new("first"));
        registry.add(&first, "click", &Listener::new(|_| {}), ListenerOptions::default());
        drop(first);

        let second = Rc::new(MockElement::new("second"));
        registry.add(&second, "click", &Listener::new(|_| {}), ListenerOptions::default());
        assert_eq!(registry.purge(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_all_skips_dropped_elements() {
        let registry = ListenerRegistry::<MockElement>::new();
        let kept = Rc::new(MockElement::new("kept"));
        let dropped = Rc::new(MockElement::new("dropped"));
        let calls = Rc::new(Cell::new(0));
        registry.add(&kept, "click", &counting(&calls), ListenerOptions::default());
        registry.add(&kept, "focus", &counting(&calls), ListenerOptions::default());
        registry.add(&dropped, "click", &counting(&calls), ListenerOptions::default());
        drop(dropped);

        assert_eq!(registry.remove_all(), 2);
        kept.dispatch(&Event::new("click"));
        assert_eq!(calls.get(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_heterogeneous_targets() {
        let registry: ListenerRegistry = ListenerRegistry::new();
        let button = Rc::new(MockElement::new("button"));
        let target: Rc<dyn EventTarget> = button.clone();
        let calls = Rc::new(Cell::new(0));
        let listener = counting(&calls);

        assert!(registry.add(&target, "click", &listener, ListenerOptions::default()));
        assert!(!registry.add(&target, "click", &listener, ListenerOptions::default()));
        button.dispatch(&Event::new("click"));
        assert_eq!(calls.get(), 1);
        assert!(registry.remove(&target, "click", &listener));
    }

    #[test]
    fn test_listener_may_reenter_registry() {
        let registry = Rc::new(ListenerRegistry::<MockElement>::new());
        let dialog = Rc::new(MockElement::new("dialog"));
        let close = Rc::new(RefCell::new(None::<Listener>));
        let listener = Listener::new({
            let registry = Rc::clone(&registry);
            let dialog = Rc::downgrade(&dialog);
            let close = Rc::clone(&close);
            move |event: &Event| {
                if let (Some(dialog), Some(me)) = (dialog.upgrade(), close.borrow().as_ref()) {
                    registry.remove(&dialog, event.event_type(), me);
                }
            }
        });
        *close.borrow_mut() = Some(listener.clone());
        registry.add(&dialog, "close", &listener, ListenerOptions::default());

        assert_eq!(dialog.dispatch(&Event::new("close")), 1);
        assert_eq!(registry.tracked(&dialog), 0);
        assert_eq!(dialog.dispatch(&Event::new("close")), 0);
    }
}
