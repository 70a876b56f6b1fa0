//! Synchronous event dispatch with ambient detail maps.
//!
//! `veneer-dispatch` is the observability seam of the veneer rendering
//! pipeline. Components register listeners under an event name; other
//! components attach *ambient details* — key/value pairs that should ride
//! along with every dispatch under that name until detached. A dispatch
//! merges the ambient details with the call-specific ones (call-specific
//! keys win) and invokes every listener once, in registration order.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use serde_json::json;
//! use veneer_dispatch::{Details, EventDispatcher};
//!
//! let dispatcher = EventDispatcher::new();
//! let seen: Rc<RefCell<Vec<Details>>> = Rc::new(RefCell::new(Vec::new()));
//!
//! let seen_clone = seen.clone();
//! dispatcher.add_listener("template_error", Rc::new(move |details| {
//!     seen_clone.borrow_mut().push(details.clone());
//! }));
//!
//! let mut ambient = Details::new();
//! ambient.insert("template".into(), json!("todos/list"));
//! dispatcher.attach_details("template_error", ambient);
//!
//! let mut event = Details::new();
//! event.insert("error".into(), json!("boom"));
//! dispatcher.dispatch("template_error", event);
//!
//! let merged = &seen.borrow()[0];
//! assert_eq!(merged["template"], json!("todos/list"));
//! assert_eq!(merged["error"], json!("boom"));
//! ```
//!
//! Listener failures are not caught here; a panicking listener unwinds
//! through `dispatch` to the caller.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A detail map carried by an event.
///
/// Uses [`serde_json::Map`] so payloads can hold arbitrary structured data
/// and serialize directly.
pub type Details = serde_json::Map<String, serde_json::Value>;

/// A registered event listener.
///
/// Listeners are invoked synchronously with the merged detail map.
pub type Listener = Rc<dyn Fn(&Details)>;

/// Event dispatcher with per-event listener lists and ambient detail maps.
///
/// All state lives behind `RefCell` so the dispatcher can be shared via
/// `Rc` between pipeline stages that only hold `&self`. The pipeline is
/// single-threaded, so no locking is involved.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RefCell<HashMap<String, Vec<Listener>>>,
    ambient: RefCell<HashMap<String, Details>>,
}

impl EventDispatcher {
    /// Creates an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener for `event`. Listeners fire in registration
    /// order; the same listener may be registered more than once.
    pub fn add_listener(&self, event: &str, listener: Listener) {
        self.listeners
            .borrow_mut()
            .entry(event.to_string())
            .or_default()
            .push(listener);
    }

    /// Removes every registration of `listener` under `event`.
    ///
    /// Identity is the callback itself: two `Rc` clones of the same closure
    /// compare equal, two separately-built closures do not.
    pub fn remove_listener(&self, event: &str, listener: &Listener) {
        let mut listeners = self.listeners.borrow_mut();
        if let Some(list) = listeners.get_mut(event) {
            let target = Rc::as_ptr(listener) as *const u8;
            list.retain(|l| Rc::as_ptr(l) as *const u8 != target);
            if list.is_empty() {
                listeners.remove(event);
            }
        }
    }

    /// Returns the number of listeners registered under `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .borrow()
            .get(event)
            .map_or(0, |list| list.len())
    }

    /// Attaches ambient details to `event`. Until detached, every dispatch
    /// under that name sees these entries merged into its payload. Attaching
    /// an existing key overwrites its value.
    pub fn attach_details(&self, event: &str, details: Details) {
        let mut ambient = self.ambient.borrow_mut();
        let entry = ambient.entry(event.to_string()).or_default();
        for (key, value) in details {
            entry.insert(key, value);
        }
    }

    /// Detaches ambient details from `event`.
    ///
    /// Removes exactly the keys present in `details`, regardless of the
    /// values currently stored under them.
    pub fn detach_details(&self, event: &str, details: &Details) {
        let mut ambient = self.ambient.borrow_mut();
        if let Some(entry) = ambient.get_mut(event) {
            for key in details.keys() {
                entry.remove(key);
            }
            if entry.is_empty() {
                ambient.remove(event);
            }
        }
    }

    /// Returns a copy of the ambient details currently attached to `event`.
    pub fn ambient_details(&self, event: &str) -> Details {
        self.ambient
            .borrow()
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    /// Dispatches `event` with `details`.
    ///
    /// The payload handed to each listener is the ambient details for the
    /// event merged with `details`; call-specific keys win on collision.
    /// Listeners run synchronously, in registration order. The listener list
    /// is snapshotted first, so a listener may add or remove listeners
    /// without affecting the in-flight dispatch.
    pub fn dispatch(&self, event: &str, details: Details) {
        let mut merged = self.ambient_details(event);
        for (key, value) in details {
            merged.insert(key, value);
        }

        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .get(event)
            .map(|list| list.to_vec())
            .unwrap_or_default();

        for listener in snapshot {
            listener(&merged);
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.borrow();
        let counts: HashMap<&String, usize> =
            listeners.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("EventDispatcher")
            .field("listeners", &counts)
            .field("ambient_events", &self.ambient.borrow().keys().len())
            .finish()
    }
}
