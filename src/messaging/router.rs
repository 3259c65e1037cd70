use super::{ControlFrame, EventKind};
use crate::types::message::{InboundFrame, RealtimeEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Callback invoked for every application event of a subscribed kind
pub type EventCallback = Arc<dyn Fn(&RealtimeEvent) + Send + Sync + 'static>;

/// Outcome of routing one inbound text frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// Keep-alive frame; the caller owns the reply
    Control(ControlFrame),
    /// Application event delivered to its subscribers
    Event(EventKind),
    /// Malformed frame, logged and discarded
    Dropped,
}

#[derive(Default)]
struct EventBindings {
    by_kind: HashMap<EventKind, Vec<EventCallback>>,
    any: Vec<EventCallback>,
}

/// Classifies inbound frames and fans application events out to subscribers
#[derive(Default)]
pub struct EventDispatcher {
    bindings: Mutex<EventBindings>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for one event kind.
    ///
    /// Registering the same callback twice makes it run twice per event.
    pub fn on(&self, kind: EventKind, callback: EventCallback) {
        if !kind.is_known() {
            tracing::debug!("Registering listener for custom event kind '{}'", kind);
        }
        self.bindings
            .lock()
            .by_kind
            .entry(kind)
            .or_default()
            .push(callback);
    }

    /// Removes the first registration of `callback` for `kind`.
    /// Returns whether anything was removed.
    pub fn off(&self, kind: &EventKind, callback: &EventCallback) -> bool {
        let mut bindings = self.bindings.lock();
        let Some(callbacks) = bindings.by_kind.get_mut(kind) else {
            return false;
        };
        let removed = remove_first(callbacks, callback);
        if callbacks.is_empty() {
            bindings.by_kind.remove(kind);
        }
        removed
    }

    /// Registers a callback that receives every application event
    pub fn on_any(&self, callback: EventCallback) {
        self.bindings.lock().any.push(callback);
    }

    pub fn off_any(&self, callback: &EventCallback) -> bool {
        remove_first(&mut self.bindings.lock().any, callback)
    }

    /// Number of callbacks registered for `kind`
    pub fn listener_count(&self, kind: &EventKind) -> usize {
        self.bindings
            .lock()
            .by_kind
            .get(kind)
            .map_or(0, Vec::len)
    }

    /// Drops every registration
    pub fn clear(&self) {
        let mut bindings = self.bindings.lock();
        bindings.by_kind.clear();
        bindings.any.clear();
    }

    /// Parses a text frame and delivers it if it is an application event
    pub fn route(&self, text: &str) -> Routed {
        match InboundFrame::parse(text) {
            Ok(InboundFrame::Control(control)) => Routed::Control(control),
            Ok(InboundFrame::Event(event)) => {
                let kind = event.kind();
                self.deliver(&event);
                Routed::Event(kind)
            }
            Err(e) => {
                tracing::warn!("Dropping malformed frame: {} - Raw: {}", e, text);
                Routed::Dropped
            }
        }
    }

    /// Invokes the subscribers of the event's kind in registration order,
    /// then the wildcard subscribers.
    pub fn deliver(&self, event: &RealtimeEvent) {
        let kind = event.kind();

        // Clone the Arc'd callbacks so listeners may call on/off re-entrantly
        let callbacks: Vec<EventCallback> = {
            let bindings = self.bindings.lock();
            bindings
                .by_kind
                .get(&kind)
                .into_iter()
                .flatten()
                .chain(bindings.any.iter())
                .cloned()
                .collect()
        };

        tracing::debug!(
            "Delivering event {} to {} listener(s)",
            kind.as_str(),
            callbacks.len()
        );

        for callback in callbacks {
            invoke_isolated(kind.as_str(), || callback(event));
        }
    }
}

fn remove_first(callbacks: &mut Vec<EventCallback>, callback: &EventCallback) -> bool {
    match callbacks
        .iter()
        .position(|registered| std::ptr::addr_eq(Arc::as_ptr(registered), Arc::as_ptr(callback)))
    {
        Some(index) => {
            callbacks.remove(index);
            true
        }
        None => false,
    }
}

/// Runs a listener, catching and logging a panic so later listeners still run
pub(crate) fn invoke_isolated(label: &str, f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!("Listener for \"{}\" panicked: {}", label, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    const NEW_MESSAGE: &str = r#"{"type":"new_message","chat_id":"c-1","channel_id":"ch-1","message_id":"m-1","sender_type":"CONTACT","timestamp":"2024-05-01T10:15:00Z"}"#;

    fn recorder(log: &Arc<StdMutex<Vec<String>>>, name: &str) -> EventCallback {
        let log = Arc::clone(log);
        let name = name.to_string();
        Arc::new(move |event: &RealtimeEvent| {
            log.lock()
                .unwrap()
                .push(format!("{}:{}", name, event.kind()));
        })
    }

    #[test]
    fn test_delivers_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        dispatcher.on(EventKind::NewMessage, recorder(&log, "first"));
        dispatcher.on(EventKind::NewMessage, recorder(&log, "second"));
        dispatcher.on(EventKind::ChatDeleted, recorder(&log, "other"));

        assert_eq!(dispatcher.route(NEW_MESSAGE), Routed::Event(EventKind::NewMessage));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:new_message", "second:new_message"]
        );
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        dispatcher.on(
            EventKind::NewMessage,
            Arc::new(|_: &RealtimeEvent| panic!("listener failure")),
        );
        dispatcher.on(EventKind::NewMessage, recorder(&log, "second"));

        dispatcher.route(NEW_MESSAGE);
        assert_eq!(*log.lock().unwrap(), vec!["second:new_message"]);
    }

    #[test]
    fn test_control_frames_skip_listeners() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        dispatcher.on(EventKind::Custom("ping".to_string()), recorder(&log, "ping"));
        dispatcher.on_any(recorder(&log, "any"));

        assert_eq!(
            dispatcher.route(r#"{"type":"ping"}"#),
            Routed::Control(ControlFrame::Ping)
        );
        assert_eq!(
            dispatcher.route(r#"{"type":"pong"}"#),
            Routed::Control(ControlFrame::Pong)
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        dispatcher.on_any(recorder(&log, "any"));

        assert_eq!(dispatcher.route("{oops"), Routed::Dropped);
        assert_eq!(dispatcher.route(r#"{"chat_id":"c-1"}"#), Routed::Dropped);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_registration_and_off_removes_first_only() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let callback = recorder(&log, "dup");
        dispatcher.on(EventKind::NewMessage, Arc::clone(&callback));
        dispatcher.on(EventKind::NewMessage, Arc::clone(&callback));

        dispatcher.route(NEW_MESSAGE);
        assert_eq!(log.lock().unwrap().len(), 2);

        assert!(dispatcher.off(&EventKind::NewMessage, &callback));
        assert_eq!(dispatcher.listener_count(&EventKind::NewMessage), 1);

        dispatcher.route(NEW_MESSAGE);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_off_unknown_callback_is_noop() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let registered = recorder(&log, "registered");
        let stranger = recorder(&log, "stranger");
        dispatcher.on(EventKind::NewMessage, Arc::clone(&registered));

        assert!(!dispatcher.off(&EventKind::NewMessage, &stranger));
        assert!(!dispatcher.off(&EventKind::ChatUpdated, &registered));
        assert_eq!(dispatcher.listener_count(&EventKind::NewMessage), 1);
    }

    #[test]
    fn test_unknown_kind_reaches_literal_subscribers() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        dispatcher.on(EventKind::from("typing"), recorder(&log, "typing"));
        dispatcher.on_any(recorder(&log, "any"));

        dispatcher.route(r#"{"type":"typing","chat_id":"c-2"}"#);
        assert_eq!(*log.lock().unwrap(), vec!["typing:typing", "any:typing"]);
    }

    #[test]
    fn test_listener_may_unregister_itself() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let calls = Arc::new(StdMutex::new(0));
        let slot: Arc<StdMutex<Option<EventCallback>>> = Arc::new(StdMutex::new(None));

        let callback: EventCallback = {
            let dispatcher = Arc::clone(&dispatcher);
            let calls = Arc::clone(&calls);
            let slot = Arc::clone(&slot);
            Arc::new(move |_: &RealtimeEvent| {
                *calls.lock().unwrap() += 1;
                if let Some(me) = slot.lock().unwrap().take() {
                    dispatcher.off(&EventKind::NewMessage, &me);
                }
            })
        };
        *slot.lock().unwrap() = Some(Arc::clone(&callback));
        dispatcher.on(EventKind::NewMessage, callback);

        dispatcher.route(NEW_MESSAGE);
        dispatcher.route(NEW_MESSAGE);
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
