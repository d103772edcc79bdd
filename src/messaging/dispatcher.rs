use super::event::{ErrorPayload, SystemEvent};
use crate::types::RealtimeError;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Callback registered for an event name. Identity is the `Arc` pointer, so keep
/// a clone around to pass to `off`.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync + 'static>;

/// Wrap a closure as a [`Listener`]
pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// In-process publish/subscribe registry keyed by event name.
///
/// Dispatch iterates a snapshot of the listeners, so a listener may register,
/// deregister, or drive the client re-entrantly while it runs.
#[derive(Default)]
pub struct EventDispatcher {
    bindings: Mutex<HashMap<String, Vec<Listener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event`. Returns `false` if that exact listener was
    /// already registered.
    pub fn on(&self, event: impl Into<String>, listener: Listener) -> bool {
        let mut bindings = self.bindings.lock();
        let listeners = bindings.entry(event.into()).or_default();
        if listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove `listener` from `event`. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, listener: &Listener) -> bool {
        let mut bindings = self.bindings.lock();
        let Some(listeners) = bindings.get_mut(event) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            bindings.remove(event);
        }
        removed
    }

    #[cfg(test)]
    fn listener_count(&self, event: &str) -> usize {
        self.bindings.lock().get(event).map_or(0, Vec::len)
    }

    /// Invoke every listener for `event` in registration order; returns how many ran.
    ///
    /// A panicking listener does not stop the others. Each panic is re-surfaced as
    /// an `error` event, except panics raised by `error` listeners, which are only
    /// logged.
    pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
        let snapshot: Vec<Listener> = self
            .bindings
            .lock()
            .get(event)
            .cloned()
            .unwrap_or_default();

        let mut failures = Vec::new();
        for listener in &snapshot {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| listener(payload))) {
                failures.push(panic_message(panic.as_ref()));
            }
        }

        for message in failures {
            if event == SystemEvent::Error.as_str() {
                tracing::error!("Error listener panicked: {}", message);
                continue;
            }
            let err = RealtimeError::Listener {
                event: event.to_string(),
                message,
            };
            tracing::warn!("{}", err);
            self.dispatch_system(SystemEvent::Error, ErrorPayload::from(&err));
        }

        snapshot.len()
    }

    /// Dispatch a reserved event with a typed payload
    pub(crate) fn dispatch_system(&self, event: SystemEvent, payload: impl Serialize) {
        match serde_json::to_value(payload) {
            Ok(value) => {
                self.dispatch(event.as_str(), &value);
            }
            Err(e) => tracing::error!("Failed to serialize '{}' payload: {}", event, e),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> Listener {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        listener(move |_| log.lock().push(tag.clone()))
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        dispatcher.on("chat.message", recorder(&log, "first"));
        dispatcher.on("chat.message", recorder(&log, "second"));
        dispatcher.on("other", recorder(&log, "other"));

        let ran = dispatcher.dispatch("chat.message", &Value::Null);

        assert_eq!(ran, 2);
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_on_and_off_are_idempotent() {
        let dispatcher = EventDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let l = listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(dispatcher.on("tick", Arc::clone(&l)));
        assert!(!dispatcher.on("tick", Arc::clone(&l)));
        dispatcher.dispatch("tick", &Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(dispatcher.off("tick", &l));
        assert!(!dispatcher.off("tick", &l));
        assert!(!dispatcher.off("never-registered", &l));
        dispatcher.dispatch("tick", &Value::Null);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.listener_count("tick"), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_block_the_next() {
        let dispatcher = EventDispatcher::new();
        let second_calls = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(Mutex::new(Vec::new()));

        dispatcher.on("chat.message", listener(|_| panic!("boom")));
        let counter = Arc::clone(&second_calls);
        dispatcher.on(
            "chat.message",
            listener(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let sink = Arc::clone(&errors);
        dispatcher.on(
            "error",
            listener(move |payload| sink.lock().push(payload.clone())),
        );

        dispatcher.dispatch("chat.message", &Value::Null);
        dispatcher.dispatch("chat.message", &Value::Null);

        assert_eq!(second_calls.load(Ordering::SeqCst), 2);
        let errors = errors.lock();
        assert_eq!(errors.len(), 2);
        let message = errors[0]["message"].as_str().unwrap();
        assert!(message.contains("chat.message"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn test_panicking_error_listener_is_not_redispatched() {
        let dispatcher = EventDispatcher::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        dispatcher.on(
            "error",
            listener(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("error handler is broken");
            }),
        );

        dispatcher.dispatch("error", &serde_json::json!({"message": "x"}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_can_deregister_itself_during_dispatch() {
        let dispatcher = Arc::new(EventDispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));

        let d = Arc::clone(&dispatcher);
        let own = Arc::clone(&slot);
        let once = listener(move |_| {
            if let Some(me) = own.lock().take() {
                d.off("tick", &me);
            }
        });
        *slot.lock() = Some(Arc::clone(&once));
        dispatcher.on("tick", once);
        dispatcher.on("tick", recorder(&log, "after"));

        dispatcher.dispatch("tick", &Value::Null);
        dispatcher.dispatch("tick", &Value::Null);

        assert_eq!(*log.lock(), vec!["after", "after"]);
        assert_eq!(dispatcher.listener_count("tick"), 1);
    }
}
