use crate::error::Error;
use crate::frame::Frame;
use crate::message::Message;
use std::sync::{Arc, Mutex};

/// Implemented by user code that wants to observe connection lifecycle and
/// frame-level events. Every method has a default no-op body so callers only
/// override what they care about. All callbacks run synchronously on the
/// task that produced the event (reader, writer, or the connect task for
/// `on_connected`); a listener that needs to do async work should hand the
/// event off to a channel rather than block here.
pub trait WebSocketListener: Send + Sync {
    fn on_connected(&self) {}
    fn on_disconnected(&self, _server_close: bool, _client_close: bool, _closed_by_server: bool) {}
    fn on_sending_frame(&self, _frame: &Frame) {}
    fn on_frame_sent(&self, _frame: &Frame) {}
    fn on_frame_unsent(&self, _frame: &Frame) {}
    fn on_send_error(&self, _error: &Error) {}
    fn on_message(&self, _message: &Message) {}
    fn on_error(&self, _error: &Error) {}
    /// Terminal sink: invoked when a callback above panics or the listener's
    /// own bookkeeping fails. Errors raised from here are swallowed.
    fn handle_callback_error(&self, _error: &Error) {}
}

/// Insertion-ordered, copy-on-write listener registry. Emissions iterate a
/// clone of the `Arc` list taken at call time, so a listener registered
/// during an emission is observed only by the next one.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    listeners: Arc<Mutex<Vec<Arc<dyn WebSocketListener>>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn WebSocketListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn snapshot(&self) -> Vec<Arc<dyn WebSocketListener>> {
        self.listeners.lock().unwrap().clone()
    }

    pub fn emit(&self, f: impl Fn(&dyn WebSocketListener)) {
        for listener in self.snapshot() {
            let listener_ref = listener.as_ref();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                f(listener_ref);
            }));
            if result.is_err() {
                log::error!("websocket listener callback panicked");
            }
        }
    }

    pub fn on_connected(&self) {
        self.emit(|l| l.on_connected());
    }

    pub fn on_disconnected(&self, server_close: bool, client_close: bool, closed_by_server: bool) {
        self.emit(|l| l.on_disconnected(server_close, client_close, closed_by_server));
    }

    pub fn on_sending_frame(&self, frame: &Frame) {
        self.emit(|l| l.on_sending_frame(frame));
    }

    pub fn on_frame_sent(&self, frame: &Frame) {
        self.emit(|l| l.on_frame_sent(frame));
    }

    pub fn on_frame_unsent(&self, frame: &Frame) {
        self.emit(|l| l.on_frame_unsent(frame));
    }

    pub fn on_send_error(&self, error: &Error) {
        self.emit(|l| l.on_send_error(error));
    }

    pub fn on_message(&self, message: &Message) {
        self.emit(|l| l.on_message(message));
    }

    pub fn on_error(&self, error: &Error) {
        self.emit(|l| l.on_error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: AtomicUsize,
    }

    impl WebSocketListener for CountingListener {
        fn on_connected(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emits_to_all_registered_listeners() {
        let registry = ListenerRegistry::new();
        let listener = Arc::new(CountingListener {
            count: AtomicUsize::new(0),
        });
        registry.register(listener.clone());
        registry.register(listener.clone());

        registry.on_connected();

        assert_eq!(listener.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_added_during_emission_is_not_observed_by_it() {
        let registry = ListenerRegistry::new();
        let late_registered = Arc::new(CountingListener {
            count: AtomicUsize::new(0),
        });
        let late_clone = late_registered.clone();
        let registry_clone = registry.clone();

        struct Registerer {
            registry: ListenerRegistry,
            target: Arc<CountingListener>,
        }
        impl WebSocketListener for Registerer {
            fn on_connected(&self) {
                self.registry.register(self.target.clone());
            }
        }

        registry.register(Arc::new(Registerer {
            registry: registry_clone,
            target: late_clone,
        }));

        registry.on_connected();
        assert_eq!(late_registered.count.load(Ordering::SeqCst), 0);

        registry.on_connected();
        assert_eq!(late_registered.count.load(Ordering::SeqCst), 1);
    }
}
