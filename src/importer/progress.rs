//! Progress reporting for import runs.
//!
//! A [`ProgressBus`] is created by the caller and handed to the importer.
//! Listeners are registered with [`ProgressBus::subscribe`] and stay
//! registered until the returned [`Subscription`] is dropped. A listener that
//! fails or panics is logged and skipped; it never aborts the import.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;

/// One progress notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub message: String,
    /// 0-100
    pub percent: Option<u8>,
}

pub type ListenerResult = std::result::Result<(), String>;

type Listener = Arc<dyn Fn(&ProgressUpdate) -> ListenerResult + Send + Sync>;

#[derive(Default)]
struct BusState {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

fn lock(state: &Mutex<BusState>) -> MutexGuard<'_, BusState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct ProgressBus {
    state: Arc<Mutex<BusState>>,
}

impl ProgressBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ProgressUpdate) -> ListenerResult + Send + Sync + 'static,
    {
        let mut state = lock(&self.state);
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, Arc::new(listener)));
        log::debug!("progress: subscribe, {} listeners", state.listeners.len());

        Subscription {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.state).listeners.len()
    }

    /// Broadcast an update to every listener
    pub fn emit(&self, message: impl Into<String>, percent: Option<u8>) {
        let update = ProgressUpdate {
            message: message.into(),
            percent: percent.map(|p| p.min(100)),
        };

        // Call listeners outside the lock so they may subscribe or unsubscribe
        let listeners: Vec<Listener> = lock(&self.state)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        log::debug!(
            "progress: {:?} {:?} -> {} listeners",
            update.message,
            update.percent,
            listeners.len()
        );

        for listener in listeners {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(&update))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("progress listener error: {}", e),
                Err(_) => log::warn!("progress listener panicked on {:?}", update.message),
            }
        }
    }
}

/// Keeps a listener registered; dropping it unsubscribes
pub struct Subscription {
    state: Weak<Mutex<BusState>>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            let mut state = lock(&state);
            state.listeners.retain(|(id, _)| *id != self.id);
            log::debug!("progress: unsubscribe, {} listeners", state.listeners.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &ProgressBus) -> (Arc<Mutex<Vec<ProgressUpdate>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = bus.subscribe(move |u| {
            sink.lock().unwrap().push(u.clone());
            Ok(())
        });
        (seen, sub)
    }

    #[test]
    fn test_emit_reaches_listeners() {
        let bus = ProgressBus::new();
        let (seen, _sub) = recorder(&bus);

        bus.emit("start", Some(60));
        bus.emit("no percent", None);
        bus.emit("clamped", Some(250));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].percent, Some(60));
        assert_eq!(seen[1].percent, None);
        assert_eq!(seen[2].percent, Some(100));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = ProgressBus::new();
        let (seen, sub) = recorder(&bus);
        assert_eq!(bus.listener_count(), 1);

        drop(sub);
        assert_eq!(bus.listener_count(), 0);

        bus.emit("ignored", Some(1));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failing_listeners_are_isolated() {
        let bus = ProgressBus::new();
        let _failing = bus.subscribe(|_| Err("boom".to_string()));
        let _panicking = bus.subscribe(|_| panic!("listener bug"));
        let (seen, _sub) = recorder(&bus);

        bus.emit("still delivered", Some(10));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_separate_buses_are_isolated() {
        let a = ProgressBus::new();
        let b = ProgressBus::new();
        let (seen_a, _sa) = recorder(&a);

        b.emit("other run", Some(50));
        assert!(seen_a.lock().unwrap().is_empty());
    }
}
