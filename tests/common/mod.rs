//! Shared helpers for integration tests.

use std::sync::{Arc, Mutex};

use upstream_balancer::health::ManualClock;
use upstream_balancer::{LoadBalancer, ServerEvent};

/// Balancer on a manual clock, plus a handle to that clock.
pub fn manual_balancer<T>() -> (LoadBalancer<T>, ManualClock) {
    let clock = ManualClock::new();
    (LoadBalancer::with_clock(Arc::new(clock.clone())), clock)
}

/// Primaries that are not down, counted from a full snapshot.
#[allow(dead_code)]
pub fn recount_online<T>(lb: &LoadBalancer<T>) -> usize {
    lb.snapshot()
        .iter()
        .filter(|s| !s.is_backup && !s.is_down)
        .count()
}

/// Records every event raised by a balancer.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(ServerEvent, String)>>>,
}

impl EventLog {
    pub fn attach<T: ToString>(&self, lb: &LoadBalancer<T>) {
        let events = self.events.clone();
        lb.set_event_handler(move |event, server, _| {
            events
                .lock()
                .unwrap()
                .push((event, server.user_data().to_string()));
        });
    }

    pub fn take(&self) -> Vec<(ServerEvent, String)> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}
