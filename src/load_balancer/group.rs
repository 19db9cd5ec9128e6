//! Smooth weighted round-robin over one tier of servers.
//!
//! Every pick adds each selectable server's weight to its running
//! `current_weight`, hands out the server with the highest running value
//! (first one wins ties) and subtracts the total selectable weight from it.
//! Weights 3 and 1 yield `A A B A`, never `A A A B`.

use std::sync::Arc;
use std::time::Instant;

use crate::health::{ServerHealth, Transition};
use crate::load_balancer::server::Server;

/// A server plus the mutable state the balancer keeps for it.
pub(crate) struct Slot<T> {
    pub(crate) server: Arc<Server<T>>,
    pub(crate) health: ServerHealth,
    current_weight: i64,
}

impl<T> Slot<T> {
    fn new(server: Arc<Server<T>>) -> Self {
        Self {
            server,
            health: ServerHealth::new(),
            current_weight: 0,
        }
    }

    fn weight(&self) -> i64 {
        i64::from(self.server.options().effective_weight())
    }

    pub(crate) fn record_success(&mut self) -> Transition {
        let policy = self.server.options().policy();
        let transition = self.health.record_success(&policy);
        if transition == Transition::Up {
            // Drop credit accumulated before the outage so it does not burst.
            self.current_weight = 0;
        }
        transition
    }

    pub(crate) fn record_failure(&mut self, now: Instant) -> Transition {
        let policy = self.server.options().policy();
        self.health.record_failure(now, &policy)
    }
}

/// Ordered servers of one tier plus the selection cursor.
pub(crate) struct ServerGroup<T> {
    slots: Vec<Slot<T>>,
    current_index: Option<usize>,
}

impl<T> ServerGroup<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            current_index: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn push(&mut self, server: Arc<Server<T>>) {
        self.slots.push(Slot::new(server));
    }

    pub(crate) fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&Slot<T>> {
        self.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Slot<T>> {
        self.slots.get_mut(index)
    }

    /// Index of the last server handed out.
    pub(crate) fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub(crate) fn any_selectable(&self, now: Instant) -> bool {
        self.slots.iter().any(|s| s.health.is_selectable(now))
    }

    /// Pick the next server, or `None` if nothing is selectable at `now`.
    ///
    /// A down server past its recovery deadline takes part like any other;
    /// picking it re-arms its deadline.
    pub(crate) fn select(&mut self, now: Instant) -> Option<Arc<Server<T>>> {
        let mut total = 0i64;
        let mut best: Option<(usize, i64)> = None;

        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !slot.health.is_selectable(now) {
                continue;
            }
            let weight = slot.weight();
            slot.current_weight += weight;
            total += weight;

            match best {
                Some((_, best_weight)) if slot.current_weight <= best_weight => {}
                _ => best = Some((index, slot.current_weight)),
            }
        }

        let (index, _) = best?;
        let slot = &mut self.slots[index];
        slot.current_weight -= total;
        if slot.health.is_down() {
            let policy = slot.server.options().policy();
            slot.health.begin_probe(now, &policy);
            tracing::debug!(server = %slot.server.id(), "Probing down server past its recovery deadline");
        }
        self.current_index = Some(index);
        Some(slot.server.clone())
    }
}
