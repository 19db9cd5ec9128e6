//! The load balancer: primary and backup groups behind one lock.
//!
//! # Responsibilities
//! - Register servers into their tier
//! - Pick the next server (primary first, backup as fallback)
//! - Apply reported outcomes and keep the primary online counter exact
//! - Raise availability events once the lock is released

use std::error::Error;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::health::{Clock, SystemClock, Transition};
use crate::load_balancer::error::{BalancerError, BalancerResult};
use crate::load_balancer::events::{EventDispatcher, ServerEvent};
use crate::load_balancer::group::ServerGroup;
use crate::load_balancer::server::{Server, ServerId, ServerOptions, Tier};
use crate::observability::metrics;

/// Point-in-time view of one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub id: ServerId,
    pub weight: u32,
    pub is_backup: bool,
    pub is_down: bool,
    pub fail_counter: u32,
    /// Whether this server was the last one picked from its group.
    pub last_picked: bool,
}

/// Everything guarded by the state lock.
struct BalancerState<T> {
    primary: ServerGroup<T>,
    backup: ServerGroup<T>,
    primary_online: usize,
}

impl<T> BalancerState<T> {
    fn group(&self, tier: Tier) -> &ServerGroup<T> {
        match tier {
            Tier::Primary => &self.primary,
            Tier::Backup => &self.backup,
        }
    }

    fn group_mut(&mut self, tier: Tier) -> &mut ServerGroup<T> {
        match tier {
            Tier::Primary => &mut self.primary,
            Tier::Backup => &mut self.backup,
        }
    }
}

/// State shared between the balancer and its server handles.
pub(crate) struct Shared<T> {
    state: Mutex<BalancerState<T>>,
    events: EventDispatcher<T>,
    clock: Arc<dyn Clock>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, BalancerState<T>> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn is_down(&self, id: ServerId) -> bool {
        let state = self.lock();
        state
            .group(id.tier)
            .slot(id.index)
            .map(|slot| slot.health.is_down())
            .unwrap_or(false)
    }

    pub(crate) fn report_success(&self, server: &Server<T>) {
        let id = server.id();
        let (transition, online) = {
            let mut state = self.lock();
            let transition = match state.group_mut(id.tier).slot_mut(id.index) {
                Some(slot) => slot.record_success(),
                None => return,
            };
            if transition == Transition::Up {
                state.primary_online += 1;
            }
            (transition, state.primary_online)
        };

        if transition == Transition::Up {
            tracing::info!(server = %id, primary_online = online, "Server marked up");
            metrics::record_transition(ServerEvent::Up, id);
            metrics::record_primary_online(online);
            self.events.dispatch(ServerEvent::Up, server, None);
        }
    }

    pub(crate) fn report_failure(&self, server: &Server<T>, err: Option<&dyn Error>) {
        let id = server.id();
        let now = self.clock.now();
        let (transition, online) = {
            let mut state = self.lock();
            let transition = match state.group_mut(id.tier).slot_mut(id.index) {
                Some(slot) => slot.record_failure(now),
                None => return,
            };
            if transition == Transition::Down {
                state.primary_online = state.primary_online.saturating_sub(1);
            }
            (transition, state.primary_online)
        };

        if transition == Transition::Down {
            match err {
                Some(e) => tracing::warn!(server = %id, primary_online = online, error = %e, "Server marked down"),
                None => tracing::warn!(server = %id, primary_online = online, "Server marked down"),
            }
            metrics::record_transition(ServerEvent::Down, id);
            metrics::record_primary_online(online);
            self.events.dispatch(ServerEvent::Down, server, err);
        }
    }
}

/// Client-side load balancer over primary and backup upstreams.
///
/// Cloning is cheap and yields another handle to the same balancer.
pub struct LoadBalancer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LoadBalancer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Default for LoadBalancer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LoadBalancer<T> {
    /// Create an empty balancer driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty balancer driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(BalancerState {
                    primary: ServerGroup::new(),
                    backup: ServerGroup::new(),
                    primary_online: 0,
                }),
                events: EventDispatcher::new(),
                clock,
            }),
        }
    }

    /// Register a server. Primaries start up.
    pub fn add(&self, options: ServerOptions, user_data: T) -> BalancerResult<Arc<Server<T>>> {
        options.validate()?;

        let tier = options.tier();
        let (server, online) = {
            let mut state = self.shared.lock();
            let group = state.group_mut(tier);
            let id = ServerId {
                tier,
                index: group.len(),
            };
            let server = Arc::new(Server::new(
                id,
                options,
                user_data,
                Arc::downgrade(&self.shared),
            ));
            group.push(server.clone());
            if tier == Tier::Primary {
                state.primary_online += 1;
            }
            (server, state.primary_online)
        };

        tracing::debug!(
            server = %server.id(),
            weight = options.weight,
            max_fails = options.max_fails,
            fail_timeout = ?options.fail_timeout,
            "Server added"
        );
        if server.is_tracked() {
            metrics::record_server_registered(server.id());
        }
        metrics::record_primary_online(online);
        Ok(server)
    }

    /// Pick the server for the next request.
    ///
    /// Only the bookkeeping is locked; the caller uses the returned server
    /// and then reports the outcome with `set_online` / `set_offline`.
    pub fn next(&self) -> BalancerResult<Arc<Server<T>>> {
        let now = self.shared.clock.now();
        let picked = {
            let mut state = self.shared.lock();
            let BalancerState {
                primary,
                backup,
                primary_online,
            } = &mut *state;

            let from_primary = if *primary_online > 0 || primary.any_selectable(now) {
                primary.select(now)
            } else {
                None
            };
            match from_primary {
                Some(server) => Some(server),
                None => {
                    let server = backup.select(now);
                    if server.is_some() {
                        tracing::debug!(primary_online = *primary_online, "Falling back to backup group");
                    }
                    server
                }
            }
        };

        match picked {
            Some(server) => {
                metrics::record_selection(server.id().tier);
                Ok(server)
            }
            None => {
                tracing::debug!("No available server in any group");
                metrics::record_no_available();
                Err(BalancerError::NoAvailableServer)
            }
        }
    }

    /// Replace the availability event handler.
    ///
    /// The handler runs synchronously on the thread that caused the
    /// transition, without the balancer lock held. It receives the error
    /// passed to `set_offline_with_error`, if any.
    pub fn set_event_handler<F>(&self, handler: F)
    where
        F: Fn(ServerEvent, &Server<T>, Option<&dyn Error>) + Send + Sync + 'static,
    {
        self.shared.events.set(handler);
    }

    /// Remove the event handler; later events are dropped.
    pub fn clear_event_handler(&self) {
        self.shared.events.clear();
    }

    /// Number of primary servers currently not down.
    pub fn primary_online_count(&self) -> usize {
        self.shared.lock().primary_online
    }

    /// Total number of registered servers.
    pub fn len(&self) -> usize {
        let state = self.shared.lock();
        state.primary.len() + state.backup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered servers in tier then insertion order.
    pub fn servers(&self) -> Vec<Arc<Server<T>>> {
        let state = self.shared.lock();
        let servers: Vec<_> = state
            .primary
            .slots()
            .iter()
            .chain(state.backup.slots())
            .map(|slot| slot.server.clone())
            .collect();
        servers
    }

    /// Status of every server, primaries first.
    pub fn snapshot(&self) -> Vec<ServerStatus> {
        let state = self.shared.lock();
        let statuses: Vec<_> = [&state.primary, &state.backup]
            .into_iter()
            .flat_map(|group| {
                let last = group.current_index();
                group.slots().iter().enumerate().map(move |(index, slot)| {
                    let options = slot.server.options();
                    ServerStatus {
                        id: slot.server.id(),
                        weight: options.weight,
                        is_backup: options.is_backup,
                        is_down: slot.health.is_down(),
                        fail_counter: slot.health.fail_counter(),
                        last_picked: last == Some(index),
                    }
                })
            })
            .collect();
        statuses
    }
}
