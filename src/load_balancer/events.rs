//! Availability change notifications.
//!
//! The handler is held in an `ArcSwapOption` so it can be replaced while
//! traffic flows and loaded without touching the balancer's state lock.
//! Dispatch always happens after that lock is released, on the thread that
//! caused the transition.

use std::error::Error;

use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::sync::Arc;

use crate::load_balancer::server::Server;

/// A server changed availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerEvent {
    Up,
    Down,
}

impl ServerEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerEvent::Up => "up",
            ServerEvent::Down => "down",
        }
    }
}

type HandlerFn<T> = dyn Fn(ServerEvent, &Server<T>, Option<&dyn Error>) + Send + Sync;

struct EventHandler<T>(Box<HandlerFn<T>>);

/// Holds the single registered handler.
pub(crate) struct EventDispatcher<T> {
    handler: ArcSwapOption<EventHandler<T>>,
}

impl<T> EventDispatcher<T> {
    pub(crate) fn new() -> Self {
        Self {
            handler: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn set<F>(&self, handler: F)
    where
        F: Fn(ServerEvent, &Server<T>, Option<&dyn Error>) + Send + Sync + 'static,
    {
        self.handler
            .store(Some(Arc::new(EventHandler(Box::new(handler)))));
    }

    pub(crate) fn clear(&self) {
        self.handler.store(None);
    }

    /// Invoke the current handler, if any. Must not be called with the
    /// balancer lock held.
    pub(crate) fn dispatch(&self, event: ServerEvent, server: &Server<T>, err: Option<&dyn Error>) {
        // Owned Arc so a handler may swap itself out while running.
        if let Some(handler) = self.handler.load_full() {
            (handler.0)(event, server, err);
        }
    }
}
