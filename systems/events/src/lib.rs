#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Hook subscriptions and fan-out delivery.
//!
//! Handlers run on the simulation thread in registration order. A handler
//! that returns an error or panics is logged and skipped; delivery continues
//! with the next subscriber. Subscriptions may be disposed at any time,
//! including from inside a handler while an event is being delivered.

use std::{
    cell::RefCell,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::{Rc, Weak},
};

use parkscript_core::{HookEvent, HookType, PluginId};
use tracing::{debug, warn};

/// Callback invoked with each event delivered on a subscribed hook.
pub type HookHandler = Box<dyn FnMut(&HookEvent) -> anyhow::Result<()>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    hook: HookType,
    owner: Option<PluginId>,
    // Taken out while the handler runs.
    handler: Option<HookHandler>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    entries: Vec<Entry>,
}

impl HubState {
    fn position(&self, id: SubscriptionId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }
}

/// Registry of hook subscriptions.
#[derive(Clone, Default)]
pub struct EventHub {
    state: Rc<RefCell<HubState>>,
}

impl EventHub {
    /// Creates a hub without subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to `hook` and returns the disposal token.
    pub fn subscribe<F>(&self, hook: HookType, owner: Option<PluginId>, handler: F) -> Subscription
    where
        F: FnMut(&HookEvent) -> anyhow::Result<()> + 'static,
    {
        let mut state = self.state.borrow_mut();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.entries.push(Entry {
            id,
            hook,
            owner,
            handler: Some(Box::new(handler)),
        });
        debug!(target: "events", hook = hook.as_str(), subscription = id.0, "subscribed");
        Subscription {
            id,
            hub: Rc::downgrade(&self.state),
        }
    }

    /// Delivers `event` to every subscriber of its hook and returns how many ran.
    ///
    /// Subscribers added during delivery first receive the next event.
    pub fn publish(&self, event: &HookEvent) -> usize {
        let hook = event.hook();
        let targets: Vec<SubscriptionId> = self
            .state
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.hook == hook)
            .map(|entry| entry.id)
            .collect();

        let mut delivered = 0;
        for id in targets {
            let handler = {
                let mut state = self.state.borrow_mut();
                state
                    .position(id)
                    .and_then(|index| state.entries[index].handler.take())
            };
            let Some(mut handler) = handler else {
                continue;
            };

            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => {
                    warn!(
                        target: "events",
                        hook = hook.as_str(),
                        subscription = id.0,
                        error = ?error,
                        "hook handler failed"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "events",
                        hook = hook.as_str(),
                        subscription = id.0,
                        "hook handler panicked"
                    );
                }
            }
            delivered += 1;

            let mut state = self.state.borrow_mut();
            if let Some(index) = state.position(id) {
                state.entries[index].handler = Some(handler);
            }
        }
        delivered
    }

    /// Disposes every subscription owned by `plugin`.
    pub fn dispose_plugin(&self, plugin: PluginId) -> usize {
        let mut state = self.state.borrow_mut();
        let before = state.entries.len();
        state.entries.retain(|entry| entry.owner != Some(plugin));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(target: "events", plugin = plugin.get(), removed, "plugin subscriptions disposed");
        }
        removed
    }

    /// Number of live subscriptions on `hook`.
    #[must_use]
    pub fn subscriber_count(&self, hook: HookType) -> usize {
        self.state
            .borrow()
            .entries
            .iter()
            .filter(|entry| entry.hook == hook)
            .count()
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventHub")
            .field("subscriptions", &state.entries.len())
            .finish()
    }
}

/// Token returned by [`EventHub::subscribe`].
///
/// Dropping the token keeps the subscription alive; only [`Subscription::dispose`]
/// ends it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    hub: Weak<RefCell<HubState>>,
}

impl Subscription {
    /// Ends the subscription. Calling it again has no effect.
    pub fn dispose(&self) {
        let Some(state) = self.hub.upgrade() else {
            return;
        };
        let mut state = state.borrow_mut();
        if let Some(index) = state.position(self.id) {
            let entry = state.entries.remove(index);
            debug!(target: "events", hook = entry.hook.as_str(), subscription = self.id.0, "disposed");
        }
    }

    /// Reports whether the subscription still receives events.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.hub
            .upgrade()
            .is_some_and(|state| state.borrow().position(self.id).is_some())
    }
}
