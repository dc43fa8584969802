//! Event hub: synchronous fan-out of agent lifecycle events.
//!
//! Handlers are kept per [`EventKind`] in subscription order. `subscribe`
//! returns a [`SubscriptionId`] redeemable with `unsubscribe`.
//!
//! Dispatch runs on the caller's thread before the triggering registry call
//! returns. Each handler is isolated: an `Err` or a panic is logged and the
//! next handler still runs.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HandlerError;
use crate::registry::AgentRegistry;
use crate::types::AgentInfo;

// ─── Events ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Setup,
    Message,
    Disconnect,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Message => "message",
            Self::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum RegistryEvent<C> {
    /// A channel was admitted (new or merged agent).
    Setup { agent: AgentInfo, channel: C },
    /// A payload arrived on one of the agent's channels.
    Message {
        payload: serde_json::Value,
        agent: AgentInfo,
    },
    /// The agent's last channel closed.
    Disconnect { agent: AgentInfo },
}

impl<C> RegistryEvent<C> {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Setup { .. } => EventKind::Setup,
            Self::Message { .. } => EventKind::Message,
            Self::Disconnect { .. } => EventKind::Disconnect,
        }
    }

    pub fn agent(&self) -> &AgentInfo {
        match self {
            Self::Setup { agent, .. } | Self::Message { agent, .. } | Self::Disconnect { agent } => {
                agent
            }
        }
    }
}

// ─── Subscriptions ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Handler callback. Receives the registry so it can query or mutate it
/// from inside a publish.
pub type Handler<C> =
    dyn Fn(&AgentRegistry<C>, &RegistryEvent<C>) -> Result<(), HandlerError> + Send + Sync;

struct Subscription<C> {
    id: SubscriptionId,
    kind: EventKind,
    handler: Arc<Handler<C>>,
}

// ─── Hub ─────────────────────────────────────────────────────────────

pub struct EventHub<C> {
    subscriptions: Vec<Subscription<C>>,
    next_id: u64,
}

impl<C> EventHub<C> {
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
            next_id: 1,
        }
    }

    pub fn subscribe(&mut self, kind: EventKind, handler: Arc<Handler<C>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, kind, handler });
        id
    }

    /// Returns `false` if `id` was not (or no longer) subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|s| s.id == id)
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.subscriptions.iter().filter(|s| s.kind == kind).count()
    }

    /// Handlers currently registered for `kind`, in subscription order.
    pub(crate) fn handlers(&self, kind: EventKind) -> Vec<(SubscriptionId, Arc<Handler<C>>)> {
        self.subscriptions
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| (s.id, Arc::clone(&s.handler)))
            .collect()
    }
}

impl<C> Default for EventHub<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for EventHub<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("subscriptions", &self.subscriptions.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// Run one handler, containing errors and panics.
pub(crate) fn invoke<C>(
    id: SubscriptionId,
    handler: &Handler<C>,
    registry: &AgentRegistry<C>,
    event: &RegistryEvent<C>,
) {
    let kind = event.kind();
    match catch_unwind(AssertUnwindSafe(|| handler(registry, event))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(subscription = %id, event = %kind, error = %e, "event handler failed");
        }
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_owned());
            tracing::error!(subscription = %id, event = %kind, panic = %detail, "event handler panicked");
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::TestChannel;

    fn noop_handler(
        _: &AgentRegistry<TestChannel>,
        _: &RegistryEvent<TestChannel>,
    ) -> Result<(), HandlerError> {
        Ok(())
    }

    fn noop() -> Arc<Handler<TestChannel>> {
        Arc::new(noop_handler)
    }

    #[test]
    fn subscription_ids_are_unique_and_ordered() {
        let mut hub: EventHub<TestChannel> = EventHub::new();
        let a = hub.subscribe(EventKind::Setup, noop());
        let b = hub.subscribe(EventKind::Setup, noop());
        let c = hub.subscribe(EventKind::Disconnect, noop());

        assert!(a < b && b < c);
        let order: Vec<SubscriptionId> = hub
            .handlers(EventKind::Setup)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(order, vec![a, b]);
        assert_eq!(hub.handler_count(EventKind::Disconnect), 1);
        assert_eq!(hub.handler_count(EventKind::Message), 0);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let mut hub: EventHub<TestChannel> = EventHub::new();
        let a = hub.subscribe(EventKind::Message, noop());
        let b = hub.subscribe(EventKind::Message, noop());

        assert!(hub.unsubscribe(a));
        assert!(!hub.is_subscribed(a));
        assert!(hub.is_subscribed(b));
        assert!(!hub.unsubscribe(a), "second unsubscribe is a no-op");
        assert_eq!(hub.handler_count(EventKind::Message), 1);
    }

    #[test]
    fn ids_are_not_reused_after_unsubscribe() {
        let mut hub: EventHub<TestChannel> = EventHub::new();
        let a = hub.subscribe(EventKind::Setup, noop());
        hub.unsubscribe(a);
        let b = hub.subscribe(EventKind::Setup, noop());
        assert_ne!(a, b);
    }

    #[test]
    fn event_kind_labels() {
        assert_eq!(EventKind::Setup.to_string(), "setup");
        assert_eq!(EventKind::Message.to_string(), "message");
        assert_eq!(EventKind::Disconnect.to_string(), "disconnect");
    }
}
