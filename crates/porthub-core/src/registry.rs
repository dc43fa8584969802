//! Agent registry: the public façade over classifier, store, and event hub.
//!
//! Host notifications map onto registry calls:
//!
//! - channel opened  -> [`connect`](AgentRegistry::connect)
//! - message arrived -> [`deliver`](AgentRegistry::deliver)
//! - channel closed  -> [`disconnect`](AgentRegistry::disconnect)
//!
//! The registry is single-threaded and takes `&self` everywhere. State lives
//! behind `RefCell`s whose borrows are released before any event is
//! published, so handlers may query or mutate the registry re-entrantly;
//! nested mutations apply immediately. Multi-threaded hosts must funnel every
//! call through one owner (see the runtime actor) instead of locking.
//!
//! No operation panics or returns an error for a miss: unknown ids are logged
//! at error level and reported as `None`/`false`/empty.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::classifier::LocationClassifier;
use crate::config::RegistryConfig;
use crate::error::{ConfigError, HandlerError, RejectReason};
use crate::events::{self, EventHub, EventKind, RegistryEvent, SubscriptionId};
use crate::query::{AgentQuery, PartialKey};
use crate::store::{AgentStore, Attached, Detached, Displaced};
use crate::types::{Agent, AgentId, Channel, ChannelId, Context, IdentityKey};

/// Source of timestamps for `created_at` / `last_active_at`.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// ─── Admission ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Accepted { agent_id: AgentId, merged: bool },
    Rejected { reason: RejectReason },
}

impl Admission {
    pub fn agent_id(&self) -> Option<&AgentId> {
        match self {
            Self::Accepted { agent_id, .. } => Some(agent_id),
            Self::Rejected { .. } => None,
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────────

pub struct AgentRegistry<C> {
    classifier: LocationClassifier,
    store: RefCell<AgentStore<C>>,
    hub: RefCell<EventHub<C>>,
    clock: Clock,
}

impl<C: Channel> AgentRegistry<C> {
    pub fn new(classifier: LocationClassifier) -> Self {
        Self {
            classifier,
            store: RefCell::new(AgentStore::new()),
            hub: RefCell::new(EventHub::new()),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(config.classifier()?))
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn classifier(&self) -> &LocationClassifier {
        &self.classifier
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Classify a newly opened channel and admit it.
    ///
    /// Rejected only when the channel carries no sender information at all.
    pub fn connect(&self, channel: C) -> Admission {
        let Some(origin) = channel.origin() else {
            tracing::warn!(
                channel_id = %channel.id(),
                name = channel.name(),
                "rejecting channel without sender information"
            );
            return Admission::Rejected {
                reason: RejectReason::NoSenderInfo,
            };
        };
        let key = self.classifier.classify(origin);
        let (agent_id, merged) = self.attach(channel, key);
        Admission::Accepted { agent_id, merged }
    }

    /// Admit `channel` under an already classified key.
    ///
    /// Merges into the live agent for `key` or creates one, then publishes
    /// `setup`. A channel currently owned by an agent with a different key is
    /// moved; if that empties the old agent, its `disconnect` is published
    /// before the `setup`.
    pub fn admit(&self, channel: C, key: IdentityKey) -> AgentId {
        self.attach(channel, key).0
    }

    fn attach(&self, channel: C, key: IdentityKey) -> (AgentId, bool) {
        let channel_id = channel.id();
        let now = (self.clock)();
        let Attached {
            agent_id,
            merged,
            info,
            displaced,
        } = self.store.borrow_mut().attach(channel.clone(), key, now);

        if let Some(Displaced { from, outcome }) = displaced {
            tracing::warn!(
                channel_id = %channel_id,
                agent_id = %from,
                key = %key,
                "channel re-admitted under a different identity"
            );
            if let Detached::Destroyed(previous) = outcome {
                tracing::info!(agent_id = %from, key = %previous.key, "agent disconnected");
                self.publish(RegistryEvent::Disconnect { agent: previous });
            }
        }

        if merged {
            tracing::debug!(
                agent_id = %agent_id,
                channel_id = %channel_id,
                channels = info.channel_count,
                "merged channel into agent"
            );
        } else {
            tracing::info!(
                agent_id = %agent_id,
                channel_id = %channel_id,
                key = %key,
                "created agent"
            );
        }

        self.publish(RegistryEvent::Setup {
            agent: info,
            channel,
        });
        (agent_id, merged)
    }

    /// Publish `message` for the agent owning `channel_id`.
    pub fn deliver(&self, channel_id: ChannelId, payload: serde_json::Value) -> bool {
        let agent = self.store.borrow().owner_of(channel_id).map(|a| a.info());
        let Some(agent) = agent else {
            tracing::error!(channel_id = %channel_id, "message on channel with no agent");
            return false;
        };
        tracing::trace!(agent_id = %agent.id, channel_id = %channel_id, "message received");
        self.publish(RegistryEvent::Message { payload, agent });
        true
    }

    /// Remove one channel from an agent; destroys the agent and publishes
    /// `disconnect` when it was the last one.
    pub fn release(&self, agent_id: &AgentId, channel_id: ChannelId) -> bool {
        let detached = self.store.borrow_mut().detach(agent_id, channel_id);
        match detached {
            Detached::UnknownAgent => {
                tracing::error!(agent_id = %agent_id, channel_id = %channel_id, "release on unknown agent");
                false
            }
            Detached::UnknownChannel => {
                tracing::error!(
                    agent_id = %agent_id,
                    channel_id = %channel_id,
                    "release of channel not owned by agent"
                );
                false
            }
            Detached::Shrunk { remaining } => {
                tracing::debug!(agent_id = %agent_id, channel_id = %channel_id, remaining, "channel released");
                true
            }
            Detached::Destroyed(agent) => {
                tracing::info!(agent_id = %agent_id, key = %agent.key, "agent disconnected");
                self.publish(RegistryEvent::Disconnect { agent });
                true
            }
        }
    }

    /// Host close hook: release `channel_id` from whichever agent owns it.
    pub fn disconnect(&self, channel_id: ChannelId) -> bool {
        let owner = self
            .store
            .borrow()
            .owner_of(channel_id)
            .map(|a| a.id.clone());
        match owner {
            Some(agent_id) => self.release(&agent_id, channel_id),
            None => {
                tracing::error!(channel_id = %channel_id, "close on channel with no agent");
                false
            }
        }
    }

    /// Destroy an agent regardless of its channels.
    ///
    /// Channels are not closed and no `disconnect` is published; this is an
    /// administrative removal, distinct from [`release`](Self::release).
    pub fn force_remove(&self, agent_id: &AgentId) -> bool {
        let removed = self.store.borrow_mut().remove(agent_id);
        match removed {
            Some(agent) => {
                tracing::info!(
                    agent_id = %agent_id,
                    key = %agent.key,
                    channels = agent.channels.len(),
                    "force-removed agent"
                );
                true
            }
            None => {
                tracing::error!(agent_id = %agent_id, "force_remove on unknown agent");
                false
            }
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&AgentRegistry<C>, &RegistryEvent<C>) -> Result<(), HandlerError>
            + Send
            + Sync
            + 'static,
    {
        let id = self.hub.borrow_mut().subscribe(kind, Arc::new(handler));
        tracing::debug!(subscription = %id, event = %kind, "handler subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.hub.borrow_mut().unsubscribe(id);
        if !removed {
            tracing::warn!(subscription = %id, "unsubscribe of unknown subscription");
        }
        removed
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.hub.borrow().handler_count(kind)
    }

    /// Invoke the handlers registered for the event's kind, in subscription
    /// order. Handlers unsubscribed mid-publish are skipped; handlers added
    /// mid-publish first see the next event.
    fn publish(&self, event: RegistryEvent<C>) {
        let kind = event.kind();
        let handlers = self.hub.borrow().handlers(kind);
        tracing::trace!(event = %kind, agent_id = %event.agent().id, handlers = handlers.len(), "publishing");
        for (id, handler) in handlers {
            if !self.hub.borrow().is_subscribed(id) {
                continue;
            }
            events::invoke(id, &*handler, self, &event);
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    fn read<R>(&self, f: impl FnOnce(AgentQuery<'_, C>) -> R) -> R {
        let store = self.store.borrow();
        f(AgentQuery::new(&store))
    }

    /// All agents in creation order.
    pub fn all(&self) -> Vec<Agent<C>> {
        self.read(|q| q.all())
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<Agent<C>> {
        let agent = self.read(|q| q.get(agent_id));
        if agent.is_none() {
            tracing::error!(agent_id = %agent_id, "agent not found");
        }
        agent
    }

    pub fn get_by_key(&self, key: &IdentityKey) -> Option<Agent<C>> {
        let agent = self.read(|q| q.get_by_key(key));
        if agent.is_none() {
            tracing::error!(key = %key, "no agent for identity key");
        }
        agent
    }

    pub fn by_context(&self, context: Context) -> Vec<Agent<C>> {
        self.read(|q| q.by_context(context))
    }

    pub fn query(&self, filter: &PartialKey) -> Vec<Agent<C>> {
        self.read(|q| q.matching(filter))
    }

    pub fn channels_of(&self, agent_id: &AgentId) -> Vec<C> {
        let channels = self.read(|q| q.channels_of(agent_id));
        if channels.is_empty() {
            tracing::error!(agent_id = %agent_id, "channels requested for unknown agent");
        }
        channels
    }

    pub fn has_channel(&self, channel_id: ChannelId) -> bool {
        self.read(|q| q.has_channel(channel_id))
    }

    /// Name-based lookup; see [`AgentQuery::has_channel_named`].
    pub fn has_channel_named(&self, name: &str) -> bool {
        self.read(|q| q.has_channel_named(name))
    }

    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }

    /// Identity index and agent table agree.
    pub fn is_consistent(&self) -> bool {
        self.store.borrow().is_consistent()
    }
}

impl<C: Channel> Default for AgentRegistry<C> {
    fn default() -> Self {
        Self::new(LocationClassifier::default())
    }
}

impl<C> fmt::Debug for AgentRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("classifier", &self.classifier)
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
