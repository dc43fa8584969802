//! Read-only projections over the agent store.
//!
//! Every projection returns owned snapshots so callers never hold a borrow
//! of registry state across a later mutation. All are O(number of agents).

use serde::{Deserialize, Serialize};

use crate::store::AgentStore;
use crate::types::{Agent, AgentId, Channel, ChannelId, Context, IdentityKey};

// ─── Partial Key ─────────────────────────────────────────────────────

/// Filter over identity keys. `None` fields are wildcards.
///
/// `Some(0)` is an ordinary filter value: it matches only keys whose field
/// is zero. Use [`zero_as_absent`](Self::zero_as_absent) to get the looser
/// behavior where a zero id means "any".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_owner_id: Option<u64>,
}

impl PartialKey {
    /// Matches every key.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    pub fn owner(mut self, owner_id: u64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn sub_owner(mut self, sub_owner_id: u64) -> Self {
        self.sub_owner_id = Some(sub_owner_id);
        self
    }

    /// Treat zero-valued owner/sub-owner ids as absent.
    ///
    /// Broadens matches whenever zero is a real id (top frame, no tab).
    pub fn zero_as_absent(self) -> Self {
        Self {
            context: self.context,
            owner_id: self.owner_id.filter(|id| *id != 0),
            sub_owner_id: self.sub_owner_id.filter(|id| *id != 0),
        }
    }

    pub fn matches(&self, key: &IdentityKey) -> bool {
        self.context.is_none_or(|c| c == key.context)
            && self.owner_id.is_none_or(|id| id == key.owner_id)
            && self.sub_owner_id.is_none_or(|id| id == key.sub_owner_id)
    }
}

impl From<IdentityKey> for PartialKey {
    fn from(key: IdentityKey) -> Self {
        Self {
            context: Some(key.context),
            owner_id: Some(key.owner_id),
            sub_owner_id: Some(key.sub_owner_id),
        }
    }
}

// ─── Projections ─────────────────────────────────────────────────────

/// Borrowed read view over an [`AgentStore`].
pub struct AgentQuery<'a, C> {
    store: &'a AgentStore<C>,
}

impl<'a, C: Channel> AgentQuery<'a, C> {
    pub fn new(store: &'a AgentStore<C>) -> Self {
        Self { store }
    }

    /// All agents in insertion order.
    pub fn all(&self) -> Vec<Agent<C>> {
        self.store.iter().cloned().collect()
    }

    pub fn get(&self, agent_id: &AgentId) -> Option<Agent<C>> {
        self.store.get(agent_id).cloned()
    }

    pub fn get_by_key(&self, key: &IdentityKey) -> Option<Agent<C>> {
        self.store.get_by_key(key).cloned()
    }

    pub fn by_context(&self, context: Context) -> Vec<Agent<C>> {
        self.matching(&PartialKey::any().context(context))
    }

    pub fn matching(&self, filter: &PartialKey) -> Vec<Agent<C>> {
        self.store
            .iter()
            .filter(|a| filter.matches(&a.key))
            .cloned()
            .collect()
    }

    /// Channels backing `agent_id`; empty when the agent is unknown.
    pub fn channels_of(&self, agent_id: &AgentId) -> Vec<C> {
        self.store
            .get(agent_id)
            .map(|a| a.channels.clone())
            .unwrap_or_default()
    }

    /// Identity match on the transport-assigned channel id.
    pub fn has_channel(&self, channel_id: ChannelId) -> bool {
        self.store.owner_of(channel_id).is_some()
    }

    /// Name match. Names are not unique, so this can report a different
    /// physical channel that happens to share `name`.
    pub fn has_channel_named(&self, name: &str) -> bool {
        self.store
            .iter()
            .any(|a| a.channels.iter().any(|c| c.name() == name))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
