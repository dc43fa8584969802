//! Agent store: owns every agent record and the identity index over them.
//!
//! All mutation goes through [`attach`](AgentStore::attach),
//! [`detach`](AgentStore::detach) and [`remove`](AgentStore::remove), each of
//! which edits the agent table and the identity index in one step. An agent
//! with an empty channel set never remains in either, and a channel id is
//! owned by at most one agent.
//!
//! ## Lifecycle
//!
//! - **create**: key not indexed -> new agent with one channel
//! - **merge**: key indexed -> channel joins the set, `last_active_at` advances
//! - **shrink**: one of several channels detached
//! - **destroy**: last channel detached, or forced removal

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::identity::IdentityIndex;
use crate::types::{Agent, AgentId, AgentInfo, Channel, ChannelId, IdentityKey};

// ─── Outcomes ────────────────────────────────────────────────────────

/// Result of attaching a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attached {
    pub agent_id: AgentId,
    /// `true` when the channel joined an existing agent.
    pub merged: bool,
    /// Agent state after the attach.
    pub info: AgentInfo,
    /// Set when the channel was taken from an agent with a different key.
    pub displaced: Option<Displaced>,
}

/// A channel moved away from its previous owner during an attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displaced {
    pub from: AgentId,
    /// `Shrunk` or `Destroyed` for the previous owner.
    pub outcome: Detached,
}

/// Result of detaching a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detached {
    UnknownAgent,
    UnknownChannel,
    /// Channels remain; the agent stays live.
    Shrunk { remaining: usize },
    /// Last channel detached; carries the snapshot taken before removal.
    Destroyed(AgentInfo),
}

// ─── Agent Store ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct AgentStore<C> {
    /// Insertion order.
    agents: Vec<Agent<C>>,
    index: IdentityIndex,
}

impl<C: Channel> AgentStore<C> {
    pub fn new() -> Self {
        Self {
            agents: Vec::new(),
            index: IdentityIndex::new(),
        }
    }

    /// Attach `channel` to the live agent for `key`, creating it if needed.
    ///
    /// A channel already in the agent's set is not duplicated; the activity
    /// timestamp still advances. A channel owned by an agent under another
    /// key is detached from it first, which may destroy that agent.
    pub fn attach(&mut self, channel: C, key: IdentityKey, now: DateTime<Utc>) -> Attached {
        let channel_id = channel.id();
        let previous = self
            .owner_of(channel_id)
            .filter(|a| a.key != key)
            .map(|a| a.id.clone());
        let displaced = previous.map(|from| {
            let outcome = self.detach(&from, channel_id);
            Displaced { from, outcome }
        });

        let existing = self.index.resolve(&key).cloned();
        if let Some(agent) = existing.and_then(|id| self.agents.iter_mut().find(|a| a.id == id)) {
            if !agent.has_channel(channel.id()) {
                agent.channels.push(channel);
            }
            agent.last_active_at = agent.last_active_at.max(now);
            return Attached {
                agent_id: agent.id.clone(),
                merged: true,
                info: agent.info(),
                displaced,
            };
        }

        let agent = Agent {
            id: AgentId::generate(),
            key,
            created_at: now,
            last_active_at: now,
            channels: vec![channel],
        };
        let attached = Attached {
            agent_id: agent.id.clone(),
            merged: false,
            info: agent.info(),
            displaced,
        };
        self.index.insert(key, agent.id.clone());
        self.agents.push(agent);
        attached
    }

    /// Detach one channel; destroys the agent when its set becomes empty.
    pub fn detach(&mut self, agent_id: &AgentId, channel_id: ChannelId) -> Detached {
        let Some(pos) = self.position(agent_id) else {
            return Detached::UnknownAgent;
        };
        let agent = &mut self.agents[pos];
        let Some(channel_pos) = agent.channels.iter().position(|c| c.id() == channel_id) else {
            return Detached::UnknownChannel;
        };

        if agent.channels.len() > 1 {
            agent.channels.remove(channel_pos);
            return Detached::Shrunk {
                remaining: agent.channels.len(),
            };
        }

        let snapshot = agent.info();
        self.remove_at(pos);
        Detached::Destroyed(snapshot)
    }

    /// Remove an agent regardless of its remaining channels.
    pub fn remove(&mut self, agent_id: &AgentId) -> Option<Agent<C>> {
        let pos = self.position(agent_id)?;
        Some(self.remove_at(pos))
    }

    fn remove_at(&mut self, pos: usize) -> Agent<C> {
        let agent = self.agents.remove(pos);
        self.index.remove(&agent.key, &agent.id);
        agent
    }

    fn position(&self, agent_id: &AgentId) -> Option<usize> {
        self.agents.iter().position(|a| &a.id == agent_id)
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, agent_id: &AgentId) -> Option<&Agent<C>> {
        self.agents.iter().find(|a| &a.id == agent_id)
    }

    pub fn get_by_key(&self, key: &IdentityKey) -> Option<&Agent<C>> {
        let agent_id = self.index.resolve(key)?;
        self.get(agent_id)
    }

    /// Agent whose channel set contains `channel_id`.
    pub fn owner_of(&self, channel_id: ChannelId) -> Option<&Agent<C>> {
        self.agents.iter().find(|a| a.has_channel(channel_id))
    }

    /// Agents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Agent<C>> {
        self.agents.iter()
    }

    pub fn index(&self) -> &IdentityIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Every indexed agent is stored under its own key, every stored agent is
    /// indexed, no stored agent has an empty channel set, and no channel id
    /// appears in more than one agent.
    pub fn is_consistent(&self) -> bool {
        let mut owned = HashSet::new();
        self.index.len() == self.agents.len()
            && self.agents.iter().all(|a| {
                !a.channels.is_empty() && self.index.resolve(&a.key) == Some(&a.id)
            })
            && self
                .index
                .iter()
                .all(|(key, id)| self.get(id).is_some_and(|a| &a.key == key))
            && self
                .agents
                .iter()
                .flat_map(|a| a.channels.iter().map(|c| c.id()))
                .all(|id| owned.insert(id))
    }
}

impl<C: Channel> Default for AgentStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────
