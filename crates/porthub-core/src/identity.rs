//! Identity index: `IdentityKey -> AgentId`.
//!
//! Read access is public; mutation is crate-private so that only
//! [`AgentStore`](crate::store::AgentStore) can change it, always together
//! with the agent table.

use std::collections::HashMap;

use crate::types::{AgentId, IdentityKey};

#[derive(Debug, Default)]
pub struct IdentityIndex {
    by_key: HashMap<IdentityKey, AgentId>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live agent for `key`, if any.
    pub fn resolve(&self, key: &IdentityKey) -> Option<&AgentId> {
        self.by_key.get(key)
    }

    pub fn contains_agent(&self, agent_id: &AgentId) -> bool {
        self.by_key.values().any(|id| id == agent_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IdentityKey, &AgentId)> {
        self.by_key.iter()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Returns the agent previously indexed under `key`.
    pub(crate) fn insert(&mut self, key: IdentityKey, agent_id: AgentId) -> Option<AgentId> {
        self.by_key.insert(key, agent_id)
    }

    /// Removes `key` only if it still points at `agent_id`.
    pub(crate) fn remove(&mut self, key: &IdentityKey, agent_id: &AgentId) -> bool {
        if self.by_key.get(key) == Some(agent_id) {
            self.by_key.remove(key);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Context;

    #[test]
    fn resolve_after_insert() {
        let mut index = IdentityIndex::new();
        let key = IdentityKey::new(Context::Popup, 0, 0);
        let id = AgentId::from("agent-1");

        assert!(index.resolve(&key).is_none());
        assert_eq!(index.insert(key, id.clone()), None);
        assert_eq!(index.resolve(&key), Some(&id));
        assert!(index.contains_agent(&id));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn remove_requires_matching_agent() {
        let mut index = IdentityIndex::new();
        let key = IdentityKey::new(Context::ContentPage, 3, 1);
        index.insert(key, AgentId::from("agent-1"));

        assert!(!index.remove(&key, &AgentId::from("agent-2")));
        assert_eq!(index.len(), 1);

        assert!(index.remove(&key, &AgentId::from("agent-1")));
        assert!(index.is_empty());
    }

    #[test]
    fn keys_differing_in_one_field_are_distinct() {
        let mut index = IdentityIndex::new();
        index.insert(IdentityKey::new(Context::ContentPage, 3, 0), AgentId::from("a"));
        index.insert(IdentityKey::new(Context::ContentPage, 3, 1), AgentId::from("b"));
        index.insert(IdentityKey::new(Context::SidePanel, 3, 0), AgentId::from("c"));
        assert_eq!(index.len(), 3);
    }
}
