use std::collections::HashMap;

use crate::models::Agent;

/// Online/offline state per agent, fed by presence events rather than polling.
/// Independent of thread state; read by the assignment workflow.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    self_id: Option<String>,
    /// Roster in fetch order, for display and search
    roster: Vec<Agent>,
    /// agent_id -> online; authoritative over `Agent::online`
    online: HashMap<String, bool>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.self_id = None;
        self.roster.clear();
        self.online.clear();
    }

    // ===== Getters =====

    pub fn roster(&self) -> &[Agent] {
        &self.roster
    }

    pub fn agent(&self, agent_id: &str) -> Option<&Agent> {
        self.roster.iter().find(|a| a.id == agent_id)
    }

    pub fn is_online(&self, agent_id: &str) -> bool {
        self.online.get(agent_id).copied().unwrap_or(false)
    }

    pub fn self_online(&self) -> bool {
        self.self_id
            .as_deref()
            .map(|id| self.is_online(id))
            .unwrap_or(false)
    }

    pub fn online_agents(&self) -> Vec<&Agent> {
        self.roster
            .iter()
            .filter(|a| self.is_online(&a.id))
            .collect()
    }

    // ===== Mutations =====

    /// Replace the roster with a fetched snapshot, taking its persisted flags.
    pub fn load_roster(&mut self, agents: Vec<Agent>) {
        for agent in &agents {
            self.online.insert(agent.id.clone(), agent.online);
        }
        self.roster = agents;
    }

    /// Initial own state from the authenticated user's persisted flag.
    pub fn seed_self(&mut self, user_id: &str, online: bool) {
        self.self_id = Some(user_id.to_string());
        self.online.insert(user_id.to_string(), online);
    }

    /// Acting agent's own toggle; applied optimistically.
    /// Returns true if the state changed.
    pub fn set_own(&mut self, online: bool) -> bool {
        let Some(id) = self.self_id.clone() else {
            return false;
        };
        self.online.insert(id, online) != Some(online)
    }

    /// Presence event from another agent (or the server echo of our own).
    pub fn apply_remote(&mut self, agent_id: &str, online: bool) {
        self.online.insert(agent_id.to_string(), online);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(id: &str, online: bool) -> Agent {
        Agent {
            id: id.to_string(),
            name: format!("Agent {}", id),
            email: format!("{}@example.com", id),
            online,
        }
    }

    #[test]
    fn test_roster_seeds_online_flags() {
        let mut presence = PresenceTracker::new();
        presence.load_roster(vec![agent("a1", true), agent("a2", false)]);
        assert!(presence.is_online("a1"));
        assert!(!presence.is_online("a2"));
        assert!(!presence.is_online("unknown"));
        assert_eq!(presence.online_agents().len(), 1);
    }

    #[test]
    fn test_remote_update_overrides_snapshot() {
        let mut presence = PresenceTracker::new();
        presence.load_roster(vec![agent("a1", true), agent("a2", false)]);
        presence.apply_remote("a2", true);
        presence.apply_remote("a1", false);
        let online: Vec<&str> = presence.online_agents().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(online, vec!["a2"]);
    }

    #[test]
    fn test_own_toggle_requires_seed() {
        let mut presence = PresenceTracker::new();
        assert!(!presence.set_own(true));

        presence.seed_self("me", false);
        assert!(!presence.self_online());
        assert!(presence.set_own(true));
        assert!(presence.self_online());
        assert!(!presence.set_own(true));
    }
}
