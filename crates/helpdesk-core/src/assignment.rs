//! Agent picker for attaching or detaching an agent to a thread or task.
//!
//! Assignment is contended and authoritative, so nothing is applied
//! optimistically: the runtime issues the request and only a successful
//! response reaches the owning store.

use crate::error::WorkflowError;
use crate::models::Agent;
use crate::store::PresenceTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    Thread(String),
    Task(String),
}

impl AssignTarget {
    pub fn id(&self) -> &str {
        match self {
            AssignTarget::Thread(id) | AssignTarget::Task(id) => id,
        }
    }
}

/// One row of the picker. Offline agents are listed but not selectable.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOption {
    pub agent: Agent,
    pub online: bool,
}

impl AgentOption {
    pub fn selectable(&self) -> bool {
        self.online
    }
}

#[derive(Debug, Default)]
pub struct AssignmentWorkflow {
    target: Option<AssignTarget>,
    query: String,
}

impl AssignmentWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, target: AssignTarget) {
        self.target = Some(target);
        self.query.clear();
    }

    pub fn close(&mut self) {
        self.target = None;
        self.query.clear();
    }

    pub fn target(&self) -> Option<&AssignTarget> {
        self.target.as_ref()
    }

    pub fn is_open_for(&self, target: &AssignTarget) -> bool {
        self.target.as_ref() == Some(target)
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Roster filtered by the search query, in roster order.
    pub fn options(&self, presence: &PresenceTracker) -> Vec<AgentOption> {
        presence
            .roster()
            .iter()
            .filter(|a| a.matches(&self.query))
            .map(|a| AgentOption {
                agent: a.clone(),
                online: presence.is_online(&a.id),
            })
            .collect()
    }

    /// Validate an assign pick against the open target and presence.
    pub fn prepare_assign(
        &self,
        agent_id: &str,
        presence: &PresenceTracker,
    ) -> Result<AssignTarget, WorkflowError> {
        let target = self.target.clone().ok_or(WorkflowError::NoTarget)?;
        validate_agent(agent_id, presence)?;
        Ok(target)
    }
}

/// Only rostered agents that are currently online can take an assignment.
pub fn validate_agent(agent_id: &str, presence: &PresenceTracker) -> Result<(), WorkflowError> {
    if presence.agent(agent_id).is_none() {
        return Err(WorkflowError::UnknownAgent(agent_id.to_string()));
    }
    if !presence.is_online(agent_id) {
        return Err(WorkflowError::AgentOffline(agent_id.to_string()));
    }
    Ok(())
}
