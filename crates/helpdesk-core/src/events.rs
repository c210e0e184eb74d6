//! Payloads carried on the real-time channel.
//!
//! Inbound payloads are decoded per event name by the subscriber that owns
//! them. A payload missing a required key is dropped with a debug log rather
//! than surfaced as an error.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::constants::events;
use crate::models::{ChatMessage, Role, Sender, Task, Thread};

/// One frame on the wire: `{"event": "<name>", "data": <payload>}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WireFrame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Decode an inbound payload, dropping it when malformed.
pub fn decode<T: DeserializeOwned>(event: &str, data: &Value) -> Option<T> {
    match T::deserialize(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::debug!(event, error = %e, "Dropping malformed event");
            None
        }
    }
}

// ===== Inbound =====

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStarted {
    pub thread_id: String,
    /// Some servers attach the full thread; otherwise a stub is inserted
    #[serde(default)]
    pub thread: Option<Thread>,
}

impl ChatStarted {
    pub fn into_thread(self, now: DateTime<Utc>) -> Thread {
        match self.thread {
            Some(thread) if thread.id == self.thread_id => thread,
            _ => Thread::stub(self.thread_id, now),
        }
    }
}

/// `receiveMessage` carries a complete message.
pub type ReceiveMessage = ChatMessage;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDashboard {
    pub thread_id: String,
    pub sender: Sender,
    pub content: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UpdateDashboard {
    pub fn into_message(self) -> ChatMessage {
        ChatMessage {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            thread_id: self.thread_id,
            sender: self.sender,
            content: self.content,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Typing {
    pub thread_id: String,
    pub agent_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTyping {
    pub thread_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreated {
    pub task_id: String,
    #[serde(default)]
    pub task: Option<Task>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReaded {
    #[serde(alias = "data")]
    pub task_id: String,
}

/// Shared by `agentStatusUpdate` and `onlineStatus`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: String,
    pub online: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationThread {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationPayload {
    pub message: String,
    pub thread: NotificationThread,
}

// ===== Outbound =====

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    RegisterOrg {
        org_id: String,
        user_id: String,
        role: Role,
    },
    AgentOnline {
        id: String,
        online: bool,
        name: String,
        org_id: String,
    },
    Typing {
        thread_id: String,
        agent_name: String,
    },
    StopTyping {
        thread_id: String,
    },
    /// `id` is the client-generated message id, so the server echo can be
    /// recognised by id.
    UpdateDashboard {
        id: String,
        sender: String,
        content: String,
        thread_id: String,
    },
    ReadedTask {
        task_id: String,
        org_id: String,
    },
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::RegisterOrg { .. } => events::REGISTER_ORG,
            OutboundEvent::AgentOnline { .. } => events::AGENT_ONLINE,
            OutboundEvent::Typing { .. } => events::TYPING,
            OutboundEvent::StopTyping { .. } => events::STOP_TYPING,
            OutboundEvent::UpdateDashboard { .. } => events::UPDATE_DASHBOARD,
            OutboundEvent::ReadedTask { .. } => events::READED_TASK,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::RegisterOrg {
                org_id,
                user_id,
                role,
            } => json!({ "orgId": org_id, "userId": user_id, "role": role.as_str() }),
            OutboundEvent::AgentOnline {
                id,
                online,
                name,
                org_id,
            } => json!({ "id": id, "online": online, "name": name, "orgId": org_id }),
            OutboundEvent::Typing {
                thread_id,
                agent_name,
            } => json!({ "threadId": thread_id, "agentName": agent_name }),
            OutboundEvent::StopTyping { thread_id } => json!({ "threadId": thread_id }),
            OutboundEvent::UpdateDashboard {
                id,
                sender,
                content,
                thread_id,
            } => json!({
                "id": id,
                "sender": sender,
                "content": content,
                "threadId": thread_id,
            }),
            OutboundEvent::ReadedTask { task_id, org_id } => {
                json!({ "data": task_id, "orgId": org_id })
            }
        }
    }

    pub fn into_frame(self) -> WireFrame {
        WireFrame::new(self.name(), self.payload())
    }
}
