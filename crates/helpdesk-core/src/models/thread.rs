use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_PARTICIPANT_NAME;

/// Mutually exclusive category used for list filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadType {
    #[default]
    Unassigned,
    Assigned,
    Chat,
    Bots,
    Completed,
    Trash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    #[default]
    Active,
    Ended,
}

/// A single customer conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub participant_name: String,
    #[serde(default)]
    pub participant_email: String,
    #[serde(rename = "type", default)]
    pub thread_type: ThreadType,
    #[serde(default)]
    pub status: ThreadStatus,
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Whether any agent opened the thread since its last activity
    #[serde(default)]
    pub readed: bool,
    /// Messages arrived since the viewing agent last opened it
    #[serde(default)]
    pub unseen_count: u32,
    #[serde(default)]
    pub latest_message: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Thread {
    /// Placeholder for a thread announced only by id; a later snapshot fills it in.
    pub fn stub(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            participant_name: DEFAULT_PARTICIPANT_NAME.to_string(),
            participant_email: String::new(),
            thread_type: ThreadType::Unassigned,
            status: ThreadStatus::Active,
            assigned_to: None,
            readed: false,
            unseen_count: 0,
            latest_message: None,
            created_at,
        }
    }

    pub fn is_assigned_to(&self, agent_id: &str) -> bool {
        self.assigned_to.as_deref() == Some(agent_id)
    }

    pub fn has_unseen(&self) -> bool {
        self.unseen_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_snapshot_thread() {
        let json = r#"{
            "id": "t1",
            "participantName": "Dana",
            "participantEmail": "dana@example.com",
            "type": "assigned",
            "status": "ended",
            "assignedTo": "a2",
            "readed": true,
            "unseenCount": 4,
            "latestMessage": "thanks!",
            "createdAt": "2024-05-01T10:00:00Z"
        }"#;
        let thread: Thread = serde_json::from_str(json).unwrap();
        assert_eq!(thread.thread_type, ThreadType::Assigned);
        assert_eq!(thread.status, ThreadStatus::Ended);
        assert!(thread.is_assigned_to("a2"));
        assert_eq!(thread.unseen_count, 4);
        assert_eq!(thread.latest_message.as_deref(), Some("thanks!"));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let thread: Thread = serde_json::from_str(r#"{"id": "t9"}"#).unwrap();
        assert_eq!(thread.thread_type, ThreadType::Unassigned);
        assert_eq!(thread.status, ThreadStatus::Active);
        assert!(!thread.readed);
        assert!(!thread.has_unseen());
        assert!(thread.assigned_to.is_none());
    }

    #[test]
    fn test_stub_is_unread_and_unassigned() {
        let thread = Thread::stub("t2", Utc::now());
        assert_eq!(thread.participant_name, DEFAULT_PARTICIPANT_NAME);
        assert!(!thread.readed);
        assert!(thread.assigned_to.is_none());
    }
}
