use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a chat message. On the wire this is a plain string:
/// `"Bot"`, `"User"`, or the agent's display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Sender {
    Bot,
    User,
    Agent(String),
}

impl From<String> for Sender {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Bot" => Sender::Bot,
            "User" => Sender::User,
            _ => Sender::Agent(value),
        }
    }
}

impl From<Sender> for String {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::Bot => "Bot".to_string(),
            Sender::User => "User".to_string(),
            Sender::Agent(name) => name,
        }
    }
}

impl Sender {
    pub fn is_customer(&self) -> bool {
        matches!(self, Sender::User)
    }
}

/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub thread_id: String,
    pub sender: Sender,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Message authored locally by the acting agent; the id is client-generated.
    pub fn local(
        thread_id: impl Into<String>,
        agent_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            sender: Sender::Agent(agent_name.into()),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_wire_strings() {
        let bot: Sender = serde_json::from_str(r#""Bot""#).unwrap();
        let user: Sender = serde_json::from_str(r#""User""#).unwrap();
        let agent: Sender = serde_json::from_str(r#""Priya""#).unwrap();
        assert_eq!(bot, Sender::Bot);
        assert_eq!(user, Sender::User);
        assert_eq!(agent, Sender::Agent("Priya".to_string()));
        assert_eq!(serde_json::to_string(&agent).unwrap(), r#""Priya""#);
    }

    #[test]
    fn test_local_message_gets_unique_id() {
        let a = ChatMessage::local("t1", "Priya", "hello");
        let b = ChatMessage::local("t1", "Priya", "hello");
        assert_ne!(a.id, b.id);
        assert_eq!(a.sender, Sender::Agent("Priya".to_string()));
        assert!(!a.sender.is_customer());
    }
}
