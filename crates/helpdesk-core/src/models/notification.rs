use chrono::{DateTime, Utc};

/// Per-thread aggregation of incoming-message notifications.
/// Independent of the thread's own read state.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationGroup {
    pub thread_id: String,
    /// Label taken from the notification payload, not from the thread store
    pub thread_name: String,
    /// Raw message strings in arrival order
    pub messages: Vec<String>,
    /// Messages since the last mark-as-read
    pub count: u32,
    pub latest_message: String,
    pub read: bool,
    pub last_activity: DateTime<Utc>,
}

impl NotificationGroup {
    pub fn new(
        thread_id: impl Into<String>,
        thread_name: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let message = message.into();
        Self {
            thread_id: thread_id.into(),
            thread_name: thread_name.into(),
            messages: vec![message.clone()],
            count: 1,
            latest_message: message,
            read: false,
            last_activity: at,
        }
    }

    pub fn is_unread(&self) -> bool {
        !self.read
    }
}
