//! Application-wide constants
//!
//! Centralized location for event names and default values that are used
//! across multiple modules.

/// Default real-time channel endpoint
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:8000/socket";

/// Default REST endpoint
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Unseen count given to a thread announced by `chatStarted`.
/// Kept as the historical value; configurable through `CoreConfig`.
pub const THREAD_CREATED_UNSEEN_SEED: u32 = 2;

// Thread defaults
pub const DEFAULT_PARTICIPANT_NAME: &str = "Visitor";

// Toast durations (seconds)
pub const TOAST_INFO_SECS: u64 = 3;
pub const TOAST_WARNING_SECS: u64 = 4;
pub const TOAST_ERROR_SECS: u64 = 5;
pub const TOAST_MESSAGE_SECS: u64 = 30;

// Reconnect defaults
pub const RECONNECT_INITIAL_DELAY_MS: u64 = 500;
pub const RECONNECT_MAX_DELAY_MS: u64 = 30_000;
pub const RECONNECT_NOTIFY_AFTER_ATTEMPTS: u32 = 5;

pub const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Event names carried on the real-time channel
pub mod events {
    // Inbound
    pub const CHAT_STARTED: &str = "chatStarted";
    pub const RECEIVE_MESSAGE: &str = "receiveMessage";
    pub const UPDATE_DASHBOARD: &str = "updateDashboard";
    pub const TYPING: &str = "typing";
    pub const STOP_TYPING: &str = "stopTyping";
    pub const TASK_CREATED: &str = "taskCreated";
    pub const TASK_READED: &str = "taskReaded";
    pub const AGENT_STATUS_UPDATE: &str = "agentStatusUpdate";
    pub const ONLINE_STATUS: &str = "onlineStatus";
    pub const NOTIFICATION: &str = "notification";

    // Outbound
    pub const REGISTER_ORG: &str = "registerOrg";
    pub const AGENT_ONLINE: &str = "agentOnline";
    pub const READED_TASK: &str = "readedTask";
}
