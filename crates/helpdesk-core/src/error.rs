use std::path::PathBuf;

/// Transport-level failures of the real-time channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Invalid socket URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Channel is not connected")]
    NotConnected,
}

/// Failures of the REST collaborators backing snapshot fetches and actions.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Request to {endpoint} failed with status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },
    #[error("Response from {endpoint} could not be decoded: {message}")]
    Decode { endpoint: String, message: String },
}

/// Failures of the assignment workflow.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("No thread or task is open for assignment")]
    NoTarget,
    #[error("Agent {0} is not in the roster")]
    UnknownAgent(String),
    #[error("Agent {0} is offline and cannot be assigned")]
    AgentOffline(String),
    #[error("Thread {0} is not loaded")]
    UnknownThread(String),
    #[error("Task {0} is not loaded")]
    UnknownTask(String),
    #[error("No session is active")]
    NotLoggedIn,
    #[error(transparent)]
    Request(#[from] RequestError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
