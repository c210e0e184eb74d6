pub mod api;
pub mod assignment;
pub mod channel;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod runtime;
pub mod sound;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod toast;
pub mod tracing_setup;

pub use api::{HttpSupportApi, SupportApi};
pub use channel::{EventChannel, Transport, WebSocketTransport};
pub use config::CoreConfig;
pub use error::{ChannelError, ConfigError, RequestError, WorkflowError};
pub use runtime::CoreRuntime;
