pub mod agent;
pub mod identity;
pub mod message;
pub mod notification;
pub mod task;
pub mod thread;

pub use agent::Agent;
pub use identity::{Identity, Role};
pub use message::{ChatMessage, Sender};
pub use notification::NotificationGroup;
pub use task::{Priority, Task};
pub use thread::{Thread, ThreadStatus, ThreadType};
