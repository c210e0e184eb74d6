pub mod notification_store;
pub mod presence_store;
pub mod task_store;
pub mod thread_store;

pub use notification_store::{GroupUpdate, NotificationAggregator};
pub use presence_store::PresenceTracker;
pub use task_store::{PendingTaskRefresh, TaskStore};
pub use thread_store::{OpenIntent, ThreadStore};
