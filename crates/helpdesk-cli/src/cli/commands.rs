//! One-shot command helpers: read views over the runtime's stores and JSON
//! output.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use helpdesk_core::models::{Priority, ThreadStatus, ThreadType};
use helpdesk_core::CoreRuntime;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadFilter {
    pub thread_type: Option<ThreadType>,
    pub status: Option<ThreadStatus>,
}

/// Parse a wire-format enum value such as `unassigned` or `high`.
pub fn parse_enum<T: DeserializeOwned>(kind: &str, value: &str) -> Result<T> {
    serde_json::from_value(Value::String(value.to_lowercase()))
        .with_context(|| format!("Unknown {} '{}'", kind, value))
}

pub fn threads_json(runtime: &CoreRuntime, filter: ThreadFilter) -> Value {
    let store = runtime.threads();
    let store = store.borrow();
    let threads: Vec<_> = store
        .threads()
        .iter()
        .filter(|t| filter.thread_type.map_or(true, |ty| t.thread_type == ty))
        .filter(|t| filter.status.map_or(true, |s| t.status == s))
        .collect();
    json!({ "threads": threads, "totalUnseen": store.total_unseen() })
}

pub fn tasks_json(runtime: &CoreRuntime, priority: Option<Priority>) -> Value {
    let store = runtime.tasks();
    let store = store.borrow();
    let tasks: Vec<_> = store
        .tasks()
        .iter()
        .filter(|t| priority.map_or(true, |p| t.priority == p))
        .collect();
    json!({ "tasks": tasks, "unreadCount": store.unread_count() })
}

/// Messages of the selected thread in render order.
pub fn messages_json(runtime: &CoreRuntime) -> Value {
    let store = runtime.threads();
    let store = store.borrow();
    json!({
        "threadId": store.selected_id(),
        "messages": store.ordered_messages(),
    })
}

pub fn agents_json(runtime: &CoreRuntime) -> Value {
    let presence = runtime.presence();
    let presence = presence.borrow();
    let agents: Vec<Value> = presence
        .roster()
        .iter()
        .map(|a| json!({ "id": a.id, "name": a.name, "online": presence.is_online(&a.id) }))
        .collect();
    json!({ "agents": agents, "selfOnline": presence.self_online() })
}

/// Drain queued toasts into a list of `{level, message}` objects.
pub fn drain_toasts(runtime: &CoreRuntime) -> Vec<Value> {
    let toasts = runtime.toasts();
    let mut drained = Vec::new();
    while let Some(toast) = toasts.borrow_mut().take_current() {
        drained.push(json!({
            "level": format!("{:?}", toast.level).to_lowercase(),
            "message": toast.message,
            "replyTo": toast.reply_target(),
        }));
    }
    drained
}

pub fn print_json(value: &Value, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

/// Drive the channel until the handshake completes, so emits are not dropped.
pub async fn wait_until_connected(runtime: &mut CoreRuntime, timeout: Duration) -> Result<()> {
    let handshake = async {
        while runtime.connection_state() != helpdesk_core::channel::ConnectionState::Connected {
            if !runtime.step().await {
                bail!("Channel closed before the handshake completed");
            }
        }
        Ok::<(), anyhow::Error>(())
    };
    tokio::time::timeout(timeout, handshake)
        .await
        .context("Timed out waiting for the real-time channel")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use helpdesk_core::models::{Agent, Identity, Role, Thread};
    use helpdesk_core::testing::{CountingSound, FakeSupportApi, RecordingTransport};
    use helpdesk_core::CoreConfig;
    use std::rc::Rc;

    async fn runtime_with(threads: Vec<Thread>) -> CoreRuntime {
        let mut runtime = CoreRuntime::with_parts(
            CoreConfig::default(),
            Box::new(RecordingTransport::new()),
            Rc::new(
                FakeSupportApi::new()
                    .with_threads(threads)
                    .with_agents(vec![Agent {
                        id: "u1".to_string(),
                        name: "Priya".to_string(),
                        email: "priya@example.com".to_string(),
                        online: true,
                    }]),
            ),
            Rc::new(CountingSound::new()),
        );
        runtime
            .login(Identity::new("org1", "u1", Role::Agent, "Priya"))
            .await
            .unwrap();
        runtime
    }

    #[test]
    fn test_parse_enum_values() {
        let ty: ThreadType = parse_enum("thread type", "Bots").unwrap();
        assert_eq!(ty, ThreadType::Bots);
        let priority: Priority = parse_enum("priority", "high").unwrap();
        assert_eq!(priority, Priority::High);
        assert!(parse_enum::<ThreadStatus>("status", "paused").is_err());
    }

    #[tokio::test]
    async fn test_threads_json_filters_by_type() {
        let mut bots = Thread::stub("t2", Utc::now());
        bots.thread_type = ThreadType::Bots;
        let runtime = runtime_with(vec![Thread::stub("t1", Utc::now()), bots]).await;

        let all = threads_json(&runtime, ThreadFilter::default());
        assert_eq!(all["threads"].as_array().unwrap().len(), 2);

        let filtered = threads_json(
            &runtime,
            ThreadFilter {
                thread_type: Some(ThreadType::Bots),
                status: None,
            },
        );
        let threads = filtered["threads"].as_array().unwrap();
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0]["id"], "t2");
    }

    #[tokio::test]
    async fn test_drain_toasts_empties_queue() {
        let runtime = runtime_with(vec![]).await;
        runtime
            .toasts()
            .borrow_mut()
            .push(helpdesk_core::toast::Toast::error("Search failed"));
        let drained = drain_toasts(&runtime);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0]["level"], "error");
        assert!(runtime.toasts().borrow().is_empty());
    }
}
