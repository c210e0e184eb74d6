//! Headless watch mode: keep the session open and print badge changes and
//! toasts as JSON lines.

use anyhow::Result;
use helpdesk_core::channel::ConnectionState;
use helpdesk_core::CoreRuntime;
use serde::Serialize;
use serde_json::json;

use super::commands::{drain_toasts, print_json};

/// Counters shown to the agent; printed whenever any of them changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchSnapshot {
    pub connected: bool,
    pub threads: usize,
    pub unseen_messages: u32,
    pub notification_badge: u32,
    pub unread_notification_groups: usize,
    pub unread_tasks: Option<u32>,
    pub online_agents: usize,
}

impl WatchSnapshot {
    pub fn capture(runtime: &CoreRuntime) -> Self {
        let threads = runtime.threads();
        let threads = threads.borrow();
        let notifications = runtime.notifications();
        let notifications = notifications.borrow();
        let presence = runtime.presence();
        let presence = presence.borrow();
        Self {
            connected: runtime.connection_state() == ConnectionState::Connected,
            threads: threads.len(),
            unseen_messages: threads.total_unseen(),
            notification_badge: notifications.badge_count(),
            unread_notification_groups: notifications.unread_group_count(),
            unread_tasks: runtime.tasks().borrow().unread_count(),
            online_agents: presence.online_agents().len(),
        }
    }
}

/// Run until the channel closes or Ctrl-C.
pub async fn run_watch(runtime: &mut CoreRuntime, pretty: bool) -> Result<()> {
    let mut last: Option<WatchSnapshot> = None;
    report(runtime, &mut last, pretty)?;

    loop {
        tokio::select! {
            alive = runtime.step() => {
                if !alive {
                    tracing::info!("Channel closed");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, ending session");
                break;
            }
        }
        report(runtime, &mut last, pretty)?;
    }

    runtime.logout();
    Ok(())
}

fn report(runtime: &CoreRuntime, last: &mut Option<WatchSnapshot>, pretty: bool) -> Result<()> {
    for toast in drain_toasts(runtime) {
        print_json(&json!({ "toast": toast }), pretty)?;
    }
    let snapshot = WatchSnapshot::capture(runtime);
    if last.as_ref() != Some(&snapshot) {
        print_json(&json!({ "state": snapshot }), pretty)?;
        *last = Some(snapshot);
    }
    Ok(())
}
