// Toast queue for agent-facing notices: new-message toasts with a Reply
// action, and transient request/connection notices.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::constants::{TOAST_ERROR_SECS, TOAST_INFO_SECS, TOAST_MESSAGE_SECS, TOAST_WARNING_SECS};

/// Toast priority levels (higher = more important)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastAction {
    /// Open the thread and navigate the viewer to it
    Reply { thread_id: String },
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub duration: Duration,
    pub shown_at: Option<Instant>,
    pub action: Option<ToastAction>,
}

impl Toast {
    fn with_level(message: impl Into<String>, level: ToastLevel, secs: u64) -> Self {
        Self {
            message: message.into(),
            level,
            duration: Duration::from_secs(secs),
            shown_at: None,
            action: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::with_level(message, ToastLevel::Info, TOAST_INFO_SECS)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::with_level(message, ToastLevel::Success, TOAST_INFO_SECS)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::with_level(message, ToastLevel::Warning, TOAST_WARNING_SECS)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_level(message, ToastLevel::Error, TOAST_ERROR_SECS)
    }

    /// New-message toast with a Reply action for `thread_id`
    pub fn new_message(message: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            action: Some(ToastAction::Reply {
                thread_id: thread_id.into(),
            }),
            ..Self::with_level(message, ToastLevel::Warning, TOAST_MESSAGE_SECS)
        }
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn reply_target(&self) -> Option<&str> {
        match &self.action {
            Some(ToastAction::Reply { thread_id }) => Some(thread_id),
            None => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.shown_at
            .map(|shown| shown.elapsed() >= self.duration)
            .unwrap_or(false)
    }

    pub fn mark_shown(&mut self) {
        if self.shown_at.is_none() {
            self.shown_at = Some(Instant::now());
        }
    }
}

/// Dismissible toasts with priority handling and short-window de-duplication.
#[derive(Debug, Default)]
pub struct ToastQueue {
    queue: VecDeque<Toast>,
    current: Option<Toast>,
    /// Recently shown message text with its de-duplication expiry
    recent: Vec<(String, Instant)>,
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Higher-level toasts replace a lower-level current one. A displaced
    /// plain notice is dropped; a displaced actionable toast goes back to the
    /// front of the queue.
    pub fn push(&mut self, toast: Toast) {
        let now = Instant::now();
        self.recent.retain(|(_, expiry)| *expiry > now);
        // Actionable toasts are per message; never collapse them
        if toast.action.is_none() {
            if self.recent.iter().any(|(m, _)| *m == toast.message) {
                return;
            }
            self.recent
                .push((toast.message.clone(), now + Duration::from_secs(2)));
        }

        if let Some(current) = &self.current {
            if toast.level > current.level {
                let mut toast = toast;
                toast.mark_shown();
                if let Some(mut displaced) = self.current.replace(toast) {
                    if displaced.action.is_some() {
                        displaced.shown_at = None;
                        self.queue.push_front(displaced);
                    }
                }
                return;
            }
        }

        if self.current.is_none() {
            let mut toast = toast;
            toast.mark_shown();
            self.current = Some(toast);
        } else {
            let pos = self
                .queue
                .iter()
                .position(|t| t.level < toast.level)
                .unwrap_or(self.queue.len());
            self.queue.insert(pos, toast);
        }
    }

    pub fn current(&self) -> Option<&Toast> {
        self.current.as_ref()
    }

    pub fn dismiss(&mut self) {
        self.current = None;
        self.advance();
    }

    /// Remove the current toast and return it (used by the Reply action).
    pub fn take_current(&mut self) -> Option<Toast> {
        let taken = self.current.take();
        self.advance();
        taken
    }

    /// Advance past an expired toast.
    pub fn tick(&mut self) {
        if self.current.as_ref().map(Toast::is_expired).unwrap_or(false) {
            self.current = None;
            self.advance();
        }
    }

    fn advance(&mut self) {
        if self.current.is_none() {
            if let Some(mut next) = self.queue.pop_front() {
                next.mark_shown();
                self.current = Some(next);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.queue.clear();
    }
}
