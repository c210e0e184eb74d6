use std::collections::{HashMap, HashSet};

use crate::models::{ChatMessage, Role, Thread, ThreadStatus, ThreadType};

/// What opening a thread meant, so the caller can issue the matching request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenIntent {
    /// First open of an unread thread
    Claim { role: Role },
    /// Re-open of a read thread that accumulated unseen messages
    CatchUp,
    /// Already read with nothing unseen
    Current,
}

/// Client-side collection of conversation threads plus the selected
/// thread's message list. Exclusive owner of thread mutation.
pub struct ThreadStore {
    /// Insertion order; newly created threads go to the front
    threads: Vec<Thread>,
    selected: Option<String>,
    /// Messages of the selected thread, in arrival order
    messages: Vec<ChatMessage>,
    /// thread_id -> message ids already applied, so a redelivery is not
    /// counted twice. Pruned with the thread on snapshot reload.
    seen_message_ids: HashMap<String, HashSet<String>>,
    /// thread_id -> agent currently typing
    typing: HashMap<String, String>,
    unseen_seed: u32,
}

impl ThreadStore {
    pub fn new(unseen_seed: u32) -> Self {
        Self {
            threads: Vec::new(),
            selected: None,
            messages: Vec::new(),
            seen_message_ids: HashMap::new(),
            typing: HashMap::new(),
            unseen_seed,
        }
    }

    pub fn clear(&mut self) {
        self.threads.clear();
        self.selected = None;
        self.messages.clear();
        self.seen_message_ids.clear();
        self.typing.clear();
    }

    // ===== Getters =====

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn get(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    pub fn contains(&self, thread_id: &str) -> bool {
        self.get(thread_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    pub fn threads_of_type(&self, thread_type: ThreadType) -> Vec<&Thread> {
        self.threads
            .iter()
            .filter(|t| t.thread_type == thread_type)
            .collect()
    }

    pub fn threads_with_status(&self, status: ThreadStatus) -> Vec<&Thread> {
        self.threads.iter().filter(|t| t.status == status).collect()
    }

    pub fn assigned_to(&self, agent_id: &str) -> Vec<&Thread> {
        self.threads
            .iter()
            .filter(|t| t.is_assigned_to(agent_id))
            .collect()
    }

    pub fn total_unseen(&self) -> u32 {
        self.threads
            .iter()
            .fold(0u32, |acc, t| acc.saturating_add(t.unseen_count))
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Thread> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    pub fn is_selected(&self, thread_id: &str) -> bool {
        self.selected.as_deref() == Some(thread_id)
    }

    /// Selected thread's messages in arrival order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Selected thread's messages ordered by `created_at`, arrival order
    /// breaking ties. For rendering only; storage keeps arrival order.
    pub fn ordered_messages(&self) -> Vec<&ChatMessage> {
        let mut ordered: Vec<&ChatMessage> = self.messages.iter().collect();
        ordered.sort_by_key(|m| m.created_at);
        ordered
    }

    pub fn typing_agent(&self, thread_id: &str) -> Option<&str> {
        self.typing.get(thread_id).map(String::as_str)
    }

    // ===== Mutations =====

    /// Replace the whole collection with an authoritative snapshot. State
    /// kept for threads missing from it is dropped, including the selection.
    pub fn load_snapshot(&mut self, threads: Vec<Thread>) {
        tracing::debug!(count = threads.len(), "Thread snapshot loaded");
        self.threads = threads;

        let ids: HashSet<&str> = self.threads.iter().map(|t| t.id.as_str()).collect();
        self.seen_message_ids
            .retain(|thread_id, _| ids.contains(thread_id.as_str()));
        self.typing
            .retain(|thread_id, _| ids.contains(thread_id.as_str()));
        if self
            .selected
            .as_deref()
            .is_some_and(|selected| !ids.contains(selected))
        {
            self.selected = None;
            self.messages.clear();
        }
    }

    fn already_seen(&self, message: &ChatMessage) -> bool {
        self.seen_message_ids
            .get(&message.thread_id)
            .is_some_and(|ids| ids.contains(&message.id))
    }

    fn remember(&mut self, message: &ChatMessage) {
        self.seen_message_ids
            .entry(message.thread_id.clone())
            .or_default()
            .insert(message.id.clone());
    }

    /// Insert a thread announced by `chatStarted` at the head of the list.
    /// A thread already present is left as is.
    pub fn apply_thread_created(&mut self, mut thread: Thread) -> bool {
        if self.contains(&thread.id) {
            tracing::debug!(thread_id = %thread.id, "Ignoring chatStarted for known thread");
            return false;
        }
        thread.unseen_count = self.unseen_seed;
        thread.readed = false;
        self.threads.insert(0, thread);
        true
    }

    /// Count an arriving message against its thread. Increments regardless
    /// of the read flag; appends to the message list only when selected.
    pub fn apply_incoming_message(&mut self, message: ChatMessage) -> bool {
        if self.already_seen(&message) {
            tracing::debug!(message_id = %message.id, "Ignoring redelivered message");
            return false;
        }
        let selected = self.is_selected(&message.thread_id);
        let Some(thread) = self.threads.iter_mut().find(|t| t.id == message.thread_id) else {
            tracing::debug!(thread_id = %message.thread_id, "Message for unknown thread");
            return false;
        };

        thread.unseen_count = thread.unseen_count.saturating_add(1);
        thread.latest_message = Some(message.content.clone());
        self.remember(&message);
        if selected {
            self.messages.push(message);
        }
        true
    }

    /// Set `assigned_to`; read state is untouched.
    pub fn apply_assignment_changed(&mut self, thread_id: &str, agent_id: Option<String>) -> bool {
        match self.threads.iter_mut().find(|t| t.id == thread_id) {
            Some(thread) => {
                thread.assigned_to = agent_id;
                true
            }
            None => false,
        }
    }

    /// Opening always leaves the thread read with nothing unseen; the intent
    /// tells which request backs it. Idempotent.
    pub fn mark_opened(&mut self, thread_id: &str, viewer_role: Role) -> Option<OpenIntent> {
        let thread = self.threads.iter_mut().find(|t| t.id == thread_id)?;
        let intent = if !thread.readed {
            OpenIntent::Claim { role: viewer_role }
        } else if thread.unseen_count > 0 {
            OpenIntent::CatchUp
        } else {
            OpenIntent::Current
        };
        thread.readed = true;
        thread.unseen_count = 0;
        Some(intent)
    }

    /// Change the selected thread. Returns true if the selection changed.
    pub fn select(&mut self, thread_id: &str) -> bool {
        if self.is_selected(thread_id) {
            return false;
        }
        self.selected = Some(thread_id.to_string());
        self.messages.clear();
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.messages.clear();
    }

    /// Apply a fetched message history, only if `thread_id` is still selected.
    pub fn load_messages(&mut self, thread_id: &str, messages: Vec<ChatMessage>) -> bool {
        if !self.is_selected(thread_id) {
            tracing::debug!(thread_id, "Discarding history for thread no longer selected");
            return false;
        }
        self.seen_message_ids
            .entry(thread_id.to_string())
            .or_default()
            .extend(messages.iter().map(|m| m.id.clone()));
        self.messages = messages;
        true
    }

    /// Optimistic local send by the acting agent. Does not touch unseen count.
    pub fn append_local_message(&mut self, message: ChatMessage) -> bool {
        let selected = self.is_selected(&message.thread_id);
        let Some(thread) = self.threads.iter_mut().find(|t| t.id == message.thread_id) else {
            return false;
        };
        thread.latest_message = Some(message.content.clone());
        self.remember(&message);
        if selected {
            self.messages.push(message);
        }
        true
    }

    pub fn set_typing(&mut self, thread_id: &str, agent_name: &str) {
        self.typing
            .insert(thread_id.to_string(), agent_name.to_string());
    }

    pub fn clear_typing(&mut self, thread_id: &str) {
        self.typing.remove(thread_id);
    }
}
