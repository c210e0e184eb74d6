//! In-process fakes for the channel transport, REST collaborators and sound
//! hook, shared by unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::SupportApi;
use crate::channel::{ChannelSignal, Transport};
use crate::error::RequestError;
use crate::events::WireFrame;
use crate::models::{Agent, ChatMessage, Identity, Role, Task, Thread};
use crate::sound::{NotificationSound, SoundError};

#[derive(Default)]
struct RecordingState {
    signals: Option<UnboundedSender<ChannelSignal>>,
    outbound: Option<UnboundedReceiver<WireFrame>>,
    sent: Vec<WireFrame>,
    identities: Vec<Identity>,
    starts: usize,
    stops: usize,
}

/// Transport that records outbound frames and lets tests inject signals.
/// Clones share state, so keep one and hand a clone to the channel.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&self, signal: ChannelSignal) {
        let state = self.state.borrow();
        match state.signals.as_ref() {
            Some(tx) => {
                let _ = tx.send(signal);
            }
            None => panic!("RecordingTransport::inject before start"),
        }
    }

    pub fn inject_frame(&self, event: &str, data: Value) {
        self.inject(ChannelSignal::Frame(WireFrame::new(event, data)));
    }

    /// Every frame sent since the first start, in order.
    pub fn sent_frames(&self) -> Vec<WireFrame> {
        let mut state = self.state.borrow_mut();
        let mut drained = Vec::new();
        if let Some(rx) = state.outbound.as_mut() {
            while let Ok(frame) = rx.try_recv() {
                drained.push(frame);
            }
        }
        state.sent.extend(drained);
        state.sent.clone()
    }

    pub fn sent_named(&self, event: &str) -> Vec<WireFrame> {
        self.sent_frames()
            .into_iter()
            .filter(|f| f.event == event)
            .collect()
    }

    pub fn start_count(&self) -> usize {
        self.state.borrow().starts
    }

    pub fn stop_count(&self) -> usize {
        self.state.borrow().stops
    }

    pub fn last_identity(&self) -> Option<Identity> {
        self.state.borrow().identities.last().cloned()
    }
}

impl Transport for RecordingTransport {
    fn start(
        &mut self,
        identity: &Identity,
        signals: UnboundedSender<ChannelSignal>,
    ) -> UnboundedSender<WireFrame> {
        // Keep frames from the previous connection before replacing it
        self.sent_frames();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.borrow_mut();
        state.signals = Some(signals);
        state.outbound = Some(rx);
        state.identities.push(identity.clone());
        state.starts += 1;
        tx
    }

    fn stop(&mut self) {
        self.sent_frames();
        let mut state = self.state.borrow_mut();
        if state.signals.take().is_some() {
            state.stops += 1;
        }
    }
}

/// Scripted REST collaborators. Endpoints named in `fail` return a 500.
#[derive(Default)]
pub struct FakeSupportApi {
    pub threads: RefCell<Vec<Thread>>,
    pub search_results: RefCell<Vec<Thread>>,
    pub messages: RefCell<HashMap<String, Vec<ChatMessage>>>,
    pub tasks: RefCell<Vec<Task>>,
    pub unread_count: Cell<u32>,
    pub agents: RefCell<Vec<Agent>>,
    failing: RefCell<HashSet<String>>,
    calls: RefCell<Vec<String>>,
}

impl FakeSupportApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threads(self, threads: Vec<Thread>) -> Self {
        *self.threads.borrow_mut() = threads;
        self
    }

    pub fn with_tasks(self, tasks: Vec<Task>) -> Self {
        *self.tasks.borrow_mut() = tasks;
        self
    }

    pub fn with_agents(self, agents: Vec<Agent>) -> Self {
        *self.agents.borrow_mut() = agents;
        self
    }

    pub fn with_messages(self, thread_id: &str, messages: Vec<ChatMessage>) -> Self {
        self.messages
            .borrow_mut()
            .insert(thread_id.to_string(), messages);
        self
    }

    pub fn fail(&self, endpoint: &str) {
        self.failing.borrow_mut().insert(endpoint.to_string());
    }

    pub fn recover(&self, endpoint: &str) {
        self.failing.borrow_mut().remove(endpoint);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self, endpoint: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.split(' ').next() == Some(endpoint))
            .count()
    }

    fn record(&self, endpoint: &str, detail: String) -> Result<(), RequestError> {
        let call = if detail.is_empty() {
            endpoint.to_string()
        } else {
            format!("{} {}", endpoint, detail)
        };
        self.calls.borrow_mut().push(call);
        if self.failing.borrow().contains(endpoint) {
            return Err(RequestError::Status {
                endpoint: endpoint.to_string(),
                status: 500,
            });
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl SupportApi for FakeSupportApi {
    async fn fetch_threads(&self, org_id: &str) -> Result<Vec<Thread>, RequestError> {
        self.record("fetch_threads", org_id.to_string())?;
        Ok(self.threads.borrow().clone())
    }

    async fn search_threads(&self, org_id: &str, query: &str) -> Result<Vec<Thread>, RequestError> {
        self.record("search_threads", format!("{} {}", org_id, query))?;
        Ok(self.search_results.borrow().clone())
    }

    async fn fetch_messages(&self, thread_id: &str) -> Result<Vec<ChatMessage>, RequestError> {
        self.record("fetch_messages", thread_id.to_string())?;
        Ok(self
            .messages
            .borrow()
            .get(thread_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_thread_read(&self, thread_id: &str, role: Role) -> Result<(), RequestError> {
        self.record("mark_thread_read", format!("{} {}", thread_id, role.as_str()))
    }

    async fn mark_thread_seen(&self, thread_id: &str) -> Result<(), RequestError> {
        self.record("mark_thread_seen", thread_id.to_string())
    }

    async fn assign_thread(
        &self,
        thread_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Thread, RequestError> {
        self.record("assign_thread", format!("{} {:?}", thread_id, agent_id))?;
        let mut thread = self
            .threads
            .borrow()
            .iter()
            .find(|t| t.id == thread_id)
            .cloned()
            .unwrap_or_else(|| Thread::stub(thread_id, chrono::Utc::now()));
        thread.assigned_to = agent_id.map(str::to_string);
        Ok(thread)
    }

    async fn fetch_tasks(&self, org_id: &str) -> Result<Vec<Task>, RequestError> {
        self.record("fetch_tasks", org_id.to_string())?;
        Ok(self.tasks.borrow().clone())
    }

    async fn fetch_unread_task_count(&self, org_id: &str) -> Result<u32, RequestError> {
        self.record("fetch_unread_task_count", org_id.to_string())?;
        Ok(self.unread_count.get())
    }

    async fn assign_task(
        &self,
        task_id: &str,
        agent_id: Option<&str>,
    ) -> Result<Task, RequestError> {
        self.record("assign_task", format!("{} {:?}", task_id, agent_id))?;
        let mut task = self
            .tasks
            .borrow()
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| RequestError::Status {
                endpoint: "assign_task".to_string(),
                status: 404,
            })?;
        task.assigned_to = agent_id.map(str::to_string);
        Ok(task)
    }

    async fn fetch_agents(&self, org_id: &str) -> Result<Vec<Agent>, RequestError> {
        self.record("fetch_agents", org_id.to_string())?;
        Ok(self.agents.borrow().clone())
    }

    async fn fetch_agent(&self, user_id: &str) -> Result<Agent, RequestError> {
        self.record("fetch_agent", user_id.to_string())?;
        self.agents
            .borrow()
            .iter()
            .find(|a| a.id == user_id)
            .cloned()
            .ok_or_else(|| RequestError::Status {
                endpoint: "fetch_agent".to_string(),
                status: 404,
            })
    }
}

/// Sound hook that counts plays and can simulate blocked audio.
#[derive(Default)]
pub struct CountingSound {
    plays: Cell<usize>,
    blocked: Cell<bool>,
}

impl CountingSound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plays(&self) -> usize {
        self.plays.get()
    }

    pub fn block(&self) {
        self.blocked.set(true);
    }
}

impl NotificationSound for CountingSound {
    fn play(&self) -> Result<(), SoundError> {
        self.plays.set(self.plays.get() + 1);
        if self.blocked.get() {
            return Err(SoundError::Unavailable("blocked by policy".to_string()));
        }
        Ok(())
    }
}
