//! Session runtime: wires the event channel, REST collaborators and stores.
//!
//! Everything runs on one thread. Channel frames are applied synchronously by
//! the subscribers registered in [`CoreRuntime::with_parts`], and no store
//! borrow is held across an `.await`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::Result;
use chrono::Utc;

use crate::api::{HttpSupportApi, SupportApi};
use crate::assignment::{validate_agent, AgentOption, AssignTarget, AssignmentWorkflow};
use crate::channel::{
    ChannelNotice, ConnectionState, EventChannel, ReconnectPolicy, Transport, WebSocketTransport,
};
use crate::config::CoreConfig;
use crate::constants::{events, DEFAULT_PARTICIPANT_NAME};
use crate::error::{RequestError, WorkflowError};
use crate::events::{
    decode, ChatStarted, NotificationPayload, OutboundEvent, PresenceUpdate, ReceiveMessage,
    StopTyping, TaskCreated, TaskReaded, Typing, UpdateDashboard,
};
use crate::models::{ChatMessage, Identity};
use crate::sound::{play_or_log, NotificationSound, SilentSound};
use crate::store::{NotificationAggregator, OpenIntent, PresenceTracker, TaskStore, ThreadStore};
use crate::toast::{Toast, ToastQueue};

pub struct CoreRuntime {
    config: CoreConfig,
    session: Rc<RefCell<Option<Identity>>>,
    channel: EventChannel,
    api: Rc<dyn SupportApi>,
    threads: Rc<RefCell<ThreadStore>>,
    tasks: Rc<RefCell<TaskStore>>,
    notifications: Rc<RefCell<NotificationAggregator>>,
    presence: Rc<RefCell<PresenceTracker>>,
    toasts: Rc<RefCell<ToastQueue>>,
    assignment: AssignmentWorkflow,
    sound: Rc<dyn NotificationSound>,
    sound_enabled: Rc<Cell<bool>>,
}

impl CoreRuntime {
    /// Runtime backed by the WebSocket channel and the HTTP client, with a
    /// silent sound player.
    pub fn new(config: CoreConfig) -> Result<Self> {
        Self::with_sound(config, Rc::new(SilentSound))
    }

    pub fn with_sound(config: CoreConfig, sound: Rc<dyn NotificationSound>) -> Result<Self> {
        let policy = ReconnectPolicy::from(&config.reconnect);
        let transport = WebSocketTransport::new(&config.socket_url, policy)?;
        let api = HttpSupportApi::new(&config)?;
        Ok(Self::with_parts(config, Box::new(transport), Rc::new(api), sound))
    }

    pub fn with_parts(
        config: CoreConfig,
        transport: Box<dyn Transport>,
        api: Rc<dyn SupportApi>,
        sound: Rc<dyn NotificationSound>,
    ) -> Self {
        let mut runtime = Self {
            session: Rc::new(RefCell::new(None)),
            channel: EventChannel::new(transport),
            api,
            threads: Rc::new(RefCell::new(ThreadStore::new(config.thread_created_unseen_seed))),
            tasks: Rc::new(RefCell::new(TaskStore::new())),
            notifications: Rc::new(RefCell::new(NotificationAggregator::new())),
            presence: Rc::new(RefCell::new(PresenceTracker::new())),
            toasts: Rc::new(RefCell::new(ToastQueue::new())),
            assignment: AssignmentWorkflow::new(),
            sound,
            sound_enabled: Rc::new(Cell::new(config.sound_enabled)),
            config,
        };
        runtime.register_handlers();
        runtime
    }

    fn register_handlers(&mut self) {
        let threads = self.threads.clone();
        self.channel.subscribe(events::CHAT_STARTED, move |data| {
            if let Some(payload) = decode::<ChatStarted>(events::CHAT_STARTED, data) {
                threads
                    .borrow_mut()
                    .apply_thread_created(payload.into_thread(Utc::now()));
            }
        });

        let threads = self.threads.clone();
        self.channel.subscribe(events::RECEIVE_MESSAGE, move |data| {
            if let Some(message) = decode::<ReceiveMessage>(events::RECEIVE_MESSAGE, data) {
                threads.borrow_mut().apply_incoming_message(message);
            }
        });

        // Echoes of our own sends carry the local id and are dropped as redeliveries
        let threads = self.threads.clone();
        self.channel.subscribe(events::UPDATE_DASHBOARD, move |data| {
            if let Some(payload) = decode::<UpdateDashboard>(events::UPDATE_DASHBOARD, data) {
                threads.borrow_mut().apply_incoming_message(payload.into_message());
            }
        });

        let threads = self.threads.clone();
        self.channel.subscribe(events::TYPING, move |data| {
            if let Some(payload) = decode::<Typing>(events::TYPING, data) {
                threads
                    .borrow_mut()
                    .set_typing(&payload.thread_id, &payload.agent_name);
            }
        });

        let threads = self.threads.clone();
        self.channel.subscribe(events::STOP_TYPING, move |data| {
            if let Some(payload) = decode::<StopTyping>(events::STOP_TYPING, data) {
                threads.borrow_mut().clear_typing(&payload.thread_id);
            }
        });

        let tasks = self.tasks.clone();
        self.channel.subscribe(events::TASK_CREATED, move |data| {
            if let Some(payload) = decode::<TaskCreated>(events::TASK_CREATED, data) {
                tasks
                    .borrow_mut()
                    .apply_task_created(&payload.task_id, payload.task);
            }
        });

        let tasks = self.tasks.clone();
        self.channel.subscribe(events::TASK_READED, move |data| {
            if let Some(payload) = decode::<TaskReaded>(events::TASK_READED, data) {
                tasks.borrow_mut().apply_task_readed(&payload.task_id);
            }
        });

        for event in [events::AGENT_STATUS_UPDATE, events::ONLINE_STATUS] {
            let presence = self.presence.clone();
            self.channel.subscribe(event, move |data| {
                if let Some(payload) = decode::<PresenceUpdate>(event, data) {
                    presence
                        .borrow_mut()
                        .apply_remote(&payload.user_id, payload.online);
                }
            });
        }

        let notifications = self.notifications.clone();
        let toasts = self.toasts.clone();
        let sound = self.sound.clone();
        let sound_enabled = self.sound_enabled.clone();
        self.channel.subscribe(events::NOTIFICATION, move |data| {
            let Some(payload) = decode::<NotificationPayload>(events::NOTIFICATION, data) else {
                return;
            };
            let thread = payload.thread;
            notifications.borrow_mut().apply_notification(
                &thread.id,
                &thread.name,
                &payload.message,
                Utc::now(),
            );
            if sound_enabled.get() {
                play_or_log(sound.as_ref());
            }
            let label = if thread.name.is_empty() {
                DEFAULT_PARTICIPANT_NAME
            } else {
                thread.name.as_str()
            };
            let text = format!("{}: {}", label, payload.message);
            toasts.borrow_mut().push(Toast::new_message(text, thread.id));
        });
    }

    // ===== Session =====

    /// Start a session. A different identity than the current one clears
    /// every store and replaces the channel.
    pub async fn login(&mut self, identity: Identity) -> Result<(), WorkflowError> {
        let changed = self.session.borrow().as_ref() != Some(&identity);
        if changed {
            self.reset_stores();
            *self.session.borrow_mut() = Some(identity.clone());
        }
        let started = self.channel.connect(identity.clone());
        if !changed && !started {
            tracing::debug!(user_id = %identity.user_id, "Session already active");
            return Ok(());
        }
        tracing::info!(org_id = %identity.org_id, user_id = %identity.user_id, "Session started");
        self.bootstrap().await
    }

    pub fn logout(&mut self) {
        self.channel.disconnect();
        *self.session.borrow_mut() = None;
        self.reset_stores();
    }

    fn reset_stores(&mut self) {
        self.threads.borrow_mut().clear();
        self.tasks.borrow_mut().clear();
        self.notifications.borrow_mut().clear_all();
        self.presence.borrow_mut().clear();
        self.toasts.borrow_mut().clear();
        self.assignment.close();
    }

    fn identity(&self) -> Result<Identity, WorkflowError> {
        self.session.borrow().clone().ok_or(WorkflowError::NotLoggedIn)
    }

    /// Fetch every snapshot the session starts from. A failed fetch leaves
    /// its store as is and surfaces an error toast; the others still run.
    pub async fn bootstrap(&self) -> Result<(), WorkflowError> {
        let identity = self.identity()?;
        let api = self.api.clone();

        match api.fetch_threads(&identity.org_id).await {
            Ok(threads) => self.threads.borrow_mut().load_snapshot(threads),
            Err(e) => self.report_request_failure("Failed to load threads", &e),
        }

        match api.fetch_tasks(&identity.org_id).await {
            Ok(tasks) => self.tasks.borrow_mut().load_snapshot(tasks),
            Err(e) => self.report_request_failure("Failed to load tasks", &e),
        }
        // The count below covers whatever the snapshot scheduled
        self.tasks.borrow_mut().take_pending_refresh();
        self.refresh_unread_task_count(&identity.org_id).await;

        match api.fetch_agents(&identity.org_id).await {
            Ok(agents) => self.presence.borrow_mut().load_roster(agents),
            Err(e) => self.report_request_failure("Failed to load agents", &e),
        }

        let own_online = match api.fetch_agent(&identity.user_id).await {
            Ok(agent) => agent.online,
            Err(e) => {
                self.report_request_failure("Failed to load own presence", &e);
                false
            }
        };
        self.presence
            .borrow_mut()
            .seed_self(&identity.user_id, own_online);
        Ok(())
    }

    async fn refresh_unread_task_count(&self, org_id: &str) {
        match self.api.fetch_unread_task_count(org_id).await {
            Ok(count) => self.tasks.borrow_mut().set_unread_count(count),
            Err(e) => self.report_request_failure("Failed to refresh unread tasks", &e),
        }
    }

    // ===== Event loop =====

    /// Apply every queued channel signal without waiting.
    pub fn pump(&mut self) -> Vec<ChannelNotice> {
        let notices = self.channel.pump();
        for notice in &notices {
            self.surface_notice(notice);
        }
        self.toasts.borrow_mut().tick();
        notices
    }

    /// Wait for one channel signal, apply it and run the refetches it
    /// scheduled. Returns false once the channel is torn down.
    pub async fn step(&mut self) -> bool {
        let Some(signal) = self.channel.next_signal().await else {
            return false;
        };
        if let Some(notice) = self.channel.handle_signal(signal) {
            self.surface_notice(&notice);
        }
        self.toasts.borrow_mut().tick();
        self.process_pending().await;
        true
    }

    pub async fn run_until_closed(&mut self) {
        while self.step().await {}
        tracing::info!("Channel closed, event loop finished");
    }

    fn surface_notice(&self, notice: &ChannelNotice) {
        let toast = match notice {
            ChannelNotice::ReconnectFailing { attempts } => Toast::warning(format!(
                "Connection lost, still reconnecting after {} attempts",
                attempts
            )),
            ChannelNotice::Recovered => Toast::success("Connection restored"),
        };
        self.toasts.borrow_mut().push(toast);
    }

    /// Run the task refetches owed since the last call.
    pub async fn process_pending(&self) {
        let Ok(identity) = self.identity() else {
            return;
        };
        let mut pending = self.tasks.borrow_mut().take_pending_refresh();
        if pending.is_empty() {
            return;
        }

        if pending.list {
            match self.api.fetch_tasks(&identity.org_id).await {
                Ok(tasks) => {
                    let mut store = self.tasks.borrow_mut();
                    store.load_snapshot(tasks);
                    pending.unread_count |= store.take_pending_refresh().unread_count;
                }
                Err(e) => self.report_request_failure("Failed to refresh tasks", &e),
            }
        }
        if pending.unread_count {
            self.refresh_unread_task_count(&identity.org_id).await;
        }
    }

    // ===== Threads =====

    /// Select `thread_id`, mark it opened and load its history. The local
    /// read state is applied first and kept even if the backing request fails.
    pub async fn open_thread(&self, thread_id: &str) -> Result<(), WorkflowError> {
        let identity = self.identity()?;
        let intent = {
            let mut threads = self.threads.borrow_mut();
            if !threads.contains(thread_id) {
                return Err(WorkflowError::UnknownThread(thread_id.to_string()));
            }
            threads.select(thread_id);
            threads.mark_opened(thread_id, identity.role)
        };

        let request = match intent {
            Some(OpenIntent::Claim { role }) => {
                Some(self.api.mark_thread_read(thread_id, role).await)
            }
            Some(OpenIntent::CatchUp) => Some(self.api.mark_thread_seen(thread_id).await),
            Some(OpenIntent::Current) | None => None,
        };
        if let Some(Err(e)) = request {
            self.report_request_failure("Failed to mark thread as read", &e);
        }

        match self.api.fetch_messages(thread_id).await {
            Ok(messages) => {
                self.threads.borrow_mut().load_messages(thread_id, messages);
            }
            Err(e) => self.report_request_failure("Failed to load messages", &e),
        }
        Ok(())
    }

    /// Run the Reply action of the current toast, if it has one.
    /// Returns the opened thread id.
    pub async fn reply_from_toast(&self) -> Result<Option<String>, WorkflowError> {
        let toast = self.toasts.borrow_mut().take_current();
        let Some(thread_id) = toast.as_ref().and_then(|t| t.reply_target()) else {
            return Ok(None);
        };
        let thread_id = thread_id.to_string();
        self.open_thread(&thread_id).await?;
        Ok(Some(thread_id))
    }

    /// Replace the thread list with a search result; an empty query reloads
    /// the full list.
    pub async fn search_threads(&self, query: &str) -> Result<(), WorkflowError> {
        let identity = self.identity()?;
        let query = query.trim();
        let result = if query.is_empty() {
            self.api.fetch_threads(&identity.org_id).await
        } else {
            self.api.search_threads(&identity.org_id, query).await
        };
        match result {
            Ok(threads) => {
                self.threads.borrow_mut().load_snapshot(threads);
                Ok(())
            }
            Err(e) => {
                self.report_request_failure("Search failed", &e);
                Err(e.into())
            }
        }
    }

    /// Optimistic local send, broadcast as `updateDashboard`.
    pub fn send_message(
        &self,
        thread_id: &str,
        content: &str,
    ) -> Result<ChatMessage, WorkflowError> {
        let identity = self.identity()?;
        let message = ChatMessage::local(thread_id, identity.name.clone(), content);
        if !self.threads.borrow_mut().append_local_message(message.clone()) {
            return Err(WorkflowError::UnknownThread(thread_id.to_string()));
        }
        let event = OutboundEvent::UpdateDashboard {
            id: message.id.clone(),
            sender: identity.name,
            content: content.to_string(),
            thread_id: thread_id.to_string(),
        };
        if let Err(e) = self.channel.emit(event) {
            tracing::warn!(thread_id, error = %e, "Message not broadcast");
            self.toasts
                .borrow_mut()
                .push(Toast::warning("Offline: message was not delivered"));
        }
        Ok(message)
    }

    pub fn start_typing(&self, thread_id: &str) -> Result<(), WorkflowError> {
        let identity = self.identity()?;
        self.emit_quietly(OutboundEvent::Typing {
            thread_id: thread_id.to_string(),
            agent_name: identity.name,
        });
        Ok(())
    }

    pub fn stop_typing(&self, thread_id: &str) -> Result<(), WorkflowError> {
        self.identity()?;
        self.emit_quietly(OutboundEvent::StopTyping {
            thread_id: thread_id.to_string(),
        });
        Ok(())
    }

    // ===== Tasks =====

    /// Mark a task read locally and tell the other agents. The unread count is
    /// refetched by the next `process_pending`.
    pub fn mark_task_read(&self, task_id: &str) -> Result<(), WorkflowError> {
        let identity = self.identity()?;
        {
            let mut tasks = self.tasks.borrow_mut();
            if tasks.mark_opened(task_id).is_none() {
                return Err(WorkflowError::UnknownTask(task_id.to_string()));
            }
            tasks.select(task_id);
        }
        self.emit_quietly(OutboundEvent::ReadedTask {
            task_id: task_id.to_string(),
            org_id: identity.org_id,
        });
        Ok(())
    }

    // ===== Presence =====

    /// Set the acting agent's own presence and announce it.
    pub fn toggle_presence(&self, online: bool) -> Result<bool, WorkflowError> {
        let identity = self.identity()?;
        let changed = self.presence.borrow_mut().set_own(online);
        self.emit_quietly(OutboundEvent::AgentOnline {
            id: identity.user_id,
            online,
            name: identity.name,
            org_id: identity.org_id,
        });
        Ok(changed)
    }

    // ===== Assignment =====

    pub fn open_assignment(&mut self, target: AssignTarget) {
        self.assignment.open(target);
    }

    pub fn close_assignment(&mut self) {
        self.assignment.close();
    }

    pub fn set_assignment_query(&mut self, query: &str) {
        self.assignment.set_query(query);
    }

    pub fn assignment(&self) -> &AssignmentWorkflow {
        &self.assignment
    }

    pub fn assignment_options(&self) -> Vec<AgentOption> {
        self.assignment.options(&self.presence.borrow())
    }

    /// Assign the picker's open target to `agent_id`.
    pub async fn assign_picked(&mut self, agent_id: &str) -> Result<(), WorkflowError> {
        self.identity()?;
        let target = self
            .assignment
            .prepare_assign(agent_id, &self.presence.borrow())?;
        self.apply_assignment(target, Some(agent_id)).await
    }

    pub async fn assign(
        &mut self,
        target: AssignTarget,
        agent_id: &str,
    ) -> Result<(), WorkflowError> {
        self.identity()?;
        validate_agent(agent_id, &self.presence.borrow())?;
        self.apply_assignment(target, Some(agent_id)).await
    }

    pub async fn unassign(&mut self, target: AssignTarget) -> Result<(), WorkflowError> {
        self.identity()?;
        self.apply_assignment(target, None).await
    }

    /// Nothing changes locally until the server accepts the assignment.
    async fn apply_assignment(
        &mut self,
        target: AssignTarget,
        agent_id: Option<&str>,
    ) -> Result<(), WorkflowError> {
        let api = self.api.clone();
        let result = match &target {
            AssignTarget::Thread(id) => api.assign_thread(id, agent_id).await.map(|thread| {
                self.threads
                    .borrow_mut()
                    .apply_assignment_changed(&thread.id, thread.assigned_to);
            }),
            AssignTarget::Task(id) => api.assign_task(id, agent_id).await.map(|task| {
                self.tasks
                    .borrow_mut()
                    .apply_assignment_changed(&task.id, task.assigned_to);
            }),
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    assign_target = target.id(),
                    agent = ?agent_id,
                    "Assignment applied"
                );
                if self.assignment.is_open_for(&target) {
                    self.assignment.close();
                }
                Ok(())
            }
            Err(e) => {
                self.report_request_failure("Assignment failed", &e);
                Err(e.into())
            }
        }
    }

    // ===== Notifications =====

    pub fn mark_notification_read(&self, thread_id: &str) -> bool {
        self.notifications.borrow_mut().mark_read(thread_id)
    }

    pub fn mark_all_notifications_read(&self) {
        self.notifications.borrow_mut().mark_all_read();
    }

    pub fn delete_notification(&self, thread_id: &str) -> bool {
        self.notifications.borrow_mut().delete(thread_id)
    }

    pub fn clear_notifications(&self) {
        self.notifications.borrow_mut().clear_all();
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.sound_enabled.set(enabled);
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled.get()
    }

    // ===== Accessors =====

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn session(&self) -> Option<Identity> {
        self.session.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn threads(&self) -> Rc<RefCell<ThreadStore>> {
        self.threads.clone()
    }

    pub fn tasks(&self) -> Rc<RefCell<TaskStore>> {
        self.tasks.clone()
    }

    pub fn notifications(&self) -> Rc<RefCell<NotificationAggregator>> {
        self.notifications.clone()
    }

    pub fn presence(&self) -> Rc<RefCell<PresenceTracker>> {
        self.presence.clone()
    }

    pub fn toasts(&self) -> Rc<RefCell<ToastQueue>> {
        self.toasts.clone()
    }

    fn emit_quietly(&self, event: OutboundEvent) {
        let name = event.name();
        if let Err(e) = self.channel.emit(event) {
            tracing::debug!(event = name, error = %e, "Emit dropped");
        }
    }

    fn report_request_failure(&self, context: &str, error: &RequestError) {
        tracing::warn!(error = %error, "{}", context);
        self.toasts
            .borrow_mut()
            .push(Toast::error(format!("{}: {}", context, error)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelSignal;
    use crate::models::{Agent, Role, Task, Thread};
    use crate::testing::{CountingSound, FakeSupportApi, RecordingTransport};
    use crate::toast::ToastLevel;
    use serde_json::json;

    struct Harness {
        runtime: CoreRuntime,
        transport: RecordingTransport,
        api: Rc<FakeSupportApi>,
        sound: Rc<CountingSound>,
    }

    fn agent(id: &str, name: &str, online: bool) -> Agent {
        Agent {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.com", id),
            online,
        }
    }

    fn task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            query: "refund".to_string(),
            priority: Default::default(),
            assigned_to: None,
            readed: false,
            created_at: Utc::now(),
        }
    }

    fn harness(api: FakeSupportApi) -> Harness {
        let transport = RecordingTransport::new();
        let api = Rc::new(api);
        let sound = Rc::new(CountingSound::new());
        let runtime = CoreRuntime::with_parts(
            CoreConfig::default(),
            Box::new(transport.clone()),
            api.clone(),
            sound.clone(),
        );
        Harness {
            runtime,
            transport,
            api,
            sound,
        }
    }

    fn identity() -> Identity {
        Identity::new("org1", "u1", Role::Agent, "Priya")
    }

    async fn logged_in(api: FakeSupportApi) -> Harness {
        let mut h = harness(api);
        h.runtime.login(identity()).await.unwrap();
        h.transport.inject(ChannelSignal::Connected);
        h.runtime.pump();
        h
    }

    fn default_api() -> FakeSupportApi {
        FakeSupportApi::new()
            .with_threads(vec![Thread::stub("t1", Utc::now())])
            .with_tasks(vec![task("k1")])
            .with_agents(vec![agent("u1", "Priya", true), agent("a2", "Omar", true)])
    }

    #[tokio::test]
    async fn test_login_bootstraps_snapshots() {
        let h = logged_in(default_api()).await;
        assert_eq!(h.runtime.threads().borrow().len(), 1);
        assert_eq!(h.runtime.tasks().borrow().tasks().len(), 1);
        assert_eq!(h.runtime.tasks().borrow().unread_count(), Some(0));
        assert!(h.runtime.presence().borrow().self_online());
        assert_eq!(h.transport.sent_named(events::REGISTER_ORG).len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_failure_surfaces_toast_and_continues() {
        let api = default_api();
        api.fail("fetch_threads");
        let h = logged_in(api).await;
        assert!(h.runtime.threads().borrow().is_empty());
        assert_eq!(h.runtime.tasks().borrow().tasks().len(), 1);
        let toasts = h.runtime.toasts();
        let toasts = toasts.borrow();
        assert_eq!(toasts.current().unwrap().level, ToastLevel::Error);
    }

    #[tokio::test]
    async fn test_login_same_identity_is_noop() {
        let mut h = logged_in(default_api()).await;
        let calls = h.api.calls().len();
        h.runtime.login(identity()).await.unwrap();
        assert_eq!(h.api.calls().len(), calls);
        assert_eq!(h.transport.start_count(), 1);
    }

    #[tokio::test]
    async fn test_identity_change_clears_stores() {
        let mut h = logged_in(default_api()).await;
        h.transport.inject_frame(
            events::NOTIFICATION,
            json!({ "message": "hi", "thread": { "id": "t1", "name": "Dana" } }),
        );
        h.runtime.pump();
        assert_eq!(h.runtime.notifications().borrow().badge_count(), 1);

        h.api.threads.borrow_mut().clear();
        h.runtime
            .login(Identity::new("org2", "u9", Role::Admin, "Sam"))
            .await
            .unwrap();
        assert!(h.runtime.threads().borrow().is_empty());
        assert!(h.runtime.notifications().borrow().is_empty());
        assert_eq!(h.transport.start_count(), 2);
        assert_eq!(h.transport.last_identity().unwrap().org_id, "org2");
    }

    #[tokio::test]
    async fn test_notification_plays_sound_and_queues_reply_toast() {
        let mut h = logged_in(default_api()).await;
        h.transport.inject_frame(
            events::NOTIFICATION,
            json!({ "message": "where is my order?", "thread": { "id": "t1", "name": "Dana" } }),
        );
        h.runtime.pump();

        assert_eq!(h.sound.plays(), 1);
        let toasts = h.runtime.toasts();
        let current = toasts.borrow().current().cloned().unwrap();
        assert_eq!(current.message, "Dana: where is my order?");
        assert_eq!(current.reply_target(), Some("t1"));
    }

    #[tokio::test]
    async fn test_sound_preference_and_blocked_audio() {
        let mut h = logged_in(default_api()).await;
        h.runtime.set_sound_enabled(false);
        h.transport.inject_frame(
            events::NOTIFICATION,
            json!({ "message": "one", "thread": { "id": "t1" } }),
        );
        h.runtime.pump();
        assert_eq!(h.sound.plays(), 0);

        h.runtime.set_sound_enabled(true);
        h.sound.block();
        h.transport.inject_frame(
            events::NOTIFICATION,
            json!({ "message": "two", "thread": { "id": "t1" } }),
        );
        h.runtime.pump();
        assert_eq!(h.sound.plays(), 1);
        assert_eq!(h.runtime.notifications().borrow().badge_count(), 2);
    }

    #[tokio::test]
    async fn test_reply_from_toast_opens_thread() {
        let mut h = logged_in(default_api()).await;
        h.transport.inject_frame(
            events::NOTIFICATION,
            json!({ "message": "hi", "thread": { "id": "t1", "name": "Dana" } }),
        );
        h.runtime.pump();

        let opened = h.runtime.reply_from_toast().await.unwrap();
        assert_eq!(opened.as_deref(), Some("t1"));
        let threads = h.runtime.threads();
        let threads = threads.borrow();
        assert!(threads.is_selected("t1"));
        assert!(threads.get("t1").unwrap().readed);
        assert_eq!(h.api.call_count("mark_thread_read"), 1);
    }

    #[tokio::test]
    async fn test_open_thread_claim_failure_keeps_local_state() {
        let h = logged_in(default_api()).await;
        h.api.fail("mark_thread_read");
        h.runtime.open_thread("t1").await.unwrap();

        let threads = h.runtime.threads();
        let thread = threads.borrow().get("t1").cloned().unwrap();
        assert!(thread.readed);
        assert_eq!(thread.unseen_count, 0);
        assert_eq!(
            h.runtime.toasts().borrow().current().unwrap().level,
            ToastLevel::Error
        );
    }

    #[tokio::test]
    async fn test_open_thread_catch_up_uses_seen_endpoint() {
        let mut h = logged_in(default_api()).await;
        h.runtime.open_thread("t1").await.unwrap();
        h.runtime.threads().borrow_mut().clear_selection();
        h.transport.inject_frame(
            events::RECEIVE_MESSAGE,
            json!({ "id": "m1", "threadId": "t1", "sender": "User", "content": "hello" }),
        );
        h.runtime.pump();

        h.runtime.open_thread("t1").await.unwrap();
        assert_eq!(h.api.call_count("mark_thread_read"), 1);
        assert_eq!(h.api.call_count("mark_thread_seen"), 1);
        assert!(matches!(
            h.runtime.open_thread("nope").await,
            Err(WorkflowError::UnknownThread(_))
        ));
    }

    #[tokio::test]
    async fn test_send_message_appends_and_emits() {
        let mut h = logged_in(default_api()).await;
        h.runtime.open_thread("t1").await.unwrap();
        let message = h.runtime.send_message("t1", "On it").unwrap();

        let frames = h.transport.sent_named(events::UPDATE_DASHBOARD);
        assert_eq!(
            frames[0].data,
            json!({ "id": message.id, "sender": "Priya", "content": "On it", "threadId": "t1" })
        );

        // Server echo of our own send is not applied twice
        h.transport.inject_frame(events::UPDATE_DASHBOARD, frames[0].data.clone());
        h.runtime.pump();
        let threads = h.runtime.threads();
        let threads = threads.borrow();
        assert_eq!(threads.messages(), &[message]);
        assert_eq!(threads.get("t1").unwrap().unseen_count, 0);
    }

    #[tokio::test]
    async fn test_dashboard_message_from_same_named_agent_is_counted() {
        let mut h = logged_in(default_api()).await;
        h.transport.inject_frame(
            events::UPDATE_DASHBOARD,
            json!({ "sender": "Priya", "content": "from the other Priya", "threadId": "t1" }),
        );
        h.runtime.pump();

        let threads = h.runtime.threads();
        let thread = threads.borrow().get("t1").cloned().unwrap();
        assert_eq!(thread.latest_message.as_deref(), Some("from the other Priya"));
        assert_eq!(thread.unseen_count, 1);
    }

    #[tokio::test]
    async fn test_task_events_schedule_refetches() {
        let mut h = logged_in(default_api()).await;
        h.api.unread_count.set(3);
        h.api.tasks.borrow_mut().push(task("k2"));
        h.transport
            .inject_frame(events::TASK_CREATED, json!({ "taskId": "k2" }));
        h.runtime.pump();
        h.runtime.process_pending().await;

        let tasks = h.runtime.tasks();
        assert_eq!(tasks.borrow().tasks().len(), 2);
        assert_eq!(tasks.borrow().unread_count(), Some(3));
        assert_eq!(h.api.call_count("fetch_tasks"), 2);
    }

    #[tokio::test]
    async fn test_mark_task_read_emits_readed_task() {
        let h = logged_in(default_api()).await;
        h.runtime.mark_task_read("k1").unwrap();
        assert!(h.runtime.tasks().borrow().get("k1").unwrap().readed);
        let frames = h.transport.sent_named(events::READED_TASK);
        assert_eq!(frames[0].data, json!({ "data": "k1", "orgId": "org1" }));

        h.runtime.process_pending().await;
        assert_eq!(h.api.call_count("fetch_unread_task_count"), 2);
    }

    #[tokio::test]
    async fn test_toggle_presence_is_optimistic_and_announced() {
        let mut h = logged_in(default_api()).await;
        assert!(h.runtime.toggle_presence(false).unwrap());
        assert!(!h.runtime.presence().borrow().self_online());
        let frames = h.transport.sent_named(events::AGENT_ONLINE);
        assert_eq!(
            frames[0].data,
            json!({ "id": "u1", "online": false, "name": "Priya", "orgId": "org1" })
        );

        h.transport.inject_frame(
            events::ONLINE_STATUS,
            json!({ "userId": "a2", "online": false }),
        );
        h.runtime.pump();
        assert!(!h.runtime.presence().borrow().is_online("a2"));
    }

    #[tokio::test]
    async fn test_failed_assignment_changes_nothing() {
        let mut h = logged_in(default_api()).await;
        h.api.fail("assign_thread");
        h.runtime.open_assignment(AssignTarget::Thread("t1".to_string()));
        let result = h.runtime.assign_picked("a2").await;

        assert!(matches!(result, Err(WorkflowError::Request(_))));
        assert!(h.runtime.threads().borrow().get("t1").unwrap().assigned_to.is_none());
        assert!(h.runtime.assignment().target().is_some());
    }

    #[tokio::test]
    async fn test_picker_closes_after_assignment() {
        let mut h = logged_in(default_api()).await;
        h.runtime.open_assignment(AssignTarget::Task("k1".to_string()));
        assert_eq!(h.runtime.assignment_options().len(), 2);
        h.runtime.assign_picked("a2").await.unwrap();

        assert_eq!(
            h.runtime.tasks().borrow().get("k1").unwrap().assigned_to.as_deref(),
            Some("a2")
        );
        assert!(h.runtime.assignment().target().is_none());
    }

    #[tokio::test]
    async fn test_reconnect_failure_surfaces_warning_then_recovery() {
        let mut h = logged_in(default_api()).await;
        h.transport.inject(ChannelSignal::Disconnected);
        h.transport
            .inject(ChannelSignal::ReconnectFailing { attempts: 5 });
        h.runtime.pump();
        assert_eq!(
            h.runtime.toasts().borrow().current().unwrap().level,
            ToastLevel::Warning
        );

        h.runtime.toasts().borrow_mut().dismiss();
        h.transport.inject(ChannelSignal::Connected);
        h.runtime.pump();
        assert_eq!(
            h.runtime.toasts().borrow().current().unwrap().level,
            ToastLevel::Success
        );
        assert_eq!(h.transport.sent_named(events::REGISTER_ORG).len(), 2);
    }

    #[tokio::test]
    async fn test_intents_require_session() {
        let mut h = harness(default_api());
        assert!(matches!(
            h.runtime.send_message("t1", "hi"),
            Err(WorkflowError::NotLoggedIn)
        ));
        assert!(matches!(
            h.runtime.unassign(AssignTarget::Thread("t1".to_string())).await,
            Err(WorkflowError::NotLoggedIn)
        ));
        h.runtime.logout();
        assert!(h.runtime.session().is_none());
    }
}
