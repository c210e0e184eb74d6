use crate::models::{Priority, Task};

/// Refetches the runtime owes the task store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingTaskRefresh {
    pub list: bool,
    pub unread_count: bool,
}

impl PendingTaskRefresh {
    pub fn is_empty(&self) -> bool {
        !self.list && !self.unread_count
    }
}

/// Sub-store for support tickets, driven by `taskCreated` / `taskReaded`.
///
/// The unread badge is a side channel: it is never adjusted locally, only
/// refetched after any mutation, because other agents mark tasks read
/// out-of-band.
pub struct TaskStore {
    tasks: Vec<Task>,
    selected: Option<String>,
    unread_count: Option<u32>,
    pending: PendingTaskRefresh,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            selected: None,
            unread_count: None,
            pending: PendingTaskRefresh::default(),
        }
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
        self.selected = None;
        self.unread_count = None;
        self.pending = PendingTaskRefresh::default();
    }

    // ===== Getters =====

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn tasks_with_priority(&self, priority: Priority) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.priority == priority).collect()
    }

    pub fn tasks_for_thread(&self, thread_id: &str) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.thread_id == thread_id).collect()
    }

    /// Last fetched unread badge; None until the first fetch lands.
    pub fn unread_count(&self) -> Option<u32> {
        self.unread_count
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_selected(&self, task_id: &str) -> bool {
        self.selected.as_deref() == Some(task_id)
    }

    // ===== Mutations =====

    pub fn load_snapshot(&mut self, tasks: Vec<Task>) {
        tracing::debug!(count = tasks.len(), "Task snapshot loaded");
        self.tasks = tasks;
        self.pending.list = false;
        self.pending.unread_count = true;
    }

    pub fn set_unread_count(&mut self, count: u32) {
        self.unread_count = Some(count);
    }

    /// A `taskCreated` without a task body only schedules a list refetch.
    pub fn apply_task_created(&mut self, task_id: &str, task: Option<Task>) -> bool {
        self.pending.unread_count = true;
        match task {
            Some(mut task) if task.id == task_id => {
                if self.get(&task.id).is_some() {
                    return false;
                }
                task.readed = false;
                self.tasks.insert(0, task);
                true
            }
            _ => {
                self.pending.list = true;
                false
            }
        }
    }

    pub fn apply_task_readed(&mut self, task_id: &str) -> bool {
        self.pending.unread_count = true;
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.readed = true;
                true
            }
            None => false,
        }
    }

    pub fn apply_assignment_changed(&mut self, task_id: &str, agent_id: Option<String>) -> bool {
        self.pending.unread_count = true;
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.assigned_to = agent_id;
                true
            }
            None => false,
        }
    }

    /// Optimistically mark a task read. Returns true if it was unread.
    pub fn mark_opened(&mut self, task_id: &str) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|t| t.id == task_id)?;
        let was_unread = !task.readed;
        task.readed = true;
        self.pending.unread_count = true;
        Some(was_unread)
    }

    pub fn select(&mut self, task_id: &str) -> bool {
        if self.is_selected(task_id) {
            return false;
        }
        self.selected = Some(task_id.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Take the refetches owed since the last call.
    pub fn take_pending_refresh(&mut self) -> PendingTaskRefresh {
        std::mem::take(&mut self.pending)
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
