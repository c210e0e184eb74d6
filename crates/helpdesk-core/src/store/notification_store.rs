use chrono::{DateTime, Utc};

use crate::models::NotificationGroup;

/// Result of feeding one notification into the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupUpdate {
    pub created: bool,
    pub count: u32,
}

/// Groups incoming-message notifications per thread and computes the badge.
///
/// Only thread identity (id, display name) is read, and only from the
/// notification payload itself, so a badge survives the thread being
/// filtered out of the thread list.
pub struct NotificationAggregator {
    /// Most recent activity first
    groups: Vec<NotificationGroup>,
}

impl NotificationAggregator {
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    // ===== Getters =====

    pub fn groups(&self) -> &[NotificationGroup] {
        &self.groups
    }

    pub fn get(&self, thread_id: &str) -> Option<&NotificationGroup> {
        self.groups.iter().find(|g| g.thread_id == thread_id)
    }

    /// Messages across all groups since their last mark-as-read.
    pub fn badge_count(&self) -> u32 {
        self.groups
            .iter()
            .fold(0u32, |acc, g| acc.saturating_add(g.count))
    }

    pub fn unread_group_count(&self) -> usize {
        self.groups.iter().filter(|g| g.is_unread()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    // ===== Mutations =====

    /// Record one new-message arrival for `thread_id`.
    pub fn apply_notification(
        &mut self,
        thread_id: &str,
        thread_name: &str,
        message: &str,
        at: DateTime<Utc>,
    ) -> GroupUpdate {
        match self.groups.iter().position(|g| g.thread_id == thread_id) {
            Some(pos) => {
                let mut group = self.groups.remove(pos);
                group.count = group.count.saturating_add(1);
                group.read = false;
                group.messages.push(message.to_string());
                group.latest_message = message.to_string();
                group.last_activity = at;
                if !thread_name.is_empty() {
                    group.thread_name = thread_name.to_string();
                }
                let count = group.count;
                self.groups.insert(0, group);
                GroupUpdate {
                    created: false,
                    count,
                }
            }
            None => {
                self.groups
                    .insert(0, NotificationGroup::new(thread_id, thread_name, message, at));
                GroupUpdate {
                    created: true,
                    count: 1,
                }
            }
        }
    }

    /// Reset the count; the group stays visible until deleted.
    pub fn mark_read(&mut self, thread_id: &str) -> bool {
        match self.groups.iter_mut().find(|g| g.thread_id == thread_id) {
            Some(group) => {
                group.count = 0;
                group.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for group in &mut self.groups {
            group.count = 0;
            group.read = true;
        }
    }

    pub fn delete(&mut self, thread_id: &str) -> bool {
        let before = self.groups.len();
        self.groups.retain(|g| g.thread_id != thread_id);
        self.groups.len() != before
    }

    pub fn clear_all(&mut self) {
        self.groups.clear();
    }
}

impl Default for NotificationAggregator {
    fn default() -> Self {
        Self::new()
    }
}
