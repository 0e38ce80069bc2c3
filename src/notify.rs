use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 20;

/// Generic ring buffer that drops oldest items when full
#[derive(Debug)]
pub struct RingBuffer<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an item, dropping the oldest if at capacity
    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drain all items from the buffer
    pub fn drain_all(&mut self) -> Vec<T> {
        self.buffer.drain(..).collect()
    }

    /// Peek at the most recent item
    pub fn last(&self) -> Option<&T> {
        self.buffer.back()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// Transient message shown to the user (toast)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: i64,
}

/// Pending notifications waiting for the UI to show them
pub struct Notifier {
    pending: Mutex<RingBuffer<Notification>>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: Mutex::new(RingBuffer::new(capacity)),
        }
    }

    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            level,
            message: message.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        };

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.push(notification);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Success, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message);
    }

    /// Hand every pending notification to the UI
    pub fn drain(&self) -> Vec<Notification> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain_all()
    }

    pub fn latest(&self) -> Option<Notification> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}
