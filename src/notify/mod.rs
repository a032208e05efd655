use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{error, info, warn};
use serde::Serialize;
use strum_macros::Display;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Clone, Debug, Serialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub level: Level,
    /// Set once the notification is on its way out.
    pub exiting: bool,
}

#[derive(Default)]
struct Queue {
    active: Vec<Notification>,
    timers: HashMap<u64, JoinHandle<()>>,
}

/// Ephemeral message queue with timed dismissal. Clones share the same queue
/// and id sequence; separate instances number independently.
#[derive(Clone)]
pub struct Notifier {
    queue: Arc<Mutex<Queue>>,
    next_id: Arc<AtomicU64>,
    events: broadcast::Sender<Notification>,
    lifetime: Duration,
    exit_delay: Duration,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIFETIME, Self::DEFAULT_EXIT_DELAY)
    }
}

impl Notifier {
    pub const DEFAULT_LIFETIME: Duration = Duration::from_millis(4000);
    pub const DEFAULT_EXIT_DELAY: Duration = Duration::from_millis(300);
    /// Notifications a slow subscriber may fall behind by before it lags.
    pub const EVENT_CAPACITY: usize = 64;

    pub fn new(lifetime: Duration, exit_delay: Duration) -> Self {
        let (events, _) = broadcast::channel(Self::EVENT_CAPACITY);
        Self {
            queue: Arc::new(Mutex::new(Queue::default())),
            next_id: Arc::new(AtomicU64::new(0)),
            events,
            lifetime,
            exit_delay,
        }
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(message, Level::Success)
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(message, Level::Error)
    }

    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(message, Level::Info)
    }

    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.push(message, Level::Warning)
    }

    /// Shows a message and schedules its dismissal. Must be called from
    /// inside a tokio runtime.
    pub fn push(&self, message: impl Into<String>, level: Level) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let message = message.into();
        match level {
            Level::Error => error!("[{}] {}", id, message),
            Level::Warning => warn!("[{}] {}", id, message),
            Level::Success | Level::Info => info!("[{}] {}", id, message),
        }

        let notification = Notification {
            id,
            message,
            level,
            exiting: false,
        };

        // no subscribers is fine
        let _ = self.events.send(notification.clone());

        let mut queue = self.lock();
        queue.active.push(notification);

        // the timer blocks on the queue until it holds the entry it will expire
        let notifier = self.clone();
        let lifetime = self.lifetime;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            notifier.expire(id);
        });
        queue.timers.insert(id, timer);
        id
    }

    /// Starts the exit of a notification early and cancels its auto-dismiss
    /// timer. Returns `false` if it is gone or already leaving.
    pub fn dismiss(&self, id: u64) -> bool {
        let mut queue = self.lock();
        if let Some(timer) = queue.timers.remove(&id) {
            timer.abort();
        }
        self.begin_exit(&mut queue, id)
    }

    fn expire(&self, id: u64) {
        let mut queue = self.lock();
        queue.timers.remove(&id);
        self.begin_exit(&mut queue, id);
    }

    fn begin_exit(&self, queue: &mut Queue, id: u64) -> bool {
        let Some(notification) = queue
            .active
            .iter_mut()
            .find(|n| n.id == id && !n.exiting)
        else {
            return false;
        };
        notification.exiting = true;

        let notifier = self.clone();
        let exit_delay = self.exit_delay;
        tokio::spawn(async move {
            tokio::time::sleep(exit_delay).await;
            notifier.lock().active.retain(|n| n.id != id);
        });
        true
    }

    /// Notifications currently on screen, including ones that are exiting.
    pub fn active(&self) -> Vec<Notification> {
        self.lock().active.clone()
    }

    /// Every notification pushed from now on, in order.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
