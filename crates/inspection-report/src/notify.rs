//! User-facing notifications that may originate on a worker thread.
//!
//! A [`Notifier`] remembers which thread owns the user interface. Notifying
//! from that thread calls the direct handler, if one is installed; from any
//! other thread the notification is queued for the UI thread to drain from
//! its [`NotificationQueue`].

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationLevel::Info => f.write_str("info"),
            NotificationLevel::Warning => f.write_str("warning"),
            NotificationLevel::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// How a notification was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Direct,
    Queued,
    /// The queue's receiving side is gone.
    Dropped,
}

type DirectHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Sending side; cheap to clone and safe to move to worker threads.
#[derive(Clone)]
pub struct Notifier {
    ui_thread: ThreadId,
    sender: Sender<Notification>,
    direct: Option<DirectHandler>,
}

/// Receiving side, owned by the UI thread.
pub struct NotificationQueue {
    receiver: Receiver<Notification>,
}

/// Create a notifier/queue pair whose UI thread is the calling thread.
pub fn channel() -> (Notifier, NotificationQueue) {
    let (sender, receiver) = mpsc::channel();
    (
        Notifier {
            ui_thread: thread::current().id(),
            sender,
            direct: None,
        },
        NotificationQueue { receiver },
    )
}

impl Notifier {
    /// Deliver notifications raised on the UI thread synchronously through `handler`.
    pub fn with_direct_handler(
        mut self,
        handler: impl Fn(&Notification) + Send + Sync + 'static,
    ) -> Self {
        self.direct = Some(Arc::new(handler));
        self
    }

    pub fn ui_thread(&self) -> ThreadId {
        self.ui_thread
    }

    pub fn notify(&self, notification: Notification) -> Delivery {
        if thread::current().id() == self.ui_thread {
            if let Some(direct) = &self.direct {
                direct(&notification);
                return Delivery::Direct;
            }
        }
        match self.sender.send(notification) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::SendError(lost)) => {
                debug!("Notification '{}' dropped: queue closed", lost.title);
                Delivery::Dropped
            }
        }
    }

    pub fn info(&self, title: impl Into<String>, body: impl Into<String>) -> Delivery {
        self.notify(Notification::new(NotificationLevel::Info, title, body))
    }

    pub fn warning(&self, title: impl Into<String>, body: impl Into<String>) -> Delivery {
        self.notify(Notification::new(NotificationLevel::Warning, title, body))
    }

    pub fn error(&self, title: impl Into<String>, body: impl Into<String>) -> Delivery {
        self.notify(Notification::new(NotificationLevel::Error, title, body))
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("ui_thread", &self.ui_thread)
            .field("direct", &self.direct.is_some())
            .finish()
    }
}

impl NotificationQueue {
    /// Everything queued so far, without blocking.
    pub fn drain(&self) -> Vec<Notification> {
        self.receiver.try_iter().collect()
    }

    /// Wait for the next notification. `None` once every notifier is gone.
    pub fn recv(&self) -> Option<Notification> {
        self.receiver.recv().ok()
    }

    /// Wait up to `timeout`; `Err(true)` means every notifier is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Notification, bool> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => false,
            RecvTimeoutError::Disconnected => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[test]
    fn test_ui_thread_without_handler_queues() {
        let (notifier, queue) = channel();
        assert_eq!(notifier.info("Done", "saved"), Delivery::Queued);
        assert_eq!(
            queue.drain(),
            vec![Notification::new(NotificationLevel::Info, "Done", "saved")]
        );
    }

    #[test]
    fn test_ui_thread_uses_direct_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (notifier, queue) = channel();
        let notifier = notifier.with_direct_handler(move |n| sink.lock().unwrap().push(n.clone()));

        assert_eq!(notifier.warning("Nothing to do", "no rows"), Delivery::Direct);
        assert!(queue.drain().is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_worker_thread_always_queues() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let (notifier, queue) = channel();
        let notifier = notifier.with_direct_handler(move |n| sink.lock().unwrap().push(n.clone()));

        let delivery = std::thread::spawn(move || notifier.error("Failed", "boom"))
            .join()
            .unwrap();
        assert_eq!(delivery, Delivery::Queued);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(queue.recv().map(|n| n.level), Some(NotificationLevel::Error));
        assert_eq!(queue.recv(), None);
    }
}
