//! User-visible transient notices (the toast surface of the dashboard).
//!
//! Every data operation reports its outcome here; nothing is fatal to the
//! process. Senders never block: a saturated channel drops the notice with
//! a warning instead of stalling the caller.

use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn success(title: &str, message: &str) -> Self {
        Self {
            level: NoticeLevel::Success,
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn error(title: &str, message: &str) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn info(title: &str, message: &str) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.to_string(),
            message: message.to_string(),
        }
    }
}

/// Cloneable sending half of the notice channel.
#[derive(Clone)]
pub struct NoticeSink {
    tx: mpsc::Sender<Notice>,
}

impl NoticeSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notice>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn push(&self, notice: Notice) {
        if let Err(e) = self.tx.try_send(notice) {
            warn!("Dropping user notice: {}", e);
        }
    }
}
