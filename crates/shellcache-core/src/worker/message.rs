use tokio::task::JoinHandle;

use crate::error::Result;

/// Control messages a page can post to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    SkipWaiting,
    DownloadOffline,
}

impl Message {
    /// Recognize a message payload. Anything else is not a message for us.
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "skipWaiting" => Some(Message::SkipWaiting),
            "downloadOffline" => Some(Message::DownloadOffline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Message::SkipWaiting => "skipWaiting",
            Message::DownloadOffline => "downloadOffline",
        }
    }
}

/// What handling a message started.
#[derive(Debug)]
pub enum MessageOutcome {
    SkipWaiting,
    /// Background download of every resource not cached yet. Await the handle
    /// for the number of resources stored, or drop it to fire and forget.
    DownloadStarted(JoinHandle<Result<usize>>),
    Ignored,
}
