//! Feedback from the controller.
//!
//! A single collector task reads lines from the serial port into a [`FeedbackBuffer`].
//! Any number of observers may then [`FeedbackBuffer::subscribe`] to it.
//!
//! Observers only ever see the newest line.
//! An observer which is slower than the controller skips lines instead of
//! slowing anything else down.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
};

use futures::{future, Stream, StreamExt};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::serial::FeedbackLine;

/// Reads the serial port and fills the buffer.
pub mod collector;

/// The newest line, and how many lines came before it.
#[derive(Debug, Clone, Default)]
struct Latest {
    appended: u64,
    line: Option<FeedbackLine>,
}

#[derive(Debug)]
struct Lines {
    lines: VecDeque<FeedbackLine>,
    capacity: usize,
    appended: u64,
}

/// The most recent lines of feedback, oldest first.
///
/// Has one writer (the collector) and any number of readers.
#[derive(Debug)]
pub struct FeedbackBuffer {
    inner: RwLock<Lines>,
    latest: watch::Sender<Latest>,
}

impl FeedbackBuffer {
    /// A buffer holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        let (latest, _) = watch::channel(Latest::default());

        Self {
            inner: RwLock::new(Lines {
                lines: VecDeque::with_capacity(capacity),
                capacity,
                appended: 0,
            }),
            latest,
        }
    }

    /// Append a line, evicting the oldest if full.
    /// Subscribers are told about it.
    pub fn push(&self, line: FeedbackLine) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if inner.lines.len() == inner.capacity {
            inner.lines.pop_front();
        }
        inner.lines.push_back(line.clone());
        inner.appended += 1;

        self.latest.send_replace(Latest {
            appended: inner.appended,
            line: Some(line),
        });
    }

    /// A copy of the buffered lines, oldest first.
    pub fn snapshot(&self) -> Vec<FeedbackLine> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);

        inner.lines.iter().cloned().collect()
    }

    /// The newest line, if any arrived yet.
    pub fn latest(&self) -> Option<FeedbackLine> {
        self.latest.borrow().line.clone()
    }

    /// How many lines are buffered.
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lines
            .len()
    }

    /// No lines buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most lines the buffer holds.
    pub fn capacity(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity
    }

    /// How many lines were ever pushed.
    /// Keeps growing after the buffer is full.
    pub fn appended(&self) -> u64 {
        self.latest.borrow().appended
    }

    /// Observe new lines.
    ///
    /// If any line arrived before subscribing, the newest one is yielded first.
    /// After that, each time new lines arrive the newest of them is yielded.
    ///
    /// The stream only ends when the buffer is dropped.
    pub fn subscribe(&self) -> impl Stream<Item = FeedbackLine> + Send + 'static {
        WatchStream::new(self.latest.subscribe()).filter_map(|latest| future::ready(latest.line))
    }
}
