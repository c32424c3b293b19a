//! # Progress Stream
//!
//! Lazy per-subscriber view over a session's event journal.
//!
//! Each subscriber keeps its own cursor and its own set of already-emitted
//! `(worker, status, thinking_note)` triples. It wakes on every session
//! mutation, and at least once per poll interval, then emits whatever is
//! new. The stream ends right after the terminal event.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::sync::watch;

use crate::session::{SessionHandle, SessionRegistry};

use super::{DedupKey, ProgressEvent};

/// Subscribe to a session's progress.
///
/// An unknown session yields a single `error` event and ends.
pub fn subscribe(
    registry: SessionRegistry,
    session_id: impl Into<String>,
    poll_interval: Duration,
) -> BoxStream<'static, ProgressEvent> {
    let session_id = session_id.into();
    stream::once(async move {
        match registry.get(&session_id).await {
            Some(handle) => Subscriber::new(handle, poll_interval).into_stream().boxed(),
            None => {
                tracing::debug!(%session_id, "Subscribe to unknown session");
                stream::iter([ProgressEvent::not_found(&session_id)]).boxed()
            }
        }
    })
    .flatten()
    .boxed()
}

struct Subscriber {
    handle: Arc<SessionHandle>,
    revisions: watch::Receiver<u64>,
    poll_interval: Duration,
    cursor: usize,
    seen: HashSet<DedupKey>,
    pending: VecDeque<ProgressEvent>,
    finished: bool,
}

impl Subscriber {
    fn new(handle: Arc<SessionHandle>, poll_interval: Duration) -> Self {
        let revisions = handle.revisions();
        Self {
            handle,
            revisions,
            poll_interval,
            cursor: 0,
            seen: HashSet::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn into_stream(self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        stream::unfold(self, |mut sub| async move {
            let event = sub.next_event().await?;
            Some((event, sub))
        })
    }

    async fn next_event(&mut self) -> Option<ProgressEvent> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(event) = self.pending.pop_front() {
                if event.is_final() {
                    self.finished = true;
                    return Some(event);
                }
                if let Some(key) = event.dedup_key() {
                    if !self.seen.insert(key) {
                        continue;
                    }
                }
                return Some(event);
            }

            let fresh = self.handle.journal_since(self.cursor).await;
            if fresh.is_empty() {
                self.wait_for_change().await;
                continue;
            }
            self.cursor += fresh.len();
            self.pending.extend(fresh);
        }
    }

    async fn wait_for_change(&mut self) {
        match tokio::time::timeout(self.poll_interval, self.revisions.changed()).await {
            Ok(Ok(())) | Err(_) => {}
            // Sender gone; fall back to plain polling.
            Ok(Err(_)) => tokio::time::sleep(self.poll_interval).await,
        }
    }
}
