//! The drain-swap-recycle post queue at the heart of the server loop harness (spec §4.1).
//!
//! Posting never blocks on processing: a poster locks the queue just long enough to push, then
//! wakes the loop via a `Notify`. The loop itself swaps the live queue for an empty one it kept
//! in reserve, drops the lock immediately, then processes the batch it now owns exclusively and
//! finally recycles the (now-empty) old buffer back as next round's reserve.

use std::sync::Mutex;

use tokio::sync::Notify;

/// A single entry: the message plus whatever the caller needs to address a reply.
pub struct Inbox<T> {
    pending: Mutex<Vec<T>>,
    /// A second, normally-empty buffer recycled between drains to avoid reallocating every round.
    pool: Mutex<Vec<T>>,
    notify: Notify,
}

impl<T> Default for Inbox<T> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            pool: Mutex::new(Vec::new()),
            notify: Notify::new(),
        }
    }
}

impl<T> Inbox<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts a message at-most-once and wakes the loop. Never blocks on processing (spec §4.1,
    /// §5: "posting a message to a connection never blocks waiting for that message to be
    /// processed").
    pub fn post(&self, item: T) {
        self.pending.lock().expect("inbox mutex poisoned").push(item);
        self.notify.notify_one();
    }

    /// Waits until at least one message is pending, then swaps it out for the recycled empty
    /// buffer and returns the batch. The lock is held only for the swap itself.
    pub async fn drain(&self) -> Vec<T> {
        loop {
            {
                let mut pending = self.pending.lock().expect("inbox mutex poisoned");
                if !pending.is_empty() {
                    let mut empty = self.pool.lock().expect("inbox mutex poisoned").pop().unwrap_or_default();
                    std::mem::swap(&mut *pending, &mut empty);
                    return empty;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Returns a drained, now-empty batch to the pool for reuse next round.
    pub fn recycle(&self, mut batch: Vec<T>) {
        batch.clear();
        self.pool.lock().expect("inbox mutex poisoned").push(batch);
    }

    /// Non-blocking drain, for loops that also need to `select!` against other event sources.
    pub fn try_drain(&self) -> Option<Vec<T>> {
        let mut pending = self.pending.lock().expect("inbox mutex poisoned");
        if pending.is_empty() {
            return None;
        }
        let mut empty = self.pool.lock().expect("inbox mutex poisoned").pop().unwrap_or_default();
        std::mem::swap(&mut *pending, &mut empty);
        Some(empty)
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test(tokio::test)]
    async fn drain_returns_exactly_the_posted_batch() {
        let inbox = Inbox::new();
        inbox.post(1);
        inbox.post(2);
        inbox.post(3);

        let batch = inbox.drain().await;
        assert_eq!(batch, vec![1, 2, 3]);
    }

    #[test_log::test(tokio::test)]
    async fn recycled_buffer_is_reused_and_cleared() {
        let inbox = Inbox::new();
        inbox.post(1);
        let batch = inbox.drain().await;
        inbox.recycle(batch);

        inbox.post(2);
        let batch = inbox.drain().await;
        assert_eq!(batch, vec![2]);
    }

    #[test_log::test(tokio::test)]
    async fn drain_waits_for_a_post() {
        let inbox = std::sync::Arc::new(Inbox::new());
        let inbox2 = inbox.clone();
        let waiter = tokio::spawn(async move { inbox2.drain().await });

        tokio::task::yield_now().await;
        inbox.post(42);

        let batch = waiter.await.unwrap();
        assert_eq!(batch, vec![42]);
    }
}
