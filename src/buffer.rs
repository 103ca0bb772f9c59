//! Ordered outbound payload queue used while the socket is not `Connected`.
//!
//! Grounded on the resubscribe-after-reconnect idiom in the teacher's
//! `rtds::subscription::SubscriptionManager::resubscribe_all`, generalized
//! from "re-send subscription requests" to "flush arbitrary buffered
//! payloads in enqueue order".

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// A pending outbound payload: either a text frame or a binary frame.
/// Serializable so a host can log or snapshot buffered payloads (e.g. to
/// disk, for replay across a process restart) without this crate having to
/// pick a wire format.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

/// Controls what happens to `send()` calls made while the socket is not
/// `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Drop sends made while disconnected; nothing is ever queued.
    Disabled,
    /// Queue every send made while disconnected, with no cap.
    Unbounded,
    /// Queue sends made while disconnected, dropping the oldest entry once
    /// `usize` entries are queued.
    Capped(usize),
}

/// FIFO queue of [`Payload`]s pending a reconnect, governed by a
/// [`BufferPolicy`].
#[derive(Debug)]
pub struct Buffer {
    policy: BufferPolicy,
    queue: VecDeque<Payload>,
}

impl Buffer {
    #[must_use]
    pub fn new(policy: BufferPolicy) -> Self {
        Self {
            policy,
            queue: VecDeque::new(),
        }
    }

    /// Queue `payload` per the configured policy. Returns `false` if the
    /// policy is `Disabled` and the payload was dropped without being
    /// queued.
    pub fn push(&mut self, payload: Payload) -> bool {
        match self.policy {
            BufferPolicy::Disabled => false,
            BufferPolicy::Unbounded => {
                self.queue.push_back(payload);
                true
            }
            BufferPolicy::Capped(cap) => {
                if cap == 0 {
                    return false;
                }
                while self.queue.len() >= cap {
                    self.queue.pop_front();
                }
                self.queue.push_back(payload);
                true
            }
        }
    }

    /// Flush the buffer in enqueue order by handing each payload to
    /// `send_fn`. Stops the first time `send_fn` returns `false` (the
    /// transport no longer accepts writes), retaining the unsent remainder
    /// including the payload that was rejected.
    pub fn drain(&mut self, mut send_fn: impl FnMut(&Payload) -> bool) {
        while let Some(payload) = self.queue.front() {
            if send_fn(payload) {
                self.queue.pop_front();
            } else {
                break;
            }
        }
    }

    /// Remove and return the oldest queued payload, if any. Paired with
    /// [`Buffer::push_front`] for callers (the socket core's async flush
    /// loop) that can't use the synchronous [`Buffer::drain`] because their
    /// `send_fn` needs to `.await`.
    pub fn pop_front(&mut self) -> Option<Payload> {
        self.queue.pop_front()
    }

    /// Put a payload back at the front of the queue, e.g. after a failed
    /// send pulled via [`Buffer::pop_front`].
    pub fn push_front(&mut self, payload: Payload) {
        self.queue.push_front(payload);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_policy_drops_everything() {
        let mut buf = Buffer::new(BufferPolicy::Disabled);
        assert!(!buf.push(Payload::Text("a".into())));
        assert!(buf.is_empty());
    }

    #[test]
    fn unbounded_policy_preserves_order() {
        let mut buf = Buffer::new(BufferPolicy::Unbounded);
        buf.push(Payload::Text("a".into()));
        buf.push(Payload::Text("b".into()));
        buf.push(Payload::Text("c".into()));

        let mut sent = Vec::new();
        buf.drain(|p| {
            sent.push(p.clone());
            true
        });

        assert_eq!(
            sent,
            vec![
                Payload::Text("a".into()),
                Payload::Text("b".into()),
                Payload::Text("c".into()),
            ]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn capped_policy_drops_oldest() {
        let mut buf = Buffer::new(BufferPolicy::Capped(2));
        buf.push(Payload::Text("a".into()));
        buf.push(Payload::Text("b".into()));
        buf.push(Payload::Text("c".into()));

        assert_eq!(buf.len(), 2);

        let mut sent = Vec::new();
        buf.drain(|p| {
            sent.push(p.clone());
            true
        });

        assert_eq!(
            sent,
            vec![Payload::Text("b".into()), Payload::Text("c".into())]
        );
    }

    #[test]
    fn drain_stops_and_retains_on_rejection() {
        let mut buf = Buffer::new(BufferPolicy::Unbounded);
        buf.push(Payload::Text("a".into()));
        buf.push(Payload::Text("b".into()));

        let mut calls = 0;
        buf.drain(|_| {
            calls += 1;
            false
        });

        assert_eq!(calls, 1);
        assert_eq!(buf.len(), 2);
    }
}
