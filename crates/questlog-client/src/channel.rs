// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered handoff of completed responses to the polling embedder.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use questlog_core::Response;

/// FIFO of completed responses, in completion order.
///
/// Cloning yields another handle to the same channel. `pop` never blocks,
/// so a game loop can poll it once per frame.
#[derive(Clone, Default)]
pub struct ResponseChannel {
    inner: Arc<Mutex<VecDeque<Response>>>,
}

impl ResponseChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: Response) {
        self.lock().push_back(response);
    }

    /// Take the oldest response, or `None` when the channel is empty.
    pub fn pop(&self) -> Option<Response> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Response>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use questlog_core::Operation;

    use super::*;

    #[test]
    fn pop_on_empty_returns_none() {
        let channel = ResponseChannel::new();
        assert!(channel.pop().is_none());
        assert!(channel.is_empty());
    }

    #[test]
    fn responses_come_out_in_push_order() {
        let channel = ResponseChannel::new();
        channel.push(Response::ok(Operation::Login, 200, "first"));
        channel.push(Response::error(Operation::Enroll, "second"));
        assert_eq!(channel.len(), 2);

        assert_eq!(channel.pop().unwrap().body, "first");
        assert_eq!(channel.pop().unwrap().operation, Operation::Enroll);
        assert!(channel.pop().is_none());
    }

    #[test]
    fn clones_share_the_same_queue() {
        let producer = ResponseChannel::new();
        let consumer = producer.clone();
        producer.push(Response::ok(Operation::GetCourses, 200, "[]"));
        assert_eq!(consumer.pop().unwrap().operation, Operation::GetCourses);
        assert!(producer.is_empty());
    }
}
