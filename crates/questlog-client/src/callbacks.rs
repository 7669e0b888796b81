// SPDX-FileCopyrightText: 2026 Questlog Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of pending completion handlers, keyed by [`RequestKey`].
//!
//! Every request the client issues registers an entry, with or without a
//! caller handler. When the request completes, [`CallbackRegistry::complete`]
//! consumes the entry exactly once and reports whether the response was
//! delivered or dropped because the request was cancelled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::AbortHandle;
use tracing::debug;

use questlog_core::{RequestKey, Response};

/// Caller-supplied completion handler.
pub type Handler = Box<dyn FnOnce(&Response) + Send + 'static>;

/// Outcome of resolving a completed request through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The response was handed to the handler (if any) and should be published.
    Completed(Response),
    /// The request was cancelled; the response must be dropped silently.
    Cancelled,
}

struct Entry {
    handler: Option<Handler>,
    abort: Option<AbortHandle>,
    cancelled: bool,
}

/// Owned map from request key to pending completion handler.
#[derive(Default)]
pub struct CallbackRegistry {
    entries: Mutex<HashMap<RequestKey, Entry>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `key`. A prior entry for the same key is
    /// replaced.
    pub fn register(&self, key: RequestKey, handler: Option<Handler>) {
        let entry = Entry {
            handler,
            abort: None,
            cancelled: false,
        };
        if self.lock().insert(key.clone(), entry).is_some() {
            debug!(key = %key, "replaced existing callback entry");
        }
    }

    /// Attach the task running an immediate request so cancellation can
    /// abort it. Ignored if the entry already resolved.
    pub fn attach(&self, key: &RequestKey, abort: AbortHandle) {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.abort = Some(abort);
        }
    }

    /// Cancel the request registered under `key`.
    ///
    /// Returns whether an entry existed. The entry stays, flagged, until its
    /// response arrives and is dropped or its task goes away; an attached
    /// task is aborted.
    pub fn cancel(&self, key: &RequestKey) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.cancelled = true;
        entry.handler = None;
        if let Some(abort) = entry.abort.take() {
            abort.abort();
        }
        true
    }

    /// A guard that forgets `key` when dropped. Moved into the task of an
    /// immediate request so an aborted task leaves no entry behind.
    pub fn forget_on_drop(self: &Arc<Self>, key: RequestKey) -> ForgetOnDrop {
        ForgetOnDrop {
            registry: Arc::clone(self),
            key,
        }
    }

    /// Remove the entry for `key` and return its handler.
    ///
    /// Returns `None` when the entry is absent, was cancelled, or carries no
    /// handler. A cancelled entry is removed without ever running.
    pub fn resolve(&self, key: &RequestKey) -> Option<Handler> {
        let entry = self.lock().remove(key)?;
        if entry.cancelled {
            return None;
        }
        entry.handler
    }

    /// Drop the entry for `key` without running it.
    pub fn forget(&self, key: &RequestKey) {
        self.lock().remove(key);
    }

    /// Route a completed response through the entry registered under `key`.
    ///
    /// Responses for keys with no entry (for example a queued row that
    /// outlived the process that registered it) are still published.
    pub fn complete(&self, key: Option<&RequestKey>, response: Response) -> Completion {
        let Some(key) = key else {
            return Completion::Completed(response);
        };
        let Some(entry) = self.lock().remove(key) else {
            return Completion::Completed(response);
        };
        if entry.cancelled {
            debug!(key = %key, "dropping response for cancelled request");
            return Completion::Cancelled;
        }
        if let Some(handler) = entry.handler {
            handler(&response);
        }
        Completion::Completed(response)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestKey, Entry>> {
        // A handler panicking on another thread must not wedge the registry.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// See [`CallbackRegistry::forget_on_drop`].
pub struct ForgetOnDrop {
    registry: Arc<CallbackRegistry>,
    key: RequestKey,
}

impl Drop for ForgetOnDrop {
    fn drop(&mut self) {
        self.registry.forget(&self.key);
    }
}
