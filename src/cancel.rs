// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A minimal async primitive: single-completion value, cancel-with-reason,
//! cancellation racing completion is a no-op. `std::future::Future` already
//! gives single completion, polling, mapping and chaining; this module adds
//! only the cancellation wrapper the few call sites that spawn a detached
//! task (the static handler's background filesystem monitor) need to match
//! a pending task to its cancel by identity rather than by waker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Why a pending operation was cancelled.
#[derive(Debug, Clone)]
pub struct CancelReason(pub String);

/// A token identifying one pending operation, so a cancel that arrives after
/// the operation already completed can be recognized as stale and ignored.
#[derive(Debug, Clone)]
pub struct CancelToken {
    id: u64,
    inner: Arc<std::sync::Mutex<Option<CancelReason>>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            inner: Arc::new(std::sync::Mutex::new(None)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mark this token cancelled. Idempotent; the first reason wins.
    pub fn cancel(&self, reason: CancelReason) {
        let mut guard = self.inner.lock().unwrap();
        if guard.is_none() {
            *guard = Some(reason);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.lock().unwrap().is_some()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.lock().unwrap().clone()
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// A detached task, identified so a cancel that arrives after it already
/// finished is a documented no-op rather than a dangling abort.
///
/// Wraps a [`tokio::task::JoinHandle`]: `cancel` aborts the task, but only
/// matters if the task is still running. There is no way to observe a
/// stale cancel as an error here — aborting a finished task simply does
/// nothing, which is the race-is-a-no-op guarantee this type exists to
/// make explicit at the call site rather than leaving it implicit in
/// `JoinHandle`'s own semantics.
pub struct Cancellable<T> {
    id: u64,
    handle: tokio::task::JoinHandle<T>,
}

impl<T: Send + 'static> Cancellable<T> {
    /// Spawns `fut` on the runtime and returns a handle identifying it.
    pub fn spawn(fut: impl std::future::Future<Output = T> + Send + 'static) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            handle: tokio::task::spawn(fut),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Aborts the task. A no-op, not an error, if it already completed.
    pub fn cancel(&self, _reason: CancelReason) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_tokens_have_distinct_identity() {
        let a = CancelToken::new();
        let b = CancelToken::new();
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn cancel_is_idempotent_first_reason_wins() {
        let token = CancelToken::new();
        token.cancel(CancelReason("first".into()));
        token.cancel(CancelReason("second".into()));
        assert_eq!(token.reason().unwrap().0, "first");
    }

    #[tokio::test]
    async fn cancelling_a_running_task_stops_it() {
        let cancellable = Cancellable::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            42
        });
        cancellable.cancel(CancelReason("shutdown".into()));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(cancellable.is_finished());
    }

    #[tokio::test]
    async fn cancelling_a_finished_task_is_a_no_op() {
        let cancellable = Cancellable::spawn(async { 1 + 1 });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(cancellable.is_finished());
        cancellable.cancel(CancelReason("late".into()));
        assert!(cancellable.is_finished());
    }
}
