//! The resolution cell shared by a [`Promise`](crate::Promise) and its
//! [`Future`](crate::Future) views.
//!
//! Status, observer registry and parked wakers live behind one mutex, so
//! "check terminal, else enqueue" can never interleave with "commit, then
//! drain". Observers and wakers are invoked after the lock is released.
use parking_lot::{Condvar, Mutex};
use std::fmt::Debug;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Poll, Waker};

/// Where a cell is in its single transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Unset,
    Succeeded,
    Failed,
}

/// Which outcome an observer is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    OnSet,
    OnFail,
    /// Internal: derived futures that adopt the whole outcome.
    Either,
}

impl Kind {
    fn matches<T, E>(self, outcome: &Result<T, E>) -> bool {
        match self {
            Kind::OnSet => outcome.is_ok(),
            Kind::OnFail => outcome.is_err(),
            Kind::Either => true,
        }
    }
}

type Callback<T, E> = Box<dyn FnOnce(&Arc<Result<T, E>>) + Send>;

struct Observer<T, E> {
    kind: Kind,
    callback: Callback<T, E>,
}

impl<T, E> Observer<T, E> {
    /// Runs the callback if its kind matches. A panicking callback is logged
    /// and swallowed so the remaining observers still run.
    fn dispatch(self, outcome: &Arc<Result<T, E>>) {
        if !self.kind.matches(outcome.as_ref()) {
            return;
        }
        let callback = self.callback;
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(outcome))) {
            tracing::error!(
                kind = ?self.kind,
                panic = %panic_message(payload.as_ref()),
                "observer panicked during dispatch"
            );
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

struct Inner<T, E> {
    outcome: Option<Arc<Result<T, E>>>,
    observers: Vec<Observer<T, E>>,
    wakers: Vec<Waker>,
}

pub(crate) struct Cell<T, E> {
    inner: Mutex<Inner<T, E>>,
    resolved: Condvar,
}

impl<T, E> Cell<T, E> {
    pub(crate) fn new() -> Self {
        Cell {
            inner: Mutex::new(Inner {
                outcome: None,
                observers: vec![],
                wakers: vec![],
            }),
            resolved: Condvar::new(),
        }
    }

    pub(crate) fn try_succeed(&self, value: T) -> bool {
        self.try_resolve(Arc::new(Ok(value)))
    }

    pub(crate) fn try_fail(&self, error: E) -> bool {
        self.try_resolve(Arc::new(Err(error)))
    }

    /// Commits `outcome` iff the cell is still unset. The winner wakes
    /// blocked threads, then parked tasks, then drains the registry in
    /// registration order.
    pub(crate) fn try_resolve(&self, outcome: Arc<Result<T, E>>) -> bool {
        let (observers, wakers) = {
            let mut inner = self.inner.lock();
            if inner.outcome.is_some() {
                tracing::debug!("cell already resolved, ignoring late resolution");
                return false;
            }
            inner.outcome = Some(outcome.clone());
            (
                std::mem::take(&mut inner.observers),
                std::mem::take(&mut inner.wakers),
            )
        };
        tracing::trace!(
            failed = outcome.is_err(),
            observers = observers.len(),
            "cell resolved"
        );
        self.resolved.notify_all();
        for waker in wakers {
            waker.wake();
        }
        for observer in observers {
            observer.dispatch(&outcome);
        }
        true
    }

    pub(crate) fn peek(&self) -> Option<Arc<Result<T, E>>> {
        self.inner.lock().outcome.clone()
    }

    pub(crate) fn status(&self) -> Status {
        match self.inner.lock().outcome.as_deref() {
            None => Status::Unset,
            Some(Ok(_)) => Status::Succeeded,
            Some(Err(_)) => Status::Failed,
        }
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.status() != Status::Unset
    }

    pub(crate) fn is_failed(&self) -> bool {
        self.status() == Status::Failed
    }

    pub(crate) fn await_resolution(&self) -> Arc<Result<T, E>> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(outcome) = &inner.outcome {
                return outcome.clone();
            }
            self.resolved.wait(&mut inner);
        }
    }

    /// Async counterpart of [`Cell::await_resolution`]: parks `waker` until the
    /// transition commits.
    pub(crate) fn poll_resolution(&self, waker: &Waker) -> Poll<Arc<Result<T, E>>> {
        let mut inner = self.inner.lock();
        match &inner.outcome {
            Some(outcome) => Poll::Ready(outcome.clone()),
            None => {
                if !inner.wakers.iter().any(|parked| parked.will_wake(waker)) {
                    inner.wakers.push(waker.clone());
                }
                Poll::Pending
            }
        }
    }

    /// Queues `callback` for the transition, or runs it right away on this
    /// thread when the cell is already terminal. Either way it runs at most
    /// once, and only if `kind` matches the outcome.
    pub(crate) fn register<F>(&self, kind: Kind, callback: F)
    where
        F: FnOnce(&Arc<Result<T, E>>) + Send + 'static,
    {
        let observer = Observer {
            kind,
            callback: Box::new(callback),
        };
        let outcome = {
            let mut inner = self.inner.lock();
            match &inner.outcome {
                Some(outcome) => outcome.clone(),
                None => {
                    inner.observers.push(observer);
                    return;
                }
            }
        };
        tracing::trace!(?kind, "cell already resolved, dispatching observer now");
        observer.dispatch(&outcome);
    }
}

impl<T: Debug, E: Debug> Debug for Cell<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Cell")
            .field("outcome", &inner.outcome)
            .field("observers", &inner.observers.len())
            .field("wakers", &inner.wakers.len())
            .finish()
    }
}
