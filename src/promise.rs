use std::fmt::Debug;
use std::sync::Arc;

use crate::cell::{Cell, Status};
use crate::{Error, Future};

/// The producing side of a cell. It can be resolved once; later `set`/`fail`
/// calls are ignored.
///
/// Clones share the same cell, so several threads may race to resolve it.
///
/// # Examples
///
/// ```
/// use promise_cell::Promise;
/// use std::thread;
///
/// let promise = Promise::<String>::new();
/// let future = promise.future();
/// let task1 = thread::spawn(move || future.blocking_get());
/// promise.set("Hi".into());
/// let received = task1.join().expect("The task1 thread has panicked.");
/// assert_eq!(received.as_deref(), Ok("Hi"));
/// ```
pub struct Promise<T, E = Error> {
    cell: Arc<Cell<T, E>>,
}

impl<T, E> Promise<T, E> {
    pub fn new() -> Self {
        Promise {
            cell: Arc::new(Cell::new()),
        }
    }

    /// Resolves with `value`. Returns `false` if the cell was already
    /// resolved, in which case nothing changes.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::Promise;
    /// let promise = Promise::<&str>::new();
    /// assert!(promise.set("Plop!"));
    /// assert!(!promise.set("Hey!"));
    /// assert_eq!(*promise.get().unwrap(), Ok("Plop!"));
    /// ```
    pub fn set(&self, value: T) -> bool {
        self.cell.try_succeed(value)
    }

    /// Resolves with `error`, with the same first-wins rule as [`Promise::set`].
    pub fn fail(&self, error: E) -> bool {
        self.cell.try_fail(error)
    }

    /// `set` for `Ok`, `fail` for `Err`.
    pub fn settle(&self, result: Result<T, E>) -> bool {
        self.cell.try_resolve(Arc::new(result))
    }

    pub(crate) fn adopt(&self, outcome: Arc<Result<T, E>>) -> bool {
        self.cell.try_resolve(outcome)
    }

    pub fn status(&self) -> Status {
        self.cell.status()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.is_resolved()
    }

    pub fn is_failed(&self) -> bool {
        self.cell.is_failed()
    }

    /// The outcome so far, or `None` while unresolved. Never blocks.
    pub fn get(&self) -> Option<Arc<Result<T, E>>> {
        self.cell.peek()
    }

    /// Blocks the calling thread until the cell is resolved.
    pub fn blocking_get(&self) -> Arc<Result<T, E>> {
        self.cell.await_resolution()
    }

    /// A read-only view over this promise's cell. Every call returns a view
    /// of the same cell.
    pub fn future(&self) -> Future<T, E> {
        Future::from_cell(self.cell.clone())
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Promise {
            cell: self.cell.clone(),
        }
    }
}

impl<T, E> Default for Promise<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug, E: Debug> Debug for Promise<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").field("cell", &self.cell).finish()
    }
}
