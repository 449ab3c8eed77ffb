use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::cell::{Cell, Kind, Status};
use crate::Error;

/// A read-only view over a cell. Futures may be cloned and shared across
/// threads; every clone observes the same outcome.
///
/// Besides peeking and blocking, a `Future` can be `.await`ed. The output is
/// the shared `Arc<Result<T, E>>`.
///
/// # Examples
///
/// ```
/// use promise_cell::Promise;
/// use futures::executor::block_on;
/// use std::thread;
/// let promise = Promise::<String, String>::new();
/// let consumer = promise.future();
/// let consumer2 = consumer.clone();
/// let task1 = thread::spawn(move || block_on(async {
///     println!("Received on task 1 {:?}",  consumer.await);
/// }));
/// let task2 = thread::spawn(move || block_on(async {
///     println!("Received on task 2 {:?}",  consumer2.await);
/// }));
/// promise.set("Hi".into());
/// task1.join().expect("The task1 thread has panicked.");
/// task2.join().expect("The task2 thread has panicked.");
/// ```
pub struct Future<T, E = Error> {
    cell: Arc<Cell<T, E>>,
}

impl<T, E> Future<T, E> {
    pub(crate) fn from_cell(cell: Arc<Cell<T, E>>) -> Self {
        Future { cell }
    }

    /// An already-succeeded future.
    pub fn resolved(value: T) -> Self {
        let cell = Cell::new();
        cell.try_succeed(value);
        Future::from_cell(Arc::new(cell))
    }

    /// An already-failed future.
    pub fn failed(error: E) -> Self {
        let cell = Cell::new();
        cell.try_fail(error);
        Future::from_cell(Arc::new(cell))
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

    /// Runs `observer` with the value once the cell succeeds. If it already
    /// has, `observer` runs before this call returns. Never runs on failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::Promise;
    /// use std::sync::atomic::{AtomicI32, Ordering};
    /// use std::sync::Arc;
    ///
    /// let promise = Promise::<i32>::new();
    /// let total = Arc::new(AtomicI32::new(0));
    /// let (a, b, c) = (total.clone(), total.clone(), total.clone());
    /// promise
    ///     .future()
    ///     .on_set(move |v| { a.fetch_add(*v, Ordering::SeqCst); })
    ///     .on_set(move |_| { b.fetch_add(100, Ordering::SeqCst); })
    ///     .on_fail(move |_| c.store(666, Ordering::SeqCst));
    /// promise.set(10);
    /// assert_eq!(total.load(Ordering::SeqCst), 110);
    /// ```
    pub fn on_set<F>(&self, observer: F) -> &Self
    where
        F: FnOnce(&T) + Send + 'static,
        T: 'static,
        E: 'static,
    {
        self.cell.register(Kind::OnSet, move |outcome| {
            if let Ok(value) = outcome.as_ref() {
                observer(value)
            }
        });
        self
    }

    /// Runs `observer` with the error once the cell fails.
    pub fn on_fail<F>(&self, observer: F) -> &Self
    where
        F: FnOnce(&E) + Send + 'static,
        T: 'static,
        E: 'static,
    {
        self.cell.register(Kind::OnFail, move |outcome| {
            if let Err(error) = outcome.as_ref() {
                observer(error)
            }
        });
        self
    }

    /// Runs `observer` with the shared outcome, whichever way the cell
    /// resolves.
    pub(crate) fn on_outcome<F>(&self, observer: F)
    where
        F: FnOnce(&Arc<Result<T, E>>) + Send + 'static,
    {
        self.cell.register(Kind::Either, observer);
    }
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Future {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Debug, E: Debug> Debug for Future<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Future").field("cell", &self.cell).finish()
    }
}

impl<T, E> std::future::Future for Future<T, E> {
    type Output = Arc<Result<T, E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.cell.poll_resolution(cx.waker())
    }
}
