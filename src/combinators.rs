//! Derived futures.
//!
//! Each combinator allocates a fresh [`Promise`] and resolves it from
//! observers registered on the source. A transformer or predicate that
//! panics fails the derived future with [`Error::Panicked`]; the panic never
//! escapes into the thread that resolved the source.
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cell::panic_message;
use crate::{Error, Future, Promise};

/// Runs a user callback, turning a panic into an `E`.
fn guarded<R, E: From<Error>>(combinator: &'static str, callback: impl FnOnce() -> R) -> Result<R, E> {
    catch_unwind(AssertUnwindSafe(callback)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!(combinator, panic = %message, "callback panicked, failing derived future");
        E::from(Error::Panicked(message))
    })
}

impl<T, E> Future<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// A future of `transformer(value)`. Source failures pass through and the
    /// transformer is not called.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::Promise;
    /// let promise = Promise::<String>::new();
    /// let mapped = promise.future().map(|v| format!("{v}!"));
    /// promise.set("Hey".into());
    /// assert_eq!(*mapped.get().unwrap(), Ok("Hey!".to_string()));
    /// ```
    pub fn map<U, F>(&self, transformer: F) -> Future<U, E>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> U + Send + 'static,
        E: Clone + From<Error>,
    {
        self.try_map(move |value| Ok(transformer(value)))
    }

    /// Like [`Future::map`], for transformers that can fail.
    pub fn try_map<U, F>(&self, transformer: F) -> Future<U, E>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Result<U, E> + Send + 'static,
        E: Clone + From<Error>,
    {
        let derived = Promise::<U, E>::new();
        let on_set = derived.clone();
        let on_fail = derived.clone();
        self.on_set(move |value| {
            match guarded("map", || transformer(value)).and_then(|mapped| mapped) {
                Ok(mapped) => on_set.set(mapped),
                Err(error) => on_set.fail(error),
            };
        })
        .on_fail(move |error| {
            on_fail.fail(error.clone());
        });
        derived.future()
    }

    /// A future of the source value if `predicate` accepts it, failed with
    /// [`Error::NoMatchingElement`] otherwise. Source failures pass through
    /// and the predicate is not called.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_cell::{Error, Promise};
    /// let promise = Promise::<i32>::new();
    /// let even = promise.future().filter(|v| v % 2 == 0);
    /// promise.set(1);
    /// assert!(even.is_failed());
    /// assert_eq!(*even.get().unwrap(), Err(Error::NoMatchingElement));
    /// ```
    pub fn filter<F>(&self, predicate: F) -> Future<T, E>
    where
        F: FnOnce(&T) -> bool + Send + 'static,
        E: From<Error>,
    {
        let derived = Promise::<T, E>::new();
        let target = derived.clone();
        self.on_outcome(move |outcome| {
            let Ok(value) = outcome.as_ref() else {
                target.adopt(outcome.clone());
                return;
            };
            match guarded("filter", || predicate(value)) {
                Ok(true) => target.adopt(outcome.clone()),
                Ok(false) => target.fail(E::from(Error::NoMatchingElement)),
                Err(error) => target.fail(error),
            };
        });
        derived.future()
    }

    /// A future that adopts the outcome of the future `binder` returns for the
    /// source value.
    pub fn flat_map<U, F>(&self, binder: F) -> Future<U, E>
    where
        U: Send + Sync + 'static,
        F: FnOnce(&T) -> Future<U, E> + Send + 'static,
        E: Clone + From<Error>,
    {
        let derived = Promise::<U, E>::new();
        let target = derived.clone();
        self.on_outcome(move |outcome| match outcome.as_ref() {
            Ok(value) => match guarded("flat_map", || binder(value)) {
                Ok(next) => next.on_outcome(move |adopted| {
                    target.adopt(adopted.clone());
                }),
                Err(error) => {
                    target.fail(error);
                }
            },
            Err(error) => {
                target.fail(error.clone());
            }
        });
        derived.future()
    }

    /// The source outcome if it succeeds; otherwise `other`'s success. When
    /// both fail the source's error is kept.
    pub fn fallback_to(&self, other: Future<T, E>) -> Future<T, E> {
        let derived = Promise::<T, E>::new();
        let target = derived.clone();
        self.on_outcome(move |outcome| {
            if outcome.is_ok() {
                target.adopt(outcome.clone());
                return;
            }
            let original = outcome.clone();
            other.on_outcome(move |fallback| {
                target.adopt(if fallback.is_ok() {
                    fallback.clone()
                } else {
                    original
                });
            });
        });
        derived.future()
    }
}

/// A future of every input's outcome, in input order. It resolves once all
/// inputs are resolved and never fails itself.
///
/// # Examples
///
/// ```
/// use promise_cell::{all, Error, Future, Promise};
/// let late = Promise::<i32>::new();
/// let joined = all([Future::resolved(1), Future::failed(Error::NoMatchingElement), late.future()]);
/// assert!(!joined.is_resolved());
/// late.set(3);
/// let outcomes = joined.blocking_get();
/// let outcomes = outcomes.as_ref().as_ref().unwrap();
/// assert_eq!(*outcomes[0], Ok(1));
/// assert!(outcomes[1].is_err());
/// assert_eq!(*outcomes[2], Ok(3));
/// ```
pub fn all<T, E, I>(futures: I) -> Future<Vec<Arc<Result<T, E>>>, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    I: IntoIterator<Item = Future<T, E>>,
{
    let futures: Vec<_> = futures.into_iter().collect();
    if futures.is_empty() {
        return Future::resolved(Vec::new());
    }
    let joined = Promise::<Vec<Arc<Result<T, E>>>, E>::new();
    let slots = Arc::new(Mutex::new(vec![None; futures.len()]));
    let remaining = Arc::new(AtomicUsize::new(futures.len()));
    for (index, future) in futures.iter().enumerate() {
        let joined = joined.clone();
        let slots = slots.clone();
        let remaining = remaining.clone();
        future.on_outcome(move |outcome| {
            slots.lock()[index] = Some(outcome.clone());
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                let outcomes = slots.lock().drain(..).flatten().collect();
                joined.set(outcomes);
            }
        });
    }
    joined.future()
}

#[cfg(test)]
mod tests {
    use super::all;
    use crate::{Error, Future, Promise};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_map_future() {
        let promise = Promise::<String>::new();
        let mapped = promise.future().map(|v| format!("{v}!"));
        assert!(!mapped.is_resolved());
        promise.set("Hey".into());
        assert!(mapped.is_resolved());
        assert_eq!(*mapped.get().unwrap(), Ok("Hey!".to_string()));
    }

    #[test]
    fn test_map_future_fail() {
        let promise = Promise::<String>::new();
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let mapped = promise.future().map(move |v| {
            flag.store(true, Ordering::SeqCst);
            format!("{v}!")
        });
        promise.fail(Error::Panicked("Plop da plop".into()));
        assert!(mapped.is_failed());
        assert_eq!(*mapped.get().unwrap(), Err(Error::Panicked("Plop da plop".into())));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_map_panic_fails_derived() {
        let promise = Promise::<i32>::new();
        let mapped = promise.future().map(|_| -> i32 { panic!("bad transform") });
        assert!(promise.set(1));
        assert!(promise.future().is_resolved());
        assert_eq!(*mapped.get().unwrap(), Err(Error::Panicked("bad transform".into())));
    }

    #[test]
    fn test_try_map_error() {
        let promise = Promise::<i32>::new();
        let checked = promise.future().try_map(|v| {
            if *v > 0 {
                Ok(*v as u32)
            } else {
                Err(Error::NoMatchingElement)
            }
        });
        promise.set(-4);
        assert_eq!(*checked.get().unwrap(), Err(Error::NoMatchingElement));
    }

    #[test]
    fn test_map_on_resolved_source_is_immediate() {
        let mapped = Future::<i32>::resolved(20).map(|v| v + 1).map(|v| v * 2);
        assert_eq!(*mapped.get().unwrap(), Ok(42));
    }

    #[test]
    fn test_filter_future() {
        let promise = Promise::<&str>::new();
        let filtered = promise.future().filter(|v| !v.is_empty());
        promise.set("Hey!");
        assert!(filtered.is_resolved());
        assert_eq!(*filtered.get().unwrap(), Ok("Hey!"));
    }

    #[test]
    fn test_filter_future_false() {
        let promise = Promise::<&str>::new();
        let filtered = promise.future().filter(|v| !v.is_empty());
        promise.set("");
        assert!(filtered.is_failed());
        assert_eq!(*filtered.get().unwrap(), Err(Error::NoMatchingElement));
    }

    #[test]
    fn test_filter_future_fail() {
        let promise = Promise::<&str>::new();
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let filtered = promise.future().filter(move |_| {
            flag.store(true, Ordering::SeqCst);
            true
        });
        promise.fail(Error::Panicked("Plop da plop".into()));
        assert!(filtered.is_failed());
        assert_eq!(*filtered.get().unwrap(), Err(Error::Panicked("Plop da plop".into())));
        assert!(!called.load(Ordering::SeqCst));
    }

    #[test]
    fn test_filter_panic_fails_derived() {
        let promise = Promise::<u8>::new();
        let filtered = promise.future().filter(|_| panic!("bad predicate"));
        promise.set(1);
        assert_eq!(*filtered.get().unwrap(), Err(Error::Panicked("bad predicate".into())));
    }

    #[test]
    fn test_flat_map_adopts_inner_outcome() {
        let outer = Promise::<i32>::new();
        let inner = Promise::<String>::new();
        let inner_future = inner.future();
        let chained = outer.future().flat_map(move |_| inner_future);
        outer.set(1);
        assert!(!chained.is_resolved());
        inner.set("done".into());
        assert_eq!(*chained.get().unwrap(), Ok("done".to_string()));

        let failed = Future::<i32>::failed(Error::NoMatchingElement)
            .flat_map(|v| Future::<i32>::resolved(*v));
        assert_eq!(*failed.get().unwrap(), Err(Error::NoMatchingElement));
    }

    #[test]
    fn test_fallback_to() {
        let ok = Future::<i32>::resolved(1).fallback_to(Future::resolved(2));
        assert_eq!(*ok.get().unwrap(), Ok(1));

        let rescued = Future::<i32>::failed(Error::NoMatchingElement).fallback_to(Future::resolved(2));
        assert_eq!(*rescued.get().unwrap(), Ok(2));

        let first = Error::Panicked("first".into());
        let both = Future::<i32>::failed(first.clone())
            .fallback_to(Future::failed(Error::Panicked("second".into())));
        assert_eq!(*both.get().unwrap(), Err(first));
    }

    #[test]
    fn test_all_keeps_input_order() {
        let slow = Promise::<i32>::new();
        let fast = Promise::<i32>::new();
        let joined = all(vec![slow.future(), fast.future()]);
        fast.fail(Error::NoMatchingElement);
        assert!(!joined.is_resolved());
        slow.set(5);
        let outcomes = joined.get().unwrap();
        let outcomes = outcomes.as_ref().as_ref().unwrap();
        assert_eq!(*outcomes[0], Ok(5));
        assert_eq!(*outcomes[1], Err(Error::NoMatchingElement));
    }

    #[test]
    fn test_all_empty() {
        let joined = all(Vec::<Future<i32>>::new());
        assert_eq!(joined.get().unwrap().as_ref().as_ref().map(Vec::len), Ok(0));
    }
}
