//! Single-assignment promise/future cells.
//!
//! A [`Promise`] is resolved at most once, either with a value ([`Promise::set`])
//! or with an error ([`Promise::fail`]). Any number of [`Future`] views share the
//! outcome: they can peek at it, block on it, `.await` it, register observers,
//! or derive new futures with [`Future::map`] and [`Future::filter`].
//!
//! # Examples
//!
//! ```
//! use promise_cell::{Error, Promise};
//! use std::thread;
//!
//! let promise = Promise::<String>::new();
//! let shouted = promise.future().map(|s| format!("{s}!"));
//!
//! let producer = promise.clone();
//! let task = thread::spawn(move || producer.set("Hey".into()));
//!
//! assert_eq!(*shouted.blocking_get(), Ok("Hey!".to_string()));
//! task.join().expect("The producer thread has panicked");
//!
//! // Later resolutions are ignored.
//! assert!(!promise.fail(Error::NoMatchingElement));
//! assert!(!promise.is_failed());
//! ```
pub mod cell;
pub mod combinators;
pub mod future;
pub mod promise;

pub use crate::cell::Status;
pub use crate::combinators::all;
pub use crate::future::Future;
pub use crate::promise::Promise;

/// Failures synthesized by this crate.
///
/// Caller-supplied error types only need `From<Error>` to be usable with the
/// derived-future combinators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A `filter` predicate rejected the resolved value.
    #[error("no matching element")]
    NoMatchingElement,
    /// A transformer or predicate panicked while deriving a future.
    #[error("callback panicked: {0}")]
    Panicked(String),
}
