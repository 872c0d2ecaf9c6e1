use futures::task::SpawnError;
use thiserror::Error;

/// Errors raised by the host promise, never by the publisher.
#[derive(Error, Debug)]
pub enum Error {
    #[error("the resolver was dropped before the promise settled")]
    ResolverDropped,
    #[error("the host event loop is gone: {0}")]
    Spawn(#[from] SpawnError),
}

/// The failure type of a [`PromisePublisher`](crate::PromisePublisher).
///
/// Carries the rejection reason exactly as the promise handed it over. The
/// reason is never inspected; equality is whatever `R` provides.
///
/// # Examples
///
/// ```
/// use promise_publisher::PromiseError;
///
/// assert_eq!(PromiseError::new("boom"), PromiseError::new("boom"));
/// assert_ne!(PromiseError::new("boom"), PromiseError::new("bang"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
#[error("promise rejected with {value:?}")]
pub struct PromiseError<R> {
    value: R,
}

impl<R> PromiseError<R> {
    pub fn new(value: R) -> Self {
        Self { value }
    }

    /// The rejection reason.
    pub fn value(&self) -> &R {
        &self.value
    }

    pub fn into_inner(self) -> R {
        self.value
    }
}

impl<R> From<R> for PromiseError<R> {
    fn from(value: R) -> Self {
        Self::new(value)
    }
}
