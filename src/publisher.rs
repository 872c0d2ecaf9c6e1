use std::fmt::Debug;

use tracing::trace;

use crate::{LifetimeGuard, OneShot, PromiseError, Publisher, Subscriber, Thenable};

/// Publishes the outcome of a promise to any number of subscribers.
///
/// Callbacks are registered with the promise as soon as the publisher is
/// built, whether or not anyone subscribes. A fulfilment is published as one
/// value followed by [`Completion::Finished`](crate::Completion::Finished),
/// a rejection as [`Completion::Failure`](crate::Completion::Failure) carrying
/// the reason in a [`PromiseError`]. Subscribers attaching after the promise
/// settled get the outcome replayed immediately.
///
/// Dropping the publisher does not stop delivery to subscribers already
/// attached; the promise's callbacks own everything needed to reach them.
///
/// # Examples
///
/// ```
/// use futures::executor::LocalPool;
/// use promise_publisher::{Completion, LocalPromise, Publisher, Thenable};
/// use std::{cell::RefCell, rc::Rc};
///
/// let mut pool = LocalPool::new();
/// let (promise, resolver) = LocalPromise::<i32, String>::new(&pool.spawner());
/// let publisher = promise.publisher();
///
/// let seen = Rc::new(RefCell::new(vec![]));
/// let (a, b) = (seen.clone(), seen.clone());
/// let _cancellable = publisher.sink(
///     move |completion| a.borrow_mut().push(format!("{completion:?}")),
///     move |value| b.borrow_mut().push(value.to_string()),
/// );
/// drop(publisher);
///
/// resolver.resolve(42);
/// pool.run_until_stalled();
/// assert_eq!(*seen.borrow(), vec!["42", "Finished"]);
/// ```
pub struct PromisePublisher<T, R> {
    future: OneShot<T, PromiseError<R>>,
}

impl<T, R> PromisePublisher<T, R>
where
    T: Clone + 'static,
    R: Clone + 'static,
{
    pub fn new<P>(promise: &P) -> Self
    where
        P: Thenable<Output = T, Reason = R>,
    {
        let future = OneShot::<T, PromiseError<R>>::new(|settle| {
            let on_rejected = settle.clone();
            promise.then(
                move |value| {
                    trace!("promise fulfilled");
                    settle.succeed(value)
                },
                move |reason| {
                    trace!("promise rejected");
                    on_rejected.fail(PromiseError::new(reason))
                },
            );
        });
        Self { future }
    }
}

impl<T, R> Clone for PromisePublisher<T, R> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
        }
    }
}

impl<T: Debug, R: Debug> Debug for PromisePublisher<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromisePublisher")
            .field("future", &self.future)
            .finish()
    }
}

impl<T, R> Publisher for PromisePublisher<T, R>
where
    T: Clone + 'static,
    R: Clone + 'static,
{
    type Output = T;
    type Failure = PromiseError<R>;

    fn receive<S>(&self, subscriber: S)
    where
        S: Subscriber<Input = T, Failure = PromiseError<R>> + 'static,
    {
        self.future.receive(LifetimeGuard::new(subscriber))
    }
}
