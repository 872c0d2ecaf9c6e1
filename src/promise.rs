use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use tracing::{debug, warn};

use crate::{Error, PromiseError, PromisePublisher};

/// Something that settles once, either fulfilled with an `Output` or
/// rejected with a `Reason`, and lets callers observe that.
///
/// Implementations must invoke at most one of the two callbacks, at most
/// once.
pub trait Thenable {
    type Output;
    type Reason;

    fn then<S, F>(&self, on_fulfilled: S, on_rejected: F)
    where
        S: FnOnce(Self::Output) + 'static,
        F: FnOnce(Self::Reason) + 'static;

    /// A multicast publisher of this promise's outcome. See
    /// [`PromisePublisher::new`].
    fn publisher(&self) -> PromisePublisher<Self::Output, Self::Reason>
    where
        Self: Sized,
        Self::Output: Clone + 'static,
        Self::Reason: Clone + 'static,
    {
        PromisePublisher::new(self)
    }
}

/// A single threaded promise settled by a [`LocalResolver`].
///
/// Callbacks registered with [`Thenable::then`] run on the host event loop
/// (a [`LocalPool`](futures::executor::LocalPool)), never inline, so nothing
/// is observed until the host runs its pool.
///
/// # Examples
///
/// ```
/// use futures::executor::LocalPool;
/// use promise_publisher::{LocalPromise, Thenable};
/// use std::{cell::Cell, rc::Rc};
///
/// let mut pool = LocalPool::new();
/// let (promise, resolver) = LocalPromise::<i32, String>::new(&pool.spawner());
/// let seen = Rc::new(Cell::new(None));
/// let s = seen.clone();
/// promise.then(move |v| s.set(Some(v)), |_| {});
///
/// resolver.resolve(42);
/// assert_eq!(seen.get(), None);
/// pool.run_until_stalled();
/// assert_eq!(seen.get(), Some(42));
/// ```
pub struct LocalPromise<T, R> {
    inner: Rc<RefCell<Inner<T, R>>>,
    spawner: LocalSpawner,
}

/// Settles its [`LocalPromise`]. Dropping it unsettled abandons the promise:
/// pending callbacks are released without being called.
pub struct LocalResolver<T, R> {
    inner: Rc<RefCell<Inner<T, R>>>,
}

/// Resolves once the promise settles, or with [`Error::ResolverDropped`] if
/// it never will.
pub struct Settlement<T, R> {
    inner: Rc<RefCell<Inner<T, R>>>,
}

#[derive(Debug)]
enum State<T, R> {
    Pending,
    Fulfilled(T),
    Rejected(R),
    Abandoned,
}

#[derive(Debug)]
struct Inner<T, R> {
    state: State<T, R>,
    wakers: Vec<Waker>,
}

impl<T, R> Clone for LocalPromise<T, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            spawner: self.spawner.clone(),
        }
    }
}

impl<T: Debug, R: Debug> Debug for LocalPromise<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPromise")
            .field("state", &self.inner.borrow().state)
            .finish()
    }
}

impl<T, R> LocalPromise<T, R>
where
    T: Clone + 'static,
    R: Clone + 'static,
{
    pub fn new(spawner: &LocalSpawner) -> (Self, LocalResolver<T, R>) {
        let inner = Rc::new(RefCell::new(Inner {
            state: State::Pending,
            wakers: vec![],
        }));
        (
            Self {
                inner: inner.clone(),
                spawner: spawner.clone(),
            },
            LocalResolver { inner },
        )
    }

    /// An already fulfilled promise.
    pub fn resolved(spawner: &LocalSpawner, value: T) -> Self {
        let (promise, resolver) = Self::new(spawner);
        resolver.resolve(value);
        promise
    }

    /// An already rejected promise.
    pub fn rejected(spawner: &LocalSpawner, reason: R) -> Self {
        let (promise, resolver) = Self::new(spawner);
        resolver.reject(reason);
        promise
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner.borrow().state, State::Pending)
    }

    pub fn settled(&self) -> Settlement<T, R> {
        Settlement {
            inner: self.inner.clone(),
        }
    }

    /// Like [`Thenable::then`], but reports a host event loop that has shut
    /// down instead of logging it.
    pub fn try_then<S, F>(&self, on_fulfilled: S, on_rejected: F) -> Result<(), Error>
    where
        S: FnOnce(T) + 'static,
        F: FnOnce(R) + 'static,
    {
        let settlement = self.settled();
        self.spawner.spawn_local(async move {
            match settlement.await {
                Ok(Ok(value)) => on_fulfilled(value),
                Ok(Err(reason)) => on_rejected(reason),
                Err(err) => debug!(error = %err, "promise abandoned, releasing callbacks"),
            }
        })?;
        Ok(())
    }

    /// A future of the outcome with the rejection wrapped the same way a
    /// [`PromisePublisher`] wraps it.
    pub async fn value(&self) -> Result<Result<T, PromiseError<R>>, Error> {
        Ok(self.settled().await?.map_err(PromiseError::new))
    }
}

impl<T, R> Thenable for LocalPromise<T, R>
where
    T: Clone + 'static,
    R: Clone + 'static,
{
    type Output = T;
    type Reason = R;

    fn then<S, F>(&self, on_fulfilled: S, on_rejected: F)
    where
        S: FnOnce(T) + 'static,
        F: FnOnce(R) + 'static,
    {
        if let Err(err) = self.try_then(on_fulfilled, on_rejected) {
            warn!(error = %err, "could not register promise callbacks");
        }
    }
}

impl<T, R> LocalResolver<T, R> {
    pub fn resolve(self, value: T) {
        self.settle(State::Fulfilled(value));
    }

    pub fn reject(self, reason: R) {
        self.settle(State::Rejected(reason));
    }

    fn settle(&self, state: State<T, R>) {
        let wakers = {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, State::Pending) {
                return;
            }
            inner.state = state;
            std::mem::take(&mut inner.wakers)
        };
        for waker in wakers {
            waker.wake()
        }
    }
}

impl<T, R> Drop for LocalResolver<T, R> {
    /// If this is an unsettled resolver, wake the waiters with an error.
    fn drop(&mut self) {
        self.settle(State::Abandoned);
    }
}

impl<T, R> Debug for LocalResolver<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalResolver").finish_non_exhaustive()
    }
}

impl<T: Clone, R: Clone> Future for Settlement<T, R> {
    type Output = Result<Result<T, R>, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        match inner.state {
            State::Fulfilled(ref value) => Poll::Ready(Ok(Ok(value.clone()))),
            State::Rejected(ref reason) => Poll::Ready(Ok(Err(reason.clone()))),
            State::Abandoned => Poll::Ready(Err(Error::ResolverDropped)),
            State::Pending => {
                if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
