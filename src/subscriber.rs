//! The publisher/subscriber protocol.
//!
//! A [`Publisher`] hands every [`Subscriber`] a [`Subscription`]. The
//! subscriber pulls values by requesting [`Demand`] through it and may cancel
//! at any time. Delivery ends with at most one [`Completion`].
//!
//! Everything here is single threaded: subscribers are shared by reference and
//! keep their own state behind `Cell`/`RefCell`.
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::sink::{AnyCancellable, Sink};
use crate::Demand;

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(0);

/// Identity token of a subscriber. Two subscribers with the same id are the
/// same subscriber as far as a publisher is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn next() -> Self {
        SubscriberId(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<E> {
    Finished,
    Failure(E),
}

pub trait Subscription {
    /// Asks for more values. Demand accumulates across calls.
    fn request(&self, demand: Demand);
    /// Stops delivery. Calling it more than once, or after completion, does
    /// nothing.
    fn cancel(&self);
}

pub trait Subscriber {
    type Input;
    type Failure;

    fn id(&self) -> SubscriberId;

    fn receive_subscription(&self, subscription: Rc<dyn Subscription>);

    /// Returns the additional demand the subscriber wants on top of what it
    /// already requested.
    fn receive(&self, input: Self::Input) -> Demand;

    fn receive_completion(&self, completion: Completion<Self::Failure>);
}

pub trait Publisher {
    type Output;
    type Failure;

    fn receive<S>(&self, subscriber: S)
    where
        S: Subscriber<Input = Self::Output, Failure = Self::Failure> + 'static;

    /// Attaches a [`Sink`] with unlimited demand. Dropping the returned
    /// handle cancels the subscription.
    fn sink<C, V>(&self, on_completion: C, on_value: V) -> AnyCancellable
    where
        C: FnOnce(Completion<Self::Failure>) + 'static,
        V: FnMut(Self::Output) + 'static,
        Self::Output: 'static,
        Self::Failure: 'static,
    {
        let sink = Sink::new(on_completion, on_value);
        let cancellable = sink.cancellable();
        self.receive(sink);
        cancellable
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriberId;

    #[test]
    fn test_subscriber_ids_are_unique() {
        let a = SubscriberId::next();
        let b = SubscriberId::next();
        assert_ne!(a, b);
        assert_eq!(a, a);
    }
}
