use std::rc::Rc;

use crate::{Completion, Demand, Subscriber, SubscriberId, Subscription};

/// Stands in for a subscriber inside a [`PromisePublisher`](crate::PromisePublisher).
///
/// The publisher may be dropped long before its promise settles. The one-shot
/// behind it keeps this guard for as long as the subscription is live, and the
/// guard owns the real subscriber, so delivery still reaches it.
///
/// Everything is forwarded untouched, identity included.
#[derive(Debug)]
pub struct LifetimeGuard<S> {
    inner: S,
}

impl<S: Subscriber> LifetimeGuard<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: Subscriber> Subscriber for LifetimeGuard<S> {
    type Input = S::Input;
    type Failure = S::Failure;

    fn id(&self) -> SubscriberId {
        self.inner.id()
    }

    fn receive_subscription(&self, subscription: Rc<dyn Subscription>) {
        self.inner.receive_subscription(subscription)
    }

    fn receive(&self, input: Self::Input) -> Demand {
        self.inner.receive(input)
    }

    fn receive_completion(&self, completion: Completion<Self::Failure>) {
        self.inner.receive_completion(completion)
    }
}
