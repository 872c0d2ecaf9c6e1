use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use crate::{Completion, Demand, Subscriber, SubscriberId, Subscription};

/// A subscriber built from two closures. It requests unlimited demand as soon
/// as it is subscribed.
///
/// `Sink` is a handle: clones share the same closures and subscription.
pub struct Sink<T, E> {
    inner: Rc<Inner<T, E>>,
}

struct Inner<T, E> {
    id: SubscriberId,
    subscription: RefCell<Option<Rc<dyn Subscription>>>,
    on_value: RefCell<Option<Box<dyn FnMut(T)>>>,
    on_completion: RefCell<Option<Box<dyn FnOnce(Completion<E>)>>>,
}

impl<T, E> Clone for Sink<T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> Debug for Sink<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.inner.id)
            .field("subscribed", &self.inner.subscription.borrow().is_some())
            .finish()
    }
}

impl<T: 'static, E: 'static> Sink<T, E> {
    pub fn new<C, V>(on_completion: C, on_value: V) -> Self
    where
        C: FnOnce(Completion<E>) + 'static,
        V: FnMut(T) + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                id: SubscriberId::next(),
                subscription: RefCell::new(None),
                on_value: RefCell::new(Some(Box::new(on_value))),
                on_completion: RefCell::new(Some(Box::new(on_completion))),
            }),
        }
    }

    /// A handle that cancels this sink when dropped.
    pub fn cancellable(&self) -> AnyCancellable {
        let sink = self.clone();
        AnyCancellable::new(move || sink.cancel())
    }

    /// Cancels the subscription and releases both closures.
    pub fn cancel(&self) {
        let subscription = self.inner.subscription.borrow_mut().take();
        self.inner.on_value.borrow_mut().take();
        self.inner.on_completion.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.cancel();
        }
    }
}

impl<T: 'static, E: 'static> Subscriber for Sink<T, E> {
    type Input = T;
    type Failure = E;

    fn id(&self) -> SubscriberId {
        self.inner.id
    }

    fn receive_subscription(&self, subscription: Rc<dyn Subscription>) {
        // Already cancelled or already subscribed elsewhere.
        if self.inner.on_completion.borrow().is_none() || self.inner.subscription.borrow().is_some()
        {
            subscription.cancel();
            return;
        }
        *self.inner.subscription.borrow_mut() = Some(subscription.clone());
        subscription.request(Demand::Unlimited);
    }

    fn receive(&self, input: T) -> Demand {
        let on_value = self.inner.on_value.borrow_mut().take();
        if let Some(mut on_value) = on_value {
            on_value(input);
            let mut slot = self.inner.on_value.borrow_mut();
            // Keep it unless the closure cancelled us meanwhile.
            if slot.is_none() && self.inner.on_completion.borrow().is_some() {
                *slot = Some(on_value);
            }
        }
        Demand::NONE
    }

    fn receive_completion(&self, completion: Completion<E>) {
        self.inner.subscription.borrow_mut().take();
        self.inner.on_value.borrow_mut().take();
        let on_completion = self.inner.on_completion.borrow_mut().take();
        if let Some(on_completion) = on_completion {
            on_completion(completion);
        }
    }
}

/// Runs its cancel action once, on [`AnyCancellable::cancel`] or on drop.
#[must_use = "dropping an AnyCancellable cancels the subscription immediately"]
pub struct AnyCancellable {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl AnyCancellable {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel()
        }
    }
}

impl Drop for AnyCancellable {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel()
        }
    }
}

impl Debug for AnyCancellable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyCancellable")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
