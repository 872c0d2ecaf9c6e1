//! A one-shot multicast publisher.
//!
//! [`OneShot`] holds at most one outcome. Every subscriber gets its own
//! subscription; subscribers that attach before the outcome is known are
//! notified in attachment order when it arrives, subscribers that attach
//! afterwards get it replayed straight away.
//!
//! Ownership runs one way only: the shared state owns the pending
//! subscriptions and each subscription owns its downstream subscriber. A
//! subscription only points back at the shared state weakly. When the shared
//! state goes away unsettled, its pending subscriptions let go of their
//! subscribers; a subscription that delivered or was cancelled lets go of its
//! subscriber right away.
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::{Completion, Demand, Publisher, Subscriber, SubscriberId, Subscription};

type Downstream<T, E> = Rc<dyn Subscriber<Input = T, Failure = E>>;

/// A publisher that settles once and replays that outcome to everyone.
///
/// A success is delivered as one value followed by
/// [`Completion::Finished`], and only once the subscriber has requested
/// demand. A failure is delivered as [`Completion::Failure`] regardless of
/// demand.
///
/// # Examples
///
/// ```
/// use promise_publisher::{Completion, OneShot, Publisher};
/// use std::{cell::RefCell, rc::Rc};
///
/// let mut settle = None;
/// let one_shot = OneShot::<i32, ()>::new(|s| settle = Some(s));
///
/// let seen = Rc::new(RefCell::new(vec![]));
/// let s = seen.clone();
/// let _cancellable = one_shot.sink(|_| {}, move |v| s.borrow_mut().push(v));
///
/// settle.unwrap().succeed(7);
/// assert_eq!(*seen.borrow(), vec![7]);
/// ```
pub struct OneShot<T, E> {
    shared: Rc<RefCell<Shared<T, E>>>,
}

/// Settles the [`OneShot`] it came from. Only the first call counts.
pub struct Settle<T, E> {
    shared: Rc<RefCell<Shared<T, E>>>,
}

struct Shared<T, E> {
    outcome: Option<Result<T, E>>,
    // Subscriptions still waiting for the outcome, in attachment order.
    subscriptions: Vec<Rc<Conduit<T, E>>>,
}

struct Conduit<T, E> {
    id: SubscriberId,
    parent: Weak<RefCell<Shared<T, E>>>,
    outcome: RefCell<Option<Result<T, E>>>,
    downstream: RefCell<Option<Downstream<T, E>>>,
    demand: Cell<Demand>,
}

impl<T, E> Clone for OneShot<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Clone for Settle<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Debug, E: Debug> Debug for OneShot<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.borrow();
        f.debug_struct("OneShot")
            .field("outcome", &shared.outcome)
            .field("subscribers", &shared.subscriptions.len())
            .finish()
    }
}

impl<T, E> Debug for Settle<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settle")
            .field("settled", &self.shared.borrow().outcome.is_some())
            .finish()
    }
}

impl<T, E> Drop for Shared<T, E> {
    /// Nothing can settle us anymore: release whoever is still waiting.
    fn drop(&mut self) {
        if !self.subscriptions.is_empty() {
            trace!(
                subscribers = self.subscriptions.len(),
                "one-shot dropped unsettled, releasing subscribers"
            );
        }
        for conduit in self.subscriptions.drain(..) {
            let downstream = conduit.downstream.borrow_mut().take();
            drop(downstream);
        }
    }
}

impl<T, E> OneShot<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Creates the publisher and runs `attempt` right away with the handle
    /// that settles it.
    pub fn new(attempt: impl FnOnce(Settle<T, E>)) -> Self {
        let shared = Rc::new(RefCell::new(Shared {
            outcome: None,
            subscriptions: Vec::new(),
        }));
        attempt(Settle {
            shared: shared.clone(),
        });
        Self { shared }
    }

    pub fn is_settled(&self) -> bool {
        self.shared.borrow().outcome.is_some()
    }

    /// Number of subscriptions still waiting for the outcome.
    pub fn subscriber_count(&self) -> usize {
        self.shared.borrow().subscriptions.len()
    }
}

impl<T, E> Settle<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub fn call(&self, result: Result<T, E>) {
        let subscriptions = {
            let mut shared = self.shared.borrow_mut();
            if shared.outcome.is_some() {
                debug!(success = result.is_ok(), "one-shot already settled, ignoring");
                return;
            }
            shared.outcome = Some(result.clone());
            std::mem::take(&mut shared.subscriptions)
        };
        debug!(subscribers = subscriptions.len(), "one-shot settled");
        for conduit in subscriptions {
            conduit.settle(result.clone());
        }
    }

    pub fn succeed(&self, value: T) {
        self.call(Ok(value))
    }

    pub fn fail(&self, error: E) {
        self.call(Err(error))
    }
}

impl<T, E> Publisher for OneShot<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = T;
    type Failure = E;

    fn receive<S>(&self, subscriber: S)
    where
        S: Subscriber<Input = T, Failure = E> + 'static,
    {
        let conduit = Rc::new(Conduit {
            id: subscriber.id(),
            parent: Rc::downgrade(&self.shared),
            outcome: RefCell::new(None),
            downstream: RefCell::new(Some(Rc::new(subscriber) as Downstream<T, E>)),
            demand: Cell::new(Demand::NONE),
        });
        let outcome = {
            let mut shared = self.shared.borrow_mut();
            let outcome = shared.outcome.clone();
            if outcome.is_none() {
                shared.subscriptions.push(conduit.clone());
            }
            outcome
        };
        let settled = outcome.is_some();
        *conduit.outcome.borrow_mut() = outcome;
        trace!(subscriber = ?conduit.id, settled, "subscriber attached");
        Conduit::handshake(&conduit);
        conduit.drain();
    }
}

impl<T, E> Conduit<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn handshake(this: &Rc<Self>) {
        let downstream = this.downstream.borrow().clone();
        if let Some(downstream) = downstream {
            downstream.receive_subscription(this.clone());
        }
    }

    fn settle(&self, outcome: Result<T, E>) {
        if self.downstream.borrow().is_none() {
            return;
        }
        *self.outcome.borrow_mut() = Some(outcome);
        self.drain();
    }

    /// Delivers the outcome if there is one and the subscriber may take it.
    fn drain(&self) {
        let ready = match &*self.outcome.borrow() {
            None => false,
            Some(Ok(_)) => !self.demand.get().is_none(),
            Some(Err(_)) => true,
        };
        if !ready {
            return;
        }
        let outcome = self.outcome.borrow_mut().take();
        let downstream = self.downstream.borrow_mut().take();
        let (Some(outcome), Some(downstream)) = (outcome, downstream) else {
            return;
        };
        trace!(subscriber = ?self.id, success = outcome.is_ok(), "delivering outcome");
        match outcome {
            Ok(value) => {
                downstream.receive(value);
                downstream.receive_completion(Completion::Finished);
            }
            Err(error) => downstream.receive_completion(Completion::Failure(error)),
        }
    }
}

impl<T, E> Subscription for Conduit<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn request(&self, demand: Demand) {
        if self.downstream.borrow().is_none() {
            return;
        }
        self.demand.set(self.demand.get() + demand);
        self.drain();
    }

    fn cancel(&self) {
        let downstream = self.downstream.borrow_mut().take();
        self.outcome.borrow_mut().take();
        if let Some(parent) = self.parent.upgrade() {
            parent
                .borrow_mut()
                .subscriptions
                .retain(|conduit| !std::ptr::eq(Rc::as_ptr(conduit), self));
        }
        if downstream.is_some() {
            trace!(subscriber = ?self.id, "subscription cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{OneShot, Settle};
    use crate::{Completion, Demand, Publisher, Subscriber, SubscriberId, Subscription};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Value(i32),
        Completion(Completion<String>),
    }

    /// Records what it receives and requests `initial` demand on subscribe.
    struct Probe {
        id: SubscriberId,
        initial: Demand,
        events: Rc<RefCell<Vec<Event>>>,
        subscription: Rc<RefCell<Option<Rc<dyn Subscription>>>>,
    }

    impl Probe {
        fn new(initial: Demand) -> Self {
            Self {
                id: SubscriberId::next(),
                initial,
                events: Rc::new(RefCell::new(vec![])),
                subscription: Rc::new(RefCell::new(None)),
            }
        }
    }

    impl Subscriber for Probe {
        type Input = i32;
        type Failure = String;

        fn id(&self) -> SubscriberId {
            self.id
        }

        fn receive_subscription(&self, subscription: Rc<dyn Subscription>) {
            *self.subscription.borrow_mut() = Some(subscription.clone());
            if !self.initial.is_none() {
                subscription.request(self.initial);
            }
        }

        fn receive(&self, input: i32) -> Demand {
            self.events.borrow_mut().push(Event::Value(input));
            Demand::NONE
        }

        fn receive_completion(&self, completion: Completion<String>) {
            self.events.borrow_mut().push(Event::Completion(completion));
        }
    }

    fn pending() -> (OneShot<i32, String>, Settle<i32, String>) {
        let mut settle = None;
        let one_shot = OneShot::new(|s| settle = Some(s));
        (one_shot, settle.expect("attempt runs synchronously"))
    }

    #[test]
    fn test_attempt_runs_eagerly() {
        let ran = Cell::new(false);
        let _one_shot = OneShot::<i32, String>::new(|_| ran.set(true));
        assert!(ran.get());
    }

    #[test]
    fn test_success_before_and_after_attach() {
        let (one_shot, settle) = pending();
        let early = Probe::new(Demand::Unlimited);
        let early_events = early.events.clone();
        one_shot.receive(early);
        assert!(early_events.borrow().is_empty());
        assert_eq!(one_shot.subscriber_count(), 1);

        settle.succeed(42);
        assert_eq!(
            *early_events.borrow(),
            vec![Event::Value(42), Event::Completion(Completion::Finished)]
        );
        assert_eq!(one_shot.subscriber_count(), 0);

        let late = Probe::new(Demand::max(1));
        let late_events = late.events.clone();
        one_shot.receive(late);
        assert_eq!(
            *late_events.borrow(),
            vec![Event::Value(42), Event::Completion(Completion::Finished)]
        );
    }

    #[test]
    fn test_failure_ignores_demand() {
        let (one_shot, settle) = pending();
        let probe = Probe::new(Demand::NONE);
        let events = probe.events.clone();
        one_shot.receive(probe);
        settle.fail("boom".into());
        assert_eq!(
            *events.borrow(),
            vec![Event::Completion(Completion::Failure("boom".into()))]
        );

        let late = Probe::new(Demand::NONE);
        let late_events = late.events.clone();
        one_shot.receive(late);
        assert_eq!(
            *late_events.borrow(),
            vec![Event::Completion(Completion::Failure("boom".into()))]
        );
    }

    #[test]
    fn test_success_waits_for_demand() {
        let (one_shot, settle) = pending();
        let probe = Probe::new(Demand::NONE);
        let events = probe.events.clone();
        let subscription = probe.subscription.clone();
        one_shot.receive(probe);
        settle.succeed(1);
        assert!(events.borrow().is_empty());

        let subscription = subscription.borrow().clone().expect("subscribed");
        subscription.request(Demand::max(1));
        assert_eq!(
            *events.borrow(),
            vec![Event::Value(1), Event::Completion(Completion::Finished)]
        );

        subscription.request(Demand::max(1));
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn test_second_settlement_is_ignored() {
        let (one_shot, settle) = pending();
        settle.succeed(1);
        settle.clone().fail("late".into());
        settle.succeed(2);

        let probe = Probe::new(Demand::Unlimited);
        let events = probe.events.clone();
        one_shot.receive(probe);
        assert_eq!(
            *events.borrow(),
            vec![Event::Value(1), Event::Completion(Completion::Finished)]
        );
    }

    #[test]
    fn test_cancel_before_settlement_suppresses_delivery() {
        let (one_shot, settle) = pending();
        let cancelled = Probe::new(Demand::Unlimited);
        let cancelled_events = cancelled.events.clone();
        let subscription = cancelled.subscription.clone();
        let kept = Probe::new(Demand::Unlimited);
        let kept_events = kept.events.clone();
        one_shot.receive(cancelled);
        one_shot.receive(kept);
        assert_eq!(one_shot.subscriber_count(), 2);

        let subscription = subscription.borrow_mut().take().expect("subscribed");
        subscription.cancel();
        assert_eq!(one_shot.subscriber_count(), 1);

        settle.succeed(5);
        assert!(cancelled_events.borrow().is_empty());
        assert_eq!(kept_events.borrow().len(), 2);

        // No-op once released.
        subscription.cancel();
        subscription.request(Demand::Unlimited);
        assert!(cancelled_events.borrow().is_empty());
    }

    #[test]
    fn test_delivery_order_follows_attachment() {
        let (one_shot, settle) = pending();
        let order = Rc::new(RefCell::new(vec![]));
        let mut keep = vec![];
        for name in ["a", "b", "c"] {
            let order = order.clone();
            keep.push(one_shot.sink(move |_| order.borrow_mut().push(name), |_| {}));
        }
        settle.succeed(0);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_dropped_cancellable_detaches() {
        let (one_shot, settle) = pending();
        drop(one_shot.sink(|_| panic!("cancelled sink completed"), |_| {}));
        assert_eq!(one_shot.subscriber_count(), 0);
        settle.succeed(0);
    }

    #[test]
    fn test_subscriber_released_after_delivery() {
        let (one_shot, settle) = pending();
        let probe = Probe::new(Demand::Unlimited);
        let subscription = probe.subscription.clone();
        let witness = Rc::new(());
        let held = witness.clone();
        let _cancellable = one_shot.sink(move |_| drop(held), |_| {});
        one_shot.receive(probe);
        assert_eq!(Rc::strong_count(&witness), 2);

        settle.succeed(3);
        assert_eq!(Rc::strong_count(&witness), 1);
        // The probe dropped its own clone of the subscription handle with it.
        assert_eq!(Rc::strong_count(&subscription), 1);
    }

    #[test]
    fn test_subscriber_released_when_never_settled() {
        let (one_shot, settle) = pending();
        let probe = Probe::new(Demand::Unlimited);
        let events = probe.events.clone();
        one_shot.receive(probe);
        assert_eq!(Rc::strong_count(&events), 2);

        drop(one_shot);
        drop(settle);
        // The probe kept its subscription handle, yet nothing stays alive.
        assert_eq!(Rc::strong_count(&events), 1);
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_settled_outcome_outlives_one_shot() {
        let (one_shot, settle) = pending();
        let probe = Probe::new(Demand::NONE);
        let events = probe.events.clone();
        let subscription = probe.subscription.clone();
        one_shot.receive(probe);
        settle.succeed(8);
        drop(one_shot);
        drop(settle);

        let subscription = subscription.borrow().clone().expect("subscribed");
        subscription.request(Demand::max(1));
        assert_eq!(
            *events.borrow(),
            vec![Event::Value(8), Event::Completion(Completion::Finished)]
        );
    }
}
