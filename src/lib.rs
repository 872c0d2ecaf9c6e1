//! Turns a promise into a multicast publisher.
//!
//! A promise settles once. [`PromisePublisher`] registers with it as soon as it
//! is built and publishes that single outcome to every subscriber, replaying
//! it to subscribers that arrive late, honoring their demand and letting them
//! cancel. Rejections reach subscribers as [`PromiseError`].
//!
//! Everything runs on one thread, driven by the host event loop; here that is
//! a [`futures::executor::LocalPool`] running [`LocalPromise`] callbacks.
//!
//! ```
//! use futures::executor::LocalPool;
//! use promise_publisher::{Completion, LocalPromise, PromiseError, Publisher, Thenable};
//! use std::{cell::RefCell, rc::Rc};
//!
//! let mut pool = LocalPool::new();
//! let (promise, resolver) = LocalPromise::<i32, String>::new(&pool.spawner());
//! let publisher = promise.publisher();
//!
//! let failure = Rc::new(RefCell::new(None));
//! let f = failure.clone();
//! let _cancellable = publisher.sink(move |c| *f.borrow_mut() = Some(c), |_| {});
//!
//! resolver.reject("boom".into());
//! pool.run_until_stalled();
//! assert_eq!(
//!     *failure.borrow(),
//!     Some(Completion::Failure(PromiseError::new("boom".to_string())))
//! );
//! ```
pub mod demand;
pub mod error;
pub mod guard;
pub mod one_shot;
pub mod promise;
pub mod publisher;
pub mod sink;
pub mod subscriber;

pub use demand::Demand;
pub use error::{Error, PromiseError};
pub use guard::LifetimeGuard;
pub use one_shot::{OneShot, Settle};
pub use promise::{LocalPromise, LocalResolver, Settlement, Thenable};
pub use publisher::PromisePublisher;
pub use sink::{AnyCancellable, Sink};
pub use subscriber::{Completion, Publisher, Subscriber, SubscriberId, Subscription};
