//! # arbor_reactive
//!
//! Change notification primitives used by the arbor binding engine.
//!
//! - [`Notifier`] is a multi-subscriber, synchronous change channel.
//! - [`Subscription`] is the handle returned by [`Notifier::subscribe`]; dropping it unsubscribes.
//! - [`Property`] is a `Copy` handle to a value that fires its notifier on every write.
//! - [`Scope`] owns notifiers and properties so they can be disposed together.
//!
//! All state lives in a thread local [`Runtime`]. Handles are `Copy` and cheap,
//! but they are only meaningful on the thread that created them.
//!
//! ```rust
//! use std::{cell::Cell, rc::Rc};
//! use arbor_reactive::Property;
//!
//! let health = Property::new(75.0_f64);
//! let seen = Rc::new(Cell::new(0.0));
//! let subscription = health.notifier().subscribe({
//!     let seen = seen.clone();
//!     move || seen.set(health.get())
//! });
//!
//! health.set(42.5);
//! assert_eq!(seen.get(), 42.5);
//!
//! drop(subscription);
//! health.set(10.0);
//! assert_eq!(seen.get(), 42.5);
//! ```

mod id;
mod notifier;
mod property;
mod runtime;
mod scope;

pub use notifier::{Notifier, Subscription};
pub use property::Property;
pub use runtime::Runtime;
pub use scope::Scope;
