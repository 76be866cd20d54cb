//! # Codrive: drive coroutines over deferred results
//!
//! Run a suspendable computation to completion by resuming it, again and again, with
//! the results of whatever it suspends on.
//!
//! ## Core Types
//!
//! - **[`Coroutine`]**: explicit state machine resumed with a value or an error,
//!   reporting a [`Step`] each time
//! - **[`Deferred`]**: result that settles exactly once, awaitable as a future
//! - **[`Yieldable`]**: everything a coroutine may suspend with: deferreds, CPS
//!   functions ([`Thunk`]), nested coroutines and [`Template`]s, sequences, mappings,
//!   and plain values
//!
//! ## Key Features
//!
//! - **Uniform waiting**: [`normalize`] turns any yieldable into one [`Deferred`]
//! - **Fan-out/fan-in**: sequences and mappings of yieldables are waited on
//!   concurrently and reassembled in their original order
//! - **Two-channel resumption**: failures are thrown back into the coroutine, which
//!   may recover, before they fail the drive
//!
//! ## Example
//!
//! ```
//! use codrive::prelude::*;
//!
//! // A CPS function reporting two results.
//! let pair = Yieldable::thunk(|_ctx, done| done.call(None, vec![Value::from("x"), Value::from("y")]));
//!
//! let co = script([pair, Yieldable::map([("n", Yieldable::from(Deferred::resolved(10)))])]);
//! let result = drive(Drivable::coroutine(co), &Context::none(), vec![]);
//!
//! assert_eq!(
//!     result.outcome(),
//!     Some(Ok(Value::list([Value::list(["x", "y"]), Value::map([("n", 10)])])))
//! );
//! ```
//!
//! ## Common Functions
//!
//! **Building coroutines:**
//! - [`from_fn`] - Coroutine from a closure
//! - [`once`] - Yield once, then finish with `f` of the resumed value
//! - [`script`] - Yield each item in order
//!
//! **Execution:**
//! - [`drive`] - Drive a coroutine or template
//! - [`wrap`] - Reusable callable over a template

pub mod build;
mod context;
mod coroutine;
mod deferred;
mod driver;
mod error;
pub mod normalize;
pub mod prelude;
mod step;
mod value;
mod yieldable;

pub use build::{FromFn, Once, Returning, Script, finishing, from_fn, once, returning, script};
pub use context::Context;
pub use coroutine::{BoxCoroutine, Coroutine, Resume};
pub use deferred::{Deferred, Outcome, Settled};
pub use driver::{Drivable, Wrapped, drive, drive_coroutine, drive_template, wrap};
pub use error::Error;
pub use normalize::{Normalized, normalize};
pub use step::Step;
pub use value::{Opaque, Value};
pub use yieldable::{Callback, Kind, Launch, Template, Thunk, Yieldable};
