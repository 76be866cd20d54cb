//! The coroutine contract.
//!
//! A [`Coroutine`] is an explicit state machine standing in for a native generator.
//! Each call to [`Coroutine::next`] resumes it with either a value or an error and
//! reports the next [`Step`]: a [`Yieldable`] to wait on, or the final [`Outcome`].
//!
//! # Examples
//!
//! ```rust
//! use codrive::prelude::*;
//!
//! // Yield one deferred, then return twice what it resolved to.
//! let mut co = once(Deferred::resolved(21), |resumed| {
//!     Ok(Value::from(resumed?.as_i64().unwrap_or(0) * 2))
//! });
//!
//! assert!(co.resume(Value::Undefined).is_yielded());
//! assert_eq!(co.resume(Value::from(21)).unwrap_complete(), Ok(Value::from(42)));
//! ```

use crate::{
    deferred::Outcome,
    error::Error,
    step::Step,
    value::Value,
    yieldable::Yieldable,
};

/// What a coroutine is resumed with: `Ok` through the value channel, `Err` through
/// the error channel.
pub type Resume = Result<Value, Error>;

/// Boxed coroutine, as held by the driver and by [`Yieldable::Coroutine`].
pub type BoxCoroutine = Box<dyn Coroutine>;

/// A suspendable computation resumable with a value or an error.
///
/// Returning `Step::Complete(Err(e))` is how a coroutine raises `e`: the driver
/// fails the whole drive with it. Once a coroutine has completed, the driver never
/// resumes it again.
pub trait Coroutine: Send {
    /// Resume with `input` and run to the next suspension point or to completion.
    fn next(&mut self, input: Resume) -> Step<Yieldable, Outcome>;

    /// Resume through the value channel.
    fn resume(&mut self, value: Value) -> Step<Yieldable, Outcome> {
        self.next(Ok(value))
    }

    /// Resume through the error channel, giving the coroutine a chance to recover.
    fn resume_with_error(&mut self, error: Error) -> Step<Yieldable, Outcome> {
        self.next(Err(error))
    }

    fn boxed(self) -> BoxCoroutine
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

impl<C> Coroutine for Box<C>
where
    C: Coroutine + ?Sized,
{
    fn next(&mut self, input: Resume) -> Step<Yieldable, Outcome> {
        (**self).next(input)
    }
}
