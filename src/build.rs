//! Building coroutines without a native generator.
//!
//! This module provides small state machines implementing [`Coroutine`]:
//! [`from_fn`] for arbitrary closures, [`once`] and [`script`] for fixed
//! sequences of suspension points, and [`returning`] for a coroutine that finishes
//! on its first resume.

use std::collections::VecDeque;

use crate::{
    coroutine::{Coroutine, Resume},
    deferred::Outcome,
    step::Step,
    value::Value,
    yieldable::Yieldable,
};

/// Coroutine driven by a closure.
pub struct FromFn<F>(F);

impl<F> Coroutine for FromFn<F>
where
    F: FnMut(Resume) -> Step<Yieldable, Outcome> + Send,
{
    fn next(&mut self, input: Resume) -> Step<Yieldable, Outcome> {
        (self.0)(input)
    }
}

/// Create a coroutine from a closure that is called on every resume.
///
/// The closure owns the coroutine's state. Its first call receives the priming
/// `Ok(Value::Undefined)`.
///
/// ```rust
/// use codrive::prelude::*;
///
/// let mut yielded = false;
/// let mut co = from_fn(move |input| {
///     if !yielded {
///         yielded = true;
///         Step::Yielded(Yieldable::value(Value::Null))
///     } else {
///         Step::Complete(input)
///     }
/// });
/// assert!(co.resume(Value::Undefined).is_yielded());
/// assert_eq!(co.resume(Value::from(3)).unwrap_complete(), Ok(Value::from(3)));
/// ```
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(Resume) -> Step<Yieldable, Outcome> + Send,
{
    FromFn(f)
}

/// Yields one value, then completes with a function of what it was resumed with.
pub struct Once<F> {
    pending: Option<Yieldable>,
    finish: Option<F>,
}

/// Create a coroutine that yields `yielded` once and then returns `finish(resumed)`.
///
/// `finish` sees errors from the error channel too, so it decides whether to
/// recover or to raise.
pub fn once<F>(yielded: impl Into<Yieldable>, finish: F) -> Once<F>
where
    F: FnOnce(Resume) -> Outcome + Send,
{
    Once {
        pending: Some(yielded.into()),
        finish: Some(finish),
    }
}

impl<F> Coroutine for Once<F>
where
    F: FnOnce(Resume) -> Outcome + Send,
{
    fn next(&mut self, input: Resume) -> Step<Yieldable, Outcome> {
        if let Some(yielded) = self.pending.take() {
            return Step::Yielded(yielded);
        }
        match self.finish.take() {
            Some(finish) => Step::Complete(finish(input)),
            None => Step::Complete(Ok(Value::Undefined)),
        }
    }
}

/// Yields a fixed list of values in order.
///
/// Completes with the list of values it was resumed with. The first error on the
/// error channel is raised, so the script fails instead of recovering.
pub struct Script {
    queue: VecDeque<Yieldable>,
    resumed: Vec<Value>,
    started: bool,
    done: bool,
}

/// Create a [`Script`] over `items`.
///
/// ```rust
/// use codrive::prelude::*;
///
/// let mut co = script([Yieldable::value(1), Yieldable::value(2)]);
/// assert!(co.resume(Value::Undefined).is_yielded());
/// assert!(co.resume(Value::from("a")).is_yielded());
/// assert_eq!(
///     co.resume(Value::from("b")).unwrap_complete(),
///     Ok(Value::list(["a", "b"]))
/// );
/// ```
pub fn script<I>(items: I) -> Script
where
    I: IntoIterator,
    I::Item: Into<Yieldable>,
{
    Script {
        queue: items.into_iter().map(Into::into).collect(),
        resumed: Vec::new(),
        started: false,
        done: false,
    }
}

impl Coroutine for Script {
    fn next(&mut self, input: Resume) -> Step<Yieldable, Outcome> {
        if self.done {
            return Step::Complete(Ok(Value::Undefined));
        }
        if self.started {
            match input {
                Ok(value) => self.resumed.push(value),
                Err(error) => {
                    self.done = true;
                    return Step::Complete(Err(error));
                }
            }
        }
        self.started = true;

        match self.queue.pop_front() {
            Some(yielded) => Step::Yielded(yielded),
            None => {
                self.done = true;
                Step::Complete(Ok(Value::List(std::mem::take(&mut self.resumed))))
            }
        }
    }
}

/// Completes on its first resume.
pub struct Returning(Option<Outcome>);

/// Create a coroutine that immediately completes with `value`.
pub fn returning(value: impl Into<Value>) -> Returning {
    Returning(Some(Ok(value.into())))
}

/// Create a coroutine that immediately raises `outcome`'s error, or returns its value.
pub fn finishing(outcome: Outcome) -> Returning {
    Returning(Some(outcome))
}

impl Coroutine for Returning {
    fn next(&mut self, _input: Resume) -> Step<Yieldable, Outcome> {
        Step::Complete(self.0.take().unwrap_or(Ok(Value::Undefined)))
    }
}
