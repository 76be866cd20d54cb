//! Single-assignment asynchronous results.
//!
//! A [`Deferred`] is a result cell plus a list of waiting continuations. It settles at
//! most once, to `Ok(value)` or `Err(error)`; every continuation registered before or
//! after that moment observes the same [`Outcome`].
//!
//! ```rust
//! use codrive::{Deferred, Value};
//!
//! let deferred = Deferred::new();
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(None));
//!
//! let sink = seen.clone();
//! deferred.on_outcome(move |outcome| *sink.lock().unwrap() = Some(outcome));
//!
//! assert!(deferred.resolve(Value::from(1)));
//! assert!(!deferred.resolve(Value::from(2))); // already settled
//! assert_eq!(*seen.lock().unwrap(), Some(Ok(Value::from(1))));
//! ```

use std::{
    fmt,
    future::{Future, IntoFuture},
    mem,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context as TaskContext, Poll},
};

use futures::task::AtomicWaker;

use crate::{error::Error, value::Value};

/// How a [`Deferred`] settled.
pub type Outcome = Result<Value, Error>;

type Continuation = Box<dyn FnOnce(Outcome) + Send>;

enum State {
    Pending(Vec<Continuation>),
    Settled(Outcome),
}

/// Handle to a result that settles exactly once.
///
/// Clones share the same cell.
#[derive(Clone)]
pub struct Deferred {
    inner: Arc<Mutex<State>>,
}

// Every critical section leaves `State` consistent, so a poisoned lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Deferred {
    /// A pending deferred.
    pub fn new() -> Self {
        Deferred {
            inner: Arc::new(Mutex::new(State::Pending(Vec::new()))),
        }
    }

    pub fn resolved(value: impl Into<Value>) -> Self {
        Self::from_outcome(Ok(value.into()))
    }

    pub fn rejected(error: impl Into<Error>) -> Self {
        Self::from_outcome(Err(error.into()))
    }

    pub fn from_outcome(outcome: Outcome) -> Self {
        Deferred {
            inner: Arc::new(Mutex::new(State::Settled(outcome))),
        }
    }

    /// Settle with `outcome`, running every waiting continuation.
    ///
    /// Returns `false`, and changes nothing, if already settled. Continuations run on
    /// the calling thread after the lock is released.
    pub fn settle(&self, outcome: Outcome) -> bool {
        let waiting = {
            let mut state = lock(&self.inner);
            match mem::replace(&mut *state, State::Settled(outcome.clone())) {
                State::Pending(waiting) => waiting,
                State::Settled(previous) => {
                    *state = State::Settled(previous);
                    return false;
                }
            }
        };

        tracing::trace!(
            ok = outcome.is_ok(),
            continuations = waiting.len(),
            "deferred settled"
        );
        for continuation in waiting {
            continuation(outcome.clone());
        }
        true
    }

    pub fn resolve(&self, value: impl Into<Value>) -> bool {
        self.settle(Ok(value.into()))
    }

    pub fn reject(&self, error: impl Into<Error>) -> bool {
        self.settle(Err(error.into()))
    }

    /// Register a continuation for the settlement.
    ///
    /// If already settled, `f` runs immediately on the calling thread.
    pub fn on_outcome<F>(&self, f: F)
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let settled = {
            let mut state = lock(&self.inner);
            match &mut *state {
                State::Pending(waiting) => {
                    waiting.push(Box::new(f));
                    return;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        f(settled);
    }

    /// Register separate success and failure continuations.
    pub fn on_settle<S, F>(&self, on_success: S, on_failure: F)
    where
        S: FnOnce(Value) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        self.on_outcome(move |outcome| match outcome {
            Ok(value) => on_success(value),
            Err(error) => on_failure(error),
        });
    }

    /// The settlement, if there is one yet.
    pub fn outcome(&self) -> Option<Outcome> {
        match &*lock(&self.inner) {
            State::Pending(_) => None,
            State::Settled(outcome) => Some(outcome.clone()),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*lock(&self.inner), State::Settled(_))
    }

    /// Whether both handles share one cell.
    pub fn same(&self, other: &Deferred) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Succeeds with every child's value in order once all succeed; fails with the
    /// first failure to settle.
    ///
    /// Children keep running after the aggregate has failed. Their results are
    /// dropped.
    pub fn all(children: impl IntoIterator<Item = Deferred>) -> Deferred {
        let pending: Vec<(usize, Deferred)> = children.into_iter().enumerate().collect();
        let slots = vec![Value::Undefined; pending.len()];
        join(slots, pending, Value::List)
    }
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*lock(&self.inner) {
            State::Pending(waiting) => f
                .debug_struct("Deferred")
                .field("pending", &waiting.len())
                .finish(),
            State::Settled(outcome) => f.debug_tuple("Deferred").field(outcome).finish(),
        }
    }
}

struct Join<F> {
    slots: Vec<Value>,
    remaining: usize,
    finish: Option<F>,
}

/// Fan `pending` children into `slots`, then build the aggregate with `finish`.
///
/// `slots` may already hold synchronous values; each pending child overwrites its
/// index when it succeeds.
pub(crate) fn join<F>(slots: Vec<Value>, pending: Vec<(usize, Deferred)>, finish: F) -> Deferred
where
    F: FnOnce(Vec<Value>) -> Value + Send + 'static,
{
    if pending.is_empty() {
        return Deferred::resolved(finish(slots));
    }

    let out = Deferred::new();
    let state = Arc::new(Mutex::new(Join {
        slots,
        remaining: pending.len(),
        finish: Some(finish),
    }));

    for (index, child) in pending {
        let state = Arc::clone(&state);
        let out = out.clone();
        child.on_outcome(move |outcome| match outcome {
            Ok(value) => {
                let ready = {
                    let mut progress = lock(&state);
                    if let Some(slot) = progress.slots.get_mut(index) {
                        *slot = value;
                    }
                    progress.remaining -= 1;
                    if progress.remaining == 0 {
                        let slots = mem::take(&mut progress.slots);
                        progress.finish.take().map(|finish| (finish, slots))
                    } else {
                        None
                    }
                };
                if let Some((finish, slots)) = ready {
                    out.resolve(finish(slots));
                }
            }
            Err(error) => {
                if !out.reject(error) {
                    tracing::trace!(index, "late sibling failure dropped");
                }
            }
        });
    }
    out
}

/// Future returned by awaiting a [`Deferred`].
pub struct Settled {
    deferred: Deferred,
    waker: Option<Arc<AtomicWaker>>,
}

impl Future for Settled {
    type Output = Outcome;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Some(outcome) = this.deferred.outcome() {
            return Poll::Ready(outcome);
        }

        match &this.waker {
            Some(waker) => waker.register(cx.waker()),
            None => {
                let waker = Arc::new(AtomicWaker::new());
                waker.register(cx.waker());
                let notify = Arc::clone(&waker);
                this.deferred.on_outcome(move |_| notify.wake());
                this.waker = Some(waker);
            }
        }

        match this.deferred.outcome() {
            Some(outcome) => Poll::Ready(outcome),
            None => Poll::Pending,
        }
    }
}

impl IntoFuture for Deferred {
    type Output = Outcome;
    type IntoFuture = Settled;

    fn into_future(self) -> Self::IntoFuture {
        Settled {
            deferred: self,
            waker: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<Outcome>>>, impl Fn() -> Continuation) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let make = move || -> Continuation {
            let sink = Arc::clone(&sink);
            Box::new(move |outcome| sink.lock().unwrap().push(outcome))
        };
        (seen, make)
    }

    #[test]
    fn test_settles_once() {
        let deferred = Deferred::new();
        let (seen, make) = recorder();
        deferred.on_outcome(make());

        assert!(deferred.reject("first"));
        assert!(!deferred.resolve(1));
        assert!(!deferred.reject("second"));

        assert_eq!(*seen.lock().unwrap(), vec![Err(Error::from("first"))]);
        assert_eq!(deferred.outcome(), Some(Err(Error::from("first"))));
    }

    #[test]
    fn test_every_registration_sees_the_settlement() {
        let deferred = Deferred::new();
        let (seen, make) = recorder();
        deferred.on_outcome(make());
        deferred.on_outcome(make());
        assert!(!deferred.is_settled());

        deferred.resolve("v");
        deferred.on_outcome(make());

        assert_eq!(*seen.lock().unwrap(), vec![Ok(Value::from("v")); 3]);
    }

    #[test]
    fn test_on_settle_routes_channels() {
        let ok = Arc::new(Mutex::new(None));
        let err = Arc::new(Mutex::new(None));
        let deferred = Deferred::rejected("nope");
        deferred.on_settle(
            {
                let ok = Arc::clone(&ok);
                move |v| *ok.lock().unwrap() = Some(v)
            },
            {
                let err = Arc::clone(&err);
                move |e| *err.lock().unwrap() = Some(e)
            },
        );
        assert_eq!(*ok.lock().unwrap(), None);
        assert_eq!(*err.lock().unwrap(), Some(Error::from("nope")));
    }

    #[test]
    fn test_continuation_may_reenter() {
        let deferred = Deferred::new();
        let inner = deferred.clone();
        let (seen, make) = recorder();
        let k = make();
        deferred.on_outcome(move |_| inner.on_outcome(k));
        deferred.resolve(5);
        assert_eq!(*seen.lock().unwrap(), vec![Ok(Value::Int(5))]);
    }

    #[test]
    fn test_all_preserves_position() {
        let a = Deferred::new();
        let b = Deferred::new();
        let joined = Deferred::all([a.clone(), b.clone(), Deferred::resolved(3)]);

        b.resolve(2);
        assert!(!joined.is_settled());
        a.resolve(1);
        assert_eq!(
            joined.outcome(),
            Some(Ok(Value::list([Value::Int(1), Value::Int(2), Value::Int(3)])))
        );
    }

    #[test]
    fn test_all_fails_on_first_failure() {
        let a = Deferred::new();
        let b = Deferred::new();
        let joined = Deferred::all([a.clone(), b.clone()]);

        b.reject("b failed");
        a.reject("a failed");
        assert_eq!(joined.outcome(), Some(Err(Error::from("b failed"))));
    }

    #[test]
    fn test_all_of_nothing_is_empty_list() {
        assert_eq!(
            Deferred::all(Vec::new()).outcome(),
            Some(Ok(Value::List(vec![])))
        );
    }

    #[test]
    fn test_await_settlement_from_another_thread() {
        let deferred = Deferred::new();
        let settler = deferred.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(10));
            settler.resolve("late");
        });

        let outcome = futures::executor::block_on(deferred.into_future());
        handle.join().unwrap();
        assert_eq!(outcome, Ok(Value::from("late")));
    }
}
