//! The shapes a coroutine may suspend with.
//!
//! [`Yieldable`] is a closed union; [`Yieldable::kind`] classifies a value the same
//! way, and in the same order, as [`normalize`](crate::normalize::normalize) does.

use std::{fmt, sync::Arc};

use crate::{
    context::Context,
    coroutine::{BoxCoroutine, Coroutine},
    deferred::{Deferred, Outcome},
    error::Error,
    value::Value,
};

/// A value a coroutine suspends with.
pub enum Yieldable {
    /// Already an asynchronous result.
    Deferred(Deferred),
    /// Continuation-passing async function.
    Thunk(Thunk),
    /// Already started coroutine, driven as a nested drive.
    Coroutine(BoxCoroutine),
    /// Coroutine factory, started with no arguments and driven as a nested drive.
    Template(Template),
    /// Ordered sequence, joined positionally.
    Seq(Vec<Yieldable>),
    /// Keyed mapping, joined by key.
    Map(Vec<(String, Yieldable)>),
    /// Plain value. Falsy values and plain containers resolve; anything else is
    /// not something a coroutine can wait on.
    Value(Value),
}

/// Classification of a [`Yieldable`], first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Falsy,
    Deferred,
    Coroutine,
    Template,
    Thunk,
    Sequence,
    Mapping,
    /// Truthy scalar or opaque object.
    Other,
}

impl Yieldable {
    pub fn value(value: impl Into<Value>) -> Self {
        Yieldable::Value(value.into())
    }

    pub fn coroutine<C: Coroutine + 'static>(coroutine: C) -> Self {
        Yieldable::Coroutine(Box::new(coroutine))
    }

    /// Wrap a CPS function that is handed the drive's context and a completion
    /// callback.
    pub fn thunk<F>(f: F) -> Self
    where
        F: FnOnce(Context, Callback) + Send + 'static,
    {
        Yieldable::Thunk(Thunk::new(f))
    }

    pub fn seq<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Yieldable>,
    {
        Yieldable::Seq(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, Y>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Y)>,
        K: Into<String>,
        Y: Into<Yieldable>,
    {
        Yieldable::Map(
            entries
                .into_iter()
                .map(|(k, y)| (k.into(), y.into()))
                .collect(),
        )
    }

    pub fn kind(&self) -> Kind {
        match self {
            Yieldable::Value(v) if v.is_falsy() => Kind::Falsy,
            Yieldable::Deferred(_) => Kind::Deferred,
            Yieldable::Coroutine(_) => Kind::Coroutine,
            Yieldable::Template(_) => Kind::Template,
            Yieldable::Thunk(_) => Kind::Thunk,
            Yieldable::Seq(_) | Yieldable::Value(Value::List(_)) => Kind::Sequence,
            Yieldable::Map(_) | Yieldable::Value(Value::Map(_)) => Kind::Mapping,
            Yieldable::Value(_) => Kind::Other,
        }
    }
}

impl fmt::Debug for Yieldable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yieldable::Deferred(d) => f.debug_tuple("Deferred").field(d).finish(),
            Yieldable::Thunk(_) => f.write_str("Thunk(..)"),
            Yieldable::Coroutine(_) => f.write_str("Coroutine(..)"),
            Yieldable::Template(_) => f.write_str("Template(..)"),
            Yieldable::Seq(items) => f.debug_tuple("Seq").field(items).finish(),
            Yieldable::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
            Yieldable::Value(v) => f.debug_tuple("Value").field(v).finish(),
        }
    }
}

impl From<Value> for Yieldable {
    fn from(value: Value) -> Self {
        Yieldable::Value(value)
    }
}

impl From<Deferred> for Yieldable {
    fn from(deferred: Deferred) -> Self {
        Yieldable::Deferred(deferred)
    }
}

impl From<Thunk> for Yieldable {
    fn from(thunk: Thunk) -> Self {
        Yieldable::Thunk(thunk)
    }
}

impl From<Template> for Yieldable {
    fn from(template: Template) -> Self {
        Yieldable::Template(template)
    }
}

impl From<BoxCoroutine> for Yieldable {
    fn from(coroutine: BoxCoroutine) -> Self {
        Yieldable::Coroutine(coroutine)
    }
}

impl From<Vec<Yieldable>> for Yieldable {
    fn from(items: Vec<Yieldable>) -> Self {
        Yieldable::Seq(items)
    }
}

/// A function taking a single `(error, ...results)` completion callback.
pub struct Thunk(Box<dyn FnOnce(Context, Callback) + Send>);

impl Thunk {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Context, Callback) + Send + 'static,
    {
        Thunk(Box::new(f))
    }

    pub(crate) fn call(self, ctx: Context, callback: Callback) {
        (self.0)(ctx, callback)
    }
}

/// Completion callback handed to a [`Thunk`].
///
/// Consumed on use, so it fires at most once. Dropping it uncalled leaves the
/// awaiting drive suspended forever.
pub struct Callback {
    deferred: Option<Deferred>,
}

impl Callback {
    pub(crate) fn new(deferred: Deferred) -> Self {
        Callback {
            deferred: Some(deferred),
        }
    }

    /// Complete with an `(error, ...results)` pair.
    ///
    /// An error fails, except a rejection whose reason is falsy (`null`, `0`, ...),
    /// which counts as no error. Otherwise no result settles `undefined`, a single
    /// result settles that value, and several settle the list of them in order.
    pub fn call(mut self, error: Option<Error>, results: Vec<Value>) {
        let outcome = match error {
            Some(Error::Rejected(reason)) if reason.is_falsy() => Ok(collect(results)),
            Some(error) => Err(error),
            None => Ok(collect(results)),
        };
        if let Some(deferred) = self.deferred.take() {
            deferred.settle(outcome);
        }
    }

    /// Shorthand for `call(None, vec![value])`.
    pub fn ok(self, value: impl Into<Value>) {
        self.call(None, vec![value.into()])
    }

    /// Shorthand for `call(Some(error), vec![])`.
    pub fn err(self, error: impl Into<Error>) {
        self.call(Some(error.into()), Vec::new())
    }

    /// Complete from an [`Outcome`].
    pub fn done(self, outcome: Outcome) {
        match outcome {
            Ok(value) => self.ok(value),
            Err(error) => self.err(error),
        }
    }
}

impl Drop for Callback {
    fn drop(&mut self) {
        if self.deferred.is_some() {
            tracing::warn!("completion callback dropped without being called");
        }
    }
}

fn collect(mut results: Vec<Value>) -> Value {
    if results.len() > 1 {
        Value::List(results)
    } else {
        results.pop().unwrap_or_default()
    }
}

/// What invoking a [`Template`] produces.
pub enum Launch {
    Coroutine(BoxCoroutine),
    /// Not a coroutine; a drive of it succeeds immediately with this value.
    Value(Value),
}

impl Launch {
    pub fn coroutine<C: Coroutine + 'static>(coroutine: C) -> Self {
        Launch::Coroutine(Box::new(coroutine))
    }
}

impl From<Value> for Launch {
    fn from(value: Value) -> Self {
        Launch::Value(value)
    }
}

impl From<BoxCoroutine> for Launch {
    fn from(coroutine: BoxCoroutine) -> Self {
        Launch::Coroutine(coroutine)
    }
}

type Factory = dyn Fn(&Context, Vec<Value>) -> Launch + Send + Sync;

/// Callable returning a fresh coroutine on every call.
#[derive(Clone)]
pub struct Template(Arc<Factory>);

impl Template {
    /// A template whose every invocation starts a new coroutine.
    pub fn new<F, C>(f: F) -> Self
    where
        F: Fn(&Context, Vec<Value>) -> C + Send + Sync + 'static,
        C: Coroutine + 'static,
    {
        Template(Arc::new(move |ctx: &Context, args: Vec<Value>| {
            Launch::coroutine(f(ctx, args))
        }))
    }

    /// A template that may produce something other than a coroutine.
    pub fn launcher<F>(f: F) -> Self
    where
        F: Fn(&Context, Vec<Value>) -> Launch + Send + Sync + 'static,
    {
        Template(Arc::new(f))
    }

    pub fn launch(&self, ctx: &Context, args: Vec<Value>) -> Launch {
        (self.0)(ctx, args)
    }

    /// Whether both handles share one factory.
    pub fn same(&self, other: &Template) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Template(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::returning;

    struct Handle;

    fn settle_with(error: Option<Error>, results: Vec<Value>) -> Option<Outcome> {
        let deferred = Deferred::new();
        Callback::new(deferred.clone()).call(error, results);
        deferred.outcome()
    }

    #[test]
    fn test_kind_order() {
        assert_eq!(Yieldable::value(0).kind(), Kind::Falsy);
        assert_eq!(Yieldable::value("").kind(), Kind::Falsy);
        assert_eq!(Yieldable::from(Deferred::new()).kind(), Kind::Deferred);
        assert_eq!(Yieldable::coroutine(returning(Value::Null)).kind(), Kind::Coroutine);
        assert_eq!(
            Yieldable::from(Template::new(|_, _| returning(Value::Null))).kind(),
            Kind::Template
        );
        assert_eq!(Yieldable::thunk(|_, cb| cb.ok(1)).kind(), Kind::Thunk);
        assert_eq!(Yieldable::seq(Vec::<Yieldable>::new()).kind(), Kind::Sequence);
        assert_eq!(Yieldable::value(Value::list([1, 2])).kind(), Kind::Sequence);
        assert_eq!(Yieldable::value(Value::map([("a", 1)])).kind(), Kind::Mapping);
        assert_eq!(Yieldable::value(7).kind(), Kind::Other);
        assert_eq!(Yieldable::value(Value::object(Handle)).kind(), Kind::Other);
    }

    #[test]
    fn test_callback_result_arity() {
        assert_eq!(settle_with(None, vec![]), Some(Ok(Value::Undefined)));
        assert_eq!(settle_with(None, vec![Value::from("x")]), Some(Ok(Value::from("x"))));
        assert_eq!(
            settle_with(None, vec![Value::from("x"), Value::from("y")]),
            Some(Ok(Value::list(["x", "y"])))
        );
        assert_eq!(
            settle_with(Some(Error::from("bad")), vec![Value::from("ignored")]),
            Some(Err(Error::from("bad")))
        );
    }

    #[test]
    fn test_falsy_rejection_reason_is_not_an_error() {
        assert_eq!(
            settle_with(Some(Error::Rejected(Value::Null)), vec![Value::Int(1)]),
            Some(Ok(Value::Int(1)))
        );
        assert_eq!(
            settle_with(Some(Error::Rejected(Value::Int(0))), vec![]),
            Some(Ok(Value::Undefined))
        );
        assert_eq!(
            settle_with(Some(Error::Rejected(Value::from("EBUSY"))), vec![]),
            Some(Err(Error::Rejected(Value::from("EBUSY"))))
        );
    }

    #[test]
    fn test_dropped_callback_leaves_pending() {
        let deferred = Deferred::new();
        drop(Callback::new(deferred.clone()));
        assert!(!deferred.is_settled());
    }

    #[test]
    fn test_template_launches_fresh_value() {
        let template = Template::launcher(|_, args| Launch::Value(Value::List(args)));
        match template.launch(&Context::none(), vec![Value::Int(1)]) {
            Launch::Value(v) => assert_eq!(v, Value::list([1])),
            Launch::Coroutine(_) => panic!("expected a plain value"),
        }
        assert!(template.same(&template.clone()));
    }
}
