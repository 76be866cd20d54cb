//! Driving coroutines to completion.
//!
//! [`drive`] resumes a coroutine, normalizes what it yields, waits for the resulting
//! [`Deferred`] and resumes again with its value, or with its error through the
//! error channel, until the coroutine completes. The returned [`Deferred`] settles
//! with the coroutine's final outcome.
//!
//! The loop is a trampoline: yields that are already settled are fed straight back
//! without growing the stack, and the loop only suspends on a pending deferred. The
//! coroutine is moved into the continuation registered on that deferred, so the
//! drive carries no shared state and resumes on whichever thread settles it.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    context::Context,
    coroutine::{BoxCoroutine, Coroutine, Resume},
    deferred::Deferred,
    error::Error,
    normalize::{Normalized, normalize},
    step::Step,
    value::Value,
    yieldable::{Launch, Template},
};

static NEXT_DRIVE_ID: AtomicU64 = AtomicU64::new(0);

/// Something [`drive`] can start.
pub enum Drivable {
    Coroutine(BoxCoroutine),
    Template(Template),
    /// Not a coroutine; the drive succeeds with it immediately.
    Value(Value),
}

impl Drivable {
    pub fn coroutine<C: Coroutine + 'static>(coroutine: C) -> Self {
        Drivable::Coroutine(Box::new(coroutine))
    }
}

impl From<BoxCoroutine> for Drivable {
    fn from(coroutine: BoxCoroutine) -> Self {
        Drivable::Coroutine(coroutine)
    }
}

impl From<Template> for Drivable {
    fn from(template: Template) -> Self {
        Drivable::Template(template)
    }
}

impl From<&Template> for Drivable {
    fn from(template: &Template) -> Self {
        Drivable::Template(template.clone())
    }
}

impl From<Value> for Drivable {
    fn from(value: Value) -> Self {
        Drivable::Value(value)
    }
}

/// Drive `target` to completion in `ctx`.
///
/// A template is first invoked with `ctx` and `args`; `args` is ignored otherwise.
///
/// ```rust
/// use codrive::prelude::*;
///
/// let template = Template::new(|_, args| {
///     let n = args.first().and_then(Value::as_i64).unwrap_or(0);
///     once(Deferred::resolved(n), |resumed| resumed.map(|v| Value::list([v, Value::from("done")])))
/// });
///
/// let result = drive(&template, &Context::none(), vec![Value::from(7)]);
/// assert_eq!(result.outcome(), Some(Ok(Value::list([Value::from(7), Value::from("done")]))));
/// ```
pub fn drive(target: impl Into<Drivable>, ctx: &Context, args: Vec<Value>) -> Deferred {
    match target.into() {
        Drivable::Coroutine(coroutine) => drive_coroutine(coroutine, ctx),
        Drivable::Template(template) => drive_template(&template, ctx, args),
        Drivable::Value(value) => Deferred::resolved(value),
    }
}

/// Invoke `template` and drive what it launches.
pub fn drive_template(template: &Template, ctx: &Context, args: Vec<Value>) -> Deferred {
    match template.launch(ctx, args) {
        Launch::Coroutine(coroutine) => drive_coroutine(coroutine, ctx),
        Launch::Value(value) => {
            tracing::debug!(%value, "template launched a plain value");
            Deferred::resolved(value)
        }
    }
}

/// Drive an already started coroutine.
pub fn drive_coroutine(coroutine: BoxCoroutine, ctx: &Context) -> Deferred {
    let id = NEXT_DRIVE_ID.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(drive = id, "starting drive");

    let result = Deferred::new();
    let drive = Drive {
        id,
        coroutine,
        ctx: ctx.clone(),
        result: result.clone(),
    };
    drive.run(Ok(Value::Undefined));
    result
}

struct Drive {
    id: u64,
    coroutine: BoxCoroutine,
    ctx: Context,
    result: Deferred,
}

impl Drive {
    fn run(mut self, mut input: Resume) {
        loop {
            let yielded = match self.coroutine.next(input) {
                Step::Yielded(yielded) => yielded,
                Step::Complete(outcome) => {
                    match &outcome {
                        Ok(_) => tracing::debug!(drive = self.id, "drive complete"),
                        Err(error) => tracing::debug!(drive = self.id, %error, "drive failed"),
                    }
                    self.result.settle(outcome);
                    return;
                }
            };

            tracing::trace!(drive = self.id, kind = ?yielded.kind(), "coroutine yielded");
            input = match normalize(yielded, &self.ctx) {
                Normalized::Deferred(deferred) => match deferred.outcome() {
                    Some(outcome) => outcome,
                    None => {
                        tracing::trace!(drive = self.id, "suspended");
                        deferred.on_outcome(move |outcome| self.run(outcome));
                        return;
                    }
                },
                Normalized::Unresolved(value) => {
                    let error = Error::invalid_yieldable(&value);
                    tracing::warn!(drive = self.id, %error, "injecting error into coroutine");
                    Err(error)
                }
            };
        }
    }
}

/// A template bound into a reusable callable.
///
/// Every [`call`](Wrapped::call) starts a fresh drive of the template.
#[derive(Clone, Debug)]
pub struct Wrapped {
    template: Template,
}

/// Turn `template` into a callable returning a [`Deferred`] per call.
pub fn wrap(template: Template) -> Wrapped {
    Wrapped { template }
}

impl Wrapped {
    pub fn call(&self, ctx: &Context, args: Vec<Value>) -> Deferred {
        drive_template(&self.template, ctx, args)
    }

    /// The wrapped template.
    pub fn template(&self) -> &Template {
        &self.template
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::build::{from_fn, once, returning, script};
    use crate::yieldable::Yieldable;

    struct Lamp;

    #[test]
    fn test_resolved_yields_complete_synchronously() {
        let co = script([
            Yieldable::from(Deferred::resolved(1)),
            Yieldable::from(Deferred::resolved(2)),
        ]);
        let result = drive(Drivable::coroutine(co), &Context::none(), vec![]);
        assert_eq!(result.outcome(), Some(Ok(Value::list([1, 2]))));
    }

    #[test]
    fn test_many_synchronous_yields_do_not_grow_the_stack() {
        let items = (0..100_000).map(|i| Yieldable::from(Deferred::resolved(i)));
        let result = drive(Drivable::coroutine(script(items)), &Context::none(), vec![]);
        let len = result
            .outcome()
            .and_then(Result::ok)
            .and_then(|v| v.as_list().map(<[Value]>::len));
        assert_eq!(len, Some(100_000));
    }

    #[test]
    fn test_suspends_until_settled() {
        let gate = Deferred::new();
        let co = once(gate.clone(), |resumed| resumed);
        let result = drive(Drivable::coroutine(co), &Context::none(), vec![]);

        assert!(!result.is_settled());
        gate.resolve("open");
        assert_eq!(result.outcome(), Some(Ok(Value::from("open"))));
    }

    #[test]
    fn test_invalid_yield_is_injected_and_recoverable() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let co = once(Value::object(Lamp), move |resumed| {
            *sink.lock().unwrap() = resumed.as_ref().err().cloned();
            Ok(Value::from("recovered"))
        });

        let result = drive(Drivable::coroutine(co), &Context::none(), vec![]);
        assert_eq!(result.outcome(), Some(Ok(Value::from("recovered"))));
        assert_eq!(
            *seen.lock().unwrap(),
            Some(Error::InvalidYieldable {
                value: "[object Lamp]".into()
            })
        );
    }

    #[test]
    fn test_invalid_yield_uncaught_fails_drive() {
        let co = script([Yieldable::value(42)]);
        let result = drive(Drivable::coroutine(co), &Context::none(), vec![]);
        assert_eq!(
            result.outcome(),
            Some(Err(Error::InvalidYieldable { value: "42".into() }))
        );
    }

    #[test]
    fn test_never_resumed_after_completion() {
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let co = from_fn(move |_input| {
            *counter.lock().unwrap() += 1;
            Step::Complete(Ok(Value::Null))
        });

        let result = drive(Drivable::coroutine(co), &Context::none(), vec![]);
        assert_eq!(result.outcome(), Some(Ok(Value::Null)));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_plain_values_and_value_templates_resolve_immediately() {
        let ctx = Context::none();
        assert_eq!(drive(Value::Int(3), &ctx, vec![]).outcome(), Some(Ok(Value::Int(3))));

        let template = Template::launcher(|_, _| Launch::Value(Value::from("plain")));
        assert_eq!(
            drive(template, &ctx, vec![]).outcome(),
            Some(Ok(Value::from("plain")))
        );
    }

    #[test]
    fn test_template_receives_context_and_args() {
        let template = Template::new(|ctx, args| {
            let name = ctx.downcast_ref::<&str>().copied().unwrap_or("?");
            returning(Value::list([Value::from(name), Value::List(args)]))
        });
        let result = drive(&template, &Context::new("svc"), vec![Value::Int(1)]);
        assert_eq!(
            result.outcome(),
            Some(Ok(Value::list([Value::from("svc"), Value::list([1])])))
        );
    }

    #[test]
    fn test_wrap_is_reusable() {
        let wrapped = wrap(Template::new(|_, args| {
            returning(args.into_iter().next().unwrap_or_default())
        }));
        let ctx = Context::none();
        assert_eq!(wrapped.call(&ctx, vec![Value::Int(1)]).outcome(), Some(Ok(Value::Int(1))));
        assert_eq!(wrapped.call(&ctx, vec![Value::Int(2)]).outcome(), Some(Ok(Value::Int(2))));

        let again = wrap(wrapped.template().clone());
        assert!(again.template().same(wrapped.template()));
    }
}
