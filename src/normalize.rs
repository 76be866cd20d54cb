//! Converting yielded values into [`Deferred`]s.
//!
//! [`normalize`] classifies a [`Yieldable`] and turns it into a single asynchronous
//! result. Composite shapes recurse: every element of a sequence, every value of a
//! mapping, and every nested coroutine is normalized in the same [`Context`].
//!
//! A value that cannot be waited on comes back as [`Normalized::Unresolved`]. That
//! is not an error here: inside a sequence or mapping it is simply a resolved
//! element, and only the driver decides that a bare unresolved yield is invalid.

use std::collections::HashMap;

use crate::{
    context::Context,
    deferred::{self, Deferred},
    driver,
    value::Value,
    yieldable::{Callback, Thunk, Yieldable},
};

/// Result of normalizing one yielded value.
#[derive(Debug)]
pub enum Normalized {
    Deferred(Deferred),
    /// Passed through unchanged.
    Unresolved(Value),
}

impl Normalized {
    /// Resolve pass-through values, for contexts where they count as results.
    pub fn into_deferred(self) -> Deferred {
        match self {
            Normalized::Deferred(d) => d,
            Normalized::Unresolved(v) => Deferred::resolved(v),
        }
    }
}

impl From<Deferred> for Normalized {
    fn from(deferred: Deferred) -> Self {
        Normalized::Deferred(deferred)
    }
}

/// Classify `yielded` and convert it, first match wins:
///
/// 1. falsy value: already resolved with the value itself
/// 2. deferred: returned as is
/// 3. coroutine or template: driven recursively in `ctx`
/// 4. thunk: called with `ctx` and a completion callback
/// 5. sequence: all elements joined positionally
/// 6. mapping: all values joined by key
/// 7. anything else: unresolved
pub fn normalize(yielded: Yieldable, ctx: &Context) -> Normalized {
    match yielded {
        Yieldable::Value(value) if value.is_falsy() => Deferred::resolved(value).into(),
        Yieldable::Deferred(deferred) => deferred.into(),
        Yieldable::Coroutine(coroutine) => driver::drive_coroutine(coroutine, ctx).into(),
        Yieldable::Template(template) => driver::drive_template(&template, ctx, Vec::new()).into(),
        Yieldable::Thunk(thunk) => thunk_to_deferred(thunk, ctx).into(),
        Yieldable::Seq(items) => sequence_to_deferred(items, ctx).into(),
        Yieldable::Value(Value::List(items)) => {
            sequence_to_deferred(items.into_iter().map(Yieldable::Value), ctx).into()
        }
        Yieldable::Map(entries) => mapping_to_deferred(entries, ctx).into(),
        Yieldable::Value(Value::Map(entries)) => mapping_to_deferred(
            entries.into_iter().map(|(k, v)| (k, Yieldable::Value(v))),
            ctx,
        )
        .into(),
        Yieldable::Value(other) => Normalized::Unresolved(other),
    }
}

/// Call `thunk` with a callback settling the returned deferred.
pub fn thunk_to_deferred(thunk: Thunk, ctx: &Context) -> Deferred {
    let deferred = Deferred::new();
    thunk.call(ctx.clone(), Callback::new(deferred.clone()));
    deferred
}

/// Normalize every element and join them in order.
pub fn sequence_to_deferred<I>(items: I, ctx: &Context) -> Deferred
where
    I: IntoIterator<Item = Yieldable>,
{
    Deferred::all(
        items
            .into_iter()
            .map(|item| normalize(item, ctx).into_deferred()),
    )
}

/// Normalize every value and join them under their keys.
///
/// Keys waiting on a deferred hold `undefined` until it settles, so the result keeps
/// the original key order whatever order the values arrive in. A repeated key keeps
/// its first position and its last value.
pub fn mapping_to_deferred<I>(entries: I, ctx: &Context) -> Deferred
where
    I: IntoIterator<Item = (String, Yieldable)>,
{
    let mut keys: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut slots = Vec::new();
    let mut pending = Vec::new();

    for (key, yielded) in entries {
        let index = match positions.get(&key) {
            Some(&index) => {
                pending.retain(|(i, _)| *i != index);
                index
            }
            None => {
                positions.insert(key.clone(), keys.len());
                keys.push(key);
                slots.push(Value::Undefined);
                keys.len() - 1
            }
        };
        match normalize(yielded, ctx) {
            Normalized::Deferred(d) => {
                slots[index] = Value::Undefined;
                pending.push((index, d));
            }
            Normalized::Unresolved(v) => slots[index] = v,
        }
    }

    deferred::join(slots, pending, move |values| {
        Value::Map(keys.into_iter().zip(values).collect())
    })
}
