//! The calling context threaded through a drive.

use std::{any::Any, fmt, sync::Arc};

/// Receiver handed to coroutine templates, CPS functions, and nested drives.
///
/// A drive never inspects its context; it only passes the same handle along, so
/// collaborators that depend on being invoked "on" something can recover it with
/// [`Context::downcast_ref`]. Cloning is a reference count bump.
#[derive(Clone, Default)]
pub struct Context(Option<Arc<dyn Any + Send + Sync>>);

impl Context {
    pub fn new<T: Any + Send + Sync>(receiver: T) -> Self {
        Context(Some(Arc::new(receiver)))
    }

    /// An empty context.
    pub fn none() -> Self {
        Context(None)
    }

    pub fn from_arc(receiver: Arc<dyn Any + Send + Sync>) -> Self {
        Context(Some(receiver))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|r| r.downcast_ref::<T>())
    }

    /// Whether both contexts refer to the same receiver.
    pub fn same(&self, other: &Context) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => f.write_str("Context(..)"),
            None => f.write_str("Context(none)"),
        }
    }
}
