//! Commonly used imports
//!
//! Use `use codrive::prelude::*;` for quick access to the most common types and functions.

// Core types
pub use crate::{Coroutine, Deferred, Error, Outcome, Resume, Step, Value, Yieldable};

// Calling convention
pub use crate::{Context, Drivable, Launch, Template};

// Most common constructors
pub use crate::build::{from_fn, once, returning, script};

// Execution
pub use crate::driver::{drive, wrap};
