//! External stimuli fed into a workflow.
//!
//! Inputs are validated by the concrete flow before they reach the engine;
//! the engine only identifies them by kind and lets edges downcast to the
//! concrete type. Capability interfaces ("has a login id", "has a code")
//! are plain accessor traits implemented by the relevant input types; an
//! edge downcasts first, then uses the accessor.

use std::any::Any;
use std::fmt;

/// Upcast helper so trait objects can be downcast to concrete types.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub trait Input: AsAny + Send + Sync + 'static {
    /// Unique string discriminator for this input type.
    fn kind(&self) -> &'static str;
}

// The payload may hold secrets (codes, passwords); only the kind renders.
impl fmt::Debug for dyn Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Input").field(&self.kind()).finish()
    }
}

/// Downcast an optional input to a concrete input type.
///
/// `None` (the empty input fed to a fresh workflow) never matches, so edges
/// that require input reject it as incompatible for free.
#[must_use]
pub fn input_as<'a, T: Input>(input: Option<&'a dyn Input>) -> Option<&'a T> {
    input.and_then(|i| i.as_any().downcast_ref::<T>())
}
