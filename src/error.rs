//! error taxonomy for the query/cursor core.
//!
//! mirrors `xitca-postgres`'s approach: a single public [`Error`] type erases a boxed
//! `std::error::Error`, and callers that need to branch on a specific failure downcast
//! against one of the small marker types below instead of matching an enum.

use core::fmt;
use std::error;

/// public facing error type.
///
/// for typed error handling, downcast against one of the marker types in this module, e.g.
/// [`CursorCapExceeded`] or [`NoIndex`].
///
/// # Examples
/// ```
/// use ft_query_core::error::{CursorCapExceeded, Error};
///
/// fn is_cursor_cap(e: &Error) -> bool {
///     e.downcast_ref::<CursorCapExceeded>().is_some()
/// }
/// ```
pub struct Error(Box<dyn error::Error + Send + Sync>);

impl Error {
    fn new(e: impl error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(e))
    }

    pub fn downcast_ref<E: error::Error + 'static>(&self) -> Option<&E> {
        (*self.0).downcast_ref::<E>()
    }

    /// true when this error indicates the pipeline stage itself failed at `Next`, as opposed
    /// to a build/argument/registry error.
    pub fn is_runtime(&self) -> bool {
        self.downcast_ref::<RuntimeError>().is_some()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.0.source()
    }
}

macro_rules! marker_error {
    ($(#[$meta:meta])* $name:ident, $msg:expr) => {
        $(#[$meta])*
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
        pub struct $name;

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str($msg)
            }
        }

        impl error::Error for $name {}

        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::new(e)
            }
        }
    };
}

marker_error!(
    /// a command was invoked with fewer arguments than its minimum.
    WrongArity,
    "wrong number of arguments"
);
marker_error!(
    /// the named index does not exist at context-open time.
    NoIndex,
    "no such index"
);
marker_error!(
    /// the registry refused to reserve a cursor because the owning index is at capacity.
    CursorCapExceeded,
    "too many cursors allocated for this index"
);
marker_error!(
    /// a `CURSOR READ`/`DEL` referenced an id the registry has no record of.
    CursorNotFound,
    "Cursor not found"
);
marker_error!(
    /// a `CURSOR DEL` referenced an id that has already been disposed.
    CursorAlreadyGone,
    "Cursor does not exist"
);
marker_error!(
    /// a `CURSOR DEL` referenced a cursor that is currently leased to another caller.
    CursorBusy,
    "cursor is currently in use"
);
marker_error!(
    /// argv[3] could not be parsed as a signed 64-bit cursor id.
    BadCursorId,
    "Bad cursor ID"
);
marker_error!(
    /// argv[5] could not be parsed as a COUNT, or argv[4] was not the literal keyword COUNT.
    BadCount,
    "Bad value for COUNT"
);
marker_error!(
    /// the `CURSOR` subcommand letter did not match R/D/G.
    UnknownSubcommand,
    "Unknown subcommand"
);

/// schema/lookup mismatch discovered while applying context to a compiled plan: a stage or
/// arrange step referenced an [`crate::row::RLookupKeyId`] that the request's [`crate::row::RLookup`]
/// scope never defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextError {
    pub(crate) key: crate::row::RLookupKeyId,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lookup key {:?} not defined in request scope", self.key)
    }
}

impl error::Error for ContextError {}

impl From<ContextError> for Error {
    fn from(e: ContextError) -> Self {
        Error::new(e)
    }
}

/// a pipeline stage failed during `Next`. carries the stage's own message since the real
/// failure (scoring function trapped, group reducer overflow, and so on) is domain specific.
#[derive(Debug, Clone)]
pub struct RuntimeError(pub(crate) String);

impl RuntimeError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline runtime error: {}", self.0)
    }
}

impl error::Error for RuntimeError {}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::new(e)
    }
}
