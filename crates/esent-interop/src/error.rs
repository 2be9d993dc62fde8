//! Error types for the native boundary.
//!
//! # Design
//! - Keep error messages constant; store operational context in fields.
//! - Native status codes travel inside the error so callers can branch on them.
//! - Callback failures are replayed through their own type so the original
//!   error stays downcastable.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::abort::ThreadAbort;
use crate::types::JetErr;

/// Primary error type for interop operations.
#[derive(Debug, Error)]
pub enum EsentError {
    /// A native call returned an error status.
    #[error("native engine call failed")]
    Native {
        /// Native operation that reported the failure.
        operation: &'static str,
        /// Status code returned by the engine.
        code: JetErr,
    },
    /// The wrapper was disposed and can no longer be used.
    #[error("object already released")]
    ObjectDisposed {
        /// Wrapper type that was used after release.
        object: &'static str,
    },
    /// The wrapper holds no native handle to act on.
    #[error("no active native handle")]
    NoActiveHandle {
        /// Wrapper type that had no handle.
        object: &'static str,
    },
    /// A status callback failed while the engine was running it.
    #[error("status callback failed")]
    Callback(#[from] CallbackFailure),
    /// A path could not be converted for the native engine.
    #[error("path cannot be passed to the native engine")]
    InvalidPath {
        /// Offending path.
        path: PathBuf,
    },
    /// Instance options could not be parsed.
    #[error("instance options could not be parsed")]
    InvalidOptions {
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// The native engine is not available in this build.
    #[error("native engine unavailable")]
    Unavailable {
        /// Operation that could not be serviced.
        operation: &'static str,
    },
}

impl EsentError {
    /// Native status code carried by the error, if any.
    #[must_use]
    pub const fn code(&self) -> Option<JetErr> {
        match self {
            Self::Native { code, .. } => Some(*code),
            Self::Callback(_) => Some(JetErr::CALLBACK_FAILED),
            _ => None,
        }
    }

    /// Whether the error reports use of a released wrapper.
    #[must_use]
    pub const fn is_object_disposed(&self) -> bool {
        matches!(self, Self::ObjectDisposed { .. })
    }
}

/// Failure raised by user logic inside a status callback and replayed later.
#[derive(Debug, Error)]
pub enum CallbackFailure {
    /// The callback returned an error; the original error is preserved.
    #[error("status callback returned an error")]
    Error(#[source] anyhow::Error),
    /// The callback was interrupted by a cooperative abort request.
    #[error("status callback was aborted")]
    Aborted(#[source] ThreadAbort),
    /// The engine re-entered the adapter while it was already running.
    #[error("status callback re-entered while running")]
    Reentered,
}

impl CallbackFailure {
    /// Label used when counting failures by kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::Aborted(_) => "abort",
            Self::Reentered => "reentered",
        }
    }

    /// Borrow the original error when the callback returned one of type `E`.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Error(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Convenience alias for interop results.
pub type EsentResult<T> = Result<T, EsentError>;

/// Turn a native status into a result; warnings pass through.
///
/// # Errors
///
/// Returns [`EsentError::Native`] when `code` is negative.
pub fn check(operation: &'static str, code: JetErr) -> EsentResult<JetErr> {
    if code.is_error() {
        return Err(EsentError::Native { operation, code });
    }
    if code.is_warning() {
        debug!(operation, %code, "native call returned a warning");
    }
    Ok(code)
}
