//! Seam between the wrappers and the native engine.
//!
//! # Design
//! - [`JetApi`] mirrors the native calls one-to-one and reports status codes as
//!   [`EsentResult`]; it is the only place wrappers touch the engine.
//! - The `esent` backend links the system library; the stub backend is an
//!   in-memory stand-in used by tests and non-Windows builds.
//! - [`Engine`] is the cloneable handle wrappers keep, carrying optional metrics.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use esent_telemetry::Metrics;
use tracing::debug;

use crate::error::{EsentError, EsentResult};
use crate::ffi::JetPfnStatus;
use crate::types::{
    CommitTransactionGrbit, CompactGrbit, EndSessionGrbit, JetInstance, JetParam, JetSesid,
    RollbackTransactionGrbit, TermGrbit,
};

#[cfg(all(windows, feature = "esent"))]
#[allow(unsafe_code)]
mod native;
#[allow(unsafe_code)]
pub mod stub;

pub use stub::StubEngine;

/// Native calls used by the interop wrappers.
///
/// Implementations must report failures as [`EsentError::Native`] carrying the
/// engine's status code.
pub trait JetApi: Send + Sync {
    /// Create a named instance (`JetCreateInstance`).
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the instance.
    fn create_instance(&self, name: &str) -> EsentResult<JetInstance>;

    /// Set a system parameter (`JetSetSystemParameter`).
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the parameter.
    fn set_system_parameter(
        &self,
        instance: JetInstance,
        sesid: JetSesid,
        param: JetParam,
        int_value: usize,
        string_value: Option<&str>,
    ) -> EsentResult<()>;

    /// Initialise an instance (`JetInit`).
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be started.
    fn init(&self, instance: JetInstance) -> EsentResult<()>;

    /// Terminate an instance (`JetTerm2`).
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be shut down.
    fn term(&self, instance: JetInstance, grbit: TermGrbit) -> EsentResult<()>;

    /// Acquire a session handle (`JetBeginSession`).
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot hand out a session.
    fn begin_session(
        &self,
        instance: JetInstance,
        username: &str,
        password: &str,
    ) -> EsentResult<JetSesid>;

    /// Release a session handle (`JetEndSession`).
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the handle.
    fn end_session(&self, sesid: JetSesid, grbit: EndSessionGrbit) -> EsentResult<()>;

    /// Open a (nested) transaction (`JetBeginTransaction`).
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    fn begin_transaction(&self, sesid: JetSesid) -> EsentResult<()>;

    /// Commit the innermost transaction (`JetCommitTransaction`).
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the commit fails.
    fn commit_transaction(&self, sesid: JetSesid, grbit: CommitTransactionGrbit)
    -> EsentResult<()>;

    /// Roll back the innermost or every transaction level (`JetRollback`).
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open.
    fn rollback(&self, sesid: JetSesid, grbit: RollbackTransactionGrbit) -> EsentResult<()>;

    /// Copy a database into a compacted destination (`JetCompact`), reporting
    /// progress through `status` on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns an error if compaction fails or the status callback reports a failure.
    fn compact(
        &self,
        sesid: JetSesid,
        source: &Path,
        destination: &Path,
        status: Option<JetPfnStatus>,
        grbit: CompactGrbit,
    ) -> EsentResult<()>;
}

/// Cloneable handle to a [`JetApi`] backend plus optional metrics.
#[derive(Clone)]
pub struct Engine {
    api: Arc<dyn JetApi>,
    metrics: Option<Metrics>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Engine")
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Wrap an existing backend.
    #[must_use]
    pub fn new(api: Arc<dyn JetApi>) -> Self {
        Self { api, metrics: None }
    }

    /// Engine backed by a fresh in-memory [`StubEngine`].
    #[must_use]
    pub fn stub() -> Self {
        Self::new(Arc::new(StubEngine::default()))
    }

    /// Engine backed by the system `esent` library.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::Unavailable`] when the crate was built without
    /// the `esent` feature or for a platform other than Windows.
    pub fn native() -> EsentResult<Self> {
        #[cfg(all(windows, feature = "esent"))]
        {
            Ok(Self::new(Arc::new(native::NativeEngine)))
        }

        #[cfg(not(all(windows, feature = "esent")))]
        {
            Err(EsentError::Unavailable {
                operation: "native engine",
            })
        }
    }

    /// Report metrics for calls made through this handle.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The backend used for native calls.
    #[must_use]
    pub fn api(&self) -> &dyn JetApi {
        self.api.as_ref()
    }

    /// Metrics attached with [`Engine::with_metrics`].
    #[must_use]
    pub const fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Run one native call, counting failures by operation.
    pub(crate) fn call<T>(
        &self,
        operation: &'static str,
        call: impl FnOnce(&dyn JetApi) -> EsentResult<T>,
    ) -> EsentResult<T> {
        let result = call(self.api.as_ref());
        if let Err(err) = &result {
            debug!(operation, error = %err, code = ?err.code(), "native call failed");
            if let Some(metrics) = &self.metrics {
                metrics.inc_native_failure(operation);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JetErr;

    #[test]
    fn native_engine_reports_availability() {
        let native = Engine::native();
        if cfg!(all(windows, feature = "esent")) {
            assert!(native.is_ok());
        } else {
            assert!(matches!(native, Err(EsentError::Unavailable { .. })));
        }
    }

    #[test]
    fn failed_calls_are_counted_per_operation() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let engine = Engine::stub().with_metrics(metrics.clone());

        let result = engine.call("end_session", |api| {
            api.end_session(JetSesid::from_raw(0xdead), EndSessionGrbit::NONE)
        });
        let err = result.expect_err("unknown session must fail");
        assert_eq!(err.code(), Some(JetErr::INVALID_SESID));
        assert_eq!(metrics.native_failures("end_session"), 1);
        Ok(())
    }
}
