//! Owning wrapper around a native session handle.
//!
//! A [`Session`] is either active (holding one handle it exclusively owns) or
//! ended (holding [`JetSesid::NIL`]). `end` releases the handle mid-scope;
//! `dispose` releases it if still held and retires the wrapper, after which
//! every accessor reports [`EsentError::ObjectDisposed`]. Dropping a session
//! disposes it.

use std::mem;

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{EsentError, EsentResult};
use crate::types::{EndSessionGrbit, JetInstance, JetSesid};

const OBJECT: &str = "Session";

/// Native session bound to a running instance.
#[derive(Debug)]
pub struct Session {
    engine: Engine,
    sesid: JetSesid,
    disposed: bool,
}

impl Session {
    /// Begin a session on `instance` with empty credentials.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if no session could be acquired.
    pub fn new(engine: &Engine, instance: JetInstance) -> EsentResult<Self> {
        Self::with_credentials(engine, instance, "", "")
    }

    /// Begin a session on `instance` with the given credentials.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if no session could be acquired.
    pub fn with_credentials(
        engine: &Engine,
        instance: JetInstance,
        username: &str,
        password: &str,
    ) -> EsentResult<Self> {
        let sesid = engine.call("JetBeginSession", |api| {
            api.begin_session(instance, username, password)
        })?;
        debug!(%instance, %sesid, "session begun");
        if let Some(metrics) = engine.metrics() {
            metrics.inc_sessions_open();
        }
        Ok(Self {
            engine: engine.clone(),
            sesid,
            disposed: false,
        })
    }

    /// The held handle; [`JetSesid::NIL`] once the session has ended.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::ObjectDisposed`] after [`Session::dispose`].
    pub fn jet_sesid(&self) -> EsentResult<JetSesid> {
        if self.disposed {
            return Err(EsentError::ObjectDisposed { object: OBJECT });
        }
        Ok(self.sesid)
    }

    /// Whether the session still holds a handle and has not been disposed.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.disposed && !self.sesid.is_nil()
    }

    /// Whether [`Session::dispose`] has run.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Engine the session was acquired from.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Release the handle.
    ///
    /// The wrapper is left holding [`JetSesid::NIL`] even when the engine
    /// reports a failure, so a handle is never released twice.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::ObjectDisposed`] after [`Session::dispose`],
    /// [`EsentError::NoActiveHandle`] when the session already ended, or the
    /// engine's error from `JetEndSession`.
    pub fn end(&mut self) -> EsentResult<()> {
        if self.disposed {
            return Err(EsentError::ObjectDisposed { object: OBJECT });
        }
        if self.sesid.is_nil() {
            return Err(EsentError::NoActiveHandle { object: OBJECT });
        }
        self.release()
    }

    /// Release the handle if still held and retire the wrapper. Safe to call
    /// any number of times; only the first call does anything.
    ///
    /// # Errors
    ///
    /// Returns the engine's error from `JetEndSession`. The wrapper is disposed
    /// regardless.
    pub fn dispose(&mut self) -> EsentResult<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        if self.sesid.is_nil() {
            return Ok(());
        }
        self.release()
    }

    fn release(&mut self) -> EsentResult<()> {
        let sesid = mem::replace(&mut self.sesid, JetSesid::NIL);
        if let Some(metrics) = self.engine.metrics() {
            metrics.dec_sessions_open();
        }
        let result = self.engine.call("JetEndSession", |api| {
            api.end_session(sesid, EndSessionGrbit::NONE)
        });
        debug!(%sesid, ok = result.is_ok(), "session ended");
        result
    }
}

impl TryFrom<&Session> for JetSesid {
    type Error = EsentError;

    fn try_from(session: &Session) -> EsentResult<Self> {
        session.jet_sesid()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            warn!(error = %err, code = ?err.code(), "failed to end session during drop");
        }
    }
}
