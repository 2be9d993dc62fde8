//! Adapter between native status notifications and Rust callbacks.
//!
//! # Design
//! - The engine calls a bare function pointer on its own stack. Nothing may
//!   unwind through those frames, so every failure raised by user logic is
//!   caught at [`StatusCallbackWrapper::callback`], parked in a one-slot box
//!   and answered with [`JetErr::CALLBACK_FAILED`].
//! - The caller replays the parked failure with
//!   [`StatusCallbackWrapper::throw_saved_exception`] once the native call has
//!   returned. Panics are resumed with their original payload.
//! - Status callbacks carry no context pointer. [`StatusCallbackWrapper::registered`]
//!   installs the adapter for the current thread within a closure and
//!   [`StatusCallbackWrapper::native_callback`] returns the trampoline that
//!   dispatches to it.
//! - Abort requests on the current thread are checked before and after the
//!   user callback and always cleared before control returns to native code.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use esent_telemetry::Metrics;
use tracing::{debug, error, trace, warn};

use crate::abort::{ThreadAbort, reset_abort};
use crate::error::CallbackFailure;
use crate::ffi::{JetPfnStatus, read_snprog};
use crate::types::{JetApiPtr, JetErr, JetSesid, JetSnProgress, JetSnp, JetSnt};

type StatusFn<'a> =
    dyn FnMut(JetSesid, JetSnp, JetSnt, Option<JetSnProgress>) -> anyhow::Result<JetErr> + 'a;

thread_local! {
    static REGISTERED: Cell<*const StatusCallbackWrapper<'static>> =
        const { Cell::new(ptr::null()) };
}

enum Captured {
    Failure(CallbackFailure),
    Panic(Box<dyn Any + Send>),
}

impl Captured {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Failure(failure) => failure.kind(),
            Self::Panic(_) => "panic",
        }
    }
}

/// Wraps a user status callback so it can be handed to the native engine.
///
/// The adapter is single-threaded: it is driven by one native call stack at a
/// time and owned by the code that issued that call.
pub struct StatusCallbackWrapper<'a> {
    callback: RefCell<Box<StatusFn<'a>>>,
    saved: RefCell<Option<Captured>>,
    metrics: Option<Metrics>,
}

impl fmt::Debug for StatusCallbackWrapper<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let saved = self.saved.try_borrow().map_or(Some("<busy>"), |slot| {
            slot.as_ref().map(Captured::kind)
        });
        formatter
            .debug_struct("StatusCallbackWrapper")
            .field("saved", &saved)
            .finish_non_exhaustive()
    }
}

impl<'a> StatusCallbackWrapper<'a> {
    /// Bind a user callback.
    ///
    /// The callback receives the typed session id, notification class and type,
    /// and the progress record when the engine supplied one. Its `Ok` status is
    /// returned to the engine unchanged.
    pub fn new<F>(callback: F) -> Self
    where
        F: FnMut(JetSesid, JetSnp, JetSnt, Option<JetSnProgress>) -> anyhow::Result<JetErr> + 'a,
    {
        Self {
            callback: RefCell::new(Box::new(callback)),
            saved: RefCell::new(None),
            metrics: None,
        }
    }

    /// Count invocations and captured failures.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Raw entry point invoked with the engine's arguments.
    ///
    /// Never unwinds. Returns the callback's status on success and
    /// [`JetErr::CALLBACK_FAILED`] when the callback failed, panicked, was
    /// aborted or was re-entered.
    ///
    /// # Safety
    ///
    /// `data` must be null or satisfy the contract of [`read_snprog`] for the
    /// duration of this call.
    pub unsafe fn callback(
        &self,
        sesid: JetApiPtr,
        snp: u32,
        snt: u32,
        data: *const c_void,
    ) -> JetErr {
        // SAFETY: forwarded from the caller.
        let progress = unsafe { read_snprog(data) }.map(|record| JetSnProgress::from(&record));
        let sesid = JetSesid::from_raw(sesid);
        let (snp, snt) = (JetSnp::from(snp), JetSnt::from(snt));
        trace!(%sesid, ?snp, ?snt, ?progress, "status notification received");

        let status = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(metrics) = &self.metrics {
                metrics.inc_callback_invocation();
            }
            match self.invoke(sesid, snp, snt, progress) {
                Ok(code) => code,
                Err(captured) => self.capture(captured),
            }
        }))
        .unwrap_or(JetErr::CALLBACK_FAILED);
        trace!(%sesid, status = status.value(), "status notification answered");
        status
    }

    fn invoke(
        &self,
        sesid: JetSesid,
        snp: JetSnp,
        snt: JetSnt,
        progress: Option<JetSnProgress>,
    ) -> Result<JetErr, Captured> {
        if reset_abort() {
            debug!(%sesid, "abort pending before status callback");
            return Err(Captured::Failure(CallbackFailure::Aborted(ThreadAbort)));
        }

        let Ok(mut guard) = self.callback.try_borrow_mut() else {
            return Err(Captured::Failure(CallbackFailure::Reentered));
        };
        let callback: &mut StatusFn<'a> = &mut **guard;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(sesid, snp, snt, progress)));
        drop(guard);
        let aborted = reset_abort();

        match outcome {
            Ok(Ok(code)) if !aborted => Ok(code),
            Ok(Ok(_)) => Err(Captured::Failure(CallbackFailure::Aborted(ThreadAbort))),
            Ok(Err(err)) if aborted || err.is::<ThreadAbort>() => {
                debug!(error = %err, "status callback aborted");
                Err(Captured::Failure(CallbackFailure::Aborted(ThreadAbort)))
            }
            Ok(Err(err)) => Err(Captured::Failure(CallbackFailure::Error(err))),
            Err(payload) if aborted || payload.is::<ThreadAbort>() => {
                Err(Captured::Failure(CallbackFailure::Aborted(ThreadAbort)))
            }
            Err(payload) => Err(Captured::Panic(payload)),
        }
    }

    fn capture(&self, captured: Captured) -> JetErr {
        let kind = captured.kind();
        warn!(kind, "status callback failed; failure deferred to caller");
        if let Some(metrics) = &self.metrics {
            metrics.inc_callback_failure(kind);
        }
        match self.saved.try_borrow_mut() {
            Ok(mut slot) => {
                if let Some(previous) = slot.replace(captured) {
                    warn!(
                        previous = previous.kind(),
                        current = kind,
                        "unsurfaced status callback failure overwritten"
                    );
                }
            }
            Err(_) => error!(kind, "status callback failure slot busy; failure dropped"),
        }
        JetErr::CALLBACK_FAILED
    }

    /// Whether a failure is waiting to be surfaced.
    #[must_use]
    pub fn has_saved_exception(&self) -> bool {
        self.saved.borrow().is_some()
    }

    /// Surface the captured failure, if any, and clear the slot.
    ///
    /// A panic raised by the callback is resumed here with its original payload.
    ///
    /// # Errors
    ///
    /// Returns the captured [`CallbackFailure`].
    pub fn throw_saved_exception(&self) -> Result<(), CallbackFailure> {
        match self.saved.take() {
            None => Ok(()),
            Some(Captured::Failure(failure)) => Err(failure),
            Some(Captured::Panic(payload)) => panic::resume_unwind(payload),
        }
    }

    /// Run `scope` with this adapter installed as the target of
    /// [`Self::native_callback`] on the current thread.
    ///
    /// The previous target is restored when `scope` returns or unwinds, so
    /// registrations always nest with the call stack.
    pub fn registered<R>(&self, scope: impl FnOnce() -> R) -> R {
        let current = ptr::from_ref(self).cast::<StatusCallbackWrapper<'static>>();
        let previous = REGISTERED.with(|slot| slot.replace(current));
        trace!(nested = !previous.is_null(), "status callback registered");
        let _restore = Restore { previous };
        scope()
    }

    /// Function pointer to pass to the engine; dispatches to the adapter
    /// registered on the calling thread.
    #[must_use]
    pub fn native_callback() -> JetPfnStatus {
        trampoline
    }
}

struct Restore {
    previous: *const StatusCallbackWrapper<'static>,
}

impl Drop for Restore {
    fn drop(&mut self) {
        let _ = REGISTERED.try_with(|slot| slot.set(self.previous));
    }
}

unsafe extern "system" fn trampoline(
    sesid: JetApiPtr,
    snp: u32,
    snt: u32,
    data: *const c_void,
) -> i32 {
    let current = REGISTERED.try_with(Cell::get).unwrap_or(ptr::null());
    if current.is_null() {
        error!("status callback fired with no registered adapter");
        return JetErr::CALLBACK_FAILED.value();
    }
    // SAFETY: the pointer is installed only for the extent of a `registered`
    // scope on this thread, during which the adapter is borrowed and live; the
    // engine upholds the payload contract.
    unsafe { (*current).callback(sesid, snp, snt, data) }.value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::{is_abort_requested, request_abort};
    use crate::types::NativeSnProgress;

    fn invoke(wrapper: &StatusCallbackWrapper<'_>, snt: JetSnt, data: *const c_void) -> JetErr {
        unsafe { wrapper.callback(0x42, JetSnp::Compact.into(), snt.into(), data) }
    }

    #[test]
    fn arguments_are_converted_before_the_callback_runs() {
        let mut seen = Vec::new();
        let wrapper = StatusCallbackWrapper::new(|sesid, snp, snt, progress| {
            seen.push((sesid, snp, snt, progress));
            Ok(JetErr::SUCCESS)
        });
        let record = NativeSnProgress::new(3, 9);

        assert_eq!(
            invoke(&wrapper, JetSnt::Progress, ptr::from_ref(&record).cast()),
            JetErr::SUCCESS
        );
        assert_eq!(invoke(&wrapper, JetSnt::Begin, ptr::null()), JetErr::SUCCESS);
        drop(wrapper);

        assert_eq!(
            seen,
            vec![
                (
                    JetSesid::from_raw(0x42),
                    JetSnp::Compact,
                    JetSnt::Progress,
                    Some(JetSnProgress {
                        cunit_done: 3,
                        cunit_total: 9
                    })
                ),
                (JetSesid::from_raw(0x42), JetSnp::Compact, JetSnt::Begin, None),
            ]
        );
    }

    #[test]
    fn unknown_codes_survive_conversion() {
        let mut seen = None;
        let wrapper = StatusCallbackWrapper::new(|_, snp, snt, _| {
            seen = Some((snp, snt));
            Ok(JetErr::SUCCESS)
        });
        unsafe { wrapper.callback(1, 99, 42, ptr::null()) };
        drop(wrapper);
        assert_eq!(seen, Some((JetSnp::Unknown(99), JetSnt::Unknown(42))));
    }

    #[test]
    fn reentry_is_refused() {
        let inner = Cell::new(0);
        let wrapper = StatusCallbackWrapper::new(|_, _, _, _| {
            let callback = StatusCallbackWrapper::native_callback();
            inner.set(unsafe { callback(0x42, 4, 0, ptr::null()) });
            Ok(JetErr::SUCCESS)
        });
        let status = wrapper.registered(|| invoke(&wrapper, JetSnt::Begin, ptr::null()));

        assert_eq!(status, JetErr::SUCCESS);
        assert_eq!(JetErr::from_raw(inner.get()), JetErr::CALLBACK_FAILED);
        assert!(matches!(
            wrapper.throw_saved_exception(),
            Err(CallbackFailure::Reentered)
        ));
    }

    #[test]
    fn pending_abort_skips_the_callback_and_is_cleared() {
        let calls = Cell::new(0);
        let wrapper = StatusCallbackWrapper::new(|_, _, _, _| {
            calls.set(calls.get() + 1);
            Ok(JetErr::SUCCESS)
        });
        request_abort();

        assert_eq!(invoke(&wrapper, JetSnt::Begin, ptr::null()), JetErr::CALLBACK_FAILED);
        assert_eq!(calls.get(), 0);
        assert!(!is_abort_requested());
        assert!(matches!(
            wrapper.throw_saved_exception(),
            Err(CallbackFailure::Aborted(ThreadAbort))
        ));
    }

    #[test]
    fn trampoline_without_registration_reports_failure() {
        let callback = StatusCallbackWrapper::native_callback();
        let code = unsafe { callback(0, 4, 5, ptr::null()) };
        assert_eq!(JetErr::from_raw(code), JetErr::CALLBACK_FAILED);
    }

    #[test]
    fn registrations_nest_and_restore() {
        let outer_calls = Cell::new(0);
        let inner_calls = Cell::new(0);
        let outer = StatusCallbackWrapper::new(|_, _, _, _| {
            outer_calls.set(outer_calls.get() + 1);
            Ok(JetErr::SUCCESS)
        });
        let inner = StatusCallbackWrapper::new(|_, _, _, _| {
            inner_calls.set(inner_calls.get() + 1);
            Ok(JetErr::SUCCESS)
        });
        let callback = StatusCallbackWrapper::native_callback();

        outer.registered(|| {
            inner.registered(|| unsafe { callback(0, 4, 5, ptr::null()) });
            unsafe { callback(0, 4, 6, ptr::null()) };
        });
        let unregistered = unsafe { callback(0, 4, 6, ptr::null()) };

        assert_eq!(inner_calls.get(), 1);
        assert_eq!(outer_calls.get(), 1);
        assert_eq!(JetErr::from_raw(unregistered), JetErr::CALLBACK_FAILED);
    }

    #[test]
    fn registration_ends_when_the_scope_unwinds() {
        let calls = Cell::new(0);
        let wrapper = StatusCallbackWrapper::new(|_, _, _, _| {
            calls.set(calls.get() + 1);
            Ok(JetErr::SUCCESS)
        });
        let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
            wrapper.registered(|| panic!("scope failed"));
        }));
        assert!(unwound.is_err());

        let callback = StatusCallbackWrapper::native_callback();
        let code = unsafe { callback(0, 4, 5, ptr::null()) };
        assert_eq!(JetErr::from_raw(code), JetErr::CALLBACK_FAILED);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn notifications_are_traced_with_their_answer() {
        use std::io;
        use std::sync::{Arc, Mutex, PoisonError};

        #[derive(Clone, Default)]
        struct Capture(Arc<Mutex<Vec<u8>>>);

        impl io::Write for Capture {
            fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
                self.0
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend_from_slice(bytes);
                Ok(bytes.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let wrapper = StatusCallbackWrapper::new(|_, _, _, _| Ok(JetErr::from_raw(7)));

        tracing::subscriber::with_default(subscriber, || {
            invoke(&wrapper, JetSnt::Begin, ptr::null());
        });

        let bytes = capture.0.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let output = String::from_utf8_lossy(&bytes).into_owned();
        assert!(output.contains("status notification received"));
        assert!(output.contains("snt=Begin"));
        assert!(output.contains("status notification answered"));
        assert!(output.contains("status=7"));
    }

    #[test]
    fn callback_after_the_adapter_is_freed_finds_no_registration() {
        let wrapper = Box::new(StatusCallbackWrapper::new(|_, _, _, _| Ok(JetErr::SUCCESS)));
        wrapper.registered(|| ());
        drop(wrapper);

        let callback = StatusCallbackWrapper::native_callback();
        let code = unsafe { callback(0, 4, 5, ptr::null()) };
        assert_eq!(JetErr::from_raw(code), JetErr::CALLBACK_FAILED);
    }
}
