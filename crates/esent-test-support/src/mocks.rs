//! Status callbacks that record what the engine delivered.

use std::cell::RefCell;
use std::error::Error;
use std::fmt;

use esent_interop::{JetErr, JetSesid, JetSnProgress, JetSnp, JetSnt};

/// One notification as the user callback saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    /// Session the notification was raised on.
    pub sesid: JetSesid,
    /// Notification class.
    pub snp: JetSnp,
    /// Notification type.
    pub snt: JetSnt,
    /// Progress record, when one was supplied.
    pub progress: Option<JetSnProgress>,
}

/// Error returned by a [`RecordingCallback`] configured to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackFault {
    /// Notification type that triggered the failure.
    pub snt: JetSnt,
}

impl fmt::Display for CallbackFault {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "recording callback failed on {:?}", self.snt)
    }
}

impl Error for CallbackFault {}

/// Records every notification and answers with a fixed status.
#[derive(Debug)]
pub struct RecordingCallback {
    seen: RefCell<Vec<Notification>>,
    status: JetErr,
    fail_on: Option<JetSnt>,
}

impl Default for RecordingCallback {
    fn default() -> Self {
        Self::returning(JetErr::SUCCESS)
    }
}

impl RecordingCallback {
    /// Callback answering every notification with `status`.
    #[must_use]
    pub const fn returning(status: JetErr) -> Self {
        Self {
            seen: RefCell::new(Vec::new()),
            status,
            fail_on: None,
        }
    }

    /// Callback returning a [`CallbackFault`] for notifications of type `snt`.
    #[must_use]
    pub const fn failing_on(snt: JetSnt) -> Self {
        Self {
            seen: RefCell::new(Vec::new()),
            status: JetErr::SUCCESS,
            fail_on: Some(snt),
        }
    }

    /// Closure to hand to `StatusCallbackWrapper::new`.
    pub fn callback(
        &self,
    ) -> impl FnMut(JetSesid, JetSnp, JetSnt, Option<JetSnProgress>) -> anyhow::Result<JetErr> + '_
    {
        move |sesid, snp, snt, progress| {
            self.seen.borrow_mut().push(Notification {
                sesid,
                snp,
                snt,
                progress,
            });
            if self.fail_on == Some(snt) {
                return Err(CallbackFault { snt }.into());
            }
            Ok(self.status)
        }
    }

    /// Notifications seen so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.borrow().clone()
    }

    /// Number of notifications seen so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.seen.borrow().len()
    }
}
