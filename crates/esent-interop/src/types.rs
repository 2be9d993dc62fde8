//! Strongly typed JET values exchanged with the native engine.
//!
//! Handles and status codes are thin `#[repr(transparent)]` wrappers so they can
//! cross the boundary unchanged, while notification codes keep any value the
//! engine sends, including ones this layer has no name for.

use std::fmt::{self, Display, Formatter};

/// Raw representation of `JET_API_PTR` handles.
pub type JetApiPtr = usize;

/// Native session handle (`JET_SESID`).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JetSesid(JetApiPtr);

impl JetSesid {
    /// Sentinel value meaning "no session".
    pub const NIL: Self = Self(0);

    /// Wrap a raw handle value received from the engine.
    #[must_use]
    pub const fn from_raw(value: JetApiPtr) -> Self {
        Self(value)
    }

    /// Raw handle value passed to native calls.
    #[must_use]
    pub const fn value(self) -> JetApiPtr {
        self.0
    }

    /// Whether this is the nil sentinel.
    #[must_use]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl Display for JetSesid {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "JET_SESID(0x{:x})", self.0)
    }
}

/// Native instance handle (`JET_INSTANCE`).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JetInstance(JetApiPtr);

impl JetInstance {
    /// Sentinel value meaning "no instance".
    pub const NIL: Self = Self(0);

    /// Wrap a raw handle value received from the engine.
    #[must_use]
    pub const fn from_raw(value: JetApiPtr) -> Self {
        Self(value)
    }

    /// Raw handle value passed to native calls.
    #[must_use]
    pub const fn value(self) -> JetApiPtr {
        self.0
    }

    /// Whether this is the nil sentinel.
    #[must_use]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }
}

impl Display for JetInstance {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "JET_INSTANCE(0x{:x})", self.0)
    }
}

/// Status code returned by native calls and status callbacks (`JET_ERR`).
///
/// Negative values are errors, positive values are warnings.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct JetErr(i32);

impl JetErr {
    /// `JET_errSuccess`.
    pub const SUCCESS: Self = Self(0);
    /// `JET_errInvalidParameter`.
    pub const INVALID_PARAMETER: Self = Self(-1003);
    /// `JET_errInvalidPath`.
    pub const INVALID_PATH: Self = Self(-1023);
    /// `JET_errNotInitialized`.
    pub const NOT_INITIALIZED: Self = Self(-1029);
    /// `JET_errAlreadyInitialized`.
    pub const ALREADY_INITIALIZED: Self = Self(-1030);
    /// `JET_errNotInTransaction`.
    pub const NOT_IN_TRANSACTION: Self = Self(-1054);
    /// `JET_errInstanceNameInUse`.
    pub const INSTANCE_NAME_IN_USE: Self = Self(-1086);
    /// `JET_errOutOfSessions`.
    pub const OUT_OF_SESSIONS: Self = Self(-1101);
    /// `JET_errTransTooDeep`.
    pub const TRANS_TOO_DEEP: Self = Self(-1103);
    /// `JET_errInvalidSesid`.
    pub const INVALID_SESID: Self = Self(-1104);
    /// `JET_errInvalidInstance`.
    pub const INVALID_INSTANCE: Self = Self(-1115);
    /// `JET_errCallbackFailed`: a status callback reported a failure.
    pub const CALLBACK_FAILED: Self = Self(-1508);
    /// `JET_errFileNotFound`.
    pub const FILE_NOT_FOUND: Self = Self(-1811);
    /// `JET_errSessionSharingViolation`.
    pub const SESSION_SHARING_VIOLATION: Self = Self(-1910);

    /// Wrap a raw status code.
    #[must_use]
    pub const fn from_raw(value: i32) -> Self {
        Self(value)
    }

    /// Raw status code.
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Whether the code denotes an error.
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 < 0
    }

    /// Whether the code denotes a warning.
    #[must_use]
    pub const fn is_warning(self) -> bool {
        self.0 > 0
    }

    /// Whether the code is exactly `JET_errSuccess`.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    const fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0 => "JET_errSuccess",
            -1003 => "JET_errInvalidParameter",
            -1023 => "JET_errInvalidPath",
            -1029 => "JET_errNotInitialized",
            -1030 => "JET_errAlreadyInitialized",
            -1054 => "JET_errNotInTransaction",
            -1086 => "JET_errInstanceNameInUse",
            -1101 => "JET_errOutOfSessions",
            -1103 => "JET_errTransTooDeep",
            -1104 => "JET_errInvalidSesid",
            -1115 => "JET_errInvalidInstance",
            -1508 => "JET_errCallbackFailed",
            -1811 => "JET_errFileNotFound",
            -1910 => "JET_errSessionSharingViolation",
            _ => return None,
        })
    }
}

impl Display for JetErr {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(formatter, "{name} ({})", self.0),
            None => write!(formatter, "JET_err {}", self.0),
        }
    }
}

/// Notification class of a status callback (`JET_SNP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JetSnp {
    /// Database repair.
    Repair,
    /// Database compaction.
    Compact,
    /// Restore from backup.
    Restore,
    /// Backup.
    Backup,
    /// Database format upgrade.
    Upgrade,
    /// Database scrubbing.
    Scrub,
    /// Record format upgrade.
    UpgradeRecordFormat,
    /// Any class this layer has no name for; the raw code is preserved.
    Unknown(u32),
}

impl From<u32> for JetSnp {
    fn from(code: u32) -> Self {
        match code {
            2 => Self::Repair,
            4 => Self::Compact,
            8 => Self::Restore,
            9 => Self::Backup,
            10 => Self::Upgrade,
            11 => Self::Scrub,
            12 => Self::UpgradeRecordFormat,
            other => Self::Unknown(other),
        }
    }
}

impl From<JetSnp> for u32 {
    fn from(snp: JetSnp) -> Self {
        match snp {
            JetSnp::Repair => 2,
            JetSnp::Compact => 4,
            JetSnp::Restore => 8,
            JetSnp::Backup => 9,
            JetSnp::Upgrade => 10,
            JetSnp::Scrub => 11,
            JetSnp::UpgradeRecordFormat => 12,
            JetSnp::Unknown(code) => code,
        }
    }
}

/// Notification type of a status callback (`JET_SNT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JetSnt {
    /// Progress report; carries a [`JetSnProgress`].
    Progress,
    /// The operation failed.
    Fail,
    /// The operation is starting.
    Begin,
    /// The operation completed.
    Complete,
    /// Resource requirements report.
    Requirements,
    /// Any type this layer has no name for; the raw code is preserved.
    Unknown(u32),
}

impl From<u32> for JetSnt {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Progress,
            3 => Self::Fail,
            5 => Self::Begin,
            6 => Self::Complete,
            7 => Self::Requirements,
            other => Self::Unknown(other),
        }
    }
}

impl From<JetSnt> for u32 {
    fn from(snt: JetSnt) -> Self {
        match snt {
            JetSnt::Progress => 0,
            JetSnt::Fail => 3,
            JetSnt::Begin => 5,
            JetSnt::Complete => 6,
            JetSnt::Requirements => 7,
            JetSnt::Unknown(code) => code,
        }
    }
}

/// Fixed-layout progress record handed to status callbacks (`JET_SNPROG`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeSnProgress {
    /// Size of the record in bytes; used by the engine for version checks.
    pub cb_struct: u32,
    /// Units of work completed.
    pub cunit_done: u32,
    /// Total units of work.
    pub cunit_total: u32,
}

impl NativeSnProgress {
    /// Size of the record as the engine declares it.
    #[allow(clippy::cast_possible_truncation)]
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    /// Build a record with a correct size prefix.
    #[must_use]
    pub const fn new(cunit_done: u32, cunit_total: u32) -> Self {
        Self {
            cb_struct: Self::SIZE,
            cunit_done,
            cunit_total,
        }
    }
}

/// Progress of a long-running engine operation, copied out of the native record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JetSnProgress {
    /// Units of work completed.
    pub cunit_done: u32,
    /// Total units of work.
    pub cunit_total: u32,
}

impl JetSnProgress {
    /// Completed fraction in `0.0..=1.0`; zero when the total is unknown.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.cunit_total == 0 {
            0.0
        } else {
            (f64::from(self.cunit_done) / f64::from(self.cunit_total)).min(1.0)
        }
    }
}

impl From<&NativeSnProgress> for JetSnProgress {
    fn from(native: &NativeSnProgress) -> Self {
        Self {
            cunit_done: native.cunit_done,
            cunit_total: native.cunit_total,
        }
    }
}

macro_rules! grbit {
    ($(#[$meta:meta])* $name:ident { $($(#[$flag_meta:meta])* $flag:ident = $value:expr),* $(,)? }) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            $($(#[$flag_meta])* pub const $flag: Self = Self($value);)*

            /// Raw option bits.
            #[must_use]
            pub const fn bits(self) -> u32 {
                self.0
            }

            /// Combine two sets of options.
            #[must_use]
            pub const fn union(self, other: Self) -> Self {
                Self(self.0 | other.0)
            }

            /// Whether every bit of `other` is set.
            #[must_use]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }
    };
}

grbit!(
    /// Options for committing a transaction.
    CommitTransactionGrbit {
        /// Default options.
        NONE = 0,
        /// Do not wait for the log flush.
        LAZY_FLUSH = 0x1,
        /// Wait for every level-0 commit to be flushed.
        WAIT_LAST_LEVEL0_COMMIT = 0x2,
    }
);

grbit!(
    /// Options for rolling back a transaction.
    RollbackTransactionGrbit {
        /// Roll back the innermost level only.
        NONE = 0,
        /// Roll back every nested level.
        ROLLBACK_ALL = 0x1,
    }
);

grbit!(
    /// Options for ending a session.
    EndSessionGrbit {
        /// Default options.
        NONE = 0,
    }
);

grbit!(
    /// Options for compacting a database.
    CompactGrbit {
        /// Default options.
        NONE = 0,
        /// Dump statistics.
        STATS = 0x20,
        /// Repair while compacting.
        REPAIR = 0x40,
    }
);

grbit!(
    /// Options for terminating an instance.
    TermGrbit {
        /// Default termination.
        DEFAULT = 0,
        /// Clean shutdown.
        COMPLETE = 0x1,
        /// Shut down without cleanup.
        ABRUPT = 0x2,
    }
);

/// System parameter identifiers (`JET_param`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JetParam {
    /// Path of the checkpoint file.
    SystemPath,
    /// Path of the temporary database.
    TempPath,
    /// Directory holding transaction logs.
    LogFilePath,
    /// Three-letter prefix for engine files.
    BaseName,
    /// Maximum number of sessions.
    MaxSessions,
    /// Reuse log files instead of archiving them.
    CircularLog,
    /// `"on"`/`"off"` crash recovery switch.
    Recovery,
    /// Suppress informational event-log entries.
    NoInformationEvent,
    /// Create missing directories for configured paths.
    CreatePathIfNotExist,
}

impl JetParam {
    /// Native parameter id.
    #[must_use]
    pub const fn id(self) -> u32 {
        match self {
            Self::SystemPath => 0,
            Self::TempPath => 1,
            Self::LogFilePath => 2,
            Self::BaseName => 3,
            Self::MaxSessions => 11,
            Self::CircularLog => 17,
            Self::Recovery => 34,
            Self::NoInformationEvent => 43,
            Self::CreatePathIfNotExist => 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn native_progress_layout_is_stable() {
        assert_eq!(mem::size_of::<NativeSnProgress>(), 12);
        assert_eq!(NativeSnProgress::SIZE, 12);
        assert_eq!(NativeSnProgress::new(1, 100).cb_struct, 12);
        assert_eq!(mem::size_of::<JetSesid>(), mem::size_of::<usize>());
        assert_eq!(mem::size_of::<JetErr>(), 4);
    }

    #[test]
    fn notification_codes_survive_conversion() {
        for code in 0..16 {
            assert_eq!(u32::from(JetSnp::from(code)), code);
            assert_eq!(u32::from(JetSnt::from(code)), code);
        }
        assert_eq!(JetSnp::from(9), JetSnp::Backup);
        assert_eq!(JetSnt::from(0), JetSnt::Progress);
        assert_eq!(JetSnp::from(0), JetSnp::Unknown(0));
    }

    #[test]
    fn nil_handles_are_zero() {
        assert!(JetSesid::NIL.is_nil());
        assert!(!JetSesid::from_raw(1).is_nil());
        assert!(JetInstance::default().is_nil());
        assert_eq!(JetSesid::from_raw(0x1f).to_string(), "JET_SESID(0x1f)");
    }

    #[test]
    fn status_codes_classify_and_display() {
        assert!(JetErr::CALLBACK_FAILED.is_error());
        assert!(JetErr::from_raw(1).is_warning());
        assert!(JetErr::SUCCESS.is_success());
        assert_eq!(
            JetErr::CALLBACK_FAILED.to_string(),
            "JET_errCallbackFailed (-1508)"
        );
        assert_eq!(JetErr::from_raw(-9999).to_string(), "JET_err -9999");
    }

    #[test]
    fn progress_fraction_handles_unknown_total() {
        let empty = JetSnProgress::default();
        assert!(empty.fraction().abs() < f64::EPSILON);
        let half = JetSnProgress::from(&NativeSnProgress::new(50, 100));
        assert!((half.fraction() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn grbits_combine() {
        let grbit = CommitTransactionGrbit::LAZY_FLUSH
            .union(CommitTransactionGrbit::WAIT_LAST_LEVEL0_COMMIT);
        assert_eq!(grbit.bits(), 0x3);
        assert!(grbit.contains(CommitTransactionGrbit::LAZY_FLUSH));
        assert!(!RollbackTransactionGrbit::NONE.contains(RollbackTransactionGrbit::ROLLBACK_ALL));
    }
}
