//! In-memory stand-in for the native engine.
//!
//! The stub keeps just enough bookkeeping to exercise the wrappers: instance
//! lifecycle, session handles with a per-instance limit, nested transaction
//! depth, and a compaction that reports progress through a real
//! [`JetPfnStatus`] pointer so callback adapters run exactly as they would
//! under the engine.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::error::{EsentError, EsentResult};
use crate::ffi::JetPfnStatus;
use crate::types::{
    CommitTransactionGrbit, CompactGrbit, EndSessionGrbit, JetErr, JetInstance, JetParam,
    JetSesid, JetSnp, JetSnt, NativeSnProgress, RollbackTransactionGrbit, TermGrbit,
};

use super::JetApi;

/// Sessions an instance hands out when `MaxSessions` is not set.
pub const DEFAULT_MAX_SESSIONS: usize = 16;
/// Deepest transaction nesting the engine accepts.
pub const MAX_TRANSACTION_DEPTH: usize = 7;
/// Progress notifications sent by a stub compaction.
pub const DEFAULT_COMPACT_STEPS: u32 = 4;

const FIRST_HANDLE: usize = 0x1000;

/// Value recorded for a system parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubParam {
    /// Integer parameter.
    Int(usize),
    /// String parameter.
    Text(String),
}

/// Call counts observed by the stub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StubCounters {
    /// Successful `begin_session` calls.
    pub sessions_begun: u64,
    /// `end_session` calls, successful or not.
    pub end_session_calls: u64,
    /// Successful `end_session` calls.
    pub sessions_ended: u64,
    /// Compactions that ran to completion.
    pub compactions: u64,
    /// Status notifications delivered to callbacks.
    pub notifications: u64,
}

#[derive(Debug)]
struct StubInstance {
    name: String,
    initialized: bool,
    params: HashMap<JetParam, StubParam>,
}

impl StubInstance {
    fn max_sessions(&self) -> usize {
        match self.params.get(&JetParam::MaxSessions) {
            Some(StubParam::Int(limit)) => *limit,
            _ => DEFAULT_MAX_SESSIONS,
        }
    }
}

#[derive(Debug)]
struct StubSession {
    instance: JetInstance,
    transaction_depth: usize,
}

#[derive(Debug)]
struct StubState {
    next_handle: usize,
    instances: HashMap<JetInstance, StubInstance>,
    sessions: HashMap<JetSesid, StubSession>,
    databases: HashSet<PathBuf>,
    injected: HashMap<&'static str, JetErr>,
    compact_steps: u32,
    counters: StubCounters,
}

impl Default for StubState {
    fn default() -> Self {
        Self {
            next_handle: FIRST_HANDLE,
            instances: HashMap::new(),
            sessions: HashMap::new(),
            databases: HashSet::new(),
            injected: HashMap::new(),
            compact_steps: DEFAULT_COMPACT_STEPS,
            counters: StubCounters::default(),
        }
    }
}

impl StubState {
    fn allocate(&mut self) -> usize {
        let handle = self.next_handle;
        self.next_handle += 0x10;
        handle
    }

    fn take_injected(&mut self, operation: &'static str) -> EsentResult<()> {
        match self.injected.remove(operation) {
            Some(code) => Err(EsentError::Native { operation, code }),
            None => Ok(()),
        }
    }

    fn instance_mut(
        &mut self,
        operation: &'static str,
        instance: JetInstance,
    ) -> EsentResult<&mut StubInstance> {
        self.instances
            .get_mut(&instance)
            .ok_or(EsentError::Native {
                operation,
                code: JetErr::INVALID_INSTANCE,
            })
    }

    fn session_mut(
        &mut self,
        operation: &'static str,
        sesid: JetSesid,
    ) -> EsentResult<&mut StubSession> {
        self.sessions.get_mut(&sesid).ok_or(EsentError::Native {
            operation,
            code: JetErr::INVALID_SESID,
        })
    }
}

/// In-memory [`JetApi`] backend.
#[derive(Debug, Default)]
pub struct StubEngine {
    state: Mutex<StubState>,
}

impl StubEngine {
    /// Create an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a database file so it can be used as a compaction source.
    pub fn attach_database_file(&self, path: impl Into<PathBuf>) {
        self.lock().databases.insert(path.into());
    }

    /// Whether a database file is known to the engine.
    #[must_use]
    pub fn has_database(&self, path: &Path) -> bool {
        self.lock().databases.contains(path)
    }

    /// Make the next call of `operation` (for example `"JetEndSession"`) fail
    /// with `code`.
    pub fn inject_failure(&self, operation: &'static str, code: JetErr) {
        self.lock().injected.insert(operation, code);
    }

    /// Number of progress notifications each compaction sends.
    pub fn set_compact_steps(&self, steps: u32) {
        self.lock().compact_steps = steps;
    }

    /// Snapshot of call counts.
    #[must_use]
    pub fn counters(&self) -> StubCounters {
        self.lock().counters
    }

    /// Sessions currently open across every instance.
    #[must_use]
    pub fn open_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Whether `sesid` refers to an open session.
    #[must_use]
    pub fn is_session_open(&self, sesid: JetSesid) -> bool {
        self.lock().sessions.contains_key(&sesid)
    }

    /// Current transaction nesting of a session.
    #[must_use]
    pub fn transaction_depth(&self, sesid: JetSesid) -> Option<usize> {
        self.lock()
            .sessions
            .get(&sesid)
            .map(|session| session.transaction_depth)
    }

    /// Whether `instance` has been created and not yet terminated.
    #[must_use]
    pub fn is_instance_live(&self, instance: JetInstance) -> bool {
        self.lock().instances.contains_key(&instance)
    }

    /// Whether `instance` has been initialised.
    #[must_use]
    pub fn is_instance_initialized(&self, instance: JetInstance) -> bool {
        self.lock()
            .instances
            .get(&instance)
            .is_some_and(|entry| entry.initialized)
    }

    /// Value recorded for a system parameter of `instance`.
    #[must_use]
    pub fn parameter(&self, instance: JetInstance, param: JetParam) -> Option<StubParam> {
        self.lock()
            .instances
            .get(&instance)
            .and_then(|entry| entry.params.get(&param).cloned())
    }

    fn notify(
        &self,
        callback: JetPfnStatus,
        sesid: JetSesid,
        snt: JetSnt,
        progress: Option<&NativeSnProgress>,
    ) -> EsentResult<()> {
        let data = progress.map_or(ptr::null(), |record| ptr::from_ref(record).cast());
        self.lock().counters.notifications += 1;
        trace!(?snt, "stub engine delivering status notification");
        // SAFETY: `data` is null or points at a record on this frame that
        // outlives the call; the callback runs on the calling thread.
        let raw = unsafe {
            callback(
                sesid.value(),
                u32::from(JetSnp::Compact),
                u32::from(snt),
                data,
            )
        };
        let code = JetErr::from_raw(raw);
        if code.is_error() {
            Err(EsentError::Native {
                operation: "JetCompact",
                code,
            })
        } else {
            Ok(())
        }
    }
}

impl JetApi for StubEngine {
    fn create_instance(&self, name: &str) -> EsentResult<JetInstance> {
        let mut state = self.lock();
        state.take_injected("JetCreateInstance")?;
        if state.instances.values().any(|entry| entry.name == name) {
            return Err(EsentError::Native {
                operation: "JetCreateInstance",
                code: JetErr::INSTANCE_NAME_IN_USE,
            });
        }
        let instance = JetInstance::from_raw(state.allocate());
        state.instances.insert(
            instance,
            StubInstance {
                name: name.to_string(),
                initialized: false,
                params: HashMap::new(),
            },
        );
        Ok(instance)
    }

    fn set_system_parameter(
        &self,
        instance: JetInstance,
        _sesid: JetSesid,
        param: JetParam,
        int_value: usize,
        string_value: Option<&str>,
    ) -> EsentResult<()> {
        const OPERATION: &str = "JetSetSystemParameter";
        let mut state = self.lock();
        state.take_injected(OPERATION)?;
        let entry = state.instance_mut(OPERATION, instance)?;
        if entry.initialized {
            return Err(EsentError::Native {
                operation: OPERATION,
                code: JetErr::ALREADY_INITIALIZED,
            });
        }
        let value = string_value.map_or(StubParam::Int(int_value), |text| {
            StubParam::Text(text.to_string())
        });
        entry.params.insert(param, value);
        Ok(())
    }

    fn init(&self, instance: JetInstance) -> EsentResult<()> {
        let mut state = self.lock();
        state.take_injected("JetInit")?;
        let entry = state.instance_mut("JetInit", instance)?;
        if entry.initialized {
            return Err(EsentError::Native {
                operation: "JetInit",
                code: JetErr::ALREADY_INITIALIZED,
            });
        }
        entry.initialized = true;
        Ok(())
    }

    fn term(&self, instance: JetInstance, _grbit: TermGrbit) -> EsentResult<()> {
        let mut state = self.lock();
        state.take_injected("JetTerm")?;
        if state.instances.remove(&instance).is_none() {
            return Err(EsentError::Native {
                operation: "JetTerm",
                code: JetErr::INVALID_INSTANCE,
            });
        }
        state
            .sessions
            .retain(|_, session| session.instance != instance);
        Ok(())
    }

    fn begin_session(
        &self,
        instance: JetInstance,
        _username: &str,
        _password: &str,
    ) -> EsentResult<JetSesid> {
        const OPERATION: &str = "JetBeginSession";
        let mut state = self.lock();
        state.take_injected(OPERATION)?;
        let entry = state.instance_mut(OPERATION, instance)?;
        if !entry.initialized {
            return Err(EsentError::Native {
                operation: OPERATION,
                code: JetErr::NOT_INITIALIZED,
            });
        }
        let limit = entry.max_sessions();
        let open = state
            .sessions
            .values()
            .filter(|session| session.instance == instance)
            .count();
        if open >= limit {
            return Err(EsentError::Native {
                operation: OPERATION,
                code: JetErr::OUT_OF_SESSIONS,
            });
        }
        let sesid = JetSesid::from_raw(state.allocate());
        state.sessions.insert(
            sesid,
            StubSession {
                instance,
                transaction_depth: 0,
            },
        );
        state.counters.sessions_begun += 1;
        Ok(sesid)
    }

    fn end_session(&self, sesid: JetSesid, _grbit: EndSessionGrbit) -> EsentResult<()> {
        let mut state = self.lock();
        state.counters.end_session_calls += 1;
        state.take_injected("JetEndSession")?;
        if state.sessions.remove(&sesid).is_none() {
            return Err(EsentError::Native {
                operation: "JetEndSession",
                code: JetErr::INVALID_SESID,
            });
        }
        state.counters.sessions_ended += 1;
        Ok(())
    }

    fn begin_transaction(&self, sesid: JetSesid) -> EsentResult<()> {
        const OPERATION: &str = "JetBeginTransaction";
        let mut state = self.lock();
        state.take_injected(OPERATION)?;
        let session = state.session_mut(OPERATION, sesid)?;
        if session.transaction_depth >= MAX_TRANSACTION_DEPTH {
            return Err(EsentError::Native {
                operation: OPERATION,
                code: JetErr::TRANS_TOO_DEEP,
            });
        }
        session.transaction_depth += 1;
        Ok(())
    }

    fn commit_transaction(
        &self,
        sesid: JetSesid,
        _grbit: CommitTransactionGrbit,
    ) -> EsentResult<()> {
        const OPERATION: &str = "JetCommitTransaction";
        let mut state = self.lock();
        state.take_injected(OPERATION)?;
        let session = state.session_mut(OPERATION, sesid)?;
        if session.transaction_depth == 0 {
            return Err(EsentError::Native {
                operation: OPERATION,
                code: JetErr::NOT_IN_TRANSACTION,
            });
        }
        session.transaction_depth -= 1;
        Ok(())
    }

    fn rollback(&self, sesid: JetSesid, grbit: RollbackTransactionGrbit) -> EsentResult<()> {
        const OPERATION: &str = "JetRollback";
        let mut state = self.lock();
        state.take_injected(OPERATION)?;
        let session = state.session_mut(OPERATION, sesid)?;
        if session.transaction_depth == 0 {
            return Err(EsentError::Native {
                operation: OPERATION,
                code: JetErr::NOT_IN_TRANSACTION,
            });
        }
        if grbit.contains(RollbackTransactionGrbit::ROLLBACK_ALL) {
            session.transaction_depth = 0;
        } else {
            session.transaction_depth -= 1;
        }
        Ok(())
    }

    fn compact(
        &self,
        sesid: JetSesid,
        source: &Path,
        destination: &Path,
        status: Option<JetPfnStatus>,
        _grbit: CompactGrbit,
    ) -> EsentResult<()> {
        const OPERATION: &str = "JetCompact";
        let steps = {
            let mut state = self.lock();
            state.take_injected(OPERATION)?;
            state.session_mut(OPERATION, sesid)?;
            if !state.databases.contains(source) {
                return Err(EsentError::Native {
                    operation: OPERATION,
                    code: JetErr::FILE_NOT_FOUND,
                });
            }
            if source == destination {
                return Err(EsentError::Native {
                    operation: OPERATION,
                    code: JetErr::INVALID_PATH,
                });
            }
            state.compact_steps
        };

        // The lock is released while callbacks run so they may call back in.
        if let Some(callback) = status {
            self.notify(callback, sesid, JetSnt::Begin, None)?;
            for done in 1..=steps {
                let record = NativeSnProgress::new(done, steps);
                self.notify(callback, sesid, JetSnt::Progress, Some(&record))?;
            }
            self.notify(callback, sesid, JetSnt::Complete, None)?;
        }

        let mut state = self.lock();
        state.databases.insert(destination.to_path_buf());
        state.counters.compactions += 1;
        Ok(())
    }
}
