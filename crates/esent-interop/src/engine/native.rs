use std::ffi::{CString, c_char};
use std::path::Path;
use std::ptr;

use crate::error::{EsentError, EsentResult, check};
use crate::ffi::JetPfnStatus;
use crate::ffi::esent;
use crate::types::{
    CommitTransactionGrbit, CompactGrbit, EndSessionGrbit, JetErr, JetInstance, JetParam,
    JetSesid, RollbackTransactionGrbit, TermGrbit,
};

use super::JetApi;

/// Backend that forwards every call to `esent.dll`.
pub(super) struct NativeEngine;

fn c_string(value: &str, operation: &'static str) -> EsentResult<CString> {
    CString::new(value).map_err(|_| EsentError::Native {
        operation,
        code: JetErr::INVALID_PARAMETER,
    })
}

fn c_path(path: &Path) -> EsentResult<CString> {
    path.to_str()
        .and_then(|text| CString::new(text).ok())
        .ok_or_else(|| EsentError::InvalidPath {
            path: path.to_path_buf(),
        })
}

fn optional_ptr(value: Option<&CString>) -> *const c_char {
    value.map_or(ptr::null(), |text| text.as_ptr())
}

fn status(operation: &'static str, raw: i32) -> EsentResult<()> {
    check(operation, JetErr::from_raw(raw)).map(|_| ())
}

impl JetApi for NativeEngine {
    fn create_instance(&self, name: &str) -> EsentResult<JetInstance> {
        let name = c_string(name, "JetCreateInstance")?;
        let mut raw = 0;
        // SAFETY: `raw` is a valid out-pointer and `name` outlives the call.
        let code = unsafe { esent::JetCreateInstanceA(&raw mut raw, name.as_ptr()) };
        status("JetCreateInstance", code)?;
        Ok(JetInstance::from_raw(raw))
    }

    fn set_system_parameter(
        &self,
        instance: JetInstance,
        sesid: JetSesid,
        param: JetParam,
        int_value: usize,
        string_value: Option<&str>,
    ) -> EsentResult<()> {
        let text = string_value
            .map(|value| c_string(value, "JetSetSystemParameter"))
            .transpose()?;
        let mut raw = instance.value();
        // SAFETY: the instance slot is a local copy and the string outlives the call.
        let code = unsafe {
            esent::JetSetSystemParameterA(
                &raw mut raw,
                sesid.value(),
                param.id(),
                int_value,
                optional_ptr(text.as_ref()),
            )
        };
        status("JetSetSystemParameter", code)
    }

    fn init(&self, instance: JetInstance) -> EsentResult<()> {
        let mut raw = instance.value();
        // SAFETY: the instance slot is a valid local.
        let code = unsafe { esent::JetInit(&raw mut raw) };
        status("JetInit", code)
    }

    fn term(&self, instance: JetInstance, grbit: TermGrbit) -> EsentResult<()> {
        // SAFETY: plain value arguments.
        let code = unsafe { esent::JetTerm2(instance.value(), grbit.bits()) };
        status("JetTerm", code)
    }

    fn begin_session(
        &self,
        instance: JetInstance,
        username: &str,
        password: &str,
    ) -> EsentResult<JetSesid> {
        let username = c_string(username, "JetBeginSession")?;
        let password = c_string(password, "JetBeginSession")?;
        let mut raw = 0;
        // SAFETY: `raw` is a valid out-pointer and both strings outlive the call.
        let code = unsafe {
            esent::JetBeginSessionA(
                instance.value(),
                &raw mut raw,
                username.as_ptr(),
                password.as_ptr(),
            )
        };
        status("JetBeginSession", code)?;
        Ok(JetSesid::from_raw(raw))
    }

    fn end_session(&self, sesid: JetSesid, grbit: EndSessionGrbit) -> EsentResult<()> {
        // SAFETY: plain value arguments.
        let code = unsafe { esent::JetEndSession(sesid.value(), grbit.bits()) };
        status("JetEndSession", code)
    }

    fn begin_transaction(&self, sesid: JetSesid) -> EsentResult<()> {
        // SAFETY: plain value argument.
        let code = unsafe { esent::JetBeginTransaction(sesid.value()) };
        status("JetBeginTransaction", code)
    }

    fn commit_transaction(
        &self,
        sesid: JetSesid,
        grbit: CommitTransactionGrbit,
    ) -> EsentResult<()> {
        // SAFETY: plain value arguments.
        let code = unsafe { esent::JetCommitTransaction(sesid.value(), grbit.bits()) };
        status("JetCommitTransaction", code)
    }

    fn rollback(&self, sesid: JetSesid, grbit: RollbackTransactionGrbit) -> EsentResult<()> {
        // SAFETY: plain value arguments.
        let code = unsafe { esent::JetRollback(sesid.value(), grbit.bits()) };
        status("JetRollback", code)
    }

    fn compact(
        &self,
        sesid: JetSesid,
        source: &Path,
        destination: &Path,
        status_callback: Option<JetPfnStatus>,
        grbit: CompactGrbit,
    ) -> EsentResult<()> {
        let source = c_path(source)?;
        let destination = c_path(destination)?;
        // SAFETY: both paths outlive the call and the callback, when present,
        // is a trampoline that never unwinds across this frame.
        let code = unsafe {
            esent::JetCompactA(
                sesid.value(),
                source.as_ptr(),
                destination.as_ptr(),
                status_callback,
                ptr::null(),
                grbit.bits(),
            )
        };
        status("JetCompact", code)
    }
}
