//! Declarations for the subset of `esent.dll` this crate calls.

use std::ffi::{c_char, c_void};

use super::JetPfnStatus;
use crate::types::JetApiPtr;

#[link(name = "esent")]
unsafe extern "system" {
    /// `JetCreateInstanceA`.
    pub fn JetCreateInstanceA(instance: *mut JetApiPtr, name: *const c_char) -> i32;
    /// `JetSetSystemParameterA`.
    pub fn JetSetSystemParameterA(
        instance: *mut JetApiPtr,
        sesid: JetApiPtr,
        param_id: u32,
        int_value: JetApiPtr,
        string_value: *const c_char,
    ) -> i32;
    /// `JetInit`.
    pub fn JetInit(instance: *mut JetApiPtr) -> i32;
    /// `JetTerm2`.
    pub fn JetTerm2(instance: JetApiPtr, grbit: u32) -> i32;
    /// `JetBeginSessionA`.
    pub fn JetBeginSessionA(
        instance: JetApiPtr,
        sesid: *mut JetApiPtr,
        username: *const c_char,
        password: *const c_char,
    ) -> i32;
    /// `JetEndSession`.
    pub fn JetEndSession(sesid: JetApiPtr, grbit: u32) -> i32;
    /// `JetBeginTransaction`.
    pub fn JetBeginTransaction(sesid: JetApiPtr) -> i32;
    /// `JetCommitTransaction`.
    pub fn JetCommitTransaction(sesid: JetApiPtr, grbit: u32) -> i32;
    /// `JetRollback`.
    pub fn JetRollback(sesid: JetApiPtr, grbit: u32) -> i32;
    /// `JetCompactA`.
    pub fn JetCompactA(
        sesid: JetApiPtr,
        source: *const c_char,
        destination: *const c_char,
        status: Option<JetPfnStatus>,
        convert: *const c_void,
        grbit: u32,
    ) -> i32;
}
