//! Raw calling conventions shared with the native engine.

use std::ffi::c_void;
use std::ptr;

use crate::types::{JetApiPtr, NativeSnProgress};

#[cfg(all(windows, feature = "esent"))]
pub mod esent;

/// Status callback signature (`JET_PFNSTATUS`).
///
/// The engine passes the raw session id, notification class, notification type
/// and the address of a notification-specific payload, which may be null.
pub type JetPfnStatus = unsafe extern "system" fn(
    sesid: JetApiPtr,
    snp: u32,
    snt: u32,
    data: *const c_void,
) -> i32;

/// Copy a progress record out of native memory.
///
/// Returns `None` for a null address and for records whose size prefix is
/// smaller than [`NativeSnProgress::SIZE`].
///
/// # Safety
///
/// A non-null `data` must point to readable memory holding at least the size
/// prefix, and to a full [`NativeSnProgress`] when the prefix says so. The
/// memory only needs to stay valid for the duration of this call.
#[must_use]
pub unsafe fn read_snprog(data: *const c_void) -> Option<NativeSnProgress> {
    if data.is_null() {
        return None;
    }
    // SAFETY: the caller guarantees the size prefix is readable.
    let cb_struct = unsafe { ptr::read_unaligned(data.cast::<u32>()) };
    if cb_struct < NativeSnProgress::SIZE {
        return None;
    }
    // SAFETY: the prefix declares a full record at this address.
    Some(unsafe { ptr::read_unaligned(data.cast::<NativeSnProgress>()) })
}
