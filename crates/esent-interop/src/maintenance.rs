//! Long-running engine operations that report progress through status callbacks.

use std::path::Path;

use tracing::{debug, info};

use crate::callback::StatusCallbackWrapper;
use crate::error::{EsentError, EsentResult};
use crate::session::Session;
use crate::types::CompactGrbit;

/// Compact `source` into `destination`, reporting progress to `status`.
///
/// The adapter is registered for the duration of the native call. A failure
/// captured from the callback takes precedence over the native status, which
/// in that case only says the callback failed.
///
/// # Errors
///
/// Returns [`EsentError::Callback`] when the callback failed or was aborted,
/// otherwise the session's or the engine's error. A callback panic resumes on
/// the calling thread.
pub fn compact_database(
    session: &Session,
    source: &Path,
    destination: &Path,
    status: Option<&StatusCallbackWrapper<'_>>,
    grbit: CompactGrbit,
) -> EsentResult<()> {
    let sesid = session.jet_sesid()?;
    if sesid.is_nil() {
        return Err(EsentError::NoActiveHandle { object: "Session" });
    }
    debug!(
        %sesid,
        source = %source.display(),
        destination = %destination.display(),
        "compacting database"
    );

    let result = match status {
        Some(wrapper) => {
            let result = wrapper.registered(|| {
                session.engine().call("JetCompact", |api| {
                    api.compact(
                        sesid,
                        source,
                        destination,
                        Some(StatusCallbackWrapper::native_callback()),
                        grbit,
                    )
                })
            });
            wrapper.throw_saved_exception()?;
            result
        }
        None => session
            .engine()
            .call("JetCompact", |api| api.compact(sesid, source, destination, None, grbit)),
    };

    if result.is_ok() {
        info!(destination = %destination.display(), "database compacted");
    }
    result
}
