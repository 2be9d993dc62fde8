#![deny(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Safe wrappers over the ESENT (JET) database engine's native boundary.
//!
//! The crate owns two pieces of the boundary: [`StatusCallbackWrapper`], which
//! lets Rust closures receive native status notifications without ever
//! unwinding into engine frames, and the lifecycle wrappers ([`Session`],
//! [`Instance`], [`Transaction`]) that release native handles exactly once.
//! Native calls go through the [`JetApi`] seam so the same wrappers run
//! against `esent.dll` or the in-memory [`StubEngine`].

/// Cooperative per-thread abort requests.
pub mod abort;
/// Status callback adapter and native trampoline.
#[allow(unsafe_code)]
pub mod callback;
/// Engine seam plus native and stub backends.
pub mod engine;
/// Error types for native calls and replayed callback failures.
pub mod error;
/// Raw calling conventions and native declarations.
#[allow(unsafe_code)]
pub mod ffi;
/// Instance owning wrapper.
pub mod instance;
/// Long-running engine maintenance operations.
pub mod maintenance;
/// Instance configuration and system parameter planning.
pub mod options;
/// Session owning wrapper.
pub mod session;
/// Scoped transactions.
pub mod transaction;
/// Typed JET values shared across the boundary.
pub mod types;

pub use abort::{AbortHandle, ThreadAbort};
pub use callback::StatusCallbackWrapper;
pub use engine::{Engine, JetApi, StubEngine};
pub use error::{CallbackFailure, EsentError, EsentResult};
pub use instance::Instance;
pub use maintenance::compact_database;
pub use options::{InstanceOptions, ParameterPlan, SystemParameter};
pub use session::Session;
pub use transaction::Transaction;
pub use types::{
    CommitTransactionGrbit, CompactGrbit, EndSessionGrbit, JetErr, JetInstance, JetParam,
    JetSesid, JetSnProgress, JetSnp, JetSnt, NativeSnProgress, RollbackTransactionGrbit,
    TermGrbit,
};
