#![forbid(unsafe_code)]
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

//! Shared fixtures for esent-interop integration suites.

/// Scratch directories and ready-to-use engine instances.
pub mod fixtures;
/// Recording status callbacks.
pub mod mocks;
