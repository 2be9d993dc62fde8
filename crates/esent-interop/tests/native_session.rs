#![cfg(all(windows, feature = "esent"))]

use anyhow::Result;
use esent_interop::{
    CommitTransactionGrbit, CompactGrbit, Engine, Instance, JetSesid, Session,
    StatusCallbackWrapper, Transaction, compact_database,
};
use esent_test_support::fixtures::{create_random_directory, test_instance_options};
use esent_test_support::mocks::RecordingCallback;

#[test]
fn native_session_lifecycle() -> Result<()> {
    let directory = create_random_directory()?;
    let engine = Engine::native()?;
    let instance = Instance::new(
        &engine,
        "native-session",
        &test_instance_options(directory.path()),
    )?;

    let mut session = Session::new(&engine, instance.jet_instance()?)?;
    let sesid = session.jet_sesid()?;
    assert_ne!(sesid, JetSesid::NIL);

    let mut transaction = Transaction::begin(&session)?;
    transaction.commit(CommitTransactionGrbit::NONE)?;
    drop(transaction);

    session.dispose()?;
    assert!(session.jet_sesid().is_err_and(|err| err.is_object_disposed()));
    Ok(())
}

#[test]
fn native_compaction_of_missing_database_fails_cleanly() -> Result<()> {
    let directory = create_random_directory()?;
    let engine = Engine::native()?;
    let instance = Instance::new(
        &engine,
        "native-compact",
        &test_instance_options(directory.path()),
    )?;
    let session = instance.begin_session()?;

    let recorder = RecordingCallback::default();
    let wrapper = StatusCallbackWrapper::new(recorder.callback());
    let result = compact_database(
        &session,
        &directory.path().join("missing.edb"),
        &directory.path().join("out.edb"),
        Some(&wrapper),
        CompactGrbit::NONE,
    );
    assert!(result.is_err());
    assert!(!wrapper.has_saved_exception());
    Ok(())
}
