use anyhow::Result;
use esent_interop::{CommitTransactionGrbit, EsentError, JetErr, JetSesid, Session, Transaction};
use esent_telemetry::Metrics;
use esent_test_support::fixtures::TestInstance;

#[test]
fn fresh_session_holds_a_handle_until_end() -> Result<()> {
    let fixture = TestInstance::new()?;
    let mut session = Session::new(fixture.engine(), fixture.jet_instance()?)?;

    let sesid = session.jet_sesid()?;
    assert!(!sesid.is_nil());
    assert!(fixture.stub().is_session_open(sesid));

    session.end()?;
    assert_eq!(session.jet_sesid()?, JetSesid::NIL);
    assert!(!fixture.stub().is_session_open(sesid));
    assert!(!session.is_disposed());
    Ok(())
}

#[test]
fn conversion_matches_the_exposed_handle() -> Result<()> {
    let fixture = TestInstance::new()?;
    let session = fixture.begin_session()?;

    let converted = JetSesid::try_from(&session)?;
    assert_eq!(converted, session.jet_sesid()?);
    Ok(())
}

#[test]
fn end_then_dispose_is_safe_and_dispose_is_terminal() -> Result<()> {
    let fixture = TestInstance::new()?;
    let mut session = fixture.begin_session()?;

    session.end()?;
    session.dispose()?;
    session.dispose()?;
    assert!(session.is_disposed());

    let err = session.end().expect_err("end after dispose");
    assert!(err.is_object_disposed());
    assert_eq!(err.to_string(), "object already released");

    let err = session.jet_sesid().expect_err("handle after dispose");
    assert!(err.is_object_disposed());
    assert!(matches!(
        JetSesid::try_from(&session),
        Err(EsentError::ObjectDisposed { object: "Session" })
    ));
    assert_eq!(fixture.stub().counters().end_session_calls, 1);
    Ok(())
}

#[test]
fn session_scenario_with_trivial_transaction() -> Result<()> {
    let fixture = TestInstance::new()?;
    let mut session = Session::new(fixture.engine(), fixture.jet_instance()?)?;
    let sesid = session.jet_sesid()?;
    assert_ne!(sesid, JetSesid::NIL);

    let mut transaction = Transaction::begin(&session)?;
    transaction.commit(CommitTransactionGrbit::NONE)?;
    drop(transaction);
    assert_eq!(fixture.stub().transaction_depth(sesid), Some(0));

    session.dispose()?;
    let err = session.jet_sesid().expect_err("handle after dispose");
    assert!(matches!(err, EsentError::ObjectDisposed { .. }));
    assert!(!fixture.stub().is_session_open(sesid));
    Ok(())
}

#[test]
fn each_session_owns_a_distinct_handle() -> Result<()> {
    let fixture = TestInstance::new()?;
    let first = fixture.begin_session()?;
    let second = fixture.begin_session()?;
    assert_ne!(first.jet_sesid()?, second.jet_sesid()?);
    drop(first);
    drop(second);
    assert_eq!(fixture.stub().open_sessions(), 0);
    assert_eq!(fixture.stub().counters().sessions_ended, 2);
    Ok(())
}

#[test]
fn session_limit_is_reported_as_native_error() -> Result<()> {
    let fixture = TestInstance::new()?;
    let mut open = Vec::new();
    let err = loop {
        match fixture.begin_session() {
            Ok(session) => open.push(session),
            Err(err) => break err,
        }
    };
    let err = err.downcast::<EsentError>()?;
    assert_eq!(err.code(), Some(JetErr::OUT_OF_SESSIONS));
    assert!(!open.is_empty());
    Ok(())
}

#[test]
fn metrics_follow_open_sessions_and_native_failures() -> Result<()> {
    let metrics = Metrics::new()?;
    let fixture = TestInstance::with_engine(|engine| engine.with_metrics(metrics.clone()))?;

    let mut session = fixture.begin_session()?;
    assert_eq!(metrics.snapshot().sessions_open, 1);

    fixture
        .stub()
        .inject_failure("JetEndSession", JetErr::SESSION_SHARING_VIOLATION);
    let err = session.end().expect_err("injected failure");
    assert_eq!(err.code(), Some(JetErr::SESSION_SHARING_VIOLATION));
    assert_eq!(session.jet_sesid()?, JetSesid::NIL);
    assert_eq!(metrics.snapshot().sessions_open, 0);
    assert_eq!(metrics.native_failures("JetEndSession"), 1);
    Ok(())
}
