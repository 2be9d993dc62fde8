//! Scoped transaction on a [`Session`].

use tracing::warn;

use crate::error::{EsentError, EsentResult};
use crate::session::Session;
use crate::types::{CommitTransactionGrbit, JetSesid, RollbackTransactionGrbit};

const OBJECT: &str = "Transaction";

/// One transaction level; rolled back on drop unless committed.
///
/// Borrowing the session keeps it from being ended while the transaction is open.
#[derive(Debug)]
pub struct Transaction<'s> {
    session: &'s Session,
    sesid: JetSesid,
    in_transaction: bool,
}

impl<'s> Transaction<'s> {
    /// Begin a transaction (nested if one is already open on the session).
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::ObjectDisposed`] or [`EsentError::NoActiveHandle`]
    /// when the session cannot be used, or the engine's error.
    pub fn begin(session: &'s Session) -> EsentResult<Self> {
        let sesid = session.jet_sesid()?;
        if sesid.is_nil() {
            return Err(EsentError::NoActiveHandle { object: "Session" });
        }
        session
            .engine()
            .call("JetBeginTransaction", |api| api.begin_transaction(sesid))?;
        Ok(Self {
            session,
            sesid,
            in_transaction: true,
        })
    }

    /// Whether the transaction is still open.
    #[must_use]
    pub const fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Commit this level.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::NoActiveHandle`] when already committed or rolled
    /// back, or the engine's error.
    pub fn commit(&mut self, grbit: CommitTransactionGrbit) -> EsentResult<()> {
        self.ensure_open()?;
        let sesid = self.sesid;
        self.session
            .engine()
            .call("JetCommitTransaction", |api| api.commit_transaction(sesid, grbit))?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back this level.
    ///
    /// # Errors
    ///
    /// Returns [`EsentError::NoActiveHandle`] when already committed or rolled
    /// back, or the engine's error.
    pub fn rollback(&mut self) -> EsentResult<()> {
        self.ensure_open()?;
        self.in_transaction = false;
        let sesid = self.sesid;
        self.session.engine().call("JetRollback", |api| {
            api.rollback(sesid, RollbackTransactionGrbit::NONE)
        })
    }

    fn ensure_open(&self) -> EsentResult<()> {
        if self.in_transaction {
            Ok(())
        } else {
            Err(EsentError::NoActiveHandle { object: OBJECT })
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        if let Err(err) = self.rollback() {
            warn!(sesid = %self.sesid, error = %err, "failed to roll back transaction during drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, JetApi, StubEngine};
    use crate::types::JetErr;
    use std::sync::Arc;

    fn session(stub: &Arc<StubEngine>) -> Session {
        let instance = stub.create_instance("txn").expect("create instance");
        stub.init(instance).expect("init");
        Session::new(&Engine::new(stub.clone()), instance).expect("session")
    }

    #[test]
    fn commit_closes_the_level() -> anyhow::Result<()> {
        let stub = Arc::new(StubEngine::new());
        let session = session(&stub);
        let sesid = session.jet_sesid()?;

        let mut transaction = Transaction::begin(&session)?;
        assert_eq!(stub.transaction_depth(sesid), Some(1));
        transaction.commit(CommitTransactionGrbit::LAZY_FLUSH)?;
        assert!(!transaction.is_in_transaction());
        assert_eq!(stub.transaction_depth(sesid), Some(0));
        assert!(matches!(
            transaction.commit(CommitTransactionGrbit::NONE),
            Err(EsentError::NoActiveHandle { object: "Transaction" })
        ));
        Ok(())
    }

    #[test]
    fn dropping_an_open_transaction_rolls_back() -> anyhow::Result<()> {
        let stub = Arc::new(StubEngine::new());
        let session = session(&stub);
        let sesid = session.jet_sesid()?;
        {
            let _outer = Transaction::begin(&session)?;
            let _inner = Transaction::begin(&session)?;
            assert_eq!(stub.transaction_depth(sesid), Some(2));
        }
        assert_eq!(stub.transaction_depth(sesid), Some(0));
        Ok(())
    }

    #[test]
    fn nesting_limit_surfaces_engine_error() -> anyhow::Result<()> {
        let stub = Arc::new(StubEngine::new());
        let session = session(&stub);
        let mut open = Vec::new();
        let err = loop {
            match Transaction::begin(&session) {
                Ok(transaction) => open.push(transaction),
                Err(err) => break err,
            }
        };
        assert_eq!(err.code(), Some(JetErr::TRANS_TOO_DEEP));
        assert_eq!(open.len(), crate::engine::stub::MAX_TRANSACTION_DEPTH);
        Ok(())
    }
}
