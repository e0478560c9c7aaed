//! A connection shared between threads.
//!
//! The session carries a single transaction, so two threads interleaving
//! statements on it would see each other's uncommitted work. A thread that
//! opens a transaction becomes its owner; other threads block on `begin`
//! (or an implicitly beginning `execute`) until the owner commits, rolls
//! back, or loses the transaction to an error.
use std::{
    io::{Read, Write},
    net::TcpStream,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, ThreadId},
};

use log::debug;

use super::Connection;
use crate::{ConnectionConfig, Result, protocol::ResultFormat};

struct Shared<S: Read + Write> {
    conn: Mutex<Connection<S>>,
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

pub struct SharedConnection<S: Read + Write = TcpStream> {
    inner: Arc<Shared<S>>,
}

impl<S: Read + Write> Clone for SharedConnection<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedConnection<TcpStream> {
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        Connection::connect(config).map(Self::new)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: Read + Write> SharedConnection<S> {
    pub fn new(conn: Connection<S>) -> Self {
        Self {
            inner: Arc::new(Shared {
                conn: Mutex::new(conn),
                owner: Mutex::new(None),
                released: Condvar::new(),
            }),
        }
    }

    pub fn begin(&self) -> Result<()> {
        self.with_transaction(Connection::begin)
    }

    pub fn commit(&self) -> Result<bool> {
        self.with_transaction(Connection::commit)
    }

    pub fn rollback(&self) -> Result<bool> {
        self.with_transaction(Connection::rollback)
    }

    /// Run `query` and collect its items. The calling thread keeps the
    /// transaction until it commits or rolls back.
    pub fn execute(&self, query: &str, format: ResultFormat) -> Result<Vec<String>> {
        self.with_transaction(|conn| conn.execute(query, format)?.collect())
    }

    /// Run `f` on the connection as the transaction owner.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection<S>) -> Result<T>,
    {
        self.acquire();
        let mut conn = lock(&self.inner.conn);
        let outcome = f(&mut *conn);
        let finished = !conn.in_transaction();
        drop(conn);

        if finished {
            self.release();
        }
        outcome
    }

    pub fn close(&self) -> Result<()> {
        self.acquire();
        let outcome = lock(&self.inner.conn).close();
        self.release();
        outcome
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.conn).is_closed()
    }

    fn acquire(&self) {
        let me = thread::current().id();
        let mut owner = lock(&self.inner.owner);
        while matches!(*owner, Some(id) if id != me) {
            debug!("{me:?} waiting for transaction owner {:?}", *owner);
            owner = self
                .inner
                .released
                .wait(owner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *owner = Some(me);
    }

    fn release(&self) {
        *lock(&self.inner.owner) = None;
        self.inner.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, time::Duration};

    use super::*;
    use crate::{
        Error,
        connection::testing::{MockStream, ServerScript, connect_scripted},
        protocol::MessageCode,
    };

    fn shared(script: ServerScript) -> SharedConnection<MockStream> {
        SharedConnection::new(connect_scripted(script))
    }

    fn owner(shared: &SharedConnection<MockStream>) -> Option<ThreadId> {
        *lock(&shared.inner.owner)
    }

    #[test]
    fn second_thread_waits_for_commit() {
        let conn = shared(
            ServerScript::new()
                .message(MessageCode::BeginTransactionOk)
                .message(MessageCode::CommitTransactionOk)
                .message(MessageCode::BeginTransactionOk)
                .message(MessageCode::CommitTransactionOk),
        );
        conn.begin().unwrap();
        assert_eq!(owner(&conn), Some(thread::current().id()));

        let (began, entered) = mpsc::channel();
        let other = conn.clone();
        let handle = thread::spawn(move || {
            other.begin().unwrap();
            began.send(()).unwrap();
            other.commit().unwrap();
        });

        assert!(entered.recv_timeout(Duration::from_millis(100)).is_err());
        assert!(conn.commit().unwrap());

        entered.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
        assert_eq!(owner(&conn), None);
    }

    #[test]
    fn failed_begin_releases_ownership() {
        let conn = shared(ServerScript::new().diagnostic(
            MessageCode::BeginTransactionFailed,
            1,
            "busy",
        ));

        assert!(matches!(conn.begin(), Err(Error::TransactionBeginFailed(_))));
        assert_eq!(owner(&conn), None);
    }

    #[test]
    fn execute_keeps_transaction_for_caller() {
        let conn = shared(
            ServerScript::new()
                .message(MessageCode::BeginTransactionOk)
                .message(MessageCode::QuerySucceeded)
                .data(MessageCode::ItemPart, b"42")
                .message(MessageCode::ItemEnd)
                .message(MessageCode::ResultEnd)
                .message(MessageCode::RollbackTransactionOk),
        );

        let items = conn.execute("42", ResultFormat::Xml).unwrap();
        assert_eq!(items, vec!["42".to_string()]);
        assert_eq!(owner(&conn), Some(thread::current().id()));

        assert!(conn.rollback().unwrap());
        assert_eq!(owner(&conn), None);
    }

    #[test]
    fn close_releases() {
        let conn = shared(
            ServerScript::new()
                .message(MessageCode::BeginTransactionOk)
                .message(MessageCode::TransactionRollbackBeforeClose),
        );

        conn.begin().unwrap();
        conn.close().unwrap();
        assert!(conn.is_closed());
        assert_eq!(owner(&conn), None);
    }
}
