//! Sessions: one connection, one transaction.
//!
//! A [`Session`] is exclusively owned by the unit of work that opened it. Every
//! operation borrows it mutably, so at most one statement is in flight per session.
//! Finalization is explicit (`commit` / `rollback`); a session dropped unfinished rolls
//! back, which covers early returns, panics and cancelled futures alike.
//!
//! After a store failure the transaction is unusable (Postgres rejects everything until
//! rollback). The session records that and fails fast with
//! [`DataError::TransactionAborted`] instead of making further round trips.

use core::fmt;
use core::future::Future;
use core::pin::Pin;
use std::sync::Arc;

use marketplace_core::SchemaRegistry;
use tracing::instrument;

use crate::config::DatabaseConfig;
use crate::error::DataError;
use crate::store::{Backend, Connection, MemoryBackend, PostgresBackend, Row, Statement};

/// Future returned by a transaction scope closure, borrowing the session for `'s`.
pub type ScopeFuture<'s, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 's>>;

/// Handle to a store; cheap to clone and share.
#[derive(Clone)]
pub struct Database {
    backend: Arc<dyn Backend>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Database {
    pub fn new(backend: impl Backend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_backend(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Fresh in-process store with empty tables for every entity in `schema`.
    pub fn in_memory(schema: &SchemaRegistry) -> Self {
        Self::new(MemoryBackend::new(schema))
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DataError> {
        Ok(Self::new(PostgresBackend::connect(config).await?))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Acquire a connection and begin a transaction.
    #[instrument(skip(self), fields(backend = self.backend.name()), err)]
    pub async fn session(&self) -> Result<Session, DataError> {
        let conn = self.backend.begin().await?;
        Ok(Session {
            conn: Some(conn),
            poisoned: None,
        })
    }

    /// Run `f` in its own transaction: commit when it returns `Ok`, roll back on `Err`.
    ///
    /// ```ignore
    /// let user = db
    ///     .transaction(|session| Box::pin(async move { users.insert.one(session, row).await }))
    ///     .await?;
    /// ```
    pub async fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> ScopeFuture<'s, T, E>,
        E: From<DataError>,
    {
        let mut session = self.session().await?;
        match f(&mut session).await {
            Ok(value) => {
                session.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = session.rollback().await {
                    tracing::warn!(error = %rollback, "rollback after failed unit of work");
                }
                Err(err)
            }
        }
    }
}

/// One open transaction.
pub struct Session {
    conn: Option<Box<dyn Connection>>,
    /// Why the transaction can no longer be used.
    poisoned: Option<String>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("open", &self.conn.is_some())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}

impl Session {
    pub(crate) async fn fetch(&mut self, statement: Statement<'_>) -> Result<Vec<Row>, DataError> {
        if let Some(reason) = &self.poisoned {
            return Err(DataError::TransactionAborted(reason.clone()));
        }
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| DataError::store("session already finished"))?;
        match conn.fetch(statement).await {
            Ok(rows) => Ok(rows),
            Err(err) => {
                if err.aborts_transaction() {
                    self.poisoned = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Whether an earlier failure left the transaction unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Commit. A poisoned session is rolled back instead and reports why.
    pub async fn commit(mut self) -> Result<(), DataError> {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| DataError::store("session already finished"))?;
        if let Some(reason) = self.poisoned.take() {
            conn.rollback().await?;
            return Err(DataError::TransactionAborted(reason));
        }
        conn.commit().await
    }

    pub async fn rollback(mut self) -> Result<(), DataError> {
        match self.conn.take() {
            Some(mut conn) => conn.rollback().await,
            None => Ok(()),
        }
    }

    /// Nested scope on the same transaction. Nothing is committed here; the outermost
    /// owner of the session decides.
    pub async fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> ScopeFuture<'s, T, E>,
    {
        f(self).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!("session dropped unfinished; rolling back");
        }
    }
}
