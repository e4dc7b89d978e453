use chrono::{DateTime, Utc};
use marketplace_core::{ColumnType, Value};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row as _, Transaction};
use tracing::{Span, instrument};

use super::{Backend, Connection, Row, Statement};
use crate::config::DatabaseConfig;
use crate::error::{ConstraintKind, DataError};
use crate::sql;

/// Postgres store over an sqlx connection pool.
///
/// Each session checks out one pooled connection and runs a single transaction on it.
/// Integrity constraints live in the database schema; violations come back as
/// [`DataError::Constraint`] with the constraint name Postgres reports.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
    statement_timeout_ms: Option<u64>,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout_ms: None,
        }
    }

    /// Open a pool sized by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DataError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "postgres pool ready"
        );
        Ok(Self {
            pool,
            statement_timeout_ms: config.statement_timeout_ms,
        })
    }

    pub fn with_statement_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.statement_timeout_ms = timeout_ms;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn Connection>, DataError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        if let Some(ms) = self.statement_timeout_ms {
            sqlx::query(&format!("SET LOCAL statement_timeout = {ms}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("statement_timeout", e))?;
        }
        Ok(Box::new(PostgresConnection { tx: Some(tx) }))
    }
}

struct PostgresConnection {
    tx: Option<Transaction<'static, Postgres>>,
}

#[async_trait::async_trait]
impl Connection for PostgresConnection {
    #[instrument(
        skip(self, statement),
        fields(
            statement = statement.kind(),
            table = statement.entity().table,
            rows = tracing::field::Empty
        ),
        err
    )]
    async fn fetch(&mut self, statement: Statement<'_>) -> Result<Vec<Row>, DataError> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| DataError::store("connection already closed"))?;

        let rendered = sql::render(statement);
        tracing::debug!(sql = %rendered.sql, params = rendered.params.len(), "executing");

        let query = rendered
            .params
            .iter()
            .fold(sqlx::query(&rendered.sql), bind);
        let rows = query
            .fetch_all(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error(statement.kind(), e))?;

        let types = statement.slot_types();
        let mut decoded = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut values = Vec::with_capacity(types.len());
            for (index, ty) in types.iter().enumerate() {
                values.push(decode(row, index, *ty).map_err(|e| map_sqlx_error("decode", e))?);
            }
            decoded.push(values);
        }

        Span::current().record("rows", decoded.len());
        Ok(decoded)
    }

    async fn commit(&mut self) -> Result<(), DataError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| DataError::store("connection already closed"))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(&mut self) -> Result<(), DataError> {
        match self.tx.take() {
            Some(tx) => tx
                .rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e)),
            None => Ok(()),
        }
    }
}

fn bind<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        // Rendering inlines NULL, so this arm only guards against hand-built statements.
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::Uuid(u) => query.bind(*u),
        Value::Timestamp(t) => query.bind(*t),
        Value::Json(j) => query.bind(sqlx::types::Json(j.clone())),
    }
}

fn decode(row: &PgRow, index: usize, ty: ColumnType) -> Result<Value, sqlx::Error> {
    let value = match ty {
        ColumnType::Bool => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        ColumnType::BigInt => row.try_get::<Option<i64>, _>(index)?.map(Value::Int),
        ColumnType::Double => row.try_get::<Option<f64>, _>(index)?.map(Value::Float),
        ColumnType::Text => row.try_get::<Option<String>, _>(index)?.map(Value::Text),
        ColumnType::Uuid => row.try_get::<Option<uuid::Uuid>, _>(index)?.map(Value::Uuid),
        ColumnType::Timestamp => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(Value::Timestamp),
        ColumnType::Json => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map(Value::Json),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Outcome category of a Postgres SQLSTATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sqlstate {
    Constraint(ConstraintKind),
    Aborted,
    Other,
}

fn classify(code: &str) -> Sqlstate {
    match code {
        "23505" => Sqlstate::Constraint(ConstraintKind::Unique),
        "23503" => Sqlstate::Constraint(ConstraintKind::ForeignKey),
        "23502" => Sqlstate::Constraint(ConstraintKind::NotNull),
        "23514" => Sqlstate::Constraint(ConstraintKind::Check),
        // in_failed_sql_transaction
        "25P02" => Sqlstate::Aborted,
        _ => Sqlstate::Other,
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DataError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            match classify(&code) {
                Sqlstate::Constraint(kind) => DataError::constraint(
                    kind,
                    db_err.constraint().unwrap_or_default(),
                    db_err.message(),
                ),
                Sqlstate::Aborted => DataError::TransactionAborted(format!(
                    "{operation}: {}",
                    db_err.message()
                )),
                Sqlstate::Other => DataError::store(format!(
                    "database error in {operation} ({code}): {}",
                    db_err.message()
                )),
            }
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. } => {
            DataError::Decode(format!("{operation}: {err}"))
        }
        sqlx::Error::PoolTimedOut => {
            DataError::store(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            DataError::store(format!("connection pool closed in {operation}"))
        }
        _ => DataError::store(format!("sqlx error in {operation}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_codes_map_to_constraint_kinds() {
        assert_eq!(classify("23505"), Sqlstate::Constraint(ConstraintKind::Unique));
        assert_eq!(classify("23503"), Sqlstate::Constraint(ConstraintKind::ForeignKey));
        assert_eq!(classify("23502"), Sqlstate::Constraint(ConstraintKind::NotNull));
        assert_eq!(classify("23514"), Sqlstate::Constraint(ConstraintKind::Check));
    }

    #[test]
    fn failed_transaction_is_reported_as_aborted() {
        assert_eq!(classify("25P02"), Sqlstate::Aborted);
        assert_eq!(classify("40001"), Sqlstate::Other);
        assert_eq!(classify(""), Sqlstate::Other);
    }

    #[test]
    fn pool_failures_are_transient() {
        let err = map_sqlx_error("begin_transaction", sqlx::Error::PoolTimedOut);
        assert!(err.is_transient());
        assert!(matches!(err, DataError::Store(msg) if msg.contains("begin_transaction")));
    }

    #[test]
    fn decode_failures_are_not_store_errors() {
        let err = map_sqlx_error("decode", sqlx::Error::ColumnNotFound("email".into()));
        assert!(matches!(err, DataError::Decode(_)));
        assert!(!err.is_transient());
    }
}
