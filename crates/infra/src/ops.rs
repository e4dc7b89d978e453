//! Operation Set: read and write verbs bound to one entity.
//!
//! Each verb group is a zero-sized handle. Every call builds its plan, performs exactly
//! one round trip on the caller's [`Session`] and shapes the rows into [`Record`]s.
//! Operations never retry, never commit and never log user-facing messages.

use core::fmt;
use core::marker::PhantomData;

use marketplace_core::{Entity, Value, Values};
use tracing::{Span, instrument};

use crate::error::DataError;
use crate::query::{DeleteQuery, InsertQuery, Select, UpdateQuery, equality_predicates};
use crate::record::{Record, shape, shape_unique};
use crate::session::Session;
use crate::store::Statement;

macro_rules! verb {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<E>(PhantomData<fn() -> E>);

        impl<E> $name<E> {
            pub const fn new() -> Self {
                Self(PhantomData)
            }
        }

        impl<E> Clone for $name<E> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<E> Copy for $name<E> {}

        impl<E> Default for $name<E> {
            fn default() -> Self {
                Self::new()
            }
        }

        impl<E: Entity> fmt::Debug for $name<E> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}<{}>", stringify!($name), E::TABLE)
            }
        }
    };
}

verb!(
    /// Reads.
    Get
);
verb!(
    /// Inserts, optionally upserting on a unique key.
    Insert
);
verb!(Update);
verb!(Delete);

fn record_rows(n: usize) {
    Span::current().record("rows", n);
}

impl<E: Entity> Get<E> {
    /// Every column of `E`, ready for filters.
    pub fn query(&self) -> Select<E> {
        Select::new()
    }

    /// First matching record, or `None`. Adds `LIMIT 1` unless the query sets a limit.
    ///
    /// With an eager collection the first record arrives with all of its children:
    /// the limit is left off and fan-out rows are merged before taking the first.
    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn one(
        &self,
        session: &mut Session,
        query: Select<E>,
    ) -> Result<Option<Record>, DataError> {
        let fans_out = query.fans_out();
        let query = match query.limit {
            None if !fans_out => query.limit(1),
            _ => query,
        };
        let plan = query.build()?;
        let rows = session.fetch(Statement::Select(&plan)).await?;
        record_rows(rows.len());
        let records = if fans_out {
            shape_unique(plan.layout(), &rows)
        } else {
            shape(plan.layout(), &rows)
        };
        Ok(records.into_iter().next())
    }

    /// At most one distinct record after collapsing fan-out rows.
    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn one_unique(
        &self,
        session: &mut Session,
        query: Select<E>,
    ) -> Result<Option<Record>, DataError> {
        let plan = query.build()?;
        let rows = session.fetch(Statement::Select(&plan)).await?;
        record_rows(rows.len());
        let mut records = shape_unique(plan.layout(), &rows);
        if records.len() > 1 {
            return Err(DataError::MultipleRows {
                count: records.len(),
            });
        }
        Ok(records.pop())
    }

    /// One record per returned row.
    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn many(&self, session: &mut Session, query: Select<E>) -> Result<Vec<Record>, DataError> {
        let plan = query.build()?;
        let rows = session.fetch(Statement::Select(&plan)).await?;
        record_rows(rows.len());
        Ok(shape(plan.layout(), &rows))
    }

    /// One record per distinct primary key, nested collections merged. Limit and
    /// offset count these records, not joined rows.
    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn many_unique(
        &self,
        session: &mut Session,
        query: Select<E>,
    ) -> Result<Vec<Record>, DataError> {
        let plan = query.build()?;
        let rows = session.fetch(Statement::Select(&plan)).await?;
        record_rows(rows.len());
        Ok(shape_unique(plan.layout(), &rows))
    }

    /// First record whose fields equal every entry of `values`.
    pub async fn by(&self, session: &mut Session, values: Values<E>) -> Result<Option<Record>, DataError> {
        self.one(session, Select::new().filters(equality_predicates(&values)))
            .await
    }

    /// Number of rows the query returns.
    #[instrument(skip_all, fields(entity = E::TABLE), err)]
    pub async fn count(&self, session: &mut Session, query: Select<E>) -> Result<u64, DataError> {
        let plan = query.build()?;
        let rows = session.fetch(Statement::Count(&plan)).await?;
        match rows.first().and_then(|row| row.first()) {
            Some(Value::Int(n)) => u64::try_from(*n)
                .map_err(|_| DataError::Decode(format!("negative row count {n}"))),
            Some(other) => Err(DataError::Decode(format!(
                "row count decoded as {}",
                other.type_name()
            ))),
            None => Err(DataError::Decode("count returned no rows".to_string())),
        }
    }

    #[instrument(skip_all, fields(entity = E::TABLE), err)]
    pub async fn exists(&self, session: &mut Session, query: Select<E>) -> Result<bool, DataError> {
        let query = if query.fans_out() { query } else { query.limit(1) };
        let plan = query.build()?;
        let rows = session.fetch(Statement::Select(&plan)).await?;
        Ok(!rows.is_empty())
    }
}

impl<E: Entity> Insert<E> {
    /// Insert one row and return it as stored, defaults filled in.
    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn one(
        &self,
        session: &mut Session,
        query: impl Into<InsertQuery<E>> + Send,
    ) -> Result<Record, DataError> {
        let plan = query.into().build()?;
        let rows = session.fetch(Statement::Insert(&plan)).await?;
        record_rows(rows.len());
        shape_unique(plan.returning().layout(), &rows)
            .into_iter()
            .next()
            .ok_or_else(|| DataError::store(format!("insert into {} returned no row", E::TABLE)))
    }

    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn many(
        &self,
        session: &mut Session,
        query: impl Into<InsertQuery<E>> + Send,
    ) -> Result<Vec<Record>, DataError> {
        let plan = query.into().build()?;
        let rows = session.fetch(Statement::Insert(&plan)).await?;
        record_rows(rows.len());
        Ok(shape_unique(plan.returning().layout(), &rows))
    }
}

impl<E: Entity> Update<E> {
    /// Apply the update and return the first updated record.
    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn one(
        &self,
        session: &mut Session,
        query: UpdateQuery<E>,
    ) -> Result<Option<Record>, DataError> {
        Ok(self.run(session, query).await?.into_iter().next())
    }

    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn many(
        &self,
        session: &mut Session,
        query: UpdateQuery<E>,
    ) -> Result<Vec<Record>, DataError> {
        self.run(session, query).await
    }

    async fn run(&self, session: &mut Session, query: UpdateQuery<E>) -> Result<Vec<Record>, DataError> {
        let plan = query.build()?;
        let rows = session.fetch(Statement::Update(&plan)).await?;
        record_rows(rows.len());
        Ok(shape_unique(plan.returning().layout(), &rows))
    }
}

impl<E: Entity> Delete<E> {
    /// Delete matching rows and return the first one removed, `None` when nothing matched.
    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn one(
        &self,
        session: &mut Session,
        query: impl Into<DeleteQuery<E>> + Send,
    ) -> Result<Option<Record>, DataError> {
        Ok(self.run(session, query.into()).await?.into_iter().next())
    }

    #[instrument(skip_all, fields(entity = E::TABLE, rows = tracing::field::Empty), err)]
    pub async fn many(
        &self,
        session: &mut Session,
        query: impl Into<DeleteQuery<E>> + Send,
    ) -> Result<Vec<Record>, DataError> {
        self.run(session, query.into()).await
    }

    async fn run(&self, session: &mut Session, query: DeleteQuery<E>) -> Result<Vec<Record>, DataError> {
        let plan = query.build()?;
        let rows = session.fetch(Statement::Delete(&plan)).await?;
        record_rows(rows.len());
        Ok(shape_unique(plan.returning().layout(), &rows))
    }
}

/// The four verb groups of one entity.
pub struct Operations<E> {
    pub get: Get<E>,
    pub insert: Insert<E>,
    pub update: Update<E>,
    pub delete: Delete<E>,
}

impl<E> Operations<E> {
    pub const fn new() -> Self {
        Self {
            get: Get::new(),
            insert: Insert::new(),
            update: Update::new(),
            delete: Delete::new(),
        }
    }
}

impl<E> Clone for Operations<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Operations<E> {}

impl<E> Default for Operations<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> fmt::Debug for Operations<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Operations<{}>", E::TABLE)
    }
}
