//! Collection record repository.
//!
//! Every content collection shares the `app.record` table. Access filters
//! compiled by the evaluator are rendered as an extra `WHERE` condition on
//! the `restaurant_id` or `user_id` column.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::{QueryAs, QueryScalar};

use tablewise_core::access::{FilterField, FilterOp};
use tablewise_core::{Collection, RecordFilter, RecordId, RestaurantId, UserId};

use super::RepositoryError;
use crate::models::Record;

const RECORD_COLUMNS: &str = "id, collection, restaurant_id, user_id, data, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i32,
    collection: String,
    restaurant_id: Option<i32>,
    user_id: Option<i32>,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for Record {
    type Error = RepositoryError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        let collection = row
            .collection
            .parse::<Collection>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: RecordId::new(row.id),
            collection,
            restaurant: row.restaurant_id.map(RestaurantId::new),
            user: row.user_id.map(UserId::new),
            data: row.data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fields of a new record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub restaurant: Option<RestaurantId>,
    pub user: Option<UserId>,
    pub data: Value,
}

/// Pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 25;
    pub const MAX_LIMIT: i64 = 100;

    /// Page `page` (1-based) of `limit` records, clamped to sane bounds.
    #[must_use]
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let limit = limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT);
        let page = page.unwrap_or(1).max(1);
        Self {
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

/// Render a filter as a SQL condition over `app.record`, binding its value
/// as parameter `$param`.
#[must_use]
pub fn sql_condition(filter: &RecordFilter, param: usize) -> String {
    let column = match filter.field {
        FilterField::Restaurant => "restaurant_id",
        FilterField::User => "user_id",
    };
    match filter.op {
        FilterOp::In(_) => format!("{column} = ANY(${param})"),
        FilterOp::Equals(_) => format!("{column} = ${param}"),
    }
}

fn bind_filter<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    filter: Option<&'q RecordFilter>,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    match filter.map(|f| &f.op) {
        None => query,
        Some(FilterOp::In(ids)) => query.bind(ids),
        Some(FilterOp::Equals(id)) => query.bind(*id),
    }
}

fn bind_filter_scalar<'q, O>(
    query: QueryScalar<'q, Postgres, O, PgArguments>,
    filter: Option<&'q RecordFilter>,
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    match filter.map(|f| &f.op) {
        None => query,
        Some(FilterOp::In(ids)) => query.bind(ids),
        Some(FilterOp::Equals(id)) => query.bind(*id),
    }
}

/// Repository for collection records.
pub struct RecordRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RecordRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List one page of a collection, constrained by an optional access
    /// filter. Returns the page and the total number of matching records.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        collection: Collection,
        filter: Option<&RecordFilter>,
        page: Page,
    ) -> Result<(Vec<Record>, i64), RepositoryError> {
        let condition = filter
            .map(|f| format!(" AND {}", sql_condition(f, 4)))
            .unwrap_or_default();

        let list_sql = format!(
            "SELECT {RECORD_COLUMNS} FROM app.record \
             WHERE collection = $1{condition} \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        );
        let query = sqlx::query_as::<_, RecordRow>(&list_sql)
            .bind(collection.slug())
            .bind(page.limit)
            .bind(page.offset);
        let rows = bind_filter(query, filter).fetch_all(self.pool).await?;

        let count_condition = filter
            .map(|f| format!(" AND {}", sql_condition(f, 2)))
            .unwrap_or_default();
        let count_sql = format!("SELECT COUNT(*) FROM app.record WHERE collection = $1{count_condition}");
        let query = sqlx::query_scalar::<_, i64>(&count_sql).bind(collection.slug());
        let total = bind_filter_scalar(query, filter).fetch_one(self.pool).await?;

        let records = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<Record>, _>>()?;
        Ok((records, total))
    }

    /// Get a record by ID within a collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, collection: Collection, id: RecordId) -> Result<Option<Record>, RepositoryError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM app.record WHERE collection = $1 AND id = $2"
        ))
        .bind(collection.slug())
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert a record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, collection: Collection, new: &NewRecord) -> Result<Record, RepositoryError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r"
            INSERT INTO app.record (collection, restaurant_id, user_id, data)
            VALUES ($1, $2, $3, $4)
            RETURNING {RECORD_COLUMNS}
            "
        ))
        .bind(collection.slug())
        .bind(new.restaurant.map(|r| r.as_i32()))
        .bind(new.user.map(|u| u.as_i32()))
        .bind(&new.data)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Replace a record's tenant tag and data document.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the record doesn't exist.
    pub async fn update(
        &self,
        collection: Collection,
        id: RecordId,
        restaurant: Option<RestaurantId>,
        data: &Value,
    ) -> Result<Record, RepositoryError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            r"
            UPDATE app.record
            SET restaurant_id = $3, data = $4, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING {RECORD_COLUMNS}
            "
        ))
        .bind(collection.slug())
        .bind(id.as_i32())
        .bind(restaurant.map(|r| r.as_i32()))
        .bind(data)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the record doesn't exist.
    pub async fn delete(&self, collection: Collection, id: RecordId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM app.record WHERE collection = $1 AND id = $2")
            .bind(collection.slug())
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Number of records a restaurant created in a collection on `date` (UTC).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_created_on(
        &self,
        collection: Collection,
        restaurant: RestaurantId,
        date: NaiveDate,
    ) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM app.record
            WHERE collection = $1
              AND restaurant_id = $2
              AND (created_at AT TIME ZONE 'UTC')::date = $3
            ",
        )
        .bind(collection.slug())
        .bind(restaurant.as_i32())
        .bind(date)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablewise_core::Predicate;

    #[test]
    fn test_sql_condition_for_tenant_and_owner() {
        let tenant = Predicate::TenantIn(vec![RestaurantId::new(2)]).compile();
        assert_eq!(sql_condition(&tenant, 4), "restaurant_id = ANY($4)");
        let owner = Predicate::OwnedBy(UserId::new(7)).compile();
        assert_eq!(sql_condition(&owner, 2), "user_id = $2");
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(Page::new(None, None), Page { limit: 25, offset: 0 });
        assert_eq!(Page::new(Some(3), Some(10)), Page { limit: 10, offset: 20 });
        assert_eq!(Page::new(Some(0), Some(1000)), Page { limit: 100, offset: 0 });
    }
}
