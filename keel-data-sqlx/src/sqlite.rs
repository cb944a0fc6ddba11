//! SQLite implementations of the repository contracts.

use keel_data::restrict;
use keel_data::{
    CursoredPage, DataError, DataResult, Entity, Mode, Page, PageRequest, QueryRepository,
    Repository, RepositoryAssist, ResourceRegistry, Restriction, Value,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Sqlite};

use crate::error::SqlxErrorExt;
use crate::repository::SqlxRepository;

/// Bind keel values to a query in placeholder order.
///
/// UUIDs and timestamps are stored as text (RFC 3339 for timestamps), which
/// keeps their SQLite ordering consistent with `Value::compare`.
macro_rules! bind_values {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for value in $params {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(b),
                Value::Int(i) => query.bind(i),
                Value::Float(f) => query.bind(f),
                Value::Text(s) => query.bind(s),
                Value::Uuid(u) => query.bind(u.to_string()),
                Value::Timestamp(t) => query.bind(t.to_rfc3339()),
            };
        }
        query
    }};
}

impl<T> SqlxRepository<T, Sqlite>
where
    T: Entity + for<'r> FromRow<'r, SqliteRow>,
{
    async fn fetch(&self, sql: &str, params: Vec<Value>) -> DataResult<Vec<T>> {
        tracing::debug!(sql, params = params.len(), "sqlx fetch");
        bind_values!(sqlx::query_as::<Sqlite, T>(sql), params)
            .fetch_all(self.pool())
            .await
            .map_err(SqlxErrorExt::into_data_error)
    }

    async fn fetch_count(&self, sql: &str, params: Vec<Value>) -> DataResult<u64> {
        tracing::debug!(sql, params = params.len(), "sqlx count");
        let count: i64 = bind_values!(sqlx::query_scalar::<Sqlite, i64>(sql), params)
            .fetch_one(self.pool())
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn check_size(&self, request: &PageRequest) -> DataResult<()> {
        let max = self.settings().max_page_size;
        if request.page_size() > max {
            return Err(DataError::illegal_argument(format!(
                "page size {} exceeds the maximum of {max}",
                request.page_size()
            )));
        }
        Ok(())
    }

    async fn total(
        &self,
        restriction: Option<&Restriction<T>>,
        request: &PageRequest,
    ) -> DataResult<Option<u64>> {
        if !request.requests_total() {
            return Ok(None);
        }
        let (sql, params) = self
            .builder(T::table_name())
            .filter_opt(restriction)
            .build_count()?;
        self.fetch_count(&sql, params).await.map(Some)
    }
}

impl<T> Repository<T, T::Id> for SqlxRepository<T, Sqlite>
where
    T: Entity + Clone + for<'r> FromRow<'r, SqliteRow>,
{
    async fn find_by_id(&self, id: &T::Id) -> DataResult<Option<T>> {
        let by_id = restrict::equal_to(T::id_column(), id.clone())?;
        let (sql, params) = self
            .builder(T::table_name())
            .filter(&by_id)
            .limit(1)
            .build_select(T::columns())?;
        Ok(self.fetch(&sql, params).await?.into_iter().next())
    }

    async fn find_all(&self) -> DataResult<Vec<T>> {
        let (sql, params) = self
            .builder(T::table_name())
            .build_select(T::columns())?;
        self.fetch(&sql, params).await
    }

    async fn find_all_paged(&self, request: &PageRequest) -> DataResult<Page<T>> {
        self.find_page(None, request).await
    }

    /// Insert, or update every non-id column when the id already exists.
    async fn save(&self, entity: &T) -> DataResult<T> {
        let columns = T::columns();
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            let value = entity.attribute(column).ok_or_else(|| {
                DataError::illegal_state(format!(
                    "entity {} has no attribute for column '{column}'",
                    T::table_name()
                ))
            })?;
            values.push(value);
        }
        let (sql, params) = self
            .builder(T::table_name())
            .build_upsert(columns, T::id_column(), values)?;
        tracing::debug!(sql = %sql, "sqlx save");
        bind_values!(sqlx::query::<Sqlite>(&sql), params)
            .execute(self.pool())
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(entity.clone())
    }

    async fn delete(&self, id: &T::Id) -> DataResult<bool> {
        let by_id = restrict::equal_to(T::id_column(), id.clone())?;
        let (sql, params) = self
            .builder(T::table_name())
            .filter(&by_id)
            .build_delete()?;
        tracing::debug!(sql = %sql, "sqlx delete");
        let result = bind_values!(sqlx::query::<Sqlite>(&sql), params)
            .execute(self.pool())
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> DataResult<u64> {
        let (sql, params) = self
            .builder(T::table_name())
            .build_count()?;
        self.fetch_count(&sql, params).await
    }
}

impl<T> QueryRepository<T> for SqlxRepository<T, Sqlite>
where
    T: Entity + Clone + for<'r> FromRow<'r, SqliteRow>,
{
    async fn find_where(&self, restriction: &Restriction<T>) -> DataResult<Vec<T>> {
        let (sql, params) = self
            .builder(T::table_name())
            .filter(restriction)
            .build_select(T::columns())?;
        self.fetch(&sql, params).await
    }

    async fn count_where(&self, restriction: &Restriction<T>) -> DataResult<u64> {
        let (sql, params) = self
            .builder(T::table_name())
            .filter(restriction)
            .build_count()?;
        self.fetch_count(&sql, params).await
    }

    async fn find_page(
        &self,
        restriction: Option<&Restriction<T>>,
        request: &PageRequest,
    ) -> DataResult<Page<T>> {
        if request.is_cursor() {
            return Err(DataError::illegal_argument(
                "keyset cursor requests must use find_cursored",
            ));
        }
        self.check_size(request)?;
        let (sql, params) = self
            .builder(T::table_name())
            .filter_opt(restriction)
            .order_by(request.sorts())
            .limit(request.page_size())
            .offset(request.offset())
            .build_select(T::columns())?;
        let content = self.fetch(&sql, params).await?;
        let total = self.total(restriction, request).await?;
        Ok(Page::new(content, request.clone(), total))
    }

    /// Fetches one row beyond the page size to learn whether the window
    /// continues in the direction of travel. The opposite direction is
    /// reported optimistically for cursor requests.
    async fn find_cursored(
        &self,
        restriction: Option<&Restriction<T>>,
        request: &PageRequest,
    ) -> DataResult<CursoredPage<T>> {
        if !self.settings().keyset_pagination {
            tracing::warn!(table = T::table_name(), "keyset pagination is disabled");
            return Err(DataError::unsupported(format!(
                "provider '{}' is configured without keyset pagination",
                self.settings().provider_name
            )));
        }
        self.check_size(request)?;
        if request.sorts().is_empty() {
            return Err(DataError::illegal_argument(
                "keyset pagination requires at least one sort criterion",
            ));
        }

        let mut builder = self
            .builder(T::table_name())
            .filter_opt(restriction)
            .order_by(request.sorts())
            .keyset(request.mode())
            .limit(request.page_size().saturating_add(1));
        if let Mode::Offset = request.mode() {
            builder = builder.offset(request.offset());
        }
        let (sql, params) = builder.build_select(T::columns())?;
        let mut rows = self.fetch(&sql, params).await?;

        let size = usize::try_from(request.page_size()).unwrap_or(usize::MAX);
        let more = rows.len() > size;
        rows.truncate(size);

        let (has_next, has_previous) = match request.mode() {
            Mode::Offset => (more, request.offset() > 0),
            Mode::CursorNext(_) => (more, true),
            Mode::CursorPrevious(_) => {
                rows.reverse();
                (true, more)
            }
        };
        tracing::debug!(
            table = T::table_name(),
            returned = rows.len(),
            has_next,
            has_previous,
            "cursored page"
        );

        let total = self.total(restriction, request).await?;
        let page = CursoredPage::new(rows, request.clone(), has_next, has_previous)?;
        Ok(match total {
            Some(total) => page.with_total(total),
            None => page,
        })
    }
}

impl<T> RepositoryAssist for SqlxRepository<T, Sqlite>
where
    T: Entity,
{
    fn provider_name(&self) -> &str {
        &self.settings().provider_name
    }

    fn resources(&self) -> &ResourceRegistry {
        self.resource_registry()
    }
}
