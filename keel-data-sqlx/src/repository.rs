use std::marker::PhantomData;

use keel_data::query::{Dialect, QueryBuilder};
use keel_data::{DataError, DataResult, DataSettings, ResourceRegistry};
use sqlx::{Database, Pool};

/// A generic SQL-based repository implementation.
///
/// Wraps an `sqlx::Pool<DB>` for a given entity type and translates
/// restriction trees, sort criteria and keyset cursors into SQL.
///
/// # Example
///
/// ```ignore
/// let repo = SqlxRepository::<Employee, Sqlite>::new(pool.clone());
/// let page = repo.find_cursored(None, &request).await?;
/// ```
pub struct SqlxRepository<T, DB: Database> {
    pool: Pool<DB>,
    settings: DataSettings,
    dialect: Dialect,
    resources: ResourceRegistry,
    _marker: PhantomData<fn() -> T>,
}

impl<T, DB: Database> SqlxRepository<T, DB> {
    pub fn new(pool: Pool<DB>) -> Self {
        let settings = DataSettings {
            provider_name: "sqlx".to_string(),
            ..DataSettings::default()
        };
        Self::assemble(pool, settings, native_dialect::<DB>())
    }

    /// Create a repository with explicit settings.
    ///
    /// A `generic` dialect resolves to the driver's own; any other dialect
    /// must match the driver or `IllegalArgument` is returned.
    pub fn with_settings(pool: Pool<DB>, settings: DataSettings) -> DataResult<Self> {
        let native = native_dialect::<DB>();
        let dialect = match settings.dialect {
            Dialect::Generic => native,
            configured if configured == native => configured,
            configured => {
                return Err(DataError::illegal_argument(format!(
                    "dialect {configured:?} cannot be used with the {} driver",
                    DB::NAME
                )))
            }
        };
        Ok(Self::assemble(pool, settings, dialect))
    }

    fn assemble(pool: Pool<DB>, settings: DataSettings, dialect: Dialect) -> Self {
        let supplied = pool.clone();
        let resources = ResourceRegistry::new().register(move || supplied.clone());
        tracing::debug!(driver = DB::NAME, ?dialect, "sqlx repository created");
        Self {
            pool,
            settings,
            dialect,
            resources,
            _marker: PhantomData,
        }
    }

    /// Register an additional resource factory for default methods.
    pub fn with_resources(mut self, f: impl FnOnce(ResourceRegistry) -> ResourceRegistry) -> Self {
        self.resources = f(self.resources);
        self
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    pub fn settings(&self) -> &DataSettings {
        &self.settings
    }

    /// The SQL dialect queries are rendered in.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn resource_registry(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub(crate) fn builder(&self, table: &str) -> QueryBuilder<T> {
        QueryBuilder::new_with_dialect(table, self.dialect)
            .identifier_policy(self.settings.identifier_policy)
    }
}

impl<T, DB: Database> Clone for SqlxRepository<T, DB> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            settings: self.settings.clone(),
            dialect: self.dialect,
            resources: self.resources.clone(),
            _marker: PhantomData,
        }
    }
}

fn native_dialect<DB: Database>() -> Dialect {
    match DB::NAME {
        "SQLite" => Dialect::Sqlite,
        "MySQL" => Dialect::MySql,
        "PostgreSQL" => Dialect::Postgres,
        _ => Dialect::Generic,
    }
}
