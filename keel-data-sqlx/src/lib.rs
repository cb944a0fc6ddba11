//! # keel-data-sqlx: SQLx provider for the Keel data API
//!
//! This crate provides the [SQLx](https://github.com/launchbadge/sqlx)-specific
//! implementations of the `keel-data` repository contracts. Restriction trees,
//! sort criteria and keyset cursors are translated to SQL with
//! [`keel_data::QueryBuilder`] and executed against an `sqlx::Pool<DB>`.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqlxRepository`] | Repository holding an `sqlx::Pool<DB>`; implements `Repository`, `QueryRepository` and `RepositoryAssist` for SQLite |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Feature flags
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` (default) |
//!
//! # Quick start
//!
//! ```ignore
//! use keel_data::prelude::*;
//! use keel_data_sqlx::SqlxRepository;
//! use sqlx::Sqlite;
//!
//! let repo = SqlxRepository::<Employee, Sqlite>::new(pool.clone());
//! let request = PageRequest::of_size(20)?.sort_by([Sort::asc("last_name"), Sort::asc("id")]);
//! let page = repo.find_cursored(None, &request).await?;
//! let next = repo.find_cursored(None, &page.next_page_request()?).await?;
//! ```
//!
//! Entities must implement both [`keel_data::Entity`] and `sqlx::FromRow`.
//! The pool is supplied to default methods as a resource:
//!
//! ```ignore
//! repo.invoke_default("archive", |scope| async move {
//!     let pool = scope.resource::<SqlitePool>()?.ok_or_else(|| ...)?;
//!     sqlx::query("DELETE FROM employees WHERE hours = 0")
//!         .execute(&*pool)
//!         .await
//!         .map_err(|e| e.into_data_error())?;
//!     Ok(())
//! }).await?;
//! ```
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead.

pub mod error;
pub mod repository;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::{SqlxErrorExt, SqlxResult};
pub use repository::SqlxRepository;

/// Re-exports of the most commonly used types from both `keel-data` and this crate.
pub mod prelude {
    pub use crate::{SqlxErrorExt, SqlxRepository};
    pub use keel_data::prelude::*;
}
