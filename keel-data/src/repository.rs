use crate::cursored::CursoredPage;
use crate::error::DataError;
use crate::page::{Page, PageRequest};
use crate::restriction::Restriction;
use std::future::Future;

/// Generic async repository trait for CRUD operations.
///
/// Uses RPITIT (return-position `impl Trait` in traits), no `async-trait` needed.
pub trait Repository<T, ID>: Send + Sync
where
    T: Send + Sync + 'static,
    ID: Send + Sync + 'static,
{
    fn find_by_id(&self, id: &ID) -> impl Future<Output = Result<Option<T>, DataError>> + Send;
    fn find_all(&self) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;
    fn find_all_paged(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Page<T>, DataError>> + Send;
    fn save(&self, entity: &T) -> impl Future<Output = Result<T, DataError>> + Send;
    fn delete(&self, id: &ID) -> impl Future<Output = Result<bool, DataError>> + Send;
    fn count(&self) -> impl Future<Output = Result<u64, DataError>> + Send;
}

/// Restriction-based queries and keyset pagination.
///
/// Providers translate the restriction tree into their native predicate,
/// honouring operator semantics, the composite type and the negation flag
/// of every node.
pub trait QueryRepository<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    fn find_where(
        &self,
        restriction: &Restriction<T>,
    ) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;

    fn count_where(
        &self,
        restriction: &Restriction<T>,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Offset page. A request carrying a keyset cursor is rejected with
    /// `DataError::IllegalArgument`; use [`QueryRepository::find_cursored`].
    fn find_page(
        &self,
        restriction: Option<&Restriction<T>>,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Page<T>, DataError>> + Send;

    /// Keyset-aware page. Accepts offset requests (typically for the first
    /// page) and cursor requests. Stores that cannot select windows relative
    /// to a tuple of values fail with `DataError::UnsupportedOperation`
    /// instead of falling back to offsets.
    fn find_cursored(
        &self,
        restriction: Option<&Restriction<T>>,
        request: &PageRequest,
    ) -> impl Future<Output = Result<CursoredPage<T>, DataError>> + Send;
}
