//! # keel-data
//!
//! Provider-neutral data access API: restriction trees, offset and keyset
//! pagination, async repository contracts and the [`RepositoryAssist`]
//! mix-in through which default repository methods reach provider
//! resources. Providers (see `keel-data-sqlx`) translate these into their
//! native queries; [`memory::MemoryRepository`] is the in-memory reference.
//!
//! ```ignore
//! use keel_data::prelude::*;
//!
//! let request = PageRequest::of_size(10)?.sort_by([Sort::asc("last_name"), Sort::asc("id")]);
//! let first = repo.find_cursored(Some(&restrict::greater_than("hours", 40)?), &request).await?;
//! if first.has_next() {
//!     let second = repo.find_cursored(None, &first.next_page_request()?).await?;
//! }
//! ```

pub mod assist;
pub mod config;
pub mod cursored;
pub mod entity;
pub mod error;
pub mod logging;
pub mod memory;
pub mod page;
pub mod query;
pub mod repository;
pub mod restrict;
pub mod restriction;
pub mod sort;
pub mod value;

pub use assist::{Closeable, Keyword, RepositoryAssist, ResourceRegistry, ResourceScope};
pub use config::{ConfigError, DataSettings};
pub use cursored::CursoredPage;
pub use entity::Entity;
pub use error::{DataError, DataResult};
pub use logging::init_tracing;
pub use memory::MemoryRepository;
pub use page::{Cursor, Mode, Page, PageRequest};
pub use query::{Dialect, IdentifierPolicy, QueryBuilder};
pub use repository::{QueryRepository, Repository};
pub use restriction::{
    BasicRestriction, CompositeRestriction, CompositeType, Operand, Operator, Restriction,
};
pub use sort::{Direction, Sort};
pub use value::Value;

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::restrict;
    pub use crate::{
        CursoredPage, DataError, DataResult, Entity, Page, PageRequest, QueryRepository,
        Repository, RepositoryAssist, Restriction, Sort, Value,
    };
}
