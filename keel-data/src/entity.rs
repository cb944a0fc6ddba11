use std::hash::Hash;

use crate::value::Value;

/// Trait representing a persistent entity with a table name, id column,
/// column list and attribute access.
///
/// `attribute` is how providers read the sort-key values that make up a
/// keyset cursor, and how the in-memory provider evaluates restrictions.
///
/// # Example
///
/// ```ignore
/// impl Entity for Employee {
///     type Id = i64;
///     fn table_name() -> &'static str { "employees" }
///     fn id_column() -> &'static str { "id" }
///     fn columns() -> &'static [&'static str] { &["id", "last_name", "hours"] }
///     fn id(&self) -> &i64 { &self.id }
///     fn attribute(&self, name: &str) -> Option<Value> {
///         match name {
///             "id" => Some(self.id.into()),
///             "last_name" => Some(self.last_name.as_str().into()),
///             "hours" => Some(self.hours.into()),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Entity: Send + Sync + Unpin + 'static {
    type Id: Clone + Eq + Hash + Send + Sync + ToString + Into<Value> + 'static;

    fn table_name() -> &'static str;
    fn id_column() -> &'static str;
    fn columns() -> &'static [&'static str];
    fn id(&self) -> &Self::Id;

    /// Value of the named attribute, or `None` if the entity has no such attribute.
    fn attribute(&self, name: &str) -> Option<Value>;
}
