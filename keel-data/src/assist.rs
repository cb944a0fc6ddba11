//! Repository mix-in that gives default-method bodies access to provider
//! facilities: typed resources (pools, connections, sessions) and keyword
//! feature detection.
//!
//! Resources are only available through a [`ResourceScope`], which the
//! provider creates for the duration of one default-method invocation and
//! passes in explicitly. Once the invocation returns the scope is closed:
//! further lookups fail with `DataError::IllegalState`, and every closeable
//! resource the body did not close itself is closed by the scope.
//!
//! ```ignore
//! impl Products {
//!     async fn low_priced_or_discounted(&self, max: f64, min: f64) -> DataResult<Vec<Product>> {
//!         if self.repo.supports_keyword("Or") {
//!             return self.repo.find_where(&any(vec![
//!                 less_than("price", max)?,
//!                 greater_than("discount", min)?,
//!             ])?).await;
//!         }
//!         self.repo
//!             .invoke_default("low_priced_or_discounted", |scope| async move {
//!                 let pool = scope.resource::<SqlitePool>()?.ok_or_else(|| ...)?;
//!                 ...
//!             })
//!             .await
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{DataError, DataResult};

/// Query keywords that may appear in repository method names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    And,
    Or,
    Not,
    Between,
    Contains,
    EndsWith,
    StartsWith,
    Like,
    In,
    Null,
    Empty,
    True,
    False,
    Equal,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    IgnoreCase,
    OrderBy,
    Asc,
    Desc,
    First,
}

impl Keyword {
    pub const ALL: &'static [Keyword] = &[
        Keyword::And,
        Keyword::Or,
        Keyword::Not,
        Keyword::Between,
        Keyword::Contains,
        Keyword::EndsWith,
        Keyword::StartsWith,
        Keyword::Like,
        Keyword::In,
        Keyword::Null,
        Keyword::Empty,
        Keyword::True,
        Keyword::False,
        Keyword::Equal,
        Keyword::LessThan,
        Keyword::LessThanEqual,
        Keyword::GreaterThan,
        Keyword::GreaterThanEqual,
        Keyword::IgnoreCase,
        Keyword::OrderBy,
        Keyword::Asc,
        Keyword::Desc,
        Keyword::First,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::And => "And",
            Keyword::Or => "Or",
            Keyword::Not => "Not",
            Keyword::Between => "Between",
            Keyword::Contains => "Contains",
            Keyword::EndsWith => "EndsWith",
            Keyword::StartsWith => "StartsWith",
            Keyword::Like => "Like",
            Keyword::In => "In",
            Keyword::Null => "Null",
            Keyword::Empty => "Empty",
            Keyword::True => "True",
            Keyword::False => "False",
            Keyword::Equal => "Equal",
            Keyword::LessThan => "LessThan",
            Keyword::LessThanEqual => "LessThanEqual",
            Keyword::GreaterThan => "GreaterThan",
            Keyword::GreaterThanEqual => "GreaterThanEqual",
            Keyword::IgnoreCase => "IgnoreCase",
            Keyword::OrderBy => "OrderBy",
            Keyword::Asc => "Asc",
            Keyword::Desc => "Desc",
            Keyword::First => "First",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Keyword {
    type Err = DataError;

    /// Exact, case-sensitive match of a single keyword. Combinations such as
    /// `IgnoreCaseLike` are not keywords.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Keyword::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DataError::illegal_argument(format!("'{s}' is not a keyword")))
    }
}

/// Whether `token` is shaped like a single keyword: starts with an uppercase
/// letter and contains only ASCII letters and digits.
pub fn is_keyword_token(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// A resource the provider closes after a default method returns, unless
/// the method already closed it.
pub trait Closeable: Send + Sync {
    fn close(&self) -> DataResult<()>;
    fn is_closed(&self) -> bool;
}

struct Supplied {
    value: Arc<dyn Any + Send + Sync>,
    closer: Option<Arc<dyn Closeable>>,
}

type Factory = Arc<dyn Fn() -> Supplied + Send + Sync>;

/// Provider-registered resource factories, keyed by resource type.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    factories: HashMap<TypeId, Factory>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a plain (non-closeable) resource type.
    pub fn register<R, F>(mut self, factory: F) -> Self
    where
        R: Send + Sync + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || Supplied {
            value: Arc::new(factory()),
            closer: None,
        });
        self.factories.insert(TypeId::of::<R>(), factory);
        self
    }

    /// Register a factory for a resource that must be closed after use.
    pub fn register_closeable<R, F>(mut self, factory: F) -> Self
    where
        R: Closeable + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move || {
            let resource = Arc::new(factory());
            Supplied {
                value: resource.clone(),
                closer: Some(resource),
            }
        });
        self.factories.insert(TypeId::of::<R>(), factory);
        self
    }

    pub fn supplies<R: 'static>(&self) -> bool {
        self.factories.contains_key(&TypeId::of::<R>())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRegistry")
            .field("resources", &self.factories.len())
            .finish()
    }
}

struct ScopeInner {
    method: String,
    registry: ResourceRegistry,
    active: AtomicBool,
    issued: Mutex<Vec<Arc<dyn Closeable>>>,
}

/// Context for one invocation of a repository default method.
///
/// Cheap to clone; all clones share the same lifetime, so a clone that
/// escapes the invocation is rejected once the invocation has returned.
#[derive(Clone)]
pub struct ResourceScope {
    inner: Arc<ScopeInner>,
}

impl ResourceScope {
    fn open(method: &str, registry: ResourceRegistry) -> Self {
        tracing::trace!(method, "opening resource scope");
        Self {
            inner: Arc::new(ScopeInner {
                method: method.to_string(),
                registry,
                active: AtomicBool::new(true),
                issued: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// A new instance of resource type `R`, or `None` if the provider does not
    /// supply that type.
    pub fn resource<R: Send + Sync + 'static>(&self) -> DataResult<Option<Arc<R>>> {
        if !self.is_active() {
            return Err(DataError::illegal_state(format!(
                "resources can only be requested while '{}' is running",
                self.inner.method
            )));
        }
        let Some(factory) = self.inner.registry.factories.get(&TypeId::of::<R>()) else {
            return Ok(None);
        };
        let supplied = factory();
        if let Some(closer) = supplied.closer {
            self.inner
                .issued
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(closer);
        }
        supplied.value.downcast::<R>().map(Some).map_err(|_| {
            DataError::illegal_state(format!(
                "resource registered for {} has a different type",
                std::any::type_name::<R>()
            ))
        })
    }

    /// End the scope and close every issued resource that is still open.
    /// Returns the first close failure, after attempting all of them.
    fn close(&self) -> DataResult<()> {
        self.inner.active.store(false, Ordering::Release);
        let issued: Vec<_> = std::mem::take(
            &mut *self
                .inner
                .issued
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        let mut first_err = None;
        let mut closed = 0usize;
        for resource in issued {
            if resource.is_closed() {
                continue;
            }
            closed += 1;
            if let Err(err) = resource.close() {
                tracing::warn!(method = %self.inner.method, error = %err, "failed to close resource");
                first_err.get_or_insert(err);
            }
        }
        tracing::trace!(method = %self.inner.method, closed, "resource scope closed");
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceScope")
            .field("method", &self.inner.method)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Mix-in implemented by providers for repositories that need provider
/// information or resources inside their default methods.
pub trait RepositoryAssist: Send + Sync {
    /// Name of the provider backing this repository.
    fn provider_name(&self) -> &str;

    /// Standard keywords this provider supports.
    fn supported_keywords(&self) -> &[Keyword] {
        Keyword::ALL
    }

    /// Provider-specific keywords beyond [`Keyword`]. `keyword` is already
    /// known to be shaped like a single keyword.
    fn supports_custom_keyword(&self, _keyword: &str) -> bool {
        false
    }

    /// Whether a single keyword, written with the first letter of each word
    /// capitalized (`LessThan`, `IgnoreCase`), is supported. Combinations of
    /// keywords and malformed strings report `false`.
    fn supports_keyword(&self, keyword: &str) -> bool {
        match keyword.parse::<Keyword>() {
            Ok(k) => self.supported_keywords().contains(&k),
            Err(_) => is_keyword_token(keyword) && self.supports_custom_keyword(keyword),
        }
    }

    fn resources(&self) -> &ResourceRegistry;

    /// Run a default-method body with a fresh [`ResourceScope`].
    ///
    /// The scope is closed when the body's future completes, whether it
    /// succeeded or not. A body error takes precedence over a close error.
    fn invoke_default<F, Fut, R>(
        &self,
        method: &str,
        body: F,
    ) -> impl Future<Output = DataResult<R>> + Send
    where
        F: FnOnce(ResourceScope) -> Fut + Send,
        Fut: Future<Output = DataResult<R>> + Send,
        R: Send,
    {
        let scope = ResourceScope::open(method, self.resources().clone());
        async move {
            let result = body(scope.clone()).await;
            let closed = scope.close();
            let value = result?;
            closed?;
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_parsing_is_exact() {
        assert_eq!("LessThan".parse::<Keyword>().unwrap(), Keyword::LessThan);
        assert!("lessThan".parse::<Keyword>().is_err());
        assert!("IgnoreCaseLike".parse::<Keyword>().is_err());
        assert!("LESSTHAN".parse::<Keyword>().is_err());
    }

    #[test]
    fn keyword_token_shape() {
        assert!(is_keyword_token("Near"));
        assert!(!is_keyword_token("near"));
        assert!(!is_keyword_token("Not Null"));
        assert!(!is_keyword_token(""));
    }

    #[test]
    fn every_keyword_round_trips_through_its_name() {
        for k in Keyword::ALL {
            assert_eq!(k.as_str().parse::<Keyword>().unwrap(), *k);
        }
    }

    #[test]
    fn registry_reports_supplied_types() {
        let registry = ResourceRegistry::new().register(|| String::from("conn"));
        assert!(registry.supplies::<String>());
        assert!(!registry.supplies::<u32>());
        assert_eq!(registry.len(), 1);
    }
}
