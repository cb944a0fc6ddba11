//! In-memory reference provider.
//!
//! Keeps entities in a shared `Vec` and evaluates restriction trees, sort
//! criteria and keyset windows directly against [`Entity::attribute`].
//! Comparisons follow SQL three-valued logic so that results agree with the
//! SQL providers: a comparison against a missing or null attribute is
//! unknown, and unknown never selects a row, negated or not.

use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::assist::{RepositoryAssist, ResourceRegistry};
use crate::config::DataSettings;
use crate::cursored::CursoredPage;
use crate::entity::Entity;
use crate::error::{DataError, DataResult};
use crate::page::{Cursor, Mode, Page, PageRequest};
use crate::repository::{QueryRepository, Repository};
use crate::restriction::{BasicRestriction, CompositeType, Operand, Operator, Restriction};
use crate::restrict::LIKE_ESCAPE;
use crate::sort::{Direction, Sort};
use crate::value::Value;

/// Shared handle to the backing store, supplied to default methods as a resource.
pub struct MemoryStore<T> {
    entities: Arc<RwLock<Vec<T>>>,
}

impl<T> MemoryStore<T> {
    pub async fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.entities.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.entities.write().await
    }
}

pub struct MemoryRepository<T> {
    entities: Arc<RwLock<Vec<T>>>,
    settings: DataSettings,
    resources: ResourceRegistry,
}

impl<T: Entity + Clone> MemoryRepository<T> {
    pub fn new() -> Self {
        Self::with_settings(DataSettings {
            provider_name: "memory".to_string(),
            ..DataSettings::default()
        })
    }

    pub fn with_settings(settings: DataSettings) -> Self {
        let entities = Arc::new(RwLock::new(Vec::new()));
        let handle = entities.clone();
        let resources = ResourceRegistry::new()
            .register(move || MemoryStore {
                entities: handle.clone(),
            })
            .register({
                let settings = settings.clone();
                move || settings.clone()
            });
        Self {
            entities,
            settings,
            resources,
        }
    }

    /// Replace the store contents.
    pub async fn seed(&self, entities: impl IntoIterator<Item = T>) {
        let mut store = self.entities.write().await;
        *store = entities.into_iter().collect();
        tracing::debug!(table = T::table_name(), count = store.len(), "memory store seeded");
    }

    /// Register an additional resource factory for default methods.
    pub fn with_resources(mut self, f: impl FnOnce(ResourceRegistry) -> ResourceRegistry) -> Self {
        self.resources = f(self.resources);
        self
    }

    pub fn settings(&self) -> &DataSettings {
        &self.settings
    }

    fn check_size(&self, request: &PageRequest) -> DataResult<()> {
        if request.page_size() > self.settings.max_page_size {
            return Err(DataError::illegal_argument(format!(
                "page size {} exceeds the maximum of {}",
                request.page_size(),
                self.settings.max_page_size
            )));
        }
        Ok(())
    }

    /// Matching entities in sort order, paired with their sort keys.
    async fn select(
        &self,
        restriction: Option<&Restriction<T>>,
        sorts: &[Sort],
    ) -> Vec<(Vec<Value>, T)> {
        let store = self.entities.read().await;
        let mut rows: Vec<(Vec<Value>, T)> = store
            .iter()
            .filter(|e| restriction.map_or(true, |r| matches(r, *e) == Some(true)))
            .map(|e| (sort_key(e, sorts), e.clone()))
            .collect();
        rows.sort_by(|(a, _), (b, _)| compare_keys(a, b, sorts));
        rows
    }
}

impl<T: Entity + Clone> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MemoryRepository<T> {
    fn clone(&self) -> Self {
        Self {
            entities: self.entities.clone(),
            settings: self.settings.clone(),
            resources: self.resources.clone(),
        }
    }
}

impl<T: Entity + Clone> Repository<T, T::Id> for MemoryRepository<T> {
    async fn find_by_id(&self, id: &T::Id) -> DataResult<Option<T>> {
        let store = self.entities.read().await;
        Ok(store.iter().find(|e| e.id() == id).cloned())
    }

    async fn find_all(&self) -> DataResult<Vec<T>> {
        Ok(self.entities.read().await.clone())
    }

    async fn find_all_paged(&self, request: &PageRequest) -> DataResult<Page<T>> {
        self.find_page(None, request).await
    }

    async fn save(&self, entity: &T) -> DataResult<T> {
        let mut store = self.entities.write().await;
        match store.iter_mut().find(|e| e.id() == entity.id()) {
            Some(existing) => *existing = entity.clone(),
            None => store.push(entity.clone()),
        }
        Ok(entity.clone())
    }

    async fn delete(&self, id: &T::Id) -> DataResult<bool> {
        let mut store = self.entities.write().await;
        let before = store.len();
        store.retain(|e| e.id() != id);
        Ok(store.len() < before)
    }

    async fn count(&self) -> DataResult<u64> {
        Ok(self.entities.read().await.len() as u64)
    }
}

impl<T: Entity + Clone> QueryRepository<T> for MemoryRepository<T> {
    async fn find_where(&self, restriction: &Restriction<T>) -> DataResult<Vec<T>> {
        Ok(self
            .select(Some(restriction), &[])
            .await
            .into_iter()
            .map(|(_, e)| e)
            .collect())
    }

    async fn count_where(&self, restriction: &Restriction<T>) -> DataResult<u64> {
        let store = self.entities.read().await;
        Ok(store
            .iter()
            .filter(|e| matches(restriction, *e) == Some(true))
            .count() as u64)
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
        let rows = self.select(restriction, request.sorts()).await;
        let total = rows.len() as u64;
        let content: Vec<T> = rows
            .into_iter()
            .skip(usize::try_from(request.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(request.page_size()).unwrap_or(usize::MAX))
            .map(|(_, e)| e)
            .collect();
        tracing::debug!(
            table = T::table_name(),
            page = request.page_number(),
            returned = content.len(),
            "offset page"
        );
        Ok(Page::new(
            content,
            request.clone(),
            request.requests_total().then_some(total),
        ))
    }

    async fn find_cursored(
        &self,
        restriction: Option<&Restriction<T>>,
        request: &PageRequest,
    ) -> DataResult<CursoredPage<T>> {
        if !self.settings.keyset_pagination {
            tracing::warn!(table = T::table_name(), "keyset pagination is disabled");
            return Err(DataError::unsupported(format!(
                "provider '{}' is configured without keyset pagination",
                self.settings.provider_name
            )));
        }
        self.check_size(request)?;
        let sorts = request.sorts();
        if sorts.is_empty() {
            return Err(DataError::illegal_argument(
                "keyset pagination requires at least one sort criterion",
            ));
        }
        if let Some(cursor) = request.cursor() {
            check_arity(cursor, sorts)?;
        }

        let rows = self.select(restriction, sorts).await;
        let total = rows.len() as u64;
        let size = usize::try_from(request.page_size()).unwrap_or(usize::MAX);

        let (content, has_next, has_previous) = match request.mode() {
            Mode::Offset => {
                let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
                let window: Vec<T> = rows.into_iter().skip(offset).map(|(_, e)| e).collect();
                let has_next = window.len() > size;
                let content: Vec<T> = window.into_iter().take(size).collect();
                (content, has_next, offset > 0)
            }
            Mode::CursorNext(cursor) => {
                let split = rows
                    .iter()
                    .position(|(k, _)| compare_keys(k, cursor.elements(), sorts) == Ordering::Greater)
                    .unwrap_or(rows.len());
                let after = rows.len() - split;
                let content: Vec<T> = rows.into_iter().skip(split).take(size).map(|(_, e)| e).collect();
                (content, after > size, split > 0)
            }
            Mode::CursorPrevious(cursor) => {
                let split = rows
                    .iter()
                    .position(|(k, _)| compare_keys(k, cursor.elements(), sorts) != Ordering::Less)
                    .unwrap_or(rows.len());
                let start = split.saturating_sub(size);
                let has_next = split < rows.len();
                let content: Vec<T> = rows
                    .into_iter()
                    .skip(start)
                    .take(split - start)
                    .map(|(_, e)| e)
                    .collect();
                (content, has_next, start > 0)
            }
        };
        let mode = match request.mode() {
            Mode::Offset => "offset",
            Mode::CursorNext(_) => "next",
            Mode::CursorPrevious(_) => "previous",
        };
        tracing::debug!(
            table = T::table_name(),
            mode,
            returned = content.len(),
            has_next,
            has_previous,
            "cursored page"
        );

        let page = CursoredPage::new(content, request.clone(), has_next, has_previous)?;
        Ok(if request.requests_total() {
            page.with_total(total)
        } else {
            page
        })
    }
}

impl<T: Entity + Clone> RepositoryAssist for MemoryRepository<T> {
    fn provider_name(&self) -> &str {
        &self.settings.provider_name
    }

    fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }
}

fn check_arity(cursor: &Cursor, sorts: &[Sort]) -> DataResult<()> {
    if cursor.len() != sorts.len() {
        return Err(DataError::illegal_argument(format!(
            "keyset cursor has {} values but the request has {} sort criteria",
            cursor.len(),
            sorts.len()
        )));
    }
    Ok(())
}

fn sort_key<T: Entity>(entity: &T, sorts: &[Sort]) -> Vec<Value> {
    sorts
        .iter()
        .map(|s| entity.attribute(&s.attribute).unwrap_or(Value::Null))
        .collect()
}

/// Lexicographic comparison of two sort keys under `sorts`.
fn compare_keys(a: &[Value], b: &[Value], sorts: &[Sort]) -> Ordering {
    for ((x, y), sort) in a.iter().zip(b).zip(sorts) {
        let ord = if sort.ignore_case {
            total_cmp(&x.fold_case(), &y.fold_case())
        } else {
            total_cmp(x, y)
        };
        let ord = match sort.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

// Incomparable variants fall back to grouping by type so sorting stays total.
fn total_cmp(a: &Value, b: &Value) -> Ordering {
    a.compare(b)
        .unwrap_or_else(|| a.type_name().cmp(b.type_name()))
}

/// Evaluate a restriction: `Some(true)` selects, `None` is SQL's unknown.
pub(crate) fn matches<T: Entity>(restriction: &Restriction<T>, entity: &T) -> Option<bool> {
    match restriction {
        Restriction::Basic(b) => matches_basic(b, entity),
        Restriction::Composite(c) => {
            let mut unknown = false;
            let decided = match c.kind() {
                CompositeType::All => false,
                CompositeType::Any => true,
            };
            let mut outcome = !decided;
            for child in c.restrictions() {
                match matches(child, entity) {
                    Some(v) if v == decided => {
                        outcome = decided;
                        unknown = false;
                        break;
                    }
                    Some(_) => {}
                    None => unknown = true,
                }
            }
            let outcome = if unknown { None } else { Some(outcome) };
            if c.is_negated() {
                outcome.map(|v| !v)
            } else {
                outcome
            }
        }
    }
}

fn matches_basic<T: Entity>(b: &BasicRestriction<T>, entity: &T) -> Option<bool> {
    let op = if b.is_negated() {
        b.operator().complement()
    } else {
        b.operator()
    };
    let actual = entity.attribute(b.attribute()).unwrap_or(Value::Null);
    match op {
        Operator::IsNull => return Some(actual.is_null()),
        Operator::IsNotNull => return Some(!actual.is_null()),
        _ if actual.is_null() => return None,
        _ => {}
    }
    let fold = |v: &Value| {
        if b.is_ignore_case() {
            v.fold_case()
        } else {
            v.clone()
        }
    };
    let actual = fold(&actual);
    let eq = |v: &Value| actual.compare(&fold(v)) == Some(Ordering::Equal);
    let cmp = |v: &Value| actual.compare(&fold(v));

    match (op, b.operand()) {
        (Operator::Equal, Operand::One(v)) => Some(eq(v)),
        (Operator::NotEqual, Operand::One(v)) => Some(!eq(v)),
        (Operator::LessThan, Operand::One(v)) => cmp(v).map(|o| o == Ordering::Less),
        (Operator::LessThanEqual, Operand::One(v)) => cmp(v).map(|o| o != Ordering::Greater),
        (Operator::GreaterThan, Operand::One(v)) => cmp(v).map(|o| o == Ordering::Greater),
        (Operator::GreaterThanEqual, Operand::One(v)) => cmp(v).map(|o| o != Ordering::Less),
        (Operator::Between | Operator::NotBetween, Operand::Two(low, high)) => {
            let inside = cmp(low)? != Ordering::Less && cmp(high)? != Ordering::Greater;
            Some(inside == (op == Operator::Between))
        }
        (Operator::Like | Operator::NotLike, Operand::One(pattern)) => {
            let text = actual.as_text()?;
            let pattern = fold(pattern);
            let hit = like_match(pattern.as_text()?, text);
            Some(hit == (op == Operator::Like))
        }
        (Operator::In, Operand::Many(values)) => Some(values.iter().any(eq)),
        (Operator::NotIn, Operand::Many(values)) => Some(!values.iter().any(eq)),
        _ => None,
    }
}

enum LikeToken {
    Any,
    One,
    Lit(char),
}

/// `LIKE` matching with `%`, `_` and backslash escapes.
pub(crate) fn like_match(pattern: &str, text: &str) -> bool {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::Any,
            '_' => LikeToken::One,
            LIKE_ESCAPE => LikeToken::Lit(chars.next().unwrap_or(LIKE_ESCAPE)),
            other => LikeToken::Lit(other),
        });
    }
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::Any) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(LikeToken::One) => {
                p += 1;
                t += 1;
            }
            Some(LikeToken::Lit(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((bp, bt)) => {
                    backtrack = Some((bp, bt + 1));
                    p = bp + 1;
                    t = bt + 1;
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|tok| matches!(tok, LikeToken::Any))
}
