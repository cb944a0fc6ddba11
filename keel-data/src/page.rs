use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::sort::Sort;
use crate::value::Value;

/// Page size used when a request does not specify one.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// An ordered tuple of sort-key values identifying a position in a sorted
/// result set. Element `i` corresponds to sort criterion `i`.
///
/// Serialized as a plain array; deserializing applies the same checks as
/// [`Cursor::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Value>", into = "Vec<Value>")]
pub struct Cursor {
    elements: Vec<Value>,
}

impl Cursor {
    pub fn new(elements: Vec<Value>) -> DataResult<Self> {
        if elements.is_empty() {
            return Err(DataError::illegal_argument(
                "A keyset cursor requires at least one value.",
            ));
        }
        if let Some(pos) = elements.iter().position(Value::is_null) {
            return Err(DataError::illegal_argument(format!(
                "Keyset cursor value at position {pos} is null; keyset attributes must be non-null."
            )));
        }
        Ok(Self { elements })
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.elements.get(index)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Encode to an opaque base64url token (no padding) suitable for URLs.
    pub fn encode(&self) -> DataResult<String> {
        let json = serde_json::to_vec(&self.elements)
            .map_err(|e| DataError::Other(format!("cursor encoding failed: {e}")))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a token produced by [`Cursor::encode`].
    pub fn decode(token: &str) -> DataResult<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| DataError::illegal_argument("invalid cursor: invalid base64url encoding"))?;
        let elements: Vec<Value> = serde_json::from_slice(&bytes)
            .map_err(|_| DataError::illegal_argument("invalid cursor: malformed JSON"))?;
        Self::new(elements)
    }
}

impl TryFrom<Vec<Value>> for Cursor {
    type Error = DataError;

    fn try_from(elements: Vec<Value>) -> Result<Self, Self::Error> {
        Self::new(elements)
    }
}

impl From<Cursor> for Vec<Value> {
    fn from(cursor: Cursor) -> Self {
        cursor.elements
    }
}

/// How a [`PageRequest`] positions its window. The modes are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "cursor", rename_all = "snake_case")]
pub enum Mode {
    /// Absolute position: skip `(page - 1) * size` results.
    Offset,
    /// Results strictly after the cursor in sort order.
    CursorNext(Cursor),
    /// Results strictly before the cursor in sort order, presented in forward order.
    CursorPrevious(Cursor),
}

/// Pagination information for a query: page number (1-based), size, sort
/// criteria, and either an offset or a keyset cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPageRequest")]
pub struct PageRequest {
    page: u64,
    size: u64,
    sorts: Vec<Sort>,
    mode: Mode,
    request_total: bool,
}

/// Wire form of [`PageRequest`], validated before use.
#[derive(Deserialize)]
struct RawPageRequest {
    page: u64,
    size: u64,
    #[serde(default)]
    sorts: Vec<Sort>,
    #[serde(default = "default_mode")]
    mode: Mode,
    #[serde(default = "default_request_total")]
    request_total: bool,
}

impl TryFrom<RawPageRequest> for PageRequest {
    type Error = DataError;

    fn try_from(raw: RawPageRequest) -> Result<Self, Self::Error> {
        let request = Self {
            sorts: raw.sorts,
            mode: raw.mode,
            request_total: raw.request_total,
            ..Self::default()
        };
        request.page(raw.page)?.size(raw.size)
    }
}

fn default_mode() -> Mode {
    Mode::Offset
}

fn default_request_total() -> bool {
    true
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
            sorts: Vec::new(),
            mode: Mode::Offset,
            request_total: true,
        }
    }
}

impl PageRequest {
    /// Request for the given 1-based page with the default size.
    pub fn of_page(page: u64) -> DataResult<Self> {
        Self::default().page(page)
    }

    /// Request for the first page with the given size.
    pub fn of_size(size: u64) -> DataResult<Self> {
        Self::default().size(size)
    }

    pub fn page(mut self, page: u64) -> DataResult<Self> {
        if page < 1 {
            return Err(DataError::illegal_argument("page number must be at least 1"));
        }
        self.page = page;
        Ok(self)
    }

    pub fn size(mut self, size: u64) -> DataResult<Self> {
        if size < 1 {
            return Err(DataError::illegal_argument("page size must be at least 1"));
        }
        self.size = size;
        Ok(self)
    }

    /// Replace the sort criteria. Earlier entries take precedence.
    pub fn sort_by(mut self, sorts: impl IntoIterator<Item = Sort>) -> Self {
        self.sorts = sorts.into_iter().collect();
        self
    }

    /// Append a lower-precedence sort criterion.
    pub fn then_sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn with_total(mut self) -> Self {
        self.request_total = true;
        self
    }

    pub fn without_total(mut self) -> Self {
        self.request_total = false;
        self
    }

    /// Keyset request for results after the given sort-key values.
    pub fn after_keyset(self, values: Vec<Value>) -> DataResult<Self> {
        Ok(self.after_cursor(Cursor::new(values)?))
    }

    /// Keyset request for results before the given sort-key values.
    pub fn before_keyset(self, values: Vec<Value>) -> DataResult<Self> {
        Ok(self.before_cursor(Cursor::new(values)?))
    }

    pub fn after_cursor(mut self, cursor: Cursor) -> Self {
        self.mode = Mode::CursorNext(cursor);
        self
    }

    pub fn before_cursor(mut self, cursor: Cursor) -> Self {
        self.mode = Mode::CursorPrevious(cursor);
        self
    }

    pub fn page_number(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.size
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        match &self.mode {
            Mode::Offset => None,
            Mode::CursorNext(c) | Mode::CursorPrevious(c) => Some(c),
        }
    }

    pub fn is_cursor(&self) -> bool {
        !matches!(self.mode, Mode::Offset)
    }

    pub fn requests_total(&self) -> bool {
        self.request_total
    }

    /// Number of results skipped in offset mode.
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.size)
    }

    /// Offset request for the following page with the same size and sort criteria.
    #[must_use]
    pub fn next(&self) -> Self {
        Self {
            page: self.page.saturating_add(1),
            size: self.size,
            sorts: self.sorts.clone(),
            mode: Mode::Offset,
            request_total: self.request_total,
        }
    }

    /// Offset request for the preceding page, or `None` on the first page.
    pub fn previous(&self) -> Option<Self> {
        if self.page <= 1 {
            return None;
        }
        Some(Self {
            page: self.page - 1,
            size: self.size,
            sorts: self.sorts.clone(),
            mode: Mode::Offset,
            request_total: self.request_total,
        })
    }

    /// Derived request carrying a cursor; the page number never drops below 1.
    pub(crate) fn relative(&self, page: u64, mode: Mode) -> Self {
        Self {
            page: page.max(1),
            size: self.size,
            sorts: self.sorts.clone(),
            mode,
            request_total: self.request_total,
        }
    }
}

/// A page of results with pagination metadata (offset mode).
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub request: PageRequest,
    pub total_elements: Option<u64>,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: PageRequest, total_elements: Option<u64>) -> Self {
        Self {
            content,
            request,
            total_elements,
        }
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }

    pub fn number_of_elements(&self) -> usize {
        self.content.len()
    }

    pub fn page_request(&self) -> &PageRequest {
        &self.request
    }

    pub fn total_elements(&self) -> Option<u64> {
        self.total_elements
    }

    pub fn total_pages(&self) -> Option<u64> {
        let size = self.request.page_size();
        self.total_elements.map(|total| total.div_ceil(size))
    }

    /// Exact when the total is known; otherwise a full page is assumed to have a successor.
    pub fn has_next(&self) -> bool {
        match self.total_elements {
            Some(total) => self.request.offset() + (self.content.len() as u64) < total,
            None => self.has_content() && self.content.len() as u64 >= self.request.page_size(),
        }
    }

    pub fn has_previous(&self) -> bool {
        self.request.page_number() > 1
    }

    pub fn next_page_request(&self) -> DataResult<PageRequest> {
        if !self.has_next() {
            return Err(DataError::no_such_element(format!(
                "page {} is the last page",
                self.request.page_number()
            )));
        }
        Ok(self.request.next())
    }

    pub fn previous_page_request(&self) -> DataResult<PageRequest> {
        self.request
            .previous()
            .ok_or_else(|| DataError::no_such_element("the first page has no previous page"))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            request: self.request,
            total_elements: self.total_elements,
        }
    }
}
