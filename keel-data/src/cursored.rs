//! Keyset-aware pages.
//!
//! A [`CursoredPage`] carries, for every result position, the keyset cursor
//! of that result: the values of the request's sort attributes in the same
//! order of precedence. Requests for adjacent pages are relative to those
//! values rather than to a numeric offset, which keeps traversal stable when
//! rows are inserted or removed between requests.
//!
//! Page numbers and totals are not reliable in this mode. Traversing
//! backwards never yields a page number below 1, so several consecutive
//! pages may all report page 1.

use serde::Serialize;

use crate::entity::Entity;
use crate::error::{DataError, DataResult};
use crate::page::{Cursor, Mode, PageRequest};
use crate::sort::Sort;

#[derive(Debug, Clone, Serialize)]
pub struct CursoredPage<T> {
    content: Vec<T>,
    cursors: Vec<Cursor>,
    request: PageRequest,
    has_next: bool,
    has_previous: bool,
    total_elements: Option<u64>,
}

/// Keyset cursor of `entity` under the given sort criteria.
pub fn keyset_of<T: Entity>(entity: &T, sorts: &[Sort]) -> DataResult<Cursor> {
    let mut values = Vec::with_capacity(sorts.len());
    for sort in sorts {
        let value = entity.attribute(&sort.attribute).ok_or_else(|| {
            DataError::illegal_state(format!(
                "entity {} has no attribute '{}' to build a keyset cursor",
                T::table_name(),
                sort.attribute
            ))
        })?;
        if value.is_null() {
            return Err(DataError::illegal_state(format!(
                "keyset attribute '{}' of {} id={} is null",
                sort.attribute,
                T::table_name(),
                entity.id().to_string()
            )));
        }
        values.push(value);
    }
    Cursor::new(values)
}

impl<T: Entity> CursoredPage<T> {
    /// Build a page from results in forward sort order.
    ///
    /// `has_next` / `has_previous` are the provider's knowledge of adjacent
    /// windows; they may be optimistic but must be `false` only when no such
    /// window exists.
    pub fn new(
        content: Vec<T>,
        request: PageRequest,
        has_next: bool,
        has_previous: bool,
    ) -> DataResult<Self> {
        if request.sorts().is_empty() {
            return Err(DataError::illegal_argument(
                "keyset pagination requires at least one sort criterion",
            ));
        }
        if let Some(cursor) = request.cursor() {
            if cursor.len() != request.sorts().len() {
                return Err(DataError::illegal_argument(format!(
                    "keyset cursor has {} values but the request has {} sort criteria",
                    cursor.len(),
                    request.sorts().len()
                )));
            }
        }
        let cursors = content
            .iter()
            .map(|entity| keyset_of(entity, request.sorts()))
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Self {
            content,
            cursors,
            request,
            has_next,
            has_previous,
            total_elements: None,
        })
    }
}

impl<T> CursoredPage<T> {
    pub fn with_total(mut self, total_elements: u64) -> Self {
        self.total_elements = Some(total_elements);
        self
    }

    /// Cursor for the result at `index` (0 is first).
    pub fn get_keyset_cursor(&self, index: usize) -> DataResult<&Cursor> {
        self.cursors.get(index).ok_or_else(|| {
            DataError::illegal_argument(format!(
                "index {index} is out of range for a page of {} results",
                self.cursors.len()
            ))
        })
    }

    pub fn content(&self) -> &[T] {
        &self.content
    }

    pub fn into_content(self) -> Vec<T> {
        self.content
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

    /// Not accurate under keyset pagination; informational only.
    pub fn total_elements(&self) -> Option<u64> {
        self.total_elements
    }

    pub fn has_next(&self) -> bool {
        self.has_content() && self.has_next
    }

    /// Best effort: may be `true` even if the previous window turns out empty.
    pub fn has_previous(&self) -> bool {
        self.has_content() && self.has_previous
    }

    /// Request for the results strictly after the last result of this page.
    pub fn next_page_request(&self) -> DataResult<PageRequest> {
        let last = match self.cursors.last() {
            Some(cursor) if self.has_next => cursor,
            Some(_) => return Err(DataError::no_such_element("there is no next page")),
            None => return Err(DataError::no_such_element("the current page is empty")),
        };
        Ok(self.request.relative(
            self.request.page_number().saturating_add(1),
            Mode::CursorNext(last.clone()),
        ))
    }

    /// Request for the results strictly before the first result of this page.
    ///
    /// Results of the returned window are still presented in forward sort order.
    pub fn previous_page_request(&self) -> DataResult<PageRequest> {
        let first = match self.cursors.first() {
            Some(cursor) if self.has_previous => cursor,
            Some(_) => return Err(DataError::no_such_element("there is no previous page")),
            None => return Err(DataError::no_such_element("the current page is empty")),
        };
        Ok(self.request.relative(
            self.request.page_number().saturating_sub(1),
            Mode::CursorPrevious(first.clone()),
        ))
    }
}
