use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Reverse the sort direction (Asc <-> Desc)
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// One sort key. A query's sort criteria is an ordered `Vec<Sort>`; earlier
/// entries take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub attribute: String,
    pub direction: Direction,
    #[serde(default)]
    pub ignore_case: bool,
}

impl Sort {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: Direction::Asc,
            ignore_case: false,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: Direction::Desc,
            ignore_case: false,
        }
    }

    /// Ascending order comparing lower-cased text. Case folding covers ASCII
    /// letters only; other characters compare by code point.
    pub fn asc_ignore_case(attribute: impl Into<String>) -> Self {
        Self {
            ignore_case: true,
            ..Self::asc(attribute)
        }
    }

    /// Descending counterpart of [`Sort::asc_ignore_case`], with the same
    /// ASCII-only folding.
    pub fn desc_ignore_case(attribute: impl Into<String>) -> Self {
        Self {
            ignore_case: true,
            ..Self::desc(attribute)
        }
    }

    pub fn is_ascending(&self) -> bool {
        self.direction == Direction::Asc
    }

    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            attribute: self.attribute.clone(),
            direction: self.direction.reverse(),
            ignore_case: self.ignore_case,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        if self.ignore_case {
            write!(f, "LOWER({}) {dir}", self.attribute)
        } else {
            write!(f, "{} {dir}", self.attribute)
        }
    }
}
