//! Translation of restriction trees, sort criteria and keyset cursors into SQL.
//!
//! ```ignore
//! let (sql, params) = QueryBuilder::<Book>::new("books")
//!     .dialect(Dialect::Postgres)
//!     .filter(&restrict::starts_with("title", "Dune")?)
//!     .order_by(request.sorts())
//!     .keyset(request.mode())
//!     .limit(request.page_size() + 1)
//!     .build_select(&["*"])?;
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::page::{Cursor, Mode};
use crate::restrict::LIKE_ESCAPE;
use crate::restriction::{BasicRestriction, CompositeType, Operand, Operator, Restriction};
use crate::sort::{Direction, Sort};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Generic SQL using `?` placeholders (default).
    Generic,
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// MySQL-style `?` placeholders with backtick quoting.
    MySql,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Generic | Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }

    fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Generic | Dialect::Sqlite | Dialect::Postgres => '"',
        }
    }

    // MySQL treats backslash as an escape inside string literals.
    fn like_escape(self) -> &'static str {
        match self {
            Dialect::MySql => " ESCAPE '\\\\'",
            Dialect::Generic | Dialect::Sqlite | Dialect::Postgres => " ESCAPE '\\'",
        }
    }
}

impl FromStr for Dialect {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Ok(Dialect::Generic),
            "sqlite" => Ok(Dialect::Sqlite),
            "mysql" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(DataError::illegal_argument(format!("unknown SQL dialect '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierPolicy {
    /// Do not validate or quote identifiers.
    Raw,
    /// Validate identifiers against a conservative pattern.
    Validate,
    /// Validate and quote identifiers using the dialect quoting style.
    Quote,
}

impl FromStr for IdentifierPolicy {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(IdentifierPolicy::Raw),
            "validate" => Ok(IdentifierPolicy::Validate),
            "quote" => Ok(IdentifierPolicy::Quote),
            other => Err(DataError::illegal_argument(format!(
                "unknown identifier policy '{other}'"
            ))),
        }
    }
}

/// Which side of a cursor a keyset window selects.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyset {
    After(Cursor),
    Before(Cursor),
}

impl Keyset {
    fn cursor(&self) -> &Cursor {
        match self {
            Keyset::After(c) | Keyset::Before(c) => c,
        }
    }
}

/// A SELECT/COUNT builder over one table.
///
/// Values never appear in the SQL text; they are returned as bind parameters
/// in placeholder order.
pub struct QueryBuilder<T> {
    table: String,
    restriction: Option<Restriction<T>>,
    order: Vec<Sort>,
    keyset: Option<Keyset>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
    dialect: Dialect,
    identifier_policy: IdentifierPolicy,
}

impl<T> fmt::Debug for QueryBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("table", &self.table)
            .field("restriction", &self.restriction)
            .field("order", &self.order)
            .field("keyset", &self.keyset)
            .field("limit", &self.limit_val)
            .field("offset", &self.offset_val)
            .field("dialect", &self.dialect)
            .finish()
    }
}

impl<T> QueryBuilder<T> {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            restriction: None,
            order: Vec::new(),
            keyset: None,
            limit_val: None,
            offset_val: None,
            dialect: Dialect::Generic,
            identifier_policy: IdentifierPolicy::Validate,
        }
    }

    /// Create a new builder with an explicit SQL dialect.
    pub fn new_with_dialect(table: &str, dialect: Dialect) -> Self {
        Self::new(table).dialect(dialect)
    }

    /// Set the SQL dialect (affects placeholder style and quoting).
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Configure identifier validation/quoting behavior.
    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    pub fn filter(mut self, restriction: &Restriction<T>) -> Self {
        self.restriction = Some(restriction.clone());
        self
    }

    pub fn filter_opt(self, restriction: Option<&Restriction<T>>) -> Self {
        match restriction {
            Some(r) => self.filter(r),
            None => self,
        }
    }

    pub fn order_by(mut self, sorts: &[Sort]) -> Self {
        self.order.extend_from_slice(sorts);
        self
    }

    pub fn then_order(mut self, sort: Sort) -> Self {
        self.order.push(sort);
        self
    }

    /// Restrict to results strictly after `cursor` in sort order.
    pub fn after(mut self, cursor: &Cursor) -> Self {
        self.keyset = Some(Keyset::After(cursor.clone()));
        self
    }

    /// Restrict to results strictly before `cursor` in sort order. The
    /// generated ORDER BY is reversed so LIMIT keeps the nearest rows; callers
    /// reverse the fetched rows back into forward order.
    pub fn before(mut self, cursor: &Cursor) -> Self {
        self.keyset = Some(Keyset::Before(cursor.clone()));
        self
    }

    /// Apply the keyset side of a page request's mode. Offset mode is a no-op.
    pub fn keyset(self, mode: &Mode) -> Self {
        match mode {
            Mode::Offset => self,
            Mode::CursorNext(c) => self.after(c),
            Mode::CursorPrevious(c) => self.before(c),
        }
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_val = Some(offset);
        self
    }

    /// Build a SELECT query returning `(sql, bind_values)`.
    pub fn build_select(&self, columns: &[&str]) -> DataResult<(String, Vec<Value>)> {
        let table = self.format_identifier(&self.table, false, "table")?;
        let columns = self.format_column_list(columns)?;

        let mut w = SqlWriter::new(self.dialect);
        w.push(&format!("SELECT {columns} FROM {table}"));
        self.append_where(&mut w)?;
        self.append_order(&mut w)?;
        if let Some(limit) = self.limit_val {
            w.push(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset_val {
            w.push(&format!(" OFFSET {offset}"));
        }
        tracing::trace!(sql = %w.sql, params = w.params.len(), "select built");
        Ok((w.sql, w.params))
    }

    /// Build a COUNT query returning `(sql, bind_values)`. Ordering, keyset,
    /// limit and offset do not apply.
    pub fn build_count(&self) -> DataResult<(String, Vec<Value>)> {
        let table = self.format_identifier(&self.table, false, "table")?;
        let mut w = SqlWriter::new(self.dialect);
        w.push(&format!("SELECT COUNT(*) FROM {table}"));
        if let Some(r) = &self.restriction {
            w.push(" WHERE ");
            self.write_restriction(r, &mut w)?;
        }
        tracing::trace!(sql = %w.sql, params = w.params.len(), "count built");
        Ok((w.sql, w.params))
    }

    /// Build an insert-or-update of one row. `values` bind in `columns` order;
    /// on a `key` conflict every other column is overwritten.
    pub fn build_upsert(
        &self,
        columns: &[&str],
        key: &str,
        values: Vec<Value>,
    ) -> DataResult<(String, Vec<Value>)> {
        if columns.len() != values.len() {
            return Err(DataError::illegal_argument(format!(
                "upsert has {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        let table = self.format_identifier(&self.table, false, "table")?;
        let key = self.format_identifier(key, false, "column")?;
        let mut names = Vec::with_capacity(columns.len());
        let mut updates = Vec::with_capacity(columns.len());
        for col in columns {
            let name = self.format_identifier(col, false, "column")?;
            if name != key {
                updates.push(match self.dialect {
                    Dialect::MySql => format!("{name} = VALUES({name})"),
                    Dialect::Generic | Dialect::Sqlite | Dialect::Postgres => {
                        format!("{name} = excluded.{name}")
                    }
                });
            }
            names.push(name);
        }

        let mut w = SqlWriter::new(self.dialect);
        let placeholders: Vec<String> = values.into_iter().map(|v| w.bind(v, false)).collect();
        w.push(&format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        ));
        match (self.dialect, updates.is_empty()) {
            (Dialect::MySql, true) => w.push(&format!(" ON DUPLICATE KEY UPDATE {key} = {key}")),
            (Dialect::MySql, false) => {
                w.push(&format!(" ON DUPLICATE KEY UPDATE {}", updates.join(", ")))
            }
            (_, true) => w.push(&format!(" ON CONFLICT ({key}) DO NOTHING")),
            (_, false) => w.push(&format!(
                " ON CONFLICT ({key}) DO UPDATE SET {}",
                updates.join(", ")
            )),
        }
        tracing::trace!(sql = %w.sql, params = w.params.len(), "upsert built");
        Ok((w.sql, w.params))
    }

    /// Build a DELETE of the rows matching the filter. A filter is required.
    pub fn build_delete(&self) -> DataResult<(String, Vec<Value>)> {
        let restriction = self.restriction.as_ref().ok_or_else(|| {
            DataError::illegal_argument("a DELETE query requires a restriction")
        })?;
        let table = self.format_identifier(&self.table, false, "table")?;
        let mut w = SqlWriter::new(self.dialect);
        w.push(&format!("DELETE FROM {table} WHERE "));
        self.write_restriction(restriction, &mut w)?;
        tracing::trace!(sql = %w.sql, params = w.params.len(), "delete built");
        Ok((w.sql, w.params))
    }

    fn append_where(&self, w: &mut SqlWriter) -> DataResult<()> {
        match (&self.restriction, &self.keyset) {
            (None, None) => {}
            (Some(r), None) => {
                w.push(" WHERE ");
                self.write_restriction(r, w)?;
            }
            (None, Some(k)) => {
                w.push(" WHERE ");
                self.write_keyset(k, w)?;
            }
            (Some(r), Some(k)) => {
                w.push(" WHERE (");
                self.write_restriction(r, w)?;
                w.push(") AND ");
                self.write_keyset(k, w)?;
            }
        }
        Ok(())
    }

    fn append_order(&self, w: &mut SqlWriter) -> DataResult<()> {
        if self.order.is_empty() {
            return Ok(());
        }
        let backward = matches!(self.keyset, Some(Keyset::Before(_)));
        let mut clauses = Vec::with_capacity(self.order.len());
        for sort in &self.order {
            let col = self.sort_column(sort)?;
            let direction = if backward {
                sort.direction.reverse()
            } else {
                sort.direction
            };
            clauses.push(match direction {
                Direction::Asc => format!("{col} ASC"),
                Direction::Desc => format!("{col} DESC"),
            });
        }
        w.push(" ORDER BY ");
        w.push(&clauses.join(", "));
        Ok(())
    }

    fn write_restriction(&self, r: &Restriction<T>, w: &mut SqlWriter) -> DataResult<()> {
        match r {
            Restriction::Basic(b) => self.write_basic(b, w),
            Restriction::Composite(c) => {
                if c.is_negated() {
                    w.push("NOT ");
                }
                w.push("(");
                let joiner = match c.kind() {
                    CompositeType::All => " AND ",
                    CompositeType::Any => " OR ",
                };
                // Composite children render their own parentheses.
                for (i, child) in c.restrictions().iter().enumerate() {
                    if i > 0 {
                        w.push(joiner);
                    }
                    self.write_restriction(child, w)?;
                }
                w.push(")");
                Ok(())
            }
        }
    }

    fn write_basic(&self, b: &BasicRestriction<T>, w: &mut SqlWriter) -> DataResult<()> {
        let col = self.format_identifier(b.attribute(), false, "column")?;
        let col = if b.is_ignore_case() {
            format!("LOWER({col})")
        } else {
            col
        };
        // A negated leaf is its operator's complement; both agree on NULL.
        let op = if b.is_negated() {
            b.operator().complement()
        } else {
            b.operator()
        };
        let fold = b.is_ignore_case();

        match (op, b.operand()) {
            (Operator::IsNull | Operator::IsNotNull, _) => {
                w.push(&format!("{col} {}", op.symbol()));
            }
            (Operator::Between | Operator::NotBetween, Operand::Two(low, high)) => {
                let low = w.bind(low.clone(), fold);
                let high = w.bind(high.clone(), fold);
                w.push(&format!("{col} {} {low} AND {high}", op.symbol()));
            }
            // SQLite's LIKE folds ASCII case; GLOB keeps case-sensitive matches.
            (Operator::Like | Operator::NotLike, Operand::One(Value::Text(pattern)))
                if self.dialect == Dialect::Sqlite && !fold =>
            {
                let p = w.bind(Value::Text(like_to_glob(pattern)), false);
                let keyword = match op {
                    Operator::Like => "GLOB",
                    _ => "NOT GLOB",
                };
                w.push(&format!("{col} {keyword} {p}"));
            }
            (Operator::Like | Operator::NotLike, Operand::One(pattern)) => {
                let p = w.bind(pattern.clone(), fold);
                w.push(&format!(
                    "{col} {} {p}{}",
                    op.symbol(),
                    self.dialect.like_escape()
                ));
            }
            (Operator::In | Operator::NotIn, Operand::Many(values)) => {
                let placeholders: Vec<_> =
                    values.iter().map(|v| w.bind(v.clone(), fold)).collect();
                w.push(&format!("{col} {} ({})", op.symbol(), placeholders.join(", ")));
            }
            (_, Operand::One(value)) => {
                let p = w.bind(value.clone(), fold);
                w.push(&format!("{col} {} {p}", op.symbol()));
            }
            (op, operand) => {
                return Err(DataError::illegal_argument(format!(
                    "operator {op:?} cannot be applied to {:?} operand(s)",
                    operand.arity()
                )))
            }
        }
        Ok(())
    }

    /// Lexicographic expansion of `(k1, .., kn) > (c1, .., cn)` honouring the
    /// direction of every key: `(k1 > ? OR (k1 = ? AND k2 > ?) OR ...)`.
    fn write_keyset(&self, keyset: &Keyset, w: &mut SqlWriter) -> DataResult<()> {
        let cursor = keyset.cursor();
        if self.order.is_empty() {
            return Err(DataError::illegal_argument(
                "keyset pagination requires at least one sort criterion",
            ));
        }
        if cursor.len() != self.order.len() {
            return Err(DataError::illegal_argument(format!(
                "keyset cursor has {} values but the query has {} sort criteria",
                cursor.len(),
                self.order.len()
            )));
        }
        let forward = matches!(keyset, Keyset::After(_));

        w.push("(");
        for i in 0..self.order.len() {
            if i > 0 {
                w.push(" OR ");
            }
            if i > 0 {
                w.push("(");
            }
            for (j, sort) in self.order[..i].iter().enumerate() {
                let col = self.sort_column(sort)?;
                let p = w.bind(cursor.elements()[j].clone(), sort.ignore_case);
                w.push(&format!("{col} = {p} AND "));
            }
            let sort = &self.order[i];
            let col = self.sort_column(sort)?;
            let op = match (sort.direction, forward) {
                (Direction::Asc, true) | (Direction::Desc, false) => ">",
                (Direction::Desc, true) | (Direction::Asc, false) => "<",
            };
            let p = w.bind(cursor.elements()[i].clone(), sort.ignore_case);
            w.push(&format!("{col} {op} {p}"));
            if i > 0 {
                w.push(")");
            }
        }
        w.push(")");
        Ok(())
    }

    fn sort_column(&self, sort: &Sort) -> DataResult<String> {
        let col = self.format_identifier(&sort.attribute, false, "column")?;
        Ok(if sort.ignore_case {
            format!("LOWER({col})")
        } else {
            col
        })
    }

    fn format_column_list(&self, columns: &[&str]) -> DataResult<String> {
        let mut out = Vec::with_capacity(columns.len());
        for col in columns {
            out.push(self.format_identifier(col, true, "column")?);
        }
        Ok(out.join(", "))
    }

    fn format_identifier(&self, ident: &str, allow_star: bool, kind: &'static str) -> DataResult<String> {
        match self.identifier_policy {
            IdentifierPolicy::Raw => Ok(ident.to_string()),
            IdentifierPolicy::Validate | IdentifierPolicy::Quote
                if !is_valid_identifier(ident, allow_star) =>
            {
                Err(DataError::illegal_argument(format!(
                    "Invalid {kind} identifier: {ident}"
                )))
            }
            IdentifierPolicy::Validate => Ok(ident.to_string()),
            IdentifierPolicy::Quote => Ok(quote_identifier(ident, self.dialect, allow_star)),
        }
    }
}

struct SqlWriter {
    sql: String,
    params: Vec<Value>,
    dialect: Dialect,
}

impl SqlWriter {
    fn new(dialect: Dialect) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            dialect,
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    /// Register a bind value and return its placeholder.
    fn bind(&mut self, value: Value, lower: bool) -> String {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        if lower {
            format!("LOWER({placeholder})")
        } else {
            placeholder
        }
    }
}

/// Rewrite a `LIKE` pattern with `\` escapes as an equivalent `GLOB`
/// pattern. A trailing escape matches a literal backslash.
fn like_to_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            LIKE_ESCAPE => push_glob_literal(&mut out, chars.next().unwrap_or(LIKE_ESCAPE)),
            '%' => out.push('*'),
            '_' => out.push('?'),
            other => push_glob_literal(&mut out, other),
        }
    }
    out
}

fn push_glob_literal(out: &mut String, c: char) {
    match c {
        '*' | '?' | '[' => {
            out.push('[');
            out.push(c);
            out.push(']');
        }
        _ => out.push(c),
    }
}

fn is_valid_identifier(ident: &str, allow_star: bool) -> bool {
    if ident.is_empty() {
        return false;
    }
    let parts: Vec<&str> = ident.split('.').collect();
    for (idx, part) in parts.iter().enumerate() {
        if allow_star && *part == "*" {
            return idx + 1 == parts.len();
        }
        if !is_valid_segment(part) {
            return false;
        }
    }
    true
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn quote_identifier(ident: &str, dialect: Dialect, allow_star: bool) -> String {
    let quote = dialect.quote_char();
    let parts: Vec<&str> = ident.split('.').collect();
    let last_idx = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(idx, part)| {
            if allow_star && part == "*" && idx == last_idx {
                part.to_string()
            } else {
                format!("{quote}{part}{quote}")
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restrict;

    struct User;

    fn q(table: &str) -> QueryBuilder<User> {
        QueryBuilder::new(table)
    }

    #[test]
    fn test_simple_select() {
        let (sql, params) = q("users").build_select(&["*"]).unwrap();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn test_where_eq() {
        let r = restrict::equal_to("email", "a@b.com").unwrap();
        let (sql, params) = q("users").filter(&r).build_select(&["*"]).unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE email = ?");
        assert_eq!(params, vec![Value::from("a@b.com")]);
    }

    #[test]
    fn test_complex_query() {
        let r = restrict::all(vec![
            restrict::equal_to("status", "active").unwrap(),
            restrict::contains("name", "alice").unwrap(),
        ])
        .unwrap();
        let (sql, params) = q("users")
            .filter(&r)
            .then_order(Sort::asc("id"))
            .limit(10)
            .offset(20)
            .build_select(&["id", "name"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT id, name FROM users WHERE (status = ? AND name LIKE ? ESCAPE '\\') ORDER BY id ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(params, vec![Value::from("active"), Value::from("%alice%")]);
    }

    #[test]
    fn test_count_query() {
        let r = restrict::equal_to("active", true).unwrap();
        let (sql, params) = q("users")
            .filter(&r)
            .then_order(Sort::asc("id"))
            .limit(5)
            .build_count()
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM users WHERE active = ?");
        assert_eq!(params, vec![Value::Bool(true)]);
    }

    #[test]
    fn test_postgres_placeholders() {
        let r = restrict::all(vec![
            restrict::equal_to("status", "active").unwrap(),
            restrict::is_in("role", vec!["admin", "user"]).unwrap(),
        ])
        .unwrap();
        let (sql, params) = QueryBuilder::<User>::new_with_dialect("users", Dialect::Postgres)
            .filter(&r)
            .build_select(&["*"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE (status = $1 AND role IN ($2, $3))"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_checked_identifiers_and_quoting() {
        let r = restrict::equal_to("users.email", "a@b.com").unwrap();
        let (sql, params) = q("users")
            .dialect(Dialect::Postgres)
            .identifier_policy(IdentifierPolicy::Quote)
            .filter(&r)
            .then_order(Sort::asc("users.id"))
            .build_select(&["users.id", "users.email"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"users\".\"id\", \"users\".\"email\" FROM \"users\" WHERE \"users\".\"email\" = $1 ORDER BY \"users\".\"id\" ASC"
        );
        assert_eq!(params, vec![Value::from("a@b.com")]);
    }

    #[test]
    fn test_invalid_identifier() {
        let err = q("users;drop").build_select(&["*"]).unwrap_err();
        assert!(matches!(err, DataError::IllegalArgument(_)));

        let r = restrict::equal_to("name; --", "x").unwrap();
        assert!(q("users").filter(&r).build_count().is_err());
    }

    #[test]
    fn negation_stays_on_its_node() {
        let r = restrict::not(
            restrict::any(vec![
                restrict::equal_to("title", "Dune").unwrap(),
                restrict::less_than("year", 1970).unwrap().negate(),
            ])
            .unwrap(),
        );
        let (sql, _) = q("books").filter(&r).build_select(&["*"]).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM books WHERE NOT (title = ? OR year >= ?)"
        );
    }

    #[test]
    fn nested_composites_keep_parentheses() {
        let r = restrict::all(vec![
            restrict::any(vec![
                restrict::equal_to("a", 1).unwrap(),
                restrict::equal_to("b", 2).unwrap(),
            ])
            .unwrap(),
            restrict::is_null("c").unwrap(),
        ])
        .unwrap();
        let (sql, params) = q("t").filter(&r).build_count().unwrap();
        assert_eq!(
            sql,
            "SELECT COUNT(*) FROM t WHERE ((a = ? OR b = ?) AND c IS NULL)"
        );
        assert_eq!(params, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn ignore_case_lowers_both_sides() {
        let r = restrict::ignore_case(restrict::starts_with("name", "duke").unwrap()).unwrap();
        let (sql, params) = q("people").filter(&r).build_select(&["*"]).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM people WHERE LOWER(name) LIKE LOWER(?) ESCAPE '\\'"
        );
        assert_eq!(params, vec![Value::from("duke%")]);
    }

    #[test]
    fn between_binds_both_bounds() {
        let r = restrict::between("age", 18, 65).unwrap().negate();
        let (sql, params) = q("people").filter(&r).build_select(&["*"]).unwrap();
        assert_eq!(sql, "SELECT * FROM people WHERE age NOT BETWEEN ? AND ?");
        assert_eq!(params, vec![Value::Int(18), Value::Int(65)]);
    }

    #[test]
    fn keyset_after_expands_lexicographically() {
        let cursor = Cursor::new(vec![Value::from("Smith"), Value::Int(7)]).unwrap();
        let (sql, params) = q("employees")
            .order_by(&[Sort::asc("last_name"), Sort::desc("id")])
            .after(&cursor)
            .limit(11)
            .build_select(&["*"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM employees WHERE (last_name > ? OR (last_name = ? AND id < ?)) ORDER BY last_name ASC, id DESC LIMIT 11"
        );
        assert_eq!(
            params,
            vec![Value::from("Smith"), Value::from("Smith"), Value::Int(7)]
        );
    }

    #[test]
    fn keyset_before_reverses_order() {
        let cursor = Cursor::new(vec![Value::Int(40)]).unwrap();
        let r = restrict::equal_to("dept", "R&D").unwrap();
        let (sql, params) = q("employees")
            .dialect(Dialect::Postgres)
            .filter(&r)
            .order_by(&[Sort::asc("hours")])
            .before(&cursor)
            .limit(5)
            .build_select(&["*"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM employees WHERE (dept = $1) AND (hours < $2) ORDER BY hours DESC LIMIT 5"
        );
        assert_eq!(params, vec![Value::from("R&D"), Value::Int(40)]);
    }

    #[test]
    fn keyset_arity_must_match_sorts() {
        let cursor = Cursor::new(vec![Value::Int(1), Value::Int(2)]).unwrap();
        let err = q("t")
            .order_by(&[Sort::asc("id")])
            .after(&cursor)
            .build_select(&["*"])
            .unwrap_err();
        assert!(matches!(err, DataError::IllegalArgument(_)));

        let err = q("t").after(&cursor).build_select(&["*"]).unwrap_err();
        assert!(matches!(err, DataError::IllegalArgument(_)));
    }

    #[test]
    fn mysql_escapes_backslash_in_like() {
        let r = restrict::ends_with("path", "_x").unwrap();
        let (sql, params) = q("files")
            .dialect(Dialect::MySql)
            .identifier_policy(IdentifierPolicy::Quote)
            .filter(&r)
            .build_select(&["*"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `files` WHERE `path` LIKE ? ESCAPE '\\\\'"
        );
        assert_eq!(params, vec![Value::from("%\\_x")]);
    }

    #[test]
    fn sqlite_like_is_rendered_as_glob() {
        let r = restrict::starts_with("name", "50%_[a]*").unwrap();
        let (sql, params) = q("items")
            .dialect(Dialect::Sqlite)
            .filter(&r)
            .build_select(&["*"])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM items WHERE name GLOB ?");
        assert_eq!(params, vec![Value::from("50%_[[]a][*]*")]);

        let r = restrict::like("name", "a_b%").unwrap().negate();
        let (sql, params) = q("items")
            .dialect(Dialect::Sqlite)
            .filter(&r)
            .build_select(&["*"])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM items WHERE name NOT GLOB ?");
        assert_eq!(params, vec![Value::from("a?b*")]);
    }

    #[test]
    fn sqlite_ignore_case_like_keeps_like() {
        let r = restrict::ignore_case(restrict::like("name", "duke%").unwrap()).unwrap();
        let (sql, _) = q("items")
            .dialect(Dialect::Sqlite)
            .filter(&r)
            .build_select(&["*"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM items WHERE LOWER(name) LIKE LOWER(?) ESCAPE '\\'"
        );
    }

    #[test]
    fn like_to_glob_handles_escapes() {
        assert_eq!(like_to_glob("\\\\%"), "\\*");
        assert_eq!(like_to_glob("\\%"), "%");
        assert_eq!(like_to_glob("a\\"), "a\\");
        assert_eq!(like_to_glob("?x"), "[?]x");
    }

    #[test]
    fn upsert_quotes_every_identifier() {
        let (sql, params) = q("users")
            .dialect(Dialect::Sqlite)
            .identifier_policy(IdentifierPolicy::Quote)
            .build_upsert(&["id", "name"], "id", vec![Value::Int(1), Value::from("a")])
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES (?, ?) \
             ON CONFLICT (\"id\") DO UPDATE SET \"name\" = excluded.\"name\""
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn upsert_variants() {
        let (sql, _) = q("users")
            .dialect(Dialect::MySql)
            .build_upsert(&["id", "name"], "id", vec![Value::Int(1), Value::from("a")])
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO users (id, name) VALUES (?, ?) ON DUPLICATE KEY UPDATE name = VALUES(name)"
        );

        let (sql, _) = q("tags")
            .dialect(Dialect::Postgres)
            .build_upsert(&["id"], "id", vec![Value::Int(1)])
            .unwrap();
        assert_eq!(sql, "INSERT INTO tags (id) VALUES ($1) ON CONFLICT (id) DO NOTHING");

        let err = q("users")
            .build_upsert(&["id", "name"], "id", vec![Value::Int(1)])
            .unwrap_err();
        assert!(matches!(err, DataError::IllegalArgument(_)));

        let err = q("users")
            .build_upsert(&["id", "na me"], "id", vec![Value::Int(1), Value::Null])
            .unwrap_err();
        assert!(matches!(err, DataError::IllegalArgument(_)));
    }

    #[test]
    fn delete_requires_a_filter() {
        let r = restrict::equal_to("id", 7).unwrap();
        let (sql, params) = q("users")
            .dialect(Dialect::Postgres)
            .identifier_policy(IdentifierPolicy::Quote)
            .filter(&r)
            .build_delete()
            .unwrap();
        assert_eq!(sql, "DELETE FROM \"users\" WHERE \"id\" = $1");
        assert_eq!(params, vec![Value::Int(7)]);

        assert!(matches!(
            q("users").build_delete(),
            Err(DataError::IllegalArgument(_))
        ));
    }

    #[test]
    fn parses_dialect_and_policy_names() {
        assert_eq!("Postgres".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("mysql".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert!("oracle".parse::<Dialect>().is_err());
        assert_eq!("quote".parse::<IdentifierPolicy>().unwrap(), IdentifierPolicy::Quote);
    }
}
