//! Free-standing combinators for building [`Restriction`] trees at call sites.
//!
//! ```ignore
//! use keel_data::restrict::{self, all, not};
//!
//! let r: Restriction<Person> = all(vec![
//!     restrict::less_than("age", 50)?,
//!     restrict::starts_with("name", "Duke ")?,
//! ])?;
//! let excluded = not(r);
//! ```

use crate::error::DataResult;
use crate::restriction::{
    BasicRestriction, CompositeRestriction, CompositeType, Operand, Operator, Restriction,
};
use crate::value::Value;

/// Escape character used in the `LIKE` patterns built by this module.
pub const LIKE_ESCAPE: char = '\\';

/// Construct a leaf restriction, validating the operand against the operator.
pub fn basic<T>(
    attribute: impl Into<String>,
    operator: Operator,
    operand: Operand,
) -> DataResult<Restriction<T>> {
    BasicRestriction::new(attribute, operator, operand).map(Restriction::Basic)
}

/// Conjunction of one or more restrictions.
pub fn all<T>(restrictions: Vec<Restriction<T>>) -> DataResult<Restriction<T>> {
    CompositeRestriction::new(CompositeType::All, restrictions).map(Restriction::Composite)
}

/// Disjunction of one or more restrictions.
pub fn any<T>(restrictions: Vec<Restriction<T>>) -> DataResult<Restriction<T>> {
    CompositeRestriction::new(CompositeType::Any, restrictions).map(Restriction::Composite)
}

/// Same as [`Restriction::negate`].
pub fn not<T>(restriction: Restriction<T>) -> Restriction<T> {
    restriction.negate()
}

fn single<T>(
    attribute: impl Into<String>,
    operator: Operator,
    value: Value,
) -> DataResult<Restriction<T>> {
    basic(attribute, operator, Operand::One(value))
}

pub fn equal_to<T>(
    attribute: impl Into<String>,
    value: impl Into<Value>,
) -> DataResult<Restriction<T>> {
    single(attribute, Operator::Equal, value.into())
}

pub fn not_equal_to<T>(
    attribute: impl Into<String>,
    value: impl Into<Value>,
) -> DataResult<Restriction<T>> {
    single(attribute, Operator::NotEqual, value.into())
}

pub fn less_than<T>(
    attribute: impl Into<String>,
    value: impl Into<Value>,
) -> DataResult<Restriction<T>> {
    single(attribute, Operator::LessThan, value.into())
}

pub fn less_than_equal<T>(
    attribute: impl Into<String>,
    value: impl Into<Value>,
) -> DataResult<Restriction<T>> {
    single(attribute, Operator::LessThanEqual, value.into())
}

pub fn greater_than<T>(
    attribute: impl Into<String>,
    value: impl Into<Value>,
) -> DataResult<Restriction<T>> {
    single(attribute, Operator::GreaterThan, value.into())
}

pub fn greater_than_equal<T>(
    attribute: impl Into<String>,
    value: impl Into<Value>,
) -> DataResult<Restriction<T>> {
    single(attribute, Operator::GreaterThanEqual, value.into())
}

/// Inclusive range `min <= attribute <= max`.
pub fn between<T>(
    attribute: impl Into<String>,
    min: impl Into<Value>,
    max: impl Into<Value>,
) -> DataResult<Restriction<T>> {
    basic(attribute, Operator::Between, Operand::Two(min.into(), max.into()))
}

/// Raw `LIKE` pattern: `%` matches any run of characters, `_` one character, `\` escapes.
pub fn like<T>(
    attribute: impl Into<String>,
    pattern: impl Into<String>,
) -> DataResult<Restriction<T>> {
    single(attribute, Operator::Like, Value::Text(pattern.into()))
}

pub fn not_like<T>(
    attribute: impl Into<String>,
    pattern: impl Into<String>,
) -> DataResult<Restriction<T>> {
    single(attribute, Operator::NotLike, Value::Text(pattern.into()))
}

pub fn contains<T>(attribute: impl Into<String>, substring: &str) -> DataResult<Restriction<T>> {
    like(attribute, format!("%{}%", escape_like(substring)))
}

pub fn starts_with<T>(attribute: impl Into<String>, prefix: &str) -> DataResult<Restriction<T>> {
    like(attribute, format!("{}%", escape_like(prefix)))
}

pub fn ends_with<T>(attribute: impl Into<String>, suffix: &str) -> DataResult<Restriction<T>> {
    like(attribute, format!("%{}", escape_like(suffix)))
}

pub fn is_in<T, V: Into<Value>>(
    attribute: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> DataResult<Restriction<T>> {
    let values = values.into_iter().map(Into::into).collect();
    basic(attribute, Operator::In, Operand::Many(values))
}

pub fn not_in<T, V: Into<Value>>(
    attribute: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> DataResult<Restriction<T>> {
    let values = values.into_iter().map(Into::into).collect();
    basic(attribute, Operator::NotIn, Operand::Many(values))
}

pub fn is_null<T>(attribute: impl Into<String>) -> DataResult<Restriction<T>> {
    basic(attribute, Operator::IsNull, Operand::None)
}

pub fn not_null<T>(attribute: impl Into<String>) -> DataResult<Restriction<T>> {
    basic(attribute, Operator::IsNotNull, Operand::None)
}

/// Case-insensitive variant of a leaf restriction.
///
/// Only ASCII letters are folded, so `'É'` and `'é'` still differ.
/// Fails for composite restrictions and for leaves with non-text operands.
pub fn ignore_case<T>(restriction: Restriction<T>) -> DataResult<Restriction<T>> {
    match restriction {
        Restriction::Basic(b) => b.ignore_case().map(Restriction::Basic),
        Restriction::Composite(_) => Err(crate::DataError::illegal_argument(
            "Only basic restrictions can be made case-insensitive.",
        )),
    }
}

/// Escape `LIKE` metacharacters so that `literal` matches itself.
pub fn escape_like(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Person;

    #[test]
    fn text_helpers_escape_metacharacters() {
        let r: Restriction<Person> = contains("code", "50%_off").unwrap();
        let b = r.as_basic().unwrap();
        assert_eq!(b.operator(), Operator::Like);
        assert_eq!(b.operand(), &Operand::One(Value::Text("%50\\%\\_off%".into())));
    }

    #[test]
    fn starts_with_builds_prefix_pattern() {
        let r: Restriction<Person> = starts_with("name", "Duke ").unwrap();
        assert_eq!(r.to_string(), "name LIKE 'Duke %'");
    }

    #[test]
    fn null_operand_is_rejected() {
        let none: Option<i64> = None;
        assert!(equal_to::<Person>("age", none).is_err());
        assert!(is_null::<Person>("age").is_ok());
    }

    #[test]
    fn in_with_no_values_is_rejected() {
        let empty: Vec<i64> = Vec::new();
        assert!(is_in::<Person, _>("id", empty).is_err());
        assert!(is_in::<Person, _>("id", [1, 2, 3]).is_ok());
    }

    #[test]
    fn between_keeps_bounds_in_order() {
        let r: Restriction<Person> = between("age", 18, 65).unwrap();
        assert_eq!(r.to_string(), "age BETWEEN 18 AND 65");
    }

    #[test]
    fn ignore_case_only_applies_to_leaves() {
        let leaf: Restriction<Person> = equal_to("name", "duke").unwrap();
        let folded = ignore_case(leaf).unwrap();
        assert!(folded.as_basic().unwrap().is_ignore_case());

        let tree: Restriction<Person> = all(vec![equal_to("name", "duke").unwrap()]).unwrap();
        assert!(ignore_case(tree).is_err());
    }

    #[test]
    fn not_matches_negate() {
        let r: Restriction<Person> = less_than("age", 50).unwrap();
        assert_eq!(not(r.clone()), r.negate());
        assert_eq!(!r.clone(), r.negate());
    }
}
