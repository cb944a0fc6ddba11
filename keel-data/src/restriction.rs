//! Restriction trees: immutable predicates over the attributes of an entity type.
//!
//! A [`Restriction`] is either a leaf ([`BasicRestriction`]) comparing one
//! attribute against an operand, or a [`CompositeRestriction`] that combines
//! child restrictions with `ALL` (conjunction) or `ANY` (disjunction)
//! semantics. Every node carries its own negation flag. Negating a node flips
//! that flag only; children are never rewritten.
//!
//! ```ignore
//! use keel_data::restrict;
//!
//! let adults_named_duke: Restriction<Person> = restrict::all(vec![
//!     restrict::greater_than_equal("age", 18)?,
//!     restrict::starts_with("name", "Duke ")?,
//! ])?;
//! let everyone_else = restrict::not(adults_named_duke.clone());
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};
use crate::value::Value;

/// Number of values an [`Operator`] compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    One,
    Two,
    Many,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    Between,
    NotBetween,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn arity(self) -> Arity {
        match self {
            Operator::IsNull | Operator::IsNotNull => Arity::None,
            Operator::Between | Operator::NotBetween => Arity::Two,
            Operator::In | Operator::NotIn => Arity::Many,
            _ => Arity::One,
        }
    }

    /// The operator that selects exactly the rows this one rejects.
    pub fn complement(self) -> Operator {
        match self {
            Operator::Equal => Operator::NotEqual,
            Operator::NotEqual => Operator::Equal,
            Operator::LessThan => Operator::GreaterThanEqual,
            Operator::GreaterThanEqual => Operator::LessThan,
            Operator::GreaterThan => Operator::LessThanEqual,
            Operator::LessThanEqual => Operator::GreaterThan,
            Operator::Between => Operator::NotBetween,
            Operator::NotBetween => Operator::Between,
            Operator::Like => Operator::NotLike,
            Operator::NotLike => Operator::Like,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanEqual => ">=",
            Operator::Between => "BETWEEN",
            Operator::NotBetween => "NOT BETWEEN",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    fn is_pattern(self) -> bool {
        matches!(self, Operator::Like | Operator::NotLike)
    }
}

/// The value side of a basic restriction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    One(Value),
    Two(Value, Value),
    Many(Vec<Value>),
}

impl Operand {
    pub fn arity(&self) -> Arity {
        match self {
            Operand::None => Arity::None,
            Operand::One(_) => Arity::One,
            Operand::Two(_, _) => Arity::Two,
            Operand::Many(_) => Arity::Many,
        }
    }

    pub fn values(&self) -> Vec<&Value> {
        match self {
            Operand::None => Vec::new(),
            Operand::One(v) => vec![v],
            Operand::Two(a, b) => vec![a, b],
            Operand::Many(vs) => vs.iter().collect(),
        }
    }
}

/// A leaf restriction comparing one attribute against an operand.
pub struct BasicRestriction<T> {
    attribute: String,
    operator: Operator,
    operand: Operand,
    ignore_case: bool,
    negated: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> BasicRestriction<T> {
    /// Build a leaf restriction, rejecting operands whose arity or type does
    /// not fit the operator.
    pub fn new(
        attribute: impl Into<String>,
        operator: Operator,
        operand: Operand,
    ) -> DataResult<Self> {
        let attribute = attribute.into();
        if attribute.trim().is_empty() {
            return Err(DataError::illegal_argument(
                "A restriction requires a non-empty attribute name.",
            ));
        }
        if operator.arity() != operand.arity() {
            return Err(DataError::illegal_argument(format!(
                "Operator {operator:?} on '{attribute}' expects {:?} operand(s), got {:?}.",
                operator.arity(),
                operand.arity()
            )));
        }
        if let Operand::Many(values) = &operand {
            if values.is_empty() {
                return Err(DataError::illegal_argument(format!(
                    "Operator {operator:?} on '{attribute}' requires at least one value."
                )));
            }
        }
        for value in operand.values() {
            if value.is_null() {
                return Err(DataError::illegal_argument(format!(
                    "Cannot compare '{attribute}' against null; use IsNull or IsNotNull."
                )));
            }
            if operator.is_pattern() && value.as_text().is_none() {
                return Err(DataError::illegal_argument(format!(
                    "Operator {operator:?} on '{attribute}' requires a text pattern, got {}.",
                    value.type_name()
                )));
            }
        }
        Ok(Self {
            attribute,
            operator,
            operand,
            ignore_case: false,
            negated: false,
            _entity: PhantomData,
        })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    pub fn is_ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Case-insensitive variant of this restriction. Only text operands qualify.
    pub fn ignore_case(mut self) -> DataResult<Self> {
        if let Some(value) = self.operand.values().into_iter().find(|v| v.as_text().is_none()) {
            return Err(DataError::illegal_argument(format!(
                "Case-insensitive comparison of '{}' requires text operands, got {}.",
                self.attribute,
                value.type_name()
            )));
        }
        self.ignore_case = true;
        Ok(self)
    }

    pub fn negate(&self) -> Self {
        let mut negated = self.clone();
        negated.negated = !self.negated;
        negated
    }
}

impl<T> Clone for BasicRestriction<T> {
    fn clone(&self) -> Self {
        Self {
            attribute: self.attribute.clone(),
            operator: self.operator,
            operand: self.operand.clone(),
            ignore_case: self.ignore_case,
            negated: self.negated,
            _entity: PhantomData,
        }
    }
}

impl<T> PartialEq for BasicRestriction<T> {
    fn eq(&self, other: &Self) -> bool {
        self.attribute == other.attribute
            && self.operator == other.operator
            && self.operand == other.operand
            && self.ignore_case == other.ignore_case
            && self.negated == other.negated
    }
}

impl<T> fmt::Debug for BasicRestriction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicRestriction")
            .field("attribute", &self.attribute)
            .field("operator", &self.operator)
            .field("operand", &self.operand)
            .field("ignore_case", &self.ignore_case)
            .field("negated", &self.negated)
            .finish()
    }
}

impl<T> fmt::Display for BasicRestriction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "NOT (")?;
        }
        let fold = |s: String| {
            if self.ignore_case {
                format!("LOWER({s})")
            } else {
                s
            }
        };
        write!(f, "{} {}", fold(self.attribute.clone()), self.operator.symbol())?;
        match &self.operand {
            Operand::None => {}
            Operand::One(v) => write!(f, " {}", fold(v.to_string()))?,
            Operand::Two(a, b) => write!(f, " {} AND {}", fold(a.to_string()), fold(b.to_string()))?,
            Operand::Many(vs) => {
                let items: Vec<String> = vs.iter().map(|v| fold(v.to_string())).collect();
                write!(f, " ({})", items.join(", "))?;
            }
        }
        if self.negated {
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// How a composite restriction combines its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompositeType {
    /// Every child must match.
    All,
    /// At least one child must match.
    Any,
}

impl CompositeType {
    pub fn keyword(self) -> &'static str {
        match self {
            CompositeType::All => "AND",
            CompositeType::Any => "OR",
        }
    }
}

/// An ordered, non-empty combination of child restrictions.
pub struct CompositeRestriction<T> {
    kind: CompositeType,
    restrictions: Vec<Restriction<T>>,
    negated: bool,
}

impl<T> CompositeRestriction<T> {
    pub fn new(kind: CompositeType, restrictions: Vec<Restriction<T>>) -> DataResult<Self> {
        Self::with_negation(kind, restrictions, false)
    }

    pub fn with_negation(
        kind: CompositeType,
        restrictions: Vec<Restriction<T>>,
        negated: bool,
    ) -> DataResult<Self> {
        if restrictions.is_empty() {
            return Err(DataError::illegal_argument(
                "Cannot create a composite restriction without any restrictions to combine.",
            ));
        }
        Ok(Self {
            kind,
            restrictions,
            negated,
        })
    }

    pub fn kind(&self) -> CompositeType {
        self.kind
    }

    /// Child restrictions in the order they were supplied.
    pub fn restrictions(&self) -> &[Restriction<T>] {
        &self.restrictions
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Flip the negation flag of this node. Children are left as they are.
    pub fn negate(&self) -> Self {
        Self {
            kind: self.kind,
            restrictions: self.restrictions.clone(),
            negated: !self.negated,
        }
    }
}

impl<T> Clone for CompositeRestriction<T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            restrictions: self.restrictions.clone(),
            negated: self.negated,
        }
    }
}

impl<T> PartialEq for CompositeRestriction<T> {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.negated == other.negated
            && self.restrictions == other.restrictions
    }
}

impl<T> fmt::Debug for CompositeRestriction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeRestriction")
            .field("kind", &self.kind)
            .field("restrictions", &self.restrictions)
            .field("negated", &self.negated)
            .finish()
    }
}

impl<T> fmt::Display for CompositeRestriction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "NOT ")?;
        }
        write!(f, "(")?;
        for (i, child) in self.restrictions.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.kind.keyword())?;
            }
            write!(f, "{child}")?;
        }
        write!(f, ")")
    }
}

/// A predicate over entities of type `T`.
pub enum Restriction<T> {
    Basic(BasicRestriction<T>),
    Composite(CompositeRestriction<T>),
}

impl<T> Restriction<T> {
    pub fn is_negated(&self) -> bool {
        match self {
            Restriction::Basic(b) => b.is_negated(),
            Restriction::Composite(c) => c.is_negated(),
        }
    }

    /// A new restriction of the same shape with the negation flag flipped.
    #[must_use]
    pub fn negate(&self) -> Self {
        match self {
            Restriction::Basic(b) => Restriction::Basic(b.negate()),
            Restriction::Composite(c) => Restriction::Composite(c.negate()),
        }
    }

    pub fn as_basic(&self) -> Option<&BasicRestriction<T>> {
        match self {
            Restriction::Basic(b) => Some(b),
            Restriction::Composite(_) => None,
        }
    }

    pub fn as_composite(&self) -> Option<&CompositeRestriction<T>> {
        match self {
            Restriction::Composite(c) => Some(c),
            Restriction::Basic(_) => None,
        }
    }

    /// Distinct attribute names referenced anywhere in the tree, in order of first use.
    pub fn attributes(&self) -> Vec<&str> {
        fn collect<'a, T>(r: &'a Restriction<T>, out: &mut Vec<&'a str>) {
            match r {
                Restriction::Basic(b) => {
                    if !out.contains(&b.attribute()) {
                        out.push(b.attribute());
                    }
                }
                Restriction::Composite(c) => {
                    for child in c.restrictions() {
                        collect(child, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }
}

impl<T> From<BasicRestriction<T>> for Restriction<T> {
    fn from(b: BasicRestriction<T>) -> Self {
        Restriction::Basic(b)
    }
}

impl<T> From<CompositeRestriction<T>> for Restriction<T> {
    fn from(c: CompositeRestriction<T>) -> Self {
        Restriction::Composite(c)
    }
}

impl<T> std::ops::Not for Restriction<T> {
    type Output = Restriction<T>;

    fn not(self) -> Self::Output {
        self.negate()
    }
}

impl<T> Clone for Restriction<T> {
    fn clone(&self) -> Self {
        match self {
            Restriction::Basic(b) => Restriction::Basic(b.clone()),
            Restriction::Composite(c) => Restriction::Composite(c.clone()),
        }
    }
}

impl<T> PartialEq for Restriction<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Restriction::Basic(a), Restriction::Basic(b)) => a == b,
            (Restriction::Composite(a), Restriction::Composite(b)) => a == b,
            _ => false,
        }
    }
}

impl<T> fmt::Debug for Restriction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::Basic(b) => fmt::Debug::fmt(b, f),
            Restriction::Composite(c) => fmt::Debug::fmt(c, f),
        }
    }
}

impl<T> fmt::Display for Restriction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::Basic(b) => write!(f, "{b}"),
            Restriction::Composite(c) => write!(f, "{c}"),
        }
    }
}
