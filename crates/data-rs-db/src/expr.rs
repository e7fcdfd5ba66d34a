//! The expression IR.
//!
//! [`Expr`] is a closed sum type: binary and unary operators, CASE, CAST,
//! column references, typed constants, shared parameters, and function calls
//! dispatched by [`FunctionKey`]. Trees are immutable once built; rendering is
//! done by the dialect crate with a single `match`.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use data_rs_db::column::{Column, ValueType};
//! use data_rs_db::expr::{Expr, ParamCell};
//! use data_rs_db::model::Model;
//!
//! let mut product = Model::new("Product");
//! let price = product.add_column(Column::new("Price", ValueType::Double));
//! let limit = ParamCell::shared(ValueType::Double, 10.0_f64);
//!
//! // (Price * 1.1) > @limit
//! let expr = (product.col(&price) * Expr::constant(1.1_f64)).gt(Expr::param(&limit));
//! assert_eq!(expr.value_type(), ValueType::Boolean);
//! ```

use std::borrow::Cow;
use std::fmt;
use std::ops;
use std::sync::{Arc, PoisonError, RwLock};

use crate::column::{Column, ValueType};
use crate::model::ModelId;
use crate::value::Value;

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryKind {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    And,
    Or,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl BinaryKind {
    /// Returns `true` for operators producing a boolean.
    pub const fn is_predicate(self) -> bool {
        matches!(
            self,
            Self::And
                | Self::Or
                | Self::Equal
                | Self::NotEqual
                | Self::GreaterThan
                | Self::GreaterThanOrEqual
                | Self::LessThan
                | Self::LessThanOrEqual
        )
    }
}

/// Unary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryKind {
    Negate,
    Not,
    OnesComplement,
}

/// A reference to a column as seen through one model.
///
/// The same `Arc<Column>` may be reachable through several models (self
/// joins); the `model` id picks the alias.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub model: ModelId,
    pub column: Arc<Column>,
}

impl ColumnRef {
    pub const fn new(model: ModelId, column: Arc<Column>) -> Self {
        Self { model, column }
    }
}

/// A shared, rebindable parameter.
///
/// Parameters compare by pointer identity: the same `Param` referenced twice
/// in one statement binds once.
#[derive(Debug)]
pub struct ParamCell {
    value_type: ValueType,
    value: RwLock<Value>,
}

/// A shared parameter handle.
pub type Param = Arc<ParamCell>;

impl ParamCell {
    /// Creates a new shared parameter.
    pub fn shared(value_type: ValueType, value: impl Into<Value>) -> Param {
        Arc::new(Self {
            value_type,
            value: RwLock::new(value.into()),
        })
    }

    pub const fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    /// Returns a snapshot of the current value.
    pub fn value(&self) -> Value {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebinds the parameter.
    pub fn set(&self, value: impl Into<Value>) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }
}

/// An opaque function key. Dialects dispatch on the key text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionKey(Cow<'static, str>);

impl FunctionKey {
    pub const IS_NULL: Self = Self::builtin("IsNull");
    pub const IS_NOT_NULL: Self = Self::builtin("IsNotNull");
    pub const IF_NULL: Self = Self::builtin("IfNull");
    pub const COALESCE: Self = Self::builtin("Coalesce");
    pub const NOW: Self = Self::builtin("Now");
    pub const UTC_NOW: Self = Self::builtin("UtcNow");
    pub const NEW_GUID: Self = Self::builtin("NewGuid");
    pub const AVERAGE: Self = Self::builtin("Average");
    pub const COUNT: Self = Self::builtin("Count");
    pub const COUNT_ROWS: Self = Self::builtin("CountRows");
    pub const FIRST: Self = Self::builtin("First");
    pub const LAST: Self = Self::builtin("Last");
    pub const MAX: Self = Self::builtin("Max");
    pub const MIN: Self = Self::builtin("Min");
    pub const SUM: Self = Self::builtin("Sum");
    pub const CONTAINS: Self = Self::builtin("Contains");
    pub const XML_VALUE: Self = Self::builtin("XmlValue");
    pub const TRIM: Self = Self::builtin("Trim");
    pub const STRING_AGG: Self = Self::builtin("StringAgg");

    const fn builtin(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a key for a function outside the built-in set.
    pub fn custom(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    Binary {
        kind: BinaryKind,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        kind: UnaryKind,
        operand: Box<Expr>,
    },
    /// `CASE [on] WHEN .. THEN .. ELSE .. END`. Without `on` each `when` is a
    /// predicate.
    Case {
        on: Option<Box<Expr>>,
        whens: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    Cast {
        operand: Box<Expr>,
        target: ValueType,
    },
    Column(ColumnRef),
    Constant {
        value: Value,
        value_type: ValueType,
    },
    Param(Param),
    Function {
        key: FunctionKey,
        args: Vec<Expr>,
        result: ValueType,
    },
}

impl Expr {
    // ── Leaves ───────────────────────────────────────────────────────

    /// A constant typed after its value. NULL constants become `String`
    /// typed; use [`Expr::null`] to pick the type.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let value_type = value.value_type().unwrap_or(ValueType::String);
        Self::Constant { value, value_type }
    }

    /// A constant with an explicit logical type.
    pub fn typed_constant(value: impl Into<Value>, value_type: ValueType) -> Self {
        Self::Constant {
            value: value.into(),
            value_type,
        }
    }

    /// A typed NULL.
    pub const fn null(value_type: ValueType) -> Self {
        Self::Constant {
            value: Value::Null,
            value_type,
        }
    }

    pub fn param(param: &Param) -> Self {
        Self::Param(Arc::clone(param))
    }

    pub fn cast(self, target: ValueType) -> Self {
        Self::Cast {
            operand: Box::new(self),
            target,
        }
    }

    pub fn case(on: Option<Self>, whens: Vec<(Self, Self)>, otherwise: Option<Self>) -> Self {
        Self::Case {
            on: on.map(Box::new),
            whens,
            otherwise: otherwise.map(Box::new),
        }
    }

    pub fn call(key: FunctionKey, args: Vec<Self>, result: ValueType) -> Self {
        Self::Function { key, args, result }
    }

    // ── Operators ────────────────────────────────────────────────────

    pub fn binary(kind: BinaryKind, left: Self, right: Self) -> Self {
        Self::Binary {
            kind,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(kind: UnaryKind, operand: Self) -> Self {
        Self::Unary {
            kind,
            operand: Box::new(operand),
        }
    }

    pub fn eq(self, other: Self) -> Self {
        Self::binary(BinaryKind::Equal, self, other)
    }

    pub fn ne(self, other: Self) -> Self {
        Self::binary(BinaryKind::NotEqual, self, other)
    }

    pub fn gt(self, other: Self) -> Self {
        Self::binary(BinaryKind::GreaterThan, self, other)
    }

    pub fn ge(self, other: Self) -> Self {
        Self::binary(BinaryKind::GreaterThanOrEqual, self, other)
    }

    pub fn lt(self, other: Self) -> Self {
        Self::binary(BinaryKind::LessThan, self, other)
    }

    pub fn le(self, other: Self) -> Self {
        Self::binary(BinaryKind::LessThanOrEqual, self, other)
    }

    pub fn and(self, other: Self) -> Self {
        Self::binary(BinaryKind::And, self, other)
    }

    pub fn or(self, other: Self) -> Self {
        Self::binary(BinaryKind::Or, self, other)
    }

    // ── Functions ────────────────────────────────────────────────────

    pub fn is_null(self) -> Self {
        Self::call(FunctionKey::IS_NULL, vec![self], ValueType::Boolean)
    }

    pub fn is_not_null(self) -> Self {
        Self::call(FunctionKey::IS_NOT_NULL, vec![self], ValueType::Boolean)
    }

    pub fn if_null(self, replacement: Self) -> Self {
        let result = self.value_type();
        Self::call(FunctionKey::IF_NULL, vec![self, replacement], result)
    }

    pub fn coalesce(args: Vec<Self>) -> Self {
        let result = args.first().map_or(ValueType::String, Self::value_type);
        Self::call(FunctionKey::COALESCE, args, result)
    }

    pub fn now() -> Self {
        Self::call(FunctionKey::NOW, vec![], ValueType::DateTime)
    }

    pub fn utc_now() -> Self {
        Self::call(FunctionKey::UTC_NOW, vec![], ValueType::DateTime)
    }

    pub fn new_guid() -> Self {
        Self::call(FunctionKey::NEW_GUID, vec![], ValueType::Guid)
    }

    pub fn count_rows() -> Self {
        Self::call(FunctionKey::COUNT_ROWS, vec![], ValueType::Int32)
    }

    pub fn count(self) -> Self {
        Self::call(FunctionKey::COUNT, vec![self], ValueType::Int32)
    }

    /// An aggregate whose result has the operand's type (SUM, MIN, MAX, ...).
    pub fn aggregate(self, key: FunctionKey) -> Self {
        let result = self.value_type();
        Self::call(key, vec![self], result)
    }

    pub fn contains(self, needle: Self) -> Self {
        Self::call(FunctionKey::CONTAINS, vec![self, needle], ValueType::Boolean)
    }

    pub fn trim(self) -> Self {
        Self::call(FunctionKey::TRIM, vec![self], ValueType::String)
    }

    pub fn string_agg(self, separator: Self) -> Self {
        Self::call(FunctionKey::STRING_AGG, vec![self, separator], ValueType::String)
    }

    /// Extracts a scalar from an XML column with an XQuery path.
    pub fn xml_value(self, xpath: &str, result: ValueType) -> Self {
        Self::call(
            FunctionKey::XML_VALUE,
            vec![self, Self::constant(xpath)],
            result,
        )
    }

    // ── Typing ───────────────────────────────────────────────────────

    /// Returns the logical result type of this expression.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Binary { kind, left, .. } => {
                if kind.is_predicate() {
                    ValueType::Boolean
                } else {
                    left.value_type()
                }
            }
            Self::Unary { kind, operand } => match kind {
                UnaryKind::Not => ValueType::Boolean,
                UnaryKind::Negate | UnaryKind::OnesComplement => operand.value_type(),
            },
            Self::Case {
                whens, otherwise, ..
            } => whens
                .first()
                .map(|(_, then)| then.value_type())
                .or_else(|| otherwise.as_ref().map(|e| e.value_type()))
                .unwrap_or(ValueType::String),
            Self::Cast { target, .. } => target.clone(),
            Self::Column(c) => c.column.value_type.clone(),
            Self::Constant { value_type, .. } => value_type.clone(),
            Self::Param(p) => p.value_type().clone(),
            Self::Function { result, .. } => result.clone(),
        }
    }
}

// ── Operator overloads ─────────────────────────────────────────────────

macro_rules! impl_binary_op {
    ($($trait:ident :: $method:ident => $kind:ident),* $(,)?) => {
        $(
            impl ops::$trait for Expr {
                type Output = Expr;

                fn $method(self, rhs: Expr) -> Expr {
                    Expr::binary(BinaryKind::$kind, self, rhs)
                }
            }
        )*
    };
}

impl_binary_op! {
    Add::add => Add,
    Sub::sub => Subtract,
    Mul::mul => Multiply,
    Div::div => Divide,
    Rem::rem => Modulo,
    BitAnd::bitand => BitwiseAnd,
    BitOr::bitor => BitwiseOr,
    BitXor::bitxor => BitwiseXor,
}

impl ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self {
        Self::unary(UnaryKind::Negate, self)
    }
}

/// Logical NOT for boolean operands, ones' complement otherwise.
impl ops::Not for Expr {
    type Output = Self;

    fn not(self) -> Self {
        let kind = if self.value_type() == ValueType::Boolean {
            UnaryKind::Not
        } else {
            UnaryKind::OnesComplement
        };
        Self::unary(kind, self)
    }
}
