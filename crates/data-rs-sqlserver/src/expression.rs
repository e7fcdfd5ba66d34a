//! Expression rendering.
//!
//! [`ExpressionGenerator`] turns an [`Expr`] into T-SQL with a single
//! `match` over the tree. Expressions are rendered in one of two contexts:
//! value (select lists, operands, assignments) or predicate (WHERE, HAVING,
//! ON, searched CASE conditions, AND/OR/NOT operands). A boolean value used
//! as a predicate renders as `(x = 1)`; a predicate used as a value renders
//! as `CAST(CASE WHEN p THEN 1 ELSE 0 END AS BIT)`.
//!
//! Parameters are interned by pointer identity into a [`ParamList`] and
//! render as `@p1`, `@p2`, ... In inline mode (DDL) they render as literals.

use std::sync::Arc;

use data_rs_core::{DataError, DataResult};
use data_rs_db::{BinaryKind, Expr, FunctionKey, Param, UnaryKind, Value, ValueType};

use crate::alias::AliasMap;
use crate::codec::{quote_identifier, quote_string, render_literal};
use crate::mapper::TypeMapper;
use crate::version::SqlVersion;
use crate::writer::IndentedWriter;

const WINDOW_ALL_ROWS: &str =
    "OVER (ORDER BY (SELECT NULL) ROWS BETWEEN UNBOUNDED PRECEDING AND UNBOUNDED FOLLOWING)";

/// Parameters referenced by one statement, in first-occurrence order.
#[derive(Debug, Default, Clone)]
pub struct ParamList {
    params: Vec<Param>,
}

impl ParamList {
    /// Returns the 1-based ordinal of `param`, adding it on first sight.
    pub fn intern(&mut self, param: &Param) -> usize {
        if let Some(pos) = self.params.iter().position(|p| Arc::ptr_eq(p, param)) {
            return pos + 1;
        }
        self.params.push(Arc::clone(param));
        self.params.len()
    }

    /// The placeholder name for a 1-based ordinal.
    pub fn placeholder(ordinal: usize) -> String {
        format!("@p{ordinal}")
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Iterates `(placeholder, param)` in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (String, &Param)> {
        self.params
            .iter()
            .enumerate()
            .map(|(i, p)| (Self::placeholder(i + 1), p))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Value,
    Predicate,
}

/// Renders expressions for one generation pass.
pub struct ExpressionGenerator<'a> {
    mapper: &'a TypeMapper,
    version: SqlVersion,
    params: ParamList,
    inline_params: bool,
}

impl<'a> ExpressionGenerator<'a> {
    pub fn new(mapper: &'a TypeMapper, version: SqlVersion) -> Self {
        Self {
            mapper,
            version,
            params: ParamList::default(),
            inline_params: false,
        }
    }

    /// A generator that renders parameters as literals.
    pub fn inline(mapper: &'a TypeMapper, version: SqlVersion) -> Self {
        Self {
            inline_params: true,
            ..Self::new(mapper, version)
        }
    }

    pub const fn mapper(&self) -> &'a TypeMapper {
        self.mapper
    }

    pub const fn version(&self) -> SqlVersion {
        self.version
    }

    pub const fn params(&self) -> &ParamList {
        &self.params
    }

    pub fn into_params(self) -> ParamList {
        self.params
    }

    /// Interns a parameter and returns its placeholder.
    pub fn placeholder(&mut self, param: &Param) -> String {
        ParamList::placeholder(self.params.intern(param))
    }

    /// Renders `expr` in value context.
    pub fn render_value(
        &mut self,
        expr: &Expr,
        aliases: Option<&AliasMap>,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        self.render(expr, Context::Value, aliases, w)
    }

    /// Renders `expr` in predicate context.
    pub fn render_predicate(
        &mut self,
        expr: &Expr,
        aliases: Option<&AliasMap>,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        self.render(expr, Context::Predicate, aliases, w)
    }

    /// Renders `expr` in value context into a fresh string.
    pub fn value_to_string(&mut self, expr: &Expr, aliases: Option<&AliasMap>) -> DataResult<String> {
        let mut w = IndentedWriter::new();
        self.render_value(expr, aliases, &mut w)?;
        Ok(w.finish())
    }

    fn render(
        &mut self,
        expr: &Expr,
        ctx: Context,
        aliases: Option<&AliasMap>,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        let predicate = is_predicate(expr);
        match (ctx, predicate) {
            (Context::Predicate, false) => {
                w.write("(");
                self.render_node(expr, aliases, w)?;
                w.write(" = 1)");
                Ok(())
            }
            (Context::Value, true) => {
                w.write("CAST(CASE WHEN ");
                self.render_node(expr, aliases, w)?;
                w.write(" THEN 1 ELSE 0 END AS BIT)");
                Ok(())
            }
            _ => self.render_node(expr, aliases, w),
        }
    }

    fn render_node(
        &mut self,
        expr: &Expr,
        aliases: Option<&AliasMap>,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        match expr {
            Expr::Binary { kind, left, right } => {
                let operand_ctx = if matches!(kind, BinaryKind::And | BinaryKind::Or) {
                    Context::Predicate
                } else {
                    Context::Value
                };
                w.write("(");
                self.render(left, operand_ctx, aliases, w)?;
                w.write(" ").write(binary_token(*kind)).write(" ");
                self.render(right, operand_ctx, aliases, w)?;
                w.write(")");
            }
            Expr::Unary { kind, operand } => match kind {
                UnaryKind::Negate => {
                    w.write("(-");
                    self.render(operand, Context::Value, aliases, w)?;
                    w.write(")");
                }
                UnaryKind::Not => {
                    w.write("(NOT ");
                    self.render(operand, Context::Predicate, aliases, w)?;
                    w.write(")");
                }
                UnaryKind::OnesComplement => {
                    w.write("(~");
                    self.render(operand, Context::Value, aliases, w)?;
                    w.write(")");
                }
            },
            Expr::Case {
                on,
                whens,
                otherwise,
            } => {
                if whens.is_empty() {
                    return Err(DataError::InvalidStatement(
                        "CASE expression without WHEN branches".to_string(),
                    ));
                }
                w.write("CASE");
                let when_ctx = if let Some(on) = on {
                    w.write(" ");
                    self.render(on, Context::Value, aliases, w)?;
                    Context::Value
                } else {
                    Context::Predicate
                };
                w.indent();
                for (when, then) in whens {
                    w.new_line().write("WHEN ");
                    self.render(when, when_ctx, aliases, w)?;
                    w.write(" THEN ");
                    self.render(then, Context::Value, aliases, w)?;
                }
                if let Some(otherwise) = otherwise {
                    w.new_line().write("ELSE ");
                    self.render(otherwise, Context::Value, aliases, w)?;
                }
                w.outdent().new_line().write("END");
            }
            Expr::Cast { operand, target } => {
                let sql_type = self.mapper.default_for(target)?;
                w.write("CAST(");
                self.render(operand, Context::Value, aliases, w)?;
                w.write(" AS ").write(&sql_type.sql()).write(")");
            }
            Expr::Column(column) => {
                if let Some(aliases) = aliases {
                    let alias = aliases.require_id(column.model).map_err(|_| {
                        DataError::InvalidStatement(format!(
                            "column '{}' refers to a model (id {}) that is not part of the statement",
                            column.column.name,
                            column.model.get()
                        ))
                    })?;
                    w.write(&quote_identifier(alias)).write(".");
                }
                w.write(&quote_identifier(&column.column.name));
            }
            Expr::Constant { value, value_type } => {
                let literal = self.literal(value_type, value)?;
                w.write(&literal);
            }
            Expr::Param(param) => {
                if self.inline_params {
                    let literal = self.literal(param.value_type(), &param.value())?;
                    w.write(&literal);
                } else {
                    let placeholder = self.placeholder(param);
                    w.write(&placeholder);
                }
            }
            Expr::Function { key, args, result } => {
                self.render_function(key, args, result, aliases, w)?;
            }
        }
        Ok(())
    }

    fn literal(&self, value_type: &ValueType, value: &Value) -> DataResult<String> {
        let sql_type = self.mapper.default_for(value_type)?;
        render_literal(&sql_type, value)
    }

    fn render_function(
        &mut self,
        key: &FunctionKey,
        args: &[Expr],
        result: &ValueType,
        aliases: Option<&AliasMap>,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        let name = key.as_str();
        match name {
            "IsNull" | "IsNotNull" => {
                let [x] = arity::<1>(key, args)?;
                w.write("(");
                self.render(x, Context::Value, aliases, w)?;
                w.write(if name == "IsNull" {
                    " IS NULL)"
                } else {
                    " IS NOT NULL)"
                });
            }
            "IfNull" => {
                let [x, y] = arity::<2>(key, args)?;
                w.write("ISNULL(");
                self.render(x, Context::Value, aliases, w)?;
                w.write(", ");
                self.render(y, Context::Value, aliases, w)?;
                w.write(")");
            }
            "Coalesce" => {
                if args.len() < 2 {
                    return Err(arity_error(key, "at least 2", args.len()));
                }
                self.call("COALESCE", args, aliases, w)?;
            }
            "Now" | "UtcNow" | "NewGuid" | "CountRows" => {
                arity::<0>(key, args)?;
                w.write(match name {
                    "Now" => "GETDATE()",
                    "UtcNow" => "GETUTCDATE()",
                    "NewGuid" => "NEWID()",
                    _ => "COUNT(*)",
                });
            }
            "Average" | "Count" | "Max" | "Min" | "Sum" => {
                arity::<1>(key, args)?;
                let sql_name = match name {
                    "Average" => "AVG",
                    "Count" => "COUNT",
                    "Max" => "MAX",
                    "Min" => "MIN",
                    _ => "SUM",
                };
                self.call(sql_name, args, aliases, w)?;
            }
            "First" | "Last" => {
                arity::<1>(key, args)?;
                let sql_name = if name == "First" {
                    "FIRST_VALUE"
                } else {
                    "LAST_VALUE"
                };
                self.call(sql_name, args, aliases, w)?;
                w.write(" ").write(WINDOW_ALL_ROWS);
            }
            "Contains" => {
                let [haystack, needle] = arity::<2>(key, args)?;
                w.write("(CHARINDEX(");
                self.render(needle, Context::Value, aliases, w)?;
                w.write(", ");
                self.render(haystack, Context::Value, aliases, w)?;
                w.write(") > 0)");
            }
            "XmlValue" => {
                let [x, path] = arity::<2>(key, args)?;
                let Expr::Constant {
                    value: Value::String(xpath),
                    ..
                } = path
                else {
                    return Err(DataError::InvalidStatement(format!(
                        "function '{key}' expects a constant string path"
                    )));
                };
                let sql_type = self.mapper.default_for(result)?;
                self.render(x, Context::Value, aliases, w)?;
                w.write(".value(")
                    .write(&quote_string(&xpath, true))
                    .write(", ")
                    .write(&quote_string(&sql_type.sql(), true))
                    .write(")");
            }
            "Trim" => {
                let [x] = arity::<1>(key, args)?;
                if self.version.has_2017_functions() {
                    self.call("TRIM", args, aliases, w)?;
                } else {
                    w.write("LTRIM(RTRIM(");
                    self.render(x, Context::Value, aliases, w)?;
                    w.write("))");
                }
            }
            "StringAgg" => {
                arity::<2>(key, args)?;
                if !self.version.has_2017_functions() {
                    return Err(DataError::NotSupported(format!(
                        "function '{key}' requires SQL Server 2017 (Sql14), target is {}",
                        self.version
                    )));
                }
                self.call("STRING_AGG", args, aliases, w)?;
            }
            _ => {
                return Err(DataError::NotSupported(format!(
                    "function '{key}' has no SQL Server translation"
                )))
            }
        }
        Ok(())
    }

    fn call(
        &mut self,
        sql_name: &str,
        args: &[Expr],
        aliases: Option<&AliasMap>,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        w.write(sql_name).write("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                w.write(", ");
            }
            self.render(arg, Context::Value, aliases, w)?;
        }
        w.write(")");
        Ok(())
    }
}

fn arity<'a, const N: usize>(key: &FunctionKey, args: &'a [Expr]) -> DataResult<&'a [Expr; N]> {
    args.try_into()
        .map_err(|_| arity_error(key, &N.to_string(), args.len()))
}

fn arity_error(key: &FunctionKey, expected: &str, got: usize) -> DataError {
    DataError::InvalidStatement(format!(
        "function '{key}' expects {expected} argument(s), got {got}"
    ))
}

const fn binary_token(kind: BinaryKind) -> &'static str {
    match kind {
        BinaryKind::Add => "+",
        BinaryKind::Subtract => "-",
        BinaryKind::Multiply => "*",
        BinaryKind::Divide => "/",
        BinaryKind::Modulo => "%",
        BinaryKind::BitwiseAnd => "&",
        BinaryKind::BitwiseOr => "|",
        BinaryKind::BitwiseXor => "^",
        BinaryKind::And => "AND",
        BinaryKind::Or => "OR",
        BinaryKind::Equal => "=",
        BinaryKind::NotEqual => "<>",
        BinaryKind::GreaterThan => ">",
        BinaryKind::GreaterThanOrEqual => ">=",
        BinaryKind::LessThan => "<",
        BinaryKind::LessThanOrEqual => "<=",
    }
}

/// Returns `true` for expressions T-SQL treats as search conditions.
fn is_predicate(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { kind, .. } => kind.is_predicate(),
        Expr::Unary { kind, .. } => *kind == UnaryKind::Not,
        Expr::Function { key, .. } => {
            *key == FunctionKey::IS_NULL
                || *key == FunctionKey::IS_NOT_NULL
                || *key == FunctionKey::CONTAINS
        }
        _ => false,
    }
}
