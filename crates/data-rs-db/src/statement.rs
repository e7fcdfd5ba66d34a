//! Statement trees: the relational shape of queries and DML commands.
//!
//! A [`Statement`] is a row-producing node (SELECT, UNION, table reference,
//! or JOIN). A [`Command`] is what gets executed: a query, an INSERT (with
//! optional identity output), an INSERT of one row of values, an UPDATE, or
//! a DELETE. [`CommandTree`] pairs a command with a process-unique
//! [`StatementId`] that keys rendered-SQL caches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::column::Column;
use crate::expr::{ColumnRef, Expr};
use crate::model::{Model, SortDirection};

static STATEMENT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A process-unique command tree identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementId(u64);

impl StatementId {
    fn next() -> Self {
        Self(STATEMENT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

/// One projected output column: `source AS target`.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub source: Expr,
    pub target: Arc<Column>,
}

impl ColumnMapping {
    pub fn new(source: Expr, target: &Arc<Column>) -> Self {
        Self {
            source,
            target: Arc::clone(target),
        }
    }
}

/// An ORDER BY term.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: SortDirection,
}

impl OrderBy {
    pub const fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Ascending,
        }
    }

    pub const fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Descending,
        }
    }
}

/// A SELECT.
#[derive(Debug, Clone)]
pub struct SelectStatement {
    /// The output shape; its id keys the alias when this select is nested.
    pub model: Arc<Model>,
    pub select: Vec<ColumnMapping>,
    pub from: Option<Statement>,
    pub where_: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderBy>,
    pub offset: Option<u64>,
    pub fetch: Option<u64>,
    pub distinct: bool,
}

impl SelectStatement {
    /// Creates a SELECT producing `model`'s rows with an empty projection.
    pub fn new(model: &Arc<Model>) -> Self {
        Self {
            model: Arc::clone(model),
            select: Vec::new(),
            from: None,
            where_: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            offset: None,
            fetch: None,
            distinct: false,
        }
    }

    pub fn column(mut self, source: Expr, target: &Arc<Column>) -> Self {
        self.select.push(ColumnMapping::new(source, target));
        self
    }

    pub fn from(mut self, from: Statement) -> Self {
        self.from = Some(from);
        self
    }

    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_ = Some(condition);
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub const fn fetch(mut self, fetch: u64) -> Self {
        self.fetch = Some(fetch);
        self
    }

    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Returns `true` when OFFSET or FETCH is set.
    pub const fn is_limited(&self) -> bool {
        self.offset.is_some() || self.fetch.is_some()
    }

    pub fn into_statement(self) -> Statement {
        Statement::Select(Box::new(self))
    }
}

/// UNION or UNION ALL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnionKind {
    Union,
    UnionAll,
}

/// A set operation over two queries.
#[derive(Debug, Clone)]
pub struct UnionStatement {
    pub model: Arc<Model>,
    pub left: Statement,
    pub right: Statement,
    pub kind: UnionKind,
}

/// Join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Cross => "CROSS JOIN",
        }
    }
}

/// A join of two row sources.
#[derive(Debug, Clone)]
pub struct JoinStatement {
    pub left: Statement,
    pub right: Statement,
    pub kind: JoinKind,
    /// Equality pairs `left = right`.
    pub on: Vec<(ColumnRef, ColumnRef)>,
    /// An extra condition ANDed after the pairs.
    pub condition: Option<Expr>,
}

/// A row-producing node.
#[derive(Debug, Clone)]
pub enum Statement {
    Select(Box<SelectStatement>),
    Union(Box<UnionStatement>),
    Table(Arc<Model>),
    Join(Box<JoinStatement>),
}

impl Statement {
    pub fn table(model: &Arc<Model>) -> Self {
        Self::Table(Arc::clone(model))
    }

    pub fn union(model: &Arc<Model>, left: Self, right: Self, kind: UnionKind) -> Self {
        Self::Union(Box::new(UnionStatement {
            model: Arc::clone(model),
            left,
            right,
            kind,
        }))
    }

    pub fn join(
        left: Self,
        right: Self,
        kind: JoinKind,
        on: Vec<(ColumnRef, ColumnRef)>,
        condition: Option<Expr>,
    ) -> Self {
        Self::Join(Box::new(JoinStatement {
            left,
            right,
            kind,
            on,
            condition,
        }))
    }

    /// Returns the model for model-bearing nodes; joins have none.
    pub fn model(&self) -> Option<&Arc<Model>> {
        match self {
            Self::Select(s) => Some(&s.model),
            Self::Union(u) => Some(&u.model),
            Self::Table(m) => Some(m),
            Self::Join(_) => None,
        }
    }

    /// Returns `true` for SELECT and UNION nodes.
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::Select(_) | Self::Union(_))
    }
}

/// An INSERT from a row source.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub target: Arc<Model>,
    /// Explicit column mappings; empty means "the target's insertable
    /// columns, taken by name from the source".
    pub columns: Vec<ColumnMapping>,
    pub source: Statement,
    /// A temp mapping model receiving `OUTPUT INSERTED.<identity>` into its
    /// `NewValue` column.
    pub identity_output: Option<Arc<Model>>,
}

/// An INSERT of a single row of values.
#[derive(Debug, Clone)]
pub struct InsertScalarStatement {
    pub target: Arc<Model>,
    pub values: Vec<ColumnMapping>,
    /// Appends `SELECT CAST(SCOPE_IDENTITY() AS BIGINT)`.
    pub output_identity: bool,
}

/// An UPDATE of `target`, optionally driven by a join in `from`.
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub target: Arc<Model>,
    pub assignments: Vec<ColumnMapping>,
    /// Defaults to the target table.
    pub from: Option<Statement>,
    pub where_: Option<Expr>,
}

/// A DELETE from `target`, optionally driven by a join in `from`.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub target: Arc<Model>,
    pub from: Option<Statement>,
    pub where_: Option<Expr>,
}

/// An executable command.
#[derive(Debug, Clone)]
pub enum Command {
    Select(Statement),
    Insert(Box<InsertStatement>),
    InsertScalar(Box<InsertScalarStatement>),
    Update(Box<UpdateStatement>),
    Delete(Box<DeleteStatement>),
}

impl Command {
    /// A short label used in spans and log events.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Select(_) => "select",
            Self::Insert(_) => "insert",
            Self::InsertScalar(_) => "insert_scalar",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }
}

/// An immutable command with a stable identity.
#[derive(Debug, Clone)]
pub struct CommandTree {
    id: StatementId,
    command: Arc<Command>,
}

impl CommandTree {
    pub fn new(command: Command) -> Self {
        Self {
            id: StatementId::next(),
            command: Arc::new(command),
        }
    }

    pub const fn id(&self) -> StatementId {
        self.id
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ValueType;

    #[test]
    fn test_statement_ids_are_unique() {
        let model = Arc::new(Model::new("T"));
        let a = CommandTree::new(Command::Select(Statement::table(&model)));
        let b = a.clone();
        let c = CommandTree::new(Command::Select(Statement::table(&model)));
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.command().kind(), "select");
    }

    #[test]
    fn test_select_builder() {
        let mut m = Model::new("T");
        let x = m.add_column(Column::new("X", ValueType::Int32));
        let m = Arc::new(m);
        let select = SelectStatement::new(&m)
            .column(m.col(&x), &x)
            .from(Statement::table(&m))
            .filter(m.col(&x).gt(Expr::constant(1)))
            .order_by(OrderBy::desc(m.col(&x)))
            .fetch(10);
        assert!(select.is_limited());
        assert_eq!(select.select.len(), 1);
        let stmt = select.into_statement();
        assert!(stmt.is_query());
        assert!(stmt.model().is_some());
    }

    #[test]
    fn test_join_has_no_model() {
        let a = Arc::new(Model::new("A"));
        let b = Arc::new(Model::new("B"));
        let join = Statement::join(
            Statement::table(&a),
            Statement::table(&b),
            JoinKind::Cross,
            vec![],
            None,
        );
        assert!(join.model().is_none());
        assert!(!join.is_query());
        assert_eq!(JoinKind::Left.as_sql(), "LEFT JOIN");
    }
}
