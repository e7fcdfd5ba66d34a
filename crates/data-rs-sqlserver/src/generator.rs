//! Statement rendering.
//!
//! [`SqlGenerator`] walks a [`Command`] and produces [`SqlText`]: T-SQL with
//! `@pN` placeholders plus the ordered parameter list. Column expressions
//! are delegated to the [`ExpressionGenerator`]; table aliases come from one
//! [`AliasMap`] built per pass.
//!
//! Layout rules:
//!
//! - the outermost statement ends with `;`
//! - nested queries are parenthesized and followed by their alias, except
//!   set-operation operands which get no alias
//! - ORDER BY and OFFSET/FETCH are only emitted on the outermost query or on
//!   a nested query that has OFFSET/FETCH
//! - OFFSET/FETCH without ORDER BY orders by `(SELECT NULL)`; FETCH without
//!   OFFSET starts at `OFFSET 0 ROWS`

use std::sync::Arc;

use data_rs_core::{DataError, DataResult};
use data_rs_db::{
    Column, ColumnMapping, Command, DeleteStatement, Expr, InsertScalarStatement,
    InsertStatement, JoinKind, JoinStatement, Model, OrderBy, RowSource, SelectStatement,
    SortDirection, Statement, UnionKind, UnionStatement, UpdateStatement,
};

use crate::alias::{build_alias_map, build_source_alias_map, AliasMap};
use crate::codec::{quote_identifier, render_literal};
use crate::executor::SqlParameter;
use crate::expression::{ExpressionGenerator, ParamList};
use crate::mapper::TypeMapper;
use crate::temp_table::TempTableNames;
use crate::version::SqlVersion;
use crate::writer::IndentedWriter;

/// Rendered SQL and the parameters it references.
///
/// Parameters are kept as shared handles; their current values are bound on
/// every [`bind`](Self::bind), so a cached `SqlText` follows rebinding.
#[derive(Debug, Clone)]
pub struct SqlText {
    sql: String,
    params: ParamList,
}

impl SqlText {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub const fn params(&self) -> &ParamList {
        &self.params
    }

    /// Snapshots the parameter values as native driver parameters.
    pub fn bind(&self, mapper: &TypeMapper) -> DataResult<Vec<SqlParameter>> {
        self.params
            .iter()
            .map(|(name, param)| {
                let sql_type = mapper.default_for(param.value_type())?;
                SqlParameter::input(name, &sql_type, &param.value())
            })
            .collect()
    }

    /// Returns the statement preceded by a `DECLARE` per parameter, so it
    /// can be pasted into a query window.
    pub fn to_debug_sql(&self, mapper: &TypeMapper) -> DataResult<String> {
        let mut out = String::new();
        for (name, param) in self.params.iter() {
            let sql_type = mapper.default_for(param.value_type())?;
            let literal = render_literal(&sql_type, &param.value())?;
            out.push_str(&format!("DECLARE {name} {} = {literal};\n", sql_type.sql()));
        }
        out.push_str(&self.sql);
        Ok(out)
    }
}

/// Renders one command. Create a fresh generator per pass.
pub struct SqlGenerator<'a> {
    expr: ExpressionGenerator<'a>,
    temp_tables: &'a TempTableNames,
    depth: usize,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(mapper: &'a TypeMapper, version: SqlVersion, temp_tables: &'a TempTableNames) -> Self {
        Self {
            expr: ExpressionGenerator::new(mapper, version),
            temp_tables,
            depth: 0,
        }
    }

    /// Renders `command`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use data_rs_db::{Column, Command, Expr, Model, SelectStatement, Statement, ValueType};
    /// use data_rs_sqlserver::generator::SqlGenerator;
    /// use data_rs_sqlserver::mapper::TypeMapper;
    /// use data_rs_sqlserver::temp_table::TempTableNames;
    /// use data_rs_sqlserver::version::SqlVersion;
    ///
    /// let mut customer = Model::new("Customer");
    /// let name = customer.add_column(Column::new("Name", ValueType::String));
    /// let customer = Arc::new(customer);
    /// let select = SelectStatement::new(&customer)
    ///     .column(customer.col(&name), &name)
    ///     .from(Statement::table(&customer))
    ///     .filter(customer.col(&name).eq(Expr::constant("Ada")));
    ///
    /// let mapper = TypeMapper::new();
    /// let temps = TempTableNames::new();
    /// let text = SqlGenerator::new(&mapper, SqlVersion::Sql13, &temps)
    ///     .generate(&Command::Select(select.into_statement()))
    ///     .unwrap();
    /// assert_eq!(
    ///     text.sql(),
    ///     "SELECT [Customer].[Name]\nFROM [Customer] [Customer]\nWHERE ([Customer].[Name] = N'Ada');"
    /// );
    /// ```
    pub fn generate(mut self, command: &Command) -> DataResult<SqlText> {
        let mut w = IndentedWriter::new();
        match command {
            Command::Select(statement) => {
                let aliases = build_alias_map(statement, self.temp_tables)?;
                self.write_query(statement, &aliases, &mut w)?;
                w.write(";");
            }
            Command::Insert(insert) => {
                self.write_insert(insert, &mut w)?;
                w.write(";");
            }
            Command::InsertScalar(insert) => self.write_insert_scalar(insert, &mut w)?,
            Command::Update(update) => {
                self.write_update(update, &mut w)?;
                w.write(";");
            }
            Command::Delete(delete) => {
                self.write_delete(delete, &mut w)?;
                w.write(";");
            }
        }
        Ok(SqlText {
            sql: w.finish(),
            params: self.expr.into_params(),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    fn write_query(
        &mut self,
        statement: &Statement,
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        match statement {
            Statement::Select(select) => self.write_select(select, aliases, w),
            Statement::Union(union) => self.write_union(union, aliases, w),
            Statement::Table(model) => {
                let columns: Vec<&Arc<Column>> = model.columns.iter().collect();
                self.write_table_select(model, &columns, aliases, w)
            }
            Statement::Join(_) => Err(DataError::InvalidStatement(
                "a join cannot be queried directly; wrap it in a SELECT".to_string(),
            )),
        }
    }

    /// `SELECT [alias].[c], ... FROM <table>` for an untransformed table.
    fn write_table_select(
        &mut self,
        model: &Arc<Model>,
        columns: &[&Arc<Column>],
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        let alias = quote_identifier(aliases.require(model)?);
        let list = if columns.is_empty() {
            format!("{alias}.*")
        } else {
            columns
                .iter()
                .map(|c| format!("{alias}.{}", quote_identifier(&c.name)))
                .collect::<Vec<_>>()
                .join(", ")
        };
        w.write("SELECT ").write(&list).new_line().write("FROM ");
        self.write_source(&Statement::Table(Arc::clone(model)), aliases, w)
    }

    fn write_select(
        &mut self,
        select: &SelectStatement,
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        w.write("SELECT ");
        if select.distinct {
            w.write("DISTINCT ");
        }
        if select.select.is_empty() {
            w.write("*");
        }
        for (i, mapping) in select.select.iter().enumerate() {
            if i > 0 {
                w.write(", ");
            }
            self.write_projection(mapping, aliases, w)?;
        }
        if let Some(from) = &select.from {
            w.new_line().write("FROM ");
            self.write_source(from, aliases, w)?;
        }
        if let Some(condition) = &select.where_ {
            w.new_line().write("WHERE ");
            self.expr.render_predicate(condition, Some(aliases), w)?;
        }
        if !select.group_by.is_empty() {
            w.new_line().write("GROUP BY ");
            self.write_value_list(&select.group_by, aliases, w)?;
        }
        if let Some(having) = &select.having {
            w.new_line().write("HAVING ");
            self.expr.render_predicate(having, Some(aliases), w)?;
        }
        if self.depth == 0 || select.is_limited() {
            self.write_order_and_limit(select, aliases, w)?;
        }
        Ok(())
    }

    fn write_projection(
        &mut self,
        mapping: &ColumnMapping,
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        self.expr.render_value(&mapping.source, Some(aliases), w)?;
        let same_name = matches!(&mapping.source, Expr::Column(c) if c.column.name == mapping.target.name);
        if !same_name {
            w.write(" AS ").write(&quote_identifier(&mapping.target.name));
        }
        Ok(())
    }

    fn write_order_and_limit(
        &mut self,
        select: &SelectStatement,
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        if !select.order_by.is_empty() {
            w.new_line().write("ORDER BY ");
            for (i, OrderBy { expr, direction }) in select.order_by.iter().enumerate() {
                if i > 0 {
                    w.write(", ");
                }
                self.expr.render_value(expr, Some(aliases), w)?;
                match direction {
                    SortDirection::Ascending => {
                        w.write(" ASC");
                    }
                    SortDirection::Descending => {
                        w.write(" DESC");
                    }
                    SortDirection::Unspecified => {}
                }
            }
        } else if select.is_limited() {
            w.new_line().write("ORDER BY (SELECT NULL)");
        }
        if select.is_limited() {
            let offset = select.offset.unwrap_or(0);
            w.new_line().write(&format!("OFFSET {offset} ROWS"));
            if let Some(fetch) = select.fetch {
                w.write(&format!(" FETCH NEXT {fetch} ROWS ONLY"));
            }
        }
        Ok(())
    }

    fn write_union(
        &mut self,
        union: &UnionStatement,
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        self.write_nested(&union.left, aliases, w)?;
        w.new_line().write(match union.kind {
            UnionKind::Union => "UNION",
            UnionKind::UnionAll => "UNION ALL",
        });
        w.new_line();
        self.write_nested(&union.right, aliases, w)
    }

    /// `(\n    <query>\n)` one level deeper.
    fn write_nested(
        &mut self,
        statement: &Statement,
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        w.write("(").indent().new_line();
        self.depth += 1;
        let result = self.write_query(statement, aliases, w);
        self.depth -= 1;
        result?;
        w.outdent().new_line().write(")");
        Ok(())
    }

    fn write_value_list(
        &mut self,
        exprs: &[Expr],
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                w.write(", ");
            }
            self.expr.render_value(expr, Some(aliases), w)?;
        }
        Ok(())
    }

    // ── Sources ──────────────────────────────────────────────────────

    fn write_source(
        &mut self,
        source: &Statement,
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        match source {
            Statement::Table(model) => {
                let alias = quote_identifier(aliases.require(model)?);
                match &model.source {
                    RowSource::Table | RowSource::TempTable => {
                        let name = self.table_name(model)?;
                        w.write(&name).write(" ").write(&alias);
                    }
                    RowSource::JsonRowset(param) => {
                        let placeholder = self.expr.placeholder(param);
                        let mut columns = Vec::with_capacity(model.columns.len());
                        for column in &model.columns {
                            let sql_type = self.expr.mapper().resolve(column)?;
                            columns.push(format!(
                                "{} {}",
                                quote_identifier(&column.name),
                                sql_type.sql()
                            ));
                        }
                        w.write(&format!(
                            "OPENJSON({placeholder}) WITH ({}) {alias}",
                            columns.join(", ")
                        ));
                    }
                    RowSource::Derived => {
                        return Err(DataError::InvalidStatement(format!(
                            "derived model '{}' has no physical source",
                            model.name
                        )))
                    }
                }
            }
            Statement::Select(select) => {
                let alias = quote_identifier(aliases.require(&select.model)?);
                self.write_nested(source, aliases, w)?;
                w.write(" ").write(&alias);
            }
            Statement::Union(union) => {
                let alias = quote_identifier(aliases.require(&union.model)?);
                self.write_nested(source, aliases, w)?;
                w.write(" ").write(&alias);
            }
            Statement::Join(join) => self.write_join(join, aliases, w)?,
        }
        Ok(())
    }

    fn write_join(
        &mut self,
        join: &JoinStatement,
        aliases: &AliasMap,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        let has_condition = !join.on.is_empty() || join.condition.is_some();
        match (join.kind, has_condition) {
            (JoinKind::Cross, true) => {
                return Err(DataError::InvalidStatement(
                    "CROSS JOIN cannot carry a join condition".to_string(),
                ))
            }
            (JoinKind::Inner | JoinKind::Left | JoinKind::Right, false) => {
                return Err(DataError::InvalidStatement(format!(
                    "{} requires a join condition",
                    join.kind.as_sql()
                )))
            }
            _ => {}
        }
        self.write_source(&join.left, aliases, w)?;
        w.new_line().write(join.kind.as_sql()).write(" ");
        if matches!(join.right, Statement::Join(_)) {
            w.write("(");
            self.write_source(&join.right, aliases, w)?;
            w.write(")");
        } else {
            self.write_source(&join.right, aliases, w)?;
        }
        if has_condition {
            w.write(" ON ");
            let mut first = true;
            for (left, right) in &join.on {
                if !first {
                    w.write(" AND ");
                }
                first = false;
                self.expr
                    .render_value(&Expr::Column(left.clone()), Some(aliases), w)?;
                w.write(" = ");
                self.expr
                    .render_value(&Expr::Column(right.clone()), Some(aliases), w)?;
            }
            if let Some(condition) = &join.condition {
                if !first {
                    w.write(" AND ");
                }
                self.expr.render_predicate(condition, Some(aliases), w)?;
            }
        }
        Ok(())
    }

    /// `[schema].[Name]` or `[#Name]`, without alias.
    fn table_name(&self, model: &Model) -> DataResult<String> {
        match &model.source {
            RowSource::Table => Ok(match &model.schema {
                Some(schema) => format!(
                    "{}.{}",
                    quote_identifier(schema),
                    quote_identifier(&model.name)
                ),
                None => quote_identifier(&model.name),
            }),
            RowSource::TempTable => Ok(quote_identifier(self.temp_tables.require(model)?)),
            RowSource::JsonRowset(_) | RowSource::Derived => Err(DataError::InvalidStatement(
                format!("model '{}' is not backed by a table", model.name),
            )),
        }
    }

    // ── DML ──────────────────────────────────────────────────────────

    fn write_insert(&mut self, insert: &InsertStatement, w: &mut IndentedWriter) -> DataResult<()> {
        let target = self.table_name(&insert.target)?;
        let (column_names, body) = self.insert_shape(insert)?;
        w.write("INSERT INTO ")
            .write(&target)
            .write(" (")
            .write(&column_names.join(", "))
            .write(")");
        if let Some(mapping) = &insert.identity_output {
            let identity = insert.target.identity_column().ok_or_else(|| {
                DataError::InvalidStatement(format!(
                    "identity output requested but '{}' has no identity column",
                    insert.target.name
                ))
            })?;
            let mapping_name = self.table_name(mapping)?;
            w.new_line().write(&format!(
                "OUTPUT INSERTED.{} INTO {mapping_name} ([NewValue])",
                quote_identifier(&identity.name)
            ));
        }
        w.new_line();
        match body {
            InsertBody::Mapped => {
                let aliases = build_source_alias_map(&insert.source, self.temp_tables)?;
                w.write("SELECT ");
                let sources: Vec<Expr> = insert.columns.iter().map(|m| m.source.clone()).collect();
                self.write_value_list(&sources, &aliases, w)?;
                w.new_line().write("FROM ");
                self.write_source(&insert.source, &aliases, w)
            }
            InsertBody::Query => {
                let aliases = build_alias_map(&insert.source, self.temp_tables)?;
                self.write_query(&insert.source, &aliases, w)
            }
            InsertBody::Table(model, columns) => {
                let aliases = build_alias_map(&insert.source, self.temp_tables)?;
                let columns: Vec<&Arc<Column>> = columns.iter().collect();
                self.write_table_select(&model, &columns, &aliases, w)
            }
        }
    }

    /// Decides the INSERT column list and how the body is rendered.
    fn insert_shape(&self, insert: &InsertStatement) -> DataResult<(Vec<String>, InsertBody)> {
        if !insert.columns.is_empty() {
            let names = insert
                .columns
                .iter()
                .map(|m| quote_identifier(&m.target.name))
                .collect();
            return Ok((names, InsertBody::Mapped));
        }
        match &insert.source {
            Statement::Select(select) if !select.select.is_empty() => {
                let mut names = Vec::with_capacity(select.select.len());
                for mapping in &select.select {
                    if insert.target.column(&mapping.target.name).is_none() {
                        return Err(DataError::InvalidStatement(format!(
                            "'{}' has no column '{}'",
                            insert.target.name, mapping.target.name
                        )));
                    }
                    names.push(quote_identifier(&mapping.target.name));
                }
                Ok((names, InsertBody::Query))
            }
            Statement::Table(source) => {
                let mut names = Vec::new();
                let mut columns = Vec::new();
                for column in insert.target.insertable_columns() {
                    let from = source.column(&column.name).ok_or_else(|| {
                        DataError::InvalidStatement(format!(
                            "source '{}' has no column '{}' for insert into '{}'",
                            source.name, column.name, insert.target.name
                        ))
                    })?;
                    names.push(quote_identifier(&column.name));
                    columns.push(Arc::clone(from));
                }
                Ok((names, InsertBody::Table(Arc::clone(source), columns)))
            }
            Statement::Select(_) | Statement::Union(_) | Statement::Join(_) => {
                Err(DataError::InvalidStatement(format!(
                    "insert into '{}' needs explicit column mappings for this source",
                    insert.target.name
                )))
            }
        }
    }

    fn write_insert_scalar(
        &mut self,
        insert: &InsertScalarStatement,
        w: &mut IndentedWriter,
    ) -> DataResult<()> {
        let target = self.table_name(&insert.target)?;
        w.write("INSERT INTO ").write(&target);
        if insert.values.is_empty() {
            w.write(" DEFAULT VALUES;");
        } else {
            let names: Vec<String> = insert
                .values
                .iter()
                .map(|m| quote_identifier(&m.target.name))
                .collect();
            w.write(" (").write(&names.join(", ")).write(")");
            w.new_line().write("VALUES (");
            for (i, mapping) in insert.values.iter().enumerate() {
                if i > 0 {
                    w.write(", ");
                }
                self.expr.render_value(&mapping.source, None, w)?;
            }
            w.write(");");
        }
        if insert.output_identity {
            w.new_line().write("SELECT CAST(SCOPE_IDENTITY() AS BIGINT);");
        }
        Ok(())
    }

    fn write_update(&mut self, update: &UpdateStatement, w: &mut IndentedWriter) -> DataResult<()> {
        if update.assignments.is_empty() {
            return Err(DataError::InvalidStatement(format!(
                "update of '{}' has no assignments",
                update.target.name
            )));
        }
        let from = update
            .from
            .clone()
            .unwrap_or_else(|| Statement::table(&update.target));
        let aliases = build_source_alias_map(&from, self.temp_tables)?;
        let alias = quote_identifier(aliases.require(&update.target)?);
        w.write("UPDATE ").write(&alias).new_line().write("SET ");
        for (i, assignment) in update.assignments.iter().enumerate() {
            if i > 0 {
                w.write(", ");
            }
            w.write(&quote_identifier(&assignment.target.name)).write(" = ");
            self.expr
                .render_value(&assignment.source, Some(&aliases), w)?;
        }
        w.new_line().write("FROM ");
        self.write_source(&from, &aliases, w)?;
        if let Some(condition) = &update.where_ {
            w.new_line().write("WHERE ");
            self.expr.render_predicate(condition, Some(&aliases), w)?;
        }
        Ok(())
    }

    fn write_delete(&mut self, delete: &DeleteStatement, w: &mut IndentedWriter) -> DataResult<()> {
        let from = delete
            .from
            .clone()
            .unwrap_or_else(|| Statement::table(&delete.target));
        let aliases = build_source_alias_map(&from, self.temp_tables)?;
        let alias = quote_identifier(aliases.require(&delete.target)?);
        w.write("DELETE ").write(&alias).new_line().write("FROM ");
        self.write_source(&from, &aliases, w)?;
        if let Some(condition) = &delete.where_ {
            w.new_line().write("WHERE ");
            self.expr.render_predicate(condition, Some(&aliases), w)?;
        }
        Ok(())
    }
}

enum InsertBody {
    /// `SELECT <mapping sources> FROM <source>`.
    Mapped,
    /// The source query as is.
    Query,
    /// `SELECT <columns> FROM <table>`.
    Table(Arc<Model>, Vec<Arc<Column>>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_rs_db::{ColumnRef, FunctionKey, ParamCell, ValueType};
    use rust_decimal::Decimal;

    struct Fixture {
        customer: Arc<Model>,
        c_id: Arc<Column>,
        c_name: Arc<Column>,
        c_active: Arc<Column>,
        orders: Arc<Model>,
        o_customer: Arc<Column>,
        o_total: Arc<Column>,
    }

    fn fixture() -> Fixture {
        let mut customer = Model::new("Customer");
        let c_id = customer.add_column(Column::new("Id", ValueType::Int32).identity(1, 1));
        let c_name = customer.add_column(Column::new("Name", ValueType::String));
        let c_active = customer.add_column(Column::new("Active", ValueType::Boolean));
        let mut orders = Model::new("Order").with_schema("Sales");
        orders.add_column(Column::new("Id", ValueType::Int32).identity(1, 1));
        let o_customer = orders.add_column(Column::new("CustomerId", ValueType::Int32));
        let o_total = orders.add_column(Column::new("Total", ValueType::Decimal));
        Fixture {
            customer: Arc::new(customer),
            c_id,
            c_name,
            c_active,
            orders: Arc::new(orders),
            o_customer,
            o_total,
        }
    }

    fn generate_with(command: &Command, temps: &TempTableNames) -> DataResult<SqlText> {
        let mapper = TypeMapper::new();
        SqlGenerator::new(&mapper, SqlVersion::Sql14, temps).generate(command)
    }

    fn generate(command: &Command) -> DataResult<SqlText> {
        generate_with(command, &TempTableNames::new())
    }

    fn select_sql(select: SelectStatement) -> String {
        generate(&Command::Select(select.into_statement()))
            .unwrap()
            .sql()
            .to_string()
    }

    fn orders_join_customer(f: &Fixture) -> Statement {
        Statement::join(
            Statement::table(&f.orders),
            Statement::table(&f.customer),
            JoinKind::Inner,
            vec![(
                ColumnRef::new(f.orders.id, Arc::clone(&f.o_customer)),
                ColumnRef::new(f.customer.id, Arc::clone(&f.c_id)),
            )],
            None,
        )
    }

    #[test]
    fn test_table_root_selects_every_column() {
        let f = fixture();
        let text = generate(&Command::Select(Statement::table(&f.customer))).unwrap();
        assert_eq!(
            text.sql(),
            "SELECT [Customer].[Id], [Customer].[Name], [Customer].[Active]\nFROM [Customer] [Customer];"
        );
    }

    #[test]
    fn test_nested_select_parenthesized_and_aliased() {
        let f = fixture();
        let mut shape = Model::derived("t");
        let t_name = shape.add_column(Column::new("Name", ValueType::String));
        let shape = Arc::new(shape);
        let inner = SelectStatement::new(&shape)
            .column(f.customer.col(&f.c_name), &t_name)
            .from(Statement::table(&f.customer))
            .order_by(OrderBy::asc(f.customer.col(&f.c_name)));
        let out = Arc::new(Model::derived("out"));
        let outer = SelectStatement::new(&out)
            .column(shape.col(&t_name), &t_name)
            .from(inner.into_statement());
        let sql = select_sql(outer);
        assert_eq!(
            sql,
            "SELECT [t].[Name]\nFROM (\n    SELECT [Customer].[Name]\n    FROM [Customer] [Customer]\n) [t];"
        );
        assert_eq!(sql.matches(';').count(), 1);
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_nested_limited_select_keeps_order_by() {
        let f = fixture();
        let shape = Arc::new(Model::derived("top"));
        let inner = SelectStatement::new(&shape)
            .column(f.customer.col(&f.c_name), &f.c_name)
            .from(Statement::table(&f.customer))
            .order_by(OrderBy::desc(f.customer.col(&f.c_id)))
            .fetch(5);
        let out = Arc::new(Model::derived("out"));
        let sql = select_sql(SelectStatement::new(&out).from(inner.into_statement()));
        assert!(sql.contains(
            "    ORDER BY [Customer].[Id] DESC\n    OFFSET 0 ROWS FETCH NEXT 5 ROWS ONLY\n) [top];"
        ));
        assert!(sql.starts_with("SELECT *\nFROM ("));
    }

    #[test]
    fn test_offset_fetch_without_order_by() {
        let f = fixture();
        let select = SelectStatement::new(&f.customer)
            .column(f.customer.col(&f.c_name), &f.c_name)
            .from(Statement::table(&f.customer))
            .offset(20)
            .fetch(10);
        assert_eq!(
            select_sql(select),
            "SELECT [Customer].[Name]\nFROM [Customer] [Customer]\nORDER BY (SELECT NULL)\nOFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY;"
        );
    }

    #[test]
    fn test_union_operands_have_no_alias() {
        let f = fixture();
        let other = Arc::new(f.customer.clone_as("c2"));
        let out = Arc::new(Model::derived("u"));
        let union = Statement::union(
            &out,
            SelectStatement::new(&out)
                .column(f.customer.col(&f.c_name), &f.c_name)
                .from(Statement::table(&f.customer))
                .into_statement(),
            SelectStatement::new(&out)
                .column(other.col(&f.c_name), &f.c_name)
                .from(Statement::table(&other))
                .into_statement(),
            UnionKind::UnionAll,
        );
        let text = generate(&Command::Select(union)).unwrap();
        assert_eq!(
            text.sql(),
            "(\n    SELECT [Customer].[Name]\n    FROM [Customer] [Customer]\n)\nUNION ALL\n(\n    SELECT [Customer1].[Name]\n    FROM [Customer] [Customer1]\n);"
        );
    }

    #[test]
    fn test_inner_join_on_pairs() {
        let f = fixture();
        let out = Arc::new(Model::derived("out"));
        let select = SelectStatement::new(&out)
            .column(f.orders.col(&f.o_total), &f.o_total)
            .column(f.customer.col(&f.c_name), &f.c_name)
            .from(orders_join_customer(&f));
        assert_eq!(
            select_sql(select),
            "SELECT [Order].[Total], [Customer].[Name]\nFROM [Sales].[Order] [Order]\nINNER JOIN [Customer] [Customer] ON [Order].[CustomerId] = [Customer].[Id];"
        );
    }

    #[test]
    fn test_join_condition_rules() {
        let f = fixture();
        let out = Arc::new(Model::derived("out"));
        let missing = Statement::join(
            Statement::table(&f.orders),
            Statement::table(&f.customer),
            JoinKind::Left,
            vec![],
            None,
        );
        let err = generate(&Command::Select(
            SelectStatement::new(&out).from(missing).into_statement(),
        ))
        .unwrap_err();
        assert!(matches!(err, DataError::InvalidStatement(ref m) if m.contains("LEFT JOIN")));

        let cross = Statement::join(
            Statement::table(&f.orders),
            Statement::table(&f.customer),
            JoinKind::Cross,
            vec![],
            None,
        );
        let sql = generate(&Command::Select(
            SelectStatement::new(&out).from(cross).into_statement(),
        ))
        .unwrap();
        assert!(sql.sql().ends_with("CROSS JOIN [Customer] [Customer];"));
    }

    #[test]
    fn test_duplicate_model_in_from_fails() {
        let f = fixture();
        let out = Arc::new(Model::derived("out"));
        let join = Statement::join(
            Statement::table(&f.customer),
            Statement::table(&f.customer),
            JoinKind::Cross,
            vec![],
            None,
        );
        let err = generate(&Command::Select(
            SelectStatement::new(&out).from(join).into_statement(),
        ))
        .unwrap_err();
        assert!(matches!(err, DataError::InvalidStatement(_)));
    }

    #[test]
    fn test_group_by_having_distinct() {
        let f = fixture();
        let mut out = Model::derived("totals");
        let out_total = out.add_column(Column::new("Total", ValueType::Decimal));
        let out = Arc::new(out);
        let sum = f.orders.col(&f.o_total).aggregate(FunctionKey::SUM);
        let select = SelectStatement::new(&out)
            .distinct()
            .column(f.orders.col(&f.o_customer), &f.o_customer)
            .column(sum.clone(), &out_total)
            .from(Statement::table(&f.orders))
            .group_by(f.orders.col(&f.o_customer))
            .having(sum.gt(Expr::constant(Decimal::from(100))))
            .order_by(OrderBy::desc(f.orders.col(&f.o_customer)));
        assert_eq!(
            select_sql(select),
            "SELECT DISTINCT [Order].[CustomerId], SUM([Order].[Total]) AS [Total]\nFROM [Sales].[Order] [Order]\nGROUP BY [Order].[CustomerId]\nHAVING (SUM([Order].[Total]) > 100)\nORDER BY [Order].[CustomerId] DESC;"
        );
    }

    #[test]
    fn test_parameter_deduplicated_and_bound() {
        let f = fixture();
        let name = ParamCell::shared(ValueType::String, "Ada");
        let select = SelectStatement::new(&f.customer)
            .column(f.customer.col(&f.c_id), &f.c_id)
            .from(Statement::table(&f.customer))
            .filter(
                f.customer
                    .col(&f.c_name)
                    .eq(Expr::param(&name))
                    .or(f.customer.col(&f.c_name).ne(Expr::param(&name))),
            );
        let text = generate(&Command::Select(select.into_statement())).unwrap();
        assert_eq!(text.params().len(), 1);
        assert_eq!(text.sql().matches("@p1").count(), 2);
        let mapper = TypeMapper::new();
        let bound = text.bind(&mapper).unwrap();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].name, "@p1");
        name.set("Grace");
        let rebound = text.bind(&mapper).unwrap();
        assert_eq!(
            rebound[0].value,
            crate::codec::NativeValue::String("Grace".into())
        );
    }

    #[test]
    fn test_debug_sql_declares_parameters() {
        let f = fixture();
        let name = ParamCell::shared(ValueType::String, "Ada");
        let select = SelectStatement::new(&f.customer)
            .column(f.customer.col(&f.c_id), &f.c_id)
            .from(Statement::table(&f.customer))
            .filter(f.customer.col(&f.c_name).eq(Expr::param(&name)));
        let text = generate(&Command::Select(select.into_statement())).unwrap();
        let debug = text.to_debug_sql(&TypeMapper::new()).unwrap();
        assert!(debug.starts_with("DECLARE @p1 NVARCHAR(MAX) = N'Ada';\nSELECT [Customer].[Id]"));
    }

    #[test]
    fn test_insert_from_json_rowset_with_identity_output() {
        let f = fixture();
        let payload = ParamCell::shared(ValueType::String, "[]");
        let mut rows = Model::derived("rows").with_source(RowSource::JsonRowset(payload));
        let row_id = rows.add_column(Column::new("sys_row_id", ValueType::Int32));
        let cust = rows.add_column(Column::new("CustomerId", ValueType::Int32));
        let total = rows.add_column(Column::new("Total", ValueType::Decimal));
        let rows = Arc::new(rows);
        let mapping = Arc::new(Model::temp("IdentityMap"));
        let mut temps = TempTableNames::new();
        temps.realize(&mapping);
        let source = SelectStatement::new(&rows)
            .column(rows.col(&cust), &cust)
            .column(rows.col(&total), &total)
            .from(Statement::table(&rows))
            .order_by(OrderBy::asc(rows.col(&row_id)));
        let insert = Command::Insert(Box::new(InsertStatement {
            target: Arc::clone(&f.orders),
            columns: vec![],
            source: source.into_statement(),
            identity_output: Some(mapping),
        }));
        let text = generate_with(&insert, &temps).unwrap();
        assert_eq!(
            text.sql(),
            "INSERT INTO [Sales].[Order] ([CustomerId], [Total])\n\
             OUTPUT INSERTED.[Id] INTO [#IdentityMap] ([NewValue])\n\
             SELECT [@rows].[CustomerId], [@rows].[Total]\n\
             FROM OPENJSON(@p1) WITH ([sys_row_id] INT, [CustomerId] INT, [Total] DECIMAL(18, 2)) [@rows]\n\
             ORDER BY [@rows].[sys_row_id] ASC;"
        );
        assert_eq!(text.params().len(), 1);
    }

    #[test]
    fn test_insert_from_untransformed_temp_table() {
        let f = fixture();
        let mut staging = Model::temp("Staging");
        staging.add_column(Column::new("CustomerId", ValueType::Int32));
        staging.add_column(Column::new("Total", ValueType::Decimal));
        let staging = Arc::new(staging);
        let mut temps = TempTableNames::new();
        temps.realize(&staging);
        let insert = Command::Insert(Box::new(InsertStatement {
            target: Arc::clone(&f.orders),
            columns: vec![],
            source: Statement::table(&staging),
            identity_output: None,
        }));
        assert_eq!(
            generate_with(&insert, &temps).unwrap().sql(),
            "INSERT INTO [Sales].[Order] ([CustomerId], [Total])\nSELECT [Staging].[CustomerId], [Staging].[Total]\nFROM [#Staging] [Staging];"
        );
    }

    #[test]
    fn test_identity_output_requires_identity_column() {
        let mut plain = Model::new("Plain");
        plain.add_column(Column::new("X", ValueType::Int32));
        let plain = Arc::new(plain);
        let mapping = Arc::new(Model::temp("Map"));
        let mut temps = TempTableNames::new();
        temps.realize(&mapping);
        let source = Arc::new(plain.clone_as("src"));
        let insert = Command::Insert(Box::new(InsertStatement {
            target: Arc::clone(&plain),
            columns: vec![],
            source: Statement::table(&source),
            identity_output: Some(mapping),
        }));
        let err = generate_with(&insert, &temps).unwrap_err();
        assert!(matches!(err, DataError::InvalidStatement(ref m) if m.contains("Plain")));
    }

    #[test]
    fn test_insert_scalar_with_scope_identity() {
        let f = fixture();
        let customer_id = ParamCell::shared(ValueType::Int32, 7);
        let insert = Command::InsertScalar(Box::new(InsertScalarStatement {
            target: Arc::clone(&f.orders),
            values: vec![
                ColumnMapping::new(Expr::param(&customer_id), &f.o_customer),
                ColumnMapping::new(Expr::constant(Decimal::new(1250, 2)), &f.o_total),
            ],
            output_identity: true,
        }));
        assert_eq!(
            generate(&insert).unwrap().sql(),
            "INSERT INTO [Sales].[Order] ([CustomerId], [Total])\nVALUES (@p1, 12.50);\nSELECT CAST(SCOPE_IDENTITY() AS BIGINT);"
        );
    }

    #[test]
    fn test_insert_scalar_default_values() {
        let f = fixture();
        let insert = Command::InsertScalar(Box::new(InsertScalarStatement {
            target: Arc::clone(&f.customer),
            values: vec![],
            output_identity: false,
        }));
        assert_eq!(
            generate(&insert).unwrap().sql(),
            "INSERT INTO [Customer] DEFAULT VALUES;"
        );
    }

    #[test]
    fn test_update_uses_alias() {
        let f = fixture();
        let update = Command::Update(Box::new(UpdateStatement {
            target: Arc::clone(&f.customer),
            assignments: vec![ColumnMapping::new(Expr::constant("x"), &f.c_name)],
            from: None,
            where_: Some(f.customer.col(&f.c_id).eq(Expr::constant(1_i32))),
        }));
        assert_eq!(
            generate(&update).unwrap().sql(),
            "UPDATE [Customer]\nSET [Name] = N'x'\nFROM [Customer] [Customer]\nWHERE ([Customer].[Id] = 1);"
        );
    }

    #[test]
    fn test_update_without_assignments_fails() {
        let f = fixture();
        let update = Command::Update(Box::new(UpdateStatement {
            target: Arc::clone(&f.customer),
            assignments: vec![],
            from: None,
            where_: None,
        }));
        assert!(matches!(
            generate(&update).unwrap_err(),
            DataError::InvalidStatement(_)
        ));
    }

    #[test]
    fn test_delete_through_join() {
        let f = fixture();
        let delete = Command::Delete(Box::new(DeleteStatement {
            target: Arc::clone(&f.orders),
            from: Some(orders_join_customer(&f)),
            where_: Some(f.customer.col(&f.c_active)),
        }));
        assert_eq!(
            generate(&delete).unwrap().sql(),
            "DELETE [Order]\nFROM [Sales].[Order] [Order]\nINNER JOIN [Customer] [Customer] ON [Order].[CustomerId] = [Customer].[Id]\nWHERE ([Customer].[Active] = 1);"
        );
    }

    #[test]
    fn test_delete_target_outside_from_fails() {
        let f = fixture();
        let delete = Command::Delete(Box::new(DeleteStatement {
            target: Arc::clone(&f.orders),
            from: Some(Statement::table(&f.customer)),
            where_: None,
        }));
        assert!(matches!(
            generate(&delete).unwrap_err(),
            DataError::InvalidStatement(ref m) if m.contains("Order")
        ));
    }
}
