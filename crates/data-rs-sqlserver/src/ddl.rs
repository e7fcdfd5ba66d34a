//! `CREATE TABLE` / `DROP TABLE` generation.
//!
//! Column definitions come first, then PRIMARY KEY / UNIQUE / CHECK /
//! FOREIGN KEY constraints, then inline indexes. Expressions (defaults,
//! computed columns, checks) are rendered with parameters inlined as
//! literals. Permanent tables are followed by one `sp_addextendedproperty`
//! call per description. Temp tables get unnamed constraints, no foreign
//! keys, and materialize computed columns as plain typed columns.

use data_rs_core::{DataError, DataResult};
use data_rs_db::{Column, Constraint, KeyColumns, Model, SortDirection};

use crate::codec::{quote_identifier, quote_string};
use crate::expression::ExpressionGenerator;
use crate::mapper::TypeMapper;
use crate::temp_table::TempTableNames;
use crate::version::SqlVersion;

const DEFAULT_SCHEMA: &str = "dbo";

/// Generates table DDL for models.
pub struct DdlGenerator<'a> {
    mapper: &'a TypeMapper,
    version: SqlVersion,
    temp_tables: &'a TempTableNames,
}

impl<'a> DdlGenerator<'a> {
    pub const fn new(
        mapper: &'a TypeMapper,
        version: SqlVersion,
        temp_tables: &'a TempTableNames,
    ) -> Self {
        Self {
            mapper,
            version,
            temp_tables,
        }
    }

    /// Generates `CREATE TABLE` for `model`, followed by extended property
    /// calls for permanent tables.
    pub fn generate_create_table(&self, model: &Model, is_temp: bool) -> DataResult<String> {
        let table_name = self.table_name(model, is_temp)?;
        if model.columns.is_empty() {
            return Err(DataError::InvalidStatement(format!(
                "table '{}' has no columns",
                model.name
            )));
        }
        let mut expr = ExpressionGenerator::inline(self.mapper, self.version);
        let mut parts: Vec<String> = Vec::new();

        for column in &model.columns {
            parts.push(self.column_sql(column, is_temp, &mut expr)?);
        }

        if let Some(pk) = &model.primary_key {
            parts.push(format!(
                "{}PRIMARY KEY {} ({})",
                constraint_prefix(Some(&pk.name), is_temp),
                clustering(pk.clustered),
                key_list(&pk.columns)
            ));
        }

        for constraint in &model.constraints {
            let prefix = constraint_prefix(constraint.name(), is_temp);
            match constraint {
                Constraint::Unique(unique) => parts.push(format!(
                    "{prefix}UNIQUE {} ({})",
                    clustering(unique.clustered),
                    key_list(&unique.columns)
                )),
                Constraint::Check(check) => {
                    let mut w = crate::writer::IndentedWriter::new();
                    expr.render_predicate(&check.condition, None, &mut w)?;
                    parts.push(format!("{prefix}CHECK {}", w.finish()));
                }
                Constraint::ForeignKey(fk) => {
                    if is_temp {
                        continue;
                    }
                    let columns: Vec<String> =
                        fk.columns.iter().map(|c| quote_identifier(&c.name)).collect();
                    let referenced: Vec<String> = fk
                        .referenced_columns
                        .iter()
                        .map(|c| quote_identifier(c))
                        .collect();
                    parts.push(format!(
                        "{prefix}FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
                        columns.join(", "),
                        qualified(fk.referenced_schema.as_deref(), &fk.referenced_table),
                        referenced.join(", "),
                        fk.on_delete.as_sql(),
                        fk.on_update.as_sql()
                    ));
                }
            }
        }

        for index in &model.indexes {
            parts.push(format!(
                "INDEX {} {}{} ({})",
                quote_identifier(&index.name),
                if index.unique { "UNIQUE " } else { "" },
                clustering(index.clustered),
                key_list(&index.columns)
            ));
        }

        let mut sql = format!("CREATE TABLE {table_name} (\n    {}\n);", parts.join(",\n    "));
        if !is_temp {
            for statement in extended_properties(model) {
                sql.push('\n');
                sql.push_str(&statement);
            }
        }
        Ok(sql)
    }

    /// Generates `DROP TABLE` for `model`.
    pub fn generate_drop_table(&self, model: &Model, is_temp: bool) -> DataResult<String> {
        Ok(format!("DROP TABLE {};", self.table_name(model, is_temp)?))
    }

    fn table_name(&self, model: &Model, is_temp: bool) -> DataResult<String> {
        if is_temp {
            Ok(quote_identifier(self.temp_tables.require(model)?))
        } else {
            Ok(qualified(model.schema.as_deref(), &model.name))
        }
    }

    fn column_sql(
        &self,
        column: &Column,
        is_temp: bool,
        expr: &mut ExpressionGenerator<'_>,
    ) -> DataResult<String> {
        let name = quote_identifier(&column.name);
        if let (Some(computation), false) = (&column.computation, is_temp) {
            let rendered = expr.value_to_string(computation, None)?;
            return Ok(format!("{name} AS ({rendered})"));
        }
        let sql_type = self.mapper.resolve(column)?;
        let mut sql = format!(
            "{name} {} {}",
            sql_type.sql(),
            if column.nullable { "NULL" } else { "NOT NULL" }
        );
        if let Some(default) = &column.default {
            let rendered = expr.value_to_string(default, None)?;
            sql.push_str(&format!(" DEFAULT({rendered})"));
        }
        if let Some(identity) = column.identity {
            sql.push_str(&format!(
                " IDENTITY({}, {})",
                identity.seed, identity.increment
            ));
        }
        Ok(sql)
    }
}

fn qualified(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", quote_identifier(schema), quote_identifier(name)),
        None => quote_identifier(name),
    }
}

fn constraint_prefix(name: Option<&str>, is_temp: bool) -> String {
    match name {
        Some(name) if !is_temp && !name.is_empty() => {
            format!("CONSTRAINT {} ", quote_identifier(name))
        }
        _ => String::new(),
    }
}

const fn clustering(clustered: bool) -> &'static str {
    if clustered {
        "CLUSTERED"
    } else {
        "NONCLUSTERED"
    }
}

fn key_list(columns: &KeyColumns) -> String {
    columns
        .iter()
        .map(|(column, direction)| {
            let name = quote_identifier(&column.name);
            match direction {
                SortDirection::Ascending => format!("{name} ASC"),
                SortDirection::Descending => format!("{name} DESC"),
                SortDirection::Unspecified => name,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn extended_properties(model: &Model) -> Vec<String> {
    let schema = model.schema.as_deref().unwrap_or(DEFAULT_SCHEMA);
    let mut out = Vec::new();
    if let Some(description) = &model.description {
        out.push(describe(description, schema, &model.name, None));
    }
    for column in &model.columns {
        if let Some(description) = &column.description {
            out.push(describe(
                description,
                schema,
                &model.name,
                Some(("COLUMN", &column.name)),
            ));
        }
    }
    if let Some(pk) = &model.primary_key {
        if let Some(description) = &pk.description {
            out.push(describe(
                description,
                schema,
                &model.name,
                Some(("CONSTRAINT", &pk.name)),
            ));
        }
    }
    for constraint in &model.constraints {
        if let (Some(description), Some(name)) = (constraint.description(), constraint.name()) {
            out.push(describe(
                description,
                schema,
                &model.name,
                Some(("CONSTRAINT", name)),
            ));
        }
    }
    for index in &model.indexes {
        if let Some(description) = &index.description {
            out.push(describe(
                description,
                schema,
                &model.name,
                Some(("INDEX", &index.name)),
            ));
        }
    }
    out
}

fn describe(description: &str, schema: &str, table: &str, level2: Option<(&str, &str)>) -> String {
    let mut sql = format!(
        "EXEC sp_addextendedproperty @name=N'MS_Description', @value={}, @level0type=N'Schema', @level0name={}, @level1type=N'Table', @level1name={}",
        quote_string(description, true),
        quote_string(schema, true),
        quote_string(table, true)
    );
    if let Some((kind, name)) = level2 {
        sql.push_str(&format!(
            ", @level2type={}, @level2name={}",
            quote_string(kind, true),
            quote_string(name, true)
        ));
    }
    sql.push(';');
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use data_rs_core::DataError;
    use data_rs_db::{
        CheckConstraint, Expr, ForeignKey, ForeignKeyRule, Index, ParamCell, PrimaryKey,
        UniqueConstraint, ValueType,
    };
    use rust_decimal::Decimal;

    use crate::sql_type::SqlType;

    fn customer() -> Model {
        let mut m = Model::new("Customer");
        let id = m.add_column(Column::new("Id", ValueType::Int32).identity(1, 1));
        m.set_primary_key(PrimaryKey::new(
            "PK_Customer",
            vec![(id, SortDirection::Ascending)],
        ));
        m
    }

    fn order(customer: &Model) -> (Model, Arc<Column>) {
        let mut m = Model::new("Order")
            .with_schema("Sales")
            .with_description("Customer orders");
        let id = m.add_column(Column::new("Id", ValueType::Int64).identity(100, 10));
        let cust = m.add_column(Column::new("CustomerId", ValueType::Int32));
        let total = m.add_column(
            Column::new("Total", ValueType::Decimal)
                .default_value(Expr::constant(Decimal::ZERO))
                .describe("Order total"),
        );
        m.add_column(Column::new("Net", ValueType::Decimal).computed(
            Expr::Column(data_rs_db::ColumnRef::new(m.id, Arc::clone(&total)))
                * Expr::constant(Decimal::new(9, 1)),
        ));
        m.add_column(Column::new("Note", ValueType::String).nullable());
        m.set_primary_key(
            PrimaryKey::new("PK_Order", vec![(id, SortDirection::Ascending)])
                .describe("Surrogate key"),
        );
        m.add_constraint(Constraint::ForeignKey(
            ForeignKey::new(
                "FK_Order_Customer",
                vec![Arc::clone(&cust)],
                customer,
                vec!["Id".into()],
            )
            .on_delete(ForeignKeyRule::Cascade),
        ));
        m.add_constraint(Constraint::Check(CheckConstraint::new(
            "CK_Order_Total",
            Expr::Column(data_rs_db::ColumnRef::new(m.id, Arc::clone(&total)))
                .ge(Expr::constant(Decimal::ZERO)),
        )));
        m.add_constraint(Constraint::Unique(UniqueConstraint::new(
            "UQ_Order_Customer_Total",
            vec![
                (Arc::clone(&cust), SortDirection::Unspecified),
                (Arc::clone(&total), SortDirection::Descending),
            ],
        )));
        m.add_index(
            Index::new(
                "IX_Order_CustomerId",
                vec![(Arc::clone(&cust), SortDirection::Ascending)],
            )
            .describe("Lookup by customer"),
        );
        (m, cust)
    }

    fn generate(model: &Model, is_temp: bool, temps: &TempTableNames) -> DataResult<String> {
        let mapper = TypeMapper::new();
        DdlGenerator::new(&mapper, SqlVersion::Sql13, temps).generate_create_table(model, is_temp)
    }

    #[test]
    fn test_create_permanent_table() {
        let customer = customer();
        let (order, _) = order(&customer);
        let sql = generate(&order, false, &TempTableNames::new()).unwrap();
        let expected = "CREATE TABLE [Sales].[Order] (
    [Id] BIGINT NOT NULL IDENTITY(100, 10),
    [CustomerId] INT NOT NULL,
    [Total] DECIMAL(18, 2) NOT NULL DEFAULT(0),
    [Net] AS (([Total] * 0.9)),
    [Note] NVARCHAR(MAX) NULL,
    CONSTRAINT [PK_Order] PRIMARY KEY CLUSTERED ([Id] ASC),
    CONSTRAINT [FK_Order_Customer] FOREIGN KEY ([CustomerId]) REFERENCES [Customer] ([Id]) ON DELETE CASCADE ON UPDATE NO ACTION,
    CONSTRAINT [CK_Order_Total] CHECK ([Total] >= 0),
    CONSTRAINT [UQ_Order_Customer_Total] UNIQUE NONCLUSTERED ([CustomerId], [Total] DESC),
    INDEX [IX_Order_CustomerId] NONCLUSTERED ([CustomerId] ASC)
);";
        assert!(sql.starts_with(expected), "{sql}");
    }

    #[test]
    fn test_extended_properties_follow_create() {
        let customer = customer();
        let (order, _) = order(&customer);
        let sql = generate(&order, false, &TempTableNames::new()).unwrap();
        let props: Vec<&str> = sql
            .lines()
            .filter(|l| l.starts_with("EXEC sp_addextendedproperty"))
            .collect();
        assert_eq!(props.len(), 4);
        assert_eq!(
            props[0],
            "EXEC sp_addextendedproperty @name=N'MS_Description', @value=N'Customer orders', @level0type=N'Schema', @level0name=N'Sales', @level1type=N'Table', @level1name=N'Order';"
        );
        assert_eq!(
            props[1],
            "EXEC sp_addextendedproperty @name=N'MS_Description', @value=N'Order total', @level0type=N'Schema', @level0name=N'Sales', @level1type=N'Table', @level1name=N'Order', @level2type=N'COLUMN', @level2name=N'Total';"
        );
        assert!(props[2].ends_with("@level2type=N'CONSTRAINT', @level2name=N'PK_Order';"));
        assert!(props[3].ends_with("@level2type=N'INDEX', @level2name=N'IX_Order_CustomerId';"));
    }

    #[test]
    fn test_schema_defaults_to_dbo_in_properties() {
        let customer = customer().with_description("People");
        let sql = generate(&customer, false, &TempTableNames::new()).unwrap();
        assert!(sql.contains("@level0name=N'dbo'"));
        assert!(sql.starts_with("CREATE TABLE [Customer] ("));
    }

    #[test]
    fn test_temp_table_rules() {
        let customer = customer();
        let (order, _) = order(&customer);
        let mut temps = TempTableNames::new();
        temps.realize(&order);
        let sql = generate(&order, true, &temps).unwrap();
        assert!(sql.starts_with("CREATE TABLE [#Order] ("));
        assert!(sql.contains("[Net] DECIMAL(18, 2) NOT NULL"));
        assert!(sql.contains("    PRIMARY KEY CLUSTERED ([Id] ASC)"));
        assert!(sql.contains("    CHECK ([Total] >= 0)"));
        assert!(!sql.contains("FOREIGN KEY"));
        assert!(!sql.contains("CONSTRAINT"));
        assert!(!sql.contains("sp_addextendedproperty"));
    }

    #[test]
    fn test_temp_table_must_be_realized() {
        let temp = Model::temp("Scratch");
        let err = generate(&temp, true, &TempTableNames::new()).unwrap_err();
        assert!(matches!(err, DataError::InvalidStatement(_)));
    }

    #[test]
    fn test_table_without_columns_fails() {
        let err = generate(&Model::new("Empty"), false, &TempTableNames::new()).unwrap_err();
        assert!(matches!(err, DataError::InvalidStatement(ref m) if m.contains("Empty")));
    }

    #[test]
    fn test_column_override_and_inline_param_default() {
        let mut m = Model::new("Tag");
        let code = m.add_column(
            Column::new("Code", ValueType::String)
                .default_value(Expr::param(&ParamCell::shared(ValueType::String, "n/a"))),
        );
        let mut mapper = TypeMapper::new();
        mapper.configure(&code, SqlType::var_char(16).unwrap()).unwrap();
        let temps = TempTableNames::new();
        let sql = DdlGenerator::new(&mapper, SqlVersion::Sql14, &temps)
            .generate_create_table(&m, false)
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE [Tag] (\n    [Code] VARCHAR(16) NOT NULL DEFAULT(N'n/a')\n);"
        );
    }

    #[test]
    fn test_drop_table() {
        let mapper = TypeMapper::new();
        let mut temps = TempTableNames::new();
        let scratch = Model::temp("Scratch");
        temps.realize(&scratch);
        let ddl = DdlGenerator::new(&mapper, SqlVersion::Sql13, &temps);
        assert_eq!(
            ddl.generate_drop_table(&Model::new("T").with_schema("x"), false)
                .unwrap(),
            "DROP TABLE [x].[T];"
        );
        assert_eq!(
            ddl.generate_drop_table(&scratch, true).unwrap(),
            "DROP TABLE [#Scratch];"
        );
    }
}
