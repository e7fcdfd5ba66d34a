//! Table alias assignment.
//!
//! One pass over a statement tree assigns every row source a unique alias.
//! Physical and temp tables are named after the table; derived queries after
//! their model's alias prefix; JSON rowset parameters get an `@` prefix. All
//! names come from one [`UniqueNameGenerator`], so self joins and repeated
//! prefixes get suffixed (`Customer`, `Customer1`, ...).
//!
//! Query nodes (SELECT, UNION) only need an alias when they appear as a
//! source: a root query or a set-operation operand is never referenced by
//! alias, so its output model is not registered.

use std::collections::HashMap;

use data_rs_core::{DataError, DataResult};
use data_rs_db::{Model, ModelId, RowSource, Statement};

use crate::temp_table::TempTableNames;
use crate::unique_name::UniqueNameGenerator;

/// `ModelId → alias` for one generation pass.
#[derive(Debug, Default, Clone)]
pub struct AliasMap {
    aliases: HashMap<ModelId, String>,
}

impl AliasMap {
    pub fn get(&self, id: ModelId) -> Option<&str> {
        self.aliases.get(&id).map(String::as_str)
    }

    /// Returns the alias of `model` or fails naming the model.
    pub fn require(&self, model: &Model) -> DataResult<&str> {
        self.get(model.id).ok_or_else(|| missing(model.id, Some(&model.name)))
    }

    /// Returns the alias for a model id seen only through a column reference.
    pub fn require_id(&self, id: ModelId) -> DataResult<&str> {
        self.get(id).ok_or_else(|| missing(id, None))
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Iterates over the assigned aliases in no particular order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.values().map(String::as_str)
    }
}

fn missing(id: ModelId, name: Option<&str>) -> DataError {
    match name {
        Some(name) => DataError::InvalidStatement(format!(
            "model '{name}' (id {}) has no alias in this statement",
            id.get()
        )),
        None => DataError::InvalidStatement(format!(
            "model id {} has no alias in this statement",
            id.get()
        )),
    }
}

/// Builds the alias map for a root query.
pub fn build_alias_map(root: &Statement, temp_tables: &TempTableNames) -> DataResult<AliasMap> {
    build(root, false, temp_tables)
}

/// Builds the alias map for a statement used as a row source (the FROM of
/// an UPDATE, DELETE, or column-mapped INSERT), so a query root is aliased.
pub fn build_source_alias_map(
    source: &Statement,
    temp_tables: &TempTableNames,
) -> DataResult<AliasMap> {
    build(source, true, temp_tables)
}

fn build(statement: &Statement, as_source: bool, temp_tables: &TempTableNames) -> DataResult<AliasMap> {
    let mut builder = AliasBuilder {
        map: AliasMap::default(),
        names: UniqueNameGenerator::new(),
        temp_tables,
    };
    builder.visit(statement, as_source)?;
    Ok(builder.map)
}

struct AliasBuilder<'a> {
    map: AliasMap,
    names: UniqueNameGenerator,
    temp_tables: &'a TempTableNames,
}

impl AliasBuilder<'_> {
    fn visit(&mut self, statement: &Statement, as_source: bool) -> DataResult<()> {
        match statement {
            Statement::Select(select) => {
                if as_source {
                    self.register(&select.model)?;
                }
                if let Some(from) = &select.from {
                    self.visit(from, true)?;
                }
            }
            Statement::Union(union) => {
                if as_source {
                    self.register(&union.model)?;
                }
                self.visit(&union.left, false)?;
                self.visit(&union.right, false)?;
            }
            Statement::Table(model) => self.register(model)?,
            Statement::Join(join) => {
                self.visit(&join.left, true)?;
                self.visit(&join.right, true)?;
            }
        }
        Ok(())
    }

    fn register(&mut self, model: &Model) -> DataResult<()> {
        if self.map.aliases.contains_key(&model.id) {
            return Err(DataError::InvalidStatement(format!(
                "model '{}' appears more than once in the statement; use Model::clone_as for self joins",
                model.name
            )));
        }
        let base = match &model.source {
            RowSource::Table => model.name.clone(),
            RowSource::TempTable => self
                .temp_tables
                .require(model)?
                .trim_start_matches('#')
                .to_string(),
            RowSource::JsonRowset(_) => format!("@{}", model.alias_prefix),
            RowSource::Derived => model.alias_prefix.clone(),
        };
        let alias = self.names.next_name(&base);
        self.map.aliases.insert(model.id, alias);
        Ok(())
    }
}
