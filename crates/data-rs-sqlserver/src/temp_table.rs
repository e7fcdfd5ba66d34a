//! Session temp table naming.
//!
//! Temp tables are realized under `#<UniqueName>`; the name is assigned the
//! first time a model is realized and stays stable for the session.

use std::collections::HashMap;

use data_rs_core::{DataError, DataResult};
use data_rs_db::{Model, ModelId};

use crate::unique_name::UniqueNameGenerator;

/// Maps temp models to their realized `#name`.
#[derive(Debug, Default, Clone)]
pub struct TempTableNames {
    names: HashMap<ModelId, String>,
    generator: UniqueNameGenerator,
}

impl TempTableNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the realized name of `model`, assigning one on first use.
    pub fn realize(&mut self, model: &Model) -> String {
        if let Some(name) = self.names.get(&model.id) {
            return name.clone();
        }
        let name = format!("#{}", self.generator.next_name(&model.name));
        self.names.insert(model.id, name.clone());
        name
    }

    /// Returns the realized name, or `None` if `model` was never realized.
    pub fn get(&self, id: ModelId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Like [`get`](Self::get) but fails for unrealized models.
    pub fn require(&self, model: &Model) -> DataResult<&str> {
        self.get(model.id).ok_or_else(|| {
            DataError::InvalidStatement(format!(
                "temp table for model '{}' has not been created",
                model.name
            ))
        })
    }

    /// Forgets a dropped temp table. Its name is not reused.
    pub fn forget(&mut self, id: ModelId) -> Option<String> {
        self.names.remove(&id)
    }

    /// Iterates over realized temp tables.
    pub fn iter(&self) -> impl Iterator<Item = (ModelId, &str)> {
        self.names.iter().map(|(id, name)| (*id, name.as_str()))
    }
}
