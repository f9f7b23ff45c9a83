use indexmap::IndexMap;
use log::debug;

use crate::buffer_pool::BufferPool;
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::table::Table;

/// Name → table registry, the sole owner of `Table` objects. Insertion
/// order is preserved so LIST TABLES is deterministic.
#[derive(Default)]
pub struct Catalog {
    tables: IndexMap<String, Table>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Register a table. Reusing a live name is an error.
    pub fn insert(&mut self, table: Table) -> Result<()> {
        if self.tables.contains_key(&table.name) {
            return Err(EngineError::Semantic(format!(
                "relation '{}' already exists",
                table.name
            )));
        }
        debug!("catalog: registering '{}'", table.name);
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Unload a table (temp-file cleanup) and drop it.
    pub fn delete(&mut self, name: &str, pool: &mut BufferPool, config: &Config) -> Result<()> {
        match self.tables.shift_remove(name) {
            Some(mut table) => {
                table.unload(pool, config);
                Ok(())
            }
            None => Err(EngineError::Semantic(format!("relation '{name}' doesn't exist"))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn is_column(&self, column_name: &str, table_name: &str) -> bool {
        self.get(table_name)
            .map(|table| table.is_column(column_name))
            .unwrap_or(false)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Unload every table. Called on shutdown.
    pub fn unload_all(&mut self, pool: &mut BufferPool, config: &Config) {
        for (_, table) in self.tables.iter_mut() {
            table.unload(pool, config);
        }
        self.tables.clear();
    }
}
