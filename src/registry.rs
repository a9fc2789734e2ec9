//! Process-wide named-table registry.
//!
//! The only shared mutable state in the engine (§5): a single mutex around a
//! name→table map, acquired for the duration of each operation so mutation
//! never races with a concurrent read. `cache`, `search`, and `lookup` all
//! resolve names through this type.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::error::{Error, Result};
use crate::table::Table;

#[derive(Default)]
pub struct Registry {
    tables: Mutex<HashMap<String, Table>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { tables: Mutex::new(HashMap::new()) }
    }

    pub fn set(&self, name: impl Into<String>, table: Table) {
        let name = name.into();
        log::debug!("registering table `{name}` ({} rows)", table.row_count());
        let mut tables = self.tables.lock().expect("registry mutex poisoned");
        tables.insert(name, table);
    }

    pub fn get(&self, name: &str) -> Option<Table> {
        let tables = self.tables.lock().expect("registry mutex poisoned");
        tables.get(name).cloned()
    }

    pub fn require(&self, name: &str) -> Result<Table> {
        self.get(name).ok_or_else(|| Error::unknown_source(name))
    }

    pub fn has(&self, name: &str) -> bool {
        let tables = self.tables.lock().expect("registry mutex poisoned");
        tables.contains_key(name)
    }

    pub fn delete(&self, name: &str) -> bool {
        let mut tables = self.tables.lock().expect("registry mutex poisoned");
        tables.remove(name).is_some()
    }

    pub fn clear(&self) {
        let mut tables = self.tables.lock().expect("registry mutex poisoned");
        tables.clear();
    }

    pub fn list(&self) -> Vec<String> {
        let tables = self.tables.lock().expect("registry mutex poisoned");
        tables.keys().cloned().collect()
    }
}

/// A process-wide default registry for embedders that don't want to thread
/// their own `Registry` through every call to [`crate::execute`].
pub fn global() -> &'static Registry {
    static GLOBAL: OnceLock<Registry> = OnceLock::new();
    GLOBAL.get_or_init(Registry::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_round_trip() {
        let registry = Registry::new();
        assert!(!registry.has("t"));
        registry.set("t", Table::empty());
        assert!(registry.has("t"));
        assert!(registry.get("t").is_some());
    }

    #[test]
    fn require_on_an_unknown_name_is_an_unknown_source_error() {
        let registry = Registry::new();
        let err = registry.require("missing").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Resolution);
    }

    #[test]
    fn delete_and_clear_remove_tables() {
        let registry = Registry::new();
        registry.set("a", Table::empty());
        registry.set("b", Table::empty());
        assert!(registry.delete("a"));
        assert!(!registry.delete("a"));
        assert_eq!(registry.list(), vec!["b".to_string()]);
        registry.clear();
        assert!(registry.list().is_empty());
    }
}
