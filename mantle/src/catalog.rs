//! Maps table names and ids to their heap files. The query layers consume
//! this; the engine itself only needs the id → file direction.

use crate::error::StorageError;
use crate::heap_file::HeapFile;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Catalog {
    inner: RwLock<CatalogState>,
}

#[derive(Default)]
struct CatalogState {
    files: HashMap<i32, Arc<HeapFile>>,
    names: HashMap<i32, String>,
    ids: HashMap<String, i32>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    /// Registers a table under `name`, replacing any previous binding of the
    /// same name.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str) {
        let mut inner = self.inner.write();
        let id = file.id();
        if let Some(old) = inner.ids.insert(name.to_string(), id) {
            inner.files.remove(&old);
            inner.names.remove(&old);
        }
        inner.files.insert(id, file);
        inner.names.insert(id, name.to_string());
    }

    pub fn get_database_file(&self, table_id: i32) -> Result<Arc<HeapFile>, StorageError> {
        self.inner
            .read()
            .files
            .get(&table_id)
            .cloned()
            .ok_or(StorageError::NoSuchTable(table_id))
    }

    pub fn get_table_name(&self, table_id: i32) -> Result<String, StorageError> {
        self.inner
            .read()
            .names
            .get(&table_id)
            .cloned()
            .ok_or(StorageError::NoSuchTable(table_id))
    }

    pub fn get_table_id(&self, name: &str) -> Option<i32> {
        self.inner.read().ids.get(name).copied()
    }

    /// Snapshot of the registered table ids.
    pub fn table_id_iterator(&self) -> Vec<i32> {
        self.inner.read().files.keys().copied().collect()
    }
}
