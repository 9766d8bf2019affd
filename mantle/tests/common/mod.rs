#![allow(dead_code)]

use mantle::{BufferPool, Catalog, Field, FieldType, HeapFile, HeapPage, PageId, Tuple, TupleDesc};
use std::sync::Arc;
use tempfile::TempDir;

pub fn int_desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::new(vec![("v".to_string(), FieldType::Int)]).unwrap())
}

pub fn int_tuple(desc: &Arc<TupleDesc>, v: i32) -> Tuple {
    Tuple::new(desc.clone(), vec![Field::Int(v)]).unwrap()
}

/// A scratch single-table database: a catalog and pool over one initially
/// empty heap file with a single int column.
pub fn setup(capacity: usize) -> (TempDir, Arc<Catalog>, BufferPool, Arc<HeapFile>) {
    let dir = TempDir::new().unwrap();
    let file = Arc::new(HeapFile::open(dir.path().join("table.dat"), int_desc()).unwrap());
    let catalog = Arc::new(Catalog::new());
    catalog.add_table(file.clone(), "table");
    let pool = BufferPool::new(capacity, catalog.clone());
    (dir, catalog, pool, file)
}

/// Writes an all-free page straight to disk, bypassing the pool.
pub fn write_empty_page(file: &HeapFile, page_no: usize) {
    let page = HeapPage::empty(PageId::new(file.id(), page_no), file.tuple_desc().clone()).unwrap();
    file.write_page(&page).unwrap();
}

/// Writes a page with every slot occupied straight to disk.
pub fn write_full_page(file: &HeapFile, page_no: usize) {
    let desc = file.tuple_desc().clone();
    let mut page = HeapPage::empty(PageId::new(file.id(), page_no), desc.clone()).unwrap();
    for v in 0..page.num_slots() as i32 {
        let mut tuple = int_tuple(&desc, v);
        page.insert_tuple(&mut tuple).unwrap();
    }
    file.write_page(&page).unwrap();
}
