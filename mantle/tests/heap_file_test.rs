mod common;

use common::{int_tuple, setup};
use mantle::tuple::TupleIterator;
use mantle::{HeapPage, PageId, StorageError, TransactionId};

#[test]
fn insert_into_empty_file_creates_page_zero() {
    let (_dir, _catalog, pool, file) = setup(50);
    assert_eq!(file.num_pages().unwrap(), 0);

    let tid = TransactionId::new();
    let desc = file.tuple_desc().clone();
    let mut tuple = int_tuple(&desc, 11);
    pool.insert_tuple(tid, file.id(), &mut tuple).unwrap();

    assert_eq!(file.num_pages().unwrap(), 1);
    assert_eq!(tuple.record_id().unwrap().pid, PageId::new(file.id(), 0));
    pool.transaction_complete(tid, true).unwrap();

    let page = file.read_page(PageId::new(file.id(), 0)).unwrap();
    assert_eq!(page.iter().count(), 1);
}

#[test]
fn iterator_yields_exactly_the_survivors() {
    let (_dir, _catalog, pool, file) = setup(50);
    let tid = TransactionId::new();
    let desc = file.tuple_desc().clone();

    // Enough tuples to spill past two pages.
    let k = 2500usize;
    let mut inserted = Vec::new();
    for v in 0..k as i32 {
        let mut tuple = int_tuple(&desc, v);
        pool.insert_tuple(tid, file.id(), &mut tuple).unwrap();
        inserted.push(tuple);
    }
    assert!(file.num_pages().unwrap() > 1);

    let mut deleted = 0usize;
    for tuple in inserted.iter().step_by(3) {
        pool.delete_tuple(tid, tuple).unwrap();
        deleted += 1;
    }

    let mut scan = file.iterator(&pool, tid);
    scan.open().unwrap();
    let mut seen = 0usize;
    while scan.next().unwrap().is_some() {
        seen += 1;
    }
    assert_eq!(seen, k - deleted);
    assert!(file.num_pages().unwrap() * HeapPage::slots_per_page(&desc) >= seen);

    scan.rewind().unwrap();
    let mut replayed = 0usize;
    while scan.next().unwrap().is_some() {
        replayed += 1;
    }
    assert_eq!(replayed, seen);
    scan.close();

    pool.transaction_complete(tid, true).unwrap();
}

#[test]
fn iterator_misuse_is_reported() {
    let (_dir, _catalog, pool, file) = setup(50);
    let tid = TransactionId::new();

    let mut scan = file.iterator(&pool, tid);
    assert!(matches!(scan.next(), Err(StorageError::IteratorClosed)));

    scan.open().unwrap();
    assert!(scan.next().unwrap().is_none());

    scan.close();
    assert!(matches!(scan.next(), Err(StorageError::IteratorClosed)));
}

#[test]
fn read_page_past_the_end_is_rejected() {
    let (_dir, _catalog, _pool, file) = setup(50);
    assert!(matches!(
        file.read_page(PageId::new(file.id(), 0)),
        Err(StorageError::InvalidArgument(_))
    ));
}

#[test]
fn reopening_a_file_keeps_its_table_id() {
    let (dir, _catalog, pool, file) = setup(50);
    let tid = TransactionId::new();
    let desc = file.tuple_desc().clone();
    let mut tuple = int_tuple(&desc, 5);
    pool.insert_tuple(tid, file.id(), &mut tuple).unwrap();
    pool.transaction_complete(tid, true).unwrap();

    let reopened = mantle::HeapFile::open(dir.path().join("table.dat"), desc).unwrap();
    assert_eq!(reopened.id(), file.id());
    assert_eq!(reopened.num_pages().unwrap(), 1);
}
