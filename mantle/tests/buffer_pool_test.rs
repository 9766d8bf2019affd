mod common;

use common::{int_tuple, setup, write_empty_page, write_full_page};
use mantle::{PageId, Permissions, StorageError, TransactionId};

#[test]
fn lru_evicts_the_coldest_clean_page() {
    let (_dir, _catalog, pool, file) = setup(2);
    for page_no in 0..3 {
        write_empty_page(&file, page_no);
    }
    let id = file.id();
    let a = PageId::new(id, 0);
    let b = PageId::new(id, 1);
    let c = PageId::new(id, 2);

    let tid = TransactionId::new();
    pool.get_page(tid, a, Permissions::ReadOnly).unwrap();
    pool.get_page(tid, b, Permissions::ReadOnly).unwrap();
    pool.get_page(tid, a, Permissions::ReadOnly).unwrap();
    // B is now the coldest page, so admitting C evicts it.
    pool.get_page(tid, c, Permissions::ReadOnly).unwrap();

    let mut resident = pool.resident_pages();
    resident.sort_by_key(|pid| pid.page_no);
    assert_eq!(resident, vec![a, c]);
}

#[test]
fn clean_evictions_never_touch_disk() {
    let (_dir, _catalog, pool, file) = setup(2);
    for page_no in 0..3 {
        write_empty_page(&file, page_no);
    }
    let before = std::fs::read(file.path()).unwrap();

    let tid = TransactionId::new();
    for page_no in [0, 1, 0, 2, 1] {
        pool.get_page(tid, PageId::new(file.id(), page_no), Permissions::ReadOnly)
            .unwrap();
    }

    assert_eq!(std::fs::read(file.path()).unwrap(), before);
}

#[test]
fn all_dirty_pool_rejects_new_pages() {
    let (_dir, _catalog, pool, file) = setup(2);
    write_full_page(&file, 0);
    write_empty_page(&file, 1);
    write_empty_page(&file, 2);
    let id = file.id();
    let desc = file.tuple_desc().clone();

    let tid1 = TransactionId::new();
    // Page 0 is full, so the insert lands on (and dirties) page 1; deleting
    // an existing tuple then dirties page 0.
    let mut tuple = int_tuple(&desc, 1000);
    pool.insert_tuple(tid1, id, &mut tuple).unwrap();
    assert_eq!(tuple.record_id().unwrap().pid.page_no, 1);

    let victim = file
        .read_page(PageId::new(id, 0))
        .unwrap()
        .iter()
        .next()
        .cloned()
        .unwrap();
    pool.delete_tuple(tid1, &victim).unwrap();

    let tid2 = TransactionId::new();
    assert!(matches!(
        pool.get_page(tid2, PageId::new(id, 2), Permissions::ReadOnly),
        Err(StorageError::NoCleanPage)
    ));
}

#[test]
fn flush_page_clears_the_dirty_marker() {
    let (_dir, _catalog, pool, file) = setup(2);
    let id = file.id();
    let desc = file.tuple_desc().clone();

    let tid = TransactionId::new();
    let mut tuple = int_tuple(&desc, 77);
    pool.insert_tuple(tid, id, &mut tuple).unwrap();
    let pid = tuple.record_id().unwrap().pid;

    pool.flush_page(pid).unwrap();
    let on_disk = file.read_page(pid).unwrap();
    assert_eq!(on_disk.iter().count(), 1);

    // The page is clean again: a second transaction can evict it.
    write_empty_page(&file, 1);
    write_empty_page(&file, 2);
    let tid2 = TransactionId::new();
    pool.get_page(tid2, PageId::new(id, 1), Permissions::ReadOnly)
        .unwrap();
    pool.get_page(tid2, PageId::new(id, 2), Permissions::ReadOnly)
        .unwrap();
    assert!(!pool.resident_pages().contains(&pid));
}

#[test]
fn discard_drops_a_page_without_writing() {
    let (_dir, _catalog, pool, file) = setup(2);
    write_empty_page(&file, 0);
    let pid = PageId::new(file.id(), 0);
    let before = std::fs::read(file.path()).unwrap();

    let tid = TransactionId::new();
    pool.get_page(tid, pid, Permissions::ReadOnly).unwrap();
    assert!(pool.resident_pages().contains(&pid));
    pool.discard_page(pid);
    assert!(!pool.resident_pages().contains(&pid));
    assert_eq!(std::fs::read(file.path()).unwrap(), before);
}
