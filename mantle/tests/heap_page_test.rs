//! Slotted-page layout checks that depend on overriding the process-wide
//! page size; every test here is serialized and restores the default.

use mantle::page::{HeapPage, PageId};
use mantle::tuple::{Field, FieldType, Tuple, TupleDesc};
use mantle::{page_size, reset_page_size, set_page_size};
use serial_test::serial;
use std::sync::Arc;

struct PageSizeGuard;

impl PageSizeGuard {
    fn set(bytes: usize) -> PageSizeGuard {
        set_page_size(bytes);
        PageSizeGuard
    }
}

impl Drop for PageSizeGuard {
    fn drop(&mut self) {
        reset_page_size();
    }
}

fn int_desc() -> Arc<TupleDesc> {
    Arc::new(TupleDesc::new(vec![("v".to_string(), FieldType::Int)]).unwrap())
}

#[test]
#[serial]
fn tiny_page_round_trip() {
    let _guard = PageSizeGuard::set(128);
    let desc = int_desc();
    // 128 * 8 bits / (4 * 8 + 1) bits per slot.
    assert_eq!(HeapPage::slots_per_page(&desc), 31);
    assert_eq!(HeapPage::header_size(&desc), 4);

    let pid = PageId::new(9, 0);
    let mut page = HeapPage::empty(pid, desc.clone()).unwrap();
    for v in [1, 2, 3] {
        let mut tuple = Tuple::new(desc.clone(), vec![Field::Int(v)]).unwrap();
        page.insert_tuple(&mut tuple).unwrap();
    }

    let image = page.serialize();
    assert_eq!(image.len(), 128);
    // Slots 0..2 used: the three lowest bits of header byte 0.
    assert_eq!(image[0], 0b0000_0111);

    let reloaded = HeapPage::new(pid, &image, desc).unwrap();
    assert_eq!(reloaded.serialize(), image);
    for slot in 0..3 {
        assert!(reloaded.is_slot_used(slot));
    }
    for slot in 3..reloaded.num_slots() {
        assert!(!reloaded.is_slot_used(slot));
    }
    let values: Vec<i32> = reloaded
        .iter()
        .map(|t| match t.field(0) {
            Some(Field::Int(v)) => *v,
            other => panic!("unexpected field {other:?}"),
        })
        .collect();
    assert_eq!(values, vec![1, 2, 3]);
}

#[test]
#[serial]
fn header_bit_count_matches_live_tuples() {
    let _guard = PageSizeGuard::set(256);
    let desc = int_desc();
    let mut page = HeapPage::empty(PageId::new(4, 1), desc.clone()).unwrap();

    let mut kept = Vec::new();
    for v in 0..10 {
        let mut tuple = Tuple::new(desc.clone(), vec![Field::Int(v)]).unwrap();
        page.insert_tuple(&mut tuple).unwrap();
        kept.push(tuple);
    }
    for tuple in kept.iter().step_by(2) {
        page.delete_tuple(tuple).unwrap();
    }

    let used_bits = (0..page.num_slots())
        .filter(|slot| page.is_slot_used(*slot))
        .count();
    assert_eq!(used_bits, page.iter().count());
    assert_eq!(used_bits, 5);
}

#[test]
#[serial]
fn page_size_override_resets() {
    {
        let _guard = PageSizeGuard::set(512);
        assert_eq!(page_size(), 512);
    }
    assert_eq!(page_size(), mantle::DEFAULT_PAGE_SIZE);
}
