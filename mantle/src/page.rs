use crate::error::StorageError;
use crate::tuple::{RecordId, Tuple, TupleDesc};
use bytes::BufMut;
use std::sync::Arc;

/// A unique identifier for a page: the owning table and the page's position
/// in its heap file. Equality and hashing are structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: i32,
    pub page_no: usize,
}

impl PageId {
    pub fn new(table_id: i32, page_no: usize) -> PageId {
        PageId { table_id, page_no }
    }
}

/// One fixed-size slotted page: a used-slot bitmap followed by equally sized
/// tuple payloads. A slot is occupied iff its header bit is set.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    header: Vec<u8>,
    slots: Vec<Option<Tuple>>,
}

impl HeapPage {
    /// Tuples that fit on one page: floor(page_bits / (tuple_bits + 1)),
    /// each slot paying one header bit on top of its payload.
    pub fn slots_per_page(desc: &TupleDesc) -> usize {
        (crate::page_size() * 8) / (desc.tuple_size() * 8 + 1)
    }

    /// Header bytes needed for one used-slot bit per slot.
    pub fn header_size(desc: &TupleDesc) -> usize {
        Self::slots_per_page(desc).div_ceil(8)
    }

    /// An all-zero page image, used when extending a heap file.
    pub fn empty_page_data() -> Vec<u8> {
        vec![0; crate::page_size()]
    }

    /// Decodes a page image. Unused slots keep their zero-filled payload
    /// width, so the image length must equal the configured page size.
    pub fn new(pid: PageId, data: &[u8], desc: Arc<TupleDesc>) -> Result<HeapPage, StorageError> {
        if data.len() != crate::page_size() {
            return Err(StorageError::InvalidArgument(format!(
                "page image is {} bytes, expected {}",
                data.len(),
                crate::page_size()
            )));
        }
        let num_slots = Self::slots_per_page(&desc);
        let header_size = Self::header_size(&desc);
        let tuple_size = desc.tuple_size();
        let header = data[..header_size].to_vec();

        let mut slots = Vec::with_capacity(num_slots);
        for slot in 0..num_slots {
            if header[slot / 8] & (1 << (slot % 8)) == 0 {
                slots.push(None);
                continue;
            }
            let offset = header_size + slot * tuple_size;
            let mut payload = &data[offset..offset + tuple_size];
            let mut tuple = Tuple::decode(&desc, &mut payload)?;
            tuple.set_record_id(Some(RecordId { pid, slot }));
            slots.push(Some(tuple));
        }
        Ok(HeapPage {
            pid,
            desc,
            header,
            slots,
        })
    }

    pub fn empty(pid: PageId, desc: Arc<TupleDesc>) -> Result<HeapPage, StorageError> {
        Self::new(pid, &Self::empty_page_data(), desc)
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// Bit-exact page image: header first, then slot payloads in ascending
    /// order, free slots zero-filled.
    pub fn serialize(&self) -> Vec<u8> {
        let tuple_size = self.desc.tuple_size();
        let mut data = Vec::with_capacity(crate::page_size());
        data.put_slice(&self.header);
        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.encode(&mut data),
                None => data.put_bytes(0, tuple_size),
            }
        }
        data.resize(crate::page_size(), 0);
        data
    }

    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header
            .get(slot / 8)
            .is_some_and(|byte| byte & (1 << (slot % 8)) != 0)
    }

    fn set_slot_used(&mut self, slot: usize, used: bool) {
        if used {
            self.header[slot / 8] |= 1 << (slot % 8);
        } else {
            self.header[slot / 8] &= !(1 << (slot % 8));
        }
    }

    pub fn empty_slot_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    /// Places the tuple in the first free slot and stamps its record id.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> Result<(), StorageError> {
        if tuple.tuple_desc().as_ref() != self.desc.as_ref() {
            return Err(StorageError::InvalidArgument(
                "tuple does not match the page descriptor".to_string(),
            ));
        }
        let slot = self
            .slots
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(StorageError::PageFull(self.pid))?;
        tuple.set_record_id(Some(RecordId {
            pid: self.pid,
            slot,
        }));
        self.set_slot_used(slot, true);
        self.slots[slot] = Some(tuple.clone());
        Ok(())
    }

    /// Clears the slot named by the tuple's record id.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> Result<(), StorageError> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::Generic("tuple has no record id".to_string()))?;
        if rid.pid != self.pid {
            return Err(StorageError::Generic(format!(
                "tuple belongs to page {:?}, not {:?}",
                rid.pid, self.pid
            )));
        }
        if rid.slot >= self.slots.len() || self.slots[rid.slot].is_none() {
            return Err(StorageError::Generic(format!(
                "slot {} of page {:?} is not occupied",
                rid.slot, self.pid
            )));
        }
        self.set_slot_used(rid.slot, false);
        self.slots[rid.slot] = None;
        Ok(())
    }

    /// Live tuples in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Tuple> + '_ {
        self.slots.iter().flatten()
    }
}
