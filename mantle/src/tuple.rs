use crate::error::StorageError;
use crate::page::PageId;
use bytes::{Buf, BufMut};
use std::fmt;
use std::sync::Arc;

/// Fixed payload width of a string field in bytes.
pub const STRING_LEN: usize = 128;

/// The two column types the engine stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    Str,
}

impl FieldType {
    /// On-disk width of a field of this type.
    pub fn len(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str => 4 + STRING_LEN,
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(_) => FieldType::Str,
        }
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Field::Int(v) => buf.put_i32(*v),
            Field::Str(s) => {
                // Strings longer than the fixed payload are truncated on a
                // char boundary.
                let mut end = s.len().min(STRING_LEN);
                while !s.is_char_boundary(end) {
                    end -= 1;
                }
                let raw = &s.as_bytes()[..end];
                buf.put_u32(raw.len() as u32);
                buf.put_slice(raw);
                buf.put_bytes(0, STRING_LEN - raw.len());
            }
        }
    }

    pub(crate) fn decode(ty: FieldType, buf: &mut impl Buf) -> Result<Field, StorageError> {
        match ty {
            FieldType::Int => Ok(Field::Int(buf.get_i32())),
            FieldType::Str => {
                let len = (buf.get_u32() as usize).min(STRING_LEN);
                let mut raw = vec![0u8; STRING_LEN];
                buf.copy_to_slice(&mut raw);
                raw.truncate(len);
                String::from_utf8(raw).map(Field::Str).map_err(|_| {
                    StorageError::InvalidArgument("string field is not valid utf-8".to_string())
                })
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{v}"),
            Field::Str(s) => f.write_str(s),
        }
    }
}

/// The schema of a tuple: an ordered list of named, typed fields. Immutable
/// once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    fields: Vec<(String, FieldType)>,
}

impl TupleDesc {
    pub fn new(fields: Vec<(String, FieldType)>) -> Result<TupleDesc, StorageError> {
        if fields.is_empty() {
            return Err(StorageError::InvalidArgument(
                "tuple descriptor needs at least one field".to_string(),
            ));
        }
        Ok(TupleDesc { fields })
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, i: usize) -> Option<FieldType> {
        self.fields.get(i).map(|(_, ty)| *ty)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.fields.get(i).map(|(name, _)| name.as_str())
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    /// Total on-disk width of one tuple in bytes.
    pub fn tuple_size(&self) -> usize {
        self.fields.iter().map(|(_, ty)| ty.len()).sum()
    }
}

/// Where a stored tuple lives: its page and slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: usize,
}

/// One row: field values conforming to a descriptor, plus the record id
/// stamped on insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: Arc<TupleDesc>, fields: Vec<Field>) -> Result<Tuple, StorageError> {
        if fields.len() != desc.num_fields() {
            return Err(StorageError::InvalidArgument(format!(
                "tuple has {} fields, descriptor wants {}",
                fields.len(),
                desc.num_fields()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            if Some(field.field_type()) != desc.field_type(i) {
                return Err(StorageError::InvalidArgument(format!(
                    "field {i} does not match the descriptor type"
                )));
            }
        }
        Ok(Tuple {
            desc,
            fields,
            record_id: None,
        })
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    pub(crate) fn encode(&self, buf: &mut impl BufMut) {
        for field in &self.fields {
            field.encode(buf);
        }
    }

    pub(crate) fn decode(desc: &Arc<TupleDesc>, buf: &mut impl Buf) -> Result<Tuple, StorageError> {
        let mut fields = Vec::with_capacity(desc.num_fields());
        for (_, ty) in &desc.fields {
            fields.push(Field::decode(*ty, buf)?);
        }
        Ok(Tuple {
            desc: desc.clone(),
            fields,
            record_id: None,
        })
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str("\t")?;
            }
            write!(f, "{field}")?;
        }
        Ok(())
    }
}

/// Contract between tuple sources (heap scans, aggregate results) and the
/// query executor.
pub trait TupleIterator {
    fn open(&mut self) -> Result<(), StorageError>;
    /// The next tuple, or `None` once the source is exhausted.
    fn next(&mut self) -> Result<Option<Tuple>, StorageError>;
    fn rewind(&mut self) -> Result<(), StorageError>;
    fn close(&mut self);
    fn tuple_desc(&self) -> Arc<TupleDesc>;
}
