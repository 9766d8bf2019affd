use crate::page::PageId;
use std::fmt;
use std::io;

/// Everything the storage layer can fail with.
#[derive(Debug)]
pub enum StorageError {
    Io(io::Error),
    /// A lock-acquisition timeout expired; the caller must roll back.
    TransactionAborted,
    /// Every resident page is dirty, so nothing can be evicted.
    NoCleanPage,
    /// `next` was called on an iterator before `open` or after `close`.
    IteratorClosed,
    /// The page has no free slot.
    PageFull(PageId),
    NoSuchTable(i32),
    InvalidArgument(String),
    Generic(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "i/o error: {err}"),
            StorageError::TransactionAborted => write!(f, "transaction aborted"),
            StorageError::NoCleanPage => write!(f, "no clean page to evict"),
            StorageError::IteratorClosed => write!(f, "iterator is not open"),
            StorageError::PageFull(pid) => write!(f, "no free slot on page {pid:?}"),
            StorageError::NoSuchTable(id) => write!(f, "no table with id {id}"),
            StorageError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            StorageError::Generic(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::Io(err)
    }
}
