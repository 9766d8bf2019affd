//! # Mantle Storage Engine
//! The storage engine for the Granite database.
//! This crate owns the on-disk heap-file format, the page-level lock manager
//! and the buffer pool that fronts all page I/O.

/// The buffer pool manager.
pub mod buffer_pool;
/// The table name/id registry consumed by the buffer pool and the planner.
pub mod catalog;
/// Crate-wide error type.
pub mod error;
/// Heap files: flat files of slotted pages.
pub mod heap_file;
/// The lock manager for concurrency control.
pub mod lock_manager;
/// The slotted page layout.
pub mod page;
/// Transaction ids and access permissions.
pub mod transaction;
/// Tuples, descriptors and the executor iterator contract.
pub mod tuple;

use std::sync::atomic::{AtomicUsize, Ordering};

/// The default size of a single page in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// The default number of pages a buffer pool keeps resident.
pub const DEFAULT_PAGES: usize = 50;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Bytes per page, including the slot header.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::SeqCst)
}

/// Overrides the process-wide page size. Intended for test fixtures only;
/// must not be called while any buffer pool has resident pages.
pub fn set_page_size(bytes: usize) {
    PAGE_SIZE.store(bytes, Ordering::SeqCst);
}

/// Restores the default page size. Intended for test fixtures only.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::SeqCst);
}

pub fn debug_logs_enabled() -> bool {
    std::env::var_os("MANTLE_DEBUG_LOG").is_some()
}

#[macro_export]
macro_rules! mantle_debug_log {
    ($($arg:tt)*) => {
        if $crate::debug_logs_enabled() {
            println!($($arg)*);
        }
    };
}

pub use buffer_pool::BufferPool;
pub use catalog::Catalog;
pub use error::StorageError;
pub use heap_file::HeapFile;
pub use page::{HeapPage, PageId};
pub use transaction::{Permissions, TransactionId};
pub use tuple::{Field, FieldType, RecordId, Tuple, TupleDesc, TupleIterator};
