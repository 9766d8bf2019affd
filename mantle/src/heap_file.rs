use crate::buffer_pool::{BufferPool, SharedPage};
use crate::error::StorageError;
use crate::page::{HeapPage, PageId};
use crate::transaction::{Permissions, TransactionId};
use crate::tuple::{Tuple, TupleDesc, TupleIterator};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::fs::OpenOptions;
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A heap file: an unordered collection of tuples stored as a flat sequence
/// of fixed-size pages. All tuple access goes through the buffer pool; the
/// file itself only reads and writes whole pages.
pub struct HeapFile {
    file: Mutex<std::fs::File>,
    path: PathBuf,
    desc: Arc<TupleDesc>,
    id: i32,
}

impl HeapFile {
    /// Opens (or creates) the backing file. The table id is a stable hash of
    /// the absolute path, so reopening the same file yields the same id.
    pub fn open<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> Result<HeapFile, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let path = path.as_ref().canonicalize()?;
        let mut hasher = DefaultHasher::new();
        path.hash(&mut hasher);
        let id = hasher.finish() as i32;
        crate::mantle_debug_log!("[HeapFile::open] {} -> table id {id}", path.display());
        Ok(HeapFile {
            file: Mutex::new(file),
            path,
            desc,
            id,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    /// floor(file length / page size).
    pub fn num_pages(&self) -> Result<usize, StorageError> {
        let len = self.file.lock().metadata()?.len();
        Ok((len / crate::page_size() as u64) as usize)
    }

    /// Reads exactly one page at its fixed offset.
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage, StorageError> {
        if pid.page_no >= self.num_pages()? {
            return Err(StorageError::InvalidArgument(format!(
                "page {} is past the end of table {}",
                pid.page_no, self.id
            )));
        }
        let page_size = crate::page_size();
        let mut data = vec![0u8; page_size];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start((pid.page_no * page_size) as u64))?;
            file.read_exact(&mut data)?;
        }
        HeapPage::new(pid, &data, self.desc.clone())
    }

    /// Writes one page at its fixed offset, extending the file if the page
    /// lies just past the current end.
    pub fn write_page(&self, page: &HeapPage) -> Result<(), StorageError> {
        let page_size = crate::page_size();
        let data = page.serialize();
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start((page.id().page_no * page_size) as u64))?;
        file.write_all(&data)?;
        file.sync_all()?;
        Ok(())
    }

    /// First-fit insert: the first page with a free slot takes the tuple; a
    /// fresh page is appended when every existing page is full. Returns the
    /// pages dirtied by the operation.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<SharedPage>, StorageError> {
        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.id, page_no);
            let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            {
                let mut guard = page.write();
                if guard.empty_slot_count() == 0 {
                    continue;
                }
                guard.insert_tuple(tuple)?;
            }
            return Ok(vec![page]);
        }

        // Every page is full. Extend the file with an empty page on disk
        // first, so an abort can restore the pristine image by re-reading.
        let pid = PageId::new(self.id, self.num_pages()?);
        self.write_page(&HeapPage::empty(pid, self.desc.clone())?)?;
        let page = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        page.write().insert_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Clears the slot addressed by the tuple's record id. Returns the page
    /// dirtied by the operation.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<SharedPage>, StorageError> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::Generic("tuple has no record id".to_string()))?;
        let page = pool.get_page(tid, rid.pid, Permissions::ReadWrite)?;
        page.write().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// A lazy page-at-a-time scan reading through the buffer pool under
    /// shared locks.
    pub fn iterator<'a>(&'a self, pool: &'a BufferPool, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator {
            file: self,
            pool,
            tid,
            page_no: 0,
            tuples: None,
            opened: false,
        }
    }
}

pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    pool: &'a BufferPool,
    tid: TransactionId,
    page_no: usize,
    tuples: Option<std::vec::IntoIter<Tuple>>,
    opened: bool,
}

impl HeapFileIterator<'_> {
    fn page_tuples(&self, page_no: usize) -> Result<std::vec::IntoIter<Tuple>, StorageError> {
        let pid = PageId::new(self.file.id, page_no);
        let page = self
            .pool
            .get_page(self.tid, pid, Permissions::ReadOnly)?;
        let tuples: Vec<Tuple> = page.read().iter().cloned().collect();
        Ok(tuples.into_iter())
    }
}

impl TupleIterator for HeapFileIterator<'_> {
    fn open(&mut self) -> Result<(), StorageError> {
        self.page_no = 0;
        self.tuples = if self.file.num_pages()? > 0 {
            Some(self.page_tuples(0)?)
        } else {
            None
        };
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, StorageError> {
        if !self.opened {
            return Err(StorageError::IteratorClosed);
        }
        loop {
            let Some(tuples) = self.tuples.as_mut() else {
                return Ok(None);
            };
            if let Some(tuple) = tuples.next() {
                return Ok(Some(tuple));
            }
            self.page_no += 1;
            if self.page_no >= self.file.num_pages()? {
                self.tuples = None;
                return Ok(None);
            }
            self.tuples = Some(self.page_tuples(self.page_no)?);
        }
    }

    fn rewind(&mut self) -> Result<(), StorageError> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.opened = false;
        self.tuples = None;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.file.desc.clone()
    }
}
