//! The buffer pool: a bounded page cache that also enforces page locking.
//! Transactions obtain pages only through [`BufferPool::get_page`]; dirty
//! pages stay resident until commit (NO-STEAL), and an abort restores their
//! on-disk images.

use crate::catalog::Catalog;
use crate::error::StorageError;
use crate::lock_manager::LockManager;
use crate::page::{HeapPage, PageId};
use crate::transaction::{Permissions, TransactionId};
use crate::tuple::Tuple;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// A page as handed out by the pool: shared ownership, per-page RwLock.
pub type SharedPage = Arc<RwLock<HeapPage>>;

/// Sentinel slots of the frame arena; real frames start after these.
const HEAD: usize = 0;
const TAIL: usize = 1;

const LOCK_RETRY_BACKOFF: Duration = Duration::from_millis(1);
const LOCK_TIMEOUT_MAX_MS: u64 = 200;

struct Frame {
    pid: PageId,
    page: SharedPage,
    /// The transaction that dirtied this page, if any. Dirty frames are
    /// pinned: the evictor skips them.
    dirty_by: Option<TransactionId>,
}

#[derive(Clone, Copy)]
struct Links {
    prev: usize,
    next: usize,
}

/// LRU list over an index arena. `links[HEAD].next` is the most recently
/// used frame, `links[TAIL].prev` the least recently used.
struct PoolState {
    frames: Vec<Option<Frame>>,
    links: Vec<Links>,
    free: Vec<usize>,
    directory: HashMap<PageId, usize>,
}

impl PoolState {
    fn new() -> PoolState {
        PoolState {
            frames: vec![None, None],
            links: vec![
                Links {
                    prev: HEAD,
                    next: TAIL,
                },
                Links {
                    prev: HEAD,
                    next: TAIL,
                },
            ],
            free: Vec::new(),
            directory: HashMap::new(),
        }
    }

    fn unlink(&mut self, idx: usize) {
        let Links { prev, next } = self.links[idx];
        self.links[prev].next = next;
        self.links[next].prev = prev;
    }

    fn push_front(&mut self, idx: usize) {
        let first = self.links[HEAD].next;
        self.links[idx] = Links {
            prev: HEAD,
            next: first,
        };
        self.links[first].prev = idx;
        self.links[HEAD].next = idx;
    }

    fn touch(&mut self, idx: usize) {
        self.unlink(idx);
        self.push_front(idx);
    }

    fn insert_frame(&mut self, frame: Frame) -> usize {
        let pid = frame.pid;
        let idx = match self.free.pop() {
            Some(idx) => {
                self.frames[idx] = Some(frame);
                idx
            }
            None => {
                self.frames.push(Some(frame));
                self.links.push(Links {
                    prev: HEAD,
                    next: TAIL,
                });
                self.frames.len() - 1
            }
        };
        self.push_front(idx);
        self.directory.insert(pid, idx);
        idx
    }

    fn remove_frame(&mut self, idx: usize) -> Option<Frame> {
        self.unlink(idx);
        let frame = self.frames[idx].take()?;
        self.directory.remove(&frame.pid);
        self.free.push(idx);
        Some(frame)
    }

    /// LRU sweep honoring NO-STEAL: the first clean frame from the cold end
    /// is dropped without touching disk; an all-dirty pool is an error.
    fn evict(&mut self) -> Result<(), StorageError> {
        let mut idx = self.links[TAIL].prev;
        while idx != HEAD {
            let prev = self.links[idx].prev;
            let clean = self.frames[idx]
                .as_ref()
                .is_some_and(|frame| frame.dirty_by.is_none());
            if clean {
                if let Some(frame) = self.remove_frame(idx) {
                    crate::mantle_debug_log!("[BufferPool::evict] dropped clean page {:?}", frame.pid);
                }
                return Ok(());
            }
            idx = prev;
        }
        Err(StorageError::NoCleanPage)
    }

    fn frames_dirtied_by(&self, tid: TransactionId) -> Vec<usize> {
        self.frames
            .iter()
            .enumerate()
            .filter_map(|(idx, frame)| match frame {
                Some(frame) if frame.dirty_by == Some(tid) => Some(idx),
                _ => None,
            })
            .collect()
    }
}

/// Bounded cache of heap pages, shared by every transaction in the process.
pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// A pool holding at most `capacity` pages of the tables in `catalog`.
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> BufferPool {
        BufferPool {
            capacity,
            catalog,
            lock_manager: LockManager::new(),
            state: Mutex::new(PoolState::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// Takes the page lock for `tid`, then returns the cached page, reading
    /// it from disk on a miss. Blocks until the lock is granted or a
    /// randomized timeout expires with `TransactionAborted`.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<SharedPage, StorageError> {
        // 1. Acquire the page lock, spinning with back-off up to the budget.
        self.acquire_with_timeout(tid, pid, perm)?;

        let mut state = self.state.lock();

        // 2. Cache hit: refresh the LRU position and hand the page out.
        if let Some(&idx) = state.directory.get(&pid) {
            state.touch(idx);
            if let Some(frame) = &state.frames[idx] {
                return Ok(frame.page.clone());
            }
        }

        // 3. Miss: make room, then read through the owning heap file.
        if state.directory.len() >= self.capacity {
            state.evict()?;
        }
        let file = self.catalog.get_database_file(pid.table_id)?;
        let page: SharedPage = Arc::new(RwLock::new(file.read_page(pid)?));
        state.insert_frame(Frame {
            pid,
            page: Arc::clone(&page),
            dirty_by: None,
        });
        Ok(page)
    }

    fn acquire_with_timeout(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<(), StorageError> {
        let mode = perm.lock_mode();
        let start = Instant::now();
        let budget = Duration::from_millis(rand::thread_rng().gen_range(0..LOCK_TIMEOUT_MAX_MS));
        while !self.lock_manager.acquire(tid, pid, mode) {
            if start.elapsed() >= budget {
                crate::mantle_debug_log!(
                    "[BufferPool::get_page] lock timeout for tx {} on {:?}",
                    tid.id(),
                    pid
                );
                return Err(StorageError::TransactionAborted);
            }
            thread::sleep(LOCK_RETRY_BACKOFF);
        }
        Ok(())
    }

    /// Inserts through the owning heap file, then marks every dirtied page
    /// and keeps its authoritative copy resident.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: i32,
        tuple: &mut Tuple,
    ) -> Result<(), StorageError> {
        let file = self.catalog.get_database_file(table_id)?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        self.mark_dirty(tid, &dirtied)
    }

    /// Deletes through the heap file owning the tuple's page.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), StorageError> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| StorageError::Generic("tuple has no record id".to_string()))?;
        let file = self.catalog.get_database_file(rid.pid.table_id)?;
        let dirtied = file.delete_tuple(self, tid, tuple)?;
        self.mark_dirty(tid, &dirtied)
    }

    fn mark_dirty(&self, tid: TransactionId, pages: &[SharedPage]) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        for page in pages {
            let pid = page.read().id();
            if let Some(&idx) = state.directory.get(&pid) {
                state.touch(idx);
                if let Some(frame) = state.frames[idx].as_mut() {
                    frame.dirty_by = Some(tid);
                }
            } else {
                // The frame slipped out of the cache between the heap-file
                // call and here; re-admit the modified copy.
                if state.directory.len() >= self.capacity {
                    state.evict()?;
                }
                state.insert_frame(Frame {
                    pid,
                    page: Arc::clone(page),
                    dirty_by: Some(tid),
                });
            }
        }
        Ok(())
    }

    /// Commits or aborts `tid`: flush its dirty pages (commit) or restore
    /// their on-disk images (abort), then release every lock it holds. A
    /// second call for the same tid is a no-op.
    pub fn transaction_complete(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), StorageError> {
        let outcome = if commit {
            self.flush_pages(tid)
        } else {
            self.restore_pages(tid);
            Ok(())
        };
        self.lock_manager.release_all(tid);
        outcome
    }

    /// Writes every page dirtied by `tid` back through its heap file and
    /// clears the markers.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        for idx in state.frames_dirtied_by(tid) {
            self.flush_frame(&mut state, idx)?;
        }
        Ok(())
    }

    /// Replaces every page dirtied by `tid` with its on-disk image. Failures
    /// are logged and swallowed so the caller's lock release still runs.
    fn restore_pages(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        for idx in state.frames_dirtied_by(tid) {
            let Some(pid) = state.frames[idx].as_ref().map(|frame| frame.pid) else {
                continue;
            };
            let fresh = self
                .catalog
                .get_database_file(pid.table_id)
                .and_then(|file| file.read_page(pid));
            match fresh {
                Ok(image) => {
                    if let Some(frame) = state.frames[idx].as_mut() {
                        *frame.page.write() = image;
                        frame.dirty_by = None;
                    }
                    state.touch(idx);
                }
                Err(err) => {
                    crate::mantle_debug_log!(
                        "[BufferPool::restore_pages] failed to restore {:?}: {err}",
                        pid
                    );
                }
            }
        }
    }

    /// Writes the named page if it is dirty, then clears its marker.
    pub fn flush_page(&self, pid: PageId) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let idx = state.directory.get(&pid).copied();
        if let Some(idx) = idx {
            self.flush_frame(&mut state, idx)?;
        }
        Ok(())
    }

    /// Flushes every dirty resident page. Writing uncommitted data breaks
    /// the NO-STEAL discipline, so this is for shutdown paths only.
    pub fn flush_all_pages(&self) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        let resident: Vec<usize> = state.directory.values().copied().collect();
        for idx in resident {
            self.flush_frame(&mut state, idx)?;
        }
        Ok(())
    }

    fn flush_frame(&self, state: &mut PoolState, idx: usize) -> Result<(), StorageError> {
        let Some(frame) = state.frames[idx].as_mut() else {
            return Ok(());
        };
        if frame.dirty_by.is_none() {
            return Ok(());
        }
        let file = self.catalog.get_database_file(frame.pid.table_id)?;
        file.write_page(&frame.page.read())?;
        frame.dirty_by = None;
        Ok(())
    }

    /// Drops a page from the cache without writing it.
    pub fn discard_page(&self, pid: PageId) {
        let mut state = self.state.lock();
        let idx = state.directory.get(&pid).copied();
        if let Some(idx) = idx {
            state.remove_frame(idx);
        }
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(tid, pid)
    }

    /// Releases one page lock before end of transaction. This punches a hole
    /// in two-phase locking; callers own the consequences.
    pub fn unsafe_release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(tid, pid);
    }

    /// Page ids currently resident, for inspection.
    pub fn resident_pages(&self) -> Vec<PageId> {
        self.state.lock().directory.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::{FieldType, TupleDesc};

    fn empty_shared_page(pid: PageId) -> SharedPage {
        let desc = Arc::new(TupleDesc::new(vec![("v".to_string(), FieldType::Int)]).unwrap());
        Arc::new(RwLock::new(HeapPage::empty(pid, desc).unwrap()))
    }

    fn frame(pid: PageId, dirty_by: Option<TransactionId>) -> Frame {
        Frame {
            pid,
            page: empty_shared_page(pid),
            dirty_by,
        }
    }

    #[test]
    fn lru_order_tracks_touches() {
        let mut state = PoolState::new();
        let a = PageId::new(1, 0);
        let b = PageId::new(1, 1);
        let ia = state.insert_frame(frame(a, None));
        let _ib = state.insert_frame(frame(b, None));

        // A was inserted first, so it is the LRU victim until touched.
        state.touch(ia);
        state.evict().unwrap();
        assert!(state.directory.contains_key(&a));
        assert!(!state.directory.contains_key(&b));
    }

    #[test]
    fn evict_skips_dirty_frames() {
        let mut state = PoolState::new();
        let tid = TransactionId::new();
        let a = PageId::new(1, 0);
        let b = PageId::new(1, 1);
        state.insert_frame(frame(a, Some(tid)));
        state.insert_frame(frame(b, None));

        state.evict().unwrap();
        assert!(state.directory.contains_key(&a));
        assert!(!state.directory.contains_key(&b));
        assert!(matches!(state.evict(), Err(StorageError::NoCleanPage)));
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut state = PoolState::new();
        let a = PageId::new(1, 0);
        let b = PageId::new(1, 1);
        let ia = state.insert_frame(frame(a, None));
        state.remove_frame(ia);
        let ib = state.insert_frame(frame(b, None));
        assert_eq!(ia, ib);
        assert_eq!(state.directory.len(), 1);
    }
}
