//! Page-level lock bookkeeping for two-phase locking.

use crate::page::PageId;
use crate::transaction::TransactionId;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Lock strength held or requested on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy)]
struct LockRecord {
    tid: TransactionId,
    mode: LockMode,
}

/// Tracks which transactions hold which pages. Grant decisions never block;
/// the buffer pool supplies the retry loop and the timeout.
#[derive(Debug, Default)]
pub struct LockManager {
    lock_table: Mutex<HashMap<PageId, Vec<LockRecord>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take `mode` on `pid` for `tid`. Returns false when the
    /// request conflicts with an existing holder.
    pub fn acquire(&self, tid: TransactionId, pid: PageId, mode: LockMode) -> bool {
        let mut lock_table = self.lock_table.lock();
        let records = lock_table.entry(pid).or_default();

        if records.is_empty() {
            records.push(LockRecord { tid, mode });
            return true;
        }

        if records.len() == 1 {
            let held = &mut records[0];
            if held.tid == tid {
                // Sole holder: upgrade in place; any other combination is
                // already satisfied.
                if held.mode == LockMode::Shared && mode == LockMode::Exclusive {
                    held.mode = LockMode::Exclusive;
                }
                return true;
            }
            if held.mode == LockMode::Shared && mode == LockMode::Shared {
                records.push(LockRecord { tid, mode });
                return true;
            }
            return false;
        }

        // Several holders means every one of them is shared.
        if mode == LockMode::Exclusive {
            return false;
        }
        if records.iter().any(|record| record.tid == tid) {
            return true;
        }
        records.push(LockRecord { tid, mode });
        true
    }

    /// Drops tid's lock on one page.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        let mut lock_table = self.lock_table.lock();
        if let Some(records) = lock_table.get_mut(&pid) {
            records.retain(|record| record.tid != tid);
            if records.is_empty() {
                lock_table.remove(&pid);
            }
        }
    }

    /// Drops every lock tid holds, across all pages.
    pub fn release_all(&self, tid: TransactionId) {
        let mut lock_table = self.lock_table.lock();
        lock_table.retain(|_, records| {
            records.retain(|record| record.tid != tid);
            !records.is_empty()
        });
    }

    pub fn holds(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_table
            .lock()
            .get(&pid)
            .is_some_and(|records| records.iter().any(|record| record.tid == tid))
    }

    /// The mode tid currently holds on pid, if any.
    pub fn held_mode(&self, tid: TransactionId, pid: PageId) -> Option<LockMode> {
        self.lock_table.lock().get(&pid).and_then(|records| {
            records
                .iter()
                .find(|record| record.tid == tid)
                .map(|record| record.mode)
        })
    }
}
