//! Per-table statistics driving the planner's cost and cardinality
//! estimates, plus the process-wide registry they are published in.

use crate::histogram::{IntHistogram, StringHistogram};
use crate::predicate::Op;
use mantle::tuple::TupleIterator;
use mantle::{BufferPool, Catalog, Field, FieldType, StorageError, TransactionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Planner cost unit for one page of I/O.
pub const IO_COST_PER_PAGE: usize = 1000;

/// Buckets per column histogram.
pub const NUM_HIST_BINS: usize = 100;

static STATS_MAP: LazyLock<RwLock<HashMap<String, Arc<TableStats>>>> =
    LazyLock::new(Default::default);

pub fn get_table_stats(table_name: &str) -> Option<Arc<TableStats>> {
    STATS_MAP.read().get(table_name).cloned()
}

pub fn set_table_stats(table_name: &str, stats: Arc<TableStats>) {
    STATS_MAP.write().insert(table_name.to_string(), stats);
}

/// Builds and publishes statistics for every table the catalog knows about.
pub fn compute_statistics(catalog: &Catalog, pool: &BufferPool) -> Result<(), StorageError> {
    for table_id in catalog.table_id_iterator() {
        let stats = TableStats::new(catalog, pool, table_id, IO_COST_PER_PAGE)?;
        set_table_stats(&catalog.get_table_name(table_id)?, Arc::new(stats));
    }
    Ok(())
}

/// Column histograms and counts for one table.
pub struct TableStats {
    table_id: i32,
    io_cost_per_page: usize,
    total_tuples: usize,
    num_pages: usize,
    int_histograms: HashMap<usize, IntHistogram>,
    string_histograms: HashMap<usize, StringHistogram>,
}

impl TableStats {
    /// Scans the table twice under a fresh transaction: once to find each
    /// int column's [min, max], once to fill the histograms. The scan
    /// transaction commits at the end so its shared locks drain.
    pub fn new(
        catalog: &Catalog,
        pool: &BufferPool,
        table_id: i32,
        io_cost_per_page: usize,
    ) -> Result<TableStats, StorageError> {
        let file = catalog.get_database_file(table_id)?;
        let desc = file.tuple_desc().clone();
        let num_fields = desc.num_fields();
        let tid = TransactionId::new();

        let build = (|| -> Result<
            (usize, HashMap<usize, IntHistogram>, HashMap<usize, StringHistogram>),
            StorageError,
        > {
            let mut mins = vec![i32::MAX; num_fields];
            let mut maxs = vec![i32::MIN; num_fields];
            let mut total_tuples = 0usize;

            let mut scan = file.iterator(pool, tid);
            scan.open()?;
            while let Some(tuple) = scan.next()? {
                total_tuples += 1;
                for i in 0..num_fields {
                    if let Some(Field::Int(v)) = tuple.field(i) {
                        mins[i] = mins[i].min(*v);
                        maxs[i] = maxs[i].max(*v);
                    }
                }
            }

            let mut int_histograms = HashMap::new();
            let mut string_histograms = HashMap::new();
            for i in 0..num_fields {
                match desc.field_type(i) {
                    Some(FieldType::Int) => {
                        int_histograms.insert(i, IntHistogram::new(NUM_HIST_BINS, mins[i], maxs[i]));
                    }
                    Some(FieldType::Str) => {
                        string_histograms.insert(i, StringHistogram::new(NUM_HIST_BINS));
                    }
                    None => {}
                }
            }

            scan.rewind()?;
            while let Some(tuple) = scan.next()? {
                for i in 0..num_fields {
                    match tuple.field(i) {
                        Some(Field::Int(v)) => {
                            if let Some(hist) = int_histograms.get_mut(&i) {
                                hist.add_value(*v);
                            }
                        }
                        Some(Field::Str(s)) => {
                            if let Some(hist) = string_histograms.get_mut(&i) {
                                hist.add_value(s);
                            }
                        }
                        None => {}
                    }
                }
            }
            scan.close();
            Ok((total_tuples, int_histograms, string_histograms))
        })();

        let num_pages = file.num_pages()?;
        pool.transaction_complete(tid, true)?;
        let (total_tuples, int_histograms, string_histograms) = build?;

        Ok(TableStats {
            table_id,
            io_cost_per_page,
            total_tuples,
            num_pages,
            int_histograms,
            string_histograms,
        })
    }

    pub fn table_id(&self) -> i32 {
        self.table_id
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }

    /// Cost of sequentially scanning the whole table, whole pages at a time.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page) as f64
    }

    /// Tuples expected from a scan whose predicate has the given
    /// selectivity.
    pub fn estimate_cardinality(&self, selectivity: f64) -> usize {
        (self.total_tuples as f64 * selectivity) as usize
    }

    /// Selectivity of `field op constant` against the column's histogram.
    pub fn estimate_selectivity(
        &self,
        field: usize,
        op: Op,
        constant: &Field,
    ) -> Result<f64, StorageError> {
        match constant {
            Field::Int(v) => self
                .int_histograms
                .get(&field)
                .map(|hist| hist.estimate_selectivity(op, *v))
                .ok_or_else(|| {
                    StorageError::InvalidArgument(format!("field {field} is not an integer column"))
                }),
            Field::Str(s) => self
                .string_histograms
                .get(&field)
                .map(|hist| hist.estimate_selectivity(op, s))
                .ok_or_else(|| {
                    StorageError::InvalidArgument(format!("field {field} is not a string column"))
                }),
        }
    }

    /// Average selectivity of the column, independent of the operator.
    pub fn avg_selectivity(&self, field: usize, _op: Op) -> Result<f64, StorageError> {
        if let Some(hist) = self.int_histograms.get(&field) {
            return Ok(hist.avg_selectivity());
        }
        if let Some(hist) = self.string_histograms.get(&field) {
            return Ok(hist.avg_selectivity());
        }
        Err(StorageError::InvalidArgument(format!(
            "table {} has no field {field}",
            self.table_id
        )))
    }
}
