//! Streaming grouped aggregation. The executor feeds tuples in one at a
//! time and pulls the results back out through the iterator contract.

use mantle::tuple::{Field, FieldType, Tuple, TupleDesc, TupleIterator};
use mantle::StorageError;
use std::collections::HashMap;
use std::sync::Arc;

/// Aggregate functions understood by the operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

/// The fixed contract between the executor and every aggregation operator.
pub trait Aggregator {
    /// Folds one input tuple into the running per-group state.
    fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> Result<(), StorageError>;

    /// A snapshot of the aggregated results. Emission order is unspecified.
    fn iterator(&self) -> Result<AggregateIterator, StorageError>;
}

/// `None` is the single group of an ungrouped aggregation.
type GroupKey = Option<Field>;

trait AggHandler {
    fn merge(&mut self, group: GroupKey, value: i32);
    fn groups(&self) -> &HashMap<GroupKey, i32>;
}

#[derive(Default)]
struct CountHandler {
    agg: HashMap<GroupKey, i32>,
}

impl AggHandler for CountHandler {
    fn merge(&mut self, group: GroupKey, _value: i32) {
        *self.agg.entry(group).or_insert(0) += 1;
    }

    fn groups(&self) -> &HashMap<GroupKey, i32> {
        &self.agg
    }
}

#[derive(Default)]
struct SumHandler {
    agg: HashMap<GroupKey, i32>,
}

impl AggHandler for SumHandler {
    fn merge(&mut self, group: GroupKey, value: i32) {
        *self.agg.entry(group).or_insert(0) += value;
    }

    fn groups(&self) -> &HashMap<GroupKey, i32> {
        &self.agg
    }
}

#[derive(Default)]
struct MinHandler {
    agg: HashMap<GroupKey, i32>,
}

impl AggHandler for MinHandler {
    fn merge(&mut self, group: GroupKey, value: i32) {
        self.agg
            .entry(group)
            .and_modify(|current| *current = (*current).min(value))
            .or_insert(value);
    }

    fn groups(&self) -> &HashMap<GroupKey, i32> {
        &self.agg
    }
}

#[derive(Default)]
struct MaxHandler {
    agg: HashMap<GroupKey, i32>,
}

impl AggHandler for MaxHandler {
    fn merge(&mut self, group: GroupKey, value: i32) {
        self.agg
            .entry(group)
            .and_modify(|current| *current = (*current).max(value))
            .or_insert(value);
    }

    fn groups(&self) -> &HashMap<GroupKey, i32> {
        &self.agg
    }
}

/// Tracks (sum, count) per group and exposes the truncating integer
/// quotient.
#[derive(Default)]
struct AvgHandler {
    agg: HashMap<GroupKey, i32>,
    sums: HashMap<GroupKey, i64>,
    counts: HashMap<GroupKey, i64>,
}

impl AggHandler for AvgHandler {
    fn merge(&mut self, group: GroupKey, value: i32) {
        let sum = {
            let entry = self.sums.entry(group.clone()).or_insert(0);
            *entry += value as i64;
            *entry
        };
        let count = {
            let entry = self.counts.entry(group.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.agg.insert(group, (sum / count) as i32);
    }

    fn groups(&self) -> &HashMap<GroupKey, i32> {
        &self.agg
    }
}

fn result_desc(group_type: Option<FieldType>) -> Result<Arc<TupleDesc>, StorageError> {
    let fields = match group_type {
        None => vec![("agg_value".to_string(), FieldType::Int)],
        Some(ty) => vec![
            ("group_value".to_string(), ty),
            ("agg_value".to_string(), FieldType::Int),
        ],
    };
    Ok(Arc::new(TupleDesc::new(fields)?))
}

fn group_key(tuple: &Tuple, group_field: Option<usize>) -> Result<GroupKey, StorageError> {
    match group_field {
        None => Ok(None),
        Some(i) => tuple
            .field(i)
            .cloned()
            .map(Some)
            .ok_or_else(|| StorageError::InvalidArgument(format!("tuple has no field {i}"))),
    }
}

/// Grouped aggregation over an integer column.
pub struct IntegerAggregator {
    group_field: Option<usize>,
    group_type: Option<FieldType>,
    agg_field: usize,
    handler: Box<dyn AggHandler + Send>,
}

impl IntegerAggregator {
    pub fn new(
        group_field: Option<usize>,
        group_type: Option<FieldType>,
        agg_field: usize,
        op: AggregateOp,
    ) -> IntegerAggregator {
        let handler: Box<dyn AggHandler + Send> = match op {
            AggregateOp::Count => Box::<CountHandler>::default(),
            AggregateOp::Sum => Box::<SumHandler>::default(),
            AggregateOp::Min => Box::<MinHandler>::default(),
            AggregateOp::Max => Box::<MaxHandler>::default(),
            AggregateOp::Avg => Box::<AvgHandler>::default(),
        };
        IntegerAggregator {
            group_field,
            group_type,
            agg_field,
            handler,
        }
    }
}

impl Aggregator for IntegerAggregator {
    fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> Result<(), StorageError> {
        let group = group_key(tuple, self.group_field)?;
        let value = match tuple.field(self.agg_field) {
            Some(Field::Int(v)) => *v,
            Some(_) => {
                return Err(StorageError::InvalidArgument(format!(
                    "field {} is not an integer",
                    self.agg_field
                )))
            }
            None => {
                return Err(StorageError::InvalidArgument(format!(
                    "tuple has no field {}",
                    self.agg_field
                )))
            }
        };
        self.handler.merge(group, value);
        Ok(())
    }

    fn iterator(&self) -> Result<AggregateIterator, StorageError> {
        AggregateIterator::new(self.group_type, self.handler.groups())
    }
}

/// Grouped aggregation over a string column. COUNT is the only operation
/// defined for strings.
pub struct StringAggregator {
    group_field: Option<usize>,
    group_type: Option<FieldType>,
    agg_field: usize,
    handler: CountHandler,
}

impl StringAggregator {
    /// Fails with `InvalidArgument` for any op other than COUNT.
    pub fn new(
        group_field: Option<usize>,
        group_type: Option<FieldType>,
        agg_field: usize,
        op: AggregateOp,
    ) -> Result<StringAggregator, StorageError> {
        if op != AggregateOp::Count {
            return Err(StorageError::InvalidArgument(format!(
                "string columns only support COUNT, got {op:?}"
            )));
        }
        Ok(StringAggregator {
            group_field,
            group_type,
            agg_field,
            handler: CountHandler::default(),
        })
    }
}

impl Aggregator for StringAggregator {
    fn merge_tuple_into_group(&mut self, tuple: &Tuple) -> Result<(), StorageError> {
        let group = group_key(tuple, self.group_field)?;
        match tuple.field(self.agg_field) {
            Some(Field::Str(_)) => {}
            Some(_) => {
                return Err(StorageError::InvalidArgument(format!(
                    "field {} is not a string",
                    self.agg_field
                )))
            }
            None => {
                return Err(StorageError::InvalidArgument(format!(
                    "tuple has no field {}",
                    self.agg_field
                )))
            }
        }
        self.handler.merge(group, 0);
        Ok(())
    }

    fn iterator(&self) -> Result<AggregateIterator, StorageError> {
        AggregateIterator::new(self.group_type, self.handler.groups())
    }
}

/// Materialized aggregation results behind the executor's iterator
/// contract. Emits `(agg_value)` rows, or `(group_value, agg_value)` when
/// grouping.
pub struct AggregateIterator {
    desc: Arc<TupleDesc>,
    tuples: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl AggregateIterator {
    fn new(
        group_type: Option<FieldType>,
        groups: &HashMap<GroupKey, i32>,
    ) -> Result<AggregateIterator, StorageError> {
        let desc = result_desc(group_type)?;
        let mut tuples = Vec::with_capacity(groups.len());
        for (group, value) in groups {
            let fields = match group {
                None => vec![Field::Int(*value)],
                Some(g) => vec![g.clone(), Field::Int(*value)],
            };
            tuples.push(Tuple::new(desc.clone(), fields)?);
        }
        Ok(AggregateIterator {
            desc,
            tuples,
            cursor: 0,
            opened: false,
        })
    }
}

impl TupleIterator for AggregateIterator {
    fn open(&mut self) -> Result<(), StorageError> {
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<Tuple>, StorageError> {
        if !self.opened {
            return Err(StorageError::IteratorClosed);
        }
        let tuple = self.tuples.get(self.cursor).cloned();
        if tuple.is_some() {
            self.cursor += 1;
        }
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<(), StorageError> {
        if !self.opened {
            return Err(StorageError::IteratorClosed);
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }
}
