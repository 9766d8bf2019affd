//! Equi-width histograms backing the planner's selectivity estimates.
//! Space and update time are constant in the number of values seen.

use crate::predicate::Op;
use std::fmt;

/// Fixed-width histogram over one integer column.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    buckets: Vec<usize>,
    min: i64,
    max: i64,
    width: f64,
    ntups: usize,
}

impl IntHistogram {
    /// `buckets` equal-width bins covering [min, max]. The width is rounded
    /// up so bucket boundaries stay on integers.
    pub fn new(buckets: usize, min: i32, max: i32) -> IntHistogram {
        let min = min as i64;
        let max = max as i64;
        let width = ((max - min + 1) as f64 / buckets as f64).ceil();
        IntHistogram {
            buckets: vec![0; buckets],
            min,
            max,
            width,
            ntups: 0,
        }
    }

    /// Counts `v`. Values outside [min, max] are ignored; that keeps the
    /// selectivity identities exact.
    pub fn add_value(&mut self, v: i32) {
        let v = v as i64;
        if v < self.min || v > self.max {
            return;
        }
        let idx = self.bucket_of(v);
        self.buckets[idx] += 1;
        self.ntups += 1;
    }

    fn bucket_of(&self, v: i64) -> usize {
        ((v - self.min) as f64 / self.width) as usize
    }

    /// Estimated fraction of recorded values satisfying `value op v`.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        self.selectivity(op, v as i64)
    }

    // Widened so the ±1 rewrites of the OrEq operators cannot overflow at
    // the ends of the i32 range.
    fn selectivity(&self, op: Op, v: i64) -> f64 {
        if self.ntups == 0 {
            return 0.0;
        }
        match op {
            Op::Equals => {
                if v < self.min || v > self.max {
                    0.0
                } else {
                    (self.buckets[self.bucket_of(v)] as f64 / self.width) / self.ntups as f64
                }
            }
            Op::NotEquals => 1.0 - self.selectivity(Op::Equals, v),
            Op::GreaterThan => {
                if v < self.min {
                    1.0
                } else if v >= self.max {
                    // Nothing above max is ever recorded, and the rounded
                    // width lets the last bucket overhang it.
                    0.0
                } else {
                    let idx = self.bucket_of(v);
                    let right = self.min as f64 + (idx as f64 + 1.0) * self.width - 1.0;
                    let partial = self.buckets[idx] as f64 * (right - v as f64) / self.width;
                    let higher: usize = self.buckets[idx + 1..].iter().sum();
                    (partial + higher as f64) / self.ntups as f64
                }
            }
            Op::LessThan => {
                if v < self.min {
                    0.0
                } else if v > self.max {
                    1.0
                } else {
                    let idx = self.bucket_of(v);
                    let left = self.min as f64 + idx as f64 * self.width;
                    let partial = self.buckets[idx] as f64 * (v as f64 - left) / self.width;
                    let lower: usize = self.buckets[..idx].iter().sum();
                    (partial + lower as f64) / self.ntups as f64
                }
            }
            Op::GreaterThanOrEq => self.selectivity(Op::GreaterThan, v - 1),
            Op::LessThanOrEq => self.selectivity(Op::LessThan, v + 1),
        }
    }

    /// Σ buckets / ntups: 1 whenever the histogram is non-empty.
    pub fn avg_selectivity(&self) -> f64 {
        if self.ntups == 0 {
            return 0.0;
        }
        self.buckets.iter().sum::<usize>() as f64 / self.ntups as f64
    }
}

impl fmt::Display for IntHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IntHistogram(min={}, max={}, width={}, ntups={})",
            self.min, self.max, self.width, self.ntups
        )?;
        for (i, count) in self.buckets.iter().enumerate() {
            write!(f, " [{i},{count}]")?;
        }
        Ok(())
    }
}

/// Histogram over a string column: strings hash into a bounded integer range
/// and an [`IntHistogram`] does the rest.
#[derive(Debug, Clone)]
pub struct StringHistogram {
    inner: IntHistogram,
}

impl StringHistogram {
    pub fn new(buckets: usize) -> StringHistogram {
        StringHistogram {
            inner: IntHistogram::new(buckets, Self::string_to_int(""), Self::string_to_int("zzzz")),
        }
    }

    /// Folds the first four code points into a base-128 integer. Code points
    /// are clamped to 7 bits, so any alphabet maps deterministically into
    /// the [hash(""), hash("zzzz")] range or slightly above it (and is then
    /// ignored, like any other out-of-range value).
    fn string_to_int(s: &str) -> i32 {
        let mut v: i32 = 0;
        for c in s.chars().take(4) {
            v = v * 128 + (c as u32).min(127) as i32;
        }
        v
    }

    pub fn add_value(&mut self, s: &str) {
        self.inner.add_value(Self::string_to_int(s));
    }

    pub fn estimate_selectivity(&self, op: Op, s: &str) -> f64 {
        self.inner.estimate_selectivity(op, Self::string_to_int(s))
    }

    pub fn avg_selectivity(&self) -> f64 {
        self.inner.avg_selectivity()
    }
}
