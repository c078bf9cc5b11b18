//! Cache maintenance doubles for tests.
//!
//! Enabled by the `testing` feature.
use std::ops::Range;

use super::CacheMaintenance;

/// A [`CacheMaintenance`] that records every operation instead of
/// performing it.
#[derive(Debug, Default, Clone)]
pub struct RecordingCache {
    pub ops: Vec<CacheOp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    CleanInvalidate(usize, usize),
    Invalidate(usize, usize),
}

impl CacheMaintenance for RecordingCache {
    fn clean_invalidate(&mut self, addr: usize, len: usize) {
        self.ops.push(CacheOp::CleanInvalidate(addr, len));
    }

    fn invalidate(&mut self, addr: usize, len: usize) {
        self.ops.push(CacheOp::Invalidate(addr, len));
    }
}

impl RecordingCache {
    /// Check that every `CleanInvalidate` of a destination range is
    /// eventually followed by an `Invalidate` of the same range, with the
    /// pairs properly nested.
    pub fn is_balanced(&self, dest_ranges: &[Range<usize>]) -> bool {
        let mut open = Vec::new();
        for op in self.ops.iter() {
            match *op {
                CacheOp::CleanInvalidate(addr, len) => {
                    if dest_ranges.contains(&(addr..addr + len)) {
                        open.push((addr, len));
                    }
                }
                CacheOp::Invalidate(addr, len) => {
                    if open.pop() != Some((addr, len)) {
                        return false;
                    }
                }
            }
        }
        open.is_empty()
    }
}
