//! Data cache maintenance around accelerator accesses.
//!
//! The accelerator reads and writes memory behind the CPU's data cache.
//! Before it touches a buffer, dirty lines covering the buffer must be
//! written back (so it sees what the CPU wrote) and dropped (so the CPU
//! can't later evict stale lines on top of its output). After it's done,
//! the destination must be invalidated again so the CPU re-reads memory.
//!
//! [`CoherencyGuard`] performs both halves. The second half runs in `Drop`,
//! so it happens on every path out of a transfer, including early returns
//! on timeout or fault.
use arrayvec::ArrayVec;
use std::ops::Range;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Cache maintenance operations by address range.
pub trait CacheMaintenance {
    /// Write back dirty lines and invalidate them.
    fn clean_invalidate(&mut self, addr: usize, len: usize);

    /// Invalidate lines without writing them back.
    fn invalidate(&mut self, addr: usize, len: usize);
}

impl<T: CacheMaintenance + ?Sized> CacheMaintenance for &mut T {
    fn clean_invalidate(&mut self, addr: usize, len: usize) {
        (**self).clean_invalidate(addr, len)
    }

    fn invalidate(&mut self, addr: usize, len: usize) {
        (**self).invalidate(addr, len)
    }
}

/// A [`CacheMaintenance`] for systems without a data cache (or with one
/// that's coherent with the accelerator).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl CacheMaintenance for NoCache {
    fn clean_invalidate(&mut self, _addr: usize, _len: usize) {}
    fn invalidate(&mut self, _addr: usize, _len: usize) {}
}

/// Which side of a transfer a region is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Source,
    Dest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub addr: usize,
    pub len: usize,
    pub access: Access,
}

impl Region {
    pub fn of(bytes: &[u8], access: Access) -> Self {
        Self {
            addr: bytes.as_ptr() as usize,
            len: bytes.len(),
            access,
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.addr..self.addr + self.len
    }
}

/// Keeps the cache coherent for the regions touched by an accelerator
/// transfer while it's alive.
///
/// A transfer has at most one source and one destination.
#[must_use = "the guard must be held until the transfer completes"]
pub struct CoherencyGuard<'a, C: CacheMaintenance + ?Sized> {
    cache: &'a mut C,
    regions: ArrayVec<[Region; 2]>,
}

impl<'a, C: CacheMaintenance + ?Sized> CoherencyGuard<'a, C> {
    /// Clean and invalidate `regions`. Empty regions are ignored.
    ///
    /// # Panics
    ///
    /// Panics if more than two regions are given.
    pub fn new(cache: &'a mut C, regions: impl IntoIterator<Item = Region>) -> Self {
        let regions: ArrayVec<[Region; 2]> = regions.into_iter().filter(|r| r.len > 0).collect();

        for r in regions.iter() {
            cache.clean_invalidate(r.addr, r.len);
        }

        Self { cache, regions }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }
}

impl<C: CacheMaintenance + ?Sized> Drop for CoherencyGuard<'_, C> {
    fn drop(&mut self) {
        for r in self.regions.iter().filter(|r| r.access == Access::Dest) {
            self.cache.invalidate(r.addr, r.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::*, *};

    #[test]
    fn guard_brackets_regions() {
        let src = [0u8; 16];
        let dst = [0u8; 32];
        let mut cache = RecordingCache::default();

        {
            let guard = CoherencyGuard::new(
                &mut cache,
                vec![Region::of(&src, Access::Source), Region::of(&dst, Access::Dest)],
            );
            assert_eq!(guard.regions().len(), 2);
        }

        let (s, d) = (src.as_ptr() as usize, dst.as_ptr() as usize);
        assert_eq!(
            cache.ops,
            vec![
                CacheOp::CleanInvalidate(s, 16),
                CacheOp::CleanInvalidate(d, 32),
                CacheOp::Invalidate(d, 32),
            ]
        );
        assert!(cache.is_balanced(&[d..d + 32]));
    }

    #[test]
    fn guard_runs_on_early_return() {
        fn transfer(cache: &mut RecordingCache, dst: &[u8]) -> Result<(), ()> {
            let _guard = CoherencyGuard::new(cache, Some(Region::of(dst, Access::Dest)));
            Err(())
        }

        let dst = [0u8; 8];
        let mut cache = RecordingCache::default();
        assert!(transfer(&mut cache, &dst).is_err());

        let d = dst.as_ptr() as usize;
        assert!(cache.is_balanced(&[d..d + 8]));
        assert_eq!(cache.ops.len(), 2);
    }

    #[test]
    fn empty_regions_are_ignored() {
        let mut cache = RecordingCache::default();
        drop(CoherencyGuard::new(
            &mut cache,
            Some(Region {
                addr: 0x1000,
                len: 0,
                access: Access::Dest,
            }),
        ));
        assert!(cache.ops.is_empty());
    }
}
