//! Process-group rendezvous used when opening a cache directory.
//!
//! Rank 0 creates the directory and its hash record; every rank then waits
//! at [`ProcessGroup::barrier`] before validating the record. No other
//! synchronization is provided.
use crate::cache::errors::CacheResult;
use std::sync::{Arc, Barrier};

/// Minimal view of a group of cooperating processes.
pub trait ProcessGroup {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Block until every member reached the barrier.
    fn barrier(&self) -> CacheResult<()>;
}

/// Group of one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleProcess;

impl ProcessGroup for SingleProcess {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) -> CacheResult<()> {
        Ok(())
    }
}

/// Group whose members are threads of the current process.
#[derive(Debug, Clone)]
pub struct ThreadGroup {
    rank: usize,
    size: usize,
    barrier: Arc<Barrier>,
}

impl ThreadGroup {
    /// One handle per rank `0..size`, sharing a barrier.
    pub fn split(size: usize) -> Vec<ThreadGroup> {
        let barrier = Arc::new(Barrier::new(size.max(1)));
        (0..size).map(|rank| ThreadGroup { rank, size, barrier: Arc::clone(&barrier) }).collect()
    }
}

impl ProcessGroup for ThreadGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) -> CacheResult<()> {
        self.barrier.wait();
        Ok(())
    }
}
