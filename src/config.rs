//! Per-call kernel configuration and the elapsed-time wrapper.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Knobs every kernel reads. Passed explicitly into each call; nothing
/// here is process-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Worker threads in the shared-memory pool.
    pub threads: usize,
    /// Tile edge for the blocked, tiled, task and recursive kernels.
    pub block_size: usize,
    /// 0 = quiet, 1 = phase summaries, 2 = per-rank tracing.
    pub verbosity: u8,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            block_size: 4,
            verbosity: 0,
        }
    }
}

impl KernelConfig {
    pub fn new(threads: usize, block_size: usize) -> Self {
        Self {
            threads,
            block_size,
            ..Self::default()
        }
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::InvalidThreadCount);
        }
        if self.block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        Ok(())
    }

    /// Build a dedicated pool sized to `threads`.
    pub fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        self.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("mattrans-worker-{i}"))
            .build()?;
        Ok(pool)
    }
}

/// A kernel result plus the duration of its parallel or communication
/// window. Allocation and setup sit outside that window.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn new(value: T, elapsed: Duration) -> Self {
        Self { value, elapsed }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Timed<U> {
        Timed {
            value: f(self.value),
            elapsed: self.elapsed,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Run `f` and time it.
pub(crate) fn timed<T>(f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = f();
    Timed::new(value, start.elapsed())
}
