//! Symmetry check with cooperative early exit.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::config::{KernelConfig, Timed, timed};
use crate::error::Result;
use crate::matrix::Matrix;

/// Shared "mismatch found" flag.
///
/// Only ever goes from `false` to `true`. Any worker may raise it, several
/// may race to do so, and a reader may briefly see a stale `false`. None
/// of that changes the verdict, so plain relaxed loads and stores are
/// enough; there is no lock on the hot path.
#[derive(Debug, Default)]
pub struct MismatchFlag(AtomicBool);

impl MismatchFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Terminal state of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Symmetric,
    Asymmetric,
}

/// Multi-threaded symmetry check.
///
/// Workers scan disjoint row ranges of the lower triangle. The first one
/// to hit `m[i][j] != m[j][i]` raises the shared flag and bails out of
/// the parallel loop; everyone else polls the flag once per element and
/// stops as soon as they see it. The answer is the AND of what every
/// worker found, which is just `!flag`, regardless of which worker saw
/// the mismatch first.
pub fn is_symmetric_mt(m: &Matrix, cfg: &KernelConfig) -> Result<Timed<bool>> {
    let pool = cfg.thread_pool()?;
    let flag = MismatchFlag::new();
    let t = pool.install(|| timed(|| scan(m, &flag)));
    Ok(t.map(|state| state == ScanState::Symmetric))
}

fn scan(m: &Matrix, flag: &MismatchFlag) -> ScanState {
    let n = m.dim();
    let data = m.as_slice();

    // Err(()) stops rayon from handing out any further rows.
    let _ = (0..n).into_par_iter().try_for_each(|i| {
        for j in 0..i {
            if flag.is_raised() {
                return Err(());
            }
            if data[i * n + j] != data[j * n + i] {
                flag.raise();
                return Err(());
            }
        }
        Ok(())
    });

    if flag.is_raised() {
        ScanState::Asymmetric
    } else {
        ScanState::Symmetric
    }
}
