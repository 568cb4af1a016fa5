// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-cell work distribution
//!
//! With the `parallel` feature, cells are processed on a rayon pool. Results
//! always come back in cell order, so numbering does not depend on the
//! thread count.

use crate::error::FvmResult;
#[cfg(feature = "parallel")]
use crate::error::FvmError;
use cablesim_config::SystemConfig;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Default)]
pub struct ExecutionContext {
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
    parallel: bool,
}

impl ExecutionContext {
    /// Run everything on the calling thread
    pub fn serial() -> Self {
        Self::default()
    }

    /// A context with its own pool of `threads` workers; zero uses the
    /// global rayon pool
    #[cfg(feature = "parallel")]
    pub fn with_threads(threads: usize) -> FvmResult<Self> {
        let pool = if threads == 0 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| FvmError::ThreadPool(e.to_string()))?,
            )
        };
        debug!(target: "cablesim-fvm", "Execution context with {} threads", threads);
        Ok(Self {
            pool,
            parallel: true,
        })
    }

    #[cfg(not(feature = "parallel"))]
    pub fn with_threads(threads: usize) -> FvmResult<Self> {
        debug!(
            target: "cablesim-fvm",
            "Built without the parallel feature, ignoring {} threads",
            threads
        );
        Ok(Self::serial())
    }

    pub fn from_config(config: &SystemConfig) -> FvmResult<Self> {
        Self::with_threads(config.threads)
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Map `f` over `0..n`, collecting the results in index order
    pub fn map_cells<T, F>(&self, n: usize, f: F) -> FvmResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> FvmResult<T> + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        if self.parallel {
            let run = || (0..n).into_par_iter().map(&f).collect::<FvmResult<Vec<T>>>();
            return match &self.pool {
                Some(pool) => pool.install(run),
                None => run(),
            };
        }
        (0..n).map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FvmError;

    #[test]
    fn test_results_in_cell_order() {
        let serial = ExecutionContext::serial();
        let threaded = ExecutionContext::with_threads(3).unwrap();
        let square = |i: usize| Ok(i * i);
        assert_eq!(serial.map_cells(50, square).unwrap(), threaded.map_cells(50, square).unwrap());
    }

    #[test]
    fn test_first_error_surfaces() {
        let ctx = ExecutionContext::with_threads(0).unwrap();
        let result = ctx.map_cells(10, |i| {
            if i == 7 {
                Err(FvmError::NoSuchCell(i as u32))
            } else {
                Ok(i)
            }
        });
        assert_eq!(result, Err(FvmError::NoSuchCell(7)));
    }
}
