// ============================================================================
// PARALLEL DISPATCH — row-band partitioning over an explicit worker pool
// ============================================================================
//
// A filter pass splits its destination into up to W contiguous row-bands,
// one task per band. Bands own disjoint row ranges of the destination and
// may read any pixel of the (read-only) source, so there is no data race by
// construction. Bands complete in any order; the first band error aborts the
// remaining bands' contribution and surfaces to the synchronous caller.
// ============================================================================

use std::ops::Range;

use image::RgbaImage;
use rayon::prelude::*;

use crate::error::FilterError;
use crate::progress::{NO_PROGRESS, ProgressTracker};

// ============================================================================
// BAND PARTITIONING
// ============================================================================

/// Partition rows [0, height) into up to `workers` contiguous bands.
/// The bands are pairwise disjoint and their union is exactly [0, height).
pub fn row_bands(height: usize, workers: usize) -> Vec<Range<usize>> {
    if height == 0 {
        return Vec::new();
    }
    let band = height.div_ceil(workers.max(1));
    (0..height)
        .step_by(band)
        .map(|start| start..(start + band).min(height))
        .collect()
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Handle to the worker pool a filter pass runs on.
///
/// `Dispatcher::new(n)` owns a dedicated pool of `n` threads; `new(1)` gives
/// deterministic sequential execution for tests. `Dispatcher::ambient()`
/// borrows the process-global pool.
pub struct Dispatcher {
    pool: Option<rayon::ThreadPool>,
    workers: usize,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Result<Self, FilterError> {
        let workers = workers.max(1);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(workers).build()?;
        Ok(Self {
            pool: Some(pool),
            workers,
        })
    }

    /// Use the process-global rayon pool.
    pub fn ambient() -> Self {
        Self {
            pool: None,
            workers: rayon::current_num_threads(),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` inside this dispatcher's pool.
    pub(crate) fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::ambient()
    }
}

// ============================================================================
// FILTER ENVIRONMENT
// ============================================================================

/// The runtime context a filter invocation executes under: where the work
/// runs, and who hears about its progress.
#[derive(Clone, Copy)]
pub struct FilterEnv<'a> {
    pub dispatcher: &'a Dispatcher,
    pub tracker: &'a dyn ProgressTracker,
}

impl<'a> FilterEnv<'a> {
    pub fn new(dispatcher: &'a Dispatcher, tracker: &'a dyn ProgressTracker) -> Self {
        Self {
            dispatcher,
            tracker,
        }
    }

    /// An environment without progress reporting.
    pub fn untracked(dispatcher: &'a Dispatcher) -> Self {
        Self {
            dispatcher,
            tracker: &NO_PROGRESS,
        }
    }
}

// ============================================================================
// BAND EXECUTION
// ============================================================================

/// Run `band_fn` over row-bands of a raw row-major buffer. `row_len` is the
/// number of elements per row; `band_fn` receives the band's starting row
/// and its rows as one mutable slice. One work unit is reported per
/// completed row.
pub fn run_bands_on<T, F>(
    buf: &mut [T],
    row_len: usize,
    env: &FilterEnv<'_>,
    band_fn: F,
) -> Result<(), FilterError>
where
    T: Send,
    F: Fn(usize, &mut [T]) -> Result<(), FilterError> + Sync,
{
    if row_len == 0 || buf.is_empty() {
        return Ok(());
    }
    let height = buf.len() / row_len;
    let rows_per_band = height.div_ceil(env.dispatcher.workers());
    let tracker = env.tracker;

    env.dispatcher.install(|| {
        buf.par_chunks_mut(rows_per_band * row_len)
            .enumerate()
            .try_for_each(|(band_index, band)| {
                band_fn(band_index * rows_per_band, band)?;
                tracker.units_done((band.len() / row_len) as u32);
                Ok(())
            })
    })
}

/// [`run_bands_on`] specialized to an RGBA destination image.
pub fn run_bands<F>(dest: &mut RgbaImage, env: &FilterEnv<'_>, band_fn: F) -> Result<(), FilterError>
where
    F: Fn(usize, &mut [u8]) -> Result<(), FilterError> + Sync,
{
    let stride = dest.width() as usize * 4;
    run_bands_on(dest.as_mut(), stride, env, band_fn)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::DebugTracker;

    #[test]
    fn bands_partition_exactly() {
        for height in 1..=40usize {
            for workers in 1..=9usize {
                let bands = row_bands(height, workers);
                assert!(bands.len() <= workers);
                let mut covered = vec![false; height];
                for band in &bands {
                    for y in band.clone() {
                        assert!(!covered[y], "row {y} covered twice (h={height}, w={workers})");
                        covered[y] = true;
                    }
                }
                assert!(covered.iter().all(|&c| c), "gap in partition (h={height}, w={workers})");
            }
        }
    }

    #[test]
    fn zero_height_has_no_bands() {
        assert!(row_bands(0, 4).is_empty());
    }

    #[test]
    fn run_bands_reports_one_unit_per_row() {
        let dispatcher = Dispatcher::new(3).unwrap();
        let tracker = DebugTracker::new(10);
        let env = FilterEnv::new(&dispatcher, &tracker);
        let mut dest = RgbaImage::new(4, 10);
        run_bands(&mut dest, &env, |_, _| Ok(())).unwrap();
        tracker.finished();
        assert_eq!(tracker.received(), 10);
    }

    #[test]
    fn run_bands_propagates_band_errors() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let mut dest = RgbaImage::new(4, 8);
        let result = run_bands(&mut dest, &env, |y_start, _| {
            if y_start >= 4 {
                Err(FilterError::InvalidGeometry {
                    width: 0,
                    height: 0,
                })
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn bands_fill_disjoint_rows() {
        let dispatcher = Dispatcher::new(4).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let mut dest = RgbaImage::new(2, 9);
        run_bands(&mut dest, &env, |y_start, band| {
            let stride = 2 * 4;
            for (dy, row) in band.chunks_mut(stride).enumerate() {
                row.fill((y_start + dy) as u8);
            }
            Ok(())
        })
        .unwrap();
        for y in 0..9 {
            assert_eq!(dest.get_pixel(0, y)[0], y as u8);
        }
    }
}
