// parallel.rs - Optional data parallelism for per-element passes

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Evaluate `f` for every index in `0..count`, collecting results in index order
#[cfg(feature = "parallel")]
pub fn map_indexed<T, F>(count: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> T + Send + Sync,
    T: Send,
{
    (0..count).into_par_iter().map(f).collect()
}

/// Evaluate `f` for every index in `0..count`, collecting results in index order
#[cfg(not(feature = "parallel"))]
pub fn map_indexed<T, F>(count: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> T,
{
    (0..count).map(f).collect()
}

/// Number of worker threads the passes run on
pub fn worker_count() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}
