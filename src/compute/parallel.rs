//! Bounded frame worker pool.
//!
//! Native builds run a dedicated rayon pool; wasm32 has no threads and runs
//! the same closures inline.

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// Pool construction failure.
#[derive(Debug, thiserror::Error)]
#[error("Failed to build worker pool: {0}")]
pub struct PoolError(String);

/// Fixed-size pool for per-frame work.
#[derive(Debug)]
pub struct WorkerPool {
    #[cfg(not(target_arch = "wasm32"))]
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Pool with `threads` workers; 0 uses every available core.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn new(threads: usize) -> Result<Self, PoolError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("gif-cube-worker-{i}"))
            .build()
            .map_err(|e| PoolError(e.to_string()))?;
        Ok(Self { pool })
    }

    #[cfg(target_arch = "wasm32")]
    pub fn new(_threads: usize) -> Result<Self, PoolError> {
        Ok(Self {})
    }

    /// Number of workers.
    pub fn threads(&self) -> usize {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.pool.current_num_threads()
        }
        #[cfg(target_arch = "wasm32")]
        {
            1
        }
    }

    /// Run `op` inside the pool so nested parallel iterators use its workers.
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.pool.install(op)
        }
        #[cfg(target_arch = "wasm32")]
        {
            op()
        }
    }

    /// Pull items from `items` and run `f` on each as its own task.
    ///
    /// Items are spawned as soon as the iterator yields them, so a channel
    /// receiver can feed work while earlier items are still processing.
    /// Returns once every task has finished.
    pub fn for_each_spawned<I, F>(&self, items: I, f: F)
    where
        I: IntoIterator,
        I::IntoIter: Send,
        I::Item: Send,
        F: Fn(I::Item) + Sync,
    {
        let items = items.into_iter();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let f = &f;
            self.pool.scope(move |s| {
                for item in items {
                    s.spawn(move |_| f(item));
                }
            });
        }

        #[cfg(target_arch = "wasm32")]
        {
            items.for_each(f);
        }
    }

    /// Apply `f` to every element, preserving order.
    pub fn map_ordered<T, U, F>(&self, input: Vec<T>, f: F) -> Vec<U>
    where
        T: Send,
        U: Send,
        F: Fn(usize, T) -> U + Sync + Send,
    {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.pool.install(|| {
                input
                    .into_par_iter()
                    .enumerate()
                    .map(|(i, t)| f(i, t))
                    .collect()
            })
        }

        #[cfg(target_arch = "wasm32")]
        {
            input.into_iter().enumerate().map(|(i, t)| f(i, t)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_for_each_visits_everything() {
        let pool = WorkerPool::new(3).unwrap();
        let sum = AtomicUsize::new(0);
        pool.for_each_spawned(1..=100usize, |i| {
            sum.fetch_add(i, Ordering::Relaxed);
        });
        assert_eq!(sum.load(Ordering::Relaxed), 5050);
    }

    #[test]
    fn test_for_each_from_channel() {
        let pool = WorkerPool::new(2).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let producer = std::thread::spawn(move || {
            for i in 0..20u32 {
                tx.send(i).unwrap();
            }
        });
        let seen = Mutex::new(Vec::new());
        pool.for_each_spawned(rx, |i| seen.lock().unwrap().push(i));
        producer.join().unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_map_ordered_keeps_positions() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.threads() >= 1);
        let out = pool.map_ordered((0..50u32).collect(), |i, v| (i as u32) * 10 + v);
        assert_eq!(out, (0..50u32).map(|v| v * 11).collect::<Vec<_>>());
    }
}
