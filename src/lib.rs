//! Fixed-size thread pool over a single shared FIFO task queue.
//!
//! # Features
//! - Submission of any `FnOnce` closure with a [`JoinHandle`] for its result
//! - Blocking, bounded, non-blocking and async retrieval of results
//! - Panics in tasks are captured per task and never take down a worker
//! - Graceful, idempotent shutdown that abandons tasks not yet started
//! - Busy/queue introspection and counters
//!
//! ```
//! use worker_pool::WorkerPool;
//!
//! let pool = WorkerPool::new(4);
//! let handle = pool.spawn(|| 6 * 7).unwrap();
//! assert_eq!(handle.wait(), Ok(42));
//! pool.shutdown();
//! ```

pub mod errors;
pub mod handle;
pub mod model;
pub mod pool;
pub mod result;

pub use errors::SpawnError;
pub use handle::JoinHandle;
pub use model::{PoolMetrics, PoolState};
pub use pool::{Config, WorkerPool};
pub use result::SpawnResult;
