pub mod pool;

pub use pool::{ResultCallback, WorkerPool, WorkerPoolBuilder, DEFAULT_WORKERS};
