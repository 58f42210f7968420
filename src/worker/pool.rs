use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{IrDataError, Result};

pub const DEFAULT_WORKERS: usize = 1;

/// Receives `(index in the submitted batch, task outcome)` once per job.
pub type ResultCallback<O, E> = Box<dyn FnMut(usize, std::result::Result<O, E>) + Send>;

type JobQueue<I> = Arc<Mutex<mpsc::Receiver<(usize, I)>>>;

/// Runs one async task over a batch of inputs on a fixed number of workers.
///
/// Callbacks fire on the task calling [`WorkerPool::process`], in completion order.
/// With a single worker that is the input order.
pub struct WorkerPool<I, O, E, T> {
    task: Arc<T>,
    workers: usize,
    callback: Option<ResultCallback<O, E>>,
    cancel: Option<CancellationToken>,
    _jobs: PhantomData<fn(I)>,
}

pub struct WorkerPoolBuilder<I, O, E, T> {
    task: T,
    workers: usize,
    callback: Option<ResultCallback<O, E>>,
    cancel: Option<CancellationToken>,
    _jobs: PhantomData<fn(I)>,
}

impl<I, O, E, T> WorkerPoolBuilder<I, O, E, T> {
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn on_result<F>(mut self, callback: F) -> Self
    where
        F: FnMut(usize, std::result::Result<O, E>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// No new jobs are dispatched once `token` is cancelled.
    pub fn cancellation(mut self, token: &CancellationToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    pub fn build(self) -> Result<WorkerPool<I, O, E, T>> {
        if self.workers == 0 {
            return Err(IrDataError::InvalidWorkerCount);
        }
        Ok(WorkerPool {
            task: Arc::new(self.task),
            workers: self.workers,
            callback: self.callback,
            cancel: self.cancel,
            _jobs: PhantomData,
        })
    }
}

impl<I, O, E, T, Fut> WorkerPool<I, O, E, T>
where
    I: Send + 'static,
    O: Send + 'static,
    E: Send + 'static,
    T: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
{
    pub fn builder(task: T) -> WorkerPoolBuilder<I, O, E, T> {
        WorkerPoolBuilder {
            task,
            workers: DEFAULT_WORKERS,
            callback: None,
            cancel: None,
            _jobs: PhantomData,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every input through the task and returns once all dispatched jobs have reported.
    ///
    /// Returns the number of reported jobs, i.e. the number of callback invocations.
    /// A panicking task is resumed here after the remaining jobs have finished.
    pub async fn process(&mut self, inputs: Vec<I>) -> usize {
        let total = inputs.len();
        let cancel = self.cancel.clone().unwrap_or_default();
        let (job_tx, job_rx) = mpsc::channel(self.workers);
        let job_rx: JobQueue<I> = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();

        let feeder = tokio::spawn(feed(inputs, job_tx, cancel.clone()));
        let workers: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|id| {
                tokio::spawn(work(
                    id,
                    self.task.clone(),
                    job_rx.clone(),
                    result_tx.clone(),
                    cancel.clone(),
                ))
            })
            .collect();
        drop(job_rx);
        drop(result_tx);

        let mut reported = 0;
        while let Some((index, outcome)) = result_rx.recv().await {
            reported += 1;
            if let Some(callback) = self.callback.as_mut() {
                callback(index, outcome);
            }
        }

        for handle in std::iter::once(feeder).chain(workers) {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
            }
        }
        debug!(total, reported, "batch finished");
        reported
    }
}

async fn feed<I>(inputs: Vec<I>, jobs: mpsc::Sender<(usize, I)>, cancel: CancellationToken) {
    for job in inputs.into_iter().enumerate() {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("batch cancelled, no more jobs dispatched");
                break;
            }
            sent = jobs.send(job) => if sent.is_err() {
                // every worker is gone
                break;
            },
        }
    }
}

async fn work<I, O, E, T, Fut>(
    id: usize,
    task: Arc<T>,
    jobs: JobQueue<I>,
    results: mpsc::UnboundedSender<(usize, std::result::Result<O, E>)>,
    cancel: CancellationToken,
) where
    T: Fn(I) -> Fut,
    Fut: Future<Output = std::result::Result<O, E>>,
{
    loop {
        let job = jobs.lock().await.recv().await;
        let Some((index, input)) = job else { break };
        if cancel.is_cancelled() {
            break;
        }
        trace!(worker = id, index, "job started");
        let outcome = task(input).await;
        if results.send((index, outcome)).is_err() {
            break;
        }
    }
    trace!(worker = id, "worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{sleep, Duration};

    type Seen = Arc<std::sync::Mutex<Vec<(usize, std::result::Result<u64, String>)>>>;

    fn collector() -> (Seen, impl FnMut(usize, std::result::Result<u64, String>) + Send + 'static) {
        let seen: Seen = Arc::default();
        let sink = seen.clone();
        (seen, move |i, r| sink.lock().unwrap().push((i, r)))
    }

    #[test]
    fn zero_workers_are_rejected() {
        let built = WorkerPool::builder(|n: u64| async move { Ok::<u64, String>(n) })
            .workers(0)
            .build();
        assert!(matches!(built, Err(IrDataError::InvalidWorkerCount)));
    }

    #[tokio::test]
    async fn single_worker_reports_in_input_order() {
        let (seen, callback) = collector();
        let mut pool = WorkerPool::builder(|n: u64| async move {
            // later inputs finish faster; order must still hold
            sleep(Duration::from_millis(30 - n * 5)).await;
            Ok::<u64, String>(n * 10)
        })
        .on_result(callback)
        .build()
        .unwrap();
        assert_eq!(pool.workers(), DEFAULT_WORKERS);

        assert_eq!(pool.process(vec![0, 1, 2, 3, 4]).await, 5);
        let seen = seen.lock().unwrap();
        let indices: Vec<usize> = seen.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(seen[3].1, Ok(30));
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_worker_count() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (running.clone(), peak.clone());
        let (seen, callback) = collector();
        let mut pool = WorkerPool::builder(move |n: u64| {
            let (running, peak) = (r.clone(), p.clone());
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<u64, String>(n)
            }
        })
        .workers(3)
        .on_result(callback)
        .build()
        .unwrap();

        assert_eq!(pool.process((0..12).collect()).await, 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);

        let mut indices: Vec<usize> = seen.lock().unwrap().iter().map(|(i, _)| *i).collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_batch() {
        let (seen, callback) = collector();
        let mut pool = WorkerPool::builder(|n: u64| async move {
            if n % 2 == 1 { Err(format!("odd {n}")) } else { Ok(n) }
        })
        .workers(2)
        .on_result(callback)
        .build()
        .unwrap();

        assert_eq!(pool.process((0..6).collect()).await, 6);
        let seen = seen.lock().unwrap();
        let failed = seen.iter().filter(|(_, r)| r.is_err()).count();
        assert_eq!(failed, 3);
        assert!(seen.contains(&(5, Err("odd 5".to_owned()))));
    }

    #[tokio::test]
    async fn pool_is_reusable_and_works_without_callback() {
        let mut pool = WorkerPool::builder(|n: u64| async move { Ok::<u64, String>(n) })
            .workers(4)
            .build()
            .unwrap();
        assert_eq!(pool.process(vec![1, 2, 3]).await, 3);
        assert_eq!(pool.process(Vec::new()).await, 0);
    }

    #[tokio::test]
    async fn cancelled_pool_dispatches_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let mut pool = WorkerPool::builder(move |n: u64| {
            c.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<u64, String>(n) }
        })
        .workers(2)
        .cancellation(&token)
        .build()
        .unwrap();

        assert_eq!(pool.process((0..10).collect()).await, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "task blew up")]
    async fn task_panic_reaches_the_caller() {
        let mut pool = WorkerPool::builder(|n: u64| async move {
            if n == 2 {
                panic!("task blew up");
            }
            Ok::<u64, String>(n)
        })
        .build()
        .unwrap();
        pool.process(vec![1, 2, 3]).await;
    }
}
