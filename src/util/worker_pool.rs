use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::{Registration, Signal, WorkStack};
use crate::log;

/// Function executing one job on a worker thread
pub(crate) type JobFn<J> = Arc<dyn Fn(J) + Send + Sync>;

/// Fixed set of worker threads fed by a controller thread.
///
/// Submitted jobs go onto a shared LIFO. The controller hands the most
/// recent job to the first idle worker; without an idle worker the job goes
/// back onto the stack until a worker reports idle again.
pub(crate) struct WorkerPool<J: Send + 'static> {
    sharing: Arc<Sharing<J>>,
    threads: Vec<JoinHandle<()>>,
}

struct Sharing<J> {
    // pending jobs, newest on top
    queue: WorkStack<J>,

    // raised on submit and whenever a worker turns idle
    controller: Signal,

    workers: Vec<Worker<J>>,

    // flag to decide to run or exit
    run: AtomicBool,

    // number of worker threads running
    threads_total: AtomicUsize,

    // number of workers executing a job
    threads_busy: AtomicUsize,
}

struct Worker<J> {
    slot: Mutex<JobSlot<J>>,
    signal: Signal,
}

struct JobSlot<J> {
    busy: bool,
    job: Option<J>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Starts `size` workers and the controller
    pub(crate) fn new(size: usize, job_fn: JobFn<J>) -> io::Result<Self> {
        let size = size.max(1);
        let sharing = Arc::new(Sharing {
            queue: WorkStack::new(),
            controller: Signal::new(),
            workers: (0..size)
                .map(|_| Worker {
                    slot: Mutex::new(JobSlot {
                        busy: false,
                        job: None,
                    }),
                    signal: Signal::new(),
                })
                .collect(),
            run: AtomicBool::new(true),
            threads_total: AtomicUsize::new(0),
            threads_busy: AtomicUsize::new(0),
        });

        let mut pool = Self {
            sharing,
            threads: Vec::with_capacity(size + 1),
        };

        for id in 0..size {
            let sharing = Arc::clone(&pool.sharing);
            let job_fn = Arc::clone(&job_fn);
            let spawned = thread::Builder::new()
                .name(format!("srv-worker-{id}"))
                .spawn(move || worker_thread(&sharing, id, &*job_fn));
            pool.push_thread(spawned)?;
        }

        let sharing = Arc::clone(&pool.sharing);
        let spawned = thread::Builder::new()
            .name("srv-controller".into())
            .spawn(move || controller_thread(&sharing));
        pool.push_thread(spawned)?;

        Ok(pool)
    }

    fn push_thread(&mut self, spawned: io::Result<JoinHandle<()>>) -> io::Result<()> {
        match spawned {
            Ok(handle) => {
                self.threads.push(handle);
                Ok(())
            }
            Err(err) => {
                log::error!("worker pool thread spawn failed: {err}");
                self.shutdown();
                Err(err)
            }
        }
    }

    /// Queues `job` and signals the controller
    pub(crate) fn submit(&self, job: J) {
        self.sharing.queue.push(job);
        self.sharing.controller.raise();
    }

    /// Number of worker threads running
    pub(crate) fn threads_total(&self) -> usize {
        self.sharing.threads_total.load(Ordering::Acquire)
    }

    /// Number of workers executing a job
    pub(crate) fn threads_busy(&self) -> usize {
        self.sharing.threads_busy.load(Ordering::Acquire)
    }

    /// Stops the controller and the workers and waits for them.
    /// Jobs still queued are dropped.
    pub(crate) fn shutdown(&mut self) {
        self.sharing.run.store(false, Ordering::Release);
        self.sharing.controller.raise();
        for worker in &self.sharing.workers {
            worker.signal.raise();
        }

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("worker pool thread panicked");
            }
        }

        drop(self.sharing.queue.drain());
    }
}

impl<J: Send + 'static> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<J: Send + 'static> std::fmt::Debug for WorkerPool<J> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.sharing.workers.len())
            .field("running", &self.threads_total())
            .field("busy", &self.threads_busy())
            .field("pending", &self.sharing.queue.len())
            .finish_non_exhaustive()
    }
}

fn controller_thread<J>(sharing: &Sharing<J>) {
    log::debug!("running controller thread");

    while sharing.run.load(Ordering::Acquire) {
        sharing.controller.wait();

        while let Some(job) = sharing.queue.pop() {
            if !sharing.run.load(Ordering::Acquire) {
                break;
            }
            if let Err(job) = assign(sharing, job) {
                // all busy, retried when a worker turns idle
                sharing.queue.push(job);
                break;
            }
        }
    }

    log::debug!("controller thread stopped");
}

/// Gives `job` to the first idle worker
fn assign<J>(sharing: &Sharing<J>, job: J) -> Result<(), J> {
    for worker in &sharing.workers {
        let mut slot = worker.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if !slot.busy {
            slot.busy = true;
            slot.job = Some(job);
            drop(slot);
            worker.signal.raise();
            return Ok(());
        }
    }
    Err(job)
}

fn worker_thread<J>(sharing: &Sharing<J>, id: usize, job_fn: &(dyn Fn(J) + Send + Sync)) {
    let _active_guard = Registration::new(&sharing.threads_total);
    let worker = &sharing.workers[id];
    log::debug!("running worker thread [{id}]");

    while sharing.run.load(Ordering::Acquire) {
        worker.signal.wait();

        let job = worker
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .job
            .take();

        if let Some(job) = job {
            let _busy_guard = Registration::new(&sharing.threads_busy);
            job_fn(job);
        }

        worker
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .busy = false;
        sharing.controller.raise();
    }

    log::debug!("worker thread [{id}] stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use super::WorkerPool;

    fn wait_for<F: Fn() -> bool>(cond: F) {
        let now = Instant::now();
        while !cond() {
            assert!(now.elapsed() < Duration::from_secs(5), "timed out");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn worker_pool_constructor_test() {
        let pool = WorkerPool::<()>::new(4, Arc::new(|()| {})).unwrap();
        wait_for(|| pool.threads_total() == 4);
        assert_eq!(pool.threads_busy(), 0);
    }

    #[test]
    fn worker_pool_shutdown_test() {
        let mut pool = WorkerPool::<()>::new(3, Arc::new(|()| {})).unwrap();
        wait_for(|| pool.threads_total() == 3);
        pool.shutdown();
        assert_eq!(pool.threads_total(), 0);
    }

    #[test]
    fn worker_pool_runs_all_jobs_test() {
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        let pool = WorkerPool::new(
            4,
            Arc::new(move |millis: u64| {
                thread::sleep(Duration::from_millis(millis));
                let _ = counter.fetch_add(1, Ordering::AcqRel);
            }),
        )
        .unwrap();

        for n in 0..50 {
            pool.submit(n % 5);
        }

        wait_for(|| done.load(Ordering::Acquire) == 50);
        wait_for(|| pool.threads_busy() == 0);
    }

    #[test]
    fn worker_pool_parallel_test() {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let pool = WorkerPool::new(
            4,
            Arc::new(move |n: usize| {
                thread::sleep(Duration::from_millis(200));
                tx.lock().unwrap().send(n).unwrap();
            }),
        )
        .unwrap();

        let now = Instant::now();
        for n in 0..4 {
            pool.submit(n);
        }
        let mut got: Vec<usize> = (0..4).map(|_| rx.recv().unwrap()).collect();
        got.sort_unstable();

        assert_eq!(got, vec![0, 1, 2, 3]);
        assert!(now.elapsed() < Duration::from_millis(700), "{:?}", now.elapsed());
    }

    #[test]
    fn worker_pool_lifo_test() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (order_tx, order_rx) = mpsc::channel();
        let started_tx = Mutex::new(started_tx);
        let release_rx = Mutex::new(release_rx);
        let order_tx = Mutex::new(order_tx);

        let pool = WorkerPool::new(
            1,
            Arc::new(move |n: usize| {
                if n == 0 {
                    started_tx.lock().unwrap().send(()).unwrap();
                    release_rx.lock().unwrap().recv().unwrap();
                } else {
                    order_tx.lock().unwrap().send(n).unwrap();
                }
            }),
        )
        .unwrap();

        pool.submit(0);
        started_rx.recv().unwrap();
        for n in 1..=3 {
            pool.submit(n);
        }
        thread::sleep(Duration::from_millis(50));
        release_tx.send(()).unwrap();

        let order: Vec<usize> = (0..3).map(|_| order_rx.recv().unwrap()).collect();
        assert_eq!(order, vec![3, 2, 1]);
    }
}
