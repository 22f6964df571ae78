use super::{
    errors::SpawnError,
    result::SpawnResult,
    handle::{
        self,
        Task,
        TaskOutcome,
        JoinHandle,
    },
    model::{
        PoolMetrics,
        PoolState,
    },
};
use std::{
    collections::VecDeque,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread,
    time::Duration,
};
use crossbeam::utils::CachePadded;
use tracing::{debug, trace, warn};


/// Worker pool configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub num_threads: usize,
    pub thread_name_prefix: String,
    pub stack_size: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self::cpu_bound()
    }
}

impl Config {
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            thread_name_prefix: "pool-worker".to_string(),
            stack_size: None,
        }
    }

    pub fn cpu_bound() -> Self {
        Self::new(num_cpus::get())
    }

    /// Oversubscribes the CPUs for tasks that mostly block.
    pub fn io_bound() -> Self {
        Self::new(num_cpus::get() * 2)
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }
}


struct Queue {
    tasks: VecDeque<Task>,
    state: PoolState,
    // workers that have not yet left `worker_loop`
    live_workers: usize,
}

struct Shared {
    queue: Mutex<Queue>,
    // signalled on push (one) and on stop (all)
    available: Condvar,
    // signalled when the pool drains, and when the last worker exits
    idle: Condvar,
    busy_threads: CachePadded<AtomicUsize>,
    total_spawned: CachePadded<AtomicUsize>,
    completed_tasks: CachePadded<AtomicUsize>,
    failed_tasks: CachePadded<AtomicUsize>,
    abandoned_tasks: CachePadded<AtomicUsize>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_idle(&self, queue: &Queue) -> bool {
        queue.tasks.is_empty() && self.busy_threads.load(Ordering::Acquire) == 0
    }

    fn run(&self, task: Task) {
        let _busy = BusyGuard(self);
        // The task catches panics from the user closure, but dropping a
        // result nobody waits for can still unwind here.
        let outcome = panic::catch_unwind(AssertUnwindSafe(task))
            .unwrap_or(TaskOutcome::Panicked);
        match outcome {
            TaskOutcome::Completed => self.completed_tasks.fetch_add(1, Ordering::Relaxed),
            TaskOutcome::Panicked => self.failed_tasks.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn worker_loop(&self, index: usize) {
        let _exit = ExitGuard(self);
        trace!(worker = index, "worker started");
        loop {
            let task = {
                let queue = self.lock();
                let mut queue = self
                    .available
                    .wait_while(queue, |q| q.state == PoolState::Running && q.tasks.is_empty())
                    .unwrap_or_else(PoisonError::into_inner);

                if queue.state != PoolState::Running {
                    break;
                }
                match queue.tasks.pop_front() {
                    Some(task) => {
                        self.busy_threads.fetch_add(1, Ordering::AcqRel);
                        task
                    }
                    None => continue,
                }
            };
            self.run(task);
        }
        trace!(worker = index, "worker stopped");
    }
}

/// Releases a busy slot after a task, even if the task unwound.
struct BusyGuard<'a>(&'a Shared);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.0.busy_threads.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Notify under the lock so a waiter between its check and its wait
            // cannot miss the wakeup.
            let _queue = self.0.lock();
            self.0.idle.notify_all();
        }
    }
}

/// Marks a worker as gone; the last one out moves the pool to `Stopped`.
struct ExitGuard<'a>(&'a Shared);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        let mut queue = self.0.lock();
        queue.live_workers -= 1;
        if queue.live_workers == 0 && queue.state != PoolState::Running {
            queue.state = PoolState::Stopped;
            debug!("worker pool stopped");
        }
        self.0.idle.notify_all();
    }
}


/// Fixed-size pool of OS threads consuming tasks from one shared FIFO queue.
///
/// The thread count never changes after construction. Dropping the pool
/// performs [`shutdown`](Self::shutdown).
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    worker_ids: Vec<thread::ThreadId>,
    num_threads: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}

impl WorkerPool {
    /// Creates a pool with `max(num_threads, 1)` workers.
    ///
    /// # Panics
    ///
    /// Panics if the OS fails to create a thread, like [`std::thread::spawn`].
    /// Use [`with_config`](Self::with_config) to handle that case.
    pub fn new(num_threads: usize) -> Self {
        match Self::with_config(Config::new(num_threads)) {
            Ok(pool) => pool,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn with_config(config: Config) -> SpawnResult<Self> {
        let num_threads = if config.num_threads == 0 {
            debug!("requested 0 worker threads, using 1");
            1
        } else {
            config.num_threads
        };

        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                tasks: VecDeque::new(),
                state: PoolState::Running,
                live_workers: 0,
            }),
            available: Condvar::new(),
            idle: Condvar::new(),
            busy_threads: CachePadded::new(AtomicUsize::new(0)),
            total_spawned: CachePadded::new(AtomicUsize::new(0)),
            completed_tasks: CachePadded::new(AtomicUsize::new(0)),
            failed_tasks: CachePadded::new(AtomicUsize::new(0)),
            abandoned_tasks: CachePadded::new(AtomicUsize::new(0)),
        });

        let mut pool = WorkerPool {
            shared,
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            worker_ids: Vec::with_capacity(num_threads),
            num_threads,
        };

        for index in 0..num_threads {
            let mut builder = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let shared = pool.shared.clone();
            pool.shared.lock().live_workers += 1;
            match builder.spawn(move || shared.worker_loop(index)) {
                Ok(worker) => {
                    pool.worker_ids.push(worker.thread().id());
                    pool.lock_workers().push(worker);
                }
                Err(err) => {
                    pool.shared.lock().live_workers -= 1;
                    // `pool` drops here and stops the workers already running.
                    return Err(SpawnError::ThreadSpawn(err.to_string()));
                }
            }
        }

        debug!(num_threads, "worker pool started");
        Ok(pool)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<thread::JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_tasks(&self, tasks: Vec<Task>) -> SpawnResult<()> {
        let count = tasks.len();
        {
            let mut queue = self.shared.lock();
            if queue.state != PoolState::Running {
                return Err(SpawnError::PoolStopped);
            }
            queue.tasks.extend(tasks);
            self.shared.total_spawned.fetch_add(count, Ordering::Relaxed);
        }

        if count >= self.num_threads {
            self.shared.available.notify_all();
        } else {
            for _ in 0..count {
                self.shared.available.notify_one();
            }
        }
        Ok(())
    }

    /// Queues `f` and returns a handle to its result.
    ///
    /// Arguments are bound by capturing them in the closure. Fails with
    /// [`SpawnError::PoolStopped`] once shutdown has been requested.
    pub fn spawn<F, R>(&self, f: F) -> SpawnResult<JoinHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (promise, handle) = handle::pair();
        let task: Task = Box::new(move || promise.complete_with(f));
        self.push_tasks(vec![task])?;
        Ok(handle)
    }

    /// Queues `f` without a result handle. A panic only shows up in
    /// [`PoolMetrics::failed_tasks`].
    pub fn execute<F>(&self, f: F) -> SpawnResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let task: Task = Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(()) => TaskOutcome::Completed,
                Err(_) => TaskOutcome::Panicked,
            }
        });
        self.push_tasks(vec![task])
    }

    /// Queues one task per item under a single lock acquisition. Handles are
    /// returned in item order; nothing is queued if the pool is stopped.
    pub fn spawn_batch<T, R, F, I>(&self, items: I, f: F) -> SpawnResult<Vec<JoinHandle<R>>>
    where
        I: IntoIterator<Item = T>,
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let (tasks, handles): (Vec<Task>, Vec<JoinHandle<R>>) = items
            .into_iter()
            .map(|item| {
                let f = Arc::clone(&f);
                let (promise, handle) = handle::pair();
                let task: Task = Box::new(move || promise.complete_with(move || f(item)));
                (task, handle)
            })
            .unzip();

        if tasks.is_empty() {
            return Ok(handles);
        }
        self.push_tasks(tasks)?;
        Ok(handles)
    }

    #[inline]
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Workers currently running a task. Advisory only.
    #[inline]
    pub fn busy_threads(&self) -> usize {
        self.shared.busy_threads.load(Ordering::Acquire)
    }

    /// Tasks waiting in the queue. Advisory only.
    pub fn queued_tasks(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    pub fn state(&self) -> PoolState {
        self.shared.lock().state
    }

    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            num_threads: self.num_threads,
            busy_threads: self.busy_threads(),
            queued_tasks: self.queued_tasks(),
            total_spawned: self.shared.total_spawned.load(Ordering::Relaxed),
            completed_tasks: self.shared.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.shared.failed_tasks.load(Ordering::Relaxed),
            abandoned_tasks: self.shared.abandoned_tasks.load(Ordering::Relaxed),
        }
    }

    /// Blocks until the queue is empty and no worker is busy, or the pool stops.
    pub fn join(&self) {
        let queue = self.shared.lock();
        let _queue = self
            .shared
            .idle
            .wait_while(queue, |q| q.state == PoolState::Running && !self.shared.is_idle(q))
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like [`join`](Self::join) with a deadline. Returns `true` if the pool
    /// went idle (or stopped) in time.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let queue = self.shared.lock();
        let (_queue, result) = self
            .shared
            .idle
            .wait_timeout_while(queue, timeout, |q| {
                q.state == PoolState::Running && !self.shared.is_idle(q)
            })
            .unwrap_or_else(PoisonError::into_inner);
        !result.timed_out()
    }

    /// Stops accepting tasks, abandons the ones still queued and joins every
    /// worker once its current task is done. Every caller, including
    /// concurrent and repeated ones, returns only after the pool is
    /// [`Stopped`](PoolState::Stopped).
    ///
    /// When called from one of this pool's own tasks, that worker is not
    /// joined and the call returns without waiting; the pool reaches
    /// `Stopped` once the task returns and the worker exits.
    pub fn shutdown(&self) {
        let abandoned = {
            let mut queue = self.shared.lock();
            if queue.state == PoolState::Running {
                queue.state = if queue.live_workers == 0 {
                    PoolState::Stopped
                } else {
                    PoolState::StopRequested
                };
                mem::take(&mut queue.tasks)
            } else {
                VecDeque::new()
            }
        };
        self.shared.available.notify_all();
        self.shared.idle.notify_all();

        if !abandoned.is_empty() {
            debug!(abandoned = abandoned.len(), "dropping queued tasks on shutdown");
            self.shared
                .abandoned_tasks
                .fetch_add(abandoned.len(), Ordering::Relaxed);
        }
        // Dropping the tasks drops their promises, resolving the handles.
        drop(abandoned);

        let workers = mem::take(&mut *self.lock_workers());
        let current = thread::current().id();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("worker thread panicked outside of a task");
            }
        }

        if self.worker_ids.contains(&current) {
            return;
        }
        // Another caller may still be joining; wait for the last worker to leave.
        let queue = self.shared.lock();
        let _queue = self
            .shared
            .idle
            .wait_while(queue, |q| q.state != PoolState::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
