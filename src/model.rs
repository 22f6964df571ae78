/// Lifecycle of a [`WorkerPool`](crate::pool::WorkerPool).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Running,
    /// New tasks are rejected, in-flight tasks finish, queued ones are abandoned.
    StopRequested,
    /// Every worker has left its loop. Workers skipped by a `shutdown` called
    /// from their own task are detached instead of joined, but they still
    /// exit before this state is reached.
    Stopped,
}

/// Point-in-time snapshot of pool counters. Values are read independently
/// and are not mutually consistent under load.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub num_threads: usize,
    pub busy_threads: usize,
    pub queued_tasks: usize,
    pub total_spawned: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub abandoned_tasks: usize,
}

impl PoolMetrics {
    pub fn idle_threads(&self) -> usize {
        self.num_threads.saturating_sub(self.busy_threads)
    }

    pub fn utilization(&self) -> f64 {
        if self.num_threads == 0 {
            return 0.0;
        }
        self.busy_threads.min(self.num_threads) as f64 / self.num_threads as f64
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.completed_tasks + self.failed_tasks;
        if total == 0 {
            return 1.0;
        }
        self.completed_tasks as f64 / total as f64
    }
}
