use worker_pool::{Config, WorkerPool};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;


fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let pool = match WorkerPool::with_config(Config::cpu_bound().with_thread_name_prefix("demo")) {
        Ok(pool) => pool,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    let now = Instant::now();
    let handles = match pool.spawn_batch(0..1_000u64, |i| i * i) {
        Ok(handles) => handles,
        Err(err) => {
            error!("{err}");
            return;
        }
    };

    let sum: u64 = handles
        .into_iter()
        .filter_map(|handle| handle.wait().ok())
        .sum();

    pool.shutdown();
    let metrics = pool.metrics();
    info!(
        sum,
        threads = metrics.num_threads,
        completed = metrics.completed_tasks,
        elapsed = ?now.elapsed(),
        "sum of squares"
    );
}
