#[cfg(test)]
mod tests {
    use worker_pool::{
    errors::SpawnError,
    pool::{
        Config,
        WorkerPool,
        },
    };
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    fn measure<F, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = Instant::now();
        let result = f();
        println!("✓ {}: {:?}", name, start.elapsed());
        result
    }

    #[test]
    fn load_test_1_each_task_runs_exactly_once() {
        println!("\n=== LOAD TEST 1: 10k tasks, exactly-once execution ===");
        let pool = WorkerPool::with_config(Config::cpu_bound()).unwrap();
        let counters: Arc<Vec<AtomicUsize>> =
            Arc::new((0..10_000).map(|_| AtomicUsize::new(0)).collect());

        let handles: Vec<_> = measure("10k tiny tasks", || {
            (0..10_000)
                .map(|i| {
                    let counters = Arc::clone(&counters);
                    pool.spawn(move || counters[i].fetch_add(1, Ordering::SeqCst))
                        .unwrap()
                })
                .collect()
        });

        for handle in handles {
            handle.wait().unwrap();
        }
        assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn load_test_2_concurrent_producers() {
        println!("\n=== LOAD TEST 2: 4 producers x 2500 tasks ===");
        let pool = WorkerPool::new(4);
        let executed = Arc::new(AtomicUsize::new(0));

        measure("concurrent submission", || {
            crossbeam::scope(|s| {
                for _ in 0..4 {
                    let pool = &pool;
                    let executed = Arc::clone(&executed);
                    s.spawn(move |_| {
                        for _ in 0..2_500 {
                            let executed = Arc::clone(&executed);
                            pool.execute(move || {
                                executed.fetch_add(1, Ordering::Relaxed);
                            })
                            .unwrap();
                        }
                    });
                }
            })
            .unwrap();
            pool.join();
        });

        assert_eq!(executed.load(Ordering::Relaxed), 10_000);
        let metrics = pool.metrics();
        assert_eq!(metrics.total_spawned, 10_000);
        assert_eq!(metrics.completed_tasks, 10_000);
        println!("  success rate: {:.1}%", metrics.success_rate() * 100.0);
    }

    #[test]
    fn load_test_3_shutdown_under_load() {
        println!("\n=== LOAD TEST 3: shutdown while tasks are queued ===");
        let pool = WorkerPool::new(4);
        let executed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2_000)
            .map(|_| {
                let executed = Arc::clone(&executed);
                pool.spawn(move || {
                    thread::sleep(Duration::from_micros(200));
                    executed.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        measure("shutdown", || pool.shutdown());

        let mut finished = 0;
        let mut abandoned = 0;
        for handle in handles {
            match handle.wait() {
                Ok(()) => finished += 1,
                Err(SpawnError::Abandoned) => abandoned += 1,
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }

        println!("  finished: {}, abandoned: {}", finished, abandoned);
        assert_eq!(finished + abandoned, 2_000);
        assert_eq!(finished, executed.load(Ordering::SeqCst));
        assert_eq!(abandoned, pool.metrics().abandoned_tasks);
    }

    #[test]
    fn load_test_4_blocking_tasks_use_all_workers() {
        println!("\n=== LOAD TEST 4: 64 blocking tasks on 8 threads ===");
        let pool = WorkerPool::with_config(Config::new(8)).unwrap();

        let handles = measure("64 x 10ms", || {
            pool.spawn_batch(0..64u32, |i| {
                thread::sleep(Duration::from_millis(10));
                i
            })
            .unwrap()
        });

        let start = Instant::now();
        let total: u32 = handles.into_iter().map(|h| h.wait().unwrap()).sum();
        assert_eq!(total, (0..64).sum());
        // 8 rounds of 10ms; serial execution would need 640ms
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
