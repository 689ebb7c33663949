//! Background cache sweeper
//!
//! Runs registered sweep tasks (statement cache, plan cache) on a
//! dedicated thread at a fixed interval. Reclamation is best-effort:
//! correctness never depends on a sweep running, only on the caches'
//! reference semantics preventing unbounded retention. Shutdown is
//! cooperative: a flag plus a condvar wake, and the thread is joined.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

type SweepTask = Box<dyn Fn() + Send + Sync>;

struct Shared {
    tasks: Mutex<Vec<SweepTask>>,
    shutdown: Mutex<bool>,
    wake: Condvar,
}

pub struct CacheSweeper {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Starts the sweeper thread with the given sweep interval.
    pub fn new(interval: Duration) -> Self {
        let shared = Arc::new(Shared {
            tasks: Mutex::new(Vec::new()),
            shutdown: Mutex::new(false),
            wake: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let handle = std::thread::spawn(move || {
            loop {
                {
                    let mut shutdown = thread_shared.shutdown.lock();
                    if *shutdown {
                        break;
                    }
                    thread_shared.wake.wait_for(&mut shutdown, interval);
                    if *shutdown {
                        break;
                    }
                }
                tracing::debug!("running cache sweep");
                for task in thread_shared.tasks.lock().iter() {
                    task();
                }
            }
            tracing::debug!("cache sweeper stopped");
        });

        CacheSweeper {
            shared,
            handle: Some(handle),
        }
    }

    /// Registers a sweep task, run on every sweep cycle.
    pub fn register(&self, task: impl Fn() + Send + Sync + 'static) {
        self.shared.tasks.lock().push(Box::new(task));
    }

    /// Runs all sweep tasks immediately on the calling thread.
    pub fn sweep_now(&self) {
        for task in self.shared.tasks.lock().iter() {
            task();
        }
    }

    /// Stops the sweeper thread and joins it. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut shutdown = self.shared.shutdown.lock();
            if *shutdown && self.handle.is_none() {
                return;
            }
            *shutdown = true;
        }
        self.shared.wake.notify_all();
        if let Some(handle) = self.handle.take() {
            // The sweeper never needs to drain; losing a final sweep is
            // fine.
            let _ = handle.join();
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_registered_tasks() {
        let mut sweeper = CacheSweeper::new(Duration::from_millis(5));
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();
        sweeper.register(move || {
            task_count.fetch_add(1, Ordering::SeqCst);
        });

        // The background thread fires on its interval.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while count.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(count.load(Ordering::SeqCst) > 0);
        sweeper.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent_and_prompt() {
        let mut sweeper = CacheSweeper::new(Duration::from_secs(3600));
        let count = Arc::new(AtomicUsize::new(0));
        let task_count = count.clone();
        sweeper.register(move || {
            task_count.fetch_add(1, Ordering::SeqCst);
        });
        sweeper.sweep_now();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Despite the hour-long interval, shutdown wakes and joins the
        // thread immediately.
        let start = std::time::Instant::now();
        sweeper.shutdown();
        sweeper.shutdown();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn sweeps_the_statement_cache_end_to_end() {
        let parser = Arc::new(crate::parsing::CachingParser::new());
        let mut sweeper = CacheSweeper::new(Duration::from_secs(3600));
        let swept = parser.clone();
        sweeper.register(move || swept.sweep());

        let statement = parser.parse("SELECT * FROM student").unwrap();
        sweeper.sweep_now();
        assert_eq!(parser.len(), 1);
        drop(statement);
        sweeper.sweep_now();
        assert_eq!(parser.len(), 0);
        sweeper.shutdown();
    }
}
