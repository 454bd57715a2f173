//! Bounded parallel execution of generator tasks.
//!
//! A fixed pool of worker threads pulls tasks from a shared queue and reports
//! back over a channel. Results are returned in submission order. When a task
//! overruns the timeout it is reported as [`GenerationError::Timeout`], its
//! worker is retired once it returns, and a replacement worker keeps the
//! queue draining.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{GenerationError, GenerationResult};

type Work<T> = Box<dyn FnOnce() -> GenerationResult<T> + Send + 'static>;

/// One unit of work with the component name used in errors.
pub struct Task<T> {
    component: String,
    work: Work<T>,
}

impl<T> Task<T> {
    pub fn new<F>(component: impl Into<String>, work: F) -> Self
    where
        F: FnOnce() -> GenerationResult<T> + Send + 'static,
    {
        Self { component: component.into(), work: Box::new(work) }
    }

    pub fn component(&self) -> &str {
        &self.component
    }
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("component", &self.component).finish_non_exhaustive()
    }
}

enum Event<T> {
    Started(usize, Instant),
    Finished(usize, GenerationResult<T>),
}

struct Shared<T> {
    queue: Mutex<VecDeque<(usize, Task<T>)>>,
    /// Tasks already reported as timed out.
    abandoned: Mutex<HashSet<usize>>,
}

/// Runs tasks on at most `max_concurrency` threads.
#[derive(Debug, Clone)]
pub struct ParallelRunner {
    max_concurrency: usize,
    timeout: Option<Duration>,
}

impl Default for ParallelRunner {
    fn default() -> Self {
        Self { max_concurrency: num_cpus::get().max(1), timeout: None }
    }
}

impl ParallelRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Per-task time limit.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run every task and return one result per task, in order.
    pub fn run<T: Send + 'static>(&self, tasks: Vec<Task<T>>) -> Vec<GenerationResult<T>> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let components: Vec<String> = tasks.iter().map(|t| t.component.clone()).collect();
        let shared = Arc::new(Shared {
            queue: Mutex::new(tasks.into_iter().enumerate().collect()),
            abandoned: Mutex::new(HashSet::new()),
        });
        let (tx, rx) = mpsc::channel();

        let workers = self.max_concurrency.min(total);
        debug!(tasks = total, workers, "starting parallel run");
        for _ in 0..workers {
            spawn_worker(Arc::clone(&shared), tx.clone());
        }

        let mut results: Vec<Option<GenerationResult<T>>> = (0..total).map(|_| None).collect();
        let mut running: HashMap<usize, Instant> = HashMap::new();
        let mut remaining = total;

        while remaining > 0 {
            let deadline = self
                .timeout
                .and_then(|limit| running.values().map(|started| *started + limit).min());
            let event = match deadline {
                Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match event {
                Ok(Event::Started(idx, at)) => {
                    running.insert(idx, at);
                }
                Ok(Event::Finished(idx, result)) => {
                    if results[idx].is_none() {
                        running.remove(&idx);
                        results[idx] = Some(result);
                        remaining -= 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let Some(limit) = self.timeout else { continue };
                    let now = Instant::now();
                    let overdue: Vec<usize> = running
                        .iter()
                        .filter(|(_, started)| now.duration_since(**started) >= limit)
                        .map(|(idx, _)| *idx)
                        .collect();
                    for idx in overdue {
                        let elapsed = running.remove(&idx).map_or(limit, |s| now.duration_since(s));
                        warn!(
                            component = %components[idx],
                            elapsed_ms = elapsed.as_millis(),
                            "generator timed out"
                        );
                        shared.abandoned.lock().insert(idx);
                        results[idx] = Some(Err(GenerationError::Timeout {
                            component: components[idx].clone(),
                            elapsed_ms: elapsed.as_millis(),
                        }));
                        remaining -= 1;
                        spawn_worker(Arc::clone(&shared), tx.clone());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        results
            .into_iter()
            .zip(components)
            .map(|(result, component)| {
                result.unwrap_or_else(|| {
                    Err(GenerationError::generator_failed(component, "execution", "worker exited"))
                })
            })
            .collect()
    }
}

fn spawn_worker<T: Send + 'static>(shared: Arc<Shared<T>>, tx: Sender<Event<T>>) {
    thread::spawn(move || loop {
        let Some((idx, task)) = shared.queue.lock().pop_front() else {
            return;
        };
        if tx.send(Event::Started(idx, Instant::now())).is_err() {
            return;
        }

        let component = task.component;
        let result = panic::catch_unwind(AssertUnwindSafe(task.work)).unwrap_or_else(|_| {
            Err(GenerationError::generator_failed(component, "execution", "generator panicked"))
        });

        if tx.send(Event::Finished(idx, result)).is_err() {
            return;
        }
        // A replacement already took this worker's slot.
        if shared.abandoned.lock().contains(&idx) {
            return;
        }
    });
}
