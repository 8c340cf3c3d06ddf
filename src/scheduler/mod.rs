//! Priority Scheduler
//!
//! Two-tier work queue: every High job runs before any Low job, jobs within a
//! tier run in submission order. A single drain loop executes them one at a
//! time until its stop channel fires.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, TryRecvError};
use parking_lot::Mutex;

/// A queued unit of work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => f.write_str("high"),
            Priority::Low => f.write_str("low"),
        }
    }
}

struct Queues {
    high: VecDeque<Job>,
    low: VecDeque<Job>,
}

pub struct PriorityScheduler {
    queues: Mutex<Queues>,
    /// Sleep between polls of an empty queue
    idle: Duration,
}

impl PriorityScheduler {
    pub fn new(idle: Duration) -> Self {
        Self {
            queues: Mutex::new(Queues {
                high: VecDeque::new(),
                low: VecDeque::new(),
            }),
            idle,
        }
    }

    pub fn enqueue<F>(&self, priority: Priority, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queues = self.queues.lock();
        match priority {
            Priority::High => queues.high.push_back(Box::new(action)),
            Priority::Low => queues.low.push_back(Box::new(action)),
        }
    }

    /// Next job: oldest High, else oldest Low
    pub fn dequeue(&self) -> Option<Job> {
        let mut queues = self.queues.lock();
        queues.high.pop_front().or_else(|| queues.low.pop_front())
    }

    pub fn len(&self) -> usize {
        let queues = self.queues.lock();
        queues.high.len() + queues.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain jobs until `stop` receives a message or is disconnected
    ///
    /// The stop signal is checked once per iteration, so a running job always
    /// completes. A panicking job is logged and the loop carries on.
    pub fn run(&self, stop: &Receiver<()>) {
        tracing::debug!("Scheduler drain loop started");

        loop {
            match stop.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }

            match self.dequeue() {
                Some(job) => {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        tracing::error!("Scheduled job panicked");
                    }
                }
                None => {
                    channel::select! {
                        recv(stop) -> _ => break,
                        default(self.idle) => {}
                    }
                }
            }
        }

        tracing::debug!(remaining = self.len(), "Scheduler drain loop stopped");
    }
}
