use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    time::{Duration, Instant},
};

/// Unit of work redispatched onto a consumption context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Execution context that runs jobs on behalf of background producers.
///
/// `dispatch` must not wait for the job to run.
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, job: Job);
}

/// Creates a queue whose jobs run on whichever thread drives the returned
/// [`MainLoop`], typically the thread that owns the display.
pub fn main_queue() -> (MainQueue, MainLoop) {
    let (sender, receiver) = mpsc::channel();
    (MainQueue { sender }, MainLoop { receiver })
}

/// Sending half of the main queue. Cheap to clone.
///
/// The queue is unbounded and `dispatch` never blocks. A consumer that stops
/// draining its [`MainLoop`] lets jobs pile up, each holding a full frame
/// when it comes from a [`RenderStepper`](crate::RenderStepper).
#[derive(Debug, Clone)]
pub struct MainQueue {
    sender: Sender<Job>,
}

impl Dispatcher for MainQueue {
    fn dispatch(&self, job: Job) {
        if self.sender.send(job).is_err() {
            tracing::trace!("main loop is gone, dropping job");
        }
    }
}

/// Receiving half of the main queue; runs jobs in the order they were
/// dispatched.
#[derive(Debug)]
pub struct MainLoop {
    receiver: Receiver<Job>,
}

impl MainLoop {
    /// Runs every job that is already queued and returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.receiver.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Runs jobs as they arrive until `duration` has elapsed.
    pub fn run_for(&self, duration: Duration) -> usize {
        self.run_until(Instant::now() + duration)
    }

    /// Runs jobs as they arrive until `deadline`, or until every
    /// [`MainQueue`] handle has been dropped.
    pub fn run_until(&self, deadline: Instant) -> usize {
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return ran + self.run_pending();
            }
            match self.receiver.recv_timeout(remaining) {
                Ok(job) => {
                    job();
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) => return ran,
                Err(RecvTimeoutError::Disconnected) => return ran,
            }
        }
    }

    /// Waits up to `timeout` for a single job and runs it.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(job) => {
                job();
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[test]
    fn runs_jobs_in_dispatch_order() {
        let (queue, main_loop) = main_queue();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for value in 0..3 {
            let seen = seen.clone();
            queue.dispatch(Box::new(move || seen.lock().unwrap().push(value)));
        }

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(main_loop.run_pending(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn run_until_returns_when_producers_are_gone() {
        let (queue, main_loop) = main_queue();
        let producer = std::thread::spawn(move || {
            queue.dispatch(Box::new(|| {}));
        });
        producer.join().unwrap();

        let ran = main_loop.run_for(Duration::from_secs(5));
        assert_eq!(ran, 1);
    }

    #[test]
    fn undrained_jobs_queue_up_without_blocking_the_producer() {
        let (queue, main_loop) = main_queue();
        let producer = std::thread::spawn(move || {
            for _ in 0..10_000 {
                queue.dispatch(Box::new(|| {}));
            }
        });
        producer.join().unwrap();

        assert_eq!(main_loop.run_pending(), 10_000);
    }

    #[test]
    fn dispatching_after_loop_drop_is_harmless() {
        let (queue, main_loop) = main_queue();
        drop(main_loop);
        queue.dispatch(Box::new(|| panic!("must not run")));
    }
}
