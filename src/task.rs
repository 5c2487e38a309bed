use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::EngineError;

/// How often cancellable sleeps check their token.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default time a stopping task gets to notice its token.
pub const STOP_GRACE: Duration = Duration::from_millis(500);

/// Cooperative cancellation flag shared between a task and its owner.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in [POLL_INTERVAL] slices. Returns `false` as
    /// soon as the token is cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    Joined,
    /// The task ignored its token past the grace period and was detached.
    Abandoned,
}

/// A named background thread paired with its cancellation token.
pub struct Worker {
    name: String,
    handle: Option<thread::JoinHandle<()>>,
    token: CancelToken,
}

impl Worker {
    pub fn spawn<F>(name: &str, task: F) -> Result<Worker, EngineError>
    where
        F: FnOnce(CancelToken) + Send + 'static,
    {
        let token = CancelToken::new();
        let task_token = token.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || task(task_token))
            .map_err(|e| EngineError::Task {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Started {name} task");
        Ok(Worker {
            name: name.to_string(),
            handle: Some(handle),
            token,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Cancel the task and wait up to `grace` for it to exit.
    ///
    /// Threads cannot be killed safely, so a task that outlives the grace
    /// period is detached and left to exit at its next token check. Any
    /// state it still holds must be treated as inconsistent.
    pub fn stop(mut self, grace: Duration) -> StopOutcome {
        self.token.cancel();
        let Some(handle) = self.handle.take() else {
            return StopOutcome::Joined;
        };

        let deadline = Instant::now() + grace;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(POLL_INTERVAL);
        }

        if handle.is_finished() {
            if handle.join().is_err() {
                warn!("{} task panicked", self.name);
            }
            debug!("Stopped {} task", self.name);
            StopOutcome::Joined
        } else {
            warn!(
                "{} task did not stop within {}ms, detaching it",
                self.name,
                grace.as_millis()
            );
            StopOutcome::Abandoned
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_worker_stops_cooperatively() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let worker = Worker::spawn("ticker", move |token| {
            while token.sleep(Duration::from_millis(5)) {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(worker.is_running());
        assert_eq!(worker.stop(STOP_GRACE), StopOutcome::Joined);
        let seen = ticks.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_stubborn_worker_is_abandoned() {
        let worker = Worker::spawn("stubborn", |_token| {
            thread::sleep(Duration::from_millis(300));
        })
        .unwrap();
        assert_eq!(
            worker.stop(Duration::from_millis(20)),
            StopOutcome::Abandoned
        );
    }

    #[test]
    fn test_cancelled_sleep_returns_early() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(5)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
