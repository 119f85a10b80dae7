//! Background work whose results come back to the frame thread as events

use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::warn;

use crate::events::Event;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Body(#[from] std::io::Error),
}

/// Blocking HTTP GET used by `game:httpget`
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> Result<String, HttpError>;
}

/// [`HttpClient`] backed by `ureq`
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new(),
        }
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str) -> Result<String, HttpError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| HttpError::Request(err.to_string()))?;
        Ok(response.into_string()?)
    }
}

/// Where background jobs run
#[derive(Debug, Clone, Default)]
pub enum TaskMode {
    /// Blocking pool of a tokio runtime
    Tokio(Handle),
    /// A fresh OS thread per job
    #[default]
    Thread,
    /// On the calling thread, the result still waits for the next drain
    Inline,
}

/// Counts a job as pending until dropped, even if the job panics
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs jobs off the frame and queues the events they produce
pub struct AsyncRunner {
    mode: TaskMode,
    tx: UnboundedSender<Event>,
    rx: RefCell<UnboundedReceiver<Event>>,
    http: Arc<dyn HttpClient>,
    pending: Arc<AtomicUsize>,
}

impl AsyncRunner {
    pub fn new(mode: TaskMode, http: Arc<dyn HttpClient>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            mode,
            tx,
            rx: RefCell::new(rx),
            http,
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn http_client(&self) -> Arc<dyn HttpClient> {
        Arc::clone(&self.http)
    }

    /// Run `job` in the background and deliver its event on a later drain
    pub fn run_async<F>(&self, job: F)
    where
        F: FnOnce() -> Event + Send + 'static,
    {
        let tx = self.tx.clone();
        let pending = Arc::clone(&self.pending);
        pending.fetch_add(1, Ordering::SeqCst);

        let task = move || {
            let _pending = PendingGuard(pending);
            let event = job();
            if tx.send(event).is_err() {
                warn!(target: "scripting", "Dropping async result, the runtime is gone");
            }
        };

        match &self.mode {
            TaskMode::Tokio(handle) => {
                handle.spawn_blocking(task);
            }
            TaskMode::Thread => {
                std::thread::spawn(task);
            }
            TaskMode::Inline => task(),
        }
    }

    /// Events completed since the last drain, in completion order
    pub fn drain(&self) -> Vec<Event> {
        let mut rx = self.rx.borrow_mut();
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Jobs still running
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    struct Echo;

    impl HttpClient for Echo {
        fn get(&self, url: &str) -> Result<String, HttpError> {
            Ok(url.to_string())
        }
    }

    #[test]
    fn test_inline_job_waits_for_drain() {
        let runner = AsyncRunner::new(TaskMode::Inline, Arc::new(Echo));
        runner.run_async(|| Event::game("done"));

        assert_eq!(runner.pending(), 0);
        let events = runner.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "done");
        assert!(runner.drain().is_empty());
    }

    #[test]
    fn test_thread_job_completes() {
        let runner = AsyncRunner::new(TaskMode::Thread, Arc::new(Echo));
        let client = runner.http_client();
        runner.run_async(move || {
            let body = client.get("http://example.invalid/").unwrap_or_default();
            Event::game("fetched").with_arguments(vec![body.into()])
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.is_empty() && Instant::now() < deadline {
            events = runner.drain();
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].arguments[0].as_str(), Some("http://example.invalid/"));
    }

    #[test]
    fn test_panicking_job_is_not_pending() {
        let runner = AsyncRunner::new(TaskMode::Thread, Arc::new(Echo));
        runner.run_async(|| panic!("job failed"));

        let deadline = Instant::now() + Duration::from_secs(5);
        while runner.pending() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(runner.pending(), 0);
        assert!(runner.drain().is_empty());
    }

    #[tokio::test]
    async fn test_tokio_job_completes() {
        let runner = AsyncRunner::new(TaskMode::Tokio(Handle::current()), Arc::new(Echo));
        runner.run_async(|| Event::game("tokio"));

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while events.is_empty() && Instant::now() < deadline {
            events = runner.drain();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert_eq!(events.len(), 1);
    }
}
