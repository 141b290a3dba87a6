// Continuous journal polling.
//
// `JournalStreamer` holds the current offset and walks the journal with
// "next after offset" calls:
//
// - one call at a time, at most `MAX_REQUESTS_PER_WINDOW` per
//   `RATE_WINDOW`, waiting out the window when the budget is spent;
// - a `POLL_INTERVAL` pause after every call, `ERROR_BACKOFF` after a
//   failed one;
// - "no further entry" is the steady state and is not reported;
// - the offset only ever moves to a newly returned, different value.
//
// Stopping is cooperative: `CancelToken::cancel` is checked at the top of
// every iteration, in-flight requests are never interrupted.

use crate::auth::now_ms;
use crate::error::{Error, Result};
use crate::models::{JournalEntry, JournalPayload};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const ERROR_BACKOFF: Duration = Duration::from_secs(4);
pub const MAX_REQUESTS_PER_WINDOW: u32 = 30;
pub const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Where the streamer reads the journal from.
pub trait JournalSource {
    fn latest(&self) -> Result<JournalEntry>;
    /// `Err(Error::NoContent)` when there is nothing after `offset` yet.
    fn next_after(&self, offset: &str) -> Result<JournalEntry>;
    fn download(&self, entry: &JournalEntry) -> Result<JournalPayload>;
}

pub trait Clock {
    fn now_ms(&self) -> i64;
    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_ms()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Receives everything the streamer observes.
pub trait StreamObserver {
    fn on_entry(&mut self, entry: &JournalEntry, payload: &JournalPayload);
    fn on_error(&mut self, error: &Error);
    fn on_status(&mut self, status: StreamStatus);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    Started { offset: String },
    RateLimited { wait: Duration },
    Stopped { offset: Option<String> },
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { offset } => write!(f, "Streaming from offset {}", offset),
            Self::RateLimited { wait } => {
                write!(f, "Request budget used up, waiting {}s", wait.as_secs().max(1))
            }
            Self::Stopped { offset: Some(offset) } => write!(f, "Stopped at offset {}", offset),
            Self::Stopped { offset: None } => write!(f, "Stopped"),
        }
    }
}

/// Messages forwarded by the `Sender` observer.
#[derive(Debug)]
pub enum StreamMessage {
    Entry(JournalEntry, JournalPayload),
    Error(String),
    Status(StreamStatus),
}

impl StreamObserver for Sender<StreamMessage> {
    fn on_entry(&mut self, entry: &JournalEntry, payload: &JournalPayload) {
        self.send(StreamMessage::Entry(entry.clone(), payload.clone())).ok();
    }

    fn on_error(&mut self, error: &Error) {
        self.send(StreamMessage::Error(error.to_string())).ok();
    }

    fn on_status(&mut self, status: StreamStatus) {
        self.send(StreamMessage::Status(status)).ok();
    }
}

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
}

/// Fixed-window request counter.
#[derive(Clone, Debug)]
pub struct RateBudget {
    window_start_ms: i64,
    requests_this_window: u32,
    max_per_window: u32,
    window_length_ms: i64,
}

impl RateBudget {
    pub fn new(max_per_window: u32, window: Duration, now_ms: i64) -> Self {
        Self {
            window_start_ms: now_ms,
            requests_this_window: 0,
            max_per_window,
            window_length_ms: window.as_millis() as i64,
        }
    }

    /// `None` when a request may go out now, otherwise how long until the
    /// window rolls over.
    pub fn wait_time(&mut self, now_ms: i64) -> Option<Duration> {
        self.roll(now_ms);
        if self.requests_this_window < self.max_per_window {
            return None;
        }
        let remaining = self.window_start_ms + self.window_length_ms - now_ms;
        Some(Duration::from_millis(remaining.max(1) as u64))
    }

    pub fn record(&mut self, now_ms: i64) {
        self.roll(now_ms);
        self.requests_this_window += 1;
    }

    pub fn used(&self) -> u32 {
        self.requests_this_window
    }

    fn roll(&mut self, now_ms: i64) {
        if now_ms - self.window_start_ms >= self.window_length_ms {
            self.window_start_ms = now_ms;
            self.requests_this_window = 0;
        }
    }
}

/// What a single "next" call amounted to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Advanced(String),
    NoChange,
    Failed,
}

pub struct JournalStreamer<S, C = SystemClock> {
    source: S,
    clock: C,
    budget: RateBudget,
    offset: Option<String>,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl<S: JournalSource> JournalStreamer<S, SystemClock> {
    pub fn new(source: S) -> Self {
        Self::with_clock(source, SystemClock)
    }
}

impl<S: JournalSource, C: Clock> JournalStreamer<S, C> {
    pub fn with_clock(source: S, clock: C) -> Self {
        let budget = RateBudget::new(MAX_REQUESTS_PER_WINDOW, RATE_WINDOW, clock.now_ms());
        Self {
            source,
            clock,
            budget,
            offset: None,
            poll_interval: POLL_INTERVAL,
            error_backoff: ERROR_BACKOFF,
        }
    }

    pub fn with_budget(mut self, max_per_window: u32, window: Duration) -> Self {
        self.budget = RateBudget::new(max_per_window, window, self.clock.now_ms());
        self
    }

    pub fn with_intervals(mut self, poll_interval: Duration, error_backoff: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.error_backoff = error_backoff;
        self
    }

    pub fn offset(&self) -> Option<&str> {
        self.offset.as_deref()
    }

    /// Establish the starting offset from the latest entry, payload
    /// included. Counts against the request budget.
    pub fn init(&mut self, observer: &mut dyn StreamObserver) -> Result<()> {
        self.budget.record(self.clock.now_ms());
        let entry = self.source.latest()?;
        self.source.download(&entry)?;
        info!(offset = %entry.current_offset, "journal stream initialised");
        observer.on_status(StreamStatus::Started {
            offset: entry.current_offset.clone(),
        });
        self.offset = Some(entry.current_offset);
        Ok(())
    }

    /// One "next after offset" request. Does not sleep.
    pub fn poll_once(&mut self, observer: &mut dyn StreamObserver) -> PollOutcome {
        let Some(current) = self.offset.clone() else {
            return PollOutcome::NoChange;
        };

        self.budget.record(self.clock.now_ms());
        let entry = match self.source.next_after(&current) {
            Ok(entry) => entry,
            Err(Error::NoContent) => {
                debug!(offset = %current, "no new journal entry");
                return PollOutcome::NoChange;
            }
            Err(e) => {
                warn!(error = %e, "journal poll failed");
                observer.on_error(&e);
                return PollOutcome::Failed;
            }
        };

        if entry.current_offset == current {
            return PollOutcome::NoChange;
        }

        match self.source.download(&entry) {
            Ok(payload) => {
                observer.on_entry(&entry, &payload);
                info!(from = %current, to = %entry.current_offset, "journal offset advanced");
                self.offset = Some(entry.current_offset.clone());
                PollOutcome::Advanced(entry.current_offset)
            }
            Err(e) => {
                warn!(offset = %entry.current_offset, error = %e, "journal payload download failed");
                observer.on_error(&e);
                PollOutcome::Failed
            }
        }
    }

    /// Poll until `cancel` is set. Call `init` first.
    pub fn run(&mut self, observer: &mut dyn StreamObserver, cancel: &CancelToken) {
        while !cancel.is_cancelled() {
            if let Some(wait) = self.budget.wait_time(self.clock.now_ms()) {
                debug!(wait_ms = wait.as_millis() as u64, "request budget exhausted");
                observer.on_status(StreamStatus::RateLimited { wait });
                self.clock.sleep(wait);
                continue;
            }

            let pause = match self.poll_once(observer) {
                PollOutcome::Failed => self.error_backoff,
                PollOutcome::Advanced(_) | PollOutcome::NoChange => self.poll_interval,
            };
            self.clock.sleep(pause);
        }

        info!(offset = ?self.offset, "journal stream stopped");
        observer.on_status(StreamStatus::Stopped {
            offset: self.offset.clone(),
        });
    }
}

impl<S, C> JournalStreamer<S, C>
where
    S: JournalSource + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Initialise on the calling thread, then poll on a background thread.
    /// If initialisation fails the error goes to `on_error` and the
    /// returned handle is already finished.
    pub fn start<O>(mut self, mut observer: O, cancel: CancelToken) -> StreamHandle
    where
        O: StreamObserver + Send + 'static,
    {
        if let Err(e) = self.init(&mut observer) {
            warn!(error = %e, "could not initialise journal stream");
            observer.on_error(&e);
            return StreamHandle {
                cancel,
                thread: None,
            };
        }

        let token = cancel.clone();
        let thread = thread::spawn(move || self.run(&mut observer, &token));
        StreamHandle {
            cancel,
            thread: Some(thread),
        }
    }
}

/// Stream from the latest journal entry using the wall clock.
pub fn start_streaming<S, O>(source: S, observer: O, cancel: CancelToken) -> StreamHandle
where
    S: JournalSource + Send + 'static,
    O: StreamObserver + Send + 'static,
{
    JournalStreamer::new(source).start(observer, cancel)
}

pub struct StreamHandle {
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// False when initialisation failed and nothing is polling.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Stop and wait for the polling thread to exit.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("journal stream thread panicked");
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
