//! Poll → classify → notify → advance-cursor loop.
//!
//! The loop is the only place that schedules work or decides on retries:
//! - `Timeout`: poll again at once, the endpoint already held the request
//! - `Found`: offer every attempt to the sink in order, then advance the cursor
//! - `TransientError`: sleep for the backoff delay, keep the cursor
//! - `FatalError`: stop and hand the error to the caller
//!
//! A cycle finishes completely before the next one starts, so the cursor is
//! plain owned state with a single writer.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use herald_common::error::AppError;
use herald_common::types::{Cursor, DeliveryResult, PollOutcome, ReviewAttempt};
use herald_notifier::{NotificationSink, format_notification};
use herald_poller::{CursorStore, ReviewPoller};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Polling,
    Processing,
    Backoff,
    Stopped,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Idle => write!(f, "idle"),
            LoopState::Polling => write!(f, "polling"),
            LoopState::Processing => write!(f, "processing"),
            LoopState::Backoff => write!(f, "backoff"),
            LoopState::Stopped => write!(f, "stopped"),
        }
    }
}

/// What the loop does after handling a poll outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    PollNow,
    BackOff,
}

/// Running counters, mostly for logs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub polls: u64,
    pub batches: u64,
    pub timeouts: u64,
    pub transient_errors: u64,
    pub delivered: u64,
    pub failed_deliveries: u64,
}

/// Drives a `ReviewPoller` and a `NotificationSink` until shutdown or a fatal error.
pub struct PollLoop<P, S> {
    poller: P,
    sink: S,
    cursor: CursorStore,
    backoff: Duration,
    state: LoopState,
    stats: LoopStats,
}

impl<P, S> PollLoop<P, S>
where
    P: ReviewPoller,
    S: NotificationSink,
{
    pub fn new(poller: P, sink: S, backoff: Duration) -> Self {
        Self {
            poller,
            sink,
            cursor: CursorStore::new(),
            backoff,
            state: LoopState::Idle,
            stats: LoopStats::default(),
        }
    }

    /// Resume from an existing cursor instead of starting without one.
    pub fn with_cursor(mut self, cursor: CursorStore) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.current()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Run until `shutdown` is cancelled (returns `Ok`) or a fatal error occurs.
    ///
    /// Cancellation interrupts an in-flight poll or a backoff sleep, never a
    /// batch that is being delivered. An interrupted poll leaves the cursor
    /// untouched.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), AppError> {
        tracing::info!(
            cursor = self.cursor.current().map(Cursor::as_str),
            backoff_secs = self.backoff.as_secs(),
            sink = self.sink.name(),
            "Review poll loop started"
        );

        let result = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested during poll, cursor left unchanged");
                    break Ok(());
                }
                outcome = self.poll() => outcome,
            };

            match self.handle(outcome).await {
                Ok(NextStep::PollNow) => {}
                Ok(NextStep::BackOff) => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break Ok(()),
                        _ = tokio::time::sleep(self.backoff) => {}
                    }
                }
                Err(e) => break Err(e),
            }
        };

        self.state = LoopState::Stopped;
        tracing::info!(
            polls = self.stats.polls,
            delivered = self.stats.delivered,
            failed_deliveries = self.stats.failed_deliveries,
            "Review poll loop stopped"
        );
        result
    }

    /// Run exactly one cycle, including its backoff sleep if one is due.
    pub async fn run_cycle(&mut self) -> Result<NextStep, AppError> {
        let outcome = self.poll().await;
        let next = self.handle(outcome).await;

        match next {
            Ok(NextStep::BackOff) => tokio::time::sleep(self.backoff).await,
            Ok(NextStep::PollNow) => {}
            Err(_) => self.state = LoopState::Stopped,
        }
        next
    }

    async fn poll(&mut self) -> PollOutcome {
        self.state = LoopState::Polling;
        self.stats.polls += 1;
        self.poller.poll(self.cursor.current()).await
    }

    async fn handle(&mut self, outcome: PollOutcome) -> Result<NextStep, AppError> {
        tracing::debug!(
            outcome = outcome.kind(),
            cursor = self.cursor.current().map(Cursor::as_str),
            "Review poll completed"
        );
        match outcome {
            PollOutcome::Found {
                attempts,
                next_cursor,
            } => {
                self.process_batch(&attempts).await;
                self.cursor.advance(next_cursor);
                Ok(NextStep::PollNow)
            }
            PollOutcome::Timeout => {
                self.stats.timeouts += 1;
                tracing::debug!("No new reviews within the long-poll window");
                Ok(NextStep::PollNow)
            }
            PollOutcome::TransientError { detail } => {
                self.stats.transient_errors += 1;
                self.state = LoopState::Backoff;
                tracing::warn!(
                    error = %detail,
                    backoff_secs = self.backoff.as_secs(),
                    "Review poll failed, backing off"
                );
                Ok(NextStep::BackOff)
            }
            PollOutcome::FatalError { detail } => {
                tracing::error!(error = %detail, "Review poll failed fatally");
                Err(AppError::Fatal(detail))
            }
        }
    }

    /// Offer every attempt to the sink in order. Failures are logged and skipped.
    async fn process_batch(&mut self, attempts: &[ReviewAttempt]) {
        self.state = LoopState::Processing;
        self.stats.batches += 1;
        tracing::info!(count = attempts.len(), "New reviews found");

        for attempt in attempts {
            let message = format_notification(attempt);
            match self.sink.send(&message).await {
                DeliveryResult::Delivered => {
                    self.stats.delivered += 1;
                    tracing::info!(
                        lesson = %attempt.lesson_title,
                        is_negative = attempt.is_negative,
                        lesson_url = attempt.lesson_url.as_deref(),
                        "Review notification delivered"
                    );
                }
                DeliveryResult::Failed { detail } => {
                    self.stats.failed_deliveries += 1;
                    tracing::error!(
                        lesson = %attempt.lesson_title,
                        sink = self.sink.name(),
                        error = %detail,
                        "Review notification not delivered, skipping"
                    );
                }
            }
        }
    }
}
