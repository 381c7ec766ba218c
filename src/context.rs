//! Execution context for a pdftohtml run: cancellation plus an optional
//! deadline.
//!
//! A [`RunContext`] is passed to [`crate::Command::run`]. When its
//! [`CancelToken`] fires or its deadline passes, the running child is killed
//! and `run` returns [`crate::PdfToHtmlError::Cancelled`] or
//! [`crate::PdfToHtmlError::DeadlineExceeded`].
//!
//! ```rust
//! use pdftohtml::{CancelToken, RunContext};
//! use std::time::Duration;
//!
//! let token = CancelToken::new();
//! let ctx = RunContext::with_timeout(Duration::from_secs(30)).cancel_token(token.clone());
//!
//! // Hand `token` to a Ctrl-C handler, a UI button, ...
//! token.cancel();
//! assert!(ctx.is_cancelled());
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// A cloneable cancellation flag. All clones observe the same state.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only errors if it is
        // dropped mid-wait, which cannot happen while we hold `&self`.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Why a [`RunContext`] stopped a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    DeadlineExceeded,
}

/// Cancellation token and deadline governing one or more runs.
///
/// [`RunContext::background()`] never fires.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    token: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context with neither a token nor a deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    /// Set the deadline to `timeout` from now.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    /// Set an absolute deadline. An earlier deadline already set wins.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Attach a cancellation token.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn get_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// The reason this context has already stopped, if it has.
    /// Cancellation takes precedence over an elapsed deadline.
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.is_cancelled() {
            Some(StopReason::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(StopReason::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves when the token fires or the deadline passes. Never resolves
    /// for a background context.
    pub async fn stopped(&self) -> StopReason {
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = cancelled => StopReason::Cancelled,
            _ = expired => StopReason::DeadlineExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn background_never_stopped() {
        let ctx = RunContext::background();
        assert_eq!(ctx.stop_reason(), None);
        assert!(ctx.get_deadline().is_none());
    }

    #[test]
    fn earlier_deadline_wins() {
        let now = Instant::now();
        let ctx = RunContext::background()
            .deadline(now + Duration::from_secs(10))
            .deadline(now + Duration::from_secs(5))
            .deadline(now + Duration::from_secs(20));
        assert_eq!(ctx.get_deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn cancellation_precedes_deadline() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = RunContext::with_timeout(Duration::ZERO).cancel_token(token);
        assert_eq!(ctx.stop_reason(), Some(StopReason::Cancelled));
    }

    #[tokio::test]
    async fn stopped_resolves_on_cancel() {
        let token = CancelToken::new();
        let ctx = RunContext::background().cancel_token(token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        assert_eq!(ctx.stopped().await, StopReason::Cancelled);
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn stopped_resolves_on_deadline() {
        let ctx = RunContext::with_timeout(Duration::from_millis(50));
        assert_eq!(ctx.stop_reason(), None);
        assert_eq!(ctx.stopped().await, StopReason::DeadlineExceeded);
        assert_eq!(ctx.stop_reason(), Some(StopReason::DeadlineExceeded));
    }

    #[test]
    fn cancelled_future_completes_after_cancel() {
        let token = CancelToken::new();
        token.cancel();
        tokio_test::block_on(token.cancelled());
    }
}
