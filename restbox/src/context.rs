//! Per-call deadline and cancellation.
//!
//! A [`CallContext`] is checked when dispatch starts and raced against the
//! network call. Either signal ends the dispatch with
//! [`TransportError::Cancelled`](crate::TransportError::Cancelled).
//!
//! ```
//! use std::time::Duration;
//! use restbox::CallContext;
//!
//! let (ctx, handle) = CallContext::cancellable();
//! let ctx = ctx.with_timeout(Duration::from_secs(2));
//! handle.cancel();
//! assert!(ctx.check().is_err());
//! ```

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Why a call context ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    /// [`CancelHandle::cancel`] was called.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Cancelled => f.write_str("context cancelled"),
            CancelCause::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// Deadline and cancellation signal for one dispatch.
///
/// The default context never expires.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: Option<watch::Receiver<bool>>,
}

/// Cancels every context cloned from the one it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signals cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl CallContext {
    /// A context with no deadline and no cancellation.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context plus the handle that cancels it.
    pub fn cancellable() -> (Self, CancelHandle) {
        let (sender, receiver) = watch::channel(false);
        (
            CallContext {
                deadline: None,
                cancel: Some(receiver),
            },
            CancelHandle { sender },
        )
    }

    /// Sets an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline `timeout` from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Configured deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails if the context is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), CancelCause> {
        if self.cancel.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Err(CancelCause::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| deadline <= Instant::now()) {
            return Err(CancelCause::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves when the context ends. Never resolves for a background context.
    pub async fn done(&self) -> CancelCause {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        let cancelled = async {
            match self.cancel.clone() {
                Some(mut rx) => {
                    // A dropped handle can no longer cancel.
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => CancelCause::Cancelled,
            _ = deadline => CancelCause::DeadlineExceeded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_never_fails_check() {
        assert_eq!(CallContext::background().check(), Ok(()));
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_check() {
        let ctx = CallContext::background().with_deadline(Instant::now());
        assert_eq!(ctx.check(), Err(CancelCause::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_cancel_wakes_done() {
        let (ctx, handle) = CallContext::cancellable();
        let waiter = tokio::spawn(async move { ctx.done().await });
        handle.cancel();
        assert_eq!(waiter.await.unwrap(), CancelCause::Cancelled);
    }

    #[tokio::test]
    async fn test_deadline_wakes_done() {
        let ctx = CallContext::background().with_timeout(Duration::from_millis(20));
        assert_eq!(ctx.done().await, CancelCause::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_clones_share_cancellation() {
        let (ctx, handle) = CallContext::cancellable();
        let clone = ctx.clone();
        handle.cancel();
        assert_eq!(clone.check(), Err(CancelCause::Cancelled));
    }
}
