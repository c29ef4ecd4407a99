//! Per-operation context: cancellation, deadline and measurement root.
//!
//! Every operation in the stack receives a [`Context`]. Cancelling it, or
//! letting its deadline pass, aborts whatever is in flight and surfaces a
//! [`ContextError`] to the caller unchanged.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::model::{default_root, MeasurementRoot};

/// Reason a context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context was cancelled explicitly.
    #[error("context canceled")]
    Canceled,
    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal, optional deadline and optional measurement root.
///
/// Clones share the same cancellation signal. Derived contexts
/// ([`with_cancel`](Context::with_cancel), [`with_timeout`](Context::with_timeout))
/// are cancelled when their parent is, but cancelling them leaves the parent alone.
#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    root: Option<Arc<MeasurementRoot>>,
}

impl Context {
    /// A context that is never cancelled, has no deadline and no root.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            root: None,
        }
    }

    /// Derives a context that can be cancelled independently of `self`.
    pub fn with_cancel(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
            root: self.root.clone(),
        }
    }

    /// Derives a context whose deadline is at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context whose deadline is the earlier of `deadline` and the
    /// current one.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
            root: self.root.clone(),
        }
    }

    /// Returns a copy of this context carrying `root`.
    pub fn with_root(&self, root: Arc<MeasurementRoot>) -> Self {
        Self {
            token: self.token.clone(),
            deadline: self.deadline,
            root: Some(root),
        }
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The measurement root attached to this context, or the process-wide
    /// default root when none is attached.
    pub fn root(&self) -> Arc<MeasurementRoot> {
        match &self.root {
            Some(root) => Arc::clone(root),
            None => default_root(),
        }
    }

    /// Whether a root was attached explicitly.
    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            return Some(ContextError::Canceled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        self.done_owned().await
    }

    /// Like [`done`](Context::done), but not borrowing `self`, so it can be
    /// stored inside readers that outlive the call creating them.
    pub fn done_owned(&self) -> impl Future<Output = ContextError> + Send + 'static {
        let cancelled = self.token.clone().cancelled_owned();
        let deadline = self.deadline;
        async move {
            tokio::select! {
                biased;
                _ = cancelled => ContextError::Canceled,
                _ = sleep_until(deadline) => ContextError::DeadlineExceeded,
            }
        }
    }

    /// Drives `fut` until it completes or the context is done.
    ///
    /// A context that is already done returns its error without polling
    /// `fut`, so no side effect of the future takes place.
    ///
    /// # Errors
    ///
    /// Returns the [`ContextError`] if the context finishes first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, ContextError>
    where
        F: Future,
    {
        if let Some(err) = self.err() {
            return Err(err);
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ContextError::Canceled),
            _ = sleep_until(self.deadline) => Err(ContextError::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .field("has_root", &self.root.is_some())
            .finish()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
