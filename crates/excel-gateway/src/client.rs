//! Fail-soft command batch client

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::batch::BatchContext;
use crate::error::Result;
use crate::host::HostSession;
use crate::log::LogSink;

/// Result of a fail-soft operation.
///
/// Failures have already been logged by the time a caller sees `Failed`; the
/// message is kept for callers that want to show it.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Outcome<T> {
    Ok(T),
    Failed(String),
}

impl<T> Outcome<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// The value, or `None` for a failure
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Ok(value) => Outcome::Ok(f(value)),
            Outcome::Failed(message) => Outcome::Failed(message),
        }
    }

    pub fn into_result(self) -> std::result::Result<T, String> {
        match self {
            Outcome::Ok(value) => Ok(value),
            Outcome::Failed(message) => Err(message),
        }
    }
}

/// Opens batch contexts on a host session and runs operations fail-soft.
#[derive(Clone)]
pub struct CommandBatchClient {
    session: Arc<dyn HostSession>,
    sink: Arc<dyn LogSink>,
    component: Arc<str>,
    next_context: Arc<AtomicU64>,
}

impl fmt::Debug for CommandBatchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBatchClient")
            .field("component", &self.component)
            .finish_non_exhaustive()
    }
}

impl CommandBatchClient {
    pub fn new(
        session: Arc<dyn HostSession>,
        sink: Arc<dyn LogSink>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            session,
            sink,
            component: Arc::from(component.into()),
            next_context: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn session(&self) -> &Arc<dyn HostSession> {
        &self.session
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Open a fresh, independent batch context
    pub fn open(&self) -> BatchContext {
        let id = self.next_context.fetch_add(1, Ordering::Relaxed);
        BatchContext::new(id, self.session.clone())
    }

    /// Run `body` on a fresh context
    ///
    /// Any error the body returns is reported once to the log sink, tagged
    /// with this client's component and `operation`, and turned into
    /// [`Outcome::Failed`]. The context is closed either way.
    pub async fn run<T, F, Fut>(&self, operation: &str, body: F) -> Outcome<T>
    where
        F: FnOnce(BatchContext) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ctx = self.open();
        match body(ctx.clone()).await {
            Ok(value) => {
                ctx.complete();
                Outcome::Ok(value)
            }
            Err(err) => {
                ctx.abandon();
                self.report(operation, &err);
                Outcome::Failed(err.to_string())
            }
        }
    }

    /// Report a failure that happened outside [`run`](Self::run)
    pub fn report(&self, operation: &str, error: &dyn fmt::Display) {
        self.sink.log(&self.component, operation, error);
    }
}
