//! Batch contexts
//!
//! A [`BatchContext`] queues commands locally and sends them to the host as
//! one round-trip on [`BatchContext::flush`]. Each queued command hands back a
//! [`Pending`] that holds a value only after the flush carrying it completes.
//!
//! A context stays usable across any number of successful flushes. The first
//! failed flush moves it to [`ContextState::Failed`]; closing it moves it to
//! [`ContextState::Completed`]. Either way it refuses further work.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use excel_gateway_protocol::{Command, CommandResult, ObjectRef, Operation, SheetKey, TableKey};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{CommandFailure, GatewayError, HostError, Result};
use crate::host::HostSession;

/// Lifecycle of a [`BatchContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Open,
    Flushing,
    Completed,
    Failed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContextState::Open => "open",
            ContextState::Flushing => "flushing",
            ContextState::Completed => "completed",
            ContextState::Failed => "failed",
        };
        f.write_str(name)
    }
}

type Waiter = oneshot::Sender<std::result::Result<Value, CommandFailure>>;

struct Queued {
    seq: u32,
    command: Command,
    waiter: Waiter,
}

struct Inner {
    state: ContextState,
    queue: Vec<Queued>,
    next_seq: u32,
    /// Host ids of objects created by earlier flushes, by sequence number
    created: HashMap<u32, String>,
    flushes: u32,
}

/// A command queue bound to one host session.
///
/// Cloning is cheap; clones share the same queue and state.
#[derive(Clone)]
pub struct BatchContext {
    id: u64,
    session: Arc<dyn HostSession>,
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for BatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BatchContext")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("queued", &inner.queue.len())
            .field("flushes", &inner.flushes)
            .finish()
    }
}

impl BatchContext {
    pub(crate) fn new(id: u64, session: Arc<dyn HostSession>) -> Self {
        Self {
            id,
            session,
            inner: Arc::new(Mutex::new(Inner {
                state: ContextState::Open,
                queue: Vec::new(),
                next_seq: 0,
                created: HashMap::new(),
                flushes: 0,
            })),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> ContextState {
        self.inner.lock().state
    }

    pub fn session(&self) -> &Arc<dyn HostSession> {
        &self.session
    }

    /// Number of commands waiting for the next flush
    pub fn queued(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Number of successful flushes so far
    pub fn flush_count(&self) -> u32 {
        self.inner.lock().flushes
    }

    /// Queue an operation against `target`
    pub fn enqueue<T: DeserializeOwned>(
        &self,
        target: ObjectRef,
        operation: Operation,
    ) -> Result<Pending<T>> {
        self.enqueue_seq(target, operation)
            .map(|(pending, _)| pending)
    }

    /// Queue an operation and return its sequence number, which later
    /// commands can use as [`SheetKey::Created`] or [`TableKey::Created`]
    pub fn enqueue_seq<T: DeserializeOwned>(
        &self,
        target: ObjectRef,
        operation: Operation,
    ) -> Result<(Pending<T>, u32)> {
        let mut inner = self.inner.lock();
        match inner.state {
            ContextState::Open | ContextState::Flushing => {}
            state => return Err(GatewayError::ContextClosed(state)),
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let (waiter, rx) = oneshot::channel();
        tracing::trace!(
            context = self.id,
            seq,
            op = operation.name(),
            "queued command"
        );
        inner.queue.push(Queued {
            seq,
            command: Command::new(target, operation),
            waiter,
        });
        Ok((Pending::new(rx), seq))
    }

    /// Send every queued command to the host as one batch
    ///
    /// On success each [`Pending`] of the batch holds its value. On failure
    /// the failing command carries the host error, every other command of
    /// the batch is aborted, and the context is failed. Commands that ran
    /// before the failure are aborted too, since the host leaves a failed
    /// batch unapplied.
    pub async fn flush(&self) -> Result<()> {
        let (commands, waiters) = {
            let mut inner = self.inner.lock();
            if inner.state != ContextState::Open {
                return Err(GatewayError::ContextClosed(inner.state));
            }
            let queue = std::mem::take(&mut inner.queue);
            let batch_index: HashMap<u32, u32> = queue
                .iter()
                .enumerate()
                .map(|(index, queued)| (queued.seq, index as u32))
                .collect();

            let mut commands = Vec::with_capacity(queue.len());
            let mut waiters = Vec::with_capacity(queue.len());
            for Queued {
                seq,
                mut command,
                waiter,
            } in queue
            {
                resolve_created(&mut command.target, &batch_index, &inner.created);
                commands.push(command);
                waiters.push((seq, waiter));
            }
            if !commands.is_empty() {
                inner.state = ContextState::Flushing;
            }
            (commands, waiters)
        };

        if commands.is_empty() {
            return Ok(());
        }

        let creates: Vec<bool> = commands
            .iter()
            .map(|command| command.operation.creates_object())
            .collect();
        tracing::debug!(context = self.id, commands = commands.len(), "flushing batch");

        let outcome = self.session.execute(commands).await;

        let mut waiters = waiters.into_iter();
        let failure = match outcome {
            Ok(results) => {
                let mut failure = None;
                let mut created = Vec::new();
                let mut succeeded = Vec::new();
                for (index, result) in results.into_iter().enumerate() {
                    let Some((seq, waiter)) = waiters.next() else {
                        break;
                    };
                    match result {
                        CommandResult::Ok { value } => {
                            if creates[index] {
                                if let Some(id) = value.get("id").and_then(Value::as_str) {
                                    created.push((seq, id.to_string()));
                                }
                            }
                            succeeded.push((waiter, value));
                        }
                        CommandResult::Error { code, message } => {
                            let err = HostError::new(code, message);
                            let _ = waiter.send(Err(CommandFailure::Host(err.clone())));
                            failure = Some(err);
                            break;
                        }
                    }
                }
                if failure.is_none() && !waiters.as_slice().is_empty() {
                    failure = Some(HostError::new(
                        "IncompleteBatch",
                        format!(
                            "host returned no result for {} command(s)",
                            waiters.as_slice().len()
                        ),
                    ));
                }
                if failure.is_none() {
                    self.inner.lock().created.extend(created);
                    for (waiter, value) in succeeded {
                        let _ = waiter.send(Ok(value));
                    }
                } else {
                    for (waiter, _) in succeeded {
                        let _ = waiter.send(Err(CommandFailure::Aborted));
                    }
                }
                failure
            }
            Err(err) => {
                for (_, waiter) in waiters.by_ref() {
                    let _ = waiter.send(Err(CommandFailure::Host(err.clone())));
                }
                Some(err)
            }
        };

        for (_, waiter) in waiters {
            let _ = waiter.send(Err(CommandFailure::Aborted));
        }

        let mut inner = self.inner.lock();
        match failure {
            None => {
                inner.flushes += 1;
                if inner.state == ContextState::Flushing {
                    inner.state = ContextState::Open;
                }
                Ok(())
            }
            Some(err) => {
                tracing::debug!(context = self.id, error = %err, "batch failed");
                inner.state = ContextState::Failed;
                for queued in inner.queue.drain(..) {
                    let _ = queued.waiter.send(Err(CommandFailure::Aborted));
                }
                Err(err.into())
            }
        }
    }

    /// Close after a successful operation; unflushed commands are discarded
    pub(crate) fn complete(&self) {
        let mut inner = self.inner.lock();
        if matches!(inner.state, ContextState::Open | ContextState::Flushing) {
            inner.state = ContextState::Completed;
        }
        if !inner.queue.is_empty() {
            tracing::debug!(
                context = self.id,
                discarded = inner.queue.len(),
                "closing context with unflushed commands"
            );
            inner.queue.clear();
        }
    }

    /// Close after a failed operation
    pub(crate) fn abandon(&self) {
        let mut inner = self.inner.lock();
        inner.state = ContextState::Failed;
        inner.queue.clear();
    }
}

/// Point `Created` keys at this batch's command index, or at the host id of
/// an object created by an earlier flush.
fn resolve_created(
    target: &mut ObjectRef,
    batch_index: &HashMap<u32, u32>,
    created: &HashMap<u32, String>,
) {
    if let Some(sheet) = target.sheet_mut() {
        if let SheetKey::Created(seq) = *sheet {
            if let Some(index) = batch_index.get(&seq) {
                *sheet = SheetKey::Created(*index);
            } else if let Some(id) = created.get(&seq) {
                *sheet = SheetKey::Key(id.clone());
            }
        }
    }
    if let Some(table) = target.table_mut() {
        if let TableKey::Created(seq) = *table {
            if let Some(index) = batch_index.get(&seq) {
                *table = TableKey::Created(*index);
            } else if let Some(id) = created.get(&seq) {
                *table = TableKey::Key(id.clone());
            }
        }
    }
}

/// A value that arrives with the flush carrying its command.
///
/// Await it, or call [`Pending::into_value`] once the flush has returned.
#[must_use = "a pending value is only useful after the context is flushed"]
pub struct Pending<T> {
    rx: oneshot::Receiver<std::result::Result<Value, CommandFailure>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

impl<T: DeserializeOwned> Pending<T> {
    fn new(rx: oneshot::Receiver<std::result::Result<Value, CommandFailure>>) -> Self {
        Self {
            rx,
            _marker: PhantomData,
        }
    }

    /// Take the value after the flush carrying this command returned
    ///
    /// Fails with [`GatewayError::NotFlushed`] if that flush has not happened.
    pub fn into_value(mut self) -> Result<T> {
        match self.rx.try_recv() {
            Ok(result) => decode(result),
            Err(oneshot::error::TryRecvError::Empty) => Err(GatewayError::NotFlushed),
            Err(oneshot::error::TryRecvError::Closed) => Err(GatewayError::ContextDropped),
        }
    }
}

impl<T: DeserializeOwned> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(result)) => Poll::Ready(decode(result)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(GatewayError::ContextDropped)),
        }
    }
}

fn decode<T: DeserializeOwned>(result: std::result::Result<Value, CommandFailure>) -> Result<T> {
    let value = result?;
    Ok(serde_json::from_value(value)?)
}
