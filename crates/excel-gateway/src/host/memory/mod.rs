//! In-process host
//!
//! [`MemoryHost`] keeps a whole workbook in memory and executes batches
//! against it the way a real host would: commands run in order, execution
//! stops at the first failure, and errors carry host error codes. A failed
//! batch leaves the workbook untouched.
//!
//! Tests can seed and inspect the workbook directly, inject faults and
//! simulate user events with [`MemoryHost::emit`].

mod exec;
mod model;

pub use model::{CellState, Comment, MemorySheet, MemoryTable, MemoryWorkbook, Protection};

use std::collections::HashMap;

use async_trait::async_trait;
use excel_gateway_protocol::{
    Command, CommandResult, EventSource, HostEvent, Operation, SheetKey, SubscriptionId,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use self::exec::Executor;
use super::{version_at_least, EventStream, HostSession};
use crate::error::HostError;

/// API version a fresh [`MemoryHost`] reports
pub const DEFAULT_API_VERSION: &str = "1.9";

struct Subscription {
    source: EventSource,
    /// Resolved id of the worksheet a sheet-bound source listens to
    sheet_id: Option<String>,
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl Subscription {
    fn accepts(&self, event: &HostEvent) -> bool {
        self.source.kind() == event.kind
            && self
                .sheet_id
                .as_ref()
                .map_or(true, |id| *id == event.worksheet_id)
    }
}

#[derive(Default)]
struct Faults {
    next_batch: Option<HostError>,
    operations: HashMap<&'static str, HostError>,
}

struct State {
    workbook: MemoryWorkbook,
    api_version: String,
    subscriptions: HashMap<SubscriptionId, Subscription>,
    next_subscription: u64,
    faults: Faults,
    batches: Vec<Vec<Command>>,
}

/// A [`HostSession`] backed by an in-memory workbook.
pub struct MemoryHost {
    state: Mutex<State>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryHost")
            .field("sheets", &state.workbook.sheet_names())
            .field("api_version", &state.api_version)
            .finish_non_exhaustive()
    }
}

impl MemoryHost {
    /// A workbook with one empty sheet named `Sheet1`
    pub fn new() -> Self {
        Self::with_sheets(["Sheet1"])
    }

    /// A workbook with the given sheets; the first one is active
    pub fn with_sheets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            state: Mutex::new(State {
                workbook: MemoryWorkbook::new(names),
                api_version: DEFAULT_API_VERSION.to_string(),
                subscriptions: HashMap::new(),
                next_subscription: 1,
                faults: Faults::default(),
                batches: Vec::new(),
            }),
        }
    }

    /// Report `version` as the highest supported API version
    pub fn with_api_version(self, version: impl Into<String>) -> Self {
        self.state.lock().api_version = version.into();
        self
    }

    pub fn api_version(&self) -> String {
        self.state.lock().api_version.clone()
    }

    /// Change the workbook directly, bypassing protection and events
    pub fn edit<R>(&self, f: impl FnOnce(&mut MemoryWorkbook) -> R) -> R {
        f(&mut self.state.lock().workbook)
    }

    /// Snapshot of the workbook
    pub fn workbook(&self) -> MemoryWorkbook {
        self.state.lock().workbook.clone()
    }

    /// Fail the next batch as a whole, before any command runs
    pub fn fail_next_batch(&self, error: HostError) {
        self.state.lock().faults.next_batch = Some(error);
    }

    /// Fail every command carrying the operation named `operation`
    /// (for example "setValues") until faults are cleared
    pub fn fail_operation(&self, operation: &'static str, error: HostError) {
        self.state.lock().faults.operations.insert(operation, error);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    /// Every batch received so far, in order
    pub fn batches(&self) -> Vec<Vec<Command>> {
        self.state.lock().batches.clone()
    }

    pub fn batch_count(&self) -> usize {
        self.state.lock().batches.len()
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    /// Deliver `event` to matching subscriptions as if the user caused it
    pub fn emit(&self, event: HostEvent) {
        let mut state = self.state.lock();
        deliver(&mut state.subscriptions, &event);
    }
}

fn deliver(subscriptions: &mut HashMap<SubscriptionId, Subscription>, event: &HostEvent) {
    subscriptions.retain(|id, subscription| {
        if !subscription.accepts(event) {
            return true;
        }
        let open = subscription.tx.send(event.clone()).is_ok();
        if !open {
            tracing::debug!(subscription = %id, "dropping closed subscription");
        }
        open
    });
}

#[async_trait]
impl HostSession for MemoryHost {
    async fn execute(&self, commands: Vec<Command>) -> Result<Vec<CommandResult>, HostError> {
        let mut state = self.state.lock();
        state.batches.push(commands.clone());
        if let Some(error) = state.faults.next_batch.take() {
            return Err(error);
        }

        let State {
            workbook,
            api_version,
            faults,
            subscriptions,
            ..
        } = &mut *state;
        let mut working = workbook.clone();
        let fault = |operation: &Operation| faults.operations.get(operation.name()).cloned();
        let run = Executor::new(&mut working, api_version).run(&commands, fault);
        tracing::trace!(
            commands = commands.len(),
            executed = run.results.len(),
            failed = run.failed,
            "memory batch"
        );
        if !run.failed {
            *workbook = working;
            for event in &run.events {
                deliver(subscriptions, event);
            }
        }
        Ok(run.results)
    }

    async fn subscribe(
        &self,
        source: EventSource,
    ) -> Result<(SubscriptionId, EventStream), HostError> {
        let mut state = self.state.lock();
        let sheet_id = match source.sheet() {
            Some(key) => Some(resolve_sheet_id(&state.workbook, key)?),
            None => None,
        };
        let id = SubscriptionId(state.next_subscription);
        state.next_subscription += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscriptions.insert(
            id,
            Subscription {
                source,
                sheet_id,
                tx,
            },
        );
        Ok((id, rx))
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), HostError> {
        match self.state.lock().subscriptions.remove(&subscription) {
            Some(_) => Ok(()),
            None => Err(HostError::new(
                "ItemNotFound",
                format!("No subscription {subscription}."),
            )),
        }
    }

    fn supports_requirement(&self, version: &str) -> bool {
        version_at_least(&self.state.lock().api_version, version)
    }
}

fn resolve_sheet_id(workbook: &MemoryWorkbook, key: &SheetKey) -> Result<String, HostError> {
    let sheet = match key {
        SheetKey::Active => workbook.active_sheet(),
        SheetKey::Key(key) => workbook
            .sheets
            .iter()
            .find(|sheet| sheet.id == *key || sheet.name.eq_ignore_ascii_case(key)),
        SheetKey::Created(_) => None,
    };
    sheet
        .map(|sheet| sheet.id.clone())
        .ok_or_else(|| HostError::new("ItemNotFound", format!("No worksheet for {key:?}.")))
}
