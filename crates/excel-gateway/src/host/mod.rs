//! Spreadsheet host sessions
//!
//! A [`HostSession`] executes whole batches of commands and delivers events
//! for live subscriptions. Two sessions ship with the crate:
//!
//! - [`StdioHost`] talks JSON lines to a host bridge process
//! - [`MemoryHost`] runs an in-process workbook, for tests and offline use

use async_trait::async_trait;
use excel_gateway_protocol::{Command, CommandResult, EventSource, HostEvent, SubscriptionId};
use tokio::sync::mpsc;

use crate::error::HostError;

pub mod memory;
pub mod stdio;

pub use memory::MemoryHost;
pub use stdio::{StdioHost, StdioHostConfig};

/// Live event stream returned by [`HostSession::subscribe`].
pub type EventStream = mpsc::UnboundedReceiver<HostEvent>;

/// One connection to a spreadsheet host.
#[async_trait]
pub trait HostSession: Send + Sync {
    /// Execute `commands` in order as one round-trip.
    ///
    /// Returns one result per executed command. Execution stops after the
    /// first failing command, so the results are a prefix of the batch, and
    /// a batch with a failing command leaves the workbook as it was. `Err`
    /// means the round-trip itself failed and nothing is known about any
    /// command.
    async fn execute(&self, commands: Vec<Command>) -> Result<Vec<CommandResult>, HostError>;

    /// Start receiving events for `source`.
    async fn subscribe(
        &self,
        source: EventSource,
    ) -> Result<(SubscriptionId, EventStream), HostError>;

    /// Stop a subscription. Its stream ends once pending events are drained.
    async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), HostError>;

    /// Whether the host supports API `version` (for example "1.2").
    fn supports_requirement(&self, version: &str) -> bool;
}

/// Compare dotted version strings numerically ("1.10" > "1.9")
pub(crate) fn version_at_least(available: &str, required: &str) -> bool {
    let parse = |v: &str| -> Vec<u32> {
        v.split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let (a, r) = (parse(available), parse(required));
    for i in 0..a.len().max(r.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = r.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}
