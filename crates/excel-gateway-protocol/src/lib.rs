//! Shared protocol types between the excel-gateway client and a spreadsheet
//! host process.
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each
//! direction. The client sends [`Request`]s; the host answers each with a
//! [`Response`] carrying the same id, and pushes [`EventEnvelope`]s for live
//! subscriptions at any time.

use serde::{Deserialize, Serialize};

mod command;
mod event;
mod format;
mod value;

pub use command::{Command, CommandResult, ObjectRef, Operation, SheetKey, TableKey};
pub use event::{
    ChangeType, EventKind, EventOrigin, EventSource, HostEvent, SubscriptionId,
};
pub use format::{
    CellValueRule, ClearScope, CommentContentType, ConditionalFormat, DataValidationRule,
    FormatOverrides, HorizontalAlignment, Hyperlink, ProtectionOptions, SortField,
    ValidationPrompt, ValueOperator, Visibility,
};
pub use value::{grid, CellError, CellValue};

/// A message sent from the client to the host process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    #[serde(flatten)]
    pub message: RequestMessage,
}

/// Messages the client can send to the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum RequestMessage {
    /// Open a session. The host answers with the API versions it supports.
    Init,

    /// Execute commands in order, stopping at the first failure.
    Batch { commands: Vec<Command> },

    /// Start delivering events for `source`.
    Subscribe { source: EventSource },

    /// Stop delivering events for a subscription.
    Unsubscribe { subscription: SubscriptionId },

    /// Close the session and exit.
    Shutdown,
}

/// A response sent from the host back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Data returned in successful responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Answer to `Init`.
    Session {
        #[serde(rename = "apiVersions")]
        api_versions: Vec<String>,
    },
    /// Answer to `Batch`: one result per executed command.
    Batch { results: Vec<CommandResult> },
    /// Answer to `Subscribe`.
    Subscription { subscription: SubscriptionId },
}

/// An event pushed by the host for a live subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub subscription: SubscriptionId,
    pub event: HostEvent,
}

/// Any line the host may write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostMessage {
    Event(EventEnvelope),
    Response(Response),
}
