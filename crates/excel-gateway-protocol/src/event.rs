//! Host events and subscriptions

use serde::{Deserialize, Serialize};

use crate::command::SheetKey;

/// Identifies one live event subscription on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EventSource {
    /// One worksheet became active
    WorksheetActivated { sheet: SheetKey },
    /// Any worksheet of the workbook became active
    AnyWorksheetActivated,
    /// A cell of one worksheet was clicked
    WorksheetClicked { sheet: SheetKey },
    /// Data on one worksheet changed
    WorksheetChanged { sheet: SheetKey },
}

impl EventSource {
    /// The worksheet this source is bound to, if any
    pub fn sheet(&self) -> Option<&SheetKey> {
        match self {
            EventSource::WorksheetActivated { sheet }
            | EventSource::WorksheetClicked { sheet }
            | EventSource::WorksheetChanged { sheet } => Some(sheet),
            EventSource::AnyWorksheetActivated => None,
        }
    }

    /// The kind of event this source delivers
    pub fn kind(&self) -> EventKind {
        match self {
            EventSource::WorksheetActivated { .. } | EventSource::AnyWorksheetActivated => {
                EventKind::Activated
            }
            EventSource::WorksheetClicked { .. } => EventKind::SingleClicked,
            EventSource::WorksheetChanged { .. } => EventKind::Changed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Activated,
    SingleClicked,
    Changed,
}

/// Kind of data change reported by a changed event.
///
/// Unrecognized kinds from newer hosts decode as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    RangeEdited,
    RowInserted,
    RowDeleted,
    ColumnInserted,
    ColumnDeleted,
    CellInserted,
    CellDeleted,
    #[serde(other)]
    Unknown,
}

/// Whether a change came from this session or another collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventOrigin {
    Local,
    Remote,
}

/// A raw event as the host reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEvent {
    pub kind: EventKind,
    /// Id of the worksheet the event happened on
    pub worksheet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<EventOrigin>,
}

impl HostEvent {
    pub fn activated(worksheet_id: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Activated,
            worksheet_id: worksheet_id.into(),
            address: None,
            change_type: None,
            origin: None,
        }
    }

    pub fn clicked(worksheet_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            kind: EventKind::SingleClicked,
            worksheet_id: worksheet_id.into(),
            address: Some(address.into()),
            change_type: None,
            origin: None,
        }
    }

    pub fn changed(
        worksheet_id: impl Into<String>,
        address: impl Into<String>,
        change_type: ChangeType,
    ) -> Self {
        Self {
            kind: EventKind::Changed,
            worksheet_id: worksheet_id.into(),
            address: Some(address.into()),
            change_type: Some(change_type),
            origin: Some(EventOrigin::Local),
        }
    }
}
