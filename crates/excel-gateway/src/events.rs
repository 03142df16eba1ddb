//! Event bridge
//!
//! Turns host event subscriptions into caller callbacks. Every delivered
//! event is handled on its own task and resolved on its own fresh batch
//! context: the worksheet it happened on is loaded so handlers receive its
//! name and id. A slow resolve does not hold up later events, so handlers
//! may see events out of host order.
//!
//! Changed events are routed by [`ChangeType`]; kinds without a handler
//! are dropped.

use std::fmt;
use std::sync::Arc;

use excel_gateway_protocol::{ChangeType, EventSource, HostEvent, SheetKey, SubscriptionId};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::batch::BatchContext;
use crate::client::{CommandBatchClient, Outcome};
use crate::error::Result;
use crate::host::EventStream;
use crate::model::WorksheetInfo;
use crate::proxy::WorksheetProxy;

/// What a handler receives.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPayload {
    /// Name of the worksheet the event happened on
    pub source_name: String,
    /// Id of that worksheet
    pub source_id: String,
    pub change_type: Option<ChangeType>,
    pub raw: HostEvent,
}

pub type Handler = Arc<dyn Fn(EventPayload) + Send + Sync>;
pub type Predicate = Arc<dyn Fn(&EventPayload) -> bool + Send + Sync>;

/// Handlers for worksheet data changes, one per routed change kind.
#[derive(Clone, Default)]
pub struct ChangeHandlers {
    pub on_row_deleted: Option<Handler>,
    pub on_row_inserted: Option<Handler>,
    pub on_range_edited: Option<Handler>,
}

impl ChangeHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_row_deleted(
        mut self,
        handler: impl Fn(EventPayload) + Send + Sync + 'static,
    ) -> Self {
        self.on_row_deleted = Some(Arc::new(handler));
        self
    }

    pub fn on_row_inserted(
        mut self,
        handler: impl Fn(EventPayload) + Send + Sync + 'static,
    ) -> Self {
        self.on_row_inserted = Some(Arc::new(handler));
        self
    }

    pub fn on_range_edited(
        mut self,
        handler: impl Fn(EventPayload) + Send + Sync + 'static,
    ) -> Self {
        self.on_range_edited = Some(Arc::new(handler));
        self
    }

    fn handler_for(&self, change: ChangeType) -> Option<&Handler> {
        match change {
            ChangeType::RowDeleted => self.on_row_deleted.as_ref(),
            ChangeType::RowInserted => self.on_row_inserted.as_ref(),
            ChangeType::RangeEdited => self.on_range_edited.as_ref(),
            ChangeType::ColumnInserted
            | ChangeType::ColumnDeleted
            | ChangeType::CellInserted
            | ChangeType::CellDeleted
            | ChangeType::Unknown => None,
        }
    }
}

impl fmt::Debug for ChangeHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHandlers")
            .field("on_row_deleted", &self.on_row_deleted.is_some())
            .field("on_row_inserted", &self.on_row_inserted.is_some())
            .field("on_range_edited", &self.on_range_edited.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub enum Dispatch {
    /// Every accepted event goes to one handler
    Any(Handler),
    /// Changed events are routed by kind
    Changes(ChangeHandlers),
}

/// A handler plus an optional filter.
#[derive(Clone)]
pub struct Listener {
    pub predicate: Option<Predicate>,
    pub dispatch: Dispatch,
}

impl Listener {
    pub fn new(handler: impl Fn(EventPayload) + Send + Sync + 'static) -> Self {
        Self {
            predicate: None,
            dispatch: Dispatch::Any(Arc::new(handler)),
        }
    }

    pub fn changes(handlers: ChangeHandlers) -> Self {
        Self {
            predicate: None,
            dispatch: Dispatch::Changes(handlers),
        }
    }

    /// Only deliver events the predicate accepts
    pub fn filter(
        mut self,
        predicate: impl Fn(&EventPayload) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    fn deliver(&self, payload: EventPayload) {
        if let Some(predicate) = &self.predicate {
            if !predicate(&payload) {
                return;
            }
        }
        match &self.dispatch {
            Dispatch::Any(handler) => handler(payload),
            Dispatch::Changes(handlers) => {
                let handler = payload
                    .change_type
                    .and_then(|change| handlers.handler_for(change));
                match handler {
                    Some(handler) => handler(payload),
                    None => tracing::trace!(
                        change = ?payload.change_type,
                        "no handler for change kind"
                    ),
                }
            }
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("filtered", &self.predicate.is_some())
            .finish_non_exhaustive()
    }
}

/// A live registration; pass it to [`EventBridge::unregister`] to stop it.
///
/// Dropping the handle does not unregister.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    source: EventSource,
    active: Arc<Mutex<bool>>,
    pump: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn source(&self) -> &EventSource {
        &self.source
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Registers listeners on host event sources.
#[derive(Debug, Clone)]
pub struct EventBridge {
    client: CommandBatchClient,
}

impl EventBridge {
    pub fn new(client: CommandBatchClient) -> Self {
        Self { client }
    }

    /// Attach `listener` to `source`
    ///
    /// A source bound to one worksheet is loaded first, so a missing sheet
    /// fails the registration instead of yielding a silent subscription.
    pub async fn register(
        &self,
        operation: &'static str,
        source: EventSource,
        listener: Listener,
    ) -> Outcome<SubscriptionHandle> {
        let client = self.client.clone();
        self.client
            .run(operation, |ctx| async move {
                if let Some(sheet) = source.sheet() {
                    let info = WorksheetProxy::new(ctx.clone(), sheet.clone())
                        .load::<WorksheetInfo>()?;
                    ctx.flush().await?;
                    let info = info.into_value()?;
                    tracing::debug!(sheet = %info.name, ?source, "registering event handler");
                }
                let (id, events) = ctx.session().subscribe(source.clone()).await?;
                let active = Arc::new(Mutex::new(true));
                let pump = tokio::spawn(pump(
                    client,
                    operation,
                    events,
                    Arc::new(listener),
                    active.clone(),
                ));
                Ok(SubscriptionHandle {
                    id,
                    source,
                    active,
                    pump,
                })
            })
            .await
    }

    /// Stop a registration
    ///
    /// No handler invocation starts after this returns; one already running
    /// finishes first.
    pub async fn unregister(&self, handle: SubscriptionHandle) -> bool {
        *handle.active.lock() = false;
        handle.pump.abort();
        let id = handle.id;
        self.client
            .run("removeEventHandler", |ctx| async move {
                ctx.session().unsubscribe(id).await?;
                Ok(())
            })
            .await
            .is_ok()
    }
}

async fn pump(
    client: CommandBatchClient,
    operation: &'static str,
    mut events: EventStream,
    listener: Arc<Listener>,
    active: Arc<Mutex<bool>>,
) {
    while let Some(event) = events.recv().await {
        if !*active.lock() {
            break;
        }
        tracing::debug!(?event, operation, "host event");
        tokio::spawn(handle_event(
            client.clone(),
            operation,
            event,
            listener.clone(),
            active.clone(),
        ));
    }
}

async fn handle_event(
    client: CommandBatchClient,
    operation: &'static str,
    event: HostEvent,
    listener: Arc<Listener>,
    active: Arc<Mutex<bool>>,
) {
    let resolved = client.run(operation, |ctx| resolve(ctx, event)).await;
    let Outcome::Ok(payload) = resolved else {
        return;
    };
    let guard = active.lock();
    if *guard {
        listener.deliver(payload);
    }
}

async fn resolve(ctx: BatchContext, event: HostEvent) -> Result<EventPayload> {
    let sheet = WorksheetProxy::new(ctx.clone(), SheetKey::Key(event.worksheet_id.clone()));
    let info = sheet.load::<WorksheetInfo>()?;
    ctx.flush().await?;
    let info = info.into_value()?;
    Ok(EventPayload {
        source_name: info.name,
        source_id: info.id,
        change_type: event.change_type,
        raw: event,
    })
}
