//! Event handler registration

use excel_gateway_protocol::{EventSource, SheetKey};

use super::SheetGateway;
use crate::events::{ChangeHandlers, EventPayload, Listener, SubscriptionHandle};

impl SheetGateway {
    /// Call `handler` whenever `sheet` becomes the active worksheet
    pub async fn on_worksheet_activated(
        &self,
        sheet: &str,
        handler: impl Fn(EventPayload) + Send + Sync + 'static,
    ) -> Option<SubscriptionHandle> {
        let source = EventSource::WorksheetActivated {
            sheet: SheetKey::from(sheet),
        };
        self.subscribe_as("addWorksheetActivatedHandler", source, Listener::new(handler))
            .await
    }

    /// Call `handler` whenever any worksheet becomes active
    pub async fn on_any_worksheet_activated(
        &self,
        handler: impl Fn(EventPayload) + Send + Sync + 'static,
    ) -> Option<SubscriptionHandle> {
        self.subscribe_as(
            "addWorksheetsActivatedHandler",
            EventSource::AnyWorksheetActivated,
            Listener::new(handler),
        )
        .await
    }

    pub async fn on_worksheet_clicked(
        &self,
        sheet: &str,
        handler: impl Fn(EventPayload) + Send + Sync + 'static,
    ) -> Option<SubscriptionHandle> {
        let source = EventSource::WorksheetClicked {
            sheet: SheetKey::from(sheet),
        };
        self.subscribe_as("addWorksheetClickedHandler", source, Listener::new(handler))
            .await
    }

    /// Route data changes on `sheet` to the matching handler in `handlers`
    pub async fn on_worksheet_changed(
        &self,
        sheet: &str,
        handlers: ChangeHandlers,
    ) -> Option<SubscriptionHandle> {
        let source = EventSource::WorksheetChanged {
            sheet: SheetKey::from(sheet),
        };
        self.subscribe_as("addWorksheetChangedHandler", source, Listener::changes(handlers))
            .await
    }

    /// Attach any listener, filtered or not, to any source
    pub async fn subscribe(
        &self,
        source: EventSource,
        listener: Listener,
    ) -> Option<SubscriptionHandle> {
        self.subscribe_as("addEventHandler", source, listener).await
    }

    /// Detach a handler registered through this gateway
    pub async fn unregister(&self, handle: SubscriptionHandle) -> bool {
        self.events.unregister(handle).await
    }

    async fn subscribe_as(
        &self,
        operation: &'static str,
        source: EventSource,
        listener: Listener,
    ) -> Option<SubscriptionHandle> {
        self.events.register(operation, source, listener).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::super::tests::gateway_on;
    use crate::host::MemoryHost;
    use excel_gateway_protocol::HostEvent;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_unknown_sheet_is_not_registered() {
        let (host, sink, gateway) = gateway_on(MemoryHost::new());
        let handle = gateway.on_worksheet_activated("Missing", |_| {}).await;
        assert!(handle.is_none());
        assert_eq!(host.subscription_count(), 0);
        assert_eq!(sink.entries()[0].operation, "addWorksheetActivatedHandler");
    }

    #[tokio::test]
    async fn test_activation_reaches_handler() {
        let (host, _sink, gateway) = gateway_on(MemoryHost::with_sheets(["Sheet1", "Data"]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let handle = gateway
            .on_any_worksheet_activated(move |payload| recorded.lock().push(payload.source_name))
            .await
            .unwrap();
        assert_eq!(host.subscription_count(), 1);

        let data_id = host.workbook().sheet("Data").unwrap().id.clone();
        host.emit(HostEvent::activated(data_id));
        for _ in 0..50 {
            if !seen.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*seen.lock(), vec!["Data".to_string()]);

        assert!(gateway.unregister(handle).await);
        assert_eq!(host.subscription_count(), 0);
    }
}
