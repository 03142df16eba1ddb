//! Event registration and routing.

use std::sync::Arc;

use crate::{fixture, settle, wait_until, Fixture};
use excel_gateway::{
    ChangeHandlers, ChangeType, EventPayload, EventSource, HostEvent, Listener, MemoryHost, SheetKey,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

type Seen = Arc<Mutex<Vec<String>>>;

fn recorder(seen: &Seen, label: &'static str) -> impl Fn(EventPayload) + Send + Sync + 'static {
    let seen = seen.clone();
    move |payload| seen.lock().push(format!("{label}:{}", payload.source_name))
}

#[tokio::test]
async fn test_changes_are_routed_by_kind() {
    let Fixture { host, gateway, .. } = fixture(MemoryHost::new());
    let seen: Seen = Arc::default();
    let handlers = ChangeHandlers::new()
        .on_range_edited(recorder(&seen, "edited"))
        .on_row_deleted(recorder(&seen, "deleted"));
    let _handle = gateway.on_worksheet_changed("Sheet1", handlers).await.unwrap();

    let id = host.workbook().sheet("Sheet1").unwrap().id.clone();
    host.emit(HostEvent::changed(id.clone(), "A1", ChangeType::RowInserted));
    host.emit(HostEvent::changed(id.clone(), "A2", ChangeType::RowDeleted));
    // A write through the gateway is reported as an edit
    gateway.set_cell_value("Sheet1", "C3", 5.0).await.unwrap();

    assert!(wait_until(|| seen.lock().len() == 2).await);
    settle().await;
    // Each event is handled on its own task, so arrival order is not fixed
    let mut seen = seen.lock().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec!["deleted:Sheet1".to_string(), "edited:Sheet1".to_string()]
    );
}

#[tokio::test]
async fn test_click_handler_sees_only_its_sheet() {
    let Fixture { host, gateway, .. } =
        fixture(MemoryHost::with_sheets(["Sheet1", "Sheet2"]));
    let seen: Seen = Arc::default();
    let _handle = gateway
        .on_worksheet_clicked("Sheet2", recorder(&seen, "click"))
        .await
        .unwrap();

    let workbook = host.workbook();
    let (one, two) = (
        workbook.sheet("Sheet1").unwrap().id.clone(),
        workbook.sheet("Sheet2").unwrap().id.clone(),
    );
    host.emit(HostEvent::clicked(one, "B2"));
    host.emit(HostEvent::clicked(two, "B2"));

    assert!(wait_until(|| !seen.lock().is_empty()).await);
    settle().await;
    assert_eq!(*seen.lock(), vec!["click:Sheet2".to_string()]);
}

#[tokio::test]
async fn test_filtered_listener() {
    let Fixture { host, gateway, .. } = fixture(MemoryHost::new());
    let seen: Seen = Arc::default();
    let listener = Listener::new(recorder(&seen, "click"))
        .filter(|payload| payload.raw.address.as_deref() == Some("A1"));
    let _handle = gateway
        .subscribe(
            EventSource::WorksheetClicked {
                sheet: SheetKey::from("Sheet1"),
            },
            listener,
        )
        .await
        .unwrap();

    let id = host.workbook().sheet("Sheet1").unwrap().id.clone();
    host.emit(HostEvent::clicked(id.clone(), "Z9"));
    host.emit(HostEvent::clicked(id, "A1"));

    assert!(wait_until(|| !seen.lock().is_empty()).await);
    settle().await;
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_unregister_stops_delivery() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    let seen: Seen = Arc::default();
    let handle = gateway
        .on_worksheet_activated("Sheet1", recorder(&seen, "active"))
        .await
        .unwrap();
    let id = host.workbook().sheet("Sheet1").unwrap().id.clone();

    host.emit(HostEvent::activated(id.clone()));
    assert!(wait_until(|| seen.lock().len() == 1).await);

    assert!(gateway.unregister(handle).await);
    assert_eq!(host.subscription_count(), 0);
    host.emit(HostEvent::activated(id));
    settle().await;
    assert_eq!(seen.lock().len(), 1);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_events_for_deleted_sheet_are_logged() {
    let Fixture { host, sink, gateway } =
        fixture(MemoryHost::with_sheets(["Sheet1", "Sheet2"]));
    let seen: Seen = Arc::default();
    let _handle = gateway
        .on_any_worksheet_activated(recorder(&seen, "active"))
        .await
        .unwrap();

    host.emit(HostEvent::activated("{ws-9999}"));
    assert!(wait_until(|| !sink.is_empty()).await);
    assert_eq!(sink.entries()[0].operation, "addWorksheetsActivatedHandler");
    assert!(seen.lock().is_empty());
}
