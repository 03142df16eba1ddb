//! Worksheet lifecycle, protection and layout.

use crate::{fixture, Fixture, SECRET};
use excel_gateway::{
    AddWorksheetOptions, CellValue, MemoryHost, Visibility, DEFAULT_COLUMN_WIDTH,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_worksheet_lifecycle() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());

    let added = gateway
        .add_worksheet(
            Some("Budget"),
            AddWorksheetOptions {
                activate: true,
                ..AddWorksheetOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(gateway.active_worksheet().await.unwrap().id, added.id);

    let renamed = gateway.rename_worksheet("Budget", "Budget 2024").await.unwrap();
    assert_eq!(renamed.id, added.id);
    assert_eq!(renamed.name, "Budget 2024");

    let hidden = gateway.hide_worksheet("Budget 2024").await.unwrap();
    assert_eq!(hidden.visibility, Visibility::Hidden);
    assert_eq!(gateway.worksheet_count(true).await, Some(1));
    assert_eq!(gateway.worksheet_count(false).await, Some(2));

    let shown = gateway.show_worksheet("Budget 2024").await.unwrap();
    assert_eq!(shown.visibility, Visibility::Visible);

    let names: Vec<String> = gateway
        .list_worksheets()
        .await
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(names, vec!["Sheet1", "Budget 2024"]);

    assert!(gateway.delete_worksheet("Budget 2024").await);
    assert_eq!(gateway.ensure_worksheet("Budget 2024").await, None);
    assert_eq!(host.workbook().sheet_names(), vec!["Sheet1"]);

    // Only the lookup of the deleted sheet failed
    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, "ensureWorksheet");
}

#[tokio::test]
async fn test_last_visible_sheet_cannot_be_deleted() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    assert!(!gateway.delete_worksheet("Sheet1").await);
    assert_eq!(host.workbook().sheet_names(), vec!["Sheet1"]);
    assert_eq!(sink.entries()[0].operation, "deleteWorksheet");
}

#[tokio::test]
async fn test_protection_pause_and_resume() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    gateway.protect_worksheet("Sheet1").await.unwrap();
    assert_eq!(
        host.workbook().sheet("Sheet1").unwrap().protection.as_ref().unwrap().password.as_deref(),
        Some(SECRET)
    );

    assert_eq!(gateway.set_cell_value("Sheet1", "A1", "locked").await, None);
    assert_eq!(sink.len(), 1);

    gateway.pause_worksheet_protection("Sheet1").await.unwrap();
    assert_eq!(
        gateway.set_cell_value("Sheet1", "A1", "paused").await,
        Some(CellValue::from("paused"))
    );

    gateway.resume_worksheet_protection("Sheet1").await.unwrap();
    assert_eq!(gateway.set_cell_value("Sheet1", "A1", "again").await, None);
    assert_eq!(sink.len(), 2);

    gateway.unprotect_worksheet("Sheet1").await.unwrap();
    assert!(host.workbook().sheet("Sheet1").unwrap().protection.is_none());
    assert!(gateway.set_cell_value("Sheet1", "A1", "open").await.is_some());
}

#[tokio::test]
async fn test_freeze_and_column_layout() {
    let Fixture { host, gateway, .. } = fixture(MemoryHost::new());
    gateway.freeze_columns_and_rows("Sheet1", 2, 1).await.unwrap();
    {
        let workbook = host.workbook();
        let sheet = workbook.sheet("Sheet1").unwrap();
        assert_eq!((sheet.frozen_columns, sheet.frozen_rows), (2, 1));
    }

    gateway.wrap_text("Sheet1", "B1:B4").await.unwrap();
    assert!(gateway.set_columns_hidden("Sheet1", "D:E", true).await);

    let workbook = host.workbook();
    let sheet = workbook.sheet("Sheet1").unwrap();
    assert_eq!(sheet.column_widths.get(&2), Some(&DEFAULT_COLUMN_WIDTH));
    assert!(sheet.cell("B3").unwrap().wrap_text);
    assert!(sheet.hidden_columns.contains(&4));
    assert!(sheet.hidden_columns.contains(&5));
}

#[tokio::test]
async fn test_bad_rename_is_rejected_locally() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    assert_eq!(gateway.rename_worksheet("Sheet1", "Q1/Q2").await, None);
    assert_eq!(host.batch_count(), 0);

    let entries = sink.entries();
    assert_eq!(entries[0].operation, "renameWorksheet");
    assert!(entries[0].message.contains("these characters"));
}
