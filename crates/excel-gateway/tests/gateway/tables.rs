//! Table operations.

use crate::{fixture, Fixture};
use excel_gateway::{grid, CellValue, MemoryHost, TableConfig};
use pretty_assertions::assert_eq;

fn fruit() -> TableConfig {
    TableConfig {
        name: "Fruit".into(),
        address: "B2:C2".into(),
        header: vec!["Name".into(), "Count".into()],
        rows: grid([["pear", "4"], ["apple", "9"], ["fig", "1"]]),
        number_formats: None,
    }
}

fn names(snapshot_rows: &[Vec<CellValue>]) -> Vec<String> {
    snapshot_rows.iter().map(|row| row[0].to_text()).collect()
}

#[tokio::test]
async fn test_table_listing() {
    let Fixture { gateway, .. } = fixture(MemoryHost::with_sheets(["Sheet1", "Other"]));
    gateway.insert_table("Sheet1", &fruit()).await.unwrap();
    let mut second = fruit();
    second.name = "Veg".into();
    gateway.insert_table("Other", &second).await.unwrap();

    let on_sheet = gateway.list_worksheet_tables("Sheet1").await.unwrap();
    assert_eq!(on_sheet.len(), 1);
    assert_eq!(on_sheet[0].header_values, grid([["Name", "Count"]]));

    let all: Vec<String> = gateway
        .list_tables()
        .await
        .unwrap()
        .into_iter()
        .map(|table| table.name)
        .collect();
    assert_eq!(all, vec!["Fruit", "Veg"]);

    let fruit = gateway.ensure_table("Sheet1", "Fruit").await.unwrap();
    assert_eq!(names(&fruit.body_values), vec!["pear", "apple", "fig"]);
}

#[tokio::test]
async fn test_sort_and_delete_rows() {
    let Fixture { gateway, .. } = fixture(MemoryHost::new());
    gateway.insert_table("Sheet1", &fruit()).await.unwrap();

    gateway.sort_table("Sheet1", "Fruit", 0, true).await.unwrap();
    let sorted = gateway
        .table_column_values("Sheet1", "Fruit", "Name")
        .await
        .unwrap();
    assert_eq!(sorted, vec!["apple", "fig", "pear"]);

    gateway.delete_table_row_at("Sheet1", "Fruit", 1).await.unwrap();
    let remaining = gateway
        .table_column_values("Sheet1", "Fruit", "Name")
        .await
        .unwrap();
    assert_eq!(remaining, vec!["apple", "pear"]);

    let extent = gateway.table_body_extent("Sheet1", "Fruit").await.unwrap();
    assert_eq!((extent.body_row_index, extent.row_count), (2, 2));

    assert!(gateway.clear_table_filters("Sheet1", "Fruit").await.is_some());
}

#[tokio::test]
async fn test_rename_and_delete() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    gateway.insert_table("Sheet1", &fruit()).await.unwrap();

    let renamed = gateway.rename_table("Fruit", "Produce").await.unwrap();
    assert_eq!(renamed.name, "Produce");
    assert!(host.workbook().table("Produce").is_some());

    assert_eq!(gateway.rename_table("Produce", "").await, None);
    assert_eq!(sink.entries()[0].operation, "renameTable");

    assert!(gateway.delete_table("Sheet1", "Produce").await);
    assert!(host.workbook().table("Produce").is_none());
    assert_eq!(host.workbook().sheet("Sheet1").unwrap().value("B3"), CellValue::Null);
}

#[tokio::test]
async fn test_missing_table_fails_soft() {
    let Fixture { sink, gateway, .. } = fixture(MemoryHost::new());
    assert_eq!(gateway.ensure_table("Sheet1", "Nope").await, None);
    assert!(!gateway.delete_table("Sheet1", "Nope").await);
    let operations: Vec<String> = sink.entries().into_iter().map(|e| e.operation).collect();
    assert_eq!(operations, vec!["ensureTable", "deleteTable"]);
}
