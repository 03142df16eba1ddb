//! Batching, ordering and fail-soft reporting.

use std::future::Future;

use crate::{fixture, Fixture};
use excel_gateway::{
    grid, AddWorksheetOptions, CellValue, CellValueRule, ChangeHandlers, ClearScope,
    CommentContentType, ConditionalFormatItem, EventSource, FillItem, FormatOverrides,
    FormulaItem, GatewayError, HostError, Hyperlink, HyperlinkItem, ListValidationItem, Listener,
    MemoryHost, NumberFormatItem, PromptItem, SheetKey, TableConfig, ValueOperator,
    WorksheetInfo, WorksheetProxy,
};
use pretty_assertions::assert_eq;

fn stock_table() -> TableConfig {
    TableConfig {
        name: "Stock".into(),
        address: "A1:B1".into(),
        header: vec!["Item".into(), "Qty".into()],
        rows: grid([["pen", "3"], ["ink", "1"], ["pad", "7"]]),
        number_formats: None,
    }
}

/// A gateway over one sheet holding the `Stock` table
async fn stocked() -> Fixture {
    let fx = fixture(MemoryHost::new());
    fx.gateway.insert_table("Sheet1", &stock_table()).await.unwrap();
    fx
}

/// Reject the next round-trip, run `call`, and check that it was logged
/// exactly once under `operation`
async fn fails_soft<T>(fx: &Fixture, operation: &str, call: impl Future<Output = T>) -> T {
    fx.sink.clear();
    fx.host
        .fail_next_batch(HostError::new("GeneralException", "host rejected the batch"));
    let result = call.await;
    let entries = fx.sink.entries();
    assert_eq!(entries.len(), 1, "{operation} should log once");
    assert_eq!(entries[0].operation, operation);
    fx.host.clear_faults();
    result
}

#[tokio::test]
async fn test_commands_run_in_queue_order() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    let outcome = gateway
        .client()
        .run("setThenClear", |ctx| async move {
            let cell = WorksheetProxy::new(ctx.clone(), SheetKey::from("Sheet1")).range("A1");
            cell.set_values(grid([["draft"]]))?;
            cell.clear(ClearScope::Contents)?;
            ctx.flush().await
        })
        .await;
    assert!(outcome.is_ok());
    assert!(sink.is_empty());

    let batches = host.batches();
    assert_eq!(batches.len(), 1);
    let names: Vec<&str> = batches[0].iter().map(|c| c.operation.name()).collect();
    assert_eq!(names, vec!["setValues", "clear"]);
    assert_eq!(host.workbook().sheet("Sheet1").unwrap().value("A1"), CellValue::Null);
}

#[tokio::test]
async fn test_failed_round_trip_logs_once() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    host.fail_next_batch(HostError::new("ConnectionLost", "bridge went away"));

    assert_eq!(gateway.worksheet_count(false).await, None);

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].component, "gateway-tests");
    assert_eq!(entries[0].operation, "worksheetCount");
    assert!(entries[0].message.contains("bridge went away"));

    // The fault was consumed; the next call goes through
    assert_eq!(gateway.worksheet_count(false).await, Some(1));
    assert_eq!(sink.len(), 1);
}

#[tokio::test]
async fn test_failing_command_rolls_back_batch() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    host.fail_operation("setHorizontalAlignment", HostError::new("GeneralException", "nope"));

    let written = gateway
        .set_range_values("Sheet1", "A1:B1", grid([["a", "b"]]))
        .await;
    assert_eq!(written, None);
    assert_eq!(host.workbook().sheet("Sheet1").unwrap().value("A1"), CellValue::Null);
    assert_eq!(sink.len(), 1);

    host.clear_faults();
    assert!(gateway
        .set_range_values("Sheet1", "A1:B1", grid([["a", "b"]]))
        .await
        .is_some());
    assert_eq!(
        host.workbook().sheet("Sheet1").unwrap().value("B1"),
        CellValue::from("b")
    );
}

#[tokio::test]
async fn test_aborted_commands_report_aborted() {
    let Fixture { host, gateway, .. } = fixture(MemoryHost::new());
    host.fail_operation("setValues", HostError::new("InvalidArgument", "bad"));

    let result = gateway
        .client()
        .run("abortedRead", |ctx| async move {
            let sheet = WorksheetProxy::new(ctx.clone(), SheetKey::from("Sheet1"));
            sheet.range("A1").set_values(grid([[1]]))?;
            let info = sheet.load::<excel_gateway::WorksheetInfo>()?;
            let _ = ctx.flush().await;
            info.await
        })
        .await
        .into_result();
    let message = result.unwrap_err();
    assert_eq!(message, GatewayError::Aborted.to_string());
}

#[tokio::test]
async fn test_contexts_are_independent() {
    let Fixture { host, gateway, .. } = fixture(MemoryHost::new());
    let client = gateway.client();
    let (first, second) = (client.open(), client.open());

    let sheet = WorksheetProxy::new(first.clone(), SheetKey::from("Sheet1"));
    sheet.range("A1").set_values(grid([["first"]])).unwrap();
    let other = WorksheetProxy::new(second.clone(), SheetKey::from("Sheet1"));
    other.range("B1").set_values(grid([["second"]])).unwrap();

    second.flush().await.unwrap();
    assert_eq!(first.queued(), 1);
    assert_eq!(host.batches()[0].len(), 1);
    first.flush().await.unwrap();

    let workbook = host.workbook();
    let sheet1 = workbook.sheet("Sheet1").unwrap();
    assert_eq!(sheet1.value("A1"), CellValue::from("first"));
    assert_eq!(sheet1.value("B1"), CellValue::from("second"));
}

#[tokio::test]
async fn test_update_table_takes_four_round_trips() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    let config = TableConfig {
        name: "Stock".into(),
        address: "A1:B1".into(),
        header: vec!["Item".into(), "Qty".into()],
        rows: grid([["pen", "3"], ["ink", "1"], ["pad", "7"]]),
        number_formats: None,
    };
    gateway.insert_table("Sheet1", &config).await.unwrap();
    let before = host.batch_count();

    let info = gateway
        .update_table("Sheet1", "Stock", grid([["cap", "2"]]))
        .await
        .unwrap();
    assert_eq!(info.name, "Stock");
    assert_eq!(host.batch_count() - before, 4);
    assert!(sink.is_empty());

    let body = gateway.table_column_values("Sheet1", "Stock", "Item").await;
    assert_eq!(body, Some(vec!["cap".to_string()]));
}

#[tokio::test]
async fn test_worksheet_operations_fail_soft() {
    let fx = stocked().await;
    let gw = &fx.gateway;

    assert!(fails_soft(&fx, "listWorksheets", gw.list_worksheets()).await.is_none());
    assert!(fails_soft(&fx, "activeWorksheet", gw.active_worksheet()).await.is_none());
    assert!(fails_soft(&fx, "activateWorksheet", gw.activate_worksheet("Sheet1"))
        .await
        .is_none());
    assert!(fails_soft(
        &fx,
        "addWorksheet",
        gw.add_worksheet(Some("Extra"), AddWorksheetOptions::default())
    )
    .await
    .is_none());
    assert!(fails_soft(&fx, "showWorksheet", gw.show_worksheet("Sheet1")).await.is_none());
    assert!(fails_soft(&fx, "hideWorksheet", gw.hide_worksheet("Sheet1")).await.is_none());
    assert!(fails_soft(&fx, "protectWorksheet", gw.protect_worksheet("Sheet1"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "unprotectWorksheet", gw.unprotect_worksheet("Sheet1"))
        .await
        .is_none());
    assert!(fails_soft(
        &fx,
        "pauseWorksheetProtection",
        gw.pause_worksheet_protection("Sheet1")
    )
    .await
    .is_none());
    assert!(fails_soft(
        &fx,
        "resumeWorksheetProtection",
        gw.resume_worksheet_protection("Sheet1")
    )
    .await
    .is_none());
    assert!(fails_soft(&fx, "renameWorksheet", gw.rename_worksheet("Sheet1", "Renamed"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "usedRange", gw.used_range("Sheet1")).await.is_none());
    assert!(fails_soft(&fx, "nextAvailableRow", gw.next_available_row("Sheet1"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "freezeRange", gw.freeze_range("Sheet1", "B2"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "freezeRows", gw.freeze_rows("Sheet1", 1)).await.is_none());
    assert!(fails_soft(&fx, "freezeColumns", gw.freeze_columns("Sheet1", 1))
        .await
        .is_none());
    assert!(fails_soft(
        &fx,
        "freezeColumnsAndRows",
        gw.freeze_columns_and_rows("Sheet1", 1, 1)
    )
    .await
    .is_none());
    assert!(fails_soft(&fx, "autofitColumns", gw.autofit_columns("Sheet1"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "autofitColumnsAndRows", gw.autofit_columns_and_rows("Sheet1"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "setColumnWidth", gw.set_column_width("Sheet1", "A:B", 40.0))
        .await
        .is_none());
    assert!(fails_soft(&fx, "wrapText", gw.wrap_text("Sheet1", "A1:B4")).await.is_none());
    assert!(fails_soft(&fx, "unwrapText", gw.unwrap_text("Sheet1")).await.is_none());
    assert!(!fails_soft(&fx, "setColumnsHidden", gw.set_columns_hidden("Sheet1", "C:D", true))
        .await);

    // Nothing above left a trace on the workbook
    let workbook = fx.host.workbook();
    assert_eq!(workbook.sheet_names(), vec!["Sheet1".to_string()]);
    let sheet1 = workbook.sheet("Sheet1").unwrap();
    assert_eq!((sheet1.frozen_rows, sheet1.frozen_columns), (0, 0));
    assert!(sheet1.protection.is_none() && sheet1.hidden_columns.is_empty());
    assert_eq!(
        gw.ensure_worksheet("Sheet1").await.map(|info: WorksheetInfo| info.name),
        Some("Sheet1".to_string())
    );
}

#[tokio::test]
async fn test_table_operations_fail_soft() {
    let fx = stocked().await;
    let gw = &fx.gateway;
    let orders = TableConfig {
        name: "Orders".into(),
        address: "E1:F1".into(),
        ..stock_table()
    };

    assert!(fails_soft(&fx, "listWorksheetTables", gw.list_worksheet_tables("Sheet1"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "listTables", gw.list_tables()).await.is_none());
    assert!(fails_soft(&fx, "insertTable", gw.insert_table("Sheet1", &orders))
        .await
        .is_none());
    assert!(fails_soft(
        &fx,
        "updateTable",
        gw.update_table("Sheet1", "Stock", grid([["cap", "2"]]))
    )
    .await
    .is_none());
    assert!(fails_soft(&fx, "renameTable", gw.rename_table("Stock", "Goods"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "sortTable", gw.sort_table("Sheet1", "Stock", 0, true))
        .await
        .is_none());
    assert!(fails_soft(&fx, "clearTableFilters", gw.clear_table_filters("Sheet1", "Stock"))
        .await
        .is_none());
    assert!(fails_soft(
        &fx,
        "deleteTableRowAt",
        gw.delete_table_row_at("Sheet1", "Stock", 0)
    )
    .await
    .is_none());
    assert!(fails_soft(
        &fx,
        "tableColumnValues",
        gw.table_column_values("Sheet1", "Stock", "Item")
    )
    .await
    .is_none());
    assert!(fails_soft(&fx, "tableBodyExtent", gw.table_body_extent("Sheet1", "Stock"))
        .await
        .is_none());
    assert!(fails_soft(
        &fx,
        "tableColumnBodyAddress",
        gw.table_column_body_address("Sheet1", "Stock", "B")
    )
    .await
    .is_none());
    assert!(fails_soft(
        &fx,
        "tableNamedColumnAddress",
        gw.table_named_column_address("Sheet1", "Stock", "Qty")
    )
    .await
    .is_none());

    // The table is untouched
    let items = gw.table_column_values("Sheet1", "Stock", "Item").await;
    assert_eq!(
        items,
        Some(vec!["pen".to_string(), "ink".to_string(), "pad".to_string()])
    );
    assert!(gw.list_tables().await.unwrap().iter().all(|t| t.name == "Stock"));
}

#[tokio::test]
async fn test_range_and_format_operations_fail_soft() {
    let fx = stocked().await;
    let gw = &fx.gateway;
    let formula = [FormulaItem {
        address: "C2".into(),
        formula: "=B2*2".into(),
    }];
    let number_formats = [NumberFormatItem {
        address: "B2:B4".into(),
        number_format: "0.00".into(),
    }];
    let fills = [FillItem {
        address: "A2".into(),
        background: Some("#FFFF00".into()),
        text: None,
    }];
    let rule = CellValueRule::new(ValueOperator::GreaterThan, "5");
    let conditional = [ConditionalFormatItem {
        address: "B2:B4".into(),
        rule: rule.clone(),
        format: FormatOverrides {
            fill_color: Some("#FF0000".into()),
            ..FormatOverrides::default()
        },
    }];
    let lists = [ListValidationItem {
        address: "A2:A4".into(),
        source: "pen,ink,pad".into(),
    }];
    let prompts = [PromptItem {
        address: "A2".into(),
        title: "Item".into(),
        message: "Pick an item".into(),
    }];
    let links = [HyperlinkItem {
        address: "D1".into(),
        hyperlink: Hyperlink::new("https://example.com"),
    }];

    assert!(fails_soft(&fx, "rangeValues", gw.range_values("Sheet1", "A1:B2"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "cellValue", gw.cell_value("Sheet1", "A2")).await.is_none());
    assert!(fails_soft(&fx, "cellsValue", gw.cells_value("Sheet1", "A2:A4"))
        .await
        .is_none());
    assert!(fails_soft(&fx, "setCellValue", gw.set_cell_value("Sheet1", "D5", "x"))
        .await
        .is_none());
    assert!(fails_soft(
        &fx,
        "setRangeOfCellsValue",
        gw.set_range_of_cells_value("Sheet1", "D5:E5", grid([["x", "y"]]))
    )
    .await
    .is_none());
    assert!(!fails_soft(&fx, "setFormulas", gw.set_formulas("Sheet1", &formula)).await);
    assert!(!fails_soft(&fx, "clearContents", gw.clear_contents("Sheet1", &["A2"])).await);

    assert!(fails_soft(&fx, "numberFormat", gw.number_format("Sheet1", "B2"))
        .await
        .is_none());
    assert!(fails_soft(
        &fx,
        "setNumberFormat",
        gw.set_number_format("Sheet1", "B2", vec![vec!["0.00".into()]])
    )
    .await
    .is_none());
    assert!(!fails_soft(
        &fx,
        "setTableNumberFormats",
        gw.set_table_number_formats("Sheet1", &number_formats)
    )
    .await);
    assert!(!fails_soft(&fx, "colorCells", gw.color_cells("Sheet1", &fills)).await);
    assert!(!fails_soft(&fx, "clearBackground", gw.clear_background("Sheet1", "A2")).await);
    assert!(!fails_soft(
        &fx,
        "clearRowsBackground",
        gw.clear_rows_background("Sheet1", &["A2:B2"])
    )
    .await);
    assert!(fails_soft(
        &fx,
        "setConditionalFormat",
        gw.set_conditional_format("Sheet1", "B2:B4", rule, Some("#FF0000"), None)
    )
    .await
    .is_none());
    assert!(!fails_soft(
        &fx,
        "setTableConditionalFormats",
        gw.set_table_conditional_formats("Sheet1", &conditional)
    )
    .await);
    assert!(!fails_soft(
        &fx,
        "clearConditionalFormats",
        gw.clear_conditional_formats("Sheet1", "B2:B4")
    )
    .await);
    assert!(fails_soft(
        &fx,
        "setListValidation",
        gw.set_list_validation("Sheet1", "A2:A4", "pen,ink,pad")
    )
    .await
    .is_none());
    assert!(!fails_soft(&fx, "setListValidations", gw.set_list_validations("Sheet1", &lists))
        .await);
    assert!(!fails_soft(
        &fx,
        "setValidationPrompts",
        gw.set_validation_prompts("Sheet1", &prompts)
    )
    .await);
    assert!(!fails_soft(&fx, "clearValidation", gw.clear_validation("Sheet1", "A2:A4")).await);
    assert!(!fails_soft(
        &fx,
        "clearValidations",
        gw.clear_validations("Sheet1", &["A2:A4"])
    )
    .await);
    assert!(!fails_soft(&fx, "setHyperlinks", gw.set_hyperlinks("Sheet1", &links)).await);
    assert!(!fails_soft(&fx, "clearHyperlinks", gw.clear_hyperlinks("Sheet1", "D1")).await);
    assert!(!fails_soft(
        &fx,
        "addComment",
        gw.add_comment("Sheet1", "A2", "check stock", CommentContentType::Plain)
    )
    .await);

    assert_eq!(
        gw.cell_value("Sheet1", "A2").await.as_deref(),
        Some("pen")
    );
}

#[tokio::test]
async fn test_handler_registration_fails_soft() {
    let fx = stocked().await;
    let gw = &fx.gateway;

    assert!(fails_soft(
        &fx,
        "addWorksheetActivatedHandler",
        gw.on_worksheet_activated("Sheet1", |_| {})
    )
    .await
    .is_none());
    assert!(fails_soft(
        &fx,
        "addWorksheetClickedHandler",
        gw.on_worksheet_clicked("Sheet1", |_| {})
    )
    .await
    .is_none());
    assert!(fails_soft(
        &fx,
        "addWorksheetChangedHandler",
        gw.on_worksheet_changed("Sheet1", ChangeHandlers::new())
    )
    .await
    .is_none());
    assert!(fails_soft(
        &fx,
        "addEventHandler",
        gw.subscribe(
            EventSource::WorksheetClicked {
                sheet: SheetKey::from("Sheet1"),
            },
            Listener::new(|_| {}),
        )
    )
    .await
    .is_none());

    assert_eq!(fx.host.subscription_count(), 0);
}

#[tokio::test]
async fn test_update_table_failing_midway_keeps_rows() {
    let fx = stocked().await;
    fx.host.fail_operation("deleteRows", HostError::new("GeneralException", "locked"));
    let before = fx.host.batch_count();

    let updated = fx
        .gateway
        .update_table("Sheet1", "Stock", grid([["cap", "2"]]))
        .await;
    assert!(updated.is_none());
    // The row count was read, the delete failed, nothing after it ran
    assert_eq!(fx.host.batch_count() - before, 2);
    let entries = fx.sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, "updateTable");
    assert!(entries[0].message.contains("locked"));

    fx.host.clear_faults();
    let items = fx.gateway.table_column_values("Sheet1", "Stock", "Item").await;
    assert_eq!(
        items,
        Some(vec!["pen".to_string(), "ink".to_string(), "pad".to_string()])
    );
}

#[tokio::test]
async fn test_values_read_before_a_failure_are_aborted() {
    let Fixture { host, gateway, .. } = fixture(MemoryHost::new());
    host.fail_operation("clear", HostError::new("InvalidArgument", "bad"));

    let result = gateway
        .client()
        .run("readThenFail", |ctx| async move {
            let sheet = WorksheetProxy::new(ctx.clone(), SheetKey::from("Sheet1"));
            let info = sheet.load::<WorksheetInfo>()?;
            sheet.range("A1").clear(ClearScope::Contents)?;
            let _ = ctx.flush().await;
            info.await
        })
        .await
        .into_result();
    assert_eq!(result.unwrap_err(), GatewayError::Aborted.to_string());
}
