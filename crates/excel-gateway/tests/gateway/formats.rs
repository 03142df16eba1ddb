//! Formatting, validation, hyperlinks and comments.

use crate::{fixture, Fixture};
use excel_gateway::{
    CommentContentType, ConditionalFormat, DataValidationRule, Hyperlink, HyperlinkItem,
    ListValidationItem, MemoryHost,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_list_validations_skip_empty_sources() {
    let Fixture { host, gateway, .. } = fixture(MemoryHost::new());
    let items = [
        ListValidationItem {
            address: "A2:A20".into(),
            source: "=Lists!$A$1:$A$5".into(),
        },
        ListValidationItem {
            address: "B2:B20".into(),
            source: String::new(),
        },
    ];
    assert!(gateway.set_list_validations("Sheet1", &items).await);
    assert_eq!(
        gateway.set_list_validation("Sheet1", "C2", "Yes,No").await.as_deref(),
        Some("Yes,No")
    );

    let workbook = host.workbook();
    let validations = &workbook.sheet("Sheet1").unwrap().validations;
    assert_eq!(validations.len(), 2);
    assert_eq!(
        validations[0].1,
        DataValidationRule::List {
            source: "=Lists!$A$1:$A$5".into(),
            in_cell_dropdown: true,
        }
    );

    assert!(gateway.clear_validations("Sheet1", &["A1:C30"]).await);
    assert!(host.workbook().sheet("Sheet1").unwrap().validations.is_empty());
}

#[tokio::test]
async fn test_hyperlinks_and_comments() {
    let Fixture { host, gateway, .. } = fixture(MemoryHost::new());
    let mut link = Hyperlink::new("https://example.com/orders/7");
    link.text_to_display = Some("Order 7".into());
    let items = [HyperlinkItem {
        address: "D4".into(),
        hyperlink: link.clone(),
    }];
    assert!(gateway.set_hyperlinks("Sheet1", &items).await);
    assert_eq!(
        host.workbook().sheet("Sheet1").unwrap().cell("D4").unwrap().hyperlink,
        Some(link)
    );

    assert!(gateway
        .add_comment("Sheet1", "D4", "Check the total", CommentContentType::Plain)
        .await);
    assert!(gateway.clear_hyperlinks("Sheet1", "D1:D9").await);

    let workbook = host.workbook();
    let sheet = workbook.sheet("Sheet1").unwrap();
    assert!(sheet.cell("D4").map_or(true, |cell| cell.hyperlink.is_none()));
    assert_eq!(sheet.comments.len(), 1);
    assert_eq!((sheet.comments[0].row, sheet.comments[0].col), (4, 4));
}

#[tokio::test]
async fn test_invalid_formats_fail_soft() {
    let Fixture { host, sink, gateway } = fixture(MemoryHost::new());
    assert!(!gateway.color_cell("Sheet1", "A1", "#12345").await);
    assert!(!gateway.set_data_bar("Sheet1", "B1:B9", 10.0, 1.0, "#638EC6").await);
    assert!(gateway.set_data_bar("Sheet1", "B1:B9", 0.0, 100.0, "#638EC6").await);

    let operations: Vec<String> = sink.entries().into_iter().map(|e| e.operation).collect();
    assert_eq!(operations, vec!["colorCell", "setDataBar"]);

    let workbook = host.workbook();
    let formats = &workbook.sheet("Sheet1").unwrap().conditional_formats;
    assert!(matches!(
        formats.as_slice(),
        [(_, ConditionalFormat::DataBar { left_to_right: true, .. })]
    ));
}
