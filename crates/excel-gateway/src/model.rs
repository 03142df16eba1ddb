//! Typed shapes of host property loads and facade inputs

use excel_gateway_protocol::{CellValue, CellValueRule, FormatOverrides, Hyperlink, Visibility};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A type decoded from a `Load` of a fixed property list.
pub trait Loadable: DeserializeOwned {
    const PROPERTIES: &'static [&'static str];
}

/// Members of a loaded collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Collection<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorksheetInfo {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
}

impl Loadable for WorksheetInfo {
    const PROPERTIES: &'static [&'static str] = &["id", "name", "visibility"];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    pub id: String,
    pub name: String,
}

impl Loadable for TableInfo {
    const PROPERTIES: &'static [&'static str] = &["id", "name"];
}

/// Header and body values of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub id: String,
    pub name: String,
    pub header_values: Vec<Vec<CellValue>>,
    pub body_values: Vec<Vec<CellValue>>,
}

impl Loadable for TableSnapshot {
    const PROPERTIES: &'static [&'static str] = &["id", "name", "headerValues", "bodyValues"];
}

/// Where a table's body sits on its sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableExtent {
    pub id: String,
    pub name: String,
    pub worksheet_name: String,
    /// 0-based sheet row of the first body row
    pub body_row_index: u32,
    /// Number of body rows
    pub row_count: u32,
}

impl TableExtent {
    /// Number of sheet rows covered by the header and body
    pub fn used_rows(&self) -> u32 {
        self.body_row_index + self.row_count
    }
}

impl Loadable for TableExtent {
    const PROPERTIES: &'static [&'static str] =
        &["id", "name", "worksheetName", "bodyRowIndex", "rowCount"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RowCount {
    pub row_count: u32,
}

impl Loadable for RowCount {
    const PROPERTIES: &'static [&'static str] = &["rowCount"];
}

/// Position of a table column on the sheet.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TableColumnInfo {
    pub name: String,
    /// 1-based sheet column
    pub sheet_column: u32,
}

impl Loadable for TableColumnInfo {
    const PROPERTIES: &'static [&'static str] = &["name", "sheetColumn"];
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct RangeAddress {
    pub address: String,
}

impl Loadable for RangeAddress {
    const PROPERTIES: &'static [&'static str] = &["address"];
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct RangeValues {
    pub values: Vec<Vec<CellValue>>,
}

impl Loadable for RangeValues {
    const PROPERTIES: &'static [&'static str] = &["values"];
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RangeNumberFormat {
    pub number_format: Vec<Vec<String>>,
}

impl Loadable for RangeNumberFormat {
    const PROPERTIES: &'static [&'static str] = &["numberFormat"];
}

/// Address and display name of one table column's body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnAddress {
    pub id: String,
    pub name: String,
    pub address: String,
}

/// Everything needed to create and fill a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableConfig {
    pub name: String,
    /// Range covering the header row, e.g. `A1:C1`
    pub address: String,
    pub header: Vec<CellValue>,
    pub rows: Vec<Vec<CellValue>>,
    /// Number format per column, applied to the body
    pub number_formats: Option<Vec<String>>,
}

/// Options for adding a worksheet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddWorksheetOptions {
    pub activate: bool,
    pub protect: bool,
    pub hidden: bool,
}

/// Background and text color for one range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillItem {
    pub address: String,
    pub background: Option<String>,
    pub text: Option<String>,
}

/// In-cell dropdown for one range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListValidationItem {
    pub address: String,
    pub source: String,
}

/// Input prompt for one range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptItem {
    pub address: String,
    pub title: String,
    pub message: String,
}

/// Number format for one range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormatItem {
    pub address: String,
    pub number_format: String,
}

/// Cell-value conditional format for one range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalFormatItem {
    pub address: String,
    pub rule: CellValueRule,
    pub format: FormatOverrides,
}

/// Hyperlink for one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperlinkItem {
    pub address: String,
    pub hyperlink: Hyperlink,
}

/// Formula for one range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaItem {
    pub address: String,
    pub formula: String,
}
