//! Value objects carried by formatting, validation and sheet-state operations

use serde::{Deserialize, Serialize};

/// Comparison used by cell-value conditional formats and data validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueOperator {
    Invalid,
    Between,
    NotBetween,
    EqualTo,
    NotEqualTo,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

/// `formula1` (and `formula2` for the two-sided operators) compared with `operator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellValueRule {
    pub formula1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula2: Option<String>,
    pub operator: ValueOperator,
}

impl CellValueRule {
    pub fn new(operator: ValueOperator, formula1: impl Into<String>) -> Self {
        Self {
            formula1: formula1.into(),
            formula2: None,
            operator,
        }
    }

    pub fn between(formula1: impl Into<String>, formula2: impl Into<String>) -> Self {
        Self {
            formula1: formula1.into(),
            formula2: Some(formula2.into()),
            operator: ValueOperator::Between,
        }
    }
}

/// Formatting applied when a conditional format matches; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
}

/// Conditional formats a range can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConditionalFormat {
    CellValue {
        rule: CellValueRule,
        #[serde(default)]
        format: FormatOverrides,
    },
    /// Gradient-free data bar scaled between two fixed values.
    #[serde(rename_all = "camelCase")]
    DataBar {
        lower: f64,
        upper: f64,
        color: String,
        left_to_right: bool,
    },
}

/// Data validation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataValidationRule {
    /// In-cell dropdown drawing its choices from `source` (a range address or
    /// a comma-separated list).
    #[serde(rename_all = "camelCase")]
    List {
        source: String,
        in_cell_dropdown: bool,
    },
    WholeNumber {
        rule: CellValueRule,
    },
    Decimal {
        rule: CellValueRule,
    },
    TextLength {
        rule: CellValueRule,
    },
}

/// Input message shown when a validated cell is selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationPrompt {
    pub show_prompt: bool,
    pub title: String,
    pub message: String,
}

/// Hyperlink attached to a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hyperlink {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_to_display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_tip: Option<String>,
}

impl Hyperlink {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            text_to_display: None,
            screen_tip: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommentContentType {
    #[default]
    Plain,
    Mention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearScope {
    All,
    Contents,
    Formats,
    Hyperlinks,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HorizontalAlignment {
    #[default]
    General,
    Left,
    Center,
    Right,
}

/// One key of a table sort: `key` is the 0-based column within the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub key: u32,
    pub ascending: bool,
}

/// What a protected sheet still allows; unset fields take the host default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_auto_filter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_sort: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_format_cells: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_format_columns: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_insert_rows: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_delete_rows: Option<bool>,
}
