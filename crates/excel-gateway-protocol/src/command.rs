//! Object references and the operations a batch can carry

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::format::{
    ClearScope, CommentContentType, ConditionalFormat, DataValidationRule,
    HorizontalAlignment, Hyperlink, ProtectionOptions, SortField, ValidationPrompt, Visibility,
};
use crate::value::CellValue;

/// How a command names its worksheet.
///
/// `Created(n)` refers to the object produced by command `n` of the same
/// batch, so a sheet can be added and filled in one round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "camelCase")]
pub enum SheetKey {
    /// Worksheet name or id
    Key(String),
    /// The sheet the user is looking at
    Active,
    Created(u32),
}

impl From<&str> for SheetKey {
    fn from(key: &str) -> Self {
        SheetKey::Key(key.to_string())
    }
}

impl From<String> for SheetKey {
    fn from(key: String) -> Self {
        SheetKey::Key(key)
    }
}

/// How a command names its table; see [`SheetKey`] for `Created`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "camelCase")]
pub enum TableKey {
    /// Table name or id
    Key(String),
    Created(u32),
}

impl From<&str> for TableKey {
    fn from(key: &str) -> Self {
        TableKey::Key(key.to_string())
    }
}

impl From<String> for TableKey {
    fn from(key: String) -> Self {
        TableKey::Key(key)
    }
}

/// The host object a command acts on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ObjectRef {
    /// The workbook's worksheet collection
    Worksheets,
    Worksheet {
        sheet: SheetKey,
    },
    Range {
        sheet: SheetKey,
        address: String,
    },
    /// Smallest range covering every non-empty or formatted cell
    UsedRange {
        sheet: SheetKey,
    },
    /// Tables of one sheet, or of the whole workbook when `sheet` is absent
    Tables {
        sheet: Option<SheetKey>,
    },
    Table {
        sheet: Option<SheetKey>,
        table: TableKey,
    },
    /// Body range of one table column, addressed by header name
    TableColumn {
        sheet: Option<SheetKey>,
        table: TableKey,
        column: String,
    },
}

impl ObjectRef {
    pub fn worksheet(sheet: impl Into<SheetKey>) -> Self {
        ObjectRef::Worksheet {
            sheet: sheet.into(),
        }
    }

    pub fn range(sheet: impl Into<SheetKey>, address: impl Into<String>) -> Self {
        ObjectRef::Range {
            sheet: sheet.into(),
            address: address.into(),
        }
    }

    pub fn sheet_mut(&mut self) -> Option<&mut SheetKey> {
        match self {
            ObjectRef::Worksheets => None,
            ObjectRef::Worksheet { sheet }
            | ObjectRef::Range { sheet, .. }
            | ObjectRef::UsedRange { sheet } => Some(sheet),
            ObjectRef::Tables { sheet }
            | ObjectRef::Table { sheet, .. }
            | ObjectRef::TableColumn { sheet, .. } => sheet.as_mut(),
        }
    }

    pub fn table_mut(&mut self) -> Option<&mut TableKey> {
        match self {
            ObjectRef::Table { table, .. } | ObjectRef::TableColumn { table, .. } => Some(table),
            _ => None,
        }
    }
}

/// Everything a host can be asked to do to an object.
///
/// Reads are expressed as [`Operation::Load`]: the host answers with a JSON
/// object holding the requested camelCase properties. Loading a collection
/// answers `{"items": [...]}` with the properties of each member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "args",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Operation {
    Load {
        properties: Vec<String>,
    },
    Count {
        visible_only: bool,
    },
    AddWorksheet {
        name: Option<String>,
    },
    AddTable {
        address: String,
        has_headers: bool,
    },
    Activate,
    Delete,
    SetVisibility {
        visibility: Visibility,
    },
    Rename {
        name: String,
    },
    Protect {
        options: Option<ProtectionOptions>,
        password: Option<String>,
    },
    Unprotect {
        password: Option<String>,
    },
    PauseProtection {
        password: Option<String>,
    },
    ResumeProtection,
    FreezeAt {
        address: String,
    },
    FreezeRows {
        count: u32,
    },
    FreezeColumns {
        count: u32,
    },
    SetValues {
        values: Vec<Vec<CellValue>>,
    },
    SetFormulas {
        formulas: Vec<Vec<String>>,
    },
    SetNumberFormat {
        formats: Vec<Vec<String>>,
    },
    SetFillColor {
        color: String,
    },
    ClearFill,
    SetFontColor {
        color: String,
    },
    SetHorizontalAlignment {
        alignment: HorizontalAlignment,
    },
    SetColumnWidth {
        width: f64,
    },
    SetWrapText {
        wrap: bool,
    },
    AutofitColumns,
    AutofitRows,
    SetColumnHidden {
        hidden: bool,
    },
    Clear {
        scope: ClearScope,
    },
    SetDataValidation {
        rule: DataValidationRule,
    },
    SetValidationPrompt {
        prompt: ValidationPrompt,
    },
    ClearDataValidation,
    AddConditionalFormat {
        format: ConditionalFormat,
    },
    ClearConditionalFormats,
    SetHyperlink {
        hyperlink: Hyperlink,
    },
    AddComment {
        content: String,
        content_type: CommentContentType,
    },
    SetHeaderValues {
        values: Vec<Vec<CellValue>>,
    },
    AddRows {
        values: Vec<Vec<CellValue>>,
    },
    /// Delete table body rows by 0-based index
    DeleteRows {
        indices: Vec<u32>,
    },
    Sort {
        fields: Vec<SortField>,
    },
    ClearFilters,
}

impl Operation {
    /// Read the given properties
    pub fn load<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Operation::Load {
            properties: properties.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a successful result carries the `id` of a newly created object
    pub fn creates_object(&self) -> bool {
        matches!(
            self,
            Operation::AddWorksheet { .. } | Operation::AddTable { .. }
        )
    }

    /// Stable camelCase name, matching the wire tag
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Load { .. } => "load",
            Operation::Count { .. } => "count",
            Operation::AddWorksheet { .. } => "addWorksheet",
            Operation::AddTable { .. } => "addTable",
            Operation::Activate => "activate",
            Operation::Delete => "delete",
            Operation::SetVisibility { .. } => "setVisibility",
            Operation::Rename { .. } => "rename",
            Operation::Protect { .. } => "protect",
            Operation::Unprotect { .. } => "unprotect",
            Operation::PauseProtection { .. } => "pauseProtection",
            Operation::ResumeProtection => "resumeProtection",
            Operation::FreezeAt { .. } => "freezeAt",
            Operation::FreezeRows { .. } => "freezeRows",
            Operation::FreezeColumns { .. } => "freezeColumns",
            Operation::SetValues { .. } => "setValues",
            Operation::SetFormulas { .. } => "setFormulas",
            Operation::SetNumberFormat { .. } => "setNumberFormat",
            Operation::SetFillColor { .. } => "setFillColor",
            Operation::ClearFill => "clearFill",
            Operation::SetFontColor { .. } => "setFontColor",
            Operation::SetHorizontalAlignment { .. } => "setHorizontalAlignment",
            Operation::SetColumnWidth { .. } => "setColumnWidth",
            Operation::SetWrapText { .. } => "setWrapText",
            Operation::AutofitColumns => "autofitColumns",
            Operation::AutofitRows => "autofitRows",
            Operation::SetColumnHidden { .. } => "setColumnHidden",
            Operation::Clear { .. } => "clear",
            Operation::SetDataValidation { .. } => "setDataValidation",
            Operation::SetValidationPrompt { .. } => "setValidationPrompt",
            Operation::ClearDataValidation => "clearDataValidation",
            Operation::AddConditionalFormat { .. } => "addConditionalFormat",
            Operation::ClearConditionalFormats => "clearConditionalFormats",
            Operation::SetHyperlink { .. } => "setHyperlink",
            Operation::AddComment { .. } => "addComment",
            Operation::SetHeaderValues { .. } => "setHeaderValues",
            Operation::AddRows { .. } => "addRows",
            Operation::DeleteRows { .. } => "deleteRows",
            Operation::Sort { .. } => "sort",
            Operation::ClearFilters => "clearFilters",
        }
    }
}

/// One queued unit of work: an operation against an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub target: ObjectRef,
    pub operation: Operation,
}

impl Command {
    pub fn new(target: ObjectRef, operation: Operation) -> Self {
        Self { target, operation }
    }
}

/// Per-command outcome within an executed batch.
///
/// A host stops at the first failing command; the results it returns are
/// a prefix of the batch ending at that failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CommandResult {
    Ok {
        #[serde(default)]
        value: Value,
    },
    Error {
        code: String,
        message: String,
    },
}

impl CommandResult {
    pub fn ok(value: Value) -> Self {
        CommandResult::Ok { value }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        CommandResult::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, CommandResult::Ok { .. })
    }
}
