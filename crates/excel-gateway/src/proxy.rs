//! Lightweight handles to host objects
//!
//! A proxy pairs a [`BatchContext`] with an [`ObjectRef`]. Its methods only
//! queue commands; nothing reaches the host until the context is flushed.

use excel_gateway_protocol::{
    CellValue, ClearScope, CommentContentType, ConditionalFormat, DataValidationRule,
    HorizontalAlignment, Hyperlink, ObjectRef, Operation, ProtectionOptions, SheetKey, SortField,
    TableKey, ValidationPrompt, Visibility,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::batch::{BatchContext, Pending};
use crate::error::Result;
use crate::model::{Collection, Loadable, TableInfo, WorksheetInfo};

fn load<T: DeserializeOwned>(
    ctx: &BatchContext,
    target: &ObjectRef,
    properties: &[&str],
) -> Result<Pending<T>> {
    ctx.enqueue(
        target.clone(),
        Operation::load(properties.iter().copied()),
    )
}

fn queue(ctx: &BatchContext, target: &ObjectRef, operation: Operation) -> Result<()> {
    let _ = ctx.enqueue::<Value>(target.clone(), operation)?;
    Ok(())
}

/// The workbook of a context.
#[derive(Debug, Clone)]
pub struct WorkbookProxy {
    ctx: BatchContext,
}

impl WorkbookProxy {
    pub fn new(ctx: BatchContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BatchContext {
        &self.ctx
    }

    /// Worksheet by name or id
    pub fn worksheet(&self, key: impl Into<SheetKey>) -> WorksheetProxy {
        WorksheetProxy::new(self.ctx.clone(), key.into())
    }

    pub fn active_worksheet(&self) -> WorksheetProxy {
        WorksheetProxy::new(self.ctx.clone(), SheetKey::Active)
    }

    /// Queue a new worksheet; the proxy is usable before and after the flush
    pub fn add_worksheet(
        &self,
        name: Option<&str>,
    ) -> Result<(WorksheetProxy, Pending<WorksheetInfo>)> {
        let (pending, seq) = self.ctx.enqueue_seq(
            ObjectRef::Worksheets,
            Operation::AddWorksheet {
                name: name.map(str::to_string),
            },
        )?;
        Ok((
            WorksheetProxy::new(self.ctx.clone(), SheetKey::Created(seq)),
            pending,
        ))
    }

    pub fn load_worksheets<T: Loadable>(&self) -> Result<Pending<Collection<T>>> {
        load(&self.ctx, &ObjectRef::Worksheets, T::PROPERTIES)
    }

    pub fn count_worksheets(&self, visible_only: bool) -> Result<Pending<u32>> {
        self.ctx
            .enqueue(ObjectRef::Worksheets, Operation::Count { visible_only })
    }

    /// Table by name or id, looked up across the workbook
    pub fn table(&self, key: impl Into<TableKey>) -> TableProxy {
        TableProxy::new(self.ctx.clone(), None, key.into())
    }

    pub fn load_tables<T: Loadable>(&self) -> Result<Pending<Collection<T>>> {
        load(&self.ctx, &ObjectRef::Tables { sheet: None }, T::PROPERTIES)
    }
}

/// One worksheet.
#[derive(Debug, Clone)]
pub struct WorksheetProxy {
    ctx: BatchContext,
    target: ObjectRef,
    key: SheetKey,
}

impl WorksheetProxy {
    pub fn new(ctx: BatchContext, key: SheetKey) -> Self {
        Self {
            ctx,
            target: ObjectRef::Worksheet { sheet: key.clone() },
            key,
        }
    }

    pub fn key(&self) -> &SheetKey {
        &self.key
    }

    pub fn load<T: Loadable>(&self) -> Result<Pending<T>> {
        load(&self.ctx, &self.target, T::PROPERTIES)
    }

    pub fn activate(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::Activate)
    }

    pub fn delete(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::Delete)
    }

    pub fn set_visibility(&self, visibility: Visibility) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::SetVisibility { visibility },
        )
    }

    pub fn rename(&self, name: &str) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::Rename {
                name: name.to_string(),
            },
        )
    }

    pub fn protect(&self, options: Option<ProtectionOptions>, password: Option<&str>) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::Protect {
                options,
                password: password.map(str::to_string),
            },
        )
    }

    pub fn unprotect(&self, password: Option<&str>) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::Unprotect {
                password: password.map(str::to_string),
            },
        )
    }

    pub fn pause_protection(&self, password: Option<&str>) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::PauseProtection {
                password: password.map(str::to_string),
            },
        )
    }

    pub fn resume_protection(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::ResumeProtection)
    }

    pub fn freeze_at(&self, address: &str) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::FreezeAt {
                address: address.to_string(),
            },
        )
    }

    pub fn freeze_rows(&self, count: u32) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::FreezeRows { count })
    }

    pub fn freeze_columns(&self, count: u32) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::FreezeColumns { count })
    }

    pub fn range(&self, address: &str) -> RangeProxy {
        RangeProxy::new(
            self.ctx.clone(),
            ObjectRef::Range {
                sheet: self.key.clone(),
                address: address.to_string(),
            },
        )
    }

    pub fn used_range(&self) -> RangeProxy {
        RangeProxy::new(
            self.ctx.clone(),
            ObjectRef::UsedRange {
                sheet: self.key.clone(),
            },
        )
    }

    pub fn table(&self, key: impl Into<TableKey>) -> TableProxy {
        TableProxy::new(self.ctx.clone(), Some(self.key.clone()), key.into())
    }

    pub fn load_tables<T: Loadable>(&self) -> Result<Pending<Collection<T>>> {
        load(
            &self.ctx,
            &ObjectRef::Tables {
                sheet: Some(self.key.clone()),
            },
            T::PROPERTIES,
        )
    }

    /// Queue a new table over `address`
    pub fn add_table(
        &self,
        address: &str,
        has_headers: bool,
    ) -> Result<(TableProxy, Pending<TableInfo>)> {
        let (pending, seq) = self.ctx.enqueue_seq(
            ObjectRef::Tables {
                sheet: Some(self.key.clone()),
            },
            Operation::AddTable {
                address: address.to_string(),
                has_headers,
            },
        )?;
        Ok((
            TableProxy::new(
                self.ctx.clone(),
                Some(self.key.clone()),
                TableKey::Created(seq),
            ),
            pending,
        ))
    }
}

/// A range, used range, or table column body.
#[derive(Debug, Clone)]
pub struct RangeProxy {
    ctx: BatchContext,
    target: ObjectRef,
}

impl RangeProxy {
    pub fn new(ctx: BatchContext, target: ObjectRef) -> Self {
        Self { ctx, target }
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    pub fn load<T: Loadable>(&self) -> Result<Pending<T>> {
        load(&self.ctx, &self.target, T::PROPERTIES)
    }

    pub fn set_values(&self, values: Vec<Vec<CellValue>>) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetValues { values })
    }

    pub fn set_formulas(&self, formulas: Vec<Vec<String>>) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetFormulas { formulas })
    }

    pub fn set_number_format(&self, formats: Vec<Vec<String>>) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetNumberFormat { formats })
    }

    pub fn set_fill_color(&self, color: &str) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::SetFillColor {
                color: color.to_string(),
            },
        )
    }

    pub fn clear_fill(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::ClearFill)
    }

    pub fn set_font_color(&self, color: &str) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::SetFontColor {
                color: color.to_string(),
            },
        )
    }

    pub fn set_horizontal_alignment(&self, alignment: HorizontalAlignment) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::SetHorizontalAlignment { alignment },
        )
    }

    pub fn set_column_width(&self, width: f64) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetColumnWidth { width })
    }

    pub fn set_wrap_text(&self, wrap: bool) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetWrapText { wrap })
    }

    pub fn autofit_columns(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::AutofitColumns)
    }

    pub fn autofit_rows(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::AutofitRows)
    }

    pub fn set_column_hidden(&self, hidden: bool) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetColumnHidden { hidden })
    }

    pub fn clear(&self, scope: ClearScope) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::Clear { scope })
    }

    pub fn set_data_validation(&self, rule: DataValidationRule) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetDataValidation { rule })
    }

    pub fn set_validation_prompt(&self, prompt: ValidationPrompt) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::SetValidationPrompt { prompt },
        )
    }

    pub fn clear_data_validation(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::ClearDataValidation)
    }

    pub fn add_conditional_format(&self, format: ConditionalFormat) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::AddConditionalFormat { format },
        )
    }

    pub fn clear_conditional_formats(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::ClearConditionalFormats)
    }

    pub fn set_hyperlink(&self, hyperlink: Hyperlink) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetHyperlink { hyperlink })
    }

    pub fn add_comment(&self, content: &str, content_type: CommentContentType) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::AddComment {
                content: content.to_string(),
                content_type,
            },
        )
    }
}

/// One table.
#[derive(Debug, Clone)]
pub struct TableProxy {
    ctx: BatchContext,
    sheet: Option<SheetKey>,
    key: TableKey,
    target: ObjectRef,
}

impl TableProxy {
    pub fn new(ctx: BatchContext, sheet: Option<SheetKey>, key: TableKey) -> Self {
        let target = ObjectRef::Table {
            sheet: sheet.clone(),
            table: key.clone(),
        };
        Self {
            ctx,
            sheet,
            key,
            target,
        }
    }

    pub fn load<T: Loadable>(&self) -> Result<Pending<T>> {
        load(&self.ctx, &self.target, T::PROPERTIES)
    }

    /// Body range of the column with header `name`
    pub fn column(&self, name: &str) -> RangeProxy {
        RangeProxy::new(
            self.ctx.clone(),
            ObjectRef::TableColumn {
                sheet: self.sheet.clone(),
                table: self.key.clone(),
                column: name.to_string(),
            },
        )
    }

    pub fn rename(&self, name: &str) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::Rename {
                name: name.to_string(),
            },
        )
    }

    pub fn delete(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::Delete)
    }

    pub fn set_header_values(&self, header: Vec<CellValue>) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::SetHeaderValues {
                values: vec![header],
            },
        )
    }

    pub fn add_rows(&self, values: Vec<Vec<CellValue>>) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::AddRows { values })
    }

    pub fn delete_rows(&self, indices: Vec<u32>) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::DeleteRows { indices })
    }

    /// Apply a number format to the body; one format per column
    pub fn set_number_format(&self, formats: Vec<Vec<String>>) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::SetNumberFormat { formats })
    }

    pub fn add_conditional_format(&self, format: ConditionalFormat) -> Result<()> {
        queue(
            &self.ctx,
            &self.target,
            Operation::AddConditionalFormat { format },
        )
    }

    pub fn sort(&self, fields: Vec<SortField>) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::Sort { fields })
    }

    pub fn clear_filters(&self) -> Result<()> {
        queue(&self.ctx, &self.target, Operation::ClearFilters)
    }
}
