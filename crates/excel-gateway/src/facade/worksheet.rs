//! Worksheet operations

use excel_gateway_core::next_available_row_index;
use excel_gateway_protocol::Visibility;

use super::{check_worksheet_name, sheet_info, workbook, worksheet, SheetGateway, DEFAULT_COLUMN_WIDTH};
use crate::error::GatewayError;
use crate::model::{AddWorksheetOptions, RangeAddress, WorksheetInfo};

impl SheetGateway {
    /// Every worksheet of the workbook, in tab order
    pub async fn list_worksheets(&self) -> Option<Vec<WorksheetInfo>> {
        self.client
            .run("listWorksheets", |ctx| async move {
                let sheets = workbook(&ctx).load_worksheets::<WorksheetInfo>()?;
                ctx.flush().await?;
                Ok(sheets.into_value()?.items)
            })
            .await
            .ok()
    }

    /// The worksheet the user is looking at
    pub async fn active_worksheet(&self) -> Option<WorksheetInfo> {
        self.client
            .run("activeWorksheet", |ctx| async move {
                let sheet = workbook(&ctx).active_worksheet();
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Look a worksheet up by name or id
    pub async fn ensure_worksheet(&self, key: &str) -> Option<WorksheetInfo> {
        self.client
            .run("ensureWorksheet", |ctx| async move {
                sheet_info(&ctx, &worksheet(&ctx, key)).await
            })
            .await
            .ok()
    }

    pub async fn activate_worksheet(&self, key: &str) -> Option<WorksheetInfo> {
        self.client
            .run("activateWorksheet", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.activate()?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Add a worksheet at the end of the workbook
    ///
    /// Without a name the host picks one. Protection uses the configured
    /// secret. Everything happens in one round-trip.
    pub async fn add_worksheet(
        &self,
        name: Option<&str>,
        options: AddWorksheetOptions,
    ) -> Option<WorksheetInfo> {
        let secret = self.secret();
        self.client
            .run("addWorksheet", |ctx| async move {
                if let Some(name) = name {
                    check_worksheet_name(name)?;
                }
                let (sheet, _) = workbook(&ctx).add_worksheet(name)?;
                if options.activate {
                    sheet.activate()?;
                }
                if options.protect {
                    sheet.protect(None, secret)?;
                }
                if options.hidden {
                    sheet.set_visibility(Visibility::Hidden)?;
                }
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    pub async fn delete_worksheet(&self, key: &str) -> bool {
        self.client
            .run("deleteWorksheet", |ctx| async move {
                worksheet(&ctx, key).delete()?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    pub async fn show_worksheet(&self, key: &str) -> Option<WorksheetInfo> {
        self.set_visibility("showWorksheet", key, Visibility::Visible)
            .await
    }

    pub async fn hide_worksheet(&self, key: &str) -> Option<WorksheetInfo> {
        self.set_visibility("hideWorksheet", key, Visibility::Hidden)
            .await
    }

    async fn set_visibility(
        &self,
        operation: &'static str,
        key: &str,
        visibility: Visibility,
    ) -> Option<WorksheetInfo> {
        self.client
            .run(operation, |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.set_visibility(visibility)?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Protect a worksheet with the configured secret
    pub async fn protect_worksheet(&self, key: &str) -> Option<WorksheetInfo> {
        let secret = self.secret();
        self.client
            .run("protectWorksheet", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.protect(None, secret)?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    pub async fn unprotect_worksheet(&self, key: &str) -> Option<WorksheetInfo> {
        let secret = self.secret();
        self.client
            .run("unprotectWorksheet", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.unprotect(secret)?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Let edits through a protected sheet until protection is resumed
    pub async fn pause_worksheet_protection(&self, key: &str) -> Option<WorksheetInfo> {
        let secret = self.secret();
        self.client
            .run("pauseWorksheetProtection", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.pause_protection(secret)?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    pub async fn resume_worksheet_protection(&self, key: &str) -> Option<WorksheetInfo> {
        self.client
            .run("resumeWorksheetProtection", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.resume_protection()?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    pub async fn rename_worksheet(&self, key: &str, new_name: &str) -> Option<WorksheetInfo> {
        self.client
            .run("renameWorksheet", |ctx| async move {
                check_worksheet_name(new_name)?;
                let sheet = worksheet(&ctx, key);
                sheet.rename(new_name)?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    pub async fn worksheet_count(&self, visible_only: bool) -> Option<u32> {
        self.client
            .run("worksheetCount", |ctx| async move {
                let count = workbook(&ctx).count_worksheets(visible_only)?;
                ctx.flush().await?;
                count.into_value()
            })
            .await
            .ok()
    }

    /// Address of the worksheet's used range, e.g. `Sheet1!A1:C10`
    pub async fn used_range(&self, key: &str) -> Option<String> {
        self.client
            .run("usedRange", |ctx| async move {
                let used = worksheet(&ctx, key).used_range().load::<RangeAddress>()?;
                ctx.flush().await?;
                Ok(used.into_value()?.address)
            })
            .await
            .ok()
    }

    /// First free row below the used range, leaving one blank row
    pub async fn next_available_row(&self, key: &str) -> Option<u32> {
        self.client
            .run("nextAvailableRow", |ctx| async move {
                let used = worksheet(&ctx, key).used_range().load::<RangeAddress>()?;
                ctx.flush().await?;
                let address = used.into_value()?.address;
                next_available_row_index(&address).ok_or(GatewayError::InvalidAddress(address))
            })
            .await
            .ok()
    }

    /// Freeze panes so that `range` stays in the top-left pane
    pub async fn freeze_range(&self, key: &str, range: &str) -> Option<WorksheetInfo> {
        self.client
            .run("freezeRange", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.freeze_at(range)?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    pub async fn freeze_rows(&self, key: &str, count: u32) -> Option<WorksheetInfo> {
        self.client
            .run("freezeRows", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.freeze_rows(count)?;
                ctx.flush().await?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    pub async fn freeze_columns(&self, key: &str, count: u32) -> Option<WorksheetInfo> {
        self.client
            .run("freezeColumns", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.freeze_columns(count)?;
                ctx.flush().await?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Freeze columns, then rows, each in its own round-trip
    pub async fn freeze_columns_and_rows(
        &self,
        key: &str,
        columns: u32,
        rows: u32,
    ) -> Option<WorksheetInfo> {
        self.client
            .run("freezeColumnsAndRows", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.freeze_columns(columns)?;
                ctx.flush().await?;
                sheet.freeze_rows(rows)?;
                ctx.flush().await?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Autofit the used range's columns; a no-op on hosts without autofit
    pub async fn autofit_columns(&self, key: &str) -> Option<WorksheetInfo> {
        let autofit = self.supports_autofit();
        self.client
            .run("autofitColumns", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                if autofit {
                    sheet.used_range().autofit_columns()?;
                    ctx.flush().await?;
                }
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    pub async fn autofit_columns_and_rows(&self, key: &str) -> Option<WorksheetInfo> {
        let autofit = self.supports_autofit();
        self.client
            .run("autofitColumnsAndRows", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                if autofit {
                    let used = sheet.used_range();
                    used.autofit_columns()?;
                    used.autofit_rows()?;
                    ctx.flush().await?;
                }
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Set the width of the columns `range` covers
    pub async fn set_column_width(
        &self,
        key: &str,
        range: &str,
        width: f64,
    ) -> Option<WorksheetInfo> {
        self.client
            .run("setColumnWidth", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                sheet.range(range).set_column_width(width)?;
                ctx.flush().await?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Widen the columns of `range` and wrap their text
    pub async fn wrap_text(&self, key: &str, range: &str) -> Option<WorksheetInfo> {
        self.client
            .run("wrapText", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                let target = sheet.range(range);
                target.set_column_width(DEFAULT_COLUMN_WIDTH)?;
                target.set_wrap_text(true)?;
                ctx.flush().await?;
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Stop wrapping text anywhere in the used range
    pub async fn unwrap_text(&self, key: &str) -> Option<WorksheetInfo> {
        let supported = self.supports_autofit();
        self.client
            .run("unwrapText", |ctx| async move {
                let sheet = worksheet(&ctx, key);
                if supported {
                    sheet.used_range().set_wrap_text(false)?;
                }
                sheet_info(&ctx, &sheet).await
            })
            .await
            .ok()
    }

    /// Hide or show whole columns, e.g. `B:D`
    pub async fn set_columns_hidden(&self, key: &str, columns: &str, hidden: bool) -> bool {
        self.client
            .run("setColumnsHidden", |ctx| async move {
                worksheet(&ctx, key).range(columns).set_column_hidden(hidden)?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::gateway_on;
    use crate::host::MemoryHost;
    use crate::model::AddWorksheetOptions;
    use excel_gateway_protocol::Visibility;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_add_worksheet_with_options() {
        let (host, sink, gateway) = gateway_on(MemoryHost::new());
        let info = gateway
            .add_worksheet(
                Some("Budget"),
                AddWorksheetOptions {
                    activate: false,
                    protect: true,
                    hidden: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(info.name, "Budget");
        assert_eq!(info.visibility, Visibility::Hidden);
        assert_eq!(host.batch_count(), 1);
        let workbook = host.workbook();
        let sheet = workbook.sheet("Budget").unwrap();
        assert_eq!(
            sheet.protection.as_ref().unwrap().password.as_deref(),
            Some("s3cret")
        );
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_never_reaches_host() {
        let (host, sink, gateway) = gateway_on(MemoryHost::new());
        let info = gateway
            .add_worksheet(Some("History"), AddWorksheetOptions::default())
            .await;
        assert_eq!(info, None);
        assert_eq!(host.batch_count(), 0);
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, "addWorksheet");
        assert!(entries[0].message.contains("History"));
    }

    #[tokio::test]
    async fn test_next_available_row() {
        let (host, _sink, gateway) = gateway_on(MemoryHost::new());
        assert_eq!(gateway.next_available_row("Sheet1").await, Some(1));
        host.edit(|wb| {
            let sheet = wb.sheet_mut("Sheet1").unwrap();
            sheet.set_value("C10", 1);
        });
        assert_eq!(gateway.used_range("Sheet1").await.as_deref(), Some("Sheet1!C10"));
        assert_eq!(gateway.next_available_row("Sheet1").await, Some(12));
    }

    #[tokio::test]
    async fn test_autofit_skipped_on_old_hosts() {
        let (host, sink, gateway) = gateway_on(MemoryHost::new().with_api_version("1.1"));
        let info = gateway.autofit_columns_and_rows("Sheet1").await.unwrap();
        assert_eq!(info.name, "Sheet1");
        assert_eq!(host.batch_count(), 1);
        assert!(sink.is_empty());
    }
}
