//! Table operations

use excel_gateway_core::{
    column_index_to_letters, letters_to_column_index, table_body_column_address,
};
use excel_gateway_protocol::{CellValue, SortField};

use super::{check_table_name, table_info, workbook, worksheet, SheetGateway};
use crate::error::GatewayError;
use crate::model::{
    RangeValues, RowCount, TableColumnAddress, TableColumnInfo, TableConfig, TableExtent, TableInfo,
    TableSnapshot,
};

impl SheetGateway {
    /// Header and body of one table on `sheet`
    pub async fn ensure_table(&self, sheet: &str, table: &str) -> Option<TableSnapshot> {
        self.client
            .run("ensureTable", |ctx| async move {
                let snapshot = worksheet(&ctx, sheet).table(table).load::<TableSnapshot>()?;
                ctx.flush().await?;
                snapshot.into_value()
            })
            .await
            .ok()
    }

    /// Every table on `sheet` with its values
    pub async fn list_worksheet_tables(&self, sheet: &str) -> Option<Vec<TableSnapshot>> {
        self.client
            .run("listWorksheetTables", |ctx| async move {
                let tables = worksheet(&ctx, sheet).load_tables::<TableSnapshot>()?;
                ctx.flush().await?;
                Ok(tables.into_value()?.items)
            })
            .await
            .ok()
    }

    /// Every table in the workbook with its values
    pub async fn list_tables(&self) -> Option<Vec<TableSnapshot>> {
        self.client
            .run("listTables", |ctx| async move {
                let tables = workbook(&ctx).load_tables::<TableSnapshot>()?;
                ctx.flush().await?;
                Ok(tables.into_value()?.items)
            })
            .await
            .ok()
    }

    /// Create a table over `config.address`, name it, write its header and
    /// add its rows
    ///
    /// The table exists after the first round-trip; formats and rows follow
    /// in a second one.
    pub async fn insert_table(&self, sheet: &str, config: &TableConfig) -> Option<TableInfo> {
        self.client
            .run("insertTable", |ctx| async move {
                check_table_name(&config.name)?;
                let (table, _) = worksheet(&ctx, sheet).add_table(&config.address, true)?;
                table.rename(&config.name)?;
                table.set_header_values(config.header.clone())?;
                ctx.flush().await?;

                if let Some(formats) = &config.number_formats {
                    table.set_number_format(vec![formats.clone()])?;
                }
                table.add_rows(config.rows.clone())?;
                table_info(&ctx, &table).await
            })
            .await
            .ok()
    }

    /// Replace every body row of a table with `rows`
    ///
    /// Runs as four round-trips: read the row count, delete all rows, add the
    /// new rows, then autofit the sheet (when the host supports it) and read
    /// the table back.
    pub async fn update_table(
        &self,
        sheet: &str,
        table: &str,
        rows: Vec<Vec<CellValue>>,
    ) -> Option<TableInfo> {
        let autofit = self.supports_autofit();
        self.client
            .run("updateTable", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                let table = sheet.table(table);

                let count = table.load::<RowCount>()?;
                ctx.flush().await?;
                let count = count.into_value()?.row_count;

                table.delete_rows((0..count).collect())?;
                ctx.flush().await?;

                table.add_rows(rows)?;
                ctx.flush().await?;

                if autofit {
                    let used = sheet.used_range();
                    used.autofit_columns()?;
                    used.autofit_rows()?;
                }
                table_info(&ctx, &table).await
            })
            .await
            .ok()
    }

    pub async fn delete_table(&self, sheet: &str, table: &str) -> bool {
        self.client
            .run("deleteTable", |ctx| async move {
                worksheet(&ctx, sheet).table(table).delete()?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// Rename a table, wherever it lives in the workbook
    pub async fn rename_table(&self, table: &str, new_name: &str) -> Option<TableInfo> {
        self.client
            .run("renameTable", |ctx| async move {
                check_table_name(new_name)?;
                let table = workbook(&ctx).table(table);
                table.rename(new_name)?;
                table_info(&ctx, &table).await
            })
            .await
            .ok()
    }

    /// Sort the body by the 0-based table column `key`
    pub async fn sort_table(
        &self,
        sheet: &str,
        table: &str,
        key: u32,
        ascending: bool,
    ) -> Option<TableInfo> {
        self.client
            .run("sortTable", |ctx| async move {
                let table = worksheet(&ctx, sheet).table(table);
                table.sort(vec![SortField { key, ascending }])?;
                table_info(&ctx, &table).await
            })
            .await
            .ok()
    }

    pub async fn clear_table_filters(&self, sheet: &str, table: &str) -> Option<TableInfo> {
        self.client
            .run("clearTableFilters", |ctx| async move {
                let table = worksheet(&ctx, sheet).table(table);
                table.clear_filters()?;
                table_info(&ctx, &table).await
            })
            .await
            .ok()
    }

    /// Delete the body row at 0-based `index`
    pub async fn delete_table_row_at(
        &self,
        sheet: &str,
        table: &str,
        index: u32,
    ) -> Option<TableInfo> {
        self.client
            .run("deleteTableRowAt", |ctx| async move {
                let table = worksheet(&ctx, sheet).table(table);
                table.delete_rows(vec![index])?;
                table_info(&ctx, &table).await
            })
            .await
            .ok()
    }

    /// Body values of one column as text, top to bottom
    pub async fn table_column_values(
        &self,
        sheet: &str,
        table: &str,
        column: &str,
    ) -> Option<Vec<String>> {
        self.client
            .run("tableColumnValues", |ctx| async move {
                let values = worksheet(&ctx, sheet)
                    .table(table)
                    .column(column)
                    .load::<RangeValues>()?;
                ctx.flush().await?;
                Ok(values
                    .into_value()?
                    .values
                    .iter()
                    .map(|row| row.first().map(CellValue::to_text).unwrap_or_default())
                    .collect())
            })
            .await
            .ok()
    }

    /// Where a table's body sits on its sheet
    pub async fn table_body_extent(&self, sheet: &str, table: &str) -> Option<TableExtent> {
        self.client
            .run("tableBodyExtent", |ctx| async move {
                let extent = worksheet(&ctx, sheet).table(table).load::<TableExtent>()?;
                ctx.flush().await?;
                extent.into_value()
            })
            .await
            .ok()
    }

    /// Absolute address of the table body in sheet column `column` (letters)
    pub async fn table_column_body_address(
        &self,
        sheet: &str,
        table: &str,
        column: &str,
    ) -> Option<TableColumnAddress> {
        self.client
            .run("tableColumnBodyAddress", |ctx| async move {
                if letters_to_column_index(column).is_none() {
                    return Err(GatewayError::InvalidAddress(column.to_string()));
                }
                let extent = worksheet(&ctx, sheet).table(table).load::<TableExtent>()?;
                ctx.flush().await?;
                let extent = extent.into_value()?;
                let address = table_body_column_address(
                    &extent.worksheet_name,
                    column,
                    extent.body_row_index,
                    extent.row_count,
                );
                Ok(TableColumnAddress {
                    id: extent.id,
                    name: extent.name,
                    address,
                })
            })
            .await
            .ok()
    }

    /// Absolute address of the body of the table column named `column`
    pub async fn table_named_column_address(
        &self,
        sheet: &str,
        table: &str,
        column: &str,
    ) -> Option<TableColumnAddress> {
        self.client
            .run("tableNamedColumnAddress", |ctx| async move {
                let table = worksheet(&ctx, sheet).table(table);
                let position = table.column(column).load::<TableColumnInfo>()?;
                let extent = table.load::<TableExtent>()?;
                ctx.flush().await?;
                let (position, extent) = (position.into_value()?, extent.into_value()?);
                Ok(TableColumnAddress {
                    id: extent.id,
                    name: position.name,
                    address: table_body_column_address(
                        &extent.worksheet_name,
                        &column_index_to_letters(position.sheet_column),
                        extent.body_row_index,
                        extent.row_count,
                    ),
                })
            })
            .await
            .ok()
    }
}
