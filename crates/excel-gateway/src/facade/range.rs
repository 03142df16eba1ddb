//! Reading and writing cell values

use excel_gateway_protocol::{CellValue, ClearScope, HorizontalAlignment};

use super::{worksheet, SheetGateway};
use crate::error::GatewayError;
use crate::model::{FormulaItem, RangeValues};

impl SheetGateway {
    /// Values of `range` on `sheet`, row by row
    pub async fn range_values(&self, sheet: &str, range: &str) -> Option<Vec<Vec<CellValue>>> {
        self.client
            .run("rangeValues", |ctx| async move {
                let values = worksheet(&ctx, sheet).range(range).load::<RangeValues>()?;
                ctx.flush().await?;
                Ok(values.into_value()?.values)
            })
            .await
            .ok()
    }

    /// Text of the top-left cell of `range`
    pub async fn cell_value(&self, sheet: &str, range: &str) -> Option<String> {
        self.client
            .run("cellValue", |ctx| async move {
                let values = worksheet(&ctx, sheet).range(range).load::<RangeValues>()?;
                ctx.flush().await?;
                values
                    .into_value()?
                    .values
                    .first()
                    .and_then(|row| row.first())
                    .map(CellValue::to_text)
                    .ok_or(GatewayError::UnexpectedResponse)
            })
            .await
            .ok()
    }

    /// Text of every cell of `range`, row by row, joined with commas
    pub async fn cells_value(&self, sheet: &str, range: &str) -> Option<String> {
        self.client
            .run("cellsValue", |ctx| async move {
                let values = worksheet(&ctx, sheet).range(range).load::<RangeValues>()?;
                ctx.flush().await?;
                let text: Vec<String> = values
                    .into_value()?
                    .values
                    .iter()
                    .flatten()
                    .map(CellValue::to_text)
                    .collect();
                Ok(text.join(","))
            })
            .await
            .ok()
    }

    /// Write one value; a larger range gets it in every cell
    pub async fn set_cell_value(
        &self,
        sheet: &str,
        range: &str,
        value: impl Into<CellValue>,
    ) -> Option<CellValue> {
        let value = value.into();
        self.client
            .run("setCellValue", |ctx| async move {
                worksheet(&ctx, sheet)
                    .range(range)
                    .set_values(vec![vec![value.clone()]])?;
                ctx.flush().await?;
                Ok(value)
            })
            .await
            .ok()
    }

    /// Write `values`, clear the fill and left-align the range
    pub async fn set_range_values(
        &self,
        sheet: &str,
        range: &str,
        values: Vec<Vec<CellValue>>,
    ) -> Option<Vec<Vec<CellValue>>> {
        self.client
            .run("setRangeValues", |ctx| async move {
                let target = worksheet(&ctx, sheet).range(range);
                target.set_values(values.clone())?;
                target.clear_fill()?;
                target.set_horizontal_alignment(HorizontalAlignment::Left)?;
                ctx.flush().await?;
                Ok(values)
            })
            .await
            .ok()
    }

    /// Write `values` and leave formatting alone
    pub async fn set_range_of_cells_value(
        &self,
        sheet: &str,
        range: &str,
        values: Vec<Vec<CellValue>>,
    ) -> Option<Vec<Vec<CellValue>>> {
        self.client
            .run("setRangeOfCellsValue", |ctx| async move {
                worksheet(&ctx, sheet)
                    .range(range)
                    .set_values(values.clone())?;
                ctx.flush().await?;
                Ok(values)
            })
            .await
            .ok()
    }

    /// Put one formula into each item's range
    pub async fn set_formulas(&self, sheet: &str, items: &[FormulaItem]) -> bool {
        self.client
            .run("setFormulas", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for item in items {
                    sheet
                        .range(&item.address)
                        .set_formulas(vec![vec![item.formula.clone()]])?;
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// Clear values and formulas of each range, keeping formats
    pub async fn clear_contents(&self, sheet: &str, ranges: &[&str]) -> bool {
        self.client
            .run("clearContents", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for range in ranges {
                    sheet.range(range).clear(ClearScope::Contents)?;
                }
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
    use crate::model::FormulaItem;
    use excel_gateway_protocol::{grid, CellValue, HorizontalAlignment};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_set_range_values_resets_format() {
        let (host, _sink, gateway) = gateway_on(MemoryHost::new());
        host.edit(|wb| {
            let sheet = wb.sheet_mut("Sheet1").unwrap();
            sheet.cell_mut(1, 1).fill_color = Some("#FF0000".into());
        });
        let written = gateway
            .set_range_values("Sheet1", "A1:B1", grid([["a", "b"]]))
            .await;
        assert_eq!(written, Some(grid([["a", "b"]])));

        let workbook = host.workbook();
        let cell = workbook.sheet("Sheet1").unwrap().cell("A1").unwrap();
        assert_eq!(cell.fill_color, None);
        assert_eq!(cell.alignment, Some(HorizontalAlignment::Left));
    }

    #[tokio::test]
    async fn test_cells_value_joins_text() {
        let (_host, _sink, gateway) = gateway_on(MemoryHost::new());
        gateway
            .set_range_of_cells_value("Sheet1", "A1:B2", grid([[1, 2], [3, 4]]))
            .await
            .unwrap();
        assert_eq!(
            gateway.cells_value("Sheet1", "A1:B2").await.as_deref(),
            Some("1,2,3,4")
        );
        assert_eq!(gateway.cell_value("Sheet1", "B2").await.as_deref(), Some("4"));
        assert_eq!(gateway.cell_value("Sheet1", "C9").await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_formulas_and_clear() {
        let (host, _sink, gateway) = gateway_on(MemoryHost::new());
        let items = [FormulaItem {
            address: "C1".into(),
            formula: "=A1+B1".into(),
        }];
        assert!(gateway.set_formulas("Sheet1", &items).await);
        assert_eq!(
            host.workbook().sheet("Sheet1").unwrap().cell("C1").unwrap().formula.as_deref(),
            Some("=A1+B1")
        );
        assert!(gateway.clear_contents("Sheet1", &["C1"]).await);
        assert_eq!(host.workbook().sheet("Sheet1").unwrap().value("C1"), CellValue::Null);
    }
}
