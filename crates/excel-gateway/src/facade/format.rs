//! Formatting, validation, hyperlinks and comments

use excel_gateway_core::generate_prompt_message;
use excel_gateway_protocol::{
    CellValueRule, ClearScope, CommentContentType, ConditionalFormat, DataValidationRule,
    FormatOverrides, ValidationPrompt,
};

use super::{worksheet, SheetGateway};
use crate::model::{
    ConditionalFormatItem, FillItem, HyperlinkItem, ListValidationItem, NumberFormatItem,
    PromptItem, RangeNumberFormat,
};

fn list_rule(source: &str) -> DataValidationRule {
    DataValidationRule::List {
        source: source.to_string(),
        in_cell_dropdown: true,
    }
}

impl SheetGateway {
    /// Number formats of `range`, row by row
    pub async fn number_format(&self, sheet: &str, range: &str) -> Option<Vec<Vec<String>>> {
        self.client
            .run("numberFormat", |ctx| async move {
                let formats = worksheet(&ctx, sheet)
                    .range(range)
                    .load::<RangeNumberFormat>()?;
                ctx.flush().await?;
                Ok(formats.into_value()?.number_format)
            })
            .await
            .ok()
    }

    /// Apply a grid of number formats; a single format covers the whole range
    pub async fn set_number_format(
        &self,
        sheet: &str,
        range: &str,
        formats: Vec<Vec<String>>,
    ) -> Option<Vec<Vec<String>>> {
        self.client
            .run("setNumberFormat", |ctx| async move {
                worksheet(&ctx, sheet)
                    .range(range)
                    .set_number_format(formats.clone())?;
                ctx.flush().await?;
                Ok(formats)
            })
            .await
            .ok()
    }

    pub async fn set_table_number_formats(&self, sheet: &str, items: &[NumberFormatItem]) -> bool {
        self.client
            .run("setTableNumberFormats", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for item in items {
                    sheet
                        .range(&item.address)
                        .set_number_format(vec![vec![item.number_format.clone()]])?;
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// Fill `range` with `color` (`#RRGGBB` or a color name)
    pub async fn color_cell(&self, sheet: &str, range: &str, color: &str) -> bool {
        self.client
            .run("colorCell", |ctx| async move {
                worksheet(&ctx, sheet).range(range).set_fill_color(color)?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// Set fill and font colors per item; unset colors are left alone
    pub async fn color_cells(&self, sheet: &str, items: &[FillItem]) -> bool {
        self.client
            .run("colorCells", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for item in items {
                    let range = sheet.range(&item.address);
                    if let Some(background) = &item.background {
                        range.set_fill_color(background)?;
                    }
                    if let Some(text) = &item.text {
                        range.set_font_color(text)?;
                    }
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    pub async fn clear_background(&self, sheet: &str, range: &str) -> bool {
        self.client
            .run("clearBackground", |ctx| async move {
                worksheet(&ctx, sheet).range(range).clear_fill()?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    pub async fn clear_rows_background(&self, sheet: &str, ranges: &[&str]) -> bool {
        self.client
            .run("clearRowsBackground", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for range in ranges {
                    sheet.range(range).clear_fill()?;
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// Add a cell-value conditional format with optional fill and font colors
    pub async fn set_conditional_format(
        &self,
        sheet: &str,
        range: &str,
        rule: CellValueRule,
        fill: Option<&str>,
        font: Option<&str>,
    ) -> Option<CellValueRule> {
        self.client
            .run("setConditionalFormat", |ctx| async move {
                let format = ConditionalFormat::CellValue {
                    rule: rule.clone(),
                    format: FormatOverrides {
                        fill_color: fill.map(str::to_string),
                        font_color: font.map(str::to_string),
                        ..FormatOverrides::default()
                    },
                };
                worksheet(&ctx, sheet)
                    .range(range)
                    .add_conditional_format(format)?;
                ctx.flush().await?;
                Ok(rule)
            })
            .await
            .ok()
    }

    pub async fn set_table_conditional_formats(
        &self,
        sheet: &str,
        items: &[ConditionalFormatItem],
    ) -> bool {
        self.client
            .run("setTableConditionalFormats", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for item in items {
                    sheet
                        .range(&item.address)
                        .add_conditional_format(ConditionalFormat::CellValue {
                            rule: item.rule.clone(),
                            format: item.format.clone(),
                        })?;
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// Add a solid left-to-right data bar scaled between `min` and `max`
    pub async fn set_data_bar(
        &self,
        sheet: &str,
        range: &str,
        min: f64,
        max: f64,
        color: &str,
    ) -> bool {
        self.client
            .run("setDataBar", |ctx| async move {
                worksheet(&ctx, sheet)
                    .range(range)
                    .add_conditional_format(ConditionalFormat::DataBar {
                        lower: min,
                        upper: max,
                        color: color.to_string(),
                        left_to_right: true,
                    })?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    pub async fn clear_conditional_formats(&self, sheet: &str, range: &str) -> bool {
        self.client
            .run("clearConditionalFormats", |ctx| async move {
                worksheet(&ctx, sheet)
                    .range(range)
                    .clear_conditional_formats()?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// In-cell dropdown drawing its choices from `source`
    pub async fn set_list_validation(
        &self,
        sheet: &str,
        range: &str,
        source: &str,
    ) -> Option<String> {
        self.client
            .run("setListValidation", |ctx| async move {
                worksheet(&ctx, sheet)
                    .range(range)
                    .set_data_validation(list_rule(source))?;
                ctx.flush().await?;
                Ok(source.to_string())
            })
            .await
            .ok()
    }

    /// Dropdowns for several ranges; items without a source are skipped
    pub async fn set_list_validations(&self, sheet: &str, items: &[ListValidationItem]) -> bool {
        self.client
            .run("setListValidations", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for item in items.iter().filter(|item| !item.source.is_empty()) {
                    sheet
                        .range(&item.address)
                        .set_data_validation(list_rule(&item.source))?;
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// Input prompts; items without a message are skipped and long messages
    /// are truncated
    pub async fn set_validation_prompts(&self, sheet: &str, items: &[PromptItem]) -> bool {
        self.client
            .run("setValidationPrompts", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for item in items.iter().filter(|item| !item.message.is_empty()) {
                    sheet.range(&item.address).set_validation_prompt(ValidationPrompt {
                        show_prompt: true,
                        title: item.title.clone(),
                        message: generate_prompt_message(&item.message),
                    })?;
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    pub async fn clear_validation(&self, sheet: &str, range: &str) -> bool {
        self.clear_validations_with("clearValidation", sheet, &[range])
            .await
    }

    pub async fn clear_validations(&self, sheet: &str, ranges: &[&str]) -> bool {
        self.clear_validations_with("clearValidations", sheet, ranges)
            .await
    }

    async fn clear_validations_with(
        &self,
        operation: &'static str,
        sheet: &str,
        ranges: &[&str],
    ) -> bool {
        self.client
            .run(operation, |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for range in ranges {
                    sheet.range(range).clear_data_validation()?;
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    pub async fn set_hyperlinks(&self, sheet: &str, items: &[HyperlinkItem]) -> bool {
        self.client
            .run("setHyperlinks", |ctx| async move {
                let sheet = worksheet(&ctx, sheet);
                for item in items {
                    sheet
                        .range(&item.address)
                        .set_hyperlink(item.hyperlink.clone())?;
                }
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    pub async fn clear_hyperlinks(&self, sheet: &str, range: &str) -> bool {
        self.client
            .run("clearHyperlinks", |ctx| async move {
                worksheet(&ctx, sheet)
                    .range(range)
                    .clear(ClearScope::Hyperlinks)?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }

    /// Attach a comment to a single cell
    pub async fn add_comment(
        &self,
        sheet: &str,
        cell: &str,
        content: &str,
        content_type: CommentContentType,
    ) -> bool {
        self.client
            .run("addComment", |ctx| async move {
                worksheet(&ctx, sheet)
                    .range(cell)
                    .add_comment(content, content_type)?;
                ctx.flush().await
            })
            .await
            .is_ok()
    }
}
