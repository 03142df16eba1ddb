//! Workbook state held by [`MemoryHost`](super::MemoryHost)

use std::collections::{BTreeMap, BTreeSet};

use excel_gateway_core::{Address, Bounds, CellRef};
use excel_gateway_protocol::{
    CellValue, CommentContentType, ConditionalFormat, DataValidationRule, HorizontalAlignment,
    Hyperlink, ProtectionOptions, ValidationPrompt, Visibility,
};

/// Contents and formatting of one cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellState {
    pub value: CellValue,
    pub formula: Option<String>,
    pub number_format: Option<String>,
    pub fill_color: Option<String>,
    pub font_color: Option<String>,
    pub alignment: Option<HorizontalAlignment>,
    pub wrap_text: bool,
    pub hyperlink: Option<Hyperlink>,
}

impl CellState {
    pub fn is_blank(&self) -> bool {
        self == &CellState::default()
    }

    pub fn has_content(&self) -> bool {
        !self.value.is_null() || self.formula.is_some()
    }

    pub(crate) fn clear_content(&mut self) {
        self.value = CellValue::Null;
        self.formula = None;
    }

    pub(crate) fn clear_formats(&mut self) {
        self.number_format = None;
        self.fill_color = None;
        self.font_color = None;
        self.alignment = None;
        self.wrap_text = false;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Protection {
    pub password: Option<String>,
    pub options: ProtectionOptions,
    pub paused: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub row: u32,
    pub col: u32,
    pub content: String,
    pub content_type: CommentContentType,
}

/// A table; its header and body are mirrored into the sheet's cells.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    pub id: String,
    pub name: String,
    /// 1-based sheet row holding the header
    pub header_row: u32,
    /// 1-based sheet column of the first table column
    pub first_col: u32,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub column_formats: Vec<Option<String>>,
    pub filtered: bool,
}

impl MemoryTable {
    pub fn last_col(&self) -> u32 {
        self.first_col + self.columns.len() as u32 - 1
    }

    /// Header plus body rows
    pub fn bounds(&self) -> Bounds {
        Bounds {
            first_row: self.header_row,
            first_col: self.first_col,
            last_row: self.header_row + self.rows.len() as u32,
            last_col: self.last_col(),
        }
    }

    /// Body rows; an empty body still spans one row below the header
    pub fn body_bounds(&self) -> Bounds {
        Bounds {
            first_row: self.header_row + 1,
            first_col: self.first_col,
            last_row: self.header_row + (self.rows.len() as u32).max(1),
            last_col: self.last_col(),
        }
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(name))
    }
}

/// One worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySheet {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
    pub protection: Option<Protection>,
    pub frozen_rows: u32,
    pub frozen_columns: u32,
    /// Cells keyed by (row, column), both 1-based
    pub cells: BTreeMap<(u32, u32), CellState>,
    pub column_widths: BTreeMap<u32, f64>,
    pub row_heights: BTreeMap<u32, f64>,
    pub hidden_columns: BTreeSet<u32>,
    pub validations: Vec<(Bounds, DataValidationRule)>,
    pub prompts: Vec<(Bounds, ValidationPrompt)>,
    pub conditional_formats: Vec<(Bounds, ConditionalFormat)>,
    pub comments: Vec<Comment>,
    pub tables: Vec<MemoryTable>,
}

impl MemorySheet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            visibility: Visibility::Visible,
            protection: None,
            frozen_rows: 0,
            frozen_columns: 0,
            cells: BTreeMap::new(),
            column_widths: BTreeMap::new(),
            row_heights: BTreeMap::new(),
            hidden_columns: BTreeSet::new(),
            validations: Vec::new(),
            prompts: Vec::new(),
            conditional_formats: Vec::new(),
            comments: Vec::new(),
            tables: Vec::new(),
        }
    }

    pub fn is_protected(&self) -> bool {
        self.protection.is_some()
    }

    /// Cell at an A1 reference such as "B2"
    pub fn cell(&self, reference: &str) -> Option<&CellState> {
        let cell = CellRef::parse(reference).ok()?;
        self.cells.get(&(cell.row, cell.col))
    }

    /// Value at an A1 reference; blank cells read as `Null`
    pub fn value(&self, reference: &str) -> CellValue {
        self.cell(reference)
            .map(|cell| cell.value.clone())
            .unwrap_or_default()
    }

    /// Write a value directly, bypassing protection
    pub fn set_value(&mut self, reference: &str, value: impl Into<CellValue>) {
        if let Ok(cell) = CellRef::parse(reference) {
            self.cells.entry((cell.row, cell.col)).or_default().value = value.into();
        }
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    /// Smallest range covering every non-blank cell; `A1` for an empty sheet
    pub fn used_bounds(&self) -> Bounds {
        let mut used: Option<Bounds> = None;
        for (&(row, col), cell) in &self.cells {
            if cell.is_blank() {
                continue;
            }
            used = Some(match used {
                None => Bounds::cell(col, row),
                Some(b) => Bounds {
                    first_row: b.first_row.min(row),
                    first_col: b.first_col.min(col),
                    last_row: b.last_row.max(row),
                    last_col: b.last_col.max(col),
                },
            });
        }
        used.unwrap_or(Bounds::cell(1, 1))
    }

    /// Sheet-qualified address of `bounds`
    pub fn address_of(&self, bounds: &Bounds) -> String {
        let start = CellRef::new(bounds.first_col, bounds.first_row);
        let end = (bounds.row_count() > 1 || bounds.col_count() > 1)
            .then(|| CellRef::new(bounds.last_col, bounds.last_row));
        Address::range(start, end)
            .with_sheet(self.name.as_str())
            .to_string()
    }

    pub(crate) fn cell_mut(&mut self, row: u32, col: u32) -> &mut CellState {
        self.cells.entry((row, col)).or_default()
    }

    /// Existing cells inside `bounds`
    pub(crate) fn cells_in(
        &mut self,
        bounds: Bounds,
    ) -> impl Iterator<Item = (&(u32, u32), &mut CellState)> {
        self.cells
            .range_mut((bounds.first_row, 0)..=(bounds.last_row, u32::MAX))
            .filter(move |((_, col), _)| (bounds.first_col..=bounds.last_col).contains(col))
    }

    pub(crate) fn prune_blank_cells(&mut self) {
        self.cells.retain(|_, cell| !cell.is_blank());
    }

    pub(crate) fn values_in(&self, bounds: &Bounds) -> Vec<Vec<CellValue>> {
        (bounds.first_row..=bounds.last_row)
            .map(|row| {
                (bounds.first_col..=bounds.last_col)
                    .map(|col| {
                        self.cells
                            .get(&(row, col))
                            .map(|cell| cell.value.clone())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect()
    }

    /// Rewrite a table's cells, blanking whatever it covered before
    pub(crate) fn render_table(&mut self, index: usize, previous: Option<Bounds>) {
        if let Some(previous) = previous {
            for (_, cell) in self.cells_in(previous) {
                cell.clear_content();
            }
        }
        let table = self.tables[index].clone();
        for (offset, header) in table.columns.iter().enumerate() {
            let col = table.first_col + offset as u32;
            self.cell_mut(table.header_row, col).value = CellValue::String(header.clone());
        }
        for (r, row) in table.rows.iter().enumerate() {
            let sheet_row = table.header_row + 1 + r as u32;
            for (offset, value) in row.iter().enumerate() {
                let cell = self.cell_mut(sheet_row, table.first_col + offset as u32);
                cell.value = value.clone();
                cell.formula = None;
                if let Some(Some(format)) = table.column_formats.get(offset) {
                    cell.number_format = Some(format.clone());
                }
            }
        }
        self.prune_blank_cells();
    }

    /// Pull table data back from cells after a direct range write
    pub(crate) fn sync_tables_from_cells(&mut self, written: &Bounds) {
        for index in 0..self.tables.len() {
            let bounds = self.tables[index].bounds();
            if !bounds.intersects(written) {
                continue;
            }
            let mut values = self.values_in(&bounds).into_iter();
            let header = values.next().unwrap_or_default();
            let table = &mut self.tables[index];
            table.columns = header.iter().map(CellValue::to_text).collect();
            table.rows = values.collect();
        }
    }
}

/// The whole workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryWorkbook {
    pub sheets: Vec<MemorySheet>,
    /// Index of the active sheet
    pub active: usize,
    pub(crate) next_id: u64,
}

impl MemoryWorkbook {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut workbook = Self {
            sheets: Vec::new(),
            active: 0,
            next_id: 1,
        };
        for name in names {
            let id = workbook.allocate_id("ws");
            workbook.sheets.push(MemorySheet::new(id, name));
        }
        workbook
    }

    pub fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name.eq_ignore_ascii_case(name))
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut MemorySheet> {
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.name.eq_ignore_ascii_case(name))
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name.clone()).collect()
    }

    pub fn active_sheet(&self) -> Option<&MemorySheet> {
        self.sheets.get(self.active)
    }

    /// Table by name across all sheets
    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.sheets.iter().find_map(|sheet| sheet.table(name))
    }

    pub(crate) fn allocate_id(&mut self, prefix: &str) -> String {
        let id = format!("{{{prefix}-{:04}}}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Index of the first visible sheet
    pub(crate) fn first_visible(&self) -> usize {
        self.sheets
            .iter()
            .position(|sheet| sheet.visibility == Visibility::Visible)
            .unwrap_or(0)
    }

    pub(crate) fn visible_count(&self) -> usize {
        self.sheets
            .iter()
            .filter(|sheet| sheet.visibility == Visibility::Visible)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_used_bounds() {
        let mut sheet = MemorySheet::new("id", "Sheet1");
        assert_eq!(sheet.used_bounds(), Bounds::cell(1, 1));
        sheet.set_value("B2", 1);
        sheet.set_value("D5", "x");
        let used = sheet.used_bounds();
        assert_eq!(used.to_a1_string(), "B2:D5");
        assert_eq!(sheet.address_of(&used), "Sheet1!B2:D5");
    }

    #[test]
    fn test_address_of_quotes_sheet() {
        let sheet = MemorySheet::new("id", "Q1 Plan");
        assert_eq!(sheet.address_of(&Bounds::cell(1, 1)), "'Q1 Plan'!A1");
    }

    #[test]
    fn test_render_table() {
        let mut sheet = MemorySheet::new("id", "Sheet1");
        sheet.tables.push(MemoryTable {
            id: "t".into(),
            name: "Tasks".into(),
            header_row: 2,
            first_col: 1,
            columns: vec!["Name".into(), "Done".into()],
            rows: vec![vec!["a".into(), true.into()], vec!["b".into(), false.into()]],
            column_formats: vec![None, Some("@".into())],
            filtered: false,
        });
        sheet.render_table(0, None);
        assert_eq!(sheet.value("A2"), CellValue::from("Name"));
        assert_eq!(sheet.value("B4"), CellValue::Bool(false));
        assert_eq!(sheet.cell("B3").unwrap().number_format.as_deref(), Some("@"));

        let previous = sheet.tables[0].bounds();
        sheet.tables[0].rows.pop();
        sheet.render_table(0, Some(previous));
        assert_eq!(sheet.value("A4"), CellValue::Null);
        assert_eq!(sheet.used_bounds().to_a1_string(), "A2:B4");
    }
}
