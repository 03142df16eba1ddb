//! Command execution against a [`MemoryWorkbook`]

use std::cmp::Ordering;

use excel_gateway_core::{
    validate_table_name, validate_worksheet_name, Address, Bounds, ColumnSpan, MAX_COLS,
    MAX_PROMPT_LEN, MAX_ROWS,
};
use excel_gateway_protocol::{
    CellValue, CellValueRule, ChangeType, ClearScope, Command, CommandResult, ConditionalFormat,
    DataValidationRule, HostEvent, ObjectRef, Operation, ProtectionOptions, SheetKey, SortField,
    TableKey, ValueOperator, Visibility,
};
use serde_json::{json, Map, Value};

use super::model::{CellState, Comment, MemorySheet, MemoryTable, MemoryWorkbook, Protection};
use crate::error::HostError;
use crate::host::version_at_least;

/// Most cells a single per-cell write may touch
const MAX_CELLS_PER_WRITE: u64 = 100_000;

/// API version that introduced autofit
pub(super) const AUTOFIT_REQUIREMENT: &str = "1.2";

const MAX_COLUMN_WIDTH: f64 = 255.0 * 7.0;
const MAX_PROMPT_TITLE_LEN: usize = 32;

type Exec<T> = Result<T, HostError>;

fn not_found(what: impl std::fmt::Display) -> HostError {
    HostError::new(
        "ItemNotFound",
        format!("The requested resource doesn't exist: {what}."),
    )
}

fn invalid_argument(message: impl Into<String>) -> HostError {
    HostError::new("InvalidArgument", message)
}

fn already_exists(message: impl Into<String>) -> HostError {
    HostError::new("ItemAlreadyExists", message)
}

fn access_denied(message: impl Into<String>) -> HostError {
    HostError::new("AccessDenied", message)
}

fn invalid_operation(message: impl Into<String>) -> HostError {
    HostError::new("InvalidOperation", message)
}

fn unsupported(operation: &Operation, on: &str) -> HostError {
    invalid_argument(format!("'{}' is not supported on {on}.", operation.name()))
}

fn dimension_mismatch() -> HostError {
    invalid_argument(
        "The number of rows or columns in the input array doesn't match the size or dimensions of the range.",
    )
}

/// What running one batch produced.
pub(super) struct BatchRun {
    pub results: Vec<CommandResult>,
    /// Events to deliver once the batch is committed
    pub events: Vec<HostEvent>,
    pub failed: bool,
}

/// A range-shaped command target resolved against the workbook.
struct RangeTarget {
    sheet: usize,
    bounds: Bounds,
    /// (table, column) when the range is a table column body
    column: Option<(usize, usize)>,
}

pub(super) struct Executor<'a> {
    workbook: &'a mut MemoryWorkbook,
    api_version: &'a str,
    /// Id of the object each executed command created, by batch index
    created: Vec<Option<String>>,
    events: Vec<HostEvent>,
}

impl<'a> Executor<'a> {
    pub fn new(workbook: &'a mut MemoryWorkbook, api_version: &'a str) -> Self {
        Self {
            workbook,
            api_version,
            created: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Execute `commands` in order, stopping at the first failure
    ///
    /// `fault` can replace any command's outcome with an injected error.
    pub fn run(
        mut self,
        commands: &[Command],
        fault: impl Fn(&Operation) -> Option<HostError>,
    ) -> BatchRun {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let outcome = match fault(&command.operation) {
                Some(err) => Err(err),
                None => self.execute(command),
            };
            match outcome {
                Ok(value) => {
                    let id = if command.operation.creates_object() {
                        value.get("id").and_then(Value::as_str).map(str::to_string)
                    } else {
                        None
                    };
                    self.created.push(id);
                    results.push(CommandResult::ok(value));
                }
                Err(err) => {
                    tracing::debug!(op = command.operation.name(), error = %err, "command failed");
                    results.push(CommandResult::error(err.code, err.message));
                    return BatchRun {
                        results,
                        events: Vec::new(),
                        failed: true,
                    };
                }
            }
        }
        BatchRun {
            results,
            events: self.events,
            failed: false,
        }
    }

    fn execute(&mut self, command: &Command) -> Exec<Value> {
        let Command { target, operation } = command;
        match operation {
            Operation::Load { properties } => return self.load(target, properties),
            Operation::Count { visible_only } => return self.count(target, *visible_only),
            _ => {}
        }
        match target {
            ObjectRef::Worksheets => match operation {
                Operation::AddWorksheet { name } => self.add_worksheet(name.as_deref()),
                other => Err(unsupported(other, "the worksheet collection")),
            },
            ObjectRef::Worksheet { sheet } => {
                let sheet = self.sheet_index(sheet)?;
                self.worksheet_op(sheet, operation)
            }
            ObjectRef::Tables { sheet } => match operation {
                Operation::AddTable {
                    address,
                    has_headers,
                } => {
                    let sheet = sheet
                        .as_ref()
                        .ok_or_else(|| invalid_argument("A table must be added to a worksheet."))?;
                    let sheet = self.sheet_index(sheet)?;
                    let (sheet, bounds) = self.parse_range(sheet, address)?;
                    self.ensure_editable(sheet, operation)?;
                    self.add_table(sheet, bounds, *has_headers)
                }
                other => Err(unsupported(other, "a table collection")),
            },
            ObjectRef::Table { sheet, table } => {
                let (sheet, table) = self.table_position(sheet.as_ref(), table)?;
                self.table_op(sheet, table, operation)
            }
            ObjectRef::Range { .. } | ObjectRef::UsedRange { .. } | ObjectRef::TableColumn { .. } => {
                let range = self.range_target(target)?;
                self.range_op(range, operation)
            }
        }
    }

    // -- resolution ---------------------------------------------------------

    fn created_id(&self, index: u32) -> Exec<String> {
        self.created
            .get(index as usize)
            .cloned()
            .flatten()
            .ok_or_else(|| invalid_argument(format!("Command {index} of this batch created no object.")))
    }

    fn sheet_index(&self, key: &SheetKey) -> Exec<usize> {
        let sheets = &self.workbook.sheets;
        match key {
            SheetKey::Active => Ok(self.workbook.active),
            SheetKey::Key(key) => sheets
                .iter()
                .position(|sheet| sheet.id == *key || sheet.name.eq_ignore_ascii_case(key))
                .ok_or_else(|| not_found(format!("worksheet '{key}'"))),
            SheetKey::Created(index) => {
                let id = self.created_id(*index)?;
                sheets
                    .iter()
                    .position(|sheet| sheet.id == id)
                    .ok_or_else(|| not_found(format!("worksheet '{id}'")))
            }
        }
    }

    fn table_position(&self, sheet: Option<&SheetKey>, key: &TableKey) -> Exec<(usize, usize)> {
        let (wanted, label) = match key {
            TableKey::Key(key) => (key.clone(), key.clone()),
            TableKey::Created(index) => {
                let id = self.created_id(*index)?;
                (id.clone(), id)
            }
        };
        let matches = |table: &MemoryTable| table.id == wanted || table.name.eq_ignore_ascii_case(&wanted);
        let sheets = match sheet {
            Some(sheet) => vec![self.sheet_index(sheet)?],
            None => (0..self.workbook.sheets.len()).collect(),
        };
        sheets
            .into_iter()
            .find_map(|s| {
                self.workbook.sheets[s]
                    .tables
                    .iter()
                    .position(&matches)
                    .map(|t| (s, t))
            })
            .ok_or_else(|| not_found(format!("table '{label}'")))
    }

    fn tables_of(&self, sheet: Option<&SheetKey>) -> Exec<Vec<(usize, usize)>> {
        let sheets = match sheet {
            Some(sheet) => vec![self.sheet_index(sheet)?],
            None => (0..self.workbook.sheets.len()).collect(),
        };
        Ok(sheets
            .into_iter()
            .flat_map(|s| (0..self.workbook.sheets[s].tables.len()).map(move |t| (s, t)))
            .collect())
    }

    /// Parse a range address on `sheet`; a sheet-qualified address wins
    fn parse_range(&self, sheet: usize, address: &str) -> Exec<(usize, Bounds)> {
        if let Some(span) = ColumnSpan::parse(address) {
            return Ok((sheet, span.bounds()));
        }
        let parsed = Address::parse(address)
            .ok_or_else(|| invalid_argument(format!("'{address}' is not a valid range address.")))?;
        let bounds = parsed
            .bounds()
            .ok_or_else(|| invalid_argument(format!("'{address}' does not name a range.")))?;
        let sheet = match parsed.sheet_name() {
            Some(name) => self.sheet_index(&SheetKey::Key(name.to_string()))?,
            None => sheet,
        };
        Ok((sheet, bounds))
    }

    fn range_target(&self, target: &ObjectRef) -> Exec<RangeTarget> {
        match target {
            ObjectRef::Range { sheet, address } => {
                let sheet = self.sheet_index(sheet)?;
                let (sheet, bounds) = self.parse_range(sheet, address)?;
                Ok(RangeTarget {
                    sheet,
                    bounds,
                    column: None,
                })
            }
            ObjectRef::UsedRange { sheet } => {
                let sheet = self.sheet_index(sheet)?;
                Ok(RangeTarget {
                    sheet,
                    bounds: self.workbook.sheets[sheet].used_bounds(),
                    column: None,
                })
            }
            ObjectRef::TableColumn {
                sheet,
                table,
                column,
            } => {
                let (s, t) = self.table_position(sheet.as_ref(), table)?;
                let table = &self.workbook.sheets[s].tables[t];
                let c = table
                    .column_position(column)
                    .ok_or_else(|| not_found(format!("column '{column}' of table '{}'", table.name)))?;
                let body = table.body_bounds();
                let col = table.first_col + c as u32;
                Ok(RangeTarget {
                    sheet: s,
                    bounds: Bounds {
                        first_col: col,
                        last_col: col,
                        ..body
                    },
                    column: Some((t, c)),
                })
            }
            _ => Err(invalid_argument("The target is not a range.")),
        }
    }

    fn ensure_editable(&self, sheet: usize, operation: &Operation) -> Exec<()> {
        let Some(protection) = &self.workbook.sheets[sheet].protection else {
            return Ok(());
        };
        if protection.paused || allowed_while_protected(operation, &protection.options) {
            return Ok(());
        }
        Err(access_denied(
            "The cell or chart you're trying to change is on a protected sheet.",
        ))
    }

    fn require_version(&self, operation: &Operation) -> Exec<()> {
        if version_at_least(self.api_version, AUTOFIT_REQUIREMENT) {
            Ok(())
        } else {
            Err(HostError::new(
                "ApiNotFound",
                format!(
                    "'{}' requires API {AUTOFIT_REQUIREMENT}; the host supports {}.",
                    operation.name(),
                    self.api_version
                ),
            ))
        }
    }

    fn changed(&mut self, sheet: usize, bounds: &Bounds, change: ChangeType) {
        let sheet = &self.workbook.sheets[sheet];
        self.events.push(HostEvent::changed(
            sheet.id.clone(),
            sheet.address_of(bounds),
            change,
        ));
    }

    // -- reads --------------------------------------------------------------

    fn load(&self, target: &ObjectRef, properties: &[String]) -> Exec<Value> {
        match target {
            ObjectRef::Worksheets => {
                let items = (0..self.workbook.sheets.len())
                    .map(|s| self.worksheet_props(s, properties))
                    .collect::<Exec<Vec<_>>>()?;
                Ok(json!({ "items": items }))
            }
            ObjectRef::Worksheet { sheet } => self.worksheet_props(self.sheet_index(sheet)?, properties),
            ObjectRef::Tables { sheet } => {
                let items = self
                    .tables_of(sheet.as_ref())?
                    .into_iter()
                    .map(|(s, t)| self.table_props(s, t, properties))
                    .collect::<Exec<Vec<_>>>()?;
                Ok(json!({ "items": items }))
            }
            ObjectRef::Table { sheet, table } => {
                let (s, t) = self.table_position(sheet.as_ref(), table)?;
                self.table_props(s, t, properties)
            }
            _ => {
                let range = self.range_target(target)?;
                self.range_props(&range, properties)
            }
        }
    }

    fn count(&self, target: &ObjectRef, visible_only: bool) -> Exec<Value> {
        match target {
            ObjectRef::Worksheets if visible_only => Ok(json!(self.workbook.visible_count())),
            ObjectRef::Worksheets => Ok(json!(self.workbook.sheets.len())),
            ObjectRef::Tables { sheet } => Ok(json!(self.tables_of(sheet.as_ref())?.len())),
            _ => Err(invalid_argument("Only collections can be counted.")),
        }
    }

    fn worksheet_props(&self, s: usize, properties: &[String]) -> Exec<Value> {
        let sheet = &self.workbook.sheets[s];
        select("a worksheet", properties, |property| {
            Some(match property {
                "id" => json!(sheet.id),
                "name" => json!(sheet.name),
                "visibility" => serde_json::to_value(sheet.visibility).ok()?,
                "position" => json!(s),
                "protected" => json!(sheet.is_protected()),
                "protectionPaused" => {
                    json!(sheet.protection.as_ref().is_some_and(|p| p.paused))
                }
                "frozenRows" => json!(sheet.frozen_rows),
                "frozenColumns" => json!(sheet.frozen_columns),
                "tableCount" => json!(sheet.tables.len()),
                _ => return None,
            })
        })
    }

    fn table_props(&self, s: usize, t: usize, properties: &[String]) -> Exec<Value> {
        let sheet = &self.workbook.sheets[s];
        let table = &sheet.tables[t];
        select("a table", properties, |property| {
            Some(match property {
                "id" => json!(table.id),
                "name" => json!(table.name),
                "worksheetName" => json!(sheet.name),
                "worksheetId" => json!(sheet.id),
                "rowCount" => json!(table.rows.len()),
                "columnCount" => json!(table.columns.len()),
                "headerValues" => json!([table.columns]),
                "bodyValues" => serde_json::to_value(&table.rows).ok()?,
                // sheet rows are 1-based, so the header row is the body's 0-based index
                "bodyRowIndex" => json!(table.header_row),
                "address" => json!(sheet.address_of(&table.bounds())),
                "filtered" => json!(table.filtered),
                _ => return None,
            })
        })
    }

    fn range_props(&self, range: &RangeTarget, properties: &[String]) -> Exec<Value> {
        let sheet = &self.workbook.sheets[range.sheet];
        let bounds = &range.bounds;
        let wants_grid = properties
            .iter()
            .any(|p| matches!(p.as_str(), "values" | "formulas" | "numberFormat" | "text"));
        if wants_grid {
            check_cell_count(bounds)?;
        }
        let table_column = range
            .column
            .map(|(t, c)| (&sheet.tables[t], c));
        select("a range", properties, |property| {
            Some(match property {
                "address" => json!(sheet.address_of(bounds)),
                "values" => serde_json::to_value(sheet.values_in(bounds)).ok()?,
                "formulas" => json!(grid_of(sheet, bounds, |cell| match cell {
                    Some(CellState {
                        formula: Some(formula),
                        ..
                    }) => json!(formula),
                    Some(cell) => serde_json::to_value(&cell.value).unwrap_or(Value::Null),
                    None => json!(""),
                })),
                "numberFormat" => json!(grid_of(sheet, bounds, |cell| {
                    json!(cell
                        .and_then(|cell| cell.number_format.as_deref())
                        .unwrap_or("General"))
                })),
                "text" => json!(grid_of(sheet, bounds, |cell| {
                    json!(cell.map(|cell| cell.value.to_text()).unwrap_or_default())
                })),
                "rowIndex" => json!(bounds.first_row - 1),
                "columnIndex" => json!(bounds.first_col - 1),
                "rowCount" => json!(bounds.row_count()),
                "columnCount" => json!(bounds.col_count()),
                "worksheetName" => json!(sheet.name),
                "name" => json!(table_column?.0.columns[table_column?.1]),
                "sheetColumn" => {
                    table_column?;
                    json!(bounds.first_col)
                }
                "index" => json!(table_column?.1),
                _ => return None,
            })
        })
    }

    // -- workbook and worksheet writes --------------------------------------

    fn add_worksheet(&mut self, name: Option<&str>) -> Exec<Value> {
        let name = match name {
            Some(name) => name.to_string(),
            None => (1..)
                .map(|n| format!("Sheet{n}"))
                .find(|candidate| self.workbook.sheet(candidate).is_none())
                .unwrap_or_default(),
        };
        validate_worksheet_name(&name, "Worksheet").map_err(|e| invalid_argument(e.to_string()))?;
        if self.workbook.sheet(&name).is_some() {
            return Err(already_exists(format!(
                "A worksheet named '{name}' already exists."
            )));
        }
        let id = self.workbook.allocate_id("ws");
        self.workbook.sheets.push(MemorySheet::new(id.clone(), name.clone()));
        Ok(json!({
            "id": id,
            "name": name,
            "visibility": Visibility::Visible,
            "position": self.workbook.sheets.len() - 1,
        }))
    }

    fn worksheet_op(&mut self, s: usize, operation: &Operation) -> Exec<Value> {
        match operation {
            Operation::Activate => {
                if self.workbook.sheets[s].visibility != Visibility::Visible {
                    return Err(invalid_operation("A hidden worksheet can't be activated."));
                }
                if self.workbook.active != s {
                    self.workbook.active = s;
                    let id = self.workbook.sheets[s].id.clone();
                    self.events.push(HostEvent::activated(id));
                }
            }
            Operation::Delete => {
                let visible = self.workbook.sheets[s].visibility == Visibility::Visible;
                if self.workbook.sheets.len() == 1 || (visible && self.workbook.visible_count() == 1) {
                    return Err(invalid_operation(
                        "A workbook must contain at least one visible worksheet.",
                    ));
                }
                let active_id = self.workbook.sheets[self.workbook.active].id.clone();
                self.workbook.sheets.remove(s);
                self.workbook.active = self
                    .workbook
                    .sheets
                    .iter()
                    .position(|sheet| sheet.id == active_id)
                    .unwrap_or_else(|| self.workbook.first_visible());
            }
            Operation::SetVisibility { visibility } => {
                let sheet = &self.workbook.sheets[s];
                if *visibility != Visibility::Visible
                    && sheet.visibility == Visibility::Visible
                    && self.workbook.visible_count() == 1
                {
                    return Err(invalid_operation(
                        "A workbook must contain at least one visible worksheet.",
                    ));
                }
                self.workbook.sheets[s].visibility = *visibility;
                if self.workbook.active == s && *visibility != Visibility::Visible {
                    self.workbook.active = self.workbook.first_visible();
                }
            }
            Operation::Rename { name } => {
                validate_worksheet_name(name, "Worksheet")
                    .map_err(|e| invalid_argument(e.to_string()))?;
                let taken = self
                    .workbook
                    .sheets
                    .iter()
                    .enumerate()
                    .any(|(i, sheet)| i != s && sheet.name.eq_ignore_ascii_case(name));
                if taken {
                    return Err(already_exists(format!(
                        "A worksheet named '{name}' already exists."
                    )));
                }
                self.workbook.sheets[s].name = name.clone();
            }
            Operation::Protect { options, password } => {
                let sheet = &mut self.workbook.sheets[s];
                if sheet.is_protected() {
                    return Err(invalid_operation("The worksheet is already protected."));
                }
                sheet.protection = Some(Protection {
                    password: password.clone(),
                    options: options.clone().unwrap_or_default(),
                    paused: false,
                });
            }
            Operation::Unprotect { password } => {
                let sheet = &mut self.workbook.sheets[s];
                if let Some(protection) = &sheet.protection {
                    check_password(protection, password.as_deref())?;
                    sheet.protection = None;
                }
            }
            Operation::PauseProtection { password } => {
                let protection = self.workbook.sheets[s]
                    .protection
                    .as_mut()
                    .ok_or_else(|| invalid_operation("The worksheet is not protected."))?;
                check_password(protection, password.as_deref())?;
                protection.paused = true;
            }
            Operation::ResumeProtection => {
                if let Some(protection) = self.workbook.sheets[s].protection.as_mut() {
                    protection.paused = false;
                }
            }
            Operation::FreezeAt { address } => {
                let bounds = Address::parse(address)
                    .and_then(|a| a.bounds())
                    .ok_or_else(|| invalid_argument(format!("'{address}' is not a valid range address.")))?;
                let sheet = &mut self.workbook.sheets[s];
                sheet.frozen_rows = bounds.last_row;
                sheet.frozen_columns = bounds.last_col;
            }
            Operation::FreezeRows { count } => {
                if *count > MAX_ROWS {
                    return Err(invalid_argument("Too many rows to freeze."));
                }
                self.workbook.sheets[s].frozen_rows = *count;
            }
            Operation::FreezeColumns { count } => {
                if *count > MAX_COLS {
                    return Err(invalid_argument("Too many columns to freeze."));
                }
                self.workbook.sheets[s].frozen_columns = *count;
            }
            other => return Err(unsupported(other, "a worksheet")),
        }
        Ok(Value::Null)
    }

    // -- tables -------------------------------------------------------------

    fn add_table(&mut self, s: usize, bounds: Bounds, has_headers: bool) -> Exec<Value> {
        let sheet = &self.workbook.sheets[s];
        if sheet.tables.iter().any(|table| table.bounds().intersects(&bounds)) {
            return Err(invalid_operation("A table can't overlap another table."));
        }
        if bounds.last_col > MAX_COLS || bounds.row_count() > MAX_CELLS_PER_WRITE as u32 {
            return Err(invalid_argument("The range is too large for a table."));
        }
        let mut values = sheet.values_in(&bounds);
        // without headers the data moves down one row under a generated header
        let raw_header = if has_headers {
            values.remove(0).iter().map(CellValue::to_text).collect()
        } else {
            vec![String::new(); bounds.col_count() as usize]
        };
        let columns = unique_headers(raw_header);
        let name = (1..)
            .map(|n| format!("Table{n}"))
            .find(|candidate| self.workbook.table(candidate).is_none())
            .unwrap_or_default();
        let id = self.workbook.allocate_id("tbl");
        let sheet = &mut self.workbook.sheets[s];
        sheet.tables.push(MemoryTable {
            id: id.clone(),
            name: name.clone(),
            header_row: bounds.first_row,
            first_col: bounds.first_col,
            column_formats: vec![None; columns.len()],
            columns,
            rows: values,
            filtered: false,
        });
        let index = sheet.tables.len() - 1;
        sheet.render_table(index, Some(bounds));
        Ok(json!({ "id": id, "name": name }))
    }

    fn table_op(&mut self, s: usize, t: usize, operation: &Operation) -> Exec<Value> {
        if !matches!(operation, Operation::Rename { .. }) {
            self.ensure_editable(s, operation)?;
        }
        let table = &self.workbook.sheets[s].tables[t];
        let previous = table.bounds();
        let width = table.columns.len();
        match operation {
            Operation::Rename { name } => {
                validate_table_name(name, "Table").map_err(|e| invalid_argument(e.to_string()))?;
                let id = table.id.clone();
                let taken = self
                    .workbook
                    .sheets
                    .iter()
                    .flat_map(|sheet| &sheet.tables)
                    .any(|other| other.id != id && other.name.eq_ignore_ascii_case(name));
                if taken {
                    return Err(already_exists(format!("A table named '{name}' already exists.")));
                }
                self.workbook.sheets[s].tables[t].name = name.clone();
            }
            Operation::Delete => {
                let sheet = &mut self.workbook.sheets[s];
                sheet.tables.remove(t);
                sheet.cells.retain(|&(row, col), _| !previous.contains(col, row));
            }
            Operation::SetHeaderValues { values } => {
                let [header] = values.as_slice() else {
                    return Err(dimension_mismatch());
                };
                if header.len() != width {
                    return Err(dimension_mismatch());
                }
                let sheet = &mut self.workbook.sheets[s];
                sheet.tables[t].columns = unique_headers(header.iter().map(CellValue::to_text).collect());
                sheet.render_table(t, Some(previous));
                let header_bounds = Bounds {
                    last_row: previous.first_row,
                    ..previous
                };
                self.changed(s, &header_bounds, ChangeType::RangeEdited);
            }
            Operation::AddRows { values } => {
                if values.iter().any(|row| row.len() != width) {
                    return Err(dimension_mismatch());
                }
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let sheet = &mut self.workbook.sheets[s];
                sheet.tables[t].rows.extend(values.iter().cloned());
                sheet.render_table(t, Some(previous));
                let added = Bounds {
                    first_row: previous.last_row + 1,
                    last_row: previous.last_row + values.len() as u32,
                    ..previous
                };
                self.changed(s, &added, ChangeType::RowInserted);
            }
            Operation::DeleteRows { indices } => {
                let len = table.rows.len();
                if let Some(bad) = indices.iter().find(|&&i| i as usize >= len) {
                    return Err(invalid_argument(format!(
                        "Row {bad} is outside the table body."
                    )));
                }
                if indices.is_empty() {
                    return Ok(Value::Null);
                }
                let body = table.body_bounds();
                let mut indices = indices.clone();
                indices.sort_unstable_by(|a, b| b.cmp(a));
                indices.dedup();
                let sheet = &mut self.workbook.sheets[s];
                for index in indices {
                    sheet.tables[t].rows.remove(index as usize);
                }
                sheet.render_table(t, Some(previous));
                self.changed(s, &body, ChangeType::RowDeleted);
            }
            Operation::SetNumberFormat { formats } => {
                let per_column = match formats.as_slice() {
                    [row] if row.len() == width => row.clone(),
                    [row] if row.len() == 1 => vec![row[0].clone(); width],
                    _ => return Err(dimension_mismatch()),
                };
                let sheet = &mut self.workbook.sheets[s];
                sheet.tables[t].column_formats = per_column.into_iter().map(Some).collect();
                sheet.render_table(t, None);
            }
            Operation::AddConditionalFormat { format } => {
                validate_conditional_format(format)?;
                let body = table.body_bounds();
                self.workbook.sheets[s]
                    .conditional_formats
                    .push((body, format.clone()));
            }
            Operation::Sort { fields } => {
                if let Some(field) = fields.iter().find(|f| f.key as usize >= width) {
                    return Err(invalid_argument(format!(
                        "Sort key {} is outside the table.",
                        field.key
                    )));
                }
                let body = table.body_bounds();
                let sheet = &mut self.workbook.sheets[s];
                sheet.tables[t].rows.sort_by(|a, b| compare_rows(a, b, fields));
                sheet.render_table(t, None);
                self.changed(s, &body, ChangeType::RangeEdited);
            }
            Operation::ClearFilters => {
                self.workbook.sheets[s].tables[t].filtered = false;
            }
            other => return Err(unsupported(other, "a table")),
        }
        Ok(Value::Null)
    }

    // -- ranges -------------------------------------------------------------

    fn range_op(&mut self, range: RangeTarget, operation: &Operation) -> Exec<Value> {
        let RangeTarget {
            sheet: s,
            bounds,
            column,
        } = range;
        self.ensure_editable(s, operation)?;
        match operation {
            Operation::SetValues { values } => {
                let grid = fit_grid(values, &bounds)?;
                self.write_grid(s, &bounds, grid, |cell, value| {
                    cell.value = value;
                    cell.formula = None;
                });
                self.workbook.sheets[s].sync_tables_from_cells(&bounds);
                self.changed(s, &bounds, ChangeType::RangeEdited);
            }
            Operation::SetFormulas { formulas } => {
                let grid = fit_grid(formulas, &bounds)?;
                self.write_grid(s, &bounds, grid, |cell, formula| {
                    if formula.starts_with('=') {
                        cell.formula = Some(formula);
                        cell.value = CellValue::Null;
                    } else {
                        cell.formula = None;
                        cell.value = CellValue::String(formula);
                    }
                });
                self.workbook.sheets[s].sync_tables_from_cells(&bounds);
                self.changed(s, &bounds, ChangeType::RangeEdited);
            }
            Operation::SetNumberFormat { formats } => {
                let grid = fit_grid(formats, &bounds)?;
                if let (Some((t, c)), [row]) = (column, formats.as_slice()) {
                    if let [format] = row.as_slice() {
                        self.workbook.sheets[s].tables[t].column_formats[c] = Some(format.clone());
                    }
                }
                self.write_grid(s, &bounds, grid, |cell, format| {
                    cell.number_format = Some(format);
                });
            }
            Operation::SetFillColor { color } => {
                validate_color(color)?;
                self.each_cell(s, &bounds, |cell| cell.fill_color = Some(color.clone()))?;
            }
            Operation::ClearFill => {
                self.existing_cells(s, &bounds, |cell| cell.fill_color = None);
            }
            Operation::SetFontColor { color } => {
                validate_color(color)?;
                self.each_cell(s, &bounds, |cell| cell.font_color = Some(color.clone()))?;
            }
            Operation::SetHorizontalAlignment { alignment } => {
                self.each_cell(s, &bounds, |cell| cell.alignment = Some(*alignment))?;
            }
            Operation::SetWrapText { wrap } => {
                self.each_cell(s, &bounds, |cell| cell.wrap_text = *wrap)?;
            }
            Operation::SetColumnWidth { width } => {
                if !(0.0..=MAX_COLUMN_WIDTH).contains(width) {
                    return Err(invalid_argument(format!("{width} is not a valid column width.")));
                }
                let sheet = &mut self.workbook.sheets[s];
                for col in bounds.first_col..=bounds.last_col {
                    sheet.column_widths.insert(col, *width);
                }
            }
            Operation::AutofitColumns => {
                self.require_version(operation)?;
                let sheet = &mut self.workbook.sheets[s];
                for col in bounds.first_col..=bounds.last_col {
                    let column = Bounds {
                        first_col: col,
                        last_col: col,
                        ..bounds
                    };
                    let widest = sheet
                        .cells_in(column)
                        .map(|(_, cell)| cell.value.to_text().chars().count())
                        .max();
                    if let Some(chars) = widest {
                        sheet.column_widths.insert(col, chars as f64 * 7.0 + 10.0);
                    }
                }
            }
            Operation::AutofitRows => {
                self.require_version(operation)?;
                let sheet = &mut self.workbook.sheets[s];
                let mut heights = std::collections::BTreeMap::new();
                for (&(row, _), cell) in sheet.cells_in(bounds) {
                    let lines = cell.value.to_text().lines().count().max(1);
                    let height = heights.entry(row).or_insert(0usize);
                    *height = (*height).max(lines);
                }
                for (row, lines) in heights {
                    sheet.row_heights.insert(row, lines as f64 * 15.0);
                }
            }
            Operation::SetColumnHidden { hidden } => {
                let sheet = &mut self.workbook.sheets[s];
                for col in bounds.first_col..=bounds.last_col {
                    if *hidden {
                        sheet.hidden_columns.insert(col);
                    } else {
                        sheet.hidden_columns.remove(&col);
                    }
                }
            }
            Operation::Clear { scope } => {
                let sheet = &mut self.workbook.sheets[s];
                match scope {
                    ClearScope::All => {
                        sheet.cells.retain(|&(row, col), _| !bounds.contains(col, row));
                    }
                    ClearScope::Contents => {
                        sheet.cells_in(bounds).for_each(|(_, cell)| cell.clear_content());
                    }
                    ClearScope::Formats => {
                        sheet.cells_in(bounds).for_each(|(_, cell)| cell.clear_formats());
                    }
                    ClearScope::Hyperlinks => {
                        sheet.cells_in(bounds).for_each(|(_, cell)| cell.hyperlink = None);
                    }
                }
                sheet.prune_blank_cells();
                if matches!(scope, ClearScope::All | ClearScope::Contents) {
                    sheet.sync_tables_from_cells(&bounds);
                    self.changed(s, &bounds, ChangeType::RangeEdited);
                }
            }
            Operation::SetDataValidation { rule } => {
                validate_rule(rule)?;
                let validations = &mut self.workbook.sheets[s].validations;
                validations.retain(|(b, _)| *b != bounds);
                validations.push((bounds, rule.clone()));
            }
            Operation::SetValidationPrompt { prompt } => {
                if prompt.title.chars().count() > MAX_PROMPT_TITLE_LEN {
                    return Err(invalid_argument("The prompt title is too long."));
                }
                if prompt.message.chars().count() > MAX_PROMPT_LEN {
                    return Err(invalid_argument("The prompt message is too long."));
                }
                let prompts = &mut self.workbook.sheets[s].prompts;
                prompts.retain(|(b, _)| *b != bounds);
                prompts.push((bounds, prompt.clone()));
            }
            Operation::ClearDataValidation => {
                let sheet = &mut self.workbook.sheets[s];
                sheet.validations.retain(|(b, _)| !b.intersects(&bounds));
                sheet.prompts.retain(|(b, _)| !b.intersects(&bounds));
            }
            Operation::AddConditionalFormat { format } => {
                validate_conditional_format(format)?;
                self.workbook.sheets[s]
                    .conditional_formats
                    .push((bounds, format.clone()));
            }
            Operation::ClearConditionalFormats => {
                self.workbook.sheets[s]
                    .conditional_formats
                    .retain(|(b, _)| !b.intersects(&bounds));
            }
            Operation::SetHyperlink { hyperlink } => {
                if hyperlink.address.trim().is_empty() {
                    return Err(invalid_argument("A hyperlink needs an address."));
                }
                self.each_cell(s, &bounds, |cell| {
                    if let Some(text) = &hyperlink.text_to_display {
                        cell.value = CellValue::String(text.clone());
                    }
                    cell.hyperlink = Some(hyperlink.clone());
                })?;
            }
            Operation::AddComment {
                content,
                content_type,
            } => {
                if bounds.row_count() != 1 || bounds.col_count() != 1 {
                    return Err(invalid_argument("A comment must be added to a single cell."));
                }
                if content.trim().is_empty() {
                    return Err(invalid_argument("A comment can't be empty."));
                }
                self.workbook.sheets[s].comments.push(Comment {
                    row: bounds.first_row,
                    col: bounds.first_col,
                    content: content.clone(),
                    content_type: *content_type,
                });
            }
            other => return Err(unsupported(other, "a range")),
        }
        Ok(Value::Null)
    }

    fn write_grid<T>(
        &mut self,
        s: usize,
        bounds: &Bounds,
        grid: Vec<Vec<T>>,
        mut write: impl FnMut(&mut CellState, T),
    ) {
        let sheet = &mut self.workbook.sheets[s];
        for (r, row) in grid.into_iter().enumerate() {
            for (c, value) in row.into_iter().enumerate() {
                let cell = sheet.cell_mut(bounds.first_row + r as u32, bounds.first_col + c as u32);
                write(cell, value);
            }
        }
        sheet.prune_blank_cells();
    }

    fn each_cell(
        &mut self,
        s: usize,
        bounds: &Bounds,
        mut apply: impl FnMut(&mut CellState),
    ) -> Exec<()> {
        check_cell_count(bounds)?;
        let sheet = &mut self.workbook.sheets[s];
        for row in bounds.first_row..=bounds.last_row {
            for col in bounds.first_col..=bounds.last_col {
                apply(sheet.cell_mut(row, col));
            }
        }
        sheet.prune_blank_cells();
        Ok(())
    }

    fn existing_cells(&mut self, s: usize, bounds: &Bounds, mut apply: impl FnMut(&mut CellState)) {
        let sheet = &mut self.workbook.sheets[s];
        sheet.cells_in(*bounds).for_each(|(_, cell)| apply(cell));
        sheet.prune_blank_cells();
    }
}

fn select(
    kind: &str,
    properties: &[String],
    lookup: impl Fn(&str) -> Option<Value>,
) -> Exec<Value> {
    let mut object = Map::new();
    for property in properties {
        let value = lookup(property).ok_or_else(|| {
            invalid_argument(format!("The property '{property}' is not available on {kind}."))
        })?;
        object.insert(property.clone(), value);
    }
    Ok(Value::Object(object))
}

fn grid_of(
    sheet: &MemorySheet,
    bounds: &Bounds,
    read: impl Fn(Option<&CellState>) -> Value,
) -> Vec<Vec<Value>> {
    (bounds.first_row..=bounds.last_row)
        .map(|row| {
            (bounds.first_col..=bounds.last_col)
                .map(|col| read(sheet.cells.get(&(row, col))))
                .collect()
        })
        .collect()
}

fn check_cell_count(bounds: &Bounds) -> Exec<()> {
    let cells = u64::from(bounds.row_count()) * u64::from(bounds.col_count());
    if cells > MAX_CELLS_PER_WRITE {
        return Err(invalid_argument("The range is too large for this operation."));
    }
    Ok(())
}

/// Match `values` to the shape of `bounds`; a single value fills the range
fn fit_grid<T: Clone>(values: &[Vec<T>], bounds: &Bounds) -> Exec<Vec<Vec<T>>> {
    if let [row] = values {
        if let [value] = row.as_slice() {
            check_cell_count(bounds)?;
            let row = vec![value.clone(); bounds.col_count() as usize];
            return Ok(vec![row; bounds.row_count() as usize]);
        }
    }
    let shape_ok = values.len() == bounds.row_count() as usize
        && values.iter().all(|row| row.len() == bounds.col_count() as usize);
    if !shape_ok {
        return Err(dimension_mismatch());
    }
    Ok(values.to_vec())
}

fn check_password(protection: &Protection, supplied: Option<&str>) -> Exec<()> {
    match protection.password.as_deref() {
        Some(expected) if supplied != Some(expected) => Err(access_denied(
            "The password you supplied is not correct.",
        )),
        _ => Ok(()),
    }
}

fn allowed_while_protected(operation: &Operation, options: &ProtectionOptions) -> bool {
    let allowed = match operation {
        Operation::SetFillColor { .. }
        | Operation::ClearFill
        | Operation::SetFontColor { .. }
        | Operation::SetHorizontalAlignment { .. }
        | Operation::SetWrapText { .. }
        | Operation::SetNumberFormat { .. }
        | Operation::AddConditionalFormat { .. }
        | Operation::ClearConditionalFormats => options.allow_format_cells,
        Operation::SetColumnWidth { .. }
        | Operation::SetColumnHidden { .. }
        | Operation::AutofitColumns
        | Operation::AutofitRows => options.allow_format_columns,
        Operation::AddRows { .. } => options.allow_insert_rows,
        Operation::DeleteRows { .. } => options.allow_delete_rows,
        Operation::Sort { .. } => options.allow_sort,
        Operation::ClearFilters => options.allow_auto_filter,
        _ => None,
    };
    allowed.unwrap_or(false)
}

fn validate_color(color: &str) -> Exec<()> {
    let valid = match color.strip_prefix('#') {
        Some(hex) => hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !color.is_empty() && color.chars().all(|c| c.is_ascii_alphabetic()),
    };
    if valid {
        Ok(())
    } else {
        Err(invalid_argument(format!("'{color}' is not a valid color.")))
    }
}

fn validate_value_rule(rule: &CellValueRule) -> Exec<()> {
    if rule.formula1.trim().is_empty() {
        return Err(invalid_argument("A rule needs a first formula."));
    }
    let two_sided = matches!(rule.operator, ValueOperator::Between | ValueOperator::NotBetween);
    if two_sided && rule.formula2.as_deref().map_or(true, |f| f.trim().is_empty()) {
        return Err(invalid_argument("A between rule needs a second formula."));
    }
    if rule.operator == ValueOperator::Invalid {
        return Err(invalid_argument("The rule operator is invalid."));
    }
    Ok(())
}

fn validate_rule(rule: &DataValidationRule) -> Exec<()> {
    match rule {
        DataValidationRule::List { source, .. } if source.trim().is_empty() => {
            Err(invalid_argument("A list validation needs a source."))
        }
        DataValidationRule::List { .. } => Ok(()),
        DataValidationRule::WholeNumber { rule }
        | DataValidationRule::Decimal { rule }
        | DataValidationRule::TextLength { rule } => validate_value_rule(rule),
    }
}

fn validate_conditional_format(format: &ConditionalFormat) -> Exec<()> {
    match format {
        ConditionalFormat::CellValue { rule, .. } => validate_value_rule(rule),
        ConditionalFormat::DataBar { lower, upper, .. } if lower > upper => Err(invalid_argument(
            "A data bar's lower bound can't exceed its upper bound.",
        )),
        ConditionalFormat::DataBar { color, .. } => validate_color(color),
    }
}

/// Make every header non-empty and unique, the way hosts do
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(raw.len());
    for (i, name) in raw.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Column{}", i + 1)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while headers.iter().any(|h| h.eq_ignore_ascii_case(&candidate)) {
            candidate = format!("{base}{n}");
            n += 1;
        }
        headers.push(candidate);
    }
    headers
}

fn compare_rows(a: &[CellValue], b: &[CellValue], fields: &[SortField]) -> Ordering {
    for field in fields {
        let key = field.key as usize;
        let ordering = compare_cells(a.get(key), b.get(key));
        let ordering = if field.ascending {
            ordering
        } else {
            ordering.reverse()
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Numbers sort before text, then booleans, then errors; blanks go last
fn compare_cells(a: Option<&CellValue>, b: Option<&CellValue>) -> Ordering {
    fn rank(value: Option<&CellValue>) -> u8 {
        match value {
            Some(CellValue::Number(_)) => 0,
            Some(CellValue::String(_)) => 1,
            Some(CellValue::Bool(_)) => 2,
            Some(CellValue::Error(_)) => 3,
            Some(CellValue::Null) | None => 4,
        }
    }
    match (a, b) {
        (Some(CellValue::Number(x)), Some(CellValue::Number(y))) => {
            x.partial_cmp(y).unwrap_or(Ordering::Equal)
        }
        (Some(CellValue::String(x)), Some(CellValue::String(y))) => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        (Some(CellValue::Bool(x)), Some(CellValue::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
