//! Range address model
//!
//! An address names a sheet, a range on a sheet, or both:
//!
//! - `Sheet1` - a whole sheet
//! - `A1:C3` - a range on the current sheet
//! - `Sheet1!A1` - a single cell on a named sheet
//! - `'My Sheet'!$A$1:$C$3` - a quoted sheet name with absolute references
//!
//! Column letters are uppercase only. `$` markers are preserved when an
//! address is composed back into a string.

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A single cell reference (e.g., "A1", "$B$2")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CellRef {
    /// Column index (1-based, A=1, XFD=16384)
    pub col: u32,
    /// Row number (1-based)
    pub row: u32,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
}

impl CellRef {
    /// Create a relative cell reference from 1-based column and row
    pub fn new(col: u32, row: u32) -> Self {
        Self {
            col,
            row,
            col_absolute: false,
            row_absolute: false,
        }
    }

    /// Create an absolute cell reference ($A$1 style)
    pub fn absolute(col: u32, row: u32) -> Self {
        Self {
            col,
            row,
            col_absolute: true,
            row_absolute: true,
        }
    }

    /// Parse a cell reference from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use excel_gateway_core::CellRef;
    ///
    /// let cell = CellRef::parse("$B$2").unwrap();
    /// assert_eq!((cell.col, cell.row), (2, 2));
    /// assert!(cell.col_absolute && cell.row_absolute);
    ///
    /// assert!(CellRef::parse("b2").is_err());
    /// assert!(CellRef::parse("XFE1").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = bytes.first() == Some(&b'$');
        if col_absolute {
            pos += 1;
        }

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_uppercase() {
            pos += 1;
        }
        if pos == col_start {
            return Err(Error::InvalidAddress(format!("no column letters in '{s}'")));
        }
        let col = letters_to_column_index(&s[col_start..pos])
            .filter(|col| *col <= MAX_COLS)
            .ok_or_else(|| Error::InvalidAddress(format!("column out of range in '{s}'")))?;

        let row_absolute = bytes.get(pos) == Some(&b'$');
        if row_absolute {
            pos += 1;
        }

        let digits = &s[pos..];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidAddress(format!("invalid row number in '{s}'")));
        }
        if digits.starts_with('0') {
            return Err(Error::InvalidAddress(format!(
                "row number must be >= 1 in '{s}'"
            )));
        }
        let row: u32 = digits
            .parse()
            .ok()
            .filter(|row| *row <= MAX_ROWS)
            .ok_or_else(|| Error::InvalidAddress(format!("row out of range in '{s}'")))?;

        Ok(Self {
            col,
            row,
            col_absolute,
            row_absolute,
        })
    }

    /// Column letters of this reference, without `$`
    pub fn column_letters(&self) -> String {
        column_index_to_letters(self.col)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.col_absolute {
            f.write_str("$")?;
        }
        f.write_str(&self.column_letters())?;
        if self.row_absolute {
            f.write_str("$")?;
        }
        write!(f, "{}", self.row)
    }
}

impl FromStr for CellRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Normalized rectangular extent of a range (1-based, inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Bounds {
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

impl Bounds {
    /// Bounds covering a single cell
    pub fn cell(col: u32, row: u32) -> Self {
        Self {
            first_row: row,
            first_col: col,
            last_row: row,
            last_col: col,
        }
    }

    /// Bounds spanning two corner cells in any order
    pub fn spanning(a: CellRef, b: CellRef) -> Self {
        Self {
            first_row: a.row.min(b.row),
            first_col: a.col.min(b.col),
            last_row: a.row.max(b.row),
            last_col: a.col.max(b.col),
        }
    }

    pub fn row_count(&self) -> u32 {
        self.last_row - self.first_row + 1
    }

    pub fn col_count(&self) -> u32 {
        self.last_col - self.first_col + 1
    }

    pub fn contains(&self, col: u32, row: u32) -> bool {
        (self.first_row..=self.last_row).contains(&row)
            && (self.first_col..=self.last_col).contains(&col)
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.first_row <= other.last_row
            && other.first_row <= self.last_row
            && self.first_col <= other.last_col
            && other.first_col <= self.last_col
    }

    /// A1-style string for these bounds; single cells collapse to one reference
    pub fn to_a1_string(&self) -> String {
        let start = CellRef::new(self.first_col, self.first_row);
        if self.row_count() == 1 && self.col_count() == 1 {
            start.to_string()
        } else {
            format!("{start}:{}", CellRef::new(self.last_col, self.last_row))
        }
    }
}

/// A parsed range address
///
/// `end` is only ever present together with `start`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Address {
    sheet_name: Option<String>,
    start: Option<CellRef>,
    end: Option<CellRef>,
}

impl Address {
    /// Address of a whole sheet
    pub fn sheet(name: impl Into<String>) -> Self {
        Self {
            sheet_name: Some(name.into()),
            start: None,
            end: None,
        }
    }

    /// Address of a range on the current sheet
    pub fn range(start: CellRef, end: Option<CellRef>) -> Self {
        Self {
            sheet_name: None,
            start: Some(start),
            end,
        }
    }

    /// Qualify this address with a sheet name
    pub fn with_sheet(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    pub fn sheet_name(&self) -> Option<&str> {
        self.sheet_name.as_deref()
    }

    pub fn start(&self) -> Option<CellRef> {
        self.start
    }

    pub fn end(&self) -> Option<CellRef> {
        self.end
    }

    /// Rectangular extent of the range part, if any
    pub fn bounds(&self) -> Option<Bounds> {
        let start = self.start?;
        Some(Bounds::spanning(start, self.end.unwrap_or(start)))
    }

    /// Parse an address string; returns `None` for anything unparseable
    ///
    /// A bare token that reads as a cell or range is a range on the current
    /// sheet. Any other bare word is a sheet name.
    ///
    /// # Examples
    /// ```
    /// use excel_gateway_core::Address;
    ///
    /// let a = Address::parse("Sheet1!A1:C3").unwrap();
    /// assert_eq!(a.sheet_name(), Some("Sheet1"));
    /// assert_eq!(a.end().unwrap().to_string(), "C3");
    ///
    /// let sheet_only = Address::parse("Sheet1").unwrap();
    /// assert!(sheet_only.start().is_none());
    ///
    /// let range_only = Address::parse("B2").unwrap();
    /// assert!(range_only.sheet_name().is_none());
    ///
    /// assert!(Address::parse("").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        let (sheet_name, rest) = if let Some(quoted) = raw.strip_prefix('\'') {
            let (name, after) = split_quoted(quoted)?;
            if name.is_empty() {
                return None;
            }
            match after.strip_prefix('!') {
                Some(rest) if !rest.is_empty() => (name, rest),
                None if after.is_empty() => return Some(Self::sheet(name)),
                _ => return None,
            }
        } else if let Some((name, rest)) = raw.split_once('!') {
            if !is_bare_sheet_name(name) || rest.is_empty() {
                return None;
            }
            (name.to_string(), rest)
        } else if let Some((start, end)) = parse_range_part(raw) {
            return Some(Self::range(start, end));
        } else if is_bare_sheet_name(raw) {
            return Some(Self::sheet(raw));
        } else {
            return None;
        };

        let (start, end) = parse_range_part(rest)?;
        Some(Self {
            sheet_name: Some(sheet_name),
            start: Some(start),
            end,
        })
    }
}

impl fmt::Display for Address {
    /// Composes the address; sheet names that need it are quoted with `''` escapes
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.sheet_name {
            write_sheet_name(f, name)?;
            if self.start.is_some() {
                f.write_str("!")?;
            }
        }
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        if let Some(end) = self.end {
            write!(f, ":{end}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidAddress(s.to_string()))
    }
}

/// A whole-column span such as `A:C` or `$B:$B`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ColumnSpan {
    /// First column (1-based)
    pub first: u32,
    /// Last column (1-based, inclusive)
    pub last: u32,
}

impl ColumnSpan {
    /// Parse a column span; a single column (`"B"`) spans itself
    pub fn parse(s: &str) -> Option<Self> {
        let (a, b) = s.trim().split_once(':').unwrap_or((s.trim(), s.trim()));
        let first = parse_column_token(a)?;
        let last = parse_column_token(b)?;
        Some(Self {
            first: first.min(last),
            last: first.max(last),
        })
    }

    /// Bounds covering every row of the span
    pub fn bounds(&self) -> Bounds {
        Bounds {
            first_row: 1,
            first_col: self.first,
            last_row: MAX_ROWS,
            last_col: self.last,
        }
    }
}

impl fmt::Display for ColumnSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            column_index_to_letters(self.first),
            column_index_to_letters(self.last)
        )
    }
}

impl FromStr for ColumnSpan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::InvalidColumn(s.to_string()))
    }
}

fn parse_column_token(token: &str) -> Option<u32> {
    let letters = token.strip_prefix('$').unwrap_or(token);
    if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }
    letters_to_column_index(letters).filter(|col| *col <= MAX_COLS)
}

fn parse_range_part(s: &str) -> Option<(CellRef, Option<CellRef>)> {
    match s.split_once(':') {
        Some((a, b)) => Some((CellRef::parse(a).ok()?, Some(CellRef::parse(b).ok()?))),
        None => Some((CellRef::parse(s).ok()?, None)),
    }
}

/// Splits `Name''s Sheet'!A1` (opening quote already stripped) into the
/// unescaped name and whatever follows the closing quote.
fn split_quoted(s: &str) -> Option<(String, &str)> {
    let mut name = String::new();
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '\'' {
            name.push(c);
            continue;
        }
        if let Some((_, '\'')) = chars.peek() {
            chars.next();
            name.push('\'');
            continue;
        }
        return Some((name, &s[i + 1..]));
    }
    None
}

fn is_bare_sheet_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

fn needs_quotes(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_digit())
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        || parse_range_part(name).is_some()
}

fn write_sheet_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if needs_quotes(name) {
        write!(f, "'{}'", name.replace('\'', "''"))
    } else {
        f.write_str(name)
    }
}

/// Convert a 1-based column index to letters (1 = A, 26 = Z, 27 = AA)
///
/// Index 0 has no letters and yields an empty string.
pub fn column_index_to_letters(index: u32) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    while n > 0 {
        let rest = (n - 1) % 26;
        letters.push(b'A' + rest as u8);
        n = (n - 1 - rest) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert column letters to a 1-based index (A = 1, Z = 26, AA = 27)
///
/// Letters are case-insensitive here. Returns `None` for empty input,
/// non-letters, or indices that overflow `u32`.
pub fn letters_to_column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = c.to_ascii_uppercase() as u32 - 'A' as u32 + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// Row index (1-based) of the first free row below a used range
///
/// A used range that is only `A1` means the sheet is empty, so the first row
/// is free. Otherwise one blank row is left after the last used row.
/// Returns `None` when the address carries no range.
///
/// # Examples
/// ```
/// use excel_gateway_core::next_available_row_index;
///
/// assert_eq!(next_available_row_index("Sheet1!A1"), Some(1));
/// assert_eq!(next_available_row_index("Sheet1!A1:C10"), Some(12));
/// assert_eq!(next_available_row_index("Sheet1"), None);
/// ```
pub fn next_available_row_index(used_range: &str) -> Option<u32> {
    let address = Address::parse(used_range)?;
    let start = address.start()?;
    let is_a1 = |cell: CellRef| cell.col == 1 && cell.row == 1;
    match address.end() {
        None if is_a1(start) => Some(1),
        Some(end) if is_a1(start) && is_a1(end) => Some(1),
        Some(end) => Some(end.row + 2),
        None => Some(start.row + 2),
    }
}

/// Absolute address of one column of a table body
///
/// `row_index` is the 0-based sheet row of the first body row.
///
/// # Examples
/// ```
/// use excel_gateway_core::table_body_column_address;
///
/// assert_eq!(table_body_column_address("Data", "C", 1, 5), "'Data'!$C$2:$C$6");
/// ```
pub fn table_body_column_address(
    sheet_name: &str,
    column: &str,
    row_index: u32,
    row_count: u32,
) -> String {
    let first = row_index + 1;
    let last = (row_index + row_count).max(first);
    format!(
        "'{}'!${column}${first}:${column}${last}",
        sheet_name.replace('\'', "''")
    )
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn cell_ref() -> impl Strategy<Value = CellRef> {
        (1..=MAX_COLS, 1..=MAX_ROWS, any::<bool>(), any::<bool>()).prop_map(
            |(col, row, col_absolute, row_absolute)| CellRef {
                col,
                row,
                col_absolute,
                row_absolute,
            },
        )
    }

    proptest! {
        #[test]
        fn column_letters_round_trip(index in 1u32..=MAX_COLS) {
            let letters = column_index_to_letters(index);
            prop_assert_eq!(letters_to_column_index(&letters), Some(index));
        }

        #[test]
        fn address_round_trip(
            sheet in "[A-Za-z][A-Za-z0-9 _']{0,20}",
            start in cell_ref(),
            end in proptest::option::of(cell_ref()),
        ) {
            let address = Address::range(start, end).with_sheet(sheet.trim());
            prop_assume!(!sheet.trim().is_empty());
            let text = address.to_string();
            prop_assert_eq!(Address::parse(&text), Some(address));
        }
    }
}
