//! # excel-gateway-core
//!
//! Pure building blocks for the excel-gateway spreadsheet client.
//!
//! Nothing in this crate talks to a spreadsheet host. It provides:
//! - [`Address`], [`CellRef`] and [`ColumnSpan`] - parsing and composing range addresses
//! - [`date_serial`] - conversion between serial date numbers and calendar dates
//! - [`naming`] - worksheet/table name validation and name generation
//!
//! ## Example
//!
//! ```rust
//! use excel_gateway_core::{Address, column_index_to_letters, next_available_row_index};
//!
//! let address = Address::parse("'My Sheet'!A1:C10").unwrap();
//! assert_eq!(address.sheet_name(), Some("My Sheet"));
//! assert_eq!(address.to_string(), "'My Sheet'!A1:C10");
//!
//! assert_eq!(column_index_to_letters(28), "AB");
//! assert_eq!(next_available_row_index("Sheet1!A1:C10"), Some(12));
//! ```

pub mod address;
pub mod date_serial;
pub mod error;
pub mod naming;

pub use address::{
    column_index_to_letters, letters_to_column_index, next_available_row_index,
    table_body_column_address, Address, Bounds, CellRef, ColumnSpan,
};
pub use error::{Error, Result};
pub use naming::{
    generate_prompt_message, generate_table_name, generate_worksheet_name, validate_table_name,
    validate_worksheet_name, NameError,
};

/// Maximum number of rows in a worksheet
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet
pub const MAX_COLS: u32 = 16_384;

/// Maximum length of a worksheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;

/// Maximum length of a table name
pub const MAX_TABLE_NAME_LEN: usize = 255;

/// Maximum length of a validation prompt message
pub const MAX_PROMPT_LEN: usize = 255;
