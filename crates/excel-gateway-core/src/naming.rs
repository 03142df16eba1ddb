//! Worksheet and table naming rules
//!
//! Validation runs locally so an invalid name never costs a host round-trip.
//! The first failing rule wins, in the order listed on [`NameError`].

use crate::{MAX_PROMPT_LEN, MAX_SHEET_NAME_LEN, MAX_TABLE_NAME_LEN};
use thiserror::Error;

/// Characters a host rejects in worksheet names
pub const FORBIDDEN_SHEET_CHARS: [char; 7] = ['/', '\\', '?', '*', ':', '[', ']'];

/// Worksheet name reserved by the host
pub const RESERVED_SHEET_NAME: &str = "History";

/// Worksheet names leave room for this many characters of suffix
const GENERATED_SHEET_NAME_LEN: usize = 30;

/// Why a worksheet or table name was rejected
///
/// `target` is the caller-supplied label used in the message (for example
/// "Worksheet" or "Table").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("{target} cannot be blank.")]
    Blank { target: String },

    #[error("{target} names cannot contain more than {max} characters.")]
    TooLong { target: String, max: usize },

    #[error("{target} is currently containing these characters: / \\ ? * : [ ]. Please change to a different name.")]
    ForbiddenCharacter { target: String },

    #[error("{target} names cannot begin or end with an apostrophe (')")]
    Apostrophe { target: String },

    #[error("{target} names cannot be named '{reserved}'")]
    Reserved {
        target: String,
        reserved: &'static str,
    },
}

impl NameError {
    /// The label this error was raised for
    pub fn target(&self) -> &str {
        match self {
            NameError::Blank { target }
            | NameError::TooLong { target, .. }
            | NameError::ForbiddenCharacter { target }
            | NameError::Apostrophe { target }
            | NameError::Reserved { target, .. } => target,
        }
    }

    /// Human-readable reason the name was rejected
    pub fn cause(&self) -> String {
        self.to_string()
    }
}

/// Check a worksheet name against the host's rules
///
/// # Examples
/// ```
/// use excel_gateway_core::validate_worksheet_name;
///
/// assert!(validate_worksheet_name("Q1 Budget", "Worksheet").is_ok());
///
/// let err = validate_worksheet_name("a/b", "Worksheet").unwrap_err();
/// assert!(err.to_string().starts_with("Worksheet is currently containing"));
/// ```
pub fn validate_worksheet_name(name: &str, target: &str) -> Result<(), NameError> {
    validate_common(name, target, MAX_SHEET_NAME_LEN)?;
    if name.contains(FORBIDDEN_SHEET_CHARS) {
        return Err(NameError::ForbiddenCharacter {
            target: target.to_string(),
        });
    }
    if name.starts_with('\'') || name.ends_with('\'') {
        return Err(NameError::Apostrophe {
            target: target.to_string(),
        });
    }
    if name == RESERVED_SHEET_NAME {
        return Err(NameError::Reserved {
            target: target.to_string(),
            reserved: RESERVED_SHEET_NAME,
        });
    }
    Ok(())
}

/// Check a table name: not blank and at most 255 characters
pub fn validate_table_name(name: &str, target: &str) -> Result<(), NameError> {
    validate_common(name, target, MAX_TABLE_NAME_LEN)
}

fn validate_common(name: &str, target: &str, max: usize) -> Result<(), NameError> {
    if name.trim().is_empty() {
        return Err(NameError::Blank {
            target: target.to_string(),
        });
    }
    if name.chars().count() > max {
        return Err(NameError::TooLong {
            target: target.to_string(),
            max,
        });
    }
    Ok(())
}

/// Derive a table name from an arbitrary key
///
/// Keeps ASCII word characters only, prefixes `exTABLE_` (or `hexTABLE_`
/// for hidden tables) and truncates to the table name limit.
///
/// # Examples
/// ```
/// use excel_gateway_core::generate_table_name;
///
/// assert_eq!(generate_table_name("task-list 2", false), "exTABLE_tasklist2");
/// assert_eq!(generate_table_name("lookup", true), "hexTABLE_lookup");
/// ```
pub fn generate_table_name(key: &str, hidden: bool) -> String {
    let prefix = if hidden { "hexTABLE_" } else { "exTABLE_" };
    let cleaned = key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_');
    prefix
        .chars()
        .chain(cleaned)
        .take(MAX_TABLE_NAME_LEN)
        .collect()
}

/// Derive a worksheet name from a key, leaving room for `suffix`
///
/// Forbidden characters and whitespace are removed. The result (before the
/// caller appends `suffix`) is short enough that name plus suffix fits in 30
/// characters.
pub fn generate_worksheet_name(key: &str, suffix: &str) -> String {
    let budget = GENERATED_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
    key.chars()
        .filter(|c| !c.is_whitespace() && !FORBIDDEN_SHEET_CHARS.contains(c))
        .take(budget)
        .collect()
}

/// Truncate a validation prompt message to the host's limit
pub fn generate_prompt_message(message: &str) -> String {
    message.chars().take(MAX_PROMPT_LEN).collect()
}
