//! # excel-gateway
//!
//! A fail-soft, batched automation client for spreadsheet hosts.
//!
//! Commands against worksheets, ranges and tables are queued on a
//! [`BatchContext`] and sent to the host together when the context is
//! flushed. Reads come back as [`Pending`] values that resolve after the
//! flush that carried them.
//!
//! ## Layers
//!
//! - [`HostSession`] - one connection to a host ([`StdioHost`] for a bridge
//!   process, [`MemoryHost`] for an in-process workbook)
//! - [`CommandBatchClient`] - opens contexts and turns failures into one log
//!   entry plus an [`Outcome`]
//! - [`EventBridge`] - routes host events to registered listeners
//! - [`SheetGateway`] - the typed operations applications call
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use excel_gateway::{grid, GatewayConfig, MemoryHost, SheetGateway};
//!
//! # async fn demo() {
//! let gateway = SheetGateway::new(Arc::new(MemoryHost::new()), GatewayConfig::from_env());
//!
//! gateway
//!     .set_range_values("Sheet1", "A1:B2", grid([["Item", "Qty"], ["pen", "3"]]))
//!     .await;
//! let used = gateway.used_range("Sheet1").await;
//! assert_eq!(used.as_deref(), Some("Sheet1!A1:B2"));
//! # }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod host;
pub mod log;
pub mod model;
pub mod proxy;

pub use batch::{BatchContext, ContextState, Pending};
pub use client::{CommandBatchClient, Outcome};
pub use config::GatewayConfig;
pub use error::{GatewayError, HostError, Result};
pub use events::{ChangeHandlers, EventBridge, EventPayload, Listener, SubscriptionHandle};
pub use facade::{SheetGateway, DEFAULT_COLUMN_WIDTH};
pub use host::{HostSession, MemoryHost, StdioHost, StdioHostConfig};
pub use log::{LogEntry, LogSink, RecordingLogSink, TracingLogSink};
pub use model::{
    AddWorksheetOptions, Collection, ConditionalFormatItem, FillItem, FormulaItem, HyperlinkItem,
    ListValidationItem, Loadable, NumberFormatItem, PromptItem, TableColumnAddress, TableConfig,
    TableExtent, TableInfo, TableSnapshot, WorksheetInfo,
};
pub use proxy::{RangeProxy, TableProxy, WorkbookProxy, WorksheetProxy};

// Pure helpers, usable without a host
pub use excel_gateway_core::{
    column_index_to_letters, date_serial, generate_prompt_message, generate_table_name,
    generate_worksheet_name, letters_to_column_index, next_available_row_index,
    table_body_column_address, validate_table_name, validate_worksheet_name, Address, NameError,
};

// Wire types that appear in the public API
pub use excel_gateway_protocol::{
    grid, CellValue, CellValueRule, ChangeType, ClearScope, CommentContentType, ConditionalFormat,
    DataValidationRule, EventSource, FormatOverrides, HorizontalAlignment, HostEvent, Hyperlink,
    ProtectionOptions, SheetKey, SortField, SubscriptionId, ValidationPrompt, ValueOperator,
    Visibility,
};
