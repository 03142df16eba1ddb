//! End-to-end tests for excel-gateway.
//!
//! Every test drives a [`SheetGateway`](excel_gateway::SheetGateway) or a
//! [`CommandBatchClient`](excel_gateway::CommandBatchClient) against an
//! in-process [`MemoryHost`](excel_gateway::MemoryHost), then inspects the
//! host's workbook, its batch log and the recorded log entries.

mod batching;
mod common;
mod events;
mod formats;
mod tables;
mod worksheets;

pub use common::*;
