//! Typed, fail-soft spreadsheet operations
//!
//! [`SheetGateway`] is the surface applications use. Every method is one
//! logical call: it opens a fresh batch context, queues and flushes as many
//! times as the operation needs, and closes the context again.
//!
//! No method returns an error. A failure is logged once through the
//! gateway's [`LogSink`] and the caller sees a sentinel instead: `None`,
//! `false`, or an empty collection. Use [`SheetGateway::client`] and
//! [`CommandBatchClient::run`] directly when a caller needs the reason.
//!
//! Worksheet and table names are validated locally before any round-trip.

mod format;
mod range;
mod subscriptions;
mod table;
mod worksheet;

use std::fmt;
use std::sync::Arc;

use excel_gateway_core::{validate_table_name, validate_worksheet_name};
use excel_gateway_protocol::SheetKey;

use crate::batch::BatchContext;
use crate::client::CommandBatchClient;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::events::EventBridge;
use crate::host::HostSession;
use crate::log::{LogSink, TracingLogSink};
use crate::model::{TableInfo, WorksheetInfo};
use crate::proxy::{TableProxy, WorkbookProxy, WorksheetProxy};

/// Column width applied by [`SheetGateway::wrap_text`] and the usual choice
/// for [`SheetGateway::set_column_width`]
pub const DEFAULT_COLUMN_WIDTH: f64 = 300.0;

/// Fail-soft operations on one host session.
///
/// Cloning is cheap; clones share the session, log sink and configuration.
#[derive(Clone)]
pub struct SheetGateway {
    client: CommandBatchClient,
    events: EventBridge,
    config: Arc<GatewayConfig>,
}

impl fmt::Debug for SheetGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetGateway")
            .field("component", &self.config.component)
            .field("autofit_requirement", &self.config.autofit_requirement)
            .field("has_protection_secret", &self.config.protection_secret.is_some())
            .finish_non_exhaustive()
    }
}

impl SheetGateway {
    /// A gateway that reports failures through `tracing`
    pub fn new(session: Arc<dyn HostSession>, config: GatewayConfig) -> Self {
        Self::with_log_sink(session, config, Arc::new(TracingLogSink))
    }

    pub fn with_log_sink(
        session: Arc<dyn HostSession>,
        config: GatewayConfig,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let client = CommandBatchClient::new(session, sink, config.component.clone());
        Self {
            events: EventBridge::new(client.clone()),
            client,
            config: Arc::new(config),
        }
    }

    /// The batch client underneath, for operations that want [`Outcome`](crate::Outcome)
    pub fn client(&self) -> &CommandBatchClient {
        &self.client
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Whether the host supports the API version layout autofit needs
    pub fn supports_autofit(&self) -> bool {
        self.client
            .session()
            .supports_requirement(&self.config.autofit_requirement)
    }

    fn secret(&self) -> Option<&str> {
        self.config.protection_secret.as_deref()
    }
}

fn worksheet(ctx: &BatchContext, key: &str) -> WorksheetProxy {
    WorksheetProxy::new(ctx.clone(), SheetKey::from(key))
}

fn workbook(ctx: &BatchContext) -> WorkbookProxy {
    WorkbookProxy::new(ctx.clone())
}

/// Load the sheet's identity along with whatever is queued, then flush
async fn sheet_info(ctx: &BatchContext, sheet: &WorksheetProxy) -> Result<WorksheetInfo> {
    let info = sheet.load::<WorksheetInfo>()?;
    ctx.flush().await?;
    info.into_value()
}

async fn table_info(ctx: &BatchContext, table: &TableProxy) -> Result<TableInfo> {
    let info = table.load::<TableInfo>()?;
    ctx.flush().await?;
    info.into_value()
}

fn check_worksheet_name(name: &str) -> Result<()> {
    validate_worksheet_name(name, "Worksheet")?;
    Ok(())
}

fn check_table_name(name: &str) -> Result<()> {
    validate_table_name(name, "Table")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::log::RecordingLogSink;

    pub(super) fn gateway_on(host: MemoryHost) -> (Arc<MemoryHost>, RecordingLogSink, SheetGateway) {
        let host = Arc::new(host);
        let sink = RecordingLogSink::new();
        let gateway = SheetGateway::with_log_sink(
            host.clone(),
            GatewayConfig::default().with_protection_secret("s3cret"),
            Arc::new(sink.clone()),
        );
        (host, sink, gateway)
    }

    #[test]
    fn test_debug_hides_secret() {
        let (_host, _sink, gateway) = gateway_on(MemoryHost::new());
        let debug = format!("{gateway:?}");
        assert!(debug.contains("has_protection_secret: true"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_autofit_gate_follows_host_version() {
        let (_host, _sink, gateway) = gateway_on(MemoryHost::new().with_api_version("1.1"));
        assert!(!gateway.supports_autofit());
        let (_host, _sink, gateway) = gateway_on(MemoryHost::new());
        assert!(gateway.supports_autofit());
    }
}
