//! Common utilities for gateway tests.

use std::sync::Arc;
use std::time::Duration;

use excel_gateway::{GatewayConfig, MemoryHost, RecordingLogSink, SheetGateway};

/// Protection secret every test gateway is configured with.
pub const SECRET: &str = "t0p-secret";

/// A memory host, the sink its gateway logs to, and the gateway itself.
pub struct Fixture {
    pub host: Arc<MemoryHost>,
    pub sink: RecordingLogSink,
    pub gateway: SheetGateway,
}

pub fn fixture(host: MemoryHost) -> Fixture {
    let host = Arc::new(host);
    let sink = RecordingLogSink::new();
    let gateway = SheetGateway::with_log_sink(
        host.clone(),
        GatewayConfig::default()
            .with_component("gateway-tests")
            .with_protection_secret(SECRET),
        Arc::new(sink.clone()),
    );
    Fixture {
        host,
        sink,
        gateway,
    }
}

/// Yield to background tasks until `done` holds, for at most one second.
pub async fn wait_until(done: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if done() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    done()
}

/// Give background tasks a moment to run when nothing is expected to happen.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
