//! Subprocess management and JSON-lines IPC with a host bridge process.
//!
//! The bridge reads one [`Request`] per line on stdin and writes one
//! [`HostMessage`] per line on stdout: responses carry the id of the request
//! they answer, events carry the subscription they belong to. A reader task
//! routes each line to whoever is waiting for it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use excel_gateway_protocol::{
    Command, CommandResult, EventSource, HostEvent, HostMessage, Request, RequestMessage,
    Response, ResponseData, ResponseResult, SubscriptionId,
};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::{version_at_least, EventStream, HostSession};
use crate::error::{GatewayError, HostError, Result};

/// Error code for failures the bridge reports without a host code
pub const BRIDGE_FAILURE: &str = "BridgeFailure";

/// File name searched for when no bridge path is configured
pub const BRIDGE_EXE_NAME: &str = "excel-gateway-bridge.exe";

/// Events kept per subscription that has not been registered yet
const MAX_EARLY_EVENTS: usize = 64;

/// Subscriptions that may hold early events at once
const MAX_EARLY_SUBSCRIPTIONS: usize = 16;

/// Configuration for starting a bridge process.
#[derive(Debug, Clone)]
pub struct StdioHostConfig {
    /// Path to the bridge executable.
    /// If None, it is searched for next to the current binary and in the
    /// current directory.
    pub bridge_exe_path: Option<PathBuf>,

    /// Program that runs the bridge (for example `wine`). If None, the
    /// bridge is executed directly.
    pub launcher: Option<PathBuf>,

    /// Extra environment for the bridge process (for example `WINEPREFIX`).
    pub env: Vec<(String, String)>,

    /// Extra arguments passed after the bridge path.
    pub args: Vec<String>,

    /// How long to wait for each response. If None, a round-trip waits
    /// for as long as the bridge takes.
    pub timeout: Option<Duration>,
}

impl Default for StdioHostConfig {
    fn default() -> Self {
        Self {
            bridge_exe_path: None,
            launcher: None,
            env: Vec::new(),
            args: Vec::new(),
            timeout: None,
        }
    }
}

#[derive(Default)]
struct Routes {
    pending: HashMap<u64, oneshot::Sender<Response>>,
    subscriptions: HashMap<SubscriptionId, mpsc::UnboundedSender<HostEvent>>,
    /// Events that arrived before their subscription was registered
    early: HashMap<SubscriptionId, VecDeque<HostEvent>>,
    /// Unsubscribed, waiting for the bridge to confirm
    retired: HashSet<SubscriptionId>,
    closed: bool,
}

/// A [`HostSession`] served by a bridge process over stdio.
pub struct StdioHost {
    child: tokio::sync::Mutex<Child>,
    stdin: tokio::sync::Mutex<ChildStdin>,
    routes: Arc<Mutex<Routes>>,
    reader: JoinHandle<()>,
    next_id: AtomicU64,
    api_versions: Vec<String>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for StdioHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioHost")
            .field("api_versions", &self.api_versions)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl StdioHost {
    /// Start the bridge process and open a session.
    pub async fn start(config: StdioHostConfig) -> Result<Self> {
        let exe_path = config.bridge_exe_path.unwrap_or_else(find_bridge_exe);

        if !exe_path.exists() {
            return Err(GatewayError::BridgeExeNotFound(
                exe_path.display().to_string(),
            ));
        }

        let mut cmd = match &config.launcher {
            Some(launcher) => {
                let mut cmd = tokio::process::Command::new(launcher);
                cmd.arg(&exe_path);
                cmd
            }
            None => tokio::process::Command::new(&exe_path),
        };
        cmd.args(&config.args);
        cmd.envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // bridge diagnostics go to our stderr
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| match &config.launcher {
            Some(launcher) if e.kind() == std::io::ErrorKind::NotFound => {
                GatewayError::LauncherNotFound(launcher.display().to_string())
            }
            _ => GatewayError::SpawnFailed(e),
        })?;

        let stdin = child.stdin.take().ok_or(GatewayError::NotRunning)?;
        let stdout = child.stdout.take().ok_or(GatewayError::NotRunning)?;

        let routes = Arc::new(Mutex::new(Routes::default()));
        let reader = tokio::spawn(read_loop(stdout, routes.clone()));
        tracing::debug!(bridge = %exe_path.display(), "bridge process started");

        let mut host = Self {
            child: tokio::sync::Mutex::new(child),
            stdin: tokio::sync::Mutex::new(stdin),
            routes,
            reader,
            next_id: AtomicU64::new(1),
            api_versions: Vec::new(),
            timeout: config.timeout,
        };

        match host.request(RequestMessage::Init).await? {
            Some(ResponseData::Session { api_versions }) => host.api_versions = api_versions,
            _ => return Err(GatewayError::UnexpectedResponse),
        }
        tracing::info!(api_versions = ?host.api_versions, "host session open");

        Ok(host)
    }

    /// API versions the host reported when the session opened
    pub fn api_versions(&self) -> &[String] {
        &self.api_versions
    }

    /// Close the session and wait for the bridge process to exit.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.request(RequestMessage::Shutdown).await;
        let status = self.child.lock().await.wait().await?;
        tracing::debug!(%status, "bridge process exited");
        Ok(())
    }

    /// Send a request and wait for the response carrying its id.
    async fn request(&self, message: RequestMessage) -> Result<Option<ResponseData>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut routes = self.routes.lock();
            if routes.closed {
                return Err(GatewayError::NotRunning);
            }
            routes.pending.insert(id, tx);
        }

        if let Err(err) = self.send(&Request { id, message }).await {
            self.routes.lock().pending.remove(&id);
            return Err(err);
        }

        let received = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.routes.lock().pending.remove(&id);
                    return Err(GatewayError::Host(HostError::new(
                        "Timeout",
                        format!("no response to request {id} within {limit:?}"),
                    )));
                }
            },
            None => rx.await,
        };
        let response = received.map_err(|_| GatewayError::NotRunning)?;

        match response.result {
            ResponseResult::Ok { data } => Ok(data),
            ResponseResult::Error { message } => {
                Err(GatewayError::Host(HostError::new(BRIDGE_FAILURE, message)))
            }
        }
    }

    async fn send(&self, request: &Request) -> Result<()> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }
}

impl Drop for StdioHost {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn into_host_error(err: GatewayError) -> HostError {
    match err {
        GatewayError::Host(err) => err,
        other => HostError::connection(other.to_string()),
    }
}

#[async_trait]
impl HostSession for StdioHost {
    async fn execute(&self, commands: Vec<Command>) -> std::result::Result<Vec<CommandResult>, HostError> {
        match self
            .request(RequestMessage::Batch { commands })
            .await
            .map_err(into_host_error)?
        {
            Some(ResponseData::Batch { results }) => Ok(results),
            _ => Err(HostError::new(BRIDGE_FAILURE, "unexpected response to a batch")),
        }
    }

    async fn subscribe(
        &self,
        source: EventSource,
    ) -> std::result::Result<(SubscriptionId, EventStream), HostError> {
        let subscription = match self
            .request(RequestMessage::Subscribe { source })
            .await
            .map_err(into_host_error)?
        {
            Some(ResponseData::Subscription { subscription }) => subscription,
            _ => {
                return Err(HostError::new(
                    BRIDGE_FAILURE,
                    "unexpected response to a subscription",
                ))
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let mut routes = self.routes.lock();
        for event in routes.early.remove(&subscription).unwrap_or_default() {
            let _ = tx.send(event);
        }
        routes.subscriptions.insert(subscription, tx);
        Ok((subscription, rx))
    }

    async fn unsubscribe(&self, subscription: SubscriptionId) -> std::result::Result<(), HostError> {
        {
            let mut routes = self.routes.lock();
            routes.subscriptions.remove(&subscription);
            routes.early.remove(&subscription);
            routes.retired.insert(subscription);
        }
        self.request(RequestMessage::Unsubscribe { subscription })
            .await
            .map_err(into_host_error)?;
        // Confirmed; the bridge sends nothing more for this id
        let mut routes = self.routes.lock();
        routes.retired.remove(&subscription);
        routes.early.remove(&subscription);
        Ok(())
    }

    fn supports_requirement(&self, version: &str) -> bool {
        self.api_versions
            .iter()
            .any(|available| version_at_least(available, version))
    }
}

async fn read_loop(stdout: ChildStdout, routes: Arc<Mutex<Routes>>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read from bridge");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<HostMessage>(&line) {
            Ok(HostMessage::Response(response)) => {
                let waiter = routes.lock().pending.remove(&response.id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(response);
                    }
                    None => tracing::debug!(id = response.id, "response with no waiter"),
                }
            }
            Ok(HostMessage::Event(envelope)) => route_event(&mut routes.lock(), envelope.subscription, envelope.event),
            Err(err) => tracing::warn!(error = %err, line = %line, "unreadable line from bridge"),
        }
    }

    let mut routes = routes.lock();
    routes.closed = true;
    routes.pending.clear();
    routes.subscriptions.clear();
    tracing::debug!("bridge output closed");
}

fn route_event(routes: &mut Routes, subscription: SubscriptionId, event: HostEvent) {
    if routes.retired.contains(&subscription) {
        return;
    }
    match routes.subscriptions.get(&subscription) {
        Some(tx) => {
            if tx.send(event).is_err() {
                routes.subscriptions.remove(&subscription);
            }
        }
        None => buffer_early(routes, subscription, event),
    }
}

fn buffer_early(routes: &mut Routes, subscription: SubscriptionId, event: HostEvent) {
    if !routes.early.contains_key(&subscription)
        && routes.early.len() >= MAX_EARLY_SUBSCRIPTIONS
    {
        tracing::debug!(%subscription, "dropping event for unknown subscription");
        return;
    }
    let queue = routes.early.entry(subscription).or_default();
    if queue.len() >= MAX_EARLY_EVENTS {
        queue.pop_front();
    }
    queue.push_back(event);
}

/// Attempt to locate the bridge exe next to the current executable or in the
/// current directory.
pub fn find_bridge_exe() -> PathBuf {
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop();
        let candidate = exe.join(BRIDGE_EXE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }
    Path::new(BRIDGE_EXE_NAME).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_bridge() {
        let err = StdioHost::start(StdioHostConfig {
            bridge_exe_path: Some(PathBuf::from("/nonexistent/bridge.exe")),
            ..Default::default()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::BridgeExeNotFound(_)));
    }

    #[test]
    fn test_early_events_are_buffered() {
        let mut routes = Routes::default();
        route_event(&mut routes, SubscriptionId(3), HostEvent::activated("ws-1"));
        assert_eq!(routes.early[&SubscriptionId(3)].len(), 1);

        routes.retired.insert(SubscriptionId(4));
        route_event(&mut routes, SubscriptionId(4), HostEvent::activated("ws-1"));
        assert!(!routes.early.contains_key(&SubscriptionId(4)));
    }

    #[test]
    fn test_early_events_are_bounded() {
        let mut routes = Routes::default();
        for i in 0..MAX_EARLY_EVENTS + 10 {
            route_event(&mut routes, SubscriptionId(1), HostEvent::activated(format!("ws-{i}")));
        }
        let queue = &routes.early[&SubscriptionId(1)];
        assert_eq!(queue.len(), MAX_EARLY_EVENTS);
        // The oldest events make room for new ones
        assert_eq!(queue.front().unwrap().worksheet_id, "ws-10");

        for id in 2..=MAX_EARLY_SUBSCRIPTIONS as u64 + 5 {
            route_event(&mut routes, SubscriptionId(id), HostEvent::activated("ws-1"));
        }
        assert_eq!(routes.early.len(), MAX_EARLY_SUBSCRIPTIONS);
        assert!(!routes.early.contains_key(&SubscriptionId(MAX_EARLY_SUBSCRIPTIONS as u64 + 5)));
    }

    #[test]
    fn test_default_config_waits_without_limit() {
        assert_eq!(StdioHostConfig::default().timeout, None);
    }

    #[cfg(unix)]
    mod fake_bridge {
        use super::*;
        use excel_gateway_protocol::{ObjectRef, Operation};
        use std::os::unix::fs::PermissionsExt;

        const SCRIPT: &str = r#"#!/bin/sh
while IFS= read -r line; do
  id=$(printf '%s' "$line" | sed -n 's/^{"id":\([0-9]*\).*/\1/p')
  case "$line" in
    *'"cmd":"Init"'*)
      echo "{\"id\":$id,\"status\":\"ok\",\"data\":{\"apiVersions\":[\"1.1\",\"1.3\"]}}" ;;
    *'"cmd":"Batch"'*)
      echo "{\"id\":$id,\"status\":\"ok\",\"data\":{\"results\":[{\"status\":\"ok\",\"value\":{\"items\":[]}}]}}" ;;
    *'"cmd":"Unsubscribe","params":{"subscription":7}'*)
      echo "{\"id\":$id,\"status\":\"ok\"}" ;;
    *'"cmd":"Subscribe"'*)
      echo '{"subscription":7,"event":{"kind":"activated","worksheetId":"ws-1"}}'
      echo "{\"id\":$id,\"status\":\"ok\",\"data\":{\"subscription\":7}}" ;;
    *'"cmd":"Shutdown"'*)
      echo "{\"id\":$id,\"status\":\"ok\"}"
      exit 0 ;;
    *)
      echo "{\"id\":$id,\"status\":\"error\",\"message\":\"unsupported\"}" ;;
  esac
done
"#;

        fn write_script(dir: &Path) -> PathBuf {
            let path = dir.join("bridge.sh");
            std::fs::write(&path, SCRIPT).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_session_round_trip() {
            let dir = tempfile::tempdir().unwrap();
            let host = StdioHost::start(StdioHostConfig {
                bridge_exe_path: Some(write_script(dir.path())),
                ..Default::default()
            })
            .await
            .unwrap();

            assert_eq!(host.api_versions(), ["1.1", "1.3"]);
            assert!(host.supports_requirement("1.2"));
            assert!(!host.supports_requirement("1.4"));

            let results = host
                .execute(vec![Command::new(
                    ObjectRef::Worksheets,
                    Operation::load(["name"]),
                )])
                .await
                .unwrap();
            assert_eq!(results.len(), 1);
            assert!(results[0].is_ok());

            let (id, mut events) = host
                .subscribe(EventSource::AnyWorksheetActivated)
                .await
                .unwrap();
            assert_eq!(id, SubscriptionId(7));
            assert_eq!(events.recv().await.unwrap().worksheet_id, "ws-1");

            host.unsubscribe(id).await.unwrap();
            assert!(host.routes.lock().retired.is_empty());

            // Not confirmed, so later events for it are still dropped
            let err = host.unsubscribe(SubscriptionId(9)).await.unwrap_err();
            assert_eq!(err.code, BRIDGE_FAILURE);
            assert_eq!(err.message, "unsupported");
            assert!(host.routes.lock().retired.contains(&SubscriptionId(9)));

            host.shutdown().await.unwrap();
        }

        #[tokio::test]
        async fn test_missing_launcher() {
            let dir = tempfile::tempdir().unwrap();
            let err = StdioHost::start(StdioHostConfig {
                bridge_exe_path: Some(write_script(dir.path())),
                launcher: Some(PathBuf::from("/nonexistent/wine")),
                ..Default::default()
            })
            .await
            .unwrap_err();
            assert!(matches!(err, GatewayError::LauncherNotFound(_)));
        }
    }
}
