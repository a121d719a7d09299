//! Dev Server
//!
//! Builds once, serves the target directory over HTTP, and rebuilds on
//! every source change. Connected pages hold a `/dev-reload` event
//! stream and are told to reload after each successful rebuild.
//!
//! Everything runs on one `LocalExecutor`: connections are independent
//! tasks, and a single rebuild task drains queued change events before
//! each build so rebuilds never overlap.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use smol::channel::Receiver;
use smol::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use smol::net::{TcpListener, TcpStream};
use smol::{LocalExecutor, Timer};
use stitch_net::{NetError, ReloadHub, Request, Response, SseEvent};

use crate::config::{BuildConfig, DevServerConfig};
use crate::watcher::{ChangeEvent, SourceWatcher};
use crate::workspace::{sweep_orphaned_workspaces, BuildOutcome, WorkspaceManager};
use crate::BuildResult;

/// Event stream endpoint
pub const RELOAD_PATH: &str = "/dev-reload";

/// Quiet period after a change before rebuilding
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Injected before `</body>` of every served page
pub const RELOAD_SCRIPT: &str = r#"<script>
(function () {
  function connect() {
    var source = new EventSource('/dev-reload');
    source.onmessage = function (event) {
      if (event.data === 'reload') location.reload();
    };
    source.onerror = function () {
      source.close();
      setTimeout(connect, 1000);
    };
  }
  connect();
})();
</script>"#;

/// Development server
#[derive(Debug, Clone)]
pub struct DevServer {
    manager: WorkspaceManager,
    config: DevServerConfig,
}

impl DevServer {
    pub fn new(build: BuildConfig, config: DevServerConfig) -> Self {
        Self {
            manager: WorkspaceManager::new(build),
            config,
        }
    }

    /// Sweep leftovers, build, start watching, and bind the socket.
    ///
    /// A failed initial build is logged; the server still starts so the
    /// next save can fix it.
    pub async fn start(self) -> BuildResult<RunningDevServer> {
        let build = self.manager.config().clone();
        let swept = sweep_orphaned_workspaces(&build.workspace_root())?;
        if swept > 0 {
            tracing::info!("Cleaned up {} orphaned workspaces", swept);
        }

        if let Err(err) = self.manager.build().await {
            tracing::error!("Initial build failed: {}", err);
        }

        let watcher = SourceWatcher::new(&build.source_dir, &build.target_dir)?;
        let listener = TcpListener::bind(self.config.address())
            .await
            .map_err(NetError::from)?;
        let local_addr = listener.local_addr().map_err(NetError::from)?;
        tracing::info!("Dev server listening on http://{}", local_addr);

        Ok(RunningDevServer {
            listener,
            local_addr,
            watcher,
            manager: self.manager,
            target: build.target_dir,
            grace: self.config.shutdown_grace(),
        })
    }
}

/// A bound dev server, ready to serve
pub struct RunningDevServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    watcher: SourceWatcher,
    manager: WorkspaceManager,
    target: PathBuf,
    grace: Duration,
}

struct ServerState {
    target: PathBuf,
    hub: ReloadHub<TcpStream>,
}

impl RunningDevServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` resolves, then stop the watcher, close the
    /// socket, and give in-flight requests the grace period to finish
    pub async fn serve_until(self, shutdown: impl Future<Output = ()>) -> BuildResult<()> {
        let RunningDevServer {
            listener,
            watcher,
            manager,
            target,
            grace,
            ..
        } = self;
        let state = Rc::new(ServerState {
            target,
            hub: ReloadHub::new(),
        });

        let ex = LocalExecutor::new();
        ex.run(async {
            let rebuilds = ex.spawn(rebuild_loop(manager, watcher.events(), state.clone()));
            smol::future::or(accept_loop(&ex, &listener, state.clone()), shutdown).await;

            tracing::info!("Shutting down dev server");
            drop(watcher);
            drop(listener);
            Timer::after(grace).await;
            let _ = rebuilds.cancel().await;
        })
        .await;
        Ok(())
    }
}

async fn accept_loop(ex: &LocalExecutor<'_>, listener: &TcpListener, state: Rc<ServerState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::trace!("Connection from {}", peer);
                ex.spawn(handle_connection(stream, state.clone())).detach();
            }
            Err(err) => tracing::warn!("Accept failed: {}", err),
        }
    }
}

async fn rebuild_loop(manager: WorkspaceManager, events: Receiver<ChangeEvent>, state: Rc<ServerState>) {
    while let Ok(first) = events.recv().await {
        Timer::after(DEBOUNCE).await;
        let mut changed = first.paths.len();
        while let Ok(more) = events.try_recv() {
            changed += more.paths.len();
        }
        tracing::info!("{} paths changed, rebuilding", changed);

        match manager.build().await {
            Ok(BuildOutcome::Built(_)) => {
                let notified = state.hub.broadcast(&SseEvent::message("reload")).await;
                tracing::info!("Reload sent to {} clients", notified);
            }
            Ok(BuildOutcome::Skipped) => {}
            Err(err) => tracing::error!("Rebuild failed: {}", err),
        }
    }
    tracing::debug!("Watcher closed, rebuild loop finished");
}

async fn handle_connection(stream: TcpStream, state: Rc<ServerState>) {
    let mut reader = BufReader::new(stream.clone());
    let mut writer = stream;
    let request = match Request::read_from(&mut reader).await {
        Ok(request) => request,
        Err(NetError::ConnectionClosed) => return,
        Err(err) => {
            tracing::debug!("Bad request: {}", err);
            let _ = Response::text(400, "Bad Request").write_to(&mut writer).await;
            return;
        }
    };

    if request.method == "GET" && request.path == RELOAD_PATH {
        if let Err(err) = stream_reloads(writer, reader, &state.hub).await {
            tracing::debug!("Reload stream ended: {}", err);
        }
        return;
    }

    let response = respond(&state.target, &request).await;
    tracing::debug!("{} {} -> {}", request.method, request.target, response.status);
    if let Err(err) = response.write_to(&mut writer).await {
        tracing::debug!("Write failed: {}", err);
    }
}

/// Hold a `/dev-reload` stream open until the client goes away
async fn stream_reloads(
    mut stream: TcpStream,
    mut reader: BufReader<TcpStream>,
    hub: &ReloadHub<TcpStream>,
) -> std::io::Result<()> {
    let mut head = Response::event_stream().serialize_head();
    head.extend_from_slice(SseEvent::message("connected").encode().as_bytes());
    stream.write_all(&head).await?;
    stream.flush().await?;

    let id = hub.register(stream);
    let mut buf = [0u8; 512];
    let result = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => continue,
            Err(err) => break Err(err),
        }
    };
    hub.remove(id);
    result
}

/// Answer a non-stream request from the target directory
pub async fn respond(target: &Path, request: &Request) -> Response {
    if request.method != "GET" {
        return Response::text(405, "Method Not Allowed").header("Allow", "GET");
    }
    let Some(relative) = sanitize_path(&request.path) else {
        return Response::text(400, "Bad Request");
    };
    let Some(file) = resolve_file(target, &relative, request.path.ends_with('/')).await else {
        return Response::text(404, "Not Found");
    };

    let bytes = match smol::fs::read(&file).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!("Failed to read {}: {}", file.display(), err);
            return Response::text(500, "Internal Server Error");
        }
    };
    let content_type = content_type(&file);
    let body = if content_type.starts_with("text/html") {
        inject_reload_script(&String::from_utf8_lossy(&bytes)).into_bytes()
    } else {
        bytes
    };
    Response::new(200).header("Content-Type", content_type).body(body)
}

/// Request path relative to the target; `None` if it tries to leave it
pub fn sanitize_path(path: &str) -> Option<PathBuf> {
    let relative = PathBuf::from(path.trim_start_matches('/'));
    for component in relative.components() {
        if !matches!(component, Component::Normal(_) | Component::CurDir) {
            return None;
        }
    }
    Some(relative)
}

/// Map a request path onto a file: `/` and trailing slashes serve
/// `index.html`, extensionless paths fall back to `<path>.html`, then to
/// `<path>/index.html`
async fn resolve_file(target: &Path, relative: &Path, trailing_slash: bool) -> Option<PathBuf> {
    let base = target.join(relative);
    if relative.as_os_str().is_empty() || trailing_slash {
        let index = base.join("index.html");
        return is_file(&index).await.then_some(index);
    }
    if is_file(&base).await {
        return Some(base);
    }
    if relative.extension().is_none() {
        let mut with_ext = base.clone().into_os_string();
        with_ext.push(".html");
        let with_ext = PathBuf::from(with_ext);
        if is_file(&with_ext).await {
            return Some(with_ext);
        }
    }
    let index = base.join("index.html");
    is_file(&index).await.then_some(index)
}

async fn is_file(path: &Path) -> bool {
    smol::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

/// Insert [`RELOAD_SCRIPT`] before the last `</body>`, or append it
pub fn inject_reload_script(html: &str) -> String {
    match html.rfind("</body>") {
        Some(index) => format!("{}{}{}", &html[..index], RELOAD_SCRIPT, &html[index..]),
        None => format!("{html}{RELOAD_SCRIPT}"),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or_default() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
