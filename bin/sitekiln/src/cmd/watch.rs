//! Watch command - development server with live reload

use std::{future::IntoFuture, net::IpAddr, path::Path, sync::Arc, time::Duration};

use sitekiln_tasks::{Pipeline, Task, TaskError, WatchHub};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::server::{ServerState, create_router};

/// The `watch` task: serve the destination and rebuild on change.
///
/// Never completes on its own unless the server or the watcher fails.
pub fn task(pipeline: &Pipeline) -> Task {
    let pipeline = pipeline.clone();
    Task::new("watch", move || run(pipeline.clone()))
}

/// Build the watch bindings: one per source group, one for reloads.
pub fn bindings(pipeline: &Pipeline, state: Arc<ServerState>) -> sitekiln_tasks::Result<WatchHub> {
    let paths = &pipeline.config().paths;
    let mut hub = WatchHub::new();

    hub.on_change(&paths.views_all, pipeline.views())?
        .on_change(&paths.scss_all, pipeline.styles())?
        .on_change(&paths.images, pipeline.minimgs())?
        .on_change_any(paths.reload.as_slice(), reload_task(state))?;

    Ok(hub)
}

fn reload_task(state: Arc<ServerState>) -> Task {
    Task::new("reload", move || {
        let state = Arc::clone(&state);
        async move {
            state.notify_reload();
            Ok(())
        }
    })
}

/// Start the server and watcher and run until either fails.
pub async fn run(pipeline: Pipeline) -> sitekiln_tasks::Result<()> {
    let config = Arc::clone(pipeline.config());
    let state = Arc::new(ServerState::new());
    let hub = bindings(&pipeline, Arc::clone(&state))?;

    let addr = config.server_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| TaskError::Server {
            addr: addr.clone(),
            source,
        })?;

    let server = &config.settings.server;
    let url = browser_url(&server.host, server.port);
    info!(%url, "Dev server running, press Ctrl+C to stop");
    if server.open {
        if let Err(err) = open::that(&url) {
            warn!(%url, error = %err, "failed to open browser");
        }
    }

    let app = create_router(Path::new(&config.paths.destination), state);
    let watcher = tokio::spawn(hub.run(Duration::from_millis(config.settings.watch.delay_ms)));

    tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            served.map_err(|source| TaskError::Server { addr, source })
        }
        watched = watcher => watched?,
    }
}

/// URL a local browser can open for a server bound to `host`.
///
/// Wildcard binds are reached through loopback.
fn browser_url(host: &str, port: u16) -> String {
    match host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() && ip.is_ipv6() => format!("http://[::1]:{port}"),
        Ok(ip) if ip.is_unspecified() => format!("http://127.0.0.1:{port}"),
        Ok(IpAddr::V6(ip)) => format!("http://[{ip}]:{port}"),
        _ => format!("http://{host}:{port}"),
    }
}
