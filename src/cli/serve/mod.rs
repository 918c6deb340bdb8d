//! HTTP server for the deployed tutorial.
//!
//! The server binds before the first deployment starts, so requests made
//! while content is still being fetched get the loading page instead of a
//! connection error.

mod handler;
mod lifecycle;
mod path;
mod response;

pub use handler::{App, ContentRequest, Reply};

use crate::{
    config::ServerConfig,
    content::Deployer,
    core::{is_shutdown, register_server},
    debug, log,
};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tiny_http::{Request, Server};

/// Worker threads serving static files and server routes.
const WORKER_THREADS: usize = 4;

/// Worker threads for requests that may block: CGI scripts, deployments and
/// bundle downloads.
const BLOCKING_THREADS: usize = 16;

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

/// Bind the HTTP server without starting the request loop
///
/// This allows the caller to start the deployment before entering the
/// request loop, while still being able to answer with the loading page
pub fn bind_server(config: &ServerConfig) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind_with_retry(config.server.interface, config.server.port)?;
    let server = Arc::new(server);
    register_server(Arc::clone(&server));

    log!("serve"; "http://{}{}/", addr, config.prefix());

    Ok(BoundServer { server, addr })
}

impl BoundServer {
    /// Start the request loop (blocking).
    pub fn run(self, app: Arc<App>) -> Result<()> {
        debug!("serve"; "accepting requests on {}", self.addr);
        run_request_loop(&self.server, app)
    }
}

/// Bind, start the initial deployment in the background, and serve until
/// Ctrl+C.
pub fn serve(config: Arc<ServerConfig>) -> Result<()> {
    let bound = bind_server(&config)?;

    let deployer = Arc::new(Deployer::new(Arc::clone(&config))?);
    deployer.spawn_initial();

    let app = Arc::new(App::new(config, deployer));
    bound.run(app)
}

fn run_request_loop(server: &Server, app: Arc<App>) -> Result<()> {
    // Slow scripts and deployments get their own pool so static files and
    // /ready keep answering while they run
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(WORKER_THREADS)
        .thread_name(|i| format!("http-worker-{i}"))
        .build()
        .context("Failed to create request thread pool")?;
    let blocking = rayon::ThreadPoolBuilder::new()
        .num_threads(BLOCKING_THREADS)
        .thread_name(|i| format!("http-blocking-{i}"))
        .build()
        .context("Failed to create blocking request thread pool")?;

    for request in server.incoming_requests() {
        let target = if app.is_blocking(request.url()) {
            &blocking
        } else {
            &pool
        };
        let app = Arc::clone(&app);
        target.spawn(move || {
            if let Err(e) = handle_request(request, &app) {
                log!("serve"; "request error: {e}");
            }
        });
    }

    Ok(())
}

/// Handle a single HTTP request
fn handle_request(mut request: Request, app: &App) -> Result<()> {
    // Early exit if shutdown requested
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    let Some(content) = response::read_request(&mut request)? else {
        debug!("serve"; "{} {} -> 413", request.method(), request.url());
        return response::respond_too_large(request);
    };
    let reply = app.handle(&content);
    debug!("serve"; "{} {} -> {}", content.method, content.url, reply.status);
    response::send(request, reply)
}
