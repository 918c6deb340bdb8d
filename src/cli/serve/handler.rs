//! Request routing, independent of the HTTP library.
//!
//! | Route                    | Behaviour                                   |
//! |--------------------------|---------------------------------------------|
//! | `/`                      | redirect to the default part                |
//! | `/ready`                 | JSON status, never gated                    |
//! | `/download`              | zip bundle of every part                    |
//! | `/refresh`               | POST: run a new deployment                  |
//! | `/<part>`                | redirect to `/<part>/`                      |
//! | `/<part>/<path>`         | static file, CGI script, or workspace write |
//!
//! Everything except `/ready` passes through [`App::gated`] first.

use percent_encoding::percent_decode_str;
use std::{fs, path::Path, sync::Arc};
use tiny_http::Method;

use super::path::{ResolveError, resolve, resolve_for_write};
use crate::{
    cgi::{CgiBridge, CgiRequest},
    config::{Part, PartKind, ServerConfig},
    content::{Deployer, bundle},
    core::GateView,
    debug,
    embed::serve::{LOADING_HTML, LoadingVars, NOT_FOUND_HTML, NotFoundVars},
    log,
    utils::mime::{self, types},
};

/// Seconds a client should wait before retrying while content is deploying.
pub const RETRY_AFTER_SECS: u64 = 2;

/// An incoming request, reduced to what routing needs.
#[derive(Debug, Clone)]
pub struct ContentRequest {
    pub method: Method,
    /// Raw request target including the query string.
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ContentRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            content_type: None,
            body: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_body(mut self, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        self.content_type = content_type.map(str::to_string);
        self.body = body.into();
        self
    }
}

/// Response produced by [`App::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.with_header("Content-Type", content_type)
    }

    fn text(status: u16, message: impl Into<String>) -> Self {
        Self::new(status).with_body(types::PLAIN, message.into())
    }

    fn redirect(status: u16, location: String) -> Self {
        Self::new(status).with_header("Location", location)
    }

    /// First header named `name` (case-insensitive).
    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Everything a request handler needs, shared by all worker threads.
pub struct App {
    config: Arc<ServerConfig>,
    deployer: Arc<Deployer>,
    gate: GateView,
    cgi: CgiBridge,
    prefix: String,
}

impl App {
    pub fn new(config: Arc<ServerConfig>, deployer: Arc<Deployer>) -> Self {
        Self {
            gate: deployer.view(),
            cgi: CgiBridge::from_config(&config.live),
            prefix: config.prefix(),
            config,
            deployer,
        }
    }

    pub fn handle(&self, request: &ContentRequest) -> Reply {
        let (path, query) = request
            .url
            .split_once('?')
            .unwrap_or((request.url.as_str(), ""));

        let Some(rest) = self.strip_prefix(path) else {
            return self.not_found(path);
        };
        let Ok(rest) = percent_decode_str(rest).decode_utf8() else {
            return self.not_found(path);
        };

        match &*rest {
            "" | "/" => self.gated(|| self.root_redirect()),
            "/ready" => self.ready(),
            "/download" => self.gated(|| self.download(request)),
            "/refresh" => self.gated(|| self.refresh(request)),
            _ => self.part_route(request, &rest, query),
        }
    }

    /// Whether serving `url` may hold a worker for long: deployments, bundle
    /// downloads and CGI scripts.
    pub fn is_blocking(&self, url: &str) -> bool {
        let path = url.split_once('?').map_or(url, |(path, _)| path);
        let Some(rest) = self.strip_prefix(path) else {
            return false;
        };
        let Ok(rest) = percent_decode_str(rest).decode_utf8() else {
            return false;
        };

        let segment = rest.trim_start_matches('/').split('/').next().unwrap_or_default();
        match segment {
            "refresh" | "download" => true,
            _ => self
                .config
                .part_by_segment(segment)
                .is_some_and(|part| part.kind() == PartKind::Live),
        }
    }

    /// Strip the configured prefix; `None` when `path` lies outside it.
    fn strip_prefix<'a>(&self, path: &'a str) -> Option<&'a str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        (rest.is_empty() || rest.starts_with('/')).then_some(rest)
    }

    /// Run `handler` only once the content is deployed.
    fn gated(&self, handler: impl FnOnce() -> Reply) -> Reply {
        if self.gate.is_ready() {
            handler()
        } else {
            self.loading()
        }
    }

    fn loading(&self) -> Reply {
        let body = LOADING_HTML.render(&LoadingVars {
            title: self.config.app.name.clone(),
            ready_url: format!("{}/ready", self.prefix),
            retry_after: RETRY_AFTER_SECS,
        });
        Reply::new(503)
            .with_body(types::HTML, body)
            .with_header("Retry-After", RETRY_AFTER_SECS.to_string())
            .with_header("Cache-Control", "no-store")
    }

    fn not_found(&self, path: &str) -> Reply {
        let body = NOT_FOUND_HTML.render(&NotFoundVars {
            path: path.to_string(),
            home_url: format!("{}/", self.prefix),
        });
        Reply::new(404).with_body(types::HTML, body)
    }

    fn method_not_allowed(&self, allow: &str) -> Reply {
        Reply::text(405, "405 Method Not Allowed").with_header("Allow", allow)
    }

    // ========================================================================
    // server routes
    // ========================================================================

    fn root_redirect(&self) -> Reply {
        match self.config.default_part() {
            Some(part) => Reply::redirect(302, format!("{}/{}/", self.prefix, part.url_segment())),
            None => self.not_found("/"),
        }
    }

    fn ready(&self) -> Reply {
        let status = self.gate.status();
        let mut json = serde_json::json!({
            "status": status.is_ready(),
            "state": status.as_str(),
        });
        if let Some(error) = status.error() {
            json["error"] = error.into();
        }
        Reply::new(200)
            .with_body(types::JSON, json.to_string())
            .with_header("Cache-Control", "no-store")
    }

    fn download(&self, request: &ContentRequest) -> Reply {
        if !matches!(request.method, Method::Get | Method::Head) {
            return self.method_not_allowed("GET, HEAD");
        }
        match bundle::build_bundle(&self.config) {
            Ok(bytes) => Reply::new(200)
                .with_body(types::ZIP, bytes)
                .with_header("Content-Disposition", bundle::disposition(&self.config)),
            Err(e) => {
                log!("error"; "failed to build download bundle: {}", e);
                Reply::text(500, "500 Internal Server Error")
            }
        }
    }

    fn refresh(&self, request: &ContentRequest) -> Reply {
        if request.method != Method::Post {
            return self.method_not_allowed("POST");
        }
        match self.deployer.deploy() {
            Ok(report) => Reply::text(200, format!("{}\n", report.summary())),
            Err(e) => Reply::text(500, format!("deployment failed: {e}\n")),
        }
    }

    // ========================================================================
    // part routes
    // ========================================================================

    fn part_route(&self, request: &ContentRequest, path: &str, query: &str) -> Reply {
        let trimmed = &path[1..];
        let (segment, relative) = match trimmed.split_once('/') {
            Some((segment, relative)) => (segment, Some(relative)),
            None => (trimmed, None),
        };
        let Some(part) = self.config.part_by_segment(segment) else {
            return self.not_found(path);
        };

        let Some(relative) = relative else {
            let mut location = format!("{}/{}/", self.prefix, segment);
            if !query.is_empty() {
                location.push('?');
                location.push_str(query);
            }
            return Reply::redirect(301, location);
        };

        self.gated(|| match request.method {
            Method::Get | Method::Head => self.serve(request, &part, path, relative, query),
            Method::Post if part.kind() == PartKind::Live => {
                self.serve(request, &part, path, relative, query)
            }
            Method::Put | Method::Patch if part.kind() == PartKind::Workspace => {
                self.write(request, &part, path, relative)
            }
            _ => self.method_not_allowed(allowed_methods(part.kind())),
        })
    }

    /// Serve a file of `part`, running it through the CGI bridge when it is a
    /// script of a live part.
    fn serve(
        &self,
        request: &ContentRequest,
        part: &Part<'_>,
        url_path: &str,
        relative: &str,
        query: &str,
    ) -> Reply {
        let root = self.config.target_dir(part);
        let index = self.config.index_for(part);
        let file = match resolve(&root, relative, &index) {
            Ok(file) => file,
            Err(e) => {
                debug!("serve"; "{} not served: {}", url_path, e);
                return self.not_found(url_path);
            }
        };

        if part.kind() == PartKind::Live && self.config.live.is_script(&file) {
            return self.run_script(request, &root, &file, url_path, query);
        }
        if request.method == Method::Post {
            return self.method_not_allowed("GET, HEAD");
        }

        self.static_file(&file)
    }

    fn static_file(&self, file: &Path) -> Reply {
        let result = fs::read(file).and_then(|body| Ok((body, mime::classify(file)?)));
        match result {
            Ok((body, (content_type, encoding))) => {
                let mut reply = Reply::new(200)
                    .with_body(content_type, body)
                    .with_header("X-URL-Prefix", self.prefix.clone());
                if let Some(encoding) = encoding {
                    reply = reply.with_header("Content-Encoding", encoding);
                }
                reply
            }
            Err(e) => {
                log!("error"; "failed to read {}: {}", file.display(), e);
                Reply::text(500, "500 Internal Server Error")
            }
        }
    }

    fn run_script(
        &self,
        request: &ContentRequest,
        root: &Path,
        script: &Path,
        url_path: &str,
        query: &str,
    ) -> Reply {
        let script_name = format!("{}{}", self.prefix, url_path);
        let document_root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let cgi_request = CgiRequest {
            script,
            script_name: &script_name,
            method: request.method.as_str(),
            query,
            body: &request.body,
            content_type: request.content_type.as_deref(),
            document_root: &document_root,
        };

        match self.cgi.respond(&cgi_request) {
            Ok(response) => Reply {
                status: response.status,
                headers: response.headers,
                body: response.body,
            },
            Err(e) if e.is_timeout() => {
                log!("error"; "{} timed out: {}", script_name, e);
                Reply::text(500, "500 Internal Server Error: script timed out")
            }
            Err(e) => {
                log!("error"; "{} failed: {}", script_name, e);
                Reply::text(500, "500 Internal Server Error")
            }
        }
    }

    /// Store the request body as a workspace file.
    fn write(
        &self,
        request: &ContentRequest,
        part: &Part<'_>,
        url_path: &str,
        relative: &str,
    ) -> Reply {
        let root = self.config.target_dir(part);
        let target = match resolve_for_write(&root, relative) {
            Ok(target) => target,
            Err(ResolveError::IsDirectory) => return Reply::text(409, "409 Conflict: is a directory"),
            Err(e) => {
                debug!("serve"; "{} not writable: {}", url_path, e);
                return self.not_found(url_path);
            }
        };

        let result = target
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&target, &request.body));
        match result {
            Ok(()) => {
                debug!("serve"; "wrote {} bytes to {}", request.body.len(), target.display());
                Reply::new(204)
            }
            Err(e) => {
                log!("error"; "failed to write {}: {}", target.display(), e);
                Reply::text(500, "500 Internal Server Error")
            }
        }
    }
}

fn allowed_methods(kind: PartKind) -> &'static str {
    match kind {
        PartKind::Tutorial => "GET, HEAD",
        PartKind::Workspace => "GET, HEAD, PUT, PATCH",
        PartKind::Live => "GET, HEAD, POST",
    }
}
