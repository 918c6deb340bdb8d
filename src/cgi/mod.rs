//! CGI bridge: run a script through an external interpreter per request.
//!
//! The interpreter (`php-cgi` by default) gets the script path as its only
//! argument, a CGI/1.1 environment, and the request body on stdin. Its
//! stdout is parsed by [`output::parse`]. A child that outlives
//! `live.timeout` is killed and no partial output is used.

pub mod output;

pub use output::CgiResponse;

use std::{path::Path, time::Duration};
use thiserror::Error;

use crate::{
    config::LiveConfig,
    debug, log,
    utils::exec::{Cmd, ExecError},
};

const SERVER_SOFTWARE: &str = concat!("tutorial-server/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum CgiError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("`{interpreter}` exited with {code:?} without output")]
    Failed {
        interpreter: String,
        code: Option<i32>,
    },
}

impl CgiError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Exec(ExecError::Timeout { .. }))
    }
}

/// One script invocation.
#[derive(Debug, Clone, Copy)]
pub struct CgiRequest<'a> {
    /// Absolute path of the resolved script.
    pub script: &'a Path,
    /// URL path of the script as requested.
    pub script_name: &'a str,
    pub method: &'a str,
    pub query: &'a str,
    pub body: &'a [u8],
    pub content_type: Option<&'a str>,
    /// Root directory of the live part.
    pub document_root: &'a Path,
}

impl CgiRequest<'_> {
    /// CGI/1.1 meta-variables for this request.
    pub fn environment(&self) -> Vec<(&'static str, String)> {
        let mut env = vec![
            ("GATEWAY_INTERFACE", "CGI/1.1".to_string()),
            ("QUERY_STRING", self.query.to_string()),
            ("REQUEST_METHOD", self.method.to_string()),
            ("SCRIPT_FILENAME", self.script.display().to_string()),
            ("SCRIPT_NAME", self.script_name.to_string()),
            ("DOCUMENT_ROOT", self.document_root.display().to_string()),
            ("SERVER_PROTOCOL", "HTTP/1.1".to_string()),
            ("SERVER_SOFTWARE", SERVER_SOFTWARE.to_string()),
            // php-cgi refuses to run without it
            ("REDIRECT_STATUS", "200".to_string()),
        ];
        if self.method.eq_ignore_ascii_case("POST") {
            env.push(("CONTENT_TYPE", self.content_type.unwrap_or_default().to_string()));
            env.push(("CONTENT_LENGTH", self.body.len().to_string()));
        }
        env
    }
}

/// Spawns the configured interpreter for live parts.
#[derive(Debug, Clone)]
pub struct CgiBridge {
    interpreter: String,
    timeout: Duration,
}

impl CgiBridge {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn from_config(live: &LiveConfig) -> Self {
        Self::new(live.interpreter.clone(), live.timeout())
    }

    /// Run the script and return its raw stdout.
    pub fn invoke(&self, request: &CgiRequest<'_>) -> Result<Vec<u8>, CgiError> {
        debug!("cgi"; "{} {} via {}", request.method, request.script_name, self.interpreter);

        let mut cmd = Cmd::new(&self.interpreter)
            .arg(request.script)
            .clear_env()
            .envs(request.environment())
            .timeout(self.timeout);
        if let Some(dir) = request.script.parent() {
            cmd = cmd.cwd(dir);
        }
        if request.method.eq_ignore_ascii_case("POST") {
            cmd = cmd.stdin(request.body);
        }

        let output = cmd.run()?;
        if !output.stderr.is_empty() {
            log!("cgi"; "{}: {}", request.script_name, String::from_utf8_lossy(&output.stderr).trim_end());
        }
        if !output.status.success() && output.stdout.is_empty() {
            return Err(CgiError::Failed {
                interpreter: self.interpreter.clone(),
                code: output.status.code(),
            });
        }
        Ok(output.stdout)
    }

    /// Run the script and parse its output into a response.
    pub fn respond(&self, request: &CgiRequest<'_>) -> Result<CgiResponse, CgiError> {
        self.invoke(request).map(|raw| output::parse(&raw))
    }
}
