//! Content acquisition and deployment.
//!
//! # Module Structure
//!
//! ```text
//! content/
//! ├── archive.rs   # ArchiveKind: detect + extract zip / tar.bz2 / tar.gz
//! ├── fetch.rs     # Source, Fetcher: source -> <tmp>/content
//! ├── deploy.rs    # replace_tree (tutorial), merge_tree (workspace)
//! ├── bundle.rs    # zip of every part for /download
//! └── mod.rs       # Deployer (this file)
//! ```
//!
//! A run is: clear `<tmp>` → fetch → deploy each part → clear `<tmp>` →
//! publish `Ready`. The fetch happens before any part is touched, so a
//! failed refresh leaves the previously deployed content intact.

mod archive;
pub mod bundle;
mod deploy;
mod fetch;

pub use deploy::TreeStats;
pub use fetch::{FetchError, Source};

#[cfg(test)]
pub use archive::fixtures;

use anyhow::Context;
use parking_lot::Mutex;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;

use crate::{
    config::{PartKind, ServerConfig},
    core::{DeployStatus, GateView, ReadinessGate},
    debug, log,
    utils::path::remove_dir_if_exists,
};
use deploy::{merge_tree, replace_tree};
use fetch::Fetcher;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("failed to fetch content")]
    Fetch(#[from] FetchError),

    #[error("I/O error at `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Summary of one deployment run.
#[derive(Debug, Default)]
pub struct DeployReport {
    /// `(part name, stats)` of every deployed part.
    pub deployed: Vec<(String, TreeStats)>,
    /// Parts whose source subpath was missing from the content.
    pub skipped: Vec<String>,
    pub elapsed: Duration,
}

impl DeployReport {
    /// One-line outcome, e.g. `deployed 2 part(s) in 1.20s, skipped: workspace`.
    pub fn summary(&self) -> String {
        let mut line = format!("deployed {} part(s) in {:.2?}", self.deployed.len(), self.elapsed);
        if !self.skipped.is_empty() {
            line.push_str(", skipped: ");
            line.push_str(&self.skipped.join(", "));
        }
        line
    }
}

/// Runs deployments and owns the readiness gate.
pub struct Deployer {
    config: Arc<ServerConfig>,
    gate: ReadinessGate,
    run_lock: Mutex<()>,
    fetcher: Fetcher,
}

impl Deployer {
    pub fn new(config: Arc<ServerConfig>) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.app.fetch_timeout);
        let fetcher =
            Fetcher::new(config.app.tmp.clone(), timeout).context("Failed to build HTTP client")?;
        Ok(Self {
            config,
            gate: ReadinessGate::new(),
            run_lock: Mutex::new(()),
            fetcher,
        })
    }

    /// Read-only handle for request handlers.
    pub fn view(&self) -> GateView {
        self.gate.view()
    }

    /// Run the initial deployment on a background thread.
    pub fn spawn_initial(self: &Arc<Self>) -> thread::JoinHandle<()> {
        let deployer = Arc::clone(self);
        thread::spawn(move || {
            // Failures are logged and recorded in the gate
            let _ = deployer.deploy();
        })
    }

    /// Fetch and deploy all parts. Concurrent calls run one after another.
    pub fn deploy(&self) -> Result<DeployReport, DeployError> {
        let _guard = self.run_lock.lock();
        let started = Instant::now();

        self.gate.begin();
        log!("deploy"; "fetching {}", self.config.source());

        let result = self.run();
        let cleanup = remove_dir_if_exists(&self.config.app.tmp);

        match result {
            Ok(mut report) => {
                if let Err(e) = cleanup {
                    log!("warning"; "could not remove {}: {}", self.config.app.tmp.display(), e);
                }
                report.elapsed = started.elapsed();
                self.gate.publish(DeployStatus::Ready);
                log!("deploy"; "{}", report.summary());
                Ok(report)
            }
            Err(e) => {
                let reason = error_chain(&e);
                log!("error"; "deployment failed: {}", reason);
                self.gate.fail(reason);
                Err(e)
            }
        }
    }

    fn run(&self) -> Result<DeployReport, DeployError> {
        let tmp = &self.config.app.tmp;
        remove_dir_if_exists(tmp).map_err(|source| DeployError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::create_dir_all(tmp).map_err(|source| DeployError::Io {
            path: tmp.clone(),
            source,
        })?;

        let content = self.fetcher.fetch(&self.config.source())?;
        let mut report = DeployReport::default();

        for part in self.config.parts() {
            let deploy_fn: fn(&Path, &Path) -> io::Result<TreeStats> = match part.kind() {
                PartKind::Tutorial => replace_tree,
                PartKind::Workspace => merge_tree,
                PartKind::Live => {
                    debug!("deploy"; "part {} is served live, nothing to deploy", part.name);
                    continue;
                }
            };

            let source = content.join(part.source());
            if !source.is_dir() {
                log!("error"; "source files for part {} not found at {}", part.name, part.source().display());
                report.skipped.push(part.name.to_string());
                continue;
            }

            let target = self.config.target_dir(&part);
            let stats = deploy_fn(&source, &target).map_err(|source| DeployError::Io {
                path: target.clone(),
                source,
            })?;
            debug!(
                "deploy";
                "{} part {}: {} copied, {} kept",
                part.kind(),
                part.name,
                stats.copied,
                stats.kept
            );
            report.deployed.push((part.name.to_string(), stats));
        }

        Ok(report)
    }
}

/// `error: cause: cause` on one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
