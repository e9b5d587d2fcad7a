//! Best-effort mirroring of data changes into git.
//!
//! After a mutation has been written, the change is queued for a background worker that stages,
//! commits and pushes it. Nothing here can fail a request: every outcome ends in the log.

use crate::common::Error;
use crate::config::SyncConfig;
use log::{debug, info, trace, warn};
use postage::mpsc::{channel, Receiver, Sender};
use postage::prelude::{Sink, Stream};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use townhall_base::Kind;

/// Receives every applied mutation. Must return immediately.
pub trait Notifier: Send + Sync {
    fn notify(&self, change: Change);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Add,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub kind: Kind,
    pub action: Action,
    /// Record title, or its id when it has none.
    pub label: String,
}

impl Change {
    pub fn commit_message(&self) -> String {
        let verb = match self.action {
            Action::Add => "Add",
            Action::Delete => "Delete",
        };
        format!("{verb} {}: {}", self.kind.singular(), self.label)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SkipReason {
    NotARepository,
    NoRemote,
    NothingStaged,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    /// The commit exists locally whether or not the push went through.
    Committed { pushed: bool },
}

impl Display for SyncOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOutcome::Skipped(SkipReason::NotARepository) => {
                f.write_str("skipped, not a git repository")
            }
            SyncOutcome::Skipped(SkipReason::NoRemote) => {
                f.write_str("skipped, no remote configured")
            }
            SyncOutcome::Skipped(SkipReason::NothingStaged) => {
                f.write_str("skipped, nothing to commit")
            }
            SyncOutcome::Committed { pushed: true } => f.write_str("committed and pushed"),
            SyncOutcome::Committed { pushed: false } => f.write_str("committed, push failed"),
        }
    }
}

/// Used when syncing is turned off.
pub struct Disabled;

impl Notifier for Disabled {
    fn notify(&self, change: Change) {
        trace!("sync disabled: {}", change.commit_message());
    }
}

/// Queue in front of a [`GitRepo`] worker task.
pub struct SyncNotifier {
    tx: Sender<Change>,
}

impl SyncNotifier {
    /// Spawns the worker on the current runtime.
    pub fn spawn(config: &SyncConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = channel(config.queue.max(1));
        let repo = GitRepo::new(config);
        let join = tokio::spawn(async move { worker(repo, rx).await });
        (SyncNotifier { tx }, join)
    }
}

impl Notifier for SyncNotifier {
    fn notify(&self, change: Change) {
        let mut tx = self.tx.clone();
        if tx.try_send(change).is_err() {
            warn!("sync queue full or closed, change dropped");
        }
    }
}

async fn worker(repo: GitRepo, mut rx: Receiver<Change>) {
    info!("Sync worker started for {}", repo.dir.display());
    while let Some(change) = rx.recv().await {
        let message = change.commit_message();
        match repo.sync(&message).await {
            Ok(outcome @ SyncOutcome::Committed { pushed: true }) => {
                info!("{message:?}: {outcome}")
            }
            Ok(outcome @ SyncOutcome::Committed { pushed: false }) => {
                warn!("{message:?}: {outcome}")
            }
            Ok(outcome) => debug!("{message:?}: {outcome}"),
            Err(e) => warn!("{message:?}: sync failed: {e}"),
        }
    }
    info!("Sync worker: queue closed, exiting");
}

/// Working tree the data files live in.
pub struct GitRepo {
    dir: PathBuf,
    push_attempts: u32,
    backoff: Duration,
    push_timeout: Duration,
}

impl GitRepo {
    pub fn new(config: &SyncConfig) -> Self {
        GitRepo {
            dir: config.repo_dir.clone(),
            push_attempts: config.push_attempts.max(1),
            backoff: config.backoff(),
            push_timeout: config.push_timeout(),
        }
    }

    /// Stage everything but `*.tmp`, commit with `message` and push. Each precondition that does
    /// not hold ends the cycle early with a [`SkipReason`].
    pub async fn sync(&self, message: &str) -> Result<SyncOutcome, Error> {
        let inside = self.git(&["rev-parse", "--is-inside-work-tree"]).await?;
        if !inside.status.success() || String::from_utf8_lossy(&inside.stdout).trim() != "true" {
            return Ok(SyncOutcome::Skipped(SkipReason::NotARepository));
        }

        let remotes = self.git(&["remote"]).await?;
        let remotes = String::from_utf8_lossy(&remotes.stdout);
        let Some(remote) = remotes.lines().map(str::trim).find(|r| !r.is_empty()) else {
            return Ok(SyncOutcome::Skipped(SkipReason::NoRemote));
        };

        // Half-written temp files from a concurrent save stay out of the commit.
        self.git_checked(&["add", "-A", "--", ":/", ":(top,exclude)*.tmp"]).await?;

        let staged = self.git(&["diff", "--cached", "--quiet"]).await?;
        if staged.status.success() {
            return Ok(SyncOutcome::Skipped(SkipReason::NothingStaged));
        }

        self.git_checked(&["commit", "-m", message]).await?;

        let pushed = self.push(remote).await;
        Ok(SyncOutcome::Committed { pushed })
    }

    async fn push(&self, remote: &str) -> bool {
        let mut delay = self.backoff;
        for attempt in 1..=self.push_attempts {
            let args = ["push", remote, "HEAD"];
            let attempted = self.git(&args);
            match tokio::time::timeout(self.push_timeout, attempted).await {
                Ok(Ok(output)) if output.status.success() => return true,
                Ok(Ok(output)) => {
                    warn!(
                        "push to {remote} failed (attempt {attempt}/{}): {}",
                        self.push_attempts,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                }
                Ok(Err(e)) => warn!("push to {remote}: {e}"),
                Err(_) => warn!(
                    "push to {remote} timed out after {:?} (attempt {attempt}/{})",
                    self.push_timeout, self.push_attempts
                ),
            }
            if attempt < self.push_attempts {
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
        false
    }

    async fn git(&self, args: &[&str]) -> Result<Output, Error> {
        trace!("git {}", args.join(" "));
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.dir)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(output)
    }

    async fn git_checked(&self, args: &[&str]) -> Result<Output, Error> {
        let output = self.git(args).await?;
        if !output.status.success() {
            return Err(Error::Internal(format!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output)
    }
}
