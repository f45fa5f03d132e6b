//! Upload orchestration over a single FTP session.
//!
//! Every directory creation and every file upload runs as its own task in
//! a `JoinSet`. The control connection cannot interleave commands, so the
//! session sits behind a `tokio::sync::Mutex` and the tasks take turns.
//! An upload waits for the creation task of its remote directory before
//! it asks for the session.
//!
//! The run succeeds when every issued operation has completed and fails
//! on the first error; either way the session is closed exactly once.

use crate::upload::error::{UploadError, UploadResult};
use crate::upload::session::{SessionConnector, UploadSession};
use crate::upload::types::{FileEntry, UploadConfig, UploadReport};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

/// Upper bound on the QUIT exchange when tearing a session down.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Connecting,
    Active,
    Succeeded,
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Remote directories already requested in this run.
#[derive(Debug, Default)]
pub struct DirectoryCache {
    requested: HashSet<String>,
}

impl DirectoryCache {
    /// Record `dir`; `true` when it had not been requested before.
    pub fn request(&mut self, dir: &str) -> bool {
        self.requested.insert(dir.to_string())
    }

    pub fn len(&self) -> usize {
        self.requested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requested.is_empty()
    }
}

/// Successful completions so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunCounters {
    pub directories: usize,
    pub files: usize,
    pub bytes: u64,
}

impl RunCounters {
    pub fn total(&self) -> usize {
        self.directories + self.files
    }

    pub fn remaining(&self, expected: usize) -> usize {
        expected.saturating_sub(self.total())
    }
}

/// Outcome of a directory task, as seen by the uploads waiting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectoryGate {
    Pending,
    Ready,
    Failed,
}

/// What a finished task reports back.
#[derive(Debug)]
enum Completed {
    Directory(String),
    File { remote: String, bytes: u64 },
    /// Upload skipped because its directory failed; that failure is reported instead.
    StoodDown(String),
}

/// Drives one upload run.
pub struct UploadOrchestrator<C: SessionConnector> {
    connector: C,
    state: RunState,
}

impl<C: SessionConnector> UploadOrchestrator<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Connect, create directories, upload `entries` and report.
    pub async fn run(
        &mut self,
        config: &UploadConfig,
        entries: Vec<FileEntry>,
    ) -> UploadResult<UploadReport> {
        let host = config.connection.host.clone();
        self.state = RunState::Connecting;
        debug!(
            "secure ftp={}",
            config.connection.security.is_secure()
        );
        let session = match self.connector.connect(&config.connection).await {
            Ok(session) => session,
            Err(e) => {
                self.state = RunState::Failed;
                return Err(UploadError::connect_failed(&host, &e));
            }
        };
        let session = Arc::new(Mutex::new(session));
        self.state = RunState::Active;
        debug!("connected to ftp host: {}", host);
        debug!("files to process: {}", entries.len());

        let mut cache = DirectoryCache::default();
        let mut gates: HashMap<String, watch::Receiver<DirectoryGate>> = HashMap::new();
        let mut tasks = JoinSet::new();
        let mut expected = 0usize;

        for entry in entries {
            debug!("file: {}", entry.local_path.display());
            debug!("ftpRemotePath: {}", entry.remote_path);
            let dir = entry.remote_directory();

            if cache.request(&dir) {
                debug!("checking for remote path: {}", dir);
                let (tx, rx) = watch::channel(DirectoryGate::Pending);
                gates.insert(dir.clone(), rx);
                tasks.spawn(create_directory(session.clone(), dir.clone(), tx));
                expected += 1;
            }

            if !entry.is_directory {
                debug!("uploading file: {}", entry.remote_path);
                let gate = gates.get(&dir).cloned();
                tasks.spawn(upload_file(session.clone(), entry, gate));
                expected += 1;
            }
        }

        let mut counters = RunCounters::default();
        let report = |counters: &RunCounters| UploadReport {
            host: host.clone(),
            remote_path: config.remote_path.clone(),
            directories_created: counters.directories,
            files_uploaded: counters.files,
            bytes_uploaded: counters.bytes,
        };

        if expected == 0 {
            info!("No files matched; nothing to upload");
            return self.finish(&session, Ok(report(&counters))).await;
        }

        while let Some(joined) = tasks.join_next().await {
            let completed = match joined {
                Ok(Ok(completed)) => completed,
                Ok(Err(err)) => {
                    tasks.shutdown().await;
                    return self.finish(&session, Err(err)).await;
                }
                Err(join_err) => {
                    tasks.shutdown().await;
                    let err = UploadError::transport(format!(
                        "Upload task ended unexpectedly: {}",
                        join_err
                    ));
                    return self.finish(&session, Err(err)).await;
                }
            };

            match completed {
                Completed::Directory(dir) => {
                    debug!("remote directory successfully created: {}", dir);
                    counters.directories += 1;
                }
                Completed::File { remote, bytes } => {
                    debug!("file successfully uploaded: {}", remote);
                    counters.files += 1;
                    counters.bytes += bytes;
                }
                Completed::StoodDown(remote) => {
                    debug!("skipped {}: remote directory was not created", remote);
                    continue;
                }
            }

            let remaining = counters.remaining(expected);
            debug!(
                "dirCount: {}, fileCount: {}, total: {}, remaining: {}",
                counters.directories,
                counters.files,
                counters.total(),
                remaining
            );
            if remaining == 0 {
                return self.finish(&session, Ok(report(&counters))).await;
            }
        }

        // A stood-down upload implies a failed directory task, which is
        // joined and reported above; reaching here means tasks vanished.
        let err = UploadError::transport(format!(
            "Upload ended with {} of {} operations completed",
            counters.total(),
            expected
        ));
        self.finish(&session, Err(err)).await
    }

    /// Enter the terminal state and close the session, once.
    async fn finish<S: UploadSession>(
        &mut self,
        session: &Mutex<S>,
        outcome: UploadResult<UploadReport>,
    ) -> UploadResult<UploadReport> {
        if self.state.is_terminal() {
            return outcome;
        }
        self.state = if outcome.is_ok() {
            RunState::Succeeded
        } else {
            RunState::Failed
        };

        let mut session = session.lock().await;
        match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Error while closing FTP session: {}", e),
            Err(_) => warn!("Timed out closing FTP session"),
        }
        outcome
    }
}

async fn create_directory<S: UploadSession>(
    session: Arc<Mutex<S>>,
    dir: String,
    gate: watch::Sender<DirectoryGate>,
) -> UploadResult<Completed> {
    let result = session.lock().await.create_directory(&dir).await;
    match result {
        Ok(()) => {
            let _ = gate.send(DirectoryGate::Ready);
            Ok(Completed::Directory(dir))
        }
        Err(e) => {
            let _ = gate.send(DirectoryGate::Failed);
            Err(UploadError::directory_failed(&dir, &e))
        }
    }
}

async fn upload_file<S: UploadSession>(
    session: Arc<Mutex<S>>,
    entry: FileEntry,
    gate: Option<watch::Receiver<DirectoryGate>>,
) -> UploadResult<Completed> {
    if let Some(mut gate) = gate {
        let state = gate
            .wait_for(|g| *g != DirectoryGate::Pending)
            .await
            .map(|g| *g)
            .unwrap_or(DirectoryGate::Failed);
        if state != DirectoryGate::Ready {
            return Ok(Completed::StoodDown(entry.remote_path));
        }
    }

    let result = session
        .lock()
        .await
        .put(&entry.local_path, &entry.remote_path)
        .await;
    match result {
        Ok(bytes) => Ok(Completed::File {
            remote: entry.remote_path,
            bytes,
        }),
        Err(e) => Err(UploadError::upload_failed(
            &entry.local_path.to_string_lossy(),
            &e,
        )),
    }
}
