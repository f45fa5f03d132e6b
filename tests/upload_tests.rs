//! End-to-end runs through pipeline inputs with an in-memory FTP session.

use async_trait::async_trait;
use ftp_upload_lib::{completion_command, run_with, UploadErrorKind};
use ftpup_core::upload::{SessionConnector, UploadSession};
use ftpup_ftp::{FtpConnectionConfig, FtpResult};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Server {
    connects: Mutex<Vec<String>>,
    dirs: Mutex<Vec<String>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    closes: Mutex<usize>,
}

struct MemorySession(Arc<Server>);

#[async_trait]
impl UploadSession for MemorySession {
    async fn create_directory(&mut self, remote_dir: &str) -> FtpResult<()> {
        self.0.dirs.lock().unwrap().push(remote_dir.to_string());
        Ok(())
    }

    async fn put(&mut self, local: &Path, remote: &str) -> FtpResult<u64> {
        let data = fs::read(local)?;
        let len = data.len() as u64;
        self.0.files.lock().unwrap().insert(remote.to_string(), data);
        Ok(len)
    }

    async fn close(&mut self) -> FtpResult<()> {
        *self.0.closes.lock().unwrap() += 1;
        Ok(())
    }
}

struct MemoryConnector(Arc<Server>);

#[async_trait]
impl SessionConnector for MemoryConnector {
    type Session = MemorySession;

    async fn connect(&self, config: &FtpConnectionConfig) -> FtpResult<MemorySession> {
        self.0
            .connects
            .lock()
            .unwrap()
            .push(format!("{}@{}:{}", config.username, config.host, config.port));
        Ok(MemorySession(self.0.clone()))
    }
}

fn lookup(vars: Vec<(&str, String)>) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    move |key| map.get(key).cloned()
}

fn vars(base: &Path, root: &str, patterns: &str) -> Vec<(&'static str, String)> {
    vec![
        ("INPUT_SERVERENDPOINT", "ep".into()),
        ("ENDPOINT_URL_ep", "ftp://ftp.example.com".into()),
        (
            "ENDPOINT_AUTH_ep",
            r#"{"parameters":{"username":"deploy","password":"pw"}}"#.into(),
        ),
        ("INPUT_ROOTFOLDER", root.into()),
        ("INPUT_FILEPATTERNS", patterns.into()),
        ("INPUT_REMOTEPATH", "/site".into()),
        ("BUILD_SOURCESDIRECTORY", base.to_string_lossy().into_owned()),
    ]
}

fn fixture() -> tempfile::TempDir {
    let dir = tempfile::Builder::new().prefix("upload").tempdir().unwrap();
    fs::create_dir_all(dir.path().join("repo/dist/sub")).unwrap();
    fs::write(dir.path().join("repo/dist/a.txt"), b"alpha").unwrap();
    fs::write(dir.path().join("repo/dist/sub/b.txt"), b"bravo!").unwrap();
    fs::write(dir.path().join("repo/dist/sub/c.bin"), b"skip").unwrap();
    dir
}

#[tokio::test]
async fn uploads_matched_files_under_remote_path() {
    let dir = fixture();
    let server = Arc::new(Server::default());

    let outcome = run_with(
        lookup(vars(dir.path(), "repo/dist", "**/*.txt")),
        MemoryConnector(server.clone()),
    )
    .await;
    let report = outcome.as_ref().unwrap();

    assert_eq!(report.host, "ftp.example.com");
    assert_eq!(report.remote_path, "/site");
    assert_eq!(report.directories_created, 2);
    assert_eq!(report.files_uploaded, 2);
    assert_eq!(report.bytes_uploaded, 11);

    let mut dirs = server.dirs.lock().unwrap().clone();
    dirs.sort();
    assert_eq!(dirs, vec!["/site/dist", "/site/dist/sub"]);

    let files = server.files.lock().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files["/site/dist/a.txt"], b"alpha");
    assert_eq!(files["/site/dist/sub/b.txt"], b"bravo!");

    assert_eq!(*server.closes.lock().unwrap(), 1);
    assert_eq!(
        *server.connects.lock().unwrap(),
        vec!["deploy@ftp.example.com:21"]
    );
    assert!(completion_command(&outcome).contains("Succeeded"));
}

#[tokio::test]
async fn single_file_root_ignores_patterns() {
    let dir = fixture();
    let server = Arc::new(Server::default());

    let report = run_with(
        lookup(vars(dir.path(), "repo/dist/sub/c.bin", "*.nothing")),
        MemoryConnector(server.clone()),
    )
    .await
    .unwrap();

    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.directories_created, 1);
    assert_eq!(*server.dirs.lock().unwrap(), vec!["/site"]);
    assert!(server.files.lock().unwrap().contains_key("/site/c.bin"));
}

#[tokio::test]
async fn root_outside_relative_root_fails_before_connecting() {
    let dir = fixture();
    fs::create_dir_all(dir.path().join("elsewhere")).unwrap();
    let server = Arc::new(Server::default());

    let mut env = vars(dir.path(), "repo/dist", "**/*.txt");
    env.push(("INPUT_RELATIVEROOTFOLDER", "elsewhere".into()));
    let outcome = run_with(lookup(env), MemoryConnector(server.clone())).await;

    let err = outcome.as_ref().unwrap_err();
    assert_eq!(err.kind, UploadErrorKind::Configuration);
    assert!(err.message.contains("is not within the specified relative root folder"));
    assert!(server.connects.lock().unwrap().is_empty());
    assert!(completion_command(&outcome).contains("result=Failed"));
}

#[tokio::test]
async fn missing_root_folder_fails_before_connecting() {
    let dir = fixture();
    let server = Arc::new(Server::default());

    let err = run_with(
        lookup(vars(dir.path(), "repo/missing", "**/*")),
        MemoryConnector(server.clone()),
    )
    .await
    .unwrap_err();

    assert!(err.message.starts_with("The specified root folder:"));
    assert!(server.connects.lock().unwrap().is_empty());
}

#[tokio::test]
async fn nothing_matched_succeeds_empty() {
    let dir = fixture();
    let server = Arc::new(Server::default());

    let report = run_with(
        lookup(vars(dir.path(), "repo/dist", "*.nothing")),
        MemoryConnector(server.clone()),
    )
    .await
    .unwrap();

    assert_eq!(report.files_uploaded, 0);
    assert_eq!(report.directories_created, 0);
    assert_eq!(*server.closes.lock().unwrap(), 1);
}
