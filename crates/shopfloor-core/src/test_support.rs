//! Shared fixtures for unit tests: a scripted HTTP server, in-memory session
//! storage, a notice sink that records what it was told, and an in-memory
//! transaction store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::auth::{AuthError, AuthResult, AuthSession, SessionPersistence};
use crate::error::{Error, Result};
use crate::notice::{Notice, NoticeSink};
use crate::offline::{
    ConflictResolution, NewTransaction, OfflineTransaction, SyncReport, TransactionStore,
};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn method_and_path(&self) -> String {
        self.request_line
            .rsplit_once(' ')
            .map_or_else(|| self.request_line.clone(), |(head, _)| head.to_string())
    }
}

/// Serves scripted `(status, body)` responses in order, one per connection.
/// Once the script runs out the last response is repeated.
pub struct FakeServer {
    address: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeServer {
    pub async fn start(script: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test server");
        let address = listener.local_addr().expect("local address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(script));

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            let mut served = 0_usize;
            while let Ok((socket, _)) = listener.accept().await {
                let (status, body) = {
                    let script = script.lock().await;
                    let index = served.min(script.len().saturating_sub(1));
                    script
                        .get(index)
                        .cloned()
                        .unwrap_or((200, "null".to_string()))
                };
                served += 1;
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    handle_connection(socket, status, &body, recorded).await;
                });
            }
        });

        Self { address, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    status: u16,
    body: &str,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let Ok(read) = socket.read(&mut chunk).await else {
            return;
        };
        if read == 0 {
            return;
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(position) = find_header_end(&buffer) {
            break position;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect::<HashMap<_, _>>();
    let content_length = headers
        .get("content-length")
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buffer.len() < body_start + content_length {
        let Ok(read) = socket.read(&mut chunk).await else {
            return;
        };
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let request_body =
        String::from_utf8_lossy(&buffer[body_start.min(buffer.len())..]).to_string();

    recorded.lock().await.push(RecordedRequest {
        request_line,
        headers,
        body: request_body,
    });

    let response = format!(
        "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        reason_phrase(status),
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

const fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<StdMutex<Option<AuthSession>>>,
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        *guard = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    notices: StdMutex<Vec<Notice>>,
    session_ended: StdMutex<usize>,
}

impl RecordingSink {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices lock").clone()
    }

    pub fn session_ended_count(&self) -> usize {
        *self.session_ended.lock().expect("session lock")
    }
}

impl NoticeSink for RecordingSink {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notices lock").push(notice);
    }

    fn session_ended(&self) {
        *self.session_ended.lock().expect("session lock") += 1;
    }
}

/// How [`FakeStore::sync`] answers.
#[derive(Debug, Clone)]
pub enum FakeSync {
    /// Marks every non-conflicting pending row as synced.
    Succeed,
    /// Reports `success: false` with the message.
    Reject(String),
    /// Fails the request itself.
    Fail(String),
    /// Answers 401.
    Unauthorized,
}

/// In-memory `TransactionStore` that counts calls.
pub struct FakeStore {
    rows: StdMutex<Vec<OfflineTransaction>>,
    sync_behavior: StdMutex<FakeSync>,
    apply_resolutions: bool,
    fail_list: AtomicBool,
    pub list_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub clear_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new(rows: Vec<OfflineTransaction>) -> Self {
        Self {
            rows: StdMutex::new(rows),
            sync_behavior: StdMutex::new(FakeSync::Succeed),
            apply_resolutions: true,
            fail_list: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            resolve_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Accepts resolutions without changing any row.
    pub fn ignoring_resolutions(mut self) -> Self {
        self.apply_resolutions = false;
        self
    }

    pub fn set_sync(&self, behavior: FakeSync) {
        *self.sync_behavior.lock().expect("sync behavior lock") = behavior;
    }

    /// Make every following `list` fail with a 503.
    pub fn fail_listing(&self) {
        self.fail_list.store(true, Ordering::SeqCst);
    }

    pub fn rows(&self) -> Vec<OfflineTransaction> {
        self.rows.lock().expect("rows lock").clone()
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

pub fn row(id: &str, synced: bool, conflict: bool) -> OfflineTransaction {
    OfflineTransaction {
        id: id.to_string(),
        transaction_data: r#"{"message":"fixture"}"#.to_string(),
        transaction_type: "test".to_string(),
        device_id: "device-1".to_string(),
        created_at: chrono::Utc::now(),
        synced,
        synced_at: synced.then(chrono::Utc::now),
        conflict,
        conflict_resolution: None,
    }
}

impl TransactionStore for FakeStore {
    fn device_id(&self) -> &str {
        "device-1"
    }

    async fn list(&self) -> Result<Vec<OfflineTransaction>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                message: "queue unavailable".to_string(),
            });
        }
        Ok(self.rows())
    }

    async fn create(&self, transaction: NewTransaction) -> Result<()> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().expect("rows lock");
        let id = format!("tx-{}", rows.len() + 1);
        let mut created = row(&id, false, false);
        created.transaction_type = transaction.transaction_type;
        created.transaction_data = transaction.transaction_data;
        created.device_id = transaction.device_id;
        rows.push(created);
        Ok(())
    }

    async fn sync(&self) -> Result<SyncReport> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        let behavior = self.sync_behavior.lock().expect("sync behavior lock").clone();
        match behavior {
            FakeSync::Succeed => {
                let mut rows = self.rows.lock().expect("rows lock");
                let mut synced_count = 0;
                for row in rows.iter_mut().filter(|row| !row.synced && !row.conflict) {
                    row.synced = true;
                    row.synced_at = Some(chrono::Utc::now());
                    synced_count += 1;
                }
                let conflicts = rows.iter().filter(|row| row.conflict).count();
                Ok(SyncReport {
                    success: true,
                    synced_count,
                    conflicts,
                    error: None,
                })
            }
            FakeSync::Reject(message) => Ok(SyncReport {
                success: false,
                synced_count: 0,
                conflicts: 0,
                error: Some(message),
            }),
            FakeSync::Fail(message) => Err(Error::Api {
                status: 500,
                message,
            }),
            FakeSync::Unauthorized => Err(Error::Unauthorized),
        }
    }

    async fn resolve_conflict(&self, id: &str, resolution: ConflictResolution) -> Result<()> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.apply_resolutions {
            let mut rows = self.rows.lock().expect("rows lock");
            if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
                row.conflict = false;
                row.conflict_resolution = Some(resolution);
            }
        }
        Ok(())
    }

    async fn clear_synced(&self) -> Result<()> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().expect("rows lock").retain(|row| !row.synced);
        Ok(())
    }
}
