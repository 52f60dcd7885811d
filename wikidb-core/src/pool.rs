//! Bounded asynchronous connection pool over SQLite.
//!
//! Acquisition is FIFO behind a fair semaphore: callers past the bound queue
//! rather than failing, up to a configurable timeout. Connections are opened
//! lazily, up to the bound, and kept on a free list between leases.
//!
//! Release discipline: a lease ([`PooledConn`]) is consumed by [`run`],
//! which executes the query closure on the blocking thread pool. The
//! blocking task itself returns the connection and permit to the pool when
//! the closure finishes, so release fires exactly once even if the awaiting
//! caller is cancelled mid-query. A lease dropped without running releases
//! through `Drop`. Double release and use-after-release are unrepresentable:
//! `run` takes the lease by value.
//!
//! [`run`]: PooledConn::run

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tokio::sync::oneshot;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task;
use tokio::time::timeout;

use crate::error::{ServiceError, ServiceResult};

/// Default maximum concurrent leases, matching the wiki's historical JDBC
/// pool bound.
pub const DEFAULT_MAX_SIZE: usize = 30;

/// Default time an acquire waits behind the bound before reporting
/// exhaustion.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool construction options.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    path: PathBuf,
    max_size: usize,
    acquire_timeout: Duration,
}

impl PoolOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size: DEFAULT_MAX_SIZE,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Maximum concurrent connection leases.
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// How long an acquire may queue before `ConnectionUnavailable`.
    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Open the pool, verifying the store is reachable by opening one
    /// connection up front.
    pub async fn open(self) -> ServiceResult<ConnPool> {
        ConnPool::open(self).await
    }
}

#[derive(Debug)]
struct PoolInner {
    path: PathBuf,
    semaphore: Arc<Semaphore>,
    idle: Mutex<Vec<Connection>>,
    max_size: usize,
    acquire_timeout: Duration,
}

impl PoolInner {
    fn release(&self, conn: Connection) {
        self.idle.lock().unwrap().push(conn);
    }
}

/// Shared handle to the pool. Cheap to clone; constructed once at startup
/// and passed into every service instance that shares it.
#[derive(Clone, Debug)]
pub struct ConnPool {
    inner: Arc<PoolInner>,
}

impl ConnPool {
    async fn open(opts: PoolOptions) -> ServiceResult<Self> {
        let path = opts.path.clone();
        let first = task::spawn_blocking(move || open_connection(&path))
            .await
            .map_err(|e| ServiceError::ConnectionUnavailable(e.to_string()))?
            .map_err(|e| ServiceError::ConnectionUnavailable(e.to_string()))?;

        tracing::info!(path = %opts.path.display(), max_size = opts.max_size, "connection pool open");

        Ok(Self {
            inner: Arc::new(PoolInner {
                path: opts.path,
                semaphore: Arc::new(Semaphore::new(opts.max_size)),
                idle: Mutex::new(vec![first]),
                max_size: opts.max_size,
                acquire_timeout: opts.acquire_timeout,
            }),
        })
    }

    /// Lease a connection, queueing FIFO behind the bound.
    ///
    /// Suspends the caller until a lease is free; after the configured
    /// timeout the pool reports `ConnectionUnavailable` instead.
    pub async fn acquire(&self) -> ServiceResult<PooledConn> {
        let semaphore = Arc::clone(&self.inner.semaphore);
        let permit = match timeout(self.inner.acquire_timeout, semaphore.acquire_owned()).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(ServiceError::ConnectionUnavailable(
                    "connection pool is closed".into(),
                ))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.inner.acquire_timeout.as_millis() as u64,
                    "pool exhausted, acquire timed out"
                );
                return Err(ServiceError::ConnectionUnavailable(format!(
                    "no database connection available within {:?}",
                    self.inner.acquire_timeout
                )));
            }
        };

        let idle = self.inner.idle.lock().unwrap().pop();
        let conn = match idle {
            Some(conn) => conn,
            None => {
                let path = self.inner.path.clone();
                task::spawn_blocking(move || open_connection(&path))
                    .await
                    .map_err(|e| ServiceError::ConnectionUnavailable(e.to_string()))?
                    .map_err(|e| ServiceError::ConnectionUnavailable(e.to_string()))?
            }
        };

        Ok(PooledConn {
            conn: Some(conn),
            permit: Some(permit),
            inner: Arc::clone(&self.inner),
        })
    }

    /// Configured bound.
    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// Leases currently free. Equals `max_size` when nothing is in flight.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }
}

fn open_connection(path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(e.to_string()),
                )
            })?;
        }
    }
    let conn = Connection::open(path)?;
    // Writers on separate handles queue instead of returning SQLITE_BUSY.
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/// One leased connection. Exclusively owned until released; released exactly
/// once, either by [`PooledConn::run`] or by `Drop`.
#[derive(Debug)]
pub struct PooledConn {
    conn: Option<Connection>,
    permit: Option<OwnedSemaphorePermit>,
    inner: Arc<PoolInner>,
}

impl PooledConn {
    /// Run one query closure on the blocking thread pool, then return the
    /// connection to the free list.
    ///
    /// The blocking task owns the connection for the duration of the
    /// closure and performs the release itself, so an abandoned caller
    /// (this future dropped mid-await) cannot strand the lease: the task
    /// runs to completion and the pool gets its connection back.
    pub async fn run<T, F>(mut self, f: F) -> ServiceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> ServiceResult<T> + Send + 'static,
    {
        // Invariant: `conn` and `permit` are Some until this method or Drop
        // takes them, and `run` consumes self.
        let mut conn = self.conn.take().expect("lease already released");
        let permit = self.permit.take();
        let inner = Arc::clone(&self.inner);

        let (tx, rx) = oneshot::channel();
        task::spawn_blocking(move || {
            let out = f(&mut conn);
            // Connection back on the free list before the permit frees a
            // queued waiter.
            inner.release(conn);
            drop(permit);
            let _ = tx.send(out);
        });

        match rx.await {
            Ok(result) => result,
            // The runtime refused or lost the blocking task; the closure
            // panicking also lands here. Either way the permit was freed
            // with the task, so the pool stays whole.
            Err(_) => Err(ServiceError::QueryFailed(
                "query worker terminated before replying".into(),
            )),
        }
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.inner.release(conn);
        }
        // Permit drops after the connection is back on the free list.
    }
}
