use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};

type Idle = Arc<Mutex<Vec<tokio_rusqlite::Connection>>>;

/// Sizing and backpressure for the read pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Number of read sessions.
    pub size: usize,
    /// Acquisition attempts before giving up.
    pub acquire_attempts: u32,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            size: 3,
            acquire_attempts: 4,
            retry_delay: Duration::from_millis(400),
        }
    }
}

/// A small fixed set of read connections. Each analytics request checks out
/// exactly one `Session` and holds it until it finishes.
#[derive(Clone)]
pub struct SessionPool {
    idle: Idle,
    options: PoolOptions,
}

impl SessionPool {
    pub fn new(connections: Vec<tokio_rusqlite::Connection>, options: PoolOptions) -> Self {
        Self {
            idle: Arc::new(Mutex::new(connections)),
            options,
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Sessions currently available.
    pub fn idle_count(&self) -> usize {
        lock_idle(&self.idle).len()
    }

    /// Check out a session without waiting.
    pub fn try_acquire(&self) -> Option<Session> {
        let conn = lock_idle(&self.idle).pop()?;
        Some(Session {
            conn,
            idle: Arc::clone(&self.idle),
        })
    }

    /// Check out a session, retrying with a fixed delay while the pool is
    /// exhausted. Fails with `Error::Unavailable` once attempts run out.
    pub async fn acquire(&self) -> Result<Session> {
        let attempts = self.options.acquire_attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(session) = self.try_acquire() {
                return Ok(session);
            }
            log::warn!("Session acquire attempt {attempt}/{attempts} failed: pool exhausted");
            if attempt < attempts {
                tokio::time::sleep(self.options.retry_delay).await;
            }
        }
        log::error!("Session acquire failed after {attempts} attempts");
        Err(Error::Unavailable {
            attempts,
            message: "session pool exhausted".into(),
        })
    }
}

fn lock_idle(
    idle: &Mutex<Vec<tokio_rusqlite::Connection>>,
) -> MutexGuard<'_, Vec<tokio_rusqlite::Connection>> {
    // A panic while holding the lock cannot leave the Vec half-updated.
    idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A checked-out connection. Dropping it returns the connection to the pool,
/// so release happens on every exit path.
pub struct Session {
    conn: tokio_rusqlite::Connection,
    idle: Idle,
}

impl Session {
    pub fn conn(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Return the session to the pool now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        lock_idle(&self.idle).push(self.conn.clone());
    }
}
