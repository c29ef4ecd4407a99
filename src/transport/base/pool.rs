//! Per-host connection limits and idle connections.
//!
//! Each host key gets a semaphore bounding concurrent connections and a list
//! of idle connections kept alive for reuse. A round trip holds a permit from
//! the moment it obtains a connection until its response body is finished.
//! Idle connections the peer has closed meanwhile are discarded on checkout.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context as TaskContext, Poll};

use futures::task::noop_waker_ref;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::Semaphore;

use crate::dialer::BoxConn;

struct HostSlot {
    permits: Arc<Semaphore>,
    idle: Vec<BoxConn>,
}

pub(crate) struct ConnPool {
    hosts: Mutex<HashMap<String, HostSlot>>,
    max_conns_per_host: usize,
}

impl ConnPool {
    pub(crate) fn new(max_conns_per_host: usize) -> Self {
        Self {
            hosts: Mutex::new(HashMap::new()),
            max_conns_per_host: max_conns_per_host.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, HostSlot>> {
        self.hosts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Semaphore bounding connections to `key`.
    pub(crate) fn permits(&self, key: &str) -> Arc<Semaphore> {
        let mut hosts = self.lock();
        let slot = hosts.entry(key.to_string()).or_insert_with(|| HostSlot {
            permits: Arc::new(Semaphore::new(self.max_conns_per_host)),
            idle: Vec::new(),
        });
        Arc::clone(&slot.permits)
    }

    /// Most recently returned idle connection to `key` that is still open.
    pub(crate) fn take_idle(&self, key: &str) -> Option<BoxConn> {
        let mut hosts = self.lock();
        let slot = hosts.get_mut(key)?;
        while let Some(mut conn) = slot.idle.pop() {
            if is_open(&mut conn) {
                return Some(conn);
            }
            log::debug!("discarding idle connection to {key} closed by the peer");
        }
        None
    }

    /// Keeps `conn` for reuse.
    pub(crate) fn put_idle(&self, key: &str, conn: BoxConn) {
        let mut hosts = self.lock();
        if let Some(slot) = hosts.get_mut(key) {
            if slot.idle.len() < self.max_conns_per_host {
                slot.idle.push(conn);
            }
        }
    }

    /// Drops every idle connection, closing it.
    pub(crate) fn close_idle(&self) -> usize {
        let mut hosts = self.lock();
        hosts
            .values_mut()
            .map(|slot| std::mem::take(&mut slot.idle).len())
            .sum()
    }

    pub(crate) fn idle_count(&self) -> usize {
        self.lock().values().map(|slot| slot.idle.len()).sum()
    }
}

/// Polls `conn` once without blocking. An idle connection that is still
/// usable has nothing to read: EOF, an error or unsolicited bytes all mean
/// it can no longer carry a request.
fn is_open(conn: &mut BoxConn) -> bool {
    let mut cx = TaskContext::from_waker(noop_waker_ref());
    let mut byte = [0u8; 1];
    let mut buf = ReadBuf::new(&mut byte);
    matches!(Pin::new(conn).poll_read(&mut cx, &mut buf), Poll::Pending)
}

impl std::fmt::Debug for ConnPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnPool")
            .field("max_conns_per_host", &self.max_conns_per_host)
            .field("idle", &self.idle_count())
            .finish()
    }
}
