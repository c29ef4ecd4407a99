//! TCP connection with an identifier and an I/O deadline.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::task::{Context as TaskContext, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, Instant, Sleep};

use crate::dialer::Connection;

static NEXT_CONN_ID: AtomicI64 = AtomicI64::new(1);

/// Allocates a process-unique connection identifier.
pub fn next_conn_id() -> i64 {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// A `TcpStream` tagged with its connection id.
///
/// Reads and writes fail with `TimedOut` once the deadline set through
/// [`Connection::set_deadline`] passes.
#[derive(Debug)]
pub struct MeasuringConn {
    stream: TcpStream,
    id: i64,
    deadline: Option<Instant>,
    timer: Option<Pin<Box<Sleep>>>,
}

impl MeasuringConn {
    /// Tags `stream` with `id`.
    pub fn new(stream: TcpStream, id: i64) -> Self {
        Self {
            stream,
            id,
            deadline: None,
            timer: None,
        }
    }

    /// Whether the deadline has fired; registers the waker otherwise.
    fn poll_expired(&mut self, cx: &mut TaskContext<'_>) -> bool {
        match self.timer.as_mut() {
            Some(timer) => timer.as_mut().poll(cx).is_ready(),
            None => false,
        }
    }
}

fn deadline_exceeded() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "i/o timeout")
}

impl AsyncRead for MeasuringConn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.poll_expired(cx) {
            return Poll::Ready(Err(deadline_exceeded()));
        }
        Pin::new(&mut this.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for MeasuringConn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if this.poll_expired(cx) {
            return Poll::Ready(Err(deadline_exceeded()));
        }
        Pin::new(&mut this.stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.poll_expired(cx) {
            return Poll::Ready(Err(deadline_exceeded()));
        }
        Pin::new(&mut this.stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

impl Connection for MeasuringConn {
    fn conn_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
        self.timer = deadline.map(|at| Box::pin(sleep_until(at)));
    }

    fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.stream.peer_addr()
    }
}
