//! Response body decoding on top of a pooled connection.
//!
//! The reader owns the connection and the per-host permit. When the body
//! ends cleanly on a keep-alive connection, the connection goes back to the
//! idle pool before the permit is released; in every other case both are
//! dropped, closing the connection.
//!
//! Every read also watches the request context, so cancelling it or passing
//! its deadline interrupts a read that is waiting on the network.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context as TaskContext, Poll};

use bytes::BytesMut;
use futures::future::BoxFuture;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::OwnedSemaphorePermit;

use crate::config::MAX_CHUNK_LINE_LENGTH;
use crate::context::{Context, ContextError};
use crate::dialer::BoxConn;
use crate::transport::base::codec::Framing;
use crate::transport::base::pool::ConnPool;

const READ_CHUNK: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Length(u64),
    ChunkSize,
    ChunkData(u64),
    ChunkEnd,
    Trailers,
    UntilClose,
    Done,
}

/// Returns the connection to the pool once the body is complete.
pub(crate) struct Release {
    pub(crate) pool: Arc<ConnPool>,
    pub(crate) key: String,
    pub(crate) keep_alive: bool,
    pub(crate) permit: OwnedSemaphorePermit,
}

pub(crate) struct BodyReader {
    conn: Option<BoxConn>,
    buf: BytesMut,
    state: State,
    release: Option<Release>,
    done: BoxFuture<'static, ContextError>,
}

impl BodyReader {
    pub(crate) fn new(
        conn: BoxConn,
        buf: BytesMut,
        framing: Framing,
        release: Release,
        ctx: Context,
    ) -> Self {
        let state = match framing {
            Framing::Empty => State::Done,
            Framing::Length(n) => State::Length(n),
            Framing::Chunked => State::ChunkSize,
            Framing::UntilClose => State::UntilClose,
        };
        let mut reader = Self {
            conn: Some(conn),
            buf,
            state,
            release: Some(release),
            done: Box::pin(ctx.done_owned()),
        };
        if reader.state == State::Done {
            reader.finish(true);
        }
        reader
    }

    /// Marks the body complete; `clean` means the connection is reusable.
    fn finish(&mut self, clean: bool) {
        self.state = State::Done;
        if let Some(release) = self.release.take() {
            let conn = self.conn.take();
            if let Some(conn) = conn {
                if clean && release.keep_alive && self.buf.is_empty() {
                    release.pool.put_idle(&release.key, conn);
                }
            }
            drop(release.permit);
        }
    }

    fn fail(&mut self, err: io::Error) -> Poll<io::Result<()>> {
        self.finish(false);
        Poll::Ready(Err(err))
    }

    /// Reads more bytes from the connection into `buf`; 0 means EOF.
    fn poll_fill(&mut self, cx: &mut TaskContext<'_>) -> Poll<io::Result<usize>> {
        let Some(conn) = self.conn.as_mut() else {
            return Poll::Ready(Ok(0));
        };
        let mut chunk = [0u8; READ_CHUNK];
        let mut read_buf = ReadBuf::new(&mut chunk);
        ready!(Pin::new(conn).poll_read(cx, &mut read_buf))?;
        let filled = read_buf.filled();
        self.buf.extend_from_slice(filled);
        Poll::Ready(Ok(filled.len()))
    }

    /// Copies up to `limit` buffered bytes into `out`.
    fn copy_out(&mut self, out: &mut ReadBuf<'_>, limit: u64) -> u64 {
        let n = (self.buf.len() as u64).min(limit).min(out.remaining() as u64) as usize;
        out.put_slice(&self.buf.split_to(n));
        n as u64
    }

    /// Takes one CRLF-terminated line out of `buf`, if complete.
    fn take_line(&mut self) -> io::Result<Option<BytesMut>> {
        match self.buf.windows(2).position(|w| w == b"\r\n") {
            Some(pos) => {
                let mut line = self.buf.split_to(pos + 2);
                line.truncate(pos);
                Ok(Some(line))
            }
            None if self.buf.len() > MAX_CHUNK_LINE_LENGTH => Err(invalid("chunk line too long")),
            None => Ok(None),
        }
    }

    /// Takes a line, reading more when needed. EOF mid-line is an error.
    fn poll_line(&mut self, cx: &mut TaskContext<'_>) -> Poll<io::Result<BytesMut>> {
        loop {
            if let Some(line) = self.take_line()? {
                return Poll::Ready(Ok(line));
            }
            if ready!(self.poll_fill(cx))? == 0 {
                return Poll::Ready(Err(unexpected_eof()));
            }
        }
    }
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

fn unexpected_eof() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected EOF in response body")
}

fn parse_chunk_size(line: &[u8]) -> io::Result<u64> {
    let line = std::str::from_utf8(line).map_err(|_| invalid("invalid chunk size line"))?;
    // Strip chunk extensions (;key=value).
    let size = line.split(';').next().unwrap_or("").trim();
    u64::from_str_radix(size, 16).map_err(|_| invalid("invalid chunk size"))
}

impl AsyncRead for BodyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        out: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.state != State::Done {
            let done = this.done.as_mut().poll(cx);
            if let Poll::Ready(err) = done {
                return this.fail(io::Error::other(err));
            }
        }
        loop {
            match this.state {
                State::Done => return Poll::Ready(Ok(())),
                State::Length(remaining) => {
                    if this.buf.is_empty() {
                        match ready!(this.poll_fill(cx)) {
                            Ok(0) => return this.fail(unexpected_eof()),
                            Ok(_) => {}
                            Err(e) => return this.fail(e),
                        }
                    }
                    let n = this.copy_out(out, remaining);
                    this.state = State::Length(remaining - n);
                    if remaining == n {
                        this.finish(true);
                    }
                    return Poll::Ready(Ok(()));
                }
                State::UntilClose => {
                    if !this.buf.is_empty() {
                        this.copy_out(out, u64::MAX);
                        return Poll::Ready(Ok(()));
                    }
                    match ready!(this.poll_fill(cx)) {
                        Ok(0) => {
                            this.finish(false);
                            return Poll::Ready(Ok(()));
                        }
                        Ok(_) => {}
                        Err(e) => return this.fail(e),
                    }
                }
                State::ChunkSize => {
                    let size = match ready!(this.poll_line(cx)).and_then(|l| parse_chunk_size(&l)) {
                        Ok(size) => size,
                        Err(e) => return this.fail(e),
                    };
                    this.state = if size == 0 {
                        State::Trailers
                    } else {
                        State::ChunkData(size)
                    };
                }
                State::ChunkData(remaining) => {
                    if this.buf.is_empty() {
                        match ready!(this.poll_fill(cx)) {
                            Ok(0) => return this.fail(unexpected_eof()),
                            Ok(_) => {}
                            Err(e) => return this.fail(e),
                        }
                    }
                    let n = this.copy_out(out, remaining);
                    this.state = if remaining == n {
                        State::ChunkEnd
                    } else {
                        State::ChunkData(remaining - n)
                    };
                    return Poll::Ready(Ok(()));
                }
                State::ChunkEnd => match ready!(this.poll_line(cx)) {
                    Ok(line) if line.is_empty() => this.state = State::ChunkSize,
                    Ok(_) => return this.fail(invalid("missing CRLF after chunk")),
                    Err(e) => return this.fail(e),
                },
                State::Trailers => match ready!(this.poll_line(cx)) {
                    Ok(line) if line.is_empty() => {
                        this.finish(true);
                        return Poll::Ready(Ok(()));
                    }
                    Ok(_) => {}
                    Err(e) => return this.fail(e),
                },
            }
        }
    }
}

impl Drop for BodyReader {
    fn drop(&mut self) {
        // An unfinished body leaves unread bytes on the wire.
        self.finish(false);
    }
}
