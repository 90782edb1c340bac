// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `TlsConn` drives a raw, non-blocking byte channel through a TLS
//! connection and exposes the decrypted result as the same
//! `ByteSource`/`ByteSink` contract as the plaintext channel it wraps. It
//! is the moral equivalent of `tokio_rustls`'s `TlsStream`, except the
//! inner channel is `ByteSource + ByteSink` rather than `AsyncRead +
//! AsyncWrite`, so the record/handshake state machine is driven directly
//! against rustls's synchronous wrap/unwrap API instead of going through
//! an adapter crate.

use std::io::{self, Cursor, Read, Write};
use std::time::Duration;

use rustls::{ClientConnection, ServerConnection};

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::io::sink::ByteSink;
use crate::io::source::ByteSource;

/// One TLS record plus the extra room rustls needs when it splits a
/// record 1/n-1 (one byte, then the rest) as a BEAST countermeasure for
/// older protocol versions.
const RECORD_BUFFER_CAPACITY: usize = 16384 + 576;

/// Upper bound on how long `close` waits for the close_notify flush and
/// the origin's own close to finish draining.
const CLOSE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

enum Conn {
    Server(ServerConnection),
    Client(ClientConnection),
}

macro_rules! forward {
    ($self:ident . $method:ident ( $($arg:expr),* )) => {
        match $self {
            Conn::Server(c) => c.$method($($arg),*),
            Conn::Client(c) => c.$method($($arg),*),
        }
    };
}

impl Conn {
    fn read_tls(&mut self, rd: &mut dyn Read) -> io::Result<usize> {
        forward!(self.read_tls(rd))
    }

    fn write_tls(&mut self, wr: &mut dyn Write) -> io::Result<usize> {
        forward!(self.write_tls(wr))
    }

    fn process_new_packets(&mut self) -> std::result::Result<rustls::IoState, rustls::Error> {
        forward!(self.process_new_packets())
    }

    fn wants_read(&self) -> bool {
        forward!(self.wants_read())
    }

    fn wants_write(&self) -> bool {
        forward!(self.wants_write())
    }

    fn is_handshaking(&self) -> bool {
        forward!(self.is_handshaking())
    }

    fn reader(&mut self) -> rustls::Reader<'_> {
        forward!(self.reader())
    }

    fn writer(&mut self) -> rustls::Writer<'_> {
        forward!(self.writer())
    }

    fn send_close_notify(&mut self) {
        forward!(self.send_close_notify())
    }
}

/// Detects whether `first` looks like the start of a TLS handshake record
/// (content type `0x16`) as opposed to plaintext. Used by servers that
/// accept both TLS and plain connections on the same port.
pub fn looks_like_tls(first: &[u8]) -> bool {
    first.first() == Some(&0x16)
}

/// A TLS connection layered over a raw, non-blocking origin channel.
///
/// `O` must be both readable and writable: `TlsConn` is the single owner
/// of the origin channel and multiplexes both directions of the TLS
/// record stream through it.
pub struct TlsConn<O> {
    origin: O,
    conn: Conn,
    plaintext: Vec<u8>,
    origin_closed: bool,
    close_notify_sent: bool,
}

impl<O: ByteSource + ByteSink> TlsConn<O> {
    pub fn new_server(origin: O, conn: ServerConnection) -> Self {
        Self {
            origin,
            conn: Conn::Server(conn),
            plaintext: Vec::new(),
            origin_closed: false,
            close_notify_sent: false,
        }
    }

    pub fn new_client(origin: O, conn: ClientConnection) -> Self {
        Self {
            origin,
            conn: Conn::Client(conn),
            plaintext: Vec::new(),
            origin_closed: false,
            close_notify_sent: false,
        }
    }

    /// Drives the handshake to completion, cycling `{to_wrap, to_read,
    /// to_unwrap}` until rustls reports neither direction pending. Reading
    /// application data before this completes is safe (rustls buffers
    /// early data internally) but callers generally call this first so
    /// handshake failures surface immediately rather than on the first
    /// real read.
    pub async fn handshake(&mut self) -> Result<()> {
        while self.conn.is_handshaking() {
            self.pump(true).await?;
        }
        Ok(())
    }

    /// One step of the TLS duplex: flush anything rustls wants to write,
    /// then, if `want_read` and rustls wants more ciphertext, pull one
    /// chunk from the origin and feed it in.
    async fn pump(&mut self, want_read: bool) -> Result<()> {
        self.flush_outgoing().await?;

        if want_read && self.conn.wants_read() && !self.origin_closed {
            match self.origin.read().await {
                Ok(buf) => {
                    let bytes = buf.to_bytes();
                    let mut cursor = Cursor::new(bytes.as_ref());
                    loop {
                        match self.conn.read_tls(&mut cursor) {
                            Ok(0) => break,
                            Ok(_) => continue,
                            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                            Err(e) => return Err(Error::new(ErrorKind::Tls, "reading TLS record").set_source(e)),
                        }
                    }
                    self.conn
                        .process_new_packets()
                        .map_err(|e| Error::new(ErrorKind::Tls, "processing TLS packets").set_source(e))?;
                }
                Err(e) if e.is_end() => {
                    self.origin_closed = true;
                }
                Err(e) => return Err(e),
            }
        }

        self.flush_outgoing().await
    }

    /// Writes every ciphertext byte rustls has queued (handshake flight or
    /// application data already fed to `writer()`) to the origin.
    async fn flush_outgoing(&mut self) -> Result<()> {
        while self.conn.wants_write() {
            let mut out = Vec::with_capacity(RECORD_BUFFER_CAPACITY);
            self.conn
                .write_tls(&mut out)
                .map_err(|e| Error::new(ErrorKind::Tls, "writing TLS record").set_source(e))?;
            if out.is_empty() {
                break;
            }
            self.origin.write(Buffer::from(out)).await?;
        }
        Ok(())
    }
}

impl<O: ByteSource + ByteSink> ByteSource for TlsConn<O> {
    async fn read(&mut self) -> Result<Buffer> {
        if !self.plaintext.is_empty() {
            return Ok(Buffer::from(std::mem::take(&mut self.plaintext)));
        }

        loop {
            let mut chunk = vec![0u8; RECORD_BUFFER_CAPACITY];
            match self.conn.reader().read(&mut chunk) {
                // rustls only returns Ok(0) at true connection EOF (a
                // received close_notify); absence of buffered plaintext is
                // reported as WouldBlock, not Ok(0).
                Ok(0) => return Err(Error::end()),
                Ok(n) => {
                    chunk.truncate(n);
                    return Ok(Buffer::from(chunk));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(Error::new(ErrorKind::Tls, "reading decrypted TLS data").set_source(e)),
            }

            if self.origin_closed {
                return Err(Error::end());
            }
            self.pump(true).await?;
        }
    }

    /// Idempotent. Sends `close_notify` once, then drains the outgoing
    /// flush and the origin's own close within a bounded timeout — a
    /// peer that stops reading must not keep this task parked forever.
    async fn close(&mut self) -> Result<()> {
        if !self.close_notify_sent {
            self.conn.send_close_notify();
            self.close_notify_sent = true;
        }
        let drain = async {
            self.flush_outgoing().await?;
            // `O` implements both `ByteSource` and `ByteSink`, each with
            // its own idempotent `close`; both sides of the origin
            // channel need to close, so both are called explicitly
            // rather than through ambiguous dot-call resolution.
            ByteSource::close(&mut self.origin).await?;
            ByteSink::close(&mut self.origin).await
        };
        match tokio::time::timeout(CLOSE_DRAIN_TIMEOUT, drain).await {
            Ok(result) => result,
            Err(_) => Err(Error::new(ErrorKind::Tls, "closing TLS connection: drain timed out")),
        }
    }
}

impl<O: ByteSource + ByteSink> ByteSink for TlsConn<O> {
    async fn write(&mut self, buf: Buffer) -> Result<()> {
        let bytes = buf.to_bytes();
        self.conn
            .writer()
            .write_all(&bytes)
            .map_err(|e| Error::new(ErrorKind::Tls, "encrypting outbound data").set_source(e))?;
        self.flush_outgoing().await
    }

    async fn error(&mut self, _e: Error) -> Result<()> {
        self.close_notify_sent = true;
        self.flush_outgoing().await
    }

    async fn close(&mut self) -> Result<()> {
        ByteSource::close(self).await
    }
}
