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

//! End-to-end TLS handshake and application-data exchange, with every
//! byte the client writes delivered to the server one byte at a time
//! before the remainder of that write — the worst case for a TLS record
//! reassembler, since a single record arrives to `TlsConn` split across
//! many origin reads rather than in one piece.

use conduit::buf::Buffer;
use conduit::error::Result;
use conduit::io::pipe::{pipe, PipeSink};
use conduit::io::sink::ByteSink;
use conduit::io::source::ByteSource;
use conduit::tls::{accept, connect, ContextProtocol, KeyStore, TlsConfig, TrustStore};

/// Splits every buffer that comes off `inner` into a 1-byte chunk
/// followed by the remainder, forcing callers above it to reassemble
/// TLS records across extra reads instead of ever seeing a whole
/// record in one `read()`.
struct OneByteAtATime<S> {
    inner: S,
    pending: Option<Buffer>,
}

impl<S> OneByteAtATime<S> {
    fn new(inner: S) -> Self {
        Self { inner, pending: None }
    }
}

impl<S: ByteSource> ByteSource for OneByteAtATime<S> {
    async fn read(&mut self) -> Result<Buffer> {
        if let Some(mut rest) = self.pending.take() {
            if rest.len() > 1 {
                let head = rest.split_to(1);
                self.pending = Some(rest);
                return Ok(head);
            }
            return Ok(rest);
        }
        let mut buf = self.inner.read().await?;
        if buf.len() > 1 {
            let head = buf.split_to(1);
            self.pending = Some(buf);
            Ok(head)
        } else {
            Ok(buf)
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}

/// Joins a pipe's read half and another pipe's write half into one
/// `ByteSource + ByteSink` channel, the way two real socket halves
/// would be paired by an accept loop.
struct DuplexEnd<R> {
    source: R,
    sink: PipeSink,
}

impl<R: ByteSource> ByteSource for DuplexEnd<R> {
    async fn read(&mut self) -> Result<Buffer> {
        self.source.read().await
    }

    async fn close(&mut self) -> Result<()> {
        self.source.close().await
    }
}

impl<R: ByteSource> ByteSink for DuplexEnd<R> {
    async fn write(&mut self, buf: Buffer) -> Result<()> {
        self.sink.write(buf).await
    }

    async fn error(&mut self, e: conduit::error::Error) -> Result<()> {
        self.sink.error(e).await
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await
    }
}

fn self_signed_config(tmp: &std::path::Path) -> TlsConfig {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_path = tmp.join("cert.pem");
    let key_path = tmp.join("key.pem");
    std::fs::write(&cert_path, certified.cert.pem()).unwrap();
    std::fs::write(&key_path, certified.key_pair.serialize_pem()).unwrap();
    TlsConfig {
        key_store: KeyStore { cert_path, key_path },
        trust_store: Some(TrustStore::TrustAll),
        protocol: ContextProtocol::Tls13,
    }
}

#[tokio::test]
async fn handshake_and_data_survive_a_one_byte_at_a_time_origin() {
    let tmp = tempfile::tempdir().unwrap();
    let server_config = self_signed_config(tmp.path());
    let client_config = server_config.clone();

    let (client_to_server, server_reads) = pipe();
    let (server_to_client, client_reads) = pipe();

    let server_end = DuplexEnd {
        source: OneByteAtATime::new(server_reads),
        sink: server_to_client,
    };
    let client_end = DuplexEnd {
        source: OneByteAtATime::new(client_reads),
        sink: client_to_server,
    };

    let server = tokio::spawn(async move {
        let mut conn = accept(server_end, &server_config).await.unwrap();
        let mut got = conn.read().await.unwrap().to_bytes().to_vec();
        while got.len() < b"ping over a trickle".len() {
            got.extend_from_slice(&conn.read().await.unwrap().to_bytes());
        }
        assert_eq!(got, b"ping over a trickle");
        conn.write(Buffer::from(Vec::from(&b"pong"[..]))).await.unwrap();
        ByteSource::close(&mut conn).await.unwrap();
    });

    let client = tokio::spawn(async move {
        let mut conn = connect(client_end, &client_config, "localhost").await.unwrap();
        conn.write(Buffer::from(Vec::from(&b"ping over a trickle"[..])))
            .await
            .unwrap();
        let mut got = conn.read().await.unwrap().to_bytes().to_vec();
        while got.len() < b"pong".len() {
            got.extend_from_slice(&conn.read().await.unwrap().to_bytes());
        }
        assert_eq!(got, b"pong");
    });

    tokio::try_join!(server, client).unwrap();
}

#[tokio::test]
async fn plaintext_first_byte_is_never_mistaken_for_tls() {
    assert!(!conduit::tls::looks_like_tls(b"GET / HTTP/1.1\r\n"));
}
