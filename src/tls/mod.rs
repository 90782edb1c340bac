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

//! The TLS adapter: wraps a raw, non-blocking byte channel (anything that
//! is both [`crate::io::source::ByteSource`] and
//! [`crate::io::sink::ByteSink`]) into a TLS connection exposing the same
//! plaintext contract. Servers that accept both TLS and plaintext
//! connections on one port use [`conn::looks_like_tls`] to sniff the
//! first byte before deciding which path to take.

pub mod config;
pub mod conn;

pub use config::{ContextProtocol, KeyStore, TlsConfig, TrustStore};
pub use conn::{looks_like_tls, TlsConn};

use rustls::pki_types::ServerName;
use rustls::{ClientConnection, ServerConnection};

use crate::error::{Error, ErrorKind, Result};
use crate::io::sink::ByteSink;
use crate::io::source::ByteSource;

/// Wraps `origin` as a TLS server using `config`, running the handshake
/// to completion before returning.
pub async fn accept<O: ByteSource + ByteSink>(origin: O, config: &TlsConfig) -> Result<TlsConn<O>> {
    let server_config = config.build_server()?;
    let conn = ServerConnection::new(server_config)
        .map_err(|e| Error::new(ErrorKind::Tls, "starting TLS server connection").set_source(e))?;
    let mut tls = TlsConn::new_server(origin, conn);
    tls.handshake().await?;
    Ok(tls)
}

/// Wraps `origin` as a TLS client connecting to `server_name`, running
/// the handshake to completion before returning.
pub async fn connect<O: ByteSource + ByteSink>(
    origin: O,
    config: &TlsConfig,
    server_name: &str,
) -> Result<TlsConn<O>> {
    let client_config = config.build_client()?;
    let name = ServerName::try_from(server_name.to_string())
        .map_err(|e| Error::new(ErrorKind::Tls, "invalid TLS server name").set_source(e))?;
    let conn = ClientConnection::new(client_config, name)
        .map_err(|e| Error::new(ErrorKind::Tls, "starting TLS client connection").set_source(e))?;
    let mut tls = TlsConn::new_client(origin, conn);
    tls.handshake().await?;
    Ok(tls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buf::Buffer;
    use crate::io::pipe::{pipe, PipeSink, PipeSource};

    /// Joins a pipe's read half and another pipe's write half into one
    /// `ByteSource + ByteSink` channel, so two of these back to back form
    /// a full-duplex bridge like a real socket pair.
    struct DuplexEnd {
        source: PipeSource,
        sink: PipeSink,
    }

    impl ByteSource for DuplexEnd {
        async fn read(&mut self) -> Result<crate::buf::Buffer> {
            self.source.read().await
        }

        async fn close(&mut self) -> Result<()> {
            self.source.close().await
        }
    }

    impl ByteSink for DuplexEnd {
        async fn write(&mut self, buf: crate::buf::Buffer) -> Result<()> {
            self.sink.write(buf).await
        }

        async fn error(&mut self, e: Error) -> Result<()> {
            self.sink.error(e).await
        }

        async fn close(&mut self) -> Result<()> {
            self.sink.close().await
        }
    }

    fn duplex_pair() -> (DuplexEnd, DuplexEnd) {
        let (client_to_server, server_reads) = pipe();
        let (server_to_client, client_reads) = pipe();
        (
            DuplexEnd {
                source: client_reads,
                sink: server_to_client,
            },
            DuplexEnd {
                source: server_reads,
                sink: client_to_server,
            },
        )
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
    async fn handshake_then_plaintext_round_trips_both_ways() {
        let tmp = tempfile::tempdir().unwrap();
        let server_config = self_signed_config(tmp.path());
        // build_client only reads trust_store; reusing the server's config
        // (trust_store: TrustAll) is enough to exercise the client path
        // without generating a second key pair.
        let client_config = server_config.clone();

        let (client_end, server_end) = duplex_pair();

        let server = tokio::spawn(async move {
            let mut conn = accept(server_end, &server_config).await.unwrap();
            let mut got = conn.read().await.unwrap().to_bytes().to_vec();
            while got.len() < b"ping".len() {
                got.extend_from_slice(&conn.read().await.unwrap().to_bytes());
            }
            assert_eq!(got, b"ping");
            conn.write(Buffer::from(Vec::from(&b"pong"[..]))).await.unwrap();
            ByteSource::close(&mut conn).await.unwrap();
        });

        let client = tokio::spawn(async move {
            let mut conn = connect(client_end, &client_config, "localhost").await.unwrap();
            conn.write(Buffer::from(Vec::from(&b"ping"[..]))).await.unwrap();
            let mut got = conn.read().await.unwrap().to_bytes().to_vec();
            while got.len() < b"pong".len() {
                got.extend_from_slice(&conn.read().await.unwrap().to_bytes());
            }
            assert_eq!(got, b"pong");
        });

        tokio::try_join!(server, client).unwrap();
    }
}
