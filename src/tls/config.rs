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

//! Declarative TLS context construction: a key
//! store, an optional trust store or "trust all" flag, and a context
//! protocol name. `create_context` (here, [`TlsConfig::build_server`] /
//! [`TlsConfig::build_client`]) is purely declarative: it reads the
//! configured PEM files and hands rustls a `ServerConfig`/`ClientConfig`,
//! with no further policy decisions.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};
use serde::Deserialize;

use crate::error::{Error, ErrorKind, Result};

/// The TLS protocol name requested of the context; rustls negotiates the
/// concrete version, so today this only distinguishes "default" from a
/// pinned floor.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum ContextProtocol {
    Tls12,
    Tls13,
}

impl Default for ContextProtocol {
    fn default() -> Self {
        ContextProtocol::Tls13
    }
}

/// Key material the context presents to the peer: a certificate chain and
/// matching private key, both PEM-encoded on disk.
#[derive(Clone, Debug, Deserialize)]
pub struct KeyStore {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Trust material used to validate the peer's certificate (client mode
/// only); `TrustAll` disables verification entirely and must never be the
/// default.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrustStore {
    Pem { ca_path: PathBuf },
    TrustAll,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TlsConfig {
    pub key_store: KeyStore,
    pub trust_store: Option<TrustStore>,
    #[serde(default)]
    pub protocol: ContextProtocol,
}

fn load_certs(path: &PathBuf) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| Error::new(ErrorKind::Tls, format!("opening cert file {}", path.display())).set_source(e))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::new(ErrorKind::Tls, format!("parsing cert file {}", path.display())).set_source(e))
}

fn load_key(path: &PathBuf) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| Error::new(ErrorKind::Tls, format!("opening key file {}", path.display())).set_source(e))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::new(ErrorKind::Tls, format!("parsing key file {}", path.display())).set_source(e))?
        .ok_or_else(|| Error::new(ErrorKind::Tls, format!("no private key found in {}", path.display())))
}

fn protocol_versions(protocol: ContextProtocol) -> &'static [&'static rustls::SupportedProtocolVersion] {
    match protocol {
        ContextProtocol::Tls12 => &[&rustls::version::TLS12],
        ContextProtocol::Tls13 => &[&rustls::version::TLS13],
    }
}

impl TlsConfig {
    /// Builds a server-side TLS context: key store is required; a trust
    /// store, if present, requests and validates client certificates
    /// (mutual TLS), otherwise clients are not asked to authenticate.
    pub fn build_server(&self) -> Result<Arc<ServerConfig>> {
        let certs = load_certs(&self.key_store.cert_path)?;
        let key = load_key(&self.key_store.key_path)?;

        let builder = ServerConfig::builder_with_protocol_versions(protocol_versions(self.protocol));
        let config = match &self.trust_store {
            None | Some(TrustStore::TrustAll) => builder
                .with_no_client_auth()
                .with_single_cert(certs, key)
                .map_err(|e| Error::new(ErrorKind::Tls, "building server TLS config").set_source(e))?,
            Some(TrustStore::Pem { ca_path }) => {
                let roots = build_root_store(ca_path)?;
                let client_verifier =
                    rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
                        .build()
                        .map_err(|e| Error::new(ErrorKind::Tls, "building client cert verifier").set_source(e))?;
                builder
                    .with_client_cert_verifier(client_verifier)
                    .with_single_cert(certs, key)
                    .map_err(|e| Error::new(ErrorKind::Tls, "building server TLS config").set_source(e))?
            }
        };
        Ok(Arc::new(config))
    }

    /// Builds a client-side TLS context. `TrustStore::TrustAll` disables
    /// certificate verification outright and must only be used for tests
    /// against a known-private endpoint.
    pub fn build_client(&self) -> Result<Arc<ClientConfig>> {
        let builder = ClientConfig::builder_with_protocol_versions(protocol_versions(self.protocol));
        let config = match &self.trust_store {
            Some(TrustStore::Pem { ca_path }) => {
                let roots = build_root_store(ca_path)?;
                builder.with_root_certificates(roots).with_no_client_auth()
            }
            Some(TrustStore::TrustAll) | None => builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(TrustAllVerifier))
                .with_no_client_auth(),
        };
        Ok(Arc::new(config))
    }
}

fn build_root_store(ca_path: &PathBuf) -> Result<RootCertStore> {
    let certs = load_certs(ca_path)?;
    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| Error::new(ErrorKind::Tls, "adding CA certificate to trust store").set_source(e))?;
    }
    Ok(roots)
}

/// Accepts any server certificate. Used only when `TrustStore::TrustAll`
/// is explicitly configured.
#[derive(Debug)]
struct TrustAllVerifier;

impl ServerCertVerifier for TrustAllVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
