//! Trust configuration shared by the TLS checks.
//!
//! The platform CA bundle and directory are located the same way the HTTP
//! client's TLS backend locates them; OpenSSL's compiled-in default paths are
//! not relied on. Extra authorities appended at runtime are kept here and
//! installed into every connector built from the configuration.

use log::{debug, warn};
use openssl::ssl::{SslConnector, SslConnectorBuilder, SslMethod};
use openssl::x509::{X509Ref, X509};
use std::path::{Path, PathBuf};

use crate::error::{CheckError, Result};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Certificate authorities accepted as issuers: the platform defaults plus
/// everything appended with [`TrustPool::append_pem`].
///
/// The pool only grows.
#[derive(Debug, Clone, Default)]
pub struct TrustPool {
    extra: Vec<X509>,
}

impl TrustPool {
    /// Appends every certificate found in `pem`.
    ///
    /// Blocks that are not valid certificates are skipped. Returns `true` if at
    /// least one certificate was parsed.
    pub fn append_pem(&mut self, pem: &[u8]) -> bool {
        let text = String::from_utf8_lossy(pem);
        let mut rest: &str = &text;
        let mut parsed = 0;

        while let Some(start) = rest.find(PEM_BEGIN) {
            let block = &rest[start..];
            let end = match block.find(PEM_END) {
                Some(end) => end + PEM_END.len(),
                None => {
                    warn!("unterminated certificate block in PEM input");
                    break;
                }
            };

            match X509::from_pem(block[..end].as_bytes()) {
                Ok(cert) => {
                    self.push(cert);
                    parsed += 1;
                }
                Err(e) => warn!("skipping unparsable certificate block: {}", e),
            }
            rest = &block[end..];
        }

        debug!(
            "{} certificate(s) appended, {} extra in pool",
            parsed,
            self.extra.len()
        );
        parsed > 0
    }

    fn push(&mut self, cert: X509) {
        // Installing the same certificate twice into one store is rejected by older OpenSSL.
        let der = cert.to_der().ok();
        let known = der.is_some()
            && self
                .extra
                .iter()
                .any(|existing| existing.to_der().ok() == der);
        if !known {
            self.extra.push(cert);
        }
    }

    /// Certificates appended on top of the platform defaults.
    pub fn certificates(&self) -> impl Iterator<Item = &X509Ref> {
        self.extra.iter().map(|cert| &**cert)
    }

    /// Number of certificates appended on top of the platform defaults.
    pub fn len(&self) -> usize {
        self.extra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extra.is_empty()
    }
}

/// TLS handshake configuration used by every TLS check of a checker.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    ca_file: Option<PathBuf>,
    ca_dir: Option<PathBuf>,
    roots: TrustPool,
}

impl TlsConfig {
    /// Locates and loads the platform default trust store.
    ///
    /// Fails with [`CheckError::TrustStore`] when no CA bundle or directory can
    /// be found, or when the one found cannot be loaded.
    pub fn system() -> Result<TlsConfig> {
        let found = openssl_probe::probe();
        if found.cert_file.is_none() && found.cert_dir.is_none() {
            return Err(CheckError::TrustStore {
                details: "no CA bundle or certificate directory found (set SSL_CERT_FILE or SSL_CERT_DIR)"
                    .to_string(),
            });
        }
        debug!(
            "system trust store: file {:?}, dir {:?}",
            found.cert_file, found.cert_dir
        );

        let config = TlsConfig {
            ca_file: found.cert_file,
            ca_dir: found.cert_dir,
            roots: TrustPool::default(),
        };
        // Load once so an unreadable store fails construction, not the first handshake.
        config.system_connector()?;
        Ok(config)
    }

    /// CA bundle file the platform roots are read from.
    pub fn ca_file(&self) -> Option<&Path> {
        self.ca_file.as_deref()
    }

    /// Hashed certificate directory the platform roots are looked up in.
    pub fn ca_dir(&self) -> Option<&Path> {
        self.ca_dir.as_deref()
    }

    /// Certificates trusted on top of the platform store.
    pub fn trust_pool(&self) -> &TrustPool {
        &self.roots
    }

    /// Mutable access for appending certificates.
    pub fn trust_pool_mut(&mut self) -> &mut TrustPool {
        &mut self.roots
    }

    /// Builds a client connector trusting the platform store and the pool.
    ///
    /// Chain verification is on; whether the name is checked is decided per
    /// connection.
    pub fn connector(&self) -> Result<SslConnector> {
        let mut builder = self.system_connector()?;
        for cert in &self.roots.extra {
            builder.cert_store_mut().add_cert(cert.clone())?;
        }
        Ok(builder.build())
    }

    fn system_connector(&self) -> Result<SslConnectorBuilder> {
        let trust_store = |e: openssl::error::ErrorStack| CheckError::TrustStore {
            details: e.to_string(),
        };
        let mut builder = SslConnector::builder(SslMethod::tls_client()).map_err(trust_store)?;
        builder
            .load_verify_locations(self.ca_file.as_deref(), self.ca_dir.as_deref())
            .map_err(trust_store)?;
        Ok(builder)
    }
}
