//! Layer-by-layer connectivity checks against a single URL.
//!
//! A [`Checker`] answers, separately, whether a target accepts TCP connections,
//! completes a TLS handshake with a trusted chain, presents a certificate for
//! the requested name, and answers an HTTP GET. When something is broken the
//! failing check tells you at which layer.
//!
//! ```no_run
//! use conncheck::Checker;
//!
//! let checker = Checker::new("https://example.com")?;
//! checker.check_conn()?;
//! checker.check_tls_conn()?;
//! checker.verify_name()?;
//! let response = checker.get_http()?;
//! println!("{}", response.status());
//! # Ok::<(), conncheck::CheckError>(())
//! ```
//!
//! All checks block. Only the HTTP check has a timeout of its own
//! ([`HTTP_TIMEOUT`]); the others wait as long as the operating system lets a
//! connect attempt run.

use log::{debug, warn};
use openssl::ssl::{HandshakeError, SslStream};
use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;
use strum::IntoEnumIterator;
use url::{Host, Url};

pub mod config;
pub mod error;
mod hostname;
pub mod report;
pub mod tls;

pub use config::Config;
pub use error::{CheckError, Result};
pub use report::{Diagnosis, Layer, LayerReport, Status};
pub use reqwest::blocking::Response;
pub use tls::{TlsConfig, TrustPool};

/// Total time allowed for the HTTP check, redirects included.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A parsed target plus the TLS trust configuration used to check it.
///
/// Checks take `&self` and can be repeated in any order. Extending the trust
/// pool takes `&mut self`, so it has to happen before the checker is shared.
#[derive(Debug, Clone)]
pub struct Checker {
    url: Url,
    domain: String,
    port: u16,
    authority: String,
    tls: TlsConfig,
    layers: Vec<Layer>,
}

impl Checker {
    /// Parses `host_url` and loads the platform trust store.
    ///
    /// Without an explicit port, `http` gets 80 and `https` gets 443. Other
    /// schemes must name their port.
    ///
    /// # Errors
    ///
    /// * [`CheckError::UrlParse`] - `host_url` is not a URL or contains control
    ///   characters
    /// * [`CheckError::InvalidHostPort`] - no host, or no port could be resolved
    /// * [`CheckError::TrustStore`] - the platform trust store is unusable
    pub fn new(host_url: &str) -> Result<Checker> {
        // The URL parser silently strips these instead of rejecting them.
        if host_url.bytes().any(|b| b < 0x20 || b == 0x7f) {
            return Err(CheckError::UrlParse {
                input: host_url.to_string(),
                source: None,
            });
        }
        let url = Url::parse(host_url).map_err(|source| CheckError::UrlParse {
            input: host_url.to_string(),
            source: Some(source),
        })?;

        let port = match (url.port(), url.scheme()) {
            (Some(port), _) => port,
            (None, "http") => 80,
            (None, "https") => 443,
            // ws, wss and ftp lose a port equal to their default while parsing.
            (None, scheme) => match url.port_or_known_default() {
                Some(port) if has_explicit_port(host_url) => port,
                _ => {
                    return Err(CheckError::InvalidHostPort {
                        url: url.to_string(),
                        reason: format!("missing port, scheme {:?} has no default", scheme),
                    })
                }
            },
        };

        let (domain, authority) = match url.host() {
            Some(Host::Ipv6(addr)) => (addr.to_string(), format!("[{}]:{}", addr, port)),
            Some(host) => (host.to_string(), format!("{}:{}", host, port)),
            None => {
                return Err(CheckError::InvalidHostPort {
                    url: url.to_string(),
                    reason: "missing host".to_string(),
                })
            }
        };
        if domain.is_empty() {
            return Err(CheckError::InvalidHostPort {
                url: url.to_string(),
                reason: "empty host".to_string(),
            });
        }

        let tls = TlsConfig::system()?;
        debug!("checker for {} resolved to {} port {}", url, domain, port);

        Ok(Checker {
            url,
            domain,
            port,
            authority,
            tls,
            layers: Layer::iter().collect(),
        })
    }

    /// Builds a checker from a configuration, appending every `ca_files` bundle.
    ///
    /// The configured `checks` become the layers [`Checker::diagnose`] runs.
    pub fn from_config(config: &Config) -> Result<Checker> {
        config.validate()?;
        let url = config.url.as_deref().unwrap_or_default();
        let mut checker = Checker::new(url)?;
        checker.layers = config.layers()?;

        for path in config.ca_files.iter().flatten() {
            let pem = fs::read(path).map_err(|e| CheckError::InvalidConfig {
                reason: format!("cannot read CA file {}: {}", path, e),
            })?;
            if !checker.add_pool(&pem) {
                warn!("no certificates found in {}", path);
            }
        }
        Ok(checker)
    }

    /// Appends the PEM certificates in `pem` to the trust pool.
    ///
    /// Returns `false` if no certificate could be parsed; that is not an error.
    /// Affects every later TLS check and the HTTP check.
    pub fn add_pool(&mut self, pem: &[u8]) -> bool {
        self.tls.trust_pool_mut().append_pem(pem)
    }

    /// Checks that a plain TCP connection can be opened.
    pub fn check_conn(&self) -> Result<()> {
        let address = self.address();
        let _stream = self.dial(&address)?;
        debug!("tcp connection to {} established", address);
        Ok(())
    }

    /// Checks that a TLS handshake with a trusted chain can be completed.
    ///
    /// The certificate name is not checked here, see [`Checker::verify_name`].
    pub fn check_tls_conn(&self) -> Result<()> {
        let address = self.address();
        let stream = self.dial(&address)?;
        let tls = self.handshake(&address, stream, false)?;
        debug!(
            "tls handshake with {} completed using {}",
            address,
            tls.ssl().version_str()
        );
        close(tls);
        Ok(())
    }

    /// Checks that the certificate presented at the URL's authority is valid
    /// for the URL's hostname.
    ///
    /// Fails with [`CheckError::HostnameMismatch`] when the chain is trusted
    /// but the certificate was issued for other names.
    pub fn verify_name(&self) -> Result<()> {
        let stream = self.dial(&self.authority)?;
        let tls = self.handshake(&self.authority, stream, true)?;

        let result = match tls.ssl().peer_certificate() {
            Some(_) => Ok(()),
            None => Err(CheckError::Certificate {
                reason: format!("{} presented no certificate", self.authority),
            }),
        };
        close(tls);

        if result.is_ok() {
            debug!("certificate at {} is valid for {}", self.authority, self.domain);
        }
        result
    }

    /// Issues a GET for the URL and returns the response.
    ///
    /// Redirects follow the client's default policy. The caller owns the
    /// response body.
    pub fn get_http(&self) -> Result<Response> {
        match self.url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(CheckError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                })
            }
        }

        let mut builder = reqwest::blocking::Client::builder().timeout(HTTP_TIMEOUT);
        for cert in self.tls.trust_pool().certificates() {
            builder = builder.add_root_certificate(reqwest::Certificate::from_der(&cert.to_der()?)?);
        }
        let client = builder.build()?;

        debug!("GET {}", self.url);
        let response = client.get(self.url.clone()).send()?;
        debug!("GET {} answered {}", self.url, response.status());
        Ok(response)
    }

    /// Runs the checker's layers (all of them unless configured otherwise),
    /// see [`Checker::diagnose_layers`].
    pub fn diagnose(&self) -> Diagnosis {
        self.diagnose_layers(&self.layers)
    }

    /// Runs the requested checks in layer order and reports each outcome.
    ///
    /// TLS and name checks are skipped for `http` targets and the HTTP check
    /// for non-HTTP schemes. Once a layer fails the layers above it are
    /// skipped.
    pub fn diagnose_layers(&self, layers: &[Layer]) -> Diagnosis {
        let mut diagnosis = Diagnosis::new(self.url.to_string());
        let mut failed = false;

        for layer in Layer::iter().filter(|layer| layers.contains(layer)) {
            if failed || !self.applies(layer) {
                diagnosis.record(layer, Status::Skipped, None);
                continue;
            }

            let result = match layer {
                Layer::Tcp => self.check_conn(),
                Layer::Tls => self.check_tls_conn(),
                Layer::Name => self.verify_name(),
                Layer::Http => self.get_http().map(|response| {
                    diagnosis.http_status = Some(response.status().as_u16());
                }),
            };

            match result {
                Ok(()) => diagnosis.record(layer, Status::Passed, None),
                Err(e) => {
                    debug!("{} check of {} failed: {}", layer, self.url, e);
                    failed = true;
                    diagnosis.record(layer, Status::Failed, Some(e.to_string()));
                }
            }
        }
        diagnosis
    }

    fn applies(&self, layer: Layer) -> bool {
        match layer {
            Layer::Tcp => true,
            Layer::Tls | Layer::Name => self.url.scheme() != "http",
            Layer::Http => matches!(self.url.scheme(), "http" | "https"),
        }
    }

    fn address(&self) -> String {
        if self.domain.contains(':') {
            format!("[{}]:{}", self.domain, self.port)
        } else {
            format!("{}:{}", self.domain, self.port)
        }
    }

    fn dial(&self, address: &str) -> Result<TcpStream> {
        debug!("dialing tcp {}", address);
        TcpStream::connect(address).map_err(|e| CheckError::dial(&self.domain, address, e))
    }

    fn handshake(
        &self,
        address: &str,
        stream: TcpStream,
        check_name: bool,
    ) -> Result<SslStream<TcpStream>> {
        self.tls
            .connector()?
            .configure()?
            .verify_hostname(check_name)
            .connect(&self.domain, stream)
            .map_err(|e| self.handshake_error(address, e))
    }

    fn handshake_error(&self, address: &str, e: HandshakeError<TcpStream>) -> CheckError {
        if let HandshakeError::Failure(ref mid) = e {
            let ssl = mid.ssl();
            if hostname::is_name_mismatch(ssl.verify_result().as_raw()) {
                let presented = ssl
                    .peer_cert_chain()
                    .and_then(|chain| chain.iter().next())
                    .map(hostname::presented_names)
                    .unwrap_or_default();
                return CheckError::HostnameMismatch {
                    hostname: self.domain.clone(),
                    presented,
                };
            }
        }
        CheckError::HandshakeFailed {
            address: address.to_string(),
            details: e.to_string(),
        }
    }

    /// The parsed target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Scheme of the target URL.
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Hostname without port or IPv6 brackets.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Explicit port, or the scheme default.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` as written in the URL, with the default port filled in.
    /// This is what [`Checker::verify_name`] dials.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// TLS configuration shared by the TLS checks.
    pub fn tls_config(&self) -> &TlsConfig {
        &self.tls
    }

    /// Certificates appended with [`Checker::add_pool`].
    pub fn trust_pool(&self) -> &TrustPool {
        self.tls.trust_pool()
    }

    /// Layers [`Checker::diagnose`] runs.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

/// Whether the authority of `input` spells out a port.
fn has_explicit_port(input: &str) -> bool {
    let rest = match input.split_once("://") {
        Some((_, rest)) => rest,
        None => return false,
    };
    let authority = rest.split(|c| c == '/' || c == '?' || c == '#').next().unwrap_or("");
    let host_port = authority.rsplit('@').next().unwrap_or("");
    let port = match host_port.rfind(']') {
        Some(end) => host_port[end + 1..].strip_prefix(':'),
        None => host_port.rsplit_once(':').map(|(_, port)| port),
    };
    port.map_or(false, |port| !port.is_empty())
}

fn close<S: Read + Write>(mut stream: SslStream<S>) {
    if let Err(e) = stream.shutdown() {
        debug!("tls shutdown: {}", e);
    }
}
