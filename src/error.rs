//! Error types for connectivity checks.
//!
//! Each variant corresponds to the point where a check gave up, so callers can
//! tell a refused TCP connection apart from an untrusted certificate or a
//! certificate issued for another name.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::Layer;

/// Error returned by [`Checker`](crate::Checker) construction and checks.
#[derive(Debug)]
pub enum CheckError {
    /// The target could not be parsed as a URL
    UrlParse {
        /// The string that was given
        input: String,
        /// The underlying parse error, absent when the input was rejected
        /// before parsing
        source: Option<url::ParseError>,
    },

    /// The URL has no usable `host:port` pair
    InvalidHostPort {
        /// The offending URL
        url: String,
        /// Why no host/port could be derived
        reason: String,
    },

    /// The platform trust store could not be loaded
    TrustStore {
        /// Details reported by OpenSSL
        details: String,
    },

    /// DNS resolution failed for the given hostname
    DnsResolution {
        /// The hostname that failed to resolve
        hostname: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// TCP connection failed to the target address
    ConnectionFailed {
        /// The address (host:port) that connection failed to
        address: String,
        /// The underlying I/O error
        source: io::Error,
    },

    /// TLS handshake failed, including an untrusted certificate chain
    HandshakeFailed {
        /// The address the handshake was attempted with
        address: String,
        /// Details about why the handshake failed
        details: String,
    },

    /// The handshake succeeded but the certificate is for another name
    HostnameMismatch {
        /// The name that was expected
        hostname: String,
        /// Names the certificate does cover
        presented: Vec<String>,
    },

    /// Certificate missing or unreadable after the handshake
    Certificate {
        /// Description of what went wrong
        reason: String,
    },

    /// HTTP request against a scheme that has no HTTP semantics
    UnsupportedScheme {
        /// The scheme of the target URL
        scheme: String,
    },

    /// HTTP request or response failure
    Http {
        /// The underlying client error
        source: reqwest::Error,
    },

    /// Configuration could not be turned into a checker
    InvalidConfig {
        /// Why the configuration was rejected
        reason: String,
    },

    /// OpenSSL error outside of a handshake
    OpenSSLError {
        /// The underlying OpenSSL error
        details: String,
    },

    /// Generic I/O error
    IoError {
        /// The underlying I/O error
        source: io::Error,
    },

    /// A generic error with a custom message
    Other {
        /// Error message
        message: String,
    },
}

impl CheckError {
    /// The network layer this error was raised at, if it belongs to one.
    ///
    /// Construction errors (URL, host/port, trust store) return `None`.
    pub fn layer(&self) -> Option<Layer> {
        match self {
            Self::DnsResolution { .. } | Self::ConnectionFailed { .. } => Some(Layer::Tcp),
            Self::HandshakeFailed { .. } => Some(Layer::Tls),
            Self::HostnameMismatch { .. } | Self::Certificate { .. } => Some(Layer::Name),
            Self::UnsupportedScheme { .. } | Self::Http { .. } => Some(Layer::Http),
            _ => None,
        }
    }

    /// Classifies a failed `TcpStream::connect` on `address`.
    pub(crate) fn dial(hostname: &str, address: &str, source: io::Error) -> Self {
        if is_lookup_failure(&source) {
            Self::DnsResolution {
                hostname: hostname.to_string(),
                source,
            }
        } else {
            Self::ConnectionFailed {
                address: address.to_string(),
                source,
            }
        }
    }
}

// std reports resolver failures as uncategorized errors, the message is all we have.
fn is_lookup_failure(e: &io::Error) -> bool {
    let msg = e.to_string();
    msg.contains("failed to lookup address information")
        || msg.contains("could not resolve to any addresses")
        || msg.contains("No such host is known")
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UrlParse {
                input,
                source: Some(source),
            } => {
                write!(f, "Invalid URL {:?}: {}", input, source)
            }
            Self::UrlParse { input, source: None } => {
                write!(f, "Invalid URL {:?}: contains control characters", input)
            }
            Self::InvalidHostPort { url, reason } => {
                write!(f, "No host:port in {}: {}", url, reason)
            }
            Self::TrustStore { details } => {
                write!(f, "Failed to load system trust store: {}", details)
            }
            Self::DnsResolution { hostname, .. } => {
                write!(
                    f,
                    "Failed to resolve hostname: {}. Check that the hostname is spelled correctly and your DNS configuration is working.",
                    hostname
                )
            }
            Self::ConnectionFailed { address, source } => {
                write!(f, "Connection failed to {}: {}", address, source)
            }
            Self::HandshakeFailed { address, details } => {
                write!(f, "TLS handshake with {} failed: {}", address, details)
            }
            Self::HostnameMismatch {
                hostname,
                presented,
            } => {
                if presented.is_empty() {
                    write!(f, "Certificate is not valid for {}", hostname)
                } else {
                    write!(
                        f,
                        "Certificate is not valid for {}, it is valid for: {}",
                        hostname,
                        presented.join(", ")
                    )
                }
            }
            Self::Certificate { reason } => {
                write!(f, "Certificate error: {}", reason)
            }
            Self::UnsupportedScheme { scheme } => {
                write!(f, "{} scheme not supported", scheme)
            }
            Self::Http { source } => {
                write!(f, "HTTP request failed: {}", source)
            }
            Self::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            Self::OpenSSLError { details } => {
                write!(f, "OpenSSL error: {}", details)
            }
            Self::IoError { source } => {
                write!(f, "I/O error: {}", source)
            }
            Self::Other { message } => {
                write!(f, "{}", message)
            }
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UrlParse {
                source: Some(source),
                ..
            } => Some(source),
            Self::DnsResolution { source, .. } => Some(source),
            Self::ConnectionFailed { source, .. } => Some(source),
            Self::Http { source } => Some(source),
            Self::IoError { source } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckError {
    fn from(e: io::Error) -> Self {
        Self::IoError { source: e }
    }
}

impl From<&str> for CheckError {
    fn from(s: &str) -> Self {
        Self::Other {
            message: s.to_string(),
        }
    }
}

impl From<String> for CheckError {
    fn from(s: String) -> Self {
        Self::Other { message: s }
    }
}

impl From<openssl::error::ErrorStack> for CheckError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        Self::OpenSSLError {
            details: e.to_string(),
        }
    }
}

impl From<ConfigError> for CheckError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidConfig {
            reason: e.to_string(),
        }
    }
}

impl From<reqwest::Error> for CheckError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http { source: e }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CheckError>;
