//! Names a peer certificate covers, for reporting a hostname mismatch.
//!
//! The match itself is done by OpenSSL during the handshake.

use openssl::x509::X509Ref;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Verify results OpenSSL reports when the certificate is for another name.
pub(crate) fn is_name_mismatch(verify_result: i32) -> bool {
    verify_result == openssl_sys::X509_V_ERR_HOSTNAME_MISMATCH
        || verify_result == openssl_sys::X509_V_ERR_IP_ADDRESS_MISMATCH
}

/// subjectAltName DNS and IP entries of `cert`.
pub(crate) fn presented_names(cert: &X509Ref) -> Vec<String> {
    let mut names = Vec::new();

    if let Some(sans) = cert.subject_alt_names() {
        for san in sans.iter() {
            if let Some(name) = san.dnsname() {
                names.push(name.to_string());
            } else if let Some(ip) = san.ipaddress().and_then(ip_from_bytes) {
                names.push(ip.to_string());
            }
        }
    }
    names
}

fn ip_from_bytes(raw: &[u8]) -> Option<IpAddr> {
    match raw.len() {
        4 => <[u8; 4]>::try_from(raw).ok().map(|b| IpAddr::V4(Ipv4Addr::from(b))),
        16 => <[u8; 16]>::try_from(raw)
            .ok()
            .map(|b| IpAddr::V6(Ipv6Addr::from(b))),
        _ => None,
    }
}
