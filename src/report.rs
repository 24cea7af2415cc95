//! Layer-by-layer diagnosis of a target.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Network layers checked by a [`Checker`](crate::Checker), in dependency order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Plain TCP reachability
    Tcp,
    /// TLS handshake and chain of trust
    Tls,
    /// Certificate issued for the requested hostname
    Name,
    /// HTTP request/response
    Http,
}

/// What happened to a layer during a diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

/// Outcome of one layer.
#[derive(Debug, Clone, Serialize)]
pub struct LayerReport {
    pub layer: Layer,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of [`Checker::diagnose`](crate::Checker::diagnose).
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub url: String,
    pub layers: Vec<LayerReport>,
    /// Status code of the HTTP check, when it ran and got a response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

impl Diagnosis {
    pub(crate) fn new(url: String) -> Self {
        Diagnosis {
            url,
            layers: Vec::new(),
            http_status: None,
        }
    }

    pub(crate) fn record(&mut self, layer: Layer, status: Status, error: Option<String>) {
        self.layers.push(LayerReport {
            layer,
            status,
            error,
        });
    }

    /// The first layer that failed, which is where connectivity breaks.
    pub fn failed_layer(&self) -> Option<Layer> {
        self.layers
            .iter()
            .find(|report| report.status == Status::Failed)
            .map(|report| report.layer)
    }

    /// True when no layer failed.
    pub fn is_healthy(&self) -> bool {
        self.failed_layer().is_none()
    }

    /// The report for `layer`, if it was requested.
    pub fn layer(&self, layer: Layer) -> Option<&LayerReport> {
        self.layers.iter().find(|report| report.layer == layer)
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
