//! Transport detection.

use serde::Serialize;

/// Which transport backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Native protocol client.
    Native,
    /// HTTP REST command client.
    Rest,
    /// In-process map.
    Memory,
}

impl StoreKind {
    /// Detect the transport from a connection URL.
    pub fn from_url(url: &str) -> Option<Self> {
        if url.starts_with("redis://") {
            Some(Self::Native)
        } else if url.starts_with("https://") || url.starts_with("http://") {
            Some(Self::Rest)
        } else {
            None
        }
    }

    /// Label reported by the status endpoint.
    pub fn label(self) -> &'static str {
        match self {
            Self::Native => "local",
            Self::Rest => "upstash",
            Self::Memory => "memory",
        }
    }
}
