//! Primary location reported by a node that refused to serve us.

use serde::{Deserialize, Serialize};

/// Where the cluster says the primary node lives.
///
/// Extracted from a "not primary" reply and consumed right away to build the
/// next [`DataSourceDescriptor`](crate::DataSourceDescriptor); it is never
/// stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FailoverSignal {
    master_host: String,
    master_port: u16,
}

impl FailoverSignal {
    pub fn new(master_host: impl Into<String>, master_port: u16) -> Self {
        Self {
            master_host: master_host.into(),
            master_port,
        }
    }

    pub fn master_host(&self) -> &str {
        &self.master_host
    }

    pub fn master_port(&self) -> u16 {
        self.master_port
    }
}

impl core::fmt::Display for FailoverSignal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.master_host.contains(':') {
            write!(f, "[{}]:{}", self.master_host, self.master_port)
        } else {
            write!(f, "{}:{}", self.master_host, self.master_port)
        }
    }
}
