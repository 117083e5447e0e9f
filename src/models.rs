//! Core data models used throughout the intake pipeline.
//!
//! These types describe an upload as it arrives, the structured identity
//! decoded from it, and the record left behind once it is stored.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// A single upload as handed to the pipeline by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Address of the uploader. Used for logging only, never trusted.
    pub client: String,
    pub payload: Vec<u8>,
    /// Size announced by the transport, when it announced one.
    pub declared_size: Option<u64>,
}

impl UploadRequest {
    pub fn new(client: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            client: client.into(),
            payload,
            declared_size: None,
        }
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    /// Size actually received.
    pub fn observed_size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Configuration-export formats we know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    PfSense,
    OpnSense,
}

impl Dialect {
    /// Detection order. PfSense wins when both markers are present.
    pub const ALL: [Dialect; 2] = [Dialect::PfSense, Dialect::OpnSense];

    /// Name of the document's root element.
    pub fn root_element(self) -> &'static str {
        match self {
            Dialect::PfSense => "pfsense",
            Dialect::OpnSense => "opnsense",
        }
    }

    /// Literal text searched for during detection.
    pub fn marker(self) -> &'static str {
        match self {
            Dialect::PfSense => "<pfsense>",
            Dialect::OpnSense => "<opnsense>",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::PfSense => write!(f, "pfSense"),
            Dialect::OpnSense => write!(f, "OPNsense"),
        }
    }
}

/// Identity decoded from a firewall configuration export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirewallConfig {
    PfSense {
        hostname: String,
        domain: Option<String>,
    },
    OpnSense {
        hostname: String,
    },
}

impl FirewallConfig {
    pub fn dialect(&self) -> Dialect {
        match self {
            FirewallConfig::PfSense { .. } => Dialect::PfSense,
            FirewallConfig::OpnSense { .. } => Dialect::OpnSense,
        }
    }

    /// The name backups are filed under: `hostname.domain` for pfSense
    /// exports with a non-empty domain, the bare hostname otherwise.
    pub fn canonical_hostname(&self) -> String {
        match self {
            FirewallConfig::PfSense {
                hostname,
                domain: Some(domain),
            } if !domain.is_empty() => format!("{}.{}", hostname, domain),
            FirewallConfig::PfSense { hostname, .. } => hostname.clone(),
            FirewallConfig::OpnSense { hostname } => hostname.clone(),
        }
    }
}

/// A backup file that has been written to disk.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    pub hostname: String,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Local>,
}

/// Successful result of one pipeline run.
#[derive(Debug, Clone)]
pub struct IntakeReceipt {
    pub client: String,
    pub dialect: Dialect,
    pub record: BackupRecord,
}
