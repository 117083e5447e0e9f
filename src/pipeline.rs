//! The intake pipeline: size check → dialect detection → extraction → store.
//!
//! Each upload is a single attempt. The first failing stage ends the run and
//! its error is returned as-is; nothing is retried and nothing is cleaned up
//! beyond never writing the file. A host directory created by an earlier
//! attempt stays where it is.

use std::fmt;
use std::path::PathBuf;

use crate::dialect;
use crate::error::{IntakeError, Result};
use crate::extract;
use crate::models::{FirewallConfig, IntakeReceipt, UploadRequest};
use crate::size_guard::SizeGuard;
use crate::store::BackupStore;

/// Stages an upload moves through, in order. `Succeeded` is terminal; a
/// failed run ends at the stage its error maps to via `From<&IntakeError>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    SizeChecked,
    DialectDetected,
    Extracted,
    Stored,
    Succeeded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::SizeChecked => "size_checked",
            Stage::DialectDetected => "dialect_detected",
            Stage::Extracted => "extracted",
            Stage::Stored => "stored",
            Stage::Succeeded => "succeeded",
        };
        f.write_str(name)
    }
}

/// Stateless between runs; share one instance behind an `Arc`.
#[derive(Debug, Clone)]
pub struct IntakePipeline {
    guard: SizeGuard,
    store: BackupStore,
}

impl IntakePipeline {
    pub fn new(max_bytes: u64, backup_root: impl Into<PathBuf>) -> Self {
        Self {
            guard: SizeGuard::new(max_bytes),
            store: BackupStore::new(backup_root),
        }
    }

    pub fn size_guard(&self) -> SizeGuard {
        self.guard
    }

    pub fn store(&self) -> &BackupStore {
        &self.store
    }

    /// Runs one upload through every stage. Failures are logged here with
    /// the client address before being returned.
    pub fn submit(&self, request: &UploadRequest) -> Result<IntakeReceipt> {
        let result = self.run(request);
        match &result {
            Ok(receipt) => tracing::info!(
                client = %request.client,
                hostname = %receipt.record.hostname,
                dialect = %receipt.dialect,
                path = %receipt.record.path.display(),
                bytes = receipt.record.size,
                stage = %Stage::Succeeded,
                "backup stored"
            ),
            Err(err) if err.kind().is_client_error() => tracing::warn!(
                client = %request.client,
                kind = %err.kind(),
                reached = %Stage::from(err),
                error = %err,
                "upload rejected"
            ),
            Err(err) => tracing::error!(
                client = %request.client,
                kind = %err.kind(),
                reached = %Stage::from(err),
                error = %err,
                "backup failed"
            ),
        }
        result
    }

    fn run(&self, request: &UploadRequest) -> Result<IntakeReceipt> {
        trace_stage(request, Stage::Received);

        if let Some(declared) = request.declared_size {
            self.guard.check(declared)?;
        }
        self.guard.check(request.observed_size())?;
        trace_stage(request, Stage::SizeChecked);

        let dialect = dialect::detect(&request.payload)?;
        trace_stage(request, Stage::DialectDetected);

        let config = extract::extract(&request.payload, dialect)?;
        let hostname = config.canonical_hostname();
        trace_stage(request, Stage::Extracted);

        let record = self.store.save(&hostname, &request.payload)?;
        trace_stage(request, Stage::Stored);

        Ok(IntakeReceipt {
            client: request.client.clone(),
            dialect,
            record,
        })
    }
}

fn trace_stage(request: &UploadRequest, stage: Stage) {
    tracing::debug!(client = %request.client, %stage, "intake");
}

/// Size check, detection and extraction without storing anything.
pub fn inspect(guard: SizeGuard, bytes: &[u8]) -> Result<FirewallConfig> {
    guard.check(bytes.len() as u64)?;
    extract::detect_and_extract(bytes)
}

impl From<&IntakeError> for Stage {
    /// The last stage an upload reached before failing with this error.
    fn from(err: &IntakeError) -> Stage {
        match err {
            IntakeError::PayloadTooLarge { .. } | IntakeError::MissingFile(_) => Stage::Received,
            IntakeError::UnsupportedDialect => Stage::SizeChecked,
            IntakeError::MalformedConfig { .. } | IntakeError::MissingHostname(_) => {
                Stage::DialectDetected
            }
            IntakeError::InvalidHostname(_)
            | IntakeError::DirectoryCreateFailed { .. }
            | IntakeError::WriteFailed { .. } => Stage::Extracted,
        }
    }
}
