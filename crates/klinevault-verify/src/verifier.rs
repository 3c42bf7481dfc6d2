//! Parallel checksum verification of downloaded archives.

use klinevault_types::{KlineVaultError, LocalFile, MismatchPolicy, PipelineConfig};
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::FileStateTracker;
use crate::checksum::{ChecksumError, read_sidecar, sha256_file};

/// Result of checking one archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Digest matches the sidecar.
    Verified,
    /// Digest, or the file name recorded in the sidecar, does not match.
    Mismatched {
        /// Value recorded in the sidecar.
        expected: String,
        /// Value observed locally.
        actual: String,
    },
    /// No sidecar next to the archive.
    SidecarMissing,
    /// The archive or its sidecar could not be read.
    Failed(String),
}

impl VerificationOutcome {
    /// Returns true if the archive was verified.
    #[must_use]
    pub const fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }
}

/// Verification result of one archive.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    /// The archive that was checked.
    pub file: LocalFile,
    /// What the check found.
    pub outcome: VerificationOutcome,
    /// True if the archive was removed under [`MismatchPolicy::Delete`].
    pub deleted: bool,
}

impl VerificationReport {
    /// Converts a non-verified outcome into the matching error.
    #[must_use]
    pub fn error(&self) -> Option<KlineVaultError> {
        let path = self.file.path().to_path_buf();
        match &self.outcome {
            VerificationOutcome::Verified => None,
            VerificationOutcome::Mismatched { expected, actual } => {
                Some(KlineVaultError::ChecksumMismatch {
                    file: path,
                    expected: expected.clone(),
                    actual: actual.clone(),
                })
            }
            VerificationOutcome::SidecarMissing => Some(KlineVaultError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("missing checksum sidecar for {}", path.display()),
            ))),
            VerificationOutcome::Failed(reason) => Some(KlineVaultError::Io(std::io::Error::other(
                format!("{}: {reason}", path.display()),
            ))),
        }
    }
}

/// Compares archive digests against their `.CHECKSUM` sidecars.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumVerifier {
    policy: MismatchPolicy,
}

impl ChecksumVerifier {
    /// Creates a verifier with the given mismatch policy.
    #[must_use]
    pub const fn new(policy: MismatchPolicy) -> Self {
        Self { policy }
    }

    /// Creates a verifier from the pipeline configuration.
    #[must_use]
    pub const fn from_pipeline(config: &PipelineConfig) -> Self {
        Self::new(config.mismatch_policy)
    }

    /// Returns the mismatch policy.
    #[must_use]
    pub const fn policy(&self) -> MismatchPolicy {
        self.policy
    }

    /// Verifies one archive and records the result.
    ///
    /// Verified archives get a marker. Mismatches are flagged with a marker or,
    /// under [`MismatchPolicy::Delete`], the archive is removed so the next
    /// download fetches it again. The sidecar is always kept.
    #[must_use]
    pub fn verify_file(&self, file: &LocalFile) -> VerificationReport {
        let outcome = check(file);
        let mut deleted = false;

        let recorded = match &outcome {
            VerificationOutcome::Verified => {
                info!(
                    event_type = "checksum_verified",
                    file = %file.file_name(),
                    "Checksum verified"
                );
                read_digest(file).and_then(|digest| FileStateTracker::mark_verified(file, &digest))
            }
            VerificationOutcome::Mismatched { expected, actual } => {
                warn!(
                    event_type = "checksum_mismatch",
                    file = %file.file_name(),
                    expected = %expected,
                    actual = %actual,
                    policy = ?self.policy,
                    "Checksum mismatch"
                );
                match self.policy {
                    MismatchPolicy::Flag => read_digest(file)
                        .and_then(|digest| FileStateTracker::mark_mismatched(file, &digest)),
                    MismatchPolicy::Delete => {
                        deleted = true;
                        std::fs::remove_file(file.path())
                            .map_err(KlineVaultError::from)
                            .and_then(|()| FileStateTracker::forget(file))
                    }
                }
            }
            VerificationOutcome::SidecarMissing | VerificationOutcome::Failed(_) => {
                warn!(
                    event_type = "checksum_unavailable",
                    file = %file.file_name(),
                    outcome = ?outcome,
                    "Checksum could not be checked"
                );
                FileStateTracker::forget(file)
            }
        };

        if let Err(e) = recorded {
            warn!(
                event_type = "marker_write_failed",
                file = %file.file_name(),
                error = %e,
                "Could not record verification state"
            );
            if deleted && file.path().exists() {
                deleted = false;
            }
        }

        VerificationReport {
            file: file.clone(),
            outcome,
            deleted,
        }
    }

    /// Verifies archives in parallel, returning reports in input order.
    #[must_use]
    pub fn verify(&self, files: &[LocalFile]) -> Vec<VerificationReport> {
        let reports: Vec<VerificationReport> =
            files.par_iter().map(|file| self.verify_file(file)).collect();
        let verified = reports.iter().filter(|r| r.outcome.is_verified()).count();
        info!(
            event_type = "verification_complete",
            total = reports.len(),
            verified,
            failed = reports.len() - verified,
            "Verification complete"
        );
        reports
    }
}

fn check(file: &LocalFile) -> VerificationOutcome {
    let sidecar = match read_sidecar(&file.checksum_path()) {
        Ok(Some(sidecar)) => sidecar,
        Ok(None) => return VerificationOutcome::SidecarMissing,
        Err(e) => return VerificationOutcome::Failed(e.to_string()),
    };

    if let Some(name) = &sidecar.file_name
        && name != file.file_name()
    {
        return VerificationOutcome::Mismatched {
            expected: name.clone(),
            actual: file.file_name().to_string(),
        };
    }

    match sha256_file(file.path()) {
        Ok(actual) if actual == sidecar.digest => VerificationOutcome::Verified,
        Ok(actual) => VerificationOutcome::Mismatched {
            expected: sidecar.digest,
            actual,
        },
        Err(e) => VerificationOutcome::Failed(e.to_string()),
    }
}

fn read_digest(file: &LocalFile) -> klinevault_types::Result<String> {
    match read_sidecar(&file.checksum_path()) {
        Ok(Some(sidecar)) => Ok(sidecar.digest),
        Ok(None) => Err(missing(file.checksum_path())),
        Err(ChecksumError::Io(e)) => Err(e.into()),
        Err(ChecksumError::InvalidFormat(reason)) => {
            Err(KlineVaultError::Io(std::io::Error::other(reason)))
        }
    }
}

fn missing(path: PathBuf) -> KlineVaultError {
    KlineVaultError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("missing checksum sidecar {}", path.display()),
    ))
}
