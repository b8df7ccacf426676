//! Convergence verification.
//!
//! After syncing, two peers can confirm they hold the same state by
//! comparing digests. The root alone answers yes or no; the keys say
//! where the replicas still differ.

use std::collections::BTreeSet;

use hive_core::{Blake3Hash, Digest};
use hive_store::{Replica, ReplicaExt};

use crate::error::Result;

/// Result of convergence verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceResult {
    /// Both replicas have identical state.
    Converged,
    /// Replicas differ (may need more sync rounds).
    Diverged {
        /// Keys only the local replica holds.
        local_only: Vec<String>,
        /// Keys only the remote replica holds.
        remote_only: Vec<String>,
    },
}

impl ConvergenceResult {
    /// Check if the replicas have converged.
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceResult::Converged)
    }
}

/// Compare a local digest with a remote root and key list.
pub fn compare_digests(
    local: &Digest,
    remote_root: &Blake3Hash,
    remote_keys: &[String],
) -> ConvergenceResult {
    if local.root_hash == *remote_root {
        return ConvergenceResult::Converged;
    }

    let ours: BTreeSet<&str> = local.keys.iter().map(String::as_str).collect();
    let theirs: BTreeSet<&str> = remote_keys.iter().map(String::as_str).collect();

    ConvergenceResult::Diverged {
        local_only: ours.difference(&theirs).map(|k| k.to_string()).collect(),
        remote_only: theirs.difference(&ours).map(|k| k.to_string()).collect(),
    }
}

/// Verify a replica against a remote peer's digest.
pub async fn verify_convergence<R: Replica + ?Sized>(
    local: &R,
    remote_root: &Blake3Hash,
    remote_keys: &[String],
) -> Result<ConvergenceResult> {
    let digest = local.build_digest().await?;
    let result = compare_digests(&digest, remote_root, remote_keys);
    if let ConvergenceResult::Diverged { local_only, remote_only } = &result {
        tracing::debug!(
            hive = %local.hive_id(),
            local_only = local_only.len(),
            remote_only = remote_only.len(),
            "replicas diverge"
        );
    }
    Ok(result)
}
