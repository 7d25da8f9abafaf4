//! Errors the partitioner can report *before* any collective has run.
//!
//! Once a rank enters a collective, every participant must take the same
//! branch or the job deadlocks (see `spec.md` §5), so invariant
//! violations discovered mid-algorithm are reported as a rank-tagged
//! `panic!`, not through this type (see the assertions in
//! [`crate::sample_sort::distributed_sample_sort`]).
//! `PartitionError` only covers conditions a caller can check and react
//! to before committing to the synchronous section.

use thiserror::Error;

/// Errors returned by the substrate setup and precondition checks that
/// run before [`crate::coordinate_partition`] starts its collectives.
#[derive(Debug, Error)]
pub enum PartitionError {
    /// `vtxdist` was not a monotone, length-`P+1` array with
    /// `vtxdist[0] == 0`.
    #[error("malformed vtxdist: {0}")]
    MalformedVtxdist(String),

    /// The strict `SampleSort` variant requires `nvtxs >= P` on every
    /// rank (see `spec.md` §4.3 Preconditions); `PseudoSampleSort`
    /// relaxes this but still needs `nvtxs >= nlsamples` on at least one
    /// rank.
    #[error("rank {rank} has nvtxs={nvtxs}, below the required minimum of {minimum}")]
    InsufficientVertices { rank: usize, nvtxs: usize, minimum: usize },

    /// The in-process messaging substrate failed to spin up its worker
    /// threads (e.g. thread spawn failure).
    #[error("messaging substrate failed to start: {0}")]
    SubstrateSetup(String),

    /// A point-to-point exchange or collective failed at the messaging
    /// layer (e.g. a peer's channel disconnected).
    #[error("messaging error on rank {rank}: {detail}")]
    Messaging { rank: usize, detail: String },
}
