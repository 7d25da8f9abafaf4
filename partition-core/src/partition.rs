//! Top-level entry point: wires `BinBoundaryRefiner` → Z-order key
//! construction → `DistributedSampleSort` into the single call a caller
//! makes to partition a spatially-coordinated, already-distributed
//! graph.

use std::time::Instant;

use crate::arena::Arena;
use crate::bin_boundary::{bin_coordinates, BinStrategy};
use crate::config::PartitionConfig;
use crate::error::PartitionError;
use crate::messaging::Communicator;
use crate::sample_sort::{distributed_sample_sort, SampleSortVariant};
use crate::zorder::interleave_all;

/// Per-rank process context: the communicator handle, the scoped
/// workspace arena, and the optional verbose-diagnostics flag.
pub struct Ctrl<'a> {
    pub comm: &'a dyn Communicator,
    pub arena: Arena,
    /// Gates `trace!`-level histogram/nlsamples dumps; milestone
    /// `debug!` logs are unconditional regardless of this flag.
    pub debug: bool,
}

impl<'a> Ctrl<'a> {
    pub fn new(comm: &'a dyn Communicator) -> Self {
        Ctrl { comm, arena: Arena::new(), debug: false }
    }
}

/// The local rank's view of the distributed graph being partitioned.
pub struct Graph {
    /// Number of vertices this rank owns, `vtxdist[rank+1] - vtxdist[rank]`.
    pub nvtxs: usize,
    /// Global vertex count, `vtxdist[P]`.
    pub gnvtxs: usize,
    /// Replicated, length-`P+1` vertex distribution array.
    pub vtxdist: Vec<usize>,
    /// This rank's local edge count, consulted only by
    /// [`SampleSortVariant::Pseudo`] to size its adaptive sample count.
    pub nedges: usize,
    /// Destination rank for each local vertex, filled in by
    /// [`coordinate_partition`]. Empty until the call completes.
    pub where_: Vec<i32>,
}

impl Graph {
    pub fn new(vtxdist: Vec<usize>, rank: usize, nedges: usize) -> Self {
        let nvtxs = vtxdist[rank + 1] - vtxdist[rank];
        let gnvtxs = *vtxdist.last().expect("vtxdist must be non-empty");
        Graph { nvtxs, gnvtxs, vtxdist, nedges, where_: Vec::new() }
    }
}

fn validate_vtxdist(vtxdist: &[usize], rank: usize, peers: usize, nvtxs: usize) -> Result<(), PartitionError> {
    if vtxdist.len() != peers + 1 {
        return Err(PartitionError::MalformedVtxdist(format!(
            "expected length {}, got {}",
            peers + 1,
            vtxdist.len()
        )));
    }
    if vtxdist[0] != 0 {
        return Err(PartitionError::MalformedVtxdist(format!("vtxdist[0] must be 0, got {}", vtxdist[0])));
    }
    if !vtxdist.windows(2).all(|w| w[0] <= w[1]) {
        return Err(PartitionError::MalformedVtxdist(format!("vtxdist is not monotone: {vtxdist:?}")));
    }
    let expected_nvtxs = vtxdist[rank + 1] - vtxdist[rank];
    if expected_nvtxs != nvtxs {
        return Err(PartitionError::MalformedVtxdist(format!(
            "rank {rank}: vtxdist implies {expected_nvtxs} local vertices, graph has {nvtxs}"
        )));
    }
    Ok(())
}

/// Partition `graph`'s vertices using their `ndims`-dimensional spatial
/// coordinates `xyz` (flat, row-major, `graph.nvtxs * ndims` reals).
///
/// On success, `graph.where_[v]` holds vertex `v`'s destination rank for
/// every local vertex `v`. `setup` mirrors the original entry point's
/// one-time communicator/topology setup flag; this workspace's
/// [`crate::messaging::ProcessCommunicator`] needs no such step, so when
/// `setup` is `false` the only effect is that no topology log line is
/// emitted (there is no `nrecv` concept here — every rank always ends up
/// with exactly `graph.nvtxs` labels, never migrated vertices from a
/// prior call).
///
/// Every rank must call this with identical `config`, `bin_strategy`,
/// `sample_variant`, `ndims`, and a `graph.vtxdist` agreeing across
/// ranks — the collective call sequence inside must match exactly, or
/// the job deadlocks (`spec.md` §5).
pub fn coordinate_partition(
    ctrl: &mut Ctrl,
    graph: &mut Graph,
    ndims: usize,
    xyz: &[f64],
    setup: bool,
    config: &PartitionConfig,
    bin_strategy: BinStrategy,
    sample_variant: SampleSortVariant,
) -> Result<(), PartitionError> {
    config.validate();
    let rank = ctrl.comm.rank();
    let peers = ctrl.comm.peers();
    validate_vtxdist(&graph.vtxdist, rank, peers, graph.nvtxs)?;

    if sample_variant == SampleSortVariant::Strict && graph.nvtxs < peers {
        return Err(PartitionError::InsufficientVertices { rank, nvtxs: graph.nvtxs, minimum: peers });
    }

    if setup {
        log::debug!("rank {rank}: coordinate_partition topology setup (no-op for the in-process substrate)");
    }

    let scope = ctrl.arena.scope();
    let started = Instant::now();

    let bxyz = bin_coordinates(ctrl.comm, xyz, graph.gnvtxs, ndims, config, bin_strategy, ctrl.debug, &scope);
    log::debug!(
        "rank {rank}: bin boundary refinement done for {} vertices x {ndims} axes in {:?}",
        graph.nvtxs,
        started.elapsed()
    );

    let keys = interleave_all(&bxyz, ndims, config.nbits);

    let sort_started = Instant::now();
    let where_arr =
        distributed_sample_sort(ctrl.comm, &keys, &graph.vtxdist, graph.nedges, sample_variant, config, ctrl.debug, &scope);
    log::debug!("rank {rank}: distributed sample sort done for {} vertices in {:?}", graph.nvtxs, sort_started.elapsed());

    graph.where_ = where_arr;
    log::info!("rank {rank}: coordinate_partition finished in {:?}", started.elapsed());
    Ok(())
}
