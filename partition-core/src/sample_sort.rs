//! Distributed sample sort: orders a distributed set of `(key, val)`
//! records by `(key, val)` lexicographically, and from the rank each
//! record lands on, derives a partition label for the record's
//! originating vertex.
//!
//! Two variants share every step below and differ only in how many
//! local splitter samples they draw (`spec.md` §4.3):
//!
//! - [`SampleSortVariant::Strict`] always takes exactly `P - 1` local
//!   samples per rank, and requires `nvtxs >= P` on every rank.
//! - [`SampleSortVariant::Pseudo`] sizes its sample count to the graph
//!   (`nlsamples`, derived from the global edge and vertex counts),
//!   trading splitter precision for working on graphs too small or too
//!   skewed for the strict variant.

use crate::arena::Scope;
use crate::config::PartitionConfig;
use crate::messaging::{Communicator, Ikv};

/// Which sampling strategy to use for splitter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSortVariant {
    /// Exactly `P - 1` local samples per rank. Requires `nvtxs >= P`.
    Strict,
    /// Adaptive sample count sized to the graph; see [`pseudo_nlsamples`].
    Pseudo,
}

/// `(key, val) < (other.key, other.val)` lexicographically.
fn lex_lt(a: Ikv, b: Ikv) -> bool {
    a.0 < b.0 || (a.0 == b.0 && a.1 < b.1)
}

/// Compute the adaptive sample count for [`SampleSortVariant::Pseudo`].
///
/// `nlsamples = clamp((global_edges + gnvtxs) / P^2, min_samples, P)`, then
/// if `nlsamples * P > gnvtxs` it is reset to `5 + gnvtxs / (5P)` — without
/// re-applying the `min_samples` floor. This mirrors the original
/// coordinate partitioner exactly, including the apparent gap: a graph
/// small enough to trigger the rescue can still end up with fewer than
/// `min_samples` splitter samples. Preserved deliberately (`spec.md` §9
/// Open Questions) rather than "fixed", since the original behavior is
/// what downstream balance guarantees were calibrated against.
pub fn pseudo_nlsamples(global_edges: usize, gnvtxs: usize, npes: usize, config: &PartitionConfig) -> usize {
    let mut nlsamples = (global_edges + gnvtxs) / (npes * npes);
    if nlsamples > npes {
        nlsamples = npes;
    } else if nlsamples < config.min_samples {
        nlsamples = config.min_samples;
    }
    if nlsamples * npes > gnvtxs {
        nlsamples = 5 + gnvtxs / (5 * npes);
    }
    nlsamples.max(1)
}

/// Run a distributed sample sort over this rank's `(key, val)` records
/// and return the partition label for each of this rank's local
/// vertices, in local-vertex order.
///
/// `keys[i]` is the Z-order key for local vertex `i`; the corresponding
/// `val` sent into the sort is the vertex's global id, `vtxdist[rank] +
/// i`. `vtxdist` is the usual length-`P+1` vertex distribution array.
/// `local_edges` is this rank's edge count, only consulted by
/// [`SampleSortVariant::Pseudo`] to size `nlsamples`.
///
/// Every rank must call this with the same `variant` and must have
/// computed an identical `gnvtxs`/`vtxdist` — a mismatch diverges the
/// collective call sequence and deadlocks the job (`spec.md` §5).
///
/// # Panics
///
/// Panics with a rank-tagged diagnostic if a computed label or vertex id
/// falls outside its declared range — an invariant violation, not a
/// recoverable condition (`spec.md` §7).
pub fn distributed_sample_sort(
    comm: &dyn Communicator,
    keys: &[i64],
    vtxdist: &[usize],
    local_edges: usize,
    variant: SampleSortVariant,
    config: &PartitionConfig,
    verbose: bool,
    scope: &Scope<'_>,
) -> Vec<i32> {
    let rank = comm.rank();
    let npes = comm.peers();
    let nvtxs = keys.len();
    let firstvtx = vtxdist[rank] as i64;
    let gnvtxs = vtxdist[npes];

    assert!(nvtxs > 0, "rank {rank}: distributed_sample_sort requires at least one local vertex");

    if npes == 1 {
        // No splitters to pick and nothing to exchange: every local
        // vertex already belongs to the only rank there is. Mirrors the
        // original source's `for (i=1; i<npes; i++)` splitter-fill loop,
        // which runs zero times here.
        log::debug!("rank {rank}: sample sort skipped (single rank owns the whole graph)");
        return vec![0i32; nvtxs];
    }

    let nlsamples = match variant {
        SampleSortVariant::Strict => npes,
        SampleSortVariant::Pseudo => {
            let global_edges = comm.all_reduce_sum_u64(local_edges as u64) as usize;
            pseudo_nlsamples(global_edges, gnvtxs, npes, config)
        }
    };
    log::debug!("rank {rank}: sample sort nlsamples={nlsamples} of {npes} ranks, gnvtxs={gnvtxs}");
    if verbose {
        log::trace!("rank {rank}: sample sort nlsamples={nlsamples} (variant {variant:?})");
    }

    // Step 1: local sort by (key, val) ascending. val is the global
    // vertex id, assigned densely so local index i maps to firstvtx + i.
    let mut elmnts: Vec<Ikv> = scope.alloc_vec(nvtxs);
    for (i, e) in elmnts.iter_mut().enumerate() {
        *e = (keys[i], firstvtx + i as i64);
    }
    elmnts.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    // Step 2: pick splitters.
    let npicks = nlsamples.saturating_sub(1);
    let mut mypicks: Vec<Ikv> = scope.alloc_vec(npicks);
    for (i, pick) in mypicks.iter_mut().enumerate() {
        *pick = elmnts[(i + 1) * nvtxs / nlsamples];
    }
    let allpicks_raw = comm.all_gather_records(&mypicks);
    let mut allpicks: Vec<Ikv> = scope.alloc_vec(allpicks_raw.len());
    allpicks.copy_from_slice(&allpicks_raw);
    allpicks.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut splitters: Vec<Ikv> = scope.alloc_vec(npes + 1);
    if npicks > 0 {
        // npes > 1 here (handled above), so this only stays empty if a
        // caller drives npicks to 0 some other way (e.g. a misconfigured
        // min_samples); guard it rather than index an empty allpicks.
        for (i, s) in splitters.iter_mut().enumerate().take(npes) {
            *s = allpicks[i * npicks];
        }
    }
    splitters[npes] = (i64::MAX, i64::MAX);
    splitters[0] = (i64::MIN, i64::MIN);

    // Step 3: bucketize with a single linear sweep. Mirrors the original
    // source's two-pointer sweep literally, including its reliance on
    // splitters never needing more than one bucket advance per element.
    let mut scounts: Vec<usize> = scope.alloc_vec(npes);
    let mut j = 0usize;
    for &e in &elmnts {
        if lex_lt(e, splitters[j + 1]) {
            scounts[j] += 1;
        } else {
            j += 1;
            assert!(j < npes, "rank {rank}: sample sort bucketize ran past the last rank bucket");
            scounts[j] += 1;
        }
    }

    // Step 4: exchange counts, build CSR offsets.
    let rcounts_flat_raw = comm.all_to_all_counts(&scounts);
    let mut rcounts_flat: Vec<usize> = scope.alloc_vec(rcounts_flat_raw.len());
    rcounts_flat.copy_from_slice(&rcounts_flat_raw);
    let scounts_csr = prefix_offsets(&scounts, scope);
    let rcounts_csr = prefix_offsets(&rcounts_flat, scope);
    let nrecv = *rcounts_csr.last().unwrap();

    // Step 5: exchange data. send/recv are message transport buffers
    // owned by the messaging layer, not arena scratch.
    let send: Vec<Vec<Ikv>> = (0..npes).map(|dst| elmnts[scounts_csr[dst]..scounts_csr[dst + 1]].to_vec()).collect();
    let recv = comm.exchange(send);
    for (src, payload) in recv.iter().enumerate() {
        assert_eq!(
            payload.len(),
            rcounts_csr[src + 1] - rcounts_csr[src],
            "rank {rank}: sample sort received a payload of unexpected size from rank {src}"
        );
    }
    let mut relmnts: Vec<Ikv> = scope.alloc_vec(nrecv);
    let mut recv_cursor = 0usize;
    for payload in recv {
        for item in payload {
            relmnts[recv_cursor] = item;
            recv_cursor += 1;
        }
    }

    // Step 6: local re-sort, tracking arrival order via perm.
    let mut perm: Vec<i64> = scope.alloc_vec(nrecv);
    for (i, r) in relmnts.iter().enumerate() {
        perm[i] = r.1;
    }
    for (i, r) in relmnts.iter_mut().enumerate() {
        r.1 = i as i64;
    }
    relmnts.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    // Step 7: rank assignment. relmnts[j] is the j-th element of the
    // globally sorted sequence, at global rank firstvtx+j; walk vtxdist
    // to find which rank's vertex range that falls in.
    let lastvtx = comm.scan_sum(nrecv) as i64;
    let firstvtx_global = lastvtx - nrecv as i64;
    let mut vtx_cursor = firstvtx_global;
    let mut j = 0usize;
    for i in 0..npes {
        let bound = vtxdist[i + 1] as i64;
        if bound > vtx_cursor {
            let take = if bound >= lastvtx { lastvtx - vtx_cursor } else { bound - vtx_cursor };
            for _ in 0..take {
                relmnts[relmnts[j].1 as usize].0 = i as i64;
                j += 1;
            }
            if bound < lastvtx {
                vtx_cursor = bound;
            }
        }
        if bound >= lastvtx {
            break;
        }
    }

    // Step 8: restore the original global vertex id.
    for (i, r) in relmnts.iter_mut().enumerate() {
        assert!(
            r.0 >= 0 && (r.0 as usize) < npes,
            "rank {rank}: sample sort produced an out-of-range label {} at received index {i}",
            r.0
        );
        r.1 = perm[i];
    }

    // Step 9: send labels back along the inverse of the earlier exchange.
    // send_back/recv_back are message transport buffers, not arena scratch.
    let send_back: Vec<Vec<Ikv>> = (0..npes).map(|dst| relmnts[rcounts_csr[dst]..rcounts_csr[dst + 1]].to_vec()).collect();
    let recv_back = comm.exchange(send_back);
    let mut labeled: Vec<Ikv> = scope.alloc_vec(nvtxs);
    let mut label_cursor = 0usize;
    for payload in recv_back {
        for item in payload {
            assert!(label_cursor < nvtxs, "rank {rank}: sample sort returned a different vertex count than was sent");
            labeled[label_cursor] = item;
            label_cursor += 1;
        }
    }
    assert_eq!(label_cursor, nvtxs, "rank {rank}: sample sort returned a different vertex count than was sent");

    // where_arr is the final output handed back to the caller; it
    // outlives this call and this scope, so it is a plain Vec.
    let mut where_arr = vec![-1i32; nvtxs];
    for &(label, vtx) in &labeled {
        assert!(label >= 0 && (label as usize) < npes, "rank {rank}: sample sort label {label} out of range [0, {npes})");
        assert!(
            vtx >= firstvtx && vtx < firstvtx + nvtxs as i64,
            "rank {rank}: sample sort returned vertex {vtx} outside this rank's range [{firstvtx}, {})",
            firstvtx + nvtxs as i64
        );
        where_arr[(vtx - firstvtx) as usize] = label as i32;
    }
    debug_assert!(where_arr.iter().all(|&w| w >= 0), "rank {rank}: sample sort left a vertex unlabeled");
    where_arr
}

fn prefix_offsets(counts: &[usize], scope: &Scope<'_>) -> Vec<usize> {
    let mut offsets: Vec<usize> = scope.alloc_vec(counts.len() + 1);
    let mut running = 0usize;
    for (i, &c) in counts.iter().enumerate() {
        running += c;
        offsets[i + 1] = running;
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::messaging::execute;
    use crate::zorder::interleave;

    fn vtxdist(counts: &[usize]) -> Vec<usize> {
        let mut v = vec![0usize];
        for &c in counts {
            v.push(v.last().unwrap() + c);
        }
        v
    }

    #[test]
    fn strict_variant_sorts_and_balances_keys() {
        // 4 ranks, 8 keys each, globally distinct and already roughly
        // sorted per rank to mimic Z-order locality. Every rank must end
        // up with a label in range and the global label histogram
        // should roughly track the key ordering (low keys -> low ranks).
        let counts = vec![8usize; 4];
        let vd = vtxdist(&counts);
        let vd_clone = vd.clone();
        let results = execute(4, move |comm| {
            let rank = comm.rank();
            let base = (rank * 8) as i64 * 10;
            let keys: Vec<i64> = (0..8).map(|i| base + i as i64).collect();
            let cfg = PartitionConfig::default();
            let mut arena = Arena::new();
            let scope = arena.scope();
            distributed_sample_sort(&comm, &keys, &vd_clone, 0, SampleSortVariant::Strict, &cfg, false, &scope)
        })
        .unwrap();
        for where_arr in &results {
            assert_eq!(where_arr.len(), 8);
            for &label in where_arr {
                assert!((0..4).contains(&label));
            }
        }
        // Keys are globally ordered by originating rank (rank r's block
        // is entirely below rank r+1's), so the sorted labels should be
        // non-decreasing across ranks in aggregate: rank 0's max label
        // should not exceed rank 3's min label.
        let max0 = *results[0].iter().max().unwrap();
        let min3 = *results[3].iter().min().unwrap();
        assert!(max0 <= min3, "expected rank 0's labels <= rank 3's labels, got {max0} > {min3}");
        let _ = vd;
    }

    #[test]
    fn pseudo_variant_handles_small_graphs() {
        // P=3, nvtxs=5 per rank: exercises the nlsamples rescue path
        // (gnvtxs=15, so 100-floor is unreachable and nlsamples resets to
        // 5 + gnvtxs/(5P) = 6). Must complete without panicking.
        let counts = vec![5usize; 3];
        let vd = vtxdist(&counts);
        let vd_clone = vd.clone();
        let results = execute(3, move |comm| {
            let rank = comm.rank();
            let base = (rank * 5) as i64;
            let keys: Vec<i64> = (0..5).map(|i| base + i as i64).collect();
            let cfg = PartitionConfig::default();
            let mut arena = Arena::new();
            let scope = arena.scope();
            distributed_sample_sort(&comm, &keys, &vd_clone, 0, SampleSortVariant::Pseudo, &cfg, false, &scope)
        })
        .unwrap();
        for where_arr in &results {
            assert_eq!(where_arr.len(), 5);
            for &label in where_arr {
                assert!((0..3).contains(&label));
            }
        }
        let _ = vd;
    }

    #[test]
    fn every_vertex_is_labeled_exactly_once() {
        let counts = vec![20usize, 30usize, 10usize];
        let vd = vtxdist(&counts);
        let vd_clone = vd.clone();
        let counts_clone = counts.clone();
        let results = execute(3, move |comm| {
            let rank = comm.rank();
            let nvtxs = counts_clone[rank];
            let keys: Vec<i64> = (0..nvtxs)
                .map(|i| interleave(&[((rank * 37 + i * 13) % 512) as u32], 9))
                .collect();
            let cfg = PartitionConfig::default();
            let mut arena = Arena::new();
            let scope = arena.scope();
            distributed_sample_sort(&comm, &keys, &vd_clone, 4 * nvtxs, SampleSortVariant::Pseudo, &cfg, false, &scope)
        })
        .unwrap();
        for (rank, where_arr) in results.iter().enumerate() {
            assert_eq!(where_arr.len(), counts[rank]);
            assert!(where_arr.iter().all(|&l| (0..3).contains(&l)));
        }
    }

    #[test]
    fn single_rank_sort_assigns_every_vertex_to_rank_zero() {
        // npes == 1 drives nlsamples/npicks to 0; must short-circuit
        // rather than index an empty allpicks.
        let vd = vtxdist(&[6usize]);
        let results = execute(1, move |comm| {
            let keys: Vec<i64> = (0..6).map(|i| i as i64).collect();
            let cfg = PartitionConfig::default();
            let mut arena = Arena::new();
            let scope = arena.scope();
            distributed_sample_sort(&comm, &keys, &vd, 0, SampleSortVariant::Strict, &cfg, false, &scope)
        })
        .unwrap();
        assert_eq!(results[0], vec![0i32; 6]);
    }

    #[test]
    fn nlsamples_rescue_does_not_reapply_floor() {
        let cfg = PartitionConfig::default();
        // gnvtxs small enough to trigger the rescue, which is not
        // re-clamped to the 100-sample floor even though the rescue
        // value is far below it.
        let n = pseudo_nlsamples(0, 15, 3, &cfg);
        assert_eq!(n, 6);
    }
}
