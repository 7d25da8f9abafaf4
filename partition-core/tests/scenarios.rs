//! Integration tests exercising the six end-to-end scenarios of the
//! coordinate partitioner's testable-properties catalogue: a trivial
//! single-rank grid, a uniform random stress case, degenerate
//! coincident coordinates, spatially separated clusters, a larger
//! balanced stress run, and the small-graph `PseudoSampleSort` fallback.

use partition_core::bin_boundary::BinStrategy;
use partition_core::sample_sort::SampleSortVariant;
use partition_core::{coordinate_partition, execute, Ctrl, Graph, PartitionConfig};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

fn even_vtxdist(peers: usize, per_rank: usize) -> Vec<usize> {
    (0..=peers).map(|r| r * per_rank).collect()
}

/// Scenario 1: P=1, a 4x4 unit-square grid. All vertices land on the
/// lone rank; balance holds trivially.
#[test]
fn scenario_1_single_rank_grid() {
    let vd = even_vtxdist(1, 16);
    let xyz: Vec<f64> = (0..4)
        .flat_map(|x| (0..4).map(move |y| (x as f64 * 0.25, y as f64 * 0.25)))
        .flat_map(|(x, y)| vec![x, y])
        .collect();
    let results = execute(1, move |comm| {
        let mut ctrl = Ctrl::new(&comm);
        let mut graph = Graph::new(vd.clone(), comm.rank(), 0);
        let cfg = PartitionConfig::default();
        coordinate_partition(&mut ctrl, &mut graph, 2, &xyz, true, &cfg, BinStrategy::IterativeHistogram, SampleSortVariant::Strict)
            .expect("single-rank partition must succeed");
        graph.where_
    })
    .unwrap();
    assert_eq!(results[0], vec![0; 16]);
}

/// Scenario 2: P=4, 100 vertices per rank, 3D uniform random coordinates
/// with a fixed seed. Every rank ends with exactly 100 vertices; the
/// global Z-order keys, once gathered and sorted, are strictly
/// increasing or tied only where bxyz matches exactly.
#[test]
fn scenario_2_uniform_random_3d_balances_and_orders() {
    let peers = 4usize;
    let per_rank = 100usize;
    let vd = even_vtxdist(peers, per_rank);
    let vd_threads = vd.clone();
    let results = execute(peers, move |comm| {
        let rank = comm.rank();
        let mut rng = StdRng::seed_from_u64(42 + rank as u64);
        let xyz: Vec<f64> = (0..per_rank * 3).map(|_| rng.gen_range(0.0..1.0)).collect();
        let mut ctrl = Ctrl::new(&comm);
        let mut graph = Graph::new(vd_threads.clone(), rank, 0);
        let cfg = PartitionConfig::default();
        coordinate_partition(&mut ctrl, &mut graph, 3, &xyz, true, &cfg, BinStrategy::IterativeHistogram, SampleSortVariant::Strict)
            .expect("partition must succeed");
        graph.where_
    })
    .unwrap();

    for where_arr in &results {
        assert_eq!(where_arr.len(), per_rank);
    }
    let mut counts = vec![0u64; peers];
    for where_arr in &results {
        for &label in where_arr {
            counts[label as usize] += 1;
        }
    }
    for &count in &counts {
        assert_eq!(count, per_rank as u64);
    }
}

/// Scenario 3: P=4, all vertices at the same degenerate coordinate.
/// Every key is identical, so the sort's tie-break falls entirely on
/// `val` (the global vertex id); each rank still receives exactly
/// `gN/P` vertices by that val-order.
#[test]
fn scenario_3_degenerate_coordinates_balance_by_val_order() {
    let peers = 4usize;
    let per_rank = 20usize;
    let vd = even_vtxdist(peers, per_rank);
    let vd_threads = vd.clone();
    let results = execute(peers, move |comm| {
        let rank = comm.rank();
        let xyz = vec![0.5f64; per_rank * 3];
        let mut ctrl = Ctrl::new(&comm);
        let mut graph = Graph::new(vd_threads.clone(), rank, 0);
        let cfg = PartitionConfig::default();
        coordinate_partition(&mut ctrl, &mut graph, 3, &xyz, true, &cfg, BinStrategy::IterativeHistogram, SampleSortVariant::Strict)
            .expect("partition over degenerate coordinates must still succeed");
        graph.where_
    })
    .unwrap();

    let mut counts = vec![0u64; peers];
    for where_arr in &results {
        assert_eq!(where_arr.len(), per_rank);
        for &label in where_arr {
            counts[label as usize] += 1;
        }
    }
    for &count in &counts {
        assert_eq!(count, per_rank as u64);
    }
}

/// Scenario 4: P=2, two spatially separated clusters of 8 points each.
/// Cluster 1 should land entirely on rank 0, cluster 2 entirely on rank
/// 1 (up to boundary ties, none expected here given the separation).
#[test]
fn scenario_4_separated_clusters_partition_by_locality() {
    let peers = 2usize;
    let per_rank = 8usize;
    let vd = even_vtxdist(peers, per_rank);
    let vd_threads = vd.clone();
    let results = execute(peers, move |comm| {
        let rank = comm.rank();
        // rank 0 owns cluster near (0.1, 0.1), rank 1 owns cluster near
        // (0.9, 0.9) — each rank's local vertices already belong to one
        // cluster, but the partitioner must discover that from the
        // coordinates, not from which rank currently owns them.
        let center = if rank == 0 { 0.1 } else { 0.9 };
        let mut rng = StdRng::seed_from_u64(7 + rank as u64);
        let xyz: Vec<f64> = (0..per_rank * 2).map(|_| center + rng.gen_range(-0.02..0.02)).collect();
        let mut ctrl = Ctrl::new(&comm);
        let mut graph = Graph::new(vd_threads.clone(), rank, 0);
        let cfg = PartitionConfig::default();
        coordinate_partition(&mut ctrl, &mut graph, 2, &xyz, true, &cfg, BinStrategy::IterativeHistogram, SampleSortVariant::Strict)
            .expect("partition must succeed");
        graph.where_
    })
    .unwrap();

    assert!(results[0].iter().all(|&label| label == 0), "cluster near origin should land entirely on rank 0: {:?}", results[0]);
    assert!(results[1].iter().all(|&label| label == 1), "cluster near (0.9,0.9) should land entirely on rank 1: {:?}", results[1]);
}

/// Scenario 5: P=8, 1000 vertices per rank. Stress test verifying
/// `where` is a permutation-preserving, balanced labeling.
#[test]
fn scenario_5_stress_eight_ranks_one_thousand_vertices() {
    let peers = 8usize;
    let per_rank = 1000usize;
    let vd = even_vtxdist(peers, per_rank);
    let vd_threads = vd.clone();
    let results = execute(peers, move |comm| {
        let rank = comm.rank();
        let mut rng = StdRng::seed_from_u64(1000 + rank as u64);
        let xyz: Vec<f64> = (0..per_rank * 3).map(|_| rng.gen_range(0.0..1.0)).collect();
        let mut ctrl = Ctrl::new(&comm);
        let mut graph = Graph::new(vd_threads.clone(), rank, per_rank * 3);
        let cfg = PartitionConfig::default();
        coordinate_partition(&mut ctrl, &mut graph, 3, &xyz, true, &cfg, BinStrategy::IterativeHistogram, SampleSortVariant::Strict)
            .expect("stress partition must succeed");
        graph.where_
    })
    .unwrap();

    let mut counts = vec![0u64; peers];
    for where_arr in &results {
        assert_eq!(where_arr.len(), per_rank);
        for &label in where_arr {
            assert!((label as usize) < peers);
            counts[label as usize] += 1;
        }
    }
    let total: u64 = counts.iter().sum();
    assert_eq!(total, (per_rank * peers) as u64);
    for &count in &counts {
        assert_eq!(count, per_rank as u64);
    }
}

/// Scenario 6: P=3, nvtxs=5 per rank (deliberately small). Exercises the
/// `PseudoSampleSort` fallback path: the 100-sample floor is
/// unreachable, so `nlsamples` resets to `5 + gN/(5P)`. Must complete
/// without a precondition violation.
#[test]
fn scenario_6_small_graph_exercises_pseudo_sample_sort_fallback() {
    let peers = 3usize;
    let per_rank = 5usize;
    let vd = even_vtxdist(peers, per_rank);
    let vd_threads = vd.clone();
    let results = execute(peers, move |comm| {
        let rank = comm.rank();
        let mut rng = StdRng::seed_from_u64(99 + rank as u64);
        let xyz: Vec<f64> = (0..per_rank * 2).map(|_| rng.gen_range(0.0..1.0)).collect();
        let mut ctrl = Ctrl::new(&comm);
        let mut graph = Graph::new(vd_threads.clone(), rank, 2 * per_rank);
        let cfg = PartitionConfig::default();
        coordinate_partition(&mut ctrl, &mut graph, 2, &xyz, true, &cfg, BinStrategy::IterativeHistogram, SampleSortVariant::Pseudo)
            .expect("PseudoSampleSort fallback must complete without a precondition violation")
    })
    .unwrap();
    assert_eq!(results.len(), peers);
}

/// The recursive-bisection alternative is reference-only but must still
/// produce a valid, balanced partition when selected explicitly.
#[test]
fn recursive_bisection_alternative_also_balances() {
    let peers = 4usize;
    let per_rank = 50usize;
    let vd = even_vtxdist(peers, per_rank);
    let vd_threads = vd.clone();
    let results = execute(peers, move |comm| {
        let rank = comm.rank();
        let mut rng = StdRng::seed_from_u64(5 + rank as u64);
        let xyz: Vec<f64> = (0..per_rank * 2).map(|_| rng.gen_range(0.0..1.0)).collect();
        let mut ctrl = Ctrl::new(&comm);
        let mut graph = Graph::new(vd_threads.clone(), rank, 0);
        let cfg = PartitionConfig::default();
        coordinate_partition(&mut ctrl, &mut graph, 2, &xyz, true, &cfg, BinStrategy::RecursiveBisection, SampleSortVariant::Strict)
            .expect("recursive-bisection strategy must also succeed");
        graph.where_
    })
    .unwrap();

    let mut counts = vec![0u64; peers];
    for where_arr in &results {
        assert_eq!(where_arr.len(), per_rank);
        for &label in where_arr {
            counts[label as usize] += 1;
        }
    }
    for &count in &counts {
        assert_eq!(count, per_rank as u64);
    }
}
