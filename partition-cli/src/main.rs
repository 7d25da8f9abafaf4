use std::path::PathBuf;

use clap::Parser;
use partition_core::bin_boundary::BinStrategy;
use partition_core::sample_sort::SampleSortVariant;
use partition_core::{coordinate_partition, execute, Ctrl, Graph, PartitionConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Drive the coordinate partitioner over synthetic, uniformly random
/// vertex coordinates, simulating `--ranks` ranks as threads in this
/// one process.
#[derive(Debug, Parser)]
struct Args {
    /// Number of simulated ranks.
    #[arg(long, default_value_t = 4)]
    ranks: usize,

    /// Vertices per rank.
    #[arg(long, default_value_t = 1000)]
    nvtxs: usize,

    /// Coordinate dimensionality, 2 or 3.
    #[arg(long, default_value_t = 3)]
    ndims: usize,

    /// RNG seed for the synthetic coordinates.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Path to a TOML file overriding the default `PartitionConfig`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use recursive bisection instead of the default iterative
    /// histogram refiner.
    #[arg(long)]
    recursive_bisection: bool,

    /// Use the adaptive `PseudoSampleSort` variant instead of the
    /// strict `SampleSort`.
    #[arg(long)]
    pseudo_sample_sort: bool,

    /// Dump per-iteration histogram distributions and nlsamples at
    /// `trace!` level (requires `RUST_LOG=trace`).
    #[arg(long)]
    verbose: bool,
}

fn load_config(path: Option<&PathBuf>) -> PartitionConfig {
    match path {
        None => PartitionConfig::default(),
        Some(path) => {
            let text = std::fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
            toml::from_str(&text).unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    assert!(args.ndims == 2 || args.ndims == 3, "--ndims must be 2 or 3, got {}", args.ndims);

    let config = load_config(args.config.as_ref());
    config.validate();

    let bin_strategy = if args.recursive_bisection { BinStrategy::RecursiveBisection } else { BinStrategy::IterativeHistogram };
    let sample_variant = if args.pseudo_sample_sort { SampleSortVariant::Pseudo } else { SampleSortVariant::Strict };

    let vtxdist: Vec<usize> = (0..=args.ranks).map(|r| r * args.nvtxs).collect();
    let ndims = args.ndims;
    let nvtxs = args.nvtxs;
    let seed = args.seed;

    log::info!("partitioning {} vertices across {} ranks ({}D coordinates)", nvtxs * args.ranks, args.ranks, ndims);

    let started = std::time::Instant::now();
    let results = execute(args.ranks, move |comm| {
        let rank = comm.rank();
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(rank as u64));
        let xyz: Vec<f64> = (0..nvtxs * ndims).map(|_| rng.gen_range(0.0..1.0)).collect();

        let mut ctrl = Ctrl::new(&comm);
        ctrl.debug = args.verbose;
        let mut graph = Graph::new(vtxdist.clone(), rank, nvtxs * ndims);
        coordinate_partition(&mut ctrl, &mut graph, ndims, &xyz, true, &config, bin_strategy, sample_variant)
            .unwrap_or_else(|e| panic!("rank {rank}: coordinate_partition failed: {e}"));
        graph.where_
    })
    .expect("messaging substrate failed to start");

    let mut counts = vec![0u64; args.ranks];
    for where_arr in &results {
        for &label in where_arr {
            counts[label as usize] += 1;
        }
    }
    log::info!("partition finished in {:?}; destination counts: {:?}", started.elapsed(), counts);
}
