//! The messaging substrate: a thin abstraction over a bulk-synchronous
//! message-passing fabric, providing collectives (all-reduce, all-gather,
//! all-to-all, prefix-scan) and non-blocking point-to-point exchange with
//! a wait-all barrier.
//!
//! [`Communicator`] is the seam a real deployment would swap an MPI- or
//! UCX-backed implementation in behind; [`ProcessCommunicator`] is the
//! in-process, thread-per-rank realization used by this workspace and by
//! its tests, modeled on the way `timely::execute`'s `Process` allocator
//! runs every worker as a thread inside one OS process and hands each a
//! communication handle scoped to that worker's index.
//!
//! `Ikv` — a `(key, val)` record pair, always `i64` — is the only payload
//! type the substrate moves point-to-point or through `all_gather`; it is
//! wide enough to hold Z-order keys up to `d * log2(N)` bits and signed
//! vertex ids alike (see `spec.md` §3).

use std::any::Any;
use std::sync::{Arc, Barrier, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::PartitionError;

/// A `(key, val)` record pair, as carried by point-to-point exchanges and
/// `all_gather`.
pub type Ikv = (i64, i64);

/// Collectives and point-to-point exchange needed by the partitioner.
///
/// Every method here is a blocking, bulk-synchronous operation: every
/// rank must call it, in the same order, or the job deadlocks (`spec.md`
/// §5). None of them retry or time out — a messaging failure is fatal and
/// propagates as a panic or a [`PartitionError::Messaging`] at
/// construction time, never as a value a caller can route around
/// mid-collective.
pub trait Communicator: Send + Sync {
    /// This rank's index in `0..peers()`.
    fn rank(&self) -> usize;

    /// The total number of ranks, `P`.
    fn peers(&self) -> usize;

    /// All-reduce with `MIN`.
    fn all_reduce_min(&self, value: f64) -> f64;

    /// All-reduce with `MAX`.
    fn all_reduce_max(&self, value: f64) -> f64;

    /// All-reduce with `SUM` over a single `u64`.
    fn all_reduce_sum_u64(&self, value: u64) -> u64;

    /// Elementwise all-reduce with `SUM` over a vector of counts (used
    /// for per-bin histogram counts, one call per refinement iteration).
    fn all_reduce_sum_counts(&self, values: &[u64]) -> Vec<u64>;

    /// All-gather: every rank's `local` slice, concatenated in rank
    /// order.
    fn all_gather_records(&self, local: &[Ikv]) -> Vec<Ikv>;

    /// All-to-all with one count per destination rank (`scounts` in,
    /// `rcounts` out): rank `r`'s `send_counts[i]` is delivered as the
    /// `r`-th entry of the returned vector on rank `i`.
    fn all_to_all_counts(&self, send_counts: &[usize]) -> Vec<usize>;

    /// Inclusive prefix sum: returns the sum of `value` over ranks
    /// `0..=self.rank()`.
    fn scan_sum(&self, value: usize) -> usize;

    /// Point-to-point exchange: `send[i]` is delivered to rank `i`, and
    /// the returned vector's `i`-th entry is what rank `i` sent here.
    /// Receives are logically posted before sends (`spec.md` §5) so the
    /// substrate never needs unbounded buffering; with the channel-based
    /// `ProcessCommunicator` every channel is already unbounded, so this
    /// ordering is enforced for documentation fidelity rather than
    /// necessity.
    fn exchange(&self, send: Vec<Vec<Ikv>>) -> Vec<Vec<Ikv>>;
}

/// Shared state for one in-process run: a `peers x peers` matrix of
/// unbounded channels for point-to-point exchange, plus a pair of
/// type-erased rendezvous slots (guarded by a reusable [`Barrier`]) for
/// collectives.
struct Fabric {
    peers: usize,
    channels: Vec<Vec<(Sender<Vec<Ikv>>, Receiver<Vec<Ikv>>)>>,
    collective_slots: Mutex<Vec<Option<Box<dyn Any + Send>>>>,
    arrive: Barrier,
    depart: Barrier,
}

impl Fabric {
    fn new(peers: usize) -> Self {
        let mut channels = Vec::with_capacity(peers);
        for _src in 0..peers {
            let mut row = Vec::with_capacity(peers);
            for _dst in 0..peers {
                row.push(unbounded());
            }
            channels.push(row);
        }
        Fabric {
            peers,
            channels,
            collective_slots: Mutex::new((0..peers).map(|_| None).collect()),
            arrive: Barrier::new(peers),
            depart: Barrier::new(peers),
        }
    }

    /// Generic rendezvous: every rank deposits `value` into its slot,
    /// waits for every other rank to do the same, reads the full set of
    /// contributions, then waits again before the slots are reused by
    /// the next collective call.
    fn rendezvous<T, R>(&self, rank: usize, value: T, read: impl FnOnce(&[Option<Box<dyn Any + Send>>]) -> R) -> R
    where
        T: Send + 'static,
    {
        {
            let mut slots = self.collective_slots.lock().expect("collective slot mutex poisoned");
            slots[rank] = Some(Box::new(value));
        }
        self.arrive.wait();
        let result = {
            let slots = self.collective_slots.lock().expect("collective slot mutex poisoned");
            read(&slots)
        };
        self.depart.wait();
        result
    }
}

/// The in-process, thread-per-rank [`Communicator`] implementation.
pub struct ProcessCommunicator {
    rank: usize,
    fabric: Arc<Fabric>,
}

impl ProcessCommunicator {
    fn downcast_all<T: Clone + 'static>(slots: &[Option<Box<dyn Any + Send>>], peers: usize) -> Vec<T> {
        (0..peers)
            .map(|i| {
                slots[i]
                    .as_ref()
                    .expect("collective slot missing a contribution after the arrival barrier")
                    .downcast_ref::<T>()
                    .expect("collective slot type mismatch across ranks")
                    .clone()
            })
            .collect()
    }
}

impl Communicator for ProcessCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn peers(&self) -> usize {
        self.fabric.peers
    }

    fn all_reduce_min(&self, value: f64) -> f64 {
        let peers = self.fabric.peers;
        self.fabric.rendezvous(self.rank, value, move |slots| {
            Self::downcast_all::<f64>(slots, peers)
                .into_iter()
                .fold(f64::INFINITY, f64::min)
        })
    }

    fn all_reduce_max(&self, value: f64) -> f64 {
        let peers = self.fabric.peers;
        self.fabric.rendezvous(self.rank, value, move |slots| {
            Self::downcast_all::<f64>(slots, peers)
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max)
        })
    }

    fn all_reduce_sum_u64(&self, value: u64) -> u64 {
        let peers = self.fabric.peers;
        self.fabric.rendezvous(self.rank, value, move |slots| {
            Self::downcast_all::<u64>(slots, peers).into_iter().sum()
        })
    }

    fn all_reduce_sum_counts(&self, values: &[u64]) -> Vec<u64> {
        let peers = self.fabric.peers;
        let local = values.to_vec();
        self.fabric.rendezvous(self.rank, local, move |slots| {
            let contributions = Self::downcast_all::<Vec<u64>>(slots, peers);
            let width = contributions[0].len();
            let mut totals = vec![0u64; width];
            for contribution in &contributions {
                for (total, count) in totals.iter_mut().zip(contribution.iter()) {
                    *total += count;
                }
            }
            totals
        })
    }

    fn all_gather_records(&self, local: &[Ikv]) -> Vec<Ikv> {
        let peers = self.fabric.peers;
        let local = local.to_vec();
        self.fabric.rendezvous(self.rank, local, move |slots| {
            Self::downcast_all::<Vec<Ikv>>(slots, peers).into_iter().flatten().collect()
        })
    }

    fn all_to_all_counts(&self, send_counts: &[usize]) -> Vec<usize> {
        let peers = self.fabric.peers;
        assert_eq!(send_counts.len(), peers, "all_to_all_counts needs one count per rank");
        let local = send_counts.to_vec();
        let rank = self.rank;
        self.fabric.rendezvous(self.rank, local, move |slots| {
            let rows = Self::downcast_all::<Vec<usize>>(slots, peers);
            (0..peers).map(|src| rows[src][rank]).collect()
        })
    }

    fn scan_sum(&self, value: usize) -> usize {
        let peers = self.fabric.peers;
        let rank = self.rank;
        self.fabric.rendezvous(self.rank, value, move |slots| {
            Self::downcast_all::<usize>(slots, peers).into_iter().take(rank + 1).sum()
        })
    }

    fn exchange(&self, send: Vec<Vec<Ikv>>) -> Vec<Vec<Ikv>> {
        assert_eq!(send.len(), self.fabric.peers, "exchange needs one payload per rank");
        log::trace!("rank {}: exchange posting {} sends", self.rank, self.fabric.peers);
        for (dst, payload) in send.into_iter().enumerate() {
            self.fabric.channels[self.rank][dst]
                .0
                .send(payload)
                .expect("exchange: peer channel disconnected before send");
        }
        (0..self.fabric.peers)
            .map(|src| {
                self.fabric.channels[src][self.rank]
                    .1
                    .recv()
                    .expect("exchange: peer channel disconnected before receive")
            })
            .collect()
    }
}

/// Spawn `n_ranks` OS threads, each running `body` with a
/// [`ProcessCommunicator`] scoped to its rank, and block until every
/// thread returns. `body`'s return value from every rank is collected in
/// rank order.
///
/// This mirrors `timely::execute`: a single process hosts every "rank" as
/// a thread rather than a separate OS process, trading true process
/// isolation for a substrate that needs no cluster launcher to test.
pub fn execute<F, T>(n_ranks: usize, body: F) -> Result<Vec<T>, PartitionError>
where
    F: Fn(ProcessCommunicator) -> T + Send + Sync + 'static,
    T: Send + 'static,
{
    if n_ranks == 0 {
        return Err(PartitionError::SubstrateSetup("n_ranks must be >= 1".to_string()));
    }

    let fabric = Arc::new(Fabric::new(n_ranks));
    let body = Arc::new(body);

    let handles: Vec<_> = (0..n_ranks)
        .map(|rank| {
            let fabric = Arc::clone(&fabric);
            let body = Arc::clone(&body);
            std::thread::Builder::new()
                .name(format!("rank-{rank}"))
                .spawn(move || body(ProcessCommunicator { rank, fabric }))
                .map_err(|e| PartitionError::SubstrateSetup(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    handles
        .into_iter()
        .enumerate()
        .map(|(rank, handle)| {
            handle.join().map_err(|_| {
                PartitionError::Messaging { rank, detail: "worker thread panicked".to_string() }
            })
        })
        .collect()
}
