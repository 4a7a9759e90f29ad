//! Thin façade over the process groups the coupling core runs on.
//!
//! Every rank executes the same control flow (SPMD). The operations exposed
//! here are the only collectives the core needs: splitting a parent group into
//! contiguous sub-groups, element-wise reductions (bounding boxes, success
//! flags) and barriers.
//!
//! Backends:
//! - [`NoComm`]: a single rank, for serial runs and unit tests.
//! - [`ThreadComm`]: one OS thread per simulated rank inside one process.
//! - `MpiComm` (feature `mpi-support`): the real MPI communicator.
//!
//! Sub-communicators are returned by value and freed when dropped, so each one
//! is released exactly once.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use thiserror::Error;

/// Errors raised by the communicator layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommError {
    /// Ranks contributed buffers of different lengths to a reduction.
    #[error("Reduction length mismatch: rank {rank} sent {found} values, expected {expected}")]
    ReductionLengthMismatch {
        rank: usize,
        expected: usize,
        found: usize,
    },
    /// A color or key does not fit the backend's integer type.
    #[error("Split argument {0} out of range for this backend")]
    SplitArgumentOutOfRange(usize),
    /// The calling rank was not found in its own split group.
    #[error("Rank {0} missing from its split group")]
    MissingFromGroup(usize),
}

/// Element-wise reduction applied by [`Communicator::all_reduce`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Min,
    Max,
    Sum,
}

impl ReduceOp {
    #[inline]
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
            ReduceOp::Sum => a + b,
        }
    }
}

/// Collective interface required by the coupling core.
pub trait Communicator: Sized {
    /// This rank's index in the group.
    fn rank(&self) -> usize;
    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Collective split: ranks sharing a `color` form one sub-group ordered by
    /// `(key, rank)`. Ranks passing `None` receive no sub-group.
    fn split(&self, color: Option<usize>, key: usize) -> Result<Option<Self>, CommError>;

    /// Collective element-wise reduction of `values` in place.
    fn all_reduce(&self, values: &mut [f64], op: ReduceOp) -> Result<(), CommError>;

    /// Block until every rank of the group arrives.
    fn barrier(&self);

    /// Terminate every rank of the run.
    fn abort(&self, code: i32) -> !;

    /// Collective logical AND of `flag`.
    fn all_and(&self, flag: bool) -> Result<bool, CommError> {
        let mut v = [if flag { 1.0 } else { 0.0 }];
        self.all_reduce(&mut v, ReduceOp::Min)?;
        Ok(v[0] > 0.5)
    }
}

/// Compile-time single-rank comm for serial runs.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn split(&self, color: Option<usize>, _key: usize) -> Result<Option<Self>, CommError> {
        Ok(color.map(|_| NoComm))
    }
    fn all_reduce(&self, _values: &mut [f64], _op: ReduceOp) -> Result<(), CommError> {
        Ok(())
    }
    fn barrier(&self) {}
    fn abort(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}

// --- ThreadComm: one thread per simulated rank ---

struct Group {
    size: usize,
    barrier: Barrier,
    reduce_slots: Mutex<Vec<Vec<f64>>>,
    split_slots: Mutex<Vec<Option<(usize, usize)>>>,
    children: Mutex<HashMap<usize, Arc<Group>>>,
}

impl Group {
    fn new(size: usize) -> Arc<Self> {
        Arc::new(Self {
            size,
            barrier: Barrier::new(size),
            reduce_slots: Mutex::new(vec![Vec::new(); size]),
            split_slots: Mutex::new(vec![None; size]),
            children: Mutex::new(HashMap::new()),
        })
    }
}

/// In-process communicator: each rank is driven by its own thread and all
/// collectives synchronize through a shared group state.
#[derive(Clone)]
pub struct ThreadComm {
    rank: usize,
    group: Arc<Group>,
}

impl std::fmt::Debug for ThreadComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadComm")
            .field("rank", &self.rank)
            .field("size", &self.group.size)
            .finish()
    }
}

impl ThreadComm {
    /// One handle per rank of a fresh world of `size` ranks.
    pub fn world(size: usize) -> Vec<ThreadComm> {
        let group = Group::new(size);
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                group: Arc::clone(&group),
            })
            .collect()
    }

    /// Run `f` on `size` ranks concurrently and collect the per-rank results
    /// in rank order.
    ///
    /// `f` must not panic between collectives; a panicking rank leaves its
    /// peers waiting at the next barrier.
    pub fn run<F, R>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = ThreadComm::world(size)
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(payload) => std::panic::resume_unwind(payload),
                })
                .collect()
        })
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size
    }

    fn split(&self, color: Option<usize>, key: usize) -> Result<Option<Self>, CommError> {
        self.group.split_slots.lock()[self.rank] = color.map(|c| (c, key));
        self.group.barrier.wait();

        let entries = self.group.split_slots.lock().clone();
        let result = match color {
            Some(c) => {
                let mut members: Vec<(usize, usize)> = entries
                    .iter()
                    .enumerate()
                    .filter_map(|(r, e)| match e {
                        Some((cc, k)) if *cc == c => Some((*k, r)),
                        _ => None,
                    })
                    .collect();
                members.sort_unstable();
                match members.iter().position(|&(_, r)| r == self.rank) {
                    Some(new_rank) => {
                        let child = Arc::clone(
                            self.group
                                .children
                                .lock()
                                .entry(c)
                                .or_insert_with(|| Group::new(members.len())),
                        );
                        Ok(Some(ThreadComm {
                            rank: new_rank,
                            group: child,
                        }))
                    }
                    None => Err(CommError::MissingFromGroup(self.rank)),
                }
            }
            None => Ok(None),
        };

        self.group.barrier.wait();
        // The next split inserts only after its first barrier, which rank 0
        // cannot reach before this clear.
        if self.rank == 0 {
            self.group.children.lock().clear();
        }
        result
    }

    fn all_reduce(&self, values: &mut [f64], op: ReduceOp) -> Result<(), CommError> {
        self.group.reduce_slots.lock()[self.rank] = values.to_vec();
        self.group.barrier.wait();

        let outcome = {
            let slots = self.group.reduce_slots.lock();
            let mut acc = slots[0].clone();
            let mut outcome = Ok(());
            for (rank, slot) in slots.iter().enumerate().skip(1) {
                if slot.len() != acc.len() {
                    outcome = Err(CommError::ReductionLengthMismatch {
                        rank,
                        expected: acc.len(),
                        found: slot.len(),
                    });
                    break;
                }
                for (a, b) in acc.iter_mut().zip(slot) {
                    *a = op.apply(*a, *b);
                }
            }
            outcome.map(|_| acc)
        };

        self.group.barrier.wait();
        let acc = outcome?;
        if acc.len() != values.len() {
            return Err(CommError::ReductionLengthMismatch {
                rank: self.rank,
                expected: acc.len(),
                found: values.len(),
            });
        }
        values.copy_from_slice(&acc);
        Ok(())
    }

    fn barrier(&self) {
        self.group.barrier.wait();
    }

    fn abort(&self, code: i32) -> ! {
        panic!("rank {} aborted the run with code {code}", self.rank)
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::topology::{Color, SimpleCommunicator};
    use mpi::traits::*;

    /// MPI communicator; dropping it frees the underlying `MPI_Comm`.
    pub struct MpiComm {
        comm: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Wrap an existing communicator (e.g. `universe.world()`).
        pub fn new(comm: SimpleCommunicator) -> Self {
            let rank = comm.rank() as usize;
            let size = comm.size() as usize;
            Self { comm, rank, size }
        }

        /// The wrapped communicator, for handing to physics engines.
        pub fn raw(&self) -> &SimpleCommunicator {
            &self.comm
        }
    }

    fn to_i32(v: usize) -> Result<i32, CommError> {
        i32::try_from(v).map_err(|_| CommError::SplitArgumentOutOfRange(v))
    }

    impl super::Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn split(&self, color: Option<usize>, key: usize) -> Result<Option<Self>, CommError> {
            let color = match color {
                Some(c) => Color::with_value(to_i32(c)?),
                None => Color::undefined(),
            };
            let key = to_i32(key)?;
            Ok(self
                .comm
                .split_by_color_with_key(color, key)
                .map(MpiComm::new))
        }

        fn all_reduce(&self, values: &mut [f64], op: ReduceOp) -> Result<(), CommError> {
            let send = values.to_vec();
            let op = match op {
                ReduceOp::Min => SystemOperation::min(),
                ReduceOp::Max => SystemOperation::max(),
                ReduceOp::Sum => SystemOperation::sum(),
            };
            self.comm.all_reduce_into(&send[..], values, op);
            Ok(())
        }

        fn barrier(&self) {
            self.comm.barrier();
        }

        fn abort(&self, code: i32) -> ! {
            self.comm.abort(code)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
