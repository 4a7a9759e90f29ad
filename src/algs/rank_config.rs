//! Partition of ranks into sub-app slots.
//!
//! A *slot* is a contiguous group of ranks that cooperates to run one sub-app
//! at a time. [`rank_config`] is a pure function of its inputs: every rank
//! computes the identical global layout independently, so no communication is
//! needed to agree on the partition shape.
//!
//! Layout rules:
//! - `slot_size = max(min(nprocs / napps, max_app_procs), min_app_procs)`
//! - `nslots = min(nprocs / slot_size, napps)`
//! - the `nprocs - nslots * slot_size` leftover ranks extend the first slots by
//!   one rank each, as long as that does not exceed `max_app_procs`; ranks
//!   still left over after that belong to no slot and run nothing.
//! - apps are spread `napps / nslots` per slot, the first `napps % nslots`
//!   slots taking one extra, in contiguous global index ranges.

use crate::coupling_error::CouplingError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Per-rank view of the global partition.
///
/// In non-batch mode `num_local_apps == num_local_sims`: the rank hosts one
/// instance per simulation. In batch mode the slot hosts a single instance
/// (`num_local_apps == 1`, `first_local_app_index == slot`) and runs its
/// `num_local_sims` simulations through it serially.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankConfig {
    pub num_local_sims: usize,
    pub first_local_sim_index: usize,
    pub num_local_apps: usize,
    pub first_local_app_index: usize,
    pub is_first_local_rank: bool,
    /// Slot this rank belongs to, `None` for leftover ranks.
    pub slot: Option<usize>,
}

impl RankConfig {
    /// Global simulation indices run by this rank's slot.
    pub fn sim_indices(&self) -> Range<usize> {
        self.first_local_sim_index..self.first_local_sim_index + self.num_local_sims
    }

    /// Global app indices instantiated on this rank.
    pub fn app_indices(&self) -> Range<usize> {
        self.first_local_app_index..self.first_local_app_index + self.num_local_apps
    }

    /// Whether this rank belongs to a slot at all.
    pub fn has_slot(&self) -> bool {
        self.slot.is_some()
    }
}

static_assertions::assert_impl_all!(RankConfig: Send, Sync, Copy);

/// Global shape of a partition: rank range and simulation range per slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotLayout {
    nprocs: usize,
    ranks: Vec<Range<usize>>,
    sims: Vec<Range<usize>>,
}

impl SlotLayout {
    /// Compute the layout for `napps` simulations on `nprocs` ranks.
    pub fn new(
        nprocs: usize,
        napps: usize,
        min_app_procs: usize,
        max_app_procs: usize,
    ) -> Result<Self, CouplingError> {
        validate_bounds(nprocs, min_app_procs, max_app_procs)?;
        if napps == 0 {
            return Ok(Self {
                nprocs,
                ranks: Vec::new(),
                sims: Vec::new(),
            });
        }

        let slot_size = (nprocs / napps).min(max_app_procs).max(min_app_procs);
        let nslots = (nprocs / slot_size).min(napps);
        let leftover_procs = nprocs - nslots * slot_size;
        let apps_per_slot = napps / nslots;
        let leftover_apps = napps % nslots;

        let mut ranks = Vec::with_capacity(nslots);
        let mut sims = Vec::with_capacity(nslots);
        let mut next_rank = 0;
        let mut next_sim = 0;
        for slot in 0..nslots {
            let extra = usize::from(slot < leftover_procs && slot_size < max_app_procs);
            let width = slot_size + extra;
            ranks.push(next_rank..next_rank + width);
            next_rank += width;

            let count = apps_per_slot + usize::from(slot < leftover_apps);
            sims.push(next_sim..next_sim + count);
            next_sim += count;
        }
        debug_assert!(next_rank <= nprocs);
        debug_assert_eq!(next_sim, napps);

        if next_rank < nprocs {
            log::debug!(
                "rank partition leaves {} of {nprocs} ranks without a slot",
                nprocs - next_rank
            );
        }

        Ok(Self {
            nprocs,
            ranks,
            sims,
        })
    }

    /// Number of slots.
    pub fn num_slots(&self) -> usize {
        self.ranks.len()
    }

    /// Rank range of `slot`.
    pub fn slot_ranks(&self, slot: usize) -> Option<Range<usize>> {
        self.ranks.get(slot).cloned()
    }

    /// Simulation range of `slot`.
    pub fn slot_sims(&self, slot: usize) -> Option<Range<usize>> {
        self.sims.get(slot).cloned()
    }

    /// Slot containing `rank`, if any.
    pub fn slot_of_rank(&self, rank: usize) -> Option<usize> {
        self.ranks.iter().position(|r| r.contains(&rank))
    }

    /// Slot running global simulation `sim`, if any.
    pub fn slot_of_sim(&self, sim: usize) -> Option<usize> {
        self.sims.iter().position(|r| r.contains(&sim))
    }

    /// The view of this layout from `rank`.
    pub fn config_for(&self, rank: usize, batch_mode: bool) -> Result<RankConfig, CouplingError> {
        if rank >= self.nprocs {
            return Err(CouplingError::InvalidPartition(format!(
                "rank {rank} is outside the {} available ranks",
                self.nprocs
            )));
        }
        let Some(slot) = self.slot_of_rank(rank) else {
            return Ok(RankConfig::default());
        };
        let sims = self.sims[slot].clone();
        let is_first_local_rank = self.ranks[slot].start == rank;
        let config = if batch_mode {
            RankConfig {
                num_local_sims: sims.len(),
                first_local_sim_index: sims.start,
                num_local_apps: 1,
                first_local_app_index: slot,
                is_first_local_rank,
                slot: Some(slot),
            }
        } else {
            RankConfig {
                num_local_sims: sims.len(),
                first_local_sim_index: sims.start,
                num_local_apps: sims.len(),
                first_local_app_index: sims.start,
                is_first_local_rank,
                slot: Some(slot),
            }
        };
        Ok(config)
    }
}

fn validate_bounds(
    nprocs: usize,
    min_app_procs: usize,
    max_app_procs: usize,
) -> Result<(), CouplingError> {
    if nprocs == 0 {
        return Err(CouplingError::InvalidPartition("no ranks available".into()));
    }
    if min_app_procs == 0 {
        return Err(CouplingError::InvalidPartition(
            "minimum number of ranks per app must be at least 1".into(),
        ));
    }
    if max_app_procs < min_app_procs {
        return Err(CouplingError::InvalidPartition(format!(
            "minimum ranks per app ({min_app_procs}) exceeds the maximum ({max_app_procs})"
        )));
    }
    if nprocs < min_app_procs {
        return Err(CouplingError::InvalidPartition(format!(
            "minimum ranks per app ({min_app_procs}) exceeds the available ranks ({nprocs})"
        )));
    }
    Ok(())
}

/// Compute `rank`'s share of `napps` simulations run on `nprocs` ranks in
/// slots of `[min_app_procs, max_app_procs]` contiguous ranks.
pub fn rank_config(
    rank: usize,
    nprocs: usize,
    napps: usize,
    min_app_procs: usize,
    max_app_procs: usize,
    batch_mode: bool,
) -> Result<RankConfig, CouplingError> {
    SlotLayout::new(nprocs, napps, min_app_procs, max_app_procs)?.config_for(rank, batch_mode)
}
