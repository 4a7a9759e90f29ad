use multiapp_core::algs::rank_config::{RankConfig, SlotLayout, rank_config};
use multiapp_core::coupling_error::{CouplingError, ErrorKind};

#[test]
fn scenario_four_ranks_two_apps() {
    let cfgs: Vec<RankConfig> = (0..4)
        .map(|r| rank_config(r, 4, 2, 2, 2, false).unwrap())
        .collect();

    for r in 0..2 {
        assert_eq!(cfgs[r].num_local_apps, 1);
        assert_eq!(cfgs[r].first_local_app_index, 0);
    }
    for r in 2..4 {
        assert_eq!(cfgs[r].num_local_apps, 1);
        assert_eq!(cfgs[r].first_local_app_index, 1);
    }
    let firsts: Vec<bool> = cfgs.iter().map(|c| c.is_first_local_rank).collect();
    assert_eq!(firsts, vec![true, false, true, false]);
}

#[test]
fn one_app_takes_every_rank_up_to_max() {
    let layout = SlotLayout::new(8, 1, 1, 4).unwrap();
    assert_eq!(layout.num_slots(), 1);
    assert_eq!(layout.slot_ranks(0), Some(0..4));
    assert_eq!(layout.slot_of_rank(5), None);
    assert_eq!(rank_config(5, 8, 1, 1, 4, false).unwrap(), RankConfig::default());
}

#[test]
fn layout_lookups_agree_with_configs() {
    let layout = SlotLayout::new(6, 9, 2, 2).unwrap();
    assert_eq!(layout.num_slots(), 3);
    for rank in 0..6 {
        let cfg = layout.config_for(rank, false).unwrap();
        let slot = layout.slot_of_rank(rank).unwrap();
        assert_eq!(cfg.slot, Some(slot));
        assert_eq!(layout.slot_sims(slot), Some(cfg.sim_indices()));
        for sim in cfg.sim_indices() {
            assert_eq!(layout.slot_of_sim(sim), Some(slot));
        }
    }
}

#[test]
fn batch_mode_runs_sims_serially_per_slot() {
    // 2 slots of 1 rank each for 5 simulations: 3 + 2.
    let a = rank_config(0, 2, 5, 1, 1, true).unwrap();
    let b = rank_config(1, 2, 5, 1, 1, true).unwrap();
    assert_eq!((a.num_local_apps, a.first_local_app_index), (1, 0));
    assert_eq!((b.num_local_apps, b.first_local_app_index), (1, 1));
    assert_eq!(a.sim_indices(), 0..3);
    assert_eq!(b.sim_indices(), 3..5);
}

#[test]
fn partition_errors_are_configuration_errors() {
    let err = rank_config(0, 2, 4, 3, 3, false).unwrap_err();
    assert!(matches!(err, CouplingError::InvalidPartition(_)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(rank_config(0, 0, 4, 1, 1, false).is_err());
}
