use simulator::{CampaignConfig, CouplingRange, InitialState, SweepCampaign, SweepSchedule};

fn quick_sweeps() -> SweepSchedule {
    SweepSchedule {
        nsweeps: 5,
        max_bond: vec![10, 20, 30],
        cutoff: vec![1e-12],
        noise: vec![1e-6, 1e-8, 0.0],
        niter: vec![3],
    }
}

fn z2_config() -> CampaignConfig {
    CampaignConfig {
        order: 2,
        lengths: vec![10],
        couplings: CouplingRange::Linspace {
            start: 0.0,
            stop: 2.0,
            points: 5,
        },
        sectors: Some(vec![0]),
        sweeps: quick_sweeps(),
        seed: "campaign-test".to_string(),
        ..CampaignConfig::default()
    }
}

#[test]
fn z2_sector_zero_fills_every_row() {
    let campaign = SweepCampaign::new(z2_config()).unwrap();
    let run = campaign.run_sector(10, 0).unwrap();
    assert!(run.failures.is_empty(), "{:?}", run.failures);

    let table = &run.table;
    assert_eq!(table.rows(), 5);
    let names: Vec<&str> = table.names().collect();
    assert_eq!(
        names,
        vec![
            "couplings",
            "gs_energy",
            "disorder",
            "corr_half",
            "E1",
            "E2",
            "corr_R_1",
            "corr_R_2",
            "corr_R_3",
            "corr_R_4"
        ]
    );
    for name in &names {
        let column = table.column(name).unwrap();
        assert!(column.iter().all(|x| x.is_finite()), "{} has gaps: {:?}", name, column);
    }

    assert_eq!(table.column("couplings").unwrap(), &[0.0, 0.5, 1.0, 1.5, 2.0]);
    let energies = table.column("gs_energy").unwrap();
    for w in energies.windows(2) {
        assert!(w[1] < w[0], "{:?}", energies);
    }
    // Zero coupling leaves only the transverse field.
    assert!((energies[0] + 20.0).abs() < 1e-8);

    let gs = table.column("gs_energy").unwrap();
    for level in ["E1", "E2"] {
        for (e, g) in table.column(level).unwrap().iter().zip(gs) {
            assert!(*e >= g - 1e-8);
        }
    }
    for row in 0..5 {
        assert!(table.get("E1", row).unwrap() <= table.get("E2", row).unwrap() + 1e-5);
        let d = table.get("disorder", row).unwrap();
        assert!((0.0..=1.0 + 1e-8).contains(&d));
    }
}

#[test]
fn rows_do_not_depend_on_the_thread_count() {
    let campaign = SweepCampaign::new(CampaignConfig {
        couplings: CouplingRange::List(vec![0.2, 0.6, 0.9, 1.1, 1.4, 1.8]),
        lengths: vec![8],
        excited_levels: 1,
        ..z2_config()
    })
    .unwrap();
    let on = |threads: usize| {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
            .install(|| campaign.run_sector(8, 0).unwrap())
    };
    let serial = on(1);
    let parallel = on(4);
    assert!(serial.failures.is_empty() && parallel.failures.is_empty());

    let a = &serial.table;
    let b = &parallel.table;
    assert_eq!(a.names().collect::<Vec<_>>(), b.names().collect::<Vec<_>>());
    assert_eq!(a.column("couplings").unwrap(), b.column("couplings").unwrap());
    for name in a.names() {
        for (x, y) in a.column(name).unwrap().iter().zip(b.column(name).unwrap()) {
            assert!((x - y).abs() < 1e-10, "{}: {} vs {}", name, x, y);
        }
    }
}

#[test]
fn warm_start_agrees_with_random_starts() {
    let random = SweepCampaign::new(CampaignConfig {
        compute: simulator::ComputeFlags {
            excited_levels: false,
            correlator: false,
            ..Default::default()
        },
        ..z2_config()
    })
    .unwrap();
    let warm = SweepCampaign::new(CampaignConfig {
        initial_state: InitialState::WarmStart,
        ..random.config().clone()
    })
    .unwrap();

    let a = random.run_sector(10, 0).unwrap();
    let b = warm.run_sector(10, 0).unwrap();
    let ea = a.table.column("gs_energy").unwrap();
    let eb = b.table.column("gs_energy").unwrap();
    for (x, y) in ea.iter().zip(eb) {
        assert!((x - y).abs() < 1e-7, "{} vs {}", x, y);
    }
}

#[test]
fn charge_conserving_sectors_run_independently() {
    let cfg = CampaignConfig {
        order: 3,
        lengths: vec![6],
        conserve_charge: true,
        couplings: CouplingRange::List(vec![0.3, 1.5]),
        compute: simulator::ComputeFlags {
            excited_levels: false,
            order: true,
            entropy: true,
            ..Default::default()
        },
        sweeps: quick_sweeps(),
        ..CampaignConfig::default()
    };
    let campaign = SweepCampaign::new(cfg).unwrap();
    assert_eq!(campaign.config().sectors(), vec![0, 1]);
    for sector in 0..3 {
        let run = campaign.run_sector(6, sector).unwrap();
        assert!(run.failures.is_empty(), "{:?}", run.failures);
        let entropy = run.table.column("entropy").unwrap();
        assert!(entropy.iter().all(|s| s.is_finite() && *s >= -1e-12));
        assert!(run.table.column("order").unwrap().iter().all(|o| o.is_finite()));
    }
}

#[test]
fn run_writes_one_csv_per_sector() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = z2_config();
    cfg.couplings = CouplingRange::List(vec![0.5, 1.5]);
    cfg.sectors = None;
    cfg.lengths = vec![6];
    cfg.excited_levels = 1;
    cfg.output.dir = dir.path().join("out");
    cfg.output.suffix = Some("test".to_string());

    let report = SweepCampaign::new(cfg).unwrap().run().unwrap();
    assert!(report.is_success());
    assert_eq!(report.files.len(), 2);

    let path = dir.path().join("out").join("Z2_L_6_sector_1_test.csv");
    let text = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "couplings,gs_energy,disorder,corr_half,E1,corr_R_1,corr_R_2");
    assert!(lines[1].starts_with("5.000000000000e-1,"));
    assert!(!text.contains("nan"));
}

#[test]
fn bad_configuration_fails_before_running() {
    let cfg = CampaignConfig {
        lengths: vec![10, 2],
        ..z2_config()
    };
    assert!(SweepCampaign::new(cfg).is_err());
}
