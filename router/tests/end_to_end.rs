use pcb_common::db::core::BoardDB;
use pcb_common::db::parser::kicad;
use pcb_common::rules::{DesignRules, ManufacturerProfile};
use pcb_common::util::check::{ViolationKind, run_drc};
use pcb_common::util::config::Config;
use pcb_common::util::generator::{self, CHARLIEPLEX_POWER_NETS};
use pcb_router::{Autorouter, NetStatus, RouterOptions, Strategy, load_for_routing};
use rstest::rstest;

fn power_nets() -> Vec<String> {
    CHARLIEPLEX_POWER_NETS.iter().map(|s| s.to_string()).collect()
}

fn charlieplex_rules() -> DesignRules {
    DesignRules::new(0.25, 0.3, 0.2)
}

fn router_for(db: BoardDB, rules: DesignRules, skip: Vec<String>) -> Autorouter {
    let config = Config {
        rules: rules.clone(),
        ..Config::default()
    };
    let mut options = RouterOptions::from_config(&config);
    options.skip_nets = skip;
    Autorouter::new(db, rules, options).unwrap()
}

fn charlieplex() -> Autorouter {
    router_for(generator::charlieplex_board(), charlieplex_rules(), power_nets())
}

#[test]
fn test_charlieplex_net_map() {
    let router = charlieplex();
    let map = router.net_map();
    assert_eq!(map.routable(), 9);
    assert_eq!(map.with_status(|s| *s == NetStatus::Skipped).count(), 4);
    assert_eq!(map.get("LINE_0").map(|e| e.pads), Some(2));
}

#[test]
fn test_charlieplex_basic_is_clean() {
    let mut router = charlieplex();
    router.route_all().unwrap();
    let stats = router.get_statistics();
    assert!(stats.nets_routed >= 7, "{}", stats);
    assert_eq!(stats.nets_total, 9);

    let report = router.check();
    assert_eq!(report.count(ViolationKind::Clearance), 0);
    assert_eq!(report.count(ViolationKind::Short), 0);
    assert_eq!(report.count(ViolationKind::MissingVia), 0);
}

#[test]
fn test_charlieplex_negotiated_routes_everything() {
    let mut router = charlieplex();
    router.route_all_negotiated(30).unwrap();
    let stats = router.get_statistics();
    assert_eq!(stats.nets_routed, 9, "{}", stats);
    assert!(stats.all_routed());
    assert!(stats.iterations >= 1);
    assert!(router.check().is_clean());
}

#[test]
fn test_basic_is_deterministic() {
    let mut a = charlieplex();
    let mut b = charlieplex();
    a.route_all().unwrap();
    b.route_all().unwrap();
    assert_eq!(a.to_sexp(), b.to_sexp());
    assert_eq!(a.routes(), b.routes());
}

#[test]
fn test_monte_carlo_keeps_best_trial() {
    let mut router = charlieplex();
    router.options_mut().config.monte_carlo.parallel = true;
    router.route_all_monte_carlo(4).unwrap();
    let stats = router.get_statistics();

    let mut basic = charlieplex();
    basic.route_all().unwrap();
    assert!(stats.nets_routed >= basic.get_statistics().nets_routed);
    assert!(router.check().is_clean());
}

#[test]
fn test_optimized_routes_stay_connected() {
    let mut router = charlieplex();
    router.route_all().unwrap();
    let tasks = router.tasks().to_vec();
    for route in router.routes() {
        let task = tasks.iter().find(|t| t.net == route.net).unwrap();
        for pad in &task.pads {
            assert!(
                route
                    .segments
                    .iter()
                    .any(|s| s.start.approx_eq(pad.center, 1e-6) || s.end.approx_eq(pad.center, 1e-6)),
                "{} lost pad {}",
                route.net_name,
                pad.label
            );
        }
        let mut probe = route.clone();
        assert_eq!(probe.validate_layer_transitions(0.3, 0.6), 0);
    }
}

#[rstest]
#[case(0.1)]
#[case(0.25)]
fn test_fine_pitch_grid(#[case] grid: f64) {
    let mut router = router_for(generator::fine_pitch_board(), DesignRules::new(grid, 0.1, 0.1), Vec::new());
    router.route_all().unwrap();
    let stats = router.get_statistics();
    if grid < 0.2 {
        assert_eq!(stats.nets_routed, 2, "{}", stats);
        assert!(router.check().is_clean());
    } else {
        assert!(stats.nets_routed < 2, "{}", stats);
    }
}

#[test]
fn test_relaxation_reaches_fab_minimum() {
    let rules = DesignRules::new(0.25, 0.2, 0.2);
    let mut router = router_for(generator::fine_pitch_board(), rules, Vec::new());
    let profile = ManufacturerProfile::lookup("pcbway").unwrap();

    router.route_with(&Strategy::Basic).unwrap();
    assert_eq!(router.get_statistics().nets_routed, 0);

    router.route_with_relaxation(&Strategy::Basic, &profile, 2).unwrap();
    let stats = router.get_statistics();
    assert_eq!(stats.nets_routed, 2, "{}", stats);
    assert!(stats.unrouted.is_empty());
}

#[test]
fn test_existing_copper_is_kept() {
    let mut first = charlieplex();
    first.route_all().unwrap();
    let routed = first.get_statistics().nets_routed;

    let mut second = router_for(first.routed_board(), charlieplex_rules(), power_nets());
    assert_eq!(
        second.net_map().with_status(|s| *s == NetStatus::Existing).count(),
        routed
    );
    second.route_all().unwrap();
    assert_eq!(second.get_statistics().nets_total, 9 - routed);
}

#[test]
fn test_write_back_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("charlieplex.kicad_pcb");
    let output = dir.path().join("charlieplex_routed.kicad_pcb");
    let (input, output) = (input.to_str().unwrap(), output.to_str().unwrap());
    generator::write_to_file(&generator::charlieplex_board(), input).unwrap();

    let (mut router, map) = load_for_routing(input, &power_nets(), &charlieplex_rules()).unwrap();
    assert_eq!(map.routable(), 9);
    router.route_all().unwrap();
    router.write_output(input, output).unwrap();
    let stats = router.get_statistics();

    let db = kicad::load(output).unwrap();
    assert_eq!(db.segments.len(), stats.segments);
    assert_eq!(db.vias.len(), stats.vias);
    let clearance = charlieplex_rules().clearance;
    let report = run_drc(&db, |_| clearance);
    assert_eq!(report.count(ViolationKind::Clearance), 0);
    assert_eq!(report.count(ViolationKind::Short), 0);
}

#[test]
fn test_config_strategy_selection() {
    let mut config = Config::default();
    config.routing.strategy = "negotiated".to_string();
    let options = RouterOptions::from_config(&config);
    assert_eq!(options.strategy().unwrap().name(), "negotiated");

    config.routing.strategy = "greedy".to_string();
    assert!(RouterOptions::from_config(&config).strategy().is_err());
}

#[test]
fn test_whole_board_route_entry_point() {
    let mut db = generator::charlieplex_board();
    let mut config = Config::default();
    config.rules = charlieplex_rules();
    config.input.skip_nets = power_nets();
    let stats = pcb_router::route(&mut db, &config).unwrap();
    assert!(stats.nets_routed >= 7);
    assert_eq!(db.segments.len(), stats.segments);
}

#[test]
fn test_rerouted_board_is_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("charlieplex.kicad_pcb");
    let first_out = dir.path().join("first.kicad_pcb");
    let second_out = dir.path().join("second.kicad_pcb");
    let input = input.to_str().unwrap();
    let (first_out, second_out) = (first_out.to_str().unwrap(), second_out.to_str().unwrap());
    generator::write_to_file(&generator::charlieplex_board(), input).unwrap();

    let (mut first, _) = load_for_routing(input, &power_nets(), &charlieplex_rules()).unwrap();
    first.route_all().unwrap();
    first.write_output(input, first_out).unwrap();

    let mut config = Config {
        rules: charlieplex_rules(),
        ..Config::default()
    };
    config.routing.reroute_existing = true;
    config.input.skip_nets = power_nets();
    let options = RouterOptions::from_config(&config);
    let (mut second, map) = pcb_router::load_with_options(first_out, &charlieplex_rules(), options).unwrap();
    assert_eq!(map.with_status(|s| *s == NetStatus::Existing).count(), 0);
    assert_eq!(map.routable(), 9);
    second.route_all().unwrap();
    second.write_output(first_out, second_out).unwrap();
    let stats = second.get_statistics();

    let db = kicad::load(second_out).unwrap();
    assert_eq!(db.segments.len(), stats.segments);
    assert_eq!(db.vias.len(), stats.vias);
    assert_eq!(db.pads.len(), generator::charlieplex_board().pads.len());
}
