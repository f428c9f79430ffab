//! Board-level routing session: grid construction, net loading, strategy
//! runs, optimisation and write-back.

use crate::algo::SearchParams;
use crate::error::RouterError;
use crate::grid::{DenseGrid, GridRules};
use crate::optimizer::{OptimizeStats, optimize_all};
use crate::route::Route;
use crate::strategy::{ConvergenceState, NetTask, PadTerminal, RoutingContext, Strategy};
use pcb_common::db::core::{BoardDB, Segment, Via};
use pcb_common::db::indices::NetId;
use pcb_common::db::parser::kicad;
use pcb_common::db::writer;
use pcb_common::rules::{DesignRules, ManufacturerProfile, NetClassMap, NetRules, create_net_class_map, relaxation_tiers};
use pcb_common::util::check::{DrcReport, run_drc};
use pcb_common::util::config::Config;
use pcb_common::util::profiler::{Deadline, ScopedTimer};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Why a net is or is not part of a routing run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetStatus {
    Routable,
    /// Listed in `skip_nets`; its pads stay obstacles.
    Skipped,
    /// Unusable geometry; the reason is logged and kept here.
    Invalid(String),
    /// Already carries copper that is kept as it is.
    Existing,
}

#[derive(Clone, Debug)]
pub struct NetEntry {
    pub net: NetId,
    pub name: String,
    pub pads: usize,
    pub status: NetStatus,
}

/// Every named net of the board and what the router does with it.
#[derive(Clone, Debug, Default)]
pub struct NetMap {
    entries: Vec<NetEntry>,
}

impl NetMap {
    pub fn entries(&self) -> &[NetEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&NetEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn with_status<'a>(&'a self, pred: impl Fn(&NetStatus) -> bool + 'a) -> impl Iterator<Item = &'a NetEntry> + 'a {
        self.entries.iter().filter(move |e| pred(&e.status))
    }

    pub fn routable(&self) -> usize {
        self.with_status(|s| *s == NetStatus::Routable).count()
    }
}

/// Everything a session needs besides the board and its rules.
#[derive(Clone, Debug, Default)]
pub struct RouterOptions {
    pub skip_nets: Vec<String>,
    pub config: Config,
    pub classes: NetClassMap,
}

impl RouterOptions {
    pub fn from_config(config: &Config) -> Self {
        let input = &config.input;
        Self {
            skip_nets: input.skip_nets.clone(),
            config: config.clone(),
            classes: create_net_class_map(&input.power_nets, &input.high_speed_nets, &input.clock_nets),
        }
    }

    /// The strategy named in `[routing]`.
    pub fn strategy(&self) -> Result<Strategy, RouterError> {
        let name = &self.config.routing.strategy;
        Strategy::from_name(name, &self.config)
            .ok_or_else(|| RouterError::UnknownStrategy(name.clone()))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoutingStatistics {
    pub strategy: String,
    pub routes: usize,
    pub segments: usize,
    pub vias: usize,
    pub total_length_mm: f64,
    pub nets_routed: usize,
    pub nets_total: usize,
    pub unrouted: Vec<String>,
    pub skipped: usize,
    pub invalid: usize,
    pub existing: usize,
    pub overflow: usize,
    pub iterations: usize,
    pub convergence: Option<ConvergenceState>,
    pub optimizer: OptimizeStats,
}

impl RoutingStatistics {
    pub fn all_routed(&self) -> bool {
        self.nets_routed == self.nets_total
    }
}

impl fmt::Display for RoutingStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} nets, {} segments, {} vias, {:.2}mm",
            self.strategy, self.nets_routed, self.nets_total, self.segments, self.vias, self.total_length_mm
        )?;
        if self.skipped + self.invalid + self.existing > 0 {
            write!(
                f,
                " ({} skipped, {} invalid, {} kept)",
                self.skipped, self.invalid, self.existing
            )?;
        }
        Ok(())
    }
}

pub struct Autorouter {
    /// Pads plus the copper that stays fixed.
    base: BoardDB,
    rules: DesignRules,
    options: RouterOptions,
    net_map: NetMap,
    tasks: Vec<NetTask>,
    clearances: HashMap<NetId, f64>,
    /// Nets whose board copper was dropped to be routed again.
    rerouted: HashSet<NetId>,
    /// Obstacles and terminals only; every run starts from a copy.
    grid: DenseGrid,
    routes: Vec<Route>,
    stats: RoutingStatistics,
}

/// Parse `path` and prepare it for routing, leaving `skip_nets` alone.
pub fn load_for_routing(
    path: &str,
    skip_nets: &[String],
    rules: &DesignRules,
) -> Result<(Autorouter, NetMap), RouterError> {
    let config = Config {
        rules: rules.clone(),
        ..Config::default()
    };
    let mut options = RouterOptions::from_config(&config);
    options.skip_nets = skip_nets.to_vec();
    load_with_options(path, rules, options)
}

pub fn load_with_options(
    path: &str,
    rules: &DesignRules,
    options: RouterOptions,
) -> Result<(Autorouter, NetMap), RouterError> {
    let _timer = ScopedTimer::new("Board load");
    let db = kicad::load(path)?;
    let router = Autorouter::new(db, rules.clone(), options)?;
    let map = router.net_map().clone();
    Ok((router, map))
}

fn invalid(entry: &mut NetEntry, reason: String) {
    log::warn!("Skipping net {}: {}", entry.name, reason);
    entry.status = NetStatus::Invalid(reason);
}

impl Autorouter {
    pub fn new(mut db: BoardDB, rules: DesignRules, options: RouterOptions) -> Result<Self, RouterError> {
        rules.validate(options.config.routing.strict_rules)?;
        db.ensure_outline(2.0);

        let skip: HashSet<&str> = options.skip_nets.iter().map(String::as_str).collect();
        let with_copper: HashSet<NetId> = db.nets_with_copper().into_iter().collect();
        let reroute = options.config.routing.reroute_existing;

        let mut clearances = HashMap::new();
        let mut entries = Vec::new();
        let mut net_rules: Vec<NetRules> = Vec::new();
        for net in db.nets.iter().filter(|n| n.id.is_connected()) {
            let resolved = options.classes.resolve(&rules, &net.name, net.class.as_deref());
            clearances.insert(net.id, resolved.clearance);
            let mut entry = NetEntry {
                net: net.id,
                name: net.name.clone(),
                pads: net.pads.len(),
                status: NetStatus::Routable,
            };
            if skip.contains(net.name.as_str()) {
                entry.status = NetStatus::Skipped;
            } else if with_copper.contains(&net.id) && !reroute {
                entry.status = NetStatus::Existing;
            } else if net.pads.len() < 2 {
                invalid(&mut entry, format!("{} pad(s), nothing to connect", net.pads.len()));
            } else if let Some(&off) = net
                .pads
                .iter()
                .find(|&&p| !db.outline.contains(db.pads[p.index()].position))
            {
                invalid(&mut entry, format!("pad {} lies outside the board", db.pad_label(off)));
            } else {
                net_rules.push(resolved);
            }
            entries.push(entry);
        }

        // Rerouted nets give up the copper they came with.
        let rerouted: HashSet<NetId> = entries
            .iter()
            .filter(|e| e.status == NetStatus::Routable && with_copper.contains(&e.net))
            .map(|e| e.net)
            .collect();
        if !rerouted.is_empty() {
            log::info!("Rerouting {} nets that already carry copper", rerouted.len());
            db.segments.retain(|s| !rerouted.contains(&s.net));
            db.vias.retain(|v| !rerouted.contains(&v.net));
        }

        let grid_rules = net_rules.iter().fold(
            GridRules {
                trace_width: rules.trace_width,
                clearance: rules.clearance,
                via_diameter: rules.via_diameter,
            },
            |acc, r| GridRules {
                trace_width: acc.trace_width.max(r.trace_width),
                clearance: acc.clearance.max(r.clearance),
                via_diameter: acc.via_diameter.max(r.via_diameter),
            },
        );
        let mut grid = DenseGrid::from_board(&db, rules.grid_resolution, grid_rules);
        for s in &db.segments {
            grid.mark_fixed_segment(s);
        }
        for v in &db.vias {
            grid.mark_fixed_via(v);
        }

        let mut tasks = Vec::new();
        for entry in entries.iter_mut().filter(|e| e.status == NetStatus::Routable) {
            let Some(net) = db.net(entry.net) else {
                continue;
            };
            let resolved = options.classes.resolve(&rules, &net.name, net.class.as_deref());
            let mut pads = Vec::with_capacity(net.pads.len());
            for &pid in &net.pads {
                let pad = &db.pads[pid.index()];
                pads.push(PadTerminal {
                    label: db.pad_label(pid),
                    center: pad.position,
                    cells: grid.add_terminals(pad, resolved.trace_width),
                    multilayer: pad.layers.len() > 1,
                });
            }
            if let Some(p) = pads.iter().find(|p| p.cells.is_empty()) {
                invalid(entry, format!("pad {} has no reachable grid cell", p.label));
                continue;
            }
            tasks.push(NetTask {
                net: entry.net,
                name: entry.name.clone(),
                priority: options.classes.class_of(&entry.name).priority,
                rules: resolved,
                pads,
            });
        }

        let net_map = NetMap { entries };
        log::info!(
            "Loaded {} nets: {} routable, {} skipped, {} invalid, {} kept",
            net_map.entries.len(),
            tasks.len(),
            net_map.with_status(|s| *s == NetStatus::Skipped).count(),
            net_map.with_status(|s| matches!(s, NetStatus::Invalid(_))).count(),
            net_map.with_status(|s| *s == NetStatus::Existing).count(),
        );

        Ok(Self {
            base: db,
            rules,
            options,
            net_map,
            tasks,
            clearances,
            rerouted,
            grid,
            routes: Vec::new(),
            stats: RoutingStatistics::default(),
        })
    }

    pub fn net_map(&self) -> &NetMap {
        &self.net_map
    }

    pub fn rules(&self) -> &DesignRules {
        &self.rules
    }

    pub fn tasks(&self) -> &[NetTask] {
        &self.tasks
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn options_mut(&mut self) -> &mut RouterOptions {
        &mut self.options
    }

    pub fn route_all(&mut self) -> Result<&[Route], RouterError> {
        self.route_with(&Strategy::Basic)
    }

    pub fn route_all_negotiated(&mut self, max_iterations: usize) -> Result<&[Route], RouterError> {
        let mut cfg = self.options.config.negotiated.clone();
        cfg.max_iterations = max_iterations;
        self.route_with(&Strategy::Negotiated(cfg))
    }

    pub fn route_all_monte_carlo(&mut self, num_trials: usize) -> Result<&[Route], RouterError> {
        let mut trials = self.options.config.monte_carlo.clone();
        trials.num_trials = num_trials;
        let negotiated = self.options.config.negotiated.clone();
        self.route_with(&Strategy::MonteCarlo { trials, negotiated })
    }

    fn context(&self) -> RoutingContext {
        let routing = &self.options.config.routing;
        RoutingContext {
            params: SearchParams::from_config(routing),
            deadline: Deadline::after_secs(routing.timeout_secs),
            corridor_cell_mm: routing.use_corridors.then_some(routing.corridor_cell_mm),
            high_performance: routing.high_performance,
        }
    }

    /// Route every routable net from scratch with `strategy`, then optimise.
    /// Unroutable nets are reported in the statistics, not as errors.
    pub fn route_with(&mut self, strategy: &Strategy) -> Result<&[Route], RouterError> {
        let _timer = ScopedTimer::new(format!("{} routing", strategy.name()));
        log::info!(
            "Routing {} nets with the {} strategy",
            self.tasks.len(),
            strategy.name()
        );
        let mut grid = self.grid.clone();
        let result = strategy.route(&mut grid, &self.tasks, &self.context());

        let mut routes = result.routes;
        let optimized = optimize_all(
            &self.base,
            &mut routes,
            self.max_clearance(),
            &self.options.config.optimizer,
        )?;

        let routed: HashSet<NetId> = routes.iter().map(|r| r.net).collect();
        self.stats = RoutingStatistics {
            strategy: strategy.name().to_string(),
            routes: routes.len(),
            segments: routes.iter().map(|r| r.segments.len()).sum(),
            vias: routes.iter().map(|r| r.vias.len()).sum(),
            total_length_mm: routes.iter().map(|r| r.length()).sum(),
            nets_routed: routes.len(),
            nets_total: self.tasks.len(),
            unrouted: self
                .tasks
                .iter()
                .filter(|t| !routed.contains(&t.net))
                .map(|t| t.name.clone())
                .collect(),
            skipped: self.net_map.with_status(|s| *s == NetStatus::Skipped).count(),
            invalid: self.net_map.with_status(|s| matches!(s, NetStatus::Invalid(_))).count(),
            existing: self.net_map.with_status(|s| *s == NetStatus::Existing).count(),
            overflow: result.overflow,
            iterations: result.iterations,
            convergence: result.convergence,
            optimizer: optimized,
        };
        self.routes = routes;
        log::info!("{}", self.stats);
        if !self.stats.unrouted.is_empty() {
            log::warn!("Unrouted: {}", self.stats.unrouted.join(", "));
        }
        Ok(&self.routes)
    }

    /// Route with the requested rules, then retry whatever is left with each
    /// successively relaxed tier towards `profile`'s minimum. Copper routed
    /// at an earlier tier stays where it is.
    pub fn route_with_relaxation(
        &mut self,
        strategy: &Strategy,
        profile: &ManufacturerProfile,
        tiers: usize,
    ) -> Result<&[Route], RouterError> {
        self.route_with(strategy)?;
        for tier in relaxation_tiers(&self.rules, profile, tiers).into_iter().skip(1) {
            if self.stats.unrouted.is_empty() {
                break;
            }
            log::info!(
                "Tier {} ({}): width {}mm, clearance {}mm, grid {}mm for {} nets",
                tier.index,
                tier.name,
                tier.trace_width,
                tier.clearance,
                tier.grid_resolution,
                self.stats.unrouted.len()
            );
            let mut options = self.options.clone();
            options.config.routing.reroute_existing = false;
            let mut stage = Autorouter::new(self.routed_board(), tier.apply(&self.rules), options)?;
            stage.route_with(strategy)?;

            let stage_stats = stage.get_statistics();
            self.stats.unrouted = stage_stats.unrouted;
            self.stats.optimizer += stage_stats.optimizer;
            for route in std::mem::take(&mut stage.routes) {
                self.clearances.insert(route.net, stage.clearance_of(route.net));
                self.routes.push(route);
            }
        }
        self.refresh_totals();
        Ok(&self.routes)
    }

    fn refresh_totals(&mut self) {
        let s = &mut self.stats;
        s.routes = self.routes.len();
        s.nets_routed = self.routes.len();
        s.segments = self.routes.iter().map(|r| r.segments.len()).sum();
        s.vias = self.routes.iter().map(|r| r.vias.len()).sum();
        s.total_length_mm = self.routes.iter().map(|r| r.length()).sum();
    }

    pub fn get_statistics(&self) -> RoutingStatistics {
        self.stats.clone()
    }

    fn max_clearance(&self) -> f64 {
        self.tasks
            .iter()
            .map(|t| t.rules.clearance)
            .fold(self.rules.clearance, f64::max)
    }

    pub fn clearance_of(&self, net: NetId) -> f64 {
        self.clearances.get(&net).copied().unwrap_or(self.rules.clearance)
    }

    fn routed_copper(&self) -> (Vec<Segment>, Vec<Via>) {
        let segments = self.routes.iter().flat_map(|r| r.segments.iter().copied()).collect();
        let vias = self.routes.iter().flat_map(|r| r.vias.iter().copied()).collect();
        (segments, vias)
    }

    /// Routed copper as `segment`/`via` records in the board's grammar.
    pub fn to_sexp(&self) -> String {
        let (segments, vias) = self.routed_copper();
        writer::records(&segments, &vias, self.base.quoted_layers)
    }

    /// `board` text with the routed copper appended to its root list.
    pub fn merge_into_board(&self, board: &str) -> Result<String, RouterError> {
        writer::merge_into_board(board, &self.to_sexp())
            .ok_or_else(|| RouterError::InvalidGeometry("board text has no closing paren".to_string()))
    }

    /// Write the routed board next to its source. Copper that was rerouted
    /// has to go, so that case writes the whole board afresh from the parsed
    /// model. That rewrite is lossy: only copper layers, nets, footprints
    /// with their pads, the outline and copper survive. Net classes, zones,
    /// graphics, text and everything else in the source file are dropped.
    pub fn write_output(&self, input: &str, output: &str) -> Result<(), RouterError> {
        let text = if !self.rerouted.is_empty() {
            log::warn!(
                "{} nets had their existing copper rerouted; {} is regenerated from the parsed board \
                 and drops net classes, zones, graphics and text of {}",
                self.rerouted.len(),
                output,
                input
            );
            writer::write_board(&self.routed_board())
        } else {
            self.merge_into_board(&std::fs::read_to_string(input)?)?
        };
        std::fs::write(output, text)?;
        log::info!("Wrote {} ({} segments, {} vias)", output, self.stats.segments, self.stats.vias);
        Ok(())
    }

    /// The board with fixed copper and every route.
    pub fn routed_board(&self) -> BoardDB {
        let mut db = self.base.clone();
        let (segments, vias) = self.routed_copper();
        db.segments.extend(segments);
        db.vias.extend(vias);
        db
    }

    /// Clearance and missing-via check of the routed board.
    pub fn check(&self) -> DrcReport {
        let board = self.routed_board();
        run_drc(&board, |net| self.clearance_of(net))
    }
}
